//! Response-document parsing through the public API

use serde_json::json;
use wikitools::authority::gender_from_ttl;
use wikitools::{binding, sparql, ViafRecord};

const SPARQL_JSON: &str = r#"{
  "head": { "vars": [ "entity", "entityLabel", "viafid" ] },
  "results": {
    "bindings": [
      {
        "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q5682" },
        "entityLabel": { "type": "literal", "xml:lang": "es", "value": "Miguel de Cervantes" },
        "viafid": { "type": "literal", "value": "17220427" }
      },
      {
        "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q8605" },
        "entityLabel": { "type": "literal", "xml:lang": "es", "value": "Simón Bolívar" }
      }
    ]
  }
}"#;

#[test]
fn test_sparql_json_roundtrip() {
    let results = sparql::parse_json(SPARQL_JSON).unwrap();
    assert_eq!(results.vars, vec!["entity", "entityLabel", "viafid"]);
    assert_eq!(results.rows.len(), 2);
    assert_eq!(binding(&results.rows[0], "viafid"), "17220427");
    // Unbound variables read as empty strings
    assert_eq!(binding(&results.rows[1], "viafid"), "");
}

#[test]
fn test_sparql_xml_matches_json() {
    let xml = r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#">
  <head><variable name="entity"/><variable name="viafid"/></head>
  <results>
    <result>
      <binding name="entity"><uri>http://www.wikidata.org/entity/Q5682</uri></binding>
      <binding name="viafid"><literal>17220427</literal></binding>
    </result>
  </results>
</sparql>"#;
    let results = sparql::parse_xml(xml).unwrap();
    assert_eq!(results.rows.len(), 1);
    assert_eq!(binding(&results.rows[0], "viafid"), "17220427");
}

#[test]
fn test_viaf_record_summary_from_cluster_json() {
    let record = ViafRecord::from_value(json!({
        "viafID": "17220427",
        "nameType": "Personal",
        "fixed": {"gender": "b"},
        "birthDate": "1547-09-29",
        "deathDate": "1616-04-22",
        "mainHeadings": {
            "data": {
                "text": "Cervantes Saavedra, Miguel de, 1547-1616",
                "sources": {"sid": ["LC|n79017494", "WKP|Q5682"]}
            }
        },
        "titles": {"work": {"title": "Don Quixote"}},
        "xLinks": {"xLink": {"#text": "https://es.wikipedia.org/wiki/Miguel_de_Cervantes"}}
    }));
    assert!(record.is_personal());
    let summary = record.summary();
    assert_eq!(summary.viaf_id, "17220427");
    assert_eq!(summary.gender.as_deref(), Some("male"));
    assert_eq!(summary.birth_year.as_deref(), Some("1547"));
    assert_eq!(summary.death_year.as_deref(), Some("1616"));
    assert_eq!(summary.titles, vec!["Don Quixote"]);
    assert_eq!(
        record.source_id("WKP").unwrap().1,
        "Q5682"
    );
    assert_eq!(summary.wikipedias.len(), 1);
}

#[test]
fn test_bne_gender_from_ttl() {
    let ttl = "@prefix ns5: <http://www.rdaregistry.info/Elements/a/> .\n\
               <https://datos.bne.es/resource/XX1718747> ns5:P50116 \"Masculino\" .\n";
    assert_eq!(gender_from_ttl(ttl).unwrap(), "Masculino");
    assert_eq!(gender_from_ttl("no prefixes here"), None);
}
