//! Getty ULAN lookups over the vocab.getty.edu SPARQL endpoint
//!
//! ULAN covers persons and corporate bodies in the arts. The label
//! search uses the endpoint's Lucene index (`luc:term`) restricted to
//! the persons facet; gender comes from the preferred biography.

use super::{check_ids, GenderRow};
use crate::error::{Error, Result};
use crate::sparql::{binding, SparqlClient};

const GETTY_SPARQL_URL: &str = "https://vocab.getty.edu/sparql";
const ULAN_PREFIX: &str = "http://vocab.getty.edu/ulan/";

/// The Getty endpoint handles much larger VALUES blocks than the
/// library endpoints.
const GENDER_CHUNK: usize = 10000;

pub struct GettyClient {
    sparql: SparqlClient,
}

impl Default for GettyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GettyClient {
    pub fn new() -> Self {
        Self {
            sparql: SparqlClient::new(GETTY_SPARQL_URL),
        }
    }

    /// Full-text search over person headings. Multi-word terms match
    /// best as `last-name AND first-name`, without dates.
    pub fn search_label(&self, label: &str) -> Result<Vec<GenderRow>> {
        let label = label.trim();
        if label.is_empty() || label.contains('"') {
            return Err(Error::InvalidInput(format!("Invalid label: '{}'", label)));
        }
        let results = self.sparql.query(&build_search_query(label))?;
        Ok(results.rows.iter().map(gender_row).collect())
    }

    /// Preferred label and gender for a batch of ULAN identifiers.
    /// Unknown identifiers are absent from the result.
    pub fn genders(&self, ids: &[&str]) -> Result<Vec<GenderRow>> {
        let ids = check_ids(ids)?;
        let mut rows = Vec::new();
        for chunk in ids.chunks(GENDER_CHUNK) {
            let results = self.sparql.query(&build_gender_query(chunk))?;
            rows.extend(results.rows.iter().map(gender_row));
        }
        Ok(rows)
    }
}

fn gender_row(row: &crate::sparql::Row) -> GenderRow {
    GenderRow {
        id: strip_ulan(binding(row, "getty")),
        label: binding(row, "label").to_string(),
        gender: binding(row, "gender").to_string(),
    }
}

const GENDER_CLAUSE: &str = "OPTIONAL {?getty foaf:focus/gvp:biographyPreferred/schema:gender/rdfs:label ?gender.\n\
     FILTER(LANG(?gender)='en').}";

fn build_search_query(label: &str) -> String {
    format!(
        "SELECT DISTINCT ?getty ?label ?gender\n\
         WHERE {{\n\
         ?getty luc:term \"{label}\";\n\
         skos:inScheme ulan:;\n\
         gvp:parentStringAbbrev \"Persons, Artists\";\n\
         gvp:prefLabelGVP/xl:literalForm ?label.\n\
         {GENDER_CLAUSE}\n\
         }}"
    )
}

fn build_gender_query(ids: &[String]) -> String {
    let values = ids
        .iter()
        .map(|id| format!("ulan:{}", id))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT DISTINCT ?getty ?label ?gender\n\
         WHERE {{\n\
         VALUES ?getty {{ {values} }}\n\
         OPTIONAL {{?getty gvp:prefLabelGVP/xl:literalForm ?label}}\n\
         {GENDER_CLAUSE}\n\
         }}"
    )
}

fn strip_ulan(uri: &str) -> String {
    uri.strip_prefix(ULAN_PREFIX).unwrap_or(uri).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_query() {
        let q = build_search_query("cervantes AND miguel");
        assert!(q.contains("luc:term \"cervantes AND miguel\""));
        assert!(q.contains("gvp:parentStringAbbrev \"Persons, Artists\""));
        assert!(q.contains("FILTER(LANG(?gender)='en')"));
    }

    #[test]
    fn test_build_gender_query() {
        let q = build_gender_query(&["500227987".to_string(), "500115588".to_string()]);
        assert!(q.contains("VALUES ?getty { ulan:500227987 ulan:500115588 }"));
    }

    #[test]
    fn test_search_rejects_quotes() {
        let client = GettyClient::new();
        assert!(matches!(
            client.search_label(r#"a"b"#),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_strip_ulan() {
        assert_eq!(strip_ulan("http://vocab.getty.edu/ulan/500227987"), "500227987");
        assert_eq!(strip_ulan("500227987"), "500227987");
    }
}
