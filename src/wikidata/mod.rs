//! Wikidata clients: Query Service operations and entity dossiers
//!
//! Entity ids are validated before any request, authority abbreviations
//! resolve to the external-id property they stand for, and large input
//! lists are split into endpoint-sized batches by the operations
//! themselves.

pub mod info;
pub mod query;

pub use info::*;
pub use query::*;

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENTITY_ID: Regex = Regex::new(r"^[QP]\d+$").unwrap();
    static ref PROPERTY_ID: Regex = Regex::new(r"^P\d+$").unwrap();
}

/// Validate a list of entity ids (`Qnnn` or `Pnnn`), trimming whitespace,
/// upper-casing and removing duplicates while preserving order. Fails if
/// the list is empty after cleanup or any member is malformed.
pub fn check_entities(entities: &[&str]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in entities {
        let id = raw.trim().to_ascii_uppercase();
        if id.is_empty() {
            continue;
        }
        if !ENTITY_ID.is_match(&id) {
            return Err(Error::InvalidInput(format!("Invalid entity id: '{}'", raw)));
        }
        if seen.insert(id.clone()) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return Err(Error::InvalidInput("Empty entity list".to_string()));
    }
    Ok(out)
}

/// Validate a list of property ids (`Pnnn` only).
pub fn check_properties(properties: &[&str]) -> Result<Vec<String>> {
    let ids = check_entities(properties)?;
    for id in &ids {
        if !PROPERTY_ID.is_match(id) {
            return Err(Error::InvalidInput(format!(
                "Not a property id: '{}'",
                id
            )));
        }
    }
    Ok(ids)
}

/// Resolve an authority-file abbreviation to the Wikidata external-id
/// property holding that authority's identifiers. A `Pnnn` value is
/// accepted as-is.
pub fn authority_property(authority: &str) -> Result<String> {
    let authority = authority.trim();
    if PROPERTY_ID.is_match(&authority.to_ascii_uppercase()) {
        return Ok(authority.to_ascii_uppercase());
    }
    let property = match authority {
        "VIAF" => "P214",
        "LC" => "P244",
        "BNE" => "P950",
        "ISNI" => "P213",
        "JPG" | "ULAN" => "P245",
        "BNF" => "P268",
        "GND" | "DNB" => "P227",
        "SUDOC" | "idRefID" => "P269",
        "NTA" => "P1006",
        "J9U" => "P8189",
        "ELEM" => "P1565",
        "NUKAT" => "P1207",
        "RERO" => "P3065",
        "CAOONL" => "P8179",
        "NII" => "P4787",
        "BIBSYS" | "NORAF" => "P1015",
        "BNC" | "CANTIC" => "P9984",
        "PLWABN" => "P7293",
        "NLA" => "P409",
        "MNCARS" => "P4439",
        other => {
            return Err(Error::InvalidInput(format!(
                "Unknown authority: '{}'",
                other
            )))
        }
    };
    Ok(property.to_string())
}

/// Bare Q/P id of an entity URI. Values that are not entity URIs, such
/// as dates or plain strings, pass through unchanged.
pub(crate) fn entity_id(value: &str) -> &str {
    value
        .strip_prefix("http://www.wikidata.org/entity/")
        .unwrap_or(value)
}

/// `wd:Q1 wd:Q2 ...` for a VALUES clause.
pub(crate) fn values_clause(entities: &[String]) -> String {
    entities
        .iter()
        .map(|e| format!("wd:{}", e))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a pipe-joined GROUP_CONCAT cell into its members.
pub(crate) fn split_concat(cell: &str) -> Vec<String> {
    cell.split('|')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a pipe-joined GROUP_CONCAT cell of entity URIs into bare ids.
pub(crate) fn split_concat_entities(cell: &str) -> Vec<String> {
    cell.split('|')
        .filter(|s| !s.is_empty())
        .map(|s| entity_id(s).to_string())
        .collect()
}

/// Whether any of `instance_of` is named by the pipe-separated `classes`
/// expression.
pub(crate) fn matches_class(instance_of: &[String], classes: &str) -> bool {
    instance_of
        .iter()
        .any(|c| classes.split('|').any(|wanted| wanted == c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_entities_valid() {
        let ids = check_entities(&["Q5682", " Q8605 ", "q5682", "P214"]).unwrap();
        assert_eq!(ids, vec!["Q5682", "Q8605", "P214"]);
    }

    #[test]
    fn test_check_entities_invalid() {
        assert!(check_entities(&["Q5682", "5682"]).is_err());
        assert!(check_entities(&["Q5 682"]).is_err());
        assert!(check_entities(&[]).is_err());
        assert!(check_entities(&["", "  "]).is_err());
    }

    #[test]
    fn test_check_properties() {
        assert_eq!(check_properties(&["P31", "p569"]).unwrap(), vec!["P31", "P569"]);
        assert!(check_properties(&["Q31"]).is_err());
    }

    #[test]
    fn test_authority_property() {
        assert_eq!(authority_property("VIAF").unwrap(), "P214");
        assert_eq!(authority_property("BNE").unwrap(), "P950");
        assert_eq!(authority_property("DNB").unwrap(), "P227");
        assert_eq!(authority_property("ULAN").unwrap(), "P245");
        assert_eq!(authority_property("P999").unwrap(), "P999");
        assert!(authority_property("NOPE").is_err());
    }

    #[test]
    fn test_entity_id() {
        assert_eq!(entity_id("http://www.wikidata.org/entity/Q5682"), "Q5682");
        assert_eq!(entity_id("Q5682"), "Q5682");
        assert_eq!(entity_id("1547-09-29T00:00:00Z"), "1547-09-29T00:00:00Z");
    }

    #[test]
    fn test_split_concat_entities() {
        let cell = "http://www.wikidata.org/entity/Q5|http://www.wikidata.org/entity/Q215627";
        assert_eq!(split_concat_entities(cell), vec!["Q5", "Q215627"]);
        assert!(split_concat_entities("").is_empty());
    }

    #[test]
    fn test_values_clause() {
        let v = values_clause(&["Q1".to_string(), "Q2".to_string()]);
        assert_eq!(v, "wd:Q1 wd:Q2");
    }

    #[test]
    fn test_matches_class() {
        let inst = vec!["Q5".to_string(), "Q215627".to_string()];
        assert!(matches_class(&inst, "Q5"));
        assert!(matches_class(&inst, "Q6256|Q5"));
        assert!(!matches_class(&inst, "Q6256"));
        assert!(!matches_class(&inst, "Q52"));
    }
}
