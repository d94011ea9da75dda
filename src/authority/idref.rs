//! IdRef (SUDOC authority file) gender lookup
//!
//! IdRef exposes the French academic union catalogue's authority
//! records over SPARQL. Gender values are `foaf:gender` literals.

use super::{check_ids, GenderRow};
use crate::error::Result;
use crate::sparql::{binding, SparqlClient};

const IDREF_SPARQL_URL: &str = "https://data.idref.fr/sparql";
const IDREF_ID_PREFIX: &str = "http://www.idref.fr/";

const GENDER_CHUNK: usize = 1500;

pub struct IdrefClient {
    sparql: SparqlClient,
}

impl Default for IdrefClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IdrefClient {
    pub fn new() -> Self {
        Self {
            sparql: SparqlClient::new(IDREF_SPARQL_URL),
        }
    }

    /// Preferred label and gender for a batch of IdRef identifiers.
    /// Unknown identifiers are absent from the result.
    pub fn genders(&self, ids: &[&str]) -> Result<Vec<GenderRow>> {
        let ids = check_ids(ids)?;
        let mut rows = Vec::new();
        for chunk in ids.chunks(GENDER_CHUNK) {
            let results = self.sparql.query(&build_gender_query(chunk))?;
            for row in &results.rows {
                rows.push(GenderRow {
                    id: strip_id_uri(binding(row, "idref")),
                    label: binding(row, "label").to_string(),
                    gender: binding(row, "gender").to_string(),
                });
            }
        }
        Ok(rows)
    }
}

fn build_gender_query(ids: &[String]) -> String {
    let values = ids
        .iter()
        .map(|id| format!("<{}{}/id>", IDREF_ID_PREFIX, id))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT DISTINCT ?idref ?label\n\
         (GROUP_CONCAT(DISTINCT ?sex;separator=\"|\") as ?gender)\n\
         WHERE {{\n\
         VALUES ?idref {{ {values} }}\n\
         OPTIONAL {{?idref skos:prefLabel ?label.}}\n\
         OPTIONAL {{?idref foaf:gender ?sex.}}\n\
         }} GROUP BY ?idref ?label"
    )
}

/// "http://www.idref.fr/026927608/id" back to the bare identifier.
fn strip_id_uri(uri: &str) -> String {
    uri.strip_prefix(IDREF_ID_PREFIX)
        .and_then(|rest| rest.strip_suffix("/id"))
        .unwrap_or(uri)
        .to_string()
}
