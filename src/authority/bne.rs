//! Biblioteca Nacional de España: datos.bne.es lookups
//!
//! BNE publishes its authority records as linked data. Single records
//! come back as Turtle; label search and gender batches go through the
//! SPARQL endpoint. Genders are Spanish-language literals.

use super::{check_ids, GenderRow};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::sparql::{binding, SparqlClient};
use lazy_static::lazy_static;
use regex::Regex;

const BNE_SPARQL_URL: &str = "https://datos.bne.es/sparql";
const BNE_PERSON_URL: &str = "https://datos.bne.es/persona";
const BNE_RESOURCE_PREFIX: &str = "https://datos.bne.es/resource/";

/// Entities per gender query; larger batches risk the endpoint's
/// execution timeout.
const GENDER_CHUNK: usize = 1500;

lazy_static! {
    static ref RDA_PREFIX: Regex = Regex::new(
        r"@prefix\s+ns(\d+):\s+<http://www\.rdaregistry\.info/Elements/a/>"
    )
    .expect("valid regex");
}

/// One person row from the label search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BnePersonRow {
    /// BNE identifier ("XX1718747").
    pub id: String,
    pub label: String,
    /// Gender literal in Spanish, "" when absent.
    pub gender: String,
    pub birth_date: String,
    pub death_date: String,
    pub occupations: Vec<String>,
    pub titles: Vec<String>,
}

pub struct BneClient {
    http: HttpClient,
    sparql: SparqlClient,
}

impl Default for BneClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BneClient {
    pub fn new() -> Self {
        Self {
            http: HttpClient::default(),
            sparql: SparqlClient::new(BNE_SPARQL_URL),
        }
    }

    /// The Turtle document of one authority record.
    pub fn record_ttl(&self, bne_id: &str) -> Result<String> {
        let bne_id = bne_id.trim().to_uppercase();
        if bne_id.is_empty() {
            return Err(Error::InvalidInput("Empty BNE id".to_string()));
        }
        let url = format!("{}/{}.ttl", BNE_PERSON_URL, bne_id);
        tracing::debug!("BNE GET {}", url);
        let response = self.http.get(&url)?;
        if response.status == 404 {
            return Err(Error::NotFound(bne_id));
        }
        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url,
            });
        }
        Ok(response.body)
    }

    /// Exact label search for persons. Occupations and work titles are
    /// aggregated per entity.
    pub fn search_by_label(&self, name: &str) -> Result<Vec<BnePersonRow>> {
        let name = name.trim();
        if name.is_empty() || name.contains('"') {
            return Err(Error::InvalidInput(format!("Invalid label: '{}'", name)));
        }
        let results = self.sparql.query(&build_label_query(name))?;
        let rows = results
            .rows
            .iter()
            .map(|row| BnePersonRow {
                id: strip_resource(binding(row, "entity")),
                label: binding(row, "label").to_string(),
                gender: binding(row, "gender").to_string(),
                birth_date: binding(row, "birthdate").to_string(),
                death_date: binding(row, "deathdate").to_string(),
                occupations: split_multi(binding(row, "occupations")),
                titles: split_multi(binding(row, "titles")),
            })
            .collect();
        Ok(rows)
    }

    /// Label and gender for a batch of BNE identifiers. Identifiers the
    /// endpoint does not know are absent from the result.
    pub fn genders(&self, ids: &[&str]) -> Result<Vec<GenderRow>> {
        let ids = check_ids(ids)?;
        let mut rows = Vec::new();
        for chunk in ids.chunks(GENDER_CHUNK) {
            let results = self.sparql.query(&build_gender_query(chunk))?;
            for row in &results.rows {
                rows.push(GenderRow {
                    id: strip_resource(binding(row, "bne")),
                    label: binding(row, "label").to_string(),
                    gender: binding(row, "gender").to_string(),
                });
            }
        }
        Ok(rows)
    }
}

/// Gender from a Turtle record. The rdaregistry prefix gets a
/// different namespace number per document, so it is located first.
pub fn gender_from_ttl(ttl: &str) -> Option<String> {
    let ns = RDA_PREFIX.captures(ttl)?.get(1)?.as_str();
    let gender = Regex::new(&format!(r#"ns{}:P50116\s+"([^"]+)"#, ns)).ok()?;
    Some(gender.captures(ttl)?.get(1)?.as_str().to_string())
}

fn build_label_query(name: &str) -> String {
    format!(
        "prefix ns1: <https://datos.bne.es/resource>\n\
         prefix ns2: <https://datos.bne.es/def/>\n\
         prefix ns4: <http://www.rdaregistry.info/Elements/a/>\n\
         SELECT DISTINCT ?entity ?label ?gender ?birthdate ?deathdate\n\
         (GROUP_CONCAT(DISTINCT ?oc;separator=\"\\n\") as ?occupations)\n\
         (GROUP_CONCAT(DISTINCT ?title;separator=\"\\n\") as ?titles)\n\
         WHERE {{\n\
         ?entity rdfs:label \"{name}\" .\n\
         ?entity rdf:type ns2:C1005 .\n\
         OPTIONAL {{?entity ns2:P5001 ?label}}\n\
         OPTIONAL {{?entity ns4:P50116 ?gender}}\n\
         OPTIONAL {{?entity ns2:P5010 ?birthdate}}\n\
         OPTIONAL {{?entity ns2:P5011 ?deathdate}}\n\
         OPTIONAL {{?entity ns4:P50104 ?oc}}\n\
         OPTIONAL {{?work ns2:OP3006|ns2:OP1001|ns2:OP3003 ?entity.\n\
         ?work ns2:P3002|ns2:P1001 ?title.}}\n\
         }} GROUP BY ?entity ?label ?gender ?birthdate ?deathdate"
    )
}

fn build_gender_query(ids: &[String]) -> String {
    let values = ids
        .iter()
        .map(|id| format!("ns1:{}", id))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "prefix ns1: <https://datos.bne.es/resource/>\n\
         prefix ns4: <http://www.rdaregistry.info/Elements/a/>\n\
         SELECT DISTINCT ?bne ?label\n\
         (GROUP_CONCAT(DISTINCT ?sex;separator=\"|\") as ?gender)\n\
         WHERE {{\n\
         VALUES ?bne {{ {values} }}\n\
         OPTIONAL {{?bne rdfs:label ?label.}}\n\
         OPTIONAL {{?bne ns4:P50116 ?sex.}}\n\
         }} GROUP BY ?bne ?label"
    )
}

fn strip_resource(uri: &str) -> String {
    uri.strip_prefix(BNE_RESOURCE_PREFIX)
        .unwrap_or(uri)
        .to_string()
}

fn split_multi(value: &str) -> Vec<String> {
    value
        .split('\n')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
