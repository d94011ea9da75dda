//! SPARQL endpoint client and result-set parsing
//!
//! Shared by the Wikidata Query Service client and the BNE, IdRef and
//! Getty authority endpoints. Result documents are flattened to rows of
//! variable/value strings; RDF term typing is not preserved.

use crate::error::{Error, Result};
use crate::http::HttpClient;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Transfer format negotiated with the endpoint via the Accept header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultFormat {
    Json,
    Xml,
    Csv,
}

impl ResultFormat {
    pub fn accept(self) -> &'static str {
        match self {
            ResultFormat::Json => "application/sparql-results+json",
            ResultFormat::Xml => "application/sparql-results+xml",
            ResultFormat::Csv => "text/csv",
        }
    }

    fn token(self) -> &'static str {
        match self {
            ResultFormat::Json => "json",
            ResultFormat::Xml => "xml",
            ResultFormat::Csv => "csv",
        }
    }
}

/// One result row: variable name to bound value. Unbound variables are
/// absent from the map.
pub type Row = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SparqlResults {
    pub vars: Vec<String>,
    pub rows: Vec<Row>,
}

/// The value bound to `var` in `row`, or "" when unbound.
pub fn binding<'a>(row: &'a Row, var: &str) -> &'a str {
    row.get(var).map(String::as_str).unwrap_or("")
}

#[derive(Debug, Deserialize)]
struct JsonResults {
    head: JsonHead,
    results: JsonBindingSet,
}

#[derive(Debug, Deserialize)]
struct JsonHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JsonBindingSet {
    bindings: Vec<BTreeMap<String, JsonTerm>>,
}

#[derive(Debug, Deserialize)]
struct JsonTerm {
    value: String,
}

/// Parse an `application/sparql-results+json` document.
pub fn parse_json(body: &str) -> Result<SparqlResults> {
    let parsed: JsonResults = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("Invalid SPARQL JSON: {}", e)))?;

    let rows = parsed
        .results
        .bindings
        .into_iter()
        .map(|b| b.into_iter().map(|(var, term)| (var, term.value)).collect())
        .collect();

    Ok(SparqlResults {
        vars: parsed.head.vars,
        rows,
    })
}

/// Parse an `application/sparql-results+xml` document.
pub fn parse_xml(body: &str) -> Result<SparqlResults> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut results = SparqlResults::default();
    let mut buf = Vec::new();

    let mut saw_root = false;
    let mut row = Row::new();
    let mut var: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                match String::from_utf8_lossy(e.local_name().as_ref()).as_ref() {
                    "sparql" => saw_root = true,
                    "variable" => {
                        if let Some(name) = attribute(e, b"name") {
                            results.vars.push(name);
                        }
                    }
                    "result" => row.clear(),
                    "binding" => {
                        var = attribute(e, b"name");
                        value.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                match String::from_utf8_lossy(e.local_name().as_ref()).as_ref() {
                    "variable" => {
                        if let Some(name) = attribute(e, b"name") {
                            results.vars.push(name);
                        }
                    }
                    "result" => results.rows.push(Row::new()),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                match String::from_utf8_lossy(e.local_name().as_ref()).as_ref() {
                    "result" => results.rows.push(std::mem::take(&mut row)),
                    "binding" => {
                        if let Some(v) = var.take() {
                            row.insert(v, std::mem::take(&mut value));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if var.is_some() {
                    value.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(Error::Parse("Not a SPARQL result document".to_string()));
    }
    Ok(results)
}

fn attribute(e: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Queries longer than this are sent as form POSTs; endpoints cap the
/// request line well below the sizes VALUES-heavy queries reach.
const POST_THRESHOLD: usize = 2000;

pub struct SparqlClient {
    http: HttpClient,
    endpoint: String,
}

impl SparqlClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: HttpClient::default(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn with_user_agent(endpoint: &str, user_agent: &str) -> Self {
        Self {
            http: HttpClient::new(user_agent),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a query and parse the JSON result set.
    pub fn query(&self, sparql: &str) -> Result<SparqlResults> {
        let body = self.request(sparql, ResultFormat::Json)?;
        parse_json(&body)
    }

    /// Run a query requesting and parsing the XML result set.
    pub fn query_xml(&self, sparql: &str) -> Result<SparqlResults> {
        let body = self.request(sparql, ResultFormat::Xml)?;
        parse_xml(&body)
    }

    /// Run a query and return the response body verbatim.
    pub fn query_raw(&self, sparql: &str, format: ResultFormat) -> Result<String> {
        self.request(sparql, format)
    }

    fn request(&self, sparql: &str, format: ResultFormat) -> Result<String> {
        tracing::debug!(
            "SPARQL query ({} bytes) against {}",
            sparql.len(),
            self.endpoint
        );
        let params = [("query", sparql)];
        let response = if sparql.len() > POST_THRESHOLD {
            self.http
                .post_form_with_accept(&self.endpoint, &params, format.accept())?
        } else {
            self.http
                .get_with_accept(&self.endpoint, &params, format.accept())?
        };

        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url: self.endpoint.clone(),
            });
        }

        let content_type = response
            .headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("");
        if !content_type.contains(format.token()) {
            return Err(Error::Parse(format!(
                "Unexpected content type '{}' for {} results",
                content_type,
                format.token()
            )));
        }

        Ok(response.body)
    }
}
