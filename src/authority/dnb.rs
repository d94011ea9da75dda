//! DNB gender lookup via the Culturegraph entity-facts service
//!
//! Culturegraph republishes Deutsche Nationalbibliothek authority
//! records as JSON-LD. Gender is an entity URI; the fragment after `#`
//! is the English term.

use crate::error::{Error, Result};
use crate::http::HttpClient;
use serde_json::Value;

const ENTITY_FACTS_URL: &str = "https://hub.culturegraph.org/entityfacts";

pub struct DnbClient {
    http: HttpClient,
}

impl Default for DnbClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DnbClient {
    pub fn new() -> Self {
        Self {
            http: HttpClient::default(),
        }
    }

    /// The full entity-facts document for one DNB (GND) identifier.
    pub fn entity_facts(&self, dnb_id: &str) -> Result<Value> {
        let dnb_id = dnb_id.trim();
        if dnb_id.is_empty() {
            return Err(Error::InvalidInput("Empty DNB id".to_string()));
        }
        let url = format!("{}/{}", ENTITY_FACTS_URL, urlencoding::encode(dnb_id));
        tracing::debug!("DNB GET {}", url);
        let response = self.http.get(&url)?;
        if response.status == 404 {
            return Err(Error::NotFound(dnb_id.to_string()));
        }
        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url,
            });
        }
        serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("Invalid entity-facts response: {}", e)))
    }

    /// Gender of one record ("male", "female", ...), None when the
    /// record carries none.
    pub fn gender(&self, dnb_id: &str) -> Result<Option<String>> {
        let facts = self.entity_facts(dnb_id)?;
        Ok(gender_from_facts(&facts))
    }
}

fn gender_from_facts(facts: &Value) -> Option<String> {
    let uri = facts.pointer("/gender/@id").and_then(Value::as_str)?;
    let term = uri.rsplit('#').next().unwrap_or(uri);
    if term.is_empty() {
        None
    } else {
        Some(term.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gender_from_facts() {
        let facts = json!({
            "@id": "https://d-nb.info/gnd/118519859",
            "preferredName": "Miguel de Cervantes Saavedra",
            "gender": {
                "@id": "https://d-nb.info/standards/vocab/gnd/gender#male",
                "label": "Männlich"
            }
        });
        assert_eq!(gender_from_facts(&facts).unwrap(), "male");
    }

    #[test]
    fn test_gender_absent() {
        assert_eq!(gender_from_facts(&json!({"@id": "x"})), None);
        assert_eq!(gender_from_facts(&json!({"gender": {"@id": "no-fragment#"}})), None);
    }

    #[test]
    fn test_empty_id_rejected() {
        let client = DnbClient::new();
        assert!(matches!(
            client.entity_facts("  "),
            Err(Error::InvalidInput(_))
        ));
    }
}
