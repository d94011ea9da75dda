//! Accessors over a VIAF cluster record
//!
//! Cluster JSON is converted from MARC-ish XML, so nearly every field
//! is "one object or an array of objects" and leaf values sometimes
//! hide behind `#text`. The accessors absorb both shapes and apply
//! NFKC normalization to names, titles and occupations.

use crate::text::nfkc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

lazy_static! {
    static ref WIKIPEDIA_URL: Regex =
        Regex::new(r"^https?://[^.]+\.wikipedia\.org").expect("valid regex");
}

/// Source files that count for [`occupations`](ViafRecord::occupations);
/// the rest duplicate or contradict them.
const OCCUPATION_SOURCES: [&str; 3] = ["JPG", "LC", "BNE"];

/// One VIAF cluster record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViafRecord(Value);

impl ViafRecord {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The cluster id. Brief records wrap it in `#text`.
    pub fn viaf_id(&self) -> Option<String> {
        self.0.get("viafID").and_then(leaf_text)
    }

    pub fn name_type(&self) -> Option<String> {
        self.0.get("nameType").and_then(leaf_text)
    }

    pub fn is_personal(&self) -> bool {
        self.name_type().as_deref() == Some("Personal")
    }

    /// Titles of the works attached to the cluster.
    pub fn titles(&self) -> Vec<String> {
        let mut titles = Vec::new();
        for work in one_or_many(self.0.pointer("/titles/work")) {
            for title in one_or_many(work.get("title")) {
                if let Some(t) = leaf_text(title) {
                    titles.push(nfkc(&t));
                }
            }
        }
        titles
    }

    /// "female", "male", or the raw code when VIAF reports something
    /// else ("u" for undetermined). None when the record has no gender.
    pub fn gender(&self) -> Option<String> {
        let code = self.0.pointer("/fixed/gender").and_then(leaf_text)?;
        Some(match code.as_str() {
            "a" => "female".to_string(),
            "b" => "male".to_string(),
            other => other.to_string(),
        })
    }

    /// Birth and death years. VIAF stores "0" for unknown dates.
    pub fn dates(&self) -> (Option<String>, Option<String>) {
        let year = |key: &str| {
            let date = self.0.get(key).and_then(leaf_text)?;
            let year: String = date.chars().take(4).collect();
            if year.is_empty() || year == "0" {
                None
            } else {
                Some(year)
            }
        };
        (year("birthDate"), year("deathDate"))
    }

    /// Occupations reported by the well-curated source files.
    pub fn occupations(&self) -> Vec<String> {
        let mut occs = Vec::new();
        for entry in one_or_many(self.0.pointer("/occupation/data")) {
            let Some(text) = entry.get("text").and_then(leaf_text) else {
                continue;
            };
            let curated = one_or_many(entry.pointer("/sources/s"))
                .iter()
                .filter_map(|s| leaf_text(s))
                .any(|s| OCCUPATION_SOURCES.contains(&s.as_str()));
            if curated {
                occs.push(nfkc(&text));
            }
        }
        occs
    }

    /// Established headings with the per-library identifiers backing
    /// each one: heading text to {library: local id}.
    pub fn sources(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut texts = BTreeMap::new();
        for entry in one_or_many(self.0.pointer("/mainHeadings/data")) {
            let Some(text) = entry.get("text").and_then(leaf_text) else {
                continue;
            };
            texts.insert(nfkc(&text), split_sids(entry.pointer("/sources/sid")));
        }
        texts
    }

    /// The heading and local identifier one library contributed, if it
    /// is among the cluster's sources. `library` is the VIAF source
    /// code ("LC", "BNE", "WKP", ...).
    pub fn source_id(&self, library: &str) -> Option<(String, String)> {
        for (text, idents) in self.sources() {
            if let Some(id) = idents.get(library) {
                return Some((text, id.clone()));
            }
        }
        None
    }

    /// Alternate name forms (MARC 400 fields) with their sources.
    pub fn alternate_names(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.x_names("x400s", "x400")
    }

    /// Related names (MARC 500 fields) with their sources.
    pub fn related_names(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.x_names("x500s", "x500")
    }

    fn x_names(&self, outer: &str, inner: &str) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut texts = BTreeMap::new();
        for entry in one_or_many(self.0.pointer(&format!("/{}/{}", outer, inner))) {
            let Some(text) = entry.pointer("/datafield/normalized").and_then(leaf_text) else {
                continue;
            };
            texts.insert(nfkc(&text), split_sids(entry.pointer("/sources/sid")));
        }
        texts
    }

    /// Co-authors and the number of shared works.
    pub fn coauthors(&self) -> BTreeMap<String, u64> {
        let mut coauthors = BTreeMap::new();
        for entry in one_or_many(self.0.pointer("/coauthors/data")) {
            let Some(name) = entry.get("text").and_then(leaf_text) else {
                continue;
            };
            let count = match entry.get("@count") {
                Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
                Some(Value::String(s)) => s.parse().unwrap_or(0),
                _ => 0,
            };
            coauthors.insert(nfkc(&name), count);
        }
        coauthors
    }

    /// Wikipedia article URLs among the cluster's external links.
    pub fn wikipedia_links(&self) -> Vec<String> {
        one_or_many(self.0.pointer("/xLinks/xLink"))
            .iter()
            .filter_map(|l| leaf_text(l))
            .filter(|url| WIKIPEDIA_URL.is_match(url))
            .collect()
    }

    /// Everything of interest from the cluster in one struct.
    pub fn summary(&self) -> ViafSummary {
        let (birth_year, death_year) = self.dates();
        ViafSummary {
            viaf_id: self.viaf_id().unwrap_or_default(),
            gender: self.gender(),
            birth_year,
            death_year,
            sources: self.sources(),
            alternate_names: self.alternate_names(),
            titles: self.titles(),
            occupations: self.occupations(),
            coauthors: self.coauthors(),
            wikipedias: self.wikipedia_links(),
        }
    }
}

/// Digest of a cluster record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViafSummary {
    pub viaf_id: String,
    pub gender: Option<String>,
    pub birth_year: Option<String>,
    pub death_year: Option<String>,
    pub sources: BTreeMap<String, BTreeMap<String, String>>,
    pub alternate_names: BTreeMap<String, BTreeMap<String, String>>,
    pub titles: Vec<String>,
    pub occupations: Vec<String>,
    pub coauthors: BTreeMap<String, u64>,
    pub wikipedias: Vec<String>,
}

/// Treat a field as a list whether it holds one element or many.
fn one_or_many(v: Option<&Value>) -> Vec<&Value> {
    match v {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

/// A leaf is either a bare string or `{"#text": "...", "@attr": ...}`.
fn leaf_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("#text").and_then(Value::as_str).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// "LC|n79017494" entries to {library: id}.
fn split_sids(sids: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for sid in one_or_many(sids) {
        if let Some(sid) = leaf_text(sid) {
            if let Some((library, id)) = sid.split_once('|') {
                out.insert(library.to_string(), id.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> ViafRecord {
        ViafRecord::from_value(json!({
            "viafID": "17220427",
            "nameType": {"#text": "Personal"},
            "fixed": {"gender": "b"},
            "birthDate": "1547-09-29",
            "deathDate": "0",
            "mainHeadings": {
                "data": [
                    {
                        "text": "Cervantes Saavedra, Miguel de, 1547-1616",
                        "sources": {"sid": ["LC|n79017494", "BNE|XX1718747"]}
                    },
                    {
                        "text": "Miguel de Cervantes",
                        "sources": {"sid": "WKP|Q5682"}
                    }
                ]
            },
            "titles": {
                "work": [
                    {"title": "Don Quixote"},
                    {"title": ["Novelas ejemplares", "La Galatea"]}
                ]
            },
            "occupation": {
                "data": [
                    {"text": "Novelist", "sources": {"s": ["LC", "NTA"]}},
                    {"text": "Soldier", "sources": {"s": "NTA"}}
                ]
            },
            "x400s": {
                "x400": {
                    "datafield": {"normalized": "saavedra, miguel de cervantes"},
                    "sources": {"sid": "LC|n79017494"}
                }
            },
            "coauthors": {
                "data": {"text": "Avellaneda, Alonso Fernández de", "@count": "3"}
            },
            "xLinks": {
                "xLink": [
                    {"#text": "https://es.wikipedia.org/wiki/Miguel_de_Cervantes"},
                    {"#text": "https://www.worldcat.org/identities/lccn-n79017494"}
                ]
            }
        }))
    }

    #[test]
    fn test_identity_and_type() {
        let r = record();
        assert_eq!(r.viaf_id().unwrap(), "17220427");
        assert!(r.is_personal());
        assert!(!ViafRecord::from_value(json!({"nameType": "Corporate"})).is_personal());
    }

    #[test]
    fn test_gender_and_dates() {
        let r = record();
        assert_eq!(r.gender().unwrap(), "male");
        // "0" death date means unknown
        assert_eq!(r.dates(), (Some("1547".to_string()), None));
        let empty = ViafRecord::from_value(json!({}));
        assert_eq!(empty.gender(), None);
        assert_eq!(empty.dates(), (None, None));
    }

    #[test]
    fn test_titles_flatten_nested_lists() {
        assert_eq!(
            record().titles(),
            vec!["Don Quixote", "Novelas ejemplares", "La Galatea"]
        );
    }

    #[test]
    fn test_occupations_filter_by_source() {
        // Soldier only comes from NTA, which is not a curated source
        assert_eq!(record().occupations(), vec!["Novelist"]);
    }

    #[test]
    fn test_sources_and_source_id() {
        let r = record();
        let sources = r.sources();
        let heading = &sources["Cervantes Saavedra, Miguel de, 1547-1616"];
        assert_eq!(heading["LC"], "n79017494");
        assert_eq!(heading["BNE"], "XX1718747");
        assert_eq!(
            r.source_id("WKP").unwrap(),
            ("Miguel de Cervantes".to_string(), "Q5682".to_string())
        );
        assert_eq!(r.source_id("DNB"), None);
    }

    #[test]
    fn test_alternate_names_single_entry() {
        let names = record().alternate_names();
        assert_eq!(names["saavedra, miguel de cervantes"]["LC"], "n79017494");
        assert!(record().related_names().is_empty());
    }

    #[test]
    fn test_coauthors_count_parses_strings() {
        let coauthors = record().coauthors();
        assert_eq!(coauthors["Avellaneda, Alonso Fernández de"], 3);
    }

    #[test]
    fn test_wikipedia_links_filter() {
        assert_eq!(
            record().wikipedia_links(),
            vec!["https://es.wikipedia.org/wiki/Miguel_de_Cervantes"]
        );
    }

    #[test]
    fn test_summary() {
        let s = record().summary();
        assert_eq!(s.viaf_id, "17220427");
        assert_eq!(s.birth_year.as_deref(), Some("1547"));
        assert_eq!(s.titles.len(), 3);
        assert_eq!(s.wikipedias.len(), 1);
    }
}
