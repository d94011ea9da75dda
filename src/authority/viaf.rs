//! VIAF lookup: AutoSuggest, SRU search and cluster record fetch
//!
//! VIAF merges national authority files into clusters. AutoSuggest is
//! the cheap name lookup; the SRU endpoint takes CQL and pages through
//! full cluster records; `record` fetches one cluster by id and follows
//! merge redirects.

use super::viaf_record::ViafRecord;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::text::fold_accents;
use serde_json::Value;
use std::collections::BTreeMap;

const AUTOSUGGEST_URL: &str = "https://www.viaf.org/viaf/AutoSuggest";
const SEARCH_URL: &str = "https://www.viaf.org/viaf/search";
const VIAF_URL: &str = "https://viaf.org/viaf";
const PROCESSED_URL: &str = "https://viaf.org/processed";

/// SRU page size; also the server-side maximum per request.
pub const VIAF_LIMIT: usize = 250;

/// How much of each cluster the SRU search returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSchema {
    /// Full cluster records.
    Cluster,
    /// Brief records: headings and source links only.
    Brief,
}

impl RecordSchema {
    fn as_str(self) -> &'static str {
        match self {
            RecordSchema::Cluster => "info:srw/schema/1/JSON",
            RecordSchema::Brief => "http://viaf.org/BriefVIAFCluster",
        }
    }
}

/// Term matching for the name search builders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// All words must match, in any order.
    AllWords,
    /// Any word may match.
    AnyWord,
    /// The heading must match exactly.
    Exact,
}

impl MatchMode {
    fn operator(self) -> &'static str {
        match self {
            MatchMode::AllWords => "all",
            MatchMode::AnyWord => "any",
            MatchMode::Exact => "exact",
        }
    }
}

/// Which heading index a personal-name search runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameIndex {
    /// Established main headings.
    MainHeading,
    /// Main and alternate name forms.
    Names,
    /// Personal names only.
    PersonalNames,
}

impl NameIndex {
    fn as_str(self) -> &'static str {
        match self {
            NameIndex::MainHeading => "local.mainHeadingEl",
            NameIndex::Names => "local.names",
            NameIndex::PersonalNames => "local.personalNames",
        }
    }
}

/// One AutoSuggest match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutosuggestHit {
    pub term: String,
    pub viaf_id: String,
    /// "personal", "corporate", "uniformtitlework", ...
    pub name_type: String,
    /// Per-library local identifiers keyed by source code ("lc", "bne", ...).
    pub source_ids: BTreeMap<String, String>,
}

pub struct ViafClient {
    http: HttpClient,
}

impl Default for ViafClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ViafClient {
    pub fn new() -> Self {
        Self {
            http: HttpClient::default(),
        }
    }

    /// Name suggestions. The query is accent-folded first, AutoSuggest
    /// matches poorly on diacritics.
    pub fn autosuggest(&self, name: &str) -> Result<Vec<AutosuggestHit>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Empty search term".to_string()));
        }
        let query = fold_accents(name, "");
        tracing::debug!("VIAF AutoSuggest '{}'", query);
        let j = self.get_json(AUTOSUGGEST_URL, &[("query", query.as_str())])?;
        let hits = j
            .get("result")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(autosuggest_hit).collect())
            .unwrap_or_default();
        Ok(hits)
    }

    /// AutoSuggest matches with nametype "personal".
    pub fn autosuggest_personal(&self, name: &str) -> Result<Vec<AutosuggestHit>> {
        let mut hits = self.autosuggest(name)?;
        hits.retain(|h| h.name_type == "personal");
        Ok(hits)
    }

    /// Run a CQL query against the SRU endpoint, paging from the
    /// 1-based `start` record until `nmax` records or the result set is
    /// exhausted. Records come back in server rank order.
    pub fn search(
        &self,
        cql: &str,
        schema: RecordSchema,
        start: usize,
        nmax: usize,
    ) -> Result<Vec<ViafRecord>> {
        let cql = cql.trim();
        if cql.is_empty() {
            return Err(Error::InvalidInput("Empty CQL query".to_string()));
        }
        if nmax == 0 {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let mut start = start.max(1);
        loop {
            let page = VIAF_LIMIT.min(nmax - records.len());
            let start_str = start.to_string();
            let page_str = page.to_string();
            let j = self.get_json(
                SEARCH_URL,
                &[
                    ("query", cql),
                    ("httpAccept", "application/json"),
                    ("recordSchema", schema.as_str()),
                    ("startRecord", &start_str),
                    ("maximumRecords", &page_str),
                ],
            )?;
            let response = j
                .get("searchRetrieveResponse")
                .ok_or_else(|| Error::Parse("Not an SRU response".to_string()))?;
            let total = response
                .get("numberOfRecords")
                .map(number_of_records)
                .unwrap_or(0);
            if let Some(page_records) = response.get("records").and_then(Value::as_array) {
                for wrapper in page_records {
                    if let Some(data) = wrapper.pointer("/record/recordData") {
                        records.push(ViafRecord::from_value(data.clone()));
                    }
                }
            }
            start += page;
            if records.len() >= nmax || start > total {
                break;
            }
        }
        records.truncate(nmax);
        tracing::debug!("VIAF search returned {} records", records.len());
        Ok(records)
    }

    /// Search every indexed field for `text`.
    pub fn search_any_field(&self, text: &str, nmax: usize) -> Result<Vec<ViafRecord>> {
        self.search(&cql("cql.any", "=", text), RecordSchema::Cluster, 1, nmax)
    }

    /// Search personal-name headings.
    pub fn search_personal_name(
        &self,
        name: &str,
        index: NameIndex,
        mode: MatchMode,
        nmax: usize,
    ) -> Result<Vec<ViafRecord>> {
        self.search(
            &cql(index.as_str(), mode.operator(), name),
            RecordSchema::Cluster,
            1,
            nmax,
        )
    }

    /// Search work titles.
    pub fn search_title(&self, title: &str, nmax: usize) -> Result<Vec<ViafRecord>> {
        self.search(&cql("local.title", "all", title), RecordSchema::Cluster, 1, nmax)
    }

    /// Fetch one cluster record. Merged clusters redirect; the redirect
    /// chain is followed and reported in the result.
    pub fn record(&self, viaf_id: &str) -> Result<RecordFetch> {
        let mut id = check_viaf_id(viaf_id)?;
        let mut redirected = None;
        // A merge chain longer than a few hops means loop, bail out
        for _ in 0..5 {
            let url = format!("{}/{}/viaf.json", VIAF_URL, id);
            tracing::debug!("VIAF GET {}", url);
            let j = self.get_json(&url, &[])?;
            if let Some(target) = j.pointer("/redirect/directto").and_then(Value::as_str) {
                id = check_viaf_id(target)?;
                redirected = Some(id.clone());
                continue;
            }
            if let Some(cluster) = j.pointer("/scavenged/VIAFCluster") {
                return Ok(RecordFetch::Scavenged(ViafRecord::from_value(
                    cluster.clone(),
                )));
            }
            let record = ViafRecord::from_value(j);
            return Ok(match redirected {
                Some(to) => RecordFetch::Redirected { to, record },
                None => RecordFetch::Original(record),
            });
        }
        Err(Error::Parse(format!("Redirect loop for VIAF {}", viaf_id)))
    }

    /// The MARC21 record VIAF holds for one source file entry, as raw
    /// XML. `source` is the VIAF source code ("LC", "BNE", ...).
    pub fn processed_record(&self, source: &str, local_id: &str) -> Result<String> {
        let source = source.trim().to_uppercase();
        let local_id = local_id.trim();
        if source.is_empty() || local_id.is_empty() {
            return Err(Error::InvalidInput("Empty source or identifier".to_string()));
        }
        let url = format!(
            "{}/{}",
            PROCESSED_URL,
            urlencoding::encode(&format!("{}|{}", source, local_id))
        );
        tracing::debug!("VIAF GET {}", url);
        let response = self
            .http
            .get_with_accept(&url, &[], "application/marc21+xml")?;
        if response.status == 404 {
            return Err(Error::NotFound(format!("{}|{}", source, local_id)));
        }
        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url,
            });
        }
        Ok(response.body)
    }

    fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        let response = self.http.get_with_params(url, params)?;
        if response.status == 404 {
            return Err(Error::NotFound(url.to_string()));
        }
        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url: url.to_string(),
            });
        }
        serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("Invalid VIAF response: {}", e)))
    }
}

/// Outcome of a cluster fetch.
#[derive(Clone, Debug)]
pub enum RecordFetch {
    /// The id resolves to a live cluster.
    Original(ViafRecord),
    /// The id was merged away; `record` is the target cluster.
    Redirected { to: String, record: ViafRecord },
    /// The cluster was dissolved; only scavenged remains are kept.
    Scavenged(ViafRecord),
}

impl RecordFetch {
    pub fn record(&self) -> &ViafRecord {
        match self {
            RecordFetch::Original(r) => r,
            RecordFetch::Redirected { record, .. } => record,
            RecordFetch::Scavenged(r) => r,
        }
    }
}

/// Build `index operator "term"`. Double quotes in the term would end
/// the literal, they become apostrophes.
fn cql(index: &str, operator: &str, term: &str) -> String {
    format!("{} {} \"{}\"", index, operator, term.trim().replace('"', "'"))
}

fn check_viaf_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!("Invalid VIAF id: '{}'", id)));
    }
    Ok(id.to_string())
}

fn autosuggest_hit(result: &Value) -> AutosuggestHit {
    let text = |key: &str| {
        result
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let mut source_ids = BTreeMap::new();
    if let Some(map) = result.as_object() {
        for (key, value) in map {
            // Everything besides the fixed fields is a source-code key
            if matches!(
                key.as_str(),
                "term" | "displayForm" | "nametype" | "viafid" | "recordID" | "score"
            ) {
                continue;
            }
            if let Some(id) = value.as_str() {
                source_ids.insert(key.clone(), id.to_string());
            }
        }
    }
    AutosuggestHit {
        term: text("term"),
        viaf_id: text("viafid"),
        name_type: text("nametype"),
        source_ids,
    }
}

/// SRU serializes numberOfRecords as a number or a string depending on
/// the schema.
fn number_of_records(v: &Value) -> usize {
    match v {
        Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
