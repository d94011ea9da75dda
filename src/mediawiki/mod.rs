//! MediaWiki Action API client
//!
//! One client per wiki project. Responses are requested with
//! `formatversion=2`, so pages arrive as an array and the query part
//! carries `normalized` and `redirects` arrays that map each requested
//! title to the title the response actually lists.
//!
//! API-level errors are turned into [`Error::Api`], except the
//! authentication codes which become [`Error::Auth`] and `ratelimited`
//! which becomes [`Error::RateLimited`].

pub mod pages;
pub mod search;
pub mod write;

pub use pages::*;
pub use search::*;
pub use write::*;

use crate::error::{Error, Result};
use crate::http::HttpClient;
use serde_json::Value;

/// The Action API accepts at most this many titles per request.
pub const MW_LIMIT: usize = 50;

/// Characters MediaWiki forbids in page titles. Underscore is allowed,
/// it is the canonical space.
const FORBIDDEN_TITLE_CHARS: &str = "#<>[]|{}";

const AUTH_ERROR_CODES: [&str; 4] = [
    "badtoken",
    "notloggedin",
    "assertuserfailed",
    "permissiondenied",
];

/// Page-level status of an Action API response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    /// The title contains characters the project rejects.
    Invalid,
    /// No page with this title exists.
    Missing,
    /// The page carries no properties at all.
    NoPageProps,
    /// The page exists but is not connected to a Wikidata entity.
    NoWikibaseItem,
    Disambiguation,
    /// The response lists the page without a page id.
    NoPageId,
    /// The file exists but its description is hidden.
    FileHidden,
}

pub struct ActionApiClient {
    http: HttpClient,
    api_url: String,
    project: String,
}

impl ActionApiClient {
    /// Client for one project, e.g. "en.wikipedia.org".
    pub fn new(project: &str) -> Self {
        let project = project.trim().to_string();
        Self {
            http: HttpClient::default(),
            api_url: format!("https://{}/w/api.php", project),
            project,
        }
    }

    /// Client for www.wikidata.org, where `wbgetentities` lives.
    pub fn wikidata() -> Self {
        Self::new("www.wikidata.org")
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub(crate) fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let response = self.http.get_with_params(&self.api_url, params)?;
        self.decode(response.status, &response.body)
    }

    pub(crate) fn post(&self, params: &[(&str, &str)]) -> Result<Value> {
        let response = self.http.post_form(&self.api_url, params)?;
        self.decode(response.status, &response.body)
    }

    fn decode(&self, status: u16, body: &str) -> Result<Value> {
        if !(200..300).contains(&status) {
            return Err(Error::Status {
                status,
                url: self.api_url.clone(),
            });
        }
        let j: Value = serde_json::from_str(body)
            .map_err(|e| Error::Parse(format!("Invalid API response: {}", e)))?;
        if let Some(warnings) = j.get("warnings") {
            tracing::warn!("API warnings from {}: {}", self.project, warnings);
        }
        if let Some(error) = j.get("error") {
            let code = error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let info = error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if code == "ratelimited" {
                return Err(Error::RateLimited { retry_after: None });
            }
            if AUTH_ERROR_CODES.contains(&code.as_str()) {
                return Err(Error::Auth(format!("{}: {}", code, info)));
            }
            return Err(Error::Api { code, info });
        }
        Ok(j)
    }
}

/// Validate titles: trim, drop blanks, reject forbidden characters and
/// remove duplicates preserving order.
pub(crate) fn check_titles(titles: &[&str]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in titles {
        let title = raw.trim();
        if title.is_empty() {
            continue;
        }
        if let Some(c) = title.chars().find(|c| FORBIDDEN_TITLE_CHARS.contains(*c)) {
            return Err(Error::InvalidInput(format!(
                "Page title '{}' has forbidden character '{}'",
                title, c
            )));
        }
        if seen.insert(title.to_string()) {
            out.push(title.to_string());
        }
    }
    if out.is_empty() {
        return Err(Error::InvalidInput("Empty title list".to_string()));
    }
    Ok(out)
}

/// Parameters of a `continue` block, with numeric values stringified.
pub(crate) fn continuation(j: &Value) -> Option<Vec<(String, String)>> {
    j.get("continue")?.as_object().map(|block| {
        block
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()
    })
}

/// Normalized and redirect-resolved forms of one requested title.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedTitle {
    pub normalized: Option<String>,
    pub target: Option<String>,
}

impl ResolvedTitle {
    /// Title under which the response lists the page.
    pub fn final_title<'a>(&'a self, title: &'a str) -> &'a str {
        self.target
            .as_deref()
            .or(self.normalized.as_deref())
            .unwrap_or(title)
    }
}

/// Map a requested title through the `normalized` and `redirects`
/// arrays of the query part of a response. Unicode normalization may
/// report the requested title percent-encoded, which `fromencoded`
/// flags.
pub(crate) fn resolve_title(title: &str, query: &Value) -> ResolvedTitle {
    let mut resolved = title.to_string();
    if let Some(normalized) = query.get("normalized").and_then(Value::as_array) {
        for entry in normalized {
            let from = entry.get("from").and_then(Value::as_str).unwrap_or_default();
            let to = entry.get("to").and_then(Value::as_str).unwrap_or_default();
            let encoded = entry
                .get("fromencoded")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if encoded && urlencoding::encode(&resolved) == from {
                resolved = to.to_string();
            }
            if from == resolved {
                resolved = to.to_string();
                break;
            }
        }
    }
    let normalized = if resolved == title {
        None
    } else {
        Some(resolved.clone())
    };
    let mut target = None;
    if let Some(redirects) = query.get("redirects").and_then(Value::as_array) {
        for entry in redirects {
            if entry.get("from").and_then(Value::as_str) == Some(resolved.as_str()) {
                target = entry.get("to").and_then(Value::as_str).map(str::to_string);
                break;
            }
        }
    }
    ResolvedTitle { normalized, target }
}

/// The page entry of the response that carries this title.
pub(crate) fn page_for<'a>(query: &'a Value, title: &str) -> Option<&'a Value> {
    query
        .get("pages")?
        .as_array()?
        .iter()
        .find(|p| p.get("title").and_then(Value::as_str) == Some(title))
}

/// Status from the page-existence markers alone.
pub(crate) fn base_status(page: &Value) -> PageStatus {
    if page.get("invalid").is_some() {
        PageStatus::Invalid
    } else if page.get("missing").is_some() {
        PageStatus::Missing
    } else if page.get("pageid").is_none() {
        PageStatus::NoPageId
    } else {
        PageStatus::Ok
    }
}

/// Status and Wikidata entity from a `pageprops` page entry. The entity
/// is present for regular and disambiguation pages alike.
pub(crate) fn pageprops_status(page: &Value) -> (PageStatus, Option<String>) {
    if page.get("invalid").is_some() {
        return (PageStatus::Invalid, None);
    }
    if page.get("missing").is_some() {
        return (PageStatus::Missing, None);
    }
    let props = match page.get("pageprops") {
        Some(p) => p,
        None => return (PageStatus::NoPageProps, None),
    };
    match props.get("wikibase_item").and_then(Value::as_str) {
        Some(entity) => {
            let status = if props.get("disambiguation").is_some() {
                PageStatus::Disambiguation
            } else {
                PageStatus::Ok
            };
            (status, Some(entity.to_string()))
        }
        None => (PageStatus::NoWikibaseItem, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_titles() {
        let titles = check_titles(&["Max Planck", " Max Planck ", "Humanist"]).unwrap();
        assert_eq!(titles, vec!["Max Planck", "Humanist"]);
    }

    #[test]
    fn test_check_titles_forbidden() {
        assert!(check_titles(&["Max|Planck"]).is_err());
        assert!(check_titles(&["a#b"]).is_err());
        assert!(check_titles(&["[[Max]]"]).is_err());
        assert!(check_titles(&["", "  "]).is_err());
        // Underscore is a valid title character
        assert!(check_titles(&["Max_Planck"]).is_ok());
    }

    #[test]
    fn test_resolve_title() {
        let query = json!({
            "normalized": [{"from": "humanist", "to": "Humanist"}],
            "redirects": [{"from": "Humanist", "to": "Humanism"}]
        });
        let r = resolve_title("humanist", &query);
        assert_eq!(r.normalized.as_deref(), Some("Humanist"));
        assert_eq!(r.target.as_deref(), Some("Humanism"));
        assert_eq!(r.final_title("humanist"), "Humanism");

        let r = resolve_title("Max Planck", &query);
        assert_eq!(r.normalized, None);
        assert_eq!(r.target, None);
        assert_eq!(r.final_title("Max Planck"), "Max Planck");
    }

    #[test]
    fn test_resolve_title_percent_encoded() {
        // "a" plus combining caron arrives percent-encoded in the
        // normalized array
        let query = json!({
            "normalized": [
                {"fromencoded": true, "from": "a%CC%8C", "to": "ǎ"},
                {"from": "ǎ", "to": "Ǎ"}
            ],
            "redirects": [{"from": "Ǎ", "to": "Caron"}]
        });
        let r = resolve_title("a\u{030C}", &query);
        assert_eq!(r.normalized.as_deref(), Some("Ǎ"));
        assert_eq!(r.target.as_deref(), Some("Caron"));
    }

    #[test]
    fn test_continuation() {
        let j = json!({"continue": {"rdcontinue": "Page|123", "continue": "||"}});
        let mut params = continuation(&j).unwrap();
        params.sort();
        assert_eq!(
            params,
            vec![
                ("continue".to_string(), "||".to_string()),
                ("rdcontinue".to_string(), "Page|123".to_string())
            ]
        );
        assert!(continuation(&json!({"batchcomplete": true})).is_none());
    }

    #[test]
    fn test_continuation_numeric_values() {
        let j = json!({"continue": {"gpsoffset": 50, "continue": "gpsoffset||"}});
        let params = continuation(&j).unwrap();
        assert!(params.contains(&("gpsoffset".to_string(), "50".to_string())));
    }

    #[test]
    fn test_pageprops_status() {
        let page = json!({"pageid": 1, "title": "A",
            "pageprops": {"wikibase_item": "Q9021"}});
        assert_eq!(
            pageprops_status(&page),
            (PageStatus::Ok, Some("Q9021".to_string()))
        );

        let page = json!({"pageid": 2, "title": "Max",
            "pageprops": {"wikibase_item": "Q225238", "disambiguation": ""}});
        assert_eq!(
            pageprops_status(&page),
            (PageStatus::Disambiguation, Some("Q225238".to_string()))
        );

        let page = json!({"title": "Cervante", "missing": true});
        assert_eq!(pageprops_status(&page), (PageStatus::Missing, None));

        let page = json!({"pageid": 3, "title": "B", "pageprops": {}});
        assert_eq!(pageprops_status(&page), (PageStatus::NoWikibaseItem, None));

        let page = json!({"pageid": 4, "title": "C"});
        assert_eq!(pageprops_status(&page), (PageStatus::NoPageProps, None));
    }

    #[test]
    fn test_base_status() {
        assert_eq!(base_status(&json!({"pageid": 1, "title": "A"})), PageStatus::Ok);
        assert_eq!(
            base_status(&json!({"title": "A", "invalid": true})),
            PageStatus::Invalid
        );
        assert_eq!(
            base_status(&json!({"title": "A", "missing": true})),
            PageStatus::Missing
        );
        assert_eq!(base_status(&json!({"title": "A"})), PageStatus::NoPageId);
    }
}
