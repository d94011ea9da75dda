//! MediaWiki and WikiMedia REST clients
//!
//! Fixed-path GET endpoints: page wikitext and summary from the
//! project itself, revision history segments, the media list, and the
//! per-article pageview metrics served from wikimedia.org. One article
//! per request throughout.

pub mod xtools;

pub use xtools::*;

use crate::error::{Error, Result};
use crate::http::HttpClient;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

const PAGEVIEWS_URL: &str = "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article";

/// Access method filter for pageview metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Access {
    #[default]
    AllAccess,
    Desktop,
    MobileApp,
    MobileWeb,
}

impl Access {
    fn as_str(self) -> &'static str {
        match self {
            Access::AllAccess => "all-access",
            Access::Desktop => "desktop",
            Access::MobileApp => "mobile-app",
            Access::MobileWeb => "mobile-web",
        }
    }
}

/// Agent type filter for pageview metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Agent {
    #[default]
    AllAgents,
    User,
    Spider,
    Automated,
}

impl Agent {
    fn as_str(self) -> &'static str {
        match self {
            Agent::AllAgents => "all-agents",
            Agent::User => "user",
            Agent::Spider => "spider",
            Agent::Automated => "automated",
        }
    }
}

/// Time bucket of the pageview counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    #[default]
    Monthly,
}

impl Granularity {
    fn as_str(self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PageViewsOptions {
    pub access: Access,
    pub agent: Agent,
    pub granularity: Granularity,
}

/// Wikitext and revision metadata of a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageSource {
    pub id: u64,
    pub title: String,
    pub latest_revision: u64,
    pub latest_timestamp: String,
    pub content_model: String,
    pub source: String,
}

/// The summary card of a page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub title: String,
    pub entity: Option<String>,
    pub lang: Option<String>,
    pub description: Option<String>,
    pub extract: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub id: u64,
    pub timestamp: String,
    pub user: Option<String>,
    pub comment: Option<String>,
    pub size: Option<u64>,
    pub minor: bool,
}

/// One twenty-revision segment of a page's history, newest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistorySegment {
    pub revisions: Vec<Revision>,
    /// Revision id to pass as `older_than` to fetch the next segment.
    pub older_than: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    pub title: String,
    /// "image", "video" or "audio".
    pub media_type: String,
    pub caption: Option<String>,
}

pub struct RestClient {
    http: HttpClient,
    project: String,
}

impl RestClient {
    /// Client for one project, e.g. "en.wikipedia.org".
    pub fn new(project: &str) -> Self {
        Self {
            http: HttpClient::default(),
            project: project.trim().to_string(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Wikitext source and latest-revision metadata of a page
    /// (MediaWiki core REST).
    pub fn page_source(&self, title: &str) -> Result<PageSource> {
        let url = format!(
            "https://{}/w/rest.php/v1/page/{}",
            self.project,
            encode_title(title)?
        );
        let j = self.get_json(&url)?;
        Ok(PageSource {
            id: j.get("id").and_then(Value::as_u64).unwrap_or(0),
            title: string_at(&j, "/title"),
            latest_revision: j.pointer("/latest/id").and_then(Value::as_u64).unwrap_or(0),
            latest_timestamp: string_at(&j, "/latest/timestamp"),
            content_model: string_at(&j, "/content_model"),
            source: string_at(&j, "/source"),
        })
    }

    /// Summary card of a page (WikiMedia REST).
    pub fn page_summary(&self, title: &str) -> Result<PageSummary> {
        let url = format!(
            "https://{}/api/rest_v1/page/summary/{}",
            self.project,
            encode_title(title)?
        );
        let j = self.get_json(&url)?;
        Ok(PageSummary {
            title: string_at(&j, "/title"),
            entity: j
                .get("wikibase_item")
                .and_then(Value::as_str)
                .map(str::to_string),
            lang: j.get("lang").and_then(Value::as_str).map(str::to_string),
            description: j
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            extract: j.get("extract").and_then(Value::as_str).map(str::to_string),
            thumbnail: j
                .pointer("/thumbnail/source")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// One segment of a page's revision history, newest first. Pass
    /// the returned `older_than` back in to walk further into the
    /// past.
    pub fn page_history(&self, title: &str, older_than: Option<u64>) -> Result<HistorySegment> {
        let mut url = format!(
            "https://{}/w/rest.php/v1/page/{}/history",
            self.project,
            encode_title(title)?
        );
        if let Some(rev) = older_than {
            url.push_str(&format!("?older_than={}", rev));
        }
        let j = self.get_json(&url)?;
        Ok(parse_history(&j))
    }

    /// Media files used on a page (WikiMedia REST media-list).
    pub fn page_media(&self, title: &str) -> Result<Vec<MediaItem>> {
        let url = format!(
            "https://{}/api/rest_v1/page/media-list/{}",
            self.project,
            encode_title(title)?
        );
        let j = self.get_json(&url)?;
        Ok(parse_media_list(&j))
    }

    /// View counts of one article between `start` and `end` (both
    /// `YYYYMMDD` or `YYYYMMDDHH`), as a timestamp-to-count map in
    /// ascending timestamp order.
    pub fn page_views(
        &self,
        article: &str,
        start: &str,
        end: &str,
        options: &PageViewsOptions,
    ) -> Result<BTreeMap<String, u64>> {
        check_date(start)?;
        check_date(end)?;
        let url = format!(
            "{}/{}/{}/{}/{}/{}/{}/{}",
            PAGEVIEWS_URL,
            self.project,
            options.access.as_str(),
            options.agent.as_str(),
            encode_title(article)?,
            options.granularity.as_str(),
            start,
            end
        );
        let j = self.get_json(&url)?;
        Ok(parse_views(&j))
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        tracing::debug!("REST GET {}", url);
        let response = self.http.get(url)?;
        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url: url.to_string(),
            });
        }
        serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("Invalid REST response: {}", e)))
    }
}

/// Path segment for an article title: spaces become underscores, the
/// rest is percent-encoded.
fn encode_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Empty article title".to_string()));
    }
    Ok(urlencoding::encode(&title.replace(' ', "_")).to_string())
}

fn check_date(date: &str) -> Result<()> {
    let day = match date.len() {
        8 => date,
        // YYYYMMDDHH: the hour part must be numeric
        10 if date[8..].chars().all(|c| c.is_ascii_digit()) => &date[..8],
        _ => {
            return Err(Error::InvalidInput(format!(
                "Date '{}' is not YYYYMMDD or YYYYMMDDHH",
                date
            )))
        }
    };
    NaiveDate::parse_from_str(day, "%Y%m%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{}'", date)))?;
    Ok(())
}

fn string_at(j: &Value, pointer: &str) -> String {
    j.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_history(j: &Value) -> HistorySegment {
    let revisions = j
        .get("revisions")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|r| Revision {
                    id: r.get("id").and_then(Value::as_u64).unwrap_or(0),
                    timestamp: string_at(r, "/timestamp"),
                    user: r
                        .pointer("/user/name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    comment: r.get("comment").and_then(Value::as_str).map(str::to_string),
                    size: r.get("size").and_then(Value::as_u64),
                    minor: r.get("minor").and_then(Value::as_bool).unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default();
    // The API links the next segment as a URL carrying older_than
    let older_than = j
        .get("older")
        .and_then(Value::as_str)
        .and_then(|url| url.rsplit_once("older_than=").map(|(_, id)| id))
        .and_then(|id| id.split('&').next())
        .and_then(|id| id.parse().ok());
    HistorySegment {
        revisions,
        older_than,
    }
}

fn parse_media_list(j: &Value) -> Vec<MediaItem> {
    j.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| MediaItem {
                    title: string_at(item, "/title"),
                    media_type: string_at(item, "/type"),
                    caption: item
                        .pointer("/caption/text")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_views(j: &Value) -> BTreeMap<String, u64> {
    j.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let timestamp = item.get("timestamp").and_then(Value::as_str)?;
                    let views = item.get("views").and_then(Value::as_u64)?;
                    Some((timestamp.to_string(), views))
                })
                .collect()
        })
        .unwrap_or_default()
}
