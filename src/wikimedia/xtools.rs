//! XTools page statistics
//!
//! XTools aggregates edit history, prose and link statistics per page.
//! The response shape varies with deployment, so the payload is
//! returned as a JSON object rather than a fixed struct.

use crate::error::{Error, Result};
use crate::http::HttpClient;
use serde_json::{Map, Value};

const XTOOLS_URL: &str = "https://xtools.wmcloud.org/api/page";

/// Which XTools page endpoint to query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageInfoKind {
    /// Edit-history basics: creation, editor counts, watchers.
    ArticleInfo,
    /// Characters, words, references of the rendered prose.
    Prose,
    /// Incoming, outgoing and external link counts.
    Links,
}

impl PageInfoKind {
    fn path(self) -> &'static str {
        match self {
            PageInfoKind::ArticleInfo => "articleinfo",
            PageInfoKind::Prose => "prose",
            PageInfoKind::Links => "links",
        }
    }
}

pub struct XtoolsClient {
    http: HttpClient,
}

impl Default for XtoolsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl XtoolsClient {
    pub fn new() -> Self {
        Self {
            http: HttpClient::default(),
        }
    }

    /// Statistics of `kind` for one article.
    pub fn page_info(
        &self,
        project: &str,
        article: &str,
        kind: PageInfoKind,
    ) -> Result<Map<String, Value>> {
        let article = article.trim();
        if article.is_empty() {
            return Err(Error::InvalidInput("Empty article title".to_string()));
        }
        let url = format!(
            "{}/{}/{}/{}",
            XTOOLS_URL,
            kind.path(),
            project,
            urlencoding::encode(&article.replace(' ', "_"))
        );
        tracing::debug!("XTools GET {}", url);
        let response = self.http.get(&url)?;
        if !(200..300).contains(&response.status) {
            return Err(Error::Status {
                status: response.status,
                url,
            });
        }
        let j: Value = serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("Invalid XTools response: {}", e)))?;
        match j {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Parse("XTools response is not an object".to_string())),
        }
    }

    /// Article, prose and link statistics merged into one map. The
    /// per-request timing field is dropped.
    pub fn page_info_all(&self, project: &str, article: &str) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        for kind in [
            PageInfoKind::ArticleInfo,
            PageInfoKind::Prose,
            PageInfoKind::Links,
        ] {
            merged.extend(self.page_info(project, article, kind)?);
        }
        merged.remove("elapsed_time");
        Ok(merged)
    }
}
