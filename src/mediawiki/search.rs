//! Prefix and full-text page search
//!
//! Both modes run through a query generator so each hit arrives with
//! its `pageprops`, giving the Wikidata entity and the disambiguation
//! marker in the same request. The APIs NFC-normalize the search
//! string themselves.

use super::{continuation, pageprops_status, ActionApiClient, PageStatus};
use crate::error::{Error, Result};
use serde_json::Value;

/// Which search backend to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// Prefix search over page titles (PrefixSearch API).
    Title,
    /// Indexed full-text search (CirrusSearch API). Supports the
    /// CirrusSearch syntax, e.g. `intitle:"Max Planck"`.
    Text,
}

/// One page found by [`ActionApiClient::search`], ordered by relevance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// Relevance rank the engine assigned, starting at 1.
    pub index: u64,
    pub title: String,
    pub status: PageStatus,
    pub entity: Option<String>,
}

impl ActionApiClient {
    /// Pages matching `text` in this project's main namespace, at most
    /// `limit` of them, ordered by relevance. `profile` selects the
    /// prefix-search ranking (strict, fuzzy, classic, ...) and is only
    /// meaningful in `Title` mode; full-text search always ranks with
    /// the engine's automatic profile.
    pub fn search(
        &self,
        text: &str,
        mode: SearchMode,
        profile: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("Empty search string".to_string()));
        }
        // The API caps a single request at 500 hits ("max")
        let limit_param = if limit > 500 {
            "max".to_string()
        } else {
            limit.to_string()
        };
        let profile = profile.unwrap_or("engine_autoselect");

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut extra: Vec<(String, String)> = Vec::new();
        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("format", "json"),
                ("formatversion", "2"),
                ("action", "query"),
                ("prop", "pageprops"),
                ("ppprop", "wikibase_item|disambiguation"),
            ];
            match mode {
                SearchMode::Title => {
                    params.push(("redirects", "1"));
                    params.push(("generator", "prefixsearch"));
                    params.push(("gpsnamespace", "0"));
                    params.push(("gpsprofile", profile));
                    params.push(("gpslimit", &limit_param));
                    params.push(("gpssearch", text));
                }
                SearchMode::Text => {
                    params.push(("generator", "search"));
                    params.push(("gsrprop", ""));
                    params.push(("gsrnamespace", "0"));
                    params.push(("gsrqiprofile", "engine_autoselect"));
                    params.push(("gsrlimit", &limit_param));
                    params.push(("gsrsearch", text));
                }
            }
            for (k, v) in &extra {
                params.push((k.as_str(), v.as_str()));
            }
            let j = self.get(&params)?;
            let pages = match j.pointer("/query/pages").and_then(Value::as_array) {
                Some(p) => p,
                None => break,
            };
            hits.extend(pages.iter().map(search_hit));
            if hits.len() >= limit {
                hits.truncate(limit);
                break;
            }
            match continuation(&j) {
                Some(c) => {
                    tracing::debug!("search continuation after {} hits", hits.len());
                    extra = c;
                }
                None => break,
            }
        }
        // Generators return pages in arbitrary order; `index` is the rank
        hits.sort_by_key(|h| h.index);
        hits.truncate(limit);
        Ok(hits)
    }
}

fn search_hit(page: &Value) -> SearchHit {
    let (status, entity) = pageprops_status(page);
    SearchHit {
        index: page.get("index").and_then(Value::as_u64).unwrap_or(u64::MAX),
        title: page
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        status,
        entity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_hit_statuses() {
        let h = search_hit(&json!({"index": 2, "title": "Max Planck",
            "pageprops": {"wikibase_item": "Q9021"}}));
        assert_eq!(h.index, 2);
        assert_eq!(h.status, PageStatus::Ok);
        assert_eq!(h.entity.as_deref(), Some("Q9021"));

        let h = search_hit(&json!({"index": 1, "title": "Max",
            "pageprops": {"wikibase_item": "Q225238", "disambiguation": ""}}));
        assert_eq!(h.status, PageStatus::Disambiguation);
        assert_eq!(h.entity.as_deref(), Some("Q225238"));

        let h = search_hit(&json!({"index": 3, "title": "Draft page"}));
        assert_eq!(h.status, PageStatus::NoPageProps);
        assert_eq!(h.entity, None);

        let h = search_hit(&json!({"index": 4, "title": "Orphan",
            "pageprops": {}}));
        assert_eq!(h.status, PageStatus::NoWikibaseItem);
    }

    #[test]
    fn test_hits_sort_by_rank() {
        let pages = [
            json!({"index": 3, "title": "C"}),
            json!({"index": 1, "title": "A"}),
            json!({"index": 2, "title": "B"}),
        ];
        let mut hits: Vec<SearchHit> = pages.iter().map(search_hit).collect();
        hits.sort_by_key(|h| h.index);
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }
}
