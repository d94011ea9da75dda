//! Page-level queries: Wikidata entities, redirects, images and links
//!
//! Every operation validates its titles, splits them into batches of
//! [`MW_LIMIT`] and follows `continue` responses where the property
//! list can grow. Rows come back in input order, one per requested
//! title, with the statuses the API reports.

use super::{
    base_status, check_titles, continuation, page_for, pageprops_status, resolve_title,
    ActionApiClient, PageStatus, MW_LIMIT,
};
use crate::error::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Where a title resolves and which Wikidata entity its page carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WikidataEntity {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub entity: Option<String>,
}

/// Redirect sources of a page. The first member of `redirects` is the
/// resolved page itself; the list is empty for invalid or missing
/// titles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRedirects {
    pub title: String,
    pub status: PageStatus,
    pub redirects: Vec<String>,
}

/// [`PageRedirects`] plus the entity data of the resolved page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRedirectsEntity {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub entity: Option<String>,
    pub redirects: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageImage {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageFiles {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub files: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUrl {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLinks {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub links: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageBacklinks {
    pub title: String,
    pub status: PageStatus,
    pub normalized: Option<String>,
    pub target: Option<String>,
    pub backlinks: Vec<String>,
}

impl ActionApiClient {
    /// Wikidata entity connected to each page, resolving redirects.
    pub fn wikidata_entities(&self, titles: &[&str]) -> Result<Vec<WikidataEntity>> {
        let titles = check_titles(titles)?;
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let mut extra: Vec<(String, String)> = Vec::new();
            let mut index = HashMap::new();
            let mut first = true;
            // A pageprops reply for fifty titles fits in one response,
            // but the API reserves the right to continue anyway.
            loop {
                let mut params: Vec<(&str, &str)> = vec![
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("redirects", "1"),
                    ("action", "query"),
                    ("prop", "pageprops"),
                    ("ppprop", "wikibase_item|disambiguation"),
                    ("titles", &titles_param),
                ];
                for (k, v) in &extra {
                    params.push((k.as_str(), v.as_str()));
                }
                let j = self.get(&params)?;
                let query = match j.get("query") {
                    Some(q) => q,
                    None => break,
                };
                apply_entities(query, batch, first, &mut index, &mut rows);
                first = false;
                match continuation(&j) {
                    Some(c) => extra = c,
                    None => break,
                }
            }
        }
        Ok(rows)
    }

    /// All pages redirecting to each title, the resolved page first.
    pub fn redirects(&self, titles: &[&str]) -> Result<Vec<PageRedirects>> {
        let titles = check_titles(titles)?;
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let mut extra: Vec<(String, String)> = Vec::new();
            let mut index = HashMap::new();
            let mut first = true;
            loop {
                let mut params: Vec<(&str, &str)> = vec![
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("redirects", "1"),
                    ("action", "query"),
                    ("prop", "redirects"),
                    ("rdnamespace", "0"),
                    ("rdprop", "title"),
                    ("rdlimit", "max"),
                    ("titles", &titles_param),
                ];
                for (k, v) in &extra {
                    params.push((k.as_str(), v.as_str()));
                }
                let j = self.get(&params)?;
                let query = match j.get("query") {
                    Some(q) => q,
                    None => break,
                };
                apply_redirects(query, batch, first, &mut index, &mut rows);
                first = false;
                match continuation(&j) {
                    Some(c) => extra = c,
                    None => break,
                }
            }
        }
        Ok(rows)
    }

    /// Redirects and entity data in one query.
    pub fn redirects_with_entities(&self, titles: &[&str]) -> Result<Vec<PageRedirectsEntity>> {
        let titles = check_titles(titles)?;
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let mut extra: Vec<(String, String)> = Vec::new();
            let mut index = HashMap::new();
            let mut first = true;
            loop {
                let mut params: Vec<(&str, &str)> = vec![
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("redirects", "1"),
                    ("action", "query"),
                    ("prop", "redirects|pageprops"),
                    ("rdnamespace", "0"),
                    ("rdprop", "title"),
                    ("rdlimit", "max"),
                    ("ppprop", "wikibase_item|disambiguation"),
                    ("titles", &titles_param),
                ];
                for (k, v) in &extra {
                    params.push((k.as_str(), v.as_str()));
                }
                let j = self.get(&params)?;
                let query = match j.get("query") {
                    Some(q) => q,
                    None => break,
                };
                apply_redirects_entities(query, batch, first, &mut index, &mut rows);
                first = false;
                match continuation(&j) {
                    Some(c) => extra = c,
                    None => break,
                }
            }
        }
        Ok(rows)
    }

    /// URL of the primary image of each page, if it has one.
    pub fn primary_images(&self, titles: &[&str]) -> Result<Vec<PageImage>> {
        let titles = check_titles(titles)?;
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let params = [
                ("format", "json"),
                ("formatversion", "2"),
                ("redirects", "1"),
                ("action", "query"),
                ("prop", "pageimages"),
                ("piprop", "original"),
                ("pilimit", "max"),
                ("titles", titles_param.as_str()),
            ];
            // One image URL per page at most; a single reply covers the
            // whole batch.
            let j = self.get(&params)?;
            if let Some(query) = j.get("query") {
                rows.extend(rows_from_images(query, batch));
            }
        }
        Ok(rows)
    }

    /// Names of the files embedded in each page. Files without an
    /// extension or with one of `exclude_extensions` (comma-separated,
    /// default "svg,webp,xcf") are dropped.
    pub fn page_files(
        &self,
        titles: &[&str],
        exclude_extensions: Option<&str>,
    ) -> Result<Vec<PageFiles>> {
        let titles = check_titles(titles)?;
        let excluded: Vec<String> = exclude_extensions
            .unwrap_or("svg,webp,xcf")
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let mut extra: Vec<(String, String)> = Vec::new();
            let mut index = HashMap::new();
            let mut first = true;
            loop {
                let mut params: Vec<(&str, &str)> = vec![
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("redirects", "1"),
                    ("action", "query"),
                    ("prop", "images"),
                    ("imlimit", "max"),
                    ("titles", &titles_param),
                ];
                for (k, v) in &extra {
                    params.push((k.as_str(), v.as_str()));
                }
                let j = self.get(&params)?;
                let query = match j.get("query") {
                    Some(q) => q,
                    None => break,
                };
                apply_files(query, batch, first, &excluded, &mut index, &mut rows);
                first = false;
                match continuation(&j) {
                    Some(c) => extra = c,
                    None => break,
                }
            }
        }
        Ok(rows)
    }

    /// Download URL of each file page. Titles must carry the file
    /// namespace prefix of the project, e.g. "File:" or "Archivo:".
    pub fn image_urls(&self, files: &[&str]) -> Result<Vec<ImageUrl>> {
        let files = check_titles(files)?;
        let mut rows = Vec::with_capacity(files.len());
        for batch in files.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let params = [
                ("format", "json"),
                ("formatversion", "2"),
                ("redirects", "1"),
                ("action", "query"),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
                ("iilimit", "max"),
                ("titles", titles_param.as_str()),
            ];
            let j = self.get(&params)?;
            if let Some(query) = j.get("query") {
                rows.extend(rows_from_imageinfo(query, batch));
            }
        }
        Ok(rows)
    }

    /// Outgoing links of each page to namespace 0, following redirects.
    pub fn page_links(&self, titles: &[&str]) -> Result<Vec<PageLinks>> {
        let titles = check_titles(titles)?;
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let mut extra: Vec<(String, String)> = Vec::new();
            let mut index = HashMap::new();
            let mut first = true;
            loop {
                let mut params: Vec<(&str, &str)> = vec![
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("redirects", "1"),
                    ("action", "query"),
                    ("prop", "links"),
                    ("plnamespace", "0"),
                    ("pllimit", "max"),
                    ("titles", &titles_param),
                ];
                for (k, v) in &extra {
                    params.push((k.as_str(), v.as_str()));
                }
                let j = self.get(&params)?;
                let query = match j.get("query") {
                    Some(q) => q,
                    None => break,
                };
                apply_links(query, batch, first, &mut index, &mut rows);
                first = false;
                match continuation(&j) {
                    Some(c) => extra = c,
                    None => break,
                }
            }
        }
        Ok(rows)
    }

    /// Incoming links to each page from namespace 0. The query matches
    /// the exact titles; with `include_redirects` the backlinks of every
    /// page redirecting to a title are merged into its row, duplicates
    /// removed.
    pub fn page_backlinks(
        &self,
        titles: &[&str],
        include_redirects: bool,
    ) -> Result<Vec<PageBacklinks>> {
        if !include_redirects {
            let titles = check_titles(titles)?;
            return self.backlinks_raw(&titles);
        }
        let redirect_rows = self.redirects(titles)?;
        let mut all = Vec::new();
        let mut seen = HashSet::new();
        for row in &redirect_rows {
            for t in &row.redirects {
                if seen.insert(t.clone()) {
                    all.push(t.clone());
                }
            }
            if row.redirects.is_empty() && seen.insert(row.title.clone()) {
                all.push(row.title.clone());
            }
        }
        tracing::debug!("backlinks over {} redirect titles", all.len());
        let raw = self.backlinks_raw(&all)?;
        let by_title: HashMap<&str, &PageBacklinks> =
            raw.iter().map(|r| (r.title.as_str(), r)).collect();
        let mut out = Vec::with_capacity(redirect_rows.len());
        for row in &redirect_rows {
            if row.redirects.is_empty() {
                if let Some(r) = by_title.get(row.title.as_str()) {
                    out.push((*r).clone());
                }
                continue;
            }
            let mut backlinks = Vec::new();
            let mut seen = HashSet::new();
            for t in &row.redirects {
                if let Some(r) = by_title.get(t.as_str()) {
                    for b in &r.backlinks {
                        if seen.insert(b.clone()) {
                            backlinks.push(b.clone());
                        }
                    }
                }
            }
            let status = by_title
                .get(row.redirects[0].as_str())
                .map(|r| r.status)
                .unwrap_or(PageStatus::Missing);
            let target = row
                .redirects
                .first()
                .filter(|t| t.as_str() != row.title)
                .cloned();
            out.push(PageBacklinks {
                title: row.title.clone(),
                status,
                normalized: None,
                target,
                backlinks,
            });
        }
        Ok(out)
    }

    fn backlinks_raw(&self, titles: &[String]) -> Result<Vec<PageBacklinks>> {
        let mut rows = Vec::with_capacity(titles.len());
        for batch in titles.chunks(MW_LIMIT) {
            let titles_param = batch.join("|");
            let mut extra: Vec<(String, String)> = Vec::new();
            let mut index = HashMap::new();
            let mut first = true;
            loop {
                let mut params: Vec<(&str, &str)> = vec![
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("action", "query"),
                    ("prop", "linkshere"),
                    ("lhnamespace", "0"),
                    ("lhprop", "title"),
                    ("lhlimit", "max"),
                    ("titles", &titles_param),
                ];
                for (k, v) in &extra {
                    params.push((k.as_str(), v.as_str()));
                }
                let j = self.get(&params)?;
                let query = match j.get("query") {
                    Some(q) => q,
                    None => break,
                };
                apply_backlinks(query, batch, first, &mut index, &mut rows);
                first = false;
                match continuation(&j) {
                    Some(c) => extra = c,
                    None => break,
                }
            }
        }
        Ok(rows)
    }
}

fn titles_of(page: &Value, key: &str) -> Vec<String> {
    page.get(key)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|e| e.get("title").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn apply_entities(
    query: &Value,
    batch: &[String],
    first: bool,
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<WikidataEntity>,
) {
    for title in batch {
        let resolved = resolve_title(title, query);
        let page = match page_for(query, resolved.final_title(title)) {
            Some(p) => p,
            None => continue,
        };
        let (status, entity) = pageprops_status(page);
        if first {
            index.insert(title.clone(), rows.len());
            rows.push(WikidataEntity {
                title: title.clone(),
                status,
                normalized: resolved.normalized,
                target: resolved.target,
                entity,
            });
        } else if let Some(&i) = index.get(title) {
            // A continued reply may deliver pageprops the first one
            // did not carry
            if rows[i].entity.is_none() && entity.is_some() {
                rows[i].status = status;
                rows[i].entity = entity;
            }
        }
    }
}

fn apply_redirects(
    query: &Value,
    batch: &[String],
    first: bool,
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<PageRedirects>,
) {
    for title in batch {
        let resolved = resolve_title(title, query);
        let final_title = resolved.final_title(title);
        let page = match page_for(query, final_title) {
            Some(p) => p,
            None => continue,
        };
        if first {
            let status = base_status(page);
            let mut redirects = Vec::new();
            if !matches!(status, PageStatus::Invalid | PageStatus::Missing) {
                redirects.push(final_title.to_string());
            }
            index.insert(title.clone(), rows.len());
            rows.push(PageRedirects {
                title: title.clone(),
                status,
                redirects,
            });
        }
        if let Some(&i) = index.get(title) {
            rows[i].redirects.extend(titles_of(page, "redirects"));
        }
    }
}

fn apply_redirects_entities(
    query: &Value,
    batch: &[String],
    first: bool,
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<PageRedirectsEntity>,
) {
    for title in batch {
        let resolved = resolve_title(title, query);
        let final_title = resolved.final_title(title);
        let page = match page_for(query, final_title) {
            Some(p) => p,
            None => continue,
        };
        let (status, entity) = pageprops_status(page);
        if first {
            let mut redirects = Vec::new();
            if !matches!(status, PageStatus::Invalid | PageStatus::Missing) {
                redirects.push(final_title.to_string());
            }
            index.insert(title.clone(), rows.len());
            rows.push(PageRedirectsEntity {
                title: title.clone(),
                status,
                normalized: resolved.normalized,
                target: resolved.target,
                entity: entity.clone(),
                redirects,
            });
        }
        if let Some(&i) = index.get(title) {
            if rows[i].entity.is_none() && entity.is_some() {
                rows[i].status = status;
                rows[i].entity = entity;
            }
            rows[i].redirects.extend(titles_of(page, "redirects"));
        }
    }
}

fn rows_from_images(query: &Value, batch: &[String]) -> Vec<PageImage> {
    let mut rows = Vec::with_capacity(batch.len());
    for title in batch {
        let resolved = resolve_title(title, query);
        let page = match page_for(query, resolved.final_title(title)) {
            Some(p) => p,
            None => continue,
        };
        let status = base_status(page);
        let image = if status == PageStatus::Ok {
            page.pointer("/original/source")
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        };
        rows.push(PageImage {
            title: title.clone(),
            status,
            normalized: resolved.normalized,
            target: resolved.target,
            image,
        });
    }
    rows
}

fn apply_files(
    query: &Value,
    batch: &[String],
    first: bool,
    excluded: &[String],
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<PageFiles>,
) {
    for title in batch {
        let resolved = resolve_title(title, query);
        let page = match page_for(query, resolved.final_title(title)) {
            Some(p) => p,
            None => continue,
        };
        if first {
            index.insert(title.clone(), rows.len());
            rows.push(PageFiles {
                title: title.clone(),
                status: base_status(page),
                normalized: resolved.normalized,
                target: resolved.target,
                files: Vec::new(),
            });
        }
        if let Some(&i) = index.get(title) {
            rows[i].files.extend(
                titles_of(page, "images")
                    .into_iter()
                    .filter(|f| keep_file(f, excluded)),
            );
        }
    }
}

/// A file is kept when it has an extension outside the excluded list.
fn keep_file(name: &str, excluded: &[String]) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            !excluded.iter().any(|x| x.eq_ignore_ascii_case(ext))
        }
        _ => false,
    }
}

fn rows_from_imageinfo(query: &Value, batch: &[String]) -> Vec<ImageUrl> {
    let mut rows = Vec::with_capacity(batch.len());
    for title in batch {
        let resolved = resolve_title(title, query);
        let page = match page_for(query, resolved.final_title(title)) {
            Some(p) => p,
            None => continue,
        };
        rows.push(ImageUrl {
            title: title.clone(),
            status: imageinfo_status(page),
            normalized: resolved.normalized,
            target: resolved.target,
            url: page
                .pointer("/imageinfo/0/url")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    rows
}

/// Files hosted on Commons are listed as missing but known, and still
/// carry their imageinfo.
fn imageinfo_status(page: &Value) -> PageStatus {
    if page.get("known").is_some() {
        PageStatus::Ok
    } else if page.get("invalid").is_some() {
        PageStatus::Invalid
    } else if page.get("missing").is_some() {
        PageStatus::Missing
    } else if page.get("filehidden").is_some() {
        PageStatus::FileHidden
    } else {
        PageStatus::Ok
    }
}

fn apply_links(
    query: &Value,
    batch: &[String],
    first: bool,
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<PageLinks>,
) {
    for title in batch {
        let resolved = resolve_title(title, query);
        let page = match page_for(query, resolved.final_title(title)) {
            Some(p) => p,
            None => continue,
        };
        if first {
            index.insert(title.clone(), rows.len());
            rows.push(PageLinks {
                title: title.clone(),
                status: base_status(page),
                normalized: resolved.normalized,
                target: resolved.target,
                links: Vec::new(),
            });
        }
        if let Some(&i) = index.get(title) {
            rows[i].links.extend(titles_of(page, "links"));
        }
    }
}

fn apply_backlinks(
    query: &Value,
    batch: &[String],
    first: bool,
    index: &mut HashMap<String, usize>,
    rows: &mut Vec<PageBacklinks>,
) {
    for title in batch {
        let resolved = resolve_title(title, query);
        let page = match page_for(query, resolved.final_title(title)) {
            Some(p) => p,
            None => continue,
        };
        if first {
            index.insert(title.clone(), rows.len());
            rows.push(PageBacklinks {
                title: title.clone(),
                status: base_status(page),
                normalized: resolved.normalized,
                target: resolved.target,
                backlinks: Vec::new(),
            });
        }
        if let Some(&i) = index.get(title) {
            rows[i].backlinks.extend(titles_of(page, "linkshere"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(titles: &[&str]) -> Vec<String> {
        titles.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_entities() {
        let query = json!({
            "normalized": [{"from": "humanist", "to": "Humanist"}],
            "redirects": [{"from": "Humanist", "to": "Humanism"}],
            "pages": [
                {"pageid": 1, "title": "Max Planck",
                 "pageprops": {"wikibase_item": "Q9021"}},
                {"pageid": 2, "title": "Humanism",
                 "pageprops": {"wikibase_item": "Q46158"}},
                {"title": "Cervante", "missing": true}
            ]
        });
        let titles = batch(&["Max Planck", "humanist", "Cervante"]);
        let mut rows = Vec::new();
        let mut index = HashMap::new();
        apply_entities(&query, &titles, true, &mut index, &mut rows);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].entity.as_deref(), Some("Q9021"));
        assert_eq!(rows[1].normalized.as_deref(), Some("Humanist"));
        assert_eq!(rows[1].target.as_deref(), Some("Humanism"));
        assert_eq!(rows[1].entity.as_deref(), Some("Q46158"));
        assert_eq!(rows[2].status, PageStatus::Missing);
        assert_eq!(rows[2].entity, None);
    }

    #[test]
    fn test_apply_redirects_across_continues() {
        let first = json!({
            "pages": [
                {"pageid": 1, "title": "Humanism",
                 "redirects": [{"title": "Humanist"}, {"title": "Humanists"}]}
            ]
        });
        let second = json!({
            "pages": [
                {"pageid": 1, "title": "Humanism",
                 "redirects": [{"title": "Humanistic"}]}
            ]
        });
        let titles = batch(&["Humanism"]);
        let mut rows = Vec::new();
        let mut index = HashMap::new();
        apply_redirects(&first, &titles, true, &mut index, &mut rows);
        apply_redirects(&second, &titles, false, &mut index, &mut rows);
        assert_eq!(
            rows[0].redirects,
            vec!["Humanism", "Humanist", "Humanists", "Humanistic"]
        );
        assert_eq!(rows[0].status, PageStatus::Ok);
    }

    #[test]
    fn test_apply_redirects_missing_title() {
        let query = json!({"pages": [{"title": "Cervante", "missing": true}]});
        let titles = batch(&["Cervante"]);
        let mut rows = Vec::new();
        let mut index = HashMap::new();
        apply_redirects(&query, &titles, true, &mut index, &mut rows);
        assert_eq!(rows[0].status, PageStatus::Missing);
        assert!(rows[0].redirects.is_empty());
    }

    #[test]
    fn test_rows_from_images() {
        let query = json!({
            "pages": [
                {"pageid": 1, "title": "Max Planck",
                 "original": {"source": "https://upload.wikimedia.org/x/Max_Planck.png"}},
                {"pageid": 2, "title": "Max"}
            ]
        });
        let titles = batch(&["Max Planck", "Max"]);
        let rows = rows_from_images(&query, &titles);
        assert_eq!(
            rows[0].image.as_deref(),
            Some("https://upload.wikimedia.org/x/Max_Planck.png")
        );
        assert_eq!(rows[1].status, PageStatus::Ok);
        assert_eq!(rows[1].image, None);
    }

    #[test]
    fn test_keep_file() {
        let excluded = vec!["svg".to_string(), "webp".to_string(), "xcf".to_string()];
        assert!(keep_file("File:Portrait.jpg", &excluded));
        assert!(!keep_file("File:Logo.svg", &excluded));
        assert!(!keep_file("File:Logo.SVG", &excluded));
        assert!(!keep_file("File:NoExtension", &excluded));
    }

    #[test]
    fn test_rows_from_imageinfo_known_file() {
        // Commons-hosted files report missing plus known
        let query = json!({
            "pages": [
                {"title": "File:Tour Eiffel.jpg", "missing": true, "known": true,
                 "imageinfo": [{"url": "https://upload.wikimedia.org/x/Tour_Eiffel.jpg"}]},
                {"title": "File:Nope.jpg", "missing": true}
            ]
        });
        let titles = batch(&["File:Tour Eiffel.jpg", "File:Nope.jpg"]);
        let rows = rows_from_imageinfo(&query, &titles);
        assert_eq!(rows[0].status, PageStatus::Ok);
        assert_eq!(
            rows[0].url.as_deref(),
            Some("https://upload.wikimedia.org/x/Tour_Eiffel.jpg")
        );
        assert_eq!(rows[1].status, PageStatus::Missing);
        assert_eq!(rows[1].url, None);
    }

    #[test]
    fn test_apply_links_accumulates() {
        let first = json!({
            "pages": [
                {"pageid": 1, "title": "A", "links": [{"title": "B"}, {"title": "C"}]}
            ]
        });
        let second = json!({
            "pages": [
                {"pageid": 1, "title": "A", "links": [{"title": "D"}]}
            ]
        });
        let titles = batch(&["A"]);
        let mut rows = Vec::new();
        let mut index = HashMap::new();
        apply_links(&first, &titles, true, &mut index, &mut rows);
        apply_links(&second, &titles, false, &mut index, &mut rows);
        assert_eq!(rows[0].links, vec!["B", "C", "D"]);
    }
}
