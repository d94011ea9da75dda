//! Wikidata Query Service operations
//!
//! Each method builds one SPARQL query from a fixed template, runs it
//! against the public endpoint and flattens the result set into typed
//! rows. Batched operations split the input into endpoint-sized chunks
//! and issue one query per chunk, sequentially.
//!
//! Batch queries wrap their VALUES block in OPTIONAL; without it the
//! endpoint times out on large batches.

use super::{
    authority_property, check_entities, check_properties, entity_id, matches_class, split_concat,
    split_concat_entities, values_clause,
};
use crate::error::{Error, Result};
use crate::sparql::{binding, Row, SparqlClient, SparqlResults};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

pub const WDQS_ENDPOINT: &str = "https://query.wikidata.org/sparql";

// Entities per query. The endpoint enforces a 60 second timeout, so the
// heavier the query shape, the smaller the batch.
const INSTANCE_OF_CHUNK: usize = 50_000;
const WIKIPEDIAS_CHUNK: usize = 10_000;
const VALIDITY_CHUNK: usize = 50_000;
const PROPERTY_CHUNK: usize = 5_000;
const GEOLOC_CHUNK: usize = 1_000;
const LABELDESC_CHUNK: usize = 25_000;
const OCCUPATION_CHUNK: usize = 10_000;
const IDENTIFIER_CHUNK: usize = 3_000;
const AUTHORITY_CHUNK: usize = 10_000;
const INSTANCEOF_SEARCH_CHUNK: usize = 2_500;

lazy_static! {
    static ref CLASS_EXPR: Regex = Regex::new(r"^Q\d+([|&]Q\d+)*$").unwrap();
}

/// P31 classes of one entity and whether a requested class is among them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceOfRow {
    pub entity: String,
    pub instance_of: Vec<String>,
    /// Present when a class expression was given to match against.
    pub matches: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WikipediaPage {
    pub lang: String,
    pub title: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WikipediaPagesRow {
    pub entity: String,
    pub instance_of: Vec<String>,
    pub pages: Vec<WikipediaPage>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidityRow {
    pub entity: String,
    /// An entity with neither label nor description does not exist.
    pub valid: bool,
    pub instance_of: Vec<String>,
    pub redirects_to: Option<String>,
}

/// Values of one property for one entity, as ids and/or labels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyValues {
    pub ids: Vec<String>,
    pub labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyRow {
    pub entity: String,
    pub instance_of: Vec<String>,
    pub instance_of_labels: Vec<String>,
    /// Keyed by property id, e.g. "P21".
    pub properties: BTreeMap<String, PropertyValues>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeolocRow {
    pub place: String,
    pub place_label: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub country: Option<String>,
    pub country_label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelDescRow {
    pub entity: String,
    pub label_lang: Option<String>,
    pub label: Option<String>,
    pub description_lang: Option<String>,
    pub description: Option<String>,
}

/// Which terms [`WdqsClient::labels_descriptions`] fetches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terms {
    Labels,
    Descriptions,
    Both,
}

impl Terms {
    fn labels(self) -> bool {
        matches!(self, Terms::Labels | Terms::Both)
    }

    fn descriptions(self) -> bool {
        matches!(self, Terms::Descriptions | Terms::Both)
    }
}

/// One entity returned by a search operation. Label and description are
/// present only when a language order was requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityHit {
    pub entity: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub instance_of: Vec<String>,
    pub instance_of_labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierHit {
    pub id: String,
    /// None when no entity holds this identifier.
    pub entity: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub instance_of: Vec<String>,
    pub instance_of_labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorityHit {
    pub entity: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub instance_of: Vec<String>,
    pub instance_of_labels: Vec<String>,
    /// Identifiers the entity holds in the searched authority file.
    pub authority_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelHit {
    pub entity: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub instance_of: Vec<String>,
    pub instance_of_labels: Vec<String>,
    pub properties: BTreeMap<String, PropertyValues>,
}

/// How [`WdqsClient::search_by_label`] matches the search string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelSearchMode {
    /// Exact label or alias match in the given languages.
    Exact,
    /// Prefix match via the EntitySearch API, per language.
    StartsWith,
    /// Substring match anywhere in labels or aliases, case and
    /// diacritic insensitive.
    InLabel,
    /// Raw CirrusSearch query string.
    Cirrus,
}

pub struct WdqsClient {
    sparql: SparqlClient,
}

impl Default for WdqsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WdqsClient {
    pub fn new() -> Self {
        Self {
            sparql: SparqlClient::new(WDQS_ENDPOINT),
        }
    }

    /// Point the client at a different SPARQL endpoint, e.g. a local
    /// Wikibase instance.
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            sparql: SparqlClient::new(endpoint),
        }
    }

    /// Run an arbitrary SELECT query.
    pub fn sparql(&self, query: &str) -> Result<SparqlResults> {
        self.sparql.query(query)
    }

    /// P31 classes of each entity. When `classes` is given (one or more
    /// Q-ids separated by `|`), each row also says whether the entity is
    /// an instance of any of them.
    pub fn instance_of(
        &self,
        entities: &[&str],
        classes: Option<&str>,
    ) -> Result<Vec<InstanceOfRow>> {
        let ids = check_entities(entities)?;
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(INSTANCE_OF_CHUNK) {
            let results = self.sparql.query(&build_instance_of_query(chunk))?;
            rows.extend(parse_instance_of(&results, classes));
        }
        Ok(rows)
    }

    /// Wikipedia pages sitelinked to each entity, restricted to
    /// `wikilangs` when non-empty and returned in that language order.
    /// When `classes` is given, rows whose entity is not an instance of
    /// any of the classes are dropped.
    pub fn wikipedia_pages(
        &self,
        entities: &[&str],
        wikilangs: &[&str],
        classes: Option<&str>,
    ) -> Result<Vec<WikipediaPagesRow>> {
        let ids = check_entities(entities)?;
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(WIKIPEDIAS_CHUNK) {
            let results = self
                .sparql
                .query(&build_wikipedias_query(chunk, wikilangs))?;
            rows.extend(parse_wikipedias(&results, wikilangs));
        }
        if let Some(classes) = classes {
            rows.retain(|r| matches_class(&r.instance_of, classes));
        }
        Ok(rows)
    }

    /// Whether each entity exists (has a label or a description) and
    /// where it redirects if it has been merged.
    pub fn validity(&self, entities: &[&str]) -> Result<Vec<ValidityRow>> {
        let ids = check_entities(entities)?;
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(VALIDITY_CHUNK) {
            let results = self.sparql.query(&build_validity_query(chunk))?;
            rows.extend(parse_validity(&results));
        }
        Ok(rows)
    }

    /// Values of `properties` for each entity. With `include_ids` the
    /// raw Q-ids of item-valued properties are returned; with a
    /// non-empty `langsorder` their labels are, in that language
    /// fallback order. At least one of the two must be requested.
    pub fn property_values(
        &self,
        entities: &[&str],
        properties: &[&str],
        langsorder: &[&str],
        include_ids: bool,
    ) -> Result<Vec<PropertyRow>> {
        let ids = check_entities(entities)?;
        let props = check_properties(properties)?;
        if langsorder.is_empty() && !include_ids {
            return Err(Error::InvalidInput(
                "Either a language order or include_ids is required".to_string(),
            ));
        }
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(PROPERTY_CHUNK) {
            let results = self
                .sparql
                .query(&build_property_query(chunk, &props, langsorder, include_ids))?;
            rows.extend(parse_property_rows(
                &results,
                &props,
                include_ids,
                !langsorder.is_empty(),
            ));
        }
        Ok(rows)
    }

    /// Coordinates and country of each place entity. Places replaced by
    /// a newer entity (P1366) are followed to the replacement. A place
    /// with several replacements keeps only the first row returned.
    pub fn geolocation(&self, entities: &[&str], langsorder: &[&str]) -> Result<Vec<GeolocRow>> {
        let ids = check_entities(entities)?;
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(GEOLOC_CHUNK) {
            let results = self.sparql.query(&build_geoloc_query(chunk, langsorder))?;
            rows.extend(parse_geoloc(&results, !langsorder.is_empty()));
        }
        let mut seen = std::collections::HashSet::new();
        rows.retain(|r| seen.insert(r.place.clone()));
        Ok(rows)
    }

    /// Labels and/or descriptions of each entity with language fallback.
    /// `langsorder` must not be empty.
    pub fn labels_descriptions(
        &self,
        entities: &[&str],
        terms: Terms,
        langsorder: &[&str],
    ) -> Result<Vec<LabelDescRow>> {
        let ids = check_entities(entities)?;
        if langsorder.is_empty() {
            return Err(Error::InvalidInput(
                "A language order is required".to_string(),
            ));
        }
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LABELDESC_CHUNK) {
            let results = self
                .sparql
                .query(&build_labels_descs_query(chunk, terms, langsorder))?;
            rows.extend(parse_labels_descs(&results, terms));
        }
        Ok(rows)
    }

    /// Number of entities with occupation (P106) `occupation`.
    pub fn count_by_occupation(&self, occupation: &str) -> Result<u64> {
        let q = check_item(occupation)?;
        let query = format!(
            "SELECT (COUNT(DISTINCT ?entity) AS ?count) WHERE {{?entity wdt:P106 wd:{}}}",
            q
        );
        parse_count(&self.sparql.query(&query)?)
    }

    /// All entities with occupation (P106) `occupation`, retrieved in
    /// pages ordered by entity id.
    pub fn search_by_occupation(
        &self,
        occupation: &str,
        langsorder: &[&str],
    ) -> Result<Vec<EntityHit>> {
        let q = check_item(occupation)?;
        let count = self.count_by_occupation(&q)?;
        tracing::debug!("{} entities hold occupation {}", count, q);
        let mut hits = Vec::with_capacity(count as usize);
        let mut offset = 0;
        while offset < count {
            let query = build_occupation_page_query(&q, langsorder, OCCUPATION_CHUNK, offset);
            hits.extend(parse_entity_hits(&self.sparql.query(&query)?));
            offset += OCCUPATION_CHUNK as u64;
        }
        Ok(hits)
    }

    /// [`search_by_occupation`](Self::search_by_occupation) plus the
    /// Wikipedia pages of every hit.
    pub fn search_by_occupation_with_pages(
        &self,
        occupation: &str,
        langsorder: &[&str],
        wikilangs: &[&str],
    ) -> Result<Vec<(EntityHit, Vec<WikipediaPage>)>> {
        let hits = self.search_by_occupation(occupation, langsorder)?;
        let entities: Vec<&str> = hits.iter().map(|h| h.entity.as_str()).collect();
        let mut pages: BTreeMap<String, Vec<WikipediaPage>> = self
            .wikipedia_pages(&entities, wikilangs, None)?
            .into_iter()
            .map(|r| (r.entity, r.pages))
            .collect();
        Ok(hits
            .into_iter()
            .map(|h| {
                let p = pages.remove(&h.entity).unwrap_or_default();
                (h, p)
            })
            .collect())
    }

    /// Entities holding the given external identifiers in the authority
    /// file named by `authority` (an abbreviation like "VIAF" or a
    /// property id like "P214").
    pub fn search_by_identifiers(
        &self,
        ids: &[&str],
        authority: &str,
        langsorder: &[&str],
    ) -> Result<Vec<IdentifierHit>> {
        let property = authority_property(authority)?;
        let ids = check_identifier_values(ids)?;
        let mut hits = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IDENTIFIER_CHUNK) {
            let query = build_identifiers_query(chunk, &property, langsorder);
            hits.extend(parse_identifier_hits(&self.sparql.query(&query)?));
        }
        Ok(hits)
    }

    /// All entities holding any identifier in the authority file named
    /// by `authority`, with those identifiers. When `classes` is given,
    /// rows not matching it are dropped after retrieval.
    pub fn search_by_authority(
        &self,
        authority: &str,
        langsorder: &[&str],
        classes: Option<&str>,
    ) -> Result<Vec<AuthorityHit>> {
        let property = authority_property(authority)?;
        let count_query = format!(
            "SELECT (COUNT(DISTINCT ?entity) AS ?count) WHERE {{?entity wdt:{} [].}}",
            property
        );
        let count = parse_count(&self.sparql.query(&count_query)?)?;
        tracing::debug!("{} entities hold a {} identifier", count, property);
        let mut hits = Vec::with_capacity(count as usize);
        let mut offset = 0;
        while offset < count {
            let query = build_authority_page_query(&property, langsorder, AUTHORITY_CHUNK, offset);
            hits.extend(parse_authority_hits(&self.sparql.query(&query)?, &property));
            offset += AUTHORITY_CHUNK as u64;
        }
        if let Some(classes) = classes {
            hits.retain(|h| matches_class(&h.instance_of, classes));
        }
        Ok(hits)
    }

    /// Number of entities matching a class expression: Q-ids joined
    /// with `|` (any of) or `&` (all of), the two not mixed.
    pub fn count_by_instance_of(&self, classes: &str) -> Result<u64> {
        let expr = check_class_expr(classes)?;
        parse_count(&self.sparql.query(&build_instanceof_count_query(&expr))?)
    }

    /// All entities matching a class expression, retrieved in pages
    /// ordered by entity id.
    pub fn search_by_instance_of(
        &self,
        classes: &str,
        langsorder: &[&str],
    ) -> Result<Vec<EntityHit>> {
        let expr = check_class_expr(classes)?;
        let count = parse_count(&self.sparql.query(&build_instanceof_count_query(&expr))?)?;
        tracing::debug!("{} entities match instance-of {}", count, classes);
        let mut hits = Vec::with_capacity(count as usize);
        let mut offset = 0;
        while offset < count {
            let query =
                build_instanceof_page_query(&expr, langsorder, INSTANCEOF_SEARCH_CHUNK, offset);
            hits.extend(parse_entity_hits(&self.sparql.query(&query)?));
            offset += INSTANCEOF_SEARCH_CHUNK as u64;
        }
        Ok(hits)
    }

    /// Entities whose label matches `text` under `mode`. `langs` names
    /// the languages searched and is mandatory for `Exact` and
    /// `StartsWith`; `InLabel` uses it to restrict the search, `Cirrus`
    /// ignores it. Extra `properties` are returned per hit the way
    /// [`property_values`](Self::property_values) does. When `classes`
    /// is given, rows not matching it are dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn search_by_label(
        &self,
        text: &str,
        mode: LabelSearchMode,
        langs: &[&str],
        langsorder: &[&str],
        classes: Option<&str>,
        properties: &[&str],
    ) -> Result<Vec<LabelHit>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("Empty search string".to_string()));
        }
        if langs.is_empty() && matches!(mode, LabelSearchMode::Exact | LabelSearchMode::StartsWith)
        {
            return Err(Error::InvalidInput(
                "Language list is required for exact and prefix label search".to_string(),
            ));
        }
        let props = if properties.is_empty() {
            Vec::new()
        } else {
            check_properties(properties)?
        };
        let query = build_label_search_query(text, mode, langs, langsorder, &props);
        let mut hits = parse_label_hits(&self.sparql.query(&query)?, &props);
        if let Some(classes) = classes {
            hits.retain(|h| matches_class(&h.instance_of, classes));
        }
        Ok(hits)
    }
}

fn check_item(id: &str) -> Result<String> {
    let ids = check_entities(&[id])?;
    let id = ids.into_iter().next().unwrap_or_default();
    if !id.starts_with('Q') {
        return Err(Error::InvalidInput(format!("Not an item id: '{}'", id)));
    }
    Ok(id)
}

fn check_identifier_values(ids: &[&str]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in ids {
        let id = raw.trim();
        if id.is_empty() {
            continue;
        }
        if id.contains('"') {
            return Err(Error::InvalidInput(format!("Invalid identifier: '{}'", id)));
        }
        if seen.insert(id.to_string()) {
            out.push(id.to_string());
        }
    }
    if out.is_empty() {
        return Err(Error::InvalidInput("Empty identifier list".to_string()));
    }
    Ok(out)
}

fn check_class_expr(classes: &str) -> Result<String> {
    let expr = classes.trim().to_string();
    if !CLASS_EXPR.is_match(&expr) || (expr.contains('|') && expr.contains('&')) {
        return Err(Error::InvalidInput(format!(
            "Invalid class expression: '{}'",
            classes
        )));
    }
    Ok(expr)
}

/// Escape a user string for embedding in a SPARQL literal.
fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\'")
}

// --- query builders ---------------------------------------------------

/// SELECT and SERVICE fragments adding entity labels, descriptions and
/// instance-of labels in the given fallback order. Empty when no
/// languages are requested.
struct LabelServiceParts {
    select: String,
    concat: String,
    service: String,
}

fn entity_label_service(langsorder: &[&str]) -> LabelServiceParts {
    if langsorder.is_empty() {
        return LabelServiceParts {
            select: String::new(),
            concat: String::new(),
            service: String::new(),
        };
    }
    LabelServiceParts {
        select: "?entityLabel ?entityDescription".to_string(),
        concat: "(GROUP_CONCAT(DISTINCT ?instancLabel; separator='|') as ?instanceofLabel)"
            .to_string(),
        service: format!(
            "SERVICE wikibase:label {{bd:serviceParam wikibase:language \"{}\".\n      ?entity rdfs:label ?entityLabel.\n      ?entity schema:description ?entityDescription.\n      ?instanc rdfs:label ?instancLabel.}}",
            langsorder.join(",")
        ),
    }
}

fn build_instance_of_query(entities: &[String]) -> String {
    format!(
        "SELECT ?entity\n\
         (GROUP_CONCAT(DISTINCT ?instanc;separator=\"|\") as ?instanceof)\n\
         WHERE {{\n\
         \x20 OPTIONAL {{\n\
         \x20   VALUES ?entity {{ {} }}\n\
         \x20   OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         \x20 }}\n\
         }} GROUP BY ?entity",
        values_clause(entities)
    )
}

fn build_wikipedias_query(entities: &[String], wikilangs: &[&str]) -> String {
    let filter = if wikilangs.is_empty() {
        String::new()
    } else {
        format!("FILTER(?lang IN ('{}'))", wikilangs.join("', '"))
    };
    format!(
        "SELECT DISTINCT ?entity\n\
         (GROUP_CONCAT(DISTINCT ?instanc;separator=\"|\") as ?instanceof)\n\
         (COUNT(DISTINCT ?page) as ?npages)\n\
         (GROUP_CONCAT(DISTINCT ?lang;separator=\"|\") as ?langs)\n\
         (GROUP_CONCAT(DISTINCT ?name;separator=\"|\") as ?names)\n\
         (GROUP_CONCAT(DISTINCT ?page;separator=\"|\") as ?pages)\n\
         WHERE {{\n\
         \x20 OPTIONAL {{\n\
         \x20   VALUES ?entity {{ {} }}\n\
         \x20   OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         \x20   OPTIONAL {{\n\
         \x20   ?page schema:about ?entity;\n\
         \x20         schema:inLanguage ?lang;\n\
         \x20         schema:name ?name;\n\
         \x20         schema:isPartOf [wikibase:wikiGroup \"wikipedia\"].\n\
         \x20         {}\n\
         \x20   }}\n\
         \x20 }}\n\
         }} GROUP BY ?entity",
        values_clause(entities),
        filter
    )
}

fn build_validity_query(entities: &[String]) -> String {
    format!(
        "SELECT ?entity ?valid\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof) ?redirection\n\
         WHERE {{\n\
         \x20 OPTIONAL {{\n\
         \x20   VALUES ?entity {{ {} }}\n\
         \x20   BIND(EXISTS{{?entity rdfs:label []}} || EXISTS{{?entity schema:description []}} AS ?valid).\n\
         \x20   OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         \x20   OPTIONAL {{?entity owl:sameAs ?redirection}}\n\
         \x20 }}\n\
         }} GROUP BY ?entity ?valid ?redirection",
        values_clause(entities)
    )
}

fn build_property_query(
    entities: &[String],
    properties: &[String],
    langsorder: &[&str],
    include_ids: bool,
) -> String {
    let with_labels = !langsorder.is_empty();
    let mut concats = Vec::new();
    let mut optionals = Vec::new();
    let mut service = Vec::new();
    if with_labels {
        service.push(format!(
            " SERVICE wikibase:label {{bd:serviceParam wikibase:language \"{}\".\n  ?instanc rdfs:label ?instancLabel.",
            langsorder.join(",")
        ));
        concats.push(
            "(GROUP_CONCAT(DISTINCT ?instancLabel; separator='|') as ?instanceofLabel)".to_string(),
        );
    }
    for p in properties {
        if include_ids {
            concats.push(format!(
                "(GROUP_CONCAT(DISTINCT ?{p}p;separator='|') as ?{p})"
            ));
        }
        if with_labels {
            concats.push(format!(
                "(GROUP_CONCAT(DISTINCT STR(?{p}label);separator='|') as ?{p}Label)"
            ));
            service.push(format!("  ?{p}p rdfs:label ?{p}label."));
        }
        optionals.push(format!("    OPTIONAL {{?entity wdt:{p} ?{p}p.}}"));
    }
    let mut service = service.join("\n");
    if !service.is_empty() {
        service.push('}');
    }
    format!(
        "SELECT ?entity\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof)\n\
         {}\n\
         WHERE {{\n\
         \x20 OPTIONAL {{\n\
         \x20   VALUES ?entity {{ {} }}\n\
         \x20   OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         {}\n\
         {}\n\
         \x20 }}\n\
         }} GROUP BY ?entity",
        concats.join("\n"),
        values_clause(entities),
        optionals.join("\n"),
        service
    )
}

fn build_geoloc_query(entities: &[String], langsorder: &[&str]) -> String {
    let (select, service, group_by) = if langsorder.is_empty() {
        (
            "?place (STR(SAMPLE(?clat)) as ?placeLat) (STR(SAMPLE(?clon)) as ?placeLon) ?country"
                .to_string(),
            String::new(),
            "?place ?country".to_string(),
        )
    } else {
        (
            "?place ?placeLabel (STR(SAMPLE(?clat)) as ?placeLat) (STR(SAMPLE(?clon)) as ?placeLon) ?country ?countryLabel"
                .to_string(),
            format!(
                "SERVICE wikibase:label {{bd:serviceParam wikibase:language \"{}\".\n    ?place rdfs:label ?placeLabel.\n    ?country rdfs:label ?countryLabel.}}",
                langsorder.join(",")
            ),
            "?place ?placeLabel ?country ?countryLabel".to_string(),
        )
    };
    format!(
        "SELECT DISTINCT {}\n\
         WHERE {{\n\
         \x20 OPTIONAL {{\n\
         \x20   VALUES ?place {{ {} }}\n\
         \x20   OPTIONAL {{?place wdt:P1366+ ?placelast.}}\n\
         \x20   OPTIONAL {{?place wdt:P625 ?c1.}}\n\
         \x20   OPTIONAL {{?placelast wdt:P625 ?c2.}}\n\
         \x20   BIND(COALESCE(?c1, ?c2) AS ?c).\n\
         \x20   BIND(geof:longitude(?c) AS ?clon)\n\
         \x20   BIND(geof:latitude(?c)  AS ?clat)\n\
         \x20   BIND(COALESCE(?placelast, ?place) AS ?actualplace).\n\
         \x20   OPTIONAL {{\n\
         \x20     ?actualplace wdt:P17 ?country.\n\
         \x20     ?country wdt:P31 ?instance.\n\
         \x20     FILTER (?instance in (wd:Q3624078, wd:Q7275, wd:Q6256)).\n\
         \x20     FILTER (?instance not in (wd:Q3024240, wd:Q28171280)).\n\
         \x20   }}\n\
         \x20 }}\n\
         \x20 {}\n\
         }} GROUP BY {}",
        select,
        values_clause(entities),
        service,
        group_by
    )
}

fn build_labels_descs_query(entities: &[String], terms: Terms, langsorder: &[&str]) -> String {
    let mut select = String::new();
    let mut triples = String::new();
    if terms.labels() {
        select.push_str(" (LANG(?label) as ?labellang) ?label");
        triples.push_str(" ?entity rdfs:label ?label.\n");
    }
    if terms.descriptions() {
        select.push_str(" (LANG(?description) as ?descriptionlang) ?description");
        triples.push_str(" ?entity schema:description ?description.\n");
    }
    format!(
        "SELECT ?entity{}\n\
         WHERE {{\n\
         \x20 VALUES ?entity {{{}}}\n\
         \x20 SERVICE wikibase:label {{\n\
         \x20   bd:serviceParam wikibase:language \"{}\".\n\
         {}\
         \x20 }}\n\
         }}",
        select,
        values_clause(entities),
        langsorder.join(","),
        triples
    )
}

fn build_occupation_page_query(
    occupation: &str,
    langsorder: &[&str],
    limit: usize,
    offset: u64,
) -> String {
    let parts = entity_label_service(langsorder);
    format!(
        "SELECT DISTINCT ?entity {}\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof)\n\
         {}\n\
         WITH {{\n\
         \x20   SELECT DISTINCT ?entity\n\
         \x20   WHERE {{?entity wdt:P106 wd:{}.}}\n\
         \x20   ORDER BY ?entity\n\
         \x20   LIMIT {} OFFSET {}\n\
         \x20   }} AS %results\n\
         WHERE {{\n\
         \x20  INCLUDE %results.\n\
         \x20  {}\n\
         \x20  OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         }} GROUP BY ?entity {}",
        parts.select, parts.concat, occupation, limit, offset, parts.service, parts.select
    )
}

fn build_identifiers_query(ids: &[String], property: &str, langsorder: &[&str]) -> String {
    let parts = entity_label_service(langsorder);
    let values = ids
        .iter()
        .map(|id| format!("\"{}\"", escape_literal(id)))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT DISTINCT ?id ?entity {}\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof)\n\
         {}\n\
         WHERE {{\n\
         \x20 OPTIONAL {{\n\
         \x20   VALUES ?id {{{}}}\n\
         \x20   OPTIONAL {{?entity wdt:{} ?id;\n\
         \x20                     wdt:P31 ?instanc.}}\n\
         \x20   {}\n\
         \x20 }}\n\
         }} GROUP BY ?id ?entity {}",
        parts.select, parts.concat, values, property, parts.service, parts.select
    )
}

fn build_authority_page_query(
    property: &str,
    langsorder: &[&str],
    limit: usize,
    offset: u64,
) -> String {
    let parts = entity_label_service(langsorder);
    format!(
        "SELECT DISTINCT ?entity {}\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof)\n\
         {}\n\
         (GROUP_CONCAT(DISTINCT STR(?authid);separator='|') as ?{})\n\
         WITH {{\n\
         \x20 SELECT DISTINCT ?entity ?authid WHERE {{?entity wdt:{} ?authid.}}\n\
         \x20 ORDER BY ?entity\n\
         \x20 LIMIT {} OFFSET {}\n\
         \x20 }} AS %results\n\
         WHERE {{\n\
         \x20 INCLUDE %results.\n\
         \x20 {}\n\
         \x20 OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         }} GROUP BY ?entity {}",
        parts.select, parts.concat, property, property, limit, offset, parts.service, parts.select
    )
}

/// Inner SELECT for one class expression: `|` becomes a VALUES over the
/// alternatives, `&` an object list requiring all of them.
fn instanceof_inner_select(expr: &str) -> String {
    if expr.contains('|') {
        let values = expr
            .split('|')
            .map(|q| format!("wd:{}", q))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "SELECT DISTINCT ?entity WHERE {{VALUES ?iof {{{}}} ?entity wdt:P31 ?iof}}",
            values
        )
    } else if expr.contains('&') {
        let objects = expr
            .split('&')
            .map(|q| format!("wd:{}", q))
            .collect::<Vec<_>>()
            .join(",");
        format!("SELECT DISTINCT ?entity WHERE {{?entity wdt:P31 {}}}", objects)
    } else {
        format!(
            "SELECT DISTINCT ?entity WHERE {{?entity wdt:P31 wd:{}}}",
            expr
        )
    }
}

fn build_instanceof_count_query(expr: &str) -> String {
    let inner = instanceof_inner_select(expr);
    format!(
        "SELECT (COUNT(DISTINCT ?entity) AS ?count) WHERE {{{{{}}}}}",
        inner
    )
}

fn build_instanceof_page_query(
    expr: &str,
    langsorder: &[&str],
    limit: usize,
    offset: u64,
) -> String {
    let parts = entity_label_service(langsorder);
    format!(
        "SELECT DISTINCT ?entity {}\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof)\n\
         {}\n\
         WITH {{\n\
         \x20 {}\n\
         \x20 ORDER BY ?entity\n\
         \x20 LIMIT {} OFFSET {}\n\
         \x20 }} AS %results\n\
         WHERE {{\n\
         \x20 INCLUDE %results.\n\
         \x20 OPTIONAL {{?entity wdt:P31 ?instanc.}}\n\
         \x20 {}\n\
         }} GROUP BY ?entity {}",
        parts.select,
        parts.concat,
        instanceof_inner_select(expr),
        limit,
        offset,
        parts.service,
        parts.select
    )
}

fn build_label_search_query(
    text: &str,
    mode: LabelSearchMode,
    langs: &[&str],
    langsorder: &[&str],
    properties: &[String],
) -> String {
    let mut prop_concats = Vec::new();
    let mut prop_optionals = Vec::new();
    let mut prop_labels = Vec::new();
    for p in properties {
        prop_concats.push(format!(
            "(GROUP_CONCAT(DISTINCT ?{p}p;separator='|') as ?{p})"
        ));
        if !langsorder.is_empty() {
            prop_concats.push(format!(
                "(GROUP_CONCAT(DISTINCT STR(?{p}label);separator='|') as ?{p}Label)"
            ));
            prop_labels.push(format!("?{p}p rdfs:label ?{p}label."));
        }
        prop_optionals.push(format!("OPTIONAL {{?entity wdt:{p} ?{p}p.}}"));
    }

    let (select_terms, concat_lines, tail) = if langsorder.is_empty() {
        (String::new(), prop_concats.join("\n"), prop_optionals.join("\n"))
    } else {
        let mut concat =
            "(GROUP_CONCAT(DISTINCT ?instancLabel; separator='|') as ?instanceofLabel)".to_string();
        if !prop_concats.is_empty() {
            concat.push('\n');
            concat.push_str(&prop_concats.join("\n"));
        }
        let tail = format!(
            "{}\n  SERVICE wikibase:label {{bd:serviceParam wikibase:language \"{}\".\n      ?entity rdfs:label ?entityLabel.\n      ?entity schema:description ?entityDescription.\n      ?instanc rdfs:label ?instancLabel.\n      {}}}",
            prop_optionals.join("\n"),
            langsorder.join(","),
            prop_labels.join("\n")
        );
        (
            "?entityLabel ?entityDescription".to_string(),
            concat,
            tail,
        )
    };

    let mut query = format!(
        "SELECT DISTINCT ?entity {}\n\
         (GROUP_CONCAT(DISTINCT ?instanc; separator='|') as ?instanceof)\n\
         {}\n",
        select_terms, concat_lines
    );

    match mode {
        LabelSearchMode::Exact => {
            let text = escape_literal(text);
            let labels = langs
                .iter()
                .map(|l| format!(" {{?entity rdfs:label \"{}\"@{}}}", text, l))
                .collect::<Vec<_>>()
                .join("\nUNION\n");
            let aliases = langs
                .iter()
                .map(|l| format!(" {{?entity skos:altLabel \"{}\"@{}}}", text, l))
                .collect::<Vec<_>>()
                .join("\nUNION\n");
            query.push_str(&format!("WHERE {{\n  {}\n  UNION\n  {}\n", labels, aliases));
        }
        LabelSearchMode::StartsWith => {
            let text = escape_literal(text);
            let services = langs
                .iter()
                .map(|l| {
                    format!(
                        "{{\n       SERVICE wikibase:mwapi {{\n         bd:serviceParam wikibase:api \"EntitySearch\";\n                         wikibase:endpoint \"www.wikidata.org\";\n                         mwapi:language \"{}\";\n                         mwapi:search \"{}\".\n         ?entity wikibase:apiOutputItem mwapi:item.}}\n      }}",
                        l, text
                    )
                })
                .collect::<Vec<_>>()
                .join("\n    UNION\n    ");
            query.push_str(&format!(
                "WITH {{\n    SELECT DISTINCT ?entity\n    WHERE {{\n      {}\n    }}\n  }} AS %results\n  WHERE {{\n    INCLUDE %results",
                services
            ));
        }
        LabelSearchMode::InLabel | LabelSearchMode::Cirrus => {
            let mut search = escape_literal(text);
            if mode == LabelSearchMode::InLabel {
                search = format!("inlabel:{}", search);
                if !langs.is_empty() {
                    search.push('@');
                    search.push_str(&langs.join(","));
                }
            } else if !langs.is_empty() {
                tracing::debug!("language list is ignored in cirrus label search");
            }
            query.push_str(&format!(
                "WHERE {{\n  SERVICE wikibase:mwapi {{\n    bd:serviceParam wikibase:api \"Search\";\n                    wikibase:endpoint \"www.wikidata.org\";\n                    mwapi:srsearch '{}'.\n    ?entity wikibase:apiOutputItem mwapi:title.\n  }}",
                search
            ));
        }
    }

    query.push_str(&format!(
        "\n  OPTIONAL {{?entity wdt:P31 ?instanc.}}\n  {}\n}} GROUP BY ?entity {}",
        tail, select_terms
    ));
    query
}

// --- response row mapping ---------------------------------------------

fn parse_instance_of(results: &SparqlResults, classes: Option<&str>) -> Vec<InstanceOfRow> {
    results
        .rows
        .iter()
        .map(|row| {
            let instance_of = split_concat_entities(binding(row, "instanceof"));
            let matches = classes.map(|c| matches_class(&instance_of, c));
            InstanceOfRow {
                entity: entity_id(binding(row, "entity")).to_string(),
                instance_of,
                matches,
            }
        })
        .collect()
}

fn parse_wikipedias(results: &SparqlResults, wikilangs: &[&str]) -> Vec<WikipediaPagesRow> {
    results
        .rows
        .iter()
        .map(|row| {
            let langs = split_concat(binding(row, "langs"));
            let names = split_concat(binding(row, "names"));
            let urls = split_concat(binding(row, "pages"));
            if langs.len() != names.len() || langs.len() != urls.len() {
                tracing::warn!(
                    "misaligned sitelink columns for {}",
                    binding(row, "entity")
                );
            }
            let mut pages: Vec<WikipediaPage> = langs
                .into_iter()
                .zip(names)
                .zip(urls)
                .map(|((lang, title), url)| WikipediaPage { lang, title, url })
                .collect();
            if !wikilangs.is_empty() && pages.len() > 1 {
                pages.sort_by_key(|p| {
                    wikilangs
                        .iter()
                        .position(|l| *l == p.lang)
                        .unwrap_or(usize::MAX)
                });
            }
            WikipediaPagesRow {
                entity: entity_id(binding(row, "entity")).to_string(),
                instance_of: split_concat_entities(binding(row, "instanceof")),
                pages,
            }
        })
        .collect()
}

fn parse_validity(results: &SparqlResults) -> Vec<ValidityRow> {
    results
        .rows
        .iter()
        .map(|row| {
            let redirection = binding(row, "redirection");
            ValidityRow {
                entity: entity_id(binding(row, "entity")).to_string(),
                valid: binding(row, "valid") == "true",
                instance_of: split_concat_entities(binding(row, "instanceof")),
                redirects_to: if redirection.is_empty() {
                    None
                } else {
                    Some(entity_id(redirection).to_string())
                },
            }
        })
        .collect()
}

fn parse_property_rows(
    results: &SparqlResults,
    properties: &[String],
    include_ids: bool,
    with_labels: bool,
) -> Vec<PropertyRow> {
    results
        .rows
        .iter()
        .map(|row| {
            let mut values = BTreeMap::new();
            for p in properties {
                let ids = if include_ids {
                    split_concat_entities(binding(row, p))
                } else {
                    Vec::new()
                };
                let labels = if with_labels {
                    split_concat(binding(row, &format!("{}Label", p)))
                } else {
                    Vec::new()
                };
                values.insert(p.clone(), PropertyValues { ids, labels });
            }
            PropertyRow {
                entity: entity_id(binding(row, "entity")).to_string(),
                instance_of: split_concat_entities(binding(row, "instanceof")),
                instance_of_labels: split_concat(binding(row, "instanceofLabel")),
                properties: values,
            }
        })
        .collect()
}

fn parse_geoloc(results: &SparqlResults, with_labels: bool) -> Vec<GeolocRow> {
    results
        .rows
        .iter()
        .map(|row| {
            let country = binding(row, "country");
            GeolocRow {
                place: entity_id(binding(row, "place")).to_string(),
                place_label: if with_labels {
                    row.get("placeLabel").cloned()
                } else {
                    None
                },
                lat: binding(row, "placeLat").parse().ok(),
                lon: binding(row, "placeLon").parse().ok(),
                country: if country.is_empty() {
                    None
                } else {
                    Some(entity_id(country).to_string())
                },
                country_label: if with_labels {
                    row.get("countryLabel").cloned()
                } else {
                    None
                },
            }
        })
        .collect()
}

fn parse_labels_descs(results: &SparqlResults, terms: Terms) -> Vec<LabelDescRow> {
    results
        .rows
        .iter()
        .map(|row| LabelDescRow {
            entity: entity_id(binding(row, "entity")).to_string(),
            label_lang: if terms.labels() {
                row.get("labellang").cloned()
            } else {
                None
            },
            label: if terms.labels() {
                row.get("label").cloned()
            } else {
                None
            },
            description_lang: if terms.descriptions() {
                row.get("descriptionlang").cloned()
            } else {
                None
            },
            description: if terms.descriptions() {
                row.get("description").cloned()
            } else {
                None
            },
        })
        .collect()
}

fn entity_hit(row: &Row) -> EntityHit {
    EntityHit {
        entity: entity_id(binding(row, "entity")).to_string(),
        label: row.get("entityLabel").cloned(),
        description: row.get("entityDescription").cloned(),
        instance_of: split_concat_entities(binding(row, "instanceof")),
        instance_of_labels: split_concat(binding(row, "instanceofLabel")),
    }
}

fn parse_entity_hits(results: &SparqlResults) -> Vec<EntityHit> {
    results.rows.iter().map(entity_hit).collect()
}

fn parse_identifier_hits(results: &SparqlResults) -> Vec<IdentifierHit> {
    results
        .rows
        .iter()
        .map(|row| {
            let entity = binding(row, "entity");
            IdentifierHit {
                id: binding(row, "id").to_string(),
                entity: if entity.is_empty() {
                    None
                } else {
                    Some(entity_id(entity).to_string())
                },
                label: row.get("entityLabel").cloned(),
                description: row.get("entityDescription").cloned(),
                instance_of: split_concat_entities(binding(row, "instanceof")),
                instance_of_labels: split_concat(binding(row, "instanceofLabel")),
            }
        })
        .collect()
}

fn parse_authority_hits(results: &SparqlResults, property: &str) -> Vec<AuthorityHit> {
    results
        .rows
        .iter()
        .map(|row| {
            let hit = entity_hit(row);
            AuthorityHit {
                entity: hit.entity,
                label: hit.label,
                description: hit.description,
                instance_of: hit.instance_of,
                instance_of_labels: hit.instance_of_labels,
                authority_ids: split_concat(binding(row, property)),
            }
        })
        .collect()
}

fn parse_label_hits(results: &SparqlResults, properties: &[String]) -> Vec<LabelHit> {
    results
        .rows
        .iter()
        .map(|row| {
            let hit = entity_hit(row);
            let mut values = BTreeMap::new();
            for p in properties {
                values.insert(
                    p.clone(),
                    PropertyValues {
                        ids: split_concat_entities(binding(row, p)),
                        labels: split_concat(binding(row, &format!("{}Label", p))),
                    },
                );
            }
            LabelHit {
                entity: hit.entity,
                label: hit.label,
                description: hit.description,
                instance_of: hit.instance_of,
                instance_of_labels: hit.instance_of_labels,
                properties: values,
            }
        })
        .collect()
}

fn parse_count(results: &SparqlResults) -> Result<u64> {
    let row = results
        .rows
        .first()
        .ok_or_else(|| Error::Parse("Empty count result".to_string()))?;
    binding(row, "count")
        .parse()
        .map_err(|_| Error::Parse(format!("Invalid count: '{}'", binding(row, "count"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::parse_json;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_instance_of_query() {
        let q = build_instance_of_query(&ids(&["Q5682", "Q8605"]));
        let expected = "SELECT ?entity\n\
            (GROUP_CONCAT(DISTINCT ?instanc;separator=\"|\") as ?instanceof)\n\
            WHERE {\n\
            \x20 OPTIONAL {\n\
            \x20   VALUES ?entity { wd:Q5682 wd:Q8605 }\n\
            \x20   OPTIONAL {?entity wdt:P31 ?instanc.}\n\
            \x20 }\n\
            } GROUP BY ?entity";
        assert_eq!(q, expected);
    }

    #[test]
    fn test_build_wikipedias_query_language_filter() {
        let q = build_wikipedias_query(&ids(&["Q5682"]), &["es", "en"]);
        assert!(q.contains("FILTER(?lang IN ('es', 'en'))"));
        assert!(q.contains("schema:isPartOf [wikibase:wikiGroup \"wikipedia\"]."));
        let q = build_wikipedias_query(&ids(&["Q5682"]), &[]);
        assert!(!q.contains("FILTER(?lang IN"));
    }

    #[test]
    fn test_build_validity_query() {
        let q = build_validity_query(&ids(&["Q5682"]));
        assert!(q.contains(
            "BIND(EXISTS{?entity rdfs:label []} || EXISTS{?entity schema:description []} AS ?valid)."
        ));
        assert!(q.contains("OPTIONAL {?entity owl:sameAs ?redirection}"));
        assert!(q.ends_with("} GROUP BY ?entity ?valid ?redirection"));
    }

    #[test]
    fn test_build_property_query() {
        let q = build_property_query(&ids(&["Q381800"]), &ids(&["P21", "P569"]), &["en", "es"], true);
        assert!(q.contains("(GROUP_CONCAT(DISTINCT ?P21p;separator='|') as ?P21)"));
        assert!(q.contains("(GROUP_CONCAT(DISTINCT STR(?P21label);separator='|') as ?P21Label)"));
        assert!(q.contains("OPTIONAL {?entity wdt:P569 ?P569p.}"));
        assert!(q.contains("bd:serviceParam wikibase:language \"en,es\""));
        assert!(q.contains("?P569p rdfs:label ?P569label."));
        // Entity labels are not part of this operation
        assert!(!q.contains("?entityLabel"));
    }

    #[test]
    fn test_build_property_query_ids_only() {
        let q = build_property_query(&ids(&["Q381800"]), &ids(&["P19"]), &[], true);
        assert!(q.contains("(GROUP_CONCAT(DISTINCT ?P19p;separator='|') as ?P19)"));
        assert!(!q.contains("SERVICE wikibase:label"));
        assert!(!q.contains("?P19Label"));
    }

    #[test]
    fn test_build_geoloc_query() {
        let q = build_geoloc_query(&ids(&["Q90"]), &[]);
        assert!(q.contains("OPTIONAL {?place wdt:P1366+ ?placelast.}"));
        assert!(q.contains("OPTIONAL {?placelast wdt:P625 ?c2.}"));
        assert!(q.contains("FILTER (?instance in (wd:Q3624078, wd:Q7275, wd:Q6256))."));
        assert!(q.contains("GROUP BY ?place ?country"));
        assert!(!q.contains("?placeLabel"));

        let q = build_geoloc_query(&ids(&["Q90"]), &["es"]);
        assert!(q.contains("?place rdfs:label ?placeLabel."));
        assert!(q.contains("GROUP BY ?place ?placeLabel ?country ?countryLabel"));
    }

    #[test]
    fn test_build_labels_descs_query() {
        let q = build_labels_descs_query(&ids(&["Q57860", "P569"]), Terms::Both, &["se", "es", "en"]);
        assert!(q.contains("SELECT ?entity (LANG(?label) as ?labellang) ?label (LANG(?description) as ?descriptionlang) ?description"));
        assert!(q.contains("VALUES ?entity {wd:Q57860 wd:P569}"));
        assert!(q.contains("bd:serviceParam wikibase:language \"se,es,en\"."));

        let q = build_labels_descs_query(&ids(&["Q57860"]), Terms::Labels, &["en"]);
        assert!(!q.contains("?description"));
    }

    #[test]
    fn test_build_occupation_page_query() {
        let q = build_occupation_page_query("Q2306091", &["en", "es"], 10_000, 20_000);
        assert!(q.contains("WHERE {?entity wdt:P106 wd:Q2306091.}"));
        assert!(q.contains("LIMIT 10000 OFFSET 20000"));
        assert!(q.contains("} AS %results"));
        assert!(q.contains("INCLUDE %results."));
        assert!(q.contains("?entity rdfs:label ?entityLabel."));
        assert!(q.ends_with("} GROUP BY ?entity ?entityLabel ?entityDescription"));
    }

    #[test]
    fn test_build_identifiers_query() {
        let q = build_identifiers_query(&ids(&["4938246", "36092166"]), "P214", &[]);
        assert!(q.contains("VALUES ?id {\"4938246\" \"36092166\"}"));
        assert!(q.contains("OPTIONAL {?entity wdt:P214 ?id;"));
        assert!(q.contains("wdt:P31 ?instanc.}"));
        assert!(q.ends_with("} GROUP BY ?id ?entity "));
    }

    #[test]
    fn test_build_authority_page_query() {
        let q = build_authority_page_query("P4439", &["en"], 10_000, 0);
        assert!(q.contains("(GROUP_CONCAT(DISTINCT STR(?authid);separator='|') as ?P4439)"));
        assert!(q.contains("SELECT DISTINCT ?entity ?authid WHERE {?entity wdt:P4439 ?authid.}"));
    }

    #[test]
    fn test_instanceof_inner_select() {
        assert_eq!(
            instanceof_inner_select("Q229390"),
            "SELECT DISTINCT ?entity WHERE {?entity wdt:P31 wd:Q229390}"
        );
        assert_eq!(
            instanceof_inner_select("Q5|Q6256"),
            "SELECT DISTINCT ?entity WHERE {VALUES ?iof {wd:Q5 wd:Q6256} ?entity wdt:P31 ?iof}"
        );
        assert_eq!(
            instanceof_inner_select("Q5&Q6256"),
            "SELECT DISTINCT ?entity WHERE {?entity wdt:P31 wd:Q5,wd:Q6256}"
        );
    }

    #[test]
    fn test_check_class_expr() {
        assert!(check_class_expr("Q5").is_ok());
        assert!(check_class_expr("Q5|Q6256|Q7275").is_ok());
        assert!(check_class_expr("Q5&Q215627").is_ok());
        // Mixing the two operators is ambiguous
        assert!(check_class_expr("Q5|Q6256&Q7275").is_err());
        assert!(check_class_expr("humans").is_err());
        assert!(check_class_expr("Q5|").is_err());
    }

    #[test]
    fn test_build_label_search_exact() {
        let q = build_label_search_query("Iranzo", LabelSearchMode::Exact, &["es", "en"], &[], &[]);
        assert!(q.contains(" {?entity rdfs:label \"Iranzo\"@es}"));
        assert!(q.contains(" {?entity rdfs:label \"Iranzo\"@en}"));
        assert!(q.contains(" {?entity skos:altLabel \"Iranzo\"@es}"));
        assert!(q.contains("UNION"));
    }

    #[test]
    fn test_build_label_search_startswith() {
        let q = build_label_search_query("Iranzo", LabelSearchMode::StartsWith, &["en"], &["en"], &[]);
        assert!(q.contains("bd:serviceParam wikibase:api \"EntitySearch\""));
        assert!(q.contains("mwapi:language \"en\""));
        assert!(q.contains("mwapi:search \"Iranzo\""));
        assert!(q.contains("INCLUDE %results"));
    }

    #[test]
    fn test_build_label_search_inlabel() {
        let q = build_label_search_query("Iranzo", LabelSearchMode::InLabel, &["es", "en"], &[], &[]);
        assert!(q.contains("mwapi:srsearch 'inlabel:Iranzo@es,en'"));
        let q = build_label_search_query("Iranzo", LabelSearchMode::InLabel, &[], &[], &[]);
        assert!(q.contains("mwapi:srsearch 'inlabel:Iranzo'"));
    }

    #[test]
    fn test_build_label_search_cirrus_keeps_string() {
        let q = build_label_search_query(
            "\"Antonio Saura\"",
            LabelSearchMode::Cirrus,
            &[],
            &[],
            &[],
        );
        assert!(q.contains("mwapi:srsearch '\\\"Antonio Saura\\\"'"));
    }

    #[test]
    fn test_build_label_search_with_properties() {
        let q = build_label_search_query(
            "Saura",
            LabelSearchMode::Exact,
            &["en"],
            &["en"],
            &ids(&["P21"]),
        );
        assert!(q.contains("(GROUP_CONCAT(DISTINCT ?P21p;separator='|') as ?P21)"));
        assert!(q.contains("OPTIONAL {?entity wdt:P21 ?P21p.}"));
        assert!(q.contains("?P21p rdfs:label ?P21label."));
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_literal("it's"), r"it\'s");
        assert_eq!(escape_literal(r"a\b"), r"a\\b");
    }

    const INSTANCE_OF_FIXTURE: &str = r#"{
      "head": { "vars": ["entity", "instanceof"] },
      "results": { "bindings": [
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q5682" },
          "instanceof": { "type": "literal", "value": "http://www.wikidata.org/entity/Q5" } },
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q3620165" },
          "instanceof": { "type": "literal", "value": "http://www.wikidata.org/entity/Q2175765|http://www.wikidata.org/entity/Q22808404" } },
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q115637688" },
          "instanceof": { "type": "literal", "value": "" } }
      ] }
    }"#;

    #[test]
    fn test_parse_instance_of() {
        let results = parse_json(INSTANCE_OF_FIXTURE).unwrap();
        let rows = parse_instance_of(&results, Some("Q5"));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].entity, "Q5682");
        assert_eq!(rows[0].instance_of, vec!["Q5"]);
        assert_eq!(rows[0].matches, Some(true));
        assert_eq!(rows[1].instance_of, vec!["Q2175765", "Q22808404"]);
        assert_eq!(rows[1].matches, Some(false));
        assert!(rows[2].instance_of.is_empty());

        let rows = parse_instance_of(&results, None);
        assert_eq!(rows[0].matches, None);
    }

    const VALIDITY_FIXTURE: &str = r#"{
      "head": { "vars": ["entity", "valid", "instanceof", "redirection"] },
      "results": { "bindings": [
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q5682" },
          "valid": { "type": "literal", "value": "true" },
          "instanceof": { "type": "literal", "value": "http://www.wikidata.org/entity/Q5" } },
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q105660123" },
          "valid": { "type": "literal", "value": "false" },
          "redirection": { "type": "uri", "value": "http://www.wikidata.org/entity/Q97352588" } }
      ] }
    }"#;

    #[test]
    fn test_parse_validity() {
        let results = parse_json(VALIDITY_FIXTURE).unwrap();
        let rows = parse_validity(&results);
        assert!(rows[0].valid);
        assert_eq!(rows[0].redirects_to, None);
        assert!(!rows[1].valid);
        assert_eq!(rows[1].redirects_to.as_deref(), Some("Q97352588"));
    }

    const WIKIPEDIAS_FIXTURE: &str = r#"{
      "head": { "vars": ["entity", "instanceof", "npages", "langs", "names", "pages"] },
      "results": { "bindings": [
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q5682" },
          "instanceof": { "type": "literal", "value": "http://www.wikidata.org/entity/Q5" },
          "npages": { "type": "literal", "value": "2" },
          "langs": { "type": "literal", "value": "en|es" },
          "names": { "type": "literal", "value": "Miguel de Cervantes|Miguel de Cervantes " },
          "pages": { "type": "literal", "value": "https://en.wikipedia.org/wiki/Miguel_de_Cervantes|https://es.wikipedia.org/wiki/Miguel_de_Cervantes" } }
      ] }
    }"#;

    #[test]
    fn test_parse_wikipedias_reorders_by_language() {
        let results = parse_json(WIKIPEDIAS_FIXTURE).unwrap();
        let rows = parse_wikipedias(&results, &["es", "en"]);
        assert_eq!(rows[0].pages.len(), 2);
        assert_eq!(rows[0].pages[0].lang, "es");
        assert_eq!(rows[0].pages[1].lang, "en");

        let rows = parse_wikipedias(&results, &[]);
        assert_eq!(rows[0].pages[0].lang, "en");
    }

    const GEOLOC_FIXTURE: &str = r#"{
      "head": { "vars": ["place", "placeLat", "placeLon", "country"] },
      "results": { "bindings": [
        { "place": { "type": "uri", "value": "http://www.wikidata.org/entity/Q15695" },
          "placeLat": { "type": "literal", "value": "40.965" },
          "placeLon": { "type": "literal", "value": "-5.664166666" },
          "country": { "type": "uri", "value": "http://www.wikidata.org/entity/Q29" } },
        { "place": { "type": "uri", "value": "http://www.wikidata.org/entity/Q18097" },
          "country": { "type": "uri", "value": "http://www.wikidata.org/entity/Q423" } },
        { "place": { "type": "uri", "value": "http://www.wikidata.org/entity/Q18097" },
          "country": { "type": "uri", "value": "http://www.wikidata.org/entity/Q884" } }
      ] }
    }"#;

    #[test]
    fn test_parse_geoloc() {
        let results = parse_json(GEOLOC_FIXTURE).unwrap();
        let rows = parse_geoloc(&results, false);
        assert_eq!(rows[0].place, "Q15695");
        assert_eq!(rows[0].lat, Some(40.965));
        assert_eq!(rows[0].country.as_deref(), Some("Q29"));
        assert_eq!(rows[1].lat, None);
    }

    const HITS_FIXTURE: &str = r#"{
      "head": { "vars": ["entity", "entityLabel", "entityDescription", "instanceof", "instanceofLabel"] },
      "results": { "bindings": [
        { "entity": { "type": "uri", "value": "http://www.wikidata.org/entity/Q1084790" },
          "entityLabel": { "type": "literal", "value": "Christoph Ehmann" },
          "entityDescription": { "type": "literal", "value": "German sociologist" },
          "instanceof": { "type": "literal", "value": "http://www.wikidata.org/entity/Q5" },
          "instanceofLabel": { "type": "literal", "value": "human" } }
      ] }
    }"#;

    #[test]
    fn test_parse_entity_hits() {
        let results = parse_json(HITS_FIXTURE).unwrap();
        let hits = parse_entity_hits(&results);
        assert_eq!(hits[0].entity, "Q1084790");
        assert_eq!(hits[0].label.as_deref(), Some("Christoph Ehmann"));
        assert_eq!(hits[0].instance_of, vec!["Q5"]);
        assert_eq!(hits[0].instance_of_labels, vec!["human"]);
    }

    const COUNT_FIXTURE: &str = r#"{
      "head": { "vars": ["count"] },
      "results": { "bindings": [
        { "count": { "type": "literal", "value": "19027" } }
      ] }
    }"#;

    #[test]
    fn test_parse_count() {
        let results = parse_json(COUNT_FIXTURE).unwrap();
        assert_eq!(parse_count(&results).unwrap(), 19027);
        let empty = SparqlResults::default();
        assert!(parse_count(&empty).is_err());
    }

    #[test]
    fn test_check_identifier_values() {
        let v = check_identifier_values(&["4938246", " 4938246 ", "36092166"]).unwrap();
        assert_eq!(v, vec!["4938246", "36092166"]);
        assert!(check_identifier_values(&[""]).is_err());
        assert!(check_identifier_values(&["a\"b"]).is_err());
    }
}
