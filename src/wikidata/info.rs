//! Entity dossiers via `wbgetentities`
//!
//! One call per batch of fifty entities against www.wikidata.org
//! returns labels, descriptions, claims and sitelinks. The claims of a
//! fixed per-domain property list are decoded into plain strings, the
//! entity-valued ones are resolved to labels with a follow-up Query
//! Service call, and birth/death places get coordinates and countries
//! the way [`WdqsClient::geolocation`] reports them.

use super::query::{GeolocRow, Terms, WdqsClient};
use super::check_entities;
use crate::error::{Error, Result};
use crate::mediawiki::{ActionApiClient, MW_LIMIT};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

lazy_static! {
    static ref TRAILING_UNIT: Regex = Regex::new(r" : (Q\d+)$").unwrap();
    static ref EMBEDDED_ITEM: Regex = Regex::new(r"\[(Q\d+)\]").unwrap();
}

/// Which property list a dossier decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSet {
    /// People: dates and places of birth and death, occupations,
    /// works, awards, authority identifiers.
    Person,
    /// Audiovisual works: credits, production data, review scores.
    Film,
}

impl FieldSet {
    /// Property to field-name table, in decode order.
    fn fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            FieldSet::Person => &[
                ("P31", "instanceof"),
                ("P18", "pic"),
                ("P21", "sex"),
                ("P69", "educatedat"),
                ("P106", "occupation"),
                ("P101", "fieldofwork"),
                ("P135", "movement"),
                ("P136", "genre"),
                ("P737", "influencedby"),
                ("P800", "notablework"),
                ("P463", "memberof"),
                ("P166", "award"),
                ("P214", "viafid"),
                ("P950", "bneid"),
                ("P4439", "mncarsid"),
                ("P19", "bplace"),
                ("P20", "dplace"),
                ("P569", "bdate"),
                ("P570", "ddate"),
            ],
            FieldSet::Film => &[
                ("P31", "instanceof"),
                ("P577", "pubdate"),
                ("P3383", "poster"),
                ("P18", "pic"),
                ("P10", "video"),
                ("P1476", "title"),
                ("P2047", "duration"),
                ("P144", "basedon"),
                ("P135", "movement"),
                ("P136", "genre"),
                ("P495", "country"),
                ("P364", "originallanguage"),
                ("P57", "director"),
                ("P58", "screenwriter"),
                ("P161", "castmember"),
                ("P725", "voiceactor"),
                ("P1431", "executiveproducer"),
                ("P344", "photographdirector"),
                ("P1040", "filmeditor"),
                ("P2554", "productiondesigner"),
                ("P86", "composer"),
                ("P162", "producer"),
                ("P272", "productioncompany"),
                ("P462", "color"),
                ("P180", "depicts"),
                ("P921", "mainsubject"),
                ("P166", "award"),
                ("P444", "reviewscore"),
                ("P214", "VIAF"),
                ("P480", "FilmAffinity"),
                ("P345", "IMDb"),
            ],
        }
    }

    /// Properties where only the best-referenced statement is kept.
    fn single_valued(self) -> &'static [&'static str] {
        match self {
            FieldSet::Person => &["P19", "P20", "P569", "P570"],
            FieldSet::Film => &["P577", "P1476", "P2047"],
        }
    }

    /// Fields holding Commons file names, rewritten to download URLs.
    fn commons_files(self) -> &'static [&'static str] {
        match self {
            FieldSet::Person => &["pic"],
            FieldSet::Film => &["poster", "pic", "video"],
        }
    }

    /// Date fields that also yield a `*year` derived field.
    fn date_fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            FieldSet::Person => &[("bdate", "byear"), ("ddate", "dyear")],
            FieldSet::Film => &[("pubdate", "pubyear")],
        }
    }

    /// Properties whose entity values are resolved through the
    /// geolocation query instead of the plain label lookup.
    fn place_fields(self) -> &'static [&'static str] {
        match self {
            FieldSet::Person => &["bplace", "dplace"],
            FieldSet::Film => &[],
        }
    }
}

/// Existence of a dossier's entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityStatus {
    Ok,
    Missing,
    /// The entity was merged; all dossier data is about the target.
    Redirect(String),
}

/// Decoded values of one field. `ids` carries the raw Q-ids when the
/// claim is entity-valued, `values` the decoded or label form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldValue {
    pub ids: Vec<String>,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityDossier {
    pub entity: String,
    pub status: EntityStatus,
    pub label_lang: Option<String>,
    pub label: Option<String>,
    pub description_lang: Option<String>,
    pub description: Option<String>,
    /// Keyed by the field names of the chosen [`FieldSet`].
    pub fields: BTreeMap<String, FieldValue>,
    /// Coordinates and country per place entity referenced by the
    /// place fields.
    pub places: BTreeMap<String, GeolocRow>,
    /// Wikipedia page URLs, in `wikilangs` order when given.
    pub wikipedias: Vec<String>,
}

pub struct EntityInfoClient {
    api: ActionApiClient,
    wdqs: WdqsClient,
}

impl Default for EntityInfoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityInfoClient {
    pub fn new() -> Self {
        Self {
            api: ActionApiClient::wikidata(),
            wdqs: WdqsClient::new(),
        }
    }

    /// Dossier per entity. `langsorder` is the label fallback order
    /// (English is appended when absent); `wikilangs` restricts and
    /// orders the Wikipedia links, empty meaning all languages.
    pub fn entity_info(
        &self,
        entities: &[&str],
        set: FieldSet,
        langsorder: &[&str],
        wikilangs: &[&str],
    ) -> Result<Vec<EntityDossier>> {
        let ids = check_entities(entities)?;
        let mut langs: Vec<&str> = langsorder.to_vec();
        if !langs.contains(&"en") {
            langs.push("en");
        }
        let sitefilter: Option<String> = if wikilangs.is_empty() {
            None
        } else {
            Some(
                wikilangs
                    .iter()
                    .map(|l| format!("{}wiki", l))
                    .collect::<Vec<_>>()
                    .join("|"),
            )
        };

        let mut dossiers = Vec::with_capacity(ids.len());
        let mut label_qids = BTreeSet::new();
        let mut place_qids = BTreeSet::new();
        for batch in ids.chunks(MW_LIMIT) {
            let ids_param = batch.join("|");
            let mut params: Vec<(&str, &str)> = vec![
                ("format", "json"),
                ("formatversion", "2"),
                ("action", "wbgetentities"),
                ("props", "labels|descriptions|claims|sitelinks"),
                ("ids", &ids_param),
            ];
            if let Some(filter) = &sitefilter {
                params.push(("sitefilter", filter));
            }
            let j = self.api.get(&params)?;
            let entities = j
                .get("entities")
                .and_then(Value::as_object)
                .ok_or_else(|| Error::Parse("No entities in response".to_string()))?;
            for (qid, data) in entities {
                dossiers.push(decode_entity(
                    qid,
                    data,
                    set,
                    &langs,
                    wikilangs,
                    &mut label_qids,
                    &mut place_qids,
                ));
            }
        }

        self.resolve_places(&mut dossiers, set, &place_qids, &langs)?;
        self.resolve_labels(&mut dossiers, set, &label_qids, &langs)?;
        Ok(dossiers)
    }

    fn resolve_places(
        &self,
        dossiers: &mut [EntityDossier],
        set: FieldSet,
        place_qids: &BTreeSet<String>,
        langs: &[&str],
    ) -> Result<()> {
        if place_qids.is_empty() {
            return Ok(());
        }
        tracing::debug!("resolving {} place entities", place_qids.len());
        let refs: Vec<&str> = place_qids.iter().map(String::as_str).collect();
        let places: BTreeMap<String, GeolocRow> = self
            .wdqs
            .geolocation(&refs, langs)?
            .into_iter()
            .map(|r| (r.place.clone(), r))
            .collect();
        for dossier in dossiers.iter_mut() {
            for field in set.place_fields() {
                let place_ids = match dossier.fields.get(*field) {
                    Some(f) => f.ids.clone(),
                    None => continue,
                };
                let mut labels = Vec::new();
                for id in &place_ids {
                    if let Some(row) = places.get(id) {
                        labels.push(row.place_label.clone().unwrap_or_else(|| id.clone()));
                        dossier.places.insert(id.clone(), row.clone());
                    } else {
                        labels.push(id.clone());
                    }
                }
                if let Some(f) = dossier.fields.get_mut(*field) {
                    f.values = labels;
                }
            }
        }
        Ok(())
    }

    fn resolve_labels(
        &self,
        dossiers: &mut [EntityDossier],
        set: FieldSet,
        label_qids: &BTreeSet<String>,
        langs: &[&str],
    ) -> Result<()> {
        if label_qids.is_empty() {
            return Ok(());
        }
        tracing::debug!("resolving labels for {} entities", label_qids.len());
        let refs: Vec<&str> = label_qids.iter().map(String::as_str).collect();
        let labels: BTreeMap<String, String> = self
            .wdqs
            .labels_descriptions(&refs, Terms::Labels, langs)?
            .into_iter()
            .filter_map(|r| r.label.map(|l| (r.entity, l)))
            .collect();
        let place_fields = set.place_fields();
        for dossier in dossiers.iter_mut() {
            for (name, field) in dossier.fields.iter_mut() {
                if place_fields.contains(&name.as_str()) {
                    continue;
                }
                if !field.ids.is_empty() {
                    field.values = field
                        .ids
                        .iter()
                        .map(|id| labels.get(id).cloned().unwrap_or_else(|| id.clone()))
                        .collect();
                    continue;
                }
                // Quantity units and review-score qualifiers embed
                // Q-ids in otherwise literal values
                for v in field.values.iter_mut() {
                    *v = substitute_embedded(v, &labels);
                }
            }
        }
        Ok(())
    }
}

fn substitute_embedded(value: &str, labels: &BTreeMap<String, String>) -> String {
    let mut out = TRAILING_UNIT
        .replace(value, |caps: &regex::Captures| {
            match labels.get(&caps[1]) {
                Some(label) => format!(" {}", label),
                None => caps[0].to_string(),
            }
        })
        .to_string();
    out = EMBEDDED_ITEM
        .replace_all(&out, |caps: &regex::Captures| match labels.get(&caps[1]) {
            Some(label) => format!("[{}]", label),
            None => caps[0].to_string(),
        })
        .to_string();
    out
}

fn decode_entity(
    qid: &str,
    data: &Value,
    set: FieldSet,
    langs: &[&str],
    wikilangs: &[&str],
    label_qids: &mut BTreeSet<String>,
    place_qids: &mut BTreeSet<String>,
) -> EntityDossier {
    let mut dossier = EntityDossier {
        entity: qid.to_string(),
        status: EntityStatus::Ok,
        label_lang: None,
        label: None,
        description_lang: None,
        description: None,
        fields: BTreeMap::new(),
        places: BTreeMap::new(),
        wikipedias: Vec::new(),
    };
    if data.get("missing").is_some() {
        dossier.status = EntityStatus::Missing;
        return dossier;
    }
    if data.get("redirects").is_some() {
        if let Some(target) = data.get("id").and_then(Value::as_str) {
            if target != qid {
                tracing::debug!("{} redirects to {}", qid, target);
                dossier.status = EntityStatus::Redirect(target.to_string());
            }
        }
    }

    let (lang, value) = best_term(data.get("labels"), langs);
    dossier.label_lang = lang;
    dossier.label = value;
    let (lang, value) = best_term(data.get("descriptions"), langs);
    dossier.description_lang = lang;
    dossier.description = value;

    if let Some(claims) = data.get("claims") {
        decode_claims(&mut dossier, claims, set, label_qids, place_qids);
    }
    if let Some(sitelinks) = data.get("sitelinks") {
        dossier.wikipedias = wikipedia_urls(sitelinks, wikilangs);
    }
    dossier
}

/// First term in language order, else any term the entity has.
fn best_term(terms: Option<&Value>, langs: &[&str]) -> (Option<String>, Option<String>) {
    let terms = match terms.and_then(Value::as_object) {
        Some(t) if !t.is_empty() => t,
        _ => return (None, None),
    };
    for lang in langs {
        if let Some(term) = terms.get(*lang) {
            // Stale fallback entries carry a for-language marker
            if term.get("for-language").is_some() {
                continue;
            }
            return (
                term.get("language")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                term.get("value").and_then(Value::as_str).map(str::to_string),
            );
        }
    }
    match terms.iter().next() {
        Some((_, term)) => (
            term.get("language")
                .and_then(Value::as_str)
                .map(str::to_string),
            term.get("value").and_then(Value::as_str).map(str::to_string),
        ),
        None => (None, None),
    }
}

fn decode_claims(
    dossier: &mut EntityDossier,
    claims: &Value,
    set: FieldSet,
    label_qids: &mut BTreeSet<String>,
    place_qids: &mut BTreeSet<String>,
) {
    let place_props = match set {
        FieldSet::Person => &["P19", "P20"][..],
        FieldSet::Film => &[][..],
    };
    for (prop, name) in set.fields() {
        let statements = match claims.get(prop).and_then(Value::as_array) {
            Some(s) => s,
            None => continue,
        };
        let mut values: Vec<(String, usize)> = Vec::new();
        let mut is_entity = false;
        for statement in statements {
            let datavalue = match statement.pointer("/mainsnak/datavalue") {
                Some(d) => d,
                // Unknown/no value snak
                None => continue,
            };
            let decoded = match decode_datavalue(datavalue) {
                Some(d) => d,
                None => continue,
            };
            let mut v = decoded.value;
            if decoded.is_entity {
                is_entity = true;
                if place_props.contains(prop) {
                    place_qids.insert(v.clone());
                } else {
                    label_qids.insert(v.clone());
                }
            }
            for qid in &decoded.referenced {
                label_qids.insert(qid.clone());
            }
            // Review scores carry the reviewer as a qualifier
            if *prop == "P444" {
                if let Some(reviewer) = statement
                    .pointer("/qualifiers/P447/0/datavalue/value/id")
                    .and_then(Value::as_str)
                {
                    label_qids.insert(reviewer.to_string());
                    v = format!("{} [{}]", v, reviewer);
                }
            }
            let nrefs = statement
                .get("references")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            if statement.get("rank").and_then(Value::as_str) == Some("preferred") {
                values = vec![(v, 0)];
                break;
            }
            values.push((v, nrefs));
        }
        if values.is_empty() {
            continue;
        }
        let kept: Vec<String> = if set.single_valued().contains(prop) {
            let best = values
                .iter()
                .enumerate()
                .max_by_key(|(i, (_, n))| (*n, usize::MAX - i))
                .map(|(_, (v, _))| v.clone());
            best.into_iter().collect()
        } else {
            let mut seen = BTreeSet::new();
            values
                .into_iter()
                .map(|(v, _)| v)
                .filter(|v| seen.insert(v.clone()))
                .collect()
        };
        let field = FieldValue {
            ids: if is_entity { kept.clone() } else { Vec::new() },
            values: kept,
        };
        dossier.fields.insert((*name).to_string(), field);
    }

    for (date_field, year_field) in set.date_fields() {
        let year = dossier
            .fields
            .get(*date_field)
            .and_then(|f| f.values.first())
            // +yyyy-MM-ddThh:mm:ssZ
            .and_then(|v| v.get(1..5))
            .map(str::to_string);
        if let Some(year) = year {
            dossier.fields.insert(
                (*year_field).to_string(),
                FieldValue {
                    ids: Vec::new(),
                    values: vec![year],
                },
            );
        }
    }

    for name in set.commons_files() {
        if let Some(field) = dossier.fields.get_mut(*name) {
            field.values = field.values.iter().map(|f| commons_url(f)).collect();
        }
    }
}

struct DecodedValue {
    value: String,
    is_entity: bool,
    /// Entities embedded in a literal value, e.g. quantity units.
    referenced: Vec<String>,
}

fn decode_datavalue(datavalue: &Value) -> Option<DecodedValue> {
    let kind = datavalue.get("type").and_then(Value::as_str)?;
    let value = datavalue.get("value")?;
    let mut referenced = Vec::new();
    let decoded = match kind {
        "string" => DecodedValue {
            value: value.as_str()?.to_string(),
            is_entity: false,
            referenced,
        },
        "wikibase-entityid" => DecodedValue {
            value: value.get("id").and_then(Value::as_str)?.to_string(),
            is_entity: true,
            referenced,
        },
        "time" => DecodedValue {
            value: value.get("time").and_then(Value::as_str)?.to_string(),
            is_entity: false,
            referenced,
        },
        "monolingualtext" => DecodedValue {
            value: format!(
                "{}:{}",
                value.get("text").and_then(Value::as_str)?,
                value.get("language").and_then(Value::as_str)?
            ),
            is_entity: false,
            referenced,
        },
        "quantity" => {
            let amount = value.get("amount").and_then(Value::as_str)?;
            let unit = value.get("unit").and_then(Value::as_str).unwrap_or("1");
            let unit = match unit.strip_prefix("http://www.wikidata.org/entity/") {
                Some(qid) => {
                    referenced.push(qid.to_string());
                    qid
                }
                None => unit,
            };
            DecodedValue {
                value: format!("{} : {}", amount, unit),
                is_entity: false,
                referenced,
            }
        }
        other => {
            tracing::warn!("datavalue type '{}' not decoded", other);
            return None;
        }
    };
    Some(decoded)
}

/// Download URL of a Commons file name.
fn commons_url(file: &str) -> String {
    format!(
        "https://commons.wikimedia.org/wiki/Special:FilePath/{}",
        urlencoding::encode(&file.replace(' ', "_"))
    )
}

// Sister projects whose sitelink keys also end in "wiki".
const NON_WIKIPEDIA_SITES: [&str; 6] = [
    "commonswiki",
    "specieswiki",
    "metawiki",
    "mediawikiwiki",
    "wikidatawiki",
    "sourceswiki",
];

fn wikipedia_urls(sitelinks: &Value, wikilangs: &[&str]) -> Vec<String> {
    let sitelinks = match sitelinks.as_object() {
        Some(s) => s,
        None => return Vec::new(),
    };
    let url = |lang: &str, link: &Value| {
        link.get("title").and_then(Value::as_str).map(|title| {
            format!(
                "https://{}.wikipedia.org/wiki/{}",
                lang,
                urlencoding::encode(&title.replace(' ', "_"))
            )
        })
    };
    if wikilangs.is_empty() {
        return sitelinks
            .iter()
            .filter(|(site, _)| !NON_WIKIPEDIA_SITES.contains(&site.as_str()))
            .filter_map(|(site, link)| site.strip_suffix("wiki").and_then(|l| url(l, link)))
            .collect();
    }
    wikilangs
        .iter()
        .filter_map(|lang| {
            sitelinks
                .get(&format!("{}wiki", lang))
                .and_then(|link| url(lang, link))
        })
        .collect()
}
