//! wikitools: query clients for Wikimedia and library authority services
//!
//! This library provides thin, blocking, stateless query functions over:
//! - Wikidata: Query Service SPARQL operations and entity dossiers
//! - MediaWiki Action API: page lookup, search, login and edits
//! - MediaWiki/WikiMedia REST APIs: summaries, history, media, pageviews
//! - XTools page statistics
//! - Authority files: VIAF, BNE, IdRef, Getty ULAN and DNB
//! - Text normalization and string similarity helpers
//!
//! Every operation is one or a few HTTP requests; nothing is cached or
//! retried, and the only state a client holds is its HTTP session (for
//! MediaWiki logins) and endpoint configuration.

pub mod authority;
pub mod error;
pub mod http;
pub mod mediawiki;
pub mod sparql;
pub mod text;
pub mod wikidata;
pub mod wikimedia;

// Re-export the types most callers touch
pub use error::{Error, Result};
pub use sparql::{binding, ResultFormat, Row, SparqlClient, SparqlResults};

pub use wikidata::{
    authority_property, check_entities, check_properties, EntityDossier, EntityInfoClient,
    EntityStatus, FieldSet, WdqsClient,
};

pub use mediawiki::{
    ActionApiClient, EditPage, EditResult, PageStatus, SearchHit, SearchMode, MW_LIMIT,
};

pub use wikimedia::{
    Access, Agent, Granularity, HistorySegment, MediaItem, PageInfoKind, PageSummary,
    PageViewsOptions, RestClient, XtoolsClient,
};

pub use authority::{
    AutosuggestHit, BneClient, BnePersonRow, DnbClient, GenderRow, GettyClient, IdrefClient,
    MatchMode, NameIndex, RecordFetch, RecordSchema, ViafClient, ViafRecord, ViafSummary,
};

pub use text::{fold_accents, nfkc, similarity, SimilarityOptions};
