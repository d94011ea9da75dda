//! Authority-file clients: VIAF, BNE, IdRef, Getty ULAN and DNB
//!
//! Each client wraps one provider's published lookup endpoint. The
//! gender batch operations share a row shape so callers can merge
//! results across providers.

pub mod bne;
pub mod dnb;
pub mod getty;
pub mod idref;
pub mod viaf;
pub mod viaf_record;

pub use bne::*;
pub use dnb::*;
pub use getty::*;
pub use idref::*;
pub use viaf::*;
pub use viaf_record::*;

use crate::error::{Error, Result};

/// Preferred label and gender of one authority record, as the
/// provider's gender batch lookup reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenderRow {
    pub id: String,
    pub label: String,
    pub gender: String,
}

/// Trim, drop blanks and deduplicate identifiers preserving order.
/// Quotes are rejected, the ids end up inside query literals.
pub(crate) fn check_ids(ids: &[&str]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in ids {
        let id = raw.trim();
        if id.is_empty() {
            continue;
        }
        if id.contains('"') || id.contains(char::is_whitespace) {
            return Err(Error::InvalidInput(format!("Invalid identifier: '{}'", raw)));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_ids() {
        let ids = check_ids(&["XX1718747", " XX1718747 ", "XX823723"]).unwrap();
        assert_eq!(ids, vec!["XX1718747", "XX823723"]);
        assert!(check_ids(&[""]).is_err());
        assert!(check_ids(&["a\"b"]).is_err());
        assert!(check_ids(&["a b"]).is_err());
    }
}
