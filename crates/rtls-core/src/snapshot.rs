//! Reader snapshots
//!
//! A reader periodically reports the complete set of tags it currently
//! sees, not a delta. Raw token lists are noisy: decorated, padded, and
//! full of duplicate reads. Normalization collapses them into a clean set
//! of codes before reconciliation.

use std::collections::BTreeSet;

use crate::tag::EpcCode;

/// The full set of tag codes a reader currently detects at a cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    codes: BTreeSet<EpcCode>,
}

impl Snapshot {
    /// A snapshot in which the reader sees nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from raw reader tokens, scrubbing each token and
    /// collapsing duplicates. Tokens that are empty after scrubbing are
    /// discarded.
    pub fn from_raw_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = tokens
            .into_iter()
            .filter_map(|token| EpcCode::scrub(token.as_ref()))
            .collect();
        Self { codes }
    }

    /// Build a snapshot from already-clean codes
    pub fn from_codes<I: IntoIterator<Item = EpcCode>>(codes: I) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    pub fn contains(&self, code: &EpcCode) -> bool {
        self.codes.contains(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EpcCode> {
        self.codes.iter()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
