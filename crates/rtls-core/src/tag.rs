//! RFID tag identity
//!
//! A tag row is created the first time a code is bound to a work order and
//! never mutated afterwards. Codes arriving from readers carry hardware
//! decoration that must be scrubbed before they can be matched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database id of a tag row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(pub i64);

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// EPC code read off a physical transponder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpcCode(pub String);

impl EpcCode {
    /// Scrub one raw reader token into a usable code.
    ///
    /// Readers wrap codes as `epc[...]` and pad them with whitespace; the
    /// wrapper and every whitespace character are stripped. Returns `None`
    /// for tokens that are empty once scrubbed.
    pub fn scrub(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let mut code = match trimmed.strip_prefix("epc[") {
            Some(stripped) => stripped.to_string(),
            None => trimmed.to_string(),
        };
        code.retain(|c| c != ']' && !c.is_whitespace());
        if code.is_empty() {
            None
        } else {
            Some(EpcCode(code))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EpcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EpcCode {
    fn from(code: &str) -> Self {
        EpcCode(code.to_string())
    }
}

/// A physical RFID transponder known to the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub epc_code: EpcCode,
    pub created_at: DateTime<Utc>,
}
