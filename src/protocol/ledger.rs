//! Ledger selectors.
//!
//! A query names its target ledger by one of three shapes:
//!
//! | Input | Wire field |
//! |-------|------------|
//! | `7016915` | `"ledger_index": 7016915` |
//! | `"validated"`, `"current"`, `"closed"` | `"ledger_index": "validated"` |
//! | 64 hex characters | `"ledger_hash": "B4FD…"` |
//!
//! [`LedgerSelector`] serializes to exactly one of the two fields, so a
//! message can never carry both.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Hash256
// ============================================================================

/// A 256-bit hash in hexadecimal form (ledger or transaction hash).
///
/// The original casing is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash256(String);

/// Ledger hashes are plain 256-bit hashes.
pub type LedgerHash = Hash256;

impl Hash256 {
    /// Number of hexadecimal characters in a hash.
    pub const HEX_LEN: usize = 64;

    /// Parses a hash, rejecting anything that is not 64 hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLedgerHash`] on a malformed value.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(Error::invalid_ledger_hash(value))
        }
    }

    /// Returns `true` if `value` has the shape of a hash.
    #[inline]
    #[must_use]
    pub fn is_valid(value: &str) -> bool {
        value.len() == Self::HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Returns the hash as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Hash256 {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Hash256> for String {
    fn from(hash: Hash256) -> Self {
        hash.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// LedgerTag
// ============================================================================

/// Symbolic ledger names understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerTag {
    /// Most recent ledger validated by consensus.
    Validated,
    /// In-progress ledger.
    Current,
    /// Most recently closed ledger (may not be validated yet).
    Closed,
}

impl LedgerTag {
    /// Returns the wire name of the tag.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Current => "current",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for LedgerTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "validated" => Ok(Self::Validated),
            "current" => Ok(Self::Current),
            "closed" => Ok(Self::Closed),
            other => Err(Error::invalid_argument(format!(
                "unknown ledger selector: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for LedgerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LedgerSelector
// ============================================================================

/// Discriminated ledger selector: tag, index, or hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LedgerSelector {
    /// Symbolic tag, sent as `ledger_index`.
    Tag(LedgerTag),
    /// Numeric ledger index, sent as `ledger_index`.
    Index(u32),
    /// Ledger hash, sent as `ledger_hash`.
    Hash(LedgerHash),
}

impl LedgerSelector {
    /// Classifies a string by shape: hash, then digits, then tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the value matches no shape.
    pub fn parse(value: &str) -> Result<Self> {
        if Hash256::is_valid(value) {
            return Ok(Self::Hash(Hash256(value.to_string())));
        }

        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            return value
                .parse::<u32>()
                .map(Self::Index)
                .map_err(|_| Error::invalid_argument(format!("ledger index out of range: {value}")));
        }

        value.parse::<LedgerTag>().map(Self::Tag)
    }

    /// Returns the wire field this selector populates.
    #[inline]
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::Hash(_) => "ledger_hash",
            Self::Tag(_) | Self::Index(_) => "ledger_index",
        }
    }

    /// Returns the wire value of this selector.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Tag(tag) => Value::from(tag.as_str()),
            Self::Index(index) => Value::from(*index),
            Self::Hash(hash) => Value::from(hash.as_str()),
        }
    }
}

impl Serialize for LedgerSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Tag(tag) => map.serialize_entry("ledger_index", tag)?,
            Self::Index(index) => map.serialize_entry("ledger_index", index)?,
            Self::Hash(hash) => map.serialize_entry("ledger_hash", hash.as_str())?,
        }
        map.end()
    }
}

impl From<LedgerTag> for LedgerSelector {
    fn from(tag: LedgerTag) -> Self {
        Self::Tag(tag)
    }
}

impl From<u32> for LedgerSelector {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<Hash256> for LedgerSelector {
    fn from(hash: Hash256) -> Self {
        Self::Hash(hash)
    }
}

// ============================================================================
// IntoLedgerSelector
// ============================================================================

/// Conversion used by `Request::ledger_select`.
///
/// Strings are classified by shape, numbers become indexes, JSON values are
/// classified by their type.
pub trait IntoLedgerSelector {
    /// Classifies `self` into a selector.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value matches no selector shape.
    fn into_ledger_selector(self) -> Result<LedgerSelector>;
}

impl IntoLedgerSelector for LedgerSelector {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        Ok(self)
    }
}

impl IntoLedgerSelector for LedgerTag {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        Ok(LedgerSelector::Tag(self))
    }
}

impl IntoLedgerSelector for Hash256 {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        Ok(LedgerSelector::Hash(self))
    }
}

impl IntoLedgerSelector for u32 {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        Ok(LedgerSelector::Index(self))
    }
}

impl IntoLedgerSelector for u64 {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        u32::try_from(self)
            .map(LedgerSelector::Index)
            .map_err(|_| Error::invalid_argument(format!("ledger index out of range: {self}")))
    }
}

impl IntoLedgerSelector for i64 {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        u32::try_from(self)
            .map(LedgerSelector::Index)
            .map_err(|_| Error::invalid_argument(format!("ledger index out of range: {self}")))
    }
}

impl IntoLedgerSelector for &str {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        LedgerSelector::parse(self)
    }
}

impl IntoLedgerSelector for String {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        LedgerSelector::parse(&self)
    }
}

impl IntoLedgerSelector for &Value {
    fn into_ledger_selector(self) -> Result<LedgerSelector> {
        match self {
            Value::String(s) => LedgerSelector::parse(s),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| Error::invalid_argument(format!("invalid ledger index: {n}")))?
                .into_ledger_selector(),
            other => Err(Error::invalid_argument(format!(
                "invalid ledger selector: {other}"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
