//! Outbound command payloads.
//!
//! A [`Message`] is the typed parameter structure behind a request. It is
//! serialized to the wire mapping only at dispatch time:
//!
//! ```json
//! {
//!   "command": "account_info",
//!   "id": 3,
//!   "account": "rKXCummUHnenhYudNb9UoJ4mGBR75vFcgz",
//!   "ledger_index": "validated"
//! }
//! ```
//!
//! Every field except `command` is optional and omitted when unset.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::RequestId;

use super::ledger::{Hash256, LedgerSelector};

// ============================================================================
// Message
// ============================================================================

/// Typed parameters of one command.
///
/// Read through `Request::message`; mutated only by the request builders,
/// which validate every value before it lands here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Message {
    /// Command name (e.g. `server_info`).
    pub command: String,

    /// Target ledger, serialized as `ledger_hash` or `ledger_index`.
    #[serde(flatten)]
    pub ledger: Option<LedgerSelector>,

    /// Single account field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Legacy account identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ident: Option<String>,

    /// Accounts to watch (validated stream).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<String>>,

    /// Accounts to watch (proposed stream).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts_proposed: Option<Vec<String>>,

    /// Order books to watch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,

    /// Named streams to subscribe to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<String>>,

    /// Offer reference, either `{account, seq}` or a bare index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<Offer>,

    /// Trust line reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ripple_state: Option<RippleState>,

    /// Signing secret for server-side signing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Transaction hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<Hash256>,

    /// Transaction hash for the `tx` command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Hash256>,

    /// Transaction in JSON form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_json: Option<Map<String, Value>>,

    /// Transaction in serialized hex form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_blob: Option<String>,

    /// Ask the server to fill in payment paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_path: Option<bool>,

    /// Asset the taker receives (book queries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker_gets: Option<Issue>,

    /// Asset the taker pays (book queries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker_pays: Option<Issue>,

    /// Account viewing the book.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker: Option<String>,

    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Paging marker from a previous response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Value>,

    /// Include transactions in a ledger response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<bool>,

    /// Expand transactions instead of listing hashes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<bool>,
}

impl Message {
    /// Creates an empty message for `command`.
    #[inline]
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Serializes the message with its correlation id into a wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_frame(&self, id: RequestId) -> Result<String> {
        let frame = Frame { id, message: self };
        Ok(serde_json::to_string(&frame)?)
    }

    /// Returns the wire mapping without a correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Wire frame: the message plus its correlation id.
#[derive(Serialize)]
struct Frame<'a> {
    id: RequestId,
    #[serde(flatten)]
    message: &'a Message,
}

// ============================================================================
// Payload Types
// ============================================================================

/// Currency plus optional issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Currency code (e.g. `USD`, or `XRP` for the native asset).
    pub currency: String,
    /// Issuing account; absent for the native asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Issue {
    /// The native asset.
    #[must_use]
    pub fn native() -> Self {
        Self {
            currency: "XRP".to_string(),
            issuer: None,
        }
    }

    /// An issued currency.
    #[must_use]
    pub fn issued(currency: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            issuer: Some(issuer.into()),
        }
    }
}

/// Order book descriptor used by `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Asset the taker receives.
    pub taker_gets: Issue,
    /// Asset the taker pays.
    pub taker_pays: Issue,
    /// Return the current book state along with the subscription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<bool>,
    /// Watch both sides of the book.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub both: Option<bool>,
}

impl Book {
    /// Creates a book descriptor with no options.
    #[must_use]
    pub fn new(taker_gets: Issue, taker_pays: Issue) -> Self {
        Self {
            taker_gets,
            taker_pays,
            snapshot: None,
            both: None,
        }
    }
}

/// Offer reference.
///
/// Both forms go out under the same `offer` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Offer {
    /// Owner account and offer sequence.
    Id {
        /// Owner account.
        account: String,
        /// Sequence number of the creating transaction.
        seq: u32,
    },
    /// Ledger entry index.
    Index(u64),
}

/// Trust line between two accounts in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleState {
    /// Currency code.
    pub currency: String,
    /// The two accounts on the line.
    pub accounts: [String; 2],
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LedgerTag;

    use serde_json::json;

    #[test]
    fn test_empty_message_has_only_command() {
        let message = Message::new("server_info");
        assert_eq!(message.to_value().unwrap(), json!({ "command": "server_info" }));
    }

    #[test]
    fn test_frame_carries_id() {
        let mut message = Message::new("ledger");
        message.ledger = Some(LedgerSelector::Tag(LedgerTag::Validated));

        let frame: Value = serde_json::from_str(&message.to_frame(RequestId::new(9)).unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({ "command": "ledger", "id": 9, "ledger_index": "validated" })
        );
    }

    #[test]
    fn test_offer_forms() {
        let id = Offer::Id {
            account: "r9cZA1mLK5R5Am25ArfXFmqgNwjZgnfk59".into(),
            seq: 1337,
        };
        assert_eq!(
            serde_json::to_value(id).unwrap(),
            json!({ "account": "r9cZA1mLK5R5Am25ArfXFmqgNwjZgnfk59", "seq": 1337 })
        );
        assert_eq!(serde_json::to_value(Offer::Index(1337)).unwrap(), json!(1337));
    }

    #[test]
    fn test_book_omits_unset_options() {
        let book = Book::new(Issue::native(), Issue::issued("USD", "rvYAfWj5gh67oV6fW32ZzP3Aw4Eubs59B"));
        assert_eq!(
            serde_json::to_value(book).unwrap(),
            json!({
                "taker_gets": { "currency": "XRP" },
                "taker_pays": { "currency": "USD", "issuer": "rvYAfWj5gh67oV6fW32ZzP3Aw4Eubs59B" }
            })
        );
    }
}
