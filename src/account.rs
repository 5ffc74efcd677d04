//! Account key checks built on the request layer.
//!
//! Answers whether a public key may currently sign for an account: the
//! master key unless disabled, or the configured regular key. Address
//! derivation is delegated to an [`AddressCodec`] so no cryptography lives
//! in this crate.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::Remote;

// ============================================================================
// Constants
// ============================================================================

/// `AccountRoot` flag: the master key may not sign.
pub const LSF_DISABLE_MASTER: u32 = 0x0010_0000;

/// Remote error code for an account with no ledger entry.
const ACCOUNT_NOT_FOUND: &str = "actNotFound";

// ============================================================================
// Collaborators
// ============================================================================

/// Derives account addresses from public keys.
pub trait AddressCodec: Send + Sync {
    /// Returns the account address for `public_key`.
    ///
    /// A value that already is an account address is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPublicKey`] if `public_key` is not a key.
    fn address_from_public_key(&self, public_key: &str) -> Result<String>;
}

/// Looks up account root entries.
#[async_trait]
pub trait AccountInfoSource: Send + Sync {
    /// Fetches the account root for `address`.
    ///
    /// Returns `Ok(None)` for an unfunded account.
    async fn account_info(&self, address: &str) -> Result<Option<AccountRoot>>;
}

/// The fields of an `AccountRoot` ledger entry used for key checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountRoot {
    /// Account address.
    pub account: String,
    /// Flag bits.
    #[serde(default)]
    pub flags: u32,
    /// Regular key address, if one is set.
    #[serde(default)]
    pub regular_key: Option<String>,
}

impl AccountRoot {
    /// Returns `true` if the master key is disabled.
    #[inline]
    #[must_use]
    pub fn master_disabled(&self) -> bool {
        self.flags & LSF_DISABLE_MASTER != 0
    }
}

#[async_trait]
impl AccountInfoSource for Remote {
    async fn account_info(&self, address: &str) -> Result<Option<AccountRoot>> {
        let mut request = self.request_account_info(address)?;
        request.ident(address)?;

        let result = match request.send().await {
            Ok(result) => result,
            Err(e) if e.remote_error() == Some(ACCOUNT_NOT_FOUND) => {
                debug!(account = %address, "Account not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let data = result
            .get("account_data")
            .cloned()
            .ok_or_else(|| Error::invalid_argument("account_info result has no account_data"))?;

        Ok(Some(serde_json::from_value(data)?))
    }
}

// ============================================================================
// Account
// ============================================================================

/// One account, checked against a source of account roots.
#[derive(Debug, Clone)]
pub struct Account<S> {
    source: S,
    address: String,
}

impl<S: AccountInfoSource> Account<S> {
    /// Creates an account handle.
    pub fn new(source: S, address: impl Into<String>) -> Self {
        Self {
            source,
            address: address.into(),
        }
    }

    /// Returns the account address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns `true` if `public_key` can currently sign for this account.
    ///
    /// - Unfunded account: only the master key, which is never disabled.
    /// - Funded account: the master key unless disabled, or the regular key.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPublicKey`] if the codec rejects the key
    /// - errors from the account lookup, other than "not found"
    pub async fn public_key_is_active<C>(&self, codec: &C, public_key: &str) -> Result<bool>
    where
        C: AddressCodec + ?Sized,
    {
        let key_address = codec.address_from_public_key(public_key)?;
        let is_master = key_address == self.address;

        let Some(root) = self.source.account_info(&self.address).await? else {
            return Ok(is_master);
        };

        let active = (is_master && !root.master_disabled())
            || root.regular_key.as_deref() == Some(key_address.as_str());

        debug!(
            account = %self.address,
            key_address = %key_address,
            active,
            "Checked public key"
        );
        Ok(active)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use rustc_hash::FxHashMap;
    use serde_json::{Value, json};

    use crate::transport::LinkCommand;

    const FUNDED: &str = "rKXCummUHnenhYudNb9UoJ4mGBR75vFcgz";
    const UNFUNDED: &str = "rLdfp6eoR948KVxfn6EpaaNTKwfwXhzSeQ";
    const REGULAR: &str = "rNw4ozCG514KEjPs5cDrqEcdsi31Jtfm5r";

    const FUNDED_MASTER_KEY: &str =
        "025B32A54BFA33FB781581F49B235C0E2820C929FF41E677ADA5D3E53CFBA46332";
    const UNFUNDED_MASTER_KEY: &str =
        "0310C451A40CAFFD39D6B8A3BD61BF65BCA55246E9DABC3170EBE431D30655B61F";
    const REGULAR_KEY: &str = "02BE53B7ACBB0900E0BB7729C9CAC1033A0137993B17800BD1191BBD1B29D96A8C";
    const STRANGER_KEY: &str = "032ECDA93970BC7E8872EF6582CB52A5557F117244A949EB4FA8AC7688CF24FBC8";

    /// Lookup table standing in for real key derivation.
    struct TableCodec(FxHashMap<&'static str, &'static str>);

    impl TableCodec {
        fn new() -> Self {
            let mut table = FxHashMap::default();
            table.insert(FUNDED_MASTER_KEY, FUNDED);
            table.insert(UNFUNDED_MASTER_KEY, UNFUNDED);
            table.insert(REGULAR_KEY, REGULAR);
            table.insert(STRANGER_KEY, "rP4yWwjoDGF2iZSBdAQAgpC449YDezEbT1");
            Self(table)
        }
    }

    impl AddressCodec for TableCodec {
        fn address_from_public_key(&self, public_key: &str) -> Result<String> {
            if public_key.starts_with('r') {
                return Ok(public_key.to_string());
            }
            self.0
                .get(public_key)
                .map(|address| (*address).to_string())
                .ok_or_else(|| Error::invalid_public_key(format!("not a public key: {public_key}")))
        }
    }

    /// Account source with one funded account.
    struct FakeSource {
        flags: u32,
    }

    #[async_trait]
    impl AccountInfoSource for FakeSource {
        async fn account_info(&self, address: &str) -> Result<Option<AccountRoot>> {
            match address {
                FUNDED => Ok(Some(AccountRoot {
                    account: FUNDED.to_string(),
                    flags: self.flags,
                    regular_key: Some(REGULAR.to_string()),
                })),
                _ => Ok(None),
            }
        }
    }

    fn master_disabled() -> FakeSource {
        FakeSource {
            flags: 0x0001_0000 | LSF_DISABLE_MASTER,
        }
    }

    /// Remote backed by an in-memory link that answers `account_info`.
    fn answering_remote() -> (Remote, tokio::task::JoinHandle<()>) {
        let remote = Remote::new();
        let server = remote.add_server("wss://localhost:5006").unwrap();
        let mut link = server.attach();

        let responder = tokio::spawn(async move {
            while let Some(LinkCommand::Frame(text)) = link.recv().await {
                let frame: Value = serde_json::from_str(&text).unwrap();
                let id = frame["id"].as_u64().unwrap();
                let reply = if frame["account"] == FUNDED {
                    json!({
                        "id": id,
                        "status": "success",
                        "type": "response",
                        "result": {
                            "account_data": {
                                "Account": FUNDED,
                                "Flags": 0x0011_0000u32,
                                "LedgerEntryType": "AccountRoot",
                                "RegularKey": REGULAR
                            }
                        }
                    })
                } else {
                    json!({
                        "id": id,
                        "status": "error",
                        "type": "response",
                        "error": "actNotFound",
                        "error_code": 15,
                        "error_message": "Account not found."
                    })
                };
                server.handle_message(&reply.to_string());
            }
        });

        (remote, responder)
    }

    #[test]
    fn test_codec_passes_addresses_through() {
        let codec = TableCodec::new();
        assert_eq!(codec.address_from_public_key(FUNDED).unwrap(), FUNDED);
        assert!(codec.address_from_public_key("not a real key").is_err());
    }

    #[test]
    fn test_account_root_from_json() {
        let root: AccountRoot = serde_json::from_value(serde_json::json!({
            "Account": FUNDED,
            "Flags": 0x0011_0000u32,
            "LedgerEntryType": "AccountRoot",
            "RegularKey": REGULAR
        }))
        .unwrap();
        assert_eq!(root.account, FUNDED);
        assert!(root.master_disabled());
        assert_eq!(root.regular_key.as_deref(), Some(REGULAR));
    }

    #[tokio::test]
    async fn test_master_key_active_when_enabled() {
        let account = Account::new(FakeSource { flags: 0x0001_0000 }, FUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), FUNDED_MASTER_KEY)
            .await
            .unwrap();
        assert!(active);
    }

    #[tokio::test]
    async fn test_master_key_inactive_when_disabled() {
        let account = Account::new(master_disabled(), FUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), FUNDED_MASTER_KEY)
            .await
            .unwrap();
        assert!(!active);
    }

    #[tokio::test]
    async fn test_regular_key_active() {
        let account = Account::new(master_disabled(), FUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), REGULAR_KEY)
            .await
            .unwrap();
        assert!(active);
    }

    #[tokio::test]
    async fn test_unrelated_key_inactive() {
        let account = Account::new(master_disabled(), FUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), STRANGER_KEY)
            .await
            .unwrap();
        assert!(!active);
    }

    #[tokio::test]
    async fn test_invalid_key_fails() {
        let account = Account::new(master_disabled(), FUNDED);
        let err = account
            .public_key_is_active(&TableCodec::new(), "not a real public key")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPublicKey { .. }));
    }

    #[tokio::test]
    async fn test_unfunded_master_key_active() {
        let account = Account::new(master_disabled(), UNFUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), UNFUNDED_MASTER_KEY)
            .await
            .unwrap();
        assert!(active);
    }

    #[tokio::test]
    async fn test_unfunded_unrelated_key_inactive() {
        let account = Account::new(master_disabled(), UNFUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), STRANGER_KEY)
            .await
            .unwrap();
        assert!(!active);
    }

    #[tokio::test]
    async fn test_remote_source_reads_account_root() {
        let (remote, responder) = answering_remote();

        let root = remote.account_info(FUNDED).await.unwrap().expect("funded");
        assert_eq!(root.account, FUNDED);
        assert!(root.master_disabled());
        assert_eq!(root.regular_key.as_deref(), Some(REGULAR));

        responder.abort();
    }

    #[tokio::test]
    async fn test_remote_source_maps_not_found() {
        let (remote, responder) = answering_remote();

        assert!(remote.account_info(UNFUNDED).await.unwrap().is_none());

        let account = Account::new(remote, UNFUNDED);
        let active = account
            .public_key_is_active(&TableCodec::new(), UNFUNDED_MASTER_KEY)
            .await
            .unwrap();
        assert!(active);

        responder.abort();
    }
}
