//! Persisted per-identity nonce counters.

use alloy::primitives::Address;

use crate::nonce::storage::{LedgerDocument, LedgerStorage};
use crate::nonce::NonceError;

/// Next-nonce ledger keyed by (environment, chain, address).
///
/// Every operation loads the whole document from storage and `set` writes it back in full.
/// There is no locking: one writer per key at a time is an operational contract.
#[derive(Debug)]
pub struct NonceLedger<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> NonceLedger<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Access the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Next nonce to use for the identity. Addresses match case-insensitively.
    pub fn get(&self, environment: &str, chain: &str, address: Address) -> Result<u64, NonceError> {
        let document = self.storage.load()?;
        lookup(&document, environment, chain, address).ok_or_else(|| NonceError::NotFound {
            environment: environment.to_string(),
            chain: chain.to_lowercase(),
            address,
        })
    }

    /// Record the next nonce to use for the identity.
    pub fn set(
        &self,
        environment: &str,
        chain: &str,
        address: Address,
        nonce: u64,
    ) -> Result<(), NonceError> {
        let mut document = self.storage.load()?;
        let accounts = document
            .entry(environment.to_string())
            .or_default()
            .entry(chain.to_lowercase())
            .or_default();

        let key = address.to_string();
        accounts.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
        accounts.insert(key, nonce);

        self.storage.store(&document)?;

        tracing::debug!(
            environment,
            chain = %chain.to_lowercase(),
            address = %address,
            nonce,
            "Nonce ledger updated"
        );
        Ok(())
    }
}

fn lookup(document: &LedgerDocument, environment: &str, chain: &str, address: Address) -> Option<u64> {
    let key = address.to_string();
    document
        .get(environment)?
        .get(&chain.to_lowercase())?
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
        .map(|(_, nonce)| *nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::storage::MemoryStorage;
    use alloy::primitives::address;

    const SIGNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    fn seeded(nonce: u64) -> NonceLedger<MemoryStorage> {
        let mut document = LedgerDocument::new();
        document
            .entry("testnet".into())
            .or_default()
            .entry("ethereum".into())
            .or_default()
            // Stored lowercase, looked up via a checksummed Address.
            .insert("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".into(), nonce);
        NonceLedger::new(MemoryStorage::new(document))
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let ledger = seeded(5);
        assert_eq!(ledger.get("testnet", "Ethereum", SIGNER).unwrap(), 5);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let ledger = seeded(5);
        let err = ledger.get("mainnet", "ethereum", SIGNER).unwrap_err();
        assert!(matches!(err, NonceError::NotFound { .. }));
        assert!(err.to_string().contains("mainnet"));

        let err = ledger.get("testnet", "polygon", SIGNER).unwrap_err();
        assert!(matches!(err, NonceError::NotFound { .. }));
    }

    #[test]
    fn test_set_replaces_case_variants() {
        let ledger = seeded(5);
        ledger.set("testnet", "ETHEREUM", SIGNER, 6).unwrap();

        let document = ledger.storage().snapshot();
        let accounts = &document["testnet"]["ethereum"];
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[&SIGNER.to_string()], 6);
        assert_eq!(ledger.get("testnet", "ethereum", SIGNER).unwrap(), 6);
    }

    #[test]
    fn test_set_creates_missing_levels() {
        let ledger = NonceLedger::new(MemoryStorage::default());
        ledger.set("devnet", "Avalanche", SIGNER, 0).unwrap();
        assert_eq!(ledger.get("devnet", "avalanche", SIGNER).unwrap(), 0);
    }
}
