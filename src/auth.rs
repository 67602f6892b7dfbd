use std::sync::Arc;

use anyhow::{bail, Result};

use crate::api::TokenProvider;
use crate::storage;

/// Fixed key under which the dashboard sign-in persists the bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth: token must not be empty")]
    EmptyToken,
}

/// Token provider backed by the local store. Authenticated endpoints consult
/// this on every request, so a sign-in in one invocation is visible to the
/// next without re-reading config.
pub struct StoreTokenProvider {
    store: Arc<storage::Store>,
}

impl StoreTokenProvider {
    pub fn new(store: Arc<storage::Store>) -> Self {
        Self { store }
    }
}

impl TokenProvider for StoreTokenProvider {
    fn token(&self) -> Result<Option<String>> {
        self.store.get_secret(AUTH_TOKEN_KEY)
    }
}

pub fn sign_in(store: &storage::Store, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!(AuthError::EmptyToken);
    }
    store.set_secret(AUTH_TOKEN_KEY, token)
}

pub fn sign_out(store: &storage::Store) -> Result<()> {
    store.delete_secret(AUTH_TOKEN_KEY)
}

pub fn stored_token(store: &storage::Store) -> Result<Option<String>> {
    store.get_secret(AUTH_TOKEN_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> storage::Store {
        storage::Store::open(storage::Options {
            path: Some(dir.path().join("state.db")),
        })
        .unwrap()
    }

    #[test]
    fn sign_in_persists_token() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        sign_in(&store, "  token-123  ").unwrap();
        assert_eq!(stored_token(&store).unwrap().as_deref(), Some("token-123"));
    }

    #[test]
    fn empty_token_rejected() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        assert!(sign_in(&store, "   ").is_err());
    }

    #[test]
    fn provider_reads_signed_out_state() {
        let dir = tempdir().unwrap();
        let store = Arc::new(open_store(&dir));
        let provider = StoreTokenProvider::new(store.clone());
        assert!(provider.token().unwrap().is_none());

        sign_in(&store, "token-456").unwrap();
        assert_eq!(provider.token().unwrap().as_deref(), Some("token-456"));

        sign_out(&store).unwrap();
        assert!(provider.token().unwrap().is_none());
    }
}
