//! Account and cosmetic ownership store
//!
//! Consulted only on join, to attach an account id and validate the requested
//! cosmetic. Nothing here touches simulation balance.

use arena_core::entities::DEFAULT_COSMETIC;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::error::ServerResult;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn owned_cosmetics(&self, account: &str) -> ServerResult<BTreeSet<String>>;

    async fn grant_cosmetic(&self, account: &str, cosmetic: &str) -> ServerResult<()>;
}

/// Resolve the cosmetic a joining player may actually wear.
pub async fn resolve_cosmetic(
    store: &dyn AccountStore,
    account: Option<&str>,
    requested: Option<&str>,
) -> String {
    let Some(wanted) = requested.filter(|c| !c.is_empty() && *c != DEFAULT_COSMETIC) else {
        return DEFAULT_COSMETIC.to_string();
    };
    let Some(account) = account else {
        return DEFAULT_COSMETIC.to_string();
    };
    match store.owned_cosmetics(account).await {
        Ok(owned) if owned.contains(wanted) => wanted.to_string(),
        Ok(_) => DEFAULT_COSMETIC.to_string(),
        Err(e) => {
            tracing::warn!(account, error = %e, "cosmetic lookup failed");
            DEFAULT_COSMETIC.to_string()
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    owned: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn owned_cosmetics(&self, account: &str) -> ServerResult<BTreeSet<String>> {
        Ok(self.owned.read().get(account).cloned().unwrap_or_default())
    }

    async fn grant_cosmetic(&self, account: &str, cosmetic: &str) -> ServerResult<()> {
        self.owned
            .write()
            .entry(account.to_string())
            .or_default()
            .insert(cosmetic.to_string());
        Ok(())
    }
}
