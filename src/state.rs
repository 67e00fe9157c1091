use std::sync::Arc;

use anyhow::anyhow;
use rand::RngCore;
use tracing::warn;

use crate::config::Config;
use crate::core::store::{KvStore, MemoryStore, SpinStore};
use crate::core::token::TokenIssuer;

/// Everything a handler needs, built once at startup and passed by reference.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub tokens: TokenIssuer,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn KvStore>, secret: Vec<u8>) -> Self {
        let tokens = TokenIssuer::new(secret, config.token_expiration_hours);
        Self { store, tokens, config }
    }

    /// Memory-backed state for the native server. Without a configured secret
    /// a random one is generated, so tokens die with the process.
    pub fn in_memory(config: Config) -> Self {
        let secret = match &config.token_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("PLAZA_TOKEN_SECRET not set, using a random per-process secret");
                random_secret()
            }
        };
        Self::new(config, Arc::new(MemoryStore::new()), secret)
    }

    /// State for the Spin component. Every request runs in a fresh instance,
    /// so the secret has to come from configuration.
    pub fn for_component(config: Config) -> anyhow::Result<Self> {
        let secret = config
            .token_secret
            .clone()
            .ok_or_else(|| anyhow!("PLAZA_TOKEN_SECRET must be set"))?;
        Ok(Self::new(config, Arc::new(SpinStore::open_default()), secret))
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}
