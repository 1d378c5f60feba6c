//! Upstream credential pool with round-robin or fixed-with-fallback selection.

use gateway_core::{
    credentials_from_secrets, Credential, CredentialConfig, CredentialKind, Error, KvStore,
    Result, RotationMode,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Store key holding the persistent round-robin cursor of a pool.
pub fn cursor_key(kind: CredentialKind) -> String {
    format!("gw:keypool:{}:cursor", kind)
}

/// Credentials for one provider.
pub struct KeyPool {
    kind: CredentialKind,
    credentials: Vec<Credential>,
    mode: RotationMode,
    store: Arc<dyn KvStore>,
}

impl KeyPool {
    pub fn new(
        kind: CredentialKind,
        credentials: Vec<Credential>,
        mode: RotationMode,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            kind,
            credentials,
            mode,
            store,
        }
    }

    /// Builds the pool for `kind` from configuration.
    ///
    /// Only the transcription pool rotates; the others always use their
    /// first key. The insecure fallback is substituted only for an empty
    /// transcription pool, and only when explicitly allowed.
    pub fn from_config(
        kind: CredentialKind,
        config: &CredentialConfig,
        store: Arc<dyn KvStore>,
    ) -> Self {
        let (secrets, mode) = match kind {
            CredentialKind::Transcription => (&config.transcription, config.rotation),
            CredentialKind::Ai => (&config.ai, RotationMode::FixedWithFallback),
            CredentialKind::Youtube => (&config.youtube, RotationMode::FixedWithFallback),
        };

        let mut credentials = credentials_from_secrets(kind, secrets);

        if credentials.is_empty() && kind == CredentialKind::Transcription {
            if let (true, Some(fallback)) = (
                config.allow_insecure_fallback,
                config.insecure_fallback.as_deref(),
            ) {
                if !fallback.trim().is_empty() {
                    warn!(
                        kind = %kind,
                        "No transcription keys configured, using the insecure fallback credential"
                    );
                    credentials.push(Credential::new(
                        format!("{}-fallback", kind),
                        fallback.trim(),
                        kind,
                    ));
                }
            }
        }

        Self::new(kind, credentials, mode, store)
    }

    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Starts one top-level call.
    ///
    /// In round-robin mode this advances the persistent cursor exactly once;
    /// every attempt of the call is then resolved through the returned
    /// selection.
    pub async fn checkout(&self) -> Result<KeySelection<'_>> {
        if self.credentials.is_empty() {
            return Err(Error::missing_credential(self.kind));
        }

        let start = match self.mode {
            RotationMode::FixedWithFallback => 0,
            RotationMode::RoundRobin => {
                let ticket = self.store.increment(&cursor_key(self.kind)).await?;
                (ticket.saturating_sub(1) % self.credentials.len() as u64) as usize
            }
        };

        debug!(kind = %self.kind, mode = ?self.mode, start = start, "Checked out key pool");

        Ok(KeySelection {
            credentials: &self.credentials,
            mode: self.mode,
            start,
        })
    }
}

/// Credential choice for the attempts of a single call.
#[derive(Debug, Clone, Copy)]
pub struct KeySelection<'a> {
    credentials: &'a [Credential],
    mode: RotationMode,
    start: usize,
}

impl<'a> KeySelection<'a> {
    /// Credential for `attempt` (1-indexed).
    pub fn select(&self, attempt: u32) -> &'a Credential {
        &self.credentials[self.index_for(attempt)]
    }

    /// Pool index used for `attempt` (1-indexed).
    pub fn index_for(&self, attempt: u32) -> usize {
        let n = self.credentials.len();
        let offset = attempt.saturating_sub(1) as usize;
        match self.mode {
            RotationMode::FixedWithFallback => offset.min(n - 1),
            RotationMode::RoundRobin => (self.start + offset) % n,
        }
    }
}
