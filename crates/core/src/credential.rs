//! Upstream provider credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading characters that may appear in logs.
const MASK_VISIBLE_CHARS: usize = 6;

/// Which upstream provider a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Transcription,
    Ai,
    Youtube,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Ai => "ai",
            Self::Youtube => "youtube",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secret used to call an upstream provider.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Stable identifier, e.g. "transcription-1"
    pub id: String,
    secret: String,
    pub kind: CredentialKind,
}

impl Credential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>, kind: CredentialKind) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            kind,
        }
    }

    /// The raw secret, for building upstream requests only.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Short prefix safe for logs.
    pub fn masked(&self) -> String {
        let prefix: String = self.secret.chars().take(MASK_VISIBLE_CHARS).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &self.masked())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Builds credentials from configured secrets, skipping blank entries.
pub fn credentials_from_secrets<S: AsRef<str>>(
    kind: CredentialKind,
    secrets: &[S],
) -> Vec<Credential> {
    secrets
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, s)| Credential::new(format!("{}-{}", kind, i + 1), s, kind))
        .collect()
}
