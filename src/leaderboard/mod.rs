//! Remote daily leaderboard
//!
//! - `protocol`: request/response shapes, message template, validation
//! - `client`: HTTP client for the hosted service
//! - `memory`: in-process service with the same acceptance rules
//!
//! Nothing in here may interrupt gameplay. Callers turn every
//! [`RemoteError`] into a notification and move on.

pub mod client;
pub mod memory;
pub mod protocol;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use client::LeaderboardClient;
pub use memory::MemoryLeaderboard;
pub use protocol::{
    LeaderboardEntry, MAX_LEVEL, MAX_LIMIT, MAX_SCORE, SubmitRequest, SubmitResponse,
    score_message, validate_submission,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error("nonce already used")]
    Replay,
    #[error("signature does not match address")]
    Signature,
    #[error("network error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Schema(String),
    #[error("server rejected request ({status}): {error}")]
    Rejected { status: u16, error: String },
    #[error("no signer available")]
    NoSigner,
}

impl RemoteError {
    /// Map an `{ ok: false, error }` reply to a variant
    pub fn from_status(status: u16, error: String) -> Self {
        match status {
            400 | 422 => RemoteError::Validation(error),
            401 | 403 => RemoteError::Signature,
            409 => RemoteError::Replay,
            _ => RemoteError::Rejected { status, error },
        }
    }

    /// Only network failures are worth another try, and the game never
    /// retries on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }

    /// Short text for a toast
    pub fn toast_message(&self) -> String {
        match self {
            RemoteError::Validation(reason) => format!("Score not submitted: {reason}"),
            RemoteError::Replay => "Score already recorded".to_string(),
            RemoteError::Signature => "Signature was rejected".to_string(),
            RemoteError::Transport(_) => "Leaderboard unreachable".to_string(),
            RemoteError::Schema(_) => "Leaderboard sent an unexpected reply".to_string(),
            RemoteError::Rejected { status, .. } => format!("Leaderboard error ({status})"),
            RemoteError::NoSigner => "Connect a wallet to submit scores".to_string(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

/// Signs score messages on behalf of a player address
pub trait ScoreSigner {
    fn address(&self) -> &str;
    fn sign(&self, message: &str) -> Result<String, RemoteError>;
}

/// Recovers the signing address from a signature
pub trait SignatureVerifier {
    fn recover(&self, message: &str, signature: &str) -> Option<String>;
}

fn digest_hex(address: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    hasher.update(b"\n");
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

/// Keyless signer for local play and tests
///
/// The signature is `<address>:<sha256(address \n message)>`, which proves
/// nothing about key ownership. Wallet-backed signers replace it in the
/// browser.
#[derive(Debug, Clone)]
pub struct DigestSigner {
    address: String,
}

impl DigestSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl ScoreSigner for DigestSigner {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, message: &str) -> Result<String, RemoteError> {
        Ok(format!("{}:{}", self.address, digest_hex(&self.address, message)))
    }
}

/// Verifier matching [`DigestSigner`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestVerifier;

impl SignatureVerifier for DigestVerifier {
    fn recover(&self, message: &str, signature: &str) -> Option<String> {
        let (address, digest) = signature.rsplit_once(':')?;
        (digest_hex(address, message) == digest).then(|| address.to_string())
    }
}
