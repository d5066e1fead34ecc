use crate::providers::local::Availability;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `Gistline`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; the binary and config loader continue to
/// use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum GistError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── LLM / Provider ──────────────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    // ── Content extraction ──────────────────────────────────────────────
    #[error("extract: {0}")]
    Extract(#[from] ExtractError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Provider errors ────────────────────────────────────────────────────────

/// Failures surfaced by a provider gateway.
///
/// Every variant is terminal for the call that produced it. Malformed units
/// inside a healthy stream are not represented here; see
/// [`ProtocolParseError`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP status (`status` set) or a connection failure
    /// (`status` is `None`).
    #[error("{provider} transport error{}: {body}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        provider: String,
        status: Option<u16>,
        body: String,
    },

    #[error("{provider} rejected the credential: {message}")]
    Auth { provider: String, message: String },

    #[error("on-device model unavailable: {0}")]
    Availability(Availability),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    pub fn connection(provider: &str, err: &impl std::fmt::Display) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            status: None,
            body: crate::providers::scrub::sanitize_api_error(&err.to_string()),
        }
    }

    pub fn missing_credential(provider: &str) -> Self {
        Self::Auth {
            provider: provider.to_string(),
            message: "no API key configured".to_string(),
        }
    }

    /// Status code for transport errors, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// A single malformed unit inside an otherwise healthy stream.
///
/// Never propagated: decoders log it and move on.
#[derive(Debug, Error)]
#[error("skipping malformed {format} unit `{preview}`: {source}")]
pub struct ProtocolParseError {
    pub format: &'static str,
    pub preview: String,
    #[source]
    pub source: serde_json::Error,
}

impl ProtocolParseError {
    const PREVIEW_CHARS: usize = 80;

    pub fn new(format: &'static str, unit: &str, source: serde_json::Error) -> Self {
        let mut preview: String = unit.chars().take(Self::PREVIEW_CHARS).collect();
        if unit.chars().count() > Self::PREVIEW_CHARS {
            preview.push_str("...");
        }
        Self {
            format,
            preview,
            source,
        }
    }
}

// ─── Storage errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt value for key {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─── Extraction errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {source_name}: {message}")]
    Read {
        source_name: String,
        message: String,
    },

    #[error("no readable text found in {0}")]
    Empty(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, GistError>;
