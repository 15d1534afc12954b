use thiserror::Error;

use crate::machine::MachineState;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `walletgate`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal plumbing (config files, SQLite,
/// CLI) continues to use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum WalletError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Inbound requests ────────────────────────────────────────────────
    #[error("request: {0}")]
    Request(#[from] RequestError),

    // ── State machine ───────────────────────────────────────────────────
    #[error("machine: {0}")]
    Machine(#[from] MachineError),

    // ── Snapshot persistence ────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Page transport ──────────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

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

// ─── Request errors ──────────────────────────────────────────────────────────

/// The only failure a calling page ever sees.
///
/// Every variant maps onto a stable wire code (see [`RequestError::code`]) so
/// the page side can rebuild the same variant from a reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("request declined: {0}")]
    Declined(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{category} request already in progress")]
    Busy { category: String },

    #[error("request interrupted: {0}")]
    Interrupted(String),

    #[error("bridge unavailable: {0}")]
    Unavailable(String),

    #[error("page connection closed")]
    Disconnected,
}

impl RequestError {
    /// Wire code carried in reply envelopes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::MethodNotFound(_) => "method_not_found",
            Self::Declined(_) => "declined",
            Self::OperationFailed(_) => "operation_failed",
            Self::Timeout(_) => "timeout",
            Self::Busy { .. } => "busy",
            Self::Interrupted(_) => "interrupted",
            Self::Unavailable(_) => "unavailable",
            Self::Disconnected => "disconnected",
        }
    }

    /// Detail text without the variant prefix, as sent over the wire.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidRequest(message)
            | Self::MethodNotFound(message)
            | Self::Declined(message)
            | Self::OperationFailed(message)
            | Self::Timeout(message)
            | Self::Interrupted(message)
            | Self::Unavailable(message) => message.clone(),
            Self::Busy { category } => category.clone(),
            Self::Disconnected => String::new(),
        }
    }

    /// Rebuild an error from a wire code and its detail text.
    ///
    /// Unknown codes degrade to [`RequestError::Unavailable`].
    #[must_use]
    pub fn from_wire(code: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match code {
            "invalid_request" => Self::InvalidRequest(detail),
            "method_not_found" => Self::MethodNotFound(detail),
            "declined" => Self::Declined(detail),
            "operation_failed" => Self::OperationFailed(detail),
            "timeout" => Self::Timeout(detail),
            "busy" => Self::Busy { category: detail },
            "interrupted" => Self::Interrupted(detail),
            "disconnected" => Self::Disconnected,
            _ => Self::Unavailable(detail),
        }
    }
}

// ─── State machine errors ───────────────────────────────────────────────────

/// Why a State Store refused an event. The machine is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("{category} machine is busy ({state})")]
    Busy {
        category: &'static str,
        state: MachineState,
    },

    #[error("event {event} is not allowed in state {from}")]
    InvalidTransition {
        from: MachineState,
        event: &'static str,
    },

    #[error("request is not ready for approval: {0}")]
    NotReady(String),

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("{0} machine has shut down")]
    Closed(&'static str),
}

impl From<MachineError> for RequestError {
    fn from(error: MachineError) -> Self {
        match &error {
            MachineError::Busy { category, .. } => Self::Busy {
                category: (*category).to_string(),
            },
            MachineError::Closed(_) => Self::Unavailable(error.to_string()),
            MachineError::InvalidTransition { .. }
            | MachineError::NotReady(_)
            | MachineError::InvalidEdit(_) => Self::InvalidRequest(error.to_string()),
        }
    }
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown store backend: {0}")]
    UnknownBackend(String),

    #[error("snapshot for {category} does not decode: {source}")]
    Decode {
        category: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot for {category} has unknown state {state:?}")]
    UnknownState { category: String, state: String },

    #[error("snapshot encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// The row was read but its content is unusable. The store itself is fine.
    #[must_use]
    pub fn is_corrupt_record(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::UnknownState { .. })
    }
}

// ─── Transport errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
