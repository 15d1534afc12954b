use super::category::Category;
use super::state::MachineState;
use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlates a dispatched request with the terminal snapshot it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureCode {
    /// The human rejected the request.
    Declined,
    /// The privileged operation failed.
    Operation,
    /// No decision before the review deadline.
    Timeout,
    /// Found unfinished after a restart.
    Interrupted,
}

/// Structured rejection stored in a `failed` context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: FailureCode,
    pub message: String,
}

impl Failure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<Failure> for RequestError {
    fn from(failure: Failure) -> Self {
        match failure.code {
            FailureCode::Declined => Self::Declined(failure.message),
            FailureCode::Operation => Self::OperationFailed(failure.message),
            FailureCode::Timeout => Self::Timeout(failure.message),
            FailureCode::Interrupted => Self::Interrupted(failure.message),
        }
    }
}

/// Data owned by one State Store.
///
/// `result` is set only in `done` and `error` only in `failed`; both are
/// cleared whenever a new request starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MachineContext<C: Category> {
    pub request_id: Option<RequestId>,
    pub input: Option<C::Input>,
    #[serde(default)]
    pub draft: C::Draft,
    pub result: Option<C::Output>,
    pub error: Option<Failure>,
}

impl<C: Category> Default for MachineContext<C> {
    fn default() -> Self {
        Self {
            request_id: None,
            input: None,
            draft: C::Draft::default(),
            result: None,
            error: None,
        }
    }
}

impl<C: Category> MachineContext<C> {
    pub(crate) fn for_request(request_id: RequestId, input: C::Input) -> Self {
        Self {
            request_id: Some(request_id),
            draft: C::draft_for(&input),
            input: Some(input),
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn is_for(&self, request_id: &RequestId) -> bool {
        self.request_id.as_ref() == Some(request_id)
    }
}

/// Point-in-time view of a State Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Snapshot<C: Category> {
    pub state: MachineState,
    pub context: MachineContext<C>,
    /// Increases by one on every applied transition.
    pub revision: u64,
}

impl<C: Category> Snapshot<C> {
    #[must_use]
    pub fn category(&self) -> &'static str {
        C::NAME
    }

    /// Narrow a terminal snapshot to the caller-facing outcome.
    ///
    /// Returns `None` while the machine is not terminal.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<C::Output, RequestError>> {
        match self.state {
            MachineState::Done => Some(self.context.result.clone().ok_or_else(|| {
                RequestError::OperationFailed("completed without a result".to_string())
            })),
            MachineState::Failed => Some(Err(self.context.error.clone().map_or_else(
                || RequestError::OperationFailed("failed without a reason".to_string()),
                RequestError::from,
            ))),
            _ => None,
        }
    }
}
