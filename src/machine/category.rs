use crate::error::RequestError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// A class of privileged operation with its own machine definition.
///
/// Implementors are zero-sized markers; all request data lives in the
/// associated types so a single generic State Store serves every category.
pub trait Category: Debug + Clone + Copy + Default + PartialEq + Eq + Send + Sync + 'static {
    /// Short lowercase name, e.g. `"sign"`. Also the persistence key.
    const NAME: &'static str;

    /// Name of the initiating event, e.g. `START_SIGN`.
    const START_EVENT: &'static str;

    /// The validated page request.
    type Input: Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Success payload returned to the page.
    type Output: Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// User-entered or derived fields edited while reviewing.
    type Draft: Debug
        + Clone
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Category-specific data-entry events.
    type Edit: Debug + Clone + Send + 'static;

    /// Validate and normalise raw call parameters into a request.
    fn parse_input(params: serde_json::Value) -> Result<Self::Input, RequestError>;

    /// Calling page origin, for logs and the approval prompt.
    fn origin(input: &Self::Input) -> &str;

    /// Initial draft for a freshly accepted request.
    fn draft_for(input: &Self::Input) -> Self::Draft;

    /// Apply one data-entry event to the draft.
    fn apply_edit(draft: &mut Self::Draft, edit: Self::Edit) -> Result<(), String>;

    /// Refuse approval while the draft is incomplete.
    fn check_ready(input: &Self::Input, draft: &Self::Draft) -> Result<(), String>;
}

/// The opaque capability a machine invokes after approval.
pub trait PrivilegedOperation<C: Category>: Send + Sync {
    fn execute<'a>(
        &'a self,
        input: &'a C::Input,
        draft: &'a C::Draft,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<C::Output>> + Send + 'a>>;
}

/// Events any holder of a service handle may send.
///
/// Operation completion and review expiry are internal to the store and
/// cannot be forged through this type.
#[derive(Debug, Clone)]
pub enum MachineEvent<C: Category> {
    Start {
        request_id: super::RequestId,
        input: C::Input,
    },
    Approve,
    Reject {
        reason: Option<String>,
    },
    Edit(C::Edit),
}

impl<C: Category> MachineEvent<C> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => C::START_EVENT,
            Self::Approve => "APPROVE",
            Self::Reject { .. } => "REJECT",
            Self::Edit(_) => "EDIT",
        }
    }
}
