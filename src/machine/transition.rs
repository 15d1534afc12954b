use super::category::{Category, MachineEvent};
use super::context::{Failure, FailureCode, MachineContext, RequestId, Snapshot};
use super::state::MachineState;
use crate::error::MachineError;

/// Events only the store itself produces.
#[derive(Debug)]
pub(crate) enum Internal<C: Category> {
    OperationFinished {
        request_id: RequestId,
        result: Result<C::Output, String>,
    },
    Expire {
        request_id: RequestId,
    },
}

/// Work the owning actor must start after a transition.
#[derive(Debug)]
pub(crate) enum Effect<C: Category> {
    ArmDeadline {
        request_id: RequestId,
    },
    RunOperation {
        request_id: RequestId,
        input: C::Input,
        draft: C::Draft,
    },
}

/// Pure transition table for one category.
///
/// Owns the state and context outright; the actor in `service.rs` is its only
/// caller, which makes this the single write path for Machine Context.
#[derive(Debug)]
pub(crate) struct Machine<C: Category> {
    state: MachineState,
    context: MachineContext<C>,
    revision: u64,
}

impl<C: Category> Machine<C> {
    pub(crate) fn new() -> Self {
        Self {
            state: MachineState::Idle,
            context: MachineContext::default(),
            revision: 0,
        }
    }

    /// Rebuild a machine from a persisted snapshot.
    ///
    /// Terminal and idle snapshots come back verbatim. A request that was
    /// still reviewing or processing cannot be resumed: its caller is gone and
    /// the operation must not run twice, so it is failed as interrupted.
    pub(crate) fn restore(snapshot: Snapshot<C>) -> Self {
        let Snapshot {
            state,
            mut context,
            revision,
        } = snapshot;

        if !state.is_busy() {
            return Self {
                state,
                context,
                revision,
            };
        }

        context.result = None;
        context.error = Some(Failure::new(
            FailureCode::Interrupted,
            format!("{} request was still {state} when the wallet restarted", C::NAME),
        ));
        Self {
            state: MachineState::Failed,
            context,
            revision: revision + 1,
        }
    }

    pub(crate) fn state(&self) -> MachineState {
        self.state
    }

    pub(crate) fn snapshot(&self) -> Snapshot<C> {
        Snapshot {
            state: self.state,
            context: self.context.clone(),
            revision: self.revision,
        }
    }

    pub(crate) fn apply(
        &mut self,
        event: MachineEvent<C>,
    ) -> Result<Option<Effect<C>>, MachineError> {
        let name = event.name();
        match event {
            MachineEvent::Start { request_id, input } => {
                if self.state.is_busy() {
                    return Err(MachineError::Busy {
                        category: C::NAME,
                        state: self.state,
                    });
                }
                self.context = MachineContext::for_request(request_id.clone(), input);
                self.enter(MachineState::Reviewing);
                Ok(Some(Effect::ArmDeadline { request_id }))
            }
            MachineEvent::Approve => {
                self.require(MachineState::Reviewing, name)?;
                let (Some(request_id), Some(input)) = (&self.context.request_id, &self.context.input)
                else {
                    return Err(MachineError::NotReady("no pending request".to_string()));
                };
                C::check_ready(input, &self.context.draft).map_err(MachineError::NotReady)?;
                let effect = Effect::RunOperation {
                    request_id: request_id.clone(),
                    input: input.clone(),
                    draft: self.context.draft.clone(),
                };
                self.enter(MachineState::Processing);
                Ok(Some(effect))
            }
            MachineEvent::Reject { reason } => {
                self.require(MachineState::Reviewing, name)?;
                let message = reason
                    .filter(|reason| !reason.trim().is_empty())
                    .unwrap_or_else(|| "request declined by user".to_string());
                self.context.error = Some(Failure::new(FailureCode::Declined, message));
                self.enter(MachineState::Failed);
                Ok(None)
            }
            MachineEvent::Edit(edit) => {
                self.require(MachineState::Reviewing, name)?;
                let mut draft = self.context.draft.clone();
                C::apply_edit(&mut draft, edit).map_err(MachineError::InvalidEdit)?;
                if draft != self.context.draft {
                    self.context.draft = draft;
                    self.revision += 1;
                }
                Ok(None)
            }
        }
    }

    /// Apply a store-internal event. Returns whether anything changed.
    ///
    /// Completions and expiries addressed to another request, or arriving
    /// after the request left the expected state, are stale and ignored.
    pub(crate) fn apply_internal(&mut self, event: Internal<C>) -> bool {
        match event {
            Internal::OperationFinished { request_id, result } => {
                if self.state != MachineState::Processing || !self.context.is_for(&request_id) {
                    return false;
                }
                match result {
                    Ok(output) => {
                        self.context.result = Some(output);
                        self.enter(MachineState::Done);
                    }
                    Err(message) => {
                        self.context.error = Some(Failure::new(FailureCode::Operation, message));
                        self.enter(MachineState::Failed);
                    }
                }
                true
            }
            Internal::Expire { request_id } => {
                if self.state != MachineState::Reviewing || !self.context.is_for(&request_id) {
                    return false;
                }
                self.context.error = Some(Failure::new(
                    FailureCode::Timeout,
                    "no decision before the review deadline",
                ));
                self.enter(MachineState::Failed);
                true
            }
        }
    }

    fn require(&self, expected: MachineState, event: &'static str) -> Result<(), MachineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(MachineError::InvalidTransition {
                from: self.state,
                event,
            })
        }
    }

    fn enter(&mut self, next: MachineState) {
        self.state = next;
        self.revision += 1;
    }
}
