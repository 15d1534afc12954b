use super::MethodHandler;
use crate::error::RequestError;
use crate::machine::{Category, MachineEvent, MachineService, RequestId};
use crate::waiter::wait_outcome_on;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Relays one method into a category's State Store.
///
/// Validates params, sends a single `START_<CATEGORY>` and waits for that
/// request's terminal snapshot. Everything else (review, edits, the
/// operation itself) happens in the store.
pub struct RelayMethod<C: Category> {
    service: MachineService<C>,
    deadline: Option<Duration>,
}

impl<C: Category> RelayMethod<C> {
    pub fn new(service: MachineService<C>, deadline: Option<Duration>) -> Self {
        Self { service, deadline }
    }

    async fn relay(&self, params: Value) -> Result<Value, RequestError> {
        let input = C::parse_input(params)?;
        let request_id = RequestId::new();
        tracing::info!(
            category = C::NAME,
            request_id = %request_id,
            origin = C::origin(&input),
            "dispatching page request"
        );

        // Attach before START so the terminal snapshot cannot slip past.
        let mut subscription = self.service.subscribe().await?;
        self.service
            .send(MachineEvent::Start {
                request_id: request_id.clone(),
                input,
            })
            .await?;

        let output = match self.deadline {
            None => wait_outcome_on(&mut subscription, &request_id, None).await?,
            Some(limit) => {
                let waited = tokio::time::timeout(
                    limit,
                    wait_outcome_on(&mut subscription, &request_id, None),
                )
                .await;
                match waited {
                    Ok(outcome) => outcome?,
                    Err(_) => {
                        // The page stops waiting, so the request must not stay
                        // approvable. One already processing runs to its end
                        // and the page gets that outcome instead.
                        tracing::warn!(
                            category = C::NAME,
                            request_id = %request_id,
                            "call deadline passed, expiring request"
                        );
                        self.service.expire(&request_id);
                        wait_outcome_on(&mut subscription, &request_id, None).await?
                    }
                }
            }
        };
        serde_json::to_value(output)
            .map_err(|e| RequestError::OperationFailed(format!("result encoding failed: {e}")))
    }
}

impl<C: Category> MethodHandler for RelayMethod<C> {
    fn category(&self) -> &'static str {
        C::NAME
    }

    fn call<'a>(
        &'a self,
        params: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, RequestError>> + Send + 'a>> {
        Box::pin(self.relay(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::sign::{SignCategory, SignInput, SignOutput};
    use crate::error::MachineError;
    use crate::machine::{FailureCode, MachineOptions, MachineState, PrivilegedOperation};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct FixedSigner;

    impl PrivilegedOperation<SignCategory> for FixedSigner {
        fn execute<'a>(
            &'a self,
            _input: &'a SignInput,
            _draft: &'a (),
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignOutput>> + Send + 'a>> {
            Box::pin(async {
                Ok(SignOutput {
                    signed_message: "0xfeed".into(),
                })
            })
        }
    }

    async fn sign_service() -> MachineService<SignCategory> {
        MachineService::spawn(Arc::new(FixedSigner), MachineOptions::default())
            .await
            .unwrap()
    }

    fn params() -> Value {
        json!({ "origin": "https://dapp.example", "message": "hello" })
    }

    #[tokio::test]
    async fn invalid_params_never_reach_the_machine() {
        let service = sign_service().await;
        let relay = RelayMethod::new(service.clone(), None);

        let err = relay.call(json!({ "message": "hi" })).await.unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(service.snapshot().revision, 0);
    }

    #[tokio::test]
    async fn one_invoke_sends_exactly_one_start() {
        let service = sign_service().await;
        let relay = Arc::new(RelayMethod::new(service.clone(), None));
        let mut observer = service.subscribe().await.unwrap();
        assert_eq!(observer.next().await.unwrap().state, MachineState::Idle);

        let call = tokio::spawn({
            let relay = relay.clone();
            async move { relay.call(params()).await }
        });

        let reviewing = observer.next().await.unwrap();
        assert_eq!(reviewing.state, MachineState::Reviewing);
        assert_eq!(reviewing.revision, 1);

        service.send(MachineEvent::Approve).await.unwrap();
        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({ "signedMessage": "0xfeed" }));

        // START, APPROVE, SUCCESS and nothing else.
        assert_eq!(service.snapshot().revision, 3);
        let states: Vec<MachineState> = [
            observer.next().await.unwrap(),
            observer.next().await.unwrap(),
        ]
        .iter()
        .map(|s| s.state)
        .collect();
        assert_eq!(states, vec![MachineState::Processing, MachineState::Done]);
    }

    /// Counts runs and holds each one until `release` is notified.
    struct HeldSigner {
        runs: AtomicUsize,
        release: Notify,
    }

    impl PrivilegedOperation<SignCategory> for HeldSigner {
        fn execute<'a>(
            &'a self,
            _input: &'a SignInput,
            _draft: &'a (),
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignOutput>> + Send + 'a>> {
            Box::pin(async move {
                self.runs.fetch_add(1, Ordering::SeqCst);
                self.release.notified().await;
                Ok(SignOutput {
                    signed_message: "0xbeef".into(),
                })
            })
        }
    }

    async fn held_service() -> (MachineService<SignCategory>, Arc<HeldSigner>) {
        let signer = Arc::new(HeldSigner {
            runs: AtomicUsize::new(0),
            release: Notify::new(),
        });
        let service = MachineService::spawn(signer.clone(), MachineOptions::default())
            .await
            .unwrap();
        (service, signer)
    }

    #[tokio::test(start_paused = true)]
    async fn call_deadline_fails_the_pending_request() {
        let (service, signer) = held_service().await;
        let relay = RelayMethod::new(service.clone(), Some(Duration::from_secs(1)));

        let err = relay.call(params()).await.unwrap_err();
        assert_eq!(err.code(), "timeout");

        let snapshot = service.snapshot();
        assert_eq!(snapshot.state, MachineState::Failed);
        assert_eq!(snapshot.context.error.unwrap().code, FailureCode::Timeout);

        // A late approval can no longer run the operation.
        let refused = service.send(MachineEvent::Approve).await.unwrap_err();
        assert!(matches!(refused, MachineError::InvalidTransition { .. }));
        assert_eq!(signer.runs.load(Ordering::SeqCst), 0);
        assert_eq!(service.snapshot().state, MachineState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn call_deadline_during_processing_waits_for_the_result() {
        let (service, signer) = held_service().await;
        let relay = Arc::new(RelayMethod::new(service.clone(), Some(Duration::from_secs(1))));
        let mut observer = service.subscribe().await.unwrap();
        observer.next().await.unwrap();

        let call = tokio::spawn({
            let relay = relay.clone();
            async move { relay.call(params()).await }
        });
        observer.next().await.unwrap();
        service.send(MachineEvent::Approve).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(service.snapshot().state, MachineState::Processing);
        signer.release.notify_one();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({ "signedMessage": "0xbeef" }));
        assert_eq!(signer.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn busy_store_rejects_second_call() {
        let service = sign_service().await;
        let relay = Arc::new(RelayMethod::new(service.clone(), None));
        let mut observer = service.subscribe().await.unwrap();
        observer.next().await.unwrap();

        let first = tokio::spawn({
            let relay = relay.clone();
            async move { relay.call(params()).await }
        });
        observer.next().await.unwrap();

        let err = relay.call(params()).await.unwrap_err();
        assert_eq!(err.code(), "busy");

        service
            .send(MachineEvent::Reject { reason: None })
            .await
            .unwrap();
        assert_eq!(first.await.unwrap().unwrap_err().code(), "declined");
    }
}
