//! Awaiting a State Store until it reaches a state of interest.
//!
//! Waiters are event driven: the first item of every subscription is the
//! snapshot current at registration, so a machine that is already terminal
//! resolves the waiter without any further transition.

use crate::error::RequestError;
use crate::machine::{Category, MachineService, RequestId, Snapshot, Subscription};
use std::time::Duration;

/// Detail prefix used when the store goes away under a waiter.
pub const STORE_CLOSED: &str = "store_closed";

fn store_closed<C: Category>() -> RequestError {
    RequestError::Unavailable(format!("{STORE_CLOSED}: {} machine shut down", C::NAME))
}

/// Drain `subscription` until a snapshot satisfies `predicate`.
pub async fn wait_on<C, P>(
    subscription: &mut Subscription<C>,
    mut predicate: P,
) -> Result<Snapshot<C>, RequestError>
where
    C: Category,
    P: FnMut(&Snapshot<C>) -> bool,
{
    while let Some(snapshot) = subscription.next().await {
        if predicate(&snapshot) {
            return Ok(snapshot);
        }
    }
    Err(store_closed::<C>())
}

/// Subscribe to `service` and resolve on the first snapshot matching
/// `predicate`. Dropping the future releases the subscription.
pub async fn wait_for_state<C, P>(
    service: &MachineService<C>,
    predicate: P,
) -> Result<Snapshot<C>, RequestError>
where
    C: Category,
    P: FnMut(&Snapshot<C>) -> bool,
{
    let mut subscription = service.subscribe().await.map_err(|_| store_closed::<C>())?;
    wait_on(&mut subscription, predicate).await
}

/// Resolve on the next terminal snapshot (possibly the current one).
pub async fn wait_for_terminal<C: Category>(
    service: &MachineService<C>,
) -> Result<Snapshot<C>, RequestError> {
    wait_for_state(service, |snapshot| snapshot.state.is_terminal()).await
}

/// Wait on an existing subscription for `request_id` to finish and narrow
/// the terminal snapshot to its output or failure.
pub async fn wait_outcome_on<C: Category>(
    subscription: &mut Subscription<C>,
    request_id: &RequestId,
    deadline: Option<Duration>,
) -> Result<C::Output, RequestError> {
    let finished = wait_on(subscription, |snapshot| {
        snapshot.state.is_terminal() && snapshot.context.is_for(request_id)
    });
    let snapshot = match deadline {
        Some(limit) => tokio::time::timeout(limit, finished).await.map_err(|_| {
            tracing::warn!(category = C::NAME, request_id = %request_id, "gave up waiting for outcome");
            RequestError::Timeout(format!("no outcome within {}s", limit.as_secs_f64()))
        })??,
        None => finished.await?,
    };
    match snapshot.outcome() {
        Some(outcome) => outcome,
        None => Err(RequestError::OperationFailed(
            "machine resolved without a terminal state".to_string(),
        )),
    }
}

/// Subscribe to `service` and wait for `request_id`'s outcome.
pub async fn wait_for_outcome<C: Category>(
    service: &MachineService<C>,
    request_id: &RequestId,
    deadline: Option<Duration>,
) -> Result<C::Output, RequestError> {
    let mut subscription = service.subscribe().await.map_err(|_| store_closed::<C>())?;
    wait_outcome_on(&mut subscription, request_id, deadline).await
}
