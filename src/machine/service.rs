use super::category::{Category, MachineEvent, PrivilegedOperation};
use super::context::{RequestId, Snapshot};
use super::persist::{MemorySnapshotStore, PersistedSnapshot, SnapshotStore};
use super::state::MachineState;
use super::transition::{Effect, Internal, Machine};
use crate::error::{MachineError, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Construction options for a State Store.
#[derive(Clone)]
pub struct MachineOptions {
    /// Fail a request that is still reviewing after this long.
    pub review_timeout: Option<Duration>,
    /// Where snapshots are written after every transition.
    pub store: Arc<dyn SnapshotStore>,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            review_timeout: None,
            store: Arc::new(MemorySnapshotStore::new()),
        }
    }
}

enum Command<C: Category> {
    Event {
        event: MachineEvent<C>,
        reply: oneshot::Sender<Result<MachineState, MachineError>>,
    },
    Internal(Internal<C>),
    Subscribe {
        reply: oneshot::Sender<(u64, mpsc::UnboundedReceiver<Snapshot<C>>)>,
    },
    Unsubscribe(u64),
}

/// Cloneable handle to one category's State Store.
///
/// The store itself is an actor task that owns the machine; every handle
/// (bridge, approval UI, waiters) talks to it through a single ordered queue.
pub struct MachineService<C: Category> {
    commands: mpsc::UnboundedSender<Command<C>>,
    current: watch::Receiver<Snapshot<C>>,
}

impl<C: Category> Clone for MachineService<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            current: self.current.clone(),
        }
    }
}

impl<C: Category> MachineService<C> {
    /// Load the last persisted snapshot (if any) and start the actor.
    pub async fn spawn(
        operation: Arc<dyn PrivilegedOperation<C>>,
        options: MachineOptions,
    ) -> anyhow::Result<Self> {
        let loaded = match options.store.load(C::NAME).await {
            Ok(Some(persisted)) => persisted.decode::<C>().map(Some).map_err(anyhow::Error::from),
            Ok(None) => Ok(None),
            Err(error) => Err(error),
        };
        let machine = match loaded {
            Ok(Some(snapshot)) => {
                let machine = Machine::restore(snapshot);
                tracing::info!(
                    category = C::NAME,
                    state = %machine.state(),
                    "restored persisted machine snapshot"
                );
                machine
            }
            Ok(None) => Machine::new(),
            Err(error)
                if error
                    .downcast_ref::<StoreError>()
                    .is_some_and(StoreError::is_corrupt_record) =>
            {
                tracing::warn!(
                    category = C::NAME,
                    "discarding unreadable persisted snapshot: {error:#}"
                );
                Machine::new()
            }
            Err(error) => return Err(error),
        };

        let restored = machine.snapshot();
        let (commands, queue) = mpsc::unbounded_channel();
        let (publish, current) = watch::channel(restored.clone());

        let actor = MachineActor {
            machine,
            operation,
            store: options.store,
            review_timeout: options.review_timeout,
            publish,
            listeners: HashMap::new(),
            next_listener: 0,
            commands: commands.downgrade(),
        };
        // Recovery may have rewritten the snapshot; make it durable before
        // anyone can observe it.
        actor.persist(&restored).await;
        tokio::spawn(actor.run(queue));

        Ok(Self { commands, current })
    }

    /// Send one event and wait for the store to accept or refuse it.
    ///
    /// Returns the state after the event was applied.
    pub async fn send(&self, event: MachineEvent<C>) -> Result<MachineState, MachineError> {
        let (reply, accepted) = oneshot::channel();
        self.commands
            .send(Command::Event { event, reply })
            .map_err(|_| MachineError::Closed(C::NAME))?;
        accepted.await.map_err(|_| MachineError::Closed(C::NAME))?
    }

    /// Give up on `request_id` if it is still waiting for a decision.
    ///
    /// Fails it with `timeout`; a request already processing or finished,
    /// or a newer request, is left alone.
    pub(crate) fn expire(&self, request_id: &RequestId) {
        let _ = self.commands.send(Command::Internal(Internal::Expire {
            request_id: request_id.clone(),
        }));
    }

    /// Latest published snapshot. Never blocks.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<C> {
        self.current.borrow().clone()
    }

    /// Register a listener.
    ///
    /// The first item delivered is the snapshot current at registration, then
    /// every later transition in order. Dropping the subscription releases it.
    pub async fn subscribe(&self) -> Result<Subscription<C>, MachineError> {
        let (reply, registered) = oneshot::channel();
        self.commands
            .send(Command::Subscribe { reply })
            .map_err(|_| MachineError::Closed(C::NAME))?;
        let (id, updates) = registered
            .await
            .map_err(|_| MachineError::Closed(C::NAME))?;
        Ok(Subscription {
            id,
            updates,
            commands: self.commands.clone(),
        })
    }

    #[must_use]
    pub fn category(&self) -> &'static str {
        C::NAME
    }
}

/// A live listener on a State Store.
pub struct Subscription<C: Category> {
    id: u64,
    updates: mpsc::UnboundedReceiver<Snapshot<C>>,
    commands: mpsc::UnboundedSender<Command<C>>,
}

impl<C: Category> Subscription<C> {
    /// Next snapshot, or `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<Snapshot<C>> {
        self.updates.recv().await
    }
}

impl<C: Category> Drop for Subscription<C> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unsubscribe(self.id));
    }
}

struct MachineActor<C: Category> {
    machine: Machine<C>,
    operation: Arc<dyn PrivilegedOperation<C>>,
    store: Arc<dyn SnapshotStore>,
    review_timeout: Option<Duration>,
    publish: watch::Sender<Snapshot<C>>,
    listeners: HashMap<u64, mpsc::UnboundedSender<Snapshot<C>>>,
    next_listener: u64,
    commands: mpsc::WeakUnboundedSender<Command<C>>,
}

impl<C: Category> MachineActor<C> {
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Command<C>>) {
        while let Some(command) = queue.recv().await {
            match command {
                Command::Event { event, reply } => {
                    let outcome = self.handle_event(event).await;
                    let _ = reply.send(outcome);
                }
                Command::Internal(event) => {
                    let before = self.machine.state();
                    if self.machine.apply_internal(event) {
                        tracing::info!(
                            category = C::NAME,
                            from = %before,
                            to = %self.machine.state(),
                            "machine transition"
                        );
                        self.commit().await;
                    } else {
                        tracing::debug!(category = C::NAME, "ignored stale internal event");
                    }
                }
                Command::Subscribe { reply } => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let _ = tx.send(self.machine.snapshot());
                    let id = self.next_listener;
                    self.next_listener += 1;
                    if reply.send((id, rx)).is_ok() {
                        self.listeners.insert(id, tx);
                    }
                }
                Command::Unsubscribe(id) => {
                    self.listeners.remove(&id);
                }
            }
        }
        tracing::debug!(category = C::NAME, "machine actor stopped");
    }

    async fn handle_event(&mut self, event: MachineEvent<C>) -> Result<MachineState, MachineError> {
        let name = event.name();
        let before = self.machine.state();
        let revision = self.machine.snapshot().revision;

        let effect = match self.machine.apply(event) {
            Ok(effect) => effect,
            Err(error) => {
                tracing::warn!(category = C::NAME, event = name, state = %before, "event refused: {error}");
                return Err(error);
            }
        };

        let after = self.machine.state();
        tracing::info!(category = C::NAME, event = name, from = %before, to = %after, "machine transition");
        if self.machine.snapshot().revision != revision {
            self.commit().await;
        }
        if let Some(effect) = effect {
            self.start_effect(effect);
        }
        Ok(after)
    }

    fn start_effect(&self, effect: Effect<C>) {
        match effect {
            Effect::ArmDeadline { request_id } => {
                if let Some(timeout) = self.review_timeout {
                    let commands = self.commands.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        if let Some(commands) = commands.upgrade() {
                            let _ = commands.send(Command::Internal(Internal::Expire { request_id }));
                        }
                    });
                }
            }
            Effect::RunOperation {
                request_id,
                input,
                draft,
            } => {
                // Holding a strong sender keeps the store alive until the
                // operation reports back, even if every handle is dropped.
                let Some(commands) = self.commands.upgrade() else {
                    return;
                };
                let operation = Arc::clone(&self.operation);
                tokio::spawn(async move {
                    let run = tokio::spawn(async move { operation.execute(&input, &draft).await });
                    let result = match run.await {
                        Ok(Ok(output)) => Ok(output),
                        Ok(Err(error)) => Err(format!("{error:#}")),
                        Err(join_error) => Err(format!("operation aborted: {join_error}")),
                    };
                    if let Err(message) = &result {
                        tracing::warn!(category = C::NAME, request_id = %request_id, "privileged operation failed: {message}");
                    }
                    let _ = commands.send(Command::Internal(Internal::OperationFinished {
                        request_id,
                        result,
                    }));
                });
            }
        }
    }

    /// Persist, then publish to the snapshot cell and every listener.
    async fn commit(&mut self) {
        let snapshot = self.machine.snapshot();
        self.persist(&snapshot).await;
        self.publish.send_replace(snapshot.clone());
        self.listeners
            .retain(|_, listener| listener.send(snapshot.clone()).is_ok());
    }

    async fn persist(&self, snapshot: &Snapshot<C>) {
        let record = match PersistedSnapshot::encode(snapshot) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(category = C::NAME, "failed to encode snapshot: {error:#}");
                return;
            }
        };
        if let Err(error) = self.store.save(&record).await {
            tracing::warn!(
                category = C::NAME,
                store = self.store.name(),
                "failed to persist snapshot: {error:#}"
            );
        }
    }
}
