//! Per-category approval state machines.
//!
//! A State Store is a single actor task owning one [`transition::Machine`];
//! everything else holds a [`MachineService`] handle and talks to it by
//! message.

pub mod category;
pub mod context;
pub mod persist;
pub mod service;
pub mod state;
mod transition;

pub use category::{Category, MachineEvent, PrivilegedOperation};
pub use context::{Failure, FailureCode, MachineContext, RequestId, Snapshot};
pub use persist::{
    MemorySnapshotStore, PersistedSnapshot, SnapshotStore, SqliteSnapshotStore, open_store,
};
pub use service::{MachineOptions, MachineService, Subscription};
pub use state::MachineState;
