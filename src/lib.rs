#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod bridge;
pub mod categories;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod machine;
pub mod popup;
pub mod ui;
pub mod waiter;
pub mod wallet;

pub use bridge::{CallEnvelope, ReplyEnvelope, RequestBridge};
pub use config::Config;
pub use error::{RequestError, WalletError};
pub use gate::{LifecycleGate, RuntimeSurface};
pub use machine::{MachineService, MachineState, RequestId, Snapshot};
