#[path = "approval_flow/persistence.rs"]
mod persistence;
#[path = "approval_flow/scenarios.rs"]
mod scenarios;
#[path = "approval_flow/websocket.rs"]
mod websocket;
