use super::{RegisteredMethod, RelayMethod};
use crate::categories::{SendCategory, SignCategory};
use crate::machine::MachineService;
use std::sync::Arc;
use std::time::Duration;

pub const SIGN_MESSAGE: &str = "signMessage";
pub const SEND_TRANSACTION: &str = "sendTransaction";

/// `signMessage`, relayed into the sign store.
pub fn sign_request_methods(
    service: MachineService<SignCategory>,
    deadline: Option<Duration>,
) -> Vec<RegisteredMethod> {
    vec![RegisteredMethod::new(
        SIGN_MESSAGE,
        Arc::new(RelayMethod::new(service, deadline)),
    )]
}

/// `sendTransaction`, relayed into the send store.
pub fn send_request_methods(
    service: MachineService<SendCategory>,
    deadline: Option<Duration>,
) -> Vec<RegisteredMethod> {
    vec![RegisteredMethod::new(
        SEND_TRANSACTION,
        Arc::new(RelayMethod::new(service, deadline)),
    )]
}

/// The State Store handles a bridge is bound to.
#[derive(Clone)]
pub struct BridgeServices {
    pub sign: MachineService<SignCategory>,
    pub send: MachineService<SendCategory>,
    /// Page-side wait limit per call; `None` waits for the machine.
    pub call_timeout: Option<Duration>,
}

impl BridgeServices {
    /// Every method the wallet exposes to pages.
    #[must_use]
    pub fn methods(&self) -> Vec<RegisteredMethod> {
        let mut methods = sign_request_methods(self.sign.clone(), self.call_timeout);
        methods.extend(send_request_methods(self.send.clone(), self.call_timeout));
        methods
    }
}
