use std::sync::Arc;

use walletgate::categories::{SendInput, SignInput};
use walletgate::config::Config;
use walletgate::machine::{FailureCode, MachineEvent, MachineState, RequestId};
use walletgate::popup::PopupRuntime;
use walletgate::wallet::LocalKeyWallet;

fn sqlite_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.surface.kind = "popup".into();
    config.store.backend = "sqlite".into();
    config.store.path = dir.path().join("state.db").display().to_string();
    config
}

async fn open(config: &Config) -> PopupRuntime {
    PopupRuntime::init_with_wallet(config, Arc::new(LocalKeyWallet::generate()))
        .await
        .unwrap()
}

#[tokio::test]
async fn restart_fails_unfinished_review_and_keeps_terminal_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    let (review_revision, declined_revision) = {
        let runtime = open(&config).await;
        let sign = runtime.services().sign.clone();
        let send = runtime.services().send.clone();

        sign.send(MachineEvent::Start {
            request_id: RequestId::new(),
            input: SignInput {
                origin: "https://dapp.example".into(),
                message: "left open".into(),
            },
        })
        .await
        .unwrap();

        send.send(MachineEvent::Start {
            request_id: RequestId::new(),
            input: SendInput {
                origin: "https://dapp.example".into(),
                to: "fuel1recipient".into(),
                asset_id: None,
                amount: None,
            },
        })
        .await
        .unwrap();
        send.send(MachineEvent::Reject { reason: None }).await.unwrap();

        let revisions = (sign.snapshot().revision, send.snapshot().revision);
        runtime.teardown();
        revisions
    };

    let runtime = open(&config).await;
    let sign = runtime.services().sign.snapshot();
    assert_eq!(sign.state, MachineState::Failed);
    assert_eq!(sign.revision, review_revision + 1);
    assert_eq!(sign.context.error.unwrap().code, FailureCode::Interrupted);
    assert_eq!(sign.context.input.unwrap().message, "left open");

    let send = runtime.services().send.snapshot();
    assert_eq!(send.state, MachineState::Failed);
    assert_eq!(send.revision, declined_revision);
    assert_eq!(send.context.error.unwrap().code, FailureCode::Declined);

    let rows = runtime.store().list().await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn recovered_store_accepts_a_new_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    {
        let runtime = open(&config).await;
        runtime
            .services()
            .sign
            .send(MachineEvent::Start {
                request_id: RequestId::new(),
                input: SignInput {
                    origin: "https://dapp.example".into(),
                    message: "first".into(),
                },
            })
            .await
            .unwrap();
        runtime.teardown();
    }

    let runtime = open(&config).await;
    let sign = runtime.services().sign.clone();
    let fresh = RequestId::new();
    let state = sign
        .send(MachineEvent::Start {
            request_id: fresh.clone(),
            input: SignInput {
                origin: "https://dapp.example".into(),
                message: "second".into(),
            },
        })
        .await
        .unwrap();
    assert_eq!(state, MachineState::Reviewing);
    assert!(sign.snapshot().context.is_for(&fresh));
}
