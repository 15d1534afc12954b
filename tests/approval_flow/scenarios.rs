use std::sync::Arc;

use serde_json::json;
use walletgate::bridge::{SEND_TRANSACTION, SIGN_MESSAGE, in_process_pair};
use walletgate::categories::{BASE_ASSET_ID, FeeTier, SendEdit};
use walletgate::config::Config;
use walletgate::machine::{FailureCode, MachineEvent, MachineState};
use walletgate::popup::PopupRuntime;
use walletgate::wallet::LocalKeyWallet;
use walletgate::waiter::{wait_for_state, wait_for_terminal};

const KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";

async fn popup() -> PopupRuntime {
    popup_with(Config::default()).await
}

async fn popup_with(mut config: Config) -> PopupRuntime {
    config.surface.kind = "popup".into();
    config.store.backend = "memory".into();
    let wallet = LocalKeyWallet::from_hex(KEY).unwrap();
    PopupRuntime::init_with_wallet(&config, Arc::new(wallet))
        .await
        .unwrap()
}

#[tokio::test]
async fn approved_sign_request_returns_signature_to_page() {
    let runtime = popup().await;
    let page = in_process_pair(runtime.bridge());
    let sign = runtime.services().sign.clone();

    let call = tokio::spawn(async move {
        page.call(
            SIGN_MESSAGE,
            json!({ "origin": "https://dapp.example/path", "message": "hello" }),
        )
        .await
    });

    let reviewing = wait_for_state(&sign, |s| s.state == MachineState::Reviewing)
        .await
        .unwrap();
    let input = reviewing.context.input.clone().unwrap();
    assert_eq!(input.origin, "https://dapp.example");
    sign.send(MachineEvent::Approve).await.unwrap();

    let result = call.await.unwrap().unwrap();
    let signed = result["signedMessage"].as_str().unwrap();
    assert!(signed.starts_with("0x"));
    assert_eq!(signed.len(), 66);
    assert_eq!(sign.snapshot().state, MachineState::Done);
}

#[tokio::test]
async fn rejected_sign_request_is_declined_for_page() {
    let runtime = popup().await;
    let page = in_process_pair(runtime.bridge());
    let sign = runtime.services().sign.clone();

    let call = tokio::spawn(async move {
        page.call(
            SIGN_MESSAGE,
            json!({ "origin": "https://dapp.example", "message": "hello" }),
        )
        .await
    });

    wait_for_state(&sign, |s| s.state == MachineState::Reviewing)
        .await
        .unwrap();
    sign.send(MachineEvent::Reject {
        reason: Some("user closed the popup".into()),
    })
    .await
    .unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "declined");
    let failed = sign.snapshot();
    assert_eq!(failed.context.error.unwrap().code, FailureCode::Declined);
}

#[tokio::test]
async fn request_finishes_after_the_review_ui_detaches() {
    let runtime = popup().await;
    let page = in_process_pair(runtime.bridge());
    let sign = runtime.services().sign.clone();

    let call = tokio::spawn(async move {
        page.call(
            SIGN_MESSAGE,
            json!({ "origin": "https://dapp.example", "message": "detached" }),
        )
        .await
    });

    {
        // The review UI subscribes, approves, then goes away.
        let mut ui = sign.subscribe().await.unwrap();
        loop {
            let snapshot = ui.next().await.unwrap();
            if snapshot.state == MachineState::Reviewing {
                break;
            }
        }
        sign.send(MachineEvent::Approve).await.unwrap();
    }

    let result = call.await.unwrap().unwrap();
    assert!(result["signedMessage"].is_string());

    // A waiter attached after the fact still sees the terminal state.
    let late = wait_for_terminal(&sign).await.unwrap();
    assert_eq!(late.state, MachineState::Done);
    assert!(late.context.result.is_some());
}

#[tokio::test]
async fn second_request_while_reviewing_is_busy() {
    let runtime = popup().await;
    let bridge = runtime.bridge();
    let first_page = in_process_pair(bridge.clone());
    let second_page = in_process_pair(bridge);
    let sign = runtime.services().sign.clone();

    let first = tokio::spawn(async move {
        first_page
            .call(
                SIGN_MESSAGE,
                json!({ "origin": "https://one.example", "message": "first" }),
            )
            .await
    });
    let reviewing = wait_for_state(&sign, |s| s.state == MachineState::Reviewing)
        .await
        .unwrap();

    let err = second_page
        .call(
            SIGN_MESSAGE,
            json!({ "origin": "https://two.example", "message": "second" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "busy");

    // The pending review is untouched.
    let current = sign.snapshot();
    assert_eq!(current.revision, reviewing.revision);
    assert_eq!(current.context.input.unwrap().origin, "https://one.example");

    sign.send(MachineEvent::Approve).await.unwrap();
    assert!(first.await.unwrap().is_ok());
}

#[tokio::test]
async fn edited_send_request_uses_max_balance_minus_fee() {
    let runtime = popup().await;
    let page = in_process_pair(runtime.bridge());
    let send = runtime.services().send.clone();

    let call = tokio::spawn(async move {
        page.call(
            SEND_TRANSACTION,
            json!({ "origin": "https://dapp.example", "to": "fuel1recipient" }),
        )
        .await
    });

    wait_for_state(&send, |s| s.state == MachineState::Reviewing)
        .await
        .unwrap();

    // Not ready yet: approving without an asset is refused and changes nothing.
    assert!(send.send(MachineEvent::Approve).await.is_err());
    assert_eq!(send.snapshot().state, MachineState::Reviewing);

    send.send(MachineEvent::Edit(SendEdit::SetAsset(BASE_ASSET_ID.into())))
        .await
        .unwrap();
    send.send(MachineEvent::Edit(SendEdit::UseMaxBalance { balance: 1_000 }))
        .await
        .unwrap();
    send.send(MachineEvent::Edit(SendEdit::SetFeeTier {
        tier: FeeTier::Fast,
        fee: 25,
    }))
    .await
    .unwrap();
    assert_eq!(send.snapshot().context.draft.amount, 975);

    send.send(MachineEvent::Approve).await.unwrap();
    let result = call.await.unwrap().unwrap();
    assert!(result["transactionId"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test(start_paused = true)]
async fn timed_out_call_cannot_be_approved_later() {
    let mut config = Config::default();
    config.approval.call_timeout_secs = 1;
    let runtime = popup_with(config).await;
    let page = in_process_pair(runtime.bridge());
    let sign = runtime.services().sign.clone();

    let err = page
        .call(
            SIGN_MESSAGE,
            json!({ "origin": "https://dapp.example", "message": "too slow" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "timeout");

    assert!(sign.send(MachineEvent::Approve).await.is_err());
    let snapshot = sign.snapshot();
    assert_eq!(snapshot.state, MachineState::Failed);
    assert!(snapshot.context.result.is_none());
    assert_eq!(snapshot.context.error.unwrap().code, FailureCode::Timeout);
}

#[tokio::test]
async fn page_surface_refuses_every_call() {
    let mut config = Config::default();
    config.surface.kind = "page".into();
    config.store.backend = "memory".into();
    let runtime = PopupRuntime::init(&config).await.unwrap();
    assert!(runtime.bridge().is_none());

    let page = in_process_pair(runtime.bridge());
    let err = page
        .call(
            SIGN_MESSAGE,
            json!({ "origin": "https://dapp.example", "message": "hello" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unavailable");
    assert_eq!(runtime.services().sign.snapshot().state, MachineState::Idle);
}

#[tokio::test]
async fn unknown_method_is_reported() {
    let runtime = popup().await;
    let page = in_process_pair(runtime.bridge());
    let err = page.call("getBalance", json!({})).await.unwrap_err();
    assert_eq!(err.code(), "method_not_found");
}
