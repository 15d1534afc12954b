use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use walletgate::bridge::{CallEnvelope, ReplyEnvelope, SIGN_MESSAGE};
use walletgate::config::Config;
use walletgate::gateway::run_gateway_with_listener;
use walletgate::machine::{MachineEvent, MachineState};
use walletgate::popup::PopupRuntime;
use walletgate::wallet::LocalKeyWallet;
use walletgate::waiter::wait_for_state;

async fn serve() -> (PopupRuntime, String) {
    let mut config = Config::default();
    config.surface.kind = "popup".into();
    config.store.backend = "memory".into();
    let runtime = PopupRuntime::init_with_wallet(&config, Arc::new(LocalKeyWallet::generate()))
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_gateway_with_listener(listener, runtime.gate()));
    (runtime, format!("ws://{addr}/rpc"))
}

async fn next_reply<S>(stream: &mut S) -> ReplyEnvelope
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn sign_call_over_websocket_waits_for_approval() {
    let (runtime, url) = serve().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let call = CallEnvelope {
        id: 7,
        method: SIGN_MESSAGE.to_string(),
        params: json!({ "origin": "https://dapp.example", "message": "over the wire" }),
    };
    socket
        .send(Message::Text(serde_json::to_string(&call).unwrap().into()))
        .await
        .unwrap();

    let sign = runtime.services().sign.clone();
    wait_for_state(&sign, |s| s.state == MachineState::Reviewing)
        .await
        .unwrap();
    sign.send(MachineEvent::Approve).await.unwrap();

    let reply = next_reply(&mut socket).await;
    assert_eq!(reply.id, 7);
    let result: Value = reply.into_result().unwrap();
    assert!(result["signedMessage"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn malformed_frame_gets_an_error_reply_with_id_zero() {
    let (_runtime, url) = serve().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    socket
        .send(Message::Text("{not json".into()))
        .await
        .unwrap();

    let reply = next_reply(&mut socket).await;
    assert_eq!(reply.id, 0);
    assert_eq!(reply.into_result().unwrap_err().code(), "invalid_request");
}

#[tokio::test]
async fn torn_down_gate_answers_unavailable() {
    let (runtime, url) = serve().await;
    runtime.teardown();
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let call = CallEnvelope {
        id: 3,
        method: SIGN_MESSAGE.to_string(),
        params: json!({ "origin": "https://dapp.example", "message": "late" }),
    };
    socket
        .send(Message::Text(serde_json::to_string(&call).unwrap().into()))
        .await
        .unwrap();

    let reply = next_reply(&mut socket).await;
    assert_eq!(reply.id, 3);
    assert_eq!(reply.into_result().unwrap_err().code(), "unavailable");
}
