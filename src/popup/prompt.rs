//! Terminal stand-in for the popup approval screens.
//!
//! Reads `context.input` / `context.draft` from each store and writes
//! `APPROVE`, `REJECT` and data-entry events back. It holds no request state
//! of its own, so closing it never loses a request.

use crate::categories::{
    FeeTier, SendCategory, SendDraft, SendEdit, SendInput, SignCategory, SignInput,
};
use crate::error::MachineError;
use crate::machine::{Category, MachineEvent, MachineService, MachineState, RequestId, Snapshot};
use crate::ui::style as ui;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendAction {
    Approve,
    Reject,
    SetAsset,
    SetAmount,
    FeeTier,
    UseMaxBalance,
}

const SEND_ACTIONS: [(SendAction, &str); 6] = [
    (SendAction::Approve, "Approve"),
    (SendAction::Reject, "Reject"),
    (SendAction::SetAsset, "Change asset"),
    (SendAction::SetAmount, "Change amount"),
    (SendAction::FeeTier, "Choose fee tier"),
    (SendAction::UseMaxBalance, "Send max balance"),
];

const REJECTED_IN_POPUP: &str = "rejected in popup";

fn sign_rows(input: &SignInput) -> Vec<(&'static str, String)> {
    vec![
        ("Origin", input.origin.clone()),
        ("Message", input.message.clone()),
    ]
}

fn send_rows(input: &SendInput, draft: &SendDraft) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Origin", input.origin.clone()),
        ("To", input.to.clone()),
        (
            "Asset",
            draft.asset.clone().unwrap_or_else(|| "(not selected)".into()),
        ),
        ("Amount", draft.amount.to_string()),
        (
            "Fee",
            match draft.fee {
                Some(fee) => format!("{fee} ({})", draft.fee_tier),
                None => format!("not quoted ({})", draft.fee_tier),
            },
        ),
    ];
    if let Some(balance) = draft.max_balance {
        rows.push(("Max of", balance.to_string()));
    }
    rows
}

fn print_card(title: &str, request_id: &RequestId, rows: &[(&'static str, String)]) {
    eprintln!();
    eprintln!("  {}", ui::header(title));
    eprintln!("  {}", ui::dim("─".repeat(50)));
    for (label, value) in rows {
        eprintln!("  {:<8} {}", ui::cyan(label), ui::value(value));
    }
    eprintln!("  {:<8} {}", ui::cyan("Request"), ui::dim(request_id));
    eprintln!("  {}", ui::dim("─".repeat(50)));
}

/// Run a dialoguer prompt off the async runtime.
async fn blocking<T, F>(prompt: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    let value = tokio::task::spawn_blocking(prompt)
        .await
        .context("prompt task failed")??;
    Ok(value)
}

/// A reviewing snapshot for a request not yet shown to the user.
///
/// A store holds one request at a time, so `last_prompted` only tracks the
/// latest one per store.
fn needs_review<C: Category>(
    snapshot: &Snapshot<C>,
    last_prompted: &mut Option<RequestId>,
) -> Option<RequestId> {
    if snapshot.state != MachineState::Reviewing {
        return None;
    }
    let request_id = snapshot.context.request_id.clone()?;
    if last_prompted.as_ref() == Some(&request_id) {
        return None;
    }
    *last_prompted = Some(request_id.clone());
    Some(request_id)
}

fn announce<C: Category>(snapshot: &Snapshot<C>) {
    match snapshot.state {
        MachineState::Done => eprintln!("  {} {} request completed", ui::success("✓"), C::NAME),
        MachineState::Failed => {
            let reason = snapshot
                .context
                .error
                .as_ref()
                .map_or_else(String::new, |e| format!("{}: {}", e.code, e.message));
            eprintln!("  {} {} request failed ({reason})", ui::failure("✗"), C::NAME);
        }
        MachineState::Processing => {
            eprintln!("  {} {} request processing…", ui::yellow("…"), C::NAME);
        }
        MachineState::Idle | MachineState::Reviewing => {}
    }
}

fn report_refusal(error: &MachineError) {
    eprintln!("  {} {error}", ui::yellow("!"));
}

async fn review_sign(service: &MachineService<SignCategory>, snapshot: &Snapshot<SignCategory>) -> Result<()> {
    let (Some(request_id), Some(input)) = (&snapshot.context.request_id, &snapshot.context.input)
    else {
        return Ok(());
    };
    print_card("Signature request", request_id, &sign_rows(input));

    let approve = blocking(|| {
        Confirm::new()
            .with_prompt("  Sign this message?")
            .default(false)
            .interact()
    })
    .await?;

    let event = if approve {
        MachineEvent::Approve
    } else {
        MachineEvent::Reject {
            reason: Some(REJECTED_IN_POPUP.into()),
        }
    };
    if let Err(error) = service.send(event).await {
        report_refusal(&error);
    }
    Ok(())
}

async fn prompt_send_edit(action: SendAction) -> Result<Option<SendEdit>> {
    let edit = match action {
        SendAction::SetAsset => {
            let asset: String = blocking(|| Input::new().with_prompt("  Asset id").interact_text()).await?;
            Some(SendEdit::SetAsset(asset))
        }
        SendAction::SetAmount => {
            let amount: u64 = blocking(|| Input::new().with_prompt("  Amount").interact_text()).await?;
            Some(SendEdit::SetAmount(amount))
        }
        SendAction::FeeTier => {
            let tier = blocking(|| {
                Select::new()
                    .with_prompt("  Fee tier")
                    .items(&["regular", "fast"])
                    .default(0)
                    .interact()
            })
            .await?;
            let fee: u64 = blocking(|| Input::new().with_prompt("  Quoted fee").interact_text()).await?;
            let tier = if tier == 1 { FeeTier::Fast } else { FeeTier::Regular };
            Some(SendEdit::SetFeeTier { tier, fee })
        }
        SendAction::UseMaxBalance => {
            let balance: u64 =
                blocking(|| Input::new().with_prompt("  Current balance").interact_text()).await?;
            Some(SendEdit::UseMaxBalance { balance })
        }
        SendAction::Approve | SendAction::Reject => None,
    };
    Ok(edit)
}

async fn review_send(service: &MachineService<SendCategory>, request_id: &RequestId) -> Result<()> {
    loop {
        let snapshot = service.snapshot();
        if snapshot.state != MachineState::Reviewing || !snapshot.context.is_for(request_id) {
            return Ok(());
        }
        let Some(input) = &snapshot.context.input else {
            return Ok(());
        };
        print_card(
            "Transfer request",
            request_id,
            &send_rows(input, &snapshot.context.draft),
        );

        let labels: Vec<&'static str> = SEND_ACTIONS.iter().map(|(_, label)| *label).collect();
        let choice = blocking(move || {
            Select::new()
                .with_prompt("  Action")
                .items(&labels)
                .default(0)
                .interact()
        })
        .await?;
        let action = SEND_ACTIONS
            .get(choice)
            .map_or(SendAction::Reject, |(action, _)| *action);

        let event = match action {
            SendAction::Approve => MachineEvent::Approve,
            SendAction::Reject => MachineEvent::Reject {
                reason: Some(REJECTED_IN_POPUP.into()),
            },
            edit => match prompt_send_edit(edit).await? {
                Some(edit) => MachineEvent::Edit(edit),
                None => continue,
            },
        };
        match service.send(event).await {
            Ok(state) if state != MachineState::Reviewing => return Ok(()),
            Ok(_) => {}
            Err(error @ (MachineError::NotReady(_) | MachineError::InvalidEdit(_))) => {
                report_refusal(&error);
            }
            Err(error) => {
                report_refusal(&error);
                return Ok(());
            }
        }
    }
}

/// Prompt for every request that enters review until both stores shut down.
pub async fn run_approval_prompt(
    sign: MachineService<SignCategory>,
    send: MachineService<SendCategory>,
) -> Result<()> {
    let mut sign_updates = sign.subscribe().await?;
    let mut send_updates = send.subscribe().await?;
    let mut sign_prompted = None;
    let mut send_prompted = None;

    loop {
        tokio::select! {
            Some(snapshot) = sign_updates.next() => {
                announce(&snapshot);
                if needs_review(&snapshot, &mut sign_prompted).is_some() {
                    review_sign(&sign, &snapshot).await?;
                }
            }
            Some(snapshot) = send_updates.next() => {
                announce(&snapshot);
                if let Some(request_id) = needs_review(&snapshot, &mut send_prompted) {
                    review_send(&send, &request_id).await?;
                }
            }
            else => break,
        }
    }
    Ok(())
}
