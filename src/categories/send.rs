use super::normalize_origin;
use crate::error::RequestError;
use crate::machine::Category;
use serde::{Deserialize, Serialize};

/// The chain's native asset. Fees are paid in it, so sending the whole
/// balance of it has to leave room for the fee.
pub const BASE_ASSET_ID: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Asset transfer: `sendTransaction({ origin, to, assetId?, amount? })`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendCategory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInput {
    pub origin: String,
    pub to: String,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutput {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeeTier {
    #[default]
    Regular,
    Fast,
}

/// Fields the user settles while reviewing a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDraft {
    pub asset: Option<String>,
    pub amount: u64,
    pub fee_tier: FeeTier,
    /// Fee quoted for `fee_tier`, supplied by the UI.
    pub fee: Option<u64>,
    /// Set while the user wants to send everything they hold.
    pub max_balance: Option<u64>,
}

impl SendDraft {
    fn is_base_asset(&self) -> bool {
        self.asset
            .as_deref()
            .is_some_and(|asset| asset.eq_ignore_ascii_case(BASE_ASSET_ID))
    }

    fn reapply_max_balance(&mut self) {
        let Some(balance) = self.max_balance else {
            return;
        };
        self.amount = if self.is_base_asset() {
            balance.saturating_sub(self.fee.unwrap_or(0))
        } else {
            balance
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEdit {
    SetAsset(String),
    SetAmount(u64),
    SetFeeTier { tier: FeeTier, fee: u64 },
    UseMaxBalance { balance: u64 },
}

impl Category for SendCategory {
    const NAME: &'static str = "send";
    const START_EVENT: &'static str = "START_SEND";

    type Input = SendInput;
    type Output = SendOutput;
    type Draft = SendDraft;
    type Edit = SendEdit;

    fn parse_input(params: serde_json::Value) -> Result<SendInput, RequestError> {
        let raw: SendInput = serde_json::from_value(params)
            .map_err(|e| RequestError::InvalidRequest(format!("sendTransaction params: {e}")))?;
        let to = raw.to.trim();
        if to.is_empty() {
            return Err(RequestError::InvalidRequest(
                "recipient must not be empty".to_string(),
            ));
        }
        let asset_id = raw
            .asset_id
            .map(|asset| asset.trim().to_string())
            .filter(|asset| !asset.is_empty());
        Ok(SendInput {
            origin: normalize_origin(&raw.origin)?,
            to: to.to_string(),
            asset_id,
            amount: raw.amount,
        })
    }

    fn origin(input: &SendInput) -> &str {
        &input.origin
    }

    fn draft_for(input: &SendInput) -> SendDraft {
        SendDraft {
            asset: input.asset_id.clone(),
            amount: input.amount.unwrap_or(0),
            ..SendDraft::default()
        }
    }

    fn apply_edit(draft: &mut SendDraft, edit: SendEdit) -> Result<(), String> {
        match edit {
            SendEdit::SetAsset(asset) => {
                let asset = asset.trim();
                if asset.is_empty() {
                    return Err("asset id must not be empty".to_string());
                }
                draft.asset = Some(asset.to_string());
                draft.max_balance = None;
            }
            SendEdit::SetAmount(amount) => {
                draft.amount = amount;
                draft.max_balance = None;
            }
            SendEdit::SetFeeTier { tier, fee } => {
                draft.fee_tier = tier;
                draft.fee = Some(fee);
                draft.reapply_max_balance();
            }
            SendEdit::UseMaxBalance { balance } => {
                draft.max_balance = Some(balance);
                draft.reapply_max_balance();
            }
        }
        Ok(())
    }

    fn check_ready(_input: &SendInput, draft: &SendDraft) -> Result<(), String> {
        if draft.asset.is_none() {
            return Err("no asset selected".to_string());
        }
        if draft.amount == 0 {
            return Err("amount must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft_with(asset: &str) -> SendDraft {
        SendDraft {
            asset: Some(asset.to_string()),
            ..SendDraft::default()
        }
    }

    fn edit(draft: &mut SendDraft, edit: SendEdit) {
        SendCategory::apply_edit(draft, edit).unwrap();
    }

    #[test]
    fn parse_input_accepts_camel_case_params() {
        let input = SendCategory::parse_input(json!({
            "origin": "https://dapp.example/pay",
            "to": "  fuel1recipient ",
            "assetId": BASE_ASSET_ID,
            "amount": 250
        }))
        .unwrap();
        assert_eq!(input.origin, "https://dapp.example");
        assert_eq!(input.to, "fuel1recipient");
        assert_eq!(input.asset_id.as_deref(), Some(BASE_ASSET_ID));
        assert_eq!(input.amount, Some(250));

        let draft = SendCategory::draft_for(&input);
        assert_eq!(draft.amount, 250);
        assert_eq!(draft.asset.as_deref(), Some(BASE_ASSET_ID));
    }

    #[test]
    fn parse_input_rejects_blank_recipient() {
        let err = SendCategory::parse_input(json!({
            "origin": "https://dapp.example",
            "to": "   "
        }))
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn max_balance_of_base_asset_leaves_room_for_fee() {
        let mut draft = draft_with(BASE_ASSET_ID);
        edit(&mut draft, SendEdit::SetFeeTier { tier: FeeTier::Regular, fee: 10 });
        edit(&mut draft, SendEdit::UseMaxBalance { balance: 1_000 });
        assert_eq!(draft.amount, 990);

        edit(&mut draft, SendEdit::SetFeeTier { tier: FeeTier::Fast, fee: 25 });
        assert_eq!(draft.amount, 975);
        assert_eq!(draft.fee_tier, FeeTier::Fast);
    }

    #[test]
    fn max_balance_of_other_asset_is_sent_whole() {
        let mut draft = draft_with("0xtoken");
        edit(&mut draft, SendEdit::SetFeeTier { tier: FeeTier::Fast, fee: 25 });
        edit(&mut draft, SendEdit::UseMaxBalance { balance: 1_000 });
        assert_eq!(draft.amount, 1_000);
    }

    #[test]
    fn fee_larger_than_balance_saturates() {
        let mut draft = draft_with(BASE_ASSET_ID);
        edit(&mut draft, SendEdit::SetFeeTier { tier: FeeTier::Regular, fee: 50 });
        edit(&mut draft, SendEdit::UseMaxBalance { balance: 20 });
        assert_eq!(draft.amount, 0);
        assert!(SendCategory::check_ready(&sample_input(), &draft).is_err());
    }

    #[test]
    fn typing_an_amount_drops_the_max_choice() {
        let mut draft = draft_with(BASE_ASSET_ID);
        edit(&mut draft, SendEdit::UseMaxBalance { balance: 1_000 });
        edit(&mut draft, SendEdit::SetAmount(300));
        edit(&mut draft, SendEdit::SetFeeTier { tier: FeeTier::Fast, fee: 25 });
        assert_eq!(draft.amount, 300);
        assert!(draft.max_balance.is_none());
    }

    #[test]
    fn switching_asset_drops_the_max_choice() {
        let mut draft = draft_with(BASE_ASSET_ID);
        edit(&mut draft, SendEdit::UseMaxBalance { balance: 1_000 });
        edit(&mut draft, SendEdit::SetAsset("0xtoken".into()));
        assert!(draft.max_balance.is_none());
        assert!(SendCategory::apply_edit(&mut draft, SendEdit::SetAsset(" ".into())).is_err());
    }

    fn sample_input() -> SendInput {
        SendInput {
            origin: "https://dapp.example".into(),
            to: "fuel1recipient".into(),
            asset_id: None,
            amount: None,
        }
    }

    #[test]
    fn approval_needs_asset_and_positive_amount() {
        let input = sample_input();
        let mut draft = SendCategory::draft_for(&input);
        assert_eq!(
            SendCategory::check_ready(&input, &draft).unwrap_err(),
            "no asset selected"
        );
        edit(&mut draft, SendEdit::SetAsset("0xtoken".into()));
        assert!(SendCategory::check_ready(&input, &draft).is_err());
        edit(&mut draft, SendEdit::SetAmount(1));
        assert!(SendCategory::check_ready(&input, &draft).is_ok());
    }
}
