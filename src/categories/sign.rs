use super::normalize_origin;
use crate::error::RequestError;
use crate::machine::Category;
use serde::{Deserialize, Serialize};

/// Message signing: `signMessage({ origin, message })`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignCategory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInput {
    pub origin: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutput {
    pub signed_message: String,
}

/// Signing has nothing for the user to fill in.
#[derive(Debug, Clone)]
pub enum SignEdit {}

impl Category for SignCategory {
    const NAME: &'static str = "sign";
    const START_EVENT: &'static str = "START_SIGN";

    type Input = SignInput;
    type Output = SignOutput;
    type Draft = ();
    type Edit = SignEdit;

    fn parse_input(params: serde_json::Value) -> Result<SignInput, RequestError> {
        let raw: SignInput = serde_json::from_value(params)
            .map_err(|e| RequestError::InvalidRequest(format!("signMessage params: {e}")))?;
        if raw.message.is_empty() {
            return Err(RequestError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        Ok(SignInput {
            origin: normalize_origin(&raw.origin)?,
            message: raw.message,
        })
    }

    fn origin(input: &SignInput) -> &str {
        &input.origin
    }

    fn draft_for(_input: &SignInput) {}

    fn apply_edit(_draft: &mut (), edit: SignEdit) -> Result<(), String> {
        match edit {}
    }

    fn check_ready(_input: &SignInput, _draft: &()) -> Result<(), String> {
        Ok(())
    }
}
