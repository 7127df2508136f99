//! `LOGIN_STATUS` wire format shared by the probe and the bridge.

use identity_resolver::handle::normalize_handle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sessioncap_core_types::SessionSignal;

use crate::DropReason;

pub const LOGIN_STATUS: &str = "LOGIN_STATUS";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    #[serde(rename = "LOGIN_STATUS")]
    LoginStatus(LoginStatus),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginStatus {
    pub url: String,
    pub cookies: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

impl From<&SessionSignal> for LoginStatus {
    fn from(signal: &SessionSignal) -> Self {
        Self {
            url: signal.navigation_url.clone(),
            cookies: signal.raw_cookies.clone(),
            username: signal.username.clone(),
            user_id: signal.user_id.clone(),
        }
    }
}

/// Serialize a signal the way the probe puts it on the wire.
pub fn encode(signal: &SessionSignal) -> String {
    let message = WireMessage::LoginStatus(LoginStatus::from(signal));
    // A struct of strings always serializes.
    serde_json::to_string(&message).unwrap_or_default()
}

/// Parse and normalize one raw payload.
pub fn decode(raw: &str, max_bytes: usize) -> Result<SessionSignal, DropReason> {
    if raw.len() > max_bytes {
        return Err(DropReason::TooLarge(raw.len()));
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|err| DropReason::InvalidJson(err.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(DropReason::NotAnObject);
    };
    match object.get("type").and_then(Value::as_str) {
        Some(LOGIN_STATUS) => {}
        Some(other) => return Err(DropReason::UnknownType(other.to_string())),
        None => return Err(DropReason::UnknownType(String::new())),
    }
    let WireMessage::LoginStatus(status) = serde_json::from_value(value)
        .map_err(|err| DropReason::InvalidShape(err.to_string()))?;
    normalize(status)
}

fn normalize(status: LoginStatus) -> Result<SessionSignal, DropReason> {
    let navigation_url = status.url.trim().to_string();
    if navigation_url.is_empty() {
        return Err(DropReason::EmptyUrl);
    }
    let username = status.username.as_deref().and_then(normalize_handle);
    let user_id = status
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string);

    Ok(SessionSignal {
        navigation_url,
        raw_cookies: status.cookies,
        username,
        user_id,
    })
}
