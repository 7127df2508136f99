use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde_json::Value;
use url::Url;

use crate::handle::normalize_handle;

/// Query parameter carrying the login flow's JSON state.
pub const FLOW_STATE_PARAM: &str = "input_flow_data";
const PREFERRED_FIELD: &str = "requested_variant";
const IDENTIFIER_KEYS: &[&str] = &["user_identifier", "screen_name"];

/// Pull the handle out of the structured flow-state blob in `url`.
///
/// `input_flow_data` is URL-encoded JSON; one of its string fields holds
/// base64-encoded JSON naming the account being signed in.
pub fn handle_from_flow_state(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let raw = parsed
        .query_pairs()
        .find(|(key, _)| key == FLOW_STATE_PARAM)
        .map(|(_, value)| value.into_owned())?;
    let state: Value = serde_json::from_str(&raw).ok()?;

    let preferred = state.get(PREFERRED_FIELD).and_then(Value::as_str);
    preferred
        .into_iter()
        .chain(string_leaves(&state))
        .find_map(decode_embedded)
        .and_then(|inner| find_identifier(&inner))
}

fn decode_embedded(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    // Form decoding of the query turns an unescaped '+' into a space; base64
    // never contains spaces, so put it back.
    let candidate = candidate.replace(' ', "+");
    let bytes = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(&candidate).ok())?;
    let text = String::from_utf8(bytes).ok()?;
    match serde_json::from_str::<Value>(&text).ok()? {
        value @ Value::Object(_) => Some(value),
        _ => None,
    }
}

fn find_identifier(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => IDENTIFIER_KEYS
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find_map(normalize_handle)
            .or_else(|| map.values().find_map(find_identifier)),
        Value::Array(items) => items.iter().find_map(find_identifier),
        _ => None,
    }
}

fn string_leaves(value: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    collect_strings(value, &mut out);
    out
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}
