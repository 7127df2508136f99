use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use identity_resolver::{inspect, PageSnapshot};
use pretty_assertions::assert_eq;
use serde_json::json;

fn snapshot(value: serde_json::Value) -> PageSnapshot {
    serde_json::from_value(value).expect("snapshot json")
}

#[test]
fn flow_state_wins_over_page_content() {
    let variant = STANDARD.encode(json!({ "user_identifier": "flowuser" }).to_string());
    let state = json!({ "requested_variant": variant }).to_string();
    let encoded: String = url::form_urlencoded::byte_serialize(state.as_bytes()).collect();

    let page = snapshot(json!({
        "url": format!("https://x.com/i/flow/login?input_flow_data={encoded}"),
        "cookies": "twid=u%3A987; ct0=abc",
        "landmarks": [{ "kind": "profile_link", "href": "/landmarkuser" }],
        "visible_text": "hi @textuser",
    }));

    let identity = inspect(&page);
    assert_eq!(identity.username(), Some("flowuser"));
    assert_eq!(identity.username.unwrap().heuristic, "flow_state");
    assert_eq!(identity.user_id.as_deref(), Some("987"));
}

#[test]
fn sparse_snapshot_deserializes_and_misses_cleanly() {
    let page = snapshot(json!({ "url": "https://x.com/home" }));
    let identity = inspect(&page);
    assert_eq!(identity.username(), None);
    assert_eq!(identity.user_id, None);
}

#[test]
fn profile_image_proximity_qualifies_link() {
    let page = snapshot(json!({
        "url": "https://x.com/home",
        "visible_text": "@explore @search",
        "links": [
            { "href": "/explore" },
            { "href": "https://elsewhere.example/ghost", "near_profile_image": true },
            { "href": "/grace_h", "near_profile_image": true }
        ]
    }));
    let identity = inspect(&page);
    assert_eq!(identity.username(), Some("grace_h"));
    assert_eq!(identity.username.unwrap().heuristic, "profile_links");
}
