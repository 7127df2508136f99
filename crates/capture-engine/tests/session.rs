use std::sync::Arc;

use capture_engine::{CaptureSession, CompletionHandler, EngineConfig, EngineEvent};
use identity_resolver::{Landmark, LandmarkKind, PageSnapshot};
use parking_lot::Mutex;
use probe_bridge::{wire, BridgeConfig, BridgeEvent, BridgeStats};
use probe_runtime::{Probe, ProbeConfig, RetrySchedule, SharedPage};
use sessioncap_core_types::{CaptureState, SessionSignal};
use tokio::time::{sleep, timeout, Duration};

fn recorder() -> (Arc<dyn CompletionHandler>, Arc<Mutex<Vec<Option<String>>>>) {
    let calls: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let sink = Arc::clone(&calls);
    let handler = move |_marker: &str, _csrf: &str, username: Option<&str>| {
        sink.lock().push(username.map(str::to_string));
    };
    (Arc::new(handler), calls)
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        cookie_retry_delay_ms: 20,
        username_wait_ms: 2_000,
        completion_delay_ms: 10,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn malformed_payloads_are_ignored() {
    let (handler, calls) = recorder();
    let (session, probe) =
        CaptureSession::start(fast_config(), BridgeConfig::default(), handler, None);
    let mut bridge_events = session.bridge_events();

    probe.inbound.send("not json".into()).await.unwrap();
    probe
        .inbound
        .send(r#"{"type":"SOMETHING_ELSE","url":"https://x.com/home"}"#.into())
        .await
        .unwrap();
    probe
        .inbound
        .send(r#"{"type":"LOGIN_STATUS","url":""}"#.into())
        .await
        .unwrap();
    let valid = SessionSignal::new("https://x.com/home", "ct0=tok").with_username("alice");
    probe.inbound.send(wire::encode(&valid)).await.unwrap();

    let mut status = session.engine().watch_status();
    timeout(Duration::from_secs(2), status.wait_for(|s| s.delivered))
        .await
        .expect("delivered")
        .unwrap();
    assert_eq!(
        session.bridge_stats(),
        BridgeStats {
            accepted: 1,
            dropped: 3
        }
    );
    let mut dropped = 0;
    let mut accepted = Vec::new();
    while let Ok(event) = bridge_events.try_recv() {
        match event {
            BridgeEvent::PayloadDropped { .. } => dropped += 1,
            BridgeEvent::SignalAccepted { url } => accepted.push(url),
        }
    }
    assert_eq!(dropped, 3);
    assert_eq!(accepted, vec!["https://x.com/home".to_string()]);

    let outcome = session.join().await.unwrap();
    assert_eq!(outcome.token.unwrap().username.as_deref(), Some("alice"));
    assert_eq!(calls.lock().len(), 1);
}

#[tokio::test]
async fn probe_drives_a_full_login() {
    let (handler, calls) = recorder();
    let (mut session, endpoints) =
        CaptureSession::start(fast_config(), BridgeConfig::default(), handler, None);
    let mut events = session.take_events().expect("first take");

    let page = SharedPage::new(PageSnapshot::at("https://x.com/i/flow/login"));
    let probe_config = ProbeConfig {
        poll_interval_ms: 10,
        heartbeat_interval_ms: 50,
        landing_path: "/home".into(),
        retry: RetrySchedule {
            max_attempts: 5,
            base_delay_ms: 20,
        },
    };
    let probe = Probe::new(Arc::new(page.clone()), probe_config, endpoints.inbound)
        .spawn(endpoints.commands);

    sleep(Duration::from_millis(40)).await;
    page.replace(PageSnapshot::at("https://x.com/account/access"));
    sleep(Duration::from_millis(40)).await;
    page.update(|snapshot| {
        snapshot.url = "https://x.com/home".into();
        snapshot.cookies = "ct0=tok; twid=u%3D42".into();
    });
    sleep(Duration::from_millis(40)).await;
    // the sidebar renders after the landing page itself
    page.update(|snapshot| {
        snapshot.landmarks.push(Landmark {
            kind: LandmarkKind::ProfileLink,
            href: Some("/alice".into()),
            text: None,
        });
    });

    let outcome = timeout(Duration::from_secs(3), session.join())
        .await
        .expect("capture completed")
        .unwrap();
    probe.shutdown().await.unwrap();

    assert_eq!(outcome.status.state, CaptureState::Authenticated);
    assert_eq!(outcome.status.user_id.as_deref(), Some("42"));
    assert_eq!(calls.lock().as_slice(), &[Some("alice".to_string())]);

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::StateChanged(transition) = event {
            states.push(transition.to);
        }
    }
    assert_eq!(
        states,
        vec![
            CaptureState::PageLoading,
            CaptureState::CredentialEntry,
            CaptureState::Verifying,
            CaptureState::Authenticated,
        ]
    );
}
