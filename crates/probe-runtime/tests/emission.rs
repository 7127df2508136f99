use std::sync::Arc;

use identity_resolver::PageSnapshot;
use probe_bridge::{command_channel, BridgeConfig, ProbeBridge};
use probe_runtime::{Probe, ProbeConfig, RetrySchedule, SharedPage};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

fn fast_config(max_attempts: u32) -> ProbeConfig {
    ProbeConfig {
        poll_interval_ms: 10,
        heartbeat_interval_ms: 1_000,
        landing_path: "/home".into(),
        retry: RetrySchedule {
            max_attempts,
            base_delay_ms: 10,
        },
    }
}

fn decode(raw: &str) -> sessioncap_core_types::SessionSignal {
    let (bridge, _events) = ProbeBridge::new(BridgeConfig::default());
    bridge.ingest(raw).expect("probe emits valid wire messages")
}

async fn next(rx: &mut mpsc::Receiver<String>) -> String {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("probe emission")
        .expect("channel open")
}

#[tokio::test]
async fn emits_on_start_navigation_and_recheck() {
    let page = SharedPage::new(PageSnapshot::at("https://x.com/i/flow/login"));
    let (tx, mut rx) = mpsc::channel(16);
    let (commands, command_rx) = command_channel();
    let handle = Probe::new(Arc::new(page.clone()), fast_config(0), tx).spawn(command_rx);

    let initial = decode(&next(&mut rx).await);
    assert_eq!(initial.navigation_url, "https://x.com/i/flow/login");

    page.update(|snapshot| {
        snapshot.url = "https://x.com/home".into();
        snapshot.cookies = "ct0=tok; twid=u%3A55".into();
        snapshot.visible_text = "Welcome back @alice".into();
    });
    let landed = decode(&next(&mut rx).await);
    assert_eq!(landed.navigation_url, "https://x.com/home");
    assert_eq!(landed.username.as_deref(), Some("alice"));
    assert_eq!(landed.user_id.as_deref(), Some("55"));

    commands.recheck();
    let rechecked = decode(&next(&mut rx).await);
    assert_eq!(rechecked.navigation_url, "https://x.com/home");

    sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.emitted(), 3);
    handle.shutdown().await.expect("shutdown probe");
}

#[tokio::test]
async fn landing_without_username_retries_up_to_cap() {
    let page = SharedPage::new(PageSnapshot::at("https://x.com/home"));
    let (tx, mut rx) = mpsc::channel(64);
    let (_commands, command_rx) = command_channel();
    let handle = Probe::new(Arc::new(page), fast_config(3), tx).spawn(command_rx);

    // initial + delays of 10, 20, 30ms; nothing after the cap.
    sleep(Duration::from_millis(400)).await;
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    assert_eq!(count, 4);
    handle.shutdown().await.expect("shutdown probe");
}

#[tokio::test]
async fn resolved_username_stops_retries() {
    let page = SharedPage::new(PageSnapshot::at("https://x.com/home"));
    let (tx, mut rx) = mpsc::channel(64);
    let (_commands, command_rx) = command_channel();
    let mut config = fast_config(50);
    config.retry.base_delay_ms = 30;
    let handle = Probe::new(Arc::new(page.clone()), config, tx).spawn(command_rx);

    let first = decode(&next(&mut rx).await);
    assert_eq!(first.username, None);

    page.update(|snapshot| snapshot.visible_text = "@bob".into());
    let resolved = loop {
        let signal = decode(&next(&mut rx).await);
        if signal.username.is_some() {
            break signal;
        }
    };
    assert_eq!(resolved.username.as_deref(), Some("bob"));

    sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
    handle.shutdown().await.expect("shutdown probe");
}
