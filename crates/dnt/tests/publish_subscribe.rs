// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publish/subscribe integration tests
//!
//! A server registry and a client registry share one in-process substrate;
//! updates cross the delivery thread exactly as they would cross the network.

use crossbeam::channel::{unbounded, Receiver};
use dnt::{
    ClosureListener, Error, LoopbackSubstrate, Substrate, Table, TableRegistry,
    UPDATE_INTERVAL_KEY,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Update {
    data: HashMap<String, String>,
    interval: Option<u32>,
    last_update: Option<Instant>,
}

fn pair() -> (TableRegistry, TableRegistry, Arc<LoopbackSubstrate>) {
    let substrate = Arc::new(LoopbackSubstrate::new());
    let server = TableRegistry::new(substrate.clone());
    server.start_server().expect("Failed to start server");
    let client = TableRegistry::new(substrate.clone());
    client.start_client("4030").expect("Failed to start client");
    (server, client, substrate)
}

fn watch(table: &Table) -> Receiver<Update> {
    let (tx, rx) = unbounded();
    table.on_change(Arc::new(ClosureListener::new(move |t: &Table| {
        let _ = tx.send(Update {
            data: t.snapshot(),
            interval: t.interval(),
            last_update: t.last_update(),
        });
    })));
    rx
}

/// Wait for the first update carrying `key`.
fn wait_for_key(rx: &Receiver<Update>, key: &str) -> Update {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let update = rx
            .recv_timeout(remaining)
            .unwrap_or_else(|_| panic!("no update with key {} before timeout", key));
        if update.data.contains_key(key) {
            return update;
        }
    }
}

#[test]
fn test_end_to_end_delivery_and_staleness() {
    let (server, client, _substrate) = pair();

    let inbox = client.subscribe("FromServer").expect("subscribe");
    let rx = watch(&inbox);

    let out = server.publish("FromServer").expect("publish");
    out.set_value("k0", "v0").unwrap();
    out.set_interval(1).unwrap();
    out.send().unwrap();

    let update = wait_for_key(&rx, "k0");
    assert_eq!(update.data.get("k0").map(String::as_str), Some("v0"));
    assert!(!update.data.contains_key(UPDATE_INTERVAL_KEY));
    assert_eq!(update.interval, Some(1));

    let last = update.last_update.expect("delivery stamps last_update");
    assert!(!inbox.is_stale_at(last + Duration::from_secs(2)));
    assert!(!inbox.is_stale_at(last + Duration::from_millis(2_500)));
    assert!(inbox.is_stale_at(last + Duration::from_secs(3)));
}

#[test]
fn test_subscriber_mirror_replaces_contents() {
    let (server, client, _substrate) = pair();
    let inbox = client.subscribe("FromServer").unwrap();
    let rx = watch(&inbox);
    let out = server.publish("FromServer").unwrap();

    out.set_value("a", "1").unwrap();
    out.set_value("b", "2").unwrap();
    out.send().unwrap();
    wait_for_key(&rx, "a");

    out.remove("a").unwrap();
    out.set_value("c", "3").unwrap();
    out.send().unwrap();
    let update = wait_for_key(&rx, "c");

    assert!(!update.data.contains_key("a"));
    assert_eq!(update.data.len(), 2);
    assert_eq!(update.interval, None);
}

#[test]
fn test_publisher_observes_own_send() {
    let (server, _client, _substrate) = pair();
    let out = server.publish("FromServer").unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    out.on_change(Arc::new(ClosureListener::new(move |t: &Table| {
        assert!(t.is_writable());
        seen.fetch_add(1, Ordering::SeqCst);
    })));

    out.set_value("k0", "v0").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Dispatched on the sending thread, before send() returns.
    out.send().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subscribed_table_is_read_only() {
    let (_server, client, _substrate) = pair();
    let inbox = client.subscribe("FromServer").unwrap();

    assert!(matches!(inbox.set_value("k", "v"), Err(Error::Directionality(_))));
    assert!(matches!(inbox.remove("k"), Err(Error::Directionality(_))));
    assert!(matches!(inbox.send(), Err(Error::Directionality(_))));
    assert!(matches!(client.publish("FromServer"), Err(Error::State(_))));
}

#[test]
fn test_late_subscriber_receives_retained_payload() {
    let (server, client, _substrate) = pair();
    let out = server.publish("FromServer").unwrap();
    out.set_value("k1", "v1").unwrap();
    out.set_interval(2).unwrap();
    out.send().unwrap();

    let inbox = client.subscribe("FromServer").unwrap();
    let rx = watch(&inbox);

    let update = wait_for_key(&rx, "k1");
    assert_eq!(update.interval, Some(2));
    assert_eq!(inbox.get_value("k1").as_deref(), Some("v1"));
}

#[test]
fn test_dropped_subscription_stops_delivery() {
    let (server, client, _substrate) = pair();
    let inbox = client.subscribe("FromServer").unwrap();
    let rx = watch(&inbox);
    client.drop_table("FromServer");

    let out = server.publish("FromServer").unwrap();
    out.set_value("k0", "v0").unwrap();
    out.send().unwrap();

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert!(inbox.is_empty());
    assert!(client.get("FromServer").is_none());
}

#[test]
fn test_updates_for_other_tables_are_ignored() {
    let (server, client, _substrate) = pair();
    let wanted = client.subscribe("Wanted").unwrap();
    let other = client.subscribe("Other").unwrap();
    let wanted_rx = watch(&wanted);
    let other_rx = watch(&other);

    let out = server.publish("Wanted").unwrap();
    out.set_value("k0", "v0").unwrap();
    out.send().unwrap();

    wait_for_key(&wanted_rx, "k0");
    assert!(other_rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert!(other.is_empty());
}

#[test]
fn test_malformed_payload_does_not_stop_delivery() {
    let (server, client, substrate) = pair();
    let inbox = client.subscribe("FromServer").unwrap();
    let rx = watch(&inbox);

    // Odd-length array, then a garbage interval: both dropped with a warning.
    substrate
        .put("FromServer", vec!["orphan".to_string()])
        .unwrap();
    substrate
        .put(
            "FromServer",
            vec![UPDATE_INTERVAL_KEY.to_string(), "soon".to_string()],
        )
        .unwrap();

    let out = server.publish("FromServer").unwrap();
    out.set_value("k0", "v0").unwrap();
    out.send().unwrap();

    let update = wait_for_key(&rx, "k0");
    assert_eq!(update.data.len(), 1);
}

#[test]
fn test_demo_rotation_keeps_three_keys() {
    let (server, client, _substrate) = pair();
    let inbox = client.subscribe("FromServer").unwrap();
    let rx = watch(&inbox);
    let out = server.publish("FromServer").unwrap();
    out.set_interval(1).unwrap();

    for i in 0..5 {
        out.set_value(&format!("k{}", i % 3), format!("v{}", i)).unwrap();
        out.send().unwrap();
    }
    out.set_value("done", "yes").unwrap();
    out.send().unwrap();

    let update = wait_for_key(&rx, "done");
    assert_eq!(update.data.get("k0").map(String::as_str), Some("v3"));
    assert_eq!(update.data.get("k1").map(String::as_str), Some("v4"));
    assert_eq!(update.data.get("k2").map(String::as_str), Some("v2"));
    assert_eq!(update.interval, Some(1));
}
