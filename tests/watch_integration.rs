// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end tests of a watch: file source, render engine, scheduler and file
//! writer wired by the registry, with DNS answers served from memory.
//!
//! Run with: cargo test --test watch_integration

mod common;

use common::{servers, wait_for_output, MemoryDns};
use poolwatch::output::FileWriter;
use poolwatch::registry::{WatchConfig, WatchRegistry};
use poolwatch::render::{RenderEngine, RenderSettings};
use poolwatch::source::FileWatcher;
use std::net::Ipv4Addr;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const PERIOD: Duration = Duration::from_millis(20);
const RETRY: Duration = Duration::from_millis(200);

const TEMPLATE: &str = r#"{
  "route": "PoolRoute|main",
  "pools": {
    "main": {
      "servers": [
        "dnssrv://_memcache._tcp.cache.internal",
        "dns+11311://extra.internal",
        "10.9.9.9:11211"
      ]
    }
  }
}"#;

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

fn registry(dns: &Arc<MemoryDns>) -> WatchRegistry {
    let settings = RenderSettings {
        ttl_min: 1,
        ..RenderSettings::default()
    };
    let engine = RenderEngine::new(Arc::clone(dns) as _, settings);
    let registry = WatchRegistry::new(
        Arc::new(engine),
        Arc::new(FileWriter::new()),
        Arc::new(FileWatcher::new()),
        RETRY,
    );
    registry.start();
    registry
}

fn watch(source: &Path, output: &Path, params: &str) -> WatchConfig {
    WatchConfig::parse(
        &format!("file://{}", source.display()),
        &format!("file://{}{params}", output.display()),
        PERIOD,
    )
    .unwrap()
}

fn cluster(dns: &MemoryDns, ttl: u32) {
    dns.set_srv(
        "_memcache._tcp.cache.internal",
        &[(10, "b.cache.internal", 11211), (0, "a.cache.internal", 11211)],
        ttl,
    );
    dns.set_a("a.cache.internal", &[ip(1)], ttl);
    dns.set_a("b.cache.internal", &[ip(2)], ttl);
    dns.set_a("extra.internal", &[ip(3), ip(4)], ttl);
}

#[tokio::test]
async fn test_renders_template_into_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("template.json");
    let output = dir.path().join("config.json");
    std::fs::write(&source, TEMPLATE).unwrap();

    let dns = Arc::new(MemoryDns::new());
    cluster(&dns, 300);
    let registry = registry(&dns);
    registry
        .register(watch(&source, &output, "?mode=0640"))
        .unwrap();

    let rendered = wait_for_output(&output, |_| true).await;

    assert_eq!(
        servers(&rendered, "main"),
        vec![
            "10.0.0.1:11211",
            "10.0.0.2:11211",
            "10.0.0.3:11311",
            "10.0.0.4:11311",
            "10.9.9.9:11211",
        ]
    );
    // Unrelated fields and their order survive
    assert!(rendered.starts_with(r#"{"route":"PoolRoute|main","pools":"#), "{rendered}");
    assert_eq!(std::fs::metadata(&output).unwrap().mode() & 0o777, 0o640);
    assert!(dns
        .queries()
        .contains(&"A a.cache.internal".to_string()));

    registry.stop();
}

#[tokio::test]
async fn test_template_change_is_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("template.json");
    let output = dir.path().join("config.json");
    std::fs::write(&source, TEMPLATE).unwrap();

    let dns = Arc::new(MemoryDns::new());
    cluster(&dns, 300);
    let registry = registry(&dns);
    registry.register(watch(&source, &output, "")).unwrap();
    wait_for_output(&output, |content| content.contains("10.0.0.1:11211")).await;

    std::fs::write(
        &source,
        r#"{"pools":{"main":{"servers":["dns://a.cache.internal"]}}}"#,
    )
    .unwrap();

    let rendered = wait_for_output(&output, |content| !content.contains("route")).await;
    assert_eq!(rendered, r#"{"pools":{"main":{"servers":["10.0.0.1:11211"]}}}"#);

    registry.stop();
}

#[tokio::test]
async fn test_dns_change_is_picked_up_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("template.json");
    let output = dir.path().join("config.json");
    std::fs::write(&source, TEMPLATE).unwrap();

    let dns = Arc::new(MemoryDns::new());
    cluster(&dns, 1);
    let registry = registry(&dns);
    registry.register(watch(&source, &output, "")).unwrap();
    wait_for_output(&output, |content| content.contains("10.0.0.2:11211")).await;

    dns.set_a("b.cache.internal", &[ip(20)], 1);

    let rendered = wait_for_output(&output, |content| content.contains("10.0.0.20:11211")).await;
    assert!(!rendered.contains("10.0.0.2:11211"), "{rendered}");

    registry.stop();
}

#[tokio::test]
async fn test_failed_resolution_keeps_previous_output_until_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("template.json");
    let output = dir.path().join("config.json");
    std::fs::write(&source, TEMPLATE).unwrap();

    let dns = Arc::new(MemoryDns::new());
    cluster(&dns, 1);
    let registry = registry(&dns);
    registry.register(watch(&source, &output, "")).unwrap();
    let before = wait_for_output(&output, |_| true).await;

    dns.fail("A extra.internal");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(std::fs::read_to_string(&output).unwrap(), before);

    dns.set_a("extra.internal", &[ip(5)], 1);
    let rendered = wait_for_output(&output, |content| content.contains("10.0.0.5:11311")).await;
    assert_eq!(servers(&rendered, "main").len(), 4);

    registry.stop();
}

#[tokio::test]
async fn test_deregistered_watch_stops_writing() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("template.json");
    let output = dir.path().join("config.json");
    std::fs::write(&source, TEMPLATE).unwrap();

    let dns = Arc::new(MemoryDns::new());
    cluster(&dns, 300);
    let registry = registry(&dns);
    let config = watch(&source, &output, "");
    registry.register(config.clone()).unwrap();
    let before = wait_for_output(&output, |_| true).await;

    assert!(registry.deregister(&config));
    std::fs::write(&source, r#"{"pools":{"other":{"servers":["x"]}}}"#).unwrap();
    tokio::time::sleep(PERIOD * 20).await;

    assert_eq!(std::fs::read_to_string(&output).unwrap(), before);
    assert!(registry.registrations().is_empty());
}
