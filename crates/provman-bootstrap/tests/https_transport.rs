// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP-level tests of the download transport and catalog fetch, against a
//! loopback mock server.

use std::sync::Arc;
use std::time::Duration;

use provman_bootstrap::{Catalog, CatalogSource, HttpsTransport};
use provman_core::{DownloadTransport, ProvmanError};
use provman_test_utils::RecordingHost;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn downloads_body_to_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo.wasm"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("foo.wasm");
    let host = RecordingHost::new();

    let transport = HttpsTransport::allowing_loopback_http().unwrap();
    let result = transport
        .download(
            &format!("{}/foo.wasm", server.uri()),
            &target,
            Duration::from_secs(5),
            true,
            &host.handle(),
        )
        .await
        .unwrap();

    assert_eq!(result, Some(target.clone()));
    assert_eq!(std::fs::read(&target).unwrap(), b"abc");
}

#[tokio::test]
async fn not_found_maps_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let transport = HttpsTransport::allowing_loopback_http().unwrap();
    let result = transport
        .download(
            &format!("{}/missing.wasm", server.uri()),
            &dir.path().join("missing.wasm"),
            Duration::from_secs(5),
            false,
            &RecordingHost::new().handle(),
        )
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn server_error_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let transport = HttpsTransport::allowing_loopback_http().unwrap();
    let result = transport
        .download(
            &format!("{}/foo.wasm", server.uri()),
            &dir.path().join("foo.wasm"),
            Duration::from_secs(5),
            false,
            &RecordingHost::new().handle(),
        )
        .await;
    assert!(matches!(result, Err(ProvmanError::Download { .. })));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("slow.wasm");
    let transport = HttpsTransport::allowing_loopback_http().unwrap();
    let result = transport
        .download(
            &format!("{}/slow.wasm", server.uri()),
            &target,
            Duration::from_millis(100),
            false,
            &RecordingHost::new().handle(),
        )
        .await;
    assert!(matches!(result, Err(ProvmanError::Timeout { .. })));
    assert!(!target.exists());
}

#[tokio::test]
async fn strict_transport_refuses_plain_http() {
    let transport = HttpsTransport::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let result = transport
        .download(
            "http://127.0.0.1:9/foo.wasm",
            &dir.path().join("foo.wasm"),
            Duration::from_secs(1),
            false,
            &RecordingHost::new().handle(),
        )
        .await;
    assert!(matches!(result, Err(ProvmanError::Download { .. })));
}

#[tokio::test]
async fn catalog_source_merges_feeds_and_skips_broken_ones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"entries":[{"name":"Foo","version":"1.0","links":[]}]}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let transport = Arc::new(HttpsTransport::allowing_loopback_http().unwrap());
    let source = CatalogSource::new(
        vec![
            format!("{}/a.json", server.uri()),
            format!("{}/b.json", server.uri()),
        ],
        transport,
        Duration::from_secs(5),
    );
    let host = RecordingHost::new();

    let catalog: &Catalog = source.catalog(&host.handle()).await.unwrap();
    assert_eq!(catalog.entries.len(), 1);
    assert_eq!(host.warnings().len(), 1);
}

#[tokio::test]
async fn catalog_source_without_any_feed_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = Arc::new(HttpsTransport::allowing_loopback_http().unwrap());
    let source = CatalogSource::new(
        vec![format!("{}/gone.json", server.uri())],
        transport,
        Duration::from_secs(5),
    );
    let result = source.catalog(&RecordingHost::new().handle()).await;
    assert!(matches!(result, Err(ProvmanError::BootstrapUnavailable(_))));
}
