mod common;

use std::io::Write;
use std::sync::Arc;

use common::{CountingRelay, TestServer, qr_png, unreachable_url};
use qr_scanner::scanner::{
    HttpDirectLoader, ImageAcquirer, ImageReference, NoopObserver, ScanConfig, ScanError, ScanEvent,
    ScanOutcome, ScanPipeline,
};
use std::sync::Mutex;

fn acquirer(relay: &CountingRelay, config: &ScanConfig) -> ImageAcquirer {
    let direct = HttpDirectLoader::new(config.clone()).expect("direct loader");
    ImageAcquirer::new(relay.bus.clone(), Arc::new(direct))
}

fn config_with_origin(origin: Option<String>) -> ScanConfig {
    ScanConfig {
        page_origin: origin,
        ..ScanConfig::default()
    }
}

#[tokio::test]
async fn same_origin_urls_never_touch_the_relay() {
    let server = TestServer::png(qr_png("same origin"));
    let config = config_with_origin(Some(server.origin()));
    let relay = CountingRelay::start(config.clone());
    let acquirer = acquirer(&relay, &config);

    for path in ["/qr.png", "/nested/qr.png?v=1"] {
        let buffer = acquirer
            .acquire(ImageReference::url(server.url(path)), &config, &NoopObserver)
            .await
            .expect("direct load");
        assert!(buffer.width() > 0);
    }

    // 相对地址按页面来源解析，同样走直连
    acquirer
        .acquire(ImageReference::url("/relative.png"), &config, &NoopObserver)
        .await
        .expect("relative load");

    assert_eq!(relay.requests(), 0);
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn fetching_events_carry_redacted_urls() {
    let server = TestServer::png(qr_png("redacted"));
    let config = config_with_origin(Some("https://page.example".to_string()));
    let relay = CountingRelay::start(config.clone());
    let acquirer = acquirer(&relay, &config);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let observer = move |event: &ScanEvent| sink.lock().unwrap().push(event.clone());

    acquirer
        .acquire(
            ImageReference::url(server.url("/qr.png?token=secret#frag")),
            &config,
            &observer,
        )
        .await
        .expect("relayed load");

    let events = events.lock().unwrap();
    assert_eq!(
        events.first(),
        Some(&ScanEvent::Fetching {
            url: server.url("/qr.png")
        })
    );
}

#[tokio::test]
async fn cross_origin_urls_use_the_relay_once_per_call() {
    let server = TestServer::png(qr_png("cross origin"));
    let config = config_with_origin(Some("https://page.example".to_string()));
    let relay = CountingRelay::start(config.clone());
    let acquirer = acquirer(&relay, &config);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let observer = move |event: &ScanEvent| sink.lock().unwrap().push(event.clone());

    for expected in 1..=2 {
        acquirer
            .acquire(ImageReference::url(server.url("/qr.png")), &config, &observer)
            .await
            .expect("relayed load");
        assert_eq!(relay.requests(), expected);
    }

    // 没有缓存：每次调用都重新抓取
    assert_eq!(server.hits(), 2);
    let fetching = events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| matches!(event, ScanEvent::Fetching { .. }))
        .count();
    assert_eq!(fetching, 2);
}

#[tokio::test]
async fn file_urls_are_always_relayed() {
    let mut file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("temp file");
    file.write_all(&qr_png("local file")).expect("write png");
    let url = reqwest::Url::from_file_path(file.path()).expect("file url");

    let config = config_with_origin(Some("http://127.0.0.1".to_string()));
    let relay = CountingRelay::start(config.clone());
    let pipeline = ScanPipeline::new(config.clone(), acquirer(&relay, &config));

    let outcome = pipeline
        .scan(ImageReference::url(url.to_string()), &NoopObserver)
        .await;

    assert_eq!(outcome.text(), Some("local file"));
    assert_eq!(relay.requests(), 1);
}

#[tokio::test]
async fn relay_failures_surface_as_proxy_errors() {
    let config = config_with_origin(None);
    let relay = CountingRelay::start(config.clone());
    let acquirer = acquirer(&relay, &config);

    let err = acquirer
        .acquire(ImageReference::url(unreachable_url()), &config, &NoopObserver)
        .await
        .expect_err("unreachable");

    assert!(matches!(err, ScanError::ProxyFetch(ref message) if !message.is_empty()));
    assert_eq!(relay.requests(), 1);
}

#[tokio::test]
async fn malformed_references_are_rejected_before_any_fetch() {
    let config = config_with_origin(None);
    let relay = CountingRelay::start(config.clone());
    let acquirer = acquirer(&relay, &config);

    for raw in ["", "   ", "relative/without/origin.png", "http://"] {
        let err = acquirer
            .acquire(ImageReference::url(raw), &config, &NoopObserver)
            .await
            .expect_err("invalid reference");
        assert_eq!(err.code(), "invalid_reference", "{raw}");
    }

    let err = acquirer
        .acquire(ImageReference::bytes(Vec::new(), "image/png"), &config, &NoopObserver)
        .await
        .expect_err("empty bytes");
    assert_eq!(err.code(), "invalid_reference");
    assert_eq!(relay.requests(), 0);
}

#[tokio::test]
async fn non_image_bodies_fail_with_a_stage_specific_message() {
    let server = TestServer::serve("200 OK", "text/html", b"<html>nope</html>".to_vec());
    let config = config_with_origin(None);
    let relay = CountingRelay::start(config.clone());
    let pipeline = ScanPipeline::new(config.clone(), acquirer(&relay, &config));

    let outcome = pipeline
        .scan(ImageReference::url(server.url("/page")), &NoopObserver)
        .await;

    match outcome {
        ScanOutcome::Failed { code, stage, .. } => {
            assert_eq!(code, "proxy_fetch");
            assert_eq!(stage, "acquire");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}
