//! Integration tests for [`ExtractionService`].
//!
//! All tests run against [`MockBackend`], whose counters show how many
//! parser contexts each call opened and released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docextract_core::mock::{MockBackend, MockDocument};
use docextract_core::{
    CleanupPolicy, ErrorKind, ExtractionError, ExtractionOptions, ExtractionService,
};
use tokio_util::sync::CancellationToken;

const PDF: &[u8] = b"%PDF-1.7\n%mock\n";

fn service(document: MockDocument) -> (ExtractionService, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::new(document));
    (ExtractionService::new(backend.clone()), backend)
}

#[tokio::test]
async fn hello_world_single_page() {
    let (service, backend) = service(MockDocument::pages(["  Hello World \n"]));
    let extraction = service.extract(PDF.to_vec()).await.unwrap();
    assert_eq!(extraction.text, "Hello World");
    assert_eq!(extraction.page_count, 1);
    assert!(extraction.cleanup_warning.is_none());
    assert_eq!(backend.open_count(), 1);
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn multi_page_order_preserved() {
    let (service, _) = service(MockDocument::pages(["first", "second", "third"]));
    let text = service.extract(PDF.to_vec()).await.unwrap().into_text();
    let first = text.find("first").unwrap();
    let second = text.find("second").unwrap();
    let third = text.find("third").unwrap();
    assert!(first < second && second < third);
}

#[tokio::test]
async fn empty_buffer_is_malformed() {
    let (service, backend) = service(MockDocument::pages(["x"]));
    let err = service.extract(Vec::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    assert_eq!(backend.open_count(), 0);
}

#[tokio::test]
async fn non_pdf_is_malformed_not_empty() {
    let (service, _) = service(MockDocument::pages(["x"]));
    let err = service
        .extract(b"PK\x03\x04 definitely a zip".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::MalformedDocument(_)));
}

#[tokio::test]
async fn parser_refusal_is_malformed_and_holds_nothing() {
    let (service, backend) = service(MockDocument::pages(["x"]).fail_open("no xref"));
    let err = service.extract(PDF.to_vec()).await.unwrap_err();
    assert_eq!(err, ExtractionError::MalformedDocument("no xref".into()));
    assert_eq!(backend.open_count(), 1);
    assert_eq!(backend.release_count(), 0);
}

#[tokio::test]
async fn failure_after_partial_extraction_releases_once() {
    let (service, backend) =
        service(MockDocument::pages(["a", "b", "c"]).fail_page(2, "unsupported encoding"));
    let err = service.extract(PDF.to_vec()).await.unwrap_err();
    assert_eq!(
        err,
        ExtractionError::ParserFailure("unsupported encoding".into())
    );
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn panic_in_parser_releases_once() {
    let (service, backend) = service(MockDocument::pages(["a", "b"]).panic_on_page(1));
    let err = service.extract(PDF.to_vec()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParserFailure);
    assert_eq!(backend.open_count(), 1);
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn lenient_cleanup_failure_returns_text() {
    let (service, backend) = service(MockDocument::pages(["Hello World"]).fail_close("leak"));
    let extraction = service.extract(PDF.to_vec()).await.unwrap();
    assert_eq!(extraction.text, "Hello World");
    assert!(extraction.cleanup_warning.is_some());
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn strict_cleanup_failure_is_surfaced() {
    let (service, backend) = service(MockDocument::pages(["Hello World"]).fail_close("leak"));
    let service = service.with_options(ExtractionOptions {
        cleanup_policy: CleanupPolicy::Strict,
        ..Default::default()
    });
    let err = service.extract(PDF.to_vec()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceCleanupFailure);
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn repeated_extraction_is_identical() {
    let (service, backend) = service(MockDocument::pages(["alpha\r\n", "\u{FB01}ne"]));
    let first = service.extract(PDF.to_vec()).await.unwrap();
    let second = service.extract(PDF.to_vec()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.text, "alpha\n\nfine");
    assert_eq!(backend.open_count(), 2);
    assert_eq!(backend.release_count(), 2);
}

#[tokio::test]
async fn concurrent_calls_each_own_a_context() {
    let (service, backend) = service(
        MockDocument::pages(["one", "two"]).with_page_delay(Duration::from_millis(5)),
    );
    let calls = (0..8).map(|_| {
        let service = service.clone();
        async move { service.extract(PDF.to_vec()).await }
    });
    let results = futures_util::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.as_ref().unwrap().text == "one\n\ntwo"));
    assert_eq!(backend.open_count(), 8);
    assert_eq!(backend.release_count(), 8);
}

#[tokio::test]
async fn pre_cancelled_token_never_opens() {
    let (service, backend) = service(MockDocument::pages(["a"]));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = service
        .extract_with_cancel(PDF.to_vec(), cancel)
        .await
        .unwrap_err();
    assert_eq!(err, ExtractionError::Cancelled);
    assert_eq!(backend.open_count(), 0);
}

#[tokio::test]
async fn cancel_mid_document_releases_before_return() {
    let pages: Vec<String> = (0..50).map(|i| format!("page {i}")).collect();
    let (service, backend) =
        service(MockDocument::pages(pages).with_page_delay(Duration::from_millis(20)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        trigger.cancel();
    });
    let err = service
        .extract_with_cancel(PDF.to_vec(), cancel)
        .await
        .unwrap_err();
    assert_eq!(err, ExtractionError::Cancelled);
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn timeout_releases_before_return() {
    let pages: Vec<String> = (0..50).map(|i| format!("page {i}")).collect();
    let (service, backend) =
        service(MockDocument::pages(pages).with_page_delay(Duration::from_millis(20)));
    let service = service.with_options(ExtractionOptions {
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    let err = service.extract(PDF.to_vec()).await.unwrap_err();
    assert_eq!(err, ExtractionError::TimedOut(Duration::from_millis(50)));
    assert_eq!(backend.open_count(), 1);
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn caller_token_untouched_by_timeout() {
    let (service, _) = service(
        MockDocument::pages(["a", "b", "c"]).with_page_delay(Duration::from_millis(50)),
    );
    let service = service.with_options(ExtractionOptions {
        timeout: Some(Duration::from_millis(10)),
        ..Default::default()
    });
    let cancel = CancellationToken::new();
    let _ = service.extract_with_cancel(PDF.to_vec(), cancel.clone()).await;
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn timeout_waits_out_the_page_in_progress() {
    let (service, backend) = service(
        MockDocument::pages(["slow", "never read"]).with_page_delay(Duration::from_millis(300)),
    );
    let service = service.with_options(ExtractionOptions {
        timeout: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let started = Instant::now();
    let err = service.extract(PDF.to_vec()).await.unwrap_err();
    let elapsed = started.elapsed();
    assert_eq!(err, ExtractionError::TimedOut(Duration::from_millis(20)));
    // The first page read cannot be interrupted, the second is never started.
    assert!(elapsed >= Duration::from_millis(300), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "returned after {elapsed:?}");
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn all_blank_pages_yield_empty_text() {
    let (service, backend) = service(MockDocument::pages([" ", "\n\n", "\t \r\n"]));
    let extraction = service.extract(PDF.to_vec()).await.unwrap();
    assert_eq!(extraction.text, "");
    assert_eq!(extraction.page_count, 3);
    assert!(extraction.cleanup_warning.is_none());
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn dropping_the_call_cancels_the_worker() {
    let pages: Vec<String> = (0..100).map(|i| format!("page {i}")).collect();
    let (service, backend) =
        service(MockDocument::pages(pages).with_page_delay(Duration::from_millis(20)));

    let started = Instant::now();
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), service.extract(PDF.to_vec())).await;
    assert!(abandoned.is_err());

    // The worker finishes its current page, sees the cancellation and releases.
    while backend.release_count() == 0 {
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "worker kept reading after the call was dropped"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(backend.open_count(), 1);
    assert_eq!(backend.release_count(), 1);
}
