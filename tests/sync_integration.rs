//! End-to-end sync runs for purchased orders against a mock storefront.

mod support;

use hb_downloader_core::cache::CacheKey;
use hb_downloader_core::catalog::{ExtensionFilter, FileFilter};
use hb_downloader_core::sync::{SyncError, SyncPhase};
use std::time::{Duration, Instant};

use serde_json::json;
use support::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    mount_library(&server, &["ORD1901"]).await;
    let url = format!("{}/files/game.zip?ttl=1", server.uri());
    mount_order(&server, "ORD1901", order(vec![("windows", vec![file_entry(&url, None)])])).await;
    Mock::given(method("GET"))
        .and(path("/files/game.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Sun, 01 Jan 2023 08:00:00 GMT")
                .set_body_bytes(b"game v1".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut first = coordinator(&server, config(library.path()));
    let report = first.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(first.phase(), SyncPhase::Done);
    assert_eq!(report.units, 1);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.recorded, 1);

    let file = product_dir(library.path()).join("game.zip");
    assert_eq!(std::fs::read(&file).unwrap(), b"game v1");
    let cache = load_cache(library.path());
    let record = cache.get(&CacheKey::new("ORD1901", "game.zip")).unwrap();
    assert_eq!(record.remote_modified.as_deref(), Some("Sun, 01 Jan 2023 08:00:00 GMT"));
    assert!(record.local_modified.is_some());

    let mut second = coordinator(&server, config(library.path()));
    let report = second.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn test_update_keeps_previous_version_under_dated_name() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    seed_cache(library.path(), &[("ORD1901", "game.zip", "2023-01-01")]);
    let folder = product_dir(library.path());
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("game.zip"), b"old build").unwrap();

    let url = format!("{}/files/game.zip", server.uri());
    mount_order(
        &server,
        "ORD1901",
        order(vec![("windows", vec![file_entry(&url, Some("2023-06-01"))])]),
    )
    .await;
    mount_file(&server, "/files/game.zip", b"new build", 1).await;

    let mut config = config(library.path());
    config.update = true;
    config.purchase_keys = vec!["ORD1901".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(std::fs::read(folder.join("game.zip")).unwrap(), b"new build");
    assert_eq!(
        std::fs::read(folder.join("game [2023-01-01].zip")).unwrap(),
        b"old build"
    );
    let cache = load_cache(library.path());
    let record = cache.get(&CacheKey::new("ORD1901", "game.zip")).unwrap();
    assert_eq!(record.remote_modified.as_deref(), Some("2023-06-01"));
}

#[tokio::test]
async fn test_update_with_same_token_fetches_nothing() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    seed_cache(library.path(), &[("ORD1901", "game.zip", "2023-01-01")]);

    let url = format!("{}/files/game.zip", server.uri());
    mount_order(
        &server,
        "ORD1901",
        order(vec![("windows", vec![file_entry(&url, Some("2023-01-01"))])]),
    )
    .await;
    mount_file(&server, "/files/game.zip", b"unused", 0).await;

    let mut config = config(library.path());
    config.update = true;
    config.purchase_keys = vec!["ORD1901".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.downloaded, 0);
}

#[tokio::test]
async fn test_update_with_matching_hash_ignores_token_drift() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    seed_cache_with_hash(library.path(), "ORD1901", "game.zip", "2023-01-01", "5d41402a");

    let url = format!("{}/files/game.zip", server.uri());
    let mut entry = file_entry(&url, Some("2023-06-01"));
    entry["md5"] = json!("5d41402a");
    mount_order(&server, "ORD1901", order(vec![("windows", vec![entry])])).await;
    mount_file(&server, "/files/game.zip", b"unused", 0).await;

    let mut config = config(library.path());
    config.update = true;
    config.purchase_keys = vec!["ORD1901".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.downloaded, 0);
    assert!(!product_dir(library.path()).join("game.zip").exists());
}

#[tokio::test]
async fn test_every_requested_content_type_is_fetched() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    let uri = server.uri();
    let files = vec![
        json!({
            "name": "PDF",
            "url": {
                "web": format!("{uri}/files/book.pdf"),
                "bittorrent": format!("{uri}/files/book.pdf.torrent"),
            },
            "human_size": "5 MB",
        }),
        // Placeholder entry: no URLs and nothing to download.
        json!({ "name": "Soon", "url": {}, "human_size": "0 bytes" }),
        // Real file without a torrent: the missing category is only logged.
        json!({
            "name": "Notes",
            "url": { "web": format!("{uri}/files/notes.txt"), "bittorrent": null },
            "human_size": "1 KB",
        }),
    ];
    mount_order(&server, "ORD1", order(vec![("ebook", files)])).await;
    mount_file(&server, "/files/book.pdf", b"pdf", 1).await;
    mount_file(&server, "/files/book.pdf.torrent", b"torrent", 1).await;
    mount_file(&server, "/files/notes.txt", b"notes", 1).await;

    let mut config = config(library.path());
    config.purchase_keys = vec!["ORD1".into()];
    config.content_types = vec!["web".into(), "bittorrent".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 3);
    assert_eq!(report.failed, 0);
    let folder = product_dir(library.path());
    assert_eq!(std::fs::read(folder.join("book.pdf.torrent")).unwrap(), b"torrent");
    assert_eq!(load_cache(library.path()).len(), 3);
}

#[tokio::test]
async fn test_missing_file_is_skipped_and_not_cached() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    let gone = format!("{}/files/gone.pdf", server.uri());
    let here = format!("{}/files/here.pdf", server.uri());
    mount_order(
        &server,
        "ORD1",
        order(vec![("ebook", vec![file_entry(&gone, None), file_entry(&here, None)])]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_file(&server, "/files/here.pdf", b"pdf", 1).await;

    let mut config = config(library.path());
    config.purchase_keys = vec!["ORD1".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.unavailable, 1);
    assert_eq!(report.downloaded, 1);
    assert!(!product_dir(library.path()).join("gone.pdf").exists());
    let cache = load_cache(library.path());
    assert!(!cache.contains(&CacheKey::new("ORD1", "gone.pdf")));
    assert!(cache.contains(&CacheKey::new("ORD1", "here.pdf")));
}

#[tokio::test]
async fn test_filters_prevent_fetch_attempts() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    let uri = server.uri();
    mount_order(
        &server,
        "ORD1",
        order(vec![
            ("windows", vec![file_entry(&format!("{uri}/files/setup.exe"), None)]),
            (
                "ebook",
                vec![
                    file_entry(&format!("{uri}/files/book.PDF"), None),
                    file_entry(&format!("{uri}/files/book.mobi"), None),
                ],
            ),
        ]),
    )
    .await;
    mount_file(&server, "/files/setup.exe", b"exe", 0).await;
    mount_file(&server, "/files/book.mobi", b"mobi", 0).await;
    mount_file(&server, "/files/book.PDF", b"pdf", 1).await;

    let mut config = config(library.path());
    config.purchase_keys = vec!["ORD1".into()];
    config.filter = FileFilter::new(ExtensionFilter::exclude(["MOBI"]), &["ebook".to_string()]);
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert!(product_dir(library.path()).join("book.PDF").exists());
}

#[tokio::test]
async fn test_restart_fetches_only_unrecorded_files() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    seed_cache(library.path(), &[("ORD1", "part1.zip", "t1")]);
    let uri = server.uri();
    mount_order(
        &server,
        "ORD1",
        order(vec![(
            "windows",
            vec![
                file_entry(&format!("{uri}/files/part1.zip"), None),
                file_entry(&format!("{uri}/files/part2.zip"), None),
            ],
        )]),
    )
    .await;
    mount_file(&server, "/files/part1.zip", b"1", 0).await;
    mount_file(&server, "/files/part2.zip", b"2", 1).await;

    let mut config = config(library.path());
    config.purchase_keys = vec!["ORD1".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(load_cache(library.path()).len(), 2);
}

#[tokio::test]
async fn test_failed_order_does_not_stop_others() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/v1/order/BROKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let url = format!("{}/files/ok.zip", server.uri());
    mount_order(&server, "GOOD", order(vec![("windows", vec![file_entry(&url, None)])])).await;
    mount_file(&server, "/files/ok.zip", b"ok", 1).await;

    let mut config = config(library.path());
    config.purchase_keys = vec!["BROKEN".into(), "GOOD".into()];
    let report = coordinator(&server, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.units, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.downloaded, 1);
}

#[tokio::test]
async fn test_invalid_session_is_fatal() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/home/library"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Log in</html>"))
        .mount(&server)
        .await;

    let err = coordinator(&server, config(library.path()))
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Authorization(_)));
}

#[tokio::test]
async fn test_corrupt_cache_is_fatal() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    std::fs::write(cache_path(library.path()), "{\"container\": \"ORD1\"}\nnot json\n").unwrap();

    let err = coordinator(&server, config(library.path()))
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::CorruptCache(_)));
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    mount_library(&server, &["ORD1"]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = coordinator(&server, config(library.path()))
        .run(&cancel)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.downloaded, 0);
    assert!(load_cache(library.path()).is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_completed_downloads() {
    let server = MockServer::start().await;
    let library = TempDir::new().unwrap();
    let uri = server.uri();
    mount_order(
        &server,
        "ORD1",
        order(vec![(
            "windows",
            vec![
                file_entry(&format!("{uri}/files/fast.zip"), None),
                file_entry(&format!("{uri}/files/slow.zip"), None),
            ],
        )]),
    )
    .await;
    mount_file(&server, "/files/fast.zip", b"fast", 1).await;
    Mock::given(method("GET"))
        .and(path("/files/slow.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_secs(20)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        trigger.cancel();
    });

    let mut config = config(library.path());
    config.purchase_keys = vec!["ORD1".into()];
    let started = Instant::now();
    let report = coordinator(&server, config).run(&cancel).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(report.cancelled);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.recorded, 1);
    let cache = load_cache(library.path());
    assert!(cache.contains(&CacheKey::new("ORD1", "fast.zip")));
    assert!(!cache.contains(&CacheKey::new("ORD1", "slow.zip")));
    let folder = product_dir(library.path());
    assert!(folder.join("fast.zip").exists());
    assert!(!folder.join("slow.zip").exists());
}
