//! End-to-end tests against a local mock flag server
//!
//! These exercise the real reqwest client and file store together with the
//! orchestrator; the server is an in-process wiremock instance.

mod common;

use std::time::Duration;

use batch_dl::{AggregateCounts, Config, Event, IdentifierSet, Naming, OutcomeStatus, RunState};
use common::{FlagServer, GIF_BYTES, create_fetcher, files_in};

fn config(base_url: String, concurrency: usize) -> Config {
    Config {
        base_url,
        concurrency,
        request_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    }
}

// ============================================================================
// Download Tests
// ============================================================================

#[tokio::test]
async fn test_mixed_batch_writes_only_successes() {
    let flags = FlagServer::start().await;
    flags.image("aa", 200).await;
    flags.image("bb", 404).await;
    flags.image("cc", 500).await;
    flags.image("dd", 200).await;

    let (fetcher, dir) = create_fetcher(config(flags.base_url(), 2));
    let state = fetcher.watch_state();

    let counts = fetcher
        .run(&IdentifierSet::from_codes(["AA", "BB", "CC", "DD"]))
        .await
        .unwrap();

    assert_eq!(
        counts,
        AggregateCounts {
            ok: 2,
            not_found: 1,
            error: 1
        }
    );
    assert_eq!(*state.borrow(), RunState::Done);
    // Persistence has finished by the time run returns
    assert_eq!(files_in(&dir), ["aa.gif", "dd.gif"]);
    assert_eq!(std::fs::read(dir.path().join("aa.gif")).unwrap(), GIF_BYTES);
}

#[tokio::test]
async fn test_unknown_codes_are_not_found() {
    let flags = FlagServer::start().await;
    flags.image("br", 200).await;

    let (fetcher, dir) = create_fetcher(config(flags.base_url(), 5));

    let counts = fetcher
        .run(&IdentifierSet::from_codes(["BR", "QQ", "XZ"]))
        .await
        .unwrap();

    assert_eq!(counts.ok, 1);
    assert_eq!(counts.not_found, 2);
    assert_eq!(files_in(&dir), ["br.gif"]);
}

#[tokio::test]
async fn test_large_batch_with_small_concurrency() {
    let flags = FlagServer::start().await;
    let codes: Vec<String> = IdentifierSet::every_two_letter()
        .limit(40)
        .iter()
        .map(|id| id.normalized())
        .collect();
    for cc in codes.iter().step_by(2) {
        flags.image(cc, 200).await;
    }

    let (fetcher, dir) = create_fetcher(config(flags.base_url(), 3));
    let gate = fetcher.gate();

    let counts = fetcher
        .run(&IdentifierSet::every_two_letter().limit(40))
        .await
        .unwrap();

    assert_eq!(counts.total(), 40);
    assert_eq!(counts.ok, 20);
    assert_eq!(counts.not_found, 20);
    assert!(gate.peak_in_flight() <= 3);
    assert_eq!(files_in(&dir).len(), 20);
    assert_eq!(flags.server.received_requests().await.unwrap().len(), 40);
}

#[tokio::test]
async fn test_metadata_naming() {
    let flags = FlagServer::start().await;
    flags.image("br", 200).await;
    flags.metadata("br", "Brazil").await;
    flags.image("cd", 200).await;
    flags.metadata("cd", "Congo, Democratic Republic of").await;
    flags.image("zz", 200).await;

    let (fetcher, dir) = create_fetcher(Config {
        naming: Naming::CountryMetadata,
        ..config(flags.base_url(), 2)
    });

    let counts = fetcher
        .run(&IdentifierSet::from_codes(["BR", "CD", "ZZ"]))
        .await
        .unwrap();

    // ZZ has an image but no metadata
    assert_eq!(counts.ok, 2);
    assert_eq!(counts.not_found, 1);
    assert_eq!(
        files_in(&dir),
        ["Brazil-BR.gif", "Congo,_Democratic_Republic_of-CD.gif"]
    );
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_connection_refused_is_counted_as_error() {
    // Reserve a port, then free it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (fetcher, dir) = create_fetcher(config(format!("http://{addr}/flags"), 2));
    let mut events = fetcher.subscribe();

    let counts = fetcher
        .run(&IdentifierSet::from_codes(["BR", "CN"]))
        .await
        .unwrap();

    assert_eq!(counts.error, 2);
    assert!(files_in(&dir).is_empty());

    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Completed {
            identifier, status, ..
        } = event
        {
            assert_eq!(status, OutcomeStatus::Error);
            failed.push(identifier.to_string());
        }
    }
    failed.sort();
    assert_eq!(failed, ["BR", "CN"]);
}

#[tokio::test]
async fn test_slow_server_times_out_as_error() {
    let flags = FlagServer::start().await;
    wiremock::Mock::given(wiremock::matchers::path("/flags/br/br.gif"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&flags.server)
        .await;

    let (fetcher, _dir) = create_fetcher(Config {
        request_timeout: Some(Duration::from_millis(200)),
        ..config(flags.base_url(), 1)
    });

    let counts = fetcher.run(&IdentifierSet::from_codes(["BR"])).await.unwrap();

    assert_eq!(counts.error, 1);
}

#[tokio::test]
async fn test_unwritable_output_dir_does_not_fail_run() {
    let flags = FlagServer::start().await;
    flags.image("br", 200).await;

    // A regular file where the output directory should be
    let temp = tempfile::TempDir::new().unwrap();
    let blocked = temp.path().join("not-a-dir");
    std::fs::write(&blocked, b"x").unwrap();

    let fetcher = batch_dl::BatchFetcher::new(Config {
        output_dir: blocked,
        ..config(flags.base_url(), 1)
    })
    .unwrap();
    let offloader = fetcher.offloader();

    let counts = fetcher.run(&IdentifierSet::from_codes(["BR"])).await.unwrap();

    assert_eq!(counts.ok, 1);
    assert_eq!(offloader.failures(), 1);
}

#[tokio::test]
async fn test_server_reason_phrase_reaches_failure_event() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        socket.read(&mut buf).await.ok();
        socket
            .write_all(
                b"HTTP/1.1 503 Backend Overloaded\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        socket.shutdown().await.ok();
    });

    let (fetcher, _dir) = create_fetcher(config(format!("http://{addr}/flags"), 1));
    let mut events = fetcher.subscribe();

    let counts = fetcher.run(&IdentifierSet::from_codes(["BR"])).await.unwrap();

    assert_eq!(counts.error, 1);
    let failure = std::iter::from_fn(|| events.try_recv().ok()).find_map(|event| match event {
        Event::FetchFailed { error, .. } => Some(error),
        _ => None,
    });
    assert_eq!(failure.as_deref(), Some("HTTP 503 Backend Overloaded"));
}
