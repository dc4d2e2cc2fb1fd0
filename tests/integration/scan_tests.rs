use domain_hunter::config::{parse_config, Config};
use domain_hunter::egress::EgressPool;
use domain_hunter::output::{load_statistics, render_statistics};
use domain_hunter::registry::SourceRegistry;
use domain_hunter::scan::run_hunt;
use domain_hunter::sources::{build_sources, ClientCache, NoPreFilter};
use domain_hunter::storage::{JsonFileStorage, Storage};
use domain_hunter::{ConsensusClassifier, ScanController, Verdict};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The only single-letter `.io` name the mock sources call unregistered
const AVAILABLE: &str = "q.io";

/// Mounts three sources that agree on which names are available
async fn mount_sources(server: &MockServer) {
    // Page source
    Mock::given(method("GET"))
        .and(path(format!("/whois/{}", AVAILABLE)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body>No match for {}</body></html>", AVAILABLE)),
        )
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/whois/.+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><pre>Registrar: Example Inc.</pre></body></html>"),
        )
        .mount(server)
        .await;

    // Status source
    Mock::given(method("GET"))
        .and(path(format!("/api/{}", AVAILABLE)))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/.+$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    // JSON source
    Mock::given(method("GET"))
        .and(path(format!("/check/{}", AVAILABLE)))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"available": true}"#))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/check/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"available": false}"#))
        .mount(server)
        .await;
}

/// Single-letter `.io` keyspace with no pacing, against the mock server
fn create_test_config(server: &MockServer, dir: &TempDir) -> Config {
    let content = format!(
        r#"
[scan]
min-length = 1
max-length = 1
tlds = ["io"]
dns-prefilter = false
candidate-delay-min-ms = 0
candidate-delay-max-ms = 0
find-cooldown-ms = 0
burst-threshold = 1000

[consensus]
batch-size = 5
quorum = 3
confirm-available = true

[health]
min-spacing-ms = 0
primary-weight = 1.0

[output]
checkpoint-path = "{checkpoint}"
found-path = "{found}"

[[source]]
name = "page"
url = "{uri}/whois/{{domain}}"
kind = "page"
available-markers = ["No match for"]
taken-markers = ["Registrar:"]

[[source]]
name = "status"
url = "{uri}/api/{{domain}}"
kind = "status"
available-status = [404]
taken-status = [200]

[[source]]
name = "json"
url = "{uri}/check/{{domain}}"
kind = "json"
json-pointer = "/available"
"#,
        uri = server.uri(),
        checkpoint = dir.path().join("hunter_state.json").display(),
        found = dir.path().join("found_domains.json").display(),
    );
    parse_config(&content).expect("test config is valid")
}

fn create_controller(config: &Config, fresh: bool) -> ScanController {
    let clients = Arc::new(ClientCache::new(
        config.http.clone(),
        config.consensus.query_timeout(),
    ));
    let registry = SourceRegistry::new(
        build_sources(config, clients),
        Arc::new(EgressPool::new(config.egress.clone())),
        config.health.clone(),
        config.consensus.query_timeout(),
    );
    let classifier = ConsensusClassifier::new(Arc::new(registry), config.consensus.clone());
    let storage = JsonFileStorage::new(&config.output.checkpoint_path, &config.output.found_path);

    ScanController::new(
        &config.scan,
        classifier,
        Arc::new(NoPreFilter),
        Box::new(storage),
        Some("test-hash".to_string()),
        fresh,
    )
    .expect("controller starts")
}

fn storage(config: &Config) -> JsonFileStorage {
    JsonFileStorage::new(&config.output.checkpoint_path, &config.output.found_path)
}

#[tokio::test]
async fn test_full_pass_finds_only_available_name() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir);

    let mut controller = create_controller(&config, false);

    let mut available = Vec::new();
    for _ in 0..26 {
        let outcome = controller.step().await.unwrap();
        if outcome.verdict == Verdict::Available {
            available.push(outcome.candidate.domain());
        }
    }

    assert_eq!(available, vec![AVAILABLE.to_string()]);
    assert_eq!(controller.total_checked(), 26);
    assert_eq!(controller.total_found(), 1);

    // A full pass wraps the cursor back to the start
    assert_eq!(controller.cursor().current().domain(), "a.io");

    let storage = storage(&config);
    let checkpoint = storage.load_checkpoint().unwrap().expect("checkpoint written");
    assert_eq!(
        (checkpoint.length, checkpoint.tld_index, checkpoint.combo_index),
        (1, 0, 0)
    );
    assert_eq!(checkpoint.total_checked, 26);

    let found = storage.load_found().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].domain, AVAILABLE);
    assert_eq!(found[0].length, 1);

    let stats = load_statistics(&storage).unwrap();
    let report = render_statistics(&stats, &config.scan.tlds);
    assert!(report.contains("1-character domains (1)"));
    assert!(report.contains(AVAILABLE));
}

#[tokio::test]
async fn test_second_pass_does_not_duplicate_finds() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir);

    let mut controller = create_controller(&config, false);
    for _ in 0..52 {
        controller.step().await.unwrap();
    }

    assert_eq!(storage(&config).load_found().unwrap().len(), 1);
    assert_eq!(controller.total_found(), 1);
}

#[tokio::test]
async fn test_resume_continues_where_previous_run_stopped() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir);

    {
        let mut controller = create_controller(&config, false);
        for _ in 0..10 {
            controller.step().await.unwrap();
        }
        controller.shutdown().unwrap();
    }

    let mut resumed = create_controller(&config, false);
    assert_eq!(resumed.total_checked(), 10);
    assert_eq!(resumed.cursor().current().domain(), "k.io");

    let outcome = resumed.step().await.unwrap();
    assert_eq!(outcome.candidate.domain(), "k.io");

    let fresh = create_controller(&config, true);
    assert_eq!(fresh.cursor().current().domain(), "a.io");
}

#[tokio::test]
async fn test_run_hunt_flushes_on_shutdown() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir);

    let shutdown = CancellationToken::new();
    let cancel = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
    });

    run_hunt(config.clone(), Some("hash-1".to_string()), false, shutdown)
        .await
        .expect("hunt stops cleanly");

    let storage = storage(&config);
    let checkpoint = storage.load_checkpoint().unwrap().expect("checkpoint flushed");
    assert!(checkpoint.total_checked >= 26);
    assert_eq!(checkpoint.total_found, 1);
    assert_eq!(checkpoint.config_hash.as_deref(), Some("hash-1"));

    let found = storage.load_found().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].domain, AVAILABLE);

    // A run that is cancelled before it starts still leaves progress intact
    let already_cancelled = CancellationToken::new();
    already_cancelled.cancel();
    run_hunt(config.clone(), Some("hash-1".to_string()), false, already_cancelled)
        .await
        .expect("second hunt stops cleanly");

    let again = storage.load_checkpoint().unwrap().unwrap();
    assert_eq!(again.total_checked, checkpoint.total_checked);
    assert_eq!(again.combo_index, checkpoint.combo_index);
}

#[tokio::test]
async fn test_run_hunt_announces_each_find_once() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &dir);
    config.notify.webhook_url = Some(format!("{}/hook", server.uri()));

    let shutdown = CancellationToken::new();
    let cancel = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
    });

    // Later passes find q.io again but it is already recorded
    run_hunt(config.clone(), None, false, shutdown)
        .await
        .expect("hunt stops cleanly");

    assert!(storage(&config).load_checkpoint().unwrap().unwrap().total_checked >= 26);
    server.verify().await;
}
