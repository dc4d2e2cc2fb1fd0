//! Scan orchestration
//!
//! Wires configuration into the full stack (client cache, sources, egress
//! pool, registry, classifier, pre-filter, notifier, storage), starts the background
//! tasks and runs the controller until shutdown.

mod burst;
mod controller;

pub use burst::BurstGuard;
pub use controller::{Outcome, ScanController};

use crate::config::Config;
use crate::consensus::ConsensusClassifier;
use crate::cursor::Candidate;
use crate::egress::{DiscoveryFeed, EgressPool, HttpListFeed, HttpProbe, ReachabilityProbe};
use crate::notify::{Notifier, WebhookNotifier};
use crate::registry::SourceRegistry;
use crate::sources::{build_sources, ClientCache, DnsPreFilter, NoPreFilter, PreFilter};
use crate::storage::open_storage;
use crate::{ConfigError, HunterError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a scan from configuration until `shutdown` is cancelled
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `config_hash` - Hash of the configuration file, recorded in checkpoints
/// * `fresh` - Ignore saved progress
/// * `shutdown` - Cancelled on Ctrl-C / SIGTERM
///
/// # Returns
///
/// * `Ok(())` - Progress was flushed after shutdown
/// * `Err(HunterError)` - Startup failed or the final flush failed
pub async fn run_hunt(
    config: Config,
    config_hash: Option<String>,
    fresh: bool,
    shutdown: CancellationToken,
) -> Result<(), HunterError> {
    let reference = Candidate::parse(&config.health.reference_domain).ok_or_else(|| {
        ConfigError::Validation(format!(
            "invalid reference domain '{}'",
            config.health.reference_domain
        ))
    })?;

    let clients = Arc::new(ClientCache::new(
        config.http.clone(),
        config.consensus.query_timeout(),
    ));
    let sources = build_sources(&config, clients);
    tracing::info!("Registered {} sources", sources.len());

    let notifier: Option<Arc<dyn Notifier>> =
        match WebhookNotifier::from_config(&config.notify, &config.http)? {
            Some(webhook) => {
                tracing::info!("Announcing finds of up to {} characters", config.notify.max_length);
                Some(Arc::new(webhook))
            }
            None => None,
        };

    let background = shutdown.child_token();
    let mut handles = Vec::new();

    let pool = Arc::new(EgressPool::new(config.egress.clone()));
    if config.egress.feeds.is_empty() {
        tracing::info!("No egress feeds configured, all queries use the primary egress");
    } else {
        let feed: Arc<dyn DiscoveryFeed> = Arc::new(HttpListFeed::new(&config.egress, &config.http)?);
        let probe: Arc<dyn ReachabilityProbe> = Arc::new(HttpProbe::new(&config.egress, &config.http));
        handles.push(Arc::clone(&pool).spawn_maintenance(feed, probe, background.clone()));
    }

    let registry = Arc::new(SourceRegistry::new(
        sources,
        pool,
        config.health.clone(),
        config.consensus.query_timeout(),
    ));
    handles.extend(Arc::clone(&registry).spawn_background(reference, background.clone()));

    let classifier = ConsensusClassifier::new(registry, config.consensus.clone());

    let prefilter: Arc<dyn PreFilter> = if config.scan.dns_prefilter {
        Arc::new(DnsPreFilter::new(config.scan.dns_timeout()))
    } else {
        Arc::new(NoPreFilter)
    };

    let storage = Box::new(open_storage(&config.output));
    let result = match ScanController::new(
        &config.scan,
        classifier,
        prefilter,
        storage,
        config_hash,
        fresh,
    ) {
        Ok(controller) => {
            let mut controller = match notifier {
                Some(notifier) => controller.with_notifier(notifier),
                None => controller,
            };
            controller.run(shutdown).await
        }
        Err(e) => Err(e),
    };

    background.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!("Background task ended abnormally: {}", e);
        }
    }

    result
}
