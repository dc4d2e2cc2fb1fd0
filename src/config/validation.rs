use crate::config::types::{
    Config, ConsensusConfig, DetectionKind, EgressConfig, HealthConfig, NotifyConfig,
    OutputConfig, ScanConfig, SourceEntry,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Longest label the enumerator supports; 36^12 still fits in a `u64`
const MAX_SUPPORTED_LENGTH: u32 = 12;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scan_config(&config.scan)?;
    validate_consensus_config(&config.consensus)?;
    validate_health_config(&config.health)?;
    validate_egress_config(&config.egress)?;
    validate_output_config(&config.output)?;
    validate_notify_config(&config.notify)?;
    validate_sources(&config.sources, &config.consensus)?;
    Ok(())
}

/// Validates keyspace and scan loop configuration
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.min_length < 1 {
        return Err(ConfigError::Validation(
            "min-length must be >= 1".to_string(),
        ));
    }

    if config.max_length < config.min_length {
        return Err(ConfigError::Validation(format!(
            "max-length ({}) must be >= min-length ({})",
            config.max_length, config.min_length
        )));
    }

    if config.max_length > MAX_SUPPORTED_LENGTH {
        return Err(ConfigError::Validation(format!(
            "max-length must be <= {}, got {}",
            MAX_SUPPORTED_LENGTH, config.max_length
        )));
    }

    if config.tlds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one TLD must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for tld in &config.tlds {
        validate_tld(tld)?;
        if !seen.insert(tld.as_str()) {
            return Err(ConfigError::InvalidTld(format!("'{}' is listed twice", tld)));
        }
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-every must be >= 1".to_string(),
        ));
    }

    if config.progress_every < 1 {
        return Err(ConfigError::Validation(
            "progress-every must be >= 1".to_string(),
        ));
    }

    if config.candidate_delay_min_ms > config.candidate_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "candidate-delay-min-ms ({}) must be <= candidate-delay-max-ms ({})",
            config.candidate_delay_min_ms, config.candidate_delay_max_ms
        )));
    }

    if config.burst_threshold < 1 {
        return Err(ConfigError::Validation(
            "burst-threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates consensus round configuration
fn validate_consensus_config(config: &ConsensusConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 32 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be between 1 and 32, got {}",
            config.batch_size
        )));
    }

    if config.quorum < 1 || config.quorum > config.batch_size {
        return Err(ConfigError::Validation(format!(
            "quorum must be between 1 and batch-size ({}), got {}",
            config.batch_size, config.quorum
        )));
    }

    if config.query_timeout_ms == 0 || config.round_deadline_ms == 0 {
        return Err(ConfigError::Validation(
            "query-timeout-ms and round-deadline-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates health and backoff configuration
fn validate_health_config(config: &HealthConfig) -> Result<(), ConfigError> {
    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "failure-threshold must be >= 1".to_string(),
        ));
    }

    if config.base_backoff_ms == 0 || config.base_backoff_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "base-backoff-ms must be > 0 and <= max-backoff-ms, got {} / {}",
            config.base_backoff_ms, config.max_backoff_ms
        )));
    }

    if config.rate_limit_penalty < 1 {
        return Err(ConfigError::Validation(
            "rate-limit-penalty must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.primary_weight) {
        return Err(ConfigError::Validation(format!(
            "primary-weight must be between 0.0 and 1.0, got {}",
            config.primary_weight
        )));
    }

    if config.egress_failure_limit < 1 {
        return Err(ConfigError::Validation(
            "egress-failure-limit must be >= 1".to_string(),
        ));
    }

    if config.recovery_interval_secs == 0 || config.decay_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "recovery-interval-secs and decay-interval-secs must be > 0".to_string(),
        ));
    }

    match config.reference_domain.split_once('.') {
        Some((name, tld)) if !name.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "reference-domain must look like 'name.tld', got '{}'",
            config.reference_domain
        ))),
    }
}

/// Validates egress pool configuration
fn validate_egress_config(config: &EgressConfig) -> Result<(), ConfigError> {
    if config.target_size < 1 {
        return Err(ConfigError::Validation(
            "target-size must be >= 1".to_string(),
        ));
    }

    if config.low_water > config.target_size {
        return Err(ConfigError::Validation(format!(
            "low-water ({}) must be <= target-size ({})",
            config.low_water, config.target_size
        )));
    }

    if config.probe_concurrency < 1 || config.max_probe_batch < 1 {
        return Err(ConfigError::Validation(
            "probe-concurrency and max-probe-batch must be >= 1".to_string(),
        ));
    }

    if config.validation_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "validation-interval-secs must be > 0".to_string(),
        ));
    }

    Url::parse(&config.probe_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid probe-url: {}", e)))?;

    for feed in &config.feeds {
        Url::parse(feed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid feed URL '{}': {}", feed, e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-path cannot be empty".to_string(),
        ));
    }

    if config.found_path.is_empty() {
        return Err(ConfigError::Validation(
            "found-path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path == config.found_path {
        return Err(ConfigError::Validation(
            "checkpoint-path and found-path must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.webhook_url {
        Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webhook-url: {}", e)))?;
    }

    if config.max_length < 1 {
        return Err(ConfigError::Validation(
            "notify max-length must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the source list
fn validate_sources(sources: &[SourceEntry], consensus: &ConsensusConfig) -> Result<(), ConfigError> {
    // With fewer sources than the quorum nothing could ever be declared available
    if sources.len() < consensus.quorum {
        return Err(ConfigError::Validation(format!(
            "at least {} sources are required to reach quorum, got {}",
            consensus.quorum,
            sources.len()
        )));
    }

    let mut names = HashSet::new();
    for source in sources {
        if source.name.is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        if source.weight < 1 {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have weight >= 1",
                source.name
            )));
        }

        validate_source_url(source)?;
        validate_detection(source)?;
    }

    Ok(())
}

fn validate_source_url(source: &SourceEntry) -> Result<(), ConfigError> {
    if !source.url.contains("{domain}") {
        return Err(ConfigError::InvalidUrl(format!(
            "source '{}' URL must contain a {{domain}} placeholder",
            source.name
        )));
    }

    let sample = source.url.replace("{domain}", "abc.io");
    Url::parse(&sample).map_err(|e| {
        ConfigError::InvalidUrl(format!("source '{}' URL is invalid: {}", source.name, e))
    })?;

    Ok(())
}

fn validate_detection(source: &SourceEntry) -> Result<(), ConfigError> {
    let ok = match source.kind {
        DetectionKind::Page => {
            !source.available_markers.is_empty() || !source.taken_markers.is_empty()
        }
        DetectionKind::Status => {
            !source.available_status.is_empty() || !source.taken_status.is_empty()
        }
        DetectionKind::Json => source
            .json_pointer
            .as_deref()
            .is_some_and(|p| p.is_empty() || p.starts_with('/')),
    };

    if !ok {
        return Err(ConfigError::Validation(format!(
            "source '{}' has no usable rules for kind {:?}",
            source.name, source.kind
        )));
    }

    Ok(())
}

/// Validates a single TLD label
fn validate_tld(tld: &str) -> Result<(), ConfigError> {
    if tld.is_empty() {
        return Err(ConfigError::InvalidTld("TLD cannot be empty".to_string()));
    }

    if !tld
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ConfigError::InvalidTld(format!(
            "'{}' contains invalid characters",
            tld
        )));
    }

    if tld.starts_with('-') || tld.ends_with('-') {
        return Err(ConfigError::InvalidTld(format!(
            "'{}' cannot start or end with '-'",
            tld
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str) -> SourceEntry {
        SourceEntry {
            name: name.to_string(),
            url: format!("https://{}.example/whois/{{domain}}", name),
            weight: 10,
            kind: DetectionKind::Page,
            available_markers: vec!["no match".to_string()],
            taken_markers: vec!["registrar:".to_string()],
            available_status: vec![],
            taken_status: vec![],
            json_pointer: None,
        }
    }

    #[test]
    fn test_validate_tld() {
        assert!(validate_tld("io").is_ok());
        assert!(validate_tld("xn--p1ai").is_ok());

        assert!(validate_tld("").is_err());
        assert!(validate_tld("IO").is_err());
        assert!(validate_tld("co.uk").is_err());
        assert!(validate_tld("-io").is_err());
    }

    #[test]
    fn test_scan_lengths() {
        let mut scan = ScanConfig::default();
        assert!(validate_scan_config(&scan).is_ok());

        scan.max_length = 2;
        assert!(validate_scan_config(&scan).is_err());

        scan.max_length = 13;
        assert!(validate_scan_config(&scan).is_err());

        scan.max_length = 6;
        scan.tlds.push("io".to_string());
        assert!(matches!(
            validate_scan_config(&scan),
            Err(ConfigError::InvalidTld(_))
        ));
    }

    #[test]
    fn test_quorum_bounds() {
        let mut consensus = ConsensusConfig::default();
        assert!(validate_consensus_config(&consensus).is_ok());

        consensus.quorum = 6;
        assert!(validate_consensus_config(&consensus).is_err());

        consensus.quorum = 0;
        assert!(validate_consensus_config(&consensus).is_err());
    }

    #[test]
    fn test_health_bounds() {
        let mut health = HealthConfig::default();
        assert!(validate_health_config(&health).is_ok());

        health.primary_weight = 1.5;
        assert!(validate_health_config(&health).is_err());

        health.primary_weight = 0.3;
        health.base_backoff_ms = health.max_backoff_ms + 1;
        assert!(validate_health_config(&health).is_err());

        health.base_backoff_ms = 1_000;
        health.reference_domain = "localhost".to_string();
        assert!(validate_health_config(&health).is_err());
    }

    #[test]
    fn test_egress_bounds() {
        let mut egress = EgressConfig::default();
        assert!(validate_egress_config(&egress).is_ok());

        egress.low_water = egress.target_size + 1;
        assert!(validate_egress_config(&egress).is_err());

        egress.low_water = 5;
        egress.feeds.push("not a url".to_string());
        assert!(matches!(
            validate_egress_config(&egress),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_notify_bounds() {
        let mut notify = NotifyConfig::default();
        assert!(validate_notify_config(&notify).is_ok());

        notify.webhook_url = Some("discord webhook".to_string());
        assert!(matches!(
            validate_notify_config(&notify),
            Err(ConfigError::InvalidUrl(_))
        ));

        notify.webhook_url = Some("https://hooks.example/abc".to_string());
        notify.max_length = 0;
        assert!(validate_notify_config(&notify).is_err());
    }

    #[test]
    fn test_sources_need_quorum() {
        let consensus = ConsensusConfig::default();
        let two = vec![source("a"), source("b")];
        assert!(validate_sources(&two, &consensus).is_err());

        let three = vec![source("a"), source("b"), source("c")];
        assert!(validate_sources(&three, &consensus).is_ok());
    }

    #[test]
    fn test_source_rules() {
        let consensus = ConsensusConfig {
            quorum: 1,
            ..ConsensusConfig::default()
        };

        let dup = vec![source("a"), source("a")];
        assert!(validate_sources(&dup, &consensus).is_err());

        let mut no_placeholder = source("a");
        no_placeholder.url = "https://a.example/whois".to_string();
        assert!(validate_sources(&[no_placeholder], &consensus).is_err());

        let mut empty_status = source("a");
        empty_status.kind = DetectionKind::Status;
        assert!(validate_sources(&[empty_status], &consensus).is_err());

        let mut json = source("a");
        json.kind = DetectionKind::Json;
        json.json_pointer = Some("/available".to_string());
        assert!(validate_sources(&[json], &consensus).is_ok());
    }
}
