use serde::Deserialize;
use std::time::Duration;

/// TLDs scanned when the configuration does not list its own, highest value first
pub const DEFAULT_TLDS: &[&str] = &[
    "io", "ai", "me", "co", "to", "so", "sh", "gg", "fm", "am", "is", "it", "tv", "cc", "ws",
    "com", "net", "org", "app", "dev", "xyz", "pro", "biz", "top", "fun", "art", "bot",
];

/// Main configuration structure for Domain Hunter
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Keyspace and scan loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Shortest label length enumerated
    pub min_length: u32,

    /// Longest label length enumerated before wrapping back to `min_length`
    pub max_length: u32,

    /// Lengths up to and including this one use letters only
    pub letters_only_max_length: u32,

    /// TLDs in priority order
    pub tlds: Vec<String>,

    /// Skip candidates whose name already resolves in DNS
    pub dns_prefilter: bool,

    /// DNS lookup timeout for the pre-filter (milliseconds)
    pub dns_timeout_ms: u64,

    /// Persist the cursor after this many processed candidates
    pub checkpoint_every: u64,

    /// Emit a progress line after this many processed candidates
    pub progress_every: u64,

    /// Random pause between candidates (milliseconds, inclusive range)
    pub candidate_delay_min_ms: u64,
    pub candidate_delay_max_ms: u64,

    /// Pause after recording a find (milliseconds)
    pub find_cooldown_ms: u64,

    /// Finds inside `burst-window-secs` that trigger re-verification
    pub burst_threshold: usize,
    pub burst_window_secs: u64,

    /// Wait before re-classifying a suspicious find (milliseconds)
    pub burst_cooldown_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 6,
            letters_only_max_length: 3,
            tlds: DEFAULT_TLDS.iter().map(|t| t.to_string()).collect(),
            dns_prefilter: true,
            dns_timeout_ms: 3_000,
            checkpoint_every: 1,
            progress_every: 50,
            candidate_delay_min_ms: 200,
            candidate_delay_max_ms: 500,
            find_cooldown_ms: 3_000,
            burst_threshold: 2,
            burst_window_secs: 60,
            burst_cooldown_ms: 10_000,
        }
    }
}

impl ScanConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn find_cooldown(&self) -> Duration {
        Duration::from_millis(self.find_cooldown_ms)
    }

    pub fn burst_window(&self) -> Duration {
        Duration::from_secs(self.burst_window_secs)
    }

    pub fn burst_cooldown(&self) -> Duration {
        Duration::from_millis(self.burst_cooldown_ms)
    }
}

/// Consensus round configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConsensusConfig {
    /// Number of sources queried concurrently per round
    pub batch_size: usize,

    /// Positive signals required to declare a domain available
    pub quorum: usize,

    /// Fewer eligible sources than this is reported as a shortage
    pub min_eligible_sources: usize,

    /// Timeout for a single source query (milliseconds)
    pub query_timeout_ms: u64,

    /// Deadline for a whole round (milliseconds)
    pub round_deadline_ms: u64,

    /// Issue one confirmatory query before accepting an available verdict
    pub confirm_available: bool,

    /// Any confirmation other than Positive (including a failed query) means taken
    pub strict_confirmation: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            quorum: 3,
            min_eligible_sources: 3,
            query_timeout_ms: 10_000,
            round_deadline_ms: 20_000,
            confirm_available: true,
            strict_confirmation: false,
        }
    }
}

impl ConsensusConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn round_deadline(&self) -> Duration {
        Duration::from_millis(self.round_deadline_ms)
    }
}

/// Per (source, egress) health and backoff configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HealthConfig {
    /// Consecutive failures before a pair enters backoff
    pub failure_threshold: u32,

    /// First backoff window (milliseconds)
    pub base_backoff_ms: u64,

    /// Upper bound for a backoff window (milliseconds)
    pub max_backoff_ms: u64,

    /// Failures charged for an explicit rate-limit response
    pub rate_limit_penalty: u32,

    /// Minimum time between requests on one (source, egress) pair (milliseconds)
    pub min_spacing_ms: u64,

    /// Probability that a query uses the primary egress
    pub primary_weight: f64,

    /// Consecutive failures of one rotated egress before it is reported bad
    pub egress_failure_limit: u32,

    /// How often sources in backoff are re-probed (seconds)
    pub recovery_interval_secs: u64,

    /// How often elapsed backoff windows are decayed (seconds)
    pub decay_interval_secs: u64,

    /// A domain known to be registered, used for recovery probes
    pub reference_domain: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_backoff_ms: 5_000,
            max_backoff_ms: 300_000,
            rate_limit_penalty: 3,
            min_spacing_ms: 1_500,
            primary_weight: 0.3,
            egress_failure_limit: 3,
            recovery_interval_secs: 60,
            decay_interval_secs: 10,
            reference_domain: "google.com".to_string(),
        }
    }
}

impl HealthConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }

    pub fn decay_interval(&self) -> Duration {
        Duration::from_secs(self.decay_interval_secs)
    }
}

/// Egress identity (proxy) pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EgressConfig {
    /// Number of validated identities the pool aims to hold
    pub target_size: usize,

    /// Discovery runs only when the pool holds fewer identities than this
    pub low_water: usize,

    /// Minimum time between discovery feed fetches (seconds)
    pub discovery_interval_secs: u64,

    /// Period of the validation cycle (seconds)
    pub validation_interval_secs: u64,

    /// Admitted identities older than this are re-probed (seconds)
    pub revalidate_after_secs: u64,

    /// Low-cost endpoint fetched through a proxy to prove reachability
    pub probe_url: String,

    /// Reachability probe timeout (milliseconds)
    pub probe_timeout_ms: u64,

    /// Probes running at once
    pub probe_concurrency: usize,

    /// Untested addresses probed per cycle
    pub max_probe_batch: usize,

    /// Discovery feed URLs returning `ip:port` lists
    pub feeds: Vec<String>,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            target_size: 30,
            low_water: 10,
            discovery_interval_secs: 300,
            validation_interval_secs: 30,
            revalidate_after_secs: 300,
            probe_url: "http://httpbin.org/ip".to_string(),
            probe_timeout_ms: 5_000,
            probe_concurrency: 20,
            max_probe_batch: 50,
            feeds: Vec::new(),
        }
    }
}

impl EgressConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn validation_interval(&self) -> Duration {
        Duration::from_secs(self.validation_interval_secs)
    }

    pub fn revalidate_after(&self) -> Duration {
        Duration::from_secs(self.revalidate_after_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Outgoing HTTP configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// User agents picked at random per request
    pub user_agents: Vec<String>,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
            connect_timeout_ms: 5_000,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the JSON scan checkpoint
    pub checkpoint_path: String,

    /// Path to the JSON list of found domains
    pub found_path: String,
}

/// Notifications sent when a domain is found
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NotifyConfig {
    /// Webhook receiving a JSON `{"content": ...}` message per find
    pub webhook_url: Option<String>,

    /// Only finds this short or shorter are announced
    pub max_length: u32,

    /// Webhook request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_length: 4,
            timeout_ms: 10_000,
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How a source's HTTP response is turned into a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionKind {
    /// Search the page text for availability and registration markers
    Page,
    /// Map HTTP status codes to signals
    Status,
    /// Read a boolean "is available" flag from a JSON document
    Json,
}

/// One availability source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceEntry {
    /// Unique source name
    pub name: String,

    /// Request URL; `{domain}` is replaced by the candidate
    pub url: String,

    /// Relative selection weight
    #[serde(default = "default_source_weight")]
    pub weight: u32,

    pub kind: DetectionKind,

    /// `page`: phrases meaning "no registration found"
    #[serde(default)]
    pub available_markers: Vec<String>,

    /// `page`: phrases meaning "registration found"
    #[serde(default)]
    pub taken_markers: Vec<String>,

    /// `status`: status codes meaning "no registration found"
    #[serde(default)]
    pub available_status: Vec<u16>,

    /// `status`: status codes meaning "registration found"
    #[serde(default)]
    pub taken_status: Vec<u16>,

    /// `json`: JSON pointer to a boolean availability flag
    #[serde(default)]
    pub json_pointer: Option<String>,
}

fn default_source_weight() -> u32 {
    10
}
