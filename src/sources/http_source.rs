//! Configuration-driven HTTP availability source
//!
//! Each `[[source]]` entry names a lookup URL and one of three detection
//! rules. Registration evidence is always checked first, so a page that
//! carries both kinds of marker reads as taken.

use crate::config::{DetectionKind, SourceEntry};
use crate::cursor::Candidate;
use crate::egress::EgressIdentity;
use crate::sources::fetcher::{random_user_agent, ClientCache};
use crate::sources::{Signal, Source, SourceError};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use scraper::Html;
use std::sync::Arc;

/// How a response is turned into a signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Lowercased phrases searched for in the page text
    Page {
        available: Vec<String>,
        taken: Vec<String>,
    },
    /// Status codes mapped directly to signals
    Status { available: Vec<u16>, taken: Vec<u16> },
    /// JSON pointer to a boolean "is available" flag
    Json { pointer: String },
}

impl Detection {
    pub fn from_entry(entry: &SourceEntry) -> Self {
        match entry.kind {
            DetectionKind::Page => Self::Page {
                available: lowercase_all(&entry.available_markers),
                taken: lowercase_all(&entry.taken_markers),
            },
            DetectionKind::Status => Self::Status {
                available: entry.available_status.clone(),
                taken: entry.taken_status.clone(),
            },
            DetectionKind::Json => Self::Json {
                pointer: entry.json_pointer.clone().unwrap_or_default(),
            },
        }
    }

    /// Whether `interpret` looks at the body at all
    fn needs_body(&self) -> bool {
        !matches!(self, Self::Status { .. })
    }

    /// Maps a response to a signal
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 429 | `RateLimited` |
    /// | Status rule matches | Negative / Positive |
    /// | Other non-2xx | `Unavailable` |
    /// | No marker, missing flag | `Unknown` |
    pub fn interpret(&self, status: u16, body: &str) -> Result<Signal, SourceError> {
        if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
            return Err(SourceError::RateLimited);
        }

        if let Self::Status { available, taken } = self {
            if taken.contains(&status) {
                return Ok(Signal::Negative);
            }
            if available.contains(&status) {
                return Ok(Signal::Positive);
            }
        }

        if !(200..300).contains(&status) {
            return Err(SourceError::Unavailable(format!("HTTP {}", status)));
        }

        match self {
            Self::Status { .. } => Ok(Signal::Unknown),
            Self::Page { available, taken } => {
                let text = visible_text(body).to_lowercase();
                if taken.iter().any(|m| text.contains(m.as_str())) {
                    Ok(Signal::Negative)
                } else if available.iter().any(|m| text.contains(m.as_str())) {
                    Ok(Signal::Positive)
                } else {
                    Ok(Signal::Unknown)
                }
            }
            Self::Json { pointer } => {
                // Block pages and captchas come back as HTML; that is inconclusive
                let Ok(document) = serde_json::from_str::<serde_json::Value>(body) else {
                    return Ok(Signal::Unknown);
                };
                match document.pointer(pointer).and_then(|v| v.as_bool()) {
                    Some(true) => Ok(Signal::Positive),
                    Some(false) => Ok(Signal::Negative),
                    None => Ok(Signal::Unknown),
                }
            }
        }
    }
}

/// A lookup page or API queried over HTTP
#[derive(Debug)]
pub struct HttpSource {
    name: String,
    url_template: String,
    weight: u32,
    detection: Detection,
    clients: Arc<ClientCache>,
}

impl HttpSource {
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        weight: u32,
        detection: Detection,
        clients: Arc<ClientCache>,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            weight,
            detection,
            clients,
        }
    }

    pub fn from_entry(entry: &SourceEntry, clients: Arc<ClientCache>) -> Self {
        Self::new(
            entry.name.clone(),
            entry.url.clone(),
            entry.weight,
            Detection::from_entry(entry),
            clients,
        )
    }

    /// Lookup URL for a candidate
    pub fn url_for(&self, candidate: &Candidate) -> String {
        self.url_template.replace("{domain}", &candidate.domain())
    }
}

#[async_trait]
impl Source for HttpSource {
    fn id(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> u32 {
        self.weight
    }

    async fn check(
        &self,
        candidate: &Candidate,
        egress: Option<&EgressIdentity>,
    ) -> Result<Signal, SourceError> {
        let client = self
            .clients
            .client_for(egress)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let url = self.url_for(candidate);
        let mut request = client.get(&url);
        if let Some(agent) = random_user_agent(self.clients.http_config()) {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();

        let body = if self.detection.needs_body() {
            response.text().await.map_err(classify_error)?
        } else {
            String::new()
        };

        let signal = self.detection.interpret(status, &body);
        tracing::trace!("{} says {:?} for {} (HTTP {})", self.name, signal, candidate, status);
        signal
    }
}

/// Extracts the text content of an HTML document
fn visible_text(body: &str) -> String {
    let document = Html::parse_document(body);
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

fn lowercase_all(markers: &[String]) -> Vec<String> {
    markers.iter().map(|m| m.to_lowercase()).collect()
}

fn classify_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else if e.is_connect() {
        SourceError::Unavailable("connection failed".to_string())
    } else {
        SourceError::Unavailable(e.to_string())
    }
}
