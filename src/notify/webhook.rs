use super::{Notifier, NotifyError};
use crate::config::{HttpConfig, NotifyConfig};
use crate::sources::build_http_client;
use crate::storage::FoundRecord;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;

/// Posts a chat-style `{"content": ...}` message to a webhook
#[derive(Debug)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    max_length: u32,
}

impl WebhookNotifier {
    pub fn new(url: &str, config: &NotifyConfig, http: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(http, None, config.timeout())?,
            url: url.to_string(),
            max_length: config.max_length,
        })
    }

    /// Builds a notifier if the configuration names a webhook
    pub fn from_config(config: &NotifyConfig, http: &HttpConfig) -> Result<Option<Self>, reqwest::Error> {
        config
            .webhook_url
            .as_deref()
            .map(|url| Self::new(url, config, http))
            .transpose()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, record: &FoundRecord) -> Result<(), NotifyError> {
        if record.length > self.max_length {
            tracing::trace!("Not announcing {}, longer than {}", record.domain, self.max_length);
            return Ok(());
        }

        let message = json!({
            "content": format!("Found available domain: **{}**", record.domain),
        });

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&message)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::debug!("Announced {}", record.domain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(domain: &str, length: u32) -> FoundRecord {
        FoundRecord {
            domain: domain.to_string(),
            length,
            found_at: Utc::now(),
        }
    }

    fn notifier(server: &MockServer, max_length: u32) -> WebhookNotifier {
        let config = NotifyConfig {
            webhook_url: Some(format!("{}/hook", server.uri())),
            max_length,
            ..NotifyConfig::default()
        };
        WebhookNotifier::from_config(&config, &HttpConfig::default())
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_posts_message_for_short_find() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"content": "Found available domain: **xq.io**"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server, 4).notify(&record("xq.io", 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_finds_longer_than_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        notifier(&server, 3).notify(&record("abcde.io", 5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = notifier(&server, 4).notify(&record("xq.io", 2)).await;
        assert!(matches!(result, Err(NotifyError::Status(500))));
    }

    #[test]
    fn test_no_webhook_means_no_notifier() {
        let notifier = WebhookNotifier::from_config(&NotifyConfig::default(), &HttpConfig::default()).unwrap();
        assert!(notifier.is_none());
    }
}
