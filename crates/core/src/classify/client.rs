//! HTTP client for the external classification service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Classifier;
use crate::config::ClassifierConfig;
use crate::metrics;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    category_path: Option<String>,
    category_name: Option<String>,
}

/// Classification backend talking to the internal classifier API.
pub struct HttpClassifier {
    client: Client,
    config: ClassifierConfig,
}

impl HttpClassifier {
    /// Create a new classifier client with the configured timeout.
    pub fn new(config: ClassifierConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn classify_url(&self) -> String {
        format!("{}/classify", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, title: &str, description: &str) -> Option<String> {
        let start = Instant::now();
        let result = self
            .client
            .post(self.classify_url())
            .header("X-API-Key", &self.config.api_key)
            .json(&ClassifyRequest { title, description })
            .send()
            .await;

        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["classifier", "classify"])
            .observe(start.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(code = response.status().as_u16(), "Classifier rejected item");
                metrics::EXTERNAL_SERVICE_REQUESTS
                    .with_label_values(&["classifier", "classify", "error"])
                    .inc();
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Classifier request failed");
                metrics::EXTERNAL_SERVICE_REQUESTS
                    .with_label_values(&["classifier", "classify", "error"])
                    .inc();
                return None;
            }
        };

        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["classifier", "classify", "success"])
            .inc();

        let body: ClassifyResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "Classifier response decode failed");
                return None;
            }
        };

        // Prefer the full path, fall back to the bare name.
        body.category_path
            .filter(|c| !c.is_empty())
            .or(body.category_name.filter(|c| !c.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> ClassifierConfig {
        ClassifierConfig {
            url,
            api_key: "test-key".to_string(),
            workers: 2,
            timeout_secs: 2,
            snippet_max_chars: 900,
        }
    }

    #[tokio::test]
    async fn test_classify_returns_category_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .and(header("X-API-Key", "test-key"))
            .and(body_partial_json(serde_json::json!({"title": "Widget"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "category_path": "tools/hand-tools",
                "category_name": "hand tools"
            })))
            .mount(&server)
            .await;

        let classifier = HttpClassifier::new(test_config(server.uri()));
        let category = classifier.classify("Widget", "A fine widget").await;
        assert_eq!(category.as_deref(), Some("tools/hand-tools"));
    }

    #[tokio::test]
    async fn test_classify_falls_back_to_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "category_name": "hand tools"
            })))
            .mount(&server)
            .await;

        let classifier = HttpClassifier::new(test_config(server.uri()));
        let category = classifier.classify("Widget", "").await;
        assert_eq!(category.as_deref(), Some("hand tools"));
    }

    #[tokio::test]
    async fn test_classify_non_2xx_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let classifier = HttpClassifier::new(test_config(server.uri()));
        assert!(classifier.classify("Widget", "").await.is_none());
    }

    #[tokio::test]
    async fn test_classify_unreachable_is_empty() {
        // Port 1 refuses connections.
        let classifier = HttpClassifier::new(test_config("http://127.0.0.1:1".to_string()));
        assert!(classifier.classify("Widget", "").await.is_none());
    }
}
