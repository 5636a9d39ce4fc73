//! HTTP client for the external visual-validation service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::{ValidatorError, VisualValidator};
use crate::config::ValidatorConfig;
use crate::metrics;
use crate::registry::ValidationOutcome;

/// Health probes use a short fixed timeout regardless of the per-item one.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Validation backend talking to the visual validator API.
pub struct HttpValidator {
    client: Client,
    config: ValidatorConfig,
}

impl HttpValidator {
    /// Create a new validator client with the configured timeout.
    pub fn new(config: ValidatorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn map_error(e: reqwest::Error) -> ValidatorError {
        if e.is_timeout() {
            ValidatorError::Timeout
        } else if e.is_connect() {
            ValidatorError::ConnectionFailed(e.to_string())
        } else {
            ValidatorError::ApiError(e.to_string())
        }
    }
}

#[async_trait]
impl VisualValidator for HttpValidator {
    async fn health(&self) -> Result<(), ValidatorError> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .header("X-API-Key", &self.config.api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_error)?;

        if !response.status().is_success() {
            return Err(ValidatorError::ApiError(format!(
                "health check returned HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn verify(
        &self,
        image: Vec<u8>,
        title: &str,
        category: &str,
    ) -> Result<ValidationOutcome, ValidatorError> {
        let form = Form::new()
            .text("title", title.to_string())
            .text("category", category.to_string())
            .part(
                "file",
                Part::bytes(image)
                    .file_name("img.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| ValidatorError::ApiError(e.to_string()))?,
            );

        let start = Instant::now();
        let result = self
            .client
            .post(self.endpoint("verify"))
            .header("X-API-Key", &self.config.api_key)
            .multipart(form)
            .send()
            .await;

        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["validator", "verify"])
            .observe(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            metrics::EXTERNAL_SERVICE_REQUESTS
                .with_label_values(&["validator", "verify", "error"])
                .inc();
            Self::map_error(e)
        })?;

        if !response.status().is_success() {
            metrics::EXTERNAL_SERVICE_REQUESTS
                .with_label_values(&["validator", "verify", "error"])
                .inc();
            debug!(code = response.status().as_u16(), "Validator rejected request");
            return Err(ValidatorError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["validator", "verify", "success"])
            .inc();

        response
            .json::<ValidationOutcome>()
            .await
            .map_err(|e| ValidatorError::ApiError(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> ValidatorConfig {
        ValidatorConfig {
            url,
            api_key: "test-key".to_string(),
            workers: 2,
            timeout_secs: 2,
            flush_every: 100,
        }
    }

    fn outcome_json() -> serde_json::Value {
        serde_json::json!({
            "is_valid": true,
            "confidence": 0.93,
            "detections": {
                "category_match": 0.9,
                "product_match": 0.95,
                "watermark_text": 0.02,
                "placeholder_or_error": 0.01,
                "low_quality": 0.05
            }
        })
    }

    #[tokio::test]
    async fn test_health_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header("X-API-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let validator = HttpValidator::new(test_config(server.uri()));
        assert!(validator.health().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let validator = HttpValidator::new(test_config(server.uri()));
        let result = validator.health().await;
        assert!(matches!(result, Err(ValidatorError::ApiError(_))));
    }

    #[tokio::test]
    async fn test_health_unreachable_is_connection_error() {
        let validator = HttpValidator::new(test_config("http://127.0.0.1:1".to_string()));
        let result = validator.health().await;
        assert!(matches!(result, Err(ValidatorError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_verify_parses_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(outcome_json()))
            .mount(&server)
            .await;

        let validator = HttpValidator::new(test_config(server.uri()));
        let outcome = validator
            .verify(b"jpeg".to_vec(), "Hammer", "tools")
            .await
            .unwrap();

        assert!(outcome.is_valid);
        assert!((outcome.confidence - 0.93).abs() < f64::EPSILON);
        assert!((outcome.detections.product_match - 0.95).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_verify_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let validator = HttpValidator::new(test_config(server.uri()));
        let result = validator.verify(b"jpeg".to_vec(), "Hammer", "tools").await;
        assert!(matches!(result, Err(ValidatorError::ApiError(_))));
    }
}
