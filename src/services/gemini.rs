use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

use crate::{
    config::UpstreamConfig,
    models::{AnalysisRequest, AnalysisResult, GenerateContentRequest, GenerateContentResponse},
    services::extractor::{extract_result, ExtractionError},
};

/// Display output never includes the request URL, which carries the API key.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(reqwest::Error),

    #[error("upstream returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("upstream unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Waits between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct GeminiClient {
    client: Client,
    config: UpstreamConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        Self::with_sleeper(config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(config: UpstreamConfig, sleeper: Arc<dyn Sleeper>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            sleeper,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base, self.config.model
        )
    }

    /// Sends the prompt and image to the model and extracts the JSON result
    /// from its completion.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, UpstreamError> {
        let body = GenerateContentRequest::new(&request.prompt, Some(request.image.as_str()));
        let response = self.generate(&body).await?;

        let text = response.primary_text().ok_or_else(|| {
            UpstreamError::InvalidResponse(match response.finish_reason() {
                Some(reason) => format!("completion has no text part (finish reason: {})", reason),
                None => "completion has no text part".to_string(),
            })
        })?;

        let result = extract_result(text)?;
        tracing::info!(
            model = %self.config.model,
            has_watermelon = ?result.has_watermelon(),
            count = ?result.count(),
            "Analysis completed"
        );
        Ok(result)
    }

    /// POSTs to `generateContent`, retrying only on HTTP 503 with exponential
    /// backoff: `initial_delay * 2^attempt`.
    pub async fn generate(
        &self,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, UpstreamError> {
        let url = self.endpoint();
        let mut attempt: u32 = 0;

        loop {
            tracing::debug!(model = %self.config.model, attempt, "Sending request to Gemini API");

            let response = self
                .client
                .post(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .json(body)
                .send()
                .await
                .map_err(|e| UpstreamError::Request(e.without_url()))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<GenerateContentResponse>()
                    .await
                    .map_err(|e| UpstreamError::InvalidResponse(e.without_url().to_string()));
            }

            if status != StatusCode::SERVICE_UNAVAILABLE {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = status.as_u16(), "Gemini API returned an error");
                return Err(UpstreamError::Status {
                    code: status.as_u16(),
                    body,
                });
            }

            if attempt >= self.config.max_retries {
                return Err(UpstreamError::Unavailable {
                    attempts: attempt + 1,
                });
            }

            let delay = self.config.initial_delay * 2u32.saturating_pow(attempt);
            tracing::warn!(
                "Gemini API overloaded, retry {}/{} after {:?}",
                attempt + 1,
                self.config.max_retries,
                delay
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/models/test-model:generateContent";

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn client_for(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> GeminiClient {
        let config = UpstreamConfig {
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            api_base: server.uri(),
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(5),
        };
        GeminiClient::with_sleeper(config, sleeper).unwrap()
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            image: "aGVsbG8=".to_string(),
            prompt: "Count the watermelons".to_string(),
            device_id: None,
        }
    }

    fn completion(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        }))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [
                    {"text": "Count the watermelons"},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "aGVsbG8="}}
                ]}]
            })))
            .respond_with(completion(
                "{\"has_watermelon\":true,\"count\":1,\"watermelons\":[{}]}",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server, sleeper.clone())
            .analyze(&request())
            .await
            .unwrap();
        assert_eq!(result.count(), Some(1));
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retries_503_with_exponential_backoff() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(completion(
                "Result: {\"has_watermelon\":true,\"count\":2,\"watermelons\":[{},{}]}",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server, sleeper.clone())
            .analyze(&request())
            .await
            .unwrap();
        assert_eq!(result.has_watermelon(), Some(true));
        assert_eq!(result.count(), Some(2));
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let err = client_for(&server, sleeper.clone())
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable { attempts: 4 }));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_other_errors() {
        let server = MockServer::start().await;
        let sleeper = Arc::new(RecordingSleeper::default());

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, sleeper.clone())
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { code: 500, .. }));
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_without_json() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(completion("I cannot help with that."))
            .mount(&server)
            .await;

        let err = client_for(&server, Arc::new(RecordingSleeper::default()))
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Extraction(ExtractionError::NoJson { .. })));
    }

    #[tokio::test]
    async fn test_blocked_completion_reports_finish_reason() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, Arc::new(RecordingSleeper::default()))
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("finish reason: SAFETY"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        let config = UpstreamConfig {
            api_key: "SUPER-SECRET-KEY".to_string(),
            model: "test-model".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            max_retries: 0,
            initial_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        let client =
            GeminiClient::with_sleeper(config, Arc::new(RecordingSleeper::default())).unwrap();

        let err = client.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Request(_)));
        assert!(!err.to_string().contains("SUPER-SECRET-KEY"));
        assert!(!format!("{:?}", err).contains("SUPER-SECRET-KEY"));
    }

    #[tokio::test]
    async fn test_undecodable_body_hides_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server, Arc::new(RecordingSleeper::default()))
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
        assert!(!err.to_string().contains("test-key"));
    }

    #[tokio::test]
    async fn test_response_without_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client_for(&server, Arc::new(RecordingSleeper::default()))
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
    }
}
