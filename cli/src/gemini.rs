use anyhow::{Context, Result};
use tracing::{debug, error};

use thryve_core::recognition::{AttemptError, InferenceRequest, VisionTransport};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Error bodies can be long HTML pages; keep enough to diagnose.
const MAX_ERROR_BODY: usize = 512;

pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
}

impl GeminiClient {
    /// The per-attempt timeout is enforced by the recognition pipeline, so the
    /// client itself only bounds connection setup.
    pub fn new(model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "thryve-cli/{} (nutrition tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            model: model.to_string(),
        })
    }

    fn build_url(&self, api_key: &str) -> String {
        format!(
            "{API_BASE_URL}/models/{}:generateContent?key={api_key}",
            self.model
        )
    }
}

impl VisionTransport for GeminiClient {
    async fn generate(&self, request: &InferenceRequest) -> Result<String, AttemptError> {
        let url = self.build_url(&request.api_key);
        debug!(model = %self.model, "Sending request to Gemini API");

        // `without_url` keeps the key out of error messages and logs.
        let response = self
            .client
            .post(&url)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| AttemptError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Network(e.without_url().to_string()))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thryve_core::recognition::{RecognitionConfig, Recognizer};

    #[test]
    fn test_build_url() {
        let client = GeminiClient::new(DEFAULT_MODEL).unwrap();
        assert_eq!(
            client.build_url("abc"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent?key=abc"
        );
    }

    // --- Integration tests (hit the real Gemini API) ---

    #[tokio::test]
    #[ignore = "hits Gemini API, needs GEMINI_API_KEY and THRYVE_TEST_IMAGE"]
    async fn test_recognize_real_image() {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap();
        let image = std::fs::read(std::env::var("THRYVE_TEST_IMAGE").unwrap()).unwrap();
        let recognizer = Recognizer::new(
            GeminiClient::new(DEFAULT_MODEL).unwrap(),
            RecognitionConfig {
                api_key: Some(api_key),
                ..RecognitionConfig::default()
            },
        );
        let food = recognizer.recognize(&image).await.unwrap();
        assert!(!food.name.is_empty());
        assert!(food.calories >= 0.0);
    }

    #[tokio::test]
    #[ignore = "hits Gemini API"]
    async fn test_bad_key_is_status_error() {
        let client = GeminiClient::new(DEFAULT_MODEL).unwrap();
        let request = InferenceRequest {
            api_key: "invalid".to_string(),
            body: thryve_core::gemini::GenerateRequest::for_image(String::new(), "image/jpeg"),
        };
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, AttemptError::Status { .. }));
    }
}
