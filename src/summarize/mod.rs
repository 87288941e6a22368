//! Summarization client
//!
//! Formats extracted document text into a fixed legal-summary prompt and
//! issues exactly one synchronous chat-completions request to the hosted
//! model. There is no retry, no chunking, and no token-length guard: a
//! document that exceeds the model's context window fails with a
//! summarization error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::DocumentLoader;

/// Environment variable the API credential is read from.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default OpenAI-compatible endpoint of the hosted model.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default model identifier.
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default timeout for the model call (in seconds).
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Build the fixed instruction prompt for one document.
pub fn build_prompt(document_content: &str) -> String {
    format!(
        "You are an expert legal assistant. Summarize the following document \
         concisely and professionally. Identify the key parties, main legal \
         issues, and any important clauses or deadlines.\n\
         The document content is as follows:\n\"{}\"",
        document_content
    )
}

/// Anything that can turn document text into a summary.
///
/// The HTTP handler is generic over this seam so tests can count calls with
/// a stub instead of reaching the network.
#[allow(async_fn_in_trait)]
pub trait Summarizer {
    async fn summarize(&self, document_content: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for the hosted model API.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    /// API key for authentication.
    api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    base_url: String,
    /// Model identifier sent with every request.
    model: String,
    /// HTTP client with configured timeout.
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for SummaryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryClient {
    /// Create a client, reading the API key from `GEMINI_API_KEY` if set.
    pub fn new() -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Self::with_api_key_option(api_key)
    }

    /// Create a client with a specific API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    fn with_api_key_option(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client for the summarization API. This indicates a critical system configuration issue (TLS/SSL failure).");

        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Override the endpoint base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether an API credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Masked key for display and logs.
    pub fn api_key_masked(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| {
            if k.len() > 8 {
                format!("{}...", &k[..8])
            } else {
                format!("{}...", k)
            }
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Summarizer for SummaryClient {
    /// Issue one summarization request. No retry: any transport, auth, or
    /// model failure is surfaced to the caller as-is.
    async fn summarize(&self, document_content: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(Error::MissingCredential)?;

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            // Deterministic decoding: repeated calls with identical input
            // tend toward identical output.
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(document_content),
            }],
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::info!(
            model = %self.model,
            document_chars = document_content.len(),
            "requesting summary"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Summarization("request timed out".to_string())
                } else {
                    Error::Summarization(format!("network error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Summarization(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Summarization(format!("failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Summarization("model returned no content".to_string()))
    }
}

/// Run the full upload-and-summarize pipeline for one document.
///
/// Extraction failures abort before any model call is attempted.
pub async fn summarize_document<S: Summarizer>(
    loader: &DocumentLoader,
    summarizer: &S,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    let document_content = loader.load(filename, bytes)?;
    summarizer.summarize(&document_content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub summarizer that counts calls.
    struct CountingStub {
        calls: AtomicUsize,
    }

    impl CountingStub {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Summarizer for CountingStub {
        async fn summarize(&self, _document_content: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("stub summary".to_string())
        }
    }

    #[test]
    fn test_prompt_contains_instruction_and_document() {
        let prompt = build_prompt("THE PARTIES AGREE...");
        assert!(prompt.contains("expert legal assistant"));
        assert!(prompt.contains("key parties"));
        assert!(prompt.contains("clauses or deadlines"));
        assert!(prompt.contains("THE PARTIES AGREE..."));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_network_call() {
        // Unroutable base URL: if the client tried the network the error
        // would be a network error, not MissingCredential.
        let client = SummaryClient::with_api_key_option(None)
            .with_base_url("http://127.0.0.1:1/nowhere");
        let err = client.summarize("document").await.unwrap_err();
        assert!(matches!(err, Error::MissingCredential));
    }

    #[test]
    fn test_api_key_masked() {
        let client = SummaryClient::with_api_key_option(None).with_api_key("AIzaSyExampleKey123");
        assert_eq!(client.api_key_masked().unwrap(), "AIzaSyEx...");

        let client = SummaryClient::with_api_key_option(None);
        assert!(client.api_key_masked().is_none());
        assert!(!client.is_configured());
    }

    #[test]
    fn test_empty_key_counts_as_missing() {
        let client = SummaryClient::with_api_key_option(None).with_api_key("");
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_unsupported_format_aborts_before_model_call() {
        let loader = DocumentLoader::new();
        let stub = CountingStub::new();

        let err = summarize_document(&loader, &stub, "data.csv", b"a,b,c")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_decode_error_aborts_before_model_call() {
        let loader = DocumentLoader::new();
        let stub = CountingStub::new();

        let err = summarize_document(&loader, &stub, "bad.txt", &[0xff, 0xfe])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_summarizes_extracted_text() {
        let loader = DocumentLoader::new();
        let stub = CountingStub::new();

        let summary = summarize_document(&loader, &stub, "contract.txt", b"Hello, World")
            .await
            .unwrap();
        assert_eq!(summary, "stub summary");
        assert_eq!(stub.call_count(), 1);
    }
}
