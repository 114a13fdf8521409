//! Language-model moment detection.
//!
//! A [`MomentDetector`] turns one transcript chunk into raw moment lines
//! (`HH:MM:SS.mmm --> HH:MM:SS.mmm`). Lines are returned unparsed; the
//! pipeline validates them with `mclip_models::collect_moments`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DetectorConfig, TranscriptWindow};
use crate::error::{WorkerError, WorkerResult};

/// One transcript chunk to analyse.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest {
    /// Position of the chunk in the transcript (0-indexed)
    pub index: usize,
    /// Number of chunks in the transcript
    pub total: usize,
    pub text: String,
    pub window: TranscriptWindow,
}

/// Something that proposes important moments for a transcript chunk.
#[async_trait]
pub trait MomentDetector: Send + Sync {
    async fn detect(&self, request: &ChunkRequest) -> WorkerResult<Vec<String>>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct ChatCompletionsDetector {
    config: DetectorConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsDetector {
    pub fn new(config: DetectorConfig) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Prompt asking for moments between half and all of `max_moment_secs`.
pub fn build_prompt(request: &ChunkRequest, max_moment_secs: u32) -> String {
    let from = request
        .window
        .start
        .as_deref()
        .unwrap_or("the beginning of the video");
    let to = request.window.end.as_deref().unwrap_or("the end of the video");

    format!(
        "Analyze the following video transcript chunk and identify the most important moments.\n\
         Provide only the timestamps in the format 'HH:MM:SS.mmm --> HH:MM:SS.mmm' for moments \
         between {min} and {max} seconds long, and within the time range from {from} to {to}.\n\
         The important moments should capture coherent and meaningful segments of the conversation.\n\
         \n\
         Example:\n\
         Transcript chunk: [Transcript text...]\n\
         Important moments:\n\
         01:30:00.000 --> 01:32:15.000\n\
         01:45:00.000 --> 01:47:30.000\n\
         \n\
         Transcript chunk:\n\
         {chunk}\n\
         Important moments:\n",
        min = max_moment_secs / 2,
        max = max_moment_secs,
        from = from,
        to = to,
        chunk = request.text,
    )
}

/// Trimmed, non-empty lines of a model reply.
pub fn split_reply(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl MomentDetector for ChatCompletionsDetector {
    async fn detect(&self, request: &ChunkRequest) -> WorkerResult<Vec<String>> {
        let prompt = build_prompt(request, self.config.max_moment_secs);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            stream: false,
        };

        debug!(
            chunk = request.index,
            total = request.total,
            words = request.text.split_whitespace().count(),
            model = %self.config.model,
            "Requesting moments"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkerError::detection_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::detection_failed(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::detection_failed(format!("invalid response: {}", e)))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| WorkerError::detection_failed("No content in response"))?;

        Ok(split_reply(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChunkRequest {
        ChunkRequest {
            index: 0,
            total: 1,
            text: "we talked about rust".to_string(),
            window: TranscriptWindow::new(Some("00:01:00.000".into()), None).unwrap(),
        }
    }

    fn detector_for(server: &MockServer) -> ChatCompletionsDetector {
        let mut config = DetectorConfig::new("test-key");
        config.base_url = format!("{}/", server.uri());
        ChatCompletionsDetector::new(config).unwrap()
    }

    #[test]
    fn test_prompt_mentions_bounds_and_window() {
        let prompt = build_prompt(&request(), 180);
        assert!(prompt.contains("between 90 and 180 seconds long"));
        assert!(prompt.contains("from 00:01:00.000 to the end of the video"));
        assert!(prompt.contains("we talked about rust"));
    }

    #[test]
    fn test_split_reply() {
        let lines = split_reply("  00:00:01.000 --> 00:01:40.000 \n\n\tsecond\n");
        assert_eq!(lines, vec!["00:00:01.000 --> 00:01:40.000", "second"]);
    }

    #[tokio::test]
    async fn test_detect_returns_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "temperature": 0.5,
                "max_tokens": 1024,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "Important moments:\n00:01:00.000 --> 00:02:30.000\n"
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let lines = detector_for(&server).detect(&request()).await.unwrap();
        assert_eq!(lines, vec!["Important moments:", "00:01:00.000 --> 00:02:30.000"]);
    }

    #[tokio::test]
    async fn test_http_error_is_detection_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = detector_for(&server).detect(&request()).await.unwrap_err();
        assert!(matches!(err, WorkerError::DetectionFailed(ref msg) if msg.contains("500")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_choices_is_detection_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = detector_for(&server).detect(&request()).await.unwrap_err();
        assert!(matches!(err, WorkerError::DetectionFailed(_)));
    }
}
