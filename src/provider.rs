use async_trait::async_trait;
use futures::stream::{self, BoxStream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::GenerationError;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    // provider default when None
    pub model: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.8,
            max_output_tokens: 3000,
            model: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Text fragments in the order the model produced them.
pub type TextStream = BoxStream<'static, Result<String, GenerationError>>;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    // Backends without native streaming hand back the whole text as one fragment
    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<TextStream, GenerationError> {
        let text = self.generate(request).await?;
        Ok(Box::pin(stream::once(async move {
            Ok::<_, GenerationError>(text)
        })))
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        // streams outlive any total deadline, so the client only bounds connect and idle reads
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(
        &self,
        url: String,
        request: &GenerationRequest,
        deadline: Option<Duration>,
    ) -> Result<reqwest::Response, GenerationError> {
        let mut builder = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GeminiRequest::from(request));
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline);
        }
        let res = builder.send().await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res)
    }

    fn model_for<'a>(&'a self, request: &'a GenerationRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let model = self.model_for(&request);
        debug!(model = %model, temperature = request.temperature, "calling gemini");

        let res = self
            .post(self.url(model, "generateContent"), &request, Some(self.timeout))
            .await?;
        let parsed: GeminiResponse = res.json().await?;
        parsed.into_text()
    }

    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<TextStream, GenerationError> {
        let model = self.model_for(&request);
        debug!(model = %model, temperature = request.temperature, "streaming from gemini");

        let url = format!("{}?alt=sse", self.url(model, "streamGenerateContent"));
        let res = self.post(url, &request, None).await?;
        let byte_stream = res.bytes_stream();

        let stream = stream::unfold(
            (byte_stream, String::new()),
            |(mut byte_stream, mut buffer)| async move {
                loop {
                    if let Some(end) = buffer.find('\n') {
                        let line: String = buffer.drain(..=end).collect();
                        match parse_sse_line(&line) {
                            Some(Ok(text)) if text.is_empty() => continue,
                            Some(item) => return Some((item, (byte_stream, buffer))),
                            None => continue,
                        }
                    }

                    match byte_stream.try_next().await {
                        Ok(Some(bytes)) => buffer.push_str(&String::from_utf8_lossy(&bytes)),
                        Ok(None) => {
                            // flush a final event that was not newline-terminated
                            let rest = std::mem::take(&mut buffer);
                            return match parse_sse_line(&rest) {
                                Some(Ok(text)) if text.is_empty() => None,
                                Some(item) => Some((item, (byte_stream, buffer))),
                                None => None,
                            };
                        }
                        Err(err) => return Some((Err(err.into()), (byte_stream, buffer))),
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

// One `data:` line of the SSE body; other SSE fields and blank lines yield None
fn parse_sse_line(line: &str) -> Option<Result<String, GenerationError>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    let chunk: GeminiResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            return Some(Err(GenerationError::InvalidResponse(format!(
                "bad stream chunk: {err}"
            ))));
        }
    };
    Some(Ok(chunk.into_fragment()))
}

// Gemini API request format
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl From<&GenerationRequest> for GeminiRequest {
    fn from(req: &GenerationRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: req.prompt.clone(),
                }],
            }],
            system_instruction: req.system.as_ref().map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system.clone(),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: req.temperature,
                max_output_tokens: req.max_output_tokens,
            },
        }
    }
}

// Gemini API response format
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    finish_reason: Option<String>,
}

impl GeminiResponse {
    // Stream chunks may carry no text (e.g. the final usage-only chunk)
    fn into_fragment(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .map(|candidate| candidate.content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default()
    }

    fn into_text(self) -> Result<String, GenerationError> {
        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            GenerationError::InvalidResponse("no candidates in response".to_string())
        })?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(GenerationError::InvalidResponse(format!(
                "empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}
