//! Gemini REST 客户端
//!
//! 直接调用 `models/{model}:generateContent`：systemInstruction + contents（user / model 交替），
//! 需要结构化输出时设置 responseMimeType = application/json 与 responseSchema。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError, ResponseContract};
use crate::memory::Role;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_FLASH: &str = "gemini-2.5-flash";

// -- 请求体 ------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub system_instruction: GeminiContent,
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

// -- 响应体 ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GeminiResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponseContent {
    #[serde(default)]
    pub parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiErrorBody {
    pub error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GeminiErrorDetail {
    pub message: String,
}

/// Gemini 的 schema 使用 OpenAPI 子集，类型名为大写
pub fn gemini_schema(contract: &ResponseContract) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = contract
        .fields
        .iter()
        .map(|(name, desc)| {
            (
                name.clone(),
                serde_json::json!({ "type": "STRING", "description": desc }),
            )
        })
        .collect();
    let required: Vec<&str> = contract.fields.iter().map(|(n, _)| n.as_str()).collect();
    serde_json::json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

/// CompletionRequest -> Gemini 请求体
pub fn build_request(request: &CompletionRequest) -> GeminiRequest {
    let contents = request
        .turns
        .iter()
        .map(|t| GeminiContent {
            role: Some(
                match t.role {
                    Role::User => "user",
                    Role::Model => "model",
                }
                .to_string(),
            ),
            parts: vec![GeminiPart {
                text: t.text.clone(),
            }],
        })
        .collect();

    GeminiRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: request.system_instruction.clone(),
            }],
        },
        contents,
        generation_config: request.contract.as_ref().map(|c| GeminiGenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: gemini_schema(c),
        }),
    }
}

/// 从响应中取首个候选的文本；没有文本时带上结束原因 / 拦截原因
pub fn extract_completion(response: GeminiResponse) -> Result<Completion, LlmError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(LlmError::NoContent(reason)),
            None => Err(LlmError::EmptyResponse),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) => Err(LlmError::NoContent(reason)),
            None => Err(LlmError::EmptyResponse),
        };
    }

    Ok(Completion {
        text,
        finish_reason: candidate.finish_reason,
    })
}

/// Gemini 客户端：持有 reqwest Client、API Key、模型名与 base_url
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// api_key 缺省时依次读取 GEMINI_API_KEY / API_KEY
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey("GEMINI_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: base_url.unwrap_or(GEMINI_BASE_URL).trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = build_request(request);
        tracing::debug!(model = %self.model, turns = body.contents.len(), "gemini generateContent");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response
                .text()
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))?;
            let message = serde_json::from_str::<GeminiErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or(raw);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        extract_completion(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
