//! LLM 客户端抽象
//!
//! 所有后端（Gemini / OpenAI 兼容 / Mock）实现 LlmClient：给定系统指令 + 多轮内容，返回一次完整回复。
//! 需要结构化输出时由 ResponseContract 描述必填字段，各后端按自己的方式落实（Gemini 用 responseSchema，
//! OpenAI 兼容端点用提示词约束）。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Role;

/// 发送给模型的一轮内容（model 轮已序列化为文本）
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// JSON 输出约定：全部为必填字符串字段
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseContract {
    /// (字段名, 字段说明)
    pub fields: Vec<(String, String)>,
}

impl ResponseContract {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.fields.push((name.into(), description.into()));
        self
    }

    /// 标准 JSON Schema（OpenAI 兼容端点的提示词里使用）
    pub fn json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, desc)| {
                (
                    name.clone(),
                    serde_json::json!({ "type": "string", "description": desc }),
                )
            })
            .collect();
        let required: Vec<&str> = self.fields.iter().map(|(n, _)| n.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl Default for ResponseContract {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次补全请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub turns: Vec<Turn>,
    /// None 表示自由文本输出
    pub contract: Option<ResponseContract>,
}

/// 一次补全结果
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// 后端给出的结束原因（如 STOP / SAFETY / MAX_TOKENS）
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: Some("STOP".to_string()),
        }
    }
}

/// LLM 调用错误
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key is not configured ({0})")]
    MissingApiKey(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// 模型没有给出文本（被拦截、截断等），携带结束原因
    #[error("no content returned (finish reason: {0})")]
    NoContent(String),

    #[error("empty response")]
    EmptyResponse,
}

impl LlmError {
    /// 最能说明问题的结束原因（若有）
    pub fn finish_reason(&self) -> Option<&str> {
        match self {
            LlmError::NoContent(reason) => Some(reason),
            _ => None,
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_schema_lists_required_fields() {
        let contract = ResponseContract::new()
            .field("rewrite", "text")
            .field("mermaidDiagram", "diagram");
        let schema = contract.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["rewrite", "mermaidDiagram"]));
        assert_eq!(schema["properties"]["rewrite"]["type"], "string");
    }

    #[test]
    fn test_finish_reason_only_for_no_content() {
        assert_eq!(LlmError::NoContent("SAFETY".into()).finish_reason(), Some("SAFETY"));
        assert_eq!(LlmError::EmptyResponse.finish_reason(), None);
    }
}
