//! LLM 层：客户端抽象与实现（Gemini / OpenAI 兼容 / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use gemini::{GeminiClient, GEMINI_FLASH};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{Completion, CompletionRequest, LlmClient, LlmError, ResponseContract, Turn};

use crate::config::AppConfig;

/// 按配置创建 LLM 客户端：provider = gemini / openai / mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let llm = &cfg.llm;
    let client: Arc<dyn LlmClient> = match llm.provider.to_lowercase().as_str() {
        "openai" => Arc::new(OpenAiClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            llm.api_key.as_deref(),
        )?),
        "mock" => Arc::new(MockLlmClient::new()),
        _ => Arc::new(GeminiClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            llm.api_key.as_deref(),
            llm.timeouts.request,
        )?),
    };
    tracing::info!("Using LLM backend: {} ({})", client.name(), llm.model);
    Ok(client)
}
