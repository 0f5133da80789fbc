//! 改写服务：生成客户端（改写 + 图）与图修复客户端
//!
//! 两者共用同一个 LlmClient：
//! - generate：人格系统指令 + 历史 + 新输入，要求返回 `rewrite` / `mermaidDiagram` 两个字段
//! - correct_diagram：给出话题、人格、出错的图与渲染错误，要求返回可渲染的新图

pub mod corrector;
pub mod fence;
pub mod generator;

use std::sync::Arc;

use thiserror::Error;

use crate::llm::{LlmClient, LlmError};
use crate::persona::Persona;

pub use corrector::{CorrectionRequest, DiagramCorrector};
pub use fence::strip_code_fences;
pub use generator::{RewritePayload, RewriteResult};

/// 改写 / 修复调用的错误
#[derive(Error, Debug)]
pub enum RewriteError {
    /// 缺少 API Key 等配置问题，对任何生成调用都是致命的
    #[error("{0}")]
    Config(String),

    /// 生成失败：cause 为面向用户的原因（有结束原因时带上，否则为通用提示）
    #[error("{cause}")]
    Generation { persona: Persona, cause: String },

    /// 修复失败（调用方按「修复失败」处理）
    #[error("diagram correction for {persona} failed: {cause}")]
    Correction { persona: Persona, cause: String },
}

impl RewriteError {
    /// 把底层 LLM 错误转换为生成错误
    pub(crate) fn from_generation(persona: Persona, err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey(var) => {
                RewriteError::Config(format!("API key is not configured (set {}).", var))
            }
            other => {
                let cause = match other.finish_reason() {
                    Some(reason) => format!(
                        "The {} persona stopped without a response (finish reason: {}).",
                        persona, reason
                    ),
                    None => format!("Failed to get a response from the {} persona.", persona),
                };
                tracing::error!("Error generating response for persona {}: {}", persona, other);
                RewriteError::Generation { persona, cause }
            }
        }
    }

    pub fn persona(&self) -> Option<Persona> {
        match self {
            RewriteError::Generation { persona, .. } | RewriteError::Correction { persona, .. } => {
                Some(*persona)
            }
            RewriteError::Config(_) => None,
        }
    }
}

/// 改写服务：持有 LLM 客户端与修复策略
pub struct RewriteService {
    llm: Arc<dyn LlmClient>,
    /// 修复时是否允许改用更简单的其它图类型
    allow_type_substitution: bool,
}

impl RewriteService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            allow_type_substitution: true,
        }
    }

    pub fn with_type_substitution(mut self, allowed: bool) -> Self {
        self.allow_type_substitution = allowed;
        self
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_becomes_config_error() {
        let err = RewriteError::from_generation(Persona::Mia, LlmError::MissingApiKey("GEMINI_API_KEY"));
        assert!(matches!(err, RewriteError::Config(ref m) if m.contains("GEMINI_API_KEY")));
        assert_eq!(err.persona(), None);
    }

    #[test]
    fn test_finish_reason_in_cause() {
        let err = RewriteError::from_generation(Persona::Miette, LlmError::NoContent("SAFETY".into()));
        assert!(err.to_string().contains("SAFETY"));
        assert_eq!(err.persona(), Some(Persona::Miette));
    }

    #[test]
    fn test_generic_cause() {
        let err = RewriteError::from_generation(Persona::Mia, LlmError::Transport("reset".into()));
        assert_eq!(err.to_string(), "Failed to get a response from the Mia persona.");
    }
}
