//! 图修复客户端
//!
//! 把渲染器的报错连同原图交回模型，要求返回一张能渲染的图。
//! 允许换图类型时，提示模型在语法难以修补的情况下改用结构更简单的图。

use async_trait::async_trait;

use crate::llm::{CompletionRequest, Turn};
use crate::persona::Persona;
use crate::rewrite::{strip_code_fences, RewriteError, RewriteService};

/// 一次修复请求
#[derive(Debug, Clone, Copy)]
pub struct CorrectionRequest<'a> {
    /// 话题：本轮对话最初的用户输入
    pub topic: &'a str,
    pub persona: Persona,
    pub faulty_source: &'a str,
    pub error_message: &'a str,
}

/// 修复客户端抽象：协调器只依赖这个 trait
#[async_trait]
pub trait DiagramCorrector: Send + Sync {
    /// 返回去掉围栏后的新图源码
    async fn correct(&self, request: &CorrectionRequest<'_>) -> Result<String, RewriteError>;
}

impl RewriteService {
    fn correction_instruction(&self, persona: Persona) -> String {
        let policy = if self.allow_type_substitution {
            "Either fix the syntax of the existing diagram, or, if the diagram is too broken to repair, \
             replace it with a different, structurally simpler Mermaid diagram type (for example a plain \
             flowchart) that still conveys the same ideas."
        } else {
            "Fix only the syntax of the existing diagram. Keep the same diagram type and the same content."
        };
        format!(
            "You are an expert in Mermaid.js syntax helping the {name} persona. \
             A Mermaid diagram you produced failed to render.\n{policy}\n\
             Respond with only the raw Mermaid source. Do not use code fences and do not add any explanation.",
            name = persona.name(),
        )
    }

    /// 请求一张修复后的图
    pub async fn correct_diagram(
        &self,
        topic: &str,
        persona: Persona,
        faulty_source: &str,
        error_message: &str,
    ) -> Result<String, RewriteError> {
        let prompt = format!(
            "Original topic:\n{topic}\n\nFaulty Mermaid diagram:\n{faulty_source}\n\nRenderer error:\n{error_message}"
        );
        let request = CompletionRequest {
            system_instruction: self.correction_instruction(persona),
            turns: vec![Turn::user(prompt)],
            contract: None,
        };

        let completion = self
            .llm()
            .complete(&request)
            .await
            .map_err(|e| RewriteError::Correction {
                persona,
                cause: e.to_string(),
            })?;

        let corrected = strip_code_fences(&completion.text);
        if corrected.is_empty() {
            return Err(RewriteError::Correction {
                persona,
                cause: "empty diagram returned".to_string(),
            });
        }
        Ok(corrected)
    }
}

#[async_trait]
impl DiagramCorrector for RewriteService {
    async fn correct(&self, request: &CorrectionRequest<'_>) -> Result<String, RewriteError> {
        self.correct_diagram(
            request.topic,
            request.persona,
            request.faulty_source,
            request.error_message,
        )
        .await
    }
}
