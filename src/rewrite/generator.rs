//! 生成客户端：一次调用同时拿到改写文本与图源码

use serde::{Deserialize, Serialize};

use crate::llm::{CompletionRequest, ResponseContract, Turn};
use crate::memory::{Message, Role};
use crate::persona::Persona;
use crate::rewrite::{strip_code_fences, RewriteError, RewriteService};

/// 生成调用的结果；图源码已去掉围栏
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteResult {
    pub rewrite: String,
    pub diagram_source: String,
}

impl RewriteResult {
    pub fn is_empty(&self) -> bool {
        self.rewrite.is_empty() && self.diagram_source.is_empty()
    }
}

/// 模型侧的 JSON 输出格式；历史中的 model 轮也按此格式回放
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewritePayload {
    pub rewrite: String,
    #[serde(rename = "mermaidDiagram")]
    pub mermaid_diagram: String,
}

/// 两字段输出约定
pub fn rewrite_contract() -> ResponseContract {
    ResponseContract::new()
        .field("rewrite", "The rewritten text in the persona's voice (Markdown allowed).")
        .field(
            "mermaidDiagram",
            "Raw Mermaid diagram source visualising the rewrite, without code fences.",
        )
}

/// 历史消息 -> 模型轮次：model 消息重新序列化为 JSON，保持与输出约定一致
pub fn history_turns(history: &[Message]) -> Vec<Turn> {
    history
        .iter()
        .map(|m| match m.role {
            Role::User => Turn::user(m.rewrite.clone()),
            Role::Model => {
                let diagram = if m.diagram_failed() {
                    String::new()
                } else {
                    m.diagram_source.clone().unwrap_or_default()
                };
                let payload = RewritePayload {
                    rewrite: m.rewrite.clone(),
                    mermaid_diagram: diagram,
                };
                Turn::model(serde_json::to_string(&payload).unwrap_or_else(|_| m.rewrite.clone()))
            }
        })
        .collect()
}

/// 解析模型输出；两个字段缺一即失败，不接受部分结果
pub fn parse_payload(persona: Persona, text: &str) -> Result<RewriteResult, RewriteError> {
    let json = strip_code_fences(text);
    let payload: RewritePayload = serde_json::from_str(&json).map_err(|e| {
        tracing::error!("Malformed {} response: {}", persona, e);
        RewriteError::Generation {
            persona,
            cause: format!("Failed to get a response from the {} persona.", persona),
        }
    })?;
    Ok(RewriteResult {
        rewrite: payload.rewrite.trim().to_string(),
        diagram_source: strip_code_fences(&payload.mermaid_diagram),
    })
}

impl RewriteService {
    /// 以指定人格改写 text；history 为本轮之前的对话（不含本轮 user 消息）
    ///
    /// 输入去空白后为空时直接返回空结果，不发起网络调用。
    pub async fn generate(
        &self,
        history: &[Message],
        text: &str,
        persona: Persona,
    ) -> Result<RewriteResult, RewriteError> {
        if text.trim().is_empty() {
            return Ok(RewriteResult::default());
        }

        let mut turns = history_turns(history);
        turns.push(Turn::user(text));
        let request = CompletionRequest {
            system_instruction: persona.system_instruction(),
            turns,
            contract: Some(rewrite_contract()),
        };

        let completion = self
            .llm()
            .complete(&request)
            .await
            .map_err(|e| RewriteError::from_generation(persona, e))?;
        parse_payload(persona, &completion.text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let mock = Arc::new(MockLlmClient::new());
        let service = RewriteService::new(mock.clone());
        let out = service.generate(&[], "   \n\t", Persona::Mia).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_strips_fences() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_text(r#"{"rewrite":" Structured. ","mermaidDiagram":"```mermaid\ngraph TD\nA-->B\n```"}"#);
        let service = RewriteService::new(mock.clone());
        let out = service.generate(&[], "hello", Persona::Mia).await.unwrap();
        assert_eq!(out.rewrite, "Structured.");
        assert_eq!(out.diagram_source, "graph TD\nA-->B");

        let req = &mock.requests()[0];
        assert!(req.system_instruction.contains("You are Mia"));
        assert_eq!(req.turns, vec![Turn::user("hello")]);
        assert!(req.contract.is_some());
    }

    #[tokio::test]
    async fn test_missing_field_fails_whole_call() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_text(r#"{"rewrite":"only text"}"#);
        let service = RewriteService::new(mock);
        let err = service.generate(&[], "hello", Persona::Miette).await.unwrap_err();
        assert!(matches!(err, RewriteError::Generation { persona: Persona::Miette, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_is_typed() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Api { status: 500, message: "boom".into() });
        let service = RewriteService::new(mock);
        let err = service.generate(&[], "hello", Persona::Mia).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to get a response from the Mia persona.");
    }

    #[test]
    fn test_history_model_turn_is_json() {
        let history = vec![
            Message::user("topic"),
            Message::model("reply", Some("graph TD".into())),
        ];
        let turns = history_turns(&history);
        assert_eq!(turns[0], Turn::user("topic"));
        assert_eq!(turns[1].role, Role::Model);
        let v: serde_json::Value = serde_json::from_str(&turns[1].text).unwrap();
        assert_eq!(v["rewrite"], "reply");
        assert_eq!(v["mermaidDiagram"], "graph TD");
    }

    #[test]
    fn test_history_hides_failed_sentinel() {
        let mut m = Message::model("reply", None);
        m.diagram_source = Some(crate::memory::FAILED_DIAGRAM.to_string());
        let turns = history_turns(&[m]);
        let v: serde_json::Value = serde_json::from_str(&turns[0].text).unwrap();
        assert_eq!(v["mermaidDiagram"], "");
    }
}
