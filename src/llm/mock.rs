//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 可预先排入脚本化的回复；脚本耗尽后回显最后一条 user 内容：
//! 有 JSON 约定时按约定字段回显，否则回显一张最小的 Mermaid 图。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError};
use crate::memory::Role;

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前等待，便于测试并发
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 追加一条成功回复
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(Ok(Completion::new(text)))
    }

    /// 追加一条错误
    pub fn push_error(&self, err: LlmError) -> &Self {
        self.push(Err(err))
    }

    fn push(&self, item: Result<Completion, LlmError>) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
        self
    }

    /// 已收到的请求数
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 已收到请求的快照
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn echo(request: &CompletionRequest) -> Completion {
        let last_user = request
            .turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .unwrap_or("(no input)");
        let diagram = "graph TD\n  A[Input] --> B[Echo]";

        match &request.contract {
            Some(contract) => {
                let obj: serde_json::Map<String, serde_json::Value> = contract
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, (name, _))| {
                        let value = if i == 0 {
                            format!("Echo from Mock: {}", last_user)
                        } else {
                            diagram.to_string()
                        };
                        (name.clone(), serde_json::Value::String(value))
                    })
                    .collect();
                Completion::new(serde_json::Value::Object(obj).to_string())
            }
            None => Completion::new(diagram),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(Self::echo(request)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ResponseContract, Turn};

    fn req(contract: Option<ResponseContract>) -> CompletionRequest {
        CompletionRequest {
            system_instruction: "s".into(),
            turns: vec![Turn::user("ping")],
            contract,
        }
    }

    #[tokio::test]
    async fn test_script_then_echo() {
        let mock = MockLlmClient::new();
        mock.push_text("first").push_error(LlmError::EmptyResponse);

        assert_eq!(mock.complete(&req(None)).await.unwrap().text, "first");
        assert!(mock.complete(&req(None)).await.is_err());
        assert!(mock.complete(&req(None)).await.unwrap().text.starts_with("graph TD"));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_echo_follows_contract() {
        let mock = MockLlmClient::new();
        let contract = ResponseContract::new().field("rewrite", "").field("mermaidDiagram", "");
        let out = mock.complete(&req(Some(contract))).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(v["rewrite"], "Echo from Mock: ping");
        assert!(v["mermaidDiagram"].as_str().unwrap().starts_with("graph TD"));
    }
}
