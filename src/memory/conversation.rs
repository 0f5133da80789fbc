//! 短期记忆：单个人格的对话线程
//!
//! 每个人格各自持有一条有序、只追加的消息序列。唯一允许的原地修改是
//! 图修复协调器按消息 id 回写 model 消息的 diagram_source；
//! 以及回合失败时整体截断回回合开始前的长度。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 「图永久失败」哨兵值：写入后该消息的图不再渲染、不再修复
pub const FAILED_DIAGRAM: &str = "/* ERROR */";

/// 消息角色（与生成 API 的 user / model 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    /// user 消息为原始输入，model 消息为改写后的文本
    pub rewrite: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_source: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            rewrite: text.into(),
            diagram_source: None,
        }
    }

    pub fn model(rewrite: impl Into<String>, diagram_source: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Model,
            rewrite: rewrite.into(),
            diagram_source,
        }
    }

    /// 图是否已被标记为永久失败
    pub fn diagram_failed(&self) -> bool {
        self.diagram_source.as_deref() == Some(FAILED_DIAGRAM)
    }
}

/// 回写 diagram_source 被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("message {0} not found")]
    NotFound(Uuid),
    #[error("message {0} is not a model message")]
    NotModel(Uuid),
    #[error("diagram of message {0} is permanently failed")]
    Terminal(Uuid),
}

/// 单个人格的对话历史
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) -> Uuid {
        let id = msg.id;
        self.messages.push(msg);
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// 最近一条 model 消息（UI 展示 / 导出用）
    pub fn last_model(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Model)
    }

    /// 按 id 回写图源码；哨兵值一旦写入即不可再改
    pub fn patch_diagram(&mut self, id: Uuid, source: impl Into<String>) -> Result<(), PatchError> {
        let msg = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(PatchError::NotFound(id))?;
        if msg.role != Role::Model {
            return Err(PatchError::NotModel(id));
        }
        if msg.diagram_failed() {
            return Err(PatchError::Terminal(id));
        }
        msg.diagram_source = Some(source.into());
        Ok(())
    }

    /// 标记图永久失败；已失败时为幂等操作
    pub fn mark_diagram_failed(&mut self, id: Uuid) -> Result<(), PatchError> {
        match self.patch_diagram(id, FAILED_DIAGRAM) {
            Err(PatchError::Terminal(_)) => Ok(()),
            other => other,
        }
    }

    /// 截断回指定长度（回合回滚）
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_model_message() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hello"));
        let id = conv.push(Message::model("hi", Some("graph TD; A-->B".into())));
        conv.patch_diagram(id, "graph LR; A-->B").unwrap();
        assert_eq!(conv.get(id).unwrap().diagram_source.as_deref(), Some("graph LR; A-->B"));
    }

    #[test]
    fn test_patch_user_message_rejected() {
        let mut conv = Conversation::new();
        let id = conv.push(Message::user("hello"));
        assert_eq!(conv.patch_diagram(id, "x"), Err(PatchError::NotModel(id)));
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut conv = Conversation::new();
        let id = conv.push(Message::model("hi", Some("bad".into())));
        conv.mark_diagram_failed(id).unwrap();
        assert!(conv.get(id).unwrap().diagram_failed());
        assert_eq!(conv.patch_diagram(id, "graph TD"), Err(PatchError::Terminal(id)));
        // 再次标记保持幂等
        assert!(conv.mark_diagram_failed(id).is_ok());
    }

    #[test]
    fn test_patch_unknown_id() {
        let mut conv = Conversation::new();
        let id = Uuid::new_v4();
        assert_eq!(conv.patch_diagram(id, "x"), Err(PatchError::NotFound(id)));
    }

    #[test]
    fn test_truncate_and_last_model() {
        let mut conv = Conversation::new();
        conv.push(Message::user("a"));
        conv.push(Message::model("b", None));
        conv.push(Message::user("c"));
        assert_eq!(conv.last_model().unwrap().rewrite, "b");
        conv.truncate(1);
        assert_eq!(conv.len(), 1);
        assert!(conv.last_model().is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Model).unwrap();
        assert_eq!(json, "\"model\"");
    }
}
