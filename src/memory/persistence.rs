//! 对话持久化
//!
//! 将某个人格的对话线程写入 / 从 JSON 文件加载，用于导出会话或跨进程恢复（可选使用）。

use std::path::Path;

use crate::memory::Conversation;

/// 简单的文件持久化：单文件 JSON，整条线程（含消息 id 与图源码）
#[derive(Debug)]
pub struct ConversationPersistence {
    path: std::path::PathBuf,
}

impl ConversationPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 从 JSON 文件加载对话；文件不存在时返回空对话
    pub fn load(&self) -> anyhow::Result<Conversation> {
        if !self.path.exists() {
            return Ok(Conversation::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 将对话写入 JSON 文件；父目录不存在时自动创建
    pub fn save(&self, conversation: &Conversation) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(conversation)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p = ConversationPersistence::new(dir.path().join("none.json"));
        assert!(p.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_ids_and_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let p = ConversationPersistence::new(dir.path().join("nested/mia.json"));
        let mut conv = Conversation::new();
        conv.push(Message::user("topic"));
        let id = conv.push(Message::model("reply", Some("graph TD".into())));
        conv.mark_diagram_failed(id).unwrap();
        p.save(&conv).unwrap();

        let loaded = p.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.get(id).unwrap().diagram_failed());
    }
}
