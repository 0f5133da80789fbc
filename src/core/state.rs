//! 状态定义：单个人格的对话线程与图修复状态机
//!
//! 每个 (人格, 消息) 的图经过 Rendered / RenderFailed / Correcting / Corrected / PermanentlyFailed，
//! 协调器把每次迁移以 DiagramEvent 投影给前端。

use serde::Serialize;
use uuid::Uuid;

use crate::diagram::RenderedDiagram;
use crate::memory::Conversation;
use crate::persona::Persona;

/// 图修复状态机的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagramState {
    Rendered,
    RenderFailed,
    Correcting,
    Corrected,
    PermanentlyFailed,
}

/// 一次 settle 的最终结果；渲染失败从不作为错误向上抛出
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagramOutcome {
    Rendered {
        artifact: RenderedDiagram,
        /// 本次 settle 中成功回写的修复次数
        corrections: u32,
    },
    PermanentlyFailed { reason: String },
    /// 消息不存在或没有图
    NoDiagram,
}

impl DiagramOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, DiagramOutcome::Rendered { .. })
    }
}

/// 渲染失败后的处理结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureResolution {
    /// 修复后的源码已回写，调用方应重新渲染
    Corrected,
    /// 已写入哨兵值（写不进去时 reason 里会注明）
    PermanentlyFailed { reason: String },
}

/// 单个人格的对话与修复计数；两个人格的线程互不共享，可以同时 &mut
#[derive(Clone, Debug)]
pub struct PersonaThread {
    pub persona: Persona,
    pub conversation: Conversation,
    /// 当前话题内已发起的修复次数
    pub retries: u32,
}

impl PersonaThread {
    pub fn new(persona: Persona) -> Self {
        Self {
            persona,
            conversation: Conversation::new(),
            retries: 0,
        }
    }

    pub fn reset(&mut self) {
        self.conversation.clear();
        self.retries = 0;
    }
}

/// 状态迁移事件（前端可订阅）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagramEvent {
    pub persona: Persona,
    pub message_id: Uuid,
    pub state: DiagramState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
