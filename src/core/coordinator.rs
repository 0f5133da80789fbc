//! 图修复协调器：渲染 → 修复 → 回写 → 重渲染
//!
//! 对单个 (人格, 消息) 严格顺序执行，修复次数受 max_corrections 约束；
//! 达到上限或修复失败时写入哨兵值，之后该消息不再渲染、不再修复。
//! 任何失败都只体现在 DiagramOutcome 与对话里的哨兵值上，不向上返回错误。

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::state::{DiagramEvent, DiagramOutcome, DiagramState, FailureResolution, PersonaThread};
use crate::diagram::{DiagramRenderer, DiagramTheme, RenderError};
use crate::memory::FAILED_DIAGRAM;
use crate::rewrite::{strip_code_fences, CorrectionRequest, DiagramCorrector};

pub const DEFAULT_MAX_CORRECTIONS: u32 = 2;

pub struct DiagramCoordinator {
    renderer: Arc<dyn DiagramRenderer>,
    corrector: Arc<dyn DiagramCorrector>,
    max_corrections: u32,
    events: Option<mpsc::UnboundedSender<DiagramEvent>>,
}

impl DiagramCoordinator {
    pub fn new(renderer: Arc<dyn DiagramRenderer>, corrector: Arc<dyn DiagramCorrector>) -> Self {
        Self {
            renderer,
            corrector,
            max_corrections: DEFAULT_MAX_CORRECTIONS,
            events: None,
        }
    }

    pub fn with_max_corrections(mut self, max: u32) -> Self {
        self.max_corrections = max;
        self
    }

    /// 订阅状态迁移事件
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<DiagramEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn max_corrections(&self) -> u32 {
        self.max_corrections
    }

    pub fn renderer(&self) -> &Arc<dyn DiagramRenderer> {
        &self.renderer
    }

    fn emit(&self, thread: &PersonaThread, message_id: Uuid, state: DiagramState, detail: Option<String>) {
        tracing::debug!(persona = %thread.persona, %message_id, ?state, "diagram state");
        if let Some(tx) = &self.events {
            let _ = tx.send(DiagramEvent {
                persona: thread.persona,
                message_id,
                state,
                detail,
            });
        }
    }

    /// 渲染指定消息的图，失败时在修复预算内循环修复，直到渲染成功或永久失败
    pub async fn settle(&self, topic: &str, thread: &mut PersonaThread, message_id: Uuid) -> DiagramOutcome {
        let theme = DiagramTheme::for_persona(thread.persona);
        let mut corrections = 0;

        loop {
            let source = match thread.conversation.get(message_id) {
                Some(msg) => msg.diagram_source.clone(),
                None => return DiagramOutcome::NoDiagram,
            };
            let source = match source {
                Some(s) if s == FAILED_DIAGRAM => {
                    return DiagramOutcome::PermanentlyFailed {
                        reason: "diagram already marked as failed".to_string(),
                    }
                }
                Some(s) if !s.trim().is_empty() => s,
                _ => return DiagramOutcome::NoDiagram,
            };

            let err = match self.renderer.render(&source, &theme) {
                Ok(artifact) => {
                    self.emit(thread, message_id, DiagramState::Rendered, None);
                    return DiagramOutcome::Rendered { artifact, corrections };
                }
                Err(e) => e,
            };
            self.emit(thread, message_id, DiagramState::RenderFailed, Some(err.message.clone()));

            match self.handle_render_failure(topic, thread, message_id, &err).await {
                FailureResolution::Corrected => corrections += 1,
                FailureResolution::PermanentlyFailed { reason } => {
                    return DiagramOutcome::PermanentlyFailed { reason }
                }
            }
        }
    }

    /// 处理一次渲染失败：预算内请求修复并回写，否则写入哨兵值
    pub async fn handle_render_failure(
        &self,
        topic: &str,
        thread: &mut PersonaThread,
        message_id: Uuid,
        error: &RenderError,
    ) -> FailureResolution {
        let faulty = match thread.conversation.get(message_id) {
            Some(msg) if !msg.diagram_failed() => msg.diagram_source.clone().unwrap_or_default(),
            Some(_) => {
                return FailureResolution::PermanentlyFailed {
                    reason: "diagram already marked as failed".to_string(),
                }
            }
            None => {
                return FailureResolution::PermanentlyFailed {
                    reason: format!("message {} not found", message_id),
                }
            }
        };

        if thread.retries >= self.max_corrections {
            let reason = format!(
                "correction limit of {} reached; last render error: {}",
                self.max_corrections, error.message
            );
            return self.fail(thread, message_id, reason);
        }

        thread.retries += 1;
        self.emit(
            thread,
            message_id,
            DiagramState::Correcting,
            Some(format!("attempt {}/{}", thread.retries, self.max_corrections)),
        );

        let request = CorrectionRequest {
            topic,
            persona: thread.persona,
            faulty_source: &faulty,
            error_message: &error.message,
        };
        let corrected = match self.corrector.correct(&request).await {
            Ok(src) => strip_code_fences(&src),
            Err(e) => return self.fail(thread, message_id, e.to_string()),
        };
        // 空修复不能把图悄悄变成「无图」
        if corrected.is_empty() {
            return self.fail(thread, message_id, "correction returned an empty diagram".to_string());
        }

        match thread.conversation.patch_diagram(message_id, corrected) {
            Ok(()) => {
                self.emit(thread, message_id, DiagramState::Corrected, None);
                FailureResolution::Corrected
            }
            Err(e) => self.fail(thread, message_id, e.to_string()),
        }
    }

    fn fail(&self, thread: &mut PersonaThread, message_id: Uuid, reason: String) -> FailureResolution {
        tracing::warn!(
            persona = %thread.persona,
            %message_id,
            retries = thread.retries,
            "Diagram permanently failed: {}",
            reason
        );
        let reason = match thread.conversation.mark_diagram_failed(message_id) {
            Ok(()) => reason,
            Err(e) => {
                tracing::warn!(persona = %thread.persona, %message_id, "Could not mark diagram as failed: {}", e);
                format!("{reason} (failure marker not written: {e})")
            }
        };
        self.emit(thread, message_id, DiagramState::PermanentlyFailed, Some(reason.clone()));
        FailureResolution::PermanentlyFailed { reason }
    }
}
