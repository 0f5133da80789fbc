//! 错误恢复引擎
//!
//! 根据 DuetError 类型返回 RecoveryAction，前端据此决定重发、提示后继续还是退出。

use crate::clipboard::ClipboardError;
use crate::core::{DuetError, RecoveryAction};
use crate::rewrite::RewriteError;
use crate::speech::SpeechError;

/// 将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &DuetError) -> RecoveryAction {
        match err {
            DuetError::Config(msg) => RecoveryAction::Abort(msg.clone()),
            DuetError::Rewrite(RewriteError::Config(msg)) => RecoveryAction::Abort(msg.clone()),
            DuetError::Rewrite(e) => RecoveryAction::RetryTurn(format!(
                "{e} Nothing was saved; send the text again to retry."
            )),
            DuetError::EmptyInput => {
                RecoveryAction::ShowAndContinue("Type some text to rewrite first.".to_string())
            }
            DuetError::Export(msg) => RecoveryAction::ShowAndContinue(format!("Export failed: {msg}")),
            DuetError::Speech(SpeechError::PermissionDenied(_)) => RecoveryAction::ShowAndContinue(
                "Speech output is not permitted on this system.".to_string(),
            ),
            DuetError::Speech(SpeechError::Interrupted) => {
                RecoveryAction::ShowAndContinue("Speech stopped.".to_string())
            }
            DuetError::Speech(e) => RecoveryAction::ShowAndContinue(e.to_string()),
            DuetError::Clipboard(ClipboardError::PermissionDenied(_)) => RecoveryAction::ShowAndContinue(
                "Clipboard access is not permitted here.".to_string(),
            ),
            DuetError::Clipboard(ClipboardError::Empty) => {
                RecoveryAction::ShowAndContinue("Clipboard has no text to paste.".to_string())
            }
            DuetError::Clipboard(e) => RecoveryAction::ShowAndContinue(e.to_string()),
        }
    }
}
