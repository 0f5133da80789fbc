//! 回合级错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 DuetError 决定 RetryTurn / ShowAndContinue / Abort。

use thiserror::Error;

use crate::clipboard::ClipboardError;
use crate::rewrite::RewriteError;
use crate::speech::SpeechError;

/// 前端能看到的错误（配置、生成、导出、语音、剪贴板）
#[derive(Error, Debug)]
pub enum DuetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input is empty")]
    EmptyInput,

    /// 生成失败：两个人格的历史都已回滚
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

impl DuetError {
    /// 生成层的配置错误单独提出来，便于恢复引擎直接终止
    pub fn from_rewrite(err: RewriteError) -> Self {
        match err {
            RewriteError::Config(msg) => DuetError::Config(msg),
            other => DuetError::Rewrite(other),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 历史已回滚，提示用户后可原样重发
    RetryTurn(String),
    /// 临时提示（权限、导出），对话不受影响
    ShowAndContinue(String),
    /// 无法继续（如缺少 API Key）
    Abort(String),
}
