//! 跨会话持久化的用户偏好
//!
//! 目前只有一个开关：是否已看过「音频导出」操作说明。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub seen_audio_export_help: bool,
}

/// 偏好文件存储；读失败视为默认值（首次运行 / 文件损坏都不应阻断启动）
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Preferences {
        let Ok(data) = std::fs::read_to_string(&self.path) else {
            return Preferences::default();
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable preferences {:?}: {}", self.path, e);
            Preferences::default()
        })
    }

    pub fn save(&self, prefs: &Preferences) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(prefs)?)?;
        Ok(())
    }

    /// 标记说明已读并落盘；返回此前是否已读过
    pub fn mark_audio_help_seen(&self) -> anyhow::Result<bool> {
        let mut prefs = self.load();
        let seen = prefs.seen_audio_export_help;
        if !seen {
            prefs.seen_audio_export_help = true;
            self.save(&prefs)?;
        }
        Ok(seen)
    }

    /// 首次录制音频前调用：返回 true 表示应展示一次操作说明。
    /// 偏好写不进去时只记警告，说明照常展示。
    pub fn first_audio_export(&self) -> bool {
        match self.mark_audio_help_seen() {
            Ok(seen) => !seen,
            Err(e) => {
                tracing::warn!("Could not save preferences {:?}: {}", self.path, e);
                true
            }
        }
    }
}
