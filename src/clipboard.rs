//! 剪贴板：复制某个人格的改写、把剪贴板文本作为输入
//!
//! 系统剪贴板走 arboard；权限 / 不可用等错误只作为临时提示，不影响对话。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("Clipboard access was denied: {0}")]
    PermissionDenied(String),

    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Clipboard has no text")]
    Empty,
}

impl From<arboard::Error> for ClipboardError {
    fn from(err: arboard::Error) -> Self {
        match err {
            arboard::Error::ContentNotAvailable => ClipboardError::Empty,
            arboard::Error::Unknown { description } => {
                let lower = description.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
                    ClipboardError::PermissionDenied(description)
                } else {
                    ClipboardError::Unavailable(description)
                }
            }
            other => ClipboardError::Unavailable(other.to_string()),
        }
    }
}

pub trait ClipboardProvider {
    fn get_text(&mut self) -> Result<String, ClipboardError>;

    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// 系统剪贴板；首次使用时才连接，之后保持连接
/// （X11 下写入的内容由持有者提供，过早释放会丢失）
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new()?);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| ClipboardError::Unavailable("not connected".to_string()))
    }
}

impl ClipboardProvider for SystemClipboard {
    fn get_text(&mut self) -> Result<String, ClipboardError> {
        self.clipboard()?.get_text().map_err(ClipboardError::from)
    }

    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard()?
            .set_text(text.to_string())
            .map_err(ClipboardError::from)
    }
}

/// 复制改写原文（保留 Markdown）
pub fn copy_rewrite(clipboard: &mut dyn ClipboardProvider, rewrite: &str) -> Result<(), ClipboardError> {
    clipboard.set_text(rewrite)?;
    tracing::debug!(chars = rewrite.chars().count(), "Copied rewrite to clipboard");
    Ok(())
}

/// 读取剪贴板文本作为下一次输入；只有空白时视为空
pub fn paste_input(clipboard: &mut dyn ClipboardProvider) -> Result<String, ClipboardError> {
    let text = clipboard.get_text()?;
    if text.trim().is_empty() {
        return Err(ClipboardError::Empty);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryClipboard {
        text: Option<String>,
        deny: bool,
    }

    impl ClipboardProvider for MemoryClipboard {
        fn get_text(&mut self) -> Result<String, ClipboardError> {
            if self.deny {
                return Err(ClipboardError::PermissionDenied("read".into()));
            }
            self.text.clone().ok_or(ClipboardError::Empty)
        }

        fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            if self.deny {
                return Err(ClipboardError::PermissionDenied("write".into()));
            }
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_copy_then_paste() {
        let mut cb = MemoryClipboard::default();
        copy_rewrite(&mut cb, "# Lattice\n**hums**").unwrap();
        assert_eq!(paste_input(&mut cb).unwrap(), "# Lattice\n**hums**");
    }

    #[test]
    fn test_blank_paste_is_empty() {
        let mut cb = MemoryClipboard {
            text: Some("  \n".into()),
            ..Default::default()
        };
        assert_eq!(paste_input(&mut cb), Err(ClipboardError::Empty));
        assert_eq!(paste_input(&mut MemoryClipboard::default()), Err(ClipboardError::Empty));
    }

    #[test]
    fn test_denied() {
        let mut cb = MemoryClipboard {
            deny: true,
            ..Default::default()
        };
        assert!(matches!(copy_rewrite(&mut cb, "x"), Err(ClipboardError::PermissionDenied(_))));
    }

    #[test]
    fn test_arboard_error_mapping() {
        assert_eq!(
            ClipboardError::from(arboard::Error::ContentNotAvailable),
            ClipboardError::Empty
        );
        assert!(matches!(
            ClipboardError::from(arboard::Error::Unknown {
                description: "Permission denied by the compositor".into()
            }),
            ClipboardError::PermissionDenied(_)
        ));
        assert!(matches!(
            ClipboardError::from(arboard::Error::ClipboardNotSupported),
            ClipboardError::Unavailable(_)
        ));
    }
}
