//! 图渲染层：渲染器抽象、人格主题、哨兵值处理
//!
//! 渲染器只负责「渲染一次」：成功返回产物，失败返回带消息的 RenderError。
//! 重试策略完全交给 core::DiagramCoordinator。

#[cfg(feature = "mermaid")]
pub mod mermaid;
pub mod syntax;

use std::sync::Arc;

use thiserror::Error;

use crate::memory::FAILED_DIAGRAM;
use crate::persona::Persona;

#[cfg(feature = "mermaid")]
pub use mermaid::MermaidRenderer;
pub use syntax::SyntaxCheckRenderer;

/// 渲染失败：message 原样交给修复客户端
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 渲染产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub content: String,
    /// 导出时的扩展名（svg / mmd）
    pub extension: &'static str,
}

/// 主题变量（深色背景，描边色随人格变化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramTheme {
    pub background: String,
    pub primary_color: String,
    pub primary_text_color: String,
    pub line_color: String,
    pub text_color: String,
    pub node_border: String,
    pub font_family: String,
}

impl DiagramTheme {
    pub fn for_persona(persona: Persona) -> Self {
        Self {
            background: "#020617".to_string(),
            primary_color: "#1e293b".to_string(),
            primary_text_color: "#f1f5f9".to_string(),
            line_color: "#64748b".to_string(),
            text_color: "#cbd5e1".to_string(),
            node_border: persona.accent_color().to_string(),
            font_family: "Inter, sans-serif".to_string(),
        }
    }
}

/// 渲染器 trait
pub trait DiagramRenderer: Send + Sync {
    fn render(&self, source: &str, theme: &DiagramTheme) -> Result<RenderedDiagram, RenderError>;

    fn name(&self) -> &str;
}

/// 前端展示用：哨兵值直接给占位，不调用渲染器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramView {
    Rendered(RenderedDiagram),
    Placeholder,
    Error(RenderError),
    Empty,
}

pub const PLACEHOLDER_TEXT: &str = "Error: Could not render diagram.";

pub fn view(renderer: &dyn DiagramRenderer, source: Option<&str>, persona: Persona) -> DiagramView {
    match source {
        None => DiagramView::Empty,
        Some(s) if s == FAILED_DIAGRAM => DiagramView::Placeholder,
        Some(s) if s.trim().is_empty() => DiagramView::Empty,
        Some(s) => match renderer.render(s, &DiagramTheme::for_persona(persona)) {
            Ok(d) => DiagramView::Rendered(d),
            Err(e) => DiagramView::Error(e),
        },
    }
}

/// 按配置名创建渲染器；mermaid 未编译进来时回落到语法检查渲染器
pub fn create_renderer(name: &str) -> Arc<dyn DiagramRenderer> {
    match name.to_lowercase().as_str() {
        #[cfg(feature = "mermaid")]
        "mermaid" => Arc::new(MermaidRenderer::new()),
        "syntax" => Arc::new(SyntaxCheckRenderer::new()),
        other => {
            tracing::warn!("Renderer '{}' unavailable, falling back to syntax check", other);
            Arc::new(SyntaxCheckRenderer::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl DiagramRenderer for CountingRenderer {
        fn render(&self, source: &str, _theme: &DiagramTheme) -> Result<RenderedDiagram, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderedDiagram {
                content: source.to_string(),
                extension: "mmd",
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_sentinel_never_reaches_renderer() {
        let r = CountingRenderer::default();
        assert_eq!(view(&r, Some(FAILED_DIAGRAM), Persona::Mia), DiagramView::Placeholder);
        assert_eq!(view(&r, None, Persona::Mia), DiagramView::Empty);
        assert_eq!(r.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(view(&r, Some("graph TD"), Persona::Mia), DiagramView::Rendered(_)));
        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_theme_accent_per_persona() {
        assert_eq!(DiagramTheme::for_persona(Persona::Mia).node_border, "#38bdf8");
        assert_eq!(DiagramTheme::for_persona(Persona::Miette).node_border, "#f472b6");
    }

    #[test]
    fn test_unknown_renderer_falls_back() {
        assert_eq!(create_renderer("graphviz").name(), "syntax");
    }

    #[cfg(feature = "mermaid")]
    #[test]
    fn test_default_renderer_is_mermaid() {
        let name = crate::config::AppConfig::default().diagram.renderer;
        assert_eq!(create_renderer(&name).name(), "mermaid");
    }
}
