//! 真正的 Mermaid → SVG 渲染（`--features mermaid`）

use std::panic::{self, AssertUnwindSafe};

use mermaid_rs_renderer::{
    config::LayoutConfig, layout::compute_layout, parser::parse_mermaid, render::render_svg,
    theme::Theme,
};

use crate::diagram::{DiagramRenderer, DiagramTheme, RenderError, RenderedDiagram};

#[derive(Debug, Default, Clone)]
pub struct MermaidRenderer;

impl MermaidRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn to_theme(theme: &DiagramTheme) -> Theme {
    Theme {
        background: theme.background.clone(),
        primary_color: theme.primary_color.clone(),
        primary_text_color: theme.primary_text_color.clone(),
        primary_border_color: theme.node_border.clone(),
        line_color: theme.line_color.clone(),
        text_color: theme.text_color.clone(),
        font_family: theme.font_family.clone(),
        ..Theme::modern()
    }
}

impl DiagramRenderer for MermaidRenderer {
    fn render(&self, source: &str, theme: &DiagramTheme) -> Result<RenderedDiagram, RenderError> {
        let theme = to_theme(theme);
        // 布局代码在个别非法输入上会 panic，按渲染失败处理
        let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<String, RenderError> {
            let parsed = parse_mermaid(source).map_err(|e| RenderError::new(format!("Parse error: {}", e)))?;
            let layout_config = LayoutConfig::default();
            let layout = compute_layout(&parsed.graph, &theme, &layout_config);
            Ok(render_svg(&layout, &theme, &layout_config))
        }));

        match result {
            Ok(Ok(svg)) => Ok(RenderedDiagram {
                content: svg,
                extension: "svg",
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RenderError::new("Renderer crashed while laying out the diagram")),
        }
    }

    fn name(&self) -> &str {
        "mermaid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Persona;

    #[test]
    fn test_renders_svg() {
        let out = MermaidRenderer::new()
            .render("flowchart LR\nA-->B", &DiagramTheme::for_persona(Persona::Miette))
            .unwrap();
        assert_eq!(out.extension, "svg");
        assert!(out.content.contains("<svg"));
    }
}
