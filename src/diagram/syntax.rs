//! 宽松的 Mermaid 语法检查渲染器（未启用 `mermaid` feature 时的回退）
//!
//! 不做布局，只校验明显的结构错误：图类型头、方向、空图体、括号配对。
//! 拿不准的写法一律放行，误报会白白消耗修复预算。
//! 校验通过时把源码本身作为产物（.mmd），交给下游工具渲染。

use crate::diagram::{DiagramRenderer, DiagramTheme, RenderError, RenderedDiagram};

const DIAGRAM_TYPES: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "classDiagram-v2",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "mindmap",
    "timeline",
    "gitGraph",
    "quadrantChart",
    "requirementDiagram",
    "C4Context",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
];

const DIRECTIONS: &[&str] = &["TB", "TD", "BT", "RL", "LR"];

#[derive(Debug, Default, Clone)]
pub struct SyntaxCheckRenderer;

impl SyntaxCheckRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// 去掉 front-matter 与 %% 注释 / 指令，返回 (原始行号, 行内容)
fn meaningful_lines(source: &str) -> Vec<(usize, &str)> {
    let mut lines: Vec<(usize, &str)> = source
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .collect();

    let first = lines.iter().position(|(_, l)| !l.trim().is_empty());
    if let Some(start) = first {
        if lines[start].1.trim() == "---" {
            if let Some(end) = lines[start + 1..].iter().position(|(_, l)| l.trim() == "---") {
                lines.drain(..=start + 1 + end);
            }
        }
    }

    lines
        .into_iter()
        .filter(|(_, l)| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with("%%")
        })
        .collect()
}

fn check_header(line_no: usize, header: &str) -> Result<(&'static str, String), RenderError> {
    let (head, inline_body) = match header.split_once(';') {
        Some((h, rest)) => (h, rest.trim().to_string()),
        None => (header, String::new()),
    };
    let mut tokens = head.split_whitespace();
    let keyword = tokens.next().unwrap_or("");
    let Some(kind) = DIAGRAM_TYPES.iter().copied().find(|t| *t == keyword) else {
        return Err(RenderError::new(format!(
            "Parse error on line {}: unknown diagram type '{}'",
            line_no, keyword
        )));
    };

    if kind == "graph" || kind == "flowchart" {
        if let Some(dir) = tokens.next() {
            if !DIRECTIONS.contains(&dir) {
                return Err(RenderError::new(format!(
                    "Parse error on line {}: invalid direction '{}' (expected one of {})",
                    line_no,
                    dir,
                    DIRECTIONS.join(", ")
                )));
            }
        }
    }
    Ok((kind, inline_body))
}

/// 括号配对：跨行检查（classDiagram 的类体会跨行），引号内忽略。
///
/// 宽松处理自由文本：`[..]` `{..}` `(..)` 标签内部、`|..|` 连线标签内、以及 `:` 之后的消息文本
/// 都只看配对不看 `>`；只有流程图顶层 `A>text]` 这种紧跟节点 id 的 `>` 才算 `]` 的开括号。
fn check_brackets(lines: &[(usize, &str)], flowchart: bool) -> Result<(), RenderError> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    for (line_no, line) in lines {
        let mut in_quotes = false;
        let mut in_edge_label = false;
        let mut prev: Option<char> = None;
        for c in line.chars() {
            let before = prev.replace(c);
            if c == '"' {
                in_quotes = !in_quotes;
                continue;
            }
            if in_quotes {
                continue;
            }
            if c == '|' && stack.is_empty() {
                in_edge_label = !in_edge_label;
                continue;
            }
            if in_edge_label {
                continue;
            }
            match c {
                // 消息 / 关系说明，行内其余部分是自由文本
                ':' if stack.is_empty() => break,
                '(' | '[' | '{' => stack.push((c, *line_no)),
                '>' if flowchart && stack.is_empty() && before.is_some_and(|p| p.is_alphanumeric()) => {
                    stack.push(('>', *line_no))
                }
                ')' | ']' | '}' => {
                    let ok = match (stack.pop(), c) {
                        (Some(('(', _)), ')') => true,
                        (Some(('[', _)), ']') | (Some(('>', _)), ']') => true,
                        (Some(('{', _)), '}') => true,
                        _ => false,
                    };
                    if !ok {
                        return Err(RenderError::new(format!(
                            "Parse error on line {}: unexpected '{}'",
                            line_no, c
                        )));
                    }
                }
                _ => {}
            }
        }
        if in_quotes {
            return Err(RenderError::new(format!(
                "Parse error on line {}: unterminated string",
                line_no
            )));
        }
    }
    match stack.pop() {
        Some((open, line_no)) => Err(RenderError::new(format!(
            "Parse error on line {}: unclosed '{}'",
            line_no, open
        ))),
        None => Ok(()),
    }
}

impl DiagramRenderer for SyntaxCheckRenderer {
    fn render(&self, source: &str, _theme: &DiagramTheme) -> Result<RenderedDiagram, RenderError> {
        let lines = meaningful_lines(source);
        let Some(((header_no, header), body)) = lines.split_first() else {
            return Err(RenderError::new("No diagram type detected: diagram is empty"));
        };

        let (kind, inline_body) = check_header(*header_no, header.trim())?;
        if body.is_empty() && inline_body.is_empty() {
            return Err(RenderError::new(format!("{} diagram has no content", kind)));
        }

        // ER 图的基数符号（o{ / }|）本身就是花括号
        if kind != "erDiagram" {
            let mut all = Vec::with_capacity(body.len() + 1);
            all.push((*header_no, inline_body.as_str()));
            all.extend_from_slice(body);
            check_brackets(&all, kind == "graph" || kind == "flowchart")?;
        }

        Ok(RenderedDiagram {
            content: source.trim().to_string(),
            extension: "mmd",
        })
    }

    fn name(&self) -> &str {
        "syntax"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Persona;

    fn render(src: &str) -> Result<RenderedDiagram, RenderError> {
        SyntaxCheckRenderer::new().render(src, &DiagramTheme::for_persona(Persona::Mia))
    }

    #[test]
    fn test_valid_flowchart() {
        let out = render("graph TD\n  A[Start] --> B{Choice}\n  B -->|yes| C((Done))").unwrap();
        assert_eq!(out.extension, "mmd");
        assert!(out.content.starts_with("graph TD"));
    }

    #[test]
    fn test_inline_body_after_semicolon() {
        assert!(render("graph LR; A-->B").is_ok());
    }

    #[test]
    fn test_unknown_type() {
        let err = render("graf TD\nA-->B").unwrap_err();
        assert!(err.message.contains("unknown diagram type 'graf'"));
    }

    #[test]
    fn test_bad_direction() {
        assert!(render("flowchart XY\nA-->B").unwrap_err().message.contains("invalid direction"));
    }

    #[test]
    fn test_empty_and_headless() {
        assert!(render("   \n").is_err());
        assert!(render("mindmap").unwrap_err().message.contains("no content"));
    }

    #[test]
    fn test_unclosed_bracket_reports_line() {
        let err = render("graph TD\nA[Start --> B\nB --> C").unwrap_err();
        assert!(err.message.contains("line 2"), "{}", err.message);
    }

    #[test]
    fn test_brackets_inside_quotes_ignored() {
        assert!(render("graph TD\nA[\"x ( y\"] --> B").is_ok());
    }

    #[test]
    fn test_asymmetric_shape_and_class_body() {
        assert!(render("graph TD\nA>Flag] --> B").is_ok());
        assert!(render("classDiagram\nclass Agent {\n  +name String\n}\n").is_ok());
    }

    #[test]
    fn test_er_cardinality_not_brackets() {
        assert!(render("erDiagram\nCUSTOMER ||--o{ ORDER : places").is_ok());
    }

    #[test]
    fn test_comments_and_front_matter_skipped() {
        let src = "---\ntitle: Lattice\n---\n%% comment\n%%{init: {'theme':'dark'}}%%\nflowchart LR\nA-->B";
        assert!(render(src).is_ok());
    }

    #[test]
    fn test_greater_than_inside_labels() {
        assert!(render("flowchart TD\nA[Load] --> B{Is n>5?}").is_ok());
        assert!(render("graph TD\nA[a>b] --> C").is_ok());
        assert!(render("graph LR\nA -->|x>0| B").is_ok());
    }

    #[test]
    fn test_greater_than_in_sequence_message() {
        assert!(render("sequenceDiagram\nAlice->>Bob: x>0").is_ok());
        assert!(render("sequenceDiagram\nAlice->>Bob: call f(x").is_ok());
    }

    #[test]
    fn test_sequence_arrows_are_not_shapes() {
        assert!(render("sequenceDiagram\nAlice->>John: Hello\nJohn-->>Alice: Hi").is_ok());
    }
}
