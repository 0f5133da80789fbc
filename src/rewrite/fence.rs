//! 代码围栏清理：模型经常把 Mermaid / JSON 包在 ``` 里，入库前一律剥掉

use std::sync::OnceLock;

use regex::Regex;

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```(?:[A-Za-z0-9_-]*[ \t]*\r?\n)?").expect("valid regex"))
}

fn closing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"))
}

/// 去掉首尾的代码围栏，其余内容原样保留。
/// 语言标记只有独占围栏行时才剥掉，图直接写在围栏行上时保留首个单词。
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = opening_fence().replace(trimmed, "");
    let without_close = closing_fence().replace(&without_open, "");
    without_close.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_mermaid_fence() {
        let raw = "```mermaid\ngraph TD\n  A-->B\n```";
        assert_eq!(strip_code_fences(raw), "graph TD\n  A-->B");
    }

    #[test]
    fn test_strips_bare_fence_with_padding() {
        let raw = "\n  ```\nflowchart LR\nX-->Y\n```  \n";
        assert_eq!(strip_code_fences(raw), "flowchart LR\nX-->Y");
    }

    #[test]
    fn test_unfenced_untouched() {
        assert_eq!(strip_code_fences("  pie\n \"a\": 1 "), "pie\n \"a\": 1");
    }

    #[test]
    fn test_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_diagram_on_fence_line_keeps_first_word() {
        assert_eq!(strip_code_fences("```graph TD\nA-->B```"), "graph TD\nA-->B");
        assert_eq!(strip_code_fences("```mermaid\n```"), "");
    }

    #[test]
    fn test_idempotent() {
        let once = strip_code_fences("```mermaid\nmindmap\n  root\n```");
        assert_eq!(strip_code_fences(&once), once);
    }
}
