//! 导出：确定性文件名、Markdown / 图 / 纯文本写出、朗读前的 Markdown 清理
//!
//! 文件名 = 基名（首个标题或前五个词）+ `_{generation_id}` + `.{人格小写}` + `.{扩展名}`，
//! 同一话题下两个人格、多种产物的文件名可以互相对应。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::core::DuetError;
use crate::diagram::{view, DiagramRenderer, DiagramView};
use crate::memory::{Conversation, ConversationPersistence, Message};
use crate::persona::Persona;

const MAX_BASENAME_CHARS: usize = 50;
const FALLBACK_BASENAME: &str = "rewrite";

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("valid regex"))
}

/// 从改写文本推导文件基名
pub fn export_basename(rewrite: &str) -> String {
    let source = match heading_re().captures(rewrite) {
        Some(caps) => caps[1].to_string(),
        None => strip_markdown(rewrite)
            .split_whitespace()
            .take(5)
            .collect::<Vec<_>>()
            .join(" "),
    };

    let cleaned: String = source
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let truncated: String = joined.chars().take(MAX_BASENAME_CHARS).collect();
    let trimmed = truncated.trim_matches('_');

    if trimmed.is_empty() {
        FALLBACK_BASENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `my_title_240101120000.mia.md`
pub fn export_filename(rewrite: &str, generation_id: &str, persona: Persona, extension: &str) -> String {
    format!(
        "{}_{}.{}.{}",
        export_basename(rewrite),
        generation_id,
        persona.slug(),
        extension.trim_start_matches('.')
    )
}

struct StripRules {
    images: Regex,
    links: Regex,
    code_blocks: Regex,
    inline_code: Regex,
    headers: Regex,
    emphasis: Vec<Regex>,
    blockquotes: Regex,
    rules: Regex,
    list_markers: Regex,
    paragraph_breaks: Regex,
}

fn strip_rules() -> &'static StripRules {
    static RULES: OnceLock<StripRules> = OnceLock::new();
    RULES.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("valid regex");
        StripRules {
            images: re(r"!\[[^\]]*\]\([^)]*\)"),
            links: re(r"\[([^\]]*)\]\([^)]*\)"),
            code_blocks: re(r"(?s)```.*?```"),
            inline_code: re(r"`([^`]+)`"),
            headers: re(r"(?m)^#{1,6}\s+"),
            // regex 不支持反向引用，各种强调符号分开匹配；长的先匹配
            emphasis: vec![
                re(r"\*\*(.*?)\*\*"),
                re(r"__(.*?)__"),
                re(r"~~(.*?)~~"),
                re(r"\*(.*?)\*"),
                re(r"\b_(.*?)_\b"),
            ],
            blockquotes: re(r"(?m)^\s*>\s?"),
            rules: re(r"(?m)^\s*[-*_]{3,}\s*$"),
            list_markers: re(r"(?m)^\s*([*+-]|\d+\.)\s+"),
            paragraph_breaks: re(r"\n{2,}"),
        }
    })
}

/// 去掉 Markdown 标记，得到适合朗读的单行文本
pub fn strip_markdown(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }
    let r = strip_rules();
    let mut out = r.images.replace_all(markdown, "").into_owned();
    out = r.links.replace_all(&out, "$1").into_owned();
    out = r.code_blocks.replace_all(&out, "").into_owned();
    out = r.inline_code.replace_all(&out, "$1").into_owned();
    out = r.headers.replace_all(&out, "").into_owned();
    // 水平线先于强调处理，否则 `***` 会被当成强调
    out = r.rules.replace_all(&out, "").into_owned();
    for emphasis in &r.emphasis {
        out = emphasis.replace_all(&out, "$1").into_owned();
    }
    out = r.blockquotes.replace_all(&out, "").into_owned();
    out = r.list_markers.replace_all(&out, "").into_owned();
    out = r.paragraph_breaks.replace_all(&out, " ").into_owned();
    out.replace('\n', " ").trim().to_string()
}

/// 导出目录下的写出器
#[derive(Debug, Clone)]
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// 某一产物的目标路径（音频由语音模块写入，这里只给路径）
    pub fn path_for(&self, rewrite: &str, generation_id: &str, persona: Persona, extension: &str) -> PathBuf {
        self.out_dir
            .join(export_filename(rewrite, generation_id, persona, extension))
    }

    fn write(&self, path: PathBuf, contents: &str) -> Result<PathBuf, DuetError> {
        std::fs::create_dir_all(&self.out_dir)
            .and_then(|_| std::fs::write(&path, contents))
            .map_err(|e| DuetError::Export(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Exported {}", path.display());
        Ok(path)
    }

    pub fn write_markdown(&self, rewrite: &str, generation_id: &str, persona: Persona) -> Result<PathBuf, DuetError> {
        self.write(self.path_for(rewrite, generation_id, persona, "md"), rewrite)
    }

    pub fn write_text(&self, rewrite: &str, generation_id: &str, persona: Persona) -> Result<PathBuf, DuetError> {
        self.write(
            self.path_for(rewrite, generation_id, persona, "txt"),
            &strip_markdown(rewrite),
        )
    }

    /// 写出渲染产物；哨兵值、空图或渲染失败时不写，返回 None
    pub fn write_diagram(
        &self,
        renderer: &dyn DiagramRenderer,
        message: &Message,
        generation_id: &str,
        persona: Persona,
    ) -> Result<Option<PathBuf>, DuetError> {
        match view(renderer, message.diagram_source.as_deref(), persona) {
            DiagramView::Rendered(diagram) => self
                .write(
                    self.path_for(&message.rewrite, generation_id, persona, diagram.extension),
                    &diagram.content,
                )
                .map(Some),
            _ => Ok(None),
        }
    }

    /// 整条对话线程（含消息 id 与图源码）存为 `session_{generation_id}.{人格}.json`
    pub fn write_session(
        &self,
        conversation: &Conversation,
        generation_id: &str,
        persona: Persona,
    ) -> Result<PathBuf, DuetError> {
        let path = self
            .out_dir
            .join(format!("session_{}.{}.json", generation_id, persona.slug()));
        ConversationPersistence::new(&path)
            .save(conversation)
            .map_err(|e| DuetError::Export(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// 导出某人格的一条 model 消息：Markdown、纯文本、图（可渲染时）
    pub fn export_reply(
        &self,
        renderer: &dyn DiagramRenderer,
        message: &Message,
        generation_id: &str,
        persona: Persona,
    ) -> Result<Vec<PathBuf>, DuetError> {
        let mut written = vec![
            self.write_markdown(&message.rewrite, generation_id, persona)?,
            self.write_text(&message.rewrite, generation_id, persona)?,
        ];
        if let Some(p) = self.write_diagram(renderer, message, generation_id, persona)? {
            written.push(p);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::SyntaxCheckRenderer;
    use crate::memory::FAILED_DIAGRAM;

    #[test]
    fn test_filename_from_heading() {
        assert_eq!(
            export_filename("# My Title\nbody", "240101120000", Persona::Mia, "md"),
            "my_title_240101120000.mia.md"
        );
    }

    #[test]
    fn test_filename_from_first_five_words() {
        let name = export_filename(
            "The lattice, it **hums** softly tonight under stars",
            "240101120000",
            Persona::Miette,
            "svg",
        );
        assert_eq!(name, "the_lattice_it_hums_softly_240101120000.miette.svg");
    }

    #[test]
    fn test_basename_truncated_and_fallback() {
        let long = format!("# {}", "a".repeat(80));
        assert_eq!(export_basename(&long).chars().count(), 50);
        assert_eq!(export_basename("!!! ???"), "rewrite");
        assert_eq!(export_basename(""), "rewrite");
    }

    #[test]
    fn test_strip_markdown() {
        let md = "# Title\n\nSome **bold** and *italic* and `code`.\n\n- item one\n- [link](http://x.y)\n\n> quote\n\n---\n![img](a.png)";
        assert_eq!(
            strip_markdown(md),
            "Title Some bold and italic and code. item one link quote"
        );
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_markdown("before\n```rust\nfn x() {}\n```\nafter"), "before after");
    }

    #[test]
    fn test_export_reply_skips_failed_diagram() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("out"));
        let renderer = SyntaxCheckRenderer::new();

        let ok = Message::model("# Lattice\nbody", Some("graph TD\nA-->B".into()));
        let files = exporter.export_reply(&renderer, &ok, "240101120000", Persona::Mia).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[2].ends_with("lattice_240101120000.mia.mmd"));

        let failed = Message::model("# Lattice\nbody", Some(FAILED_DIAGRAM.into()));
        let files = exporter
            .export_reply(&renderer, &failed, "240101120000", Persona::Miette)
            .unwrap();
        assert_eq!(files.len(), 2);
        let md = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(md, "# Lattice\nbody");
    }

    #[test]
    fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let mut conv = Conversation::new();
        conv.push(Message::user("topic"));
        conv.push(Message::model("reply", Some("graph TD\nA-->B".into())));

        let path = exporter.write_session(&conv, "240101120000", Persona::Miette).unwrap();
        assert!(path.ends_with("session_240101120000.miette.json"));
        let loaded = ConversationPersistence::new(&path).load().unwrap();
        assert_eq!(loaded.messages(), conv.messages());
    }
}
