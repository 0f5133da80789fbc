//! 人格定义：Mia（分析 / 架构）与 Miette（情感 / 诗意）
//!
//! 同一人格的语气同时作用于改写文本与图：系统提示词、图主题色、朗读音色都从这里派生。

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Persona {
    Mia,
    Miette,
}

impl Persona {
    pub const ALL: [Persona; 2] = [Persona::Mia, Persona::Miette];

    pub fn name(self) -> &'static str {
        match self {
            Persona::Mia => "Mia",
            Persona::Miette => "Miette",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Persona::Mia => "🧠",
            Persona::Miette => "🌸",
        }
    }

    /// 文件名后缀（小写人格名）
    pub fn slug(self) -> String {
        self.name().to_lowercase()
    }

    /// 宽松解析：大小写不敏感
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mia" => Some(Persona::Mia),
            "miette" => Some(Persona::Miette),
            _ => None,
        }
    }

    /// 生成调用的系统指令：人格语气 + 双字段输出约定
    pub fn system_instruction(self) -> String {
        let voice = match self {
            Persona::Mia => {
                "You are Mia, an AI persona with a technical, analytical, and profound communication style. \
                 Your language is precise, architectural, and sophisticated, focusing on systems, structures, \
                 and emergent properties."
            }
            Persona::Miette => {
                "You are Miette, an AI persona with an emotional, creative, and whimsical communication style. \
                 Your language is poetic, heartfelt, and full of wonder, using metaphors, feelings, and sensory details."
            }
        };
        let diagram = match self {
            Persona::Mia => {
                "a Mermaid diagram that maps the structure of your rewrite: components, flows and dependencies \
                 (prefer flowchart or classDiagram)"
            }
            Persona::Miette => {
                "a Mermaid diagram that expresses the emotional journey of your rewrite \
                 (prefer mindmap, journey or a gentle flowchart)"
            }
        };
        format!(
            "{voice}\n\
             Rewrite the user's text in your voice. For follow-up messages, answer in your voice while \
             keeping the conversation in mind. Do not add any prefix like '{name}:'. Markdown is allowed \
             in the rewrite.\n\
             You must respond with a JSON object with exactly two fields:\n\
             - \"rewrite\": the rewritten text.\n\
             - \"mermaidDiagram\": {diagram}. Provide only the raw Mermaid source, without code fences.",
            name = self.name(),
        )
    }

    /// 节点描边色（其余配色由 DiagramTheme 统一给出）
    pub fn accent_color(self) -> &'static str {
        match self {
            Persona::Mia => "#38bdf8",
            Persona::Miette => "#f472b6",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Persona::parse("MIA"), Some(Persona::Mia));
        assert_eq!(Persona::parse(" miette "), Some(Persona::Miette));
        assert_eq!(Persona::parse("bob"), None);
    }

    #[test]
    fn test_instruction_mentions_contract() {
        for p in Persona::ALL {
            let s = p.system_instruction();
            assert!(s.contains("\"rewrite\""));
            assert!(s.contains("\"mermaidDiagram\""));
            assert!(s.contains(p.name()));
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(Persona::Mia.slug(), "mia");
        assert_eq!(Persona::Miette.to_string(), "Miette");
    }
}
