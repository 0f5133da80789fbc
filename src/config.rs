//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DUET__*` 覆盖（双下划线表示嵌套，如 `DUET__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::persona::Persona;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub diagram: DiagramSection,
    pub speech: SpeechSection,
}

/// [app] 段：导出目录、示例文件、偏好文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub output_dir: PathBuf,
    pub samples_path: PathBuf,
    pub preferences_path: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            samples_path: PathBuf::from("data/samples.json"),
            preferences_path: PathBuf::from(".duet/preferences.json"),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时由各后端读取自己的环境变量
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    crate::llm::GEMINI_FLASH.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [diagram] 段：修复上限、是否允许换图类型、渲染器
#[derive(Debug, Clone, Deserialize)]
pub struct DiagramSection {
    /// 每个人格在同一话题内最多请求几次修复
    #[serde(default = "default_max_corrections")]
    pub max_corrections: u32,
    /// 修复时是否允许改用更简单的其它图类型
    #[serde(default = "default_allow_type_substitution")]
    pub allow_type_substitution: bool,
    /// mermaid（默认）/ syntax（宽松的语法检查，mermaid feature 关闭时的回退）
    #[serde(default = "default_renderer")]
    pub renderer: String,
}

impl Default for DiagramSection {
    fn default() -> Self {
        Self {
            max_corrections: default_max_corrections(),
            allow_type_substitution: default_allow_type_substitution(),
            renderer: default_renderer(),
        }
    }
}

fn default_max_corrections() -> u32 {
    2
}

fn default_allow_type_substitution() -> bool {
    true
}

fn default_renderer() -> String {
    "mermaid".to_string()
}

/// [speech] 段：外部 TTS 命令与每个人格的语速 / 音高
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechSection {
    /// TTS 可执行文件（需支持 -s 语速 / -p 音高 / 文本参数，如 espeak-ng）
    #[serde(default = "default_speech_command")]
    pub command: String,
    #[serde(default = "default_mia_voice")]
    pub mia: VoiceSection,
    #[serde(default = "default_miette_voice")]
    pub miette: VoiceSection,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            command: default_speech_command(),
            mia: default_mia_voice(),
            miette: default_miette_voice(),
        }
    }
}

impl SpeechSection {
    pub fn voice(&self, persona: Persona) -> &VoiceSection {
        match persona {
            Persona::Mia => &self.mia,
            Persona::Miette => &self.miette,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceSection {
    pub voice: String,
    /// 1.0 为正常语速
    pub rate: f32,
    /// 1.0 为正常音高
    pub pitch: f32,
}

fn default_speech_command() -> String {
    "espeak-ng".to_string()
}

fn default_mia_voice() -> VoiceSection {
    VoiceSection {
        voice: "en-gb".to_string(),
        rate: 0.935,
        pitch: 0.9,
    }
}

fn default_miette_voice() -> VoiceSection {
    VoiceSection {
        voice: "en-gb".to_string(),
        rate: 0.94,
        pitch: 1.3,
    }
}

/// 从 config 目录加载配置，环境变量 DUET__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DUET__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DUET")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
