//! Duet - 双人格改写器
//!
//! 同一段文字交给两个人格（Mia / Miette）同时改写，每个改写附带一张 Mermaid 图；
//! 图渲染失败时由模型自动修复，超过修复次数后标记为永久失败。
//!
//! 模块划分：
//! - **clipboard**: 剪贴板复制 / 粘贴
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 回合控制、图修复协调器、错误与恢复
//! - **diagram**: 渲染器抽象与实现（语法检查 / mermaid）
//! - **export**: 导出文件名与 Markdown / 图 / 文本写出
//! - **llm**: LLM 客户端抽象与实现（Gemini / OpenAI 兼容 / Mock）
//! - **memory**: 对话线程、持久化、用户偏好
//! - **persona**: 人格定义
//! - **rewrite**: 生成客户端与图修复客户端
//! - **samples**: 示例输入
//! - **speech**: 朗读

pub mod clipboard;
pub mod config;
pub mod core;
pub mod diagram;
pub mod export;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod persona;
pub mod rewrite;
pub mod samples;
pub mod speech;
