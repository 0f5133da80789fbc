//! 示例输入：启动时加载一次的分组 prompt 列表
//!
//! 文件格式 `[{ "group": "...", "prompts": [{ "label": "...", "value": "..." }] }]`。
//! 加载失败不致命：记录警告并返回空列表，前端隐藏示例选择。

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePrompt {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleGroup {
    pub group: String,
    pub prompts: Vec<SamplePrompt>,
}

fn read_samples(path: &Path) -> anyhow::Result<Vec<SampleGroup>> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn load_samples(path: impl AsRef<Path>) -> Vec<SampleGroup> {
    let path = path.as_ref();
    match read_samples(path) {
        Ok(groups) => {
            tracing::info!("Loaded {} sample groups from {}", groups.len(), path.display());
            groups
        }
        Err(e) => {
            tracing::warn!("Could not load sample prompts from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// 按显示顺序展开为 (分组, 示例)，供 `/sample N` 编号选择
pub fn flatten(groups: &[SampleGroup]) -> Vec<(&str, &SamplePrompt)> {
    groups
        .iter()
        .flat_map(|g| g.prompts.iter().map(move |p| (g.group.as_str(), p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_flatten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(
            &path,
            r#"[{"group":"Tech","prompts":[{"label":"A","value":"alpha"},{"label":"B","value":"beta"}]},
                {"group":"Life","prompts":[{"label":"C","value":"gamma"}]}]"#,
        )
        .unwrap();

        let groups = load_samples(&path);
        let flat = flatten(&groups);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[2].0, "Life");
        assert_eq!(flat[2].1.value, "gamma");
    }

    #[test]
    fn test_missing_or_corrupt_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_samples(dir.path().join("nope.json")).is_empty());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(load_samples(&bad).is_empty());
    }
}
