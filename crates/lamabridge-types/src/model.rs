//! Model configuration and model-listing types.
//!
//! Configured entries are keyed by an identifier that is matched as a prefix
//! of the full backend model name, so one `qwen3` entry covers `qwen3:8b`,
//! `qwen3:14b` and so on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context window assumed when neither the config nor the backend knows it.
pub const DEFAULT_CONTEXT_LIMIT: u32 = 2048;

/// Per-model settings from the `[models.entries.<id>]` config tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// HuggingFace repo id (`Qwen/Qwen3-8B`) or a local directory /
    /// `tokenizer.json` path. Enables exact token counting and the
    /// chat-template path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,

    /// Overrides the context length reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_suffix: Option<String>,
}

impl ModelConfig {
    /// The thinking markers, only when both prefix and suffix are set.
    pub fn thinking_markers(&self) -> Option<ThinkingMarkers> {
        match (&self.thinking_prefix, &self.thinking_suffix) {
            (Some(prefix), Some(suffix)) if !prefix.is_empty() && !suffix.is_empty() => {
                Some(ThinkingMarkers {
                    prefix: prefix.clone(),
                    suffix: suffix.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Delimiters of a model's reasoning segment (e.g. `<think>` / `</think>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingMarkers {
    pub prefix: String,
    pub suffix: String,
}

/// The `[models]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used for the temporary session and for new sessions created
    /// without an explicit model.
    pub default_model: String,

    #[serde(default)]
    pub entries: BTreeMap<String, ModelConfig>,
}

impl ModelsConfig {
    /// Find the configured entry for a full backend model name.
    ///
    /// Keys are matched as prefixes; when several keys match, the longest one
    /// wins so that `qwen3-coder` is not shadowed by `qwen3`.
    pub fn config_for(&self, full_name: &str) -> Option<(&str, &ModelConfig)> {
        self.entries
            .iter()
            .filter(|(key, _)| full_name.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, config)| (key.as_str(), config))
    }
}

/// A model as listed by the backend (`list_models`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Full name including tag, e.g. `qwen3:8b`.
    pub full_name: String,
    pub name: String,
    pub tag: Option<String>,
    /// Human readable on-disk size, e.g. `4.9 GB`.
    pub size: String,
    pub parameter_size: Option<String>,
    pub quantization: Option<String>,
    pub context_length: Option<u32>,
}

/// Split `name:tag` into its parts.
///
/// Returns `None` for an empty string or for more than one `:`.
pub fn split_model_name(full_name: &str) -> Option<(&str, Option<&str>)> {
    if full_name.is_empty() {
        return None;
    }
    let mut parts = full_name.split(':');
    let name = parts.next()?;
    let tag = parts.next();
    if parts.next().is_some() {
        return None;
    }
    Some((name, tag))
}

/// Format a byte count the way model listings show it (`4.9 GB`).
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> ModelsConfig {
        let mut entries = BTreeMap::new();
        entries.insert("qwen3".to_string(), ModelConfig::default());
        entries.insert(
            "qwen3-coder".to_string(),
            ModelConfig {
                context_limit: Some(32768),
                ..Default::default()
            },
        );
        ModelsConfig {
            default_model: "qwen3".to_string(),
            entries,
        }
    }

    #[test]
    fn test_split_model_name() {
        assert_eq!(split_model_name("llama3:8b"), Some(("llama3", Some("8b"))));
        assert_eq!(split_model_name("llama3"), Some(("llama3", None)));
        assert_eq!(split_model_name(""), None);
        assert_eq!(split_model_name("a:b:c"), None);
    }

    #[test]
    fn test_config_for_prefix_match() {
        let models = models();
        let (key, _) = models.config_for("qwen3:8b").unwrap();
        assert_eq!(key, "qwen3");
        assert!(models.config_for("llama3:8b").is_none());
    }

    #[test]
    fn test_config_for_prefers_longest_key() {
        let models = models();
        let (key, config) = models.config_for("qwen3-coder:30b").unwrap();
        assert_eq!(key, "qwen3-coder");
        assert_eq!(config.context_limit, Some(32768));
    }

    #[test]
    fn test_thinking_markers_need_both_sides() {
        let only_prefix = ModelConfig {
            thinking_prefix: Some("<think>".to_string()),
            ..Default::default()
        };
        assert!(only_prefix.thinking_markers().is_none());

        let both = ModelConfig {
            thinking_prefix: Some("<think>".to_string()),
            thinking_suffix: Some("</think>".to_string()),
            ..Default::default()
        };
        assert_eq!(both.thinking_markers().unwrap().suffix, "</think>");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(4_920_000_000), "4.9 GB");
    }
}
