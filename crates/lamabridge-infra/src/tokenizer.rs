//! HuggingFace tokenizers for exact token counting.
//!
//! A model's `tokenizer` config value is either a local path (a directory
//! holding `tokenizer.json`, or the file itself) or a HuggingFace Hub repo
//! id such as `Qwen/Qwen3-8B`, downloaded into the hub cache on first use.
//! The sibling `tokenizer_config.json`, when present, supplies the chat
//! template and the BOS/EOS special tokens.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf_hub::api::tokio::ApiBuilder;
use serde::Deserialize;

use lamabridge_core::tokens::{ChatTemplate, Tokenizer};
use lamabridge_types::error::TokenizerError;
use lamabridge_types::model::ModelsConfig;

const TOKENIZER_FILE: &str = "tokenizer.json";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// A loaded HuggingFace tokenizer plus its chat template.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    template: Option<ChatTemplate>,
}

impl HfTokenizer {
    /// Build from the raw contents of `tokenizer.json` and, optionally,
    /// `tokenizer_config.json`.
    pub fn from_bytes(tokenizer_json: &[u8], config_json: Option<&[u8]>) -> Result<Self, TokenizerError> {
        let inner = tokenizers::Tokenizer::from_bytes(tokenizer_json)
            .map_err(|e| TokenizerError::Load(e.to_string()))?;

        let template = match config_json {
            Some(bytes) => parse_tokenizer_config(bytes)?,
            None => None,
        };

        Ok(Self { inner, template })
    }

    /// Load from a local path or a HuggingFace Hub repo id.
    pub async fn load(source: &str) -> Result<Self, TokenizerError> {
        let (tokenizer_path, config_path) = match local_files(Path::new(source)).await {
            Some(paths) => paths,
            None => download(source).await?,
        };

        let tokenizer_json = tokio::fs::read(&tokenizer_path)
            .await
            .map_err(|e| TokenizerError::Load(format!("{}: {e}", tokenizer_path.display())))?;
        let config_json = match config_path {
            Some(path) => tokio::fs::read(&path).await.ok(),
            None => None,
        };

        let tokenizer = Self::from_bytes(&tokenizer_json, config_json.as_deref())?;
        tracing::debug!(
            source,
            has_template = tokenizer.template.is_some(),
            "tokenizer loaded"
        );
        Ok(tokenizer)
    }
}

impl Tokenizer for HfTokenizer {
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        // No post-processor specials: a rendered template already carries them.
        self.inner
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| TokenizerError::Encode(e.to_string()))
    }

    fn chat_template(&self) -> Option<&ChatTemplate> {
        self.template.as_ref()
    }
}

/// Load the tokenizer of every configured model that names one.
///
/// A tokenizer that fails to load is logged and skipped; that model falls
/// back to heuristic counting and the raw-message path.
pub async fn load_configured_tokenizers(models: &ModelsConfig) -> Vec<(String, Arc<dyn Tokenizer>)> {
    let mut loaded: Vec<(String, Arc<dyn Tokenizer>)> = Vec::new();

    for (key, config) in &models.entries {
        let Some(source) = config.tokenizer.as_deref() else {
            continue;
        };
        match HfTokenizer::load(source).await {
            Ok(tokenizer) => {
                let tokenizer: Arc<dyn Tokenizer> = Arc::new(tokenizer);
                loaded.push((key.clone(), tokenizer));
            }
            Err(e) => {
                tracing::warn!(model = %key, source, error = %e, "tokenizer unavailable, using heuristic counts");
            }
        }
    }

    loaded
}

// ---------------------------------------------------------------------------
// File resolution
// ---------------------------------------------------------------------------

async fn local_files(path: &Path) -> Option<(PathBuf, Option<PathBuf>)> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let (tokenizer, dir) = if metadata.is_dir() {
        (path.join(TOKENIZER_FILE), path.to_path_buf())
    } else {
        (path.to_path_buf(), path.parent()?.to_path_buf())
    };
    let config = dir.join(TOKENIZER_CONFIG_FILE);
    let config = tokio::fs::try_exists(&config)
        .await
        .unwrap_or(false)
        .then_some(config);
    Some((tokenizer, config))
}

async fn download(repo_id: &str) -> Result<(PathBuf, Option<PathBuf>), TokenizerError> {
    let api = ApiBuilder::new()
        .with_progress(false)
        .build()
        .map_err(|e| TokenizerError::Load(e.to_string()))?;
    let repo = api.model(repo_id.to_string());

    let tokenizer = repo
        .get(TOKENIZER_FILE)
        .await
        .map_err(|e| TokenizerError::Load(format!("{repo_id}: {e}")))?;
    let config = match repo.get(TOKENIZER_CONFIG_FILE).await {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!(repo = repo_id, error = %e, "no tokenizer_config.json");
            None
        }
    };

    Ok((tokenizer, config))
}

// ---------------------------------------------------------------------------
// tokenizer_config.json
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenizerConfigFile {
    #[serde(default)]
    chat_template: Option<TemplateField>,
    #[serde(default)]
    bos_token: Option<SpecialToken>,
    #[serde(default)]
    eos_token: Option<SpecialToken>,
}

/// A single template, or a list of named templates.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TemplateField {
    Single(String),
    Named(Vec<NamedTemplate>),
}

#[derive(Debug, Deserialize)]
struct NamedTemplate {
    name: String,
    template: String,
}

/// Special tokens appear either as plain strings or as `AddedToken` objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpecialToken {
    Plain(String),
    Added { content: String },
}

impl SpecialToken {
    fn into_content(self) -> String {
        match self {
            SpecialToken::Plain(s) => s,
            SpecialToken::Added { content } => content,
        }
    }
}

fn parse_tokenizer_config(bytes: &[u8]) -> Result<Option<ChatTemplate>, TokenizerError> {
    let config: TokenizerConfigFile = serde_json::from_slice(bytes)
        .map_err(|e| TokenizerError::Load(format!("invalid {TOKENIZER_CONFIG_FILE}: {e}")))?;

    let source = match config.chat_template {
        Some(TemplateField::Single(source)) => source,
        Some(TemplateField::Named(templates)) => {
            let mut by_name: BTreeMap<String, String> = templates
                .into_iter()
                .map(|t| (t.name, t.template))
                .collect();
            match by_name.remove("default") {
                Some(source) => source,
                None => match by_name.into_values().next() {
                    Some(source) => source,
                    None => return Ok(None),
                },
            }
        }
        None => return Ok(None),
    };

    Ok(Some(ChatTemplate {
        source,
        bos_token: config.bos_token.map(SpecialToken::into_content),
        eos_token: config.eos_token.map(SpecialToken::into_content),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 3, "content": "<|im_start|>", "single_word": false, "lstrip": false,
             "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"hello": 0, "world": 1, "[UNK]": 2, "<|im_start|>": 3},
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn test_count_words_and_special_tokens() {
        let tokenizer = HfTokenizer::from_bytes(TOKENIZER_JSON.as_bytes(), None).unwrap();
        assert_eq!(tokenizer.count("hello world").unwrap(), 2);
        assert_eq!(tokenizer.count("hello unknown world").unwrap(), 3);
        assert_eq!(tokenizer.count("<|im_start|>hello").unwrap(), 2);
        assert!(tokenizer.chat_template().is_none());
    }

    #[test]
    fn test_invalid_tokenizer_json() {
        let result = HfTokenizer::from_bytes(b"{}", None);
        assert!(matches!(result, Err(TokenizerError::Load(_))));
    }

    #[test]
    fn test_config_with_plain_tokens() {
        let template = parse_tokenizer_config(
            br#"{"chat_template": "{{ bos_token }}{% for m in messages %}{{ m.content }}{% endfor %}",
                 "bos_token": "<s>", "eos_token": "</s>"}"#,
        )
        .unwrap()
        .unwrap();
        assert!(template.source.starts_with("{{ bos_token }}"));
        assert_eq!(template.bos_token.as_deref(), Some("<s>"));
        assert_eq!(template.eos_token.as_deref(), Some("</s>"));
    }

    #[test]
    fn test_config_with_added_token_objects() {
        let template = parse_tokenizer_config(
            br#"{"chat_template": "x",
                 "bos_token": null,
                 "eos_token": {"content": "<|im_end|>", "lstrip": false, "rstrip": false}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(template.bos_token, None);
        assert_eq!(template.eos_token.as_deref(), Some("<|im_end|>"));
    }

    #[test]
    fn test_config_with_named_templates_prefers_default() {
        let template = parse_tokenizer_config(
            br#"{"chat_template": [
                    {"name": "tool_use", "template": "tools"},
                    {"name": "default", "template": "chat"}
                ]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(template.source, "chat");
    }

    #[test]
    fn test_config_without_template() {
        assert_eq!(parse_tokenizer_config(br#"{"eos_token": "</s>"}"#).unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_from_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(TOKENIZER_FILE), TOKENIZER_JSON)
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join(TOKENIZER_CONFIG_FILE),
            r#"{"chat_template": "{{ messages[0].content }}", "eos_token": "</s>"}"#,
        )
        .await
        .unwrap();

        let tokenizer = HfTokenizer::load(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(tokenizer.count("hello").unwrap(), 1);
        let template = tokenizer.chat_template().unwrap();
        assert_eq!(template.source, "{{ messages[0].content }}");
        assert_eq!(template.eos_token.as_deref(), Some("</s>"));
    }

    #[tokio::test]
    async fn test_load_from_local_file_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        tokio::fs::write(&path, TOKENIZER_JSON).await.unwrap();

        let tokenizer = HfTokenizer::load(path.to_str().unwrap()).await.unwrap();
        assert!(tokenizer.chat_template().is_none());
    }

    #[tokio::test]
    async fn test_load_configured_tokenizers_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(TOKENIZER_FILE), TOKENIZER_JSON)
            .await
            .unwrap();
        let broken = dir.path().join("broken.json");
        tokio::fs::write(&broken, "{}").await.unwrap();

        let mut entries = BTreeMap::new();
        entries.insert(
            "good".to_string(),
            lamabridge_types::model::ModelConfig {
                tokenizer: Some(dir.path().to_str().unwrap().to_string()),
                ..Default::default()
            },
        );
        entries.insert(
            "broken".to_string(),
            lamabridge_types::model::ModelConfig {
                tokenizer: Some(broken.to_str().unwrap().to_string()),
                ..Default::default()
            },
        );
        entries.insert("plain".to_string(), Default::default());
        let models = ModelsConfig {
            default_model: "good".to_string(),
            entries,
        };

        let loaded = load_configured_tokenizers(&models).await;
        let keys: Vec<&str> = loaded.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["good"]);
    }
}
