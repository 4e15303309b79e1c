/*!
common/src/lib.rs

Shared configuration types for NewsBot.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file
- A loader that deep-merges a default file with an optional override file
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default number of descriptive words requested for a topic.
pub const DEFAULT_TOPIC_WORDS: usize = 10;

/// Default token budget for LLM summaries.
pub const DEFAULT_SUMMARY_MAX_TOKENS: usize = 500;

/// Remote LLM endpoint config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config grouping the fallback endpoint and task-specific ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote", "none"
    // Fallback: single remote config
    pub remote: Option<RemoteLlmConfig>,
    // Task-specific configs
    pub analysis: Option<RemoteLlmConfig>,
    pub embedding: Option<RemoteLlmConfig>,
    pub summarization: Option<RemoteLlmConfig>,
}

/// Extra trigger words, keyed by intent name ("category", "sentiment", ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentsConfig {
    #[serde(default)]
    pub extra_triggers: BTreeMap<String, Vec<String>>,
}

/// Router tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// How many words to request when describing a topic
    pub topic_words: Option<usize>,
}

impl RouterConfig {
    pub fn topic_words(&self) -> usize {
        self.topic_words.unwrap_or(DEFAULT_TOPIC_WORDS)
    }
}

/// Summarizer selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub kind: Option<String>, // "llm", "extractive"
    pub max_tokens: Option<usize>,
}

impl SummarizerConfig {
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("llm")
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.unwrap_or(DEFAULT_SUMMARY_MAX_TOKENS)
    }
}

/// A category label plus the seed text its centroid is fitted on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub label: String,
    pub description: String,
}

/// A topic the topic backend may assign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub id: usize,
    pub words: Vec<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub intents: IntentsConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// LLM adapter name, "none" when no `[llm]` section is present.
    pub fn llm_adapter(&self) -> &str {
        self.llm
            .as_ref()
            .and_then(|l| l.adapter.as_deref())
            .unwrap_or("none")
    }
}

/// Tables merge key by key; any other value in `b` replaces the one in `a`.
/// Arrays are replaced wholesale, so an override file can shrink `[[topics]]`.
fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create file");
        file.write_all(body.as_bytes()).expect("write file");
        path
    }

    #[test]
    fn config_from_string() {
        let toml = r#"
            [llm]
            adapter = "remote"

            [llm.remote]
            api_url = "http://localhost:11434/v1/chat/completions"
            model = "llama3"

            [intents.extra_triggers]
            sentiment = ["mood"]

            [router]
            topic_words = 5

            [[categories]]
            label = "Politics"
            description = "government, elections, parliament"

            [[topics]]
            id = 0
            words = ["election", "vote"]
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.llm_adapter(), "remote");
        assert_eq!(cfg.intents.extra_triggers["sentiment"], vec!["mood".to_string()]);
        assert_eq!(cfg.router.topic_words(), 5);
        assert_eq!(cfg.categories[0].label, "Politics");
        assert_eq!(cfg.topics[0].words.len(), 2);
        assert_eq!(cfg.summarizer.kind(), "llm");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.llm_adapter(), "none");
        assert_eq!(cfg.router.topic_words(), DEFAULT_TOPIC_WORDS);
        assert_eq!(cfg.summarizer.max_tokens(), DEFAULT_SUMMARY_MAX_TOKENS);
        assert!(cfg.categories.is_empty());
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let defaults = write_toml(
            &dir,
            "config.default.toml",
            r#"
                [router]
                topic_words = 10

                [summarizer]
                kind = "llm"
                max_tokens = 300

                [[topics]]
                id = 0
                words = ["a"]

                [[topics]]
                id = 1
                words = ["b"]
            "#,
        );
        let overrides = write_toml(
            &dir,
            "config.toml",
            r#"
                [summarizer]
                kind = "extractive"

                [[topics]]
                id = 7
                words = ["c"]
            "#,
        );

        let cfg = Config::load_with_defaults(Some(&defaults), Some(&overrides))
            .await
            .expect("load config");

        assert_eq!(cfg.router.topic_words(), 10);
        assert_eq!(cfg.summarizer.kind(), "extractive");
        assert_eq!(cfg.summarizer.max_tokens(), 300);
        assert_eq!(cfg.topics.len(), 1);
        assert_eq!(cfg.topics[0].id, 7);
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let cfg = Config::load_with_defaults(Some(&missing), None)
            .await
            .expect("load config");
        assert_eq!(cfg.llm_adapter(), "none");
    }

    #[tokio::test]
    async fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_toml(&dir, "broken.toml", "[router\ntopic_words = 3");
        let err = Config::from_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML configuration"));
    }
}
