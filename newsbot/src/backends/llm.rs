//! Analysis capabilities answered by prompting an LLM.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::capabilities::{Entity, EntityExtractor, SentimentAnalyzer, SentimentScore, Summarizer, TopicModeler};
use crate::llm::{generate_json, LlmProvider, LlmRequest, Summary};

/// Scores polarity in [-1, 1].
pub struct LlmSentimentAnalyzer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmSentimentAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentJson {
    polarity: f64,
}

#[async_trait::async_trait]
impl SentimentAnalyzer for LlmSentimentAnalyzer {
    async fn analyze(&self, text: &str) -> Result<SentimentScore> {
        let prompt = format!(
            r#"Rate the overall sentiment of this news article.

OUTPUT FORMAT (strict JSON):
{{"polarity": <number between -1.0 (very negative) and 1.0 (very positive), 0.0 is neutral>}}

ARTICLE:
{}
"#,
            text
        );

        let answer: SentimentJson = generate_json(self.provider.as_ref(), LlmRequest::structured(prompt, 30)).await?;
        anyhow::ensure!(answer.polarity.is_finite(), "polarity is not a finite number");

        Ok(SentimentScore {
            polarity: answer.polarity.clamp(-1.0, 1.0),
        })
    }
}

/// Named entity recognition, document order preserved.
pub struct LlmEntityExtractor {
    provider: Arc<dyn LlmProvider>,
}

impl LlmEntityExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Deserialize)]
struct EntitiesJson {
    #[serde(default)]
    entities: Vec<EntityJson>,
}

#[derive(Debug, Deserialize)]
struct EntityJson {
    text: String,
    label: String,
}

#[async_trait::async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Entity>> {
        let prompt = format!(
            r#"List the named entities in this news article, in order of first appearance.
Use the labels PERSON, ORG, GPE, LOC, EVENT, PRODUCT, DATE. Return an empty list if there are none.

OUTPUT FORMAT (strict JSON):
{{"entities": [{{"text": "entity as written", "label": "LABEL"}}]}}

ARTICLE:
{}
"#,
            text
        );

        let answer: EntitiesJson = generate_json(self.provider.as_ref(), LlmRequest::structured(prompt, 400)).await?;

        let entities: Vec<Entity> = answer
            .entities
            .into_iter()
            .filter_map(|e| {
                let text = e.text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(Entity::new(text, e.label.trim()))
                }
            })
            .collect();
        debug!("Extracted {} entities", entities.len());
        Ok(entities)
    }
}

/// A topic the modeler can assign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: usize,
    pub words: Vec<String>,
}

/// Picks one topic out of a fixed table. Text in, id out.
pub struct LlmTopicModeler {
    provider: Arc<dyn LlmProvider>,
    topics: Vec<Topic>,
}

impl LlmTopicModeler {
    pub fn new(provider: Arc<dyn LlmProvider>, topics: Vec<Topic>) -> Self {
        Self { provider, topics }
    }

    fn topic(&self, id: usize) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }
}

#[derive(Debug, Deserialize)]
struct TopicJson {
    topic_id: usize,
}

#[async_trait::async_trait]
impl TopicModeler for LlmTopicModeler {
    async fn assign_topic(&self, text: &str) -> Result<usize> {
        anyhow::ensure!(!self.topics.is_empty(), "no topics configured");

        let listing: Vec<String> = self
            .topics
            .iter()
            .map(|t| format!("{}: {}", t.id, t.words.join(", ")))
            .collect();
        let prompt = format!(
            r#"Which of these topics best describes the news article? Each line is "<id>: <topic words>".

{}

OUTPUT FORMAT (strict JSON):
{{"topic_id": <id>}}

ARTICLE:
{}
"#,
            listing.join("\n"),
            text
        );

        let answer: TopicJson = generate_json(self.provider.as_ref(), LlmRequest::structured(prompt, 20)).await?;
        self.topic(answer.topic_id)
            .map(|t| t.id)
            .with_context(|| format!("model answered unknown topic id {}", answer.topic_id))
    }

    async fn get_topic_words(&self, topic_id: usize, n: usize) -> Result<Vec<String>> {
        let topic = self
            .topic(topic_id)
            .with_context(|| format!("unknown topic id {}", topic_id))?;
        Ok(topic.words.iter().take(n).cloned().collect())
    }
}

/// Hierarchical LLM summary flattened into one line.
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    max_tokens: usize,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: usize) -> Self {
        Self { provider, max_tokens }
    }
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let summary = self.provider.summarize(text, self.max_tokens).await?;
        info!(
            "LLM summarization successful: {} bullets, {} tokens",
            summary.bullets.len(),
            summary.usage.total_tokens
        );
        Ok(render_summary(&summary))
    }
}

/// Headline followed by the bullets, each as a sentence.
pub fn render_summary(summary: &Summary) -> String {
    std::iter::once(summary.headline.as_str())
        .chain(summary.bullets.iter().map(String::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(as_sentence)
        .collect::<Vec<_>>()
        .join(" ")
}

fn as_sentence(s: &str) -> String {
    if s.ends_with(['.', '!', '?']) {
        s.to_string()
    } else {
        format!("{}.", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::UsageMetadata;

    #[test]
    fn test_render_summary() {
        let summary = Summary {
            headline: "Parliament passes budget".to_string(),
            bullets: vec!["Vote was close".to_string(), "  ".to_string(), "Opposition objects!".to_string()],
            usage: UsageMetadata::default(),
        };
        assert_eq!(
            render_summary(&summary),
            "Parliament passes budget. Vote was close. Opposition objects!"
        );
    }

    #[test]
    fn test_render_summary_headline_only() {
        let summary = Summary {
            headline: "Nothing else to say.".to_string(),
            bullets: vec![],
            usage: UsageMetadata::default(),
        };
        assert_eq!(render_summary(&summary), "Nothing else to say.");
    }
}
