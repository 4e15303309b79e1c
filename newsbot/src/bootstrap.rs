//! Wiring: configuration in, ready-to-use router out.

use std::sync::Arc;

use anyhow::{Context, Result};
use common::{CategoryConfig, Config, IntentsConfig, LlmConfig};
use tracing::info;

use crate::backends::{
    CentroidClassifier, EmbeddingFeatureExtractor, ExtractiveSummarizer, LlmEntityExtractor, LlmSentimentAnalyzer,
    LlmSummarizer, LlmTopicModeler, Topic,
};
use crate::capabilities::{FeatureExtractor, Summarizer};
use crate::intent::{Intent, IntentClassifier, KeywordTable};
use crate::llm::remote::RemoteLlmProvider;
use crate::llm::LlmProvider;
use crate::router::{Capabilities, QueryRouter};

/// Which endpoint a provider is created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmTask {
    Analysis,      // sentiment, entities, topics
    Embedding,     // category features
    Summarization, // summary questions
}

/// Create an LLM provider for a task, falling back to `[llm.remote]`
pub fn create_llm_provider(llm_config: &LlmConfig, task: LlmTask) -> Result<Arc<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("none");
    match adapter {
        "remote" => {
            let task_config = match task {
                LlmTask::Analysis => llm_config.analysis.as_ref(),
                LlmTask::Embedding => llm_config.embedding.as_ref(),
                LlmTask::Summarization => llm_config.summarization.as_ref(),
            };
            let remote_config = task_config
                .or(llm_config.remote.as_ref())
                .with_context(|| format!("Remote adapter selected but no LLM config found for {:?}", task))?;

            let api_key_env = remote_config
                .api_key_env
                .as_deref()
                .context("Missing api_key_env in remote config")?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = remote_config
                .api_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());
            let timeout_secs = remote_config.timeout_seconds.unwrap_or(30);
            let max_tokens = remote_config.max_tokens.unwrap_or(500);

            info!("{:?} LLM provider: {} at {}", task, model, api_url);
            let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(timeout_secs, max_tokens, 0.7);
            Ok(Arc::new(provider))
        }
        "none" => anyhow::bail!("LLM adapter 'none' cannot serve {:?} requests", task),
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

/// Built-in table plus configured extra triggers.
pub fn keyword_table(intents: &IntentsConfig) -> Result<KeywordTable> {
    let mut table = KeywordTable::builtin();
    for (name, words) in &intents.extra_triggers {
        let intent: Intent = name
            .parse()
            .with_context(|| format!("invalid key in [intents.extra_triggers]: {}", name))?;
        anyhow::ensure!(intent != Intent::Unknown, "the unknown intent cannot have triggers");
        table = table.with_extra_triggers(intent, words);
    }
    Ok(table)
}

pub fn intent_classifier(config: &Config) -> Result<IntentClassifier> {
    Ok(IntentClassifier::new(keyword_table(&config.intents)?))
}

/// Fit the extractor on the category seed texts and build one centroid per label.
pub async fn fit_category_classifier(
    extractor: &dyn FeatureExtractor,
    categories: &[CategoryConfig],
) -> Result<CentroidClassifier> {
    anyhow::ensure!(!categories.is_empty(), "no [[categories]] configured");

    let seeds: Vec<String> = categories
        .iter()
        .map(|c| format!("{}: {}", c.label, c.description))
        .collect();
    let seed_refs: Vec<&str> = seeds.iter().map(String::as_str).collect();
    let labels: Vec<String> = categories.iter().map(|c| c.label.clone()).collect();

    let features = extractor
        .fit_transform(&seed_refs)
        .await
        .context("Failed to fit category features")?;
    CentroidClassifier::fit(&labels, &features)
}

/// Create and fit every backend the router needs.
pub async fn build_capabilities(config: &Config) -> Result<Capabilities> {
    let llm = config
        .llm
        .as_ref()
        .context("an [llm] section is required to answer article questions")?;

    let analysis = create_llm_provider(llm, LlmTask::Analysis)?;
    let embedding = create_llm_provider(llm, LlmTask::Embedding)?;

    let feature_extractor = Arc::new(EmbeddingFeatureExtractor::new(embedding));
    let classifier = fit_category_classifier(feature_extractor.as_ref(), &config.categories).await?;
    info!("Category classifier ready: {}", classifier.labels().collect::<Vec<_>>().join(", "));

    anyhow::ensure!(!config.topics.is_empty(), "no [[topics]] configured");
    let topics = config
        .topics
        .iter()
        .map(|t| Topic {
            id: t.id,
            words: t.words.clone(),
        })
        .collect();

    let summarizer: Arc<dyn Summarizer> = match config.summarizer.kind() {
        "llm" => Arc::new(LlmSummarizer::new(
            create_llm_provider(llm, LlmTask::Summarization)?,
            config.summarizer.max_tokens(),
        )),
        "extractive" => Arc::new(ExtractiveSummarizer::default()),
        other => anyhow::bail!("Unknown summarizer kind: {}", other),
    };

    Ok(Capabilities {
        feature_extractor,
        classifier: Arc::new(classifier),
        sentiment: Arc::new(LlmSentimentAnalyzer::new(analysis.clone())),
        entities: Arc::new(LlmEntityExtractor::new(analysis.clone())),
        topics: Arc::new(LlmTopicModeler::new(analysis, topics)),
        summarizer,
    })
}

pub async fn build_router(config: &Config) -> Result<QueryRouter> {
    let classifier = intent_classifier(config)?;
    let capabilities = build_capabilities(config).await?;
    Ok(QueryRouter::new(classifier, capabilities, config.router.topic_words()))
}
