//! Query routing: classify the question, run the matching backend, render
//! the answer.
//!
//! Every call to [`QueryRouter::route`] produces a string. Backend failures
//! are rendered as an explanation naming the failing capability, which is
//! never the same text as the "didn't understand" help message.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::capabilities::{
    Classifier, Entity, EntityExtractor, FeatureExtractor, SentimentAnalyzer, Summarizer, TopicModeler,
    UnfittedModelError,
};
use crate::intent::{Intent, IntentClassifier};

/// Response for queries no intent matched.
pub const HELP_MESSAGE: &str =
    "Sorry, I didn't understand the query. Try asking about: category, sentiment, entities, topic, or summary.";

/// Capability names used in error reports.
pub mod capability {
    pub const FEATURE_EXTRACTOR: &str = "feature extractor";
    pub const CLASSIFIER: &str = "classifier";
    pub const SENTIMENT_ANALYZER: &str = "sentiment analyzer";
    pub const ENTITY_EXTRACTOR: &str = "entity extractor";
    pub const TOPIC_MODELER: &str = "topic modeler";
    pub const SUMMARIZER: &str = "summarizer";
}

/// Typed outcome of a routed query, one case per intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum AnalysisResult {
    Category { label: String },
    Sentiment { label: String, polarity: f64 },
    Entities { entities: Vec<Entity> },
    Topic { id: usize, words: Option<Vec<String>> },
    Summary { text: String },
    Unknown,
}

impl AnalysisResult {
    pub fn intent(&self) -> Intent {
        match self {
            AnalysisResult::Category { .. } => Intent::Category,
            AnalysisResult::Sentiment { .. } => Intent::Sentiment,
            AnalysisResult::Entities { .. } => Intent::Entities,
            AnalysisResult::Topic { .. } => Intent::Topic,
            AnalysisResult::Summary { .. } => Intent::Summary,
            AnalysisResult::Unknown => Intent::Unknown,
        }
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisResult::Category { label } => write!(f, "Predicted Category: {}", label),
            AnalysisResult::Sentiment { label, polarity } => {
                write!(f, "Sentiment: {} (polarity: {:.2})", label, polarity)
            }
            AnalysisResult::Entities { entities } if entities.is_empty() => f.write_str("No entities found."),
            AnalysisResult::Entities { entities } => {
                let rendered: Vec<String> = entities
                    .iter()
                    .map(|e| format!("{} [{}]", e.text, e.label))
                    .collect();
                write!(f, "Entities found: {}", rendered.join(", "))
            }
            AnalysisResult::Topic { id, words: Some(words) } if !words.is_empty() => {
                write!(f, "Main topic #{}: {}", id, words.join(", "))
            }
            AnalysisResult::Topic { id, .. } => write!(f, "Main topic #{}", id),
            AnalysisResult::Summary { text } => write!(f, "Summary: {}", text),
            AnalysisResult::Unknown => f.write_str(HELP_MESSAGE),
        }
    }
}

/// A capability failed while answering a query.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("the {capability} used for {intent} queries has not been fitted yet")]
    Unfitted {
        intent: Intent,
        capability: &'static str,
        #[source]
        source: UnfittedModelError,
    },

    #[error("the {capability} used for {intent} queries failed: {cause:#}")]
    Backend {
        intent: Intent,
        capability: &'static str,
        cause: anyhow::Error,
    },
}

impl RouterError {
    /// Wrap a capability error, keeping the unfitted case apart.
    pub fn from_capability(intent: Intent, capability: &'static str, err: anyhow::Error) -> Self {
        match err.downcast::<UnfittedModelError>() {
            Ok(source) => RouterError::Unfitted {
                intent,
                capability,
                source,
            },
            Err(cause) => RouterError::Backend {
                intent,
                capability,
                cause,
            },
        }
    }

    pub fn intent(&self) -> Intent {
        match self {
            RouterError::Unfitted { intent, .. } | RouterError::Backend { intent, .. } => *intent,
        }
    }

    pub fn capability(&self) -> &'static str {
        match self {
            RouterError::Unfitted { capability, .. } | RouterError::Backend { capability, .. } => capability,
        }
    }

    /// Text shown to the user instead of an answer.
    pub fn user_message(&self) -> String {
        format!("Sorry, I couldn't answer that: {}.", self)
    }
}

/// The backends a router dispatches to.
#[derive(Clone)]
pub struct Capabilities {
    pub feature_extractor: Arc<dyn FeatureExtractor>,
    pub classifier: Arc<dyn Classifier>,
    pub sentiment: Arc<dyn SentimentAnalyzer>,
    pub entities: Arc<dyn EntityExtractor>,
    pub topics: Arc<dyn TopicModeler>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// Called with the raw query and its detected intent on every routed query.
pub type IntentHook = Arc<dyn Fn(&str, Intent) + Send + Sync>;

#[async_trait::async_trait]
trait IntentHandler: Send + Sync {
    async fn handle(&self, article: &str) -> Result<AnalysisResult, RouterError>;
}

struct CategoryHandler {
    features: Arc<dyn FeatureExtractor>,
    classifier: Arc<dyn Classifier>,
}

#[async_trait::async_trait]
impl IntentHandler for CategoryHandler {
    async fn handle(&self, article: &str) -> Result<AnalysisResult, RouterError> {
        let features = self
            .features
            .transform(&[article])
            .await
            .map_err(|e| RouterError::from_capability(Intent::Category, capability::FEATURE_EXTRACTOR, e))?;
        let labels = self
            .classifier
            .predict(&features)
            .await
            .map_err(|e| RouterError::from_capability(Intent::Category, capability::CLASSIFIER, e))?;
        let label = labels.into_iter().next().ok_or_else(|| RouterError::Backend {
            intent: Intent::Category,
            capability: capability::CLASSIFIER,
            cause: anyhow::anyhow!("no label predicted for the article"),
        })?;
        Ok(AnalysisResult::Category { label })
    }
}

struct SentimentHandler {
    analyzer: Arc<dyn SentimentAnalyzer>,
}

#[async_trait::async_trait]
impl IntentHandler for SentimentHandler {
    async fn handle(&self, article: &str) -> Result<AnalysisResult, RouterError> {
        let score = self
            .analyzer
            .analyze(article)
            .await
            .map_err(|e| RouterError::from_capability(Intent::Sentiment, capability::SENTIMENT_ANALYZER, e))?;
        Ok(AnalysisResult::Sentiment {
            label: self.analyzer.label_sentiment(score.polarity),
            polarity: score.polarity,
        })
    }
}

struct EntitiesHandler {
    extractor: Arc<dyn EntityExtractor>,
}

#[async_trait::async_trait]
impl IntentHandler for EntitiesHandler {
    async fn handle(&self, article: &str) -> Result<AnalysisResult, RouterError> {
        let entities = self
            .extractor
            .extract(article)
            .await
            .map_err(|e| RouterError::from_capability(Intent::Entities, capability::ENTITY_EXTRACTOR, e))?;
        Ok(AnalysisResult::Entities { entities })
    }
}

struct TopicHandler {
    modeler: Arc<dyn TopicModeler>,
    words: usize,
}

#[async_trait::async_trait]
impl IntentHandler for TopicHandler {
    async fn handle(&self, article: &str) -> Result<AnalysisResult, RouterError> {
        let id = self
            .modeler
            .assign_topic(article)
            .await
            .map_err(|e| RouterError::from_capability(Intent::Topic, capability::TOPIC_MODELER, e))?;

        // Word lookup is the one step allowed to degrade: keep the id.
        let words = match self.modeler.get_topic_words(id, self.words).await {
            Ok(words) => Some(words),
            Err(e) => {
                warn!("Topic word lookup failed for topic {}: {:#}", id, e);
                None
            }
        };
        Ok(AnalysisResult::Topic { id, words })
    }
}

struct SummaryHandler {
    summarizer: Arc<dyn Summarizer>,
}

#[async_trait::async_trait]
impl IntentHandler for SummaryHandler {
    async fn handle(&self, article: &str) -> Result<AnalysisResult, RouterError> {
        let text = self
            .summarizer
            .summarize(article)
            .await
            .map_err(|e| RouterError::from_capability(Intent::Summary, capability::SUMMARIZER, e))?;
        Ok(AnalysisResult::Summary { text })
    }
}

/// Routes article questions to analysis backends.
///
/// The dispatch table is built in [`QueryRouter::new`] and never changes, so a
/// router can be shared behind an `Arc` and called concurrently.
pub struct QueryRouter {
    classifier: IntentClassifier,
    handlers: HashMap<Intent, Box<dyn IntentHandler>>,
    on_intent: Option<IntentHook>,
}

impl QueryRouter {
    /// `topic_words` is how many words are requested when describing a topic.
    pub fn new(classifier: IntentClassifier, capabilities: Capabilities, topic_words: usize) -> Self {
        let mut handlers: HashMap<Intent, Box<dyn IntentHandler>> = HashMap::new();
        handlers.insert(
            Intent::Category,
            Box::new(CategoryHandler {
                features: capabilities.feature_extractor,
                classifier: capabilities.classifier,
            }),
        );
        handlers.insert(
            Intent::Sentiment,
            Box::new(SentimentHandler {
                analyzer: capabilities.sentiment,
            }),
        );
        handlers.insert(
            Intent::Entities,
            Box::new(EntitiesHandler {
                extractor: capabilities.entities,
            }),
        );
        handlers.insert(
            Intent::Topic,
            Box::new(TopicHandler {
                modeler: capabilities.topics,
                words: topic_words,
            }),
        );
        handlers.insert(
            Intent::Summary,
            Box::new(SummaryHandler {
                summarizer: capabilities.summarizer,
            }),
        );

        Self {
            classifier,
            handlers,
            on_intent: None,
        }
    }

    /// Built-in keyword table and the default topic word count.
    pub fn with_defaults(capabilities: Capabilities) -> Self {
        Self::new(IntentClassifier::default(), capabilities, common::DEFAULT_TOPIC_WORDS)
    }

    /// Install a callback notified of every detected intent.
    pub fn with_intent_hook(mut self, hook: IntentHook) -> Self {
        self.on_intent = Some(hook);
        self
    }

    /// Classify and dispatch, returning the typed result.
    pub async fn answer(&self, query: &str, article: &str) -> Result<AnalysisResult, RouterError> {
        let intent = self.classifier.classify(query);
        debug!(%intent, "detected query intent");
        if let Some(hook) = &self.on_intent {
            hook(query, intent);
        }

        match self.handlers.get(&intent) {
            Some(handler) => handler.handle(article).await,
            None => Ok(AnalysisResult::Unknown),
        }
    }

    /// Classify, dispatch and render. Never fails.
    pub async fn route(&self, query: &str, article: &str) -> String {
        match self.answer(query, article).await {
            Ok(result) => result.to_string(),
            Err(e) => {
                warn!(intent = %e.intent(), capability = e.capability(), "query failed: {}", e);
                e.user_message()
            }
        }
    }
}
