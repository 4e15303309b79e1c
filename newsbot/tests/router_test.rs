use std::sync::{Arc, Mutex};

use anyhow::Result;
use newsbot::capabilities::{
    Classifier, Entity, EntityExtractor, FeatureExtractor, FeatureMatrix, SentimentAnalyzer, SentimentScore,
    Summarizer, TopicModeler, UnfittedModelError,
};
use newsbot::router::{capability, HELP_MESSAGE};
use newsbot::{AnalysisResult, Capabilities, Intent, IntentClassifier, QueryRouter, RouterError};

const ARTICLE: &str = "The finance minister announced a new budget on Tuesday. \
                       Markets reacted calmly. Opposition leaders criticised the plan.";

struct FakeFeatures {
    fitted: bool,
}

#[async_trait::async_trait]
impl FeatureExtractor for FakeFeatures {
    async fn fit_transform(&self, texts: &[&str]) -> Result<FeatureMatrix> {
        Ok(FeatureMatrix::new(texts.iter().map(|t| vec![t.len() as f32]).collect()))
    }

    async fn transform(&self, texts: &[&str]) -> Result<FeatureMatrix> {
        if !self.fitted {
            return Err(UnfittedModelError.into());
        }
        self.fit_transform(texts).await
    }
}

struct FakeClassifier {
    labels: Vec<String>,
}

#[async_trait::async_trait]
impl Classifier for FakeClassifier {
    async fn predict(&self, _features: &FeatureMatrix) -> Result<Vec<String>> {
        Ok(self.labels.clone())
    }
}

struct FakeSentiment {
    polarity: Option<f64>,
}

#[async_trait::async_trait]
impl SentimentAnalyzer for FakeSentiment {
    async fn analyze(&self, _text: &str) -> Result<SentimentScore> {
        match self.polarity {
            Some(polarity) => Ok(SentimentScore { polarity }),
            None => anyhow::bail!("sentiment model unavailable"),
        }
    }
}

struct FakeEntities {
    entities: Vec<Entity>,
}

#[async_trait::async_trait]
impl EntityExtractor for FakeEntities {
    async fn extract(&self, _text: &str) -> Result<Vec<Entity>> {
        Ok(self.entities.clone())
    }
}

struct FakeTopics {
    id: usize,
    fitted: bool,
    words: Option<Vec<String>>,
    requested: Mutex<Option<usize>>,
}

#[async_trait::async_trait]
impl TopicModeler for FakeTopics {
    async fn assign_topic(&self, _text: &str) -> Result<usize> {
        if !self.fitted {
            return Err(anyhow::Error::new(UnfittedModelError).context("topic model is not loaded"));
        }
        Ok(self.id)
    }

    async fn get_topic_words(&self, _topic_id: usize, n: usize) -> Result<Vec<String>> {
        *self.requested.lock().unwrap() = Some(n);
        match &self.words {
            Some(words) => Ok(words.iter().take(n).cloned().collect()),
            None => anyhow::bail!("topic words not available"),
        }
    }
}

struct FakeSummarizer {
    fail: bool,
}

#[async_trait::async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("summarizer timed out");
        }
        Ok(text.split('.').next().unwrap_or_default().to_string())
    }
}

struct Fakes {
    fitted: bool,
    labels: Vec<String>,
    polarity: Option<f64>,
    entities: Vec<Entity>,
    topics_fitted: bool,
    topic_words: Option<Vec<String>>,
    summarizer_fails: bool,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            fitted: true,
            labels: vec!["Politics".to_string()],
            polarity: Some(0.25),
            entities: vec![],
            topics_fitted: true,
            topic_words: Some(vec!["budget".to_string(), "minister".to_string(), "tax".to_string()]),
            summarizer_fails: false,
        }
    }
}

impl Fakes {
    fn capabilities(self) -> (Capabilities, Arc<FakeTopics>) {
        let topics = Arc::new(FakeTopics {
            id: 3,
            fitted: self.topics_fitted,
            words: self.topic_words,
            requested: Mutex::new(None),
        });
        let capabilities = Capabilities {
            feature_extractor: Arc::new(FakeFeatures { fitted: self.fitted }),
            classifier: Arc::new(FakeClassifier { labels: self.labels }),
            sentiment: Arc::new(FakeSentiment {
                polarity: self.polarity,
            }),
            entities: Arc::new(FakeEntities {
                entities: self.entities,
            }),
            topics: topics.clone(),
            summarizer: Arc::new(FakeSummarizer {
                fail: self.summarizer_fails,
            }),
        };
        (capabilities, topics)
    }

    fn router(self) -> QueryRouter {
        QueryRouter::with_defaults(self.capabilities().0)
    }
}

#[tokio::test]
async fn test_category_query() {
    let router = Fakes::default().router();
    assert_eq!(router.route("What category is this?", ARTICLE).await, "Predicted Category: Politics");
}

#[tokio::test]
async fn test_sentiment_query() {
    let router = Fakes::default().router();
    assert_eq!(
        router.route("What is the sentiment of this article?", ARTICLE).await,
        "Sentiment: positive (polarity: 0.25)"
    );
}

#[tokio::test]
async fn test_empty_entities() {
    let router = Fakes::default().router();
    assert_eq!(router.route("entities please", ARTICLE).await, "No entities found.");
}

#[tokio::test]
async fn test_entities_in_order() {
    let router = Fakes {
        entities: vec![Entity::new("Finance Ministry", "ORG"), Entity::new("Tuesday", "DATE")],
        ..Fakes::default()
    }
    .router();
    assert_eq!(
        router.route("Which organization is mentioned?", ARTICLE).await,
        "Entities found: Finance Ministry [ORG], Tuesday [DATE]"
    );
}

#[tokio::test]
async fn test_topic_with_words() {
    let (capabilities, topics) = Fakes::default().capabilities();
    let router = QueryRouter::new(IntentClassifier::default(), capabilities, 2);
    assert_eq!(router.route("main topic?", ARTICLE).await, "Main topic #3: budget, minister");
    assert_eq!(*topics.requested.lock().unwrap(), Some(2));
}

#[tokio::test]
async fn test_topic_word_failure_keeps_id() {
    let router = Fakes {
        topic_words: None,
        ..Fakes::default()
    }
    .router();
    assert_eq!(router.route("what is the theme", ARTICLE).await, "Main topic #3");

    let result = router.answer("what is the theme", ARTICLE).await.unwrap();
    assert_eq!(result, AnalysisResult::Topic { id: 3, words: None });
}

#[tokio::test]
async fn test_summary_query() {
    let router = Fakes::default().router();
    assert_eq!(
        router.route("Summarize this please", ARTICLE).await,
        "Summary: The finance minister announced a new budget on Tuesday"
    );
}

#[tokio::test]
async fn test_unknown_query_gets_help() {
    let router = Fakes::default().router();
    let response = router.route("gibberish query", ARTICLE).await;
    assert_eq!(response, HELP_MESSAGE);
    for word in ["category", "sentiment", "entities", "topic", "summary"] {
        assert!(response.contains(word));
    }
}

#[tokio::test]
async fn test_unfitted_extractor_is_reported() {
    let router = Fakes {
        fitted: false,
        ..Fakes::default()
    }
    .router();

    let err = router.answer("classify this article", ARTICLE).await.unwrap_err();
    assert!(matches!(err, RouterError::Unfitted { intent: Intent::Category, .. }));
    assert_eq!(err.capability(), capability::FEATURE_EXTRACTOR);

    let response = router.route("classify this article", ARTICLE).await;
    assert_ne!(response, HELP_MESSAGE);
    assert!(response.contains("feature extractor"));
    assert!(response.contains("not been fitted"));
}

#[tokio::test]
async fn test_unfitted_topic_model_is_reported() {
    let router = Fakes {
        topics_fitted: false,
        ..Fakes::default()
    }
    .router();

    let err = router.answer("topic?", ARTICLE).await.unwrap_err();
    assert!(matches!(err, RouterError::Unfitted { intent: Intent::Topic, .. }));
    assert_eq!(err.capability(), capability::TOPIC_MODELER);

    let response = router.route("topic?", ARTICLE).await;
    assert_ne!(response, HELP_MESSAGE);
    assert!(response.contains("topic modeler"));
    assert!(response.contains("not been fitted"));
}

#[tokio::test]
async fn test_backend_failure_is_not_masked() {
    let router = Fakes {
        polarity: None,
        summarizer_fails: true,
        ..Fakes::default()
    }
    .router();

    let sentiment = router.route("what tone does it take", ARTICLE).await;
    assert!(sentiment.contains("sentiment analyzer"));
    assert!(sentiment.contains("sentiment model unavailable"));
    assert_ne!(sentiment, HELP_MESSAGE);

    let err = router.answer("give me the short version", ARTICLE).await.unwrap_err();
    assert!(matches!(err, RouterError::Backend { intent: Intent::Summary, .. }));
    assert!(err.to_string().contains("summarizer timed out"));
}

#[tokio::test]
async fn test_classifier_without_label_is_a_failure() {
    let router = Fakes {
        labels: vec![],
        ..Fakes::default()
    }
    .router();
    let err = router.answer("label it", ARTICLE).await.unwrap_err();
    assert_eq!(err.capability(), capability::CLASSIFIER);
}

#[tokio::test]
async fn test_intent_hook_sees_every_query() {
    let seen: Arc<Mutex<Vec<(String, Intent)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let router = Fakes::default().router().with_intent_hook(Arc::new(move |query: &str, intent: Intent| {
        sink.lock().unwrap().push((query.to_string(), intent));
    }));

    router.route("TONE?", ARTICLE).await;
    router.route("blah", ARTICLE).await;

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![("TONE?".to_string(), Intent::Sentiment), ("blah".to_string(), Intent::Unknown)]
    );
}

#[tokio::test]
async fn test_router_is_shareable_across_tasks() {
    let router = Arc::new(Fakes::default().router());
    let queries = ["category?", "sentiment?", "entities?", "topic?", "summary?", "???"];

    let handles: Vec<_> = queries
        .iter()
        .map(|q| {
            let router = router.clone();
            let q = q.to_string();
            tokio::spawn(async move { router.route(&q, ARTICLE).await })
        })
        .collect();

    let mut answers = Vec::new();
    for handle in handles {
        answers.push(handle.await.unwrap());
    }

    assert_eq!(answers[0], "Predicted Category: Politics");
    assert!(answers[1].starts_with("Sentiment: "));
    assert_eq!(answers[2], "No entities found.");
    assert!(answers[3].starts_with("Main topic #3"));
    assert!(answers[4].starts_with("Summary: "));
    assert_eq!(answers[5], HELP_MESSAGE);
}
