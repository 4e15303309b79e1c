// Library interface for newsbot modules
// This allows tests and other binaries to import modules

pub mod backends;
pub mod bootstrap;
pub mod capabilities;
pub mod intent;
pub mod llm;
pub mod router;

pub use intent::{Intent, IntentClassifier, KeywordTable};
pub use router::{AnalysisResult, Capabilities, QueryRouter, RouterError};
