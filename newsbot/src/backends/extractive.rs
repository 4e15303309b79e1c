// Extractive summarizer: no model, first sentences of the article
use anyhow::Result;

use super::llm::render_summary;
use crate::capabilities::Summarizer;
use crate::llm::{Summary, UsageMetadata};

const HEADLINE_CHARS: usize = 100;
const BULLET_CHARS: usize = 200;

/// Takes the first sentence as headline and up to `max_bullets` more as bullets.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_bullets: usize,
}

impl ExtractiveSummarizer {
    pub fn new(max_bullets: usize) -> Self {
        Self { max_bullets }
    }

    pub fn summary(&self, text: &str) -> Option<Summary> {
        let sentences = split_sentences(text);

        let headline = truncate(sentences.first()?, HEADLINE_CHARS);

        let bullets = sentences
            .iter()
            .skip(1)
            .take(self.max_bullets)
            .map(|s| truncate(s, BULLET_CHARS))
            .collect();

        Some(Summary {
            headline,
            bullets,
            usage: UsageMetadata::default(),
        })
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait::async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let summary = self
            .summary(text)
            .ok_or_else(|| anyhow::anyhow!("article has no sentences to summarize"))?;
        Ok(render_summary(&summary))
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Sentences with their closing marks kept. A mark only ends a sentence at the
/// end of the text, or when whitespace and then a non-lower-case character
/// follow it, so "3.5%" and "the U.S. economy" stay whole.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }

        let rest = &text[end..];
        let after_space = rest.trim_start();
        let boundary = rest.is_empty()
            || (after_space.len() < rest.len() && after_space.chars().next().map_or(true, |n| !n.is_lowercase()));
        if boundary {
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
