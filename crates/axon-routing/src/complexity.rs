//! Heuristic complexity scoring for incoming queries
//!
//! Derives a score in [0, 1] from the query text alone so identical
//! queries always score identically. No ML pipeline — pure heuristics
//! over word and sentence structure.

use crate::error::RoutingError;

/// Word count above which a query is tagged as long
const LONG_QUERY_WORDS: usize = 100;

/// Component value above which its factor tag is emitted
const FACTOR_THRESHOLD: f64 = 0.6;

/// Named contributor to a complexity score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityFactor {
    HighVocabularyComplexity,
    ComplexGrammar,
    LongQuery,
}

impl ComplexityFactor {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighVocabularyComplexity => "high_vocabulary_complexity",
            Self::ComplexGrammar => "complex_grammar",
            Self::LongQuery => "long_query",
        }
    }
}

impl std::fmt::Display for ComplexityFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ComplexityFactor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of evaluating a query's complexity
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ComplexityReport {
    /// Score in [0, 1]; higher means a more capable model is warranted
    pub score: f64,
    /// Contributing factors, ordered by contribution magnitude
    pub factors: Vec<ComplexityFactor>,
}

/// Named feature families selectable by the complexity RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    Vocabulary,
    Grammar,
    Length,
}

impl Feature {
    fn parse(name: &str) -> Result<Self, RoutingError> {
        match name {
            "vocabulary" => Ok(Self::Vocabulary),
            "grammar" => Ok(Self::Grammar),
            "length" => Ok(Self::Length),
            other => Err(RoutingError::UnknownFeature {
                name: other.to_string(),
            }),
        }
    }
}

/// Evaluate a query with the default feature set
///
/// Deterministic over the query text; metadata never participates.
pub fn evaluate(query: &str) -> ComplexityReport {
    let (vocabulary, grammar, word_count) = components(query);

    let score = (0.6 * vocabulary + 0.4 * grammar).clamp(0.0, 1.0);

    // Factor order reflects contribution magnitude: the weighted
    // vocabulary term dominates, then grammar, then raw length.
    let mut factors = Vec::new();
    if vocabulary > FACTOR_THRESHOLD {
        factors.push(ComplexityFactor::HighVocabularyComplexity);
    }
    if grammar > FACTOR_THRESHOLD {
        factors.push(ComplexityFactor::ComplexGrammar);
    }
    if word_count > LONG_QUERY_WORDS {
        factors.push(ComplexityFactor::LongQuery);
    }

    ComplexityReport { score, factors }
}

/// Evaluate a query, restricting reported factors to the named features
///
/// An empty selector behaves exactly like [`evaluate`]. The score always
/// follows the default blend so that scores stay comparable across calls.
///
/// # Errors
///
/// Returns [`RoutingError::UnknownFeature`] when a feature name is not
/// recognized.
pub fn evaluate_with_features(
    query: &str,
    features: &[String],
) -> Result<ComplexityReport, RoutingError> {
    let mut report = evaluate(query);

    if features.is_empty() {
        return Ok(report);
    }

    let selected = features
        .iter()
        .map(|name| Feature::parse(name))
        .collect::<Result<Vec<_>, _>>()?;

    report.factors.retain(|factor| {
        selected.iter().any(|feature| match feature {
            Feature::Vocabulary => *factor == ComplexityFactor::HighVocabularyComplexity,
            Feature::Grammar => *factor == ComplexityFactor::ComplexGrammar,
            Feature::Length => *factor == ComplexityFactor::LongQuery,
        })
    });

    Ok(report)
}

/// Compute the vocabulary and grammar components plus the word count
fn components(query: &str) -> (f64, f64, usize) {
    let words: Vec<&str> = query.split_whitespace().collect();
    let word_count = words.len();

    let avg_word_len = if word_count == 0 {
        0.0
    } else {
        let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
        total_chars as f64 / word_count as f64
    };

    let vocabulary =
        0.5 * (word_count as f64 / 100.0).min(1.0) + 0.5 * (avg_word_len / 10.0).min(1.0);

    let sentence_count = query
        .split(['.', '!', '?'])
        .filter(|part| !part.trim().is_empty())
        .count()
        .max(1);

    let avg_sentence_len = word_count as f64 / sentence_count as f64;
    let grammar = (avg_sentence_len / 20.0).min(1.0);

    (vocabulary, grammar, word_count)
}
