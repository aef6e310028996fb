//! Cheap keyword/length heuristic for obviously vague goals.
//!
//! Only consulted when `generation.vagueness_prefilter` is enabled; otherwise every goal
//! goes to the classification stage.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Goals made only of these words say what area, not what outcome
static BROAD_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "computers", "computer", "tech", "technology", "business", "money", "success",
        "career", "job", "work", "science", "art", "arts", "health", "engineering",
        "programming", "coding", "design", "finance", "marketing", "management", "education",
        "medicine", "law", "music", "sports", "something", "anything", "stuff", "things",
        "better", "rich", "famous", "happy", "successful", "good",
    ]
    .into_iter()
    .collect()
});

/// Words that carry no subject matter
static FILLER: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "want", "to", "be", "become", "get", "into", "in", "do", "a", "an", "the", "some",
        "more", "my", "me", "like", "would", "work", "with", "on", "and", "or", "of", "at",
        "learn", "study", "have", "make", "go",
    ]
    .into_iter()
    .collect()
});

const MIN_MEANINGFUL_WORDS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct VaguenessVerdict {
    pub vague: bool,
    pub reason: Option<String>,
    /// Subject words left after dropping filler, used to seed local suggestions
    pub topic: String,
}

pub fn assess(goal: &str) -> VaguenessVerdict {
    let words: Vec<String> = goal
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let meaningful: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !FILLER.contains(w))
        .collect();
    let topic = meaningful.join(" ");

    if meaningful.is_empty() {
        return VaguenessVerdict {
            vague: true,
            reason: Some("the goal does not name a field or outcome".to_string()),
            topic,
        };
    }

    if meaningful.iter().all(|w| BROAD_TERMS.contains(w)) {
        return VaguenessVerdict {
            vague: true,
            reason: Some(format!(
                "\"{}\" names a broad area rather than a concrete outcome",
                topic
            )),
            topic,
        };
    }

    if meaningful.len() < MIN_MEANINGFUL_WORDS {
        return VaguenessVerdict {
            vague: true,
            reason: Some("the goal is too short to plan against".to_string()),
            topic,
        };
    }

    VaguenessVerdict {
        vague: false,
        reason: None,
        topic,
    }
}

/// Three first-person rewrites used when the pre-filter answers locally
pub fn local_suggestions(topic: &str) -> Vec<String> {
    let topic = if topic.trim().is_empty() {
        "my chosen field"
    } else {
        topic.trim()
    };
    vec![
        format!("I want to land an entry-level role in {topic} by building a portfolio of projects"),
        format!("I want to earn a recognised certification in {topic} and apply it at work"),
        format!("I want to specialise in one area of {topic} and become the go-to person for it on my team"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_broad_word_is_vague() {
        let v = assess("computers");
        assert!(v.vague);
        assert_eq!(v.topic, "computers");
    }

    #[test]
    fn test_filler_only_is_vague() {
        assert!(assess("I want to be").vague);
        assert!(assess("   ").vague);
    }

    #[test]
    fn test_broad_terms_with_filler_are_vague() {
        assert!(assess("I want to get into tech and business").vague);
    }

    #[test]
    fn test_specific_goal_passes() {
        let v = assess("I want to become an NLP-focused machine learning engineer");
        assert!(!v.vague);
        assert!(v.reason.is_none());
    }

    #[test]
    fn test_suggestions_are_first_person() {
        let s = local_suggestions("computers");
        assert_eq!(s.len(), 3);
        assert!(s.iter().all(|x| x.starts_with("I ")));
        assert!(s[0].contains("computers"));
    }
}
