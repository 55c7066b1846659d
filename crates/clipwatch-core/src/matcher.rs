use crate::text::{normalize, similarity};
use crate::types::KeywordCategory;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// A keyword that matched a message, with the category it belongs to.
/// `keyword` is the raw source keyword, not its normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub category: String,
    pub keyword: String,
    pub score: f64,
}

/// Fuzzy keyword matching organized by category.
///
/// Categories are scanned in registration order and each contributes at
/// most one hit: the first keyword reaching the best similarity at or
/// above the threshold.
pub struct KeywordMatcher {
    categories: Vec<KeywordCategory>,
    similarity_threshold: f64,
}

impl KeywordMatcher {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            categories: Vec::new(),
            similarity_threshold: similarity_threshold.clamp(0.0, 1.0),
        }
    }

    /// Matcher preloaded with the stock category set.
    pub fn with_default_categories() -> Self {
        let mut matcher = Self::new(DEFAULT_SIMILARITY_THRESHOLD);
        for category in default_categories() {
            matcher.add_category(category);
        }
        matcher
    }

    pub fn add_category(&mut self, category: KeywordCategory) {
        self.categories.push(category);
    }

    /// Out-of-range thresholds are clamped to [0, 1].
    pub fn set_threshold(&mut self, threshold: f64) {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn categories(&self) -> &[KeywordCategory] {
        &self.categories
    }

    /// Best qualifying keyword per category, in category registration
    /// order. Categories with no keyword at or above the threshold are
    /// absent from the result.
    pub fn matches(&self, message: &str) -> Vec<KeywordHit> {
        let normalized = normalize(message);
        let mut hits = Vec::new();

        for category in &self.categories {
            let mut best: Option<(&str, f64)> = None;
            for keyword in &category.keywords {
                let score = similarity(&normalized, &normalize(keyword));
                if score < self.similarity_threshold {
                    continue;
                }
                // Strictly greater: the first keyword reaching the
                // maximum is retained.
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((keyword, score));
                }
            }
            if let Some((keyword, score)) = best {
                hits.push(KeywordHit {
                    category: category.name.clone(),
                    keyword: keyword.to_string(),
                    score,
                });
            }
        }

        hits
    }

    /// Similarity of the best qualifying keyword in `category_name`, or
    /// 0.0 when nothing qualifies.
    pub fn category_score(&self, message: &str, category_name: &str) -> f64 {
        self.matches(message)
            .into_iter()
            .find(|hit| hit.category == category_name)
            .map(|hit| hit.score)
            .unwrap_or(0.0)
    }
}

/// The stock category set: win/loss calls and hype emotes.
pub fn default_categories() -> Vec<KeywordCategory> {
    vec![
        category("wins", 1.0, &["W", "pog", "clutch", "insane", "ez", "gg", "wp"]),
        category("losses", 1.0, &["L", "ff", "sad", "rip", "unlucky", "oof"]),
        category("hype", 0.8, &["OMEGALUL", "KEKW", "PogChamp", "monkaS", "LUL"]),
    ]
}

fn category(name: &str, weight: f64, keywords: &[&str]) -> KeywordCategory {
    KeywordCategory {
        name: name.to_string(),
        keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(hits: &'a [KeywordHit], category: &str) -> Option<&'a KeywordHit> {
        hits.iter().find(|hit| hit.category == category)
    }

    #[test]
    fn exact_keyword_matches_its_category() {
        let matcher = KeywordMatcher::with_default_categories();
        let hits = matcher.matches("W");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, "wins");
        assert_eq!(hits[0].keyword, "W");
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn elongated_and_decorated_spam_still_matches() {
        let matcher = KeywordMatcher::with_default_categories();

        let hits = matcher.matches("WWWWWWW");
        assert_eq!(find(&hits, "wins").map(|hit| hit.keyword.as_str()), Some("W"));

        let hits = matcher.matches("Pogggg!!!");
        assert_eq!(find(&hits, "wins").map(|hit| hit.keyword.as_str()), Some("pog"));
    }

    #[test]
    fn unrelated_message_matches_nothing() {
        let matcher = KeywordMatcher::with_default_categories();
        assert!(matcher.matches("hello there chat").is_empty());
        assert!(matcher.matches("").is_empty());
    }

    #[test]
    fn hits_follow_registration_order() {
        let mut matcher = KeywordMatcher::new(0.8);
        matcher.add_category(category("first", 1.0, &["alpha"]));
        matcher.add_category(category("second", 1.0, &["alpha"]));
        let hits = matcher.matches("alpha");
        let names: Vec<&str> = hits.iter().map(|hit| hit.category.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn tie_break_keeps_first_keyword() {
        // Both keywords normalize to "g" and score 1.0 against "ggg";
        // the earlier one must win.
        let mut matcher = KeywordMatcher::new(0.8);
        matcher.add_category(category("laughs", 1.0, &["gg", "g"]));
        let hits = matcher.matches("ggg");
        assert_eq!(hits[0].keyword, "gg");
    }

    #[test]
    fn category_score_reports_similarity_or_zero() {
        let matcher = KeywordMatcher::with_default_categories();
        assert_eq!(matcher.category_score("W", "wins"), 1.0);
        assert_eq!(matcher.category_score("W", "losses"), 0.0);
        assert_eq!(matcher.category_score("nothing here", "wins"), 0.0);
        assert_eq!(matcher.category_score("W", "no-such-category"), 0.0);
    }

    #[test]
    fn threshold_filters_weak_matches() {
        let mut matcher = KeywordMatcher::new(0.8);
        matcher.add_category(category("wins", 1.0, &["clutch"]));
        // "cluch" vs "clutch": distance 1 over length 6.
        assert!(!matcher.matches("cluch").is_empty());
        matcher.set_threshold(0.9);
        assert!(matcher.matches("cluch").is_empty());
    }

    #[test]
    fn set_threshold_clamps_out_of_range() {
        let mut matcher = KeywordMatcher::new(0.8);
        matcher.set_threshold(1.5);
        assert_eq!(matcher.threshold(), 1.0);
        matcher.set_threshold(-0.2);
        assert_eq!(matcher.threshold(), 0.0);
    }

    #[test]
    fn default_categories_shape() {
        let categories = default_categories();
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["wins", "losses", "hype"]);
        assert!(categories.iter().all(|c| !c.keywords.is_empty()));
    }
}
