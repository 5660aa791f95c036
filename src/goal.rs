//! The run goal and the figures that can be read directly from its text.
//!
//! Extraction is purely lexical. Each helper returns the first plausible
//! match and `None` otherwise; nothing here guesses.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Digit-prefixed words ending in a street suffix, e.g. "1204 Oak Ridge Dr".
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d{1,6}\s+(?:[a-z0-9.'-]+\s+){1,4}?(?:st|street|ave|avenue|rd|road|blvd|boulevard|dr|drive|ln|lane|way|ct|court|pl|place|ter|terrace|pkwy|parkway|hwy|highway|cir|circle)\b\.?",
    )
    .expect("valid address regex")
});

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));

/// `$650k`, `$1.2m`, `650,000`, `650k`.
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\$\s*(\d[\d,]*(?:\.\d+)?)\s*([km])?\b|\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?)\b|\b(\d+(?:\.\d+)?)\s*([km])\b",
    )
    .expect("valid price regex")
});

/// "income of $150k", "salary: 120,000".
static INCOME_AFTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:income|salary)\D{0,20}?\$?\s*(\d[\d,]*(?:\.\d+)?)\s*([km])?\b")
        .expect("valid income regex")
});

/// "$150k annual income", "120,000 salary".
static INCOME_BEFORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$?\s*(\d[\d,]*(?:\.\d+)?)\s*([km])?\s+(?:(?:annual|yearly|household)\s+)?(?:income|salary)\b")
        .expect("valid income regex")
});

/// Words that mark the bare figure right after them as money.
const PRICE_CUES_BEFORE: &[&str] = &[
    "price", "priced", "cost", "costs", "costing", "budget", "worth", "valued", "listed", "asking",
    "under", "below", "over", "above", "around", "about", "max", "pay", "paying", "spend", "afford",
];

/// Words that mark the bare figure right before them as money.
const PRICE_CUES_AFTER: &[&str] = &[
    "house", "home", "condo", "townhouse", "townhome", "property", "apartment", "listing", "budget",
    "dollars", "usd", "purchase", "loan", "mortgage",
];

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:,\d{3})*(?:\.\d+)?\b").expect("valid number regex"));

/// Free-text request for one run, plus optional caller guidance.
///
/// Preferences, hints, emphasis and map focus are echoed in the report;
/// they never change how tool arguments are derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emphasis: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_focus: Option<String>,
}

impl Goal {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_preferences(mut self, preferences: Vec<String>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_emphasis(mut self, emphasis: Vec<String>) -> Self {
        self.emphasis = emphasis;
        self
    }

    pub fn with_map_focus(mut self, focus: impl Into<String>) -> Self {
        self.map_focus = Some(focus.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Street-address-like token, e.g. "123 Main St".
    pub fn address(&self) -> Option<String> {
        ADDRESS_RE
            .find(&self.text)
            .map(|m| m.as_str().trim_end_matches('.').trim().to_string())
    }

    /// First percentage figure (used as APR).
    pub fn percent(&self) -> Option<f64> {
        PERCENT_RE
            .captures(&self.text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// First currency-like figure of at least three digits (or with a k/m
    /// suffix), ignoring the income figure.
    ///
    /// Marked figures (`$`, comma grouping, k/m) win over bare digits. A
    /// bare figure counts only next to a price word ("a 450000 house",
    /// "budget 650000") and never when it reads as a year.
    pub fn price(&self) -> Option<f64> {
        self.price_match().map(|(value, _)| value)
    }

    /// Annual income figure stated near "income" or "salary".
    pub fn income(&self) -> Option<f64> {
        self.income_match().map(|(value, _)| value)
    }

    /// Bare 6 to 10 digit tokens, in order of appearance without repeats.
    ///
    /// Tokens that read as money or percentages (`$` prefix, comma
    /// grouping, `%` or k/m suffix) are not ZPIDs, and neither is the
    /// figure taken as the price.
    pub fn zpids(&self) -> Vec<u64> {
        let text = self.text.as_str();
        let price_span = self.price_match().map(|(_, span)| span);
        let mut ids = Vec::new();
        for m in NUMBER_RE.find_iter(text) {
            if price_span.as_ref().is_some_and(|span| overlaps(span, &m.range())) {
                continue;
            }
            let token = m.as_str();
            if !(6..=10).contains(&token.len()) || !token.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let before = text[..m.start()].trim_end();
            if before.ends_with('$') {
                continue;
            }
            let after = text[m.end()..].trim_start();
            let mut rest = after.chars();
            match (rest.next(), rest.next()) {
                (Some('%'), _) => continue,
                (Some(c), next) if matches!(c, 'k' | 'K' | 'm' | 'M') && !next.is_some_and(char::is_alphanumeric) => {
                    continue
                }
                _ => {}
            }
            if let Ok(id) = token.parse::<u64>() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn price_match(&self) -> Option<(f64, Range<usize>)> {
        let income_span = self.income_match().map(|(_, span)| span);
        let clear_of_income =
            |range: &Range<usize>| !income_span.as_ref().is_some_and(|span| overlaps(span, range));

        let marked = PRICE_RE.captures_iter(&self.text).find_map(|caps| {
            let whole = caps.get(0)?;
            if !clear_of_income(&whole.range()) {
                return None;
            }
            let (digits, suffix) = if let Some(d) = caps.get(1) {
                (d.as_str(), caps.get(2).map(|s| s.as_str()))
            } else if let Some(d) = caps.get(3) {
                (d.as_str(), None)
            } else {
                (caps.get(4)?.as_str(), caps.get(5).map(|s| s.as_str()))
            };
            let digit_count = digits.chars().filter(char::is_ascii_digit).count();
            if digit_count < 3 && suffix.is_none() {
                return None;
            }
            let value = scaled(digits, suffix).filter(|v| *v >= 100.0)?;
            Some((value, whole.range()))
        });
        marked.or_else(|| self.bare_price(clear_of_income))
    }

    fn bare_price(&self, clear_of_income: impl Fn(&Range<usize>) -> bool) -> Option<(f64, Range<usize>)> {
        let text = self.text.as_str();
        NUMBER_RE.find_iter(text).find_map(|m| {
            let token = m.as_str();
            if token.len() < 3 || !token.bytes().all(|b| b.is_ascii_digit()) || !clear_of_income(&m.range()) {
                return None;
            }
            let value: f64 = token.parse().ok()?;
            if token.len() == 4 && (1900.0..=2099.0).contains(&value) {
                return None;
            }
            let before = word_before(&text[..m.start()]);
            let after = word_after(&text[m.end()..]);
            let cued = PRICE_CUES_BEFORE.contains(&before.as_str()) || PRICE_CUES_AFTER.contains(&after.as_str());
            (cued && value >= 100.0).then(|| (value, m.range()))
        })
    }

    fn income_match(&self) -> Option<(f64, Range<usize>)> {
        [&*INCOME_AFTER_RE, &*INCOME_BEFORE_RE].iter().find_map(|re| {
            let caps = re.captures(&self.text)?;
            let value = scaled(caps.get(1)?.as_str(), caps.get(2).map(|s| s.as_str()))?;
            Some((value, caps.get(0)?.range()))
        })
    }
}

impl From<&str> for Goal {
    fn from(text: &str) -> Self {
        Goal::new(text)
    }
}

impl From<String> for Goal {
    fn from(text: String) -> Self {
        Goal::new(text)
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Lowercased word directly before `head`'s end, separated by spaces only.
fn word_before(head: &str) -> String {
    let trimmed = head.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic())
        .last()
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[start..].to_lowercase()
}

/// Lowercased word directly after `tail`'s start, separated by spaces only.
fn word_after(tail: &str) -> String {
    tail.trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase()
}

fn scaled(digits: &str, suffix: Option<&str>) -> Option<f64> {
    let value: f64 = digits.replace(',', "").parse().ok()?;
    let factor = match suffix.map(|s| s.to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some(value * factor)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address() {
        let goal = Goal::new("Tell me about 1204 Oak Ridge Dr. in Chapel Hill");
        assert_eq!(goal.address().as_deref(), Some("1204 Oak Ridge Dr"));
        assert_eq!(Goal::new("3 bed homes in Austin").address(), None);
        assert_eq!(
            Goal::new("homes near 55 Main Street please").address().as_deref(),
            Some("55 Main Street")
        );
    }

    #[test]
    fn test_percent() {
        assert_eq!(Goal::new("mortgage at 5.75% for 30 years").percent(), Some(5.75));
        assert_eq!(Goal::new("no rate given").percent(), None);
    }

    #[test]
    fn test_price_forms() {
        assert_eq!(Goal::new("budget $650k in Durham").price(), Some(650_000.0));
        assert_eq!(Goal::new("homes under 725,000").price(), Some(725_000.0));
        assert_eq!(Goal::new("about $1.2m").price(), Some(1_200_000.0));
        assert_eq!(Goal::new("a $450000 condo").price(), Some(450_000.0));
        assert_eq!(Goal::new("$99 fee").price(), None);
        assert_eq!(Goal::new("3 beds, 2 baths").price(), None);
    }

    #[test]
    fn test_bare_price_needs_a_price_word() {
        assert_eq!(Goal::new("payment for a 450000 house at 6%").price(), Some(450_000.0));
        assert_eq!(Goal::new("budget 650000 in Cary").price(), Some(650_000.0));
        assert_eq!(Goal::new("built 1998, priced 2050").price(), None);
        assert_eq!(Goal::new("compare 123456 and 654321").price(), None);
        assert_eq!(Goal::new("homes near 27514").price(), None);
    }

    #[test]
    fn test_price_figure_is_not_a_zpid() {
        let goal = Goal::new("monthly payment for a 450000 house at 6%");
        assert_eq!(goal.price(), Some(450_000.0));
        assert!(goal.zpids().is_empty());

        let goal = Goal::new("is 9876543 worth it, asking 725000 dollars");
        assert_eq!(goal.price(), Some(725_000.0));
        assert_eq!(goal.zpids(), vec![9876543]);
    }

    #[test]
    fn test_price_ignores_income() {
        let goal = Goal::new("my income is $150k, looking at a $500,000 house");
        assert_eq!(goal.income(), Some(150_000.0));
        assert_eq!(goal.price(), Some(500_000.0));
    }

    #[test]
    fn test_income_forms() {
        assert_eq!(Goal::new("salary: 120,000").income(), Some(120_000.0));
        assert_eq!(Goal::new("we have $210k annual income").income(), Some(210_000.0));
        assert_eq!(Goal::new("homes in Cary").income(), None);
    }

    #[test]
    fn test_zpids() {
        let goal = Goal::new("compare 123456 and 654321, also 123456 again");
        assert_eq!(goal.zpids(), vec![123456, 654321]);
    }

    #[test]
    fn test_zpids_skip_money_and_short_numbers() {
        let goal = Goal::new("$600000 budget, 27514 zip, 250000k, 700,000 max, 9876543");
        assert_eq!(goal.zpids(), vec![9876543]);
    }

    #[test]
    fn test_goal_deserializes_camel_case() {
        let goal: Goal = serde_json::from_str(
            r#"{"text":"homes","preferences":["quiet"],"mapFocus":"downtown"}"#,
        )
        .unwrap();
        assert_eq!(goal.preferences, vec!["quiet".to_string()]);
        assert_eq!(goal.map_focus.as_deref(), Some("downtown"));
        assert!(goal.hints.is_empty());
    }
}
