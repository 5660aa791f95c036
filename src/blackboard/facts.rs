//! Typed facts held by the blackboard.

use serde::{Deserialize, Serialize};

/// Structured filters extracted from the goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baths: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

impl ParsedFilters {
    pub fn is_empty(&self) -> bool {
        self == &ParsedFilters::default()
    }

    /// Overlay the fields that `newer` sets; fields it leaves unset are kept.
    pub fn refine(&mut self, newer: ParsedFilters) {
        fn keep<T>(slot: &mut Option<T>, newer: Option<T>) {
            if newer.is_some() {
                *slot = newer;
            }
        }
        keep(&mut self.city, newer.city);
        keep(&mut self.state, newer.state);
        keep(&mut self.zipcode, newer.zipcode);
        keep(&mut self.beds, newer.beds);
        keep(&mut self.baths, newer.baths);
        keep(&mut self.min_price, newer.min_price);
        keep(&mut self.max_price, newer.max_price);
    }
}

/// Per-ZIP aggregate from the analytics tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipGroup {
    pub zipcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_price: Option<f64>,
}

/// Market summary for the current search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_sqft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_price_per_sqft: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ZipGroup>,
}

impl AnalyticsSummary {
    pub fn has_medians(&self) -> bool {
        self.median_price.is_some() || self.median_sqft.is_some() || self.median_price_per_sqft.is_some()
    }
}

/// Monthly payment breakdown. Inputs are the ones the request was built
/// with unless the tool echoed its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortgageEstimate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_and_interest: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_tax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoa: Option<f64>,
    /// Total monthly payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Result of the compliance rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub ok: bool,
    pub issues: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refine_keeps_unset_fields() {
        let mut filters = ParsedFilters {
            city: Some("Austin".into()),
            beds: Some(3),
            ..Default::default()
        };
        filters.refine(ParsedFilters {
            state: Some("TX".into()),
            beds: Some(4),
            ..Default::default()
        });
        assert_eq!(filters.city.as_deref(), Some("Austin"));
        assert_eq!(filters.state.as_deref(), Some("TX"));
        assert_eq!(filters.beds, Some(4));
    }

    #[test]
    fn test_filters_deserialize_camel_case() {
        let filters: ParsedFilters =
            serde_json::from_str(r#"{"city":"Chapel Hill","zipcode":"27514","minPrice":300000}"#).unwrap();
        assert_eq!(filters.zipcode.as_deref(), Some("27514"));
        assert_eq!(filters.min_price, Some(300000.0));
        assert!(!filters.is_empty());
        assert!(ParsedFilters::default().is_empty());
    }
}
