//! Inline `compliance` step: sanity rules over the collected figures.

use crate::blackboard::{Blackboard, ComplianceReport};

/// ZPID count above which the search is considered too broad.
pub const MAX_ZPIDS: usize = 200;
pub const MAX_APR: f64 = 20.0;

/// Figures the rules look at. Absent figures are not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplianceInput {
    pub median_price: Option<f64>,
    pub median_sqft: Option<f64>,
    pub median_price_per_sqft: Option<f64>,
    pub apr: Option<f64>,
    pub monthly_total: Option<f64>,
    pub zpid_count: usize,
}

impl ComplianceInput {
    pub fn from_blackboard(bb: &Blackboard) -> Self {
        let analytics = bb.analytics();
        let mortgage = bb.mortgage();
        Self {
            median_price: analytics.and_then(|a| a.median_price),
            median_sqft: analytics.and_then(|a| a.median_sqft),
            median_price_per_sqft: analytics.and_then(|a| a.median_price_per_sqft),
            apr: mortgage.and_then(|m| m.apr),
            monthly_total: mortgage.and_then(|m| m.total),
            zpid_count: bb.zpids().len().max(bb.ranked_zpids().len()),
        }
    }
}

/// Evaluate the rule set. `ok` iff no rule fired.
pub fn check_compliance(input: &ComplianceInput) -> ComplianceReport {
    let mut issues = Vec::new();

    if input.median_price.is_some_and(|p| p < 0.0) {
        issues.push("Median price negative.".to_string());
    }
    if input.median_sqft.is_some_and(|s| s <= 0.0) {
        issues.push("Median sqft not positive.".to_string());
    }
    if input.median_price_per_sqft.is_some_and(|p| p <= 0.0) {
        issues.push("Median $/sqft not positive.".to_string());
    }
    if input.apr.is_some_and(|apr| !(0.0..=MAX_APR).contains(&apr)) {
        issues.push("APR unusually out of range (0-20%).".to_string());
    }
    if input.monthly_total.is_some_and(|t| t < 0.0) {
        issues.push("Monthly payment negative.".to_string());
    }
    if input.zpid_count > MAX_ZPIDS {
        issues.push("Too many ZPIDs collected; consider narrowing filters.".to_string());
    }

    ComplianceReport {
        ok: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{AnalyticsSummary, MortgageEstimate};

    #[test]
    fn test_clean_input_passes() {
        let report = check_compliance(&ComplianceInput {
            median_price: Some(450_000.0),
            median_sqft: Some(1_900.0),
            median_price_per_sqft: Some(236.8),
            apr: Some(6.5),
            monthly_total: Some(3_100.0),
            zpid_count: 40,
        });
        assert!(report.ok);
        assert!(report.issues.is_empty());
        assert!(check_compliance(&ComplianceInput::default()).ok);
    }

    #[test]
    fn test_negative_median_price() {
        let report = check_compliance(&ComplianceInput {
            median_price: Some(-1.0),
            ..Default::default()
        });
        assert!(!report.ok);
        assert_eq!(report.issues, vec!["Median price negative.".to_string()]);
    }

    #[test]
    fn test_too_many_zpids() {
        let at_limit = ComplianceInput {
            zpid_count: 200,
            ..Default::default()
        };
        assert!(check_compliance(&at_limit).ok);

        let over = ComplianceInput {
            zpid_count: 201,
            ..Default::default()
        };
        let report = check_compliance(&over);
        assert_eq!(
            report.issues,
            vec!["Too many ZPIDs collected; consider narrowing filters.".to_string()]
        );
    }

    #[test]
    fn test_apr_out_of_range() {
        let report = check_compliance(&ComplianceInput {
            apr: Some(25.0),
            ..Default::default()
        });
        assert_eq!(report.issues, vec!["APR unusually out of range (0-20%).".to_string()]);
        assert!(check_compliance(&ComplianceInput { apr: Some(20.0), ..Default::default() }).ok);
    }

    #[test]
    fn test_non_positive_medians_and_payment() {
        let report = check_compliance(&ComplianceInput {
            median_sqft: Some(0.0),
            median_price_per_sqft: Some(-3.0),
            monthly_total: Some(-10.0),
            ..Default::default()
        });
        assert_eq!(report.issues.len(), 3);
        assert_eq!(report.issues[0], "Median sqft not positive.");
        assert_eq!(report.issues[1], "Median $/sqft not positive.");
        assert_eq!(report.issues[2], "Monthly payment negative.");
    }

    #[test]
    fn test_input_from_blackboard() {
        let mut bb = Blackboard::new();
        bb.extend_zpids(0..250, "search");
        bb.set_analytics(AnalyticsSummary {
            median_price: Some(-5.0),
            ..Default::default()
        });
        bb.set_mortgage(MortgageEstimate {
            apr: Some(7.0),
            total: Some(2_800.0),
            ..Default::default()
        });
        let input = ComplianceInput::from_blackboard(&bb);
        assert_eq!(input.zpid_count, 250);
        assert_eq!(input.apr, Some(7.0));
        let report = check_compliance(&input);
        assert_eq!(report.issues.len(), 2);
    }
}
