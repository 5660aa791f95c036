//! Plain-text run report.
//!
//! The report is a pure function of the goal, the blackboard and the
//! history: the same inputs always render the same text. Sections without
//! data are left out; the goal line and the disclaimer are always present.

use std::fmt::Write;

use serde_json::Value;

use crate::blackboard::{AnalyticsSummary, Blackboard, MortgageEstimate};
use crate::goal::Goal;
use crate::history::{CallStatus, History, ToolCallRecord};

const MAX_ZIP_GROUPS: usize = 5;
const MAX_LISTED_ZPIDS: usize = 10;
const MAX_HEADLINE_CHARS: usize = 200;

pub const DISCLAIMER: &str =
    "Figures are estimates for research purposes only and are not financial advice.";

#[derive(Debug, Clone)]
pub struct ReportCompiler {
    trace_len: usize,
}

impl Default for ReportCompiler {
    fn default() -> Self {
        Self { trace_len: 5 }
    }
}

impl ReportCompiler {
    /// `trace_len` is how many of the latest tool executions are listed.
    pub fn new(trace_len: usize) -> Self {
        Self { trace_len }
    }

    pub fn compile(&self, goal: &Goal, bb: &Blackboard, history: &History) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render(&mut out, goal, bb, history);
        out
    }

    fn render(&self, out: &mut String, goal: &Goal, bb: &Blackboard, history: &History) -> std::fmt::Result {
        writeln!(out, "Goal: {}", goal.as_str())?;
        list_line(out, "Preferences", &goal.preferences)?;
        list_line(out, "Hints", &goal.hints)?;
        list_line(out, "Emphasis", &goal.emphasis)?;
        if let Some(focus) = &goal.map_focus {
            writeln!(out, "Map focus: {}", focus)?;
        }

        if let Some(analytics) = bb.analytics() {
            market_section(out, analytics)?;
        }

        let zpids = if bb.ranked_zpids().is_empty() {
            bb.zpids()
        } else {
            bb.ranked_zpids()
        };
        if !zpids.is_empty() {
            let listed: Vec<String> = zpids.iter().take(MAX_LISTED_ZPIDS).map(u64::to_string).collect();
            write!(out, "ZPIDs ({}): {}", zpids.len(), listed.join(", "))?;
            if zpids.len() > MAX_LISTED_ZPIDS {
                write!(out, " (+{} more)", zpids.len() - MAX_LISTED_ZPIDS)?;
            }
            writeln!(out)?;
        }

        if let Some(link) = bb.map_link() {
            writeln!(out, "Map: {}", link)?;
        }
        if let Some(mortgage) = bb.mortgage() {
            mortgage_line(out, mortgage)?;
        }
        if let Some(affordability) = bb.affordability() {
            writeln!(out, "Affordability: {}", headline(affordability))?;
        }
        if let Some(compliance) = bb.compliance() {
            if compliance.ok {
                writeln!(out, "Compliance: OK")?;
            } else {
                writeln!(out, "Compliance: {}", compliance.issues.join(" "))?;
            }
        }

        if let Some(plan) = bb.plan() {
            let total = plan.steps().len();
            if plan.is_complete() {
                writeln!(out, "Progress: {}/{} steps done (plan complete)", plan.done_count(), total)?;
            } else {
                let current = plan.current().map(|s| s.key.to_string()).unwrap_or_default();
                writeln!(
                    out,
                    "Progress: {}/{} steps done (current: {})",
                    plan.done_count(),
                    total,
                    current
                )?;
            }
        }

        let recent = history.recent_calls(self.trace_len);
        if !recent.is_empty() {
            writeln!(out, "Recent tool executions:")?;
            for record in recent {
                writeln!(out, "  - {}", trace_line(record))?;
            }
        }

        write!(out, "{}", DISCLAIMER)
    }
}

fn list_line(out: &mut String, label: &str, items: &[String]) -> std::fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}: {}", label, items.join(", "))
}

fn market_section(out: &mut String, analytics: &AnalyticsSummary) -> std::fmt::Result {
    if analytics.has_medians() {
        let mut parts = Vec::new();
        if let Some(price) = analytics.median_price {
            parts.push(format!("median price {}", money(price)));
        }
        if let Some(sqft) = analytics.median_sqft {
            parts.push(format!("median sqft {}", grouped(sqft.round() as i64)));
        }
        if let Some(ppsf) = analytics.median_price_per_sqft {
            parts.push(format!("median $/sqft {}", money(ppsf)));
        }
        writeln!(out, "Market: {}", parts.join("; "))?;
    }
    if !analytics.groups.is_empty() {
        writeln!(out, "Top ZIPs:")?;
        for group in analytics.groups.iter().take(MAX_ZIP_GROUPS) {
            write!(out, "  - {}", group.zipcode)?;
            if let Some(count) = group.count {
                write!(out, ": {} listings", count)?;
            }
            if let Some(price) = group.median_price {
                write!(out, ", median {}", money(price))?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn mortgage_line(out: &mut String, m: &MortgageEstimate) -> std::fmt::Result {
    write!(out, "Mortgage")?;
    let mut inputs = Vec::new();
    if let Some(price) = m.price {
        inputs.push(format!("price {}", money(price)));
    }
    if let Some(apr) = m.apr {
        inputs.push(format!("{:.2}% APR", apr));
    }
    if let Some(years) = m.years {
        inputs.push(format!("{} yrs", years));
    }
    if let Some(down) = m.down_pct {
        inputs.push(format!("{}% down", down));
    }
    if !inputs.is_empty() {
        write!(out, " ({})", inputs.join(", "))?;
    }
    match m.total {
        Some(total) => write!(out, ": {}/mo total", money(total))?,
        None => write!(out, ":")?,
    }

    let mut parts = Vec::new();
    for (label, value) in [
        ("P&I", m.principal_and_interest),
        ("tax", m.property_tax),
        ("insurance", m.insurance),
        ("HOA", m.hoa),
    ] {
        if let Some(v) = value {
            parts.push(format!("{} {}", label, money(v)));
        }
    }
    if !parts.is_empty() {
        write!(out, " [{}]", parts.join(", "))?;
    }
    writeln!(out)
}

/// One-line rendering of an opaque payload.
fn headline(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            let numbers: Vec<String> = obj
                .iter()
                .filter_map(|(key, v)| v.as_f64().map(|n| format!("{} {}", key, plain_number(n))))
                .take(3)
                .collect();
            if numbers.is_empty() {
                value.to_string()
            } else {
                numbers.join(", ")
            }
        }
        other => other.to_string(),
    };
    clip(&text, MAX_HEADLINE_CHARS)
}

fn trace_line(record: &ToolCallRecord) -> String {
    let attempts = if record.attempts == 1 {
        "1 attempt".to_string()
    } else {
        format!("{} attempts", record.attempts)
    };
    match record.status {
        CallStatus::Success => format!("{} {}: success ({})", record.id, record.name, attempts),
        CallStatus::Error => format!(
            "{} {}: error: {} ({})",
            record.id,
            record.name,
            clip(record.error.as_deref().unwrap_or("unknown"), MAX_HEADLINE_CHARS),
            attempts
        ),
        CallStatus::Pending => format!("{} {}: pending", record.id, record.name),
    }
}

/// `$480,000` for whole-dollar-scale amounts, `$228.60` below a thousand.
fn money(value: f64) -> String {
    if value.abs() >= 1000.0 {
        let sign = if value < 0.0 { "-" } else { "" };
        format!("{}${}", sign, grouped(value.abs().round() as i64))
    } else {
        format!("${:.2}", value)
    }
}

fn grouped(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn plain_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        grouped(n as i64)
    } else {
        format!("{:.2}", n)
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max).collect();
    clipped.push_str("...");
    clipped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{ComplianceReport, ZipGroup};
    use crate::history::{CallId, ToolRequest};
    use serde_json::json;

    fn rich_blackboard() -> Blackboard {
        let mut bb = Blackboard::new();
        bb.extend_zpids(1..=14, "search");
        bb.set_analytics(AnalyticsSummary {
            count: Some(14),
            median_price: Some(480_000.0),
            median_sqft: Some(2_100.0),
            median_price_per_sqft: Some(228.6),
            groups: (0..7)
                .map(|i| ZipGroup {
                    zipcode: format!("2751{}", i),
                    count: Some(2),
                    median_price: Some(500_000.0),
                })
                .collect(),
        });
        bb.set_map_link("https://maps.test/z");
        bb.set_mortgage(MortgageEstimate {
            price: Some(480_000.0),
            apr: Some(6.5),
            years: Some(30),
            down_pct: Some(20.0),
            principal_and_interest: Some(2_427.0),
            total: Some(3_120.0),
            ..Default::default()
        });
        bb.set_affordability(json!({"maxPrice": 550000}));
        bb.set_compliance(ComplianceReport {
            ok: true,
            issues: vec![],
        });
        bb
    }

    #[test]
    fn test_minimal_report() {
        let report = ReportCompiler::default().compile(&Goal::new("homes in Cary"), &Blackboard::new(), &History::new());
        assert_eq!(report, format!("Goal: homes in Cary\n{}", DISCLAIMER));
    }

    #[test]
    fn test_sections() {
        let goal = Goal::new("homes in Chapel Hill")
            .with_preferences(vec!["quiet street".into(), "yard".into()])
            .with_map_focus("downtown");
        let report = ReportCompiler::default().compile(&goal, &rich_blackboard(), &History::new());

        assert!(report.contains("Preferences: quiet street, yard\n"));
        assert!(report.contains("Map focus: downtown\n"));
        assert!(report.contains("Market: median price $480,000; median sqft 2,100; median $/sqft $228.60\n"));
        assert!(report.contains("  - 27514: 2 listings, median $500,000\n"));
        assert!(!report.contains("27515"));
        assert!(report.contains("ZPIDs (14): 1, 2, 3, 4, 5, 6, 7, 8, 9, 10 (+4 more)\n"));
        assert!(report.contains("Map: https://maps.test/z\n"));
        assert!(report.contains(
            "Mortgage (price $480,000, 6.50% APR, 30 yrs, 20% down): $3,120/mo total [P&I $2,427]\n"
        ));
        assert!(report.contains("Affordability: maxPrice 550,000\n"));
        assert!(report.contains("Compliance: OK\n"));
        assert!(report.ends_with(DISCLAIMER));
    }

    #[test]
    fn test_deterministic() {
        let goal = Goal::new("homes");
        let bb = rich_blackboard();
        let history = History::new();
        let compiler = ReportCompiler::new(3);
        assert_eq!(compiler.compile(&goal, &bb, &history), compiler.compile(&goal, &bb, &history));
    }

    #[test]
    fn test_trace_is_limited() {
        let mut history = History::new();
        for i in 1..=4 {
            let request = ToolRequest::new(format!("tool.t{}", i));
            history.open_call(CallId(i), None, &request);
            if i == 4 {
                history.fail_call(CallId(i), "boom".into(), 2);
            } else {
                history.complete_call(CallId(i), "{}".into(), 1);
            }
        }
        let report = ReportCompiler::new(2).compile(&Goal::new("x"), &Blackboard::new(), &history);
        assert!(!report.contains("tool.t2"));
        assert!(report.contains("  - call-3 tool.t3: success (1 attempt)\n"));
        assert!(report.contains("  - call-4 tool.t4: error: boom (2 attempts)\n"));
    }

    #[test]
    fn test_compliance_issues_and_progress() {
        let mut bb = Blackboard::new();
        bb.set_compliance(ComplianceReport {
            ok: false,
            issues: vec!["Median price negative.".into()],
        });
        bb.restore_plan(crate::plan::Plan::new("x"));
        let report = ReportCompiler::default().compile(&Goal::new("x"), &bb, &History::new());
        assert!(report.contains("Compliance: Median price negative.\n"));
        assert!(report.contains("Progress: 0/11 steps done (current: parse)\n"));
    }

    #[test]
    fn test_money_and_grouping() {
        assert_eq!(money(480_000.0), "$480,000");
        assert_eq!(money(1_234_567.4), "$1,234,567");
        assert_eq!(money(228.6), "$228.60");
        assert_eq!(money(-2_500.0), "-$2,500");
        assert_eq!(grouped(100), "100");
        assert_eq!(grouped(1000), "1,000");
    }
}
