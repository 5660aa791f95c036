//! Folding tool results into the blackboard.
//!
//! Tool output is text, usually JSON of loosely agreed shape. Extraction is
//! lenient about field spelling and strict about meaning: anything that
//! cannot be read is treated as "no usable data" and the blackboard is left
//! as it was.

use serde_json::{Map, Value};

use super::facts::{AnalyticsSummary, MortgageEstimate, ParsedFilters, ZipGroup};
use super::view::Blackboard;
use crate::history::ToolRequest;

/// Keys under which list-shaped tool output nests its items.
const LIST_KEYS: &[&str] = &["zpids", "results", "items", "properties", "hits", "matches"];

/// Merge the result of `request` into the blackboard.
///
/// Returns `true` when something was written.
pub fn merge_tool_result(bb: &mut Blackboard, request: &ToolRequest, text: &str) -> bool {
    let parsed = serde_json::from_str::<Value>(text.trim()).ok();
    let merged = match request.name.as_str() {
        "util.parseGoal" => parsed.map(|v| merge_parse(bb, &v)).unwrap_or(false),
        "properties.lookup" | "properties.search" | "properties.searchAdvanced" => parsed
            .map(|v| {
                let ids = collect_zpids(&v);
                let found = !ids.is_empty();
                bb.extend_zpids(ids, &request.name);
                found
            })
            .unwrap_or(false),
        "analytics.summarizeSearch" => parsed
            .and_then(|v| analytics_from_value(&v))
            .map(|summary| bb.set_analytics(summary))
            .is_some(),
        "graph.explain" | "graph.similar" => opaque(parsed, text)
            .map(|v| bb.set_graph(v))
            .is_some(),
        "graph.comparePairs" => opaque(parsed, text)
            .map(|v| bb.set_pair_comparisons(v))
            .is_some(),
        "map.linkForZpids" | "map.buildLinkByQuery" => map_link_from(parsed.as_ref(), text)
            .map(|link| bb.set_map_link(link))
            .is_some(),
        "finance.mortgage" => parsed
            .and_then(|v| mortgage_from_value(&v, &request.args))
            .map(|estimate| bb.set_mortgage(estimate))
            .is_some(),
        "finance.affordability" => opaque(parsed, text)
            .map(|v| bb.set_affordability(v))
            .is_some(),
        other => {
            log::debug!("merge: no blackboard mapping for tool '{}'", other);
            return false;
        }
    };

    if !merged {
        log::warn!("merge: no usable data in result of '{}'", request.name);
    }
    merged
}

/// Read a ZPID from a number or numeric string.
pub(crate) fn zpid_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Collect ZPIDs from a bare list, a list of records, or an object that
/// nests either under a known key.
pub(crate) fn collect_zpids(value: &Value) -> Vec<u64> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| zpid_from_value(item).or_else(|| item.get("zpid").and_then(zpid_from_value)))
            .collect(),
        Value::Object(obj) => {
            for key in LIST_KEYS {
                if let Some(nested @ Value::Array(_)) = obj.get(*key) {
                    return collect_zpids(nested);
                }
            }
            obj.get("zpid").and_then(zpid_from_value).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn merge_parse(bb: &mut Blackboard, value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let source = obj.get("filters").and_then(Value::as_object).unwrap_or(obj);

    let filters = ParsedFilters {
        city: text_field(source, &["city"]),
        state: text_field(source, &["state"]),
        zipcode: text_field(source, &["zipcode", "zip", "zipCode"]),
        beds: number_field(source, &["beds", "bedrooms"]).map(|n| n as u32),
        baths: number_field(source, &["baths", "bathrooms"]),
        min_price: number_field(source, &["minPrice", "min_price", "priceMin"]),
        max_price: number_field(source, &["maxPrice", "max_price", "priceMax"]),
    };

    let ids = obj.get("zpids").map(collect_zpids).unwrap_or_default();
    let wrote = !filters.is_empty() || !ids.is_empty();
    if !filters.is_empty() {
        bb.refine_parsed(filters, "parse");
    }
    bb.extend_zpids(ids, "parse");
    wrote
}

fn analytics_from_value(value: &Value) -> Option<AnalyticsSummary> {
    let obj = value.as_object()?;
    let obj = obj.get("summary").and_then(Value::as_object).unwrap_or(obj);

    let groups = ["groups", "byZip", "zipGroups"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(zip_group_from_value).collect())
        .unwrap_or_default();

    let summary = AnalyticsSummary {
        count: number_field(obj, &["count", "total"]).map(|n| n as u64),
        median_price: number_field(obj, &["medianPrice", "median_price"]),
        median_sqft: number_field(obj, &["medianSqft", "median_sqft", "medianLivingArea"]),
        median_price_per_sqft: number_field(
            obj,
            &["medianPricePerSqft", "median_price_per_sqft", "medianPpsf"],
        ),
        groups,
    };

    if summary == AnalyticsSummary::default() {
        None
    } else {
        Some(summary)
    }
}

fn zip_group_from_value(value: &Value) -> Option<ZipGroup> {
    let obj = value.as_object()?;
    Some(ZipGroup {
        zipcode: text_field(obj, &["zipcode", "zip", "zipCode"])?,
        count: number_field(obj, &["count"]).map(|n| n as u64),
        median_price: number_field(obj, &["medianPrice", "median_price"]),
    })
}

fn mortgage_from_value(value: &Value, args: &Map<String, Value>) -> Option<MortgageEstimate> {
    let empty = Map::new();
    let (obj, bare_total) = match value {
        Value::Object(obj) => (obj, None),
        Value::Number(n) => (&empty, n.as_f64()),
        _ => return None,
    };

    let estimate = MortgageEstimate {
        price: number_field(obj, &["price"]).or_else(|| number_field(args, &["price"])),
        apr: number_field(obj, &["apr", "rate"]).or_else(|| number_field(args, &["apr"])),
        years: number_field(obj, &["years"])
            .or_else(|| number_field(args, &["years"]))
            .map(|n| n as u32),
        down_pct: number_field(obj, &["downPct", "down_pct"]).or_else(|| number_field(args, &["downPct"])),
        principal_and_interest: number_field(obj, &["principalAndInterest", "principal_interest", "pi"]),
        property_tax: number_field(obj, &["propertyTax", "tax", "taxes"]),
        insurance: number_field(obj, &["insurance"]),
        hoa: number_field(obj, &["hoa"]),
        total: bare_total.or_else(|| number_field(obj, &["total", "monthlyPayment", "monthly", "payment"])),
    };

    if estimate.total.is_none() && estimate.principal_and_interest.is_none() {
        None
    } else {
        Some(estimate)
    }
}

fn map_link_from(parsed: Option<&Value>, text: &str) -> Option<String> {
    let link = match parsed {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => text_field(obj, &["url", "link", "href"]),
        Some(_) => None,
        None => {
            let raw = text.trim();
            (raw.starts_with("http://") || raw.starts_with("https://")).then(|| raw.to_string())
        }
    };
    link.filter(|l| !l.is_empty())
}

/// JSON if it parses, otherwise the raw text; `None` for empty output.
fn opaque(parsed: Option<Value>, text: &str) -> Option<Value> {
    match parsed {
        Some(Value::Null) => None,
        Some(v) => Some(v),
        None => {
            let raw = text.trim();
            (!raw.is_empty()).then(|| Value::String(raw.to_string()))
        }
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge(bb: &mut Blackboard, name: &str, text: &str) -> bool {
        merge_tool_result(bb, &ToolRequest::new(name), text)
    }

    #[test]
    fn test_search_results_in_various_shapes() {
        let mut bb = Blackboard::new();
        assert!(merge(&mut bb, "properties.search", "[11, \"12\"]"));
        assert!(merge(&mut bb, "properties.searchAdvanced", r#"{"results":[{"zpid":13},{"zpid":"14"}]}"#));
        assert!(merge(&mut bb, "properties.lookup", r#"{"zpid": 15}"#));
        assert_eq!(bb.zpids(), &[11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_malformed_output_leaves_blackboard_unchanged() {
        let mut bb = Blackboard::new();
        bb.extend_zpids([1], "seed");
        assert!(!merge(&mut bb, "properties.search", "<html>502 Bad Gateway</html>"));
        assert!(!merge(&mut bb, "analytics.summarizeSearch", "{\"unexpected\": true}"));
        assert!(!merge(&mut bb, "finance.mortgage", "not json"));
        assert!(!merge(&mut bb, "map.linkForZpids", "{\"nothing\": 1}"));
        assert_eq!(bb.zpids(), &[1]);
        assert!(bb.analytics().is_none());
        assert!(bb.mortgage().is_none());
        assert!(bb.map_link().is_none());
    }

    #[test]
    fn test_parse_merges_filters_and_zpids() {
        let mut bb = Blackboard::new();
        let text = r#"{"filters":{"city":"Durham","state":"NC","beds":"3","baths":2.5,"zipcode":27701},"zpids":[777777]}"#;
        assert!(merge(&mut bb, "util.parseGoal", text));
        let parsed = bb.parsed().unwrap();
        assert_eq!(parsed.city.as_deref(), Some("Durham"));
        assert_eq!(parsed.zipcode.as_deref(), Some("27701"));
        assert_eq!(parsed.beds, Some(3));
        assert_eq!(parsed.baths, Some(2.5));
        assert_eq!(bb.zpids(), &[777777]);
    }

    #[test]
    fn test_analytics_summary_and_groups() {
        let mut bb = Blackboard::new();
        let text = json!({
            "count": 42,
            "medianPrice": 455000,
            "medianSqft": 1800,
            "medianPricePerSqft": 252.7,
            "groups": [
                {"zipcode": "27514", "count": 20, "medianPrice": 500000},
                {"zip": 27516, "count": 22},
                {"count": 3}
            ]
        })
        .to_string();
        assert!(merge(&mut bb, "analytics.summarizeSearch", &text));
        let summary = bb.analytics().unwrap();
        assert_eq!(summary.count, Some(42));
        assert_eq!(summary.median_price, Some(455000.0));
        assert_eq!(summary.groups.len(), 2);
        assert_eq!(summary.groups[1].zipcode, "27516");
    }

    #[test]
    fn test_mortgage_falls_back_to_request_args() {
        let mut bb = Blackboard::new();
        let request = ToolRequest::new("finance.mortgage")
            .arg("price", 500000.0)
            .arg("apr", 6.5)
            .arg("years", 30)
            .arg("downPct", 20.0);
        let text = r#"{"monthlyPayment": 3120.5, "principalAndInterest": 2528.27, "tax": 400, "insurance": 120, "hoa": 0}"#;
        assert!(merge_tool_result(&mut bb, &request, text));
        let m = bb.mortgage().unwrap();
        assert_eq!(m.total, Some(3120.5));
        assert_eq!(m.apr, Some(6.5));
        assert_eq!(m.years, Some(30));
        assert_eq!(m.property_tax, Some(400.0));
    }

    #[test]
    fn test_map_link_shapes() {
        let mut bb = Blackboard::new();
        assert!(merge(&mut bb, "map.buildLinkByQuery", "https://maps.test/?q=austin"));
        assert_eq!(bb.map_link(), Some("https://maps.test/?q=austin"));
        assert!(merge(&mut bb, "map.linkForZpids", r#"{"url":"https://maps.test/?z=1,2"}"#));
        assert_eq!(bb.map_link(), Some("https://maps.test/?z=1,2"));
    }

    #[test]
    fn test_graph_keeps_prose() {
        let mut bb = Blackboard::new();
        assert!(merge(&mut bb, "graph.explain", "Both homes share the 27514 neighborhood."));
        assert_eq!(
            bb.graph(),
            Some(&Value::String("Both homes share the 27514 neighborhood.".into()))
        );
        assert!(!merge(&mut bb, "graph.comparePairs", "   "));
    }

    #[test]
    fn test_unknown_tool_is_ignored() {
        let mut bb = Blackboard::new();
        assert!(!merge(&mut bb, "weather.today", "{}"));
        assert!(bb.trace().is_empty());
    }
}
