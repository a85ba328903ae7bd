// ── Canonical normalizer ──
//
// Vendor parsers turning raw device output into `BgpRouteTable` and
// `TracerouteResult`, plus the structured-output policy (community filtering
// and RPKI state) applied to every parsed route.

pub mod bgp;
pub mod policy;
pub mod traceroute;
pub(crate) mod xml;

use chrono::Utc;
use serde_json::Value;

/// Treat a single JSON value or an array uniformly.
pub(crate) fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// String content of a scalar or a `{ "_text": ... }` element.
pub(crate) fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("_text").and_then(|t| text(Some(t))),
        _ => None,
    }
}

/// Integer content of a number, numeric string, or text element.
pub(crate) fn int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        other => text(Some(other))?.trim().parse().ok(),
    }
}

/// Decimal ASN tokens from a path string, skipping origin codes and set markers.
pub(crate) fn asn_tokens(path: &str) -> Vec<u32> {
    path.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|token| token.trim_matches(|c| c == '{' || c == '}').parse().ok())
        .collect()
}

/// Seconds elapsed since a Unix epoch timestamp, never negative.
#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
pub(crate) fn age_since(epoch: f64) -> i64 {
    (Utc::now().timestamp() - epoch.trunc() as i64).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn helpers_accept_mixed_shapes() {
        let doc = json!({"one": {"a": 1}, "many": [{"a": 1}, {"a": 2}], "n": "42", "t": {"_text": "7"}});
        assert_eq!(as_list(doc.get("one")).len(), 1);
        assert_eq!(as_list(doc.get("many")).len(), 2);
        assert_eq!(as_list(doc.get("missing")).len(), 0);
        assert_eq!(int(doc.get("n")), Some(42));
        assert_eq!(int(doc.get("t")), Some(7));
        assert_eq!(asn_tokens("65000 13335 I"), vec![65000, 13335]);
        assert_eq!(asn_tokens("174 {64512,64513} ?"), vec![174, 64512, 64513]);
        assert_eq!(age_since(4_000_000_000.0), 0);
    }
}
