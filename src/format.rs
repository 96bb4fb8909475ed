//! Bounded formatting of captured runtime values
//!
//! Traces run to hundreds of steps and every step snapshots every visible
//! binding, so uncapped serialization would make the response payload
//! unbounded relative to program size. The bounds here cap that
//! amplification. Truncation is silent; no marker is added.

use serde_json::Value as RawValue;

use crate::trace::FormattedValue;

/// Maximum number of elements kept from a sequence or mapping
pub const MAX_CONTAINER_ELEMENTS: usize = 10;
/// Maximum number of characters kept from a text value
pub const MAX_TEXT_CHARS: usize = 100;

/// Convert a raw value reported by a trace harness into the bounded,
/// display-ready shape embedded in a [`Variable`](crate::trace::Variable).
///
/// Total function: never fails, never panics, for any input.
pub fn format_value(raw: &RawValue) -> FormattedValue {
    match raw {
        RawValue::Null => FormattedValue::Null,
        RawValue::Bool(b) => FormattedValue::Bool(*b),
        RawValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                FormattedValue::Int(i)
            } else if n.is_u64() {
                // u64 beyond i64 range; keep the exact digits instead of a
                // lossy float conversion
                FormattedValue::Text(truncate_text(&n.to_string()))
            } else if let Some(f) = n.as_f64() {
                FormattedValue::Float(f)
            } else {
                FormattedValue::Text(truncate_text(&n.to_string()))
            }
        }
        RawValue::String(s) => FormattedValue::Text(truncate_text(s)),
        RawValue::Array(items) => FormattedValue::Sequence(
            items
                .iter()
                .take(MAX_CONTAINER_ELEMENTS)
                .map(format_value)
                .collect(),
        ),
        RawValue::Object(entries) => FormattedValue::Mapping(
            entries
                .iter()
                .take(MAX_CONTAINER_ELEMENTS)
                .map(|(key, value)| (truncate_text(key), format_value(value)))
                .collect(),
        ),
    }
}

fn truncate_text(s: &str) -> String {
    s.chars().take(MAX_TEXT_CHARS).collect()
}
