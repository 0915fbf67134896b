// ── Response normalization ──
//
// Converts heterogeneous, possibly-nested, possibly-missing server JSON
// into the stable shape a schema declares. Normalization never fails:
// a malformed or missing field becomes its declared default, and a
// wholly-failed query leaves existing data standing with the gaps
// filled. Derived computations that must not run on defaulted inputs
// are the caller's job.

use serde_json::Value;

use crate::schema::{FieldMap, FieldSpec, FieldValue, KeyedMap, Kind, SkipRule};

/// Normalize a singleton resource (e.g. system information).
///
/// With a `source`, every declared field is (re)written from it. With
/// `None` -- the upstream query failed -- existing values stand and only
/// missing declared fields get their defaults, so a transient outage
/// doesn't wipe the last good reading. `ensure` fields are placeholders
/// computed later by the caller; they are seeded only when absent.
pub fn normalize(
    existing: FieldMap,
    source: Option<&Value>,
    schema: &[FieldSpec],
    ensure: &[FieldSpec],
) -> FieldMap {
    let mut out = existing;

    match source {
        Some(obj) => {
            for spec in schema {
                out.insert(spec.name, extract(obj, spec));
            }
        }
        None => {
            for spec in schema {
                out.entry(spec.name).or_insert_with(|| spec.default.to_field());
            }
        }
    }

    for spec in ensure {
        out.entry(spec.name).or_insert_with(|| spec.default.to_field());
    }

    out
}

/// Normalize a collection resource, keyed by each row's `key_field`.
///
/// Rows matching a skip rule are dropped entirely. Existing entries are
/// the merge base for their key, which lets a second schema enrich a
/// collection normalized by a first one (SMART attributes into the disk
/// inventory). Entries whose key is absent from the new source persist.
pub fn normalize_keyed(
    existing: KeyedMap,
    source: Option<&Value>,
    schema: &[FieldSpec],
    key_field: &str,
    ensure: &[FieldSpec],
    skip: &[SkipRule],
) -> KeyedMap {
    let mut out = existing;

    let Some(source_rows) = source.and_then(rows) else {
        return out;
    };

    for row in source_rows {
        if !row.is_object() {
            continue;
        }
        if skip.iter().any(|rule| skip_matches(row, rule)) {
            continue;
        }
        let Some(key) = row.get(key_field).and_then(row_key) else {
            continue;
        };

        let mut entry = out.remove(&key).unwrap_or_default();
        for spec in schema {
            entry.insert(spec.name, extract(row, spec));
        }
        for spec in ensure {
            entry.entry(spec.name).or_insert_with(|| spec.default.to_field());
        }
        out.insert(key, entry);
    }

    out
}

/// Rows of a collection response. List RPCs on this appliance answer
/// either a bare array or a `{data: [...], total: n}` wrapper.
fn rows(source: &Value) -> Option<&Vec<Value>> {
    match source {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("data").and_then(Value::as_array),
        _ => None,
    }
}

fn skip_matches(row: &Value, rule: &SkipRule) -> bool {
    row.get(rule.field).and_then(Value::as_str) == Some(rule.equals)
}

fn row_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract(obj: &Value, spec: &FieldSpec) -> FieldValue {
    spec.source
        .lookup(obj, spec.name)
        .filter(|raw| !raw.is_null())
        .and_then(|raw| coerce(raw, spec.kind))
        .unwrap_or_else(|| spec.default.to_field())
}

/// Coerce a raw server value to the declared kind. `None` means the
/// value resists coercion and the default applies.
fn coerce(raw: &Value, kind: Kind) -> Option<FieldValue> {
    match kind {
        Kind::Bool => truthy(raw).map(FieldValue::Bool),
        Kind::Int => match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(FieldValue::Int),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
                .map(FieldValue::Int),
            Value::Bool(b) => Some(FieldValue::Int(i64::from(*b))),
            _ => None,
        },
        Kind::Float => match raw {
            Value::Number(n) => n.as_f64().map(FieldValue::Float),
            Value::String(s) => s.trim().parse::<f64>().ok().map(FieldValue::Float),
            _ => None,
        },
        Kind::Str => match raw {
            Value::String(s) => Some(FieldValue::Str(s.clone())),
            Value::Number(n) => Some(FieldValue::Str(n.to_string())),
            Value::Bool(b) => Some(FieldValue::Str(b.to_string())),
            _ => None,
        },
    }
}

/// Truthiness per server convention: real booleans, non-zero numbers,
/// and the usual string spellings. Any other non-empty string is true.
fn truthy(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i != 0,
            None => n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON),
        }),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "" | "0" | "false" | "no" | "off" => Some(false),
            _ => Some(true),
        },
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue as D, Kind as K};
    use serde_json::json;

    const SCHEMA: &[FieldSpec] = &[
        FieldSpec::new("hostname", K::Str, D::Str("unknown")),
        FieldSpec::new("cpuUsage", K::Float, D::Float(0.0)),
        FieldSpec::new("memTotal", K::Int, D::Int(0)),
        FieldSpec::new("rebootRequired", K::Bool, D::Bool(false)),
        FieldSpec::new("load1min", K::Float, D::Float(0.0)).nested("loadAverage", "1min"),
    ];

    const ENSURE: &[FieldSpec] = &[FieldSpec::new("memUsage", K::Float, D::Float(0.0))];

    fn sample() -> Value {
        json!({
            "hostname": "nas1",
            "cpuUsage": 12.34,
            "memTotal": "8589934592",
            "rebootRequired": "yes",
            "loadAverage": { "1min": 0.25 }
        })
    }

    #[test]
    fn normalization_is_idempotent() {
        let source = sample();
        let once = normalize(FieldMap::new(), Some(&source), SCHEMA, ENSURE);
        let twice = normalize(once.clone(), Some(&source), SCHEMA, ENSURE);
        assert_eq!(once, twice);
    }

    #[test]
    fn coercions_apply() {
        let out = normalize(FieldMap::new(), Some(&sample()), SCHEMA, ENSURE);
        assert_eq!(out["hostname"], FieldValue::Str("nas1".into()));
        assert_eq!(out["cpuUsage"], FieldValue::Float(12.34));
        assert_eq!(out["memTotal"], FieldValue::Int(8_589_934_592));
        assert_eq!(out["rebootRequired"], FieldValue::Bool(true));
        assert_eq!(out["load1min"], FieldValue::Float(0.25));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let source = json!({ "hostname": "nas1" });
        let out = normalize(FieldMap::new(), Some(&source), SCHEMA, ENSURE);
        assert_eq!(out["cpuUsage"], FieldValue::Float(0.0));
        assert_eq!(out["memTotal"], FieldValue::Int(0));
        assert_eq!(out["rebootRequired"], FieldValue::Bool(false));
        assert_eq!(out["load1min"], FieldValue::Float(0.0));
    }

    #[test]
    fn absent_source_fills_defaults_without_clobbering() {
        let mut existing = FieldMap::new();
        existing.insert("hostname", FieldValue::Str("nas1".into()));

        let out = normalize(existing, None, SCHEMA, ENSURE);
        // Last good reading stands...
        assert_eq!(out["hostname"], FieldValue::Str("nas1".into()));
        // ...and every declared field still exists.
        for spec in SCHEMA {
            assert!(out.contains_key(spec.name), "missing {}", spec.name);
        }
        assert_eq!(out["memUsage"], FieldValue::Float(0.0));
    }

    #[test]
    fn malformed_field_falls_back_to_default() {
        let source = json!({ "cpuUsage": { "nested": "garbage" }, "memTotal": "not-a-number" });
        let out = normalize(FieldMap::new(), Some(&source), SCHEMA, ENSURE);
        assert_eq!(out["cpuUsage"], FieldValue::Float(0.0));
        assert_eq!(out["memTotal"], FieldValue::Int(0));
    }

    #[test]
    fn ensure_fields_survive_renormalization() {
        let mut once = normalize(FieldMap::new(), Some(&sample()), SCHEMA, ENSURE);
        once.insert("memUsage", FieldValue::Float(42.5));

        let again = normalize(once, Some(&sample()), SCHEMA, ENSURE);
        assert_eq!(again["memUsage"], FieldValue::Float(42.5));
    }

    // ── Keyed collections ────────────────────────────────────────────

    const FS_SCHEMA: &[FieldSpec] = &[
        FieldSpec::new("uuid", K::Str, D::Str("")),
        FieldSpec::new("type", K::Str, D::Str("unknown")),
        FieldSpec::new("size", K::Float, D::Float(0.0)),
    ];

    const FS_SKIP: &[SkipRule] = &[
        SkipRule::new("type", "swap"),
        SkipRule::new("type", "iso9660"),
    ];

    #[test]
    fn keyed_rows_by_key_field() {
        let source = json!([
            { "uuid": "aaa", "type": "ext4", "size": "1000" },
            { "uuid": "bbb", "type": "btrfs", "size": "2000" }
        ]);
        let out = normalize_keyed(KeyedMap::new(), Some(&source), FS_SCHEMA, "uuid", &[], FS_SKIP);
        assert_eq!(out.len(), 2);
        assert_eq!(out["aaa"]["size"], FieldValue::Float(1000.0));
        assert_eq!(out["bbb"]["type"], FieldValue::Str("btrfs".into()));
    }

    #[test]
    fn skip_rules_exclude_rows_entirely() {
        let source = json!([
            { "uuid": "aaa", "type": "ext4", "size": "1000" },
            { "uuid": "swp", "type": "swap", "size": "999" },
            { "uuid": "cd0", "type": "iso9660", "size": "700" }
        ]);
        let out = normalize_keyed(KeyedMap::new(), Some(&source), FS_SCHEMA, "uuid", &[], FS_SKIP);
        assert_eq!(out.len(), 1);
        assert!(!out.contains_key("swp"));
        assert!(!out.contains_key("cd0"));
    }

    #[test]
    fn keyless_rows_are_dropped() {
        let source = json!([
            { "type": "ext4" },
            { "uuid": "", "type": "ext4" },
            { "uuid": "ok", "type": "ext4" }
        ]);
        let out = normalize_keyed(KeyedMap::new(), Some(&source), FS_SCHEMA, "uuid", &[], &[]);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("ok"));
    }

    #[test]
    fn data_wrapper_is_unwrapped() {
        let source = json!({
            "data": [ { "uuid": "aaa", "type": "ext4", "size": 5 } ],
            "total": 1
        });
        let out = normalize_keyed(KeyedMap::new(), Some(&source), FS_SCHEMA, "uuid", &[], &[]);
        assert!(out.contains_key("aaa"));
    }

    #[test]
    fn absent_source_keeps_collection() {
        let source = json!([{ "uuid": "aaa", "type": "ext4", "size": 1 }]);
        let first = normalize_keyed(KeyedMap::new(), Some(&source), FS_SCHEMA, "uuid", &[], &[]);
        let second = normalize_keyed(first.clone(), None, FS_SCHEMA, "uuid", &[], &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn second_schema_enriches_existing_entries() {
        const SMART: &[FieldSpec] = &[
            FieldSpec::new("temperature", K::Int, D::Int(0)),
        ];

        let inventory = json!([{ "uuid": "sda", "type": "ext4", "size": 1 }]);
        let smart = json!([{ "uuid": "sda", "temperature": 31 }]);

        let base = normalize_keyed(KeyedMap::new(), Some(&inventory), FS_SCHEMA, "uuid", &[], &[]);
        let merged = normalize_keyed(base, Some(&smart), SMART, "uuid", &[], &[]);

        // Inventory fields still there, SMART fields merged in.
        assert_eq!(merged["sda"]["type"], FieldValue::Str("ext4".into()));
        assert_eq!(merged["sda"]["temperature"], FieldValue::Int(31));
    }
}
