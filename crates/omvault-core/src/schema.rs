// ── Declarative field schemas ──
//
// Each resource kind declares its fields once: name in the snapshot,
// where the value comes from in the server response, how to coerce it,
// and what to substitute when the server doesn't send it. The
// normalizer guarantees every declared field exists in its output, so
// readers never need existence checks.

use std::collections::HashMap;

/// A normalized field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric read across both numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Non-negative integer read; negative counters read as zero.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => Some((*i).max(0).unsigned_abs()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Declared default, const-constructible for static schema tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_field(self) -> FieldValue {
        match self {
            Self::Bool(b) => FieldValue::Bool(b),
            Self::Int(i) => FieldValue::Int(i),
            Self::Float(f) => FieldValue::Float(f),
            Self::Str(s) => FieldValue::Str(s.to_owned()),
        }
    }
}

/// Coercion applied to the raw server value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Str,
}

/// Where a field's value lives in the source object. Nesting is
/// bounded at two levels on purpose; the server never goes deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Source key equals the field name.
    SameAsName,
    /// Source key differs from the field name.
    Field(&'static str),
    /// One level of nesting, e.g. `loadAverage` → `1min`.
    Nested(&'static str, &'static str),
}

impl Source {
    /// Resolve this source within a response object.
    pub fn lookup<'v>(&self, obj: &'v serde_json::Value, name: &str) -> Option<&'v serde_json::Value> {
        match self {
            Self::SameAsName => obj.get(name),
            Self::Field(key) => obj.get(key),
            Self::Nested(outer, inner) => obj.get(outer)?.get(inner),
        }
    }
}

/// One declared field of a resource schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source: Source,
    pub kind: Kind,
    pub default: DefaultValue,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: Kind, default: DefaultValue) -> Self {
        Self {
            name,
            source: Source::SameAsName,
            kind,
            default,
        }
    }

    /// Read the value from a differently-named source key.
    pub const fn from_key(mut self, key: &'static str) -> Self {
        self.source = Source::Field(key);
        self
    }

    /// Read the value from a nested source path.
    pub const fn nested(mut self, outer: &'static str, inner: &'static str) -> Self {
        self.source = Source::Nested(outer, inner);
        self
    }
}

/// Excludes whole source objects from a collection, e.g. swap
/// filesystems or the loopback interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRule {
    pub field: &'static str,
    pub equals: &'static str,
}

impl SkipRule {
    pub const fn new(field: &'static str, equals: &'static str) -> Self {
        Self { field, equals }
    }
}

/// Normalized singleton resource: field name → value.
pub type FieldMap = HashMap<&'static str, FieldValue>;

/// Normalized collection resource: unique key → field map.
pub type KeyedMap = HashMap<String, FieldMap>;
