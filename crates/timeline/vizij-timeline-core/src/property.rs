#![allow(dead_code)]
//! Property blocks and the per-property record a tween builds from them.

use crate::easing::Easing;
use crate::error::{Result, TimelineError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A property value handed to a backend. Strings are kept verbatim unless purely numeric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Pure numeric strings become numbers.
    pub fn coerce(self) -> Self {
        match self {
            PropertyValue::Text(s) => match numeric(&s) {
                Some(n) => PropertyValue::Number(n),
                None => PropertyValue::Text(s),
            },
            v => v,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(s) => numeric(s),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Number(_) => None,
        }
    }
}

fn numeric(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One entry of a property block: a value and an optional per-property easing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropertySpec {
    pub value: PropertyValue,
    pub easing: Option<Easing>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecRepr {
    Plain(PropertyValue),
    Eased(PropertyValue, Easing),
}

impl<'de> Deserialize<'de> for PropertySpec {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> core::result::Result<Self, D::Error> {
        Ok(match SpecRepr::deserialize(de)? {
            SpecRepr::Plain(value) => PropertySpec {
                value,
                easing: None,
            },
            SpecRepr::Eased(value, easing) => PropertySpec {
                value,
                easing: Some(easing),
            },
        })
    }
}

/// Insertion ordered map of property name to value, e.g. `{"left": 100, "opacity": ["0.5", "ease-in"]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBlock(IndexMap<String, PropertySpec>);

impl PropertyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value.into(), None);
        self
    }

    pub fn with_eased(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        easing: impl Into<Easing>,
    ) -> Self {
        self.insert(name, value.into(), Some(easing.into()));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue, easing: Option<Easing>) {
        self.0.insert(name.into(), PropertySpec { value, easing });
    }

    /// Parse a block from JSON; anything but an object is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TimelineError::InvalidPropertyBlock {
                reason: format!("expected an object, got {}", json_kind(value)),
            });
        }
        serde_json::from_value(value.clone()).map_err(|e| TimelineError::InvalidPropertyBlock {
            reason: e.to_string(),
        })
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.0.get(name)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertySpec)> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrite every per-property easing.
    pub(crate) fn map_easings(&mut self, f: impl Fn(&Easing) -> Easing) {
        for spec in self.0.values_mut() {
            if let Some(e) = spec.easing.as_mut() {
                *e = f(e);
            }
        }
    }

    /// Merge `other` on top of this block.
    pub fn extend(&mut self, other: &PropertyBlock) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// `border-bottom-width` -> `borderBottomWidth`
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('-', Some(n)) if n.is_ascii_lowercase() => {
                out.push(n.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

const TRANSFORM_PROPERTIES: &[&str] = &[
    "scale", "scale3d", "translate", "translate3d", "rotate", "rotate3d", "rotation", "skew",
    "scaleX", "scaleY", "scaleZ", "translateX", "translateY", "translateZ", "x", "y", "z",
    "rotateX", "rotateY", "rotateZ", "skewX", "skewY",
];

/// Canonical order of transform components for emulated playback.
pub const TRANSFORM_ORDER: &[&str] = &[
    "x", "translateX", "y", "translateY", "z", "translateZ", "rotateZ", "rotate", "rotation",
    "rotationZ", "rotateX", "rotationX", "rotateY", "rotationY", "scale", "scaleX", "scaleY",
    "scaleZ",
];

#[inline]
pub fn is_transform_property(name: &str) -> bool {
    TRANSFORM_PROPERTIES.contains(&name)
}

/// Which column of a [`PropertyRecord`] to read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Pre,
    Begin,
    End,
    Then,
}

/// Everything a tween knows about one property across its lifecycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyRecord {
    /// Value found on the target before the tween touched it.
    pub pre: Option<PropertyValue>,
    pub begin: Option<PropertyValue>,
    pub end: Option<PropertyValue>,
    pub then: Option<PropertyValue>,
    pub easing: Option<Easing>,
    pub is_transform: bool,
}

impl PropertyRecord {
    pub fn field(&self, field: Field) -> Option<&PropertyValue> {
        match field {
            Field::Pre => self.pre.as_ref(),
            Field::Begin => self.begin.as_ref(),
            Field::End => self.end.as_ref(),
            Field::Then => self.then.as_ref(),
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut Option<PropertyValue> {
        match field {
            Field::Pre => &mut self.pre,
            Field::Begin => &mut self.begin,
            Field::End => &mut self.end,
            Field::Then => &mut self.then,
        }
    }
}

/// Per-property records keyed by camelized name.
pub type PropertyTable = IndexMap<String, PropertyRecord>;

/// Move transform properties to the front in canonical order.
pub fn sort_transforms(table: PropertyTable) -> PropertyTable {
    let mut rest = table;
    let mut sorted = PropertyTable::with_capacity(rest.len());
    for name in TRANSFORM_ORDER {
        if let Some(rec) = rest.shift_remove(*name) {
            sorted.insert((*name).to_string(), rec);
        }
    }
    sorted.extend(rest);
    sorted
}

/// Whether any property has a value in this column.
pub fn has_column(table: &PropertyTable, field: Field) -> bool {
    table.values().any(|rec| rec.field(field).is_some())
}

/// Values of one column, ready for a backend. Falls back to a no-op `opacity: "+=0"`.
pub fn column_values(table: &PropertyTable, field: Field, with_easing: bool) -> PropertyBlock {
    let mut block = PropertyBlock::new();
    for (name, rec) in table {
        if let Some(v) = rec.field(field) {
            let easing = if with_easing { rec.easing.clone() } else { None };
            block.insert(name.clone(), v.clone().coerce(), easing);
        }
    }
    if block.is_empty() {
        block.insert("opacity", PropertyValue::from("+=0"), None);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_are_coerced() {
        assert_eq!(PropertyValue::from("10").coerce(), PropertyValue::Number(10.0));
        assert_eq!(PropertyValue::from(" 2.5 ").coerce(), PropertyValue::Number(2.5));
        assert_eq!(
            PropertyValue::from("10px").coerce(),
            PropertyValue::Text("10px".into())
        );
        assert_eq!(PropertyValue::from("").coerce(), PropertyValue::Text("".into()));
    }

    #[test]
    fn block_from_json_with_easing() {
        let b = PropertyBlock::from_json(&json!({"left": 100, "opacity": ["0.5", "ease-in"]}))
            .unwrap();
        assert_eq!(b.len(), 2);
        let op = b.get("opacity").unwrap();
        assert_eq!(op.value, PropertyValue::Text("0.5".into()));
        assert_eq!(op.easing, Some(Easing::Named("ease-in".into())));
        let keys: Vec<_> = b.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["left", "opacity"]);
    }

    #[test]
    fn non_object_blocks_fail_fast() {
        for bad in [json!(3), json!("left"), json!([1, 2]), json!(null)] {
            let err = PropertyBlock::from_json(&bad).unwrap_err();
            assert_eq!(err.category(), "validation");
        }
    }

    #[test]
    fn camelize_names() {
        assert_eq!(camelize("border-bottom-width"), "borderBottomWidth");
        assert_eq!(camelize("opacity"), "opacity");
        assert_eq!(camelize("-x"), "X");
    }

    #[test]
    fn transforms_first_in_canonical_order() {
        let mut t = PropertyTable::new();
        for n in ["opacity", "scale", "x", "rotate"] {
            t.insert(n.into(), PropertyRecord::default());
        }
        let keys: Vec<_> = sort_transforms(t).keys().cloned().collect();
        assert_eq!(keys, vec!["x", "rotate", "scale", "opacity"]);
    }

    #[test]
    fn easings_can_be_rewritten() {
        let mut b = PropertyBlock::new()
            .with_eased("left", 1.0, "linear")
            .with("top", 2.0);
        b.map_easings(|_| Easing::Bezier([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(
            b.get("left").unwrap().easing,
            Some(Easing::Bezier([0.0, 0.0, 1.0, 1.0]))
        );
        assert_eq!(b.get("top").unwrap().easing, None);
    }

    #[test]
    fn empty_column_falls_back_to_noop() {
        assert!(!has_column(&PropertyTable::new(), Field::End));
        let block = column_values(&PropertyTable::new(), Field::End, false);
        assert_eq!(
            block.get("opacity").map(|s| s.value.clone()),
            Some(PropertyValue::Text("+=0".into()))
        );
    }
}
