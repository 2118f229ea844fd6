//! Records: the unit flowing through a pipeline
//!
//! A [`Record`] is an ordered list of [`Field`]s plus a [`Tags`] map of
//! pipeline metadata. Field names are matched case-insensitively. The
//! backing list may hold duplicate names; [`Record::append_or_replace`]
//! enforces last-write-wins.

use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// Tag holding the name of the inlet that produced a record
pub const TAG_SOURCE: &str = "_in";

/// Tag holding the ingestion timestamp of a record
pub const TAG_TIMESTAMP: &str = "_ts";

/// Metadata map attached to records and fields
pub type Tags = HashMap<String, Value>;

/// A batch of records handed between pipeline stages
pub type Batch = Vec<Record>;

/// A named value with its own small tag map
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field value
    pub value: Value,
    /// Field-level metadata
    pub tags: Tags,
}

impl Field {
    /// Create an untagged field
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            tags: Tags::new(),
        }
    }

    /// Attach a field-level tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive name match
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Anything that can look up a field by case-insensitive name.
///
/// Implemented by [`Record`] and by field slices (table rows), so predicates
/// evaluate against both.
pub trait FieldLookup {
    /// Find the first field with the given name
    fn lookup(&self, name: &str) -> Option<&Field>;
}

impl FieldLookup for [Field] {
    fn lookup(&self, name: &str) -> Option<&Field> {
        self.iter().find(|f| f.is_named(name))
    }
}

impl FieldLookup for Vec<Field> {
    fn lookup(&self, name: &str) -> Option<&Field> {
        self.as_slice().lookup(name)
    }
}

/// Ordered fields plus a metadata tag map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<Field>,
    tags: Tags,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record from fields, keeping their order
    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self {
            fields,
            tags: Tags::new(),
        }
    }

    /// Builder-style [`Record::append_or_replace`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.append_or_replace(Field::new(name, value));
        self
    }

    /// Fields in insertion order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Consume the record, returning its fields
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find a field by case-insensitive name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.lookup(name)
    }

    /// Find a field's value by case-insensitive name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).map(|f| &f.value)
    }

    /// Append a field; duplicates are allowed
    pub fn append(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Replace the field with the same (case-insensitive) name in place,
    /// or append it when absent
    pub fn append_or_replace(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.is_named(&field.name)) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Remove every field with the given name, returning how many went
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| !f.is_named(name));
        before - self.fields.len()
    }

    /// Record metadata
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Look up one tag
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    /// Set a tag.
    ///
    /// [`TAG_SOURCE`] and [`TAG_TIMESTAMP`] are stamped by the inlet handler;
    /// flows should leave them alone.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Name of the inlet that produced this record
    pub fn source(&self) -> Option<&str> {
        self.tag(TAG_SOURCE).and_then(Value::as_str)
    }
}

impl FieldLookup for Record {
    fn lookup(&self, name: &str) -> Option<&Field> {
        self.field(name)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| {
            if first {
                first = false;
                Ok(())
            } else {
                f.write_str(" ")
            }
        };
        for field in &self.fields {
            sep(f)?;
            write_pair(f, &field.name, &field.value)?;
        }
        let mut keys: Vec<&String> = self.tags.keys().collect();
        keys.sort();
        for key in keys {
            sep(f)?;
            write_pair(f, key, &self.tags[key])?;
        }
        Ok(())
    }
}

fn write_pair(f: &mut fmt::Formatter<'_>, name: &str, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "{name}={s:?}"),
        other => write!(f, "{name}={other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let record = Record::new().with("Temperature", 21.5);
        assert_eq!(record.get("temperature"), Some(&Value::Float(21.5)));
        assert_eq!(record.get("TEMPERATURE"), Some(&Value::Float(21.5)));
        assert!(record.get("humidity").is_none());
    }

    #[test]
    fn test_append_keeps_duplicates_in_order() {
        let mut record = Record::new();
        record.append(Field::new("a", 1));
        record.append(Field::new("b", 2));
        record.append(Field::new("A", 3));
        let names: Vec<&str> = record.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "A"]);
        assert_eq!(record.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_append_or_replace_is_last_write_wins() {
        let mut record = Record::new().with("a", 1).with("b", 2);
        record.append_or_replace(Field::new("A", "one"));
        assert_eq!(record.len(), 2);
        assert_eq!(record.fields()[0].name, "A");
        assert_eq!(record.get("a"), Some(&Value::from("one")));
        assert_eq!(record.fields()[1].name, "b");
    }

    #[test]
    fn test_remove_drops_all_matches() {
        let mut record = Record::new();
        record.append(Field::new("x", 1));
        record.append(Field::new("X", 2));
        record.append(Field::new("y", 3));
        assert_eq!(record.remove("x"), 2);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_tags_are_separate_from_fields() {
        let mut record = Record::new().with("a", 1);
        record.set_tag(TAG_SOURCE, "sensors");
        assert_eq!(record.source(), Some("sensors"));
        assert!(record.get(TAG_SOURCE).is_none());
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_field_tags() {
        let field = Field::new("cpu", 0.5).with_tag("unit", "ratio");
        assert_eq!(field.tags.get("unit"), Some(&Value::from("ratio")));
    }

    #[test]
    fn test_display() {
        let mut record = Record::new().with("a", 1).with("host", "web-1");
        record.set_tag("_in", "seed");
        assert_eq!(record.to_string(), r#"a=1 host="web-1" _in="seed""#);
    }

    #[test]
    fn test_field_slice_lookup() {
        let row = vec![Field::new("Key", 1), Field::new("v", 2)];
        assert_eq!(row.lookup("key").map(|f| &f.value), Some(&Value::Int(1)));
    }
}
