//! Key-ordered tables of merged rows
//!
//! A [`Table`] maps a key (typically Unix seconds) to a row of fields,
//! preserving the order in which keys were first seen. [`Table::set`] merges
//! fields into the row for a key by case-insensitive name, last write wins.
//! The merge flow uses it to join records that share a time window and to
//! split off rows old enough to emit.

use std::collections::HashMap;
use std::hash::Hash;

use crate::predicate::Predicate;
use crate::record::{Field, Record};
use crate::value::ValueType;

/// A declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Values written to this column are converted to this type
    pub ty: ValueType,
}

impl Column {
    /// Declare a column
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered key → row mapping with column projection and predicate views
#[derive(Debug, Clone)]
pub struct Table<K> {
    columns: Vec<Column>,
    keys: Vec<K>,
    rows: HashMap<K, Vec<Field>>,
    filter: Option<Predicate>,
}

impl<K> Default for Table<K> {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            keys: Vec::new(),
            rows: HashMap::new(),
            filter: None,
        }
    }
}

impl<K: Eq + Hash + Clone> Table<K> {
    /// Create a table with declared columns
    pub fn new(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Declared columns, in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Merge fields into the row for `key`, creating the row if needed.
    ///
    /// Values for declared columns are converted to the column type;
    /// unknown names declare a new column typed after the incoming value.
    pub fn set(&mut self, key: K, fields: impl IntoIterator<Item = Field>) {
        if !self.rows.contains_key(&key) {
            self.keys.push(key.clone());
            self.rows.insert(key.clone(), Vec::new());
        }

        for mut field in fields {
            let declared = self
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&field.name))
                .map(|c| c.ty);
            match declared {
                Some(ty) if field.value.value_type() != ty => {
                    field.value = field.value.convert(ty);
                }
                Some(_) => {}
                None => self
                    .columns
                    .push(Column::new(field.name.clone(), field.value.value_type())),
            }

            let Some(row) = self.rows.get_mut(&key) else {
                continue;
            };
            match row.iter_mut().find(|f| f.is_named(&field.name)) {
                Some(existing) => *existing = field,
                None => row.push(field),
            }
        }
    }

    /// The row for `key`, if present and visible through the current filter
    pub fn get(&self, key: &K) -> Option<&[Field]> {
        self.rows
            .get(key)
            .filter(|row| self.visible(row))
            .map(Vec::as_slice)
    }

    /// Remove a row regardless of the filter
    pub fn remove(&mut self, key: &K) -> Option<Vec<Field>> {
        let row = self.rows.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(row)
    }

    /// Visible rows in first-seen key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[Field])> {
        self.keys.iter().filter_map(move |k| self.get(k).map(|row| (k, row)))
    }

    /// Visible keys in first-seen order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// Number of visible rows
    pub fn len(&self) -> usize {
        match self.filter {
            None => self.keys.len(),
            Some(_) => self.iter().count(),
        }
    }

    /// Whether no row is visible
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Project the visible rows onto the named columns
    pub fn select(&self, names: &[&str]) -> Table<K> {
        let columns: Vec<Column> = names
            .iter()
            .filter_map(|n| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(n)))
            .cloned()
            .collect();

        let mut out = Table::new(columns);
        for (key, row) in self.iter() {
            let projected = row
                .iter()
                .filter(|f| names.iter().any(|n| f.is_named(n)))
                .cloned()
                .collect();
            out.keys.push(key.clone());
            out.rows.insert(key.clone(), projected);
        }
        out
    }

    /// Narrow the visible rows without touching them.
    ///
    /// Successive filters accumulate with OR: a row stays visible if it
    /// matches any of them.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.or(predicate),
            None => predicate,
        });
        self
    }

    /// Drop rows hidden by the filter and clear it
    pub fn compact(&mut self) {
        let Some(filter) = self.filter.take() else {
            return;
        };
        let rows = &mut self.rows;
        self.keys.retain(|k| {
            let keep = rows.get(k).is_some_and(|row| filter.apply(row));
            if !keep {
                rows.remove(k);
            }
            keep
        });
    }

    /// Partition every row into `(matching, remainder)`.
    ///
    /// Both halves keep the column declarations and first-seen order; any
    /// pending filter is discarded.
    pub fn split(self, predicate: &Predicate) -> (Table<K>, Table<K>) {
        let mut selected = Table::new(self.columns.clone());
        let mut remainder = Table::new(self.columns);
        let mut rows = self.rows;

        for key in self.keys {
            let Some(row) = rows.remove(&key) else {
                continue;
            };
            let target = if predicate.apply(&row) {
                &mut selected
            } else {
                &mut remainder
            };
            target.keys.push(key.clone());
            target.rows.insert(key, row);
        }
        (selected, remainder)
    }

    /// Visible rows as records, in key order
    pub fn into_records(self) -> Vec<Record> {
        let Self {
            keys,
            mut rows,
            filter,
            ..
        } = self;
        keys.into_iter()
            .filter_map(|k| rows.remove(&k))
            .filter(|row| filter.as_ref().is_none_or(|p| p.apply(row)))
            .map(Record::from_fields)
            .collect()
    }

    fn visible(&self, row: &[Field]) -> bool {
        self.filter.as_ref().is_none_or(|p| p.apply(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Comparator;
    use crate::record::FieldLookup;
    use crate::value::Value;

    fn table() -> Table<i64> {
        let mut t = Table::new([Column::new("temp", ValueType::Float)]);
        t.set(30, [Field::new("temp", 20.5), Field::new("host", "a")]);
        t.set(10, [Field::new("temp", 19.0), Field::new("host", "b")]);
        t.set(20, [Field::new("temp", 22.0), Field::new("host", "a")]);
        t
    }

    fn host_is(h: &str) -> Predicate {
        Predicate::field("host", Comparator::Eq(h.into()))
    }

    #[test]
    fn test_keys_keep_first_seen_order() {
        let mut t = table();
        t.set(10, [Field::new("temp", 1.0)]);
        let keys: Vec<i64> = t.keys().copied().collect();
        assert_eq!(keys, vec![30, 10, 20]);
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut t = table();
        let before = t.get(&10).unwrap().to_vec();
        t.set(10, [Field::new("temp", 19.0), Field::new("host", "b")]);
        assert_eq!(t.get(&10).unwrap(), before.as_slice());
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_set_adds_columns_without_disturbing_existing() {
        let mut t = table();
        t.set(10, [Field::new("humidity", 40)]);
        let row = t.get(&10).unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.lookup("temp").unwrap().value, Value::Float(19.0));
        assert_eq!(row.lookup("humidity").unwrap().value, Value::Int(40));
        assert!(t.columns().iter().any(|c| c.name == "humidity" && c.ty == ValueType::Int));
    }

    #[test]
    fn test_set_last_write_wins_case_insensitive() {
        let mut t = table();
        t.set(20, [Field::new("HOST", "z")]);
        let row = t.get(&20).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.lookup("host").unwrap().value, Value::from("z"));
    }

    #[test]
    fn test_declared_column_type_is_enforced() {
        let mut t = table();
        t.set(40, [Field::new("temp", "21.25")]);
        t.set(50, [Field::new("temp", "warm")]);
        assert_eq!(t.get(&40).unwrap()[0].value, Value::Float(21.25));
        assert_eq!(t.get(&50).unwrap()[0].value, Value::Null(ValueType::Float));
    }

    #[test]
    fn test_select_projects_columns() {
        let t = table();
        let s = t.select(&["HOST"]);
        assert_eq!(s.columns().len(), 1);
        assert_eq!(s.len(), 3);
        for (_, row) in s.iter() {
            assert_eq!(row.len(), 1);
            assert_eq!(row[0].name, "host");
        }
        // source untouched
        assert_eq!(t.get(&30).unwrap().len(), 2);
    }

    #[test]
    fn test_filter_is_lazy_and_or_accumulated() {
        let t = table().filter(host_is("b"));
        assert_eq!(t.len(), 1);
        assert!(t.get(&30).is_none());

        let t = t.filter(host_is("a"));
        assert_eq!(t.len(), 3);

        let t = table().filter(host_is("nobody"));
        assert!(t.is_empty());
        assert_eq!(t.keys.len(), 3, "rows are kept until compact");
    }

    #[test]
    fn test_compact_drops_hidden_rows() {
        let mut t = table().filter(host_is("a"));
        t.compact();
        assert_eq!(t.keys.len(), 2);
        assert_eq!(t.rows.len(), 2);
        let keys: Vec<i64> = t.keys().copied().collect();
        assert_eq!(keys, vec![30, 20]);
    }

    #[test]
    fn test_split_is_exhaustive() {
        let predicates = [
            host_is("a"),
            host_is("nobody"),
            Predicate::field("temp", Comparator::Gte(20.5.into())),
            Predicate::And(None, None),
        ];
        for predicate in &predicates {
            let original = table();
            let all: Vec<i64> = original.keys().copied().collect();
            let (selected, remainder) = original.split(predicate);

            for (_, row) in selected.iter() {
                assert!(predicate.apply(row));
            }
            for (_, row) in remainder.iter() {
                assert!(!predicate.apply(row));
            }
            let mut seen: Vec<i64> = selected.keys().chain(remainder.keys()).copied().collect();
            seen.sort();
            let mut expected = all.clone();
            expected.sort();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_split_keeps_order_in_both_halves() {
        let (selected, remainder) = table().split(&host_is("a"));
        assert_eq!(selected.keys().copied().collect::<Vec<_>>(), vec![30, 20]);
        assert_eq!(remainder.keys().copied().collect::<Vec<_>>(), vec![10]);
        assert_eq!(remainder.columns().len(), 2);
    }

    #[test]
    fn test_into_records() {
        let records = table().filter(host_is("a")).into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("temp"), Some(&Value::Float(20.5)));
    }

    #[test]
    fn test_remove() {
        let mut t = table();
        assert!(t.remove(&10).is_some());
        assert!(t.remove(&10).is_none());
        assert_eq!(t.keys().copied().collect::<Vec<_>>(), vec![30, 20]);
    }
}
