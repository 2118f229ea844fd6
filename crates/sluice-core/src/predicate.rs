//! Boolean predicates over record fields
//!
//! A [`Predicate`] is either a field comparison leaf or an AND/OR of two
//! optional sub-predicates. A missing operand is "always true" inside AND and
//! "always false" inside OR.
//!
//! `Gte` and `Lte` are evaluated as `Gt || Eq` and `Lt || Eq` so that every
//! comparator goes through the same [`Value`] equality and ordering rules.

use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigMap, ConfigValue};
use crate::error::{Error, Result};
use crate::record::FieldLookup;
use crate::value::Value;

/// Custom comparison over the raw field value (`None` when the field is missing)
pub type CompareFn = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// How a field is compared against its operand
#[derive(Clone)]
pub enum Comparator {
    /// Equal
    Eq(Value),
    /// Not equal
    Neq(Value),
    /// Greater than
    Gt(Value),
    /// Greater than or equal (`Gt || Eq`)
    Gte(Value),
    /// Less than
    Lt(Value),
    /// Less than or equal (`Lt || Eq`)
    Lte(Value),
    /// Member of the set
    In(Vec<Value>),
    /// Not a member of the set
    NotIn(Vec<Value>),
    /// Escape hatch; also sees missing fields
    Func(CompareFn),
}

impl Comparator {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Eq(operand) => value.equals(operand),
            Self::Neq(operand) => !value.equals(operand),
            Self::Gt(operand) => value.greater_than(operand),
            Self::Gte(operand) => value.greater_than(operand) || value.equals(operand),
            Self::Lt(operand) => value.less_than(operand),
            Self::Lte(operand) => value.less_than(operand) || value.equals(operand),
            Self::In(set) => value.is_in(set),
            Self::NotIn(set) => !value.is_in(set),
            Self::Func(f) => f(Some(value)),
        }
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(v) => write!(f, "== {v:?}"),
            Self::Neq(v) => write!(f, "!= {v:?}"),
            Self::Gt(v) => write!(f, "> {v:?}"),
            Self::Gte(v) => write!(f, ">= {v:?}"),
            Self::Lt(v) => write!(f, "< {v:?}"),
            Self::Lte(v) => write!(f, "<= {v:?}"),
            Self::In(set) => write!(f, "in {set:?}"),
            Self::NotIn(set) => write!(f, "not in {set:?}"),
            Self::Func(_) => f.write_str("<func>"),
        }
    }
}

/// A boolean expression tree
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Compare one named field
    Field {
        /// Field name, matched case-insensitively
        column: String,
        /// Comparison and operand
        comparator: Comparator,
    },
    /// Both sides must hold; a missing side holds
    And(Option<Box<Predicate>>, Option<Box<Predicate>>),
    /// Either side must hold; a missing side does not
    Or(Option<Box<Predicate>>, Option<Box<Predicate>>),
}

impl Predicate {
    /// A field comparison leaf
    pub fn field(column: impl Into<String>, comparator: Comparator) -> Self {
        Self::Field {
            column: column.into(),
            comparator,
        }
    }

    /// `self AND other`
    pub fn and(self, other: Predicate) -> Self {
        Self::And(Some(Box::new(self)), Some(Box::new(other)))
    }

    /// `self OR other`
    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Some(Box::new(self)), Some(Box::new(other)))
    }

    /// Evaluate against a record or row
    pub fn apply<L: FieldLookup + ?Sized>(&self, fields: &L) -> bool {
        match self {
            Self::Field { column, comparator } => match fields.lookup(column) {
                Some(field) => comparator.matches(&field.value),
                None => match comparator {
                    Comparator::Func(f) => f(None),
                    _ => false,
                },
            },
            Self::And(left, right) => {
                left.as_ref().is_none_or(|p| p.apply(fields))
                    && right.as_ref().is_none_or(|p| p.apply(fields))
            }
            Self::Or(left, right) => {
                left.as_ref().is_some_and(|p| p.apply(fields))
                    || right.as_ref().is_some_and(|p| p.apply(fields))
            }
        }
    }

    /// Build a predicate from configuration.
    ///
    /// Leaves are `{ field, op, value }` maps with `op` one of `eq`, `neq`,
    /// `gt`, `gte`, `lt`, `lte`, `in`, `not_in`. Composites are
    /// `{ and: [..] }` or `{ or: [..] }`, folded left.
    pub fn from_config(config: &ConfigValue) -> Result<Self> {
        let map = config
            .as_map()
            .ok_or_else(|| Error::invalid("predicate must be a map"))?;

        if let Some(items) = map.get("and") {
            return fold(items, Predicate::And);
        }
        if let Some(items) = map.get("or") {
            return fold(items, Predicate::Or);
        }
        leaf(map)
    }
}

type Compose = fn(Option<Box<Predicate>>, Option<Box<Predicate>>) -> Predicate;

fn fold(items: &ConfigValue, compose: Compose) -> Result<Predicate> {
    let items = items
        .as_list()
        .ok_or_else(|| Error::invalid("'and'/'or' expects a list of predicates"))?;

    let mut parsed = items.iter().map(Predicate::from_config);
    let first = parsed.next().transpose()?.map(Box::new);
    let second = parsed.next().transpose()?.map(Box::new);
    let mut folded = compose(first, second);
    for next in parsed {
        folded = compose(Some(Box::new(folded)), Some(Box::new(next?)));
    }
    Ok(folded)
}

fn leaf(map: &ConfigMap) -> Result<Predicate> {
    let column = map
        .get("field")
        .and_then(ConfigValue::as_str)
        .ok_or_else(|| Error::invalid("predicate requires a 'field' name"))?;
    let op = map.get_str("op", "eq").to_ascii_lowercase();
    let operand = map.get("value").cloned().unwrap_or_default();

    let comparator = match op.as_str() {
        "eq" | "==" => Comparator::Eq(scalar(&operand)?),
        "neq" | "ne" | "!=" => Comparator::Neq(scalar(&operand)?),
        "gt" | ">" => Comparator::Gt(scalar(&operand)?),
        "gte" | "ge" | ">=" => Comparator::Gte(scalar(&operand)?),
        "lt" | "<" => Comparator::Lt(scalar(&operand)?),
        "lte" | "le" | "<=" => Comparator::Lte(scalar(&operand)?),
        "in" => Comparator::In(set(&operand)?),
        "not_in" | "nin" => Comparator::NotIn(set(&operand)?),
        other => return Err(Error::invalid(format!("unknown comparator '{other}'"))),
    };
    Ok(Predicate::field(column, comparator))
}

fn scalar(operand: &ConfigValue) -> Result<Value> {
    operand
        .to_value()
        .ok_or_else(|| Error::invalid("comparison operand must be a scalar"))
}

fn set(operand: &ConfigValue) -> Result<Vec<Value>> {
    operand
        .as_list()
        .ok_or_else(|| Error::invalid("'in'/'not_in' operand must be a list"))?
        .iter()
        .map(scalar)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, Record};

    fn record() -> Record {
        Record::new()
            .with("host", "web-1")
            .with("cpu", 0.75)
            .with("count", 10)
    }

    fn leaf(column: &str, comparator: Comparator) -> Predicate {
        Predicate::field(column, comparator)
    }

    #[test]
    fn test_comparators() {
        let r = record();
        assert!(leaf("host", Comparator::Eq("web-1".into())).apply(&r));
        assert!(leaf("HOST", Comparator::Neq("web-2".into())).apply(&r));
        assert!(leaf("cpu", Comparator::Gt(0.5.into())).apply(&r));
        assert!(leaf("count", Comparator::Gte(10.into())).apply(&r));
        assert!(leaf("count", Comparator::Lte(10.into())).apply(&r));
        assert!(!leaf("count", Comparator::Lt(10.into())).apply(&r));
        assert!(leaf("count", Comparator::In(vec![1.into(), 10.into()])).apply(&r));
        assert!(leaf("host", Comparator::NotIn(vec!["db".into()])).apply(&r));
    }

    #[test]
    fn test_missing_field_is_false_for_every_builtin() {
        let r = record();
        for comparator in [
            Comparator::Eq(1.into()),
            Comparator::Neq(1.into()),
            Comparator::Gt(1.into()),
            Comparator::Lte(1.into()),
            Comparator::NotIn(vec![]),
        ] {
            assert!(!leaf("absent", comparator).apply(&r));
        }
    }

    #[test]
    fn test_func_sees_missing_field() {
        let is_missing: CompareFn = Arc::new(|v: Option<&Value>| v.is_none());
        assert!(leaf("absent", Comparator::Func(is_missing.clone())).apply(&record()));
        assert!(!leaf("host", Comparator::Func(is_missing)).apply(&record()));
    }

    #[test]
    fn test_gte_composes_gt_and_eq() {
        // incompatible types: neither Gt nor Eq, so Gte is false too
        let r = Record::new().with("v", "10");
        assert!(!leaf("v", Comparator::Gte(10.into())).apply(&r));
        // NaN has no ordering and is not equal to itself
        let nan = Record::new().with("v", f64::NAN);
        assert!(!leaf("v", Comparator::Gte(f64::NAN.into())).apply(&nan));
    }

    #[test]
    fn test_and_or_match_boolean_logic() {
        let r = record();
        let t = leaf("host", Comparator::Eq("web-1".into()));
        let f = leaf("host", Comparator::Eq("nope".into()));
        for (a, b) in [(&t, &t), (&t, &f), (&f, &t), (&f, &f)] {
            let and = a.clone().and(b.clone());
            let or = a.clone().or(b.clone());
            assert_eq!(and.apply(&r), a.apply(&r) && b.apply(&r));
            assert_eq!(or.apply(&r), a.apply(&r) || b.apply(&r));
        }
    }

    #[test]
    fn test_nil_operands() {
        let r = record();
        let t = Box::new(leaf("host", Comparator::Eq("web-1".into())));
        assert!(Predicate::And(None, None).apply(&r));
        assert!(Predicate::And(Some(t.clone()), None).apply(&r));
        assert!(!Predicate::Or(None, None).apply(&r));
        assert!(Predicate::Or(None, Some(t)).apply(&r));
    }

    #[test]
    fn test_applies_to_rows() {
        let row = vec![Field::new("k", 3)];
        assert!(leaf("K", Comparator::Eq(3.into())).apply(&row));
        assert!(leaf("k", Comparator::Lt(4.into())).apply(row.as_slice()));
    }

    fn parse(yaml: &str) -> Result<Predicate> {
        let value: ConfigValue = serde_yaml::from_str(yaml).unwrap();
        Predicate::from_config(&value)
    }

    #[test]
    fn test_from_config_leaf() {
        let p = parse("{ field: count, op: gte, value: 10 }").unwrap();
        assert!(p.apply(&record()));
        let p = parse("{ field: host, value: web-1 }").unwrap();
        assert!(p.apply(&record()));
    }

    #[test]
    fn test_from_config_composites() {
        let p = parse(
            r#"
and:
  - { field: cpu, op: gt, value: 0.5 }
  - or:
      - { field: host, op: in, value: [db-1, db-2] }
      - { field: count, op: lt, value: 100 }
"#,
        )
        .unwrap();
        assert!(p.apply(&record()));

        let p = parse("or: [{ field: host, op: eq, value: x }, { field: cpu, op: lt, value: 0.1 }, { field: count, op: eq, value: 10 }]").unwrap();
        assert!(p.apply(&record()));
    }

    #[test]
    fn test_from_config_empty_composites() {
        assert!(parse("and: []").unwrap().apply(&record()));
        assert!(!parse("or: []").unwrap().apply(&record()));
    }

    #[test]
    fn test_from_config_errors() {
        assert!(parse("42").is_err());
        assert!(parse("{ op: eq, value: 1 }").is_err());
        assert!(parse("{ field: a, op: like, value: 1 }").is_err());
        assert!(parse("{ field: a, op: in, value: 1 }").is_err());
        assert!(parse("{ field: a, op: eq, value: [1] }").is_err());
        assert!(parse("and: 3").is_err());
    }
}
