//! Filter evaluation for the in-memory database.
//!
//! A filter is a JSON object. Plain keys compare a (possibly dotted) field
//! path against a value or an operator object; `$and`, `$or` and `$nor`
//! combine sub-filters. An empty filter matches everything.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::Document;
use super::error::{StoreError, StoreResult};

/// Returns true if `doc` satisfies `filter`.
pub fn matches(filter: &Document, doc: &Document) -> StoreResult<bool> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for f in sub_filters(key, cond)? {
                    all &= matches(f, doc)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for f in sub_filters(key, cond)? {
                    any |= matches(f, doc)?;
                }
                any
            }
            "$nor" => {
                let mut any = false;
                for f in sub_filters(key, cond)? {
                    any |= matches(f, doc)?;
                }
                !any
            }
            op if op.starts_with('$') => {
                return Err(StoreError::bad_filter(format!("unknown top-level operator {op}")));
            }
            path => field_matches(lookup(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(op: &str, cond: &'a Value) -> StoreResult<Vec<&'a Document>> {
    let Value::Array(items) = cond else {
        return Err(StoreError::bad_filter(format!("{op} needs an array")));
    };
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| StoreError::bad_filter(format!("{op} entries must be objects")))
        })
        .collect()
}

/// Follow a dotted path through nested objects.
fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i))?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn field_matches(field: Option<&Value>, cond: &Value) -> StoreResult<bool> {
    match cond {
        Value::Object(ops) if is_operator_object(ops) => {
            for (op, arg) in ops {
                if !apply_operator(field, op, arg)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(equals_or_contains(field, cond)),
    }
}

fn apply_operator(field: Option<&Value>, op: &str, arg: &Value) -> StoreResult<bool> {
    let result = match op {
        "$eq" => equals_or_contains(field, arg),
        "$ne" => !equals_or_contains(field, arg),
        "$gt" => compare_any(field, arg, |o| o == Ordering::Greater),
        "$gte" => compare_any(field, arg, |o| o != Ordering::Less),
        "$lt" => compare_any(field, arg, |o| o == Ordering::Less),
        "$lte" => compare_any(field, arg, |o| o != Ordering::Greater),
        "$in" => in_list(field, op, arg)?,
        "$nin" => !in_list(field, op, arg)?,
        "$exists" => {
            let want = match arg {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                _ => return Err(StoreError::bad_filter("$exists needs a boolean")),
            };
            field.is_some() == want
        }
        other => return Err(StoreError::bad_filter(format!("unknown operator {other}"))),
    };
    Ok(result)
}

fn in_list(field: Option<&Value>, op: &str, arg: &Value) -> StoreResult<bool> {
    let Value::Array(candidates) = arg else {
        return Err(StoreError::bad_filter(format!("{op} needs an array")));
    };
    Ok(candidates.iter().any(|c| equals_or_contains(field, c)))
}

/// Equality, where an array field also matches if any element is equal.
/// A missing field equals `null`.
fn equals_or_contains(field: Option<&Value>, want: &Value) -> bool {
    match field {
        None => want.is_null(),
        Some(value) if values_equal(value, want) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, want)),
        Some(_) => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_any(field: Option<&Value>, arg: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    match field {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare(item, arg).is_some_and(&pred)),
        Some(value) => compare(value, arg).is_some_and(pred),
    }
}

/// Ordering between values of the same type; `None` across types.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
