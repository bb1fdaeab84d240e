//! Map-reduce for the in-memory database, scripted in Rhai.
//!
//! The map script runs once per input document with the document bound to
//! `doc` and calls `emit(key, value)` any number of times. Emitted values are
//! grouped by key; a key with several values runs the reduce script with
//! `key` and `values` bound, and the script's result becomes the value. Keys
//! with a single value skip reduce. Output is one `{ "_id": key, "value": v }`
//! document per key, ordered by key: null, then numbers (numerically), then
//! strings, objects, arrays and booleans.
//!
//! Scripts compile fresh per job (Rhai's AST is not shared across jobs) and
//! run on the blocking pool with operation limits.

use parking_lot::Mutex;
use rhai::{Array, Dynamic, Engine, Scope};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::Document;
use super::filter;
use super::error::{StoreError, StoreResult};

/// Map and reduce source text, passed through unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReduce {
    pub map: String,
    pub reduce: String,
}

impl MapReduce {
    pub fn new(map: impl Into<String>, reduce: impl Into<String>) -> Self {
        Self {
            map: map.into(),
            reduce: reduce.into(),
        }
    }
}

type Emitted = Arc<Mutex<Vec<(Dynamic, Dynamic)>>>;

fn create_engine(emitted: Emitted) -> Engine {
    let mut engine = Engine::new();

    // Configure safety limits
    engine.set_max_expr_depths(64, 64);
    engine.set_max_operations(1_000_000);
    engine.set_max_string_size(1_000_000);
    engine.set_max_array_size(100_000);
    engine.set_max_map_size(10_000);

    engine.register_fn("emit", move |key: Dynamic, value: Dynamic| {
        emitted.lock().push((key, value));
    });

    engine
}

/// Run `job` over `docs` (already filtered) on the blocking pool.
pub async fn run(docs: Vec<Document>, job: MapReduce) -> StoreResult<Vec<Document>> {
    tokio::task::spawn_blocking(move || run_blocking(&docs, &job))
        .await
        .map_err(|e| StoreError::other(format!("map-reduce task failed: {e}")))?
}

/// Synchronous body of [`run`].
pub fn run_blocking(docs: &[Document], job: &MapReduce) -> StoreResult<Vec<Document>> {
    let emitted: Emitted = Arc::new(Mutex::new(Vec::new()));
    let engine = create_engine(Arc::clone(&emitted));

    let map_ast = engine.compile(&job.map).map_err(StoreError::script)?;
    let reduce_ast = engine.compile(&job.reduce).map_err(StoreError::script)?;

    for doc in docs {
        let this = rhai::serde::to_dynamic(doc).map_err(StoreError::script)?;
        let mut scope = Scope::new();
        scope.push("doc", this);
        engine
            .run_ast_with_scope(&mut scope, &map_ast)
            .map_err(StoreError::script)?;
    }

    let pairs = std::mem::take(&mut *emitted.lock());
    debug!("map-reduce: {} documents emitted {} pairs", docs.len(), pairs.len());

    let mut groups: BTreeMap<String, (Value, Array)> = BTreeMap::new();
    for (key, value) in pairs {
        let key_json: Value = rhai::serde::from_dynamic(&key).map_err(StoreError::script)?;
        let group_key = serde_json::to_string(&key_json)
            .map_err(|e| StoreError::script(format!("unserializable key: {e}")))?;
        groups
            .entry(group_key)
            .or_insert_with(|| (key_json, Array::new()))
            .1
            .push(value);
    }

    let mut groups: Vec<(String, (Value, Array))> = groups.into_iter().collect();
    groups.sort_by(|(a_text, (a, _)), (b_text, (b, _))| {
        key_order(a, b).then_with(|| a_text.cmp(b_text))
    });

    let mut out = Vec::with_capacity(groups.len());
    for (_, (key, mut values)) in groups {
        let reduced = if values.len() == 1 {
            values.remove(0)
        } else {
            let mut scope = Scope::new();
            scope.push("key", rhai::serde::to_dynamic(&key).map_err(StoreError::script)?);
            scope.push("values", values);
            engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, &reduce_ast)
                .map_err(StoreError::script)?
        };
        let value: Value = rhai::serde::from_dynamic(&reduced).map_err(StoreError::script)?;

        let mut doc = Document::new();
        doc.insert("_id".to_string(), key);
        doc.insert("value".to_string(), value);
        out.push(doc);
    }
    Ok(out)
}

/// Order of output keys: by type first, then by value within a type.
fn key_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Object(_) => 3,
            Value::Array(_) => 4,
            Value::Bool(_) => 5,
        }
    }
    rank(a)
        .cmp(&rank(b))
        .then_with(|| filter::compare(a, b).unwrap_or(Ordering::Equal))
}
