//! Purpose: Merge per-field matches into the single response object.
//! Exports: `assemble`.
//! Invariants: Fields with no match contribute nothing; absence is omission,
//! never `null` or an empty object.
//! Invariants: Matches land at the structural path they were found at; shared
//! prefixes share containers, array indices are preserved, unwritten array
//! slots are `null`, and identical full paths resolve last-writer-wins.
//! Invariants: The response ceiling is checked exactly once, after the merge.

use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::query::{FieldOutcome, FieldResult, PathSeg};

pub fn assemble(results: Vec<FieldResult>, max_response_bytes: usize) -> Result<Value, Error> {
    let mut root = Value::Object(Map::new());
    for result in results {
        if let FieldOutcome::Matched(matches) = result.outcome {
            for located in matches {
                insert_at(&mut root, &located.path, located.value);
            }
        }
    }

    let serialized = serde_json::to_vec(&root).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize the assembled response")
            .with_source(err)
    })?;
    if serialized.len() > max_response_bytes {
        return Err(Error::new(ErrorKind::ResponseTooLarge).with_message(format!(
            "assembled response is {} bytes, which exceeds the {} byte response limit",
            serialized.len(),
            max_response_bytes
        )));
    }

    Ok(root)
}

fn insert_at(root: &mut Value, path: &[PathSeg], leaf: Value) {
    let Some((first, rest)) = path.split_first() else {
        // A root-located match: merge object entries, otherwise replace.
        match (root, leaf) {
            (Value::Object(map), Value::Object(entries)) => {
                for (key, value) in entries {
                    map.insert(key, value);
                }
            }
            (slot, leaf) => *slot = leaf,
        }
        return;
    };

    let slot = slot_for(root, first);
    if rest.is_empty() {
        *slot = leaf;
    } else {
        insert_at(slot, rest, leaf);
    }
}

/// Borrow the child slot for one segment, coercing the container to the shape
/// the segment requires and padding arrays up to the index.
fn slot_for<'a>(container: &'a mut Value, seg: &PathSeg) -> &'a mut Value {
    match seg {
        PathSeg::Key(key) => {
            if !matches!(container, Value::Object(_)) {
                *container = Value::Object(Map::new());
            }
            match container {
                Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                _ => unreachable!("container was just coerced to an object"),
            }
        }
        PathSeg::Index(index) => {
            if !matches!(container, Value::Array(_)) {
                *container = Value::Array(Vec::new());
            }
            match container {
                Value::Array(items) => {
                    if items.len() <= *index {
                        items.resize(index + 1, Value::Null);
                    }
                    &mut items[*index]
                }
                _ => unreachable!("container was just coerced to an array"),
            }
        }
    }
}
