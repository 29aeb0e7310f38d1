//! Purpose: Evaluate one field expression at a time against the decoded tree.
//! Exports: `FieldResult`, `FieldOutcome`, `LocatedValue`, `PathSeg`,
//! `evaluate`, `evaluate_fields`.
//! Role: Seam over the JSONPath engine; per-field failures never abort the
//! batch, they become the field's own outcome.
//! Invariants: An expression that fails to parse is `Invalid`, logged at
//! warn, and downstream indistinguishable from a no-match in the response.
//! Invariants: Every located match carries typed path segments, recovered by
//! walking the tree itself, so numeric object keys never read as indices.

use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::warn;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

/// One match: the structural path it was found at, plus the matched subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct LocatedValue {
    pub path: Vec<PathSeg>,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldOutcome {
    Matched(Vec<LocatedValue>),
    NoMatch,
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldResult {
    pub field: String,
    pub outcome: FieldOutcome,
}

pub fn evaluate_fields(tree: &Value, fields: &[String]) -> Vec<FieldResult> {
    fields.iter().map(|field| evaluate(tree, field)).collect()
}

pub fn evaluate(tree: &Value, field: &str) -> FieldResult {
    let path = match JsonPath::parse(field) {
        Ok(path) => path,
        Err(err) => {
            warn!(field, error = %err, "field expression failed to parse, treating as no match");
            return FieldResult {
                field: field.to_string(),
                outcome: FieldOutcome::Invalid(err.to_string()),
            };
        }
    };

    let mut matches = Vec::new();
    for node in path.query_located(tree) {
        let pointer = node.location().to_json_pointer();
        match segments_at(tree, &pointer) {
            Some(path) => matches.push(LocatedValue {
                path,
                value: node.node().clone(),
            }),
            None => {
                warn!(field, pointer = %pointer, "located match did not resolve in the source tree");
            }
        }
    }

    let outcome = if matches.is_empty() {
        FieldOutcome::NoMatch
    } else {
        FieldOutcome::Matched(matches)
    };
    FieldResult {
        field: field.to_string(),
        outcome,
    }
}

/// Re-walk the tree with the location's JSON Pointer to type each step as an
/// object key or array index.
fn segments_at(tree: &Value, pointer: &str) -> Option<Vec<PathSeg>> {
    if pointer.is_empty() {
        return Some(Vec::new());
    }
    let mut segments = Vec::new();
    let mut current = tree;
    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        match current {
            Value::Object(map) => {
                current = map.get(&token)?;
                segments.push(PathSeg::Key(token));
            }
            Value::Array(items) => {
                let index: usize = token.parse().ok()?;
                current = items.get(index)?;
                segments.push(PathSeg::Index(index));
            }
            _ => return None,
        }
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_match_carries_its_path() {
        let tree = json!({"a": {"b": 5}});
        let result = evaluate(&tree, "$.a.b");
        assert_eq!(
            result.outcome,
            FieldOutcome::Matched(vec![LocatedValue {
                path: vec![PathSeg::Key("a".into()), PathSeg::Key("b".into())],
                value: json!(5),
            }])
        );
    }

    #[test]
    fn wildcard_match_keeps_array_indices() {
        let tree = json!({"xs": [{"t": 1}, {"t": 2}]});
        let FieldOutcome::Matched(matches) = evaluate(&tree, "$.xs[*].t").outcome else {
            panic!("expected matches");
        };
        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches[1].path,
            vec![
                PathSeg::Key("xs".into()),
                PathSeg::Index(1),
                PathSeg::Key("t".into())
            ]
        );
        assert_eq!(matches[1].value, json!(2));
    }

    #[test]
    fn slice_selector_is_supported() {
        let tree = json!({"xs": [10, 11, 12, 13]});
        let FieldOutcome::Matched(matches) = evaluate(&tree, "$.xs[1:3]").outcome else {
            panic!("expected matches");
        };
        let values: Vec<&Value> = matches.iter().map(|m| &m.value).collect();
        assert_eq!(values, vec![&json!(11), &json!(12)]);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let tree = json!({"a": 1});
        assert_eq!(evaluate(&tree, "$.missing.path").outcome, FieldOutcome::NoMatch);
    }

    #[test]
    fn malformed_expression_is_invalid_not_fatal() {
        let tree = json!({"a": 1});
        assert!(matches!(
            evaluate(&tree, "$[").outcome,
            FieldOutcome::Invalid(_)
        ));
    }

    #[test]
    fn root_match_has_an_empty_path() {
        let tree = json!({"a": 1});
        let FieldOutcome::Matched(matches) = evaluate(&tree, "$").outcome else {
            panic!("expected matches");
        };
        assert_eq!(matches[0].path, Vec::<PathSeg>::new());
        assert_eq!(matches[0].value, tree);
    }

    #[test]
    fn numeric_object_keys_stay_keys() {
        let tree = json!({"0": "zero"});
        let FieldOutcome::Matched(matches) = evaluate(&tree, "$['0']").outcome else {
            panic!("expected matches");
        };
        assert_eq!(matches[0].path, vec![PathSeg::Key("0".into())]);
    }

    #[test]
    fn one_bad_field_never_suppresses_the_others() {
        let tree = json!({"a": 1});
        let results = evaluate_fields(&tree, &["$[".to_string(), "$.a".to_string()]);
        assert!(matches!(results[0].outcome, FieldOutcome::Invalid(_)));
        assert!(matches!(results[1].outcome, FieldOutcome::Matched(_)));
    }
}
