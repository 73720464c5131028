//! Comparison of two content trees over their flattened projections.

use std::collections::BTreeMap;

use dop_types::DigitalObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flatten::flatten;

/// Top-level field excluded from every comparison.
pub const EXCLUDED_FIELD: &str = "id";

/// Old and new value of a path present on both sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDifference {
    pub left: Value,
    pub right: Value,
}

/// The result of comparing two content trees.
///
/// Paths present and equal on both sides are never retained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDiff {
    /// Paths only in the left tree (removed, when left is the older side).
    pub only_on_left: BTreeMap<String, Value>,
    /// Paths only in the right tree (added, when right is the newer side).
    pub only_on_right: BTreeMap<String, Value>,
    /// Paths on both sides with different scalar values.
    pub differing: BTreeMap<String, ValueDifference>,
}

impl ContentDiff {
    /// Returns `true` if the trees were equal.
    pub fn is_empty(&self) -> bool {
        self.only_on_left.is_empty() && self.only_on_right.is_empty() && self.differing.is_empty()
    }

    /// Total number of differing paths.
    pub fn len(&self) -> usize {
        self.only_on_left.len() + self.only_on_right.len() + self.differing.len()
    }

    /// Number of paths added on the right.
    pub fn additions(&self) -> usize {
        self.only_on_right.len()
    }

    /// Number of paths removed from the left.
    pub fn removals(&self) -> usize {
        self.only_on_left.len()
    }

    /// Number of paths whose value changed.
    pub fn modifications(&self) -> usize {
        self.differing.len()
    }

    /// The diff as seen with the arguments swapped.
    pub fn swap(self) -> Self {
        Self {
            only_on_left: self.only_on_right,
            only_on_right: self.only_on_left,
            differing: self
                .differing
                .into_iter()
                .map(|(path, d)| {
                    (
                        path,
                        ValueDifference {
                            left: d.right,
                            right: d.left,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Compare two content trees.
///
/// The top-level `id` field is excluded from both sides; the inputs are not
/// modified.
pub fn compare(left: &Value, right: &Value) -> ContentDiff {
    let mut left_flat = flatten(left);
    let mut right_flat = flatten(right);
    strip_excluded(left, &mut left_flat);
    strip_excluded(right, &mut right_flat);

    let mut diff = ContentDiff::default();

    for (path, left_value) in &left_flat {
        match right_flat.get(path) {
            Some(right_value) if right_value == left_value => {}
            Some(right_value) => {
                diff.differing.insert(
                    path.clone(),
                    ValueDifference {
                        left: left_value.clone(),
                        right: right_value.clone(),
                    },
                );
            }
            None => {
                diff.only_on_left.insert(path.clone(), left_value.clone());
            }
        }
    }

    for (path, right_value) in right_flat {
        if !left_flat.contains_key(&path) {
            diff.only_on_right.insert(path, right_value);
        }
    }

    diff
}

/// Compare the content of two digital objects.
pub fn compare_objects(left: &DigitalObject, right: &DigitalObject) -> ContentDiff {
    compare(
        &Value::Object(left.content.clone()),
        &Value::Object(right.content.clone()),
    )
}

fn strip_excluded(tree: &Value, flat: &mut BTreeMap<String, Value>) {
    let Value::Object(map) = tree else {
        return;
    };
    if !map.contains_key(EXCLUDED_FIELD) {
        return;
    }
    let nested = format!("{EXCLUDED_FIELD}/");
    flat.retain(|path, _| path != EXCLUDED_FIELD && !path.starts_with(&nested));
}
