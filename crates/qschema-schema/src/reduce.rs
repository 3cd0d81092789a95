//! # Error Reduction
//!
//! The raw error tree mixes wrappers ("this sub-schema failed") with the
//! leaves that say why. Reduction narrows it to the entries worth reporting.
//!
//! [`reduce`] follows the first entry only: while the first entry of the
//! current sequence has children, descend into them; the first childless
//! level is returned whole. Siblings of every entry it descends through are
//! discarded. [`reduce_all_branches`] instead collects the leaves of every
//! branch, in order.

use crate::evaluate::ValidationError;

/// First-branch descent.
///
/// - Empty input is returned unchanged.
/// - If the first entry has children, the result is `reduce(children)`.
/// - Otherwise the whole input sequence is returned unchanged.
pub fn reduce(mut errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut depth = 0usize;
    while errors.first().is_some_and(|first| !first.is_leaf()) {
        errors.truncate(1);
        errors = errors
            .pop()
            .map(|first| first.children)
            .unwrap_or_default();
        depth += 1;
    }
    tracing::debug!(depth, remaining = errors.len(), "reduced error tree");
    errors
}

/// Every leaf of every branch, in depth-first order.
pub fn reduce_all_branches(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut leaves = Vec::new();
    let mut stack: Vec<ValidationError> = errors.into_iter().rev().collect();
    while let Some(mut error) = stack.pop() {
        if error.children.is_empty() {
            leaves.push(error);
        } else {
            stack.extend(std::mem::take(&mut error.children).into_iter().rev());
        }
    }
    tracing::debug!(remaining = leaves.len(), "reduced error tree across all branches");
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;
    use qschema_core::InstancePath;

    fn entry(keyword: &str, children: Vec<ValidationError>) -> ValidationError {
        ValidationError {
            keyword: keyword.to_string(),
            instance_path: InstancePath::root(),
            schema_location: "#".to_string(),
            message: format!("{keyword} failed"),
            children,
        }
    }

    fn keywords(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.keyword.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(reduce(Vec::new()).is_empty());
        assert!(reduce_all_branches(Vec::new()).is_empty());
    }

    #[test]
    fn test_first_entry_children_returned() {
        let tree = vec![
            entry("schema", vec![entry("a", vec![]), entry("b", vec![])]),
            entry("sibling", vec![entry("c", vec![])]),
        ];
        let reduced = reduce(tree);
        assert_eq!(keywords(&reduced), vec!["a", "b"]);
    }

    #[test]
    fn test_flat_input_unchanged() {
        let flat = vec![entry("a", vec![]), entry("b", vec![]), entry("c", vec![])];
        let once = reduce(flat.clone());
        assert_eq!(once, flat);
        assert_eq!(reduce(once.clone()), once);
    }

    #[test]
    fn test_descends_first_branch_only() {
        let tree = vec![entry(
            "schema",
            vec![
                entry("properties", vec![entry("required", vec![])]),
                entry("properties", vec![entry("maximumQuantity", vec![])]),
            ],
        )];
        assert_eq!(keywords(&reduce(tree)), vec!["required"]);
    }

    #[test]
    fn test_first_leaf_keeps_mixed_siblings() {
        // The first entry is a leaf, so its level is kept as is.
        let tree = vec![entry(
            "schema",
            vec![
                entry("type", vec![]),
                entry("properties", vec![entry("pattern", vec![])]),
            ],
        )];
        assert_eq!(keywords(&reduce(tree)), vec!["type", "properties"]);
    }

    #[test]
    fn test_all_branches_fan_out() {
        let tree = vec![entry(
            "schema",
            vec![
                entry("properties", vec![entry("required", vec![])]),
                entry("type", vec![]),
                entry(
                    "anyOf",
                    vec![
                        entry("anyOf", vec![entry("minimumQuantity", vec![])]),
                        entry("anyOf", vec![entry("pattern", vec![])]),
                    ],
                ),
            ],
        )];
        assert_eq!(
            keywords(&reduce_all_branches(tree)),
            vec!["required", "type", "minimumQuantity", "pattern"]
        );
    }

    #[test]
    fn test_all_branches_idempotent() {
        let flat = vec![entry("a", vec![]), entry("b", vec![])];
        assert_eq!(reduce_all_branches(flat.clone()), flat);
    }
}
