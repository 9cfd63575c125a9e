//! Stable ordering for dynamically populated lists
//!
//! Items keep their relative order when keys compare equal, and the sort is
//! applied only when asked for, after a batch of insertions.

/// Sort items lexicographically by an opaque string key
pub fn reorder_by_key<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| key(a).cmp(key(b)));
}

/// Sort identifiers lexicographically
pub fn sort_by_id(ids: &mut [String]) {
    reorder_by_key(ids, |id| id.as_str());
}

/// Whether the items are already in key order
pub fn is_ordered<T, F>(items: &[T], key: F) -> bool
where
    F: Fn(&T) -> &str,
{
    items.windows(2).all(|pair| key(&pair[0]) <= key(&pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row {
        id: &'static str,
        label: &'static str,
    }

    #[test]
    fn sorts_by_id() {
        let mut ids = vec!["web".to_string(), "api".to_string(), "db".to_string()];
        sort_by_id(&mut ids);
        assert_eq!(ids, vec!["api", "db", "web"]);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut rows = vec![
            Row { id: "b", label: "first" },
            Row { id: "a", label: "only" },
            Row { id: "b", label: "second" },
        ];
        reorder_by_key(&mut rows, |r| r.id);

        let labels: Vec<_> = rows.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["only", "first", "second"]);
    }

    #[test]
    fn ordering_is_byte_lexicographic() {
        let mut ids = vec!["b".to_string(), "B".to_string(), "a10".to_string(), "a9".to_string()];
        sort_by_id(&mut ids);
        assert_eq!(ids, vec!["B", "a10", "a9", "b"]);
    }

    #[test]
    fn reapplying_is_idempotent() {
        let mut rows = vec![Row { id: "z", label: "" }, Row { id: "m", label: "" }];
        assert!(!is_ordered(&rows, |r| r.id));
        reorder_by_key(&mut rows, |r| r.id);
        assert!(is_ordered(&rows, |r| r.id));
        reorder_by_key(&mut rows, |r| r.id);
        assert_eq!(rows[0].id, "m");
    }
}
