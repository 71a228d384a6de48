//! Primary-identifier resolver: picks one canonical item id per order.

use std::collections::BTreeMap;

use tracing::debug;

use packslip_core::GroupKey;

/// Order id → canonical item id.
///
/// The first item id assigned to an order sticks; later assignments for the
/// same order are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalMap {
    primary: BTreeMap<String, String>,
}

impl CanonicalMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `item_id` to `order_id` unless the order already has one.
    /// Returns true if the assignment took effect.
    pub fn assign(&mut self, order_id: &str, item_id: &str) -> bool {
        if self.primary.contains_key(order_id) {
            return false;
        }
        self.primary
            .insert(order_id.to_string(), item_id.to_string());
        true
    }

    /// Canonical item id for an order.
    pub fn get(&self, order_id: &str) -> Option<&str> {
        self.primary.get(order_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// `(order_id, item_id)` pairs in order id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.primary
            .iter()
            .map(|(o, i)| (o.as_str(), i.as_str()))
    }
}

/// Resolve canonical item ids from artifact names (stems, `<order>_<item>`).
///
/// Names are sorted byte-wise before resolving, so the result depends only on
/// the set of names and never on the order a directory listing returned them.
/// Names without an underscore are ignored.
pub fn resolve<I, S>(artifact_names: I) -> CanonicalMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = artifact_names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .collect();
    names.sort();

    let mut map = CanonicalMap::new();
    for name in &names {
        let Some(key) = GroupKey::parse(name) else {
            debug!(name = %name, "Artifact name has no order/item separator");
            continue;
        };
        if map.assign(&key.order_id, &key.item_id) {
            debug!(order_id = %key.order_id, item_id = %key.item_id, "Assigned primary SKU");
        }
    }
    map
}

/// Resolve from parsed keys.
pub fn resolve_keys<'a, I>(keys: I) -> CanonicalMap
where
    I: IntoIterator<Item = &'a GroupKey>,
{
    resolve(keys.into_iter().map(|k| k.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_wins() {
        let map = resolve(["100_SKU-1", "100_SKU-2", "101_SKU-1"]);
        assert_eq!(map.get("100"), Some("SKU-1"));
        assert_eq!(map.get("101"), Some("SKU-1"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_listing_order_does_not_matter() {
        let a = resolve(["7_B", "7_A", "8_C"]);
        let b = resolve(["8_C", "7_A", "7_B"]);
        assert_eq!(a, b);
        assert_eq!(a.get("7"), Some("A"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let names = vec!["5_X".to_string(), "6_Y".to_string(), "5_Z".to_string()];
        assert_eq!(resolve(&names), resolve(&names));
    }

    #[test]
    fn test_splits_on_last_underscore() {
        let map = resolve(["555_UNKNOWN_3"]);
        assert_eq!(map.get("555_UNKNOWN"), Some("3"));
        assert_eq!(map.get("555"), None);
    }

    #[test]
    fn test_ignores_names_without_separator() {
        let map = resolve(["junk", "1_A"]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_assign_never_overwrites() {
        let mut map = CanonicalMap::new();
        assert!(map.assign("1", "A"));
        assert!(!map.assign("1", "B"));
        assert_eq!(map.get("1"), Some("A"));
    }

    #[test]
    fn test_resolve_keys() {
        let keys = vec![GroupKey::new("2", "Q"), GroupKey::new("1", "P")];
        let map = resolve_keys(&keys);
        let pairs: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(pairs, vec![("1", "P"), ("2", "Q")]);
    }

    #[test]
    fn test_empty() {
        let map = resolve(Vec::<String>::new());
        assert!(map.is_empty());
    }
}
