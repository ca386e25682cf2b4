/*!
 * Port groups.
 *
 * Groups arrange ports into a hierarchy for presentation. Group
 * information is fetched over the wire at most once per session and
 * cached; parent chains must be acyclic.
 */
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use portlink_core::codec;
use portlink_core::error::{Error, Result};

/// A group of ports
#[derive(Debug)]
pub struct PortGroup {
    id: String,
    label: String,
    parent_id: Option<String>,
    flags: u32,
    extended_properties: HashMap<String, String>,
    parent: Option<Arc<PortGroup>>,
}

impl PortGroup {
    /// Create a new group. An empty parent id means the group is a
    /// root.
    pub fn new<I, L, P>(id: I, label: L, parent_id: P, flags: u32) -> Self
    where
        I: Into<String>,
        L: Into<String>,
        P: Into<String>,
    {
        let parent_id = parent_id.into();
        Self {
            id: id.into(),
            label: label.into(),
            parent_id: (!parent_id.is_empty()).then_some(parent_id),
            flags,
            extended_properties: HashMap::new(),
            parent: None,
        }
    }

    /// The unique id of this group
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display label of this group
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The id of the parent group, if any
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// The flags of this group
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// The resolved parent group, if assigned
    pub fn parent_group(&self) -> Option<&Arc<PortGroup>> {
        self.parent.as_ref()
    }

    /// Attach extended group info
    pub fn set_extended_info(&mut self, info: &str) {
        self.extended_properties = codec::parse_properties(info);
    }

    /// Look up an extended property, falling back to the default
    pub fn extended_property<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.extended_properties
            .get(key)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// Assign the resolved parent group.
    ///
    /// Fails with an invalid-argument error if the assignment would
    /// create a cycle; in that case no mutation takes place.
    pub fn set_parent_group(&mut self, parent: &Arc<PortGroup>) -> Result<()> {
        if parent.id == self.id {
            return Err(Error::invalid_argument(format!(
                "invalid group hierarchy: cycle for {}",
                self.id
            )));
        }
        let mut ancestor = parent.parent.as_ref();
        while let Some(group) = ancestor {
            if group.id == self.id {
                return Err(Error::invalid_argument(format!(
                    "invalid group hierarchy: cycle for {}",
                    self.id
                )));
            }
            ancestor = group.parent.as_ref();
        }
        self.parent = Some(Arc::clone(parent));
        Ok(())
    }
}

/// A session-scoped cache of fully resolved groups, keyed by id.
///
/// Safe for concurrent lookup and insert; groups are immutable once
/// cached.
#[derive(Debug, Default)]
pub struct GroupCache {
    groups: Mutex<HashMap<String, Arc<PortGroup>>>,
}

impl GroupCache {
    /// Create a new, empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<PortGroup>>> {
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a cached group
    pub fn get(&self, id: &str) -> Option<Arc<PortGroup>> {
        self.lock().get(id).cloned()
    }

    /// Insert a resolved group
    pub fn insert(&self, group: Arc<PortGroup>) {
        self.lock().insert(group.id().to_string(), group);
    }

    /// The number of cached groups
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all cached groups (on disconnect/reconnect)
    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_parent_id_is_root() {
        let group = PortGroup::new("g1", "Group 1", "", 0);
        assert_eq!(group.parent_id(), None);

        let group = PortGroup::new("g2", "Group 2", "g1", 0);
        assert_eq!(group.parent_id(), Some("g1"));
    }

    #[test]
    fn test_parent_chain_resolution() {
        let root = Arc::new(PortGroup::new("root", "Root", "", 0));
        let mut child = PortGroup::new("child", "Child", "root", 0);
        child.set_parent_group(&root).unwrap();
        assert_eq!(child.parent_group().unwrap().id(), "root");
    }

    #[test]
    fn test_self_parent_rejected() {
        let mut group = PortGroup::new("g", "G", "g", 0);
        let same = Arc::new(PortGroup::new("g", "G", "g", 0));
        let err = group.set_parent_group(&same).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(group.parent_group().is_none());
    }

    #[test]
    fn test_cycle_rejected_without_partial_mutation() {
        // construct A with parent B, and B with parent A
        let mut a = PortGroup::new("A", "A", "B", 0);
        let mut b = PortGroup::new("B", "B", "A", 0);

        // resolve B's parent to A first
        let a_arc = Arc::new(PortGroup::new("A", "A", "B", 0));
        b.set_parent_group(&a_arc).unwrap();

        // assigning B as A's parent must now fail
        let b_arc = Arc::new(b);
        let err = a.set_parent_group(&b_arc).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        // no partial mutation of either group's parent reference
        assert!(a.parent_group().is_none());
        assert_eq!(b_arc.parent_group().unwrap().id(), "A");
    }

    #[test]
    fn test_group_cache_fetch_once_semantics() {
        let cache = GroupCache::new();
        assert!(cache.get("g1").is_none());
        cache.insert(Arc::new(PortGroup::new("g1", "Group 1", "", 0)));
        assert_eq!(cache.get("g1").unwrap().label(), "Group 1");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_extended_info() {
        let mut group = PortGroup::new("g1", "Group 1", "", 0);
        group.set_extended_info("icon=folder;layout=grid");
        assert_eq!(group.extended_property("icon", ""), "folder");
        assert_eq!(group.extended_property("missing", "x"), "x");
    }
}
