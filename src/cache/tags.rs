//! Invalidation tag graph.
//!
//! Queries declare which tags their cached result *provides*; mutations
//! declare which tags they *invalidate*. The graph keeps a bidirectional
//! mapping between tags and cache keys so a mutation's declared set can be
//! resolved to the exact entries that must be marked stale.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// The seven resource families of the booking API. Closed set - endpoint
/// declarations are checked against it at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Vehicles,
    VehicleSpecs,
    Bookings,
    Payments,
    Tickets,
    Locations,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Vehicles => "vehicles",
            Resource::VehicleSpecs => "vehicleSpecs",
            Resource::Bookings => "bookings",
            Resource::Payments => "payments",
            Resource::Tickets => "tickets",
            Resource::Locations => "locations",
        }
    }
}

/// An invalidation scope: a whole resource family (`id: None`, the wildcard)
/// or one instance of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub resource: Resource,
    pub id: Option<i64>,
}

impl Tag {
    /// Wildcard tag covering every instance of the resource.
    pub fn all(resource: Resource) -> Self {
        Self { resource, id: None }
    }

    pub fn item(resource: Resource, id: i64) -> Self {
        Self {
            resource,
            id: Some(id),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.id.is_none()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}:{}", self.resource.as_str(), id),
            None => write!(f, "{}:*", self.resource.as_str()),
        }
    }
}

/// Bidirectional tag <-> cache key mapping.
///
/// Wildcard policy: invalidating `(type, id)` hits providers of that exact
/// pair plus providers of the bare `type`; invalidating the bare `type` hits
/// every provider of that resource, whatever its id.
#[derive(Debug, Default)]
pub struct TagGraph {
    providers: HashMap<Tag, HashSet<String>>,
    by_key: HashMap<String, HashSet<Tag>>,
}

impl TagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key`'s cached result provides `tags`. Replaces the key's
    /// previous provide set - a refetch may legitimately change which rows
    /// (and therefore which instance tags) a list result covers.
    pub fn record_provides(&mut self, key: &str, tags: &[Tag]) {
        self.remove_key(key);
        if tags.is_empty() {
            return;
        }
        for tag in tags {
            self.providers
                .entry(*tag)
                .or_default()
                .insert(key.to_string());
        }
        self.by_key
            .insert(key.to_string(), tags.iter().copied().collect());
    }

    /// Drop every tag association for `key` (failed write or eviction).
    pub fn remove_key(&mut self, key: &str) {
        if let Some(tags) = self.by_key.remove(key) {
            for tag in tags {
                if let Some(keys) = self.providers.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.providers.remove(&tag);
                    }
                }
            }
        }
    }

    /// Resolve a mutation's declared tag set (unioned) to the affected cache
    /// keys under the wildcard policy.
    pub fn affected_by(&self, tags: &[Tag]) -> HashSet<String> {
        let mut affected = HashSet::new();
        for tag in tags {
            match tag.id {
                Some(_) => {
                    // Exact instance, plus lists that provided the wildcard
                    if let Some(keys) = self.providers.get(tag) {
                        affected.extend(keys.iter().cloned());
                    }
                    if let Some(keys) = self.providers.get(&Tag::all(tag.resource)) {
                        affected.extend(keys.iter().cloned());
                    }
                }
                None => {
                    // Bare type hits every provider of the resource
                    for (provided, keys) in &self.providers {
                        if provided.resource == tag.resource {
                            affected.extend(keys.iter().cloned());
                        }
                    }
                }
            }
        }
        affected
    }

    pub fn provided_tags(&self, key: &str) -> Option<&HashSet<Tag>> {
        self.by_key.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_bookings() -> TagGraph {
        let mut graph = TagGraph::new();
        // A list view provides the wildcard plus its rows
        graph.record_provides(
            "listBookings()",
            &[
                Tag::all(Resource::Bookings),
                Tag::item(Resource::Bookings, 1),
                Tag::item(Resource::Bookings, 2),
            ],
        );
        // A detail view provides only its instance
        graph.record_provides(
            "getBookingById({\"id\":2})",
            &[Tag::item(Resource::Bookings, 2)],
        );
        graph.record_provides("listVehicles()", &[Tag::all(Resource::Vehicles)]);
        graph
    }

    #[test]
    fn test_instance_tag_hits_exact_pair_and_wildcard_providers() {
        let graph = graph_with_bookings();
        let affected = graph.affected_by(&[Tag::item(Resource::Bookings, 2)]);
        assert!(affected.contains("listBookings()"));
        assert!(affected.contains("getBookingById({\"id\":2})"));
        assert!(!affected.contains("listVehicles()"));
    }

    #[test]
    fn test_instance_tag_misses_other_instances() {
        let graph = graph_with_bookings();
        let affected = graph.affected_by(&[Tag::item(Resource::Bookings, 1)]);
        // booking 2's detail view is untouched by a change to booking 1
        assert!(!affected.contains("getBookingById({\"id\":2})"));
        assert!(affected.contains("listBookings()"));
    }

    #[test]
    fn test_bare_type_hits_every_provider_of_the_resource() {
        let graph = graph_with_bookings();
        let affected = graph.affected_by(&[Tag::all(Resource::Bookings)]);
        assert_eq!(affected.len(), 2);
        assert!(affected.contains("listBookings()"));
        assert!(affected.contains("getBookingById({\"id\":2})"));
    }

    #[test]
    fn test_declared_set_is_unioned() {
        let graph = graph_with_bookings();
        let affected = graph.affected_by(&[
            Tag::all(Resource::Bookings),
            Tag::all(Resource::Vehicles),
        ]);
        assert_eq!(affected.len(), 3);
    }

    #[test]
    fn test_remove_key_clears_both_directions() {
        let mut graph = graph_with_bookings();
        graph.remove_key("listBookings()");
        let affected = graph.affected_by(&[Tag::all(Resource::Bookings)]);
        assert!(!affected.contains("listBookings()"));
        assert!(graph.provided_tags("listBookings()").is_none());
    }

    #[test]
    fn test_reprovide_replaces_previous_set() {
        let mut graph = graph_with_bookings();
        // Refetched list no longer contains booking 1
        graph.record_provides(
            "listBookings()",
            &[
                Tag::all(Resource::Bookings),
                Tag::item(Resource::Bookings, 2),
            ],
        );
        let provided = graph.provided_tags("listBookings()").unwrap();
        assert!(!provided.contains(&Tag::item(Resource::Bookings, 1)));
        assert_eq!(provided.len(), 2);
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag::all(Resource::Vehicles).to_string(), "vehicles:*");
        assert_eq!(Tag::item(Resource::Tickets, 4).to_string(), "tickets:4");
    }
}
