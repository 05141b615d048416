//! Shared recursive-visit primitive.
//!
//! Both the cascade plan builder and the eager relationship loader need the
//! same bookkeeping: a visited set keyed by entity key, a depth counter, and
//! a recursion cap. Keeping it in one place keeps their cycle handling from
//! diverging.

use std::collections::HashSet;

use crate::entity::Entity;
use crate::error::Error;

/// Recursion cap for any single traversal.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// Visited-set and depth bookkeeping for one traversal.
///
/// A walker lives for exactly one traversal; it is never shared across
/// independent calls.
pub struct GraphWalker {
    visited: HashSet<String>,
    max_depth: usize,
}

impl GraphWalker {
    /// Create a walker with the default depth cap.
    pub fn new() -> Self {
        Self::with_max_depth(MAX_TRAVERSAL_DEPTH)
    }

    /// Create a walker with a custom depth cap.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            visited: HashSet::new(),
            max_depth,
        }
    }

    /// Mark `key` visited at `depth`.
    ///
    /// Returns `Ok(false)` if the key was already visited (the node must be
    /// skipped; this is how cycles terminate), `Ok(true)` if it is new, and
    /// an error if the depth cap is exceeded.
    pub fn try_visit(&mut self, key: &str, depth: usize) -> Result<bool, Error> {
        if depth > self.max_depth {
            return Err(Error::MaxDepthExceeded { depth });
        }
        Ok(self.visited.insert(key.to_string()))
    }

    /// Check whether a key has been visited.
    pub fn has_visited(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    /// Number of distinct entities visited so far.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Depth-first traversal from `root` over already-loaded relations.
    ///
    /// `select` picks the child entities to recurse into; `visit` is called
    /// once per distinct entity, after its children have been walked. An
    /// entity reachable by several paths is visited exactly once, via
    /// whichever path reaches it first.
    pub fn walk<'a, S, V>(&mut self, root: &'a Entity, select: &S, visit: &mut V) -> Result<(), Error>
    where
        S: Fn(&'a Entity) -> Result<Vec<&'a Entity>, Error>,
        V: FnMut(&'a Entity, usize) -> Result<(), Error>,
    {
        self.walk_inner(root, 0, select, visit)
    }

    fn walk_inner<'a, S, V>(
        &mut self,
        entity: &'a Entity,
        depth: usize,
        select: &S,
        visit: &mut V,
    ) -> Result<(), Error>
    where
        S: Fn(&'a Entity) -> Result<Vec<&'a Entity>, Error>,
        V: FnMut(&'a Entity, usize) -> Result<(), Error>,
    {
        if !self.try_visit(&entity.key(), depth)? {
            return Ok(());
        }

        for child in select(entity)? {
            self.walk_inner(child, depth + 1, select, visit)?;
        }

        visit(entity, depth)
    }
}

impl Default for GraphWalker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(entity: &Entity) -> Result<Vec<&Entity>, Error> {
        Ok(entity.related_entities().collect())
    }

    #[test]
    fn test_walk_visits_each_entity_once() {
        let shared = Entity::new("Tag", "t1");
        let left = Entity::new("Post", "p1").with_one("tag", shared.clone());
        let right = Entity::new("Post", "p2").with_one("tag", shared);
        let root = Entity::new("User", "u1").with_many("posts", vec![left, right]);

        let mut walker = GraphWalker::new();
        let mut seen = Vec::new();
        walker
            .walk(&root, &children, &mut |e, depth| {
                seen.push((e.key(), depth));
                Ok(())
            })
            .unwrap();

        // The shared tag appears once even though it is reachable twice.
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.iter().filter(|(k, _)| k == "Tag:t1").count(), 1);
        // Post-order: children before the root in the visit sequence.
        assert_eq!(seen.last().unwrap(), &("User:u1".to_string(), 0));
    }

    #[test]
    fn test_walk_terminates_on_cycle() {
        // B carries a stub of A with the same key, closing the loop.
        let a_stub = Entity::new("A", "a1");
        let b = Entity::new("B", "b1").with_one("back", a_stub);
        let a = Entity::new("A", "a1").with_one("next", b);

        let mut walker = GraphWalker::new();
        let mut seen = Vec::new();
        walker
            .walk(&a, &children, &mut |e, _| {
                seen.push(e.key());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec!["B:b1".to_string(), "A:a1".to_string()]);
    }

    #[test]
    fn test_walk_depth_cap() {
        let leaf = Entity::new("N", "n2");
        let root = Entity::new("N", "n1").with_one("next", leaf);

        let mut walker = GraphWalker::with_max_depth(0);
        let err = walker
            .walk(&root, &children, &mut |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::MaxDepthExceeded { depth: 1 }));
    }

    #[test]
    fn test_try_visit_tracking() {
        let mut walker = GraphWalker::new();
        assert!(walker.try_visit("Order:o1", 0).unwrap());
        assert!(!walker.try_visit("Order:o1", 1).unwrap());
        assert!(walker.has_visited("Order:o1"));
        assert_eq!(walker.visited_count(), 1);
    }
}
