//! Relationship loading strategies.
//!
//! The [`RelationLoader`] populates relation slots on entities according to a
//! [`LoadConfig`]: eagerly to a depth bound, lazily (not at all), smartly
//! (cache first, then only to-one relations), or in grouped batches. A
//! [`CircularGuard`] scoped to one `load_relationships` call tree keeps
//! cyclic graphs from recursing forever and applies the configured
//! [`CircularPolicy`] to revisited entities.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use relgraph_core::{Catalog, Entity, LazyRef, RelationValue, Value};

use crate::cache::{cache_key, CacheConfig, CachedValue, RelationCache};
use crate::error::Error;
use crate::store::EntityStore;

/// How relation slots are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadStrategy {
    /// Recursively join every declared relation up to the depth bound.
    Eager,
    /// Leave relation slots untouched.
    #[default]
    Lazy,
    /// Consult the cache first; on miss, load only to-one relations.
    Smart,
    /// Fetch one relation for many same-type entities in grouped calls.
    Batch,
}

/// What to do with a relation that revisits an entity already being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircularPolicy {
    /// Keep the revisited entity as-is with no further expansion.
    #[default]
    Truncate,
    /// Replace the slot with an explicit lazy handle.
    Proxy,
    /// Drop the revisited entity from the slot.
    Exclude,
}

/// Loading configuration, attachable per entity type with per-relation
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Strategy to dispatch on.
    pub strategy: LoadStrategy,
    /// Identifiers per grouped fetch on the batch path.
    pub batch_size: usize,
    /// Depth bound for eager expansion.
    pub max_depth: usize,
    /// Policy for revisited entities.
    pub circular: CircularPolicy,
    /// If set, project loaded entities down to these fields.
    pub select_fields: Option<Vec<String>>,
    /// Cache tuning; `None` disables cache consultation even when the loader
    /// carries a cache handle.
    pub cache: Option<CacheConfig>,
    /// If set, keep only loaded entities whose fields equal these values.
    pub conditions: Option<BTreeMap<String, Value>>,
    /// Per-relation configuration overriding this one.
    pub relation_overrides: BTreeMap<String, LoadConfig>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self::new(LoadStrategy::default())
    }
}

impl LoadConfig {
    /// Create a configuration with the given strategy and defaults.
    pub fn new(strategy: LoadStrategy) -> Self {
        Self {
            strategy,
            batch_size: 50,
            max_depth: 3,
            circular: CircularPolicy::default(),
            select_fields: None,
            cache: None,
            conditions: None,
            relation_overrides: BTreeMap::new(),
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the eager depth bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the circular-reference policy.
    pub fn with_circular(mut self, policy: CircularPolicy) -> Self {
        self.circular = policy;
        self
    }

    /// Project loaded entities down to the given fields.
    pub fn with_select_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Enable cache consultation with the given tuning.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Keep only loaded entities matching the given field values.
    pub fn with_condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), value.into());
        self
    }

    /// Override the configuration for one relation.
    pub fn with_relation_override(mut self, relation: impl Into<String>, config: LoadConfig) -> Self {
        self.relation_overrides.insert(relation.into(), config);
        self
    }

    /// The configuration in effect for one relation: the override when one is
    /// declared, otherwise this configuration itself.
    pub fn for_relation(&self, relation: &str) -> &LoadConfig {
        self.relation_overrides.get(relation).unwrap_or(self)
    }

    fn ttl(&self) -> std::time::Duration {
        self.cache
            .as_ref()
            .map(CacheConfig::ttl)
            .unwrap_or_else(|| CacheConfig::default().ttl())
    }
}

/// Visited-set state for one `load_relationships` call tree. Never shared
/// across independent calls.
pub struct CircularGuard {
    max_depth: usize,
    policy: CircularPolicy,
    visited: HashSet<String>,
}

impl CircularGuard {
    fn new(config: &LoadConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            policy: config.circular,
            visited: HashSet::new(),
        }
    }

    /// Mark an entity key as being loaded. Returns `false` on a revisit.
    fn mark(&mut self, key: &str) -> bool {
        self.visited.insert(key.to_string())
    }
}

/// Populates relation slots from the store, consulting the cache when one is
/// attached and the configuration enables it.
pub struct RelationLoader {
    catalog: Arc<Catalog>,
    store: Arc<dyn EntityStore>,
    cache: Option<Arc<dyn RelationCache>>,
}

impl RelationLoader {
    /// Create a loader without a cache.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            catalog,
            store,
            cache: None,
        }
    }

    /// Attach a relation cache.
    pub fn with_cache(mut self, cache: Arc<dyn RelationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn cache_enabled(&self, config: &LoadConfig) -> Option<&Arc<dyn RelationCache>> {
        if config.cache.is_some() {
            self.cache.as_ref()
        } else {
            None
        }
    }

    /// Load relations on one entity according to the configured strategy.
    pub fn load_relationships(&self, entity: &Entity, config: &LoadConfig) -> Result<Entity, Error> {
        let mut guard = CircularGuard::new(config);
        guard.mark(&entity.key());

        match config.strategy {
            LoadStrategy::Lazy => Ok(entity.clone()),
            LoadStrategy::Eager => {
                let mut out = entity.clone();
                self.expand(&mut out, config, &mut guard, 0)?;
                Ok(out)
            }
            LoadStrategy::Smart => self.load_smart(entity, config),
            LoadStrategy::Batch => {
                let mut out = entity.clone();
                let def = self.catalog.entity(&entity.entity_type)?;
                for relation in &def.relations {
                    let loaded = self.load_batch(
                        std::slice::from_ref(&out),
                        &relation.name,
                        config.for_relation(&relation.name),
                    )?;
                    if let Some(entity) = loaded.into_iter().next() {
                        out = entity;
                    }
                }
                Ok(out)
            }
        }
    }

    /// Recursively join every declared relation, level by level, up to the
    /// depth bound.
    fn expand(
        &self,
        entity: &mut Entity,
        config: &LoadConfig,
        guard: &mut CircularGuard,
        depth: usize,
    ) -> Result<(), Error> {
        if depth >= guard.max_depth {
            return Ok(());
        }

        let def = self.catalog.entity(&entity.entity_type)?;
        let parent_type = entity.entity_type.clone();
        let parent_id = entity.id.clone();

        for relation in &def.relations {
            let rel_config = config.for_relation(&relation.name);
            let fetched = self
                .store
                .find_related(&parent_type, &parent_id, &relation.name)?;
            let slot = self.descend(
                &parent_type,
                &parent_id,
                &relation.name,
                fetched,
                rel_config,
                guard,
                depth + 1,
            )?;
            entity.set_relation(relation.name.clone(), self.shape(slot, rel_config));
        }
        Ok(())
    }

    /// Expand the children of one fetched slot, applying the circular policy
    /// to any child already on the visited set.
    #[allow(clippy::too_many_arguments)]
    fn descend(
        &self,
        parent_type: &str,
        parent_id: &str,
        relation: &str,
        fetched: RelationValue,
        config: &LoadConfig,
        guard: &mut CircularGuard,
        depth: usize,
    ) -> Result<RelationValue, Error> {
        match fetched {
            RelationValue::One(mut child) => {
                if !guard.mark(&child.key()) {
                    debug!(
                        parent = %relgraph_core::entity_key(parent_type, parent_id),
                        relation,
                        policy = ?guard.policy,
                        "circular reference detected"
                    );
                    return Ok(match guard.policy {
                        CircularPolicy::Truncate => RelationValue::One(child),
                        CircularPolicy::Proxy => {
                            RelationValue::Lazy(LazyRef::new(parent_type, parent_id, relation))
                        }
                        CircularPolicy::Exclude => RelationValue::Absent,
                    });
                }
                self.expand(&mut child, config, guard, depth)?;
                Ok(RelationValue::One(child))
            }
            RelationValue::Many(children) => {
                let mut out = Vec::with_capacity(children.len());
                for mut child in children {
                    if !guard.mark(&child.key()) {
                        match guard.policy {
                            CircularPolicy::Truncate => out.push(child),
                            // One revisit defers the whole slot.
                            CircularPolicy::Proxy => {
                                return Ok(RelationValue::Lazy(LazyRef::new(
                                    parent_type,
                                    parent_id,
                                    relation,
                                )));
                            }
                            CircularPolicy::Exclude => {}
                        }
                        continue;
                    }
                    self.expand(&mut child, config, guard, depth)?;
                    out.push(child);
                }
                Ok(RelationValue::Many(out))
            }
            other => Ok(other),
        }
    }

    /// Cache-first load of the to-one relations only.
    fn load_smart(&self, entity: &Entity, config: &LoadConfig) -> Result<Entity, Error> {
        let key = cache_key(&entity.entity_type, &entity.id, None);

        if let Some(cache) = self.cache_enabled(config) {
            if let Some(CachedValue::Entity(cached)) = cache.get(&key) {
                debug!(key, "smart load served from cache");
                return Ok(cached);
            }
        }

        let def = self.catalog.entity(&entity.entity_type)?;
        let mut out = entity.clone();
        for relation in def.relations.iter().filter(|r| r.kind.is_to_one()) {
            let rel_config = config.for_relation(&relation.name);
            let fetched = self
                .store
                .find_related(&out.entity_type, &out.id, &relation.name)?;
            out.set_relation(relation.name.clone(), self.shape(fetched, rel_config));
        }

        if let Some(cache) = self.cache_enabled(config) {
            cache.put(&key, CachedValue::Entity(out.clone()), config.ttl());
        }
        Ok(out)
    }

    /// Populate one relation on many same-type entities, issuing one grouped
    /// fetch per `batch_size` identifiers and merging in per-entity cache
    /// hits.
    pub fn load_batch(
        &self,
        entities: &[Entity],
        relation: &str,
        config: &LoadConfig,
    ) -> Result<Vec<Entity>, Error> {
        let Some(first) = entities.first() else {
            return Ok(Vec::new());
        };
        let entity_type = first.entity_type.as_str();
        if let Some(other) = entities.iter().find(|e| e.entity_type != entity_type) {
            return Err(Error::InvalidBatch(format!(
                "mixed entity types: {entity_type} and {}",
                other.entity_type
            )));
        }

        let def = self.catalog.entity(entity_type)?;
        let Some(rel) = def.relation(relation) else {
            return Err(Error::InvalidBatch(format!(
                "unknown relation {relation} on {entity_type}"
            )));
        };

        // Per-entity cache probe; only the misses hit the store.
        let mut resolved: HashMap<String, RelationValue> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        for entity in entities {
            let cached = self.cache_enabled(config).and_then(|cache| {
                match cache.get(&cache_key(entity_type, &entity.id, Some(relation))) {
                    Some(CachedValue::Relation(value)) => Some(value),
                    _ => None,
                }
            });
            match cached {
                Some(value) => {
                    resolved.insert(entity.id.clone(), value);
                }
                None => misses.push(entity.id.clone()),
            }
        }

        for chunk in misses.chunks(config.batch_size.max(1)) {
            let fetched = self.store.find_related_batch(entity_type, chunk, relation)?;
            for (id, value) in fetched {
                if let Some(cache) = self.cache_enabled(config) {
                    cache.put(
                        &cache_key(entity_type, &id, Some(relation)),
                        CachedValue::Relation(value.clone()),
                        config.ttl(),
                    );
                }
                resolved.insert(id, value);
            }
        }

        let default_value = || {
            if rel.kind.is_to_one() {
                RelationValue::Absent
            } else {
                RelationValue::Many(Vec::new())
            }
        };

        Ok(entities
            .iter()
            .map(|entity| {
                let value = resolved
                    .remove(&entity.id)
                    .unwrap_or_else(default_value);
                let mut out = entity.clone();
                out.set_relation(relation.to_string(), self.shape(value, config));
                out
            })
            .collect())
    }

    /// Resolve an explicit lazy handle with a single relation fetch.
    pub fn resolve(&self, lazy: &LazyRef) -> Result<RelationValue, Error> {
        Ok(self
            .store
            .find_related(&lazy.entity_type, &lazy.id, &lazy.relation)?)
    }

    /// Apply condition filtering and field projection to a loaded slot.
    fn shape(&self, value: RelationValue, config: &LoadConfig) -> RelationValue {
        if config.conditions.is_none() && config.select_fields.is_none() {
            return value;
        }
        match value {
            RelationValue::One(entity) => {
                if matches_conditions(&entity, config) {
                    RelationValue::One(Box::new(project(*entity, config)))
                } else {
                    RelationValue::Absent
                }
            }
            RelationValue::Many(entities) => RelationValue::Many(
                entities
                    .into_iter()
                    .filter(|e| matches_conditions(e, config))
                    .map(|e| project(e, config))
                    .collect(),
            ),
            other => other,
        }
    }
}

fn matches_conditions(entity: &Entity, config: &LoadConfig) -> bool {
    match &config.conditions {
        Some(conditions) => conditions
            .iter()
            .all(|(field, expected)| entity.field(field) == Some(expected)),
        None => true,
    }
}

fn project(mut entity: Entity, config: &LoadConfig) -> Entity {
    if let Some(fields) = &config.select_fields {
        entity.fields.retain(|name, _| fields.iter().any(|f| f == name));
    }
    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryRelationCache;
    use crate::memory::MemoryStore;
    use relgraph_core::{EntityDef, RelationDef};

    fn order_catalog() -> Arc<Catalog> {
        let catalog = Catalog::new();
        catalog.register(
            EntityDef::new("Order")
                .with_relation(RelationDef::one_to_many("items", "LineItem").cascade_all())
                .with_relation(RelationDef::many_to_one("customer", "Customer")),
        );
        catalog.register(EntityDef::new("LineItem"));
        catalog.register(EntityDef::new("Customer"));
        Arc::new(catalog)
    }

    fn cyclic_catalog() -> Arc<Catalog> {
        let catalog = Catalog::new();
        catalog.register(
            EntityDef::new("User").with_relation(RelationDef::one_to_one("profile", "Profile")),
        );
        catalog.register(
            EntityDef::new("Profile").with_relation(RelationDef::many_to_one("user", "User")),
        );
        Arc::new(catalog)
    }

    fn seeded_order_store(catalog: &Arc<Catalog>) -> Arc<MemoryStore> {
        let store = MemoryStore::new(Arc::clone(catalog));
        let l1 = Entity::new("LineItem", "l1").with_field("qty", 3i64);
        let l2 = Entity::new("LineItem", "l2").with_field("qty", 7i64);
        let customer = Entity::new("Customer", "c1").with_field("name", "Ada");
        store.save(&l1).unwrap();
        store.save(&l2).unwrap();
        store.save(&customer).unwrap();
        store
            .save(
                &Entity::new("Order", "o1")
                    .with_many("items", vec![l1, l2])
                    .with_one("customer", customer),
            )
            .unwrap();
        Arc::new(store)
    }

    fn seeded_cyclic_store(catalog: &Arc<Catalog>) -> Arc<MemoryStore> {
        let store = MemoryStore::new(Arc::clone(catalog));
        let user = Entity::new("User", "u1");
        let profile = Entity::new("Profile", "p1");
        store
            .save(&user.clone().with_one("profile", profile.clone()))
            .unwrap();
        store.save(&profile.with_one("user", user)).unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_lazy_returns_entity_unchanged() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let order = Entity::new("Order", "o1");
        let loaded = loader
            .load_relationships(&order, &LoadConfig::new(LoadStrategy::Lazy))
            .unwrap();
        assert_eq!(loaded, order);
    }

    #[test]
    fn test_eager_loads_declared_relations() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let loaded = loader
            .load_relationships(&Entity::new("Order", "o1"), &LoadConfig::new(LoadStrategy::Eager))
            .unwrap();

        assert_eq!(loaded.relation("items").map(|r| r.len()), Some(2));
        assert!(loaded.relation("customer").is_some_and(|r| r.is_loaded()));
    }

    #[test]
    fn test_eager_respects_depth_bound() {
        let catalog = cyclic_catalog();
        let store = seeded_cyclic_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Eager).with_max_depth(0);
        let loaded = loader
            .load_relationships(&Entity::new("User", "u1"), &config)
            .unwrap();
        assert!(loaded.relations.is_empty());
    }

    #[test]
    fn test_circular_truncate_terminates() {
        let catalog = cyclic_catalog();
        let store = seeded_cyclic_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let loaded = loader
            .load_relationships(&Entity::new("User", "u1"), &LoadConfig::new(LoadStrategy::Eager))
            .unwrap();

        let profile = match loaded.relation("profile") {
            Some(RelationValue::One(p)) => p,
            other => panic!("unexpected slot: {other:?}"),
        };
        // The revisited user is kept but not expanded further.
        match profile.relation("user") {
            Some(RelationValue::One(user)) => assert!(user.relations.is_empty()),
            other => panic!("unexpected slot: {other:?}"),
        }
    }

    #[test]
    fn test_circular_proxy_yields_lazy_handle() {
        let catalog = cyclic_catalog();
        let store = seeded_cyclic_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Eager).with_circular(CircularPolicy::Proxy);
        let loaded = loader
            .load_relationships(&Entity::new("User", "u1"), &config)
            .unwrap();

        let profile = match loaded.relation("profile") {
            Some(RelationValue::One(p)) => p,
            other => panic!("unexpected slot: {other:?}"),
        };
        assert_eq!(
            profile.relation("user"),
            Some(&RelationValue::Lazy(LazyRef::new("Profile", "p1", "user")))
        );
    }

    #[test]
    fn test_circular_exclude_clears_slot() {
        let catalog = cyclic_catalog();
        let store = seeded_cyclic_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Eager).with_circular(CircularPolicy::Exclude);
        let loaded = loader
            .load_relationships(&Entity::new("User", "u1"), &config)
            .unwrap();

        let profile = match loaded.relation("profile") {
            Some(RelationValue::One(p)) => p,
            other => panic!("unexpected slot: {other:?}"),
        };
        assert_eq!(profile.relation("user"), Some(&RelationValue::Absent));
    }

    #[test]
    fn test_proxy_handle_resolves_on_demand() {
        let catalog = cyclic_catalog();
        let store = seeded_cyclic_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let resolved = loader
            .resolve(&LazyRef::new("Profile", "p1", "user"))
            .unwrap();
        match resolved {
            RelationValue::One(user) => assert_eq!(user.id, "u1"),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_smart_loads_only_to_one_relations() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let loaded = loader
            .load_relationships(&Entity::new("Order", "o1"), &LoadConfig::new(LoadStrategy::Smart))
            .unwrap();

        assert!(loaded.relation("customer").is_some_and(|r| r.is_loaded()));
        assert!(loaded.relation("items").is_none());
    }

    #[test]
    fn test_smart_cache_hit_skips_store() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let cache: Arc<dyn RelationCache> =
            Arc::new(MemoryRelationCache::new(&CacheConfig::default()));
        let loader =
            RelationLoader::new(catalog, Arc::clone(&store) as Arc<dyn EntityStore>)
                .with_cache(Arc::clone(&cache));

        let config = LoadConfig::new(LoadStrategy::Smart).with_cache(CacheConfig::default());
        let first = loader
            .load_relationships(&Entity::new("Order", "o1"), &config)
            .unwrap();

        // Changing the store is invisible behind the cached copy.
        store.delete("Customer", "c1").unwrap();
        let second = loader
            .load_relationships(&Entity::new("Order", "o1"), &config)
            .unwrap();
        assert_eq!(first, second);
        assert!(second.relation("customer").is_some_and(|r| r.is_loaded()));
    }

    #[test]
    fn test_batch_issues_one_grouped_fetch() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, Arc::clone(&store) as Arc<dyn EntityStore>);

        let orders = vec![
            Entity::new("Order", "o1"),
            Entity::new("Order", "o2"),
            Entity::new("Order", "o3"),
        ];
        let loaded = loader
            .load_batch(&orders, "items", &LoadConfig::new(LoadStrategy::Batch))
            .unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(store.grouped_fetch_count(), 1);
        assert_eq!(loaded[0].relation("items").map(|r| r.len()), Some(2));
        // Unknown orders default to an empty to-many slot.
        assert_eq!(loaded[1].relation("items"), Some(&RelationValue::Many(vec![])));
    }

    #[test]
    fn test_batch_rejects_mixed_entity_types() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let mixed = vec![Entity::new("Order", "o1"), Entity::new("LineItem", "l1")];
        let err = loader
            .load_batch(&mixed, "items", &LoadConfig::new(LoadStrategy::Batch))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBatch(_)));
    }

    #[test]
    fn test_batch_rejects_unknown_relation() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let err = loader
            .load_batch(
                &[Entity::new("Order", "o1")],
                "ghosts",
                &LoadConfig::new(LoadStrategy::Batch),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBatch(_)));
    }

    #[test]
    fn test_batch_cache_hits_shrink_the_fetch() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let cache: Arc<dyn RelationCache> =
            Arc::new(MemoryRelationCache::new(&CacheConfig::default()));
        let loader =
            RelationLoader::new(catalog, Arc::clone(&store) as Arc<dyn EntityStore>)
                .with_cache(cache);

        let config = LoadConfig::new(LoadStrategy::Batch).with_cache(CacheConfig::default());
        let orders = vec![Entity::new("Order", "o1"), Entity::new("Order", "o2")];

        loader.load_batch(&orders, "items", &config).unwrap();
        assert_eq!(store.grouped_fetch_count(), 1);

        // Both relation entries are now cached; a second call stays off the
        // store entirely.
        loader.load_batch(&orders, "items", &config).unwrap();
        assert_eq!(store.grouped_fetch_count(), 1);
    }

    #[test]
    fn test_batch_empty_input() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let loaded = loader
            .load_batch(&[], "items", &LoadConfig::new(LoadStrategy::Batch))
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_conditions_filter_loaded_entities() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Batch).with_condition("qty", 3i64);
        let loaded = loader
            .load_batch(&[Entity::new("Order", "o1")], "items", &config)
            .unwrap();

        let items = loaded[0].relation("items").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.entities().next().map(|e| e.id.as_str()), Some("l1"));
    }

    #[test]
    fn test_select_fields_projects_loaded_entities() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Eager).with_select_fields(["name"]);
        let loaded = loader
            .load_relationships(&Entity::new("Order", "o1"), &config)
            .unwrap();

        for item in loaded.relation("items").unwrap().entities() {
            assert!(item.fields.is_empty());
        }
        let customer = loaded.relation("customer").unwrap().entities().next().unwrap();
        assert_eq!(customer.field("name"), Some(&"Ada".into()));
    }

    #[test]
    fn test_relation_override_takes_effect() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Eager).with_relation_override(
            "items",
            LoadConfig::new(LoadStrategy::Eager).with_condition("qty", 7i64),
        );
        let loaded = loader
            .load_relationships(&Entity::new("Order", "o1"), &config)
            .unwrap();

        assert_eq!(loaded.relation("items").map(|r| r.len()), Some(1));
        // The override does not leak into sibling relations.
        assert!(loaded.relation("customer").is_some_and(|r| r.is_loaded()));
    }

    #[test]
    fn test_batch_strategy_honors_relation_overrides() {
        let catalog = order_catalog();
        let store = seeded_order_store(&catalog);
        let loader = RelationLoader::new(catalog, store);

        let config = LoadConfig::new(LoadStrategy::Batch).with_relation_override(
            "items",
            LoadConfig::new(LoadStrategy::Batch).with_condition("qty", 7i64),
        );
        let loaded = loader
            .load_relationships(&Entity::new("Order", "o1"), &config)
            .unwrap();

        let items = loaded.relation("items").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.entities().next().map(|e| e.id.as_str()), Some("l2"));
        // The sibling relation still uses the base configuration.
        assert!(loaded.relation("customer").is_some_and(|r| r.is_loaded()));
    }

    #[test]
    fn test_default_config_carries_documented_defaults() {
        let config = LoadConfig::default();
        assert_eq!(config.strategy, LoadStrategy::Lazy);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.circular, CircularPolicy::Truncate);

        // Struct-update construction keeps them too.
        let eager = LoadConfig {
            strategy: LoadStrategy::Eager,
            ..LoadConfig::default()
        };
        assert_eq!(eager.max_depth, 3);
    }

    #[test]
    fn test_load_config_serde_roundtrip() {
        let config = LoadConfig::new(LoadStrategy::Smart)
            .with_max_depth(2)
            .with_cache(CacheConfig::default())
            .with_condition("qty", 3i64)
            .with_relation_override("items", LoadConfig::new(LoadStrategy::Batch));

        let json = serde_json::to_string(&config).unwrap();
        let parsed: LoadConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.strategy, LoadStrategy::Smart);
        assert_eq!(parsed.max_depth, 2);
        assert_eq!(
            parsed.for_relation("items").strategy,
            LoadStrategy::Batch
        );
    }
}
