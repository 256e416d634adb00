use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use shared::domain::ResourceType;

use super::{query::QueryKey, store::EntityId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagScope {
    List,
    Id(EntityId),
}

/// Invalidation key: everything derived from a resource class (`LIST`) or
/// from one instance of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub resource: ResourceType,
    pub scope: TagScope,
}

impl Tag {
    pub fn list(resource: ResourceType) -> Self {
        Self {
            resource,
            scope: TagScope::List,
        }
    }

    pub fn id(resource: ResourceType, id: impl Into<EntityId>) -> Self {
        Self {
            resource,
            scope: TagScope::Id(id.into()),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            TagScope::List => write!(f, "{}:LIST", self.resource),
            TagScope::Id(id) => write!(f, "{}:{id}", self.resource),
        }
    }
}

/// Tag -> live query identities, with the reverse map kept alongside so a
/// detaching query can be pruned without scanning every tag.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_tag: HashMap<Tag, HashSet<QueryKey>>,
    by_query: HashMap<QueryKey, HashSet<Tag>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the pair was not registered yet.
    pub fn subscribe(&mut self, tag: Tag, key: QueryKey) -> bool {
        let added = self
            .by_tag
            .entry(tag.clone())
            .or_default()
            .insert(key.clone());
        self.by_query.entry(key).or_default().insert(tag);
        added
    }

    pub fn unsubscribe(&mut self, tag: &Tag, key: &QueryKey) -> bool {
        let removed = match self.by_tag.get_mut(tag) {
            Some(keys) => {
                let removed = keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(tag);
                }
                removed
            }
            None => false,
        };
        if let Some(tags) = self.by_query.get_mut(key) {
            tags.remove(tag);
            if tags.is_empty() {
                self.by_query.remove(key);
            }
        }
        removed
    }

    /// Drops every registration of `key`; returns how many tags it held.
    pub fn unsubscribe_query(&mut self, key: &QueryKey) -> usize {
        let Some(tags) = self.by_query.remove(key) else {
            return 0;
        };
        for tag in &tags {
            if let Some(keys) = self.by_tag.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
        tags.len()
    }

    /// Every query registered under at least one of `tags`.
    pub fn tags_to_queries<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> HashSet<QueryKey> {
        tags.into_iter()
            .filter_map(|tag| self.by_tag.get(tag))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn tags_for(&self, key: &QueryKey) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .by_query
            .get(key)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    pub fn contains_query(&self, key: &QueryKey) -> bool {
        self.by_query.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
