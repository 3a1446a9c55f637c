use super::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured key into the reactive read cache: a collection plus an optional scope
/// (for example `batch` scoped to one farm).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    collection: String,
    scope: Option<String>,
}

impl CacheKey {
    pub fn new(collection: String, scope: Option<String>) -> Result<Self, String> {
        if collection.trim().is_empty() {
            return Err("Cache key collection cannot be empty".to_string());
        }
        if collection.contains(':') {
            return Err("Cache key collection cannot contain ':'".to_string());
        }
        let scope = scope.filter(|value| !value.trim().is_empty());
        Ok(Self { collection, scope })
    }

    /// List key holding every cached record of an entity type.
    pub fn for_entity_type(entity_type: &EntityType) -> Self {
        Self {
            collection: entity_type.as_str().to_string(),
            scope: None,
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.split_once(':') {
            Some((collection, scope)) => Self::new(collection.to_string(), Some(scope.to_string())),
            None => Self::new(value.to_string(), None),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", self.collection, scope),
            None => write!(f, "{}", self.collection),
        }
    }
}
