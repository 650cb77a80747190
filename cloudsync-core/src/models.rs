//! Resource graph assembled by a synchronization pass.
//!
//! A [`Graph`] holds resources keyed by `(type, id)` and directed
//! parent → child relations between them. Storage is ordered, so the content
//! of a graph never depends on the order in which fetches completed.
//!
//! Graphs are plain owned values: each fetch task builds its own sub-graph
//! and the orchestrator merges them one at a time as each fetch completes.
//! No lock sits on the insertion path.

use crate::{Result, error::SyncError};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Type tag of the synthetic region node seeded into every pass.
pub const REGION_TYPE: &str = "region";

/// Identity of a resource within a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: String,
    pub id: String,
}

impl ResourceKey {
    /// Creates a key from a type tag and identifier.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.resource_type, self.id)
    }
}

/// A provider resource as stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Type tag, e.g. "instance" or "subnet"
    pub resource_type: String,
    /// Provider-assigned identifier
    pub id: String,
    /// Owning region
    pub region: String,
    /// Opaque attribute bag copied from the provider record
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Resource {
    /// Creates a resource with no properties.
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            region: region.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Creates the synthetic region node for `region`.
    pub fn region(region: impl Into<String>) -> Self {
        let region = region.into();
        Self::new(REGION_TYPE, region.clone(), region)
    }

    /// Adds a property.
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Returns the graph key of this resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.id)
    }

    /// Converts a raw provider record into a resource.
    ///
    /// The record must be a JSON object whose `id_field` holds a non-empty
    /// string. Every other field is copied into the properties.
    ///
    /// # Errors
    /// Returns a conversion error if the record is not an object or lacks a
    /// usable identifier.
    pub fn from_record(
        resource_type: &str,
        region: &str,
        id_field: &str,
        record: &serde_json::Value,
    ) -> Result<Self> {
        let object = record
            .as_object()
            .ok_or_else(|| SyncError::conversion(resource_type, "record is not an object"))?;

        let id = match object.get(id_field) {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id.clone(),
            Some(serde_json::Value::String(_)) => {
                return Err(SyncError::conversion(
                    resource_type,
                    format!("field '{}' is empty", id_field),
                ));
            }
            Some(_) => {
                return Err(SyncError::conversion(
                    resource_type,
                    format!("field '{}' is not a string", id_field),
                ));
            }
            None => {
                return Err(SyncError::conversion(
                    resource_type,
                    format!("missing identifier field '{}'", id_field),
                ));
            }
        };

        let properties = object
            .iter()
            .filter(|(name, _)| name.as_str() != id_field)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Self {
            resource_type: resource_type.to_string(),
            id,
            region: region.to_string(),
            properties,
        })
    }
}

/// Directed parent → child edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub parent: ResourceKey,
    pub child: ResourceKey,
}

impl Relation {
    /// Creates a parent → child relation.
    pub fn new(parent: ResourceKey, child: ResourceKey) -> Self {
        Self { parent, child }
    }
}

/// Mergeable container of resources and relations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    resources: BTreeMap<ResourceKey, Resource>,
    relations: BTreeSet<Relation>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a resource.
    ///
    /// # Errors
    /// Returns a conversion error for an empty type or identifier, and a
    /// duplicate error if the key is already present.
    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        if resource.resource_type.is_empty() {
            return Err(SyncError::conversion("<unknown>", "empty resource type"));
        }
        if resource.id.is_empty() {
            return Err(SyncError::conversion(
                &resource.resource_type,
                "empty resource identifier",
            ));
        }

        let key = resource.key();
        if self.resources.contains_key(&key) {
            return Err(SyncError::DuplicateResource {
                resource_type: key.resource_type,
                id: key.id,
            });
        }
        self.resources.insert(key, resource);
        Ok(())
    }

    /// Inserts a relation between two resources already in the graph.
    /// Inserting an existing relation again is a no-op.
    ///
    /// # Errors
    /// Returns a dangling-relation error if either endpoint is absent.
    pub fn add_relation(&mut self, relation: Relation) -> Result<()> {
        if !self.contains(&relation.parent) || !self.contains(&relation.child) {
            return Err(SyncError::DanglingRelation {
                parent: relation.parent.to_string(),
                child: relation.child.to_string(),
            });
        }
        self.relations.insert(relation);
        Ok(())
    }

    /// Moves every resource and relation of `other` into this graph.
    ///
    /// Conflicting resources are skipped and the rest are still merged.
    ///
    /// # Errors
    /// Returns the first conflict encountered, after merging everything that
    /// did not conflict.
    pub fn merge(&mut self, other: Graph) -> Result<()> {
        let mut first_error = None;

        for resource in other.resources.into_values() {
            if let Err(e) = self.add_resource(resource) {
                first_error.get_or_insert(e);
            }
        }
        for relation in other.relations {
            if let Err(e) = self.add_relation(relation) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Looks up a resource by key.
    pub fn get(&self, key: &ResourceKey) -> Option<&Resource> {
        self.resources.get(key)
    }

    /// Looks up a resource by type and identifier.
    pub fn find(&self, resource_type: &str, id: &str) -> Option<&Resource> {
        self.resources.get(&ResourceKey::new(resource_type, id))
    }

    /// Whether a resource with this key is present.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.resources.contains_key(key)
    }

    /// The synthetic region node, if seeded.
    pub fn region(&self) -> Option<&Resource> {
        self.resources
            .values()
            .find(|r| r.resource_type == REGION_TYPE)
    }

    /// All resources in key order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Resources of one type in identifier order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .values()
            .filter(move |r| r.resource_type == resource_type)
    }

    /// All relations in order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    /// Direct children of `parent`.
    pub fn children_of<'a>(
        &'a self,
        parent: &'a ResourceKey,
    ) -> impl Iterator<Item = &'a ResourceKey> + 'a {
        self.relations
            .iter()
            .filter(move |rel| &rel.parent == parent)
            .map(|rel| &rel.child)
    }

    /// Direct parents of `child`.
    pub fn parents_of<'a>(
        &'a self,
        child: &'a ResourceKey,
    ) -> impl Iterator<Item = &'a ResourceKey> + 'a {
        self.relations
            .iter()
            .filter(move |rel| &rel.child == child)
            .map(|rel| &rel.parent)
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the graph holds no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Number of relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

impl Serialize for Graph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let resources: Vec<&Resource> = self.resources.values().collect();
        let relations: Vec<&Relation> = self.relations.iter().collect();

        let mut state = serializer.serialize_struct("Graph", 2)?;
        state.serialize_field("resources", &resources)?;
        state.serialize_field("relations", &relations)?;
        state.end()
    }
}
