//! Relationship resolution run after every raw resource is known.

use super::RawRecord;
use crate::{
    Result,
    error::SyncError,
    models::{Graph, Relation, ResourceKey},
};
use async_trait::async_trait;

/// Links one raw resource into the graph's parent/child structure.
///
/// Resolvers only read the graph. The edges they return are inserted by
/// the orchestrator once every resolver of the phase has finished.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    /// Returns the relations `child` takes part in.
    ///
    /// # Errors
    /// Returns a relationship error if the record cannot be linked.
    async fn resolve(
        &self,
        graph: &Graph,
        child: &ResourceKey,
        record: &RawRecord,
    ) -> Result<Vec<Relation>>;
}

/// Makes every resource a child of the pass's region node.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionParent;

#[async_trait]
impl RelationResolver for RegionParent {
    async fn resolve(
        &self,
        graph: &Graph,
        child: &ResourceKey,
        _record: &RawRecord,
    ) -> Result<Vec<Relation>> {
        let region = graph.region().ok_or_else(|| {
            SyncError::relationship(&child.resource_type, "graph has no region node")
        })?;
        Ok(vec![Relation::new(region.key(), child.clone())])
    }
}

/// Makes a resource the child of the resource(s) named by one of its fields.
///
/// The field may hold a single identifier or an array of identifiers.
/// Parents that are not in the graph, for example because their type was
/// disabled, are skipped.
#[derive(Debug, Clone)]
pub struct ParentByField {
    parent_type: String,
    field: String,
}

impl ParentByField {
    pub fn new(parent_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            parent_type: parent_type.into(),
            field: field.into(),
        }
    }

    fn link(&self, graph: &Graph, child: &ResourceKey, parent_id: &str) -> Option<Relation> {
        let parent = ResourceKey::new(&self.parent_type, parent_id);
        if graph.contains(&parent) {
            Some(Relation::new(parent, child.clone()))
        } else {
            tracing::trace!("{}: parent {} not in graph", child, parent);
            None
        }
    }
}

#[async_trait]
impl RelationResolver for ParentByField {
    async fn resolve(
        &self,
        graph: &Graph,
        child: &ResourceKey,
        record: &RawRecord,
    ) -> Result<Vec<Relation>> {
        match record.get(&self.field) {
            None | Some(RawRecord::Null) => Ok(Vec::new()),
            Some(RawRecord::String(parent_id)) => {
                Ok(self.link(graph, child, parent_id).into_iter().collect())
            }
            Some(RawRecord::Array(ids)) => {
                let mut relations = Vec::with_capacity(ids.len());
                for id in ids {
                    let parent_id = id.as_str().ok_or_else(|| {
                        SyncError::relationship(
                            &child.resource_type,
                            format!("{}: '{}' holds a non-string identifier", child, self.field),
                        )
                    })?;
                    relations.extend(self.link(graph, child, parent_id));
                }
                Ok(relations)
            }
            Some(_) => Err(SyncError::relationship(
                &child.resource_type,
                format!("{}: '{}' is not an identifier", child, self.field),
            )),
        }
    }
}

/// Adapts a closure into a [`RelationResolver`].
pub struct FnResolver<F>(pub F);

#[async_trait]
impl<F> RelationResolver for FnResolver<F>
where
    F: Fn(&Graph, &ResourceKey, &RawRecord) -> Result<Vec<Relation>> + Send + Sync,
{
    async fn resolve(
        &self,
        graph: &Graph,
        child: &ResourceKey,
        record: &RawRecord,
    ) -> Result<Vec<Relation>> {
        (self.0)(graph, child, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{REGION_TYPE, Resource};
    use serde_json::json;

    fn graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_resource(Resource::region("eu-west-1")).unwrap();
        graph
            .add_resource(Resource::new("subnet", "subnet-1", "eu-west-1"))
            .unwrap();
        graph
            .add_resource(Resource::new("securitygroup", "sg-1", "eu-west-1"))
            .unwrap();
        graph
            .add_resource(Resource::new("instance", "i-1", "eu-west-1"))
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn test_region_parent() {
        let graph = graph();
        let child = ResourceKey::new("instance", "i-1");
        let relations = RegionParent.resolve(&graph, &child, &json!({})).await.unwrap();

        assert_eq!(
            relations,
            vec![Relation::new(
                ResourceKey::new(REGION_TYPE, "eu-west-1"),
                child
            )]
        );
    }

    #[tokio::test]
    async fn test_region_parent_without_region() {
        let graph = Graph::new();
        let child = ResourceKey::new("instance", "i-1");
        let err = RegionParent.resolve(&graph, &child, &json!({})).await.unwrap_err();
        assert!(matches!(err, SyncError::Relationship { .. }));
    }

    #[tokio::test]
    async fn test_parent_by_field() {
        let graph = graph();
        let child = ResourceKey::new("instance", "i-1");
        let resolver = ParentByField::new("subnet", "SubnetId");

        let relations = resolver
            .resolve(&graph, &child, &json!({"SubnetId": "subnet-1"}))
            .await
            .unwrap();
        assert_eq!(
            relations,
            vec![Relation::new(ResourceKey::new("subnet", "subnet-1"), child.clone())]
        );

        // Absent field, null, or parent not synced: no edge
        for record in [
            json!({}),
            json!({"SubnetId": null}),
            json!({"SubnetId": "subnet-2"}),
        ] {
            let relations = resolver.resolve(&graph, &child, &record).await.unwrap();
            assert!(relations.is_empty(), "unexpected edges for {}", record);
        }
    }

    #[tokio::test]
    async fn test_parent_by_field_array() {
        let graph = graph();
        let child = ResourceKey::new("instance", "i-1");
        let resolver = ParentByField::new("securitygroup", "SecurityGroups");

        let relations = resolver
            .resolve(&graph, &child, &json!({"SecurityGroups": ["sg-1", "sg-missing"]}))
            .await
            .unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].parent, ResourceKey::new("securitygroup", "sg-1"));

        let err = resolver
            .resolve(&graph, &child, &json!({"SecurityGroups": [42]}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Relationship { .. }));
    }

    #[tokio::test]
    async fn test_parent_by_field_rejects_objects() {
        let graph = graph();
        let child = ResourceKey::new("instance", "i-1");
        let resolver = ParentByField::new("subnet", "SubnetId");

        let err = resolver
            .resolve(&graph, &child, &json!({"SubnetId": {"id": "subnet-1"}}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SubnetId"));
    }

    #[tokio::test]
    async fn test_fn_resolver() {
        let graph = graph();
        let child = ResourceKey::new("instance", "i-1");
        let resolver = FnResolver(
            |_: &Graph, child: &ResourceKey, _: &RawRecord| -> Result<Vec<Relation>> {
                Err(SyncError::relationship(&child.resource_type, "boom"))
            },
        );

        let err = resolver.resolve(&graph, &child, &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
