//! Per-resource-type fetch declarations.
//!
//! A [`FetchDescriptor`] declares how one resource type of a service is
//! listed: which [`ListApi`] serves its records, whether the listing is
//! paginated, which record field holds the identifier, and which
//! [`RelationResolver`]s link its resources once the whole pass is fetched.
//!
//! The provider call itself stays behind [`ListApi`]; this module only
//! drives it, converts records and builds the type-local sub-graph.

mod relations;

pub use relations::{FnResolver, ParentByField, RegionParent, RelationResolver};

use crate::{
    Result,
    error::SyncError,
    models::{Graph, Relation, Resource, ResourceKey},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Opaque provider record as returned by a list/describe call.
pub type RawRecord = serde_json::Value;

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Cursor of the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

impl Page {
    /// A final page.
    pub fn last(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            next_cursor: None,
        }
    }

    /// A page followed by the page at `cursor`.
    pub fn with_next(records: Vec<RawRecord>, cursor: impl Into<String>) -> Self {
        Self {
            records,
            next_cursor: Some(cursor.into()),
        }
    }
}

/// A provider list/describe operation for one resource type.
#[async_trait]
pub trait ListApi: Send + Sync {
    /// Fetches the page at `cursor`, or the first page when `cursor` is `None`.
    ///
    /// # Errors
    /// Returns the provider's error, typically a request failure.
    async fn list_page(&self, cursor: Option<&str>) -> Result<Page>;
}

/// Everything one fetch of a resource type produced.
///
/// `graph` and `records` may be partial when `error` is set.
#[derive(Debug, Default)]
pub struct TypeFetch {
    pub graph: Graph,
    pub records: Vec<RawRecord>,
    pub error: Option<SyncError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pagination {
    SinglePage,
    Paginated,
}

/// Static declaration of how one resource type is fetched and linked.
#[derive(Clone)]
pub struct FetchDescriptor {
    resource_type: String,
    id_field: String,
    pagination: Pagination,
    api: Arc<dyn ListApi>,
    relations: Vec<Arc<dyn RelationResolver>>,
}

impl std::fmt::Debug for FetchDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchDescriptor")
            .field("resource_type", &self.resource_type)
            .field("id_field", &self.id_field)
            .field("pagination", &self.pagination)
            .field("relations", &self.relations.len())
            .finish_non_exhaustive()
    }
}

impl FetchDescriptor {
    /// Declares a single-page resource type identified by `id_field`.
    pub fn new(
        resource_type: impl Into<String>,
        id_field: impl Into<String>,
        api: Arc<dyn ListApi>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id_field: id_field.into(),
            pagination: Pagination::SinglePage,
            api,
            relations: Vec::new(),
        }
    }

    /// Marks the listing as paginated.
    pub fn paginated(mut self) -> Self {
        self.pagination = Pagination::Paginated;
        self
    }

    /// Registers a relationship resolver.
    pub fn with_relation(mut self, resolver: impl RelationResolver + 'static) -> Self {
        self.relations.push(Arc::new(resolver));
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn is_paginated(&self) -> bool {
        self.pagination == Pagination::Paginated
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }

    /// Lists every resource of this type into a type-local graph.
    ///
    /// Never fails as a whole: a provider or conversion error stops the
    /// listing and is returned in [`TypeFetch::error`] next to whatever was
    /// collected before it.
    pub async fn fetch_all(&self, region: &str) -> TypeFetch {
        let fetch = match self.pagination {
            Pagination::SinglePage => self.fetch_single_page(region).await,
            Pagination::Paginated => self.fetch_paginated(region).await,
        };

        debug!(
            "fetched {} {} record(s){}",
            fetch.records.len(),
            self.resource_type,
            if fetch.error.is_some() { " before failing" } else { "" }
        );
        fetch
    }

    async fn fetch_single_page(&self, region: &str) -> TypeFetch {
        let mut fetch = TypeFetch::default();

        match self.api.list_page(None).await {
            Ok(page) => {
                if let Err(e) = self.ingest(region, page.records, &mut fetch) {
                    fetch.error = Some(e);
                }
            }
            Err(e) => fetch.error = Some(e),
        }

        fetch
    }

    async fn fetch_paginated(&self, region: &str) -> TypeFetch {
        let mut fetch = TypeFetch::default();
        let mut cursor: Option<String> = None;

        loop {
            let Page {
                records,
                next_cursor,
            } = match self.api.list_page(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    fetch.error = Some(e);
                    break;
                }
            };

            // A bad record stops pagination; later pages are never requested
            if let Err(e) = self.ingest(region, records, &mut fetch) {
                fetch.error = Some(e);
                break;
            }

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        fetch
    }

    /// Converts and inserts records, keeping each raw record even when its
    /// conversion fails.
    fn ingest(&self, region: &str, records: Vec<RawRecord>, fetch: &mut TypeFetch) -> Result<()> {
        for record in records {
            let converted =
                Resource::from_record(&self.resource_type, region, &self.id_field, &record);
            fetch.records.push(record);
            fetch.graph.add_resource(converted?)?;
        }
        Ok(())
    }

    /// Key of the resource a raw record converts to.
    fn child_key(&self, record: &RawRecord) -> Result<ResourceKey> {
        record
            .get(&self.id_field)
            .and_then(RawRecord::as_str)
            .map(|id| ResourceKey::new(&self.resource_type, id))
            .ok_or_else(|| {
                SyncError::relationship(
                    &self.resource_type,
                    format!("record has no '{}' identifier", self.id_field),
                )
            })
    }

    /// Runs every registered resolver against every record.
    ///
    /// Stops at the first resolver error and returns it together with the
    /// relations resolved before it.
    pub async fn resolve_relations(
        &self,
        graph: &Graph,
        records: &[RawRecord],
    ) -> (Vec<Relation>, Option<SyncError>) {
        let mut relations = Vec::new();

        for record in records {
            let child = match self.child_key(record) {
                Ok(child) => child,
                Err(e) => return (relations, Some(e)),
            };
            for resolver in &self.relations {
                match resolver.resolve(graph, &child, record).await {
                    Ok(resolved) => relations.extend(resolved),
                    Err(e) => return (relations, Some(e)),
                }
            }
        }

        (relations, None)
    }
}
