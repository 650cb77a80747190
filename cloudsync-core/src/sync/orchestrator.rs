//! Two-phase fetch orchestration for one provider service.
//!
//! A pass seeds the graph with the region node, then:
//! 1. fetches every enabled resource type concurrently, merging each
//!    type-local sub-graph into the pass graph as its task completes;
//! 2. once every fetch has finished, resolves the relations of every
//!    successfully fetched type concurrently against the read-only graph,
//!    inserting the resulting edges after all resolvers have finished.
//!
//! Failures of one type never stop its siblings. Every error of the pass is
//! collected and returned next to the graph, which is always handed back.

use super::ErrorCollector;
use crate::{
    Result,
    config::SyncConfig,
    error::SyncError,
    fetch::{FetchDescriptor, RawRecord, TypeFetch},
    models::{Graph, Resource},
};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Graph produced by a pass together with everything that went wrong.
///
/// The graph may be partial when `error` is set.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub graph: Graph,
    pub error: Option<SyncError>,
}

impl FetchOutcome {
    /// Whether the pass finished without any error.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Discards the partial graph on error.
    ///
    /// # Errors
    /// Returns the pass error, if any.
    pub fn into_result(self) -> Result<Graph> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.graph),
        }
    }
}

/// Fetches every declared resource type of one service into a graph.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use cloudsync_core::config::SyncConfig;
/// use cloudsync_core::fetch::{FetchDescriptor, ListApi, RegionParent};
/// use cloudsync_core::sync::ServiceFetcher;
///
/// # async fn example(subnets: Arc<dyn ListApi>) {
/// let config = Arc::new(SyncConfig::new());
/// let service = ServiceFetcher::new("infra", "eu-west-1", config).with_descriptor(
///     FetchDescriptor::new("subnet", "SubnetId", subnets)
///         .paginated()
///         .with_relation(RegionParent),
/// );
///
/// let outcome = service.fetch_resources().await;
/// println!("{} resources", outcome.graph.len());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServiceFetcher {
    name: String,
    region: String,
    config: Arc<SyncConfig>,
    descriptors: BTreeMap<String, FetchDescriptor>,
}

impl ServiceFetcher {
    pub fn new(name: impl Into<String>, region: impl Into<String>, config: Arc<SyncConfig>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            config,
            descriptors: BTreeMap::new(),
        }
    }

    /// Declares a resource type, replacing any earlier declaration of it.
    pub fn with_descriptor(mut self, descriptor: FetchDescriptor) -> Self {
        self.descriptors
            .insert(descriptor.resource_type().to_string(), descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Declared resource types, sorted.
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn is_sync_disabled(&self) -> bool {
        !self.config.service_enabled(&self.name)
    }

    /// Descriptors whose per-type flag is on.
    fn enabled_descriptors(&self) -> Vec<&FetchDescriptor> {
        self.descriptors
            .values()
            .filter(|descriptor| {
                let enabled = self
                    .config
                    .resource_enabled(&self.name, descriptor.resource_type());
                if !enabled {
                    warn!(
                        "sync: *disabled* for resource {}[{}]",
                        self.name,
                        descriptor.resource_type()
                    );
                }
                enabled
            })
            .collect()
    }

    /// Runs a full synchronization pass.
    ///
    /// Returns an empty graph without error when the service is disabled.
    /// Otherwise the graph holds the region node plus whatever every enabled
    /// type contributed, and `error` aggregates every fetch and relation
    /// failure of the pass. Provider "Access Denied" failures are reported as
    /// [`SyncError::AccessDenied`] for their resource type.
    pub async fn fetch_resources(&self) -> FetchOutcome {
        if self.is_sync_disabled() {
            debug!("sync: *disabled* for service {}", self.name);
            return FetchOutcome::default();
        }

        let span = info_span!(
            "sync",
            service = %self.name,
            region = %self.region,
            pass = %Uuid::new_v4()
        );
        self.run_pass().instrument(span).await
    }

    async fn run_pass(&self) -> FetchOutcome {
        let mut graph = Graph::new();
        if let Err(e) = graph.add_resource(Resource::region(&self.region)) {
            return FetchOutcome {
                graph,
                error: Some(e),
            };
        }

        let descriptors = self.enabled_descriptors();
        info!(
            "Starting sync of {} resource type(s) ({} disabled)",
            descriptors.len(),
            self.descriptors.len() - descriptors.len()
        );

        let errors = ErrorCollector::new();
        let fetched = self.fetch_phase(&descriptors, &mut graph, &errors).await;
        self.relation_phase(&fetched, &mut graph, &errors).await;

        let error = errors.into_error();
        match &error {
            Some(aggregated) => warn!(
                "Sync finished with {} error(s): {} resource(s), {} relation(s)",
                aggregated.len(),
                graph.len(),
                graph.relation_count()
            ),
            None => info!(
                "Sync finished: {} resource(s), {} relation(s)",
                graph.len(),
                graph.relation_count()
            ),
        }

        FetchOutcome {
            graph,
            error: error.map(SyncError::from),
        }
    }

    /// Phase 1. Returns the raw records of every type that fetched cleanly.
    async fn fetch_phase<'a>(
        &self,
        descriptors: &[&'a FetchDescriptor],
        graph: &mut Graph,
        errors: &ErrorCollector,
    ) -> Vec<(&'a FetchDescriptor, Vec<RawRecord>)> {
        let region = self.region.as_str();
        let fetch_futures = descriptors.iter().map(|&descriptor| async move {
            (descriptor, descriptor.fetch_all(region).await)
        });

        let mut fetches = stream::iter(fetch_futures)
            .buffer_unordered(self.config.concurrency_for(descriptors.len()));
        let mut fetched = Vec::with_capacity(descriptors.len());

        while let Some((descriptor, fetch)) = fetches.next().await {
            let TypeFetch {
                graph: sub_graph,
                records,
                error,
            } = fetch;
            let resource_type = descriptor.resource_type();

            // Partial results are kept even when the fetch failed
            let merged = match graph.merge(sub_graph) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to merge {}: {}", resource_type, e);
                    errors.add(e);
                    false
                }
            };

            match error {
                None if merged => {
                    debug!("Merged {} {} record(s)", records.len(), resource_type);
                    fetched.push((descriptor, records));
                }
                None => {}
                Some(e) if e.is_access_denied_failure() => {
                    warn!("Access denied while fetching {}", resource_type);
                    errors.add(SyncError::access_denied(resource_type));
                }
                Some(e) => {
                    warn!("Failed to fetch {}: {}", resource_type, e);
                    errors.add(e);
                }
            }
        }

        fetched
    }

    /// Phase 2. Resolves against the complete phase-1 graph, then inserts.
    async fn relation_phase(
        &self,
        fetched: &[(&FetchDescriptor, Vec<RawRecord>)],
        graph: &mut Graph,
        errors: &ErrorCollector,
    ) {
        let linked: Vec<_> = fetched
            .iter()
            .filter(|(descriptor, _)| descriptor.has_relations())
            .collect();
        if linked.is_empty() {
            return;
        }

        let relations = {
            let snapshot: &Graph = graph;
            let mut resolutions = stream::iter(
                linked
                    .iter()
                    .map(|(descriptor, records)| descriptor.resolve_relations(snapshot, records)),
            )
            .buffer_unordered(self.config.concurrency_for(linked.len()));

            let mut relations = Vec::new();
            while let Some((resolved, error)) = resolutions.next().await {
                relations.extend(resolved);
                if let Some(e) = error {
                    warn!("Failed to resolve relations: {}", e);
                    errors.add(e);
                }
            }
            relations
        };

        debug!("Inserting {} resolved relation(s)", relations.len());
        for relation in relations {
            if let Err(e) = graph.add_relation(relation) {
                errors.add(e);
            }
        }
    }

    /// Fetches a single resource type, without relations or error
    /// classification.
    ///
    /// The returned graph holds only resources of that type.
    ///
    /// # Errors
    /// Returns an unsupported-type error if the type is not declared.
    pub async fn fetch_by_type(&self, resource_type: &str) -> Result<FetchOutcome> {
        let descriptor =
            self.descriptors
                .get(resource_type)
                .ok_or_else(|| SyncError::UnsupportedType {
                    service: self.name.clone(),
                    resource_type: resource_type.to_string(),
                })?;

        let fetch = descriptor.fetch_all(&self.region).await;
        Ok(FetchOutcome {
            graph: fetch.graph,
            error: fetch.error,
        })
    }
}
