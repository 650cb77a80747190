//! Lookup of the service owning each resource type.

use super::{FetchOutcome, ServiceFetcher};
use crate::{Result, error::SyncError};
use futures::future;
use std::collections::BTreeMap;
use tracing::info;

/// Set of services, each owning a disjoint set of resource types.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, ServiceFetcher>,
    /// resource type -> owning service
    owners: BTreeMap<String, String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service and claims its resource types.
    ///
    /// # Errors
    /// Returns a configuration error if a service with the same name is
    /// already registered or if one of its types is owned by another service.
    pub fn register(&mut self, service: ServiceFetcher) -> Result<()> {
        if self.services.contains_key(service.name()) {
            return Err(SyncError::configuration(format!(
                "Service '{}' is already registered",
                service.name()
            )));
        }
        if let Some((resource_type, owner)) = service
            .resource_types()
            .find_map(|t| self.owners.get(t).map(|owner| (t, owner)))
        {
            return Err(SyncError::configuration(format!(
                "Resource type '{}' of service '{}' is already declared by '{}'",
                resource_type,
                service.name(),
                owner
            )));
        }

        for resource_type in service.resource_types() {
            self.owners
                .insert(resource_type.to_string(), service.name().to_string());
        }
        self.services.insert(service.name().to_string(), service);
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceFetcher> {
        self.services.get(name)
    }

    /// Service declaring `resource_type`.
    pub fn service_for_resource_type(&self, resource_type: &str) -> Option<&ServiceFetcher> {
        self.owners
            .get(resource_type)
            .and_then(|name| self.services.get(name))
    }

    /// Every registered service, by name.
    pub fn services(&self) -> impl Iterator<Item = &ServiceFetcher> {
        self.services.values()
    }

    /// Fetches one resource type through the service declaring it.
    ///
    /// # Errors
    /// Returns an unsupported-type error if no service declares the type.
    pub async fn fetch_by_type(&self, resource_type: &str) -> Result<FetchOutcome> {
        let service = self.service_for_resource_type(resource_type).ok_or_else(|| {
            SyncError::UnsupportedType {
                service: "registry".to_string(),
                resource_type: resource_type.to_string(),
            }
        })?;
        service.fetch_by_type(resource_type).await
    }

    /// Runs a full pass of every service concurrently.
    pub async fn sync_all(&self) -> BTreeMap<String, FetchOutcome> {
        info!("Syncing {} service(s)", self.services.len());

        let passes = self.services.iter().map(|(name, service)| async move {
            (name.clone(), service.fetch_resources().await)
        });
        future::join_all(passes).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::fetch::{FetchDescriptor, ListApi, Page};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct OnePage(&'static str, &'static str);

    #[async_trait]
    impl ListApi for OnePage {
        async fn list_page(&self, _cursor: Option<&str>) -> Result<Page> {
            let mut record = serde_json::Map::new();
            record.insert(self.0.to_string(), json!(self.1));
            Ok(Page::last(vec![record.into()]))
        }
    }

    fn registry(config: SyncConfig) -> ServiceRegistry {
        let config = Arc::new(config);
        let mut registry = ServiceRegistry::new();
        registry
            .register(
                ServiceFetcher::new("infra", "eu-west-1", Arc::clone(&config))
                    .with_descriptor(FetchDescriptor::new(
                        "instance",
                        "InstanceId",
                        Arc::new(OnePage("InstanceId", "i-1")),
                    ))
                    .with_descriptor(FetchDescriptor::new(
                        "subnet",
                        "SubnetId",
                        Arc::new(OnePage("SubnetId", "subnet-1")),
                    )),
            )
            .unwrap();
        registry
            .register(
                ServiceFetcher::new("access", "eu-west-1", config).with_descriptor(
                    FetchDescriptor::new("user", "UserName", Arc::new(OnePage("UserName", "alice"))),
                ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_service_for_resource_type() {
        let registry = registry(SyncConfig::new());
        assert_eq!(
            registry.service_for_resource_type("subnet").map(ServiceFetcher::name),
            Some("infra")
        );
        assert_eq!(
            registry.service_for_resource_type("user").map(ServiceFetcher::name),
            Some("access")
        );
        assert!(registry.service_for_resource_type("bucket").is_none());
        assert_eq!(registry.services().count(), 2);
    }

    #[test]
    fn test_register_rejects_conflicts() {
        let mut registry = registry(SyncConfig::new());
        let config = Arc::new(SyncConfig::new());

        let duplicate = ServiceFetcher::new("infra", "eu-west-1", Arc::clone(&config));
        assert!(registry.register(duplicate).is_err());

        let claims_subnet = ServiceFetcher::new("network", "eu-west-1", config).with_descriptor(
            FetchDescriptor::new("subnet", "SubnetId", Arc::new(OnePage("SubnetId", "s"))),
        );
        let err = registry.register(claims_subnet).unwrap_err();
        assert!(err.to_string().contains("already declared by 'infra'"));
        assert!(registry.service("network").is_none());
    }

    #[tokio::test]
    async fn test_fetch_by_type_dispatch() {
        let registry = registry(SyncConfig::new());

        let outcome = registry.fetch_by_type("user").await.unwrap();
        assert!(outcome.graph.find("user", "alice").is_some());

        let err = registry.fetch_by_type("bucket").await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn test_sync_all() {
        let registry = registry(SyncConfig::new().with_flag("access.sync", false));
        let outcomes = registry.sync_all().await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes["infra"].graph.len(), 3);
        assert!(outcomes["infra"].is_complete());
        assert!(outcomes["access"].graph.is_empty());
        assert!(outcomes["access"].is_complete());
    }
}
