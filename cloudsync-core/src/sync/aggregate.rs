//! Error collection across the tasks of a synchronization pass.

use crate::error::SyncError;
use parking_lot::Mutex;

/// Append-only collector of errors, shareable between concurrent tasks.
///
/// # Example
/// ```rust
/// use cloudsync_core::error::SyncError;
/// use cloudsync_core::sync::ErrorCollector;
///
/// let errors = ErrorCollector::new();
/// assert!(!errors.has_any());
///
/// errors.add(SyncError::access_denied("instance"));
/// errors.add(SyncError::configuration("bad flag"));
///
/// let aggregated = errors.into_error().unwrap();
/// assert_eq!(aggregated.len(), 2);
/// assert_eq!(aggregated.access_denied_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<SyncError>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn add(&self, error: SyncError) {
        self.errors.lock().push(error);
    }

    /// Records an error if there is one.
    pub fn add_opt(&self, error: Option<SyncError>) {
        if let Some(error) = error {
            self.add(error);
        }
    }

    pub fn has_any(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_any()
    }

    /// Consumes the collector, returning `None` if nothing was recorded.
    pub fn into_error(self) -> Option<AggregatedError> {
        let errors = self.errors.into_inner();
        if errors.is_empty() {
            None
        } else {
            Some(AggregatedError { errors })
        }
    }
}

/// Every error recorded during one synchronization pass, in recording order.
///
/// Recording order follows task completion and is not meaningful.
#[derive(Debug)]
pub struct AggregatedError {
    errors: Vec<SyncError>,
}

impl AggregatedError {
    pub fn errors(&self) -> &[SyncError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of access-denied sentinels.
    pub fn access_denied_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_access_denied()).count()
    }

    /// Resource types reported as access-denied.
    pub fn denied_resource_types(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().filter_map(|e| match e {
            SyncError::AccessDenied { resource_type } => Some(resource_type.as_str()),
            _ => None,
        })
    }
}

impl std::fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s) occurred during sync:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n\t* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_collector_yields_no_error() {
        let errors = ErrorCollector::new();
        errors.add_opt(None);

        assert!(!errors.has_any());
        assert!(errors.is_empty());
        assert!(errors.into_error().is_none());
    }

    #[test]
    fn test_display_lists_every_error() {
        let errors = ErrorCollector::new();
        errors.add(SyncError::access_denied("instance"));
        errors.add_opt(Some(SyncError::relationship("subnet", "no region")));

        let aggregated = errors.into_error().unwrap();
        let rendered = aggregated.to_string();

        assert!(rendered.starts_with("2 error(s)"));
        assert!(rendered.contains("access denied while fetching instance"));
        assert!(rendered.contains("no region"));
        assert_eq!(aggregated.denied_resource_types().collect::<Vec<_>>(), vec!["instance"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_all_kept() {
        let errors = Arc::new(ErrorCollector::new());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let errors = Arc::clone(&errors);
                tokio::spawn(async move {
                    errors.add(SyncError::access_denied(format!("type-{}", i)));
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(errors.len(), 32);
        let aggregated = Arc::into_inner(errors).unwrap().into_error().unwrap();
        assert_eq!(aggregated.access_denied_count(), 32);
    }

    #[test]
    fn test_wraps_into_sync_error() {
        let errors = ErrorCollector::new();
        errors.add(SyncError::configuration("bad flag"));

        let error: SyncError = errors.into_error().unwrap().into();
        assert!(matches!(error, SyncError::Aggregate(_)));
        assert!(error.to_string().contains("bad flag"));
    }
}
