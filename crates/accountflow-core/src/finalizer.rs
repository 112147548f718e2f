//! Finalizer protocol
//!
//! A resource gets the marker on its first observation and nothing else
//! happens in that pass, so the marker is always persisted before any
//! external object exists. On deletion the marker is removed only after the
//! caller's teardown succeeded.

use crate::error::Result;
use crate::store::{Resource, ResourceStore};

pub const FINALIZER: &str = "finalizer.accountflow.chronista.club";

/// What the finalizer protocol requires of the current pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerStep {
    /// New resource: persist the marker and end the pass
    AddMarker,
    /// Deletion requested: tear down, then remove the marker
    Teardown,
    /// Deletion requested and nothing of ours is left to clean
    Released,
    /// Normal reconciliation
    Proceed,
}

pub fn next_step<R: Resource>(resource: &R) -> FinalizerStep {
    let meta = resource.metadata();
    match (meta.is_being_deleted(), meta.has_finalizer(FINALIZER)) {
        (true, true) => FinalizerStep::Teardown,
        (true, false) => FinalizerStep::Released,
        (false, false) => FinalizerStep::AddMarker,
        (false, true) => FinalizerStep::Proceed,
    }
}

pub async fn add_marker<R: Resource>(store: &dyn ResourceStore<R>, resource: &R) -> Result<R> {
    let mut updated = resource.clone();
    updated.metadata_mut().add_finalizer(FINALIZER);
    tracing::debug!("Adding finalizer to {} {}", R::KIND, resource.key());
    store.update(&updated).await
}

pub async fn remove_marker<R: Resource>(store: &dyn ResourceStore<R>, resource: &R) -> Result<()> {
    let mut updated = resource.clone();
    updated.metadata_mut().remove_finalizer(FINALIZER);
    tracing::debug!("Removing finalizer from {} {}", R::KIND, resource.key());
    store.update(&updated).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Account;
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[test]
    fn test_next_step() {
        let mut account = Account::new("ns", "a");
        assert_eq!(next_step(&account), FinalizerStep::AddMarker);

        account.metadata.add_finalizer(FINALIZER);
        assert_eq!(next_step(&account), FinalizerStep::Proceed);

        account.metadata.deletion_timestamp = Some(Utc::now());
        assert_eq!(next_step(&account), FinalizerStep::Teardown);

        account.metadata.remove_finalizer(FINALIZER);
        assert_eq!(next_step(&account), FinalizerStep::Released);
    }

    #[tokio::test]
    async fn test_marker_round_trip_through_store() {
        let store = MemoryStore::new();
        let account = Account::new("ns", "a");
        store.insert(account.clone());

        let marked = add_marker(&store, &account).await.unwrap();
        assert!(marked.metadata.has_finalizer(FINALIZER));

        remove_marker(&store, &marked).await.unwrap();
        let stored = store.peek(&account.metadata.key()).unwrap();
        assert!(stored.metadata.finalizers.is_empty());
    }
}
