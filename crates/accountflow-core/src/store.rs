//! Resource store seam
//!
//! The reconcilers read and write resources only through [`ResourceStore`].
//! Metadata (labels, finalizers) and spec go through `update`; status goes
//! through `update_status`, so a pass can never clobber one with a stale
//! copy of the other.

use crate::error::{CoreError, Result};
use crate::model::{Account, FederatedAccess, FederatedRole, ObjectMeta, ResourceKey};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    type Status: Clone + Send + Sync;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn status(&self) -> &Self::Status;

    fn status_mut(&mut self) -> &mut Self::Status;

    fn key(&self) -> ResourceKey {
        self.metadata().key()
    }
}

macro_rules! impl_resource {
    ($ty:ty, $kind:literal, $status:ty) => {
        impl Resource for $ty {
            const KIND: &'static str = $kind;

            type Status = $status;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }

            fn status(&self) -> &Self::Status {
                &self.status
            }

            fn status_mut(&mut self) -> &mut Self::Status {
                &mut self.status
            }
        }
    };
}

impl_resource!(Account, "Account", crate::model::AccountStatus);
impl_resource!(FederatedRole, "AWSFederatedRole", crate::model::FederatedRoleStatus);
impl_resource!(
    FederatedAccess,
    "AWSFederatedAccountAccess",
    crate::model::FederatedAccessStatus
);

#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// `None` when the resource does not exist (or was fully deleted)
    async fn get(&self, key: &ResourceKey) -> Result<Option<R>>;

    /// Persist metadata and spec; the stored status is kept.
    async fn update(&self, resource: &R) -> Result<R>;

    /// Persist status only.
    async fn update_status(&self, resource: &R) -> Result<R>;
}

/// In-process store with the deletion semantics of a declarative API server:
/// deleting a resource that still carries finalizers only marks it, and it
/// disappears once an update removes the last finalizer.
#[derive(Debug)]
pub struct MemoryStore<R> {
    objects: Mutex<BTreeMap<ResourceKey, R>>,
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<ResourceKey, R>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create or overwrite a resource, status included
    pub fn insert(&self, resource: R) {
        self.objects().insert(resource.key(), resource);
    }

    /// Current copy of a resource without going through the async API
    pub fn peek(&self, key: &ResourceKey) -> Option<R> {
        self.objects().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    /// Request deletion. Returns `true` when the resource is gone right away,
    /// `false` when it was only marked because finalizers remain.
    pub fn delete(&self, key: &ResourceKey) -> Result<bool> {
        let mut objects = self.objects();
        let resource = objects.get_mut(key).ok_or_else(|| CoreError::NotFound {
            kind: R::KIND,
            key: key.to_string(),
        })?;
        if resource.metadata().finalizers.is_empty() {
            objects.remove(key);
            return Ok(true);
        }
        let meta = resource.metadata_mut();
        if meta.deletion_timestamp.is_none() {
            meta.deletion_timestamp = Some(Utc::now());
        }
        Ok(false)
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for MemoryStore<R> {
    async fn get(&self, key: &ResourceKey) -> Result<Option<R>> {
        Ok(self.peek(key))
    }

    async fn update(&self, resource: &R) -> Result<R> {
        let key = resource.key();
        let mut objects = self.objects();
        let stored = objects.get(&key).ok_or_else(|| CoreError::NotFound {
            kind: R::KIND,
            key: key.to_string(),
        })?;

        let mut updated = resource.clone();
        *updated.status_mut() = stored.status().clone();
        // the deletion marker is owned by the store
        updated.metadata_mut().deletion_timestamp = stored.metadata().deletion_timestamp;

        if updated.metadata().is_being_deleted() && updated.metadata().finalizers.is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(&self, resource: &R) -> Result<R> {
        let key = resource.key();
        let mut objects = self.objects();
        let stored = objects.get_mut(&key).ok_or_else(|| CoreError::NotFound {
            kind: R::KIND,
            key: key.to_string(),
        })?;
        *stored.status_mut() = resource.status().clone();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountState;

    #[tokio::test]
    async fn test_update_keeps_stored_status() {
        let store = MemoryStore::new();
        let mut account = Account::new("ns", "a");
        account.status.state = Some(AccountState::Ready);
        store.insert(account.clone());

        account.status.state = Some(AccountState::Failed);
        account.metadata.set_label("uid", "abc123");
        let updated = store.update(&account).await.unwrap();

        assert_eq!(updated.status.state, Some(AccountState::Ready));
        assert_eq!(updated.metadata.label("uid"), Some("abc123"));
    }

    #[tokio::test]
    async fn test_update_status_keeps_stored_metadata() {
        let store = MemoryStore::new();
        let mut account = Account::new("ns", "a");
        store.insert(account.clone());

        account.metadata.add_finalizer("x");
        account.status.claimed = true;
        let updated = store.update_status(&account).await.unwrap();

        assert!(updated.status.claimed);
        assert!(updated.metadata.finalizers.is_empty());
    }

    #[tokio::test]
    async fn test_delete_waits_for_finalizers() {
        let store = MemoryStore::new();
        let mut account = Account::new("ns", "a");
        account.metadata.add_finalizer("x");
        store.insert(account.clone());
        let key = account.metadata.key();

        assert!(!store.delete(&key).unwrap());
        let mut marked = store.get(&key).await.unwrap().unwrap();
        assert!(marked.metadata.is_being_deleted());

        marked.metadata.remove_finalizer("x");
        store.update(&marked).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_without_finalizers_is_immediate() {
        let store: MemoryStore<Account> = MemoryStore::new();
        store.insert(Account::new("ns", "a"));
        assert!(store.delete(&ResourceKey::new("ns", "a")).unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_resource_is_not_found() {
        let store: MemoryStore<Account> = MemoryStore::new();
        let result = store.update(&Account::new("ns", "ghost")).await;
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }
}
