//! Object store abstraction used by the reconcilers
//!
//! Reconcilers only ever talk to the cluster through [`ObjectStore`], so the
//! same code runs against the API server ([`KubeStore`]) and against the
//! in-memory fake used in tests ([`InMemoryStore`]).

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::{Failure, InMemoryStore, WriteRecord, WriteVerb};

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

/// A namespaced Kubernetes object the operator reads or writes
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Kind name of an object type, e.g. `Deployment`
pub fn kind_of<K: Object>() -> String {
    K::kind(&()).to_string()
}

/// Read/write access to objects keyed by (kind, namespace, name)
///
/// Writes are optimistic: `replace` and `replace_status` carry the object's
/// resourceVersion and fail with [`crate::Error::Conflict`] if it is stale.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; a missing object is `Ok(None)`
    async fn get<K: Object>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// Create an object and return it as stored
    async fn create<K: Object>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Replace an object's metadata and spec; status is left untouched
    async fn replace<K: Object>(&self, namespace: &str, name: &str, obj: &K) -> Result<K>;

    /// Replace only an object's status
    async fn replace_status<K: Object>(&self, namespace: &str, name: &str, obj: &K)
        -> Result<K>;

    /// List all objects of a kind in a namespace
    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>>;
}
