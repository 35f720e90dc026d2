//! ObjectStore backed by the Kubernetes API server

use async_trait::async_trait;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

use super::{kind_of, Object, ObjectStore};
use crate::{Error, Result};

/// Store that reads and writes through a kube [`Client`]
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    /// Create a store writing as `field_manager`
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api<K: Object>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: Object>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube(e, &kind_of::<K>(), namespace, name))
    }

    async fn create<K: Object>(&self, namespace: &str, obj: &K) -> Result<K> {
        let name = obj.meta().name.clone().unwrap_or_default();
        debug!("Creating {} {}/{}", kind_of::<K>(), namespace, name);

        self.api::<K>(namespace)
            .create(&self.post_params(), obj)
            .await
            .map_err(|e| Error::from_kube(e, &kind_of::<K>(), namespace, &name))
    }

    async fn replace<K: Object>(&self, namespace: &str, name: &str, obj: &K) -> Result<K> {
        debug!("Replacing {} {}/{}", kind_of::<K>(), namespace, name);

        self.api::<K>(namespace)
            .replace(name, &self.post_params(), obj)
            .await
            .map_err(|e| Error::from_kube(e, &kind_of::<K>(), namespace, name))
    }

    async fn replace_status<K: Object>(
        &self,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> Result<K> {
        debug!("Replacing status of {} {}/{}", kind_of::<K>(), namespace, name);

        let data = serde_json::to_vec(obj)?;
        self.api::<K>(namespace)
            .replace_status(name, &self.post_params(), data)
            .await
            .map_err(|e| Error::from_kube(e, &kind_of::<K>(), namespace, name))
    }

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>> {
        self.api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| Error::from_kube(e, &kind_of::<K>(), namespace, ""))
    }
}
