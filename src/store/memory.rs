//! In-memory ObjectStore
//!
//! Behaves like a small API server: objects are kept as JSON documents keyed by
//! (kind, namespace, name), every write bumps a global resourceVersion, stale
//! writes are rejected as conflicts, status lives behind its own write path,
//! and removing the last finalizer of an object that is being deleted
//! deletes it together with everything it owns.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{kind_of, Object, ObjectStore};
use crate::{Error, Result};

/// Kind of write that reached the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteVerb {
    Create,
    Replace,
    ReplaceStatus,
}

/// One successful write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub verb: WriteVerb,
}

/// Failure returned by the next write of a kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    /// Another writer got there first
    Conflict,
    /// The store cannot be reached
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    kind: String,
    namespace: String,
    name: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    revision: u64,
    writes: Vec<WriteRecord>,
    failures: BTreeMap<String, Failure>,
}

/// ObjectStore holding everything in process memory
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an object as if someone else had created it; not recorded as a write
    pub fn seed<K: Object>(&self, obj: &K) -> Result<K> {
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let value = self.lock().insert(&kind_of::<K>(), &namespace, obj)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Change an object out of band (another client, the platform itself)
    ///
    /// The change may touch any field, including status. Not recorded as a write.
    pub fn modify<K: Object>(
        &self,
        namespace: &str,
        name: &str,
        change: impl FnOnce(&mut K),
    ) -> Result<K> {
        let kind = kind_of::<K>();
        let key = ObjectKey::new(&kind, namespace, name);
        let mut state = self.lock();

        let stored = state
            .objects
            .get(&key)
            .ok_or_else(|| Error::not_found(&kind, namespace, name))?;
        let mut obj: K = serde_json::from_value(stored.clone())?;
        change(&mut obj);

        let mut value = serde_json::to_value(&obj)?;
        let revision = state.next_revision();
        set_meta(&mut value, "resourceVersion", json!(revision.to_string()))?;
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Ask for an object to be deleted
    ///
    /// Objects without finalizers go away at once together with their
    /// dependents; otherwise only a deletion timestamp is set.
    pub fn request_deletion<K: Object>(&self, namespace: &str, name: &str) -> Result<()> {
        let kind = kind_of::<K>();
        let key = ObjectKey::new(&kind, namespace, name);
        let mut state = self.lock();

        let mut value = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(&kind, namespace, name))?;

        if has_finalizers(&value) {
            set_meta(&mut value, "deletionTimestamp", json!(now()))?;
            let revision = state.next_revision();
            set_meta(&mut value, "resourceVersion", json!(revision.to_string()))?;
            state.objects.insert(key, value);
        } else {
            state.remove_with_dependents(&key);
        }
        Ok(())
    }

    /// Whether an object currently exists
    pub fn contains<K: Object>(&self, namespace: &str, name: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&ObjectKey::new(&kind_of::<K>(), namespace, name))
    }

    /// Make the next write of kind `K` fail
    pub fn fail_next_write<K: Object>(&self, failure: Failure) {
        self.lock().failures.insert(kind_of::<K>(), failure);
    }

    /// Every successful write so far, oldest first
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Successful writes of kind `K`
    pub fn writes_of<K: Object>(&self) -> Vec<WriteRecord> {
        let kind = kind_of::<K>();
        self.lock()
            .writes
            .iter()
            .filter(|w| w.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }
}

impl ObjectKey {
    fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl State {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn take_failure(&mut self, key: &ObjectKey) -> Result<()> {
        match self.failures.remove(&key.kind) {
            Some(Failure::Conflict) => Err(Error::conflict(&key.kind, &key.namespace, &key.name)),
            Some(Failure::Unavailable) => Err(Error::store(format!(
                "connection refused writing {} {}/{}",
                key.kind, key.namespace, key.name
            ))),
            None => Ok(()),
        }
    }

    fn record(&mut self, key: &ObjectKey, verb: WriteVerb) {
        self.writes.push(WriteRecord {
            kind: key.kind.clone(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            verb,
        });
    }

    fn insert<K: Object>(&mut self, kind: &str, namespace: &str, obj: &K) -> Result<Value> {
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or_else(|| Error::InvalidObject(format!("{} without a name", kind)))?;
        let key = ObjectKey::new(kind, namespace, &name);
        if self.objects.contains_key(&key) {
            return Err(Error::conflict(kind, namespace, &name));
        }

        let revision = self.next_revision();
        let mut value = serde_json::to_value(obj)?;
        {
            let meta = metadata_mut(&mut value)?;
            meta.insert("namespace".to_string(), json!(namespace));
            meta.insert("uid".to_string(), json!(format!("uid-{:06}", revision)));
            meta.insert("resourceVersion".to_string(), json!(revision.to_string()));
            meta.insert("creationTimestamp".to_string(), json!(now()));
            meta.insert("generation".to_string(), json!(1));
            meta.remove("deletionTimestamp");
        }
        apply_server_defaults(kind, &mut value, revision);

        self.objects.insert(key, value.clone());
        Ok(value)
    }

    fn update(&mut self, key: &ObjectKey, incoming: Value, verb: WriteVerb) -> Result<Value> {
        let stored = self
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(&key.kind, &key.namespace, &key.name))?;

        if let Some(version) = meta_str(&incoming, "resourceVersion") {
            if Some(version) != meta_str(&stored, "resourceVersion") {
                return Err(Error::conflict(&key.kind, &key.namespace, &key.name));
            }
        }

        let mut next = match verb {
            WriteVerb::ReplaceStatus => {
                let mut next = stored.clone();
                if let (Some(obj), Some(status)) = (next.as_object_mut(), incoming.get("status")) {
                    obj.insert("status".to_string(), status.clone());
                }
                next
            }
            _ => {
                let mut next = incoming;
                if let Some(obj) = next.as_object_mut() {
                    match stored.get("status") {
                        Some(status) => obj.insert("status".to_string(), status.clone()),
                        None => obj.remove("status"),
                    };
                }
                let meta = metadata_mut(&mut next)?;
                for field in ["namespace", "uid", "creationTimestamp", "deletionTimestamp", "generation"] {
                    match stored.get("metadata").and_then(|m| m.get(field)) {
                        Some(v) => meta.insert(field.to_string(), v.clone()),
                        None => meta.remove(field),
                    };
                }
                next
            }
        };

        let revision = self.next_revision();
        set_meta(&mut next, "resourceVersion", json!(revision.to_string()))?;
        apply_server_defaults(&key.kind, &mut next, revision);

        if is_terminating(&next) && !has_finalizers(&next) {
            debug!(
                "Last finalizer removed from {} {}/{}, deleting",
                key.kind, key.namespace, key.name
            );
            self.remove_with_dependents(key);
        } else {
            self.objects.insert(key.clone(), next.clone());
        }
        Ok(next)
    }

    fn remove_with_dependents(&mut self, key: &ObjectKey) {
        let mut pending: Vec<String> = self
            .objects
            .remove(key)
            .and_then(|v| meta_str(&v, "uid").map(str::to_string))
            .into_iter()
            .collect();

        while let Some(owner_uid) = pending.pop() {
            let dependents: Vec<ObjectKey> = self
                .objects
                .iter()
                .filter(|(_, v)| is_owned_by(v, &owner_uid))
                .map(|(k, _)| k.clone())
                .collect();

            for dependent in dependents {
                if let Some(uid) = self
                    .objects
                    .remove(&dependent)
                    .and_then(|v| meta_str(&v, "uid").map(str::to_string))
                {
                    pending.push(uid);
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get<K: Object>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let key = ObjectKey::new(&kind_of::<K>(), namespace, name);
        let value = self.lock().objects.get(&key).cloned();
        value
            .map(|v| serde_json::from_value(v).map_err(Error::from))
            .transpose()
    }

    async fn create<K: Object>(&self, namespace: &str, obj: &K) -> Result<K> {
        let kind = kind_of::<K>();
        let name = obj.meta().name.clone().unwrap_or_default();
        let key = ObjectKey::new(&kind, namespace, &name);
        let mut state = self.lock();

        state.take_failure(&key)?;
        let value = state.insert(&kind, namespace, obj)?;
        state.record(&key, WriteVerb::Create);
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: Object>(&self, namespace: &str, name: &str, obj: &K) -> Result<K> {
        let key = ObjectKey::new(&kind_of::<K>(), namespace, name);
        let mut state = self.lock();

        state.take_failure(&key)?;
        let value = state.update(&key, serde_json::to_value(obj)?, WriteVerb::Replace)?;
        state.record(&key, WriteVerb::Replace);
        Ok(serde_json::from_value(value)?)
    }

    async fn replace_status<K: Object>(
        &self,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> Result<K> {
        let key = ObjectKey::new(&kind_of::<K>(), namespace, name);
        let mut state = self.lock();

        state.take_failure(&key)?;
        let value = state.update(&key, serde_json::to_value(obj)?, WriteVerb::ReplaceStatus)?;
        state.record(&key, WriteVerb::ReplaceStatus);
        Ok(serde_json::from_value(value)?)
    }

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>> {
        let kind = kind_of::<K>();
        let values: Vec<Value> = self
            .lock()
            .objects
            .iter()
            .filter(|(k, _)| k.kind == kind && k.namespace == namespace)
            .map(|(_, v)| v.clone())
            .collect();

        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Error::from))
            .collect()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn metadata_mut(value: &mut Value) -> Result<&mut Map<String, Value>> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| Error::InvalidObject("object is not a JSON map".to_string()))?;
    obj.entry("metadata")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| Error::InvalidObject("metadata is not a JSON map".to_string()))
}

fn set_meta(value: &mut Value, field: &str, v: Value) -> Result<()> {
    metadata_mut(value)?.insert(field.to_string(), v);
    Ok(())
}

fn meta_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get("metadata")?.get(field)?.as_str()
}

fn has_finalizers(value: &Value) -> bool {
    value["metadata"]["finalizers"]
        .as_array()
        .is_some_and(|f| !f.is_empty())
}

fn is_terminating(value: &Value) -> bool {
    !value["metadata"]["deletionTimestamp"].is_null()
}

fn is_owned_by(value: &Value, owner_uid: &str) -> bool {
    value["metadata"]["ownerReferences"]
        .as_array()
        .is_some_and(|refs| refs.iter().any(|r| r["uid"].as_str() == Some(owner_uid)))
}

/// Fill in fields the API server defaults or allocates
fn apply_server_defaults(kind: &str, value: &mut Value, revision: u64) {
    let Some(spec) = value.get_mut("spec").and_then(Value::as_object_mut) else {
        return;
    };

    match kind {
        "Deployment" => {
            spec.entry("revisionHistoryLimit").or_insert(json!(10));
            spec.entry("progressDeadlineSeconds").or_insert(json!(600));
            spec.entry("strategy")
                .or_insert(json!({ "type": "RollingUpdate" }));
            if let Some(pod) = spec
                .get_mut("template")
                .and_then(|t| t.get_mut("spec"))
                .and_then(Value::as_object_mut)
            {
                pod.entry("restartPolicy").or_insert(json!("Always"));
                pod.entry("dnsPolicy").or_insert(json!("ClusterFirst"));
            }
        }
        "Service" => {
            spec.entry("clusterIP")
                .or_insert(json!(format!("10.96.{}.{}", revision / 250 % 250, revision % 250 + 1)));
            spec.entry("sessionAffinity").or_insert(json!("None"));
            let exposes_node_ports = matches!(
                spec.get("type").and_then(Value::as_str),
                Some("NodePort") | Some("LoadBalancer")
            );
            if let Some(ports) = spec.get_mut("ports").and_then(Value::as_array_mut) {
                for (i, port) in ports.iter_mut().enumerate() {
                    let Some(port) = port.as_object_mut() else {
                        continue;
                    };
                    port.entry("protocol").or_insert(json!("TCP"));
                    if exposes_node_ports {
                        let allocated = 30000 + (revision + i as u64) % 2768;
                        port.entry("nodePort").or_insert(json!(allocated));
                    }
                }
            }
        }
        _ => {}
    }
}
