//! Generic create-or-update of one owned resource
//!
//! A [`Converger`] knows how to build the desired form of an owned object from
//! its owner, which fields of that object the operator is responsible for, and
//! how to copy those fields onto a live object. Everything else on the live
//! object (server defaults, labels added by other controllers, timestamps) is
//! never compared and never overwritten.

use std::fmt;

use kube::ResourceExt;
use tracing::{debug, info};

use crate::store::{kind_of, Object, ObjectStore};
use crate::{Error, Result};

/// What a converge step did to the live object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergeAction {
    Created,
    Updated,
    Unchanged,
}

impl ConvergeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergeAction::Created => "created",
            ConvergeAction::Updated => "updated",
            ConvergeAction::Unchanged => "unchanged",
        }
    }

    /// Whether the step wrote to the store
    pub fn wrote(&self) -> bool {
        !matches!(self, ConvergeAction::Unchanged)
    }
}

impl fmt::Display for ConvergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of converging one owned object
#[derive(Clone, Debug)]
pub struct Converged<O> {
    /// The live object after the step
    pub object: O,
    pub action: ConvergeAction,
}

/// Converges one kind of owned object `O` for owners of type `D`
pub struct Converger<D, O> {
    /// Desired object, or `None` when the owner declares no such object
    build: fn(&D) -> Option<O>,
    /// Compares only the fields the operator manages
    watched_fields_equal: fn(&O, &O) -> bool,
    /// Copies the managed fields from the desired object onto the live one
    apply: fn(&O, &mut O),
}

impl<D, O> Converger<D, O>
where
    D: Object,
    O: Object,
{
    pub const fn new(
        build: fn(&D) -> Option<O>,
        watched_fields_equal: fn(&O, &O) -> bool,
        apply: fn(&O, &mut O),
    ) -> Self {
        Self {
            build,
            watched_fields_equal,
            apply,
        }
    }

    /// Desired object stamped with a controller owner reference to `owner`
    pub fn desired(&self, owner: &D) -> Result<Option<O>> {
        let Some(mut desired) = (self.build)(owner) else {
            return Ok(None);
        };
        let owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
            Error::InvalidObject(format!(
                "{} {} has no uid to own a {}",
                kind_of::<D>(),
                owner.name_any(),
                kind_of::<O>()
            ))
        })?;
        desired.meta_mut().owner_references = Some(vec![owner_ref]);
        Ok(Some(desired))
    }

    /// Create the owned object if absent, or patch its managed fields if they drifted
    ///
    /// Returns `None` when the owner declares no such object.
    pub async fn converge<S: ObjectStore>(
        &self,
        store: &S,
        owner: &D,
    ) -> Result<Option<Converged<O>>> {
        let Some(desired) = self.desired(owner)? else {
            return Ok(None);
        };

        let kind = kind_of::<O>();
        let name = desired.name_any();
        let namespace = desired.namespace().ok_or_else(|| {
            Error::InvalidObject(format!("{} {} has no namespace", kind, name))
        })?;

        let Some(mut live) = store.get::<O>(&namespace, &name).await? else {
            let object = store.create(&namespace, &desired).await?;
            info!("Created {} {}/{}", kind, namespace, name);
            return Ok(Some(Converged {
                object,
                action: ConvergeAction::Created,
            }));
        };

        if (self.watched_fields_equal)(&desired, &live) {
            debug!("{} {}/{} is up to date", kind, namespace, name);
            return Ok(Some(Converged {
                object: live,
                action: ConvergeAction::Unchanged,
            }));
        }

        (self.apply)(&desired, &mut live);
        let object = store.replace(&namespace, &name, &live).await?;
        info!("Updated drifted {} {}/{}", kind, namespace, name);
        Ok(Some(Converged {
            object,
            action: ConvergeAction::Updated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Failure, InMemoryStore, WriteVerb};
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    // The owner is a ConfigMap too; its "want" entry is what the owned copy must carry.
    fn build(owner: &ConfigMap) -> Option<ConfigMap> {
        let want = owner.data.as_ref()?.get("want")?.clone();
        Some(ConfigMap {
            metadata: ObjectMeta {
                name: Some(format!("{}-copy", owner.name_any())),
                namespace: owner.namespace(),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("value".to_string(), want)])),
            ..Default::default()
        })
    }

    fn data_equal(desired: &ConfigMap, live: &ConfigMap) -> bool {
        desired.data == live.data
    }

    fn apply_data(desired: &ConfigMap, live: &mut ConfigMap) {
        live.data = desired.data.clone();
    }

    const COPY: Converger<ConfigMap, ConfigMap> = Converger::new(build, data_equal, apply_data);

    async fn owner(store: &InMemoryStore, want: Option<&str>) -> ConfigMap {
        let owner = ConfigMap {
            metadata: ObjectMeta {
                name: Some("owner".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            data: want.map(|w| BTreeMap::from([("want".to_string(), w.to_string())])),
            ..Default::default()
        };
        store.seed(&owner).unwrap()
    }

    fn value_of(cm: &ConfigMap) -> Option<&str> {
        cm.data.as_ref()?.get("value").map(String::as_str)
    }

    #[tokio::test]
    async fn creates_missing_object_with_owner_reference() {
        let store = InMemoryStore::new();
        let owner = owner(&store, Some("a")).await;

        let converged = COPY.converge(&store, &owner).await.unwrap().unwrap();

        assert_eq!(converged.action, ConvergeAction::Created);
        assert_eq!(value_of(&converged.object), Some("a"));
        let refs = converged.object.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(Some(refs[0].uid.clone()), owner.metadata.uid);
        assert_eq!(refs[0].controller, Some(true));
    }

    #[tokio::test]
    async fn leaves_matching_object_alone() {
        let store = InMemoryStore::new();
        let owner = owner(&store, Some("a")).await;
        COPY.converge(&store, &owner).await.unwrap();
        store.clear_writes();

        let converged = COPY.converge(&store, &owner).await.unwrap().unwrap();

        assert_eq!(converged.action, ConvergeAction::Unchanged);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn unwatched_changes_do_not_trigger_updates() {
        let store = InMemoryStore::new();
        let owner = owner(&store, Some("a")).await;
        COPY.converge(&store, &owner).await.unwrap();
        store
            .modify::<ConfigMap>("ns", "owner-copy", |cm| {
                cm.labels_mut()
                    .insert("added-by".to_string(), "someone-else".to_string());
            })
            .unwrap();
        store.clear_writes();

        let converged = COPY.converge(&store, &owner).await.unwrap().unwrap();

        assert_eq!(converged.action, ConvergeAction::Unchanged);
        assert!(store.writes().is_empty());
        assert_eq!(
            converged.object.labels().get("added-by").map(String::as_str),
            Some("someone-else")
        );
    }

    #[tokio::test]
    async fn drifted_object_is_patched_keeping_foreign_fields() {
        let store = InMemoryStore::new();
        let owner = owner(&store, Some("a")).await;
        COPY.converge(&store, &owner).await.unwrap();
        store
            .modify::<ConfigMap>("ns", "owner-copy", |cm| {
                cm.data = Some(BTreeMap::from([("value".to_string(), "b".to_string())]));
                cm.labels_mut()
                    .insert("added-by".to_string(), "someone-else".to_string());
            })
            .unwrap();
        store.clear_writes();

        let converged = COPY.converge(&store, &owner).await.unwrap().unwrap();

        assert_eq!(converged.action, ConvergeAction::Updated);
        assert_eq!(value_of(&converged.object), Some("a"));
        assert!(converged.object.labels().contains_key("added-by"));
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].verb, WriteVerb::Replace);
    }

    #[tokio::test]
    async fn nothing_declared_means_nothing_written() {
        let store = InMemoryStore::new();
        let owner = owner(&store, None).await;

        assert!(COPY.converge(&store, &owner).await.unwrap().is_none());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn owner_without_uid_is_rejected() {
        let store = InMemoryStore::new();
        let mut owner = owner(&store, Some("a")).await;
        owner.metadata.uid = None;

        let err = COPY.converge(&store, &owner).await.unwrap_err();
        assert!(matches!(err, Error::InvalidObject(_)));
    }

    #[tokio::test]
    async fn write_conflict_is_surfaced() {
        let store = InMemoryStore::new();
        let owner = owner(&store, Some("a")).await;
        store.fail_next_write::<ConfigMap>(Failure::Conflict);

        let err = COPY.converge(&store, &owner).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
