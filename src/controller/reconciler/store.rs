//! # Cluster State Store
//!
//! Narrow view of the cluster the reconciliation engine works through. Lookups
//! are three-way: the object exists, it does not, or the read failed. The engine
//! never confuses a failed read with an absent object.

use crate::constants::CONTROLLER_NAME;
use crate::crd::{Export, Route};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Errors raised by a state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("failed to encode object: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} has no name")]
    MissingName { kind: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<K> {
    Found(K),
    Absent,
}

/// Deletion propagation requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Dependents (the job's pods) are collected in the background
    Background,
    /// Platform default
    Default,
}

impl Propagation {
    fn params(self) -> DeleteParams {
        match self {
            Propagation::Background => DeleteParams::background(),
            Propagation::Default => DeleteParams::default(),
        }
    }
}

/// A kind the store knows how to address
pub trait ManagedObject:
    Resource<DynamicType = ()> + Clone + fmt::Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
    const CLUSTER_SCOPED: bool;

    /// API handle for the kind; the namespace is ignored for cluster-scoped kinds
    fn api(client: Client, namespace: &str) -> Api<Self>;
}

macro_rules! namespaced_objects {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl ManagedObject for $kind {
                const CLUSTER_SCOPED: bool = false;

                fn api(client: Client, namespace: &str) -> Api<Self> {
                    Api::namespaced(client, namespace)
                }
            }
        )+
    };
}

macro_rules! cluster_objects {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl ManagedObject for $kind {
                const CLUSTER_SCOPED: bool = true;

                fn api(client: Client, _namespace: &str) -> Api<Self> {
                    Api::all(client)
                }
            }
        )+
    };
}

namespaced_objects!(
    Export,
    Job,
    ServiceAccount,
    Secret,
    Route,
    NetworkPolicy,
    PersistentVolumeClaim,
    Service,
    Deployment,
);

cluster_objects!(ClusterRole, ClusterRoleBinding);

/// Cluster operations the reconciliation engine depends on
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read one object
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str)
        -> Result<Lookup<K>, StoreError>;

    /// Create one object; fails if it already exists
    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<(), StoreError>;

    /// Delete one object; an object that is already gone is not an error
    async fn delete<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        propagation: Propagation,
    ) -> Result<(), StoreError>;

    /// Write the export's status subresource
    async fn persist_status(&self, export: &Export) -> Result<(), StoreError>;
}

/// State store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StateStore for KubeStore {
    async fn get<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Lookup<K>, StoreError> {
        let api = K::api(self.client.clone(), namespace);
        Ok(match api.get_opt(name).await? {
            Some(object) => Lookup::Found(object),
            None => Lookup::Absent,
        })
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<(), StoreError> {
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| StoreError::MissingName {
                kind: K::kind(&()).to_string(),
            })?;
        let api = K::api(self.client.clone(), namespace);
        match api.create(&PostParams::default(), object).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => Err(StoreError::AlreadyExists {
                kind: K::kind(&()).to_string(),
                name,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        propagation: Propagation,
    ) -> Result<(), StoreError> {
        let api = K::api(self.client.clone(), namespace);
        match api.delete(name, &propagation.params()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist_status(&self, export: &Export) -> Result<(), StoreError> {
        let namespace = export.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<Export> = Api::namespaced(self.client.clone(), &namespace);
        let patch = json!({ "status": export.status });
        api.patch_status(
            &export.name_any(),
            &PatchParams::apply(CONTROLLER_NAME),
            &Patch::Merge(patch),
        )
        .await?;
        Ok(())
    }
}
