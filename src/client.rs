//! Mutating client for child resources
//!
//! All writes to the live system go through [`ResourceClient`]; cached objects are
//! never edited in place.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crd::App;
use crate::error::Result;

/// Typed create/update calls against the live system
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment>;

    /// Full replace of an existing Deployment
    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment>;

    async fn create_service(&self, service: &Service) -> Result<Service>;

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress>;

    /// Replace the status subresource of an App
    async fn update_app_status(&self, app: &App) -> Result<App>;
}

/// [`ResourceClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
    post_params: PostParams,
}

impl KubeResourceClient {
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            post_params: PostParams {
                field_manager: Some(field_manager.to_string()),
                ..Default::default()
            },
        }
    }

    fn api<K>(&self, obj: &K) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
    {
        let namespace = obj.meta().namespace.as_deref().unwrap_or("default");
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn create<K>(&self, obj: &K) -> Result<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        Ok(self.api(obj).create(&self.post_params, obj).await?)
    }

    async fn replace<K>(&self, obj: &K) -> Result<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        Ok(self
            .api(obj)
            .replace(&obj.name_any(), &self.post_params, obj)
            .await?)
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        self.create(deployment).await
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        self.replace(deployment).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.create(service).await
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress> {
        self.create(ingress).await
    }

    async fn update_app_status(&self, app: &App) -> Result<App> {
        let data = serde_json::to_vec(app)?;
        Ok(self
            .api(app)
            .replace_status(&app.name_any(), &self.post_params, data)
            .await?)
    }
}
