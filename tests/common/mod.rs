//! Shared fixtures for the integration tests: real reflector stores fed by hand,
//! a client that records every mutating call, and a publisher that records notices.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use app_controller::client::ResourceClient;
use app_controller::crd::{App, AppSpec, DeploymentSpec, IngressSpec, ServiceSpec};
use app_controller::events::EventPublisher;
use app_controller::reconcilers::app::AppContext;
use app_controller::reconcilers::service_ingress::ServiceIngressContext;
use app_controller::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ObjectReference, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::core::ErrorResponse;
use kube::runtime::events::EventType;
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::watcher;
use kube::Resource;

pub const NAMESPACE: &str = "ns";

// ============================================================================
// Recording client
// ============================================================================

#[derive(Clone, Debug)]
pub enum Call {
    CreateDeployment(Deployment),
    UpdateDeployment(Deployment),
    CreateService(Service),
    CreateIngress(Ingress),
    UpdateAppStatus(App),
}

/// Records every call; fails all calls with the configured API error when set
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<(u16, &'static str)>>,
}

impl RecordingClient {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_with(&self, code: u16, reason: &'static str) {
        *self.failure.lock().unwrap() = Some((code, reason));
    }

    fn record<K: Clone>(&self, call: Call, obj: &K) -> Result<K> {
        self.calls.lock().unwrap().push(call);
        match *self.failure.lock().unwrap() {
            Some((code, reason)) => Err(api_error(code, reason)),
            None => Ok(obj.clone()),
        }
    }
}

#[async_trait]
impl ResourceClient for RecordingClient {
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        self.record(Call::CreateDeployment(deployment.clone()), deployment)
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        self.record(Call::UpdateDeployment(deployment.clone()), deployment)
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.record(Call::CreateService(service.clone()), service)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Ingress> {
        self.record(Call::CreateIngress(ingress.clone()), ingress)
    }

    async fn update_app_status(&self, app: &App) -> Result<App> {
        self.record(Call::UpdateAppStatus(app.clone()), app)
    }
}

pub fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {reason}"),
        reason: reason.to_string(),
        code,
    }))
}

// ============================================================================
// Recording event publisher
// ============================================================================

#[derive(Clone, Debug)]
pub struct Notice {
    pub object: Option<String>,
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Default)]
pub struct RecordingPublisher {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingPublisher {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.reason).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.notices.lock().unwrap().push(Notice {
            object: resource_ref.name.clone(),
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}

// ============================================================================
// Cache fixtures
// ============================================================================

pub fn apply<K>(writer: &mut Writer<K>, obj: K)
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + std::hash::Hash + Clone,
{
    writer.apply_watcher_event(&watcher::Event::Apply(obj));
}

/// App controller context over hand-fed caches
pub struct AppFixture {
    pub ctx: AppContext,
    pub apps: Writer<App>,
    pub deployments: Writer<Deployment>,
    pub services: Writer<Service>,
    pub ingresses: Writer<Ingress>,
    pub client: Arc<RecordingClient>,
    pub events: Arc<RecordingPublisher>,
}

impl AppFixture {
    pub fn new() -> Self {
        let (apps_reader, apps) = reflector::store();
        let (deployments_reader, deployments) = reflector::store();
        let (services_reader, services) = reflector::store();
        let (ingresses_reader, ingresses) = reflector::store();
        let client = Arc::new(RecordingClient::default());
        let events = Arc::new(RecordingPublisher::default());

        let ctx = AppContext {
            apps: apps_reader,
            deployments: deployments_reader,
            services: services_reader,
            ingresses: ingresses_reader,
            client: client.clone(),
            events: events.clone(),
            update_status: false,
        };

        Self {
            ctx,
            apps,
            deployments,
            services,
            ingresses,
            client,
            events,
        }
    }

    /// Feed every object the client was asked to create back into the caches,
    /// as the watches would after a successful create.
    pub fn observe_created(&mut self) {
        for call in self.client.calls() {
            match call {
                Call::CreateDeployment(d) | Call::UpdateDeployment(d) => {
                    apply(&mut self.deployments, d)
                }
                Call::CreateService(s) => apply(&mut self.services, s),
                Call::CreateIngress(i) => apply(&mut self.ingresses, i),
                Call::UpdateAppStatus(a) => apply(&mut self.apps, a),
            }
        }
    }
}

/// Service ingress controller context over hand-fed caches
pub struct ServiceFixture {
    pub ctx: ServiceIngressContext,
    pub services: Writer<Service>,
    pub ingresses: Writer<Ingress>,
    pub client: Arc<RecordingClient>,
}

impl ServiceFixture {
    pub fn new() -> Self {
        let (services_reader, services) = reflector::store();
        let (ingresses_reader, ingresses) = reflector::store();
        let client = Arc::new(RecordingClient::default());

        Self {
            ctx: ServiceIngressContext {
                services: services_reader,
                ingresses: ingresses_reader,
                client: client.clone(),
            },
            services,
            ingresses,
            client,
        }
    }
}

// ============================================================================
// Object builders
// ============================================================================

pub fn app_with_spec(name: &str, spec: AppSpec) -> App {
    let mut app = App::new(name, spec);
    app.metadata.namespace = Some(NAMESPACE.to_string());
    app.metadata.uid = Some(format!("uid-{name}"));
    app.metadata.resource_version = Some("1".to_string());
    app
}

pub fn deployment_only_app(name: &str, replicas: i32) -> App {
    app_with_spec(
        name,
        AppSpec {
            deployment: DeploymentSpec {
                name: format!("{name}-dep"),
                image: "nginx".to_string(),
                replicas: Some(replicas),
            },
            ..Default::default()
        },
    )
}

pub fn full_app(name: &str) -> App {
    app_with_spec(
        name,
        AppSpec {
            deployment: DeploymentSpec {
                name: format!("{name}-dep"),
                image: "nginx".to_string(),
                replicas: Some(2),
            },
            service: ServiceSpec {
                name: format!("{name}-svc"),
            },
            ingress: IngressSpec {
                name: format!("{name}-ing"),
                hostname: format!("{name}.example.org"),
            },
        },
    )
}

pub fn controller_ref(kind: &str, name: &str, uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: "v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

pub fn meta(name: &str, owners: Vec<OwnerReference>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        owner_references: Some(owners).filter(|o| !o.is_empty()),
        resource_version: Some("1".to_string()),
        ..Default::default()
    }
}

pub fn service(name: &str, annotations: &[(&str, &str)]) -> Service {
    let mut metadata = meta(name, vec![]);
    metadata.uid = Some(format!("uid-{name}"));
    if !annotations.is_empty() {
        metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
    }
    Service {
        metadata,
        ..Default::default()
    }
}

pub fn ingress(name: &str, owners: Vec<OwnerReference>) -> Ingress {
    Ingress {
        metadata: meta(name, owners),
        ..Default::default()
    }
}

pub fn replicas_of(deployment: &Deployment) -> Option<i32> {
    deployment.spec.as_ref().and_then(|s| s.replicas)
}
