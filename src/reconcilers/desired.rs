//! Desired child objects derived from their parent
//!
//! Pure functions: same parent in, same child out. Every child carries a controller
//! owner reference back to the parent it was built from.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::crd::App;

/// Port exposed by generated services and targeted by generated ingresses
pub const HTTP_PORT: i32 = 80;

/// Host used for ingresses generated from an annotated Service
pub const DEFAULT_INGRESS_HOST: &str = "example.com";

const PATH_TYPE_PREFIX: &str = "Prefix";

fn owner_references<K: Resource<DynamicType = ()>>(owner: &K) -> Option<Vec<OwnerReference>> {
    owner.controller_owner_ref(&()).map(|owner_ref| vec![owner_ref])
}

fn child_meta<K: Resource<DynamicType = ()>>(owner: &K, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: owner.meta().namespace.clone(),
        owner_references: owner_references(owner),
        ..Default::default()
    }
}

fn labels(app_label: &str, owner_name: String) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), app_label.to_string()),
        ("controller".to_string(), owner_name),
    ])
}

/// Deployment running the App's image
pub fn new_deployment(app: &App) -> Deployment {
    let spec = &app.spec.deployment;
    let labels = labels("app", app.name_any());

    Deployment {
        metadata: child_meta(app, &spec.name),
        spec: Some(DeploymentSpec {
            replicas: spec.replicas,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: spec.name.clone(),
                        image: Some(spec.image.clone()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service exposing port 80 of the App's pods
pub fn new_service(app: &App) -> Service {
    Service {
        metadata: child_meta(app, &app.spec.service.name),
        spec: Some(ServiceSpec {
            selector: Some(labels("app-deployment", app.name_any())),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".to_string()),
                port: HTTP_PORT,
                target_port: Some(IntOrString::Int(HTTP_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ingress routing the App's hostname to its service
pub fn new_ingress(app: &App) -> Ingress {
    Ingress {
        metadata: child_meta(app, &app.spec.ingress.name),
        spec: Some(single_rule_spec(
            &app.spec.ingress.hostname,
            &app.spec.service.name,
        )),
        ..Default::default()
    }
}

/// Ingress generated for an annotated Service, named after and owned by it
pub fn default_ingress(service: &Service) -> Ingress {
    Ingress {
        metadata: child_meta(service, &service.name_any()),
        spec: Some(single_rule_spec(DEFAULT_INGRESS_HOST, &service.name_any())),
        ..Default::default()
    }
}

fn single_rule_spec(host: &str, service_name: &str) -> IngressSpec {
    IngressSpec {
        rules: Some(vec![IngressRule {
            host: Some(host.to_string()),
            http: Some(HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    path: Some("/".to_string()),
                    path_type: PATH_TYPE_PREFIX.to_string(),
                    backend: IngressBackend {
                        service: Some(IngressServiceBackend {
                            name: service_name.to_string(),
                            port: Some(ServiceBackendPort {
                                number: Some(HTTP_PORT),
                                ..Default::default()
                            }),
                        }),
                        ..Default::default()
                    },
                }],
            }),
        }]),
        ..Default::default()
    }
}
