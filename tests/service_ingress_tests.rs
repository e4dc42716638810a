//! Service ingress reconciler tests

mod common;

use app_controller::reconcilers::desired::{DEFAULT_INGRESS_HOST, HTTP_PORT};
use app_controller::reconcilers::service_ingress::{sync, INGRESS_ANNOTATION};

use common::*;

#[tokio::test]
async fn creates_ingress_for_annotated_service() {
    let mut fx = ServiceFixture::new();
    apply(&mut fx.services, service("svc1", &[(INGRESS_ANNOTATION, "true")]));

    sync(&fx.ctx, "ns/svc1").await.unwrap();

    let calls = fx.client.calls();
    assert_eq!(calls.len(), 1);
    let Call::CreateIngress(ingress) = &calls[0] else {
        panic!("unexpected call {:?}", calls[0]);
    };
    assert_eq!(ingress.metadata.name.as_deref(), Some("svc1"));
    assert_eq!(ingress.metadata.namespace.as_deref(), Some(NAMESPACE));

    let owners = ingress.metadata.owner_references.as_ref().unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].kind, "Service");
    assert_eq!(owners[0].name, "svc1");
    assert_eq!(owners[0].controller, Some(true));

    let rule = &ingress.spec.as_ref().unwrap().rules.as_ref().unwrap()[0];
    assert_eq!(rule.host.as_deref(), Some(DEFAULT_INGRESS_HOST));
    let path = &rule.http.as_ref().unwrap().paths[0];
    assert_eq!(path.path.as_deref(), Some("/"));
    let backend = path.backend.service.as_ref().unwrap();
    assert_eq!(backend.name, "svc1");
    assert_eq!(
        backend.port.as_ref().and_then(|p| p.number),
        Some(HTTP_PORT)
    );
}

#[tokio::test]
async fn annotated_service_with_ingress_needs_nothing() {
    let mut fx = ServiceFixture::new();
    apply(&mut fx.services, service("svc1", &[(INGRESS_ANNOTATION, "")]));
    apply(
        &mut fx.ingresses,
        ingress("svc1", vec![controller_ref("Service", "svc1", "uid-svc1")]),
    );

    sync(&fx.ctx, "ns/svc1").await.unwrap();

    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn unannotated_service_leaves_existing_ingress_in_place() {
    let mut fx = ServiceFixture::new();
    apply(&mut fx.services, service("svc1", &[]));
    apply(
        &mut fx.ingresses,
        ingress("svc1", vec![controller_ref("Service", "svc1", "uid-svc1")]),
    );

    sync(&fx.ctx, "ns/svc1").await.unwrap();

    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn unrelated_annotations_do_not_request_an_ingress() {
    let mut fx = ServiceFixture::new();
    apply(&mut fx.services, service("svc1", &[("ingress/https", "true")]));

    sync(&fx.ctx, "ns/svc1").await.unwrap();

    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn missing_service_is_not_an_error() {
    let fx = ServiceFixture::new();

    sync(&fx.ctx, "ns/gone").await.unwrap();
    sync(&fx.ctx, "/").await.unwrap();

    assert!(fx.client.calls().is_empty());
}

#[tokio::test]
async fn create_failure_is_returned_for_retry() {
    let mut fx = ServiceFixture::new();
    apply(&mut fx.services, service("svc1", &[(INGRESS_ANNOTATION, "true")]));
    fx.client.fail_with(503, "ServiceUnavailable");

    assert!(sync(&fx.ctx, "ns/svc1").await.is_err());
}

#[tokio::test]
async fn lost_create_race_is_returned_for_retry() {
    let mut fx = ServiceFixture::new();
    apply(&mut fx.services, service("svc1", &[(INGRESS_ANNOTATION, "true")]));
    fx.client.fail_with(409, "AlreadyExists");

    let err = sync(&fx.ctx, "ns/svc1").await.unwrap_err();
    assert!(err.is_already_exists());

    // Once the cache shows the ingress the retry has nothing left to do
    apply(
        &mut fx.ingresses,
        ingress("svc1", vec![controller_ref("Service", "svc1", "uid-svc1")]),
    );
    sync(&fx.ctx, "ns/svc1").await.unwrap();
    assert_eq!(fx.client.calls().len(), 1);
}
