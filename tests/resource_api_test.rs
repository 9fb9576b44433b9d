// Integration tests for /greenhouse/* resources and /.well-known/core

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use greenhouse::api::{create_query_router, create_resource_router, QueryAppState, ResourceAppState};
use greenhouse::config::EntitiesConfig;
use greenhouse::dispatch::CommandDispatcher;
use greenhouse::driver::{Driver, DriverError, SimulatedDriver};
use greenhouse::resource::ResourceTree;
use greenhouse::scheduler::SensorPoller;
use greenhouse::state::{ChangeNotifier, SensorValue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Driver with fixed readings and a switchable actuation failure
#[derive(Default)]
struct FixedDriver {
    fail_writes: AtomicBool,
}

#[async_trait]
impl Driver for FixedDriver {
    async fn read_sensor(&self, name: &str) -> Result<SensorValue, DriverError> {
        match name {
            "temperature" => Ok(SensorValue::Number(26.3)),
            _ => Err(DriverError::UnknownEntity(name.to_string())),
        }
    }

    async fn write_actuator(&self, name: &str, _command: &str) -> Result<(), DriverError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DriverError::Io(format!("{} relay not responding", name)));
        }
        Ok(())
    }
}

fn create_tree(driver: Arc<dyn Driver>) -> Arc<ResourceTree> {
    let registry = Arc::new(
        EntitiesConfig::default()
            .build_registry(Arc::new(ChangeNotifier::new()))
            .unwrap(),
    );
    let dispatcher = Arc::new(CommandDispatcher::new(registry, driver));
    Arc::new(ResourceTree::new(dispatcher))
}

fn create_test_app(tree: Arc<ResourceTree>) -> Router {
    create_resource_router(Arc::new(ResourceAppState { tree }))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn put(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "text/plain")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn text_body(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_get_sensor_value() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app.oneshot(get("/greenhouse/sensors/light")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(text_body(response).await, "on");
}

#[tokio::test]
async fn test_get_unknown_resource() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app
        .clone()
        .oneshot(get("/greenhouse/sensors/humidity"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/greenhouse/valves/main")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_container_not_allowed() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app.oneshot(get("/greenhouse/sensors")).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_put_actuator_updates_linked_sensor() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app
        .clone()
        .oneshot(put("/greenhouse/actuators/light", "off"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/greenhouse/sensors/light")).await.unwrap();
    assert_eq!(text_body(response).await, "off");
}

#[tokio::test]
async fn test_put_sensor_not_allowed() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app
        .oneshot(put("/greenhouse/sensors/temperature", "30"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_put_unknown_actuator() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app
        .oneshot(put("/greenhouse/actuators/sprinkler", "on"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_empty_command_rejected() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app
        .oneshot(put("/greenhouse/actuators/light", "  "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_driver_failure_is_bad_gateway() {
    let driver = Arc::new(FixedDriver::default());
    driver.fail_writes.store(true, Ordering::SeqCst);
    let app = create_test_app(create_tree(driver));

    let response = app
        .clone()
        .oneshot(put("/greenhouse/actuators/light", "off"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(text_body(response).await.contains("relay not responding"));

    // State unchanged
    let response = app.oneshot(get("/greenhouse/sensors/light")).await.unwrap();
    assert_eq!(text_body(response).await, "on");
}

#[tokio::test]
async fn test_discovery_link_format() {
    let app = create_test_app(create_tree(Arc::new(SimulatedDriver::new())));

    let response = app.oneshot(get("/.well-known/core")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/link-format"
    );
    let links = text_body(response).await;
    assert!(links.contains("</greenhouse/sensors/temperature>;rt=\"sensor\";obs"));
    assert!(links.contains("</greenhouse/sensors/light>;rt=\"sensor\";obs"));
    assert!(links.contains("</greenhouse/actuators/light>;rt=\"actuator\""));
}

/// Initial value before any sample, polled value after one cycle.
#[tokio::test(start_paused = true)]
async fn test_polled_value_visible_through_resource() {
    let driver: Arc<dyn Driver> = Arc::new(FixedDriver::default());
    let tree = create_tree(Arc::clone(&driver));
    let app = create_test_app(Arc::clone(&tree));

    let response = app
        .clone()
        .oneshot(get("/greenhouse/sensors/temperature"))
        .await
        .unwrap();
    assert_eq!(text_body(response).await, "20");

    let poller = SensorPoller::new(
        "temperature",
        driver,
        Arc::clone(tree.registry()),
        greenhouse::scheduler::SampleFilter::Significance { threshold: 0.1 },
    );
    poller.scheduler.start(Duration::from_millis(1000)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let response = app
        .oneshot(get("/greenhouse/sensors/temperature"))
        .await
        .unwrap();
    assert_eq!(text_body(response).await, "26.3");

    poller.scheduler.shutdown().await;
}

#[tokio::test]
async fn test_query_api_lists_sensors() {
    let tree = create_tree(Arc::new(SimulatedDriver::new()));
    let app = create_query_router(Arc::new(QueryAppState {
        registry: Arc::clone(tree.registry()),
    }));

    let response = app
        .clone()
        .oneshot(get("/api/state/sensors"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&text_body(response).await).unwrap();
    assert_eq!(body[0]["name"], "temperature");
    assert_eq!(body[0]["current_value"], 20.0);
    assert_eq!(body[1]["current_value"], "on");

    let response = app
        .oneshot(get("/api/state/actuators/sprinkler"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
