//! End-to-end over TCP.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use uuid::Uuid;

use order_observability::config::ServiceConfig;
use order_observability::http::HttpServer;
use order_observability::lifecycle::startup::build_state;
use order_observability::lifecycle::Shutdown;
use order_observability::observability::{InstrumentRegistry, MemoryBackend};

#[tokio::test]
async fn test_serves_orders_and_shuts_down() {
    let backend = Arc::new(MemoryBackend::new());
    let registry = Arc::new(InstrumentRegistry::new("e2e.ecommerce", backend.clone()).unwrap());
    let config = ServiceConfig::default();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, build_state(registry));
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/api/orders"))
        .header("x-correlation-id", "e2e-1")
        .header("x-forwarded-for", "203.0.113.9")
        .json(&serde_json::json!({ "user_id": Uuid::new_v4(), "total_amount": 150.0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        "e2e-1"
    );
    assert!(response.headers().get("location").is_some());
    assert_eq!(
        backend.counter_u64("events.created.count", &[("status", "completed")]),
        1
    );

    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert!(health.headers().get("x-correlation-id").is_some());

    drop((response, health, client));
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
