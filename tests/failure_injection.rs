//! Failure injection tests for the balancer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use route_balancer::load_balancer::SelectionMethod;

mod common;

#[tokio::test]
async fn test_upstream_error_status_is_relayed_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let backend_addr = common::start_programmable_backend(move |_| {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (503, "upstream busy".to_string())
        }
    })
    .await;

    let config = common::test_config(vec![common::router(
        &["/"],
        SelectionMethod::RoundRobin,
        vec![common::backend(backend_addr, 10)],
    )]);
    let balancer = common::start_balancer(config).await;
    let client = common::client();

    for expected_calls in 1..=2 {
        let res = client.get(balancer.url("/work")).send().await.expect("balancer unreachable");
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.text().await.unwrap(), "upstream busy");
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls, "a 5xx answer is not retried");
    }

    let backend = &balancer.routes.all_backends()[0];
    assert!(backend.is_alive());
    assert_eq!(common::wait_until_idle(backend).await, 0);
}

#[tokio::test]
async fn test_unreachable_backend_exhausts_retries_and_is_marked_dead() {
    let dead_addr = common::unused_addr().await;

    let mut config = common::test_config(vec![common::router(
        &["/"],
        SelectionMethod::RoundRobin,
        vec![common::backend(dead_addr, 10)],
    )]);
    config.retries.max_attempts = 3;
    config.timeouts.connect_secs = 1;
    let balancer = common::start_balancer(config).await;
    let client = common::client();

    let start = Instant::now();
    let res = client.get(balancer.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(start.elapsed() >= Duration::from_millis(30), "three retries 10ms apart");

    let backend = &balancer.routes.all_backends()[0];
    assert!(!backend.is_alive());
    assert_eq!(backend.in_use_count(), 0);

    // Dead and no probe running: the router has nothing to offer.
    let res = client.get(balancer.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_pool_limit_rejects_excess_requests() {
    let backend_addr = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(400)).await;
        (200, "slow".to_string())
    })
    .await;

    let config = common::test_config(vec![common::router(
        &["/"],
        SelectionMethod::RoundRobin,
        vec![common::backend(backend_addr, 1)],
    )]);
    let balancer = common::start_balancer(config).await;
    let client = common::client();

    let first = {
        let client = client.clone();
        let url = balancer.url("/a");
        tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = client.get(balancer.url("/b")).send().await.unwrap().status();

    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(first.await.unwrap(), StatusCode::OK);

    let backend = &balancer.routes.all_backends()[0];
    assert_eq!(backend.pool_size(), 1);
    assert_eq!(common::wait_until_idle(backend).await, 0);
    assert!(backend.is_alive(), "saturation does not affect liveness");
}

#[tokio::test]
async fn test_health_check_eviction_and_revival() {
    let b1_addr = common::start_mock_backend("b1").await;
    let b2_addr = common::unused_addr().await;

    let mut config = common::test_config(vec![common::router(
        &["/"],
        SelectionMethod::RoundRobin,
        vec![common::backend(b1_addr, 10), common::backend(b2_addr, 10)],
    )]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    let balancer = common::start_balancer(config).await;
    let client = common::client();

    // The first probe round runs immediately and evicts the unreachable backend.
    tokio::time::sleep(Duration::from_millis(300)).await;
    for _ in 0..4 {
        let res = client.get(balancer.url("/")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "b1");
    }

    // Bring b2 up on its address; the next round revives it.
    common::start_programmable_backend_on(b2_addr, |_| async { (200, "b2".to_string()) }).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let mut bodies = Vec::new();
    for _ in 0..4 {
        let res = client.get(balancer.url("/")).send().await.unwrap();
        bodies.push(res.text().await.unwrap());
    }
    assert!(bodies.iter().any(|b| b == "b2"), "revived backend serves again: {:?}", bodies);
}

#[tokio::test]
async fn test_graceful_shutdown_stops_accepting() {
    let backend_addr = common::start_mock_backend("ok").await;
    let config = common::test_config(vec![common::router(
        &["/"],
        SelectionMethod::Random,
        vec![common::backend(backend_addr, 10)],
    )]);
    let balancer = common::start_balancer(config).await;
    let client = common::client();

    assert_eq!(client.get(balancer.url("/")).send().await.unwrap().status(), StatusCode::OK);

    balancer.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.get(balancer.url("/")).send().await.is_err());
}
