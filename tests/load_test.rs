//! Load testing for the balancer.

use std::time::{Duration, Instant};

use route_balancer::load_balancer::SelectionMethod;

mod common;

#[tokio::test]
async fn test_load_performance() {
    let a = common::start_mock_backend("Hello from a").await;
    let b = common::start_mock_backend("Hello from b").await;

    let config = common::test_config(vec![common::router(
        &["/"],
        SelectionMethod::LeastInUse,
        vec![common::backend(a, 1000), common::backend(b, 1000)],
    )]);
    let balancer = common::start_balancer(config).await;

    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = balancer.url("/");
        handles.push(tokio::spawn(async move {
            let mut ok = 0usize;
            for _ in 0..requests_per_task {
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        ok += 1;
                    }
                }
            }
            ok
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        succeeded += handle.await.unwrap();
    }
    let elapsed = start.elapsed();

    println!(
        "{} requests in {:?} ({:.0} req/s)",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64()
    );

    assert_eq!(succeeded, total_requests);
    assert!(elapsed < Duration::from_secs(30));

    for backend in balancer.routes.all_backends() {
        assert_eq!(common::wait_until_idle(&backend).await, 0, "{} leaked a slot", backend.authority());
        assert!(backend.pool_size() <= concurrency);
    }
}
