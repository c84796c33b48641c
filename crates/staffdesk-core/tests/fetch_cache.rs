mod common;

use common::{context, valid_token};
use mockito::Server;
use staffdesk_core::auth::{TokenBackend, ACCESS_TOKEN_KEY};
use staffdesk_core::models::{EmployeeFilter, EmployeeStatus};
use staffdesk_core::CacheEvent;

const EMPLOYEES: &str = r#"[{"id": 1, "name": "Grace", "email": "grace@example.com",
    "designation": "Engineer", "employee_status": "hired", "hired_on": "2024-03-01"}]"#;

#[tokio::test]
async fn test_concurrent_reads_hit_the_network_once() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/employees/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(EMPLOYEES)
        .expect(1)
        .create_async()
        .await;

    let (ctx, backend) = context(&server.url());
    backend.set(ACCESS_TOKEN_KEY, &valid_token()).unwrap();

    let filter = EmployeeFilter::default();
    let (a, b, c) = tokio::join!(
        ctx.employees(&filter),
        ctx.employees(&filter),
        ctx.employees(&filter)
    );

    m.assert_async().await;
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(a[0].employee_status, EmployeeStatus::Hired);
}

#[tokio::test]
async fn test_reconnect_refreshes_watched_list() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/employees/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(EMPLOYEES)
        .expect(2)
        .create_async()
        .await;

    let (ctx, backend) = context(&server.url());
    backend.set(ACCESS_TOKEN_KEY, &valid_token()).unwrap();

    let mut sub = ctx.watch_employees(&EmployeeFilter::default());
    assert!(sub.settled().await);
    assert_eq!(sub.data().map(|list| list.len()), Some(1));

    assert_eq!(ctx.cache().handle_event(CacheEvent::Reconnected), 1);
    assert!(sub.settled().await);
    assert_eq!(ctx.cache().handle_event(CacheEvent::Focused), 0);

    m.assert_async().await;
}
