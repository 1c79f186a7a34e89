//! Wire-level tests for the orchestrator and DNS API clients.

use std::collections::BTreeMap;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleet_discovery::dns::{DnsProvider, HttpDnsProvider};
use fleet_discovery::provider::{CloudProvider, HttpCloudProvider, ServiceSpec};

#[tokio::test]
async fn test_task_listing_follows_continuation_tokens() {
    let server = MockServer::start().await;

    // Mounted first so the token-bearing request matches it before the
    // catch-all below.
    Mock::given(method("GET"))
        .and(path("/v1/clusters/default/tasks"))
        .and(query_param("page_token", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_ids": ["t-3"],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/clusters/default/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_ids": ["t-1", "t-2"],
            "next_token": "2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpCloudProvider::new(server.uri(), "default").unwrap();

    let first = provider.list_task_ids(None).await.unwrap();
    assert_eq!(first.items, vec!["t-1", "t-2"]);
    assert_eq!(first.next_token.as_deref(), Some("2"));

    let second = provider.list_task_ids(first.next_token).await.unwrap();
    assert_eq!(second.items, vec!["t-3"]);
    assert!(second.next_token.is_none());
}

#[tokio::test]
async fn test_describe_tasks_carries_partial_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters/default/tasks:describe"))
        .and(body_partial_json(json!({"ids": ["t-1", "t-2"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "task_id": "t-1",
                "group": "service:scorer",
                "container_instance_id": "ci-1",
                "containers": [{"name": "app", "ports": []}],
            }],
            "failures": [{"id": "t-2", "reason": "MISSING"}],
        })))
        .mount(&server)
        .await;

    let provider = HttpCloudProvider::new(server.uri(), "default").unwrap();
    let batch = provider
        .describe_tasks(&["t-1".to_string(), "t-2".to_string()])
        .await
        .unwrap();

    assert_eq!(batch.items.len(), 1);
    assert_eq!(batch.items[0].task_id, "t-1");
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].reason, "MISSING");

    // Partial failures harden into an error when items are consumed.
    assert!(batch.into_items("task").is_err());
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/default/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("orchestrator on fire"))
        .mount(&server)
        .await;

    let provider = HttpCloudProvider::new(server.uri(), "default").unwrap();
    let err = provider.list_task_ids(None).await.unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_create_service_posts_spec_and_decodes_description() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters/default/services"))
        .and(body_partial_json(json!({
            "name": "ranker",
            "task_definition": "ranker:3",
            "desired_count": 1,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provider_id": "svc/ranker",
            "name": "ranker",
            "status": "ACTIVE",
            "task_definition": "ranker:3",
            "tags": {"fleet.service.id": "7"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpCloudProvider::new(server.uri(), "default").unwrap();
    let created = provider
        .create_service(&ServiceSpec {
            name: "ranker".to_string(),
            task_definition: "ranker:3".to_string(),
            desired_count: 1,
            tags: BTreeMap::new(),
            placement_constraint: None,
        })
        .await
        .unwrap();

    assert_eq!(created.provider_id, "svc/ranker");
    assert_eq!(created.status, "ACTIVE");
}

#[tokio::test]
async fn test_scale_service_posts_desired_count() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters/default/services/svc-1:scale"))
        .and(body_partial_json(json!({"desired_count": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpCloudProvider::new(server.uri(), "default").unwrap();
    provider.scale_service("svc-1", 0).await.unwrap();
}

#[tokio::test]
async fn test_dns_zone_lookup_filters_by_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/zones"))
        .and(query_param("name", "fleet.local"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "zones": [
                {"id": "z-1", "name": "fleet.local"},
                {"id": "z-2", "name": "fleet.local.hosted"},
            ],
        })))
        .mount(&server)
        .await;

    let dns = HttpDnsProvider::new(server.uri()).unwrap();
    let zone = dns.find_zone("fleet.local").await.unwrap().unwrap();
    assert_eq!(zone.id, "z-1");
}

#[tokio::test]
async fn test_dns_batch_apply_posts_changes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/zones/z-1/records:batch"))
        .and(body_partial_json(json!({
            "changes": [{
                "action": "CREATE",
                "record": {
                    "name": "manager.fleet.local",
                    "record_type": "A",
                    "value": "10.0.0.1",
                    "ttl": 0,
                },
            }],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dns = HttpDnsProvider::new(server.uri()).unwrap();
    dns.apply_changes(
        "z-1",
        vec![fleet_discovery::dns::Change {
            action: fleet_discovery::dns::ChangeAction::Create,
            record: fleet_discovery::dns::RecordSet {
                name: "manager.fleet.local".to_string(),
                record_type: "A".to_string(),
                value: "10.0.0.1".to_string(),
                set_identifier: "sid-1".to_string(),
                ttl: 0,
            },
        }],
    )
    .await
    .unwrap();
}
