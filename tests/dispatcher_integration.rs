//! Dispatcher integration tests
//!
//! Exercise the full fan-out path with an in-process broker and webhook
//! endpoints served by wiremock.

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lora_app_notify::notification::{
    Backend, BackendError, DispatchError, EncodedNotification, EventType, FailureCause,
};
use lora_app_notify::storage::{Integration, MemoryIntegrationStore};

use common::{
    ack, create_test_environment, data_up, error, http_integration, join, CountingStore, DEV_EUI,
};

// =============================================================================
// Broker delivery
// =============================================================================

mod broker_tests {
    use super::*;

    #[tokio::test]
    async fn test_application_without_integrations_publishes_to_broker() {
        let env = create_test_environment(Arc::new(MemoryIntegrationStore::new()));

        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();

        let messages = env.publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "application/1/node/0101010101010101/rx");
    }

    #[tokio::test]
    async fn test_topics_for_every_event() {
        let env = create_test_environment(Arc::new(MemoryIntegrationStore::new()));

        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();
        env.dispatcher.send_join_notification(&join(1)).await.unwrap();
        env.dispatcher.send_ack_notification(&ack(1)).await.unwrap();
        env.dispatcher.send_error_notification(&error(1)).await.unwrap();

        let topics: Vec<String> = env.publisher.messages().into_iter().map(|m| m.topic).collect();
        assert_eq!(
            topics,
            vec![
                "application/1/node/0101010101010101/rx",
                "application/1/node/0101010101010101/join",
                "application/1/node/0101010101010101/ack",
                "application/1/node/0101010101010101/error",
            ]
        );
    }

    #[tokio::test]
    async fn test_broker_payload_shape() {
        let env = create_test_environment(Arc::new(MemoryIntegrationStore::new()));

        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();
        env.dispatcher.send_error_notification(&error(1)).await.unwrap();

        let messages = env.publisher.messages();
        let rx = messages[0].json();
        assert_eq!(rx["applicationID"], json!("1"));
        assert_eq!(rx["applicationName"], json!("test-app"));
        assert_eq!(rx["devEUI"], json!("0101010101010101"));
        assert_eq!(rx["fCnt"], json!(10));
        assert_eq!(rx["fPort"], json!(3));
        assert_eq!(rx["data"], json!("AQIDBA=="));

        let err = messages[1].json();
        assert_eq!(err["type"], json!("DATA_UP_FCNT"));
        assert!(err.get("fCnt").is_none());
    }

    #[tokio::test]
    async fn test_broker_failure_fails_send() {
        let env = create_test_environment(Arc::new(MemoryIntegrationStore::new()));
        env.publisher.set_failing(true);

        let err = env.dispatcher.send_join_notification(&join(1)).await.unwrap_err();
        match err {
            DispatchError::Delivery(failures) => assert_eq!(failures.backends(), vec!["mqtt"]),
            other => panic!("unexpected error: {}", other),
        }
    }
}

// =============================================================================
// Webhook integration
// =============================================================================

mod webhook_tests {
    use super::*;

    #[tokio::test]
    async fn test_data_up_reaches_broker_and_webhook() {
        let server = MockServer::start().await;
        let expected = serde_json::to_value(data_up(1)).unwrap();
        Mock::given(method("POST"))
            .and(path("/rx"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(http_integration(1, &server.uri()));
        let env = create_test_environment(store);

        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();

        let messages = env.publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "application/1/node/0101010101010101/rx");
        assert_eq!(messages[0].json(), expected);
    }

    #[tokio::test]
    async fn test_each_event_hits_its_own_url() {
        let server = MockServer::start().await;
        for endpoint in ["/rx", "/join", "/ack", "/error"] {
            Mock::given(method("POST"))
                .and(path(endpoint))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(http_integration(1, &server.uri()));
        let env = create_test_environment(store);

        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();
        env.dispatcher.send_join_notification(&join(1)).await.unwrap();
        env.dispatcher.send_ack_notification(&ack(1)).await.unwrap();
        env.dispatcher.send_error_notification(&error(1)).await.unwrap();

        assert_eq!(env.publisher.messages().len(), 4);
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unset_url_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(Integration::new(
            1,
            "HTTP",
            json!({"dataUpURL": format!("{}/rx", server.uri()), "joinNotificationURL": ""}),
        ));
        let env = create_test_environment(store);

        env.dispatcher.send_join_notification(&join(1)).await.unwrap();
        assert_eq!(env.publisher.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_failure_does_not_undo_broker_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ack"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(http_integration(1, &server.uri()));
        let env = create_test_environment(store);

        let err = env.dispatcher.send_ack_notification(&ack(1)).await.unwrap_err();
        let DispatchError::Delivery(failures) = err else {
            panic!("expected delivery failure");
        };
        assert_eq!(failures.backends(), vec!["http"]);
        assert!(failures.to_string().contains("returned status 500"));

        let messages = env.publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "application/1/node/0101010101010101/ack");

        let stats = env.dispatcher.stats();
        assert_eq!(stats.integration_failures, 1);
        assert_eq!(stats.broker_failures, 0);
    }

    #[tokio::test]
    async fn test_broker_and_webhook_failures_are_both_named() {
        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(http_integration(1, "http://127.0.0.1:1"));
        let env = create_test_environment(store);
        env.publisher.set_failing(true);

        let err = env.dispatcher.send_data_up(&data_up(1)).await.unwrap_err();
        let DispatchError::Delivery(failures) = err else {
            panic!("expected delivery failure");
        };
        assert_eq!(failures.backends(), vec!["mqtt", "http"]);
    }
}

// =============================================================================
// Configuration and storage failures
// =============================================================================

mod failure_isolation_tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_integration_does_not_block_others() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(Integration::new(1, "AWS_SNS", json!({})));
        store.upsert(http_integration(1, &server.uri()));
        let env = create_test_environment(store);

        let err = env.dispatcher.send_data_up(&data_up(1)).await.unwrap_err();
        let DispatchError::Delivery(failures) = err else {
            panic!("expected delivery failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures.failures()[0].backend, "AWS_SNS");
        assert!(matches!(failures.failures()[0].cause, FailureCause::Configuration(_)));
        assert_eq!(env.publisher.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_still_publishes_to_broker() {
        let store = Arc::new(CountingStore::new(vec![]));
        store.set_failing(true);
        let env = create_test_environment(store.clone());

        let err = env.dispatcher.send_data_up(&data_up(1)).await.unwrap_err();
        let DispatchError::Delivery(failures) = err else {
            panic!("expected delivery failure");
        };
        assert_eq!(failures.backends(), vec!["storage"]);
        assert!(matches!(failures.failures()[0].cause, FailureCause::Storage(_)));
        assert_eq!(env.publisher.messages().len(), 1);

        // not cached: the next send retries the lookup
        store.set_failing(false);
        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();
        assert_eq!(store.queries(), 2);
    }
}

// =============================================================================
// Registry caching
// =============================================================================

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_second_send_uses_cached_backends() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let store = Arc::new(CountingStore::new(vec![http_integration(1, &server.uri())]));
        let env = create_test_environment(store.clone());

        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();
        env.dispatcher.send_data_up(&data_up(1)).await.unwrap();

        assert_eq!(store.queries(), 1);
        assert_eq!(env.dispatcher.registry().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_applications_are_cached_independently() {
        let store = Arc::new(CountingStore::new(vec![]));
        let env = create_test_environment(store.clone());

        env.dispatcher.send_join_notification(&join(1)).await.unwrap();
        env.dispatcher.send_join_notification(&join(2)).await.unwrap();
        env.dispatcher.send_join_notification(&join(1)).await.unwrap();

        assert_eq!(store.queries(), 2);
        assert_eq!(env.dispatcher.registry().cached_applications(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_new_integration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/join"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(CountingStore::new(vec![]));
        let env = create_test_environment(store.clone());

        env.dispatcher.send_join_notification(&join(1)).await.unwrap();

        store.replace(vec![http_integration(1, &server.uri())]);
        env.dispatcher.send_join_notification(&join(1)).await.unwrap();
        assert_eq!(store.queries(), 1);

        assert!(env.dispatcher.registry().invalidate(1));
        env.dispatcher.send_join_notification(&join(1)).await.unwrap();
        assert_eq!(store.queries(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sends_share_one_lookup() {
        let store = Arc::new(CountingStore::new(vec![]));
        let env = create_test_environment(store.clone());

        let sends = (0..16).map(|_| {
            let dispatcher = env.dispatcher.clone();
            tokio::spawn(async move { dispatcher.send_data_up(&data_up(1)).await })
        });

        for handle in futures::future::join_all(sends).await {
            handle.unwrap().unwrap();
        }

        assert_eq!(store.queries(), 1);
        assert_eq!(env.publisher.messages().len(), 16);
    }
}

// =============================================================================
// Shutdown
// =============================================================================

mod close_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ack"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryIntegrationStore::new());
        store.upsert(http_integration(1, &server.uri()));
        let env = create_test_environment(store);

        env.dispatcher.send_ack_notification(&ack(1)).await.unwrap();
        let entry = env.dispatcher.registry().resolve(1).await.unwrap();
        assert_eq!(entry.backends.len(), 1);
        assert_eq!(entry.backends[0].name(), "http");

        env.dispatcher.close().await.unwrap();
        env.dispatcher.close().await.unwrap();

        assert_eq!(env.publisher.disconnects(), 1);
        assert_eq!(env.dispatcher.registry().cached_applications(), 0);

        let notification = EncodedNotification {
            application_id: 1,
            dev_eui: DEV_EUI,
            event: EventType::Ack,
            body: b"{}".to_vec(),
        };
        let result = entry.backends[0].send_ack_notification(&notification).await;
        assert!(matches!(result, Err(BackendError::Closed)));
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let env = create_test_environment(Arc::new(MemoryIntegrationStore::new()));
        env.dispatcher.close().await.unwrap();

        let result = env.dispatcher.send_data_up(&data_up(1)).await;
        assert!(matches!(result, Err(DispatchError::Closed)));
        assert!(env.publisher.messages().is_empty());
    }
}
