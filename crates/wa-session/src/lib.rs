//! Chat session provider contract and HTTP bridge implementation.

mod client;
mod error;
mod provider;
mod receiver;
mod types;

pub use client::BridgeClient;
pub use error::SessionError;
pub use provider::{BridgeProvider, EventStream, ProviderSession, SessionHandle, SessionProvider};
pub use receiver::{EventReceiver, ERROR_BACKOFF, MAX_POLL_FAILURES};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tokio_stream::StreamExt;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_test_client(mock_server: &MockServer) -> BridgeClient {
        BridgeClient::new(mock_server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_open_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .and(body_json(serde_json::json!({"auth_dir": "./auth"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"session_id": "s-1"})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let session_id = assert_ok!(client.open_session("./auth").await);
        assert_eq!(session_id, "s-1");
    }

    #[tokio::test]
    async fn test_open_session_refused() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("transport offline"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let result = client.open_session("./auth").await;
        assert!(matches!(result, Err(SessionError::Api(_))));
    }

    #[tokio::test]
    async fn test_poll_events_session_gone() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-1/events"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let result = client.poll_events("s-1").await;
        assert!(matches!(result, Err(SessionError::SessionGone(_))));
    }

    #[tokio::test]
    async fn test_send_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/messages"))
            .and(body_json(serde_json::json!({
                "jid": "5511988887777@s.whatsapp.net",
                "text": "hello"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"message_id": "3EB0"})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let id = client
            .send_text("s-1", "5511988887777@s.whatsapp.net", "hello")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("3EB0"));
    }

    #[tokio::test]
    async fn test_send_text_without_message_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let id = client.send_text("s-1", "x@s.whatsapp.net", "hi").await.unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn test_send_text_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("not on whatsapp"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let err = assert_err!(client.send_text("s-1", "x@s.whatsapp.net", "hi").await);
        assert!(matches!(err, SessionError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_provider_streams_events_until_close() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"session_id": "s-1"})),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-1/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"type": "qr", "qr": "2@abc"},
                {"type": "connection", "connection": "close", "status_code": 428}
            ])))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/credentials"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = BridgeProvider::new(
            create_test_client(&mock_server).await,
            Duration::from_millis(10),
        );
        let session = provider.connect(Path::new("./auth")).await.unwrap();

        session
            .handle
            .save_credentials(serde_json::json!({"noiseKey": "k"}))
            .await
            .unwrap();

        let events: Vec<SessionEvent> = session.events.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SessionEvent::PairingChallenge("2@abc".into()));
        assert!(matches!(
            &events[1],
            SessionEvent::Connection(ConnectionUpdate::Closed(CloseReason::Dropped {
                status_code: Some(428),
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_receiver_reports_gone_session_as_drop() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-9/events"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let receiver = EventReceiver::new(
            create_test_client(&mock_server).await,
            "s-9".into(),
            Duration::from_millis(10),
        );
        let events: Vec<SessionEvent> = Box::pin(receiver.stream()).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Connection(ConnectionUpdate::Closed(reason)) => {
                assert!(!reason.is_logout())
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receiver_drops_session_after_repeated_poll_failures() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-2/events"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bridge restarting"))
            .expect(MAX_POLL_FAILURES as u64)
            .mount(&mock_server)
            .await;

        let receiver = EventReceiver::new(
            create_test_client(&mock_server).await,
            "s-2".into(),
            Duration::from_millis(10),
        )
        .with_error_backoff(Duration::from_millis(5));
        let events: Vec<SessionEvent> = Box::pin(receiver.stream()).collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SessionEvent::Connection(ConnectionUpdate::Closed(CloseReason::Dropped {
                status_code: None,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_receiver_failure_count_resets_on_success() {
        let mock_server = MockServer::start().await;

        // Just under the limit twice over, separated by one good poll.
        let failing = || {
            Mock::given(method("GET"))
                .and(path("/v1/sessions/s-3/events"))
                .respond_with(ResponseTemplate::new(500))
                .up_to_n_times(MAX_POLL_FAILURES as u64 - 1)
        };
        failing().mount(&mock_server).await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-3/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        failing().mount(&mock_server).await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-3/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"type": "connection", "connection": "open"},
                {"type": "connection", "connection": "close", "status_code": 401}
            ])))
            .mount(&mock_server)
            .await;

        let receiver = EventReceiver::new(
            create_test_client(&mock_server).await,
            "s-3".into(),
            Duration::from_millis(5),
        )
        .with_error_backoff(Duration::from_millis(5));
        let events: Vec<SessionEvent> = Box::pin(receiver.stream()).collect().await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Connection(ConnectionUpdate::Open),
                SessionEvent::Connection(ConnectionUpdate::Closed(CloseReason::LoggedOut)),
            ]
        );
    }
}
