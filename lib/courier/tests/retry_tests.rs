//! Retry loop tests, against wiremock and against a scripted transport.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use courier::middleware::ConstantBackoff;
use courier::{Body, Client, Error, Method, OutboundRequest, Response, Result, Transport};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Replays canned outcomes and records every request it sees.
#[derive(Clone, Default)]
struct Scripted {
    replies: Arc<Mutex<VecDeque<Result<(u16, &'static str)>>>>,
    seen: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl Scripted {
    fn new(replies: impl IntoIterator<Item = Result<(u16, &'static str)>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            seen: Arc::default(),
        }
    }

    fn seen(&self) -> Vec<OutboundRequest> {
        self.seen.lock().expect("lock").clone()
    }
}

impl Transport for Scripted {
    async fn execute(&self, request: OutboundRequest) -> Result<Response> {
        self.seen.lock().expect("lock").push(request);
        let next = self.replies.lock().expect("lock").pop_front();
        match next {
            Some(Ok((status, body))) => Ok(Response::from_parts(status, HashMap::new(), Body::from(body))),
            Some(Err(error)) => Err(error),
            None => Err(Error::connection("script exhausted")),
        }
    }
}

fn scripted_client(transport: &Scripted, max_attempts: u32) -> courier::ClientBuilder {
    Client::builder("https://api.example.com/v2")
        .expect("valid URL")
        .transport(transport.clone())
        .max_attempts(max_attempts)
        .backoff(ConstantBackoff(Duration::ZERO))
}

#[tokio::test]
async fn test_429_then_200_runs_hooks_once_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/teams"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/teams"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let second = Arc::clone(&order);

    let client = Client::builder(&mock_server.uri())
        .expect("valid URL")
        .backoff(ConstantBackoff(Duration::ZERO))
        .on_retry(move |request| {
            first.lock().expect("lock").push("refresh-token");
            request.set_header("Authorization", "Bearer fresh");
            Ok(())
        })
        .on_retry(move |_| {
            second.lock().expect("lock").push("count");
            Ok(())
        })
        .build();

    let mut response = client
        .new_request()
        .join_base_url("teams")
        .set_bearer_auth("stale")
        .send()
        .await
        .expect("response");

    check!(response.status_code() == 200);
    check!(response.text().await.expect("body") == "[]");
    check!(*order.lock().expect("lock") == vec!["refresh-token", "count"]);

    let requests = mock_server.received_requests().await.expect("recording enabled");
    check!(requests.len() == 2);
    check!(requests[0].headers["authorization"] == "Bearer stale");
    check!(requests[1].headers["authorization"] == "Bearer fresh");
}

#[tokio::test]
async fn test_persistent_503_gives_up() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let hook_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hook_runs);

    let client = Client::builder(&mock_server.uri())
        .expect("valid URL")
        .max_attempts(4)
        .backoff(ConstantBackoff(Duration::ZERO))
        .on_retry(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();

    let result = client.new_request().method(Method::Put).send().await;

    let_assert!(Err(error) = result);
    insta::assert_snapshot!(error.to_string(), @"PUT request giving up after 4 attempt(s)");
    let_assert!(
        Error::RetriesExhausted {
            attempts: 4,
            last_status: Some(503),
            ..
        } = error
    );
    check!(hook_runs.load(Ordering::SeqCst) == 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let transport = Scripted::new([Ok((404, "gone")), Ok((200, "unused"))]);
    let client = scripted_client(&transport, 5).build();

    let response = client.new_request().send().await.expect("response");

    check!(response.status_code() == 404);
    check!(response.error_body() == Some("gone"));
    check!(transport.seen().len() == 1);
}

#[tokio::test]
async fn test_501_is_not_retried() {
    let transport = Scripted::new([Ok((501, "not implemented"))]);
    let client = scripted_client(&transport, 5).build();

    let response = client.new_request().send().await.expect("response");

    check!(response.status_code() == 501);
    check!(transport.seen().len() == 1);
}

#[tokio::test]
async fn test_connection_error_is_retried() {
    let transport = Scripted::new([
        Err(Error::connection("connection reset by peer")),
        Ok((500, "oops")),
        Ok((201, "")),
    ]);
    let client = scripted_client(&transport, 5).build();

    let response = client
        .new_request()
        .method(Method::Post)
        .set_body(&serde_json::json!({"message": "disk full"}))
        .send()
        .await
        .expect("response");

    check!(response.status_code() == 201);

    let seen = transport.seen();
    check!(seen.len() == 3);
    check!(seen.iter().all(|request| request.method() == Method::Post));
    check!(
        seen.iter()
            .all(|request| request.body().map(|body| body.as_ref()) == Some(br#"{"message":"disk full"}"#.as_slice()))
    );
}

#[tokio::test]
async fn test_exhaustion_on_transport_errors() {
    let transport = Scripted::new([
        Err(Error::connection("refused")),
        Err(Error::connection("refused")),
    ]);
    let client = scripted_client(&transport, 2).build();

    let result = client.new_request().send().await;

    let_assert!(
        Err(Error::RetriesExhausted {
            method: Method::Get,
            attempts: 2,
            last_status: None,
            last_error: Some(last_error),
        }) = result
    );
    check!(last_error.contains("refused"));
}

#[tokio::test]
async fn test_single_attempt_budget() {
    let transport = Scripted::new([Ok((429, ""))]);
    let client = scripted_client(&transport, 1).build();

    let_assert!(Err(error) = client.new_request().send().await);
    insta::assert_snapshot!(error.to_string(), @"GET request giving up after 1 attempt(s)");
    check!(transport.seen().len() == 1);
}

#[tokio::test]
async fn test_failing_hook_stops_the_loop() {
    let transport = Scripted::new([Ok((503, "")), Ok((200, ""))]);
    let client = scripted_client(&transport, 5)
        .on_retry(|_| Err(Error::hook("token endpoint unreachable")))
        .build();

    let result = client.new_request().send().await;

    let_assert!(Err(Error::Hook(message)) = result);
    check!(message == "token endpoint unreachable");
    check!(transport.seen().len() == 1);
}

#[tokio::test]
async fn test_custom_predicate_replaces_default() {
    let transport = Scripted::new([Ok((409, "conflict")), Ok((503, "down"))]);
    let client = scripted_client(&transport, 5)
        .retry_if(|result| matches!(result, Ok(response) if response.status() == Some(409)))
        .build();

    let response = client.new_request().send().await.expect("response");

    check!(response.status_code() == 503);
    check!(response.error_body() == Some("down"));
    check!(transport.seen().len() == 2);
}

#[tokio::test]
async fn test_attempt_state_is_per_request() {
    let transport = Scripted::new([
        Ok((503, "")),
        Ok((200, "")),
        Ok((503, "")),
        Ok((200, "")),
    ]);
    let client = scripted_client(&transport, 2).build();

    check!(client.new_request().send().await.expect("first").status_code() == 200);
    check!(client.new_request().send().await.expect("second").status_code() == 200);
    check!(transport.seen().len() == 4);
}

#[tokio::test]
async fn test_send_until_cancels() {
    let transport = Scripted::new([Ok((503, "")), Ok((200, ""))]);
    let client = scripted_client(&transport, 5)
        .backoff(ConstantBackoff(Duration::from_secs(3600)))
        .build();

    let result = client
        .new_request()
        .send_until(tokio::time::sleep(Duration::from_millis(20)))
        .await;

    let_assert!(Err(Error::Cancelled) = result);
    check!(transport.seen().len() == 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(8)
        .mount(&mock_server)
        .await;

    let client = Client::new(&mock_server.uri()).expect("valid URL");
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .new_request()
                    .join_base_url(&format!("items/{i}"))
                    .send()
                    .await
                    .map(|response| response.status_code())
            })
        })
        .collect();

    for task in tasks {
        check!(task.await.expect("join").expect("response") == 200);
    }
}
