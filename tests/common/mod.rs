#![allow(dead_code)]

use guestlist_sync::domain::entities::Guest;
use guestlist_sync::domain::value_objects::{GuestId, TableNumber};
use reqwest::Url;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration as StdDuration;
use tiny_http::{Header, Response, Server};

#[derive(Debug)]
pub struct MockHttpResponse {
    pub status: u16,
    pub body: Value,
}

impl MockHttpResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub params: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

/// Serves `responses` in order, one per request, and reports every request received.
pub fn spawn_json_sequence_server(
    responses: Vec<MockHttpResponse>,
) -> (String, Receiver<CapturedRequest>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("mock server");
    let base_url = format!("http://{}", server.server_addr());
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        for mock_response in responses {
            let mut request = match server.recv_timeout(StdDuration::from_secs(5)) {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(_) => break,
            };

            let parsed =
                Url::parse(&format!("http://localhost{}", request.url())).expect("request url");
            let params = parsed
                .query_pairs()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<HashMap<String, String>>();
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            let mut raw = String::new();
            let _ = request.as_reader().read_to_string(&mut raw);
            let body = serde_json::from_str::<Value>(&raw).ok();

            let _ = tx.send(CapturedRequest {
                method: request.method().to_string(),
                path: parsed.path().to_string(),
                params,
                authorization,
                body,
            });

            let mut response = Response::from_string(mock_response.body.to_string());
            response.add_header(
                Header::from_bytes("Content-Type", "application/json")
                    .expect("content-type header"),
            );
            response = response.with_status_code(mock_response.status);
            let _ = request.respond(response);
        }
    });

    (base_url, rx, handle)
}

pub fn join_with_timeout(handle: thread::JoinHandle<()>, timeout: StdDuration) {
    let start = std::time::Instant::now();
    while !handle.is_finished() {
        assert!(
            start.elapsed() < timeout,
            "mock server join timed out after {:?}",
            timeout
        );
        thread::sleep(StdDuration::from_millis(10));
    }
    handle.join().expect("mock server thread panicked");
}

/// Base URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("ephemeral port addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn guest(id: &str, name: &str, table: u32, present: bool) -> Guest {
    Guest::new(
        GuestId::parse(id).unwrap(),
        name,
        TableNumber::new(table).unwrap(),
    )
    .unwrap()
    .with_present(present)
}
