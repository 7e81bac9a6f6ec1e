//! Reactor and client facade against real sockets.

mod common;

use std::sync::mpsc;
use std::time::Duration;

use bytes::Bytes;
use common::{MockControlPlane, Reply};
use lambda_bootstrap::client::HttpClient;
use lambda_bootstrap::config::ClientSettings;
use lambda_bootstrap::http::error::ClientError;
use lambda_bootstrap::http::request::{Body, Request};
use lambda_bootstrap::http::response::Event;

fn client() -> HttpClient {
    HttpClient::new(ClientSettings::default()).unwrap()
}

fn recorder() -> (impl FnMut(Event) + 'static, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    (move |event: Event| tx.send(event).unwrap(), rx)
}

fn body_of(events: &[Event]) -> Vec<u8> {
    let mut body = Vec::new();
    for event in events {
        if let Event::BodyChunk(chunk) = event {
            body.extend_from_slice(chunk);
        }
    }
    body
}

/// Port with nothing listening on it.
fn closed_port_url() -> url::Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    url::Url::parse(&format!("http://{addr}/nothing")).unwrap()
}

#[test]
fn test_wait_all_without_exchanges_returns() {
    let mut client = client();

    client.wait_all().unwrap();
    assert_eq!(client.in_flight(), 0);
}

#[test]
fn test_get_streams_header_then_body() {
    let server = MockControlPlane::with_replies(vec![Reply::chunked(
        vec![
            b"HTTP/1.1 200 OK\r\nX-Request".to_vec(),
            b"-Id: r1\r\n\r\nfirst ".to_vec(),
            b"second".to_vec(),
        ],
        Duration::from_millis(20),
    )]);
    let mut client = client();
    let (handler, rx) = recorder();

    client.get(server.url("/path"), handler).unwrap();
    assert_eq!(client.in_flight(), 1);
    client.wait_all().unwrap();
    assert_eq!(client.in_flight(), 0);

    let events: Vec<Event> = rx.try_iter().collect();
    match &events[0] {
        Event::HeaderReceived(head) => {
            assert_eq!(head.status, 200);
            assert_eq!(head.headers.first("x-request-id"), Some("r1"));
        }
        other => panic!("expected header first, got {other:?}"),
    }
    assert_eq!(body_of(&events), b"first second");
    assert!(matches!(events.last(), Some(Event::Completed)));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/path");
    assert_eq!(requests[0].header("connection"), Some("close"));
    assert_eq!(requests[0].header("host"), Some(server.runtime_api().as_str()));
    assert_eq!(requests[0].header("content-length"), None);
}

#[test]
fn test_large_post_body_arrives_intact() {
    let server = MockControlPlane::with_replies(vec![Reply::accepted()]);
    let mut client = client();
    let (handler, rx) = recorder();

    let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    client
        .post(server.url("/upload"), Body::Binary(Bytes::from(payload.clone())), handler)
        .unwrap();
    client.wait_all().unwrap();

    let events: Vec<Event> = rx.try_iter().collect();
    assert!(matches!(&events[0], Event::HeaderReceived(h) if h.status == 202));
    assert!(matches!(events.last(), Some(Event::Completed)));

    let requests = server.requests();
    assert_eq!(requests[0].header("content-length"), Some(payload.len().to_string().as_str()));
    assert_eq!(requests[0].body.len(), payload.len());
    assert!(requests[0].body == payload);
}

#[test]
fn test_connect_failure_is_isolated() {
    let server = MockControlPlane::with_replies(vec![Reply::raw("HTTP/1.1 200 OK\r\n\r\nok")]);
    let mut client = client();
    let (bad_handler, bad_rx) = recorder();
    let (good_handler, good_rx) = recorder();

    // A refused connect may be reported by `get` directly or as an event.
    let submitted = client.get(closed_port_url(), bad_handler);
    client.get(server.url("/ok"), good_handler).unwrap();
    client.wait_all().unwrap();

    let bad: Vec<Event> = bad_rx.try_iter().collect();
    match submitted {
        Ok(_) => assert!(matches!(&bad[..], [Event::Failed(e)] if e.is_transport())),
        Err(e) => {
            assert!(matches!(e, ClientError::Transport(_)));
            assert!(bad.is_empty());
        }
    }

    let good: Vec<Event> = good_rx.try_iter().collect();
    assert!(matches!(&good[0], Event::HeaderReceived(h) if h.status == 200));
    assert_eq!(body_of(&good), b"ok");
    assert!(matches!(good.last(), Some(Event::Completed)));
}

#[test]
fn test_malformed_response_is_isolated() {
    let malformed =
        MockControlPlane::with_replies(vec![Reply::raw("HTTP/1.1 2x0 OK\r\n\r\nignored")]);
    let healthy = MockControlPlane::with_replies(vec![Reply::chunked(
        vec![b"HTTP/1.0 200 OK\r\n\r\n".to_vec(), b"still here".to_vec()],
        Duration::from_millis(20),
    )]);
    let mut client = client();
    let (bad_handler, bad_rx) = recorder();
    let (good_handler, good_rx) = recorder();

    client.get(malformed.url("/"), bad_handler).unwrap();
    client.get(healthy.url("/"), good_handler).unwrap();
    assert_eq!(client.in_flight(), 2);
    client.wait_all().unwrap();

    let bad: Vec<Event> = bad_rx.try_iter().collect();
    assert!(matches!(&bad[..], [Event::Failed(e)] if e.is_protocol()));

    let good: Vec<Event> = good_rx.try_iter().collect();
    assert_eq!(body_of(&good), b"still here");
    assert!(matches!(good.last(), Some(Event::Completed)));
}

#[test]
fn test_reset_mid_body_is_isolated() {
    let broken = MockControlPlane::with_replies(vec![Reply::reset_after(
        "HTTP/1.1 200 OK\r\n\r\npar",
        Duration::from_millis(50),
    )]);
    let healthy = MockControlPlane::with_replies(vec![Reply::chunked(
        vec![
            b"HTTP/1.1 200 OK\r\n\r\n".to_vec(),
            b"al".to_vec(),
            b"ive".to_vec(),
        ],
        Duration::from_millis(40),
    )]);
    let mut client = client();
    let (bad_handler, bad_rx) = recorder();
    let (good_handler, good_rx) = recorder();

    client.get(broken.url("/"), bad_handler).unwrap();
    client.get(healthy.url("/"), good_handler).unwrap();
    client.wait_all().unwrap();

    let bad: Vec<Event> = bad_rx.try_iter().collect();
    assert!(matches!(&bad[0], Event::HeaderReceived(h) if h.status == 200));
    assert!(matches!(bad.last(), Some(Event::Failed(e)) if e.is_transport()));
    assert_eq!(
        bad.iter().filter(|e| matches!(e, Event::Failed(_))).count(),
        1
    );

    let good: Vec<Event> = good_rx.try_iter().collect();
    assert!(matches!(&good[0], Event::HeaderReceived(h) if h.status == 200));
    assert_eq!(body_of(&good), b"alive");
    assert!(matches!(good.last(), Some(Event::Completed)));
}

#[test]
fn test_peer_close_without_response_fails_exchange() {
    let server = MockControlPlane::with_replies(vec![Reply::raw("")]);
    let mut client = client();
    let (handler, rx) = recorder();

    client.get(server.url("/"), handler).unwrap();
    client.wait_all().unwrap();

    let events: Vec<Event> = rx.try_iter().collect();
    assert!(matches!(&events[..], [Event::Failed(e)] if e.is_protocol()));
}

#[test]
fn test_many_concurrent_exchanges_complete() {
    let replies = (0..8)
        .map(|i| Reply::raw(format!("HTTP/1.1 200 OK\r\n\r\nreply-{i}")))
        .collect();
    let server = MockControlPlane::with_replies(replies);
    let mut client = client();

    let receivers: Vec<_> = (0..8)
        .map(|i| {
            let (handler, rx) = recorder();
            client.get(server.url(&format!("/{i}")), handler).unwrap();
            rx
        })
        .collect();
    assert_eq!(client.in_flight(), 8);
    client.wait_all().unwrap();

    let mut bodies: Vec<String> = receivers
        .iter()
        .map(|rx| {
            let events: Vec<Event> = rx.try_iter().collect();
            assert!(matches!(events.last(), Some(Event::Completed)));
            String::from_utf8(body_of(&events)).unwrap()
        })
        .collect();
    bodies.sort();
    let mut expected: Vec<String> = (0..8).map(|i| format!("reply-{i}")).collect();
    expected.sort();
    assert_eq!(bodies, expected);
}

#[test]
fn test_exchange_collects_response() {
    let server = MockControlPlane::with_replies(vec![Reply::raw(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\ncollected",
    )]);
    let mut client = client();

    let exchange = client
        .exchange(Request::get(server.url("/c")).unwrap())
        .unwrap();
    client.wait_all().unwrap();
    let collected = exchange.collect();

    assert!(collected.error.is_none());
    assert_eq!(collected.head.unwrap().headers.first("content-type"), Some("text/plain"));
    assert_eq!(&collected.body[..], b"collected");
}

#[test]
fn test_collect_before_wait_reports_unfinished() {
    let server = MockControlPlane::with_replies(vec![Reply::accepted()]);
    let mut client = client();

    let exchange = client
        .exchange(Request::get(server.url("/early")).unwrap())
        .unwrap();
    let collected = exchange.collect();

    assert!(collected.head.is_none());
    assert!(matches!(collected.error, Some(ClientError::Transport(_))));
    client.wait_all().unwrap();
}
