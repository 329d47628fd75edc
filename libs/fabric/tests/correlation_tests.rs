use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tagline_fabric::{
    codec::RawCodec,
    error::{Error, TimeoutKind},
    transport::{InterceptedTransport, MemoryConnector, MemoryTransport, Transport},
    Config, Frame, Parsed, SendOptions, Session, Tag,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn tag(id: &str, inc: u64) -> Tag {
    Tag::new(id, inc).unwrap()
}

/// Session with one memory transport; returns the remote end too
async fn connected(config: Config) -> (Session, Arc<InterceptedTransport>, MemoryTransport) {
    init_tracing();
    let session = Session::new(config).unwrap();
    let (connector, mut acceptor) = MemoryConnector::new();
    let transport = session.connect(&connector).await.unwrap();
    let remote = acceptor.accept().await.unwrap();
    (session, transport, remote)
}

/// Host traffic that teaches the session its current tag
async fn prime(transport: &InterceptedTransport, remote: &MemoryTransport, frame: &str) {
    assert!(transport.send(Frame::from(frame)).await.unwrap());
    assert_eq!(remote.receive().await.unwrap(), Frame::from(frame));
}

/// Read one request from the remote end, returning its tag and payload
async fn next_request(remote: &MemoryTransport) -> (Tag, String) {
    match remote.receive().await.unwrap().parse() {
        Parsed::Match {
            tag,
            data: Some(data),
        } => (tag, data),
        other => panic!("expected a tagged request, got {:?}", other),
    }
}

#[tokio::test]
async fn request_resolves_with_matching_response() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, r#"3.--10,,["admin","init"]"#).await;

    tokio::spawn(async move {
        let (tag, data) = next_request(&remote).await;
        assert_eq!(tag, self::tag("3", 61));
        assert_eq!(data, r#"{"a":1}"#);

        remote.send(Frame::from(format!("{},,{{\"ok\":true}}", tag))).await.unwrap();
        remote
    });

    let data = session.correlator().send(&json!({"a": 1})).await.unwrap();
    assert_eq!(data, r#"{"ok":true}"#);
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn wire_format_of_outbound_request() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "1.---0,,[]").await;
    // "1.---0" is not a tag; the sequencer is still unset
    assert_eq!(session.sequencer().peek(), None);

    prime(&transport, &remote, "1.--0,").await;
    assert_eq!(session.sequencer().peek(), Some(tag("1", 50)));

    let server = tokio::spawn(async move {
        let frame = remote.receive().await.unwrap();
        remote.send(Frame::from("1.--51,,done")).await.unwrap();
        (frame, remote)
    });

    session.correlator().send(&json!({"a": 1})).await.unwrap();
    let (frame, _remote) = server.await.unwrap();
    assert_eq!(frame, Frame::from(r#"1.--51,,{"a":1}"#));
}

#[tokio::test]
async fn sequencer_advances_by_fifty_after_send() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "3.--10,,[]").await;
    assert_eq!(session.sequencer().peek(), Some(tag("3", 60)));
    assert_eq!(session.sequencer().next_tag().await.unwrap(), tag("3", 61));

    tokio::spawn(async move {
        let (tag, _) = next_request(&remote).await;
        remote.send(Frame::from(format!("{},,[]", tag))).await.unwrap();
        remote
    });

    session.correlator().send(&json!(["ping"])).await.unwrap();
    assert_eq!(session.sequencer().peek(), Some(tag("3", 111)));
}

#[tokio::test]
async fn inbound_tags_never_move_the_sequencer() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "3.--10,,[]").await;

    remote.send(Frame::from("3.--900,,unsolicited")).await.unwrap();
    remote.send(Frame::from("7.--1,,other id")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(session.sequencer().peek(), Some(tag("3", 60)));
}

#[tokio::test]
async fn concurrent_requests_never_cross() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "5.--100,,[]").await;

    tokio::spawn(async move {
        let first = next_request(&remote).await;
        let second = next_request(&remote).await;
        assert_ne!(first.0, second.0);

        // unrelated traffic and bare probes for the pending tags
        remote.send(Frame::from(r#"["Presence",{"id":"x"}]"#)).await.unwrap();
        remote.send(Frame::from(format!("{},", first.0))).await.unwrap();
        remote.send(Frame::from(format!("{},", second.0))).await.unwrap();

        // answer in reverse order
        for (tag, data) in [second, first] {
            let reply = format!("{},,{{\"echo\":{}}}", tag, data);
            remote.send(Frame::from(reply)).await.unwrap();
        }
        remote
    });

    let correlator = session.correlator();
    let other = session.correlator();
    let msg_a = json!({"n": 1});
    let msg_b = json!({"n": 2});
    let (a, b) = tokio::join!(correlator.send(&msg_a), other.send(&msg_b),);

    assert_eq!(a.unwrap(), r#"{"echo":{"n":1}}"#);
    assert_eq!(b.unwrap(), r#"{"echo":{"n":2}}"#);
    assert!(session.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_for_pending_tag_does_not_resolve() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "1.--4,,[]").await;

    tokio::spawn(async move {
        let (tag, _) = next_request(&remote).await;
        assert_eq!(tag, self::tag("1", 55));
        remote.send(Frame::from("1.--55,")).await.unwrap();
        remote.send(Frame::from("1.--55")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        remote.send(Frame::from("1.--55,,real")).await.unwrap();
        remote
    });

    let data = session.correlator().send(&json!([])).await.unwrap();
    assert_eq!(data, "real");
}

#[tokio::test(start_paused = true)]
async fn timeout_rejects_and_restores_registry() {
    let config = Config::default().with_request_timeout(Duration::from_secs(2));
    let (session, transport, remote) = connected(config).await;
    prime(&transport, &remote, "2.--1,,[]").await;

    session.registry().register(|_| {});
    let baseline = session.registry().len();

    let err = session.correlator().send(&json!(["query"])).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(TimeoutKind::Response)));
    assert_eq!(session.registry().len(), baseline);

    // a fresh request still works afterwards
    let server = tokio::spawn(async move {
        let _stale = next_request(&remote).await;
        let (tag, _) = next_request(&remote).await;
        remote.send(Frame::from(format!("{},,\"late but fine\"", tag))).await.unwrap();
        remote
    });
    let data = session.correlator().send(&json!(["again"])).await.unwrap();
    assert_eq!(data, "\"late but fine\"");
    assert_eq!(session.registry().len(), baseline);
    drop(server);
}

#[tokio::test(start_paused = true)]
async fn per_call_timeout_overrides_default() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "2.--1,,[]").await;

    let started = tokio::time::Instant::now();
    let options = SendOptions::new().timeout(Duration::from_millis(300));
    let err = session.correlator().send_with(&json!([]), options).await.unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn encrypted_requests_fail_fast() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "2.--1,,[]").await;

    let options = SendOptions::new().encrypted(true);
    let err = session.correlator().send_with(&json!([]), options).await.unwrap_err();

    assert!(matches!(err, Error::Unsupported(_)));
    assert!(session.registry().is_empty());
    assert_eq!(session.sequencer().peek(), Some(tag("2", 51)));
}

#[tokio::test(start_paused = true)]
async fn request_waits_for_first_tag() {
    let (session, transport, remote) = connected(Config::default()).await;

    let host = Arc::clone(&transport);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        host.send(Frame::from("8.--0,,[\"admin\"]")).await.unwrap();

        assert_eq!(remote.receive().await.unwrap(), Frame::from("8.--0,,[\"admin\"]"));
        let (tag, _) = next_request(&remote).await;
        assert_eq!(tag, self::tag("8", 51));
        remote.send(Frame::from(format!("{},,1", tag))).await.unwrap();
        remote
    });

    assert_eq!(session.correlator().send(&json!([])).await.unwrap(), "1");
}

#[tokio::test(start_paused = true)]
async fn request_times_out_without_any_tag() {
    let config = Config::default().with_wait_bound(Duration::from_secs(10));
    let (session, _transport, _remote) = connected(config).await;

    let err = session.correlator().send(&json!([])).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(TimeoutKind::Tag)));
    assert!(session.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_times_out_without_any_transport() {
    init_tracing();
    let config = Config::default().with_wait_bound(Duration::from_secs(10));
    let session = Session::new(config).unwrap();

    // tag known from a transport-less source
    session.sequencer().observe_outbound(&Frame::from("1.--1,"));

    let err = session.correlator().send(&json!([])).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(TimeoutKind::Transport)));
}

#[tokio::test(start_paused = true)]
async fn dropping_a_pending_request_leaves_no_listener() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "4.--1,,[]").await;

    let correlator = session.correlator();
    let abandoned = tokio::time::timeout(Duration::from_secs(1), correlator.send(&json!([]))).await;

    assert!(abandoned.is_err());
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn reset_abandons_pending_requests() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "4.--1,,[]").await;
    let session = Arc::new(session);

    let resetter = Arc::clone(&session);
    tokio::spawn(async move {
        let _ = next_request(&remote).await;
        resetter.reset();
        remote
    });

    let err = session.correlator().send(&json!([])).await.unwrap_err();
    assert!(matches!(err, Error::Abandoned(ref abandoned) if *abandoned == tag("4", 52)));
    assert_eq!(session.sequencer().peek(), None);
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn suppressed_request_fails_and_keeps_tag() {
    init_tracing();
    let filter = Box::new(|frame: Frame| {
        let blocked = frame
            .as_text()
            .is_some_and(|text| text.contains("forbidden"));
        (!blocked).then_some(frame)
    });
    let session = Session::with_send_filter(Config::default(), filter).unwrap();
    let (connector, mut acceptor) = MemoryConnector::new();
    let transport = session.connect(&connector).await.unwrap();
    let remote = acceptor.accept().await.unwrap();
    prime(&transport, &remote, "6.--1,,[]").await;

    let err = session.correlator().send(&json!(["forbidden"])).await.unwrap_err();
    assert!(matches!(err, Error::Suppressed(ref blocked) if *blocked == tag("6", 52)));
    assert_eq!(session.sequencer().peek(), Some(tag("6", 51)));
    assert!(session.registry().is_empty());
}

#[derive(Debug, Serialize)]
struct ProfileQuery<'a>(&'a str, &'a str, &'a str);

#[derive(Debug, Deserialize, PartialEq)]
struct Thumb {
    eurl: Option<String>,
}

#[tokio::test]
async fn typed_request_decodes_response() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "9.--1,,[]").await;

    tokio::spawn(async move {
        let (tag, data) = next_request(&remote).await;
        assert_eq!(data, r#"["query","ProfilePicThumb","15550100@c.us"]"#);
        let reply = format!(r#"{},,{{"eurl":"https://cdn.example/p.jpg"}}"#, tag);
        remote.send(Frame::from(reply)).await.unwrap();
        remote
    });

    let query = ProfileQuery("query", "ProfilePicThumb", "15550100@c.us");
    let thumb: Thumb = session.correlator().request(&query).await.unwrap();
    assert_eq!(
        thumb,
        Thumb {
            eurl: Some("https://cdn.example/p.jpg".to_string())
        }
    );
}

#[tokio::test]
async fn newest_transport_carries_requests() {
    init_tracing();
    let session = Session::new(Config::default()).unwrap();
    let (connector, mut acceptor) = MemoryConnector::new();

    let old = session.connect(&connector).await.unwrap();
    let old_remote = acceptor.accept().await.unwrap();
    prime(&old, &old_remote, "1.--1,,[]").await;

    let (local, new_remote) = MemoryTransport::pair();
    let new = session.adopt(local).unwrap();
    assert_eq!(new.index(), 1);

    tokio::spawn(async move {
        let (tag, _) = next_request(&new_remote).await;
        assert_eq!(tag, self::tag("1", 52));
        new_remote.send(Frame::from(format!("{},,new", tag))).await.unwrap();
        new_remote
    });

    assert_eq!(session.correlator().send(&json!([])).await.unwrap(), "new");
    assert_eq!(session.interceptor().transport_count(), 2);
    old_remote.close().await.unwrap();
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (first, first_transport, first_remote) = connected(Config::default()).await;
    let (second, _second_transport, _second_remote) = connected(Config::default()).await;

    prime(&first_transport, &first_remote, "1.--1,,[]").await;

    assert_eq!(first.sequencer().peek(), Some(tag("1", 51)));
    assert_eq!(second.sequencer().peek(), None);
    assert_eq!(second.interceptor().transport_count(), 1);
}

#[tokio::test]
async fn zero_padded_increment_is_someone_else() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "1.--1,,[]").await;

    tokio::spawn(async move {
        let (tag, _) = next_request(&remote).await;
        assert_eq!(tag.to_string(), "1.--52");
        remote.send(Frame::from("1.--052,,not-mine")).await.unwrap();
        remote.send(Frame::from("01.--52,,not-mine-either")).await.unwrap();
        remote.send(Frame::from("1.--52,,mine")).await.unwrap();
        remote
    });

    assert_eq!(session.correlator().send(&json!([])).await.unwrap(), "mine");
}

#[tokio::test]
async fn raw_codec_sends_text_verbatim() {
    let (session, transport, remote) = connected(Config::default()).await;
    prime(&transport, &remote, "2.--7,,[]").await;

    let server = tokio::spawn(async move {
        let frame = remote.receive().await.unwrap();
        remote.send(Frame::from("2.--58,,plain reply")).await.unwrap();
        (frame, remote)
    });

    let correlator = session.correlator_with(RawCodec);
    let reply: String = correlator.request(&r#"["admin","test"]"#).await.unwrap();
    assert_eq!(reply, "plain reply");

    let (frame, _remote) = server.await.unwrap();
    assert_eq!(frame, Frame::from(r#"2.--58,,["admin","test"]"#));
}
