//! Unit tests for the socket manager lifecycle.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use futures::future::join_all;
use rstest::{fixture, rstest};
use tokio::time::Instant;
use tracing_test::traced_test;

use super::SocketManager;
use crate::{
    config::{DEFAULT_CLOSE_TIMEOUT, DEFAULT_IDENTITY_TIMEOUT},
    error::{SocketError, ValidationError},
    hooks::message_handler,
    message::ClientRequest,
    session::Phase,
    test_helpers::{DEFAULT_IDENTITY, Inbox, MemoryConnector, MemoryPeer, PeerScript, eventually},
    transport::Frame,
};

const ADDRESS: &str = "ws://nym.test:1977";
const WAIT: Duration = Duration::from_secs(1);
/// Timer rounding allowance for paused-clock bounds.
const SLACK: Duration = Duration::from_millis(100);

struct Fixture {
    manager: SocketManager,
    connector: MemoryConnector,
    inbox: Inbox,
}

fn fixture_with(script: PeerScript) -> Fixture {
    let connector = MemoryConnector::new(script);
    let inbox = Inbox::default();
    let manager = SocketManager::builder(ADDRESS)
        .connector(connector.clone())
        .message_handler(inbox.handler())
        .build()
        .expect("build manager");
    Fixture {
        manager,
        connector,
        inbox,
    }
}

#[fixture]
fn setup() -> Fixture { fixture_with(PeerScript::default()) }

fn peer(connector: &MemoryConnector) -> MemoryPeer {
    connector.last_peer().expect("connection accepted")
}

#[rstest]
#[case("", true, ValidationError::EmptyAddress)]
#[case(ADDRESS, false, ValidationError::MissingHandler)]
fn build_rejects_invalid_configuration(
    #[case] address: &str,
    #[case] with_handler: bool,
    #[case] expected: ValidationError,
) {
    let mut builder = SocketManager::builder(address);
    if with_handler {
        builder = builder.on_message(|_message, _replier| async {});
    }
    let err = builder.build().expect_err("invalid configuration");
    assert!(matches!(err, SocketError::Validation(found) if found == expected));
}

#[test]
fn build_rejects_zero_identity_timeout() {
    let err = SocketManager::builder(ADDRESS)
        .identity_timeout(Duration::ZERO)
        .on_message(|_message, _replier| async {})
        .build()
        .expect_err("zero timeout");
    assert!(matches!(
        err,
        SocketError::Validation(ValidationError::ZeroTimeout { name: "identity" })
    ));
}

#[rstest]
#[tokio::test]
async fn start_completes_identity_handshake(setup: Fixture) {
    let stopped = setup
        .manager
        .start()
        .await
        .expect("start")
        .expect("new session");

    assert!(!stopped.is_stopped());
    assert!(setup.manager.is_running().await);
    assert_eq!(setup.manager.phase(), Phase::Ready);
    assert_eq!(setup.manager.identity(), DEFAULT_IDENTITY);
    assert_eq!(
        peer(&setup.connector).received_requests(),
        vec![serde_json::json!({"type": "selfAddress"})]
    );
}

#[traced_test]
#[tokio::test]
async fn second_start_is_a_no_op() {
    let setup = fixture_with(PeerScript::default());
    setup.manager.start().await.expect("first start");
    let again = setup.manager.start().await.expect("second start");

    assert!(again.is_none());
    assert_eq!(setup.connector.dials(), 1);
    assert!(setup.manager.is_running().await);
    assert!(logs_contain("already started"));
}

#[rstest]
#[tokio::test]
async fn stop_releases_session_once(setup: Fixture) {
    let stopped = setup
        .manager
        .start()
        .await
        .expect("start")
        .expect("new session");
    let peer = peer(&setup.connector);

    setup.manager.stop().await;
    assert!(stopped.is_stopped());
    assert!(!setup.manager.is_running().await);
    assert_eq!(setup.manager.phase(), Phase::Idle);
    assert!(peer.received().contains(&Frame::Close));
    assert!(peer.client_closed().fired_within(WAIT).await);

    setup.manager.stop().await;
    assert!(!setup.manager.is_running().await);
    assert_eq!(setup.connector.dials(), 1);
}

#[rstest]
#[tokio::test]
async fn stop_before_start_does_nothing(setup: Fixture) {
    setup.manager.stop().await;
    assert!(!setup.manager.is_running().await);
    assert_eq!(setup.connector.dials(), 0);
}

#[rstest]
#[tokio::test]
async fn send_before_start_is_not_started(setup: Fixture) {
    let err = setup
        .manager
        .send(&ClientRequest::send("bob.nym", "hi"))
        .await
        .expect_err("no session");
    assert!(matches!(err, SocketError::NotStarted));
}

#[tokio::test]
async fn refused_connection_is_reported() {
    let fixture = fixture_with(PeerScript::default());
    fixture.connector.refuse_connections(true);

    let err = fixture.manager.start().await.expect_err("refused");
    assert!(matches!(err, SocketError::Connection { ref address, .. } if address == ADDRESS));
    assert!(!fixture.manager.is_running().await);
    assert_eq!(fixture.manager.phase(), Phase::Idle);

    fixture.connector.refuse_connections(false);
    assert!(fixture.manager.start().await.expect("retry").is_some());
}

#[tokio::test(start_paused = true)]
async fn identity_timeout_releases_transport() {
    let fixture = fixture_with(PeerScript::default().silent());

    let err = fixture.manager.start().await.expect_err("no identity");
    assert!(matches!(
        err,
        SocketError::HandshakeTimeout { timeout, .. } if timeout == Duration::from_secs(5)
    ));
    assert!(!fixture.manager.is_running().await);
    assert_eq!(fixture.manager.phase(), Phase::Idle);
    assert!(peer(&fixture.connector).client_closed().fired_within(WAIT).await);
    assert!(matches!(
        fixture.manager.send(&ClientRequest::SelfAddress).await,
        Err(SocketError::NotStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn peer_closing_immediately_fails_start() {
    let fixture = fixture_with(PeerScript::default().hang_up_on_accept());

    let began = Instant::now();
    let err = fixture.manager.start().await.expect_err("peer hung up");
    assert!(matches!(err, SocketError::Connection { .. }), "got {err:?}");
    assert!(began.elapsed() <= Duration::from_secs(6));
    assert!(!fixture.manager.is_running().await);
}

#[rstest]
#[tokio::test]
async fn identity_tracks_latest_reply(setup: Fixture) {
    setup.manager.start().await.expect("start");
    let peer = peer(&setup.connector);

    assert!(peer.push_text(r#"{"type":"selfAddress","address":"second.nym"}"#));
    let manager = setup.manager.clone();
    assert!(eventually(WAIT, || manager.identity() == "second.nym").await);
    assert_eq!(setup.manager.phase(), Phase::Ready);
}

#[traced_test]
#[tokio::test]
async fn error_frames_are_logged_without_state_change() {
    let setup = fixture_with(PeerScript::default());
    setup.manager.start().await.expect("start");
    let peer = peer(&setup.connector);

    assert!(peer.push_text(r#"{"type":"error","message":"insufficient bandwidth"}"#));
    assert!(eventually(WAIT, || logs_contain("insufficient bandwidth")).await);
    assert!(logs_contain("got error from mixnet"));
    assert!(setup.manager.is_running().await);
    assert_eq!(setup.manager.identity(), DEFAULT_IDENTITY);
    assert!(setup.inbox.messages().is_empty());
}

#[tokio::test]
async fn received_before_identity_is_delivered() {
    let fixture = fixture_with(PeerScript::default().silent());
    let connector = fixture.connector.clone();
    let script = tokio::spawn(async move {
        let asked = eventually(WAIT, || {
            connector
                .last_peer()
                .is_some_and(|peer| !peer.received().is_empty())
        })
        .await;
        assert!(asked, "identity request never arrived");
        let peer = connector.last_peer().expect("peer");
        peer.push_text(r#"{"type":"received","message":"early"}"#);
        peer.push_text(r#"{"type":"selfAddress","address":"late.nym"}"#);
    });

    fixture.manager.start().await.expect("start");
    script.await.expect("script task");

    assert_eq!(fixture.manager.identity(), "late.nym");
    assert_eq!(fixture.manager.phase(), Phase::Ready);
    let messages = fixture.inbox.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.first().map(|m| m.message.as_str()), Some("early"));
}

#[tokio::test]
async fn handler_replies_do_not_interleave_with_sends() {
    let connector = MemoryConnector::default();
    let manager = SocketManager::builder(ADDRESS)
        .connector(connector.clone())
        .on_message(|message, replier| async move {
            if let Some(tag) = message.sender_tag {
                let reply = ClientRequest::reply(tag, format!("re: {}", message.message));
                replier.send(&reply).await.expect("reply");
            }
        })
        .build()
        .expect("build manager");
    manager.start().await.expect("start");
    let peer = peer(&connector);

    for i in 0..10 {
        peer.push_text(format!(r#"{{"type":"received","message":"m{i}","senderTag":"t{i}"}}"#));
    }
    let sends = (0..10).map(|i| {
        let manager = manager.clone();
        async move {
            manager
                .send(&ClientRequest::send("bob.nym", format!("s{i}")))
                .await
        }
    });
    for result in join_all(sends).await {
        result.expect("send");
    }

    assert!(eventually(WAIT, || peer.received().len() == 21).await);
    let frames = peer.received();
    let texts: Vec<&str> = frames
        .iter()
        .filter_map(|frame| match frame {
            Frame::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 21);
    for i in 0..10 {
        let expected = format!(r#"{{"type":"reply","message":"re: m{i}","senderTag":"t{i}"}}"#);
        assert!(texts.contains(&expected.as_str()), "missing {expected}");
    }
}

#[rstest]
#[tokio::test]
async fn peer_hang_up_stops_session(setup: Fixture) {
    let stopped = setup
        .manager
        .start()
        .await
        .expect("start")
        .expect("new session");

    peer(&setup.connector).hang_up();
    assert!(tokio::time::timeout(WAIT, stopped.wait()).await.is_ok());
    assert!(!setup.manager.is_running().await);
    assert_eq!(setup.manager.phase(), Phase::Idle);

    assert!(setup.manager.start().await.expect("restart").is_some());
    assert_eq!(setup.connector.dials(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_is_bounded_by_close_timeout() {
    let fixture = fixture_with(PeerScript::default().ignore_close());
    let stopped = fixture
        .manager
        .start()
        .await
        .expect("start")
        .expect("new session");

    let began = Instant::now();
    fixture.manager.stop().await;
    let elapsed = began.elapsed();

    assert!(elapsed >= DEFAULT_CLOSE_TIMEOUT);
    assert!(elapsed < DEFAULT_CLOSE_TIMEOUT + Duration::from_secs(1));
    assert!(stopped.is_stopped());
    assert!(!fixture.manager.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn handler_may_stop_its_own_manager() {
    let connector = MemoryConnector::default();
    let slot: Arc<OnceLock<SocketManager>> = Arc::new(OnceLock::new());
    let handler_slot = Arc::clone(&slot);
    let manager = SocketManager::builder(ADDRESS)
        .connector(connector.clone())
        .message_handler(message_handler(move |_message, _replier| {
            let slot = Arc::clone(&handler_slot);
            async move {
                if let Some(manager) = slot.get() {
                    manager.stop().await;
                }
            }
        }))
        .build()
        .expect("build manager");
    slot.set(manager.clone()).expect("slot empty");

    let stopped = manager.start().await.expect("start").expect("new session");
    peer(&connector).push_text(r#"{"type":"received","message":"quit"}"#);

    assert!(
        tokio::time::timeout(DEFAULT_CLOSE_TIMEOUT * 2, stopped.wait())
            .await
            .is_ok()
    );
    assert!(!manager.is_running().await);
}

#[traced_test]
#[tokio::test]
async fn panicking_handler_keeps_session_alive() {
    let connector = MemoryConnector::default();
    let manager = SocketManager::builder(ADDRESS)
        .connector(connector.clone())
        .on_message(|_message, _replier| async { panic!("handler failure"); })
        .build()
        .expect("build manager");
    manager.start().await.expect("start");
    let peer = peer(&connector);

    peer.push_text(r#"{"type":"received","message":"boom"}"#);
    peer.push_text(r#"{"type":"selfAddress","address":"after.nym"}"#);

    let observer = manager.clone();
    assert!(eventually(WAIT, || observer.identity() == "after.nym").await);
    assert!(logs_contain("message handler panicked"));
    assert!(manager.is_running().await);
}

#[rstest]
#[tokio::test]
async fn stale_stop_request_is_ignored(setup: Fixture) {
    setup.manager.start().await.expect("first start");
    setup.manager.stop().await;
    setup.manager.start().await.expect("second start");

    setup.manager.stop_session(0).await;
    assert!(setup.manager.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn stop_is_bounded_when_peer_stops_reading() {
    let fixture = fixture_with(PeerScript::default().stall_writes_after(1));
    let stopped = fixture
        .manager
        .start()
        .await
        .expect("start")
        .expect("new session");

    let began = Instant::now();
    tokio::time::timeout(DEFAULT_CLOSE_TIMEOUT * 3, fixture.manager.stop())
        .await
        .expect("stop returns despite stalled writes");

    assert!(began.elapsed() < DEFAULT_CLOSE_TIMEOUT * 2 + SLACK);
    assert!(stopped.is_stopped());
    assert!(!fixture.manager.is_running().await);
    assert_eq!(fixture.manager.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn stop_aborts_send_stuck_on_stalled_peer() {
    let fixture = fixture_with(PeerScript::default().stall_writes_after(1));
    fixture.manager.start().await.expect("start");

    let stuck = {
        let manager = fixture.manager.clone();
        tokio::spawn(async move { manager.send(&ClientRequest::send("bob.nym", "hi")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!stuck.is_finished());

    tokio::time::timeout(DEFAULT_CLOSE_TIMEOUT * 3, fixture.manager.stop())
        .await
        .expect("stop returns while a send holds the write lock");
    let result = stuck.await.expect("send task");
    assert!(matches!(result, Err(SocketError::Write { .. })), "got {result:?}");
    assert!(!fixture.manager.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn start_times_out_when_identity_request_cannot_be_written() {
    let fixture = fixture_with(PeerScript::default().stall_writes_after(0));

    let began = Instant::now();
    let err = tokio::time::timeout(
        DEFAULT_IDENTITY_TIMEOUT + DEFAULT_CLOSE_TIMEOUT * 3,
        fixture.manager.start(),
    )
    .await
    .expect("start returns despite stalled writes")
    .expect_err("identity request never written");

    assert!(matches!(err, SocketError::HandshakeTimeout { .. }), "got {err:?}");
    assert!(began.elapsed() < DEFAULT_IDENTITY_TIMEOUT + DEFAULT_CLOSE_TIMEOUT * 2 + SLACK);
    assert!(!fixture.manager.is_running().await);
    assert_eq!(fixture.manager.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn teardown_releases_read_half_while_handler_hangs() {
    let connector = MemoryConnector::new(PeerScript::default().ignore_close());
    let manager = SocketManager::builder(ADDRESS)
        .connector(connector.clone())
        .on_message(|_message, _replier| std::future::pending::<()>())
        .build()
        .expect("build manager");
    manager.start().await.expect("start");
    let peer = peer(&connector);

    peer.push_text(r#"{"type":"received","message":"hang"}"#);
    tokio::time::sleep(Duration::from_millis(10)).await;
    manager.stop().await;

    // The receive loop dropped its stream, so the peer can no longer deliver.
    assert!(eventually(WAIT, || !peer.push_text("{}")).await);
    assert!(!manager.is_running().await);
}
