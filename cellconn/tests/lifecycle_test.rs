//! End-to-end tests for the connectivity state machine.
//!
//! Every hardware seam is replaced by a scriptable double from `common`, so
//! these run without a modem or network.

mod common;

use cellconn::{
    ConnectError, ConnectionState, EndpointPolicy, InterfaceEvent, LifecycleError, ModemInfo,
    PowerError, ResolveError, SendError, TimeoutError,
};
use common::{DnsAnswer, MockModem, OTHER_IP, Rig, SERVER_IP, fast_config, init_logging};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

const PAYLOAD: &[u8] = b"{\"x\":1}";

#[tokio::test]
async fn test_bring_up_reaches_connected_and_sends() {
    init_logging();
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());

    manager.start().await.unwrap();

    assert_eq!(manager.current_state(), ConnectionState::Connected);
    assert!(manager.is_connected());
    assert_eq!(manager.retry_count(), 0);
    assert_eq!(
        rig.transport.connects(),
        vec![SocketAddr::new(SERVER_IP, 8080)]
    );
    assert_eq!(manager.endpoint().map(|e| e.port()), Some(8080));
    assert_eq!(rig.modem.calls(), vec!["resume"]);

    assert_eq!(manager.send(PAYLOAD).await, Ok(PAYLOAD.len()));
    assert_eq!(rig.transport.sent(), vec![PAYLOAD.to_vec()]);
}

#[tokio::test]
async fn test_send_failure_reconnects_and_resets_retry_count() {
    init_logging();
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    rig.transport.fail_sends.store(true, Ordering::SeqCst);
    let err = manager.send(PAYLOAD).await.unwrap_err();
    assert!(matches!(err, SendError::TransportFailure(_)));
    assert_eq!(manager.current_state(), ConnectionState::Reconnecting);
    assert!(!manager.is_connected());

    rig.transport.fail_sends.store(false, Ordering::SeqCst);
    manager.reconnect().await.unwrap();

    assert_eq!(manager.current_state(), ConnectionState::Connected);
    assert_eq!(manager.retry_count(), 0);
    assert_eq!(rig.modem.calls(), vec!["resume", "suspend", "resume"]);
    assert_eq!(rig.dns.queries(), 2);
    assert_eq!(rig.transport.closes(), 1);
    assert_eq!(manager.send(PAYLOAD).await, Ok(PAYLOAD.len()));
}

#[tokio::test]
async fn test_dns_ready_timeout_is_not_fatal() {
    init_logging();
    let rig = Rig::default();
    rig.iface.dns_on_up.store(false, Ordering::SeqCst);
    let config = fast_config();
    let dns_timeout = config.dns_ready_timeout;
    let mut manager = rig.manager(config);

    let start = Instant::now();
    manager.start().await.unwrap();

    assert!(start.elapsed() >= dns_timeout);
    assert_eq!(manager.current_state(), ConnectionState::Connected);
    assert_eq!(rig.dns.queries(), 1);
}

#[tokio::test]
async fn test_link_timeout_on_bring_up_shuts_down() {
    init_logging();
    let rig = Rig::default();
    rig.iface.link_on_up.store(false, Ordering::SeqCst);
    let config = fast_config();
    let link_timeout = config.link_timeout;
    let mut manager = rig.manager(config);

    let err = manager.start().await.unwrap_err();

    assert_eq!(err, LifecycleError::Timeout(TimeoutError::Link(link_timeout)));
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(rig.dns.queries(), 0);
    assert!(rig.transport.connects().is_empty());
    // Acquired resources are released on the way down.
    assert_eq!(rig.modem.calls(), vec!["resume", "suspend"]);
    assert_eq!(rig.iface.downs.load(Ordering::SeqCst), 1);
    // Reconnect is only reachable after the first success.
    assert_eq!(
        manager.reconnect().await,
        Err(LifecycleError::InvalidState(ConnectionState::Shutdown))
    );
}

#[tokio::test]
async fn test_power_failure_on_bring_up_shuts_down() {
    let rig = Rig::default();
    rig.modem.fail_resume.store(true, Ordering::SeqCst);
    let mut manager = rig.manager(fast_config());

    assert_eq!(
        manager.start().await,
        Err(LifecycleError::Power(PowerError::Resume(-5)))
    );
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(rig.iface.ups.load(Ordering::SeqCst), 0);
    assert_eq!(rig.modem.calls(), vec!["resume"]);
}

#[tokio::test]
async fn test_interface_failure_on_bring_up_powers_off() {
    let rig = Rig::default();
    rig.iface.fail_up.store(true, Ordering::SeqCst);
    let mut manager = rig.manager(fast_config());

    let err = manager.start().await.unwrap_err();

    assert!(matches!(err, LifecycleError::Iface(_)));
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(rig.modem.calls(), vec!["resume", "suspend"]);
    assert_eq!(rig.iface.downs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resolve_failure_on_bring_up_shuts_down() {
    let rig = Rig::default();
    rig.dns.push(DnsAnswer::Failure(-2));
    let mut manager = rig.manager(fast_config());

    assert_eq!(
        manager.start().await,
        Err(LifecycleError::Resolve(ResolveError::ProtocolFailure(
            "resolver status -2".into()
        )))
    );
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(manager.endpoint(), None);
}

#[tokio::test]
async fn test_resolve_timeout_on_bring_up_shuts_down() {
    let rig = Rig::default();
    rig.dns.push(DnsAnswer::Silent);
    let config = fast_config();
    let resolve_timeout = config.resolve_timeout;
    let mut manager = rig.manager(config);

    assert_eq!(
        manager.start().await,
        Err(LifecycleError::Resolve(ResolveError::Timeout(resolve_timeout)))
    );
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
}

#[tokio::test]
async fn test_first_connect_failure_is_fatal() {
    let rig = Rig::default();
    rig.transport.refuse_next.store(1, Ordering::SeqCst);
    let mut manager = rig.manager(fast_config());

    assert_eq!(
        manager.start().await,
        Err(LifecycleError::Connect(ConnectError::Refused(
            SocketAddr::new(SERVER_IP, 8080)
        )))
    );
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(rig.transport.connects().len(), 1);
}

#[tokio::test]
async fn test_reconnect_gives_up_after_budget() {
    init_logging();
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    rig.transport.refuse_all.store(true, Ordering::SeqCst);
    manager.notify_disconnected();
    assert_eq!(manager.current_state(), ConnectionState::Reconnecting);

    assert_eq!(
        manager.reconnect().await,
        Err(LifecycleError::RetriesExhausted { attempts: 3 })
    );
    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(rig.transport.connects().len(), 4);

    // Three power cycles, then the final power-off.
    let calls = rig.modem.calls();
    assert_eq!(calls.iter().filter(|c| **c == "suspend").count(), 4);
    assert_eq!(calls.last(), Some(&"suspend"));
    assert_eq!(rig.iface.downs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnect_recovers_after_failed_attempt() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    rig.transport.refuse_next.store(1, Ordering::SeqCst);
    manager.notify_disconnected();
    manager.reconnect().await.unwrap();

    assert_eq!(manager.current_state(), ConnectionState::Connected);
    assert_eq!(manager.retry_count(), 0);
    assert_eq!(rig.transport.connects().len(), 3);
}

#[tokio::test]
async fn test_backoff_delays_later_attempts() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    // Attempt 1 is immediate, attempt 2 waits 10ms, attempt 3 waits 20ms.
    rig.transport.refuse_next.store(2, Ordering::SeqCst);
    manager.notify_disconnected();
    let start = Instant::now();
    manager.reconnect().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(manager.retry_count(), 0);
}

#[tokio::test]
async fn test_reconnect_re_resolves_by_default() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    rig.dns.push(DnsAnswer::Address(OTHER_IP));
    manager.notify_disconnected();
    manager.reconnect().await.unwrap();

    assert_eq!(rig.dns.queries(), 2);
    assert_eq!(
        rig.transport.connects().last(),
        Some(&SocketAddr::new(OTHER_IP, 8080))
    );
    assert_eq!(manager.endpoint().map(|e| e.ip()), Some(OTHER_IP));
}

#[tokio::test]
async fn test_reconnect_reuses_cached_endpoint() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config().with_endpoint_policy(EndpointPolicy::Cache));
    manager.start().await.unwrap();

    rig.dns.push(DnsAnswer::Address(OTHER_IP));
    manager.notify_disconnected();
    manager.reconnect().await.unwrap();

    assert_eq!(rig.dns.queries(), 1);
    assert_eq!(
        rig.transport.connects(),
        vec![SocketAddr::new(SERVER_IP, 8080); 2]
    );
}

#[tokio::test]
async fn test_link_loss_turns_send_into_not_connected() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    rig.iface.emit(InterfaceEvent::L4Disconnected);

    assert_eq!(manager.send(PAYLOAD).await, Err(SendError::NotConnected));
    assert_eq!(manager.current_state(), ConnectionState::Reconnecting);
    assert!(rig.transport.sent().is_empty());

    manager.reconnect().await.unwrap();
    assert_eq!(manager.send(PAYLOAD).await, Ok(PAYLOAD.len()));
}

#[tokio::test]
async fn test_send_before_start_is_not_connected() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());

    assert_eq!(manager.send(PAYLOAD).await, Err(SendError::NotConnected));
    assert_eq!(manager.current_state(), ConnectionState::Uninitialized);
    assert!(rig.transport.connects().is_empty());
}

#[tokio::test]
async fn test_reconnect_while_connected_forces_power_cycle() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    manager.reconnect().await.unwrap();

    assert_eq!(manager.current_state(), ConnectionState::Connected);
    assert_eq!(rig.modem.calls(), vec!["resume", "suspend", "resume"]);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    assert_eq!(
        manager.start().await,
        Err(LifecycleError::InvalidState(ConnectionState::Connected))
    );
    assert_eq!(rig.transport.connects().len(), 1);
}

#[tokio::test]
async fn test_shutdown_releases_everything_once() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    manager.start().await.unwrap();

    manager.shutdown().await;
    manager.shutdown().await;

    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert!(!manager.is_connected());
    assert_eq!(rig.transport.closes(), 1);
    assert_eq!(rig.iface.downs.load(Ordering::SeqCst), 1);
    assert_eq!(rig.modem.calls(), vec!["resume", "suspend"]);
    assert_eq!(manager.send(PAYLOAD).await, Err(SendError::NotConnected));
}

#[tokio::test]
async fn test_shutdown_after_interrupted_bring_up_releases_hardware() {
    let rig = Rig::default();
    rig.iface.link_on_up.store(false, Ordering::SeqCst);
    let mut manager = rig.manager(fast_config().with_link_timeout(Duration::from_secs(5)));

    let interrupted = tokio::time::timeout(Duration::from_millis(50), manager.start()).await;
    assert!(interrupted.is_err());
    assert_eq!(manager.current_state(), ConnectionState::AwaitingLinkUp);

    manager.shutdown().await;

    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert_eq!(rig.modem.calls(), vec!["resume", "suspend"]);
    assert_eq!(rig.iface.downs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_before_start_touches_nothing() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());

    manager.shutdown().await;

    assert_eq!(manager.current_state(), ConnectionState::Shutdown);
    assert!(rig.modem.calls().is_empty());
    assert_eq!(rig.iface.ups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_state_subscription_sees_transitions() {
    let rig = Rig::default();
    let mut manager = rig.manager(fast_config());
    let mut states = manager.subscribe_state();
    assert_eq!(*states.borrow(), ConnectionState::Uninitialized);

    manager.start().await.unwrap();
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

    manager.shutdown().await;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Shutdown);
}

#[tokio::test]
async fn test_modem_info_captured_at_link_up() {
    let info = ModemInfo {
        imei: Some("356938035643809".into()),
        rsrp: Some("45".into()),
        operator: Some("Telia".into()),
        ..Default::default()
    };
    let rig = Rig {
        modem: Arc::new(MockModem {
            info: info.clone(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut manager = rig.manager(fast_config());
    assert_eq!(manager.modem_info(), None);

    manager.start().await.unwrap();

    assert_eq!(manager.modem_info(), Some(&info));
}
