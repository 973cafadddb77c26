//! Scriptable doubles for the hardware seams.

#![allow(dead_code)]

use async_trait::async_trait;
use cellconn::{
    AddressFamily, ConnectError, ConnectivityConfig, DnsBackend, DnsCallback, DnsEvent,
    EventStream, IfaceError, InterfaceEvent, ModemDevice, ModemInfo, NetworkInterface,
    PowerError, ResolveError, RetryPolicy, SendError, Transport, TransportStream,
};
use futures::StreamExt;
use futures::channel::mpsc;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERVER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
pub const OTHER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 35));

/// Tight timeouts and no settle delays so scenarios finish quickly.
pub fn fast_config() -> ConnectivityConfig {
    ConnectivityConfig::new()
        .with_hostname("example.com")
        .with_port(8080)
        .with_link_timeout(Duration::from_millis(200))
        .with_reconnect_link_timeout(Duration::from_millis(200))
        .with_dns_ready_timeout(Duration::from_millis(50))
        .with_resolve_timeout(Duration::from_millis(200))
        .with_power_settle(Duration::ZERO)
        .with_stabilization_delay(Duration::ZERO)
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        })
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct MockModem {
    pub calls: Mutex<Vec<&'static str>>,
    pub fail_resume: AtomicBool,
    pub info: ModemInfo,
}

impl MockModem {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModemDevice for MockModem {
    async fn resume(&self) -> Result<(), PowerError> {
        self.calls.lock().unwrap().push("resume");
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(PowerError::Resume(-5));
        }
        Ok(())
    }

    async fn suspend(&self) -> Result<(), PowerError> {
        self.calls.lock().unwrap().push("suspend");
        Ok(())
    }

    async fn info(&self) -> ModemInfo {
        self.info.clone()
    }
}

/// Interface that raises link and DNS events on `up` unless told not to.
pub struct MockIface {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<InterfaceEvent>>>,
    connected: AtomicBool,
    dns_server: AtomicBool,
    pub link_on_up: AtomicBool,
    pub dns_on_up: AtomicBool,
    pub fail_up: AtomicBool,
    pub ups: AtomicUsize,
    pub downs: AtomicUsize,
}

impl Default for MockIface {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            dns_server: AtomicBool::new(false),
            link_on_up: AtomicBool::new(true),
            dns_on_up: AtomicBool::new(true),
            fail_up: AtomicBool::new(false),
            ups: AtomicUsize::new(0),
            downs: AtomicUsize::new(0),
        }
    }
}

impl MockIface {
    pub fn emit(&self, event: InterfaceEvent) {
        match event {
            InterfaceEvent::L4Connected => self.connected.store(true, Ordering::SeqCst),
            InterfaceEvent::L4Disconnected => self.connected.store(false, Ordering::SeqCst),
            InterfaceEvent::DnsServerAdded => self.dns_server.store(true, Ordering::SeqCst),
        }
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.unbounded_send(event).is_ok());
    }
}

#[async_trait]
impl NetworkInterface for MockIface {
    fn name(&self) -> &str {
        "ppp0"
    }

    async fn up(&self) -> Result<(), IfaceError> {
        self.ups.fetch_add(1, Ordering::SeqCst);
        if self.fail_up.load(Ordering::SeqCst) {
            return Err(IfaceError::Up {
                iface: "ppp0".into(),
                code: -19,
            });
        }
        if self.link_on_up.load(Ordering::SeqCst) {
            self.emit(InterfaceEvent::L4Connected);
        }
        if self.dns_on_up.load(Ordering::SeqCst) {
            self.emit(InterfaceEvent::DnsServerAdded);
        }
        Ok(())
    }

    async fn down(&self) -> Result<(), IfaceError> {
        self.downs.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.dns_server.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().unwrap().push(tx);
        rx.boxed()
    }

    async fn is_l4_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn has_dns_server(&self) -> bool {
        self.dns_server.load(Ordering::SeqCst)
    }
}

/// One scripted answer for a DNS query.
#[derive(Debug, Clone, Copy)]
pub enum DnsAnswer {
    Address(IpAddr),
    Failure(i32),
    /// Never calls back.
    Silent,
}

/// DNS backend answering from a script, then with a default address.
pub struct MockDns {
    script: Mutex<VecDeque<DnsAnswer>>,
    default_ip: IpAddr,
    pub queries: AtomicUsize,
}

impl Default for MockDns {
    fn default() -> Self {
        Self::answering(SERVER_IP)
    }
}

impl MockDns {
    pub fn answering(ip: IpAddr) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_ip: ip,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, answer: DnsAnswer) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl DnsBackend for MockDns {
    fn start_query(
        &self,
        _hostname: &str,
        _family: AddressFamily,
        _timeout: Duration,
        callback: DnsCallback,
    ) -> Result<(), ResolveError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DnsAnswer::Address(self.default_ip));
        match answer {
            DnsAnswer::Address(ip) => {
                callback(DnsEvent::Address(ip));
                callback(DnsEvent::Done);
            }
            DnsAnswer::Failure(status) => callback(DnsEvent::Failed(status)),
            DnsAnswer::Silent => {}
        }
        Ok(())
    }
}

/// Transport that records traffic and can refuse connects or fail sends.
#[derive(Default)]
pub struct MockTransport {
    pub refuse_next: AtomicUsize,
    pub refuse_all: AtomicBool,
    pub fail_sends: Arc<AtomicBool>,
    pub connects: Mutex<Vec<SocketAddr>>,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub closes: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn connects(&self) -> Vec<SocketAddr> {
        self.connects.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

pub struct MockStream {
    fail_sends: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl TransportStream for MockStream {
    async fn send(&mut self, buf: &[u8]) -> Result<usize, SendError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SendError::TransportFailure("connection reset by peer".into()));
        }
        self.sent.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    async fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Stream = MockStream;

    async fn connect(&self, addr: SocketAddr) -> Result<MockStream, ConnectError> {
        self.connects.lock().unwrap().push(addr);
        if self.refuse_all.load(Ordering::SeqCst) {
            return Err(ConnectError::Refused(addr));
        }
        let refused = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectError::Refused(addr));
        }
        Ok(MockStream {
            fail_sends: self.fail_sends.clone(),
            sent: self.sent.clone(),
            closes: self.closes.clone(),
        })
    }
}

/// Handles kept by a test while the manager owns the `Arc`s.
#[derive(Default, Clone)]
pub struct Rig {
    pub modem: Arc<MockModem>,
    pub iface: Arc<MockIface>,
    pub dns: Arc<MockDns>,
    pub transport: Arc<MockTransport>,
}

pub type Manager =
    cellconn::ConnectivityManager<Arc<MockModem>, Arc<MockIface>, Arc<MockDns>, Arc<MockTransport>>;

impl Rig {
    pub fn manager(&self, config: ConnectivityConfig) -> Manager {
        cellconn::ConnectivityManager::new(
            self.modem.clone(),
            self.iface.clone(),
            self.dns.clone(),
            self.transport.clone(),
            config,
        )
    }
}
