/// Example bringing up a connection on a regular host and sending a few payloads.
///
/// The OS owns the link here, so the modem and interface are host stand-ins.
/// Point it at a listener, e.g. `nc -lk 8080`, and set `CELLCONN_HOST`.
use cellconn::host::{NoopModem, StaticInterface, SystemDnsBackend, TcpTransport};
use cellconn::{ConnectivityConfig, ConnectivityManager, SendError};
use std::time::Duration;

#[tokio::main]
async fn main() -> cellconn::Result<()> {
    env_logger::init();

    let host = std::env::var("CELLCONN_HOST").unwrap_or_else(|_| "localhost".to_string());
    let config = ConnectivityConfig::new().with_hostname(host).with_port(8080);

    let mut manager = ConnectivityManager::new(
        NoopModem::new(),
        StaticInterface::new("eth0"),
        SystemDnsBackend::new(),
        TcpTransport::default(),
        config,
    );

    manager.start().await?;
    println!("Connected to {:?}", manager.endpoint());

    for i in 0..3 {
        let payload = format!("{{\"seq\":{i}}}\n");
        match manager.send(payload.as_bytes()).await {
            Ok(n) => println!("Sent {n} bytes"),
            // Not connected: skip this cycle.
            Err(SendError::NotConnected) => println!("Skipped payload {i}"),
            Err(e) => {
                println!("Send failed: {e}");
                manager.reconnect().await?;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    manager.shutdown().await;
    println!("State: {}", manager.current_state());
    Ok(())
}
