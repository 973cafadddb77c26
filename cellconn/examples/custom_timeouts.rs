/// Example demonstrating custom timeout and retry configuration.
///
/// Slow networks may need longer link and resolve timeouts; a flaky modem may
/// warrant a larger reconnect budget with a gentler backoff.
use cellconn::host::{NoopModem, StaticInterface, SystemDnsBackend, TcpTransport};
use cellconn::{ConnectivityConfig, ConnectivityManager, EndpointPolicy, RetryPolicy};
use std::time::Duration;

#[tokio::main]
async fn main() -> cellconn::Result<()> {
    env_logger::init();

    let config = ConnectivityConfig::new()
        .with_hostname("localhost")
        .with_port(8080)
        .with_link_timeout(Duration::from_secs(300)) // Wait up to 5 min for the first attach
        .with_resolve_timeout(Duration::from_secs(30))
        .with_endpoint_policy(EndpointPolicy::Cache) // Keep the first resolved address
        .with_retry(RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
        });

    println!("Connectivity configured with:");
    println!("  Link timeout: {:?}", config.link_timeout);
    println!("  Resolve timeout: {:?}", config.resolve_timeout);
    println!("  Reconnect attempts: {}", config.retry.max_attempts);

    let mut manager = ConnectivityManager::new(
        NoopModem::new(),
        StaticInterface::new("eth0"),
        SystemDnsBackend::new(),
        TcpTransport {
            connect_timeout: Duration::from_secs(60),
            ..Default::default()
        },
        config,
    );

    manager.start().await?;
    println!("Connected successfully!");

    manager.shutdown().await;

    // You can also use the defaults
    let defaults = ConnectivityConfig::default();
    println!("\nDefault timeouts:");
    println!("  Link timeout: {:?}", defaults.link_timeout);
    println!("  Reconnect link timeout: {:?}", defaults.reconnect_link_timeout);
    println!("  DNS ready timeout: {:?}", defaults.dns_ready_timeout);

    Ok(())
}
