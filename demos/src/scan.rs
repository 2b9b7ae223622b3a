//! Scan a TwinCAT peer: register a route, connect, introspect the EtherCAT
//! topology, dump symbols, and watch one of them for a few seconds.
//!
//! ```text
//! scan <peer-ip> <local-net-id> [symbol-to-watch]
//! ```

use catio::client::{Client, ClientConfig, RouteInfo};
use catio::core::protocol::NotificationSettings;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let peer_ip: std::net::IpAddr = args
        .next()
        .ok_or("usage: scan <peer-ip> <local-net-id> [symbol]")?
        .parse()?;
    let local_id = args
        .next()
        .ok_or("usage: scan <peer-ip> <local-net-id> [symbol]")?
        .parse()?;
    let watch = args.next();

    let client = Client::new(ClientConfig::new(local_id, peer_ip.to_string()));

    let peer_id = client
        .add_route(
            peer_ip,
            RouteInfo {
                route_name: "catio-scan".into(),
                host_name: "catio".into(),
                host_ip: peer_ip.to_string(),
                user_name: "Administrator".into(),
                password: "1".into(),
            },
        )
        .await?;
    println!("peer is {peer_id}");

    client.connect(peer_ip, peer_id).await?;
    let server = client.introspect().await?;
    println!(
        "{} {} build {}: {} device(s)",
        server.name,
        server.version,
        server.build,
        server.devices.len()
    );

    for device in &server.devices {
        println!(
            "  [{}] {} ({} slaves, link {:?})",
            device.id,
            device.name,
            device.slaves.len(),
            device.link_state
        );
        for slave in &device.slaves {
            println!(
                "    {:>5}  {} [{:?}]",
                slave.address, slave.name, slave.state
            );
        }

        let catalog = client.load_symbols(device.id).await?;
        println!(
            "    {} symbols ({} dropped)",
            catalog.len(),
            catalog.dropped()
        );
    }

    if let Some(name) = watch {
        let device_id = server.devices.first().map(|d| d.id).unwrap_or(1);
        // 100 ms server cycle, expressed in 100 ns units
        let sub = client
            .subscribe(device_id, &name, NotificationSettings::server_cycle(1_000_000))
            .await?;
        println!("watching {name} for 3 s");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline {
            match sub.recv_timeout(Duration::from_millis(500)).await {
                Ok(sample) => println!("  {} -> {:02x?}", sample.timestamp, sample.data),
                Err(e) => {
                    println!("  {e}");
                    break;
                }
            }
        }
        sub.cancel().await?;
    }

    client.close().await;
    Ok(())
}
