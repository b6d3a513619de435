//! C7: the periodic SSDP notifier. Sends a BYE burst on start, ALIVE bursts
//! on an interval, and a final BYE burst on cancellation.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::addressbook::AddressBook;
use super::{build_notify, location_url};

const REPEAT_GAP: Duration = Duration::from_millis(200);

pub async fn bind() -> Result<UdpSocket> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("failed to bind SSDP notifier socket")
}

pub async fn run(
    socket: UdpSocket,
    device_port: u16,
    targets: Arc<HashMap<String, String>>,
    book: Arc<Mutex<AddressBook>>,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let destination: SocketAddr = format!("{}:{}", super::MULTICAST_ADDR, super::MULTICAST_PORT)
        .parse()
        .expect("multicast address/port are valid constants");

    send_burst(&socket, destination, device_port, &targets, &book, timeout, false).await?;
    book.lock().unwrap().expire();
    send_burst(&socket, destination, device_port, &targets, &book, timeout, true).await?;

    let interval = timeout / 3;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("SSDP notifier shutting down, sending final byebye burst");
                send_burst(&socket, destination, device_port, &targets, &book, timeout, false).await?;
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {
                book.lock().unwrap().expire();
                send_burst(&socket, destination, device_port, &targets, &book, timeout, true).await?;
            }
        }
    }
}

async fn send_burst(
    socket: &UdpSocket,
    destination: SocketAddr,
    device_port: u16,
    targets: &HashMap<String, String>,
    book: &Mutex<AddressBook>,
    timeout: Duration,
    alive: bool,
) -> Result<()> {
    for attempt in 0..2 {
        if attempt > 0 {
            tokio::time::sleep(REPEAT_GAP).await;
        }
        let addresses = book.lock().unwrap().effective();
        for addr in &addresses {
            for (target, usn) in targets.iter() {
                let payload = if alive {
                    let alive_info = if *addr == Ipv4Addr::UNSPECIFIED {
                        None
                    } else {
                        Some((location_url(*addr, device_port), timeout.as_secs()))
                    };
                    build_notify(target, usn, alive_info.as_ref().map(|(loc, t)| (loc.as_str(), *t)))
                } else {
                    build_notify(target, usn, None)
                };
                socket.send_to(payload.as_bytes(), destination).await?;
            }
        }
    }
    Ok(())
}
