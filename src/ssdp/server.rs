//! C6: the SSDP UDP listener. Handles `NOTIFY` (self-detection, feeds the
//! address book) and `M-SEARCH` (unicast replies) on a single reader task.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::addressbook::AddressBook;
use super::{build_search_response, location_url, parse_message};

/// Bind and join the SSDP multicast group on `bind_addr`.
pub async fn bind(bind_addr: Ipv4Addr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, super::MULTICAST_PORT))
        .await
        .context("failed to bind SSDP socket")?;
    socket
        .join_multicast_v4(super::MULTICAST_ADDR.parse().unwrap(), bind_addr)
        .context("failed to join SSDP multicast group")?;
    Ok(socket)
}

/// Run the listener until `cancel` fires or the socket errors out.
pub async fn run(
    socket: UdpSocket,
    device_port: u16,
    targets: Arc<HashMap<String, String>>,
    book: Arc<Mutex<AddressBook>>,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buf = [0u8; 4096];
    info!("SSDP listener ready on {}:{}", super::MULTICAST_ADDR, super::MULTICAST_PORT);

    loop {
        let (len, src) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = socket.recv_from(&mut buf) => result.context("SSDP recv_from failed")?,
        };

        let SocketAddr::V4(src_v4) = src else { continue };
        let Ok(text) = std::str::from_utf8(&buf[..len]) else { continue };
        let Some(msg) = parse_message(text) else { continue };

        match msg.method.as_str() {
            "NOTIFY" => handle_notify(&msg, *src_v4.ip(), &targets, &book, timeout),
            "M-SEARCH" => {
                if let Err(e) = handle_search(&socket, &msg, src, device_port, &targets, &book, timeout).await {
                    warn!("failed to answer M-SEARCH from {src}: {e}");
                }
            }
            other => debug!("ignoring SSDP method {other}"),
        }
    }
}

fn handle_notify(
    msg: &super::SsdpMessage,
    src_ip: Ipv4Addr,
    targets: &HashMap<String, String>,
    book: &Mutex<AddressBook>,
    timeout: Duration,
) {
    let Some(usn) = msg.header("usn") else { return };
    if targets.values().any(|v| v == usn) {
        debug!("learned local address {src_ip} from self NOTIFY");
        book.lock().unwrap().touch(src_ip, timeout);
    }
}

async fn handle_search(
    socket: &UdpSocket,
    msg: &super::SsdpMessage,
    src: SocketAddr,
    device_port: u16,
    targets: &HashMap<String, String>,
    book: &Mutex<AddressBook>,
    timeout: Duration,
) -> Result<()> {
    let Some(st) = msg.header("st") else { return Ok(()) };
    let SocketAddr::V4(src_v4) = src else { return Ok(()) };

    let matched: Vec<(&str, &str)> = if st == "ssdp:all" {
        targets.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    } else if let Some(usn) = targets.get(st) {
        vec![(st, usn.as_str())]
    } else {
        Vec::new()
    };

    if matched.is_empty() {
        return Ok(());
    }

    let chosen = book.lock().unwrap().closest_to(*src_v4.ip());
    let location = location_url(chosen, device_port);

    for (target, usn) in matched {
        let reply = build_search_response(target, usn, &location, timeout.as_secs());
        socket.send_to(reply.as_bytes(), src).await?;
    }
    Ok(())
}
