//! SSDP discovery: the UDP multicast listener (C6) and the periodic
//! notifier (C7), sharing an address book, a target map, and a small
//! HTTP/1.1-shaped text grammar for parsing/building messages.

pub mod addressbook;
pub mod notifier;
pub mod server;

use std::collections::HashMap;

pub const MULTICAST_ADDR: &str = "239.255.255.250";
pub const MULTICAST_PORT: u16 = 1900;

/// Fixed identifier sent as `SERVER:`; the exact value doesn't affect
/// conformance, only its shape.
pub const SERVER_HEADER: &str = concat!(
    "Linux/5.0 UPnP/1.0 ",
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

#[derive(Debug)]
pub struct SsdpMessage {
    pub method: String,
    pub headers: HashMap<String, String>,
}

impl SsdpMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Parse an SSDP datagram using the same request-line-plus-headers grammar
/// HTTP/1.1 uses, since SSDP messages are HTTP-shaped text with no body.
pub fn parse_message(raw: &str) -> Option<SsdpMessage> {
    let mut lines = raw.split("\r\n");
    let request_line = lines.next()?;
    let method = request_line.split_whitespace().next()?.to_ascii_uppercase();

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (key, value) = line.split_once(':')?;
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Some(SsdpMessage { method, headers })
}

/// Build an M-SEARCH unicast reply.
pub fn build_search_response(st: &str, usn: &str, location: &str, timeout_secs: u64) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         EXT:\r\n\
         ST: {st}\r\n\
         USN: {usn}\r\n\
         CACHE-CONTROL: max-age={timeout_secs}\r\n\
         LOCATION: {location}\r\n\
         SERVER: {SERVER_HEADER}\r\n\
         \r\n"
    )
}

/// Build a NOTIFY message, either `ssdp:alive` (with cache-control and
/// location) or `ssdp:byebye` (without).
pub fn build_notify(nt: &str, usn: &str, alive: Option<(&str, u64)>) -> String {
    let mut msg = format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {MULTICAST_ADDR}:{MULTICAST_PORT}\r\n\
         SERVER: {SERVER_HEADER}\r\n\
         NT: {nt}\r\n"
    );
    match alive {
        Some((location, timeout_secs)) => {
            msg.push_str("NTS: ssdp:alive\r\n");
            msg.push_str(&format!("USN: {usn}\r\n"));
            msg.push_str(&format!("CACHE-CONTROL: max-age={timeout_secs}\r\n"));
            msg.push_str(&format!("LOCATION: {location}\r\n"));
        }
        None => {
            msg.push_str("NTS: ssdp:byebye\r\n");
            msg.push_str(&format!("USN: {usn}\r\n"));
        }
    }
    msg.push_str("\r\n");
    msg
}

pub fn location_url(addr: std::net::Ipv4Addr, port: u16) -> String {
    format!("http://{addr}:{port}/device-description.xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_and_headers_case_insensitively() {
        let raw = "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nST: ssdp:all\r\nMX: 2\r\n\r\n";
        let msg = parse_message(raw).unwrap();
        assert_eq!(msg.method, "M-SEARCH");
        assert_eq!(msg.header("st"), Some("ssdp:all"));
        assert_eq!(msg.header("ST"), Some("ssdp:all"));
    }

    #[test]
    fn alive_notify_carries_location_and_cache_control() {
        let msg = build_notify("upnp:rootdevice", "uuid:x::upnp:rootdevice", Some(("http://host/d.xml", 30)));
        assert!(msg.contains("NTS: ssdp:alive"));
        assert!(msg.contains("LOCATION: http://host/d.xml"));
        assert!(msg.contains("CACHE-CONTROL: max-age=30"));
    }

    #[test]
    fn byebye_notify_has_no_location() {
        let msg = build_notify("upnp:rootdevice", "uuid:x::upnp:rootdevice", None);
        assert!(msg.contains("NTS: ssdp:byebye"));
        assert!(!msg.contains("LOCATION"));
    }
}
