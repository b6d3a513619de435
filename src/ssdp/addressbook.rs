//! The SSDP address book: a map-with-sentinel of locally-known interface
//! addresses, shared between the listener (C6) and the notifier (C7).

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct AddressEntry {
    /// `None` means the entry never expires (the sentinel).
    expiry: Option<Instant>,
}

/// Known local addresses this device can be reached at, learned from
/// incoming SSDP traffic. Always contains the `0.0.0.0` sentinel, which
/// [`effective`](Self::effective) hides whenever a real address is present.
#[derive(Debug)]
pub struct AddressBook {
    entries: HashMap<Ipv4Addr, AddressEntry>,
}

impl AddressBook {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(Ipv4Addr::UNSPECIFIED, AddressEntry { expiry: None });
        AddressBook { entries }
    }

    /// Record that `addr` was heard from now, extending its expiry.
    pub fn touch(&mut self, addr: Ipv4Addr, timeout: Duration) {
        if addr == Ipv4Addr::UNSPECIFIED {
            return;
        }
        self.entries.insert(addr, AddressEntry { expiry: Some(Instant::now() + timeout) });
    }

    /// Drop every non-sentinel entry whose expiry has lapsed.
    pub fn expire(&mut self) {
        let now = Instant::now();
        self.entries.retain(|addr, entry| {
            *addr == Ipv4Addr::UNSPECIFIED || entry.expiry.map(|e| e > now).unwrap_or(true)
        });
    }

    /// Addresses to iterate for advertisement/reply purposes: every real
    /// address if any exist, otherwise the sentinel alone.
    pub fn effective(&self) -> Vec<Ipv4Addr> {
        let real: Vec<Ipv4Addr> = self
            .entries
            .keys()
            .copied()
            .filter(|a| *a != Ipv4Addr::UNSPECIFIED)
            .collect();
        if real.is_empty() {
            vec![Ipv4Addr::UNSPECIFIED]
        } else {
            real
        }
    }

    /// The known address whose packed form has the smallest XOR distance to
    /// `client` — a cheap same-subnet bias without netmask introspection.
    pub fn closest_to(&self, client: Ipv4Addr) -> Ipv4Addr {
        let client_bits = u32::from(client);
        self.effective()
            .into_iter()
            .min_by_key(|addr| u32::from(*addr) ^ client_bits)
            .unwrap_or(Ipv4Addr::UNSPECIFIED)
    }
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_alone_is_returned_when_book_is_empty() {
        let book = AddressBook::new();
        assert_eq!(book.closest_to(Ipv4Addr::new(10, 0, 0, 5)), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn sentinel_is_hidden_once_a_real_address_exists() {
        let mut book = AddressBook::new();
        book.touch(Ipv4Addr::new(192, 168, 1, 10), Duration::from_secs(30));
        assert_eq!(book.effective(), vec![Ipv4Addr::new(192, 168, 1, 10)]);
    }

    #[test]
    fn closest_to_minimizes_xor_distance() {
        let mut book = AddressBook::new();
        book.touch(Ipv4Addr::new(192, 168, 1, 10), Duration::from_secs(30));
        book.touch(Ipv4Addr::new(10, 0, 0, 1), Duration::from_secs(30));
        let chosen = book.closest_to(Ipv4Addr::new(192, 168, 1, 200));
        assert_eq!(chosen, Ipv4Addr::new(192, 168, 1, 10));
    }

    #[test]
    fn expire_drops_stale_entries_but_keeps_sentinel() {
        let mut book = AddressBook::new();
        book.touch(Ipv4Addr::new(192, 168, 1, 10), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        book.expire();
        assert_eq!(book.effective(), vec![Ipv4Addr::UNSPECIFIED]);
    }
}
