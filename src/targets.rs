//! The fixed set of service/device targets this device advertises and
//! answers searches for, plus the USN each target maps to.

use std::collections::HashMap;

use uuid::Uuid;

pub const ROOT_DEVICE: &str = "upnp:rootdevice";
pub const MEDIA_SERVER: &str = "urn:schemas-upnp-org:device:MediaServer:1";
pub const CONTENT_DIRECTORY: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
pub const CONNECTION_MANAGER: &str = "urn:schemas-upnp-org:service:ConnectionManager:1";

/// `target -> USN` for every service/device this device advertises, plus a
/// `uuid -> uuid` self-entry (the bare-UUID search target).
pub fn build_target_map(uuid: Uuid) -> HashMap<String, String> {
    let uuid_urn = format!("uuid:{uuid}");
    let mut map = HashMap::new();
    for target in [ROOT_DEVICE, MEDIA_SERVER, CONTENT_DIRECTORY, CONNECTION_MANAGER] {
        map.insert(target.to_string(), format!("{uuid_urn}::{target}"));
    }
    map.insert(uuid_urn.clone(), uuid_urn);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_service_target_gets_a_composite_usn() {
        let uuid = Uuid::nil();
        let map = build_target_map(uuid);
        assert_eq!(map[CONTENT_DIRECTORY], format!("uuid:{uuid}::{CONTENT_DIRECTORY}"));
        assert_eq!(map[&format!("uuid:{uuid}")], format!("uuid:{uuid}"));
        assert_eq!(map.len(), 5);
    }
}
