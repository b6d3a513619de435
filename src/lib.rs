//! A DLNA/UPnP AV media server: SSDP discovery, HTTP range streaming and
//! ContentDirectory SOAP browsing over a live view of a filesystem tree.

pub mod config;
pub mod device;
pub mod didl;
pub mod error;
pub mod logging;
pub mod objectpath;
pub mod soap;
pub mod ssdp;
pub mod targets;
pub mod templates;
pub mod web;
pub mod xml;
