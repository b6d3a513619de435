//! Startup configuration: CLI parsing and validation (component C9, ambient).

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use uuid::Uuid;

/// What object ID the root container reports as its own parent.
///
/// The literal behavior this server was distilled from makes the root its
/// own parent (`"0"`); UPnP implementations more commonly use the
/// out-of-band sentinel `"-1"`. Both are accepted and `MinusOne` is the
/// default — see the root `parent_id` decision in DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RootParentIdMode {
    Zero,
    MinusOne,
}

impl RootParentIdMode {
    pub fn root_parent_id(self) -> String {
        match self {
            RootParentIdMode::Zero => "0".to_string(),
            RootParentIdMode::MinusOne => "-1".to_string(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "dlnasrv", about = "A DLNA/UPnP AV media server")]
pub struct Args {
    /// Bind address; empty means all interfaces.
    #[arg(long, default_value = "")]
    pub address: String,

    /// Bind port; 0 lets the OS choose one.
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Root directory of media to serve.
    #[arg(long, default_value = ".")]
    pub media: PathBuf,

    /// Friendly name advertised to controllers; defaults to the host name.
    #[arg(long)]
    pub name: Option<String>,

    /// SSDP advertisement timeout, in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Directory holding the XML template bundle.
    #[arg(long, default_value = "templates")]
    pub templates: PathBuf,

    /// What object ID the root container reports as its own parent.
    #[arg(long, value_enum, default_value_t = RootParentIdMode::MinusOne)]
    pub root_parent_mode: RootParentIdMode,
}

/// Immutable, validated startup configuration. Constructed once and shared
/// via `Arc` with every other component.
#[derive(Debug)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub bind_port: u16,
    pub media_root: PathBuf,
    pub friendly_name: String,
    pub ssdp_timeout_secs: u64,
    pub templates_dir: PathBuf,
    pub root_parent_mode: RootParentIdMode,
    pub device_uuid: Uuid,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> Result<Arc<Self>> {
        let media_root = args
            .media
            .canonicalize()
            .with_context(|| format!("media root does not exist: {}", args.media.display()))?;
        if !media_root.is_dir() {
            bail!("media root is not a directory: {}", media_root.display());
        }

        let templates_dir = args
            .templates
            .canonicalize()
            .with_context(|| format!("templates directory does not exist: {}", args.templates.display()))?;
        if !templates_dir.is_dir() {
            bail!("templates path is not a directory: {}", templates_dir.display());
        }

        let bind_addr = resolve_bind_addr(&args.address)?;

        let friendly_name = match args.name {
            Some(n) if !n.trim().is_empty() => n,
            _ => hostname::get()
                .context("could not determine local host name")?
                .to_string_lossy()
                .into_owned(),
        };

        let device_uuid = compute_device_uuid(bind_addr, args.port);

        Ok(Arc::new(ServerConfig {
            bind_addr,
            bind_port: args.port,
            media_root,
            friendly_name,
            ssdp_timeout_secs: args.timeout,
            templates_dir,
            root_parent_mode: args.root_parent_mode,
            device_uuid,
        }))
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", display_addr(self.bind_addr), self.bind_port)
    }
}

/// Empty string means "all interfaces"; anything else must parse as an IP.
pub fn resolve_bind_addr(address: &str) -> Result<IpAddr> {
    if address.trim().is_empty() {
        Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    } else {
        address.parse().with_context(|| format!("invalid bind address: {address}"))
    }
}

fn display_addr(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) if v4.is_unspecified() => "127.0.0.1".to_string(),
        other => other.to_string(),
    }
}

/// A UUIDv5 derived from the literal bound host:port — including the
/// `0.0.0.0` wildcard address when bound to all interfaces, never rewritten
/// to a routable form. Stable across restarts as long as the bind tuple
/// doesn't change.
fn compute_device_uuid(addr: IpAddr, port: u16) -> Uuid {
    let name = format!("http://{addr}:{port}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_deterministic_for_same_bind_tuple() {
        let a = compute_device_uuid(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 8200);
        let b = compute_device_uuid(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 8200);
        assert_eq!(a, b);
    }

    #[test]
    fn uuid_differs_for_different_ports() {
        let a = compute_device_uuid(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 8200);
        let b = compute_device_uuid(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 8201);
        assert_ne!(a, b);
    }

    #[test]
    fn uuid_hashes_the_literal_wildcard_address_unrewritten() {
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"http://0.0.0.0:8200");
        assert_eq!(compute_device_uuid(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8200), expected);
    }

    #[test]
    fn root_parent_mode_defaults_to_minus_one() {
        assert_eq!(RootParentIdMode::MinusOne.root_parent_id(), "-1");
        assert_eq!(RootParentIdMode::Zero.root_parent_id(), "0");
    }
}
