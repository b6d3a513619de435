use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dlnasrv::config::{resolve_bind_addr, Args, ServerConfig};
use dlnasrv::device::DlnaDevice;

#[tokio::main]
async fn main() -> Result<()> {
    dlnasrv::logging::init();

    let mut args = Args::parse();

    // Resolve the bind port once, here, before anything derives a UUID or
    // advertises a LOCATION from it — `--port 0` asks the OS to pick one,
    // and every other component needs that final value, not the sentinel.
    let bind_addr = resolve_bind_addr(&args.address)?;
    let std_listener =
        std::net::TcpListener::bind((bind_addr, args.port)).context("failed to bind HTTP listener")?;
    std_listener.set_nonblocking(true)?;
    args.port = std_listener.local_addr()?.port();
    let http_listener = tokio::net::TcpListener::from_std(std_listener)?;

    let config = ServerConfig::from_args(args).context("invalid configuration")?;
    info!("device UUID uuid:{}", config.device_uuid);

    let device = DlnaDevice::new(config).context("failed to initialize device")?;

    device.run(http_listener, shutdown_signal()).await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
