//! C8: the device facade. Owns the UUID, target map, template bundle and
//! address book, and sequences startup/shutdown across C3, C5 (inside C3),
//! C6 and C7.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::ssdp::addressbook::AddressBook;
use crate::targets;
use crate::templates::TemplateBundle;
use crate::web::{self, AppState};

pub struct DlnaDevice {
    config: Arc<ServerConfig>,
    templates: Arc<TemplateBundle>,
    targets: Arc<std::collections::HashMap<String, String>>,
    book: Arc<Mutex<AddressBook>>,
}

impl DlnaDevice {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let templates = Arc::new(
            TemplateBundle::load(&config.templates_dir).context("failed to load XML template bundle")?,
        );
        let targets = Arc::new(targets::build_target_map(config.device_uuid));
        let book = Arc::new(Mutex::new(AddressBook::new()));
        Ok(DlnaDevice { config, templates, targets, book })
    }

    /// Run until `shutdown` resolves. `http_listener` must already be bound
    /// to the device's advertised port (see `main.rs`: the port is resolved
    /// before this device, or any other component, is constructed).
    pub async fn run(self, http_listener: TcpListener, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
        let cancel = CancellationToken::new();
        let timeout = Duration::from_secs(self.config.ssdp_timeout_secs);
        let device_port = self.config.bind_port;

        let ssdp_bind_addr = match self.config.bind_addr {
            std::net::IpAddr::V4(v4) => v4,
            std::net::IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        };

        let listener_socket = crate::ssdp::server::bind(ssdp_bind_addr)
            .await
            .context("failed to start SSDP listener")?;
        let notifier_socket = crate::ssdp::notifier::bind().await.context("failed to start SSDP notifier")?;

        let mut tasks = tokio::task::JoinSet::new();

        tasks.spawn({
            let targets = self.targets.clone();
            let book = self.book.clone();
            let cancel = cancel.clone();
            async move { crate::ssdp::server::run(listener_socket, device_port, targets, book, timeout, cancel).await }
        });

        tasks.spawn({
            let targets = self.targets.clone();
            let book = self.book.clone();
            let cancel = cancel.clone();
            async move { crate::ssdp::notifier::run(notifier_socket, device_port, targets, book, timeout, cancel).await }
        });

        let app_state = Arc::new(AppState {
            config: self.config.clone(),
            templates: self.templates.clone(),
            subscriptions: Mutex::new(std::collections::HashMap::new()),
        });
        let router = web::build_router(app_state);

        info!(
            "dlnasrv \"{}\" serving {} on {}",
            self.config.friendly_name,
            self.config.media_root.display(),
            self.config.base_url()
        );

        let http_cancel = cancel.clone();
        let http_result = axum::serve(http_listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown => {}
                    _ = http_cancel.cancelled() => {}
                }
            })
            .await;

        info!("HTTP engine stopped, shutting down SSDP tasks");
        cancel.cancel();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("SSDP task exited with error: {e:#}"),
                Err(e) => error!("SSDP task panicked: {e}"),
            }
        }

        http_result.context("HTTP server error")?;
        Ok(())
    }
}
