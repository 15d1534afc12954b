use crate::app::status::render_status;
use crate::cli::{Cli, Commands};
use crate::config::{Config, ConfigHandle};
use crate::gateway::run_gateway;
use crate::machine::open_store;
use crate::popup::{PopupRuntime, run_approval_prompt};
use anyhow::{Context, Result};
use tracing::{info, warn};

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            info!(host = %host, port, "starting walletgate popup");
            serve(config, &host, port).await
        }
        Commands::Status => {
            let snapshots = if config.store.backend == "memory" {
                None
            } else {
                let store = open_store(&config.store).await?;
                Some(store.list().await?)
            };
            println!("{}", render_status(&config, snapshots.as_deref()));
            Ok(())
        }
    }
}

async fn serve(config: Config, host: &str, port: u16) -> Result<()> {
    let handle = ConfigHandle::new(config);
    let mut runtime = PopupRuntime::init(&handle.load()).await?;
    if !runtime.gate().surface().is_privileged() {
        warn!("surface is `page`: every page call will be refused as unavailable");
    }

    let services = runtime.services().clone();
    let prompt = tokio::spawn(async move {
        if let Err(error) = run_approval_prompt(services.sign, services.send).await {
            warn!(%error, "approval prompt stopped");
        }
    });

    let gateway = run_gateway(host, port, runtime.gate());
    tokio::pin!(gateway);
    let mut reload = ReloadSignal::install()?;

    let outcome = loop {
        tokio::select! {
            result = &mut gateway => break result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break Ok(());
            }
            () = reload.recv() => {
                if let Err(error) = handle.reload() {
                    warn!(%error, "config reload rejected, keeping previous settings");
                    continue;
                }
                let call_timeout = handle.load().approval.call_timeout();
                match runtime.rebind(call_timeout) {
                    Ok(()) => info!(?call_timeout, "config reloaded, bridge rebuilt"),
                    Err(error) => warn!(%error, "failed to rebuild bridge after reload"),
                }
            }
        }
    };

    prompt.abort();
    runtime.teardown();
    outcome
}

/// SIGHUP re-reads the config file. Never fires off unix.
struct ReloadSignal {
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ReloadSignal {
    fn install() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let hangup = signal(SignalKind::hangup()).context("install SIGHUP handler")?;
            Ok(Self { hangup })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if self.hangup.recv().await.is_some() {
            return;
        }
        std::future::pending::<()>().await;
    }
}
