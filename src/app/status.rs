use crate::config::Config;
use crate::machine::PersistedSnapshot;

/// Render the `status` report for `config` and the persisted store rows.
///
/// `snapshots` is `None` when the store backend keeps nothing across runs.
pub fn render_status(config: &Config, snapshots: Option<&[PersistedSnapshot]>) -> String {
    let mut lines = vec![
        "◆ walletgate status".to_string(),
        String::new(),
        format!("version     {}", env!("CARGO_PKG_VERSION")),
        format!("config      {}", config.config_path.display()),
        format!("surface     {}", config.surface.kind),
        format!(
            "gateway     ws://{}:{}/rpc",
            config.gateway.host, config.gateway.port
        ),
        format!(
            "review      {}",
            describe_timeout(config.approval.review_timeout_secs)
        ),
        format!(
            "call        {}",
            describe_timeout(config.approval.call_timeout_secs)
        ),
        format!(
            "wallet      {}",
            if config.wallet.key_hex.is_some() {
                "configured key"
            } else {
                "ephemeral key"
            }
        ),
        String::new(),
    ];

    match snapshots {
        None => lines.push(format!(
            "store       {} (nothing persisted)",
            config.store.backend
        )),
        Some(rows) => {
            lines.push(format!(
                "store       {} ({})",
                config.store.backend,
                config.store.resolved_path().display()
            ));
            if rows.is_empty() {
                lines.push("  no requests recorded yet".to_string());
            }
            for row in rows {
                lines.push(format!(
                    "  {:6} {:10} rev {:<4} {}  {}",
                    row.category,
                    row.state.to_string(),
                    row.revision,
                    row.request_id.as_deref().unwrap_or("-"),
                    row.updated_at
                ));
            }
        }
    }

    lines.join("\n")
}

fn describe_timeout(secs: u64) -> String {
    if secs == 0 {
        "no deadline".to_string()
    } else {
        format!("{secs}s")
    }
}
