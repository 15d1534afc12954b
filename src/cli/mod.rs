use clap::{Parser, Subcommand};

/// `walletgate` - human-approved request relay between dApp pages and a
/// wallet popup.
#[derive(Parser, Debug)]
#[command(name = "walletgate")]
#[command(version)]
#[command(about = "Relay page wallet requests through a human approval popup.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the popup surface: request bridge, page gateway and approval prompt
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Show configuration and the last persisted state of every request store
    Status,
}
