pub mod hot_reload;
pub mod schema;

pub use hot_reload::ConfigHandle;
pub use schema::{
    ApprovalConfig, Config, GatewayConfig, LogConfig, StoreConfig, SurfaceConfig, WalletConfig,
};
