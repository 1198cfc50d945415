mod handlers;

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use buaa_ics_core::{
    ProviderConfig, cache::FileStore, providers::buaa::BuaaProvider, service::CalendarService,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{AppState, create_app};

const DEFAULT_STORE_DIR: &str = "./calendars";
const DEFAULT_PORT: u16 = 3000;

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buaa_ics_server=info,buaa_ics_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ProviderConfig::from_env()?;
    let port = env_non_empty("PORT")
        .map(|p| p.parse::<u16>().with_context(|| format!("Invalid PORT: {p}")))
        .transpose()?
        .unwrap_or(DEFAULT_PORT);
    let store_dir = env_non_empty("BUAA_ICS_STORE_DIR").unwrap_or_else(|| DEFAULT_STORE_DIR.to_string());
    tracing::info!("日历保存目录: {}", store_dir);
    tracing::warn!("用户密码会以明文写入 {}/<username>.config", store_dir);

    let provider = BuaaProvider::with_config(&config)?;
    let store = FileStore::new(&store_dir)?;
    let app = create_app(AppState {
        service: Arc::new(CalendarService::new(provider, store)),
        public_base: env_non_empty("BUAA_ICS_PUBLIC_BASE"),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("BUAA ICS Server starting on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
