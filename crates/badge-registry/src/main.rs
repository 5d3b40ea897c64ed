//! 徽章注册表服务入口

use std::sync::Arc;

use badge_registry::{
    BadgeRegistry,
    api::{self, AppState},
    store,
};
use badge_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 仅用于本地开发，不存在时忽略
    let _ = dotenvy::dotenv();

    let config = AppConfig::load("badge-registry").unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {e}");
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        backend = %config.store.backend,
        collection = %config.store.collection,
        "Starting badge-registry on {}",
        config.server_addr()
    );

    let registry = Arc::new(BadgeRegistry::unconfigured().with_collection(&config.store.collection));

    // 存储连接失败时不退出：注册表保持未初始化状态，接口返回 503
    match store::connect(&config).await {
        Ok(document_store) => registry.set_store(document_store).await,
        Err(e) => warn!(error = %e, "文档存储连接失败，服务以未初始化状态启动"),
    }

    let app = api::router(AppState::new(registry));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// 监听关闭信号（Ctrl+C 或 SIGTERM）
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
