use tokio::net::TcpListener;
use tokio::signal;

use server::config::ServerConfig;
use server::engine::Engine;
use server::scheduler::Scheduler;
use server::session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("loading configuration...");
    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr();

    log::info!("bootstrapping game engine against {}...", config.database_url);
    let engine = Engine::bootstrap(config).await?;

    let scheduler = Scheduler::new(engine.clone());
    let scheduler_handle = scheduler.clone();
    tokio::spawn(async move {
        scheduler_handle.run().await;
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("listening on {bind_addr}");

    let accept_engine = engine.clone();
    let accept_scheduler = scheduler.clone();
    let accept_task = tokio::spawn(async move {
        session::accept_loop(accept_engine, accept_scheduler, listener).await;
    });

    shutdown_signal().await;
    log::info!("shutdown signal received");

    accept_task.abort();
    engine.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
