use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use folio_api::config::Config;
use folio_api::geo::{GeoLocator, HttpGeoLocator, NoGeoLocator};
use folio_api::google::GoogleClient;
use folio_api::mailer::LettreSmtp;
use folio_api::state::{AppState, AppStateInner};
use folio_api::uploads::Storage;
use folio_crypto::Sealer;
use folio_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=debug,folio_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    if config.has_placeholder_secret() {
        if cfg!(debug_assertions) {
            warn!("FOLIO_JWT_SECRET is unset or a placeholder; fine for development only");
        } else {
            eprintln!("FATAL: FOLIO_JWT_SECRET is unset or still a placeholder.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    }

    let db = Database::open(&config.db_path)?;
    let storage = Storage::new(config.upload_dir.clone()).await?;

    let geo: Arc<dyn GeoLocator> = if config.geo_url.is_empty() {
        info!("IP geolocation disabled");
        Arc::new(NoGeoLocator)
    } else {
        Arc::new(HttpGeoLocator::new(&config.geo_url))
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        sealer: Sealer::new(&config.secret_key),
        storage,
        google: Arc::new(GoogleClient::new(config.google.clone())),
        smtp: Arc::new(LettreSmtp),
        geo,
        config,
    });

    let app = folio_api::router(state);

    info!("Folio listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Folio stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
