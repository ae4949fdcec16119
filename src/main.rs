use std::sync::Arc;
use std::time::Instant;

use listing_scout::api::{build_app, AppState};
use listing_scout::config::{load_app_config, load_selector_rules};
use listing_scout::geo::{CoordinateResolver, Geocoder};
use listing_scout::refresh::{spawn_scheduler, RefreshState, Refresher};
use listing_scout::scrapers::{build_strategy, BrowserSession, ExtractContext, PageScraper};
use listing_scout::CacheStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("🏠 Listing Scout");
    info!("==========================================");
    info!("Target: {}", config.target_url);
    info!("Strategy: {:?}", config.strategy);

    let rules = load_selector_rules(config.selector_rules_path.as_deref())?.compile()?;

    let ctx = ExtractContext {
        rules,
        timings: config.timings.clone(),
        base_url: config.target_url.clone(),
        placeholder_image: config.placeholder_image.clone(),
    };
    let strategy = build_strategy(config.strategy, ctx);
    let session = BrowserSession::new(
        config.target_url.clone(),
        config.user_agent.clone(),
        config.timings.clone(),
    );
    let scraper = Arc::new(PageScraper::new(session, strategy));

    let geocoder = match &config.geocoder_api_key {
        Some(key) => Some(Geocoder::new(
            config.geocoder_url.clone(),
            key.clone(),
            config.geocoder_timeout,
        )?),
        None => {
            warn!("⚠️  GEOCODER_API_KEY not set, address geocoding disabled");
            None
        }
    };
    let resolver = CoordinateResolver::new(geocoder, config.token_prefix.clone());

    let cache = Arc::new(CacheStore::new());
    let refresher = Refresher::new(
        scraper,
        resolver,
        Arc::clone(&cache),
        Arc::new(RefreshState::new()),
    );
    let (scheduler, scheduler_task) = spawn_scheduler(
        Arc::new(refresher),
        config.refresh_interval,
        config.refresh_on_startup,
    );

    let app = build_app(AppState {
        cache,
        scheduler,
        started_at: Instant::now(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("🚀 Serving on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_task.abort();
    info!("👋 Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
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
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("received shutdown signal, starting graceful shutdown");
}
