use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use cv_match::config::Settings;
use cv_match::routes::{self, AppState};
use cv_match::services::{CompletionOptions, OpenAiBackend, ResultCache, ScoringService, SqliteCache};
use cv_match::Matcher;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration before logging so the logging section applies
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Configuration error: {}", e))
    })?;

    // Initialize logging; LOG_LEVEL / LOG_FORMAT override the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting CV Match service...");
    info!("Configuration loaded successfully");
    info!("Model: {}", settings.backend.model);
    info!("Database path: {}", settings.cache.database_path);
    info!("Match threshold: {}", settings.matching.threshold);

    if settings.backend.api_key.is_empty() {
        warn!("No backend API key configured; scoring requests will fail");
    }

    // Open the result cache
    if let Some(parent) = Path::new(&settings.cache.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let ttl = settings.cache.ttl();
    let cache = Arc::new(
        SqliteCache::open(&settings.cache.database_path, settings.cache.l1_capacity, ttl)
            .await
            .map_err(|e| startup_error("Failed to open cache database", e))?,
    );

    info!(
        "Cache opened (L1: {} entries, TTL: {}h)",
        settings.cache.l1_capacity, settings.cache.ttl_hours
    );

    // Initialize scoring backend
    let options = CompletionOptions {
        model: settings.backend.model.clone(),
        temperature: settings.backend.temperature,
        max_tokens: settings.backend.max_tokens,
        timeout: settings.backend.timeout(),
    };

    let backend = OpenAiBackend::new(&settings.backend.base_url, &settings.backend.api_key, options)
        .map_err(|e| startup_error("Failed to create backend client", e))?;

    info!("Scoring backend initialized ({})", settings.backend.base_url);

    let scorer = Arc::new(ScoringService::new(Arc::new(backend)));
    let matcher = Matcher::new(cache.clone(), scorer);

    // Cleanup old cache entries
    match matcher.sweep_cache(ttl).await {
        Ok(removed) => info!("Old cache entries cleaned up ({} removed)", removed),
        Err(e) => warn!("Cache sweep failed, continuing: {}", e),
    }

    // Build application state
    let app_state = AppState { matcher };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    info!("Shutting down, closing cache");
    if let Ok(size) = cache.len().await {
        info!("Cache holds {} entries", size);
    }
    cache.close().await;

    result
}
