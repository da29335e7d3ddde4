//! # Newsroom server
//!
//! Loads settings, connects the store and cache, wires the services into
//! the router and serves until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::http::{router, AppState};
use api_adapters::Metrics;
use auth_adapters::{
    default_sources, Argon2AdminVerifier, FetchSource, HttpPostFetcher, RandomCredentialIssuer,
};
use configs::{LogFormat, Settings, TelemetrySettings};
use domains::ports::{Cache, PostFetcher};
use secrecy::ExposeSecret;
use services::identity::claim::{ClaimTemplate, ClaimVerifier};
use services::rate_limit::spawn_sweeper;
use services::{
    AddressHasher, CacheAside, IdentityService, Lexicon, ModerationFilter, ReadLimitConfig,
    ReadLimiter, StoryService, StorySettings, WriteLimiter,
};
use storage_adapters::{NoopCache, PgStore, PoolOptions, RedisCache};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

fn init_tracing(telemetry: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.filter))
        .context("invalid log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match telemetry.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

async fn connect_cache(settings: &Settings) -> Arc<dyn Cache> {
    let Some(url) = settings.redis.url.as_ref() else {
        tracing::info!("no redis url configured; caching disabled");
        return Arc::new(NoopCache);
    };
    match RedisCache::connect(url.expose_secret()).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!(error = %e, "redis unavailable; continuing without cache");
            Arc::new(NoopCache)
        }
    }
}

fn load_lexicon(settings: &Settings) -> anyhow::Result<Lexicon> {
    match &settings.moderation.lexicon_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading moderation lexicon");
            Lexicon::from_json_file(path).context("failed to load moderation lexicon")
        }
        None => Lexicon::embedded().context("embedded lexicon is invalid"),
    }
}

fn claim_fetchers(settings: &Settings) -> anyhow::Result<Vec<Arc<dyn PostFetcher>>> {
    let configured = &settings.verification.sources;
    let sources = if configured.is_empty() {
        default_sources()
    } else {
        configured
            .iter()
            .map(|s| FetchSource {
                name: s.name.clone(),
                url_template: s.url.clone(),
                max_bytes: s.max_bytes,
                json: s.json,
            })
            .collect()
    };
    let timeout = Duration::from_secs(settings.verification.fetch_timeout_secs);
    let fetchers = HttpPostFetcher::from_sources(sources, timeout)
        .context("failed to build claim-post HTTP client")?;
    Ok(fetchers
        .into_iter()
        .map(|f| Arc::new(f) as Arc<dyn PostFetcher>)
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings.telemetry)?;

    tracing::info!(address = %settings.server.bind_address(), "starting newsroom");

    let pool_options = PoolOptions {
        max_connections: settings.database.max_connections,
        min_connections: settings.database.min_connections,
        acquire_timeout: Duration::from_secs(settings.database.acquire_timeout_secs),
    };
    let store = Arc::new(
        PgStore::connect(settings.database_url()?, &pool_options)
            .await
            .context("failed to connect to postgres")?,
    );
    store.migrate().await.context("failed to run migrations")?;

    let cache = CacheAside::new(connect_cache(&settings).await);

    if settings.security.ip_hash_key.is_none() {
        tracing::warn!("security.ip_hash_key is empty; vote hashes are unkeyed");
    }
    let hasher = AddressHasher::new(settings.security.ip_hash_key_bytes());

    let moderation = Arc::new(ModerationFilter::new(load_lexicon(&settings)?));

    let limits = &settings.rate_limit;
    let read_limiter = Arc::new(ReadLimiter::new(ReadLimitConfig::from_rpm(
        limits.reader_rpm,
        limits.reader_table_ceiling,
    )));
    let write_limiter = Arc::new(WriteLimiter::new(
        store.clone(),
        limits.writer_max_posts,
        chrono::Duration::seconds(limits.writer_window_secs),
    ));
    let sweeper = spawn_sweeper(
        read_limiter.clone(),
        write_limiter.clone(),
        Duration::from_secs(limits.sweep_interval_secs),
        chrono::Duration::seconds(limits.retention_secs),
    );

    let verifier = ClaimVerifier::new(
        claim_fetchers(&settings)?,
        ClaimTemplate::new(&settings.verification.claim_tag),
        Duration::from_secs(settings.verification.deadline_secs),
    );
    let identity = Arc::new(IdentityService::new(
        store.clone(),
        Arc::new(RandomCredentialIssuer::new()),
        verifier,
        settings.verification.require_confirmed_claim,
    ));

    let stories = Arc::new(StoryService::new(
        store.clone(),
        write_limiter,
        moderation,
        cache,
        hasher,
        StorySettings {
            preview_chars: settings.stories.preview_chars,
            default_per_page: settings.stories.default_per_page,
            max_per_page: settings.stories.max_per_page,
            list_ttl: Duration::from_secs(settings.cache.list_ttl_secs),
            story_ttl: Duration::from_secs(settings.cache.story_ttl_secs),
            stats_ttl: Duration::from_secs(settings.cache.stats_ttl_secs),
        },
    ));

    let state = AppState {
        identity,
        stories,
        read_limiter,
        admin: Arc::new(Argon2AdminVerifier::new(settings.admin.api_key_hash.take())),
        metrics: Arc::new(Metrics::new()),
        version: env!("CARGO_PKG_VERSION"),
        trust_forwarded: settings.server.trust_forwarded_headers,
    };
    let app = router(state, settings.request_timeout());

    let listener = TcpListener::bind(settings.server.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_address()))?;
    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    store.pool().close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
