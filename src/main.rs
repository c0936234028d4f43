use actix_web::{web, App, HttpServer, middleware::Compress};
use actix_cors::Cors;
use metrics_exporter_prometheus::PrometheusBuilder;
use utoipa_swagger_ui::SwaggerUi;
use utoipa::OpenApi;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use tracing_actix_web::TracingLogger;

use neta::auth::hash_password;
use neta::clock::SystemClock;
use neta::config::Settings;
use neta::openapi::ApiDoc;
use neta::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use neta::repo::{AdminRepo, Repo};
use neta::routes::{config, AppState};
use neta::security::SecurityHeaders;
use neta::storage::build_media_store;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env is only picked up in debug builds
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping neta server");
    let settings = Settings::from_env();
    info!(?settings, "loaded settings");

    let repo = build_repo().await?;
    bootstrap_admin(repo.as_ref()).await?;

    let media_store = build_media_store().await?;
    let metrics = PrometheusBuilder::new().install_recorder()?;
    let rate_limiter = RateLimiterFacade::new(InMemoryRateLimiter::new(true), RateLimitConfig::from_env());
    {
        let rl = rate_limiter.clone();
        actix_web::rt::spawn(async move {
            let mut tick = actix_web::rt::time::interval(rl.cfg.prune_interval());
            loop {
                tick.tick().await;
                let dropped = rl.prune_idle();
                if dropped > 0 {
                    tracing::debug!(dropped, "pruned idle rate limit keys");
                }
            }
        });
    }

    let state = AppState::new(repo, media_store)
        .with_clock(Arc::new(SystemClock::with_offset_minutes(settings.vote_tz_offset_minutes)))
        .with_settings(settings.clone())
        .with_rate_limiter(rate_limiter)
        .with_metrics(metrics);

    let openapi = ApiDoc::openapi();
    let frontend = std::env::var("FRONTEND_URL").ok();

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Some(front) = &frontend {
                c = c.allowed_origin(front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::from_env())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((settings.bind_addr.as_str(), settings.port))?;

    info!("Listening on http://{}:{}", settings.bind_addr, settings.port);
    server.run().await?;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise the JSON-snapshot store.
async fn build_repo() -> anyhow::Result<Arc<dyn Repo>> {
    #[cfg(feature = "postgres-store")]
    if let Ok(db_url) = std::env::var("DATABASE_URL") {
        use sqlx::postgres::PgPoolOptions;
        let pool = PgPoolOptions::new().max_connections(10).connect(&db_url).await?;
        let repo = neta::repo::pg::PgRepo::new(pool);
        repo.migrate().await?;
        info!("Using Postgres repository backend");
        return Ok(Arc::new(repo));
    }
    fallback_repo()
}

#[cfg(feature = "inmem-store")]
fn fallback_repo() -> anyhow::Result<Arc<dyn Repo>> {
    info!("Using in-memory repository backend");
    Ok(Arc::new(neta::repo::inmem::InMemRepo::new()))
}

#[cfg(not(feature = "inmem-store"))]
fn fallback_repo() -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("DATABASE_URL must be set when the in-memory store is disabled")
}

async fn bootstrap_admin(repo: &dyn Repo) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (std::env::var("BOOTSTRAP_ADMIN_EMAIL"), std::env::var("BOOTSTRAP_ADMIN_PASSWORD")) else {
        warn!("BOOTSTRAP_ADMIN_EMAIL/BOOTSTRAP_ADMIN_PASSWORD not set; no admin account bootstrapped");
        return Ok(());
    };
    let hash = hash_password(&password)?;
    let admin = repo.upsert_admin(email.trim(), &hash).await?;
    info!(admin_id = admin.id, "bootstrap admin ready");
    Ok(())
}

fn validate_env_vars() -> anyhow::Result<()> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set (copy .env.example to .env)"))?;
    if secret.len() < 32 {
        anyhow::bail!("JWT_SECRET must be at least 32 characters long");
    }
    Ok(())
}
