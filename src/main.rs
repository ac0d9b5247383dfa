use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod gateway;
mod model;
mod models;
mod routes;
mod sync;
mod utils;

use crate::attendance::export::{Clock, SystemClock};
use crate::docs::ApiDoc;
use crate::gateway::LuxandClient;
use crate::routes::Limiters;
use crate::utils::roster_cache::RosterCache;
use crate::utils::username_filter::UsernameFilter;
use config::Config;
use db::init_db;
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "School attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;

    let gateway = LuxandClient::new(config.luxand_base_url.clone(), config.luxand_api_token.clone())
        .context("Failed to build recognition client")?;
    if !gateway.is_configured() {
        warn!("LUXAND_API_TOKEN is not set; recognition endpoints will answer 503");
    }

    let rosters = RosterCache::new(Duration::from_secs(config.roster_cache_ttl_secs));
    let usernames = UsernameFilter::new();
    let limiters = Limiters::from_config(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let filter_for_warmup = usernames.clone();
    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = filter_for_warmup.warmup(&pool_for_warmup, 100).await {
            log::error!("Failed to warmup username filter: {:?}", e);
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(gateway.clone()))
            .app_data(Data::new(rosters.clone()))
            .app_data(Data::new(usernames.clone()))
            .app_data(Data::from(clock.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
