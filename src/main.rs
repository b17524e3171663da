use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use folio::auth::{GatewayIdentity, IdentityResolver, JwtIdentity};
use folio::gateway::{AuthGateway, BaasAuthGateway};
use folio::openapi::ApiDoc;
use folio::rate_limit::RateLimiterFacade;
use folio::repo::Repo;
use folio::storage::build_media_store;
use folio::{config, AppConfig, AppState, SecurityHeaders};

#[cfg(feature = "postgres-store")]
async fn build_repo() -> std::io::Result<Arc<dyn Repo>> {
    use sqlx::postgres::PgPoolOptions;
    let db_url = std::env::var("DATABASE_URL")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&db_url)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let repo = folio::repo::pg::PgRepo::new(pool);
    if folio::config::flag_env("RUN_MIGRATIONS") {
        repo.migrate()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        info!("migrations applied");
    }
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo() -> std::io::Result<Arc<dyn Repo>> {
    info!("Using in-memory repository backend");
    Ok(Arc::new(folio::repo::inmem::InMemRepo::new()))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment explicitly.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping folio server");

    let settings = AppConfig::from_env();
    info!(
        baas_configured = settings.baas_configured(),
        frontend = %settings.frontend_url,
        "configuration loaded"
    );

    let repo = build_repo().await?;

    let (gateway, identity): (Option<Arc<dyn AuthGateway>>, Option<Arc<dyn IdentityResolver>>) = match &settings.baas {
        Some(baas) => {
            let gateway: Arc<dyn AuthGateway> = Arc::new(BaasAuthGateway::new(&baas.url, &baas.anon_key));
            let identity: Arc<dyn IdentityResolver> = match &baas.jwt_secret {
                Some(secret) => Arc::new(JwtIdentity::new(secret.clone())),
                None => {
                    info!("BAAS_JWT_SECRET not set; sessions are verified against the auth service");
                    Arc::new(GatewayIdentity::new(gateway.clone()))
                }
            };
            (Some(gateway), Some(identity))
        }
        None => (None, None),
    };
    let media = build_media_store(&settings).await;

    let bind_addr = settings.bind_addr.clone();
    let frontend_url = settings.frontend_url.clone();
    let state = AppState {
        repo,
        identity,
        gateway,
        media,
        limiter: RateLimiterFacade::from_env(),
        settings: Arc::new(settings),
    };
    let hsts = state.settings.enable_hsts;

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // local frontend dev servers
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::default().with_hsts(hsts))
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&bind_addr)?;

    info!("Listening on http://{bind_addr}");

    server.run().await
}
