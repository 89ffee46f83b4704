use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use mongodb::Client;
use std::time::Duration;
use tokio::time;

use workbench::auth::SessionTokenService;
use workbench::config::AppConfig;
use workbench::db::MongoDbContext;
use workbench::handlers;
use workbench::metrics::MetricsCollector;
use workbench::middleware::{admin_guard, session_guard};
use workbench::observability::LlmTracer;
use workbench::session::SessionManager;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if it exists (for development)
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting Workbench server...");

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    // Connect to MongoDB (one client per process; the driver pools
    // connections internally)
    log::info!("Connecting to MongoDB at {}...", app_config.database.uri);
    let client = Client::with_uri_str(&app_config.database.uri)
        .await
        .expect("Failed to connect to MongoDB");

    let metrics = MetricsCollector::new();
    let db_context = MongoDbContext::new(client, &app_config.database.name, metrics.clone());

    log::info!("Initializing database indexes...");
    db_context
        .init_indexes()
        .await
        .expect("Failed to initialize database indexes");

    let session_manager = SessionManager::new(app_config.auth.session_expiry_days);
    log::info!(
        "Session expiry set to {} days",
        app_config.auth.session_expiry_days
    );

    let auth_tokens = SessionTokenService::new(
        app_config.auth.session_secret.clone().into_bytes(),
        Duration::from_secs(app_config.auth.session_expiry_days * 24 * 3600),
    )
    .unwrap_or_else(|e| {
        eprintln!("Invalid SESSION_SECRET: {}", e);
        std::process::exit(1);
    });

    // Observability failures disable tracing, never abort startup
    let tracer = LlmTracer::init(&app_config.observability);

    let http_client = reqwest::Client::new();

    // Spawn background session cleanup
    let session_manager_clone = session_manager.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = session_manager_clone.cleanup_expired();
            if removed > 0 {
                log::info!("Background cleanup: removed {} expired sessions", removed);
            }
        }
    });

    let server_host = app_config.server.host.clone();
    let server_port = app_config.server.port;

    log::info!("Starting HTTP server at {}:{}...", server_host, server_port);

    let tracer_for_shutdown = tracer.clone();

    let http_result = HttpServer::new(move || {
        App::new()
            // Shared state
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(db_context.clone()))
            .app_data(web::Data::new(session_manager.clone()))
            .app_data(web::Data::new(auth_tokens.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .app_data(web::Data::new(tracer.clone()))
            .app_data(web::Data::new(http_client.clone()))
            // Middleware
            .wrap(actix_middleware::Logger::default())
            .wrap(actix_middleware::Compress::default())
            // Public routes (no authentication required)
            .service(handlers::health_check)
            .service(handlers::login)
            .service(handlers::oauth_callback)
            // Protected routes (session required)
            .service(
                web::scope("")
                    .wrap(actix_middleware::from_fn(session_guard))
                    .service(handlers::logout)
                    .service(handlers::me)
                    .service(handlers::create_workspace)
                    .service(handlers::log_ai_request)
                    .service(handlers::traceroute)
                    .service(handlers::connectivity)
                    // Admin routes (role required)
                    .service(
                        web::scope("")
                            .wrap(actix_middleware::from_fn(admin_guard))
                            .service(handlers::user_overview)
                            .service(handlers::metrics_snapshot),
                    ),
            )
    })
    .bind((server_host, server_port))?
    .run()
    .await;

    tracer_for_shutdown.flush().await;

    http_result
}
