use std::{process, sync::Arc};

use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use tutorium::{
    application::error::AppError,
    cache::{CacheClient, CacheConfig, CacheConnector, MemoryConnector},
    config::{self, CacheBackend},
    infra::{
        context::{AppContext, ContextOptions},
        db::PostgresRepositories,
        error::InfraError,
        http,
        memory::InMemoryRepositories,
        redis::RedisConnector,
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Warm(_) => run_warm(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    if settings.cache.warm_on_startup {
        let cache_admin = app.cache_admin.clone();
        app.tasks.spawn("startup_warm", async move {
            let report = cache_admin.warm().await;
            info!(
                target = "tutorium::warm",
                warmed = report.warmed.len(),
                missing = report.missing.len(),
                failed = report.failed.len(),
                "Startup warm finished"
            );
            Ok::<(), AppError>(())
        });
    }

    let result = serve_http(&settings, &app).await;

    app.cache.close().await;
    if tokio::time::timeout(settings.server.graceful_shutdown, app.tasks.shutdown())
        .await
        .is_err()
    {
        warn!(
            target = "tutorium::shutdown",
            pending = app.tasks.in_flight(),
            "Background tasks still running at shutdown deadline"
        );
    }

    result
}

async fn run_warm(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    let report = app.cache_admin.warm().await;
    app.tasks.shutdown().await;
    app.cache.close().await;

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render warm report: {err}")))?;
    println!("{rendered}");

    if report.warmed.is_empty() && !report.failed.is_empty() {
        return Err(AppError::unexpected("no warm target could be cached"));
    }
    Ok(())
}

async fn build_application_context(settings: &config::Settings) -> Result<AppContext, AppError> {
    let cache = init_cache(settings).await?;
    let options = ContextOptions::from(settings);

    let context = match settings.database.url.as_ref() {
        Some(database_url) => {
            let pool =
                PostgresRepositories::connect(database_url, settings.database.max_connections.get())
                    .await
                    .map_err(InfraError::from)?;

            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(InfraError::from)?;

            AppContext::build(Arc::new(PostgresRepositories::new(pool)), cache, options)
        }
        None => {
            warn!(
                target = "tutorium::store",
                "No database url configured; serving from an empty in-memory store"
            );
            AppContext::build(Arc::new(InMemoryRepositories::new()), cache, options)
        }
    };

    Ok(context)
}

async fn init_cache(settings: &config::Settings) -> Result<CacheClient, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let connector: Option<Arc<dyn CacheConnector>> = match settings.cache.backend {
        CacheBackend::Redis => Some(Arc::new(
            RedisConnector::new(&settings.cache.url).map_err(InfraError::from)?,
        )),
        CacheBackend::Memory => Some(Arc::new(MemoryConnector::new())),
        CacheBackend::Disabled => None,
    };

    let client = match connector {
        Some(connector) => CacheClient::new(connector, cache_config),
        None => CacheClient::disabled(cache_config),
    };

    let state = client.open().await;
    info!(
        target = "tutorium::cache",
        backend = client.backend_name(),
        state = %state,
        "Cache client opened"
    );
    Ok(client)
}

async fn serve_http(settings: &config::Settings, app: &AppContext) -> Result<(), AppError> {
    let public_router = http::build_router(app.public.clone());
    let admin_router = http::build_admin_router(app.admin.clone());

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.public_addr, err))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.admin_addr, err))?;

    info!(
        target = "tutorium::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "Listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "tutorium::shutdown", "Listeners stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "tutorium::shutdown", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "tutorium::shutdown", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
