use std::{process, sync::Arc};

use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vellum::{
    application::{
        error::AppError,
        reload::Reloader,
        render::{RenderPipeline, TemplateStore},
        repos::ContentSource,
    },
    cache::PageCache,
    config,
    domain::site::SiteDefinition,
    infra::{
        db::PostgresStore,
        error::InfraError,
        http::{self, AdminState, HttpState},
        memory::StaticContentSource,
        signals, telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
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
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Reload(_) => run_reload(settings).await,
    }
}

struct ApplicationContext {
    reloader: Arc<Reloader>,
    db: Option<Arc<PostgresStore>>,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let site = Arc::new(SiteDefinition::blog()?);
    let templates = Arc::new(TemplateStore::new(&settings.site.template_dir));
    let cache = PageCache::new(&settings.site.cache_dir);
    let pipeline = RenderPipeline::new(site, templates, cache);

    let db = connect_store(settings).await?;
    let source: Arc<dyn ContentSource> = match db.as_ref() {
        Some(db) => db.clone() as Arc<dyn ContentSource>,
        None => {
            warn!(
                target = "vellum::startup",
                "no database configured; store-driven prerender paths will be empty"
            );
            Arc::new(StaticContentSource::new())
        }
    };

    Ok(ApplicationContext {
        reloader: Arc::new(Reloader::new(pipeline, source)),
        db,
    })
}

async fn connect_store(
    settings: &config::Settings,
) -> Result<Option<Arc<PostgresStore>>, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        return Ok(None);
    };

    let store = PostgresStore::connect(database_url, settings.database.max_connections)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    store
        .migrate()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Some(Arc::new(store)))
}

async fn run_reload(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    let report = app.reloader.reload().await?;

    if !report.failed.is_empty() || !report.skipped_specs.is_empty() {
        warn!(
            target = "vellum::reload",
            failed = report.failed.len(),
            skipped_specs = report.skipped_specs.len(),
            "reload finished with failures"
        );
    }
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    if settings.site.reload_on_startup {
        // An aborted startup reload leaves the server usable; pages render on demand.
        if let Err(err) = app.reloader.reload().await {
            error!(target = "vellum::startup", error = %err, "startup reload aborted");
        }
    }

    let hangup_handle = signals::spawn_reload_on_hangup(app.reloader.clone());

    let http_state = HttpState {
        pipeline: app.reloader.pipeline().clone(),
    };
    let admin_state = AdminState {
        reloader: app.reloader.clone(),
        db: app.db.clone(),
    };

    let result = serve_http(&settings, http_state, admin_state).await;

    hangup_handle.abort();
    let _ = hangup_handle.await;

    result
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;

    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(public_addr, err)))?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(admin_addr, err)))?;

    info!(
        target = "vellum::startup",
        public = %public_addr,
        admin = %admin_addr,
        "listening"
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let mut public_shutdown = shutdown_tx.subscribe();
    let mut admin_shutdown = shutdown_tx.subscribe();

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = public_shutdown.recv().await;
        });
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = admin_shutdown.recv().await;
        });

    let grace = settings.server.graceful_shutdown;
    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            return Ok(());
        }
        () = signals::shutdown_signal() => {
            let _ = shutdown_tx.send(());
        }
    }

    match tokio::time::timeout(grace, servers).await {
        Ok(result) => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        Err(_) => {
            warn!(
                target = "vellum::shutdown",
                timeout_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}
