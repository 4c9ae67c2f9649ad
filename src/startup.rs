use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;

use crate::configuration::DatabaseSettings;
use crate::configuration::Settings;
use crate::configuration::StorageBackend;
use crate::routes::confirm_changes;
use crate::routes::create_voter;
use crate::routes::get_changes;
use crate::routes::get_voter;
use crate::routes::health_check;
use crate::routes::list_subscriptions;
use crate::routes::request_changes;
use crate::routes::subscribe;
use crate::routes::unsubscribe;
use crate::routes::update_voter;
use crate::service::Collaborators;
use crate::service::VoterService;
use crate::storage::run_migrations;

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
}

impl Application {
    /// Pick the collaborators according to `application.storage`, then
    /// `build_with` them. With Postgres, migrations are run first.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let collaborators = match cfg.application.storage {
            StorageBackend::Postgres => {
                let pool = get_connection_pool(&cfg.database);
                run_migrations(&pool).await?;
                Collaborators::postgres(pool)
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; nothing will be persisted");
                Collaborators::in_memory()
            }
        };
        Self::build_with(cfg, collaborators)
    }

    /// Bind the listener (port 0 picks a random free port) and wire the
    /// service onto the given collaborators.
    pub fn build_with(
        cfg: Settings,
        collaborators: Collaborators,
    ) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;
        let port = listener.local_addr()?.port();

        let service = VoterService::new(collaborators, &cfg.voters);
        let server = run(listener, service)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// connect_lazy only connects when the pool is used for the first time, so
/// db-free requests (e.g. health_check) work without a db
pub fn get_connection_pool(db_cfg: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(db_cfg.connection())
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    service: VoterService,
) -> Result<Server, anyhow::Error> {
    // `Data` is externally an `Arc`, so every worker shares the one service
    // (and with it, the one synchronizer)
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/voters")
                    .route("", web::post().to(create_voter))
                    .route("/{id}", web::get().to(get_voter))
                    .route("/{id}", web::put().to(update_voter))
                    .route("/{id}/subscriptions", web::get().to(list_subscriptions))
                    .route("/{id}/subscriptions", web::post().to(subscribe))
                    .route(
                        "/{id}/subscriptions/{newsletter_id}",
                        web::delete().to(unsubscribe),
                    )
                    .route("/{id}/changes", web::get().to(get_changes))
                    .route("/{id}/changes", web::put().to(request_changes))
                    .route("/{id}/changes/confirm", web::post().to(confirm_changes)),
            )
            .app_data(service.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
