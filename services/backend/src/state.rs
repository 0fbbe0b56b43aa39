//! services/backend/src/state.rs
//!
//! The shared application state, created once at startup. Every service
//! receives its collaborators here instead of reaching for globals.

use crate::adapters::{
    FsBlobStore, NoIdentityProvider, OfflineDocumentDb, PgDocumentDb, PgIdentityProvider,
};
use crate::config::Config;
use crate::error::ApiError;
use ghost_gym_core::domain::Identity;
use ghost_gym_core::ports::{DocumentDatabase, IdentityProvider};
use ghost_gym_core::{
    ExerciseCatalog, FavoritesIndex, LocalStore, MigrationCoordinator, RemoteBackend, SessionLog,
    UnifiedRouter,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub local: Arc<LocalStore>,
    pub remote: RemoteBackend,
    pub router: Arc<UnifiedRouter>,
    pub migration: Arc<MigrationCoordinator>,
    pub favorites: Arc<FavoritesIndex>,
    pub catalog: Arc<ExerciseCatalog>,
    pub sessions: Arc<SessionLog>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Connects to the database when one is configured and wires every service.
    pub async fn build(config: Config) -> Result<Self, ApiError> {
        let (db, identity): (Arc<dyn DocumentDatabase>, Arc<dyn IdentityProvider>) =
            match &config.database_url {
                Some(url) => {
                    info!("Connecting to database...");
                    let pool = PgPoolOptions::new()
                        .max_connections(config.database_max_connections)
                        .connect(url)
                        .await?;
                    let documents = PgDocumentDb::new(pool.clone());
                    info!("Running database migrations...");
                    documents.run_migrations().await?;
                    info!("Database migrations complete.");
                    (Arc::new(documents), Arc::new(PgIdentityProvider::new(pool)))
                }
                None => {
                    warn!("DATABASE_URL is not set; running with local storage only");
                    (Arc::new(OfflineDocumentDb), Arc::new(NoIdentityProvider))
                }
            };
        Ok(Self::assemble(config, db, identity))
    }

    /// Wires the services over already-built adapters.
    pub fn assemble(
        config: Config,
        db: Arc<dyn DocumentDatabase>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let local = Arc::new(LocalStore::new(Arc::new(FsBlobStore::new(&config.data_dir))));
        let remote = RemoteBackend::new(db.clone());
        let favorites = Arc::new(FavoritesIndex::new(db.clone()));
        Self {
            router: Arc::new(UnifiedRouter::new(local.clone(), remote.clone())),
            migration: Arc::new(MigrationCoordinator::new(local.clone(), remote.clone())),
            catalog: Arc::new(ExerciseCatalog::new(
                db.clone(),
                favorites.clone(),
                config.search_candidate_cap,
            )),
            sessions: Arc::new(SessionLog::new(db)),
            config: Arc::new(config),
            local,
            remote,
            favorites,
            identity,
        }
    }

    /// Resolves an optional bearer token. A rejected token is an error; no
    /// token at all means an anonymous caller.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Option<Identity>, ApiError> {
        let Some(token) = token else {
            return Ok(None);
        };
        match self.identity.verify(token).await? {
            Some(identity) => Ok(Some(identity)),
            None => Err(ApiError::Port(ghost_gym_core::PortError::Unauthorized)),
        }
    }
}
