//! Service initialization and dependency injection
//!
//! The only place services are wired together. Tests inject alternative
//! providers, caches or collaborators through the same constructors.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::fs::HandlerFactory;
use crate::provider::{
    BookProvider, GameProvider, MovieProvider, MusicProvider, ProviderRegistry,
};
use crate::repository::{
    FileRepository, MediaRepository, PlaylistRepository, ReadingRepository,
    RecognitionRepository, SessionRepository, StorageRootRepository,
};
use crate::service::{
    DirectoryAggregator, MusicSessionEngine, PlaylistManager, ReaderSessionEngine,
    RecognitionOrchestrator, SmartPlaylistEvaluator,
};
use crate::Result;

/// Fully wired core services
pub struct Services {
    pub storage_root_repo: StorageRootRepository,
    pub file_repo: FileRepository,
    pub media_repo: MediaRepository,
    pub handler_factory: Arc<HandlerFactory>,
    pub orchestrator: Arc<RecognitionOrchestrator>,
    pub aggregator: DirectoryAggregator,
    pub playlist_manager: PlaylistManager,
    pub music_engine: MusicSessionEngine,
    pub reader_engine: ReaderSessionEngine,
}

/// Construct every core service against one pool and configuration
pub fn init_services(pool: PgPool, config: &Config) -> Result<Services> {
    let storage_root_repo = StorageRootRepository::new(pool.clone());
    let file_repo = FileRepository::new(pool.clone());
    let media_repo = MediaRepository::new(pool.clone());
    let recognition_repo = RecognitionRepository::new(pool.clone());
    let playlist_repo = PlaylistRepository::new(pool.clone());
    let session_repo = SessionRepository::new(pool.clone());
    let reading_repo = ReadingRepository::new(pool.clone());

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MovieProvider::new(&config.recognition)?));
    registry.register(Arc::new(MusicProvider::new(&config.recognition)?));
    registry.register(Arc::new(BookProvider::new(&config.recognition)?));
    registry.register(Arc::new(GameProvider::new(&config.recognition)?));
    let registry = Arc::new(registry);

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        registry.clone(),
        recognition_repo,
        &config.recognition,
    ));

    let aggregator = DirectoryAggregator::new(
        file_repo.clone(),
        media_repo.clone(),
        storage_root_repo.clone(),
    );

    let evaluator = SmartPlaylistEvaluator::new(pool);
    let playlist_manager = PlaylistManager::new(playlist_repo.clone(), evaluator);

    let music_engine = MusicSessionEngine::new(
        session_repo,
        media_repo.clone(),
        playlist_repo,
        file_repo.clone(),
    );
    let reader_engine =
        ReaderSessionEngine::new(reading_repo, config.server.share_base_url());

    info!(
        providers = ?registry.names(),
        "Core services initialized"
    );

    Ok(Services {
        storage_root_repo,
        file_repo,
        media_repo,
        handler_factory: Arc::new(HandlerFactory::new()),
        orchestrator,
        aggregator,
        playlist_manager,
        music_engine,
        reader_engine,
    })
}
