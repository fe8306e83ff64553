pub mod aggregator;
pub mod music_session;
pub mod playlist;
pub mod reader_session;
pub mod recognition;
pub mod smart_playlist;

pub use aggregator::{AggregateSummary, DirectoryAggregator};
pub use music_session::MusicSessionEngine;
pub use playlist::PlaylistManager;
pub use reader_session::{
    AddBookmarkRequest, AddHighlightRequest, ReaderSessionEngine, StartReadingRequest,
    UpdatePositionRequest,
};
pub use recognition::RecognitionOrchestrator;
pub use smart_playlist::SmartPlaylistEvaluator;
