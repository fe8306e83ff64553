pub mod file;
pub mod id;
pub mod media;
pub mod playlist;
pub mod reading;
pub mod recognition;
pub mod session;

pub use file::{FileRecord, StorageRoot, StorageRootStatus};
pub use id::{
    generate_id, FileId, MediaItemId, PlaylistId, SessionId, StorageRootId, UserId,
};
pub use media::{
    DirectoryAnalysis, DirectoryInfo, DuplicateGroup, ExternalIds, MediaFile, MediaItem,
    MediaType, MediaTypeRow,
};
pub use playlist::{
    CreatePlaylistRequest, Playlist, PlaylistItem, RuleLogic, SmartPlaylistCriteria, SmartRule,
};
pub use reading::{
    Bookmark, Highlight, ReadingPosition, ReadingSession, ReadingSettings, ReadingStats,
    SyncConflict, SyncStatus,
};
pub use recognition::{
    AudioFingerprint, CoverArt, DuplicateInfo, DuplicateMatch, OcrResult, OcrTextBlock,
    RecognitionRequest, RecognitionResult, TranslatedMetadata,
};
pub use session::{
    AdvanceOutcome, Crossfade, DeviceInfo, Equalizer, PlayMode, PlaybackSession, QueueTrack,
    RepeatMode, SESSION_TTL_HOURS,
};
