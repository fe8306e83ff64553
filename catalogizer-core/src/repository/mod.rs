pub mod file;
pub mod filter;
pub mod media;
pub mod playlist;
pub mod reading;
pub mod recognition;
pub mod session;
pub mod storage_root;

pub use file::FileRepository;
pub use filter::{bind_sea_value, ColumnRef, Filter, FilterValue};
pub use media::MediaRepository;
pub use playlist::PlaylistRepository;
pub use reading::ReadingRepository;
pub use recognition::{DuplicateCandidate, RecognitionRepository};
pub use session::SessionRepository;
pub use storage_root::StorageRootRepository;
