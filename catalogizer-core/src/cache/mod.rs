pub mod key_builder;
pub mod recognition_cache;

pub use key_builder::KeyBuilder;
pub use recognition_cache::{RecognitionCache, DEFAULT_TTL_HOURS};
