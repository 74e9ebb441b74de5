pub mod model;
pub mod store;

pub use model::{learned_cache_key, normalize_question, Profile};
pub use store::{compute_hash, ProfileStore, StoreWriteOutcome};
