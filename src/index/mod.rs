pub mod extendible_hash_index;
pub mod index_key;

pub use extendible_hash_index::ExtendibleHashIndex;
pub use index_key::{hash_key, GenericKey, IndexKey};
