//! Fast, non-cryptographic hashing for the internal registries. Keys are uuids and
//! short group labels.

pub use rustc_hash::{FxHashMap as FastHashMap, FxHashSet as FastHashSet};
