#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod bucket;

pub mod error;
pub mod hash;
pub mod key;
pub mod table;

pub use bucket::BUCKET_CAPACITY;
pub use error::TableError;
pub use key::KEY_MAX_LEN;
pub use key::KeyBuf;
pub use table::Table;
