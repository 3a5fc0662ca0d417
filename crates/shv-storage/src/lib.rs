//! shv-storage: the two external capabilities the vault core consumes
//!
//! - `fragments`: object store (`put` / `get` / `delete` of named blobs),
//!   implemented over an OpenDAL `Operator`
//! - `records`: file-record store (`create` / `find_by_id` / `delete`),
//!   in-memory or a JSON file with atomic writes

pub mod fragments;
pub mod health;
pub mod operator;
pub mod records;

pub use fragments::{FragmentStore, OpendalFragmentStore};
pub use health::{check_health, StorageHealth};
pub use operator::{build_from_core_config, build_operator, S3Settings};
pub use records::{JsonRecordStore, MemoryRecordStore, RecordStore};
