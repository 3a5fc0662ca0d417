//! shv-vault: upload, retrieval, and deletion of fragmented encrypted files
//!
//! ```text
//! upload:   read ─▶ split ─▶ encrypt ─▶ put ─┐ (≤ max_in_flight)
//!                                            └─▶ hash password ─▶ create record
//! download: find record ─▶ verify password ─▶ get ─▶ digest ─▶ decrypt ─▶ merge
//! delete:   find record ─▶ delete every fragment ─▶ delete record
//! ```
//!
//! A record exists only if all of its fragments were stored. A failed upload
//! removes whatever fragments it managed to store.

mod cleanup;
pub mod delete;
pub mod retrieve;
pub mod upload;
pub mod vault;

pub use retrieve::RetrievedFile;
pub use upload::{UploadReceipt, UploadStage};
pub use vault::{list_files, Vault, VaultOptions};
