//! shv-chunks: fixed-size fragmenting, reassembly, and fragment digests
//!
//! # Overview
//! - `split`: cut a byte stream into ordered fixed-size chunks (slice, blocking
//!   reader, or async reader; readers never hold more than one chunk)
//! - `assemble`: concatenate chunks back in index order
//! - `digest`: BLAKE3 digests used to check stored fragments before decryption
//!
//! Round-trip law: `merge(split(x, n)) == x` for every `x` and every `n >= 1`.

pub mod assemble;
pub mod digest;
pub mod split;

pub use assemble::{merge, merge_indexed, AssembleError};
pub use digest::{digest_hex, hash_bytes, hash_from_hex, hash_to_hex, Hash};
pub use split::{split, AsyncFragmenter, Chunk, SplitReader};
