//! Reassembly: the inverse of `split`

use thiserror::Error;

use crate::split::Chunk;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("missing chunk {expected} (next present is {found})")]
    Gap { expected: u64, found: u64 },

    #[error("duplicate chunk {0}")]
    Duplicate(u64),
}

/// Concatenate already-ordered chunks.
pub fn merge<I, B>(chunks: I) -> Vec<u8>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(chunk.as_ref());
    }
    out
}

/// Order chunks by index, require exactly `0..n`, then concatenate.
///
/// Arrival order is irrelevant; only `Chunk::index` decides placement.
pub fn merge_indexed(mut chunks: Vec<Chunk>) -> Result<Vec<u8>, AssembleError> {
    chunks.sort_by_key(|c| c.index);

    for (expected, chunk) in chunks.iter().enumerate() {
        let expected = expected as u64;
        if chunk.index < expected {
            return Err(AssembleError::Duplicate(chunk.index));
        }
        if chunk.index > expected {
            return Err(AssembleError::Gap {
                expected,
                found: chunk.index,
            });
        }
    }

    let total = chunks.iter().map(|c| c.data.len()).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in &chunks {
        out.extend_from_slice(&chunk.data);
    }
    Ok(out)
}
