//! Fixed-size fragmenting
//!
//! Chunk `i` covers bytes `[i * chunk_size, min((i + 1) * chunk_size, len))`.
//! Every chunk but the last is exactly `chunk_size` bytes; the last holds the
//! remainder. Empty input yields no chunks.

use std::io::{self, Read};
use tokio::io::{AsyncRead, AsyncReadExt};

/// One plaintext chunk and its position in the source stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position
    pub index: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    /// Byte offset of this chunk within the source, given the chunk size
    pub fn offset(&self, chunk_size: usize) -> u64 {
        self.index * chunk_size as u64
    }
}

/// Split an in-memory buffer into ordered chunks.
///
/// # Panics
/// Panics if `chunk_size` is zero.
pub fn split(data: &[u8], chunk_size: usize) -> Vec<Chunk> {
    assert!(chunk_size > 0, "chunk_size must be at least 1");
    data.chunks(chunk_size)
        .enumerate()
        .map(|(i, c)| Chunk {
            index: i as u64,
            data: c.to_vec(),
        })
        .collect()
}

/// Iterator over chunks of a blocking reader.
///
/// Holds at most one chunk in memory at a time.
pub struct SplitReader<R> {
    reader: R,
    chunk_size: usize,
    next_index: u64,
    done: bool,
}

impl<R: Read> SplitReader<R> {
    /// # Panics
    /// Panics if `chunk_size` is zero.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        Self {
            reader,
            chunk_size,
            next_index: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for SplitReader<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        if filled < self.chunk_size {
            self.done = true;
        }
        if filled == 0 {
            return None;
        }

        buf.truncate(filled);
        let chunk = Chunk {
            index: self.next_index,
            data: buf,
        };
        self.next_index += 1;
        Some(Ok(chunk))
    }
}

/// Incremental fragmenter over an async reader.
pub struct AsyncFragmenter<R> {
    reader: R,
    chunk_size: usize,
    next_index: u64,
    done: bool,
}

impl<R: AsyncRead + Unpin> AsyncFragmenter<R> {
    /// # Panics
    /// Panics if `chunk_size` is zero.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        Self {
            reader,
            chunk_size,
            next_index: 0,
            done: false,
        }
    }

    /// Number of chunks produced so far
    pub fn produced(&self) -> u64 {
        self.next_index
    }

    /// Read the next chunk, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = match self.reader.read(&mut buf[filled..]).await {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            };
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < self.chunk_size {
            self.done = true;
        }
        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        let chunk = Chunk {
            index: self.next_index,
            data: buf,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lengths(chunks: &[Chunk]) -> Vec<usize> {
        chunks.iter().map(|c| c.data.len()).collect()
    }

    #[test]
    fn ten_bytes_by_four() {
        let data: Vec<u8> = (0u8..10).collect();
        let chunks = split(&data, 4);
        assert_eq!(lengths(&chunks), vec![4, 4, 2]);
        assert_eq!(chunks[2].data, vec![8, 9]);
        assert_eq!(chunks[2].offset(4), 8);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split(&[], 4).is_empty());
        assert_eq!(SplitReader::new(&[][..], 4).count(), 0);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let data = vec![7u8; 12];
        let chunks = split(&data, 4);
        assert_eq!(lengths(&chunks), vec![4, 4, 4]);
    }

    #[test]
    #[should_panic(expected = "chunk_size")]
    fn zero_chunk_size_panics() {
        split(b"abc", 0);
    }

    /// Reader that hands out at most 3 bytes per call
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn reader_fills_chunks_across_short_reads() {
        let data: Vec<u8> = (0u8..=200).collect();
        let chunks: Vec<Chunk> = SplitReader::new(Trickle(&data), 64)
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lengths(&chunks), vec![64, 64, 64, 9]);
        assert_eq!(chunks, split(&data, 64));
    }

    #[tokio::test]
    async fn async_fragmenter_matches_slice_split() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut fragmenter = AsyncFragmenter::new(&data[..], 1000);

        let mut chunks = Vec::new();
        while let Some(chunk) = fragmenter.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }

        assert_eq!(fragmenter.produced(), 10);
        assert_eq!(chunks, split(&data, 1000));
        assert!(fragmenter.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn async_fragmenter_empty() {
        let mut fragmenter = AsyncFragmenter::new(&b""[..], 16);
        assert!(fragmenter.next_chunk().await.unwrap().is_none());
        assert_eq!(fragmenter.produced(), 0);
    }

    proptest! {
        /// Chunk i covers [i*n, min((i+1)*n, len))
        #[test]
        fn chunk_boundaries(data in proptest::collection::vec(any::<u8>(), 0..=4096), n in 1usize..=700) {
            let chunks = split(&data, n);
            prop_assert_eq!(chunks.len(), data.len().div_ceil(n));
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i as u64);
                let start = i * n;
                let end = ((i + 1) * n).min(data.len());
                prop_assert_eq!(&chunk.data[..], &data[start..end]);
            }
        }

        #[test]
        fn reader_agrees_with_slice(data in proptest::collection::vec(any::<u8>(), 0..=4096), n in 1usize..=700) {
            let from_reader: Vec<Chunk> = SplitReader::new(&data[..], n)
                .collect::<io::Result<_>>()
                .unwrap();
            prop_assert_eq!(from_reader, split(&data, n));
        }
    }
}
