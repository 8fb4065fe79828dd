use std::ops::Range;

/// Default number of items processed by a single chunk job.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// A contiguous slice of an input collection handled by one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub len: usize,
}

impl Chunk {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Number of chunks needed to cover `len` items. A zero chunk size is treated as 1.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

/// Splits `0..len` into consecutive chunks of at most `chunk_size` items.
pub fn plan_chunks(len: usize, chunk_size: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    (0..chunk_count(len, chunk_size))
        .map(|index| {
            let start = index * chunk_size;
            Chunk {
                index,
                start,
                len: chunk_size.min(len - start),
            }
        })
        .collect()
}
