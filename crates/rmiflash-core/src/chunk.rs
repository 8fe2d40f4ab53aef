//! Block chunker
//!
//! Splits an arbitrary byte buffer into the fixed-size blocks the write
//! protocol transfers one command/acknowledge round trip at a time.

/// One fixed-size unit of the flash write protocol
///
/// Blocks are produced in strictly increasing index order with no gaps.
/// Only the final block of a region may carry a short payload, and only
/// when the region length is not an exact multiple of the block size
/// (the image validator guarantees exact multiples upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// 0-based sequential block index
    pub index: u32,
    /// Byte offset of this block in the target region
    pub address: u32,
    /// Block payload, at most one block size long
    pub data: &'a [u8],
}

/// Lazy iterator over the blocks of a buffer
///
/// Restartable: cloning yields a fresh iterator over the same buffer.
#[derive(Debug, Clone)]
pub struct BlockChunks<'a> {
    data: &'a [u8],
    start_address: u32,
    block_size: u16,
    index: u32,
}

/// Split `data` into blocks of `block_size` bytes, tagging each with its
/// index and its address relative to `start_address`.
///
/// Pure; an empty buffer (or a zero block size) yields an empty sequence.
pub fn chunk(data: &[u8], start_address: u32, block_size: u16) -> BlockChunks<'_> {
    BlockChunks {
        data,
        start_address,
        block_size,
        index: 0,
    }
}

impl<'a> Iterator for BlockChunks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Block<'a>> {
        if self.data.is_empty() || self.block_size == 0 {
            return None;
        }
        let take = usize::from(self.block_size).min(self.data.len());
        let (payload, rest) = self.data.split_at(take);
        let block = Block {
            index: self.index,
            address: self.start_address + self.index * u32::from(self.block_size),
            data: payload,
        };
        self.data = rest;
        self.index += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.len();
        (n, Some(n))
    }
}

impl ExactSizeIterator for BlockChunks<'_> {
    fn len(&self) -> usize {
        if self.block_size == 0 {
            return 0;
        }
        self.data.len().div_ceil(usize::from(self.block_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_concat_reproduces_buffer() {
        let data: Vec<u8> = (0..=255u8).cycle().take(0x803).collect();
        let mut out = Vec::new();
        for block in chunk(&data, 0, 0x20) {
            out.extend_from_slice(block.data);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_block_count_and_addresses() {
        let data = [0u8; 0x800];
        let blocks: Vec<_> = chunk(&data, 0x1000, 0x20).collect();
        assert_eq!(blocks.len(), 0x40);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.index, i as u32);
            assert_eq!(block.address, 0x1000 + (i as u32) * 0x20);
            assert_eq!(block.data.len(), 0x20);
        }
    }

    #[test]
    fn test_short_final_block() {
        let data = [0u8; 0x41];
        let blocks: Vec<_> = chunk(&data, 0, 0x20).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].data.len(), 1);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(chunk(&[], 0, 0x20).count(), 0);
    }

    #[test]
    fn test_zero_block_size() {
        let data = [0u8; 16];
        assert_eq!(chunk(&data, 0, 0).count(), 0);
    }

    #[test]
    fn test_restartable() {
        let data = [0u8; 0x100];
        let chunks = chunk(&data, 0, 0x20);
        let first: Vec<_> = chunks.clone().collect();
        let second: Vec<_> = chunks.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exact_size_hint() {
        let data = [0u8; 0x41];
        assert_eq!(chunk(&data, 0, 0x20).len(), 3);
    }
}
