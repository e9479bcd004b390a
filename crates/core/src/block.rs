//! Fixed-size blocks and file splitting

use crate::hash::{hash_bytes, Digest};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// An immutable chunk of file content, identified by its digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub data: Bytes,
}

impl Block {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Content digest of this block
    pub fn digest(&self) -> Digest {
        hash_bytes(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Split a byte stream into blocks of `block_size` bytes
///
/// Every block except the last is exactly `block_size` long. Empty input
/// produces no blocks.
pub fn split_blocks<R: Read>(mut reader: R, block_size: usize) -> io::Result<Vec<Block>> {
    if block_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "block size must be greater than zero",
        ));
    }

    let mut blocks = Vec::new();
    loop {
        let mut buf = vec![0u8; block_size];
        let filled = fill_buf(&mut reader, &mut buf)?;
        if filled == 0 {
            break;
        }
        buf.truncate(filled);
        blocks.push(Block::new(buf));
        if filled < block_size {
            break;
        }
    }
    Ok(blocks)
}

/// Read until `buf` is full or EOF; short reads do not end a block early
fn fill_buf<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read a file and split it into blocks
pub fn read_blocks(path: &Path, block_size: usize) -> io::Result<Vec<Block>> {
    let file = File::open(path)?;
    split_blocks(BufReader::new(file), block_size)
}

/// Ordered block digests of a file
pub fn block_digests(path: &Path, block_size: usize) -> io::Result<Vec<Digest>> {
    Ok(read_blocks(path, block_size)?
        .iter()
        .map(Block::digest)
        .collect())
}
