//! Two-region bump allocator scoped to a single document or request.
//!
//! One fixed buffer backs both regions. The permanent region grows from the
//! front and lives as long as the arena; the temporary region grows from the
//! back and is reclaimed in O(1) by [`Arena::reset_temp`]. Allocations hand
//! out [`Span`] handles that are resolved through the arena, so a permanent
//! slice can be read between temporary allocations without aliasing.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Default capacity of a per-document arena.
pub const DEFAULT_CAPACITY: usize = 8 * 1024 * 1024;

const ALIGN: usize = std::mem::size_of::<usize>();

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("arena exhausted: requested {requested} bytes, {available} of {capacity} free")]
    Exhausted {
        requested: usize,
        available: usize,
        capacity: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Permanent,
    Temporary,
}

/// Handle to bytes allocated from an [`Arena`].
///
/// Temporary spans are only meaningful until the next [`Arena::reset_temp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: usize,
    len: usize,
    region: Region,
    epoch: u32,
}

impl Span {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

pub struct Arena {
    buf: Box<[u8]>,
    perm: usize,
    temp: usize,
    epoch: u32,
}

fn align_up(n: usize) -> Option<usize> {
    n.checked_add(ALIGN - 1).map(|v| v & !(ALIGN - 1))
}

impl Arena {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity & !(ALIGN - 1);
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            perm: 0,
            temp: capacity,
            epoch: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still free between the two regions.
    pub fn available(&self) -> usize {
        self.temp - self.perm
    }

    pub fn used_permanent(&self) -> usize {
        self.perm
    }

    pub fn used_temporary(&self) -> usize {
        self.buf.len() - self.temp
    }

    pub fn alloc_perm(&mut self, n: usize) -> Result<Span, ArenaError> {
        self.alloc(n, Region::Permanent)
    }

    pub fn alloc_temp(&mut self, n: usize) -> Result<Span, ArenaError> {
        self.alloc(n, Region::Temporary)
    }

    pub fn alloc(&mut self, n: usize, region: Region) -> Result<Span, ArenaError> {
        let size = align_up(n).ok_or_else(|| self.exhausted(n))?;
        if size > self.temp - self.perm {
            return Err(self.exhausted(n));
        }

        let start = match region {
            Region::Permanent => {
                let start = self.perm;
                self.perm += size;
                start
            }
            Region::Temporary => {
                self.temp -= size;
                self.temp
            }
        };

        Ok(Span {
            start,
            len: n,
            region,
            epoch: self.epoch,
        })
    }

    fn exhausted(&self, requested: usize) -> ArenaError {
        ArenaError::Exhausted {
            requested,
            available: self.available(),
            capacity: self.capacity(),
        }
    }

    /// Releases every temporary allocation. Permanent spans stay valid.
    pub fn reset_temp(&mut self) {
        self.temp = self.buf.len();
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn get(&self, span: Span) -> &[u8] {
        self.check(span);
        &self.buf[span.start..span.start + span.len]
    }

    pub fn get_mut(&mut self, span: Span) -> &mut [u8] {
        self.check(span);
        &mut self.buf[span.start..span.start + span.len]
    }

    fn check(&self, span: Span) {
        debug_assert!(
            span.region == Region::Permanent || span.epoch == self.epoch,
            "temporary span used after reset_temp"
        );
    }

    /// Reads a whole file into the requested region.
    pub fn read_file<P: AsRef<Path>>(&mut self, path: P, region: Region) -> Result<Span, ArenaError> {
        let mut file = File::open(path.as_ref())?;
        let size = usize::try_from(file.metadata()?.len()).map_err(|_| self.exhausted(usize::MAX))?;

        let span = self.alloc(size, region)?;
        file.read_exact(self.get_mut(span))?;
        Ok(span)
    }
}
