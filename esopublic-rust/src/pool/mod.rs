//! Fixed-chunk memory pool.
//!
//! The pool pre-allocates one contiguous backing buffer and slices it into
//! `chunk_count` chunks of `chunk_size` bytes. A logical allocation (a
//! [`Chain`]) groups one or more chunks, not necessarily adjacent in the
//! backing buffer, and exposes byte-addressed reads and writes that stride
//! chunk boundaries transparently. Buffering variable-length frames this way
//! avoids heap fragmentation: the pool's memory footprint is fixed at
//! creation and every allocation is a whole number of chunks.

use alloc::vec::Vec;

use crate::error::Error;

mod chain;
pub use chain::Chain;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Usage {
  Free,
  Used,
  /// Provisionally reserved during a non-forced teardown scan.
  Locked,
}

struct Chunk {
  usage: Usage,
  /// High-water mark of written bytes within this chunk.
  used: usize,
  next: Option<usize>,
  prev: Option<usize>,
}

impl Chunk {
  const fn free() -> Self {
    Self { usage: Usage::Free, used: 0, next: None, prev: None }
  }

  fn release(&mut self) {
    *self = Self::free();
  }
}

/// Chunk pool with fixed geometry.
///
/// Created once with `chunk_count` chunks of `chunk_size` bytes each;
/// allocations are served in whole-chunk multiples. See [`Chain`] for the
/// byte-level access operations.
pub struct MemPool {
  chunk_size: usize,
  chunks: Vec<Chunk>,
  storage: Vec<u8>,
  closed: bool,
}

impl MemPool {
  /// Create a pool of `chunk_count` chunks of `chunk_size` bytes.
  ///
  /// The backing buffer is allocated in one piece and zero-initialized.
  /// Fails with [`Error::InvalidParam`] on zero geometry and
  /// [`Error::OutOfMemory`] if the heap cannot serve the buffer, leaking
  /// nothing in either case.
  pub fn new(chunk_count: usize, chunk_size: usize) -> Result<Self, Error> {
    if chunk_count == 0 || chunk_size == 0 {
      return Err(Error::InvalidParam);
    }
    let total = chunk_count.checked_mul(chunk_size).ok_or(Error::InvalidParam)?;

    let mut storage = Vec::new();
    storage.try_reserve_exact(total).map_err(|_| Error::OutOfMemory)?;
    storage.resize(total, 0);

    let mut chunks = Vec::new();
    chunks.try_reserve_exact(chunk_count).map_err(|_| Error::OutOfMemory)?;
    for _ in 0..chunk_count {
      chunks.push(Chunk::free());
    }

    Ok(Self { chunk_size, chunks, storage, closed: false })
  }

  /// The fixed chunk size in bytes.
  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  /// The fixed number of chunks.
  pub fn chunk_count(&self) -> usize {
    self.chunks.len()
  }

  /// Number of chunks currently free.
  pub fn free_chunks(&self) -> usize {
    self.chunks.iter().filter(|c| c.usage == Usage::Free).count()
  }

  fn chunks_needed(&self, bytes: usize) -> usize {
    bytes / self.chunk_size + usize::from(bytes % self.chunk_size != 0)
  }

  /// Resolve a chain to its head chunk, failing on stale or freed chains.
  fn chain_index(&self, chain: Chain) -> Result<usize, Error> {
    match self.chunks.get(chain.0) {
      Some(chunk) if chunk.usage == Usage::Used => Ok(chain.0),
      _ => Err(Error::NotFound),
    }
  }

  /// Claim `count` free chunks in array-scan order, linking them behind
  /// `tail` (or starting a fresh chain). The caller has verified that
  /// enough free chunks exist.
  fn claim(&mut self, count: usize, mut tail: Option<usize>) -> Option<usize> {
    let mut first = None;
    let mut claimed = 0;

    for idx in 0..self.chunks.len() {
      if claimed == count {
        break;
      }
      if self.chunks[idx].usage != Usage::Free {
        continue;
      }

      let chunk = &mut self.chunks[idx];
      chunk.usage = Usage::Used;
      chunk.used = 0;
      chunk.next = None;
      chunk.prev = tail;

      if let Some(tail) = tail {
        self.chunks[tail].next = Some(idx);
      }
      if first.is_none() {
        first = Some(idx);
      }
      tail = Some(idx);
      claimed += 1;
    }

    first
  }

  /// Allocate a chain covering at least `bytes` bytes.
  ///
  /// All-or-nothing: a dry-run scan verifies availability first, so a
  /// failed allocation leaves no partial chain behind.
  pub fn alloc(&mut self, bytes: usize) -> Result<Chain, Error> {
    if self.closed {
      return Err(Error::NotReady);
    }
    if bytes == 0 {
      return Err(Error::InvalidParam);
    }

    let needed = self.chunks_needed(bytes);
    if self.free_chunks() < needed {
      #[cfg(feature = "log")]
      log::debug!("pool alloc of {} byte(s) failed, {} chunk(s) free", bytes, self.free_chunks());
      return Err(Error::OutOfMemory);
    }

    self.claim(needed, None).map(Chain).ok_or(Error::OutOfMemory)
  }

  /// Grow or shrink the chain to cover `new_size` bytes, rounded up to the
  /// chunk granularity.
  ///
  /// Shrinking releases whole trailing chunks; growing appends freshly
  /// claimed chunks at the tail. A failed grow leaves the chain untouched.
  /// The head chunk never moves, so the [`Chain`] handle stays valid.
  pub fn realloc(&mut self, chain: Chain, new_size: usize) -> Result<(), Error> {
    if self.closed {
      return Err(Error::NotReady);
    }
    if new_size == 0 {
      return Err(Error::InvalidParam);
    }
    let head = self.chain_index(chain)?;

    let mut count = 1;
    let mut tail = head;
    while let Some(next) = self.chunks[tail].next {
      count += 1;
      tail = next;
    }

    let needed = self.chunks_needed(new_size);
    if needed < count {
      for _ in 0..count - needed {
        let prev = self.chunks[tail].prev;
        self.chunks[tail].release();
        if let Some(prev) = prev {
          self.chunks[prev].next = None;
        }
        tail = prev.unwrap_or(head);
      }
    } else if needed > count {
      let delta = needed - count;
      if self.free_chunks() < delta {
        #[cfg(feature = "log")]
        log::debug!("pool realloc to {} byte(s) failed, {} chunk(s) free", new_size, self.free_chunks());
        return Err(Error::OutOfMemory);
      }
      self.claim(delta, Some(tail));
    }

    Ok(())
  }

  /// Return every chunk of the chain to the pool in one operation.
  ///
  /// The whole chain is invalid afterwards; callers must not retain the
  /// handle. Pass the chain head: freeing from an interior chunk releases
  /// only the remainder, severing it cleanly from the predecessor.
  pub fn free_chain(&mut self, chain: Chain) -> Result<(), Error> {
    if self.closed {
      return Err(Error::NotReady);
    }
    let mut idx = self.chain_index(chain)?;

    if let Some(prev) = self.chunks[idx].prev {
      self.chunks[prev].next = None;
    }

    loop {
      let next = self.chunks[idx].next;
      self.chunks[idx].release();
      match next {
        Some(next) => idx = next,
        None => return Ok(()),
      }
    }
  }

  /// Tear the pool down, releasing the backing buffer.
  ///
  /// Without `force`, free chunks are provisionally locked while the scan
  /// checks for chunks still in use; finding one aborts with
  /// [`Error::NotReady`], reverting the provisional locks so the pool stays
  /// fully usable. With `force`, the storage is released regardless of any
  /// outstanding chains. Every later operation fails with
  /// [`Error::NotReady`].
  pub fn close(&mut self, force: bool) -> Result<(), Error> {
    if self.closed {
      return Ok(());
    }

    if !force {
      let mut in_use = false;
      for chunk in self.chunks.iter_mut() {
        match chunk.usage {
          Usage::Free => chunk.usage = Usage::Locked,
          Usage::Used => {
            in_use = true;
            break;
          }
          Usage::Locked => {}
        }
      }
      if in_use {
        for chunk in self.chunks.iter_mut() {
          if chunk.usage == Usage::Locked {
            chunk.usage = Usage::Free;
          }
        }
        return Err(Error::NotReady);
      }
    }

    self.chunks = Vec::new();
    self.storage = Vec::new();
    self.closed = true;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_geometry_is_rejected() {
    assert_eq!(MemPool::new(0, 512).err(), Some(Error::InvalidParam));
    assert_eq!(MemPool::new(12, 0).err(), Some(Error::InvalidParam));
  }

  #[test]
  fn alloc_rounds_up_and_free_returns_everything() {
    let mut pool = MemPool::new(12, 512).unwrap();

    let chain = pool.alloc(3000).unwrap();
    assert_eq!(pool.total_size(chain).unwrap(), 512 * 6);
    assert_eq!(pool.free_chunks(), 6);

    pool.free_chain(chain).unwrap();
    assert_eq!(pool.free_chunks(), 12);

    // The full capacity is allocatable again in one chain.
    let all = pool.alloc(12 * 512).unwrap();
    assert_eq!(pool.total_size(all).unwrap(), 12 * 512);
  }

  #[test]
  fn alloc_is_all_or_nothing() {
    let mut pool = MemPool::new(4, 16).unwrap();
    let _half = pool.alloc(32).unwrap();

    assert_eq!(pool.alloc(33).err(), Some(Error::OutOfMemory));
    // The failed request claimed nothing.
    assert_eq!(pool.free_chunks(), 2);
  }

  #[test]
  fn realloc_shrink_releases_exact_chunk_count() {
    let mut pool = MemPool::new(12, 512).unwrap();
    let chain = pool.alloc(3000).unwrap();
    pool.append(chain, &[0xAB; 1079], false).unwrap();

    pool.realloc(chain, 1079).unwrap();
    assert_eq!(pool.total_size(chain).unwrap(), 512 * 3);
    assert_eq!(pool.used_size(chain).unwrap(), 1079);

    // The three released chunks are independently allocatable.
    let released = pool.alloc(3 * 512).unwrap();
    assert_eq!(pool.total_size(released).unwrap(), 3 * 512);
    assert_eq!(pool.free_chunks(), 6);
  }

  #[test]
  fn realloc_grow_failure_leaves_the_chain_untouched() {
    let mut pool = MemPool::new(4, 16).unwrap();
    let chain = pool.alloc(32).unwrap();
    let _rest = pool.alloc(32).unwrap();

    assert_eq!(pool.realloc(chain, 48).err(), Some(Error::OutOfMemory));
    assert_eq!(pool.total_size(chain).unwrap(), 32);

    pool.free_chain(_rest).unwrap();
    pool.realloc(chain, 48).unwrap();
    assert_eq!(pool.total_size(chain).unwrap(), 48);
  }

  #[test]
  fn freed_chain_handles_are_rejected() {
    let mut pool = MemPool::new(4, 16).unwrap();
    let chain = pool.alloc(16).unwrap();
    pool.free_chain(chain).unwrap();

    assert_eq!(pool.free_chain(chain).err(), Some(Error::NotFound));
    assert_eq!(pool.read(chain, 0, &mut [0; 4]).err(), Some(Error::NotFound));
  }

  #[test]
  fn close_refuses_then_pool_still_usable() {
    let mut pool = MemPool::new(4, 16).unwrap();
    let chain = pool.alloc(16).unwrap();

    assert_eq!(pool.close(false).err(), Some(Error::NotReady));

    // The provisional locks were rolled back: every remaining chunk is
    // still allocatable and the existing chain still works.
    pool.append(chain, b"ok", false).unwrap();
    let rest = pool.alloc(3 * 16).unwrap();
    assert_eq!(pool.total_size(rest).unwrap(), 48);
  }

  #[test]
  fn close_succeeds_once_chains_are_freed() {
    let mut pool = MemPool::new(4, 16).unwrap();
    let chain = pool.alloc(16).unwrap();
    pool.free_chain(chain).unwrap();

    pool.close(false).unwrap();
    assert_eq!(pool.alloc(16).err(), Some(Error::NotReady));
  }

  #[test]
  fn forced_close_ignores_outstanding_chains() {
    let mut pool = MemPool::new(4, 16).unwrap();
    let _chain = pool.alloc(16).unwrap();

    pool.close(true).unwrap();
    assert_eq!(pool.alloc(16).err(), Some(Error::NotReady));
  }
}
