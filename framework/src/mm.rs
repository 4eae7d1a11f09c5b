//! Memory service
//!
//! Modules allocate their context tables once, during initialization, from
//! a fixed region handed to the framework at boot. Memory is never freed.

use core::mem;

use log::{debug, error};
use zerocopy::{AsBytes, FromBytes};

use crate::status::{FwkError, FwkResult};

/// Alignment of [`BumpAllocator::alloc`] and [`BumpAllocator::calloc`].
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Bump allocator over a `'static` region.
#[derive(Debug)]
pub struct BumpAllocator {
    free: &'static mut [u8],
    used: usize,
}

impl BumpAllocator {
    pub fn new(region: &'static mut [u8]) -> Self {
        debug!("[MM] heap of {} bytes", region.len());
        Self { free: region, used: 0 }
    }

    /// Bytes handed out so far, padding included.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes left, ignoring alignment padding.
    pub fn remaining(&self) -> usize {
        self.free.len()
    }

    /// `count` blocks of `size` bytes, aligned to [`DEFAULT_ALIGNMENT`].
    /// Contents are unspecified.
    pub fn alloc(&mut self, count: usize, size: usize) -> FwkResult<&'static mut [u8]> {
        self.alloc_aligned(count, size, DEFAULT_ALIGNMENT)
    }

    /// `count` blocks of `size` bytes, aligned to `alignment`.
    ///
    /// `Param` for zero-sized requests, `Alignment` if `alignment` is not a
    /// power of two, `Range` if the size overflows and `NoMem` when the
    /// region is exhausted.
    pub fn alloc_aligned(
        &mut self,
        count: usize,
        size: usize,
        alignment: usize,
    ) -> FwkResult<&'static mut [u8]> {
        if count == 0 || size == 0 {
            return Err(FwkError::Param);
        }
        if !alignment.is_power_of_two() {
            return Err(FwkError::Alignment);
        }
        let bytes = count.checked_mul(size).ok_or(FwkError::Range)?;

        let start = self.free.as_ptr() as usize;
        let padding = start.wrapping_neg() & (alignment - 1);
        let needed = padding.checked_add(bytes).ok_or(FwkError::Range)?;
        if needed > self.free.len() {
            error!("[MM] out of memory: {} bytes requested, {} left", needed, self.free.len());
            return Err(FwkError::NoMem);
        }

        let region = mem::take(&mut self.free);
        let (taken, rest) = region.split_at_mut(needed);
        self.free = rest;
        self.used += needed;
        Ok(&mut taken[padding..])
    }

    /// Like [`BumpAllocator::alloc`], zero-filled.
    pub fn calloc(&mut self, count: usize, size: usize) -> FwkResult<&'static mut [u8]> {
        self.calloc_aligned(count, size, DEFAULT_ALIGNMENT)
    }

    /// Like [`BumpAllocator::alloc_aligned`], zero-filled.
    pub fn calloc_aligned(
        &mut self,
        count: usize,
        size: usize,
        alignment: usize,
    ) -> FwkResult<&'static mut [u8]> {
        let block = self.alloc_aligned(count, size, alignment)?;
        block.fill(0);
        Ok(block)
    }

    /// Zeroed table of `count` plain-old-data values.
    pub fn calloc_slice<T: FromBytes + AsBytes>(&mut self, count: usize) -> FwkResult<&'static mut [T]> {
        let block = self.calloc_aligned(count, mem::size_of::<T>(), mem::align_of::<T>())?;
        T::mut_slice_from(block).ok_or(FwkError::Alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec;

    fn heap(size: usize) -> BumpAllocator {
        BumpAllocator::new(Box::leak(vec![0xAAu8; size].into_boxed_slice()))
    }

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let mut mm = heap(256);
        let a = mm.alloc(1, 3).unwrap();
        let b = mm.alloc_aligned(2, 4, 16).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 8);
        assert_eq!(b.as_ptr() as usize % 16, 0);
        assert!(b.as_ptr() as usize >= a.as_ptr() as usize + 3);
    }

    #[test]
    fn calloc_zeroes() {
        let mut mm = heap(64);
        assert!(mm.calloc(4, 4).unwrap().iter().all(|&b| b == 0));
        let table = mm.calloc_slice::<u32>(3).unwrap();
        assert_eq!(table, &[0, 0, 0]);
    }

    #[test]
    fn errors() {
        let mut mm = heap(32);
        assert_eq!(mm.alloc(0, 4), Err(FwkError::Param));
        assert_eq!(mm.alloc_aligned(1, 4, 3), Err(FwkError::Alignment));
        assert_eq!(mm.alloc(usize::MAX, 2), Err(FwkError::Range));
        assert_eq!(mm.alloc(1, 64), Err(FwkError::NoMem));
        // A failed request leaves the region untouched.
        assert!(mm.alloc(1, 16).is_ok());
    }
}
