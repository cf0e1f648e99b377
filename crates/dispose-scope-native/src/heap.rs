//! Simulated native allocator.
//!
//! Stands in for a foreign library that hands out opaque handles to memory
//! it owns. Blocks live until explicitly freed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use facet::Facet;
use parking_lot::Mutex;

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[facet(transparent)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_blocks: u64,
    pub live_bytes: u64,
    pub total_allocations: u64,
    pub total_frees: u64,
}

pub struct NativeHeap {
    blocks: Mutex<HashMap<NativeHandle, Vec<f32>>>,
    next_handle: AtomicU64,
    total_allocations: AtomicU64,
    total_frees: AtomicU64,
}

static HEAP: LazyLock<NativeHeap> = LazyLock::new(|| NativeHeap {
    blocks: Mutex::new(HashMap::new()),
    next_handle: AtomicU64::new(1),
    total_allocations: AtomicU64::new(0),
    total_frees: AtomicU64::new(0),
});

pub fn native_heap() -> &'static NativeHeap {
    &HEAP
}

impl NativeHeap {
    pub fn allocate(&self, data: Vec<f32>) -> NativeHandle {
        let handle = NativeHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.blocks.lock().insert(handle, data);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        handle
    }

    /// Returns `false` if `handle` was already freed.
    pub fn free(&self, handle: NativeHandle) -> bool {
        let freed = self.blocks.lock().remove(&handle).is_some();
        if freed {
            self.total_frees.fetch_add(1, Ordering::Relaxed);
        }
        freed
    }

    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.blocks.lock().contains_key(&handle)
    }

    pub fn with_block<T>(&self, handle: NativeHandle, f: impl FnOnce(&[f32]) -> T) -> Option<T> {
        self.blocks.lock().get(&handle).map(|block| f(block.as_slice()))
    }

    pub fn stats(&self) -> HeapStats {
        let blocks = self.blocks.lock();
        HeapStats {
            live_blocks: blocks.len() as u64,
            live_bytes: blocks
                .values()
                .map(|block| (block.len() * size_of::<f32>()) as u64)
                .sum(),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
        }
    }
}
