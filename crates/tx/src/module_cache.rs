//! Compiled contract module cache.
//!
//! The cache is an owned resource shared across ledgers and passed by
//! reference to the sandbox. Lifecycle is driven by apply-thread callbacks:
//! code uploads add modules, contract-code evictions remove them, and a
//! rebuild runs when the tracked contents drift from the live code set.
//! Background compilation happens on a worker pool bounded by config; the
//! pool joins before apply finishes and never mutates apply-visible state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cinder_common::Hash256;
use dashmap::DashMap;

/// Handle to one compiled module. The compiled artifact itself lives inside
/// the sandbox; this core tracks identity and size for cache accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    pub code_hash: Hash256,
    pub code_size_bytes: u32,
}

/// Shared cache of compiled contract modules, keyed by code hash.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: DashMap<Hash256, Arc<CompiledModule>>,
    total_code_bytes: AtomicU64,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a module is cached.
    pub fn contains(&self, code_hash: &Hash256) -> bool {
        self.modules.contains_key(code_hash)
    }

    /// Look up a cached module.
    pub fn get(&self, code_hash: &Hash256) -> Option<Arc<CompiledModule>> {
        self.modules.get(code_hash).map(|m| Arc::clone(m.value()))
    }

    /// Add a compiled module. Replaces any previous module for the hash.
    pub fn add(&self, code_hash: Hash256, code_size_bytes: u32) {
        let module = Arc::new(CompiledModule {
            code_hash,
            code_size_bytes,
        });
        if let Some(old) = self.modules.insert(code_hash, module) {
            self.total_code_bytes
                .fetch_sub(old.code_size_bytes as u64, Ordering::Relaxed);
        }
        self.total_code_bytes
            .fetch_add(code_size_bytes as u64, Ordering::Relaxed);
    }

    /// Targeted removal, called when a contract-code entry is evicted.
    pub fn evict(&self, code_hash: &Hash256) {
        if let Some((_, old)) = self.modules.remove(code_hash) {
            self.total_code_bytes
                .fetch_sub(old.code_size_bytes as u64, Ordering::Relaxed);
            tracing::debug!(code_hash = %code_hash, "evicted module from cache");
        }
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Total code bytes tracked by the cache.
    pub fn total_code_bytes(&self) -> u64 {
        self.total_code_bytes.load(Ordering::Relaxed)
    }

    /// Size heuristic: the cache should be rebuilt when it holds more than
    /// twice the live code set, which indicates accumulated fragmentation
    /// from replaced uploads.
    pub fn needs_rebuild(&self, live_code_bytes: u64) -> bool {
        self.total_code_bytes() > live_code_bytes.saturating_mul(2)
    }

    /// Drop everything and recompile from the given live code set on the
    /// calling thread.
    pub fn rebuild<I>(&self, live_code: I)
    where
        I: IntoIterator<Item = (Hash256, u32)>,
    {
        self.modules.clear();
        self.total_code_bytes.store(0, Ordering::Relaxed);
        for (hash, size) in live_code {
            self.add(hash, size);
        }
        tracing::info!(
            modules = self.len(),
            bytes = self.total_code_bytes(),
            "rebuilt module cache"
        );
    }
}

/// Bounded worker pool for background module compilation.
///
/// Work is split across at most `threads` workers; `run` blocks until every
/// worker has joined, so compiled modules are visible before apply continues.
pub struct CompilePool {
    threads: usize,
}

impl CompilePool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Compile the given code set into the cache and join.
    pub fn run(&self, cache: &Arc<ModuleCache>, code: Vec<(Hash256, u32)>) {
        if code.is_empty() {
            return;
        }
        let chunk_size = code.len().div_ceil(self.threads);
        let mut handles = Vec::new();
        for chunk in code.chunks(chunk_size) {
            let cache = Arc::clone(cache);
            let chunk = chunk.to_vec();
            handles.push(std::thread::spawn(move || {
                for (hash, size) in chunk {
                    cache.add(hash, size);
                }
            }));
        }
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("module compilation worker panicked");
            }
        }
    }
}
