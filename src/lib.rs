//! # hybrid-lru
//!
//! A bounded, recency-ordered memoizing cache:
//! - Compute-on-miss: 키가 없으면 caller가 제공한 전략으로 값을 계산하고 캐시
//! - LRU eviction: 용량 초과 시 least-recently-used 엔트리 제거
//! - Direct handle removal: 엔트리 핸들로 위치와 무관하게 O(1) 제거
//! - Filtered bulk removal: key predicate로 일괄 제거
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      HybridCache                          │
//! │  compute / release_matching / clear                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  In-flight reservations          Ordered Index            │
//! │  ┌───────────────────┐   ┌───────────────────────────┐   │
//! │  │ per-key placeholder│   │ key → slot map            │   │
//! │  │ (single-flight)    │   │ intrusive recency list    │   │
//! │  └───────────────────┘   │ (arena + generations)     │   │
//! │                           └───────────────────────────┘   │
//! ├──────────────────────────────────────────────────────────┤
//! │  Computable (caller-supplied memoization strategy)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! One coarse lock guards the structural state; the value computer runs
//! without it, with at most one in-flight computation per key. Handles
//! ([`CacheEntry`]) carry a slot id plus generation, so removal through a
//! stale handle is always a safe no-op.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hybrid_lru::{Computed, HybridCache};
//!
//! let cache = HybridCache::new(64, |key: &String| -> anyhow::Result<Computed<Descriptor>> {
//!     Ok(Computed::cached(resolve(key)?))
//! })?;
//!
//! let entry = cache.compute(&name)?;       // computed once, memoized after
//! let descriptor = entry.value();
//!
//! entry.remove_from_cache();               // direct eviction, idempotent
//! cache.release_matching(|k| k.starts_with("tmp."));
//! cache.clear();
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - Cache engine and statistics
//! - [`compute`] - Value computation strategy
//! - [`config`] - Cache configuration
//! - [`entry`] - Entry handles
//! - [`error`] - Error types

pub mod cache;
pub mod compute;
pub mod config;
pub mod entry;
pub mod error;

mod index;

// ============================================================================
// Re-exports
// ============================================================================
pub use cache::{CacheStats, HybridCache};
pub use compute::{Computable, Computed};
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{Error, Result};
