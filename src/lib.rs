//! Ownership primitives and containers for a self-hosting compiler runtime.
//!
//! Objects carry their own reference count ([`RefCount`] or
//! [`AtomicRefCount`]) and are owned through [`NonNullRefPtr`] and its
//! nullable sibling [`RefPtr`]. An object is created with one reference
//! already taken, which the first owning pointer adopts rather than adds to.
//!
//! Objects that implement [`Weakable`] can hand out [`WeakPtr`]s. A weak
//! pointer never keeps its target alive; when the target is destroyed its
//! [`WeakLink`] is revoked, and upgrades racing the revocation on other
//! threads either finish first or see nothing.
//!
//! [`Vector`] is a contiguous growable buffer that relocates elements
//! bitwise, so owning pointers stored in it keep their counts through
//! growth. [`Array`], [`Dictionary`] and [`Set`] are handles to shared,
//! reference-counted storage.
//!
//! Failures the caller can act on (the heap is exhausted, a size overflowed)
//! are returned as [`ErrorOr`]. Broken invariants are bugs, reported through
//! [`verify!`] and never returned.
//!
//! ```
//! use bootstrap_runtime::{ref_counted, NonNullRefPtr, RefCount, Vector};
//!
//! struct Symbol { count: RefCount, name: &'static str }
//! ref_counted!(Symbol, count: RefCount);
//!
//! let main = NonNullRefPtr::new(Symbol { count: RefCount::default(), name: "main" });
//! let mut table = Vector::new();
//! for _ in 0..10 {
//!     table.push(main.clone());
//! }
//! assert_eq!(NonNullRefPtr::ref_count(&main), 11);
//!
//! table.clear();
//! assert_eq!(NonNullRefPtr::ref_count(&main), 1);
//! assert_eq!(main.name, "main");
//! ```

pub mod error;
pub mod config;
pub mod stats;
pub mod allocator;
pub mod counter;
pub mod pointers;
pub mod weak;
pub mod vector;
pub mod array;
pub mod dictionary;
pub mod set;
pub(crate) mod spin;
pub(crate) mod storage;

#[cfg(test)]
mod tests;

pub use allocator::{Allocator, Budget, SystemAllocator};
pub use array::{Array, ArrayIterator, ArraySlice};
pub use config::RuntimeConfig;
pub use counter::{AtomicRefCount, Counter, RefCount};
pub use dictionary::Dictionary;
pub use error::{Error, ErrorOr};
pub use pointers::{make_ref_counted, try_make_ref_counted, NonNullRefPtr, RefCounted, RefPtr};
pub use set::{HashSetResult, Set};
pub use stats::{global_stats, Stats};
pub use vector::{InlineVector, Vector};
pub use weak::{make_weak_ptr_if_nonnull, WeakAnchor, WeakLink, WeakPtr, Weakable};
