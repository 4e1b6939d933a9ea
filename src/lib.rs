//! An in-memory B+ tree ordered map.
//!
//! This crate provides [`BPlusTreeMap`], an ordered associative container
//! built for large node fan-out and fast range scans. All entries live in
//! leaf nodes threaded onto an ascending singly linked chain, so ordered
//! iteration and half-open range queries stream leaf to leaf without
//! re-descending the tree.
//!
//! # Example
//!
//! ```
//! use tilia::{BPlusTreeMap, TreeError};
//!
//! let mut index = BPlusTreeMap::new(1000)?;
//! for id in [31_u64, 7, 19] {
//!     index.insert(id, id * 100)?;
//! }
//!
//! // Point operations either succeed or report why they could not.
//! assert_eq!(index.search(&19), Ok(&1900));
//! assert_eq!(index.insert(19, 0), Err(TreeError::DuplicateKey));
//! assert_eq!(index.remove(&42), Err(TreeError::KeyNotFound));
//!
//! // Range scans walk the leaf chain.
//! let ids: Vec<u64> = index.range(10..30).map(|(&id, _)| id).collect();
//! assert_eq!(ids, [19]);
//! # Ok::<(), tilia::TreeError>(())
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library
//!   dependency
//! - **Configurable order** - The maximum entries per node is chosen at
//!   construction, trading tree depth against node width
//! - **Key transforms** - A pure function plugged in at construction maps
//!   raw keys to the keys actually stored and compared
//! - **Cache-efficient** - Nodes store keys and children contiguously in a
//!   slotted arena
//!
//! # Implementation
//!
//! The tree is a textbook B+ tree: inner nodes route by separator keys,
//! leaves hold the entries and link to their successors. Inserts split
//! overflowing nodes upward; deletes repair underfull nodes by borrowing
//! from or merging with a sibling. The map is single-threaded; wrap it in a
//! lock to share it.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

extern crate alloc;

mod error;
mod key_transform;
mod raw;

pub mod bptree_map;

pub use bptree_map::BPlusTreeMap;
pub use error::{Result, TreeError};
pub use key_transform::{Identity, KeyTransform};
