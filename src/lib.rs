//! `tape-sort` is a bounded-memory external sorting engine.
//!
//! External sorting is required when the data being sorted does not fit into the main memory (RAM)
//! of a computer and instead resides in slower external storage. Sorting is achieved in two passes:
//! during the first pass the input is split into chunks that each fit in RAM, sorted in memory and
//! written to temporary storage; during the second pass the sorted chunks are merged together
//! through a capacity-bounded staging buffer, so the merge itself also stays under the memory
//! budget. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `tape-sort` supports the following features:
//!
//! * **Storage agnostic:**
//!   all data access goes through the [`Tape`] capability, a position-addressable, fixed-capacity
//!   sequence of values. Any storage that can place a cursor, read and write single values and
//!   flush satisfies the contract: an in-memory [`VecTape`] is provided, a MessagePack-encoded
//!   file tape is available behind the `file-tape` feature, and callers can bring their own.
//! * **Memory bounded in both phases:**
//!   the split phase never holds more than one chunk in memory and the merge phase never stages
//!   more values than the budget allows, independent of the input size or the number of tapes.
//! * **Fail-fast validation:**
//!   every capacity requirement is checked before any data is moved, so a rejected call leaves
//!   all tapes untouched.
//!
//! # Example
//!
//! ```rust
//! use tape_sort::{ExternalSorter, VecTape};
//!
//! let mut input = VecTape::from_vec(vec![8, 4, 12, 2, 6, 10, 14, 1, 3, 5, 7, 9, 11, 13, 15]);
//! let mut output = VecTape::new(15);
//! let mut temp_tapes: Vec<VecTape<i32>> = (0..3).map(|_| VecTape::new(5)).collect();
//!
//! // a 20 byte budget splits the 15 values into 3 chunks of 5
//! let sorter = ExternalSorter::new(20);
//! sorter.sort(&mut input, &mut output, &mut temp_tapes).unwrap();
//!
//! assert_eq!(output.into_vec(), Vec::from_iter(1..=15));
//! ```

pub mod chunk;
pub mod merger;
pub mod sort;
pub mod tape;

pub use chunk::produce_chunks;
pub use merger::merge;
pub use sort::{ExternalSorter, SortError};
pub use tape::{Tape, TapeError, VecTape};
