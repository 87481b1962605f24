//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use log;

use crate::chunk::produce_chunks;
use crate::merger::merge;
use crate::tape::{Tape, TapeError};

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// The memory budget cannot hold a single chunk or staged value.
    InsufficientMemory { budget: usize, required: usize },
    /// Fewer temporary tapes than chunks to distribute.
    TooFewTemporaryTapes { tapes: usize, chunks: usize },
    /// One of the temporary tapes cannot hold its chunk.
    TapeTooSmall { tape: usize, capacity: usize, required: usize },
    /// Aggregate temporary tape capacity is below the input size.
    InsufficientTemporarySpace { capacity: usize, required: usize },
    /// The output tape cannot hold the full merged result.
    OutputCapacityExceeded { capacity: usize, required: usize },
    /// Tape access error.
    Tape(TapeError),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Tape(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::InsufficientMemory { budget, required } => {
                write!(f, "insufficient memory: {} byte budget, {} bytes required", budget, required)
            }
            SortError::TooFewTemporaryTapes { tapes, chunks } => {
                write!(f, "too few temporary tapes: {} provided, {} chunks to store", tapes, chunks)
            }
            SortError::TapeTooSmall { tape, capacity, required } => {
                write!(f, "temporary tape {} too small: {} < {}", tape, capacity, required)
            }
            SortError::InsufficientTemporarySpace { capacity, required } => {
                write!(f, "insufficient temporary space: {} < {}", capacity, required)
            }
            SortError::OutputCapacityExceeded { capacity, required } => {
                write!(f, "output tape too small: {} < {}", capacity, required)
            }
            SortError::Tape(err) => write!(f, "tape operation failed: {}", err),
        }
    }
}

impl From<TapeError> for SortError {
    fn from(err: TapeError) -> Self {
        SortError::Tape(err)
    }
}

/// External sorter.
///
/// Sorts data sets larger than working memory by splitting the input into
/// memory-bounded sorted chunks on temporary tapes and merging the chunks
/// into the output tape through a bounded staging buffer. Both phases stay
/// under the configured memory budget.
pub struct ExternalSorter {
    /// Memory available to each phase, in bytes.
    memory_budget: usize,
}

impl ExternalSorter {
    /// Creates a sorter with the given per-phase memory budget in bytes.
    pub fn new(memory_budget: usize) -> Self {
        return ExternalSorter { memory_budget };
    }

    /// Sorts the contents of `input` into `output`, using the temporary
    /// tapes as scratch space.
    ///
    /// Every tape is used exclusively by this call and no tape is retained
    /// beyond it. A failure aborts the whole operation: temporary tapes are
    /// then left in an unspecified state and must be recreated before a
    /// retry, though validation failures are reported before any tape is
    /// mutated.
    ///
    /// # Arguments
    /// * `input` - Tape holding the values to be sorted; its contents are not modified
    /// * `output` - Tape receiving the sorted result; must hold the full input
    /// * `temp_tapes` - Scratch tapes, each large enough for one chunk
    pub fn sort<T, I, O, B>(
        &self,
        input: &mut I,
        output: &mut O,
        temp_tapes: &mut [B],
    ) -> Result<(), SortError>
    where
        T: Ord + Clone,
        I: Tape<T>,
        O: Tape<T>,
        B: Tape<T>,
    {
        let total_size = input.size();

        let chunk_sizes = produce_chunks(input, temp_tapes, self.memory_budget)?;
        merge(total_size, temp_tapes, &chunk_sizes, output, self.memory_budget)?;

        log::debug!("external sort done: {} values", total_size);
        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{ExternalSorter, SortError};
    use crate::tape::{Tape, VecTape};

    fn temp_tapes(count: usize, capacity: usize) -> Vec<VecTape<i32>> {
        Vec::from_iter((0..count).map(|_| VecTape::new(capacity)))
    }

    #[rstest]
    fn test_external_sorter_concrete_scenario() {
        let mut input = VecTape::from_vec(vec![8, 4, 12, 2, 6, 10, 14, 1, 3, 5, 7, 9, 11, 13, 15]);
        let mut output = VecTape::new(15);
        let mut tapes = temp_tapes(3, 5);

        // 20 byte budget forces 3 chunks of 5 i32 values
        let sorter = ExternalSorter::new(20);
        sorter.sort(&mut input, &mut output, &mut tapes).unwrap();

        assert_eq!(output.into_vec(), Vec::from_iter(1..=15));
    }

    #[rstest]
    fn test_external_sorter_shuffled() {
        let input_sorted = 0..100;

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());

        let mut input = VecTape::from_vec(input_shuffled);
        let mut output = VecTape::new(100);
        let mut tapes = temp_tapes(4, 100);

        // 100 byte budget over 400 bytes of input: 4 chunks of 25
        let sorter = ExternalSorter::new(100);
        sorter.sort(&mut input, &mut output, &mut tapes).unwrap();

        // same multiset, non-decreasing, full size
        assert_eq!(output.into_vec(), Vec::from_iter(input_sorted));
    }

    #[rstest]
    fn test_external_sorter_duplicates() {
        let mut values = Vec::from_iter((0..10).flat_map(|x| (0..4).map(move |_| x)));
        values.shuffle(&mut rand::thread_rng());

        let mut expected = values.clone();
        expected.sort_unstable();

        let mut input = VecTape::from_vec(values);
        let mut output = VecTape::new(40);
        let mut tapes = temp_tapes(4, 40);

        let sorter = ExternalSorter::new(48);
        sorter.sort(&mut input, &mut output, &mut tapes).unwrap();

        assert_eq!(output.into_vec(), expected);
    }

    #[rstest]
    #[case(8)]
    #[case(20)]
    #[case(24)]
    #[case(30)]
    #[case(60)]
    fn test_external_sorter_budget_independence(#[case] memory_budget: usize) {
        let mut input = VecTape::from_vec(vec![8, 4, 12, 2, 6, 10, 14, 1, 3, 5, 7, 9, 11, 13, 15]);
        let mut output = VecTape::new(15);
        let mut tapes = temp_tapes(8, 15);

        let sorter = ExternalSorter::new(memory_budget);
        sorter.sort(&mut input, &mut output, &mut tapes).unwrap();

        assert_eq!(output.into_vec(), Vec::from_iter(1..=15));
    }

    #[rstest]
    fn test_external_sorter_empty_input() {
        let mut input: VecTape<i32> = VecTape::new(0);
        let mut output = VecTape::new(0);
        let mut tapes = temp_tapes(2, 4);

        let sorter = ExternalSorter::new(16);
        sorter.sort(&mut input, &mut output, &mut tapes).unwrap();

        assert_eq!(output.size(), 0);
    }

    #[rstest]
    fn test_external_sorter_insufficient_temporary_space() {
        let mut input = VecTape::from_vec(Vec::from_iter(0..15));
        let mut output = VecTape::new(15);
        let mut tapes = vec![VecTape::new(4), VecTape::new(5), VecTape::new(5)];

        let sorter = ExternalSorter::new(20);
        let result = sorter.sort(&mut input, &mut output, &mut tapes);

        assert!(matches!(
            result,
            Err(SortError::InsufficientTemporarySpace { capacity: 14, required: 15 })
        ));
        assert!(tapes.iter().all(|tape| tape.size() == 0));
        assert_eq!(output.size(), 0);
        assert_eq!(input.as_slice(), &Vec::from_iter(0..15)[..]);
    }

    #[rstest]
    fn test_external_sorter_output_too_small() {
        let mut input = VecTape::from_vec(vec![3, 1, 2]);
        let mut output = VecTape::new(2);
        let mut tapes = temp_tapes(1, 3);

        let sorter = ExternalSorter::new(12);
        let result = sorter.sort(&mut input, &mut output, &mut tapes);

        assert!(matches!(
            result,
            Err(SortError::OutputCapacityExceeded { capacity: 2, required: 3 })
        ));
        assert_eq!(output.size(), 0);
    }

    #[cfg(feature = "file-tape")]
    #[rstest]
    fn test_external_sorter_file_tapes() {
        use crate::tape::file::RmpFileTape;

        let input_sorted = 0..100;

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());

        let mut input: RmpFileTape<i32> = RmpFileTape::create(100).unwrap();
        for (position, value) in input_shuffled.into_iter().enumerate() {
            input.set_position(position);
            input.write(value).unwrap();
        }
        input.flush().unwrap();

        let mut output: RmpFileTape<i32> = RmpFileTape::create(100).unwrap();
        let mut tapes: Vec<RmpFileTape<i32>> =
            Vec::from_iter((0..4).map(|_| RmpFileTape::create(100).unwrap()));

        let sorter = ExternalSorter::new(100);
        sorter.sort(&mut input, &mut output, &mut tapes).unwrap();

        let mut result = Vec::with_capacity(100);
        for position in 0..output.size() {
            output.set_position(position);
            result.push(output.read().unwrap());
        }
        assert_eq!(result, Vec::from_iter(input_sorted));
    }
}
