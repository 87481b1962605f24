//! Chunk producer: the split phase of the external sort.

use std::mem;

use log;

use crate::sort::SortError;
use crate::tape::Tape;

/// Splits the input tape into sorted chunks written to the temporary tapes.
///
/// The input is read in windows sized to the memory budget; each window is
/// sorted in memory and written from position 0 of the next unused temporary
/// tape, one chunk per tape. The last chunk absorbs the division remainder,
/// so chunk sizes need not be exactly equal. Returns the chunk element counts
/// indexed by temporary tape; tapes that received no chunk get 0.
///
/// All capacity validation happens before any tape is written: the call
/// either fails without side effects or runs to completion. The in-memory
/// sort is unstable, equal values keep no particular order.
///
/// # Arguments
/// * `input` - Tape holding the values to be split; its contents are not modified
/// * `temp_tapes` - Temporary tapes, each receiving at most one chunk
/// * `memory_budget` - Memory available to the split phase, in bytes
pub fn produce_chunks<T, I, B>(
    input: &mut I,
    temp_tapes: &mut [B],
    memory_budget: usize,
) -> Result<Vec<usize>, SortError>
where
    T: Ord + Clone,
    I: Tape<T>,
    B: Tape<T>,
{
    let input_size = input.size();
    if input_size == 0 {
        return Ok(vec![0; temp_tapes.len()]);
    }

    let value_size = mem::size_of::<T>();
    if memory_budget < value_size || memory_budget == 0 {
        return Err(SortError::InsufficientMemory {
            budget: memory_budget,
            required: value_size.max(1),
        });
    }

    let mut chunk_count = (input_size * value_size + memory_budget - 1) / memory_budget;
    if chunk_count == 0 {
        // zero-sized values fit in any budget
        chunk_count = 1;
    }
    let chunk_size = input_size / chunk_count;

    if chunk_size == 0 || chunk_size * value_size > memory_budget {
        return Err(SortError::InsufficientMemory {
            budget: memory_budget,
            required: chunk_size.max(1) * value_size.max(1),
        });
    }
    let remainder = input_size % chunk_count;

    if chunk_count > temp_tapes.len() {
        return Err(SortError::TooFewTemporaryTapes {
            tapes: temp_tapes.len(),
            chunks: chunk_count,
        });
    }

    let temp_capacity: usize = temp_tapes.iter().map(|tape| tape.capacity()).sum();
    if temp_capacity < input_size {
        return Err(SortError::InsufficientTemporarySpace {
            capacity: temp_capacity,
            required: input_size,
        });
    }

    for (index, tape) in temp_tapes.iter().enumerate() {
        let capacity = tape.capacity();
        let required = if index == chunk_count - 1 {
            chunk_size + remainder
        } else {
            chunk_size
        };
        if capacity < required {
            return Err(SortError::TapeTooSmall {
                tape: index,
                capacity,
                required,
            });
        }
    }

    let mut chunk_sizes = vec![0; temp_tapes.len()];
    let mut total_read = 0;

    for (index, tape) in temp_tapes.iter_mut().enumerate().take(chunk_count) {
        let this_chunk = if index == chunk_count - 1 {
            chunk_size + remainder
        } else {
            chunk_size
        };

        let mut chunk = Vec::with_capacity(this_chunk);
        while chunk.len() < this_chunk {
            input.set_position(total_read + chunk.len());
            chunk.push(input.read()?);
        }
        total_read += this_chunk;

        log::debug!("sorting chunk {} ({} values)", index, this_chunk);
        chunk.sort_unstable();

        for (position, value) in chunk.into_iter().enumerate() {
            tape.set_position(position);
            tape.write(value)?;
        }
        tape.flush()?;
        chunk_sizes[index] = this_chunk;
    }

    log::debug!("split phase done: {} chunks, base chunk size {}", chunk_count, chunk_size);
    return Ok(chunk_sizes);
}
