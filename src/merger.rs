//! Bounded k-way merger: the merge phase of the external sort.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::mem;

use log;

use crate::sort::SortError;
use crate::tape::Tape;

/// Merges the sorted chunks held on the temporary tapes into the output tape.
///
/// Each temporary tape holds one sorted chunk of `chunk_sizes[i]` values.
/// Values are staged in a min-heap capped at `memory_budget / size_of(entry)`
/// entries, so merge memory stays constant regardless of the total size and
/// the number of tapes. The fill step scans the heads of all non-exhausted
/// tapes and stages the smallest one (ties go to the lowest tape index,
/// advancing only that tape's cursor); the drain step emits the staged
/// minimum to the next output position. The output tape is flushed once all
/// `total_size` values have been written.
///
/// The recorded chunk sizes must cover `total_size` values; a shortfall is
/// reported as insufficient temporary space before any tape is touched.
///
/// # Arguments
/// * `total_size` - Number of values to emit
/// * `temp_tapes` - Tapes holding the sorted chunks
/// * `chunk_sizes` - Chunk element counts indexed by temporary tape
/// * `output` - Tape receiving the merged result
/// * `memory_budget` - Memory available to the staging buffer, in bytes
pub fn merge<T, B, O>(
    total_size: usize,
    temp_tapes: &mut [B],
    chunk_sizes: &[usize],
    output: &mut O,
    memory_budget: usize,
) -> Result<(), SortError>
where
    T: Ord + Clone,
    B: Tape<T>,
    O: Tape<T>,
{
    if total_size == 0 {
        return Ok(());
    }

    let output_capacity = output.capacity();
    if output_capacity < total_size {
        return Err(SortError::OutputCapacityExceeded {
            capacity: output_capacity,
            required: total_size,
        });
    }

    let entry_size = mem::size_of::<Reverse<T>>().max(1);
    let staging_cap = memory_budget / entry_size;
    if staging_cap == 0 {
        // a zero-entry staging buffer would stall the fill step forever
        return Err(SortError::InsufficientMemory {
            budget: memory_budget,
            required: entry_size,
        });
    }

    let available: usize = chunk_sizes.iter().take(temp_tapes.len()).sum();
    if available < total_size {
        return Err(SortError::InsufficientTemporarySpace {
            capacity: available,
            required: total_size,
        });
    }

    let mut cursors = vec![0; temp_tapes.len()];
    let mut staged = BinaryHeap::with_capacity(staging_cap.min(total_size));

    for write_cursor in 0..total_size {
        while staged.len() < staging_cap {
            match read_minimal_head(temp_tapes, chunk_sizes, &cursors)? {
                Some((index, value)) => {
                    cursors[index] += 1;
                    staged.push(Reverse(value));
                }
                None => break,
            }
        }

        let value = match staged.pop() {
            Some(Reverse(value)) => value,
            // unreachable: the recorded chunk sizes cover total_size
            None => break,
        };

        output.set_position(write_cursor);
        output.write(value)?;
    }

    output.flush()?;
    log::debug!("merge phase done: {} values written", total_size);
    return Ok(());
}

/// Reads the smallest head value among the non-exhausted tapes without
/// advancing any cursor. Ties go to the lowest tape index.
fn read_minimal_head<T, B>(
    temp_tapes: &mut [B],
    chunk_sizes: &[usize],
    cursors: &[usize],
) -> Result<Option<(usize, T)>, SortError>
where
    T: Ord + Clone,
    B: Tape<T>,
{
    let mut minimal: Option<(usize, T)> = None;

    for (index, (tape, chunk_size)) in temp_tapes.iter_mut().zip(chunk_sizes).enumerate() {
        if cursors[index] >= *chunk_size {
            continue;
        }

        tape.set_position(cursors[index]);
        let value = tape.read()?;

        match &minimal {
            Some((_, smallest)) if *smallest <= value => {}
            _ => minimal = Some((index, value)),
        }
    }

    return Ok(minimal);
}
