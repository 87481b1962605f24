//! Tape capability: position-addressable, fixed-capacity value storage.

use std::error::Error;
use std::fmt;
use std::io;

/// Tape access error.
#[derive(Debug)]
pub enum TapeError {
    /// Read past the tape's written size.
    OutOfBounds { position: usize, size: usize },
    /// Write past the tape's capacity.
    CapacityExceeded { position: usize, capacity: usize },
    /// Underlying storage I/O error.
    Io(io::Error),
}

impl Error for TapeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            TapeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            TapeError::OutOfBounds { position, size } => {
                write!(f, "read out of data bounds: position {} >= size {}", position, size)
            }
            TapeError::CapacityExceeded { position, capacity } => {
                write!(f, "write beyond end of data: position {} >= capacity {}", position, capacity)
            }
            TapeError::Io(err) => write!(f, "tape I/O operation failed: {}", err),
        }
    }
}

/// Position-addressable, fixed-capacity value storage.
///
/// A tape holds an ordered sequence of values addressed by a single movable
/// cursor. Reads and writes happen at the cursor and do not move it; all
/// positioning is explicit via [`Tape::set_position`]. [`Tape::flush`] must be
/// called before the written values are read by a different logical phase.
pub trait Tape<T> {
    /// Returns the current cursor position.
    fn position(&self) -> usize;

    /// Moves the cursor. Performs no I/O.
    fn set_position(&mut self, position: usize);

    /// Reads the value at the cursor.
    fn read(&mut self) -> Result<T, TapeError>;

    /// Writes a value at the cursor.
    fn write(&mut self, value: T) -> Result<(), TapeError>;

    /// Returns the number of values written so far.
    fn size(&self) -> usize;

    /// Returns the maximum number of addressable values.
    fn capacity(&self) -> usize;

    /// Makes prior writes durable and visible to subsequent readers.
    fn flush(&mut self) -> Result<(), TapeError>;
}

impl<T, B: Tape<T> + ?Sized> Tape<T> for &mut B {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn set_position(&mut self, position: usize) {
        (**self).set_position(position)
    }

    fn read(&mut self) -> Result<T, TapeError> {
        (**self).read()
    }

    fn write(&mut self, value: T) -> Result<(), TapeError> {
        (**self).write(value)
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn flush(&mut self) -> Result<(), TapeError> {
        (**self).flush()
    }
}

impl<T, B: Tape<T> + ?Sized> Tape<T> for Box<B> {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn set_position(&mut self, position: usize) {
        (**self).set_position(position)
    }

    fn read(&mut self) -> Result<T, TapeError> {
        (**self).read()
    }

    fn write(&mut self, value: T) -> Result<(), TapeError> {
        (**self).write(value)
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn flush(&mut self) -> Result<(), TapeError> {
        (**self).flush()
    }
}

/// In-memory tape backed by a `Vec`.
///
/// Writes either overwrite an existing position or append at the current
/// size; a write that would leave a gap past the size is rejected as out of
/// bounds since the tape cannot represent unwritten holes.
pub struct VecTape<T> {
    data: Vec<T>,
    capacity: usize,
    cursor: usize,
}

impl<T> VecTape<T> {
    /// Creates an empty tape with the given capacity.
    pub fn new(capacity: usize) -> Self {
        VecTape {
            data: Vec::new(),
            capacity,
            cursor: 0,
        }
    }

    /// Creates a tape pre-filled with `data`, with capacity equal to its length.
    pub fn from_vec(data: Vec<T>) -> Self {
        let capacity = data.len();
        VecTape {
            data,
            capacity,
            cursor: 0,
        }
    }

    /// Returns the written values as a slice.
    pub fn as_slice(&self) -> &[T] {
        self.data.as_slice()
    }

    /// Consumes the tape and returns the written values.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Clone> Tape<T> for VecTape<T> {
    fn position(&self) -> usize {
        self.cursor
    }

    fn set_position(&mut self, position: usize) {
        self.cursor = position;
    }

    fn read(&mut self) -> Result<T, TapeError> {
        match self.data.get(self.cursor) {
            Some(value) => Ok(value.clone()),
            None => Err(TapeError::OutOfBounds {
                position: self.cursor,
                size: self.data.len(),
            }),
        }
    }

    fn write(&mut self, value: T) -> Result<(), TapeError> {
        if self.cursor >= self.capacity {
            return Err(TapeError::CapacityExceeded {
                position: self.cursor,
                capacity: self.capacity,
            });
        }
        if self.cursor > self.data.len() {
            return Err(TapeError::OutOfBounds {
                position: self.cursor,
                size: self.data.len(),
            });
        }

        if self.cursor == self.data.len() {
            self.data.push(value);
        } else {
            self.data[self.cursor] = value;
        }
        return Ok(());
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn flush(&mut self) -> Result<(), TapeError> {
        Ok(())
    }
}

#[cfg(feature = "file-tape")]
pub mod file {
    //! File-backed tape implementation.

    use std::fs;
    use std::io::{self, Seek, SeekFrom};
    use std::marker::PhantomData;

    use tempfile;

    use super::{Tape, TapeError};

    /// File-backed tape storing MessagePack-encoded records in a temporary file.
    /// For more information on the format see <https://msgpack.org/>.
    ///
    /// Record byte offsets are kept in memory so the cursor can address
    /// variable-length records. A write at a position below the current size
    /// truncates the file at that record, so rewrites must proceed
    /// sequentially from the rewritten position.
    pub struct RmpFileTape<T> {
        file: fs::File,
        offsets: Vec<u64>,
        end: u64,
        capacity: usize,
        cursor: usize,

        item_type: PhantomData<T>,
    }

    impl<T> RmpFileTape<T> {
        /// Creates a tape backed by a file in the OS temporary directory.
        pub fn create(capacity: usize) -> Result<Self, TapeError> {
            let file = tempfile::tempfile().map_err(TapeError::Io)?;
            return Ok(Self::with_file(file, capacity));
        }

        /// Creates a tape backed by a file inside `dir`.
        pub fn create_in(dir: &tempfile::TempDir, capacity: usize) -> Result<Self, TapeError> {
            let file = tempfile::tempfile_in(dir).map_err(TapeError::Io)?;
            return Ok(Self::with_file(file, capacity));
        }

        fn with_file(file: fs::File, capacity: usize) -> Self {
            RmpFileTape {
                file,
                offsets: Vec::new(),
                end: 0,
                capacity,
                cursor: 0,
                item_type: PhantomData,
            }
        }
    }

    impl<T> Tape<T> for RmpFileTape<T>
    where
        T: serde::ser::Serialize + serde::de::DeserializeOwned,
    {
        fn position(&self) -> usize {
            self.cursor
        }

        fn set_position(&mut self, position: usize) {
            self.cursor = position;
        }

        fn read(&mut self) -> Result<T, TapeError> {
            let offset = match self.offsets.get(self.cursor) {
                Some(offset) => *offset,
                None => {
                    return Err(TapeError::OutOfBounds {
                        position: self.cursor,
                        size: self.offsets.len(),
                    })
                }
            };

            self.file.seek(SeekFrom::Start(offset)).map_err(TapeError::Io)?;
            let value = rmp_serde::decode::from_read(&mut self.file)
                .map_err(|err| TapeError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
            return Ok(value);
        }

        fn write(&mut self, value: T) -> Result<(), TapeError> {
            if self.cursor >= self.capacity {
                return Err(TapeError::CapacityExceeded {
                    position: self.cursor,
                    capacity: self.capacity,
                });
            }
            if self.cursor > self.offsets.len() {
                return Err(TapeError::OutOfBounds {
                    position: self.cursor,
                    size: self.offsets.len(),
                });
            }

            if self.cursor < self.offsets.len() {
                // rewrite drops this record and everything after it
                self.end = self.offsets[self.cursor];
                self.offsets.truncate(self.cursor);
                self.file.set_len(self.end).map_err(TapeError::Io)?;
            }

            self.file.seek(SeekFrom::Start(self.end)).map_err(TapeError::Io)?;
            rmp_serde::encode::write(&mut self.file, &value)
                .map_err(|err| TapeError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;

            self.offsets.push(self.end);
            self.end = self.file.stream_position().map_err(TapeError::Io)?;
            return Ok(());
        }

        fn size(&self) -> usize {
            self.offsets.len()
        }

        fn capacity(&self) -> usize {
            self.capacity
        }

        fn flush(&mut self) -> Result<(), TapeError> {
            self.file.sync_data().map_err(TapeError::Io)
        }
    }

    #[cfg(test)]
    mod test {
        use rstest::*;

        use super::super::{Tape, TapeError};
        use super::RmpFileTape;

        #[rstest]
        fn test_file_tape_write_read() {
            let mut tape: RmpFileTape<i32> = RmpFileTape::create(8).unwrap();

            for (position, value) in [30, 10, 20].into_iter().enumerate() {
                tape.set_position(position);
                tape.write(value).unwrap();
            }
            tape.flush().unwrap();

            assert_eq!(tape.size(), 3);
            assert_eq!(tape.capacity(), 8);

            tape.set_position(1);
            assert_eq!(tape.read().unwrap(), 10);
            tape.set_position(0);
            assert_eq!(tape.read().unwrap(), 30);
            tape.set_position(2);
            assert_eq!(tape.read().unwrap(), 20);
        }

        #[rstest]
        fn test_file_tape_rewrite_truncates() {
            let mut tape: RmpFileTape<String> = RmpFileTape::create(8).unwrap();

            for (position, value) in ["one", "two", "three"].into_iter().enumerate() {
                tape.set_position(position);
                tape.write(value.to_string()).unwrap();
            }

            tape.set_position(1);
            tape.write("rewritten".to_string()).unwrap();

            assert_eq!(tape.size(), 2);
            tape.set_position(1);
            assert_eq!(tape.read().unwrap(), "rewritten");
            tape.set_position(0);
            assert_eq!(tape.read().unwrap(), "one");
        }

        #[rstest]
        fn test_file_tape_bounds() {
            let mut tape: RmpFileTape<i32> = RmpFileTape::create(1).unwrap();

            tape.set_position(0);
            assert!(matches!(tape.read(), Err(TapeError::OutOfBounds { .. })));

            tape.write(42).unwrap();
            tape.set_position(1);
            assert!(matches!(tape.write(43), Err(TapeError::CapacityExceeded { .. })));
        }
    }
}
