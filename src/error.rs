use std::error::Error;
use std::fmt;

/// An error returned by the checked accessors of
/// [`ThreadSafeVector`](crate::ThreadSafeVector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// The index was not less than the length of the vector.
    OutOfRange {
        /// The requested index.
        index: usize,
        /// The length of the vector at the time of the access.
        len: usize,
    },
    /// The vector had no elements.
    Empty,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::OutOfRange { index, len } => {
                write!(f, "index {index} out of range for vector of length {len}")
            }
            AccessError::Empty => write!(f, "vector is empty"),
        }
    }
}

impl Error for AccessError {}

/// An error returned by [`TableRef::try_insert`](crate::TableRef::try_insert)
/// when the key is already present.
#[derive(Debug, PartialEq, Eq)]
pub struct OccupiedError<'a, V> {
    /// The value currently associated with the key.
    pub current: &'a V,
    /// The value that was not inserted.
    pub not_inserted: V,
}

impl<V: fmt::Debug> fmt::Display for OccupiedError<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key already exists with value {:?}, {:?} was not inserted",
            self.current, self.not_inserted
        )
    }
}

impl<V: fmt::Debug> Error for OccupiedError<'_, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = AccessError::OutOfRange { index: 5, len: 2 };
        assert_eq!(err.to_string(), "index 5 out of range for vector of length 2");
        assert_eq!(AccessError::Empty.to_string(), "vector is empty");

        let err = OccupiedError {
            current: &1,
            not_inserted: 2,
        };
        assert_eq!(
            err.to_string(),
            "key already exists with value 1, 2 was not inserted"
        );
    }
}
