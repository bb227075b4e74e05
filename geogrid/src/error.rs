use std::io::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("expected {expected:?} sentinel at offset {offset}")]
    Sentinel { expected: &'static str, offset: usize },

    #[error("short read, need {need} bytes at offset {offset} but only {have} available")]
    ShortRead {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("checksum mismatch on record {record}, computed {computed:#010x} stored {stored:#010x}")]
    Checksum {
        record: usize,
        computed: u32,
        stored: u32,
    },

    #[error("malformed {field} {value:?}")]
    Header { field: &'static str, value: String },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid grid dimensions {lat_points}x{lon_points} with {samples} samples")]
    Dimensions {
        lat_points: usize,
        lon_points: usize,
        samples: usize,
    },

    #[error("tile {0} is absent from the tile map")]
    AbsentTile(usize),

    #[error("unsupported {0}")]
    Unsupported(String),

    #[error("{0}")]
    Tiff(#[from] tiff::TiffError),
}

/// Coarse classification of a decoder failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backing file could not be opened or read.
    Open,
    /// The file was read but its contents failed a structural check.
    Format,
}

impl GridError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Io(e) if e.kind() != ErrorKind::UnexpectedEof => FailureKind::Open,
            _ => FailureKind::Format,
        }
    }

    pub(crate) fn header(field: &'static str, value: impl Into<String>) -> Self {
        Self::Header {
            field,
            value: value.into(),
        }
    }
}

/// Returns `bytes[offset..offset + len]` or a [`GridError::ShortRead`].
pub(crate) fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], GridError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(GridError::ShortRead {
            offset,
            need: len,
            have: bytes.len().saturating_sub(offset),
        })
}

#[cfg(test)]
mod tests {
    use super::{FailureKind, GridError};
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_kind() {
        let missing = GridError::from(Error::from(ErrorKind::NotFound));
        assert_eq!(missing.kind(), FailureKind::Open);
        let truncated = GridError::from(Error::from(ErrorKind::UnexpectedEof));
        assert_eq!(truncated.kind(), FailureKind::Format);
        let sentinel = GridError::Sentinel {
            expected: "UHL",
            offset: 0,
        };
        assert_eq!(sentinel.kind(), FailureKind::Format);
    }
}
