//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::{fmt, io};

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
    MissingTable(u32),
    UnsuitableCmap,
    NotImplemented,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ParseError::UnsuitableCmap => write!(f, "no suitable cmap subtable"),
            ParseError::NotImplemented => write!(f, "feature not implemented"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
    NotImplemented,
    PlaceholderMismatch,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::NotImplemented => write!(f, "writing in this format is not implemented"),
            WriteError::PlaceholderMismatch => {
                write!(f, "data written to placeholder did not match expected size")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Enum that can hold read (`ParseError`) and write errors
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReadWriteError {
    Read(ParseError),
    Write(WriteError),
}

impl From<ParseError> for ReadWriteError {
    fn from(error: ParseError) -> Self {
        ReadWriteError::Read(error)
    }
}

impl From<WriteError> for ReadWriteError {
    fn from(error: WriteError) -> Self {
        ReadWriteError::Write(error)
    }
}

impl From<ReadEof> for ReadWriteError {
    fn from(error: ReadEof) -> Self {
        ReadWriteError::Read(ParseError::from(error))
    }
}

impl fmt::Display for ReadWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadWriteError::Read(err) => write!(f, "read error: {}", err),
            ReadWriteError::Write(err) => write!(f, "write error: {}", err),
        }
    }
}

impl std::error::Error for ReadWriteError {}

/// Errors raised while loading fonts or emitting them into a PDF
#[derive(Debug)]
pub enum EmbedError {
    /// The font program could not be parsed or rewritten
    Font(ReadWriteError),
    /// Reading a font file or writing the PDF failed
    Io(io::Error),
    /// No font with this name is known to the font cache
    UnknownFont(String),
    /// The named CMap resource could not be found or parsed
    CMap(String),
    /// The font handle does not belong to this embedder
    BadHandle(usize),
}

impl From<ParseError> for EmbedError {
    fn from(error: ParseError) -> Self {
        EmbedError::Font(ReadWriteError::Read(error))
    }
}

impl From<WriteError> for EmbedError {
    fn from(error: WriteError) -> Self {
        EmbedError::Font(ReadWriteError::Write(error))
    }
}

impl From<ReadWriteError> for EmbedError {
    fn from(error: ReadWriteError) -> Self {
        EmbedError::Font(error)
    }
}

impl From<io::Error> for EmbedError {
    fn from(error: io::Error) -> Self {
        EmbedError::Io(error)
    }
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedError::Font(err) => write!(f, "font: {}", err),
            EmbedError::Io(err) => write!(f, "io: {}", err),
            EmbedError::UnknownFont(name) => write!(f, "unknown font '{}'", name),
            EmbedError::CMap(name) => write!(f, "unable to load CMap '{}'", name),
            EmbedError::BadHandle(index) => write!(f, "invalid font handle {}", index),
        }
    }
}

impl std::error::Error for EmbedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmbedError::Font(err) => Some(err),
            EmbedError::Io(err) => Some(err),
            _ => None,
        }
    }
}
