use super::Label;
use std::fmt;

/// Errors materializing a method body (building, parsing, or decoding it)
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// The byte stream contains an opcode which doesn't exist
    UnknownOpCode { value: u16, offset: usize },

    /// The method body ends in the middle of an instruction or section
    TruncatedBody,

    /// The first byte of the method body is neither a tiny nor a fat header
    InvalidHeader(u8),

    /// A method or signature token which the resolver doesn't know about
    UnresolvedToken { token: u32, offset: usize },

    /// Extra data section which isn't an exception handling table
    InvalidSection(u8),

    /// Exception handling clause with unknown flags
    InvalidHandlerKind(u32),

    /// A label is referenced by a branch but never placed
    UnplacedLabel(Label),

    /// A label is placed twice
    DuplicateLabel(Label),

    /// Malformed listing
    Syntax { line: usize, message: String },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::TruncatedBody
        } else {
            Error::IoError(err)
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::UnknownOpCode { value, offset } => {
                write!(f, "unknown opcode 0x{:02x} at IL_{:04x}", value, offset)
            }
            Error::TruncatedBody => f.write_str("unexpected end of method body"),
            Error::InvalidHeader(header) => {
                write!(f, "invalid method body header 0x{:02x}", header)
            }
            Error::UnresolvedToken { token, offset } => {
                write!(f, "unresolved token 0x{:08x} at IL_{:04x}", token, offset)
            }
            Error::InvalidSection(kind) => write!(f, "unsupported data section 0x{:02x}", kind),
            Error::InvalidHandlerKind(flags) => {
                write!(f, "unknown exception clause flags 0x{:x}", flags)
            }
            Error::UnplacedLabel(label) => write!(f, "label {:?} is never placed", label),
            Error::DuplicateLabel(label) => write!(f, "label {:?} is placed twice", label),
            Error::Syntax { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}
