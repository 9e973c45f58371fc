/// Error types for the mmdb-reader library
use std::fmt;
use std::io;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for database operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Path does not name a regular file
    NotFile(String),

    /// File has zero length
    FileEmpty,

    /// File exceeds the caller-supplied read bound
    FileTooLarge {
        /// Actual file size in bytes
        size: u64,
        /// Maximum the caller allowed
        max_size: u64,
    },

    /// I/O or memory-mapping failure
    Io(String),

    /// Metadata marker absent from the file
    MetadataStartNotFound,

    /// Metadata map is missing a field or holds one of the wrong type
    InvalidMetadata(String),

    /// Tree or pointer offsets escape the file bounds
    CorruptedTree,

    /// Tree descent exhausted the address bits inside the tree
    InvalidTreeNode,

    /// `record_size` outside {24, 28, 32}
    UnknownRecordSize(u16),

    /// Prefix length exceeds the address width
    InvalidPrefixLen,

    /// Unparseable address or network text
    InvalidIpAddress(String),

    /// A read ran past the end of the buffer
    UnexpectedEof,

    /// Field type code outside the supported set
    UnsupportedFieldType(u8),

    /// Integer payload wider than the declared target
    InvalidIntegerSize,

    /// Bool payload size greater than one
    InvalidBoolSize,

    /// Double payload size other than eight
    InvalidDoubleSize,

    /// Float payload size other than four
    InvalidFloatSize,

    /// String payload is not valid UTF-8
    InvalidUtf8,

    /// Top-level record value is not a map
    ExpectedStructType,

    /// Wire type mismatch against a declared string field
    ExpectedString,
    /// Wire type mismatch against a declared byte-slice field
    ExpectedBytes,
    /// Wire type mismatch against a declared double field
    ExpectedDouble,
    /// Wire type mismatch against a declared float field
    ExpectedFloat,
    /// Wire type mismatch against a declared bool field
    ExpectedBool,
    /// Wire type mismatch against a declared u16 field
    ExpectedUint16,
    /// Wire type mismatch against a declared u32 field
    ExpectedUint32,
    /// Wire type mismatch against a declared i32 field
    ExpectedInt32,
    /// Wire type mismatch against a declared u64 field
    ExpectedUint64,
    /// Wire type mismatch against a declared u128 field
    ExpectedUint128,
    /// Wire type mismatch against a declared map field
    ExpectedMap,
    /// Wire type mismatch against a declared array field
    ExpectedArray,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFile(path) => write!(f, "not a regular file: {}", path),
            Error::FileEmpty => write!(f, "file is empty"),
            Error::FileTooLarge { size, max_size } => {
                write!(
                    f,
                    "file is {} bytes, larger than the {} byte limit",
                    size, max_size
                )
            }
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::MetadataStartNotFound => write!(f, "metadata start marker not found"),
            Error::InvalidMetadata(msg) => write!(f, "invalid metadata: {}", msg),
            Error::CorruptedTree => write!(f, "search tree offsets escape the file bounds"),
            Error::InvalidTreeNode => {
                write!(f, "search tree is not exhaustive for a valid address")
            }
            Error::UnknownRecordSize(bits) => write!(f, "unknown record size: {} bits", bits),
            Error::InvalidPrefixLen => write!(f, "prefix length exceeds the address width"),
            Error::InvalidIpAddress(text) => write!(f, "invalid IP address or network: {}", text),
            Error::UnexpectedEof => write!(f, "unexpected end of data"),
            Error::UnsupportedFieldType(code) => write!(f, "unsupported field type {}", code),
            Error::InvalidIntegerSize => write!(f, "integer payload wider than its target"),
            Error::InvalidBoolSize => write!(f, "bool payload larger than one byte"),
            Error::InvalidDoubleSize => write!(f, "double payload is not eight bytes"),
            Error::InvalidFloatSize => write!(f, "float payload is not four bytes"),
            Error::InvalidUtf8 => write!(f, "string payload is not valid UTF-8"),
            Error::ExpectedStructType => write!(f, "record value is not a map"),
            Error::ExpectedString => write!(f, "expected a string value"),
            Error::ExpectedBytes => write!(f, "expected a bytes value"),
            Error::ExpectedDouble => write!(f, "expected a double value"),
            Error::ExpectedFloat => write!(f, "expected a float value"),
            Error::ExpectedBool => write!(f, "expected a bool value"),
            Error::ExpectedUint16 => write!(f, "expected a 16-bit unsigned value"),
            Error::ExpectedUint32 => write!(f, "expected a 32-bit unsigned value"),
            Error::ExpectedInt32 => write!(f, "expected a 32-bit signed value"),
            Error::ExpectedUint64 => write!(f, "expected a 64-bit unsigned value"),
            Error::ExpectedUint128 => write!(f, "expected a 128-bit unsigned value"),
            Error::ExpectedMap => write!(f, "expected a map value"),
            Error::ExpectedArray => write!(f, "expected an array value"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
