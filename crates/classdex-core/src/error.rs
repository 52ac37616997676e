use thiserror::Error;

/// Raised when a class file cannot be read far enough to produce a header
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Corrupt stream: bad magic 0x{found:08X}, expected 0xCAFEBABE")]
    BadMagic { found: u32 },

    #[error("Corrupt stream: truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("Corrupt stream: unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("Corrupt stream: constant pool index {index} does not name a class")]
    BadClassIndex { index: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Map an I/O failure at `field`, folding end-of-stream into [`FormatError::Truncated`]
    pub(crate) fn at(field: &'static str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            FormatError::Truncated { field }
        } else {
            FormatError::Io(err)
        }
    }
}
