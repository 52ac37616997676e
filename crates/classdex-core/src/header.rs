//! Minimal class-file header reader
//!
//! Reads only the prefix of a compiled class that names it, its superclass and
//! its access flags. The constant pool still has to be walked entry by entry,
//! since the fields we need sit behind it; every payload is either retained
//! (UTF-8 strings and class references) or skipped by its tag's fixed length.

use std::io::{self, Read};

use serde::Serialize;

use crate::error::FormatError;

const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// The parts of a class file the hierarchy resolver needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassHeader {
    pub internal_name: String,
    /// `None` only for the hierarchy root
    pub super_name: Option<String>,
    pub is_interface: bool,
    pub is_abstract: bool,
}

impl ClassHeader {
    pub fn new(internal_name: &str, super_name: Option<&str>, access_flags: u16) -> Self {
        Self {
            internal_name: internal_name.to_string(),
            super_name: super_name.map(str::to_string),
            is_interface: access_flags & ACC_INTERFACE != 0,
            is_abstract: access_flags & ACC_ABSTRACT != 0,
        }
    }

    /// Read a header from the start of a class-file stream.
    ///
    /// Stops right after the super-class index; the rest of the stream is left unread.
    pub fn read<R: Read>(reader: R) -> Result<Self, FormatError> {
        let mut reader = HeaderReader { inner: reader };

        let magic = reader.u4("magic")?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic { found: magic });
        }
        let _minor_version = reader.u2("minor_version")?;
        let _major_version = reader.u2("major_version")?;

        let pool = ConstantPool::read(&mut reader)?;

        let access_flags = reader.u2("access_flags")?;
        let this_class = reader.u2("this_class")?;
        let super_class = reader.u2("super_class")?;

        let internal_name = pool.class_name(this_class)?;
        let super_name = match super_class {
            0 => None,
            index => Some(pool.class_name(index)?),
        };

        Ok(Self {
            internal_name,
            super_name,
            is_interface: access_flags & ACC_INTERFACE != 0,
            is_abstract: access_flags & ACC_ABSTRACT != 0,
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        Self::read(bytes)
    }

    /// Neither an interface nor declared abstract
    pub fn is_concrete(&self) -> bool {
        !self.is_interface && !self.is_abstract
    }
}

/// How much of the stream a constant's payload occupies
#[derive(Debug, Clone, Copy)]
enum Payload {
    /// u2 length followed by that many bytes; retained
    Utf8,
    /// u2 index of the UTF-8 name; retained
    ClassRef,
    /// Fixed-length payload occupying one pool slot
    Fixed(u64),
    /// 8-byte payload occupying two pool slots
    Wide,
}

fn payload_for(tag: u8) -> Option<Payload> {
    let payload = match tag {
        TAG_UTF8 => Payload::Utf8,
        TAG_CLASS => Payload::ClassRef,
        TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => Payload::Fixed(2),
        TAG_METHOD_HANDLE => Payload::Fixed(3),
        TAG_INTEGER
        | TAG_FLOAT
        | TAG_FIELDREF
        | TAG_METHODREF
        | TAG_INTERFACE_METHODREF
        | TAG_NAME_AND_TYPE
        | TAG_DYNAMIC
        | TAG_INVOKE_DYNAMIC => Payload::Fixed(4),
        TAG_LONG | TAG_DOUBLE => Payload::Wide,
        _ => return None,
    };
    Some(payload)
}

#[derive(Debug)]
enum Constant {
    Utf8(Vec<u8>),
    Class { name_index: u16 },
    Skipped,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn read<R: Read>(reader: &mut HeaderReader<R>) -> Result<Self, FormatError> {
        let count = reader.u2("constant_pool_count")?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Skipped); // index 0 is never used

        // u32 so a wide entry in the last slot cannot overflow
        let mut index: u32 = 1;
        while index < u32::from(count) {
            let tag = reader.u1("constant tag")?;
            let payload = payload_for(tag).ok_or(FormatError::UnknownConstantTag {
                tag,
                index: index as u16,
            })?;

            match payload {
                Payload::Utf8 => {
                    let length = reader.u2("utf8 length")?;
                    entries.push(Constant::Utf8(reader.bytes(length as usize, "utf8 bytes")?));
                    index += 1;
                }
                Payload::ClassRef => {
                    let name_index = reader.u2("class name index")?;
                    entries.push(Constant::Class { name_index });
                    index += 1;
                }
                Payload::Fixed(length) => {
                    reader.skip(length, "constant payload")?;
                    entries.push(Constant::Skipped);
                    index += 1;
                }
                Payload::Wide => {
                    reader.skip(8, "wide constant payload")?;
                    entries.push(Constant::Skipped);
                    entries.push(Constant::Skipped);
                    index += 2;
                }
            }
        }

        Ok(Self { entries })
    }

    fn class_name(&self, index: u16) -> Result<String, FormatError> {
        let bad_index = FormatError::BadClassIndex { index };
        let Some(Constant::Class { name_index }) = self.entries.get(index as usize) else {
            return Err(bad_index);
        };
        match self.entries.get(*name_index as usize) {
            // Names are modified UTF-8; lossy decoding only differs for NUL and astral chars
            Some(Constant::Utf8(bytes)) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => Err(bad_index),
        }
    }
}

struct HeaderReader<R> {
    inner: R,
}

impl<R: Read> HeaderReader<R> {
    fn fill<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], FormatError> {
        let mut buf = [0u8; N];
        self.inner
            .read_exact(&mut buf)
            .map_err(|err| FormatError::at(field, err))?;
        Ok(buf)
    }

    fn u1(&mut self, field: &'static str) -> Result<u8, FormatError> {
        Ok(self.fill::<1>(field)?[0])
    }

    fn u2(&mut self, field: &'static str) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.fill(field)?))
    }

    fn u4(&mut self, field: &'static str) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.fill(field)?))
    }

    fn bytes(&mut self, length: usize, field: &'static str) -> Result<Vec<u8>, FormatError> {
        let mut buf = vec![0u8; length];
        self.inner
            .read_exact(&mut buf)
            .map_err(|err| FormatError::at(field, err))?;
        Ok(buf)
    }

    fn skip(&mut self, length: u64, field: &'static str) -> Result<(), FormatError> {
        let copied = io::copy(&mut self.inner.by_ref().take(length), &mut io::sink())
            .map_err(|err| FormatError::at(field, err))?;
        if copied < length {
            return Err(FormatError::Truncated { field });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classdex_test_fixtures::{class_bytes, ClassFileBuilder, ACC_ABSTRACT as ABSTRACT, OBJECT};
    use proptest::prelude::*;

    #[test]
    fn test_reads_concrete_class_header() {
        let bytes = class_bytes("com/example/Impl", OBJECT, 0);
        let header = ClassHeader::parse(&bytes).unwrap();

        assert_eq!(header.internal_name, "com/example/Impl");
        assert_eq!(header.super_name.as_deref(), Some(OBJECT));
        assert!(!header.is_abstract);
        assert!(!header.is_interface);
        assert!(header.is_concrete());
    }

    #[test]
    fn test_detects_interface_and_abstract_flags() {
        let iface = ClassHeader::parse(&class_bytes("com/example/Itf", OBJECT, 0x0200)).unwrap();
        assert!(iface.is_interface);
        assert!(!iface.is_concrete());

        let abs = ClassHeader::parse(&class_bytes("com/example/Abs", OBJECT, ABSTRACT)).unwrap();
        assert!(abs.is_abstract);
        assert!(!abs.is_concrete());
    }

    #[test]
    fn test_root_class_has_no_super() {
        let bytes = ClassFileBuilder::new(OBJECT).without_super().build();
        let header = ClassHeader::parse(&bytes).unwrap();
        assert_eq!(header.internal_name, OBJECT);
        assert_eq!(header.super_name, None);
    }

    #[test]
    fn test_skips_every_constant_kind() {
        let bytes = ClassFileBuilder::new("com/example/Padded")
            .extends("com/example/Base")
            .padded()
            .build();
        let header = ClassHeader::parse(&bytes).unwrap();
        assert_eq!(header.internal_name, "com/example/Padded");
        assert_eq!(header.super_name.as_deref(), Some("com/example/Base"));
    }

    #[test]
    fn test_fails_on_wrong_magic_number() {
        let err = ClassHeader::parse(&[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, FormatError::BadMagic { found: 0x0001_0203 }));
        assert!(err.to_string().contains("Corrupt stream"));
    }

    #[test]
    fn test_fails_on_text_masquerading_as_class() {
        assert!(ClassHeader::parse(b"not-a-class").is_err());
    }

    #[test]
    fn test_every_short_prefix_is_truncated() {
        let bytes = ClassFileBuilder::new("com/example/Padded").padded().build();
        // interfaces/fields/methods/attributes counts are never read
        let required = bytes.len() - 8;
        assert!(ClassHeader::parse(&bytes[..required]).is_ok());

        for cut in 4..required {
            let err = ClassHeader::parse(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, FormatError::Truncated { .. }),
                "cut at {} gave {:?}",
                cut,
                err
            );
        }
    }

    #[test]
    fn test_rejects_unknown_constant_tag() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 61]);
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.push(2); // unassigned tag
        bytes.extend_from_slice(&[0; 16]);

        let err = ClassHeader::parse(&bytes).unwrap_err();
        assert!(matches!(err, FormatError::UnknownConstantTag { tag: 2, index: 1 }));
    }

    #[test]
    fn test_rejects_this_class_pointing_at_non_class() {
        let mut bytes = class_bytes("com/example/Impl", OBJECT, 0);
        // this_class sits 4 bytes before the trailing 8 count bytes; point it at the UTF-8 entry
        let this_class_at = bytes.len() - 8 - 4;
        bytes[this_class_at..this_class_at + 2].copy_from_slice(&1u16.to_be_bytes());

        let err = ClassHeader::parse(&bytes).unwrap_err();
        assert!(matches!(err, FormatError::BadClassIndex { index: 1 }));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = ClassHeader::parse(&bytes);
        }

        #[test]
        fn valid_magic_with_noise_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = MAGIC.to_be_bytes().to_vec();
            bytes.extend(tail);
            let _ = ClassHeader::parse(&bytes);
        }
    }
}
