mod defaults;
mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

// Longest string the 2 bytes length prefix can describe
pub const MAX_STRING_SIZE: usize = u16::MAX as usize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("Invalid size")]
    InvalidSize,
    #[error("Invalid value")]
    InvalidValue,
    #[error("Invalid hex")]
    InvalidHex,
    #[error("Invalid UTF-8 string")]
    InvalidUtf8,
    #[error("Array size {0} exceeds maximum")]
    ExceedsMaxArraySize(usize),
    #[error("Bytes size {0} exceeds maximum")]
    ExceedsMaxBytesSize(usize),
}

/// Binary encoding used for every value persisted on disk.
///
/// Integers are big-endian so that keys built from them keep their
/// natural ordering inside the storage.
pub trait Serializer {
    fn write(&self, writer: &mut Writer);

    fn read(reader: &mut Reader) -> Result<Self, ReaderError>
    where
        Self: Sized;

    // Size in bytes once serialized
    fn size(&self) -> usize {
        let mut writer = Writer::new();
        self.write(&mut writer);
        writer.total_write()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.size());
        self.write(&mut writer);
        writer.bytes()
    }

    fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    // Decode a value, all bytes must be consumed
    fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let mut reader = Reader::new(bytes);
        let value = Self::read(&mut reader)?;
        if reader.size() != 0 {
            return Err(ReaderError::InvalidSize);
        }

        Ok(value)
    }

    fn from_hex(hex: &str) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let bytes = hex::decode(hex).map_err(|_| ReaderError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}
