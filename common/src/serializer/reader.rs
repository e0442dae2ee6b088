use super::{ReaderError, Serializer};

// Maximum length accepted for a single string or byte blob
pub const MAX_BYTES_SIZE: usize = u16::MAX as usize;

pub struct Reader<'a> {
    bytes: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, total: 0 }
    }

    pub fn read<T: Serializer>(&mut self) -> Result<T, ReaderError> {
        T::read(self)
    }

    pub fn read_bool(&mut self) -> Result<bool, ReaderError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    pub fn read_bytes_ref(&mut self, n: usize) -> Result<&'a [u8], ReaderError> {
        if n > self.size() {
            return Err(ReaderError::InvalidSize);
        }

        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        self.total += n;
        Ok(head)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ReaderError> {
        if n > MAX_BYTES_SIZE {
            return Err(ReaderError::ExceedsMaxBytesSize(n));
        }
        self.read_bytes_ref(n).map(|bytes| bytes.to_vec())
    }

    pub fn read_bytes_8(&mut self) -> Result<[u8; 8], ReaderError> {
        let bytes = self.read_bytes_ref(8)?;
        bytes.try_into().map_err(|_| ReaderError::InvalidSize)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        Ok(self.read_bytes_ref(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let bytes = self.read_bytes_ref(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let bytes = self.read_bytes_ref(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        Ok(u64::from_be_bytes(self.read_bytes_8()?))
    }

    pub fn read_string_with_size(&mut self, size: usize) -> Result<String, ReaderError> {
        let bytes = self.read_bytes(size)?;
        String::from_utf8(bytes).map_err(|_| ReaderError::InvalidUtf8)
    }

    pub fn read_string(&mut self) -> Result<String, ReaderError> {
        let size = self.read_u16()? as usize;
        self.read_string_with_size(size)
    }

    // Remaining bytes to read
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn total_read(&self) -> usize {
        self.total
    }
}
