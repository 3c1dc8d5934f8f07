use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::{
    error::MinnowError,
    types::MinnowResult,
};

/// Objects that serialize themselves to a byte buffer.
pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

/// Objects that deserialize themselves from a byte stream.
pub trait Decodeable {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

pub fn read_into<T: Decodeable, R: Read>(reader: &mut R) -> T {
    T::decode_from(reader)
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|e| panic!("read of {} bytes failed: {}", bytes_count, e));
    buffer
}

macro_rules! impl_codec {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_codec!(for u8, u16, u32, u64, i8, i16, i32, i64);

/// An append-friendly random-access file handle with typed read/write
/// helpers, used by the table files and the write-ahead log.
pub struct MinnowFile {
    file: Mutex<File>,
}

impl MinnowFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MinnowError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| MinnowError::io("create data directory", e))?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| MinnowError::io("open file", e))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn inner(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn write<T: Encodeable>(&self, obj: &T) -> MinnowResult {
        self.write_bytes(&obj.encode())
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> MinnowResult {
        self.inner()
            .write_all(bytes)
            .map_err(|e| MinnowError::io("write", e))
    }

    pub fn read<T: Decodeable>(&self) -> Result<T, MinnowError> {
        let guard = self.inner();
        let mut reader = &*guard;
        Ok(T::decode_from(&mut reader))
    }

    pub fn read_bytes(&self, bytes_count: usize) -> Result<Vec<u8>, MinnowError> {
        let mut buffer = vec![0u8; bytes_count];
        self.inner()
            .read_exact(&mut buffer)
            .map_err(|e| MinnowError::io("read", e))?;
        Ok(buffer)
    }

    /// Write a length-prefixed blob (u64 length, then the payload).
    pub fn write_blob(&self, bytes: &[u8]) -> MinnowResult {
        self.write(&(bytes.len() as u64))?;
        self.write_bytes(bytes)
    }

    pub fn read_blob(&self) -> Result<Vec<u8>, MinnowError> {
        let len = self.read::<u64>()? as usize;
        self.read_bytes(len)
    }

    pub fn seek(&self, offset: u64) -> Result<u64, MinnowError> {
        self.inner()
            .seek(SeekFrom::Start(offset))
            .map_err(|e| MinnowError::io("seek", e))
    }

    pub fn seek_end(&self) -> Result<u64, MinnowError> {
        self.inner()
            .seek(SeekFrom::End(0))
            .map_err(|e| MinnowError::io("seek", e))
    }

    pub fn get_current_position(&self) -> Result<u64, MinnowError> {
        self.inner()
            .seek(SeekFrom::Current(0))
            .map_err(|e| MinnowError::io("seek", e))
    }

    pub fn get_size(&self) -> Result<u64, MinnowError> {
        let metadata = self
            .inner()
            .metadata()
            .map_err(|e| MinnowError::io("metadata", e))?;
        Ok(metadata.len())
    }

    pub fn set_len(&self, len: u64) -> MinnowResult {
        self.inner()
            .set_len(len)
            .map_err(|e| MinnowError::io("set_len", e))
    }

    pub fn flush(&self) -> MinnowResult {
        self.inner()
            .flush()
            .map_err(|e| MinnowError::io("flush", e))
    }
}

/// An in-memory byte sink used to serialize pages.
pub struct MinnowWriter {
    buf: Vec<u8>,
}

impl MinnowWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(&obj.encode());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    /// Zero-pad the buffer up to `size` bytes. Panics if the content is
    /// already larger than `size` (the page capacity formulas guarantee it
    /// never is).
    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();
        if buf.len() > size {
            panic!(
                "serialized content larger than the target size: {} > {}",
                buf.len(),
                size
            );
        }
        buf.resize(size, 0);
        buf
    }
}
