use std::io::{Seek, SeekFrom, Write};

use crate::{ImgError, ImgErrorCode, Result};

/// Sequential little-endian byte sink for IMG sections.
///
/// Sections that patch earlier records (MDR1) need [`ImgFileWriter::seek`]
/// to return to an already written position.
pub trait ImgFileWriter {
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Current write offset from the start of the sink.
    fn position(&self) -> u64;

    fn seek(&mut self, position: u64) -> Result<()>;

    fn put1(&mut self, value: u8) -> Result<()> {
        self.put_bytes(&[value])
    }

    fn put2(&mut self, value: u16) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Writes the low 24 bits of `value`.
    fn put3(&mut self, value: u32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes()[..3])
    }

    fn put4(&mut self, value: u32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }
}

/// In-memory sink. Writing after a seek overwrites existing bytes and
/// extends the buffer when it runs past the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferWriter {
    bytes: Vec<u8>,
    position: usize,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ImgFileWriter for BufferWriter {
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.position + bytes.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        let position = usize::try_from(position).map_err(|_| {
            ImgError::new(
                ImgErrorCode::OffsetOverflow,
                format!("Seek position {position} exceeds platform usize."),
            )
        })?;
        if position > self.bytes.len() {
            self.bytes.resize(position, 0);
        }
        self.position = position;
        Ok(())
    }
}

/// Adapts any seekable byte stream, such as a file, to [`ImgFileWriter`].
#[derive(Debug)]
pub struct StreamWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> StreamWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let position = inner.stream_position().map_err(|err| {
            ImgError::new(
                ImgErrorCode::WriteFailed,
                format!("Could not query stream position: {err}"),
            )
        })?;
        Ok(Self { inner, position })
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|err| {
            ImgError::new(
                ImgErrorCode::WriteFailed,
                format!("Could not flush stream: {err}"),
            )
        })
    }
}

impl<W: Write + Seek> ImgFileWriter for StreamWriter<W> {
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(|err| {
            ImgError::new(
                ImgErrorCode::WriteFailed,
                format!(
                    "Could not write {} bytes at offset {}: {err}",
                    bytes.len(),
                    self.position
                ),
            )
        })?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(position)).map_err(|err| {
            ImgError::new(
                ImgErrorCode::WriteFailed,
                format!("Could not seek to offset {position}: {err}"),
            )
        })?;
        Ok(())
    }
}
