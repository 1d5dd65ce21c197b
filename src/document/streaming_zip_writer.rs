//! Streaming ZIP writer that compresses entries on-the-fly into any `Write` sink
//!
//! Entries use data descriptors (general purpose bit 3), so the sink never needs to seek:
//! sizes and CRCs follow the compressed data and are repeated in the central directory.

use crate::error::{ExportError, Result};
use chrono::{Datelike, Timelike, Utc};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};

const LOCAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const DATA_DESCRIPTOR_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x07, 0x08];
const CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

/// Entry already written, kept for the central directory
struct ZipEntry {
    name: String,
    local_header_offset: u32,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

/// Sink wrapper that tracks how many bytes have been written
struct PositionWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> Write for PositionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writer below the compressor: counts compressed bytes, holds the CRC of the input
struct CrcCountingWriter<W: Write> {
    output: PositionWriter<W>,
    crc: Crc32,
    uncompressed_count: u64,
    compressed_count: u64,
}

impl<W: Write> Write for CrcCountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.output.write(buf)?;
        self.compressed_count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

struct CurrentEntry<W: Write> {
    name: String,
    local_header_offset: u32,
    encoder: DeflateEncoder<CrcCountingWriter<W>>,
}

/// Streaming ZIP writer that compresses data on-the-fly
pub struct StreamingZipWriter<W: Write> {
    // `None` while an entry's encoder owns the sink
    output: Option<PositionWriter<W>>,
    entries: Vec<ZipEntry>,
    current_entry: Option<CurrentEntry<W>>,
    compression_level: u32,
    dos_time: u16,
    dos_date: u16,
}

impl<W: Write> StreamingZipWriter<W> {
    pub fn new(sink: W, compression_level: u32) -> Self {
        let (dos_time, dos_date) = dos_timestamp();
        Self {
            output: Some(PositionWriter {
                inner: sink,
                position: 0,
            }),
            entries: Vec::new(),
            current_entry: None,
            compression_level: compression_level.min(9),
            dos_time,
            dos_date,
        }
    }

    /// Start a new entry (file) in the ZIP
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        // Finish previous entry if any
        self.finish_current_entry()?;

        let mut output = self.output.take().ok_or_else(Self::busy)?;
        let local_header_offset = offset_u32(output.position)?;

        output.write_all(&LOCAL_HEADER_SIGNATURE)?;
        output.write_all(&[20, 0])?; // version needed
        output.write_all(&[8, 0])?; // general purpose bit flag (bit 3 set)
        output.write_all(&[8, 0])?; // compression method = deflate
        output.write_all(&self.dos_time.to_le_bytes())?;
        output.write_all(&self.dos_date.to_le_bytes())?;
        output.write_all(&0u32.to_le_bytes())?; // crc32 placeholder
        output.write_all(&0u32.to_le_bytes())?; // compressed size placeholder
        output.write_all(&0u32.to_le_bytes())?; // uncompressed size placeholder
        output.write_all(&(name.len() as u16).to_le_bytes())?;
        output.write_all(&0u16.to_le_bytes())?; // extra len
        output.write_all(name.as_bytes())?;

        let counting_writer = CrcCountingWriter {
            output,
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        };
        let encoder =
            DeflateEncoder::new(counting_writer, Compression::new(self.compression_level));

        self.current_entry = Some(CurrentEntry {
            name: name.to_string(),
            local_header_offset,
            encoder,
        });

        Ok(())
    }

    /// Write uncompressed data to the current entry
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if self.current_entry.is_none() {
            return Err(ExportError::WriteError("No entry started".to_string()));
        }
        self.write_all(data)?;
        Ok(())
    }

    /// Finish current entry and write its data descriptor
    fn finish_current_entry(&mut self) -> Result<()> {
        if let Some(entry) = self.current_entry.take() {
            let mut counting_writer = entry.encoder.finish()?;

            let crc = counting_writer.crc.finalize();
            let compressed_size = size_u32(&entry.name, counting_writer.compressed_count)?;
            let uncompressed_size = size_u32(&entry.name, counting_writer.uncompressed_count)?;

            let output = &mut counting_writer.output;
            output.write_all(&DATA_DESCRIPTOR_SIGNATURE)?;
            output.write_all(&crc.to_le_bytes())?;
            output.write_all(&compressed_size.to_le_bytes())?;
            output.write_all(&uncompressed_size.to_le_bytes())?;

            self.output = Some(counting_writer.output);
            self.entries.push(ZipEntry {
                name: entry.name,
                local_header_offset: entry.local_header_offset,
                crc32: crc,
                compressed_size,
                uncompressed_size,
            });
        }
        Ok(())
    }

    /// Finish the archive (central directory + end record) and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.finish_current_entry()?;

        if self.entries.len() > usize::from(u16::MAX) {
            return Err(ExportError::WriteError(format!(
                "{} entries exceed the ZIP limit of {}",
                self.entries.len(),
                u16::MAX
            )));
        }

        let mut output = self.output.take().ok_or_else(Self::busy)?;
        let central_dir_offset = output.position;

        for entry in &self.entries {
            output.write_all(&CENTRAL_DIRECTORY_SIGNATURE)?;
            output.write_all(&[20, 0])?; // version made by
            output.write_all(&[20, 0])?; // version needed
            output.write_all(&[8, 0])?; // general purpose bit flag (bit 3 set)
            output.write_all(&[8, 0])?; // compression method
            output.write_all(&self.dos_time.to_le_bytes())?;
            output.write_all(&self.dos_date.to_le_bytes())?;
            output.write_all(&entry.crc32.to_le_bytes())?;
            output.write_all(&entry.compressed_size.to_le_bytes())?;
            output.write_all(&entry.uncompressed_size.to_le_bytes())?;
            output.write_all(&(entry.name.len() as u16).to_le_bytes())?;
            output.write_all(&0u16.to_le_bytes())?; // extra len
            output.write_all(&0u16.to_le_bytes())?; // file comment len
            output.write_all(&0u16.to_le_bytes())?; // disk number start
            output.write_all(&0u16.to_le_bytes())?; // internal attrs
            output.write_all(&0u32.to_le_bytes())?; // external attrs
            output.write_all(&entry.local_header_offset.to_le_bytes())?;
            output.write_all(entry.name.as_bytes())?;
        }

        let central_dir_size = offset_u32(output.position - central_dir_offset)?;
        let central_dir_offset = offset_u32(central_dir_offset)?;
        let entry_count = self.entries.len() as u16;

        output.write_all(&END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        output.write_all(&0u16.to_le_bytes())?; // disk number
        output.write_all(&0u16.to_le_bytes())?; // disk with central dir
        output.write_all(&entry_count.to_le_bytes())?;
        output.write_all(&entry_count.to_le_bytes())?;
        output.write_all(&central_dir_size.to_le_bytes())?;
        output.write_all(&central_dir_offset.to_le_bytes())?;
        output.write_all(&0u16.to_le_bytes())?; // comment len

        output.flush()?;
        Ok(output.inner)
    }

    fn busy() -> ExportError {
        ExportError::WriteError("ZIP sink is held by an unfinished entry".to_string())
    }
}

impl<W: Write> Write for StreamingZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let entry = self
            .current_entry
            .as_mut()
            .ok_or_else(|| io::Error::other("No entry started"))?;

        let n = entry.encoder.write(buf)?;
        let counter = entry.encoder.get_mut();
        counter.crc.update(&buf[..n]);
        counter.uncompressed_count += n as u64;
        Ok(n)
    }

    // Flushing the compressor would emit a sync block; only the sink is flushed.
    fn flush(&mut self) -> io::Result<()> {
        match (self.current_entry.as_mut(), self.output.as_mut()) {
            (Some(entry), _) => entry.encoder.get_mut().flush(),
            (None, Some(output)) => output.flush(),
            (None, None) => Ok(()),
        }
    }
}

fn offset_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ExportError::WriteError(format!("archive offset {} exceeds 4 GiB (no ZIP64)", value))
    })
}

fn size_u32(name: &str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ExportError::WriteError(format!("entry '{}' exceeds 4 GiB (no ZIP64)", name))
    })
}

/// Current UTC time as MS-DOS (time, date)
fn dos_timestamp() -> (u16, u16) {
    let now = Utc::now();
    let year = now.year().clamp(1980, 2107) as u16;
    let time = ((now.hour() as u16) << 11) | ((now.minute() as u16) << 5) | (now.second() as u16 / 2);
    let date = ((year - 1980) << 9) | ((now.month() as u16) << 5) | now.day() as u16;
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_archive_readable() {
        let mut zip = StreamingZipWriter::new(Vec::new(), 6);
        zip.start_entry("a.txt").unwrap();
        zip.write_data(b"hello ").unwrap();
        zip.write_data(b"world").unwrap();
        zip.start_entry("dir/b.xml").unwrap();
        zip.write_data("<x>é</x>".as_bytes()).unwrap();
        let bytes = zip.finish().unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("a.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello world");

        content.clear();
        archive
            .by_name("dir/b.xml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<x>é</x>");
    }

    #[test]
    fn test_write_without_entry_fails() {
        let mut zip = StreamingZipWriter::new(Vec::new(), 1);
        assert!(matches!(
            zip.write_data(b"orphan"),
            Err(ExportError::WriteError(_))
        ));
    }

    #[test]
    fn test_empty_archive() {
        let zip = StreamingZipWriter::new(Vec::new(), 0);
        let bytes = zip.finish().unwrap();
        // end of central directory record only
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[..4], &END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    }
}
