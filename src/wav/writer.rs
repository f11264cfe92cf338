//! WAV writer for output of unknown length.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::PcmFormat;
use super::header::{WavHeader, HEADER_LEN, MAX_DATA_BYTES};

/// Streams PCM into a WAV container and backpatches the header at the end.
///
/// The placeholder header is written by the constructor, so the first 44
/// bytes of the sink always belong to the header and nothing else can be
/// written ahead of the payload.
pub struct WavStreamWriter<W: Write + Seek> {
    inner: Option<W>,
    format: PcmFormat,
    data_bytes: u32,
}

impl WavStreamWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and writes the placeholder header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for writing.
    pub fn create<P: AsRef<Path>>(path: P, format: PcmFormat) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), format)
    }

    /// Finalizes a file after a failed run.
    ///
    /// A failed [`append_chunk`](Self::append_chunk) may leave part of its
    /// bytes in the file without counting them. The file is cut back to the
    /// last fully appended chunk before the header is patched, so the header
    /// and the file length agree.
    pub fn finalize_truncated(mut self) -> io::Result<File> {
        let data_bytes = self.data_bytes;
        let mut buffered = self
            .inner
            .take()
            .ok_or_else(|| io::Error::other("WAV writer already finalized"))?;

        let flushed = buffered.flush();
        let (mut file, _) = buffered.into_parts();
        if let Err(e) = flushed {
            tracing::warn!("Dropping buffered PCM after failed flush: {}", e);
        }

        file.set_len(HEADER_LEN as u64 + u64::from(data_bytes))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&WavHeader::new(&self.format, data_bytes).to_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl<W: Write + Seek> WavStreamWriter<W> {
    /// Wraps `inner` and writes the placeholder header at its current position.
    pub fn new(mut inner: W, format: PcmFormat) -> io::Result<Self> {
        inner.write_all(&WavHeader::placeholder(&format).to_bytes())?;
        Ok(Self {
            inner: Some(inner),
            format,
            data_bytes: 0,
        })
    }

    /// Format the header describes.
    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    /// PCM bytes appended so far.
    pub fn data_bytes(&self) -> u32 {
        self.data_bytes
    }

    /// Appends raw PCM bytes verbatim after everything written so far.
    ///
    /// # Errors
    ///
    /// Fails on a short write, or if the payload would outgrow the 32-bit
    /// size fields of the header.
    pub fn append_chunk(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let total = u32::try_from(bytes.len())
            .ok()
            .and_then(|len| self.data_bytes.checked_add(len))
            .filter(|total| *total <= MAX_DATA_BYTES)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "PCM payload exceeds the 4 GiB WAV size limit",
                )
            })?;

        self.sink()?.write_all(bytes)?;
        self.data_bytes = total;
        Ok(bytes.len())
    }

    /// Rewrites the 44-byte header for `total_data_bytes` and returns to the end.
    ///
    /// Only the header region is touched. Calling this twice with the same
    /// total leaves byte-identical header bytes.
    pub fn patch_header(&mut self, total_data_bytes: u32) -> io::Result<()> {
        let header = WavHeader::new(&self.format, total_data_bytes).to_bytes();
        let sink = self.sink()?;
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(&header)?;
        sink.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Patches the header with the final payload size, flushes, and hands
    /// back the sink.
    ///
    /// # Errors
    ///
    /// `total_data_bytes` must equal the number of bytes appended; anything
    /// else would leave a header that disagrees with the file length.
    pub fn finalize(mut self, total_data_bytes: u32) -> io::Result<W> {
        if total_data_bytes != self.data_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "finalize with {} data bytes, but {} were written",
                    total_data_bytes, self.data_bytes
                ),
            ));
        }

        self.patch_header(total_data_bytes)?;
        self.sink()?.flush()?;
        self.inner
            .take()
            .ok_or_else(|| io::Error::other("WAV writer already finalized"))
    }

    fn sink(&mut self) -> io::Result<&mut W> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other("WAV writer already finalized"))
    }
}

impl<W: Write + Seek> Drop for WavStreamWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_none() {
            return;
        }
        let data_bytes = self.data_bytes;
        tracing::warn!(
            "WAV writer dropped without finalize, backpatching {} data bytes",
            data_bytes
        );
        let result = self
            .patch_header(data_bytes)
            .and_then(|_| self.sink().and_then(|sink| sink.flush()));
        if let Err(e) = result {
            tracing::warn!("Failed to backpatch WAV header on drop: {}", e);
        }
    }
}
