//! PCM WAV carrier.
//!
//! Payload samples are the bytes of the `data` sub-chunk. Their audio
//! interpretation is irrelevant here, only the low bit of each byte is
//! ever changed.

use crate::carrier::{check_range, Carrier};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// A parsed RIFF/WAVE file exposing its data chunk bytes as samples.
pub struct WavCarrier {
    file: File,
    data_offset: u64,
    data_len: u64,
}

impl WavCarrier {
    /// Validate the RIFF/WAVE structure and locate the `data` sub-chunk.
    pub fn parse(mut file: File) -> Result<Self> {
        let file_len = file.seek(SeekFrom::End(0))?;

        let mut riff = [0u8; 12];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut riff)
            .map_err(|_| Error::InvalidFormat("file too short for RIFF header".to_string()))?;

        if &riff[0..4] != b"RIFF" {
            return Err(Error::InvalidFormat("bad RIFF magic".to_string()));
        }
        if &riff[8..12] != b"WAVE" {
            return Err(Error::InvalidFormat("RIFF file is not WAVE".to_string()));
        }

        // Walk the sub-chunks until the data chunk. Chunks are word
        // aligned, an odd-sized body is followed by one pad byte.
        let mut pos = 12u64;
        loop {
            if pos + 8 > file_len {
                return Err(Error::InvalidFormat("no data chunk in WAVE file".to_string()));
            }

            let mut chunk = [0u8; 8];
            file.seek(SeekFrom::Start(pos))?;
            file.read_exact(&mut chunk)?;

            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as u64;

            if &chunk[0..4] == b"data" {
                if pos + 8 + size > file_len {
                    return Err(Error::InvalidFormat(
                        "data chunk extends past end of file".to_string(),
                    ));
                }
                return Ok(Self {
                    file,
                    data_offset: pos + 8,
                    data_len: size,
                });
            }

            pos += 8 + size + (size & 1);
        }
    }
}

impl Carrier for WavCarrier {
    fn sample_count(&self) -> u64 {
        self.data_len
    }

    fn read_samples(&mut self, index: u64, buf: &mut [u8]) -> Result<()> {
        check_range(index, buf.len(), self.data_len)?;
        self.file.seek(SeekFrom::Start(self.data_offset + index))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_samples(&mut self, index: u64, buf: &[u8]) -> Result<()> {
        check_range(index, buf.len(), self.data_len)?;
        self.file.seek(SeekFrom::Start(self.data_offset + index))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}
