//! Uncompressed bottom-up BMP carrier.
//!
//! Payload samples are the pixel-array bytes in file order, excluding the
//! padding that pads each row to a 4-byte boundary.

use crate::carrier::{check_range, Carrier};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

const FILE_HEADER_SIZE: u64 = 14;
const MIN_DIB_HEADER_SIZE: u32 = 40;
const BI_RGB: u32 = 0;

/// A parsed BMP file exposing its pixel bytes as samples.
pub struct BmpCarrier {
    file: File,
    pixel_offset: u64,
    /// Payload bytes per row (pixels only).
    row_payload: u64,
    /// On-disk bytes per row (payload plus padding).
    row_stride: u64,
    rows: u64,
}

impl BmpCarrier {
    /// Validate the BMP structure and locate the pixel array.
    pub fn parse(mut file: File) -> Result<Self> {
        let file_len = file.seek(SeekFrom::End(0))?;
        if file_len < FILE_HEADER_SIZE + MIN_DIB_HEADER_SIZE as u64 {
            return Err(Error::InvalidFormat("file too short for BMP headers".to_string()));
        }

        let mut header = [0u8; 14];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;

        if &header[0..2] != b"BM" {
            return Err(Error::InvalidFormat("bad BMP magic".to_string()));
        }

        let declared_size = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as u64;
        if declared_size > file_len {
            return Err(Error::InvalidFormat(
                "BMP declares more bytes than the file holds".to_string(),
            ));
        }

        let pixel_offset =
            u32::from_le_bytes([header[10], header[11], header[12], header[13]]) as u64;

        let mut dib = [0u8; 40];
        file.read_exact(&mut dib)?;

        let dib_size = u32::from_le_bytes([dib[0], dib[1], dib[2], dib[3]]);
        if dib_size < MIN_DIB_HEADER_SIZE {
            return Err(Error::InvalidFormat("unsupported DIB header".to_string()));
        }

        let width = i32::from_le_bytes([dib[4], dib[5], dib[6], dib[7]]);
        let height = i32::from_le_bytes([dib[8], dib[9], dib[10], dib[11]]);
        let planes = u16::from_le_bytes([dib[12], dib[13]]);
        let bpp = u16::from_le_bytes([dib[14], dib[15]]);
        let compression = u32::from_le_bytes([dib[16], dib[17], dib[18], dib[19]]);

        if width <= 0 {
            return Err(Error::InvalidFormat("non-positive BMP width".to_string()));
        }
        // Negative height means a top-down pixel array.
        if height <= 0 {
            return Err(Error::InvalidFormat(
                "top-down BMP layout not supported".to_string(),
            ));
        }
        if planes != 1 {
            return Err(Error::InvalidFormat("BMP plane count must be 1".to_string()));
        }
        if compression != BI_RGB {
            return Err(Error::InvalidFormat(
                "compressed BMP not supported".to_string(),
            ));
        }
        if !matches!(bpp, 8 | 16 | 24 | 32) {
            return Err(Error::InvalidFormat(format!(
                "unsupported BMP bit depth: {bpp}"
            )));
        }

        let row_payload = width as u64 * (bpp as u64 / 8);
        let row_stride = (row_payload + 3) & !3;
        let rows = height as u64;

        let pixel_end = pixel_offset
            .checked_add(row_stride * rows)
            .ok_or_else(|| Error::InvalidFormat("BMP pixel array overflows".to_string()))?;
        if pixel_offset < FILE_HEADER_SIZE + dib_size as u64 || pixel_end > file_len {
            return Err(Error::InvalidFormat(
                "BMP pixel array outside the file".to_string(),
            ));
        }

        Ok(Self {
            file,
            pixel_offset,
            row_payload,
            row_stride,
            rows,
        })
    }

    /// File offset of the sample at `index`.
    fn sample_pos(&self, index: u64) -> u64 {
        let row = index / self.row_payload;
        let col = index % self.row_payload;
        self.pixel_offset + row * self.row_stride + col
    }
}

impl Carrier for BmpCarrier {
    fn sample_count(&self) -> u64 {
        self.row_payload * self.rows
    }

    fn read_samples(&mut self, mut index: u64, buf: &mut [u8]) -> Result<()> {
        check_range(index, buf.len(), self.sample_count())?;

        let mut buf = buf;
        while !buf.is_empty() {
            let col = index % self.row_payload;
            let run = ((self.row_payload - col) as usize).min(buf.len());

            self.file.seek(SeekFrom::Start(self.sample_pos(index)))?;
            self.file.read_exact(&mut buf[..run])?;

            index += run as u64;
            buf = &mut buf[run..];
        }
        Ok(())
    }

    fn write_samples(&mut self, mut index: u64, buf: &[u8]) -> Result<()> {
        check_range(index, buf.len(), self.sample_count())?;

        let mut buf = buf;
        while !buf.is_empty() {
            let col = index % self.row_payload;
            let run = ((self.row_payload - col) as usize).min(buf.len());

            self.file.seek(SeekFrom::Start(self.sample_pos(index)))?;
            self.file.write_all(&buf[..run])?;

            index += run as u64;
            buf = &buf[run..];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::testutil::write_bmp;
    use tempfile::NamedTempFile;

    fn open(f: &NamedTempFile) -> BmpCarrier {
        let file = File::options()
            .read(true)
            .write(true)
            .open(f.path())
            .unwrap();
        BmpCarrier::parse(file).unwrap()
    }

    #[test]
    fn test_parse_counts_payload_without_padding() {
        // 3 pixels * 3 bytes = 9 payload bytes per row, stride 12.
        let f = write_bmp(3, 4);
        let bmp = open(&f);

        assert_eq!(bmp.row_payload, 9);
        assert_eq!(bmp.row_stride, 12);
        assert_eq!(bmp.sample_count(), 36);
    }

    #[test]
    fn test_samples_skip_row_padding() {
        let f = write_bmp(3, 2);
        let mut bmp = open(&f);

        // Overwrite all samples, then check the padding bytes survived.
        let marked = vec![0x11u8; bmp.sample_count() as usize];
        bmp.write_samples(0, &marked).unwrap();

        let raw = std::fs::read(f.path()).unwrap();
        assert_eq!(&raw[54..63], &[0x11; 9]); // row 0 payload
        assert_eq!(&raw[63..66], &[0xA5; 3]); // row 0 padding untouched
        assert_eq!(&raw[66..75], &[0x11; 9]); // row 1 payload
    }

    #[test]
    fn test_read_write_round_trip_across_rows() {
        let f = write_bmp(3, 3);
        let mut bmp = open(&f);

        let data: Vec<u8> = (0..20).collect();
        bmp.write_samples(5, &data).unwrap();

        let mut back = vec![0u8; 20];
        bmp.read_samples(5, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_out_of_range_sample_access() {
        let f = write_bmp(3, 2);
        let mut bmp = open(&f);

        let mut buf = [0u8; 4];
        let result = bmp.read_samples(bmp.sample_count() - 2, &mut buf);
        assert!(matches!(result, Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_reject_compressed() {
        let f = write_bmp(4, 4);
        // Patch the compression field (offset 14 + 16 = 30) to BI_RLE8.
        let mut raw = std::fs::read(f.path()).unwrap();
        raw[30..34].copy_from_slice(&1u32.to_le_bytes());
        std::fs::write(f.path(), &raw).unwrap();

        let file = File::options()
            .read(true)
            .write(true)
            .open(f.path())
            .unwrap();
        assert!(matches!(
            BmpCarrier::parse(file),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_reject_top_down() {
        let f = write_bmp(4, 4);
        // Negative height marks a top-down layout.
        let mut raw = std::fs::read(f.path()).unwrap();
        raw[22..26].copy_from_slice(&(-4i32).to_le_bytes());
        std::fs::write(f.path(), &raw).unwrap();

        let file = File::options()
            .read(true)
            .write(true)
            .open(f.path())
            .unwrap();
        assert!(matches!(
            BmpCarrier::parse(file),
            Err(Error::InvalidFormat(_))
        ));
    }
}
