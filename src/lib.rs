//! Steganographic carrier filesystem
//!
//! A hierarchical filesystem hidden inside an ordinary media file. Every
//! filesystem byte is spread over the least-significant bits of eight
//! carrier samples, so the carrier stays a valid, perceptually unchanged
//! BMP image or PCM WAV recording.
//!
//! # Architecture
//!
//! ```text
//! StegoFs (directories, files, clusters)
//!     → LsbCodec (bytes ↔ sample LSBs)
//!         → Carrier (BMP / WAV payload samples)
//!             → media file
//! ```
//!
//! The filesystem is cluster based: 4096-byte clusters linked into chains,
//! a root directory at cluster 0, and an MD5-protected superblock. A lazy
//! cluster cache buffers all writes until [`StegoFs::sync`].
//!
//! # Example
//!
//! ```rust,no_run
//! use stegofs::{LsbCodec, StegoFs};
//! use std::path::Path;
//!
//! let mut codec = LsbCodec::open(Path::new("holiday.bmp")).unwrap();
//! StegoFs::format(&mut codec).unwrap();
//!
//! let mut fs = StegoFs::mount(codec).unwrap();
//! fs.create("/secret.txt").unwrap();
//! let h = fs.open("/secret.txt").unwrap();
//! fs.write(&h, b"hidden in plain sight", 0).unwrap();
//! fs.release(h);
//! fs.unmount().unwrap();
//! ```

pub mod carrier;
pub mod codec;
pub mod config;
pub mod error;
pub mod vfs;

pub use codec::LsbCodec;
pub use error::{Error, Result};
pub use vfs::StegoFs;
