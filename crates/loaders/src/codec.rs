//! Single-file compressed payloads (`.gz`, `.bz2`, ...).
//!
//! Gzip and Bzip2 are always available. Brotli, XZ and Zstd sit behind the
//! crate features of the same name.

use crate::error::{ErrorKind, Result};
use bzip2::read::MultiBzDecoder;
use exn::ResultExt;
use flate2::read::MultiGzDecoder;
use std::io::Read;
use tracing::instrument;

#[cfg(feature = "brotli")]
const BROTLI_BUFFER_SIZE: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    #[cfg(feature = "brotli")]
    Brotli,
    Bzip2,
    Gzip,
    #[cfg(feature = "xz")]
    Xz,
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Codec {
    /// Every codec compiled into this build.
    pub const ENABLED: &'static [Codec] = &[
        #[cfg(feature = "brotli")]
        Codec::Brotli,
        Codec::Bzip2,
        Codec::Gzip,
        #[cfg(feature = "xz")]
        Codec::Xz,
        #[cfg(feature = "zstd")]
        Codec::Zstd,
    ];

    /// Match a normalised suffix.
    ///
    /// Suffixes of codecs that exist but were compiled out are an error
    /// rather than `None`, so callers can tell "not compressed" apart from
    /// "compressed, but we can't read it".
    pub fn from_suffix(suffix: &str) -> Result<Option<Self>> {
        Ok(match suffix {
            "bz2" => Some(Codec::Bzip2),
            "gz" => Some(Codec::Gzip),
            #[cfg(feature = "brotli")]
            "br" => Some(Codec::Brotli),
            #[cfg(feature = "xz")]
            "xz" => Some(Codec::Xz),
            #[cfg(feature = "zstd")]
            "zst" => Some(Codec::Zstd),
            #[cfg(not(feature = "brotli"))]
            "br" => exn::bail!(ErrorKind::Unsupported(suffix.to_string())),
            #[cfg(not(feature = "xz"))]
            "xz" => exn::bail!(ErrorKind::Unsupported(suffix.to_string())),
            #[cfg(not(feature = "zstd"))]
            "zst" => exn::bail!(ErrorKind::Unsupported(suffix.to_string())),
            _ => None,
        })
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            #[cfg(feature = "brotli")]
            Codec::Brotli => "br",
            Codec::Bzip2 => "bz2",
            Codec::Gzip => "gz",
            #[cfg(feature = "xz")]
            Codec::Xz => "xz",
            #[cfg(feature = "zstd")]
            Codec::Zstd => "zst",
        }
    }

    /// Decompress a whole stream into memory.
    #[instrument(skip(input), fields(codec = self.suffix(), output_size))]
    pub fn decode(&self, input: impl Read) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let size = match self {
            #[cfg(feature = "brotli")]
            Codec::Brotli => brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE).read_to_end(&mut output),
            Codec::Bzip2 => MultiBzDecoder::new(input).read_to_end(&mut output),
            Codec::Gzip => MultiGzDecoder::new(input).read_to_end(&mut output),
            #[cfg(feature = "xz")]
            Codec::Xz => xz2::read::XzDecoder::new(input).read_to_end(&mut output),
            #[cfg(feature = "zstd")]
            Codec::Zstd => zstd::stream::read::Decoder::new(input).and_then(|mut d| d.read_to_end(&mut output)),
        }
        .or_raise(|| ErrorKind::Malformed(self.suffix()))?;
        tracing::Span::current().record("output_size", size);
        Ok(output)
    }
}
