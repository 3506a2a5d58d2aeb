// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Block compression for object container files.

use crate::{
    AvroResult,
    error::{Details, Error},
    util::{DEFAULT_MAX_ALLOCATION_BYTES, max_allocation_bytes},
};
use strum_macros::{EnumString, IntoStaticStr};

/// Settings for the `Deflate` codec.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct DeflateSettings {
    compression_level: miniz_oxide::deflate::CompressionLevel,
}

impl DeflateSettings {
    pub fn new(compression_level: miniz_oxide::deflate::CompressionLevel) -> Self {
        DeflateSettings { compression_level }
    }

    fn compression_level(&self) -> u8 {
        self.compression_level as u8
    }
}

impl Default for DeflateSettings {
    /// Default compression level is `miniz_oxide::deflate::CompressionLevel::DefaultCompression`.
    fn default() -> Self {
        Self::new(miniz_oxide::deflate::CompressionLevel::DefaultCompression)
    }
}

/// The compression codec used to compress blocks.
///
/// The name of the codec is stored under `avro.codec` in the file header.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab_case")]
pub enum Codec {
    /// Data is stored uncompressed.
    #[default]
    Null,
    /// Each block is a zlib stream (RFC 1950), so it carries an Adler-32 checksum.
    Deflate(DeflateSettings),
    /// Each block is a framed [Snappy](http://google.github.io/snappy/) stream, whose frames
    /// carry a CRC-32C of their uncompressed data.
    #[cfg(feature = "snappy")]
    Snappy,
}

impl Codec {
    /// Compress a stream of bytes in-place.
    pub fn compress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        match self {
            Codec::Null => (),
            Codec::Deflate(settings) => {
                *stream =
                    miniz_oxide::deflate::compress_to_vec_zlib(stream, settings.compression_level());
            }
            #[cfg(feature = "snappy")]
            Codec::Snappy => {
                use std::io::Write;

                let mut compressed = Vec::with_capacity(snap::raw::max_compress_len(stream.len()));
                let mut encoder = snap::write::FrameEncoder::new(&mut compressed);
                encoder
                    .write_all(stream)
                    .and_then(|()| encoder.flush())
                    .map_err(Details::SnappyCompress)?;
                drop(encoder);
                *stream = compressed;
            }
        };

        Ok(())
    }

    /// Decompress a stream of bytes in-place.
    ///
    /// The output may not grow past the limit set with [`max_allocation_bytes`].
    pub fn decompress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        let limit = max_allocation_bytes(DEFAULT_MAX_ALLOCATION_BYTES);
        *stream = match self {
            Codec::Null => return Ok(()),
            Codec::Deflate(_settings) => {
                miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(stream, limit).map_err(|e| {
                    let err = {
                        use miniz_oxide::inflate::TINFLStatus::*;
                        use std::io::{Error, ErrorKind};
                        match e.status {
                            FailedCannotMakeProgress | NeedsMoreInput => {
                                Error::from(ErrorKind::UnexpectedEof)
                            }
                            Adler32Mismatch | Failed => Error::from(ErrorKind::InvalidData),
                            HasMoreOutput => Error::new(
                                ErrorKind::OutOfMemory,
                                format!("decompressed block is larger than {limit} bytes"),
                            ),
                            BadParam | Done => Error::other(format!(
                                "unexpected inflate status {:?}",
                                e.status
                            )),
                        }
                    };
                    Error::new(Details::DeflateDecompress(err))
                })?
            }
            #[cfg(feature = "snappy")]
            Codec::Snappy => {
                use std::io::Read;

                let mut decoded = Vec::new();
                snap::read::FrameDecoder::new(stream.as_slice())
                    .take(limit as u64 + 1)
                    .read_to_end(&mut decoded)
                    .map_err(Details::SnappyDecompress)?;
                if decoded.len() > limit {
                    return Err(Details::MemoryAllocation {
                        desired: decoded.len(),
                        maximum: limit,
                    }
                    .into());
                }
                decoded
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use miniz_oxide::deflate::CompressionLevel;
    use pretty_assertions::{assert_eq, assert_ne};
    use std::str::FromStr;

    type TestResult = anyhow::Result<()>;

    const INPUT: &[u8] = b"theanswertolifetheuniverseandeverythingis42theanswertolifetheuniverseandeverythingis4theanswertolifetheuniverseandeverythingis2";

    #[test]
    fn null_compress_and_decompress() -> TestResult {
        let codec = Codec::Null;
        let mut stream = INPUT.to_vec();
        codec.compress(&mut stream)?;
        assert_eq!(INPUT, stream.as_slice());
        codec.decompress(&mut stream)?;
        assert_eq!(INPUT, stream.as_slice());
        Ok(())
    }

    #[test]
    fn deflate_compress_and_decompress() -> TestResult {
        compress_and_decompress(Codec::Deflate(DeflateSettings::new(
            CompressionLevel::BestCompression,
        )))
    }

    #[test]
    fn deflate_writes_a_zlib_stream() -> TestResult {
        let mut stream = INPUT.to_vec();
        Codec::Deflate(DeflateSettings::default()).compress(&mut stream)?;
        // CMF for deflate with a 32K window
        assert_eq!(stream[0], 0x78);
        assert_eq!(u16::from_be_bytes([stream[0], stream[1]]) % 31, 0);
        Ok(())
    }

    #[test]
    fn deflate_rejects_garbage() {
        let mut stream = b"definitely not zlib".to_vec();
        let err = Codec::Deflate(DeflateSettings::default())
            .decompress(&mut stream)
            .unwrap_err();
        assert!(matches!(err.details(), Details::DeflateDecompress(_)));
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn snappy_compress_and_decompress() -> TestResult {
        compress_and_decompress(Codec::Snappy)
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn snappy_writes_a_framed_stream() -> TestResult {
        let mut stream = INPUT.to_vec();
        Codec::Snappy.compress(&mut stream)?;
        // stream identifier chunk
        assert_eq!(&stream[..10], b"\xff\x06\x00\x00sNaPpY");
        Ok(())
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn snappy_rejects_garbage() {
        let mut stream = b"definitely not snappy".to_vec();
        let err = Codec::Snappy.decompress(&mut stream).unwrap_err();
        assert!(matches!(err.details(), Details::SnappyDecompress(_)));
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    fn compress_and_decompress(codec: Codec) -> TestResult {
        let mut stream = INPUT.to_vec();
        codec.compress(&mut stream)?;
        assert_ne!(INPUT, stream.as_slice());
        assert!(INPUT.len() > stream.len());
        codec.decompress(&mut stream)?;
        assert_eq!(INPUT, stream.as_slice());
        Ok(())
    }

    #[test]
    fn empty_input() -> TestResult {
        for codec in [
            Codec::Null,
            Codec::Deflate(DeflateSettings::default()),
            #[cfg(feature = "snappy")]
            Codec::Snappy,
        ] {
            let mut stream = Vec::new();
            codec.compress(&mut stream)?;
            codec.decompress(&mut stream)?;
            assert!(stream.is_empty(), "{codec:?}");
        }
        Ok(())
    }

    #[test]
    fn codec_to_str() {
        assert_eq!(<&str>::from(Codec::Null), "null");
        assert_eq!(
            <&str>::from(Codec::Deflate(DeflateSettings::default())),
            "deflate"
        );

        #[cfg(feature = "snappy")]
        assert_eq!(<&str>::from(Codec::Snappy), "snappy");
    }

    #[test]
    fn codec_from_str() -> TestResult {
        assert_eq!(Codec::from_str("null")?, Codec::Null);
        assert_eq!(
            Codec::from_str("deflate")?,
            Codec::Deflate(DeflateSettings::default())
        );

        #[cfg(feature = "snappy")]
        assert_eq!(Codec::from_str("snappy")?, Codec::Snappy);

        assert!(Codec::from_str("not a codec").is_err());
        assert!(Codec::from_str("zstandard").is_err());
        Ok(())
    }
}
