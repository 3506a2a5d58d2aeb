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

//! Variable length integers, allocation limits and JSON helpers.

use crate::{AvroResult, error::Details};
use serde_json::{Map, Value};
use std::{
    io::{ErrorKind, Read, Write},
    sync::{
        Once,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Maximum number of bytes that can be allocated when decoding
/// Avro-encoded values. This is a protection against ill-formed
/// data, whose length field might be interpreted as enormous.
/// See max_allocation_bytes to change this limit.
pub const DEFAULT_MAX_ALLOCATION_BYTES: usize = 512 * 1024 * 1024;
static MAX_ALLOCATION_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_ALLOCATION_BYTES);
static MAX_ALLOCATION_BYTES_ONCE: Once = Once::new();

/// Set a new maximum number of bytes that can be allocated when decoding data.
/// Once called, the limit cannot be changed.
///
/// **NOTE** This function must be called before decoding **any** data. The
/// library leverages [`std::sync::Once`](https://doc.rust-lang.org/std/sync/struct.Once.html)
/// to set the limit either when calling this method, or when decoding for
/// the first time.
pub fn max_allocation_bytes(num_bytes: usize) -> usize {
    MAX_ALLOCATION_BYTES_ONCE.call_once(|| {
        MAX_ALLOCATION_BYTES.store(num_bytes, Ordering::Release);
    });
    MAX_ALLOCATION_BYTES.load(Ordering::Acquire)
}

/// Maximum depth of nested values (records, arrays, maps and unions) when encoding or
/// decoding. Recursive schemas are otherwise only bounded by the input, and a deep enough datum
/// would overflow the stack.
/// See max_nesting_depth to change this limit.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;
static MAX_NESTING_DEPTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_NESTING_DEPTH);
static MAX_NESTING_DEPTH_ONCE: Once = Once::new();

/// Set a new maximum nesting depth for encoded and decoded values.
/// Once called, the limit cannot be changed.
///
/// **NOTE** Like [`max_allocation_bytes`], this must be called before compiling **any**
/// [`DatumCodec`](crate::DatumCodec): every codec reads the limit when it is compiled.
pub fn max_nesting_depth(depth: usize) -> usize {
    MAX_NESTING_DEPTH_ONCE.call_once(|| {
        MAX_NESTING_DEPTH.store(depth, Ordering::Release);
    });
    MAX_NESTING_DEPTH.load(Ordering::Acquire)
}

pub fn safe_len(len: usize) -> AvroResult<usize> {
    let max_bytes = max_allocation_bytes(DEFAULT_MAX_ALLOCATION_BYTES);

    if len <= max_bytes {
        Ok(len)
    } else {
        Err(Details::MemoryAllocation {
            desired: len,
            maximum: max_bytes,
        }
        .into())
    }
}

pub(crate) trait MapHelper {
    fn string(&self, key: &str) -> Option<String>;

    fn name(&self) -> Option<String> {
        self.string("name")
    }
}

impl MapHelper for Map<String, Value> {
    fn string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
    }
}

pub fn read_long<R: Read>(reader: &mut R) -> AvroResult<i64> {
    zag_i64(reader)
}

/// Read a long, treating an end of input before its first byte as `None`.
///
/// An end of input after the first byte is still an error.
pub fn read_long_or_eof<R: Read>(reader: &mut R) -> AvroResult<Option<i64>> {
    let mut first = [0u8; 1];
    loop {
        match reader.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Details::ReadVariableIntegerBytes(e).into()),
        }
    }
    let z = continue_variable(first[0], reader)?;
    Ok(Some(unzigzag(z)))
}

pub fn zig_i32<W: Write>(n: i32, buffer: W) -> AvroResult<usize> {
    zig_i64(n as i64, buffer)
}

pub fn zig_i64<W: Write>(n: i64, writer: W) -> AvroResult<usize> {
    encode_variable(((n << 1) ^ (n >> 63)) as u64, writer)
}

pub fn zag_i32<R: Read>(reader: &mut R) -> AvroResult<i32> {
    let i = zag_i64(reader)?;
    i32::try_from(i).map_err(|e| Details::ZagI32(e, i).into())
}

pub fn zag_i64<R: Read>(reader: &mut R) -> AvroResult<i64> {
    decode_variable(reader).map(unzigzag)
}

fn unzigzag(z: u64) -> i64 {
    if z & 0x1 == 0 {
        (z >> 1) as i64
    } else {
        !(z >> 1) as i64
    }
}

fn encode_variable<W: Write>(mut z: u64, mut writer: W) -> AvroResult<usize> {
    let mut buffer = [0u8; 10];
    let mut i: usize = 0;
    loop {
        if z <= 0x7F {
            buffer[i] = (z & 0x7F) as u8;
            i += 1;
            break;
        } else {
            buffer[i] = (0x80 | (z & 0x7F)) as u8;
            i += 1;
            z >>= 7;
        }
    }
    writer
        .write_all(&buffer[..i])
        .map_err(Details::WriteBytes)?;
    Ok(i)
}

fn decode_variable<R: Read>(reader: &mut R) -> AvroResult<u64> {
    let mut buf = [0u8; 1];
    reader
        .read_exact(&mut buf[..])
        .map_err(Details::ReadVariableIntegerBytes)?;
    continue_variable(buf[0], reader)
}

fn continue_variable<R: Read>(first: u8, reader: &mut R) -> AvroResult<u64> {
    let mut i = u64::from(first & 0x7F);
    let mut byte = first;
    let mut j = 0;
    while (byte >> 7) != 0 {
        j += 1;
        if j > 9 {
            // if j * 7 > 64
            return Err(Details::IntegerOverflow.into());
        }
        let mut buf = [0u8; 1];
        reader
            .read_exact(&mut buf[..])
            .map_err(Details::ReadVariableIntegerBytes)?;
        byte = buf[0];
        // the tenth septet only has room for the top bit of a u64
        if j == 9 && byte > 0x01 {
            return Err(Details::IntegerOverflow.into());
        }
        i |= (u64::from(byte & 0x7F)) << (j * 7);
    }
    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as AvroErrorKind;
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn test_zigzag() -> TestResult {
        let mut a = Vec::new();
        let mut b = Vec::new();
        zig_i32(42i32, &mut a)?;
        zig_i64(42i64, &mut b)?;
        assert_eq!(a, b);
        assert_eq!(a, [0x54]);
        Ok(())
    }

    #[test]
    fn test_zig_i64() -> TestResult {
        let mut s = Vec::new();

        zig_i64(0, &mut s)?;
        assert_eq!(s, [0]);

        s.clear();
        zig_i64(-1, &mut s)?;
        assert_eq!(s, [1]);

        s.clear();
        zig_i64(1, &mut s)?;
        assert_eq!(s, [2]);

        s.clear();
        zig_i64(-64, &mut s)?;
        assert_eq!(s, [127]);

        s.clear();
        zig_i64(64, &mut s)?;
        assert_eq!(s, [128, 1]);

        s.clear();
        zig_i64(i32::MAX as i64 + 1, &mut s)?;
        assert_eq!(s, [128, 128, 128, 128, 16]);

        s.clear();
        zig_i64(i64::MAX, &mut s)?;
        assert_eq!(s, [254, 255, 255, 255, 255, 255, 255, 255, 255, 1]);

        s.clear();
        let written = zig_i64(i64::MIN, &mut s)?;
        assert_eq!(written, 10);
        assert_eq!(s, [255, 255, 255, 255, 255, 255, 255, 255, 255, 1]);
        Ok(())
    }

    #[test]
    fn test_zig_i32() -> TestResult {
        let mut s = Vec::new();
        zig_i32(i32::MAX, &mut s)?;
        assert_eq!(s, [254, 255, 255, 255, 15]);

        s.clear();
        zig_i32(i32::MIN, &mut s)?;
        assert_eq!(s, [255, 255, 255, 255, 15]);
        Ok(())
    }

    #[test]
    fn test_zag_extremes() -> TestResult {
        for n in [0, -1, 1, 63, -64, 64, i64::MAX, i64::MIN] {
            let mut s = Vec::new();
            zig_i64(n, &mut s)?;
            assert_eq!(zag_i64(&mut s.as_slice())?, n);
        }
        Ok(())
    }

    #[test]
    fn test_overflow() {
        let eleven_septets: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let err = decode_variable(&mut &*eleven_septets).unwrap_err();
        assert!(matches!(err.details(), Details::IntegerOverflow));

        let too_wide_tenth: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        assert!(decode_variable(&mut &*too_wide_tenth).is_err());
    }

    #[test]
    fn test_int_out_of_range() -> TestResult {
        let mut s = Vec::new();
        zig_i64(i32::MAX as i64 + 1, &mut s)?;
        let err = zag_i32(&mut s.as_slice()).unwrap_err();
        assert!(matches!(err.details(), Details::ZagI32(..)));
        Ok(())
    }

    #[test]
    fn test_truncated_varint_is_a_stream_error() {
        let truncated: &[u8] = &[0xe1, 0xe1];
        let err = zag_i64(&mut &*truncated).unwrap_err();
        assert_eq!(err.kind(), AvroErrorKind::Stream);
    }

    #[test]
    fn test_read_long_or_eof() -> TestResult {
        let empty: &[u8] = &[];
        assert_eq!(read_long_or_eof(&mut &*empty)?, None);

        let two: &[u8] = &[0x04];
        assert_eq!(read_long_or_eof(&mut &*two)?, Some(2));

        let cut: &[u8] = &[0x80];
        assert!(read_long_or_eof(&mut &*cut).is_err());
        Ok(())
    }

    #[test]
    fn test_safe_len() -> TestResult {
        assert_eq!(42usize, safe_len(42usize)?);
        assert!(safe_len(1024 * 1024 * 1024).is_err());

        Ok(())
    }
}
