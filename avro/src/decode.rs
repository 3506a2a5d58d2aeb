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

//! Readers for the primitive Avro types.

use crate::{
    AvroResult,
    error::Details,
    util::{safe_len, zag_i32, zag_i64},
};
use std::io::Read;

/// Only `0x00` and `0x01` are valid booleans.
pub(crate) fn decode_bool<R: Read>(reader: &mut R) -> AvroResult<bool> {
    let mut buf = [0u8; 1];
    reader
        .read_exact(&mut buf[..])
        .map_err(Details::ReadBoolean)?;
    match buf[0] {
        0u8 => Ok(false),
        1u8 => Ok(true),
        other => Err(Details::BoolValue(other).into()),
    }
}

pub(crate) fn decode_int<R: Read>(reader: &mut R) -> AvroResult<i32> {
    zag_i32(reader)
}

pub(crate) fn decode_long<R: Read>(reader: &mut R) -> AvroResult<i64> {
    zag_i64(reader)
}

pub(crate) fn decode_float<R: Read>(reader: &mut R) -> AvroResult<f32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf[..])
        .map_err(Details::ReadFloat)?;
    Ok(f32::from_le_bytes(buf))
}

pub(crate) fn decode_double<R: Read>(reader: &mut R) -> AvroResult<f64> {
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf[..])
        .map_err(Details::ReadDouble)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read the length prefix of a `bytes` or `string` value.
pub(crate) fn decode_len<R: Read>(reader: &mut R) -> AvroResult<usize> {
    let len = zag_i64(reader)?;
    if len < 0 {
        return Err(Details::NegativeLength(len).into());
    }
    let len = usize::try_from(len).map_err(|e| Details::ConvertI64ToUsize(e, len))?;
    safe_len(len)
}

/// Read the item count of a collection block.
///
/// Negative counts announce a block byte size, a form this crate does not read.
pub(crate) fn decode_block_count<R: Read>(reader: &mut R) -> AvroResult<usize> {
    let count = zag_i64(reader)?;
    if count < 0 {
        return Err(Details::NegativeBlockCount(count).into());
    }
    let count = usize::try_from(count).map_err(|e| Details::ConvertI64ToUsize(e, count))?;
    safe_len(count)
}

pub(crate) fn decode_bytes<R: Read>(reader: &mut R) -> AvroResult<Vec<u8>> {
    let len = decode_len(reader)?;
    let mut buf = Vec::new();
    // grows with the input instead of trusting the prefix for the allocation
    let read = reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(Details::ReadBytes)?;
    if read != len {
        return Err(Details::ReadBytes(std::io::ErrorKind::UnexpectedEof.into()).into());
    }
    Ok(buf)
}

pub(crate) fn decode_string<R: Read>(reader: &mut R) -> AvroResult<String> {
    let bytes = decode_bytes(reader)?;
    String::from_utf8(bytes).map_err(|e| Details::ConvertToUtf8(e).into())
}

pub(crate) fn decode_fixed<R: Read>(reader: &mut R, size: usize) -> AvroResult<Vec<u8>> {
    let mut buf = vec![0u8; safe_len(size)?];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Details::ReadFixed(e, size))?;
    Ok(buf)
}
