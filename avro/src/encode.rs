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

//! Writers for the primitive Avro types.
//!
//! Every function returns the number of bytes written.

use crate::{
    AvroResult,
    error::Details,
    util::{zig_i32, zig_i64},
};
use std::io::Write;

pub(crate) fn encode_bool<W: Write>(b: bool, writer: &mut W) -> AvroResult<usize> {
    encode_raw(&[u8::from(b)], writer)
}

pub(crate) fn encode_int<W: Write>(i: i32, writer: &mut W) -> AvroResult<usize> {
    zig_i32(i, writer)
}

pub(crate) fn encode_long<W: Write>(i: i64, writer: &mut W) -> AvroResult<usize> {
    zig_i64(i, writer)
}

pub(crate) fn encode_float<W: Write>(x: f32, writer: &mut W) -> AvroResult<usize> {
    encode_raw(&x.to_le_bytes(), writer)
}

pub(crate) fn encode_double<W: Write>(x: f64, writer: &mut W) -> AvroResult<usize> {
    encode_raw(&x.to_le_bytes(), writer)
}

/// Write a length prefix followed by the bytes. Strings use the same encoding.
pub(crate) fn encode_bytes<B: AsRef<[u8]> + ?Sized, W: Write>(
    s: &B,
    writer: &mut W,
) -> AvroResult<usize> {
    let bytes = s.as_ref();
    let len = i64::try_from(bytes.len())
        .map_err(|e| Details::ConvertUsizeToI64(e, bytes.len()))?;
    Ok(encode_long(len, writer)? + encode_raw(bytes, writer)?)
}

/// Write the bytes as they are, without a length prefix.
pub(crate) fn encode_raw<W: Write>(bytes: &[u8], writer: &mut W) -> AvroResult<usize> {
    writer.write_all(bytes).map_err(Details::WriteBytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn primitives() -> TestResult {
        let mut buf = Vec::new();
        assert_eq!(encode_bool(true, &mut buf)?, 1);
        assert_eq!(encode_int(42, &mut buf)?, 1);
        assert_eq!(encode_long(-1, &mut buf)?, 1);
        assert_eq!(buf, [0x01, 0x54, 0x01]);

        buf.clear();
        encode_float(1.0, &mut buf)?;
        encode_double(1.0, &mut buf)?;
        assert_eq!(
            buf,
            [0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0x3f]
        );
        Ok(())
    }

    #[test]
    fn length_prefixed() -> TestResult {
        let mut buf = Vec::new();
        assert_eq!(encode_bytes("foo", &mut buf)?, 4);
        assert_eq!(buf, [0x06, b'f', b'o', b'o']);

        buf.clear();
        encode_bytes(&[] as &[u8], &mut buf)?;
        assert_eq!(buf, [0x00]);
        Ok(())
    }
}
