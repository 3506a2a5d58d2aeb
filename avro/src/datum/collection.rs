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

//! Arrays and maps are written as a sequence of blocks, each one a count followed by that many
//! items, and closed by a block with a count of zero.

use crate::{
    AvroResult,
    datum::{DatumCodec, NodeId},
    decode::{decode_block_count, decode_string},
    encode::{encode_bytes, encode_long},
    error::Details,
    types::Value,
};
use std::{
    collections::HashMap,
    io::{Read, Write},
};

fn encode_block_count<W: Write>(count: usize, writer: &mut W) -> AvroResult<usize> {
    let count = i64::try_from(count).map_err(|e| Details::ConvertUsizeToI64(e, count))?;
    encode_long(count, writer)
}

/// Writes all items in a single block.
pub(super) fn encode_array<W: Write>(
    codec: &DatumCodec,
    items: NodeId,
    values: &[Value],
    writer: &mut W,
    depth: usize,
) -> AvroResult<usize> {
    let mut written = 0;
    if !values.is_empty() {
        written += encode_block_count(values.len(), writer)?;
        for value in values {
            written += codec.encode_node(items, value, writer, depth + 1)?;
        }
    }
    Ok(written + encode_long(0, writer)?)
}

/// Writes all entries in a single block.
pub(super) fn encode_map<W: Write>(
    codec: &DatumCodec,
    values: NodeId,
    entries: &HashMap<String, Value>,
    writer: &mut W,
    depth: usize,
) -> AvroResult<usize> {
    let mut written = 0;
    if !entries.is_empty() {
        written += encode_block_count(entries.len(), writer)?;
        for (key, value) in entries {
            written += encode_bytes(key, writer)?;
            written += codec.encode_node(values, value, writer, depth + 1)?;
        }
    }
    Ok(written + encode_long(0, writer)?)
}

pub(super) fn decode_array<R: Read>(
    codec: &DatumCodec,
    items: NodeId,
    reader: &mut R,
    depth: usize,
) -> AvroResult<Value> {
    let mut array = Vec::new();
    loop {
        let count = decode_block_count(reader)?;
        if count == 0 {
            break;
        }
        for _ in 0..count {
            array.push(codec.decode_node(items, reader, depth + 1)?);
        }
    }
    Ok(Value::Array(array))
}

/// A key repeated across the input keeps its last value.
pub(super) fn decode_map<R: Read>(
    codec: &DatumCodec,
    values: NodeId,
    reader: &mut R,
    depth: usize,
) -> AvroResult<Value> {
    let mut map = HashMap::new();
    loop {
        let count = decode_block_count(reader)?;
        if count == 0 {
            break;
        }
        for _ in 0..count {
            let key = decode_string(reader)?;
            let value = codec.decode_node(values, reader, depth + 1)?;
            map.insert(key, value);
        }
    }
    Ok(Value::Map(map))
}
