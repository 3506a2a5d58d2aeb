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

//! The header of an object container file.
//!
//! ```text
//! magic: "Obj" 0x01 | metadata: map<string, bytes> | sync: fixed(16) | block*
//! block: count: long | length: long | payload: [u8; length] | sync: fixed(16)
//! ```

use crate::{
    AvroResult, Codec, Schema,
    decode::{decode_block_count, decode_bytes, decode_string},
    encode::{encode_bytes, encode_long, encode_raw},
    error::Details,
};
use log::warn;
use std::{
    collections::HashMap,
    io::{Read, Write},
    str::FromStr,
};

/// The four bytes every object container file starts with.
pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 1];

pub const SYNC_SIZE: usize = 16;

pub(crate) const SCHEMA_KEY: &str = "avro.schema";
pub(crate) const CODEC_KEY: &str = "avro.codec";
const RESERVED_PREFIX: &str = "avro.";

/// File metadata and the sync marker that closes every block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    metadata: HashMap<String, Vec<u8>>,
    sync: [u8; SYNC_SIZE],
}

impl Header {
    /// Build the header of a new file.
    ///
    /// `avro.codec` is always written, `null` included.
    pub(crate) fn new(
        schema: &Schema,
        codec: Codec,
        user_metadata: &HashMap<String, Vec<u8>>,
        sync: [u8; SYNC_SIZE],
    ) -> AvroResult<Self> {
        let mut metadata = HashMap::with_capacity(user_metadata.len() + 2);
        metadata.insert(SCHEMA_KEY.to_string(), schema.to_json()?.into_bytes());
        metadata.insert(
            CODEC_KEY.to_string(),
            <&str>::from(codec).as_bytes().to_vec(),
        );
        for (key, value) in user_metadata {
            if key.starts_with(RESERVED_PREFIX) {
                return Err(Details::InvalidMetadataKey(key.clone()).into());
            }
            metadata.insert(key.clone(), value.clone());
        }
        Ok(Self { metadata, sync })
    }

    /// Read a header from the start of a file.
    pub fn read<R: Read>(reader: &mut R) -> AvroResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Details::ReadHeader)?;
        if magic != MAGIC {
            return Err(Details::HeaderMagic.into());
        }

        let mut metadata = HashMap::new();
        loop {
            let count = decode_block_count(reader)?;
            if count == 0 {
                break;
            }
            for _ in 0..count {
                let key = decode_string(reader)?;
                let value = decode_bytes(reader)?;
                metadata.insert(key, value);
            }
        }

        let mut sync = [0u8; SYNC_SIZE];
        reader.read_exact(&mut sync).map_err(Details::ReadMarker)?;
        Ok(Self { metadata, sync })
    }

    /// Write the header and return the number of bytes written.
    pub fn write<W: Write>(&self, writer: &mut W) -> AvroResult<usize> {
        let mut written = encode_raw(&MAGIC, writer)?;
        if !self.metadata.is_empty() {
            let count = i64::try_from(self.metadata.len())
                .map_err(|e| Details::ConvertUsizeToI64(e, self.metadata.len()))?;
            written += encode_long(count, writer)?;
            for (key, value) in &self.metadata {
                written += encode_bytes(key, writer)?;
                written += encode_bytes(value, writer)?;
            }
        }
        written += encode_long(0, writer)?;
        written += writer
            .write_all(&self.sync)
            .map(|()| SYNC_SIZE)
            .map_err(Details::WriteMarker)?;
        Ok(written)
    }

    pub fn sync(&self) -> &[u8; SYNC_SIZE] {
        &self.sync
    }

    /// All metadata entries, `avro.*` keys included.
    pub fn metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.metadata
    }

    /// The schema stored under `avro.schema`.
    pub fn schema(&self) -> AvroResult<Schema> {
        let json = self
            .metadata
            .get(SCHEMA_KEY)
            .ok_or(Details::GetAvroSchemaFromMap)?;
        let json: serde_json::Value =
            serde_json::from_slice(json).map_err(Details::ParseSchemaJson)?;
        Schema::parse(&json)
    }

    /// The codec named under `avro.codec`, [`Codec::Null`] when the key is absent.
    pub fn codec(&self) -> AvroResult<Codec> {
        let Some(name) = self.metadata.get(CODEC_KEY) else {
            return Ok(Codec::Null);
        };
        let name = std::str::from_utf8(name).map_err(|_| Details::BadCodecMetadata)?;
        Codec::from_str(name).map_err(|_| Details::CodecNotSupported(name.to_string()).into())
    }

    /// The metadata entries outside the reserved `avro.` namespace.
    pub fn user_metadata(&self) -> HashMap<String, Vec<u8>> {
        self.metadata
            .iter()
            .filter(|(key, _)| {
                if key.as_str() == SCHEMA_KEY || key.as_str() == CODEC_KEY {
                    false
                } else if key.starts_with(RESERVED_PREFIX) {
                    warn!("Ignoring unknown metadata key: {key}");
                    false
                } else {
                    true
                }
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// The sync marker of a complete file, which is also its last 16 bytes.
///
/// Returns `None` when `bytes` is too short to hold a header.
pub fn read_marker(bytes: &[u8]) -> Option<[u8; SYNC_SIZE]> {
    if bytes.len() <= SYNC_SIZE + MAGIC.len() {
        return None;
    }
    bytes[bytes.len() - SYNC_SIZE..].try_into().ok()
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn generate_sync_marker() -> [u8; SYNC_SIZE] {
    rand::random()
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn generate_sync_marker() -> [u8; SYNC_SIZE] {
    let mut marker = [0_u8; SYNC_SIZE];
    std::iter::repeat_with(quad_rand::rand)
        .take(4)
        .flat_map(|i| i.to_be_bytes())
        .enumerate()
        .for_each(|(i, n)| marker[i] = n);
    marker
}
