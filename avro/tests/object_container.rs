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

use avro_codec::{
    AvroResult, Block, Codec, DatumCodec, DeflateSettings, Reader, Schema, Writer,
    error::{Details, ErrorKind},
    object_container::{Header, MAGIC},
    read_marker,
    types::Value,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::HashMap;

type TestResult = anyhow::Result<()>;

const EVENT_SCHEMA: &str = r#"
{
    "type": "record",
    "name": "Event",
    "namespace": "org.example.telemetry",
    "fields": [
        {"name": "id", "type": "long"},
        {"name": "source", "type": "string"},
        {"name": "tags", "type": {"type": "array", "items": "string"}},
        {"name": "payload", "type": ["null", "bytes"]}
    ]
}
"#;

fn event(id: i64) -> Value {
    let payload = if id % 3 == 0 {
        None
    } else {
        Some(Value::Bytes(id.to_le_bytes().to_vec()))
    };
    Value::Record(vec![
        ("id".to_string(), Value::Long(id)),
        ("source".to_string(), Value::from(format!("host-{}", id % 7))),
        (
            "tags".to_string(),
            Value::Array((0..id % 4).map(|t| Value::from(format!("t{t}"))).collect()),
        ),
        (
            "payload".to_string(),
            Value::Optional(payload.map(Box::new)),
        ),
    ])
}

/// A file of `blocks` blocks holding `per_block` events each.
fn write_file(codec: Codec, blocks: i64, per_block: i64) -> anyhow::Result<Vec<u8>> {
    let schema = Schema::parse_str(EVENT_SCHEMA)?;
    let mut writer = Writer::builder()
        .schema(&schema)
        .writer(Vec::new())
        .codec(codec)
        .block_size(usize::MAX)
        .build()?;
    for block in 0..blocks {
        for i in 0..per_block {
            writer.append_value(event(block * per_block + i))?;
        }
        writer.flush()?;
    }
    Ok(writer.into_inner()?)
}

fn codecs() -> Vec<Codec> {
    vec![
        Codec::Null,
        Codec::Deflate(DeflateSettings::default()),
        #[cfg(feature = "snappy")]
        Codec::Snappy,
    ]
}

#[rstest]
#[case(1, 1)]
#[case(3, 10)]
#[case(5, 200)]
fn block_iteration(#[case] blocks: i64, #[case] per_block: i64) -> TestResult {
    for codec in codecs() {
        let bytes = write_file(codec, blocks, per_block)?;
        let found = Reader::new(bytes.as_slice())?
            .into_blocks()
            .collect::<AvroResult<Vec<_>>>()?;

        assert_eq!(found.len() as i64, blocks, "{codec:?}");
        for (index, block) in found.iter().enumerate() {
            assert_eq!(block.index(), index);
            assert_eq!(block.object_count() as i64, per_block);
        }
    }
    Ok(())
}

#[test]
fn records_round_trip_through_every_codec() -> TestResult {
    for codec in codecs() {
        let bytes = write_file(codec, 4, 25)?;
        let reader = Reader::new(bytes.as_slice())?;
        assert_eq!(reader.codec(), codec);

        let values = reader.collect::<AvroResult<Vec<_>>>()?;
        let expected = (0..100).map(event).collect::<Vec<_>>();
        assert_eq!(values, expected, "{codec:?}");
    }
    Ok(())
}

#[test]
fn flipping_any_sync_bit_is_corruption() -> TestResult {
    let bytes = write_file(Codec::Null, 2, 5)?;
    let sync_start = bytes.len() - 16;

    for byte in sync_start..bytes.len() {
        for bit in 0..8 {
            let mut corrupted = bytes.clone();
            corrupted[byte] ^= 1 << bit;

            let mut blocks = Reader::new(corrupted.as_slice())?.into_blocks();
            assert!(blocks.next().transpose()?.is_some());
            let err = blocks
                .next()
                .ok_or_else(|| anyhow::anyhow!("the second block must fail"))?
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Corruption);
            let Details::Block { index, error } = err.details() else {
                panic!("Expected Details::Block, got {err:?}");
            };
            assert_eq!(*index, 1);
            assert!(matches!(error.details(), Details::GetBlockMarker));
            assert!(blocks.next().is_none());
        }
    }
    Ok(())
}

#[test]
fn header_only_file_has_no_records() -> TestResult {
    let schema = Schema::parse_str(EVENT_SCHEMA)?;
    let bytes = Writer::new(&schema, Vec::new())?.into_inner()?;

    assert_eq!(&bytes[..4], MAGIC);
    let reader = Reader::new(bytes.as_slice())?;
    assert_eq!(reader.writer_schema(), &schema);
    assert_eq!(reader.into_blocks().count(), 0);
    Ok(())
}

#[test]
fn truncated_files() -> TestResult {
    let bytes = write_file(Codec::Null, 1, 20)?;
    let header_len = {
        let mut rest = bytes.as_slice();
        Header::read(&mut rest)?;
        bytes.len() - rest.len()
    };

    // anywhere inside the block, but not at its start
    for len in [header_len + 1, header_len + 5, bytes.len() - 20, bytes.len() - 1] {
        let mut reader = Reader::new(&bytes[..len])?;
        let result = reader.find(Result::is_err);
        assert!(result.is_some(), "truncated at {len}");
        assert!(reader.next().is_none());
    }

    // right at the start of the block
    assert_eq!(Reader::new(&bytes[..header_len])?.count(), 0);
    Ok(())
}

#[test]
fn unknown_codec_fails_at_open() -> TestResult {
    let bytes = write_file(Codec::Null, 1, 1)?;
    let mut rest = bytes.as_slice();
    let header = Header::read(&mut rest)?;

    let mut metadata = header.metadata().clone();
    metadata.insert("avro.codec".to_string(), b"brotli".to_vec());

    // rebuild the header map by hand, keys sorted for a stable layout
    let mut keys = metadata.keys().cloned().collect::<Vec<_>>();
    keys.sort();
    let mut forged = MAGIC.to_vec();
    forged.push(u8::try_from(keys.len() * 2)?);
    for key in keys {
        let value = &metadata[&key];
        forged.extend(zigzag_len(key.len()));
        forged.extend_from_slice(key.as_bytes());
        forged.extend(zigzag_len(value.len()));
        forged.extend_from_slice(value);
    }
    forged.push(0);
    forged.extend_from_slice(header.sync());
    forged.extend_from_slice(rest);

    let err = Reader::new(forged.as_slice())
        .err()
        .ok_or_else(|| anyhow::anyhow!("an unknown codec must be rejected"))?;
    assert!(matches!(err.details(), Details::CodecNotSupported(name) if name == "brotli"));
    Ok(())
}

fn zigzag_len(len: usize) -> Vec<u8> {
    let mut n = (len as u64) << 1;
    let mut out = Vec::new();
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
    out
}

#[test]
fn wrong_magic() {
    let err = Reader::new(&b"Obj\x00\x00"[..]).err();
    assert!(matches!(
        err.as_ref().map(|e| e.details()),
        Some(Details::HeaderMagic)
    ));
}

#[test]
fn user_metadata_round_trip() -> TestResult {
    let schema = Schema::parse_str(EVENT_SCHEMA)?;
    let mut writer = Writer::new(&schema, Vec::new())?;
    writer.add_user_metadata("producer".to_string(), "ingest-3")?;
    writer.append_value(event(1))?;
    let bytes = writer.into_inner()?;

    let reader = Reader::new(bytes.as_slice())?;
    assert_eq!(
        reader.user_metadata(),
        &HashMap::from([("producer".to_string(), b"ingest-3".to_vec())])
    );
    assert_eq!(reader.header().metadata()["avro.codec"], b"null");
    assert_eq!(read_marker(&bytes).as_ref(), Some(reader.header().sync()));
    Ok(())
}

#[test]
fn blocks_decode_in_parallel() -> TestResult {
    for codec in codecs() {
        let bytes = write_file(codec, 8, 50)?;
        let reader = Reader::new(bytes.as_slice())?;
        let datum_codec: DatumCodec = reader.datum_codec().clone();
        let sequential = Reader::new(bytes.as_slice())?.collect::<AvroResult<Vec<_>>>()?;

        let blocks = reader.into_blocks().collect::<AvroResult<Vec<Block>>>()?;
        let decoded = std::thread::scope(|scope| {
            let handles = blocks
                .iter()
                .map(|block| {
                    let codec = &datum_codec;
                    scope.spawn(move || block.records(codec).collect::<AvroResult<Vec<_>>>())
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| anyhow::anyhow!("decoder thread panicked"))
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })?;

        let mut parallel = Vec::new();
        for records in decoded {
            parallel.extend(records?);
        }
        assert_eq!(parallel, sequential, "{codec:?}");
    }
    Ok(())
}

#[test]
fn appending_to_an_existing_file() -> TestResult {
    let schema = Schema::parse_str(EVENT_SCHEMA)?;
    let codec = Codec::Deflate(DeflateSettings::default());
    let first = write_file(codec, 1, 3)?;
    let marker = read_marker(&first).ok_or_else(|| anyhow::anyhow!("file too short"))?;

    let mut writer = Writer::append_to(&schema, first, codec, marker)?;
    writer.extend((3..6).map(event))?;
    let bytes = writer.into_inner()?;

    let values = Reader::new(bytes.as_slice())?.collect::<AvroResult<Vec<_>>>()?;
    assert_eq!(values, (0..6).map(event).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn block_payload_is_exposed() -> TestResult {
    let schema = Schema::Long;
    let mut writer = Writer::new(&schema, Vec::new())?;
    writer.extend([1i64, -1, 64])?;
    let bytes = writer.into_inner()?;

    let block = Reader::new(bytes.as_slice())?
        .into_blocks()
        .next()
        .transpose()?
        .ok_or_else(|| anyhow::anyhow!("expected a block"))?;
    assert_eq!(block.data(), hex_literal::hex!("02 01 8001"));
    Ok(())
}
