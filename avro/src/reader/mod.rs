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

//! Logic handling reading from Avro format at user level.

mod block;

use crate::{
    AvroResult, Codec, DatumCodec, object_container::Header, schema::Schema, types::Value,
};
pub use block::{Block, BlockIterator, RecordDecoder, Records};
use block::RecordCursor;
use log::debug;
use std::{collections::HashMap, io::Read};

/// Main interface for reading object container files.
///
/// The header is read when the `Reader` is created. The writer schema stored in it is compiled
/// once and used to decode every record.
///
/// To be used as an iterator:
///
/// ```no_run
/// # use avro_codec::Reader;
/// # use std::io::Cursor;
/// # let input = Cursor::new(Vec::<u8>::new());
/// for value in Reader::new(input).unwrap() {
///     match value {
///         Ok(v) => println!("{:?}", v),
///         Err(e) => println!("Error: {}", e),
///     };
/// }
/// ```
pub struct Reader<R> {
    header: Header,
    writer_schema: Schema,
    user_metadata: HashMap<String, Vec<u8>>,
    datum_codec: DatumCodec,
    blocks: BlockIterator<R>,
    current: Option<(Block, RecordCursor)>,
    errored: bool,
}

impl<R: Read> Reader<R> {
    /// Creates a `Reader` given something implementing the `io::Read` trait to read from.
    ///
    /// # Errors
    /// Fails when the header is malformed, has no `avro.schema` or names a codec this crate
    /// does not support.
    pub fn new(mut reader: R) -> AvroResult<Reader<R>> {
        let header = Header::read(&mut reader)?;
        let writer_schema = header.schema()?;
        let codec = header.codec()?;
        let user_metadata = header.user_metadata();
        let datum_codec = DatumCodec::compile(&writer_schema)?;
        debug!(
            "Opened a {} file with {} user metadata entries",
            <&str>::from(codec),
            user_metadata.len()
        );
        let blocks = BlockIterator::new(reader, *header.sync(), codec);
        Ok(Reader {
            header,
            writer_schema,
            user_metadata,
            datum_codec,
            blocks,
            current: None,
            errored: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Get a reference to the writer `Schema`.
    #[inline]
    pub fn writer_schema(&self) -> &Schema {
        &self.writer_schema
    }

    /// Get a reference to the user metadata
    #[inline]
    pub fn user_metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.user_metadata
    }

    #[inline]
    pub fn codec(&self) -> Codec {
        self.blocks.codec()
    }

    /// The codec compiled from the writer schema.
    pub fn datum_codec(&self) -> &DatumCodec {
        &self.datum_codec
    }

    /// Read the remaining blocks without decoding them.
    ///
    /// Records left in a block this reader has started on are skipped.
    pub fn into_blocks(self) -> BlockIterator<R> {
        self.blocks
    }

    fn read_next(&mut self) -> Option<AvroResult<Value>> {
        loop {
            if let Some((block, cursor)) = &mut self.current {
                if let Some(record) = cursor.next(block, &self.datum_codec) {
                    return Some(record);
                }
            }
            match self.blocks.next()? {
                Ok(block) => self.current = Some((block, RecordCursor::default())),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = AvroResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        // to prevent keep on reading after the first error occurs
        if self.errored {
            return None;
        };
        let next = self.read_next();
        if matches!(next, Some(Err(_))) {
            self.errored = true;
        }
        next
    }
}

/// Decode a `Value` encoded in Avro format given its `Schema` and anything implementing `io::Read`
/// to read from.
///
/// **NOTE** This function has a quite small niche of usage and does NOT take care of reading the
/// header and consecutive data blocks; use [`Reader`] if you don't know what you are doing,
/// instead. Compiling the schema on every call is wasteful, so reuse a [`DatumCodec`] when
/// decoding many values.
pub fn from_avro_datum<R: Read>(writer_schema: &Schema, reader: &mut R) -> AvroResult<Value> {
    DatumCodec::compile(writer_schema)?.decode(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Writer,
        codec::DeflateSettings,
        error::{Details, ErrorKind},
        object_container::read_marker,
    };
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    const SCHEMA: &str = r#"
    {
      "type": "record",
      "name": "test",
      "fields": [
        {
          "name": "a",
          "type": "long"
        },
        {
          "name": "b",
          "type": "string"
        }
      ]
    }
    "#;

    fn record(a: i64, b: &str) -> Value {
        Value::Record(vec![
            ("a".to_string(), Value::Long(a)),
            ("b".to_string(), Value::from(b)),
        ])
    }

    fn file(codec: Codec, block_size: usize, count: i64) -> anyhow::Result<Vec<u8>> {
        let schema = Schema::parse_str(SCHEMA)?;
        let mut writer = Writer::builder()
            .schema(&schema)
            .writer(Vec::new())
            .codec(codec)
            .block_size(block_size)
            .build()?;
        writer.extend((0..count).map(|i| record(i, "foo")))?;
        Ok(writer.into_inner()?)
    }

    #[test]
    fn test_from_avro_datum() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let mut encoded: &'static [u8] = &[54, 6, 102, 111, 111];

        assert_eq!(from_avro_datum(&schema, &mut encoded)?, record(27, "foo"));
        assert!(encoded.is_empty());

        Ok(())
    }

    #[test]
    fn test_reader_iterator() -> TestResult {
        let bytes = file(Codec::Null, 16000, 2)?;
        let reader = Reader::new(bytes.as_slice())?;

        assert_eq!(reader.writer_schema(), &Schema::parse_str(SCHEMA)?);
        let values = reader.collect::<AvroResult<Vec<_>>>()?;
        assert_eq!(values, [record(0, "foo"), record(1, "foo")]);

        Ok(())
    }

    #[test]
    fn test_reader_across_blocks() -> TestResult {
        let codec = Codec::Deflate(DeflateSettings::default());
        let bytes = file(codec, 30, 25)?;
        let reader = Reader::new(bytes.as_slice())?;
        assert_eq!(reader.codec(), codec);

        let values = reader.collect::<AvroResult<Vec<_>>>()?;
        let expected = (0..25).map(|i| record(i, "foo")).collect::<Vec<_>>();
        assert_eq!(values, expected);

        let blocks = Reader::new(bytes.as_slice())?
            .into_blocks()
            .collect::<AvroResult<Vec<_>>>()?;
        assert!(blocks.len() > 1);
        assert_eq!(
            blocks.iter().map(Block::object_count).sum::<usize>(),
            expected.len()
        );
        Ok(())
    }

    #[test]
    fn test_reader_invalid_header() {
        let invalid = &b"Obj\x02"[..];
        assert!(Reader::new(invalid).is_err());
    }

    #[test]
    fn test_reader_invalid_block() -> TestResult {
        let mut bytes = file(Codec::Null, 16000, 3)?;
        // every record takes 5 bytes, make the string length of the second one negative
        let payload_start = bytes.len() - 16 - 3 * 5;
        bytes[payload_start + 5 + 1] = 0x01;

        let mut reader = Reader::new(bytes.as_slice())?;
        assert!(reader.next().is_some_and(|r| r.is_ok()));
        let err = reader
            .next()
            .ok_or_else(|| anyhow::anyhow!("expected an error"))?
            .unwrap_err();
        assert!(matches!(err.details(), Details::Block { index: 0, .. }));
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn test_reader_flipped_sync() -> TestResult {
        let mut bytes = file(Codec::Null, 16000, 3)?;
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;

        let mut reader = Reader::new(bytes.as_slice())?;
        let err = reader
            .next()
            .ok_or_else(|| anyhow::anyhow!("expected an error"))?
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn test_reader_only_header() -> TestResult {
        let bytes = file(Codec::Null, 16000, 0)?;
        let mut reader = Reader::new(bytes.as_slice())?;
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn test_reader_unknown_codec() -> TestResult {
        let mut metadata = HashMap::new();
        metadata.insert("avro.schema".to_string(), b"\"long\"".to_vec());
        metadata.insert("avro.codec".to_string(), b"lzo".to_vec());

        let mut bytes = b"Obj\x01\x04".to_vec();
        for (key, value) in &metadata {
            bytes.push(u8::try_from(key.len() * 2)?);
            bytes.extend_from_slice(key.as_bytes());
            bytes.push(u8::try_from(value.len() * 2)?);
            bytes.extend_from_slice(value);
        }
        bytes.push(0x00);
        bytes.extend_from_slice(&[0; 16]);

        let err = Reader::new(bytes.as_slice()).err().ok_or_else(|| {
            anyhow::anyhow!("a file with an unknown codec must be rejected")
        })?;
        assert!(matches!(err.details(), Details::CodecNotSupported(codec) if codec == "lzo"));
        assert_eq!(err.kind(), ErrorKind::Corruption);
        Ok(())
    }

    #[test]
    fn test_read_marker() -> TestResult {
        let bytes = file(Codec::Null, 16000, 1)?;
        let reader = Reader::new(bytes.as_slice())?;
        assert_eq!(read_marker(&bytes).as_ref(), Some(reader.header().sync()));
        Ok(())
    }
}
