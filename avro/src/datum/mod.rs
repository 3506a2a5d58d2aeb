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

//! Compiled codecs for Avro datums.
//!
//! [`DatumCodec::compile`] walks a [`Schema`] once and flattens it into an arena of nodes.
//! Named types are compiled once and every reference to them, including a record's reference to
//! itself, points at the same node. The result is immutable and can be shared between threads.
//!
//! ```
//! # use avro_codec::{DatumCodec, Schema, types::Value};
//! let schema = Schema::parse_str(r#"
//!     {"type": "record", "name": "Person", "fields": [
//!         {"name": "name", "type": "string"},
//!         {"name": "age", "type": "int"}
//!     ]}
//! "#)?;
//! let codec = DatumCodec::compile(&schema)?;
//!
//! let person = Value::Record(vec![
//!     ("name".to_string(), Value::from("foo")),
//!     ("age".to_string(), Value::Int(42)),
//! ]);
//! let bytes = codec.encode_to_vec(&person)?;
//! assert_eq!(bytes, [0x06, b'f', b'o', b'o', 0x54]);
//! assert_eq!(codec.decode(&mut bytes.as_slice())?, person);
//! # Ok::<(), avro_codec::Error>(())
//! ```

mod collection;
mod record;
mod union;

pub(crate) use record::RecordNode;

use crate::{
    AvroResult,
    decode::{
        decode_bool, decode_bytes, decode_double, decode_fixed, decode_float, decode_int,
        decode_long, decode_string,
    },
    encode::{
        encode_bool, encode_bytes, encode_double, encode_float, encode_int, encode_long,
        encode_raw,
    },
    error::Details,
    schema::{EnumSchema, FixedSchema, Name, Schema, SchemaKind},
    types::Value,
    util::{DEFAULT_MAX_NESTING_DEPTH, max_nesting_depth},
};
use log::{debug, error};
use std::{
    collections::HashMap,
    io::{Read, Write},
    sync::Arc,
};
use union::UnionNode;

/// Index of a node in the arena of a [`DatumCodec`].
pub(crate) type NodeId = usize;

#[derive(Debug)]
pub(crate) enum CodecNode {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed { size: usize },
    Enum(EnumNode),
    Array { items: NodeId },
    Map { values: NodeId },
    Union(UnionNode),
    /// A union of `null` and one other branch.
    Optional {
        null_index: u32,
        value_index: u32,
        value: NodeId,
    },
    Record(RecordNode),
}

impl CodecNode {
    pub(crate) fn kind(&self) -> SchemaKind {
        match self {
            CodecNode::Null => SchemaKind::Null,
            CodecNode::Boolean => SchemaKind::Boolean,
            CodecNode::Int => SchemaKind::Int,
            CodecNode::Long => SchemaKind::Long,
            CodecNode::Float => SchemaKind::Float,
            CodecNode::Double => SchemaKind::Double,
            CodecNode::Bytes => SchemaKind::Bytes,
            CodecNode::String => SchemaKind::String,
            CodecNode::Fixed { .. } => SchemaKind::Fixed,
            CodecNode::Enum(_) => SchemaKind::Enum,
            CodecNode::Array { .. } => SchemaKind::Array,
            CodecNode::Map { .. } => SchemaKind::Map,
            CodecNode::Union(_) | CodecNode::Optional { .. } => SchemaKind::Union,
            CodecNode::Record(_) => SchemaKind::Record,
        }
    }
}

#[derive(Debug)]
pub(crate) struct EnumNode {
    name: Name,
    symbols: Vec<String>,
    index: HashMap<String, usize>,
}

impl EnumNode {
    fn new(schema: &EnumSchema) -> Self {
        let index = schema
            .symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (symbol.clone(), i))
            .collect();
        Self {
            name: schema.name.clone(),
            symbols: schema.symbols.clone(),
            index,
        }
    }

    pub(crate) fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    fn position(&self, symbol: &str) -> AvroResult<usize> {
        self.index_of(symbol).ok_or_else(|| {
            error!("Invalid symbol string {symbol:?} for enum {}", self.name);
            Details::GetEnumSymbol(symbol.to_string()).into()
        })
    }
}

/// An immutable codec compiled from a [`Schema`].
///
/// Cloning is cheap, the compiled nodes are shared.
#[derive(Clone, Debug)]
pub struct DatumCodec {
    nodes: Arc<[CodecNode]>,
    root: NodeId,
    schema: Arc<Schema>,
    max_depth: usize,
}

impl DatumCodec {
    /// Compile `schema` into a codec.
    ///
    /// # Errors
    /// Fails with [`Details::SchemaResolutionError`] when a `Ref` names a type that was not
    /// defined before it, and with [`Details::AmbiguousSchemaDefinition`] when two named types
    /// share a fullname.
    pub fn compile(schema: &Schema) -> AvroResult<Self> {
        let mut compiler = Compiler::default();
        let root = compiler.compile(schema)?;
        debug!(
            "Compiled {} schema into {} codec nodes",
            SchemaKind::from(schema),
            compiler.nodes.len()
        );
        Ok(Self {
            nodes: compiler.nodes.into(),
            root,
            schema: Arc::new(schema.clone()),
            max_depth: max_nesting_depth(DEFAULT_MAX_NESTING_DEPTH),
        })
    }

    /// The schema this codec was compiled from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether both codecs were compiled from equal schemas.
    pub(crate) fn same_schema(&self, other: &DatumCodec) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) || self.schema == other.schema
    }

    /// Encode `value` and return the number of bytes written.
    ///
    /// On error, part of the value may already have been written to `writer`.
    ///
    /// # Errors
    /// Besides values that do not match the schema, fails with
    /// [`Details::EncodeDepthExceeded`] when `value` is nested deeper than
    /// [`max_nesting_depth`].
    pub fn encode<W: Write>(&self, value: &Value, writer: &mut W) -> AvroResult<usize> {
        self.encode_node(self.root, value, writer, 0)
    }

    /// Encode `value` into a new buffer.
    pub fn encode_to_vec(&self, value: &Value) -> AvroResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.encode(value, &mut buffer)?;
        Ok(buffer)
    }

    /// Decode one value.
    ///
    /// A datum nested deeper than [`max_nesting_depth`] fails with
    /// [`Details::DecodeDepthExceeded`].
    pub fn decode<R: Read>(&self, reader: &mut R) -> AvroResult<Value> {
        self.decode_node(self.root, reader, 0)
    }

    pub(crate) fn node(&self, id: NodeId) -> &CodecNode {
        &self.nodes[id]
    }

    pub(crate) fn root(&self) -> &CodecNode {
        self.node(self.root)
    }

    pub(crate) fn encode_node<W: Write>(
        &self,
        id: NodeId,
        value: &Value,
        writer: &mut W,
        depth: usize,
    ) -> AvroResult<usize> {
        if depth > self.max_depth {
            return Err(Details::EncodeDepthExceeded(self.max_depth).into());
        }
        let node = self.node(id);
        match (node, value) {
            (CodecNode::Union(node), value) => {
                union::encode_union(self, node, value, writer, depth)
            }
            (
                &CodecNode::Optional {
                    null_index,
                    value_index,
                    value: value_id,
                },
                value,
            ) => union::encode_optional(
                self,
                null_index,
                value_index,
                value_id,
                value,
                writer,
                depth,
            ),
            (CodecNode::Null, Value::Null) => Ok(0),
            (CodecNode::Boolean, &Value::Boolean(b)) => encode_bool(b, writer),
            (CodecNode::Int, &Value::Int(i)) => encode_int(i, writer),
            (CodecNode::Long, &Value::Long(i)) => encode_long(i, writer),
            (CodecNode::Float, &Value::Float(x)) => encode_float(x, writer),
            (CodecNode::Double, &Value::Double(x)) => encode_double(x, writer),
            (CodecNode::Bytes, Value::Bytes(bytes)) => encode_bytes(bytes, writer),
            (CodecNode::String, Value::String(s)) => encode_bytes(s, writer),
            (&CodecNode::Fixed { size, .. }, Value::Fixed(bytes) | Value::Bytes(bytes)) => {
                if bytes.len() != size {
                    return Err(Details::FixedSizeMismatch {
                        size,
                        n: bytes.len(),
                    }
                    .into());
                }
                encode_raw(bytes, writer)
            }
            (CodecNode::Enum(node), Value::Enum(index, symbol)) => {
                let position = node.position(symbol)?;
                if *index as usize != position {
                    return Err(Details::EnumIndexMismatch {
                        index: *index,
                        symbol: symbol.clone(),
                        position,
                    }
                    .into());
                }
                encode_int(position as i32, writer)
            }
            (CodecNode::Enum(node), Value::String(symbol)) => {
                encode_int(node.position(symbol)? as i32, writer)
            }
            (&CodecNode::Array { items }, Value::Array(values)) => {
                collection::encode_array(self, items, values, writer, depth)
            }
            (&CodecNode::Map { values: values_id }, Value::Map(entries)) => {
                collection::encode_map(self, values_id, entries, writer, depth)
            }
            (CodecNode::Record(node), Value::Record(fields)) => {
                record::encode_record(self, node, fields, writer, depth)
            }
            (node, value) => Err(Details::EncodeValueAsSchemaError {
                value_kind: value.kind(),
                supported_schema: vec![node.kind()],
            }
            .into()),
        }
    }

    pub(crate) fn decode_node<R: Read>(
        &self,
        id: NodeId,
        reader: &mut R,
        depth: usize,
    ) -> AvroResult<Value> {
        if depth > self.max_depth {
            return Err(Details::DecodeDepthExceeded(self.max_depth).into());
        }
        match self.node(id) {
            CodecNode::Null => Ok(Value::Null),
            CodecNode::Boolean => decode_bool(reader).map(Value::Boolean),
            CodecNode::Int => decode_int(reader).map(Value::Int),
            CodecNode::Long => decode_long(reader).map(Value::Long),
            CodecNode::Float => decode_float(reader).map(Value::Float),
            CodecNode::Double => decode_double(reader).map(Value::Double),
            CodecNode::Bytes => decode_bytes(reader).map(Value::Bytes),
            CodecNode::String => decode_string(reader).map(Value::String),
            &CodecNode::Fixed { size, .. } => decode_fixed(reader, size).map(Value::Fixed),
            CodecNode::Enum(node) => {
                let index = decode_int(reader)?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| node.symbols.get(i))
                    .map(|symbol| Value::Enum(index.unsigned_abs(), symbol.clone()))
                    .ok_or_else(|| {
                        Details::EnumIndexOutOfBounds {
                            index: i64::from(index),
                            num_symbols: node.symbols.len(),
                        }
                        .into()
                    })
            }
            &CodecNode::Array { items } => collection::decode_array(self, items, reader, depth),
            &CodecNode::Map { values } => collection::decode_map(self, values, reader, depth),
            CodecNode::Union(node) => union::decode_union(self, node, reader, depth),
            &CodecNode::Optional {
                null_index,
                value_index,
                value,
            } => union::decode_optional(self, null_index, value_index, value, reader, depth),
            CodecNode::Record(node) => record::decode_record(self, node, reader, depth),
        }
    }
}

/// Builds the node arena of a [`DatumCodec`].
#[derive(Default)]
pub(crate) struct Compiler {
    nodes: Vec<CodecNode>,
    named: HashMap<Name, NodeId>,
}

impl Compiler {
    fn push(&mut self, node: CodecNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Reserve a node for a named type so that references inside its own definition resolve.
    pub(crate) fn reserve(&mut self, name: &Name) -> AvroResult<NodeId> {
        if self.named.contains_key(name) {
            return Err(Details::AmbiguousSchemaDefinition(name.clone()).into());
        }
        let id = self.push(CodecNode::Null);
        self.named.insert(name.clone(), id);
        Ok(id)
    }

    pub(crate) fn set(&mut self, id: NodeId, node: CodecNode) {
        self.nodes[id] = node;
    }

    pub(crate) fn compile(&mut self, schema: &Schema) -> AvroResult<NodeId> {
        match schema {
            Schema::Null => Ok(self.push(CodecNode::Null)),
            Schema::Boolean => Ok(self.push(CodecNode::Boolean)),
            Schema::Int => Ok(self.push(CodecNode::Int)),
            Schema::Long => Ok(self.push(CodecNode::Long)),
            Schema::Float => Ok(self.push(CodecNode::Float)),
            Schema::Double => Ok(self.push(CodecNode::Double)),
            Schema::Bytes => Ok(self.push(CodecNode::Bytes)),
            Schema::String => Ok(self.push(CodecNode::String)),
            Schema::Array(array) => {
                let items = self.compile(&array.items)?;
                Ok(self.push(CodecNode::Array { items }))
            }
            Schema::Map(map) => {
                let values = self.compile(&map.types)?;
                Ok(self.push(CodecNode::Map { values }))
            }
            Schema::Union(union) => union::compile(self, union),
            Schema::Record(record) => record::compile(self, record),
            Schema::Enum(schema) => {
                let id = self.reserve(&schema.name)?;
                self.set(id, CodecNode::Enum(EnumNode::new(schema)));
                Ok(id)
            }
            Schema::Fixed(FixedSchema { name, size }) => {
                let id = self.reserve(name)?;
                self.set(id, CodecNode::Fixed { size: *size });
                Ok(id)
            }
            Schema::Ref { name } => self
                .named
                .get(name)
                .copied()
                .ok_or_else(|| Details::SchemaResolutionError(name.clone()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    type TestResult = anyhow::Result<()>;

    fn codec(schema: &str) -> AvroResult<DatumCodec> {
        DatumCodec::compile(&Schema::parse_str(schema)?)
    }

    #[test]
    fn codec_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DatumCodec>();
    }

    #[rstest]
    #[case(r#""null""#, Value::Null, &[])]
    #[case(r#""boolean""#, Value::Boolean(true), &[0x01])]
    #[case(r#""int""#, Value::Int(42), &[0x54])]
    #[case(r#""int""#, Value::Int(-64), &[0x7f])]
    #[case(r#""long""#, Value::Long(64), &[0x80, 0x01])]
    #[case(r#""float""#, Value::Float(1.0), &[0x00, 0x00, 0x80, 0x3f])]
    #[case(r#""double""#, Value::Double(-2.0), &[0, 0, 0, 0, 0, 0, 0, 0xc0])]
    #[case(r#""bytes""#, Value::Bytes(vec![0xde, 0xad]), &[0x04, 0xde, 0xad])]
    #[case(r#""string""#, Value::String("foo".into()), &[0x06, b'f', b'o', b'o'])]
    #[case(r#"{"type": "fixed", "name": "F", "size": 2}"#, Value::Fixed(vec![1, 2]), &[0x01, 0x02])]
    #[case(
        r#"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS"]}"#,
        Value::Enum(1, "HEARTS".into()),
        &[0x02]
    )]
    fn wire_format(
        #[case] schema: &str,
        #[case] value: Value,
        #[case] expected: &[u8],
    ) -> TestResult {
        let codec = codec(schema)?;
        let bytes = codec.encode_to_vec(&value)?;
        assert_eq!(bytes, expected);
        assert_eq!(codec.decode(&mut bytes.as_slice())?, value);
        Ok(())
    }

    #[test]
    fn encode_returns_bytes_written() -> TestResult {
        let codec = codec(r#"{"type": "array", "items": "long"}"#)?;
        let mut buffer = Vec::new();
        let written = codec.encode(
            &Value::Array(vec![Value::Long(1), Value::Long(2)]),
            &mut buffer,
        )?;
        assert_eq!(written, buffer.len());
        assert_eq!(buffer, [0x04, 0x02, 0x04, 0x00]);
        Ok(())
    }

    #[test]
    fn enum_symbol_as_string() -> TestResult {
        let codec = codec(r#"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS"]}"#)?;
        assert_eq!(codec.encode_to_vec(&Value::from("SPADES"))?, [0x00]);

        let err = codec.encode_to_vec(&Value::from("CLUBS")).unwrap_err();
        assert!(matches!(err.details(), Details::GetEnumSymbol(s) if s == "CLUBS"));
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        Ok(())
    }

    #[test]
    fn enum_index_out_of_bounds() -> TestResult {
        let codec = codec(r#"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS"]}"#)?;
        for bytes in [[0x04], [0x01]] {
            let err = codec.decode(&mut &bytes[..]).unwrap_err();
            assert!(matches!(
                err.details(),
                Details::EnumIndexOutOfBounds { num_symbols: 2, .. }
            ));
            assert_eq!(err.kind(), ErrorKind::Corruption);
        }
        Ok(())
    }

    #[test]
    fn fixed_size_mismatch() -> TestResult {
        let codec = codec(r#"{"type": "fixed", "name": "Md5", "size": 16}"#)?;
        let err = codec.encode_to_vec(&Value::Fixed(vec![0; 15])).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::FixedSizeMismatch { size: 16, n: 15 }
        ));
        assert_eq!(codec.encode_to_vec(&Value::Bytes(vec![7; 16]))?, vec![7; 16]);
        Ok(())
    }

    #[test]
    fn kind_mismatch() -> TestResult {
        let codec = codec(r#""int""#)?;
        let err = codec.encode_to_vec(&Value::Long(1)).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::EncodeValueAsSchemaError { .. }
        ));
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        Ok(())
    }

    #[test]
    fn compile_is_repeatable() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": ["null", "string"]},
                {"name": "b", "type": {"type": "map", "values": "double"}}
            ]}"#,
        )?;
        let first = DatumCodec::compile(&schema)?;
        let second = DatumCodec::compile(&schema)?;
        let value = Value::Record(vec![
            ("a".to_string(), Value::from(Some("x"))),
            (
                "b".to_string(),
                Value::Map([("k".to_string(), Value::Double(0.5))].into_iter().collect()),
            ),
        ]);
        assert_eq!(first.encode_to_vec(&value)?, second.encode_to_vec(&value)?);
        assert_eq!(first.schema(), second.schema());
        Ok(())
    }

    #[test]
    fn unresolved_reference() -> TestResult {
        let schema = Schema::array(Schema::Ref {
            name: Name::new("Nowhere")?,
        });
        let err = DatumCodec::compile(&schema).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::SchemaResolutionError(_)
        ));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        Ok(())
    }
}
