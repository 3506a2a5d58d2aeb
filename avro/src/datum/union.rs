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

use crate::{
    AvroResult,
    datum::{CodecNode, Compiler, DatumCodec, NodeId},
    decode::decode_int,
    encode::encode_long,
    error::Details,
    schema::{SchemaKind, UnionSchema},
    types::Value,
};
use std::io::{Read, Write};

#[derive(Debug)]
pub(crate) struct UnionNode {
    variants: Vec<NodeId>,
}

/// A union of `null` and one other branch becomes an [`CodecNode::Optional`].
pub(super) fn compile(compiler: &mut Compiler, union: &UnionSchema) -> AvroResult<NodeId> {
    let variants = union
        .variants()
        .iter()
        .map(|variant| compiler.compile(variant))
        .collect::<AvroResult<Vec<_>>>()?;

    let node = match union.optional_indexes() {
        Some((null_index, value_index)) => CodecNode::Optional {
            null_index,
            value_index,
            value: variants[value_index as usize],
        },
        None => CodecNode::Union(UnionNode { variants }),
    };
    Ok(compiler.push(node))
}

/// Branch indexes are `int`s on the wire, which share the `long` encoding.
fn encode_index<W: Write>(index: u32, writer: &mut W) -> AvroResult<usize> {
    encode_long(i64::from(index), writer)
}

/// Whether `value` can be written with the node without conversion.
fn is_exact_match(codec: &DatumCodec, id: NodeId, value: &Value) -> bool {
    match (codec.node(id), value) {
        (CodecNode::Null, Value::Null)
        | (CodecNode::Boolean, Value::Boolean(_))
        | (CodecNode::Int, Value::Int(_))
        | (CodecNode::Long, Value::Long(_))
        | (CodecNode::Float, Value::Float(_))
        | (CodecNode::Double, Value::Double(_))
        | (CodecNode::Bytes, Value::Bytes(_))
        | (CodecNode::String, Value::String(_))
        | (CodecNode::Array { .. }, Value::Array(_))
        | (CodecNode::Map { .. }, Value::Map(_)) => true,
        (CodecNode::Fixed { size, .. }, Value::Fixed(bytes)) => bytes.len() == *size,
        (CodecNode::Enum(node), Value::Enum(index, symbol)) => {
            node.index_of(symbol) == Some(*index as usize)
        }
        (CodecNode::Record(node), Value::Record(fields)) => node.has_field_names_of(fields),
        _ => false,
    }
}

/// Whether `value` can be written with the node when no branch matches exactly.
fn is_loose_match(codec: &DatumCodec, id: NodeId, value: &Value) -> bool {
    match (codec.node(id), value) {
        (CodecNode::Fixed { size, .. }, Value::Bytes(bytes)) => bytes.len() == *size,
        (CodecNode::Enum(node), Value::String(symbol)) => node.index_of(symbol).is_some(),
        _ => false,
    }
}

fn find_variant(codec: &DatumCodec, variants: &[NodeId], value: &Value) -> AvroResult<u32> {
    variants
        .iter()
        .position(|&id| is_exact_match(codec, id, value))
        .or_else(|| {
            variants
                .iter()
                .position(|&id| is_loose_match(codec, id, value))
        })
        .map(|i| i as u32)
        .ok_or_else(|| {
            Details::FindUnionVariant {
                union: variants
                    .iter()
                    .map(|&id| codec.node(id).kind())
                    .collect::<Vec<SchemaKind>>(),
                value_kind: value.kind(),
            }
            .into()
        })
}

/// A `Value::Union` picks its branch, any other value goes to the first branch that accepts it.
pub(super) fn encode_union<W: Write>(
    codec: &DatumCodec,
    union: &UnionNode,
    value: &Value,
    writer: &mut W,
    depth: usize,
) -> AvroResult<usize> {
    let (index, inner) = match value {
        Value::Union(index, inner) => (*index, inner.as_ref()),
        Value::Optional(Some(inner)) => (find_variant(codec, &union.variants, inner)?, inner.as_ref()),
        Value::Optional(None) => (find_variant(codec, &union.variants, &Value::Null)?, &Value::Null),
        other => (find_variant(codec, &union.variants, other)?, other),
    };
    let variant = union
        .variants
        .get(index as usize)
        .copied()
        .ok_or(Details::UnionVariantOutOfBounds {
            index,
            num_variants: union.variants.len(),
        })?;
    Ok(encode_index(index, writer)? + codec.encode_node(variant, inner, writer, depth + 1)?)
}

pub(super) fn encode_optional<W: Write>(
    codec: &DatumCodec,
    null_index: u32,
    value_index: u32,
    value_id: NodeId,
    value: &Value,
    writer: &mut W,
    depth: usize,
) -> AvroResult<usize> {
    let inner = match value {
        Value::Optional(None) | Value::Null => return encode_index(null_index, writer),
        Value::Union(index, inner) if *index == null_index => {
            return match inner.as_ref() {
                Value::Null => encode_index(null_index, writer),
                other => Err(Details::EncodeValueAsSchemaError {
                    value_kind: other.kind(),
                    supported_schema: vec![SchemaKind::Null],
                }
                .into()),
            };
        }
        Value::Union(index, inner) if *index == value_index => inner.as_ref(),
        &Value::Union(index, _) => {
            return Err(Details::UnionVariantOutOfBounds {
                index,
                num_variants: 2,
            }
            .into());
        }
        Value::Optional(Some(inner)) => inner.as_ref(),
        other => other,
    };
    Ok(encode_index(value_index, writer)? + codec.encode_node(value_id, inner, writer, depth + 1)?)
}

fn decode_index<R: Read>(reader: &mut R, num_variants: usize) -> AvroResult<usize> {
    let index = decode_int(reader)?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < num_variants)
        .ok_or_else(|| {
            Details::UnionIndexOutOfBounds {
                index: i64::from(index),
                num_variants,
            }
            .into()
        })
}

pub(super) fn decode_union<R: Read>(
    codec: &DatumCodec,
    union: &UnionNode,
    reader: &mut R,
    depth: usize,
) -> AvroResult<Value> {
    let index = decode_index(reader, union.variants.len())?;
    let value = codec.decode_node(union.variants[index], reader, depth + 1)?;
    Ok(Value::Union(index as u32, Box::new(value)))
}

pub(super) fn decode_optional<R: Read>(
    codec: &DatumCodec,
    null_index: u32,
    value_index: u32,
    value_id: NodeId,
    reader: &mut R,
    depth: usize,
) -> AvroResult<Value> {
    let index = decode_index(reader, 2)? as u32;
    if index == null_index {
        Ok(Value::Optional(None))
    } else {
        debug_assert_eq!(index, value_index);
        let value = codec.decode_node(value_id, reader, depth + 1)?;
        Ok(Value::Optional(Some(Box::new(value))))
    }
}
