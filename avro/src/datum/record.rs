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
    error::Details,
    schema::{Name, RecordSchema},
    types::Value,
};
use std::{
    collections::HashMap,
    io::{Read, Write},
};

#[derive(Debug)]
pub(crate) struct FieldNode {
    pub(crate) name: String,
    pub(crate) node: NodeId,
}

#[derive(Debug)]
pub(crate) struct RecordNode {
    pub(crate) name: Name,
    pub(crate) fields: Vec<FieldNode>,
    lookup: HashMap<String, usize>,
}

impl RecordNode {
    /// Whether the value has exactly the fields of this record, in any order.
    pub(crate) fn has_field_names_of(&self, values: &[(String, Value)]) -> bool {
        values.len() == self.fields.len()
            && values.iter().all(|(name, _)| self.lookup.contains_key(name))
    }

    fn is_in_schema_order(&self, values: &[(String, Value)]) -> bool {
        values.len() == self.fields.len()
            && values
                .iter()
                .zip(&self.fields)
                .all(|((name, _), field)| *name == field.name)
    }
}

pub(super) fn compile(compiler: &mut Compiler, schema: &RecordSchema) -> AvroResult<NodeId> {
    let id = compiler.reserve(&schema.name)?;
    let fields = schema
        .fields
        .iter()
        .map(|field| -> AvroResult<FieldNode> {
            Ok(FieldNode {
                name: field.name.clone(),
                node: compiler.compile(&field.schema)?,
            })
        })
        .collect::<AvroResult<Vec<_>>>()?;
    let lookup = fields
        .iter()
        .enumerate()
        .map(|(position, field)| (field.name.clone(), position))
        .collect();
    compiler.set(
        id,
        CodecNode::Record(RecordNode {
            name: schema.name.clone(),
            fields,
            lookup,
        }),
    );
    Ok(id)
}

fn encode_field<W: Write>(
    codec: &DatumCodec,
    record: &RecordNode,
    field: &FieldNode,
    value: &Value,
    writer: &mut W,
    depth: usize,
) -> AvroResult<usize> {
    codec
        .encode_node(field.node, value, writer, depth + 1)
        .map_err(|e| e.in_field(&record.name, &field.name))
}

/// Fields are written in schema order whatever their order in the value.
pub(super) fn encode_record<W: Write>(
    codec: &DatumCodec,
    record: &RecordNode,
    values: &[(String, Value)],
    writer: &mut W,
    depth: usize,
) -> AvroResult<usize> {
    let mut written = 0;
    if record.is_in_schema_order(values) {
        for ((_, value), field) in values.iter().zip(&record.fields) {
            written += encode_field(codec, record, field, value, writer, depth)?;
        }
        return Ok(written);
    }

    if let Some((unknown, _)) = values
        .iter()
        .find(|(name, _)| !record.lookup.contains_key(name))
    {
        return Err(Details::UnknownField {
            record: record.name.fullname(None),
            field: unknown.clone(),
        }
        .into());
    }
    for field in &record.fields {
        let value = values
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| value)
            .ok_or_else(|| Details::MissingField {
                record: record.name.fullname(None),
                field: field.name.clone(),
            })?;
        written += encode_field(codec, record, field, value, writer, depth)?;
    }
    Ok(written)
}

pub(super) fn decode_record<R: Read>(
    codec: &DatumCodec,
    record: &RecordNode,
    reader: &mut R,
    depth: usize,
) -> AvroResult<Value> {
    let mut fields = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let value = codec
            .decode_node(field.node, reader, depth + 1)
            .map_err(|e| e.in_field(&record.name, &field.name))?;
        fields.push((field.name.clone(), value));
    }
    Ok(Value::Record(fields))
}

#[cfg(test)]
mod tests {
    use crate::{
        DatumCodec, Schema,
        error::{Details, ErrorKind},
        types::Value,
    };
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    const PERSON: &str = r#"{
        "type": "record",
        "name": "Person",
        "fields": [
            {"name": "name", "type": "string"},
            {"name": "age", "type": "int"}
        ]
    }"#;

    fn person(name: &str, age: i32) -> Value {
        Value::Record(vec![
            ("name".to_string(), Value::from(name)),
            ("age".to_string(), Value::Int(age)),
        ])
    }

    #[test]
    fn person_wire_format() -> TestResult {
        let codec = DatumCodec::compile(&Schema::parse_str(PERSON)?)?;
        let bytes = codec.encode_to_vec(&person("foo", 42))?;
        assert_eq!(bytes, [0x06, 0x66, 0x6f, 0x6f, 0x54]);
        assert_eq!(codec.decode(&mut bytes.as_slice())?, person("foo", 42));
        Ok(())
    }

    #[test]
    fn fields_out_of_order_are_matched_by_name() -> TestResult {
        let codec = DatumCodec::compile(&Schema::parse_str(PERSON)?)?;
        let reordered = Value::Record(vec![
            ("age".to_string(), Value::Int(42)),
            ("name".to_string(), Value::from("foo")),
        ]);
        assert_eq!(
            codec.encode_to_vec(&reordered)?,
            [0x06, 0x66, 0x6f, 0x6f, 0x54]
        );
        Ok(())
    }

    #[test]
    fn missing_and_unknown_fields() -> TestResult {
        let codec = DatumCodec::compile(&Schema::parse_str(PERSON)?)?;

        let missing = Value::Record(vec![("name".to_string(), Value::from("foo"))]);
        let err = codec.encode_to_vec(&missing).unwrap_err();
        assert!(matches!(err.details(), Details::MissingField { field, .. } if field == "age"));

        let unknown = Value::Record(vec![
            ("name".to_string(), Value::from("foo")),
            ("age".to_string(), Value::Int(1)),
            ("email".to_string(), Value::from("a@b")),
        ]);
        let err = codec.encode_to_vec(&unknown).unwrap_err();
        assert!(matches!(err.details(), Details::UnknownField { field, .. } if field == "email"));
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        Ok(())
    }

    #[test]
    fn field_errors_name_the_field() -> TestResult {
        let codec = DatumCodec::compile(&Schema::parse_str(PERSON)?)?;
        let wrong = Value::Record(vec![
            ("name".to_string(), Value::from("foo")),
            ("age".to_string(), Value::from("old")),
        ]);
        let err = codec.encode_to_vec(&wrong).unwrap_err();
        match err.details() {
            Details::Field { record, field, .. } => {
                assert_eq!(record, "Person");
                assert_eq!(field, "age");
            }
            other => panic!("Expected Details::Field, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);

        let truncated = [0x06, 0x66, 0x6f, 0x6f];
        let err = codec.decode(&mut &truncated[..]).unwrap_err();
        assert!(matches!(err.details(), Details::Field { field, .. } if field == "age"));
        assert_eq!(err.kind(), ErrorKind::Stream);
        Ok(())
    }

    #[test]
    fn recursive_linked_list() -> TestResult {
        let codec = DatumCodec::compile(&Schema::parse_str(
            r#"{
                "type": "record",
                "name": "LongList",
                "fields": [
                    {"name": "value", "type": "long"},
                    {"name": "next", "type": ["null", "LongList"]}
                ]
            }"#,
        )?)?;

        let mut list = Value::Record(vec![
            ("value".to_string(), Value::Long(3)),
            ("next".to_string(), Value::Optional(None)),
        ]);
        for value in [2, 1] {
            list = Value::Record(vec![
                ("value".to_string(), Value::Long(value)),
                ("next".to_string(), Value::Optional(Some(Box::new(list)))),
            ]);
        }

        let bytes = codec.encode_to_vec(&list)?;
        assert_eq!(bytes, [0x02, 0x02, 0x04, 0x02, 0x06, 0x00]);
        assert_eq!(codec.decode(&mut bytes.as_slice())?, list);
        Ok(())
    }

    #[test]
    fn named_type_used_twice_shares_its_node() -> TestResult {
        let codec = DatumCodec::compile(&Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Segment",
                "fields": [
                    {"name": "start", "type": {"type": "record", "name": "Point", "fields": [
                        {"name": "x", "type": "int"}, {"name": "y", "type": "int"}
                    ]}},
                    {"name": "end", "type": "Point"}
                ]
            }"#,
        )?)?;
        let point = |x, y| {
            Value::Record(vec![
                ("x".to_string(), Value::Int(x)),
                ("y".to_string(), Value::Int(y)),
            ])
        };
        let segment = Value::Record(vec![
            ("start".to_string(), point(0, 1)),
            ("end".to_string(), point(2, 3)),
        ]);
        let bytes = codec.encode_to_vec(&segment)?;
        assert_eq!(bytes, [0x00, 0x02, 0x04, 0x06]);
        assert_eq!(codec.decode(&mut bytes.as_slice())?, segment);
        Ok(())
    }
}
