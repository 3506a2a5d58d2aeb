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

//! Encoding and decoding of host types through a table of field accessors.
//!
//! A host type describes its fields once with [`AvroRecord::bindings`]. A [`SpecificCodec`]
//! matches those bindings to the fields of a record schema by name when it is created, so
//! encoding and decoding never look up names.
//!
//! ```
//! # use avro_codec::{AvroRecord, DatumCodec, FieldBinding, Schema, SpecificCodec};
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl AvroRecord for Person {
//!     fn bindings() -> Vec<FieldBinding<Self>> {
//!         vec![
//!             FieldBinding::new(
//!                 "name",
//!                 |p| p.name.clone().into(),
//!                 |p, v| { p.name = v.try_into()?; Ok(()) },
//!             ),
//!             FieldBinding::new(
//!                 "age",
//!                 |p| p.age.into(),
//!                 |p, v| { p.age = v.try_into()?; Ok(()) },
//!             ),
//!         ]
//!     }
//! }
//!
//! let schema = Schema::parse_str(r#"
//!     {"type": "record", "name": "Person", "fields": [
//!         {"name": "name", "type": "string"},
//!         {"name": "age", "type": "int"}
//!     ]}
//! "#)?;
//! let codec = SpecificCodec::<Person>::new(DatumCodec::compile(&schema)?)?;
//!
//! let person = Person { name: "foo".to_string(), age: 42 };
//! let mut bytes = Vec::new();
//! codec.encode(&person, &mut bytes)?;
//! assert_eq!(bytes, [0x06, b'f', b'o', b'o', 0x54]);
//! assert_eq!(codec.decode(&mut bytes.as_slice())?, person);
//! # Ok::<(), avro_codec::Error>(())
//! ```

use crate::{
    AvroResult, DatumCodec,
    datum::{CodecNode, NodeId},
    error::Details,
    schema::Name,
    types::Value,
};
use log::debug;
use std::io::{Read, Write};

/// Reads and writes one field of a host type.
pub struct FieldBinding<T> {
    name: &'static str,
    get: fn(&T) -> Value,
    set: fn(&mut T, Value) -> AvroResult<()>,
}

impl<T> FieldBinding<T> {
    pub fn new(
        name: &'static str,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> AvroResult<()>,
    ) -> Self {
        Self { name, get, set }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A host type that can be encoded and decoded as an Avro record.
///
/// Decoding starts from `Default::default()` and sets every bound field.
pub trait AvroRecord: Default {
    fn bindings() -> Vec<FieldBinding<Self>>;
}

struct FieldPlan {
    name: String,
    node: NodeId,
    binding: Option<usize>,
}

/// A [`DatumCodec`] for a record schema bound to the host type `T`.
///
/// Schema fields without a binding cannot be encoded, and are skipped when decoding, leaving
/// the default value in place. Bindings without a schema field are never used.
pub struct SpecificCodec<T: AvroRecord> {
    codec: DatumCodec,
    record: Name,
    bindings: Vec<FieldBinding<T>>,
    plan: Vec<FieldPlan>,
}

impl<T: AvroRecord> SpecificCodec<T> {
    /// Bind `T` to the record at the root of `codec`.
    ///
    /// # Errors
    /// [`Details::ExpectedRecordSchema`] when the root of the schema is not a record.
    pub fn new(codec: DatumCodec) -> AvroResult<Self> {
        let CodecNode::Record(record) = codec.root() else {
            return Err(Details::ExpectedRecordSchema(codec.root().kind()).into());
        };
        let bindings = T::bindings();
        let plan = record
            .fields
            .iter()
            .map(|field| FieldPlan {
                name: field.name.clone(),
                node: field.node,
                binding: bindings.iter().position(|b| b.name == field.name),
            })
            .collect::<Vec<_>>();
        for binding in &bindings {
            if !plan.iter().any(|field| field.name == binding.name) {
                debug!(
                    "Field binding {:?} has no field in record {}",
                    binding.name, record.name
                );
            }
        }
        let record = record.name.clone();
        Ok(Self {
            codec,
            record,
            bindings,
            plan,
        })
    }

    pub fn datum_codec(&self) -> &DatumCodec {
        &self.codec
    }

    /// Encode `value` and return the number of bytes written.
    ///
    /// Nothing is written when a schema field has no binding.
    pub fn encode<W: Write>(&self, value: &T, writer: &mut W) -> AvroResult<usize> {
        if let Some(unbound) = self.plan.iter().find(|field| field.binding.is_none()) {
            return Err(Details::MissingField {
                record: self.record.fullname(None),
                field: unbound.name.clone(),
            }
            .into());
        }
        let mut written = 0;
        for field in &self.plan {
            if let Some(index) = field.binding {
                let datum = (self.bindings[index].get)(value);
                written += self
                    .codec
                    .encode_node(field.node, &datum, writer, 1)
                    .map_err(|e| e.in_field(&self.record, &field.name))?;
            }
        }
        Ok(written)
    }

    /// Decode one record into a new `T`.
    pub fn decode<R: Read>(&self, reader: &mut R) -> AvroResult<T> {
        let mut value = T::default();
        for field in &self.plan {
            let datum = self
                .codec
                .decode_node(field.node, reader, 1)
                .map_err(|e| e.in_field(&self.record, &field.name))?;
            if let Some(index) = field.binding {
                (self.bindings[index].set)(&mut value, datum)
                    .map_err(|e| e.in_field(&self.record, &field.name))?;
            }
        }
        Ok(value)
    }
}
