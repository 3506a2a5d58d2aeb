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

//! Logic for parsing and interacting with schemas in Avro format.

mod name;
mod parser;
mod record;
mod union;

pub use crate::schema::{
    name::{Name, Namespace, NamespaceRef},
    record::{RecordField, RecordSchema},
    union::UnionSchema,
};

use crate::{AvroResult, error::Details, schema::parser::Parser};
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};
use std::{collections::HashMap, fmt, io::Read};
use strum_macros::{Display, EnumDiscriminants};

/// Represents any valid Avro schema
/// More information about Avro schemas can be found in the
/// [Avro Specification](https://avro.apache.org/docs/++version++/specification/#schema-declaration)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants, Display)]
#[strum_discriminants(name(SchemaKind), derive(Hash, Ord, PartialOrd))]
pub enum Schema {
    /// A `null` Avro schema.
    Null,
    /// A `boolean` Avro schema.
    Boolean,
    /// An `int` Avro schema.
    Int,
    /// A `long` Avro schema.
    Long,
    /// A `float` Avro schema.
    Float,
    /// A `double` Avro schema.
    Double,
    /// A `bytes` Avro schema.
    ///
    /// `Bytes` represents a sequence of 8-bit unsigned bytes.
    Bytes,
    /// A `string` Avro schema.
    ///
    /// `String` represents a unicode character sequence.
    String,
    /// An `array` Avro schema.
    ///
    /// All items will have the same schema.
    Array(ArraySchema),
    /// A `map` Avro schema.
    ///
    /// Keys are always a `Schema::String` and all values will have the same schema.
    Map(MapSchema),
    /// A `union` Avro schema.
    Union(UnionSchema),
    /// A `record` Avro schema.
    Record(RecordSchema),
    /// An `enum` Avro schema.
    Enum(EnumSchema),
    /// A `fixed` Avro schema.
    Fixed(FixedSchema),
    /// A reference to another named schema defined earlier in the same document.
    ///
    /// Used for repeated uses of a named type and for recursive types.
    Ref { name: Name },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArraySchema {
    pub items: Box<Schema>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapSchema {
    pub types: Box<Schema>,
}

/// A description of an Enum schema.
#[derive(bon::Builder, Clone, Debug, PartialEq)]
pub struct EnumSchema {
    /// The name of the schema
    pub name: Name,
    /// The set of symbols of the schema, in wire index order
    pub symbols: Vec<String>,
}

/// A description of a Fixed schema.
#[derive(bon::Builder, Clone, Debug, PartialEq)]
pub struct FixedSchema {
    /// The name of the schema
    pub name: Name,
    /// The size of the fixed schema
    pub size: usize,
}

impl Schema {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub fn parse_str(input: &str) -> AvroResult<Schema> {
        Parser::default().parse_str(input)
    }

    /// Create a `Schema` from a `serde_json::Value` representing a JSON Avro schema.
    pub fn parse(value: &serde_json::Value) -> AvroResult<Schema> {
        Parser::default().parse(value, None)
    }

    /// Create a `Schema` from a reader which implements [`Read`].
    pub fn parse_reader(reader: &mut (impl Read + ?Sized)) -> AvroResult<Schema> {
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .map_err(Details::ReadSchemaFromReader)?;
        Self::parse_str(&buf)
    }

    /// Returns the JSON text of this schema, as written to a container file header.
    pub fn to_json(&self) -> AvroResult<String> {
        serde_json::to_string(self).map_err(|e| Details::ConvertJsonToString(e).into())
    }

    /// Returns whether the schema represents a named type according to the avro specification
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            Schema::Ref { .. } | Schema::Record(_) | Schema::Enum(_) | Schema::Fixed(_)
        )
    }

    /// Returns the name of the schema if it has one.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Ref { name }
            | Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Returns a `Schema::Map` with the given types.
    pub fn map(types: Schema) -> Self {
        Schema::Map(MapSchema {
            types: Box::new(types),
        })
    }

    /// Returns a `Schema::Array` with the given items.
    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            items: Box::new(items),
        })
    }

    /// Returns all named schemas defined in this schema, by name.
    ///
    /// `Ref`s are not definitions and are skipped.
    pub fn named_definitions(&self) -> HashMap<Name, &Schema> {
        fn collect<'s>(schema: &'s Schema, names: &mut HashMap<Name, &'s Schema>) {
            match schema {
                Schema::Record(record) => {
                    names.insert(record.name.clone(), schema);
                    for field in &record.fields {
                        collect(&field.schema, names);
                    }
                }
                Schema::Enum(EnumSchema { name, .. }) | Schema::Fixed(FixedSchema { name, .. }) => {
                    names.insert(name.clone(), schema);
                }
                Schema::Array(array) => collect(&array.items, names),
                Schema::Map(map) => collect(&map.types, names),
                Schema::Union(union) => {
                    for variant in union.variants() {
                        collect(variant, names);
                    }
                }
                _ => {}
            }
        }

        let mut names = HashMap::new();
        collect(self, &mut names);
        names
    }
}

impl SchemaKind {
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaKind::Null
                | SchemaKind::Boolean
                | SchemaKind::Int
                | SchemaKind::Long
                | SchemaKind::Double
                | SchemaKind::Float
                | SchemaKind::Bytes
                | SchemaKind::String,
        )
    }

    pub fn is_named(self) -> bool {
        matches!(
            self,
            SchemaKind::Record | SchemaKind::Enum | SchemaKind::Fixed | SchemaKind::Ref
        )
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn serialize_name<M: SerializeMap>(map: &mut M, name: &Name) -> Result<(), M::Error> {
    if let Some(namespace) = name.namespace() {
        map.serialize_entry("namespace", namespace)?;
    }
    map.serialize_entry("name", name.name())
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self {
            Schema::Ref { name } => serializer.serialize_str(&name.fullname(None)),
            Schema::Null => serializer.serialize_str("null"),
            Schema::Boolean => serializer.serialize_str("boolean"),
            Schema::Int => serializer.serialize_str("int"),
            Schema::Long => serializer.serialize_str("long"),
            Schema::Float => serializer.serialize_str("float"),
            Schema::Double => serializer.serialize_str("double"),
            Schema::Bytes => serializer.serialize_str("bytes"),
            Schema::String => serializer.serialize_str("string"),
            Schema::Array(ArraySchema { items }) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", items)?;
                map.end()
            }
            Schema::Map(MapSchema { types }) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "map")?;
                map.serialize_entry("values", types)?;
                map.end()
            }
            Schema::Union(inner) => {
                let variants = inner.variants();
                let mut seq = serializer.serialize_seq(Some(variants.len()))?;
                for v in variants {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Schema::Record(RecordSchema { name, fields, .. }) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "record")?;
                serialize_name(&mut map, name)?;
                map.serialize_entry("fields", fields)?;
                map.end()
            }
            Schema::Enum(EnumSchema { name, symbols }) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "enum")?;
                serialize_name(&mut map, name)?;
                map.serialize_entry("symbols", symbols)?;
                map.end()
            }
            Schema::Fixed(FixedSchema { name, size }) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "fixed")?;
                serialize_name(&mut map, name)?;
                map.serialize_entry("size", size)?;
                map.end()
            }
        }
    }
}
