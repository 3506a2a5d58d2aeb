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

use crate::error::Details;
use crate::schema::{
    EnumSchema, FixedSchema, Name, NamespaceRef, RecordField, RecordSchema, Schema, UnionSchema,
};
use crate::util::MapHelper;
use crate::validator::validate_enum_symbol_name;
use crate::{AvroResult, Error};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Default)]
pub(crate) struct Parser {
    /// Named types defined so far, including records whose fields are still being parsed,
    /// so that a field can refer to its own record.
    defined: HashSet<Name>,
}

impl Parser {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub(super) fn parse_str(&mut self, input: &str) -> AvroResult<Schema> {
        let value = serde_json::from_str(input).map_err(Details::ParseSchemaJson)?;
        self.parse(&value, None)
    }

    /// Create a `Schema` from a `serde_json::Value` representing a JSON Avro schema.
    pub(super) fn parse(
        &mut self,
        value: &Value,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match *value {
            Value::String(ref t) => self.parse_known_schema(t.as_str(), enclosing_namespace),
            Value::Object(ref data) => self.parse_complex(data, enclosing_namespace),
            Value::Array(ref data) => self.parse_union(data, enclosing_namespace),
            _ => Err(Details::ParseSchemaFromValidJson.into()),
        }
    }

    /// Parse a string as a primitive type or reference to an already defined named type.
    fn parse_known_schema(
        &mut self,
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match name {
            "null" => Ok(Schema::Null),
            "boolean" => Ok(Schema::Boolean),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "double" => Ok(Schema::Double),
            "float" => Ok(Schema::Float),
            "bytes" => Ok(Schema::Bytes),
            "string" => Ok(Schema::String),
            "record" | "enum" | "fixed" | "array" | "map" => {
                Err(Details::InvalidSchemaRecord(name.to_string()).into())
            }
            _ => self.fetch_schema_ref(name, enclosing_namespace),
        }
    }

    fn fetch_schema_ref(
        &mut self,
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::new_with_enclosing_namespace(name, enclosing_namespace)?;
        if self.defined.contains(&fully_qualified_name) {
            Ok(Schema::Ref {
                name: fully_qualified_name,
            })
        } else {
            Err(Details::SchemaResolutionError(fully_qualified_name).into())
        }
    }

    /// Parse a `serde_json::Value` representing a complex Avro type into a `Schema`.
    ///
    /// Avro supports "recursive" definition of types.
    /// e.g: `{"type": {"type": "string"}}`
    fn parse_complex(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        if let Some(logical_type) = complex.get("logicalType") {
            warn!("Ignoring logical type {logical_type}, the underlying type is used");
        }

        match complex.get("type") {
            Some(Value::String(t)) => match t.as_str() {
                "record" => self.parse_record(complex, enclosing_namespace),
                "enum" => self.parse_enum(complex, enclosing_namespace),
                "array" => self.parse_array(complex, enclosing_namespace),
                "map" => self.parse_map(complex, enclosing_namespace),
                "fixed" => self.parse_fixed(complex, enclosing_namespace),
                other => self.parse_known_schema(other, enclosing_namespace),
            },
            Some(Value::Object(data)) => self.parse_complex(data, enclosing_namespace),
            Some(Value::Array(variants)) => self.parse_union(variants, enclosing_namespace),
            Some(unknown) => Err(Details::GetComplexType(unknown.clone()).into()),
            None => Err(Details::GetComplexTypeField.into()),
        }
    }

    fn register(&mut self, name: &Name) -> AvroResult<()> {
        if self.defined.insert(name.clone()) {
            Ok(())
        } else {
            Err(Details::AmbiguousSchemaDefinition(name.clone()).into())
        }
    }

    fn parse_record(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        self.register(&fully_qualified_name)?;

        debug!("Going to parse record schema: {fully_qualified_name:?}");

        let fields = complex
            .get("fields")
            .and_then(|fields| fields.as_array())
            .ok_or_else(|| Error::new(Details::GetRecordFieldsJson))?
            .iter()
            .map(|field| match field.as_object() {
                Some(field) => self.parse_record_field(field, &fully_qualified_name),
                None => Err(Details::GetRecordFieldObject(field.clone()).into()),
            })
            .collect::<AvroResult<Vec<_>>>()?;

        Ok(Schema::Record(RecordSchema::new(
            fully_qualified_name,
            fields,
        )?))
    }

    fn parse_record_field(
        &mut self,
        field: &Map<String, Value>,
        enclosing_record: &Name,
    ) -> AvroResult<RecordField> {
        let name = field.name().ok_or(Details::GetNameFieldFromRecord)?;
        let schema = match field.get("type") {
            Some(value) => self.parse(value, enclosing_record.namespace())?,
            None => return Err(Details::GetRecordFieldTypeField(name).into()),
        };
        Ok(RecordField::builder().name(name).schema(schema).build())
    }

    fn parse_enum(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;

        let symbols: Vec<String> = complex
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::from(Details::GetEnumSymbolsField))
            .and_then(|symbols| {
                symbols
                    .iter()
                    .map(|symbol| symbol.as_str().map(|s| s.to_string()))
                    .collect::<Option<_>>()
                    .ok_or_else(|| Error::from(Details::GetEnumSymbols))
            })?;

        let mut existing_symbols: HashSet<&String> = HashSet::with_capacity(symbols.len());
        for symbol in symbols.iter() {
            validate_enum_symbol_name(symbol)?;

            if !existing_symbols.insert(symbol) {
                return Err(Details::EnumSymbolDuplicate(symbol.to_string()).into());
            }
        }

        self.register(&fully_qualified_name)?;
        Ok(Schema::Enum(EnumSchema {
            name: fully_qualified_name,
            symbols,
        }))
    }

    fn parse_array(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        complex
            .get("items")
            .ok_or_else(|| Details::GetArrayItemsField.into())
            .and_then(|items| self.parse(items, enclosing_namespace))
            .map(Schema::array)
    }

    fn parse_map(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        complex
            .get("values")
            .ok_or_else(|| Details::GetMapValuesField.into())
            .and_then(|types| self.parse(types, enclosing_namespace))
            .map(Schema::map)
    }

    fn parse_union(
        &mut self,
        items: &[Value],
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let schemas = items
            .iter()
            .map(|v| self.parse(v, enclosing_namespace))
            .collect::<AvroResult<Vec<_>>>()?;
        if schemas.len() == 1 {
            warn!("Union schema with just one member! Consider dropping the union!");
        }
        Ok(Schema::Union(UnionSchema::new(schemas)?))
    }

    fn parse_fixed(
        &mut self,
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let size = match complex.get("size") {
            Some(size) => size
                .as_u64()
                .ok_or_else(|| Details::GetFixedSizeFieldPositive(size.clone())),
            None => Err(Details::GetFixedSizeField),
        }?;
        let size = usize::try_from(size)
            .map_err(|_| Details::GetFixedSizeFieldPositive(Value::from(size)))?;

        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        self.register(&fully_qualified_name)?;

        Ok(Schema::Fixed(FixedSchema {
            name: fully_qualified_name,
            size,
        }))
    }
}
