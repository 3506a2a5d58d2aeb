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
    error::Details,
    schema::{Name, Schema},
    validator::validate_record_field_name,
};
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::collections::BTreeMap;

/// A description of a Record schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordSchema {
    /// The name of the schema
    pub name: Name,
    /// The set of fields of the schema, in wire order
    pub fields: Vec<RecordField>,
    /// The `lookup` table maps field names to their position in the `Vec`
    /// of `fields`.
    pub lookup: BTreeMap<String, usize>,
}

impl RecordSchema {
    /// Create a record schema, checking that the field names are valid and unique.
    ///
    /// The `position` of every field is set to its index in `fields`.
    pub fn new(name: Name, mut fields: Vec<RecordField>) -> AvroResult<Self> {
        let mut lookup = BTreeMap::new();
        for (position, field) in fields.iter_mut().enumerate() {
            validate_record_field_name(&field.name)?;
            if lookup.insert(field.name.clone(), position).is_some() {
                return Err(Details::FieldNameDuplicate(field.name.clone()).into());
            }
            field.position = position;
        }
        Ok(Self {
            name,
            fields,
            lookup,
        })
    }

    /// Returns the field called `name`.
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.lookup.get(name).map(|&position| &self.fields[position])
    }
}

/// Represents a `field` in a `record` Avro schema.
#[derive(bon::Builder, Clone, Debug, PartialEq)]
pub struct RecordField {
    /// Name of the field.
    #[builder(into)]
    pub name: String,
    /// Schema of the field.
    pub schema: Schema,
    /// Position of the field in the list of `field` of its parent `Schema`
    #[builder(default)]
    pub position: usize,
}

impl Serialize for RecordField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("type", &self.schema)?;
        map.end()
    }
}
