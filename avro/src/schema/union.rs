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
    schema::{Name, Schema, SchemaKind},
};
use std::collections::BTreeSet;

/// A description of a Union schema
#[derive(Debug, Clone, PartialEq)]
pub struct UnionSchema {
    /// The schemas that make up this union
    pub(crate) schemas: Vec<Schema>,
}

impl UnionSchema {
    /// Creates a new UnionSchema from a vector of schemas.
    ///
    /// # Errors
    /// Will return an error if `schemas` has duplicate unnamed schemas, duplicate names, or if
    /// `schemas` contains a union.
    pub fn new(schemas: Vec<Schema>) -> AvroResult<Self> {
        if schemas.is_empty() {
            return Err(Details::EmptyUnion.into());
        }
        let mut kinds = BTreeSet::new();
        let mut names: BTreeSet<&Name> = BTreeSet::new();
        for schema in &schemas {
            if let Schema::Union(_) = schema {
                return Err(Details::GetNestedUnion.into());
            }
            let unique = match schema.name() {
                Some(name) => names.insert(name),
                None => kinds.insert(SchemaKind::from(schema)),
            };
            if !unique {
                return Err(Details::GetUnionDuplicate.into());
            }
        }
        Ok(UnionSchema { schemas })
    }

    /// Returns a slice to all variants of this schema.
    pub fn variants(&self) -> &[Schema] {
        &self.schemas
    }

    /// Returns true if the any of the variants of this `UnionSchema` is `Null`.
    pub fn is_nullable(&self) -> bool {
        self.schemas.iter().any(|x| matches!(x, Schema::Null))
    }

    /// For an optional union, a union of exactly two branches where one is `null`, returns the
    /// index of the `null` branch and the index of the value branch.
    pub fn optional_indexes(&self) -> Option<(u32, u32)> {
        match self.schemas.as_slice() {
            [Schema::Null, other] if !matches!(other, Schema::Null) => Some((0, 1)),
            [_, Schema::Null] => Some((1, 0)),
            _ => None,
        }
    }
}
