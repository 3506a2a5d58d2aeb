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

use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::{
    AvroResult, Error,
    error::Details,
    util::MapHelper,
    validator::{validate_namespace, validate_schema_name},
};

/// Represents the namespace for Named Schema
pub type Namespace = Option<String>;
/// Represents the namespace for Named Schema
pub type NamespaceRef<'a> = Option<&'a str>;

/// Represents names for `record`, `enum` and `fixed` Avro schemas.
///
/// Each of these `Schema`s have a `fullname` composed of two parts:
///   * a name
///   * a namespace
///
/// More information about schema names can be found in the
/// [Avro specification](https://avro.apache.org/docs/++version++/specification/#names)
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name {
    name: String,
    namespace: Namespace,
}

impl Name {
    /// Create a new `Name`.
    /// Parses the optional `namespace` from the `name` string.
    pub fn new(name: &str) -> AvroResult<Self> {
        Self::new_with_enclosing_namespace(name, None)
    }

    /// Create a new `Name` using the namespace from `enclosing_namespace` if `name` has none.
    ///
    /// A leading dot (`".Person"`) places the name in the null namespace.
    pub fn new_with_enclosing_namespace(
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Self> {
        let index_of_name = validate_schema_name(name)?;

        if index_of_name == 0 {
            let namespace = match enclosing_namespace {
                Some(namespace) if !namespace.is_empty() => {
                    validate_namespace(namespace)?;
                    Some(namespace.to_string())
                }
                _ => None,
            };
            return Ok(Self {
                name: name.to_string(),
                namespace,
            });
        }

        let namespace = &name[..index_of_name - 1];
        Ok(Self {
            name: name[index_of_name..].to_string(),
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        })
    }

    /// Parse the `name` and `namespace` attributes of a JSON schema object.
    pub(crate) fn parse(
        complex: &Map<String, Value>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Self> {
        let name_field = complex.name().ok_or(Details::GetNameField)?;
        let namespace = complex.string("namespace");
        Self::new_with_enclosing_namespace(
            &name_field,
            namespace.as_deref().or(enclosing_namespace),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> NamespaceRef<'_> {
        self.namespace.as_deref()
    }

    /// Return the `fullname` of this `Name`, using `enclosing_namespace` when it has none.
    ///
    /// More information about fullnames can be found in the
    /// [Avro specification](https://avro.apache.org/docs/++version++/specification/#names)
    pub fn fullname(&self, enclosing_namespace: NamespaceRef) -> String {
        match self.namespace.as_deref().or(enclosing_namespace) {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}.{}", self.name),
            _ => self.name.clone(),
        }
    }
}

impl TryFrom<&str> for Name {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fullname(None))
    }
}
