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

//! Logic handling the intermediate representation of Avro values.

use crate::{AvroResult, Error, error::Details};
use std::collections::HashMap;
use strum_macros::EnumDiscriminants;

/// Represents any valid Avro value.
///
/// More information about Avro values can be found in the
/// [Avro Specification](https://avro.apache.org/docs/++version++/specification/#schema-declaration)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Hash))]
pub enum Value {
    /// A `null` Avro value.
    Null,
    /// A `boolean` Avro value.
    Boolean(bool),
    /// A `int` Avro value.
    Int(i32),
    /// A `long` Avro value.
    Long(i64),
    /// A `float` Avro value.
    Float(f32),
    /// A `double` Avro value.
    Double(f64),
    /// A `bytes` Avro value.
    Bytes(Vec<u8>),
    /// A `string` Avro value.
    String(String),
    /// A `fixed` Avro value.
    ///
    /// The length of the bytes must match the size of the schema.
    Fixed(Vec<u8>),
    /// An `enum` Avro value.
    ///
    /// An Enum is represented by a symbol and its position in the symbols list
    /// of its corresponding schema.
    /// This allows schema-less encoding, as well as schema resolution while
    /// reading values.
    Enum(u32, String),
    /// An `array` Avro value.
    Array(Vec<Value>),
    /// A `map` Avro value.
    Map(HashMap<String, Value>),
    /// A `union` Avro value with an explicit branch index.
    Union(u32, Box<Value>),
    /// The value of a two branch union where one branch is `null`.
    Optional(Option<Box<Value>>),
    /// A `record` Avro value.
    ///
    /// A Record is represented by a vector of (`<field name>`, `value`).
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        ValueKind::from(self)
    }

    /// Strip `Union` and present `Optional` wrappers.
    pub fn into_branch_value(self) -> Value {
        match self {
            Value::Union(_, value) => value.into_branch_value(),
            Value::Optional(Some(value)) => value.into_branch_value(),
            Value::Optional(None) => Value::Null,
            other => other,
        }
    }

    /// Look up a field of a `Record` value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

macro_rules! to_value(
    ($type:ty, $variant_constructor:expr) => (
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                $variant_constructor(value)
            }
        }
    );
);

to_value!(bool, Value::Boolean);
to_value!(i32, Value::Int);
to_value!(i64, Value::Long);
to_value!(f32, Value::Float);
to_value!(f64, Value::Double);
to_value!(String, Value::String);
to_value!(Vec<u8>, Value::Bytes);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_owned())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        Self::Optional(value.map(|v| Box::new(v.into())))
    }
}

impl<K, V> From<HashMap<K, V>> for Value
where
    K: Into<String>,
    V: Into<Self>,
{
    fn from(value: HashMap<K, V>) -> Self {
        Self::Map(
            value
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

macro_rules! from_value(
    ($type:ty, $expected:literal, $($pattern:pat => $result:expr),+) => (
        impl TryFrom<Value> for $type {
            type Error = Error;

            fn try_from(value: Value) -> AvroResult<Self> {
                match value.into_branch_value() {
                    $($pattern => Ok($result),)+
                    other => Err(Details::ConvertValue {
                        expected: $expected,
                        value_kind: other.kind(),
                    }
                    .into()),
                }
            }
        }
    );
);

from_value!(bool, "boolean", Value::Boolean(b) => b);
from_value!(i32, "int", Value::Int(i) => i);
from_value!(i64, "long", Value::Long(i) => i, Value::Int(i) => i64::from(i));
from_value!(f32, "float", Value::Float(x) => x);
from_value!(f64, "double", Value::Double(x) => x, Value::Float(x) => f64::from(x));
from_value!(String, "string", Value::String(s) => s, Value::Enum(_, s) => s);
from_value!(Vec<u8>, "bytes", Value::Bytes(b) => b, Value::Fixed(b) => b);
