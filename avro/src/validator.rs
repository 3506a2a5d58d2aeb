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

//! # Name validation
//!
//! Schema names, namespaces, enum symbols and record field names are checked against the rules
//! of the [Avro specification](https://avro.apache.org/docs/++version++/specification/#names)
//! when a schema is parsed.
//!
//! Files produced by other Avro implementations sometimes use looser names. A custom
//! [`NameValidator`] can be registered once, before the first schema is parsed:
//!
//! ```
//! # use avro_codec::{AvroResult, error::Details, validator::{NameValidator, set_name_validator}};
//! struct AllowDashesInSymbols;
//!
//! impl NameValidator for AllowDashesInSymbols {
//!     fn validate_enum_symbol(&self, symbol: &str) -> AvroResult<()> {
//!         if symbol.is_empty() {
//!             return Err(Details::EnumSymbolName(symbol.to_string()).into());
//!         }
//!         Ok(())
//!     }
//! }
//!
//! if set_name_validator(Box::new(AllowDashesInSymbols)).is_err() {
//!     panic!("There was already a name validator configured")
//! }
//! ```
//!
//! **Note**: the validator can be set only once per application lifetime. Parsing a schema
//! before calling [`set_name_validator`] registers the default one.

use crate::{AvroResult, error::Details};
use log::debug;
use regex_lite::Regex;
use std::sync::OnceLock;

const SCHEMA_NAME_PATTERN: &str = r"^((?P<namespace>([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?)\.)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)$";
const NAMESPACE_PATTERN: &str = r"^([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?$";
const SIMPLE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn compiled(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("name patterns are valid regular expressions"))
}

fn schema_name_regex() -> &'static Regex {
    static SCHEMA_NAME: OnceLock<Regex> = OnceLock::new();
    compiled(&SCHEMA_NAME, SCHEMA_NAME_PATTERN)
}

fn namespace_regex() -> &'static Regex {
    static NAMESPACE: OnceLock<Regex> = OnceLock::new();
    compiled(&NAMESPACE, NAMESPACE_PATTERN)
}

fn simple_name_regex() -> &'static Regex {
    static SIMPLE_NAME: OnceLock<Regex> = OnceLock::new();
    compiled(&SIMPLE_NAME, SIMPLE_NAME_PATTERN)
}

/// Validates the names found in a schema.
///
/// Every method has a default implementation following the Avro rules, so an implementation only
/// overrides what it wants to relax or tighten.
pub trait NameValidator: Send + Sync {
    /// Validates a (possibly dotted) schema name and returns the byte offset of the simple name.
    ///
    /// Should return [`Details::InvalidSchemaName`] if it is invalid.
    fn validate_schema_name(&self, schema_name: &str) -> AvroResult<usize> {
        let regex = schema_name_regex();
        regex
            .captures(schema_name)
            .and_then(|caps| caps.name("name"))
            .map(|name| name.start())
            .ok_or_else(|| {
                Details::InvalidSchemaName(schema_name.to_string(), SCHEMA_NAME_PATTERN).into()
            })
    }

    /// Should return [`Details::InvalidNamespace`] if it is invalid.
    fn validate_namespace(&self, namespace: &str) -> AvroResult<()> {
        if namespace_regex().is_match(namespace) {
            Ok(())
        } else {
            Err(Details::InvalidNamespace(namespace.to_string(), NAMESPACE_PATTERN).into())
        }
    }

    /// Should return [`Details::EnumSymbolName`] if it is invalid.
    fn validate_enum_symbol(&self, symbol: &str) -> AvroResult<()> {
        if simple_name_regex().is_match(symbol) {
            Ok(())
        } else {
            Err(Details::EnumSymbolName(symbol.to_string()).into())
        }
    }

    /// Should return [`Details::FieldName`] if it is invalid.
    fn validate_field_name(&self, field_name: &str) -> AvroResult<()> {
        if simple_name_regex().is_match(field_name) {
            Ok(())
        } else {
            Err(Details::FieldName(field_name.to_string()).into())
        }
    }
}

struct SpecificationValidator;

impl NameValidator for SpecificationValidator {}

static NAME_VALIDATOR_ONCE: OnceLock<Box<dyn NameValidator>> = OnceLock::new();

/// Sets a custom name validator.
///
/// Returns `Err(validator)` if a validator is already configured.
///
/// **Note**: This function must be called before parsing any schema because this will
/// register the default validator and the registration is one time only!
pub fn set_name_validator(
    validator: Box<dyn NameValidator>,
) -> Result<(), Box<dyn NameValidator>> {
    debug!("Setting a custom name validator.");
    NAME_VALIDATOR_ONCE.set(validator)
}

fn validator() -> &'static dyn NameValidator {
    NAME_VALIDATOR_ONCE
        .get_or_init(|| {
            debug!("Going to use the default name validator.");
            Box::new(SpecificationValidator)
        })
        .as_ref()
}

pub(crate) fn validate_schema_name(schema_name: &str) -> AvroResult<usize> {
    validator().validate_schema_name(schema_name)
}

pub(crate) fn validate_namespace(namespace: &str) -> AvroResult<()> {
    validator().validate_namespace(namespace)
}

pub(crate) fn validate_enum_symbol_name(symbol: &str) -> AvroResult<()> {
    validator().validate_enum_symbol(symbol)
}

pub(crate) fn validate_record_field_name(field_name: &str) -> AvroResult<()> {
    validator().validate_field_name(field_name)
}
