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
    schema::{Name, SchemaKind},
    types::ValueKind,
};
use std::{error::Error as _, fmt};

/// Errors encountered while compiling schemas, encoding or decoding data.
///
/// To inspect the details of the error use [`details`](Self::details) or [`into_details`](Self::into_details)
/// to get a [`Details`] which contains more precise error information. [`kind`](Self::kind) tells
/// which class of failure it is.
///
/// See [`Details`] for all possible errors.
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }

    /// The class of failure, see [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        self.details.kind()
    }

    /// Wrap this error with the record field it happened in.
    pub(crate) fn in_field(self, record: &Name, field: &str) -> Self {
        Details::Field {
            record: record.fullname(None),
            field: field.to_string(),
            error: Box::new(self),
        }
        .into()
    }

    /// Wrap this error with the index of the container block it happened in.
    pub(crate) fn in_block(self, index: usize) -> Self {
        Details::Block {
            index,
            error: Box::new(self),
        }
        .into()
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

/// The broad classes of failure.
///
/// None of them are retried by this crate. A caller that wants to retry has to start over with
/// the whole datum or the whole block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The underlying reader or writer failed, or the input ended in the middle of a value.
    Stream,
    /// The value does not have the shape the schema requires.
    SchemaMismatch,
    /// The bytes are not valid Avro data for the schema, or the container file is damaged.
    Corruption,
    /// The schema or the writer configuration is invalid.
    Configuration,
}

#[derive(thiserror::Error)]
pub enum Details {
    #[error("Invalid u8 for bool: {0}")]
    BoolValue(u8),

    #[error("Failed to read boolean bytes: {0}")]
    ReadBoolean(#[source] std::io::Error),

    #[error("Failed to read bytes: {0}")]
    ReadBytes(#[source] std::io::Error),

    #[error("Failed to read double: {0}")]
    ReadDouble(#[source] std::io::Error),

    #[error("Failed to read float: {0}")]
    ReadFloat(#[source] std::io::Error),

    #[error("Failed to read fixed number of bytes '{1}': {0}")]
    ReadFixed(#[source] std::io::Error, usize),

    #[error("Invalid utf-8 string")]
    ConvertToUtf8(#[source] std::string::FromUtf8Error),

    #[error("Unable to allocate {desired} bytes (maximum allowed: {maximum})")]
    MemoryAllocation { desired: usize, maximum: usize },

    #[error("Negative length {0} for bytes or string")]
    NegativeLength(i64),

    #[error("Negative block count {0}; byte-size prefixed blocks are not supported")]
    NegativeBlockCount(i64),

    #[error("Cannot convert i64 to usize: {1}")]
    ConvertI64ToUsize(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert usize to i64: {1}")]
    ConvertUsizeToI64(#[source] std::num::TryFromIntError, usize),

    #[error("Overflow when decoding integer value")]
    IntegerOverflow,

    #[error("Failed to read bytes for decoding variable length integer: {0}")]
    ReadVariableIntegerBytes(#[source] std::io::Error),

    #[error("Decoded integer out of range for i32: {1}: {0}")]
    ZagI32(#[source] std::num::TryFromIntError, i64),

    #[error("Union index {index} out of bounds: {num_variants}")]
    UnionIndexOutOfBounds { index: i64, num_variants: usize },

    #[error("Union variant {index} does not exist, the union has {num_variants} variants")]
    UnionVariantOutOfBounds { index: u32, num_variants: usize },

    #[error("Enum symbol index {index} out of bounds: {num_symbols}")]
    EnumIndexOutOfBounds { index: i64, num_symbols: usize },

    #[error("Enum symbol not found {0}")]
    GetEnumSymbol(String),

    #[error("Enum index {index} does not match symbol {symbol:?} at index {position}")]
    EnumIndexMismatch {
        index: u32,
        symbol: String,
        position: usize,
    },

    #[error("Value is nested deeper than the maximum depth of {0}")]
    EncodeDepthExceeded(usize),

    #[error("Datum is nested deeper than the maximum depth of {0}")]
    DecodeDepthExceeded(usize),

    #[error("Fixed size mismatch, expected: {size}, got: {n}")]
    FixedSizeMismatch { size: usize, n: usize },

    #[error("Missing field {field:?} in record {record}")]
    MissingField { record: String, field: String },

    #[error("Record {record} has no field named {field:?}")]
    UnknownField { record: String, field: String },

    #[error("Could not find matching type in union {union:?} for value of kind {value_kind:?}")]
    FindUnionVariant {
        union: Vec<SchemaKind>,
        value_kind: ValueKind,
    },

    #[error("Can only encode value type {value_kind:?} as one of {supported_schema:?}")]
    EncodeValueAsSchemaError {
        value_kind: ValueKind,
        supported_schema: Vec<SchemaKind>,
    },

    #[error("Expected a {expected} value, got a value of kind {value_kind:?}")]
    ConvertValue {
        expected: &'static str,
        value_kind: ValueKind,
    },

    #[error("Failed to encode or decode field {field:?} of record {record}: {error}")]
    Field {
        record: String,
        field: String,
        #[source]
        error: Box<Error>,
    },

    #[error("Failed to read block {index}: {error}")]
    Block {
        index: usize,
        #[source]
        error: Box<Error>,
    },

    #[error("Block claims {expected} objects but {decoded} were decoded with {remaining} bytes left")]
    BlockObjectCount {
        expected: usize,
        decoded: usize,
        remaining: usize,
    },

    #[error("Failed to parse schema from JSON")]
    ParseSchemaJson(#[source] serde_json::Error),

    #[error("Failed to read schema")]
    ReadSchemaFromReader(#[source] std::io::Error),

    #[error("Must be a JSON string, object or array")]
    ParseSchemaFromValidJson,

    #[error("Unknown complex type: {0}")]
    GetComplexType(serde_json::Value),

    #[error("No `type` in complex type")]
    GetComplexTypeField,

    #[error("No `name` field")]
    GetNameField,

    #[error("No `name` in record field")]
    GetNameFieldFromRecord,

    #[error("No `type` in record field {0:?}")]
    GetRecordFieldTypeField(String),

    #[error("No `fields` in record")]
    GetRecordFieldsJson,

    #[error("Record field must be a JSON object, got {0}")]
    GetRecordFieldObject(serde_json::Value),

    #[error("No `symbols` field in enum")]
    GetEnumSymbolsField,

    #[error("Unable to parse `symbols` in enum")]
    GetEnumSymbols,

    #[error("Invalid enum symbol name {0}")]
    EnumSymbolName(String),

    #[error("Duplicate enum symbol {0}")]
    EnumSymbolDuplicate(String),

    #[error("Invalid field name {0}")]
    FieldName(String),

    #[error("Duplicate field name {0}")]
    FieldNameDuplicate(String),

    #[error("Invalid schema name {0}. It must match the regex '{1}'")]
    InvalidSchemaName(String, &'static str),

    #[error("Invalid namespace {0}. It must match the regex '{1}'")]
    InvalidNamespace(String, &'static str),

    #[error(
        "Invalid schema: There is no type called '{0}', if you meant to define a non-primitive schema, it should be defined inside `type` attribute"
    )]
    InvalidSchemaRecord(String),

    #[error("No `items` in array")]
    GetArrayItemsField,

    #[error("No `values` in map")]
    GetMapValuesField,

    #[error("Fixed schema `size` value must be a positive integer: {0}")]
    GetFixedSizeFieldPositive(serde_json::Value),

    #[error("Fixed schema has no `size`")]
    GetFixedSizeField,

    #[error("Unions may not directly contain a union")]
    GetNestedUnion,

    #[error("Unions cannot contain duplicate types")]
    GetUnionDuplicate,

    #[error("Union type should not be empty")]
    EmptyUnion,

    #[error("Unresolved schema reference: {0}")]
    SchemaResolutionError(Name),

    #[error("Two named schema defined for same fullname: {0}.")]
    AmbiguousSchemaDefinition(Name),

    #[error("A specific record codec needs a record schema, got {0:?}")]
    ExpectedRecordSchema(SchemaKind),

    #[error("Failed to convert JSON to string: {0}")]
    ConvertJsonToString(#[source] serde_json::Error),

    #[error("Failed to decompress with flate: {0}")]
    DeflateDecompress(#[source] std::io::Error),

    #[cfg(feature = "snappy")]
    #[error("Failed to compress with snappy: {0}")]
    SnappyCompress(#[source] std::io::Error),

    #[cfg(feature = "snappy")]
    #[error("Failed to decompress with snappy: {0}")]
    SnappyDecompress(#[source] std::io::Error),

    #[error("Codec '{0}' is not supported/enabled")]
    CodecNotSupported(String),

    #[error("Invalid Avro data! Cannot read codec type from value that is not valid utf-8.")]
    BadCodecMetadata,

    #[error("Failed to read header: {0}")]
    ReadHeader(#[source] std::io::Error),

    #[error("wrong magic in header")]
    HeaderMagic,

    #[error("Failed to get JSON from avro.schema key in map")]
    GetAvroSchemaFromMap,

    #[error("Failed to read marker bytes: {0}")]
    ReadMarker(#[source] std::io::Error),

    #[error("Failed to read block marker bytes: {0}")]
    ReadBlockMarker(#[source] std::io::Error),

    #[error("block marker does not match header marker")]
    GetBlockMarker,

    #[error("Failed to write buffer bytes during flush: {0}")]
    WriteBytes(#[source] std::io::Error),

    #[error("Failed to flush inner writer during flush: {0}")]
    FlushWriter(#[source] std::io::Error),

    #[error("Failed to write marker: {0}")]
    WriteMarker(#[source] std::io::Error),

    #[error("The file metadata is already flushed.")]
    FileHeaderAlreadyWritten,

    #[error("Metadata keys starting with 'avro.' are reserved for internal usage: {0}.")]
    InvalidMetadataKey(String),

    #[error("The codec was compiled from a different schema than the one of the writer")]
    CodecSchemaMismatch,

    #[error("A previous write failed part way through a block, the writer cannot be used anymore")]
    WriterPoisoned,
}

impl Details {
    /// The class of failure, see [`ErrorKind`].
    ///
    /// Context wrappers ([`Details::Field`] and [`Details::Block`]) report the kind of the error
    /// they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Details::Field { error, .. } | Details::Block { error, .. } => error.kind(),

            Details::ReadBoolean(_)
            | Details::ReadBytes(_)
            | Details::ReadDouble(_)
            | Details::ReadFloat(_)
            | Details::ReadFixed(..)
            | Details::ReadVariableIntegerBytes(_)
            | Details::ReadSchemaFromReader(_)
            | Details::ReadHeader(_)
            | Details::ReadMarker(_)
            | Details::ReadBlockMarker(_)
            | Details::WriteBytes(_)
            | Details::FlushWriter(_)
            | Details::WriteMarker(_)
            | Details::WriterPoisoned => ErrorKind::Stream,

            Details::UnionVariantOutOfBounds { .. }
            | Details::GetEnumSymbol(_)
            | Details::EnumIndexMismatch { .. }
            | Details::EncodeDepthExceeded(_)
            | Details::FixedSizeMismatch { .. }
            | Details::MissingField { .. }
            | Details::UnknownField { .. }
            | Details::FindUnionVariant { .. }
            | Details::EncodeValueAsSchemaError { .. }
            | Details::ConvertValue { .. }
            | Details::ConvertUsizeToI64(..) => ErrorKind::SchemaMismatch,

            Details::BoolValue(_)
            | Details::ConvertToUtf8(_)
            | Details::MemoryAllocation { .. }
            | Details::NegativeLength(_)
            | Details::NegativeBlockCount(_)
            | Details::ConvertI64ToUsize(..)
            | Details::IntegerOverflow
            | Details::ZagI32(..)
            | Details::UnionIndexOutOfBounds { .. }
            | Details::EnumIndexOutOfBounds { .. }
            | Details::DecodeDepthExceeded(_)
            | Details::BlockObjectCount { .. }
            | Details::DeflateDecompress(_)
            | Details::CodecNotSupported(_)
            | Details::BadCodecMetadata
            | Details::HeaderMagic
            | Details::GetAvroSchemaFromMap
            | Details::GetBlockMarker => ErrorKind::Corruption,

            #[cfg(feature = "snappy")]
            Details::SnappyDecompress(_) => ErrorKind::Corruption,
            #[cfg(feature = "snappy")]
            Details::SnappyCompress(_) => ErrorKind::Stream,

            Details::ParseSchemaJson(_)
            | Details::ParseSchemaFromValidJson
            | Details::GetComplexType(_)
            | Details::GetComplexTypeField
            | Details::GetNameField
            | Details::GetNameFieldFromRecord
            | Details::GetRecordFieldTypeField(_)
            | Details::GetRecordFieldsJson
            | Details::GetRecordFieldObject(_)
            | Details::GetEnumSymbolsField
            | Details::GetEnumSymbols
            | Details::EnumSymbolName(_)
            | Details::EnumSymbolDuplicate(_)
            | Details::FieldName(_)
            | Details::FieldNameDuplicate(_)
            | Details::InvalidSchemaName(..)
            | Details::InvalidNamespace(..)
            | Details::InvalidSchemaRecord(_)
            | Details::GetArrayItemsField
            | Details::GetMapValuesField
            | Details::GetFixedSizeFieldPositive(_)
            | Details::GetFixedSizeField
            | Details::GetNestedUnion
            | Details::GetUnionDuplicate
            | Details::EmptyUnion
            | Details::SchemaResolutionError(_)
            | Details::AmbiguousSchemaDefinition(_)
            | Details::ExpectedRecordSchema(_)
            | Details::ConvertJsonToString(_)
            | Details::FileHeaderAlreadyWritten
            | Details::InvalidMetadataKey(_)
            | Details::CodecSchemaMismatch => ErrorKind::Configuration,
        }
    }
}

impl fmt::Debug for Details {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut msg = self.to_string();
        if let Some(e) = self.source() {
            msg.extend([": ", &e.to_string()]);
        }
        write!(f, "{msg}")
    }
}
