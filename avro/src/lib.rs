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

//! A compiled, schema-driven codec for the binary encoding of
//! **[Apache Avro](https://avro.apache.org/)**, and reading and writing of object container files.
//!
//! A [`Schema`] is compiled once into a [`DatumCodec`], a table of codec nodes that encodes and
//! decodes [`Value`](types::Value)s without looking at the schema again. Codecs are immutable and
//! cheap to clone, so one codec can be shared by many threads.
//!
//! ```
//! use avro_codec::{Codec, DeflateSettings, Reader, Schema, Writer, types::Value};
//!
//! let schema = Schema::parse_str(r#"
//!     {"type": "record", "name": "Person", "fields": [
//!         {"name": "name", "type": "string"},
//!         {"name": "age", "type": "int"}
//!     ]}
//! "#)?;
//!
//! let mut writer = Writer::with_codec(&schema, Vec::new(), Codec::Deflate(DeflateSettings::default()))?;
//! writer.append_value(Value::Record(vec![
//!     ("name".to_string(), "foo".into()),
//!     ("age".to_string(), 42.into()),
//! ]))?;
//! let file = writer.into_inner()?;
//!
//! for value in Reader::new(file.as_slice())? {
//!     assert_eq!(value?.field("age"), Some(&Value::Int(42)));
//! }
//! # Ok::<(), avro_codec::Error>(())
//! ```
//!
//! Host types can skip [`Value`](types::Value) by implementing [`AvroRecord`] and going through a
//! [`SpecificCodec`].
//!
//! Not supported: schema resolution between a writer and a reader schema, the JSON encoding,
//! single object encoding and logical types.
//!
//! # Features
//!
//! - `snappy`: enable support for the Snappy codec (on by default)
//!
//! # MSRV
//!
//! The current MSRV is 1.88.0.

mod binding;
mod codec;
mod datum;
mod decode;
mod encode;
mod reader;
mod writer;

pub mod error;
pub mod object_container;
pub mod schema;
pub mod types;
pub mod util;
pub mod validator;

pub use binding::{AvroRecord, FieldBinding, SpecificCodec};
pub use codec::{Codec, DeflateSettings};
pub use datum::DatumCodec;
pub use error::Error;
pub use object_container::read_marker;
pub use reader::{Block, BlockIterator, Reader, RecordDecoder, Records, from_avro_datum};
pub use schema::Schema;
pub use writer::{Writer, WriterBuilder, to_avro_datum};

/// A convenience type alias for `Result`s with `Error`s.
pub type AvroResult<T> = Result<T, Error>;
