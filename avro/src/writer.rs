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

//! Logic handling writing in Avro format at user level.
use crate::{
    AvroResult, Codec, DatumCodec,
    binding::{AvroRecord, SpecificCodec},
    encode::encode_long,
    error::Details,
    object_container::{Header, SYNC_SIZE, generate_sync_marker},
    schema::Schema,
    types::Value,
};
use log::debug;
use std::{collections::HashMap, io::Write, mem::ManuallyDrop};

const DEFAULT_BLOCK_SIZE: usize = 16000;

/// Main interface for writing object container files.
///
/// Records are buffered and written as a block once the buffer holds `block_size` bytes, or when
/// [`flush`](Writer::flush) is called.
///
/// It is critical to call flush before `Writer<W>` is dropped. Though dropping will attempt to flush
/// the contents of the buffer, any errors that happen in the process of dropping will be ignored.
/// Calling flush ensures that the buffer is empty and thus dropping will not even attempt file operations.
pub struct Writer<'a, W: Write> {
    schema: &'a Schema,
    writer: W,
    datum_codec: DatumCodec,
    codec: Codec,
    block_size: usize,
    buffer: Vec<u8>,
    scratch: Vec<u8>,
    num_values: usize,
    marker: [u8; SYNC_SIZE],
    has_header: bool,
    /// Set when a write failed after part of a header or block reached `writer`.
    poisoned: bool,
    user_metadata: HashMap<String, Vec<u8>>,
}

#[bon::bon]
impl<'a, W: Write> Writer<'a, W> {
    #[builder]
    pub fn builder(
        schema: &'a Schema,
        writer: W,
        /// Reuse a codec already compiled from `schema`.
        ///
        /// A codec compiled from any other schema is rejected with
        /// [`Details::CodecSchemaMismatch`].
        datum_codec: Option<DatumCodec>,
        #[builder(default = Codec::Null)] codec: Codec,
        #[builder(default = DEFAULT_BLOCK_SIZE)] block_size: usize,
        #[builder(default = generate_sync_marker())] marker: [u8; SYNC_SIZE],
        /// Has the header already been written.
        ///
        /// To disable writing the header, this can be set to `true`.
        #[builder(default = false)]
        has_header: bool,
        #[builder(default)] user_metadata: HashMap<String, Vec<u8>>,
    ) -> AvroResult<Self> {
        if let Some(key) = user_metadata.keys().find(|key| key.starts_with("avro.")) {
            return Err(Details::InvalidMetadataKey(key.clone()).into());
        }
        let datum_codec = match datum_codec {
            Some(datum_codec) if datum_codec.schema() != schema => {
                return Err(Details::CodecSchemaMismatch.into());
            }
            Some(datum_codec) => datum_codec,
            None => DatumCodec::compile(schema)?,
        };
        debug!(
            "Writing {} blocks of up to {block_size} bytes",
            <&str>::from(codec)
        );
        Ok(Self {
            schema,
            writer,
            datum_codec,
            codec,
            block_size,
            buffer: Vec::with_capacity(block_size.min(DEFAULT_BLOCK_SIZE)),
            scratch: Vec::new(),
            num_values: 0,
            marker,
            has_header,
            poisoned: false,
            user_metadata,
        })
    }
}

impl<'a, W: Write> Writer<'a, W> {
    /// Creates a `Writer` given a `Schema` and something implementing the `io::Write` trait to write
    /// to.
    /// No compression `Codec` will be used.
    pub fn new(schema: &'a Schema, writer: W) -> AvroResult<Self> {
        Writer::with_codec(schema, writer, Codec::Null)
    }

    /// Creates a `Writer` with a specific `Codec` given a `Schema` and something implementing the
    /// `io::Write` trait to write to.
    pub fn with_codec(schema: &'a Schema, writer: W, codec: Codec) -> AvroResult<Self> {
        Self::builder()
            .schema(schema)
            .writer(writer)
            .codec(codec)
            .build()
    }

    /// Creates a `Writer` that will append blocks to an already populated file, using the
    /// `marker` from its header.
    ///
    /// `codec` must be the codec named in that header.
    pub fn append_to(
        schema: &'a Schema,
        writer: W,
        codec: Codec,
        marker: [u8; SYNC_SIZE],
    ) -> AvroResult<Self> {
        Self::builder()
            .schema(schema)
            .writer(writer)
            .codec(codec)
            .marker(marker)
            .has_header(true)
            .build()
    }

    /// Get a reference to the `Schema` associated to a `Writer`.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn datum_codec(&self) -> &DatumCodec {
        &self.datum_codec
    }

    /// The sync marker written after every block.
    pub fn marker(&self) -> &[u8; SYNC_SIZE] {
        &self.marker
    }

    /// Append a value to the `Writer`.
    ///
    /// Returns the number of bytes written (it might be 0, see below).
    ///
    /// **NOTE**: This function is not guaranteed to perform any actual write, since it relies on
    /// internal buffering for performance reasons. If you want to be sure the value has been
    /// written, then call [`flush`](Writer::flush).
    pub fn append_value<T: Into<Value>>(&mut self, value: T) -> AvroResult<usize> {
        let value = value.into();
        self.append_value_ref(&value)
    }

    /// Append a value to the `Writer`.
    ///
    /// A value that fails to encode leaves the pending block untouched.
    pub fn append_value_ref(&mut self, value: &Value) -> AvroResult<usize> {
        let n = self.maybe_write_header()?;
        self.scratch.clear();
        self.datum_codec.encode(value, &mut self.scratch)?;
        self.push_scratch(n)
    }

    /// Append a host record through `codec`, which must be bound to the schema of this writer.
    ///
    /// # Errors
    /// [`Details::CodecSchemaMismatch`] when `codec` was compiled from another schema.
    pub fn append<T: AvroRecord>(
        &mut self,
        codec: &SpecificCodec<T>,
        record: &T,
    ) -> AvroResult<usize> {
        if !codec.datum_codec().same_schema(&self.datum_codec) {
            return Err(Details::CodecSchemaMismatch.into());
        }
        let n = self.maybe_write_header()?;
        self.scratch.clear();
        codec.encode(record, &mut self.scratch)?;
        self.push_scratch(n)
    }

    /// Extend a `Writer` with an `Iterator` of values.
    ///
    /// Returns the number of bytes written.
    ///
    /// **NOTE**: This function forces the written data to be flushed (an implicit
    /// call to [`flush`](Writer::flush) is performed).
    pub fn extend<I, T: Into<Value>>(&mut self, values: I) -> AvroResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let mut num_bytes = 0;
        for value in values {
            num_bytes += self.append_value(value)?;
        }
        num_bytes += self.flush()?;

        Ok(num_bytes)
    }

    fn push_scratch(&mut self, header_bytes: usize) -> AvroResult<usize> {
        self.buffer.extend_from_slice(&self.scratch);
        self.num_values += 1;

        if self.buffer.len() >= self.block_size {
            return self.flush().map(|b| b + header_bytes);
        }

        Ok(header_bytes)
    }

    /// Flush the content to the inner `Writer`.
    ///
    /// Call this function to make sure all the content has been written before releasing the `Writer`.
    /// This will also write the header if it wasn't written yet and hasn't been disabled using
    /// [`WriterBuilder::has_header`].
    ///
    /// Returns the number of bytes written.
    ///
    /// The pending block is kept when compression fails. When writing it fails part way, the
    /// writer is poisoned: every later call fails with [`Details::WriterPoisoned`] and dropping
    /// it writes nothing.
    pub fn flush(&mut self) -> AvroResult<usize> {
        let mut num_bytes = self.maybe_write_header()?;
        if self.num_values == 0 {
            return Ok(num_bytes);
        }

        let payload = match self.codec {
            Codec::Null => &self.buffer,
            codec => {
                self.scratch.clear();
                self.scratch.extend_from_slice(&self.buffer);
                codec.compress(&mut self.scratch)?;
                &self.scratch
            }
        };
        match write_block(&mut self.writer, self.num_values, payload, &self.marker) {
            Ok(n) => num_bytes += n,
            Err(e) => {
                self.poisoned = true;
                return Err(e);
            }
        }

        self.buffer.clear();
        self.num_values = 0;

        self.writer.flush().map_err(Details::FlushWriter)?;

        Ok(num_bytes)
    }

    /// Return what the `Writer` is writing to, consuming the `Writer` itself.
    ///
    /// **NOTE**: This function forces the written data to be flushed (an implicit
    /// call to [`flush`](Writer::flush) is performed).
    pub fn into_inner(mut self) -> AvroResult<W> {
        self.flush()?;

        let mut this = ManuallyDrop::new(self);

        // Extract every member that is not Copy and therefore should be dropped
        let _buffer = std::mem::take(&mut this.buffer);
        let _scratch = std::mem::take(&mut this.scratch);
        let _user_metadata = std::mem::take(&mut this.user_metadata);
        // SAFETY: the codec is not accessed after this and won't be dropped again because of ManuallyDrop
        unsafe { std::ptr::drop_in_place(&mut this.datum_codec) };

        // SAFETY: double-drops are prevented by putting `this` in a ManuallyDrop that is never dropped
        let writer = unsafe { std::ptr::read(&this.writer) };

        Ok(writer)
    }

    /// Gets a reference to the underlying writer.
    ///
    /// **NOTE**: There is likely data still in the buffer. To have all the data
    /// in the writer call [`flush`](Writer::flush) first.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Gets a mutable reference to the underlying writer.
    ///
    /// It is inadvisable to directly write to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Adds custom metadata to the file.
    /// This method could be used only before adding the first record to the writer.
    pub fn add_user_metadata<T: AsRef<[u8]>>(&mut self, key: String, value: T) -> AvroResult<()> {
        if !self.has_header {
            if key.starts_with("avro.") {
                return Err(Details::InvalidMetadataKey(key).into());
            }
            self.user_metadata.insert(key, value.as_ref().to_vec());
            Ok(())
        } else {
            Err(Details::FileHeaderAlreadyWritten.into())
        }
    }

    fn maybe_write_header(&mut self) -> AvroResult<usize> {
        if self.poisoned {
            return Err(Details::WriterPoisoned.into());
        }
        if !self.has_header {
            let header = Header::new(self.schema, self.codec, &self.user_metadata, self.marker)?;
            let n = header.write(&mut self.writer).inspect_err(|_| self.poisoned = true)?;
            self.has_header = true;
            Ok(n)
        } else {
            Ok(0)
        }
    }
}

fn write_block<W: Write>(
    writer: &mut W,
    num_values: usize,
    payload: &[u8],
    marker: &[u8; SYNC_SIZE],
) -> AvroResult<usize> {
    let mut written = 0;
    for n in [num_values, payload.len()] {
        let n = i64::try_from(n).map_err(|e| Details::ConvertUsizeToI64(e, n))?;
        written += encode_long(n, writer)?;
    }
    writer.write_all(payload).map_err(Details::WriteBytes)?;
    writer.write_all(marker).map_err(Details::WriteMarker)?;
    Ok(written + payload.len() + SYNC_SIZE)
}

impl<W: Write> Drop for Writer<'_, W> {
    /// Drop the writer, will try to flush ignoring any errors.
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Encode a value into raw Avro data.
///
/// **NOTE**: This function has a quite small niche of usage and does NOT generate headers and sync
/// markers; use [`Writer`] to be fully Avro-compatible if you don't know what
/// you are doing, instead. Compiling the schema on every call is wasteful, so reuse a
/// [`DatumCodec`] when encoding many values.
pub fn to_avro_datum<T: Into<Value>>(schema: &Schema, value: T) -> AvroResult<Vec<u8>> {
    DatumCodec::compile(schema)?.encode_to_vec(&value.into())
}
