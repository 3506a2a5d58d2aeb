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
    AvroResult, Codec, DatumCodec, Error,
    binding::{AvroRecord, SpecificCodec},
    decode::decode_bytes,
    error::Details,
    object_container::SYNC_SIZE,
    types::Value,
    util,
};
use std::io::Read;

/// Decodes the records stored in a [`Block`].
pub trait RecordDecoder {
    type Output;

    fn decode_record(&self, reader: &mut &[u8]) -> AvroResult<Self::Output>;
}

impl RecordDecoder for DatumCodec {
    type Output = Value;

    fn decode_record(&self, reader: &mut &[u8]) -> AvroResult<Value> {
        self.decode(reader)
    }
}

impl<T: AvroRecord> RecordDecoder for SpecificCodec<T> {
    type Output = T;

    fn decode_record(&self, reader: &mut &[u8]) -> AvroResult<T> {
        self.decode(reader)
    }
}

/// One decompressed block of an object container file.
///
/// A block owns its payload, so blocks found by one thread can be decoded on others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    index: usize,
    object_count: usize,
    data: Vec<u8>,
}

impl Block {
    /// The position of this block in the file, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The number of records in this block.
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// The decompressed payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Decode the records of this block in order.
    ///
    /// Yields exactly [`object_count`](Block::object_count) records, or stops at the first error.
    /// A payload that runs out early or has bytes left after the last record is reported as
    /// [`Details::BlockObjectCount`].
    pub fn records<'b, D: RecordDecoder>(&'b self, decoder: &'b D) -> Records<'b, D> {
        Records {
            block: self,
            decoder,
            cursor: RecordCursor::default(),
        }
    }
}

/// Position of the next record in a block.
#[derive(Debug, Default)]
pub(super) struct RecordCursor {
    position: usize,
    decoded: usize,
    done: bool,
}

impl RecordCursor {
    pub(super) fn next<D: RecordDecoder>(
        &mut self,
        block: &Block,
        decoder: &D,
    ) -> Option<AvroResult<D::Output>> {
        if self.done {
            return None;
        }
        let mut remaining = &block.data[self.position..];
        if self.decoded == block.object_count {
            self.done = true;
            return if remaining.is_empty() {
                None
            } else {
                Some(Err(self.count_mismatch(block, remaining.len())))
            };
        }

        let was_empty = remaining.is_empty();
        match decoder.decode_record(&mut remaining) {
            Ok(record) => {
                self.position = block.data.len() - remaining.len();
                self.decoded += 1;
                Some(Ok(record))
            }
            Err(_) if was_empty => {
                self.done = true;
                Some(Err(self.count_mismatch(block, 0)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.in_block(block.index)))
            }
        }
    }

    fn count_mismatch(&self, block: &Block, remaining: usize) -> Error {
        Error::from(Details::BlockObjectCount {
            expected: block.object_count,
            decoded: self.decoded,
            remaining,
        })
        .in_block(block.index)
    }
}

/// The records of one [`Block`].
pub struct Records<'b, D> {
    block: &'b Block,
    decoder: &'b D,
    cursor: RecordCursor,
}

impl<D: RecordDecoder> Iterator for Records<'_, D> {
    type Item = AvroResult<D::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.block, self.decoder)
    }
}

/// Reads the blocks of an object container file, one at a time.
///
/// Iteration ends without an error when the input ends right before a block. After any error,
/// most importantly a sync marker that does not match the header, no more blocks are read.
pub struct BlockIterator<R> {
    reader: R,
    sync: [u8; SYNC_SIZE],
    codec: Codec,
    next_index: usize,
    finished: bool,
}

impl<R: Read> BlockIterator<R> {
    /// Read blocks from `reader`, which must be positioned right after the header.
    pub fn new(reader: R, sync: [u8; SYNC_SIZE], codec: Codec) -> Self {
        Self {
            reader,
            sync,
            codec,
            next_index: 0,
            finished: false,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    fn read_block(&mut self, object_count: i64) -> AvroResult<Block> {
        if object_count < 0 {
            return Err(Details::NegativeBlockCount(object_count).into());
        }
        let object_count = usize::try_from(object_count)
            .map_err(|e| Details::ConvertI64ToUsize(e, object_count))?;
        let object_count = util::safe_len(object_count)?;

        let mut data = decode_bytes(&mut self.reader)?;

        let mut marker = [0u8; SYNC_SIZE];
        self.reader
            .read_exact(&mut marker)
            .map_err(Details::ReadBlockMarker)?;
        if marker != self.sync {
            return Err(Details::GetBlockMarker.into());
        }

        self.codec.decompress(&mut data)?;
        Ok(Block {
            index: self.next_index,
            object_count,
            data,
        })
    }
}

impl<R: Read> Iterator for BlockIterator<R> {
    type Item = AvroResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let index = self.next_index;
        let block = match util::read_long_or_eof(&mut self.reader) {
            Ok(None) => {
                self.finished = true;
                return None;
            }
            Ok(Some(object_count)) => self.read_block(object_count),
            Err(e) => Err(e),
        };
        match block {
            Ok(block) => {
                self.next_index += 1;
                Some(Ok(block))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e.in_block(index)))
            }
        }
    }
}
