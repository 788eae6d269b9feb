//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! MCCP compression pipeline
//!
//! Each direction of a connection carries one transform: identity until the
//! matching option is negotiated, then a zlib stream. MCCP2 compresses what
//! the server sends, MCCP3 decompresses what the client sends.

use crate::error::CompressionError;
use bytes::BytesMut;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tracing::debug;

const OUTPUT_CHUNK: usize = 4096;

/// Direction of a compression transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to client (MCCP2)
    Outbound,

    /// Client to server (MCCP3)
    Inbound,
}

enum OutboundTransform {
    Identity,
    Zlib(Box<Compress>),
}

enum InboundTransform {
    Identity,
    Zlib(Box<Decompress>),
}

/// Per-connection pair of compression transforms
pub struct CompressionPipeline {
    outbound: OutboundTransform,
    inbound: InboundTransform,
}

impl Default for CompressionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionPipeline {
    /// Create a pipeline with both directions passing data through untouched
    pub fn new() -> Self {
        Self {
            outbound: OutboundTransform::Identity,
            inbound: InboundTransform::Identity,
        }
    }

    /// Whether a zlib stream is active in `direction`
    pub fn is_active(&self, direction: Direction) -> bool {
        match direction {
            Direction::Outbound => matches!(self.outbound, OutboundTransform::Zlib(_)),
            Direction::Inbound => matches!(self.inbound, InboundTransform::Zlib(_)),
        }
    }

    /// Install a zlib stream in `direction`
    ///
    /// Returns `false` without touching the existing stream if one is active.
    pub fn enable(&mut self, direction: Direction) -> bool {
        if self.is_active(direction) {
            return false;
        }
        match direction {
            Direction::Outbound => {
                self.outbound =
                    OutboundTransform::Zlib(Box::new(Compress::new(Compression::best(), true)));
            }
            Direction::Inbound => {
                self.inbound = InboundTransform::Zlib(Box::new(Decompress::new(true)));
            }
        }
        debug!(?direction, "Compression enabled");
        true
    }

    /// Remove the zlib stream in `direction`
    ///
    /// An outbound stream is finished first; its trailer is appended to `dst`
    /// and must still reach the client.
    pub fn disable(&mut self, direction: Direction, dst: &mut BytesMut) -> Result<bool, CompressionError> {
        match direction {
            Direction::Outbound => {
                match std::mem::replace(&mut self.outbound, OutboundTransform::Identity) {
                    OutboundTransform::Identity => return Ok(false),
                    OutboundTransform::Zlib(mut compress) => {
                        deflate(&mut compress, &[], FlushCompress::Finish, dst)?;
                    }
                }
            }
            Direction::Inbound => {
                if let InboundTransform::Identity =
                    std::mem::replace(&mut self.inbound, InboundTransform::Identity)
                {
                    return Ok(false);
                }
            }
        }
        debug!(?direction, "Compression disabled");
        Ok(true)
    }

    /// Run outgoing bytes through the outbound transform into `dst`
    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut) -> Result<(), CompressionError> {
        match &mut self.outbound {
            OutboundTransform::Identity => dst.extend_from_slice(data),
            OutboundTransform::Zlib(compress) => {
                if !data.is_empty() {
                    deflate(compress, data, FlushCompress::Sync, dst)?;
                }
            }
        }
        Ok(())
    }

    /// Run incoming bytes through the inbound transform into `dst`
    ///
    /// When the client ends its zlib stream the transform reverts to identity
    /// and any bytes after the end of the stream are copied through as plain.
    pub fn decode(&mut self, data: &[u8], dst: &mut BytesMut) -> Result<(), CompressionError> {
        match &mut self.inbound {
            InboundTransform::Identity => dst.extend_from_slice(data),
            InboundTransform::Zlib(decompress) => {
                let (consumed, finished) = inflate(decompress, data, dst)?;
                if finished {
                    debug!(trailing = data.len() - consumed, "Inbound compression stream ended");
                    self.inbound = InboundTransform::Identity;
                    dst.extend_from_slice(&data[consumed..]);
                }
            }
        }
        Ok(())
    }
}

fn reserve_output(output: &mut Vec<u8>) {
    if output.capacity() - output.len() < OUTPUT_CHUNK / 4 {
        output.reserve(OUTPUT_CHUNK);
    }
}

fn deflate(
    compress: &mut Compress,
    input: &[u8],
    flush: FlushCompress,
    dst: &mut BytesMut,
) -> Result<(), CompressionError> {
    let mut output = Vec::with_capacity(input.len() / 2 + OUTPUT_CHUNK / 4);
    let mut consumed = 0usize;
    loop {
        reserve_output(&mut output);
        let before = compress.total_in();
        let status = compress.compress_vec(&input[consumed..], &mut output, flush)?;
        consumed += (compress.total_in() - before) as usize;
        match status {
            Status::StreamEnd | Status::BufError => break,
            Status::Ok if consumed == input.len() && output.len() < output.capacity() => break,
            Status::Ok => {}
        }
    }
    dst.extend_from_slice(&output);
    Ok(())
}

/// Returns the input consumed and whether the stream ended
fn inflate(
    decompress: &mut Decompress,
    input: &[u8],
    dst: &mut BytesMut,
) -> Result<(usize, bool), CompressionError> {
    let mut output = Vec::with_capacity(input.len() * 4 + OUTPUT_CHUNK / 4);
    let mut consumed = 0usize;
    let finished = loop {
        reserve_output(&mut output);
        let before_in = decompress.total_in();
        let before_out = decompress.total_out();
        let status = decompress.decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)?;
        consumed += (decompress.total_in() - before_in) as usize;
        let progressed =
            decompress.total_in() != before_in || decompress.total_out() != before_out;
        match status {
            Status::StreamEnd => break true,
            _ if consumed == input.len() && output.len() < output.capacity() => break false,
            _ if !progressed => break false,
            _ => {}
        }
    };
    dst.extend_from_slice(&output);
    Ok((consumed, finished))
}
