// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Streaming compression over the byte stream written into (or read out of)
//! a virtual-disk container. Backed by zstd; level range `[1..22]` matches
//! the codec's valid range exactly, which is why this crate defers to it
//! rather than inventing its own scale.

use std::io::{self, Read, Write};

pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 22;
pub const DEFAULT_LEVEL: i32 = 3;

const STAGE_BUFFER_SIZE: usize = 80 * 1024;

/// Clamps an arbitrary requested level into `[1..22]`. The source this
/// engine is based on forwarded level 0 unchanged into the codec, which
/// zstd rejects; this crate clamps instead of erroring (see DESIGN.md, Open
/// Question 1).
pub fn clamp_level(requested: i32) -> i32 {
    requested.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Wraps `sink` in a streaming zstd encoder. The adapter does not take
/// ownership semantics beyond what's needed to flush/finish; the caller
/// remains responsible for the underlying sink's lifetime.
pub struct CompressingWriter<W: Write> {
    encoder: zstd::stream::Encoder<'static, W>,
}

impl<W: Write> CompressingWriter<W> {
    pub fn new(sink: W, level: i32) -> io::Result<Self> {
        let mut encoder = zstd::stream::Encoder::new(sink, clamp_level(level))?;
        encoder.set_pledged_src_size(None)?;
        Ok(CompressingWriter { encoder })
    }

    /// Finishes the zstd frame and returns the underlying sink without
    /// closing it.
    pub fn finish(self) -> io::Result<W> {
        self.encoder.finish()
    }
}

impl<W: Write> Write for CompressingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Wraps `source` in a streaming zstd decoder.
pub struct DecompressingReader<R: Read> {
    decoder: zstd::stream::Decoder<'static, io::BufReader<R>>,
}

impl<R: Read> DecompressingReader<R> {
    pub fn new(source: R) -> io::Result<Self> {
        Ok(DecompressingReader {
            decoder: zstd::stream::Decoder::new(source)?,
        })
    }
}

impl<R: Read> Read for DecompressingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

/// Streams every byte of `source` through compression at `level` into
/// `sink`, in `STAGE_BUFFER_SIZE` chunks, returning the number of
/// (uncompressed) bytes processed. Used by the backup engine's transfer
/// phase for each allocated range.
pub fn compress_stream<R: Read, W: Write>(
    mut source: R,
    sink: W,
    level: i32,
) -> io::Result<(u64, W)> {
    let mut writer = CompressingWriter::new(sink, level)?;
    let mut buffer = vec![0u8; STAGE_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = source.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }

    Ok((total, writer.finish()?))
}

/// Inverse of [`compress_stream`]: decompresses everything available from
/// `source` into `sink`, returning the number of decompressed bytes.
pub fn decompress_stream<R: Read, W: Write>(source: R, mut sink: W) -> io::Result<u64> {
    let mut reader = DecompressingReader::new(source)?;
    let mut buffer = vec![0u8; STAGE_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read])?;
        total += read as u64;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn clamps_out_of_range_levels() {
        assert_eq!(clamp_level(0), MIN_LEVEL);
        assert_eq!(clamp_level(-5), MIN_LEVEL);
        assert_eq!(clamp_level(100), MAX_LEVEL);
        assert_eq!(clamp_level(10), 10);
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(200);
        let mut compressed = Vec::new();
        let (written, _) = compress_stream(Cursor::new(&original), &mut compressed, 5).unwrap();
        assert_eq!(written as usize, original.len());

        let mut decompressed = Vec::new();
        let read = decompress_stream(Cursor::new(&compressed), &mut decompressed).unwrap();
        assert_eq!(read as usize, original.len());
        assert_eq!(decompressed, original);
    }

    #[test]
    fn round_trips_empty_input() {
        let mut compressed = Vec::new();
        compress_stream(Cursor::new(&[] as &[u8]), &mut compressed, DEFAULT_LEVEL).unwrap();

        let mut decompressed = Vec::new();
        decompress_stream(Cursor::new(&compressed), &mut decompressed).unwrap();
        assert!(decompressed.is_empty());
    }
}
