// lzw.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Lempel-Ziv-Welch decompression for GIF image data
use crate::error::Status;
use crate::provider::BufferProvider;
use crate::reader::BlockReader;

/// Maximum size of the code dictionary
const MAX_STACK_SIZE: usize = 4096;

/// LZW data decompressor.
///
/// The dictionary is a pair of (prefix code, suffix byte) arrays, and
/// decoded strings are unwound through a pixel stack.  The code width grows
/// with the dictionary using the increment rule of widely deployed GIF
/// renderers (`code_mask += available` rather than recomputing the mask from
/// the code size); some real-world streams depend on matching that rule
/// bit-for-bit.
pub(crate) struct Decompressor {
    /// Prefix code for each dictionary entry
    prefix: Vec<u16>,
    /// Suffix byte for each dictionary entry
    suffix: Vec<u8>,
    /// Stack of decoded bytes awaiting output
    pixel_stack: Vec<u8>,
}

impl Decompressor {
    /// Create a new decompressor
    pub fn new() -> Self {
        Decompressor {
            prefix: vec![0; MAX_STACK_SIZE],
            suffix: vec![0; MAX_STACK_SIZE],
            pixel_stack: vec![0; MAX_STACK_SIZE + 1],
        }
    }

    /// Decode one frame's image data into `pixels`.
    ///
    /// The reader must be positioned at the frame's LZW minimum code size
    /// byte, and `pixels` must hold at least `n_pix` bytes.  Exactly `n_pix`
    /// palette indices are produced; whatever cannot be decoded is
    /// zero-filled and reported as `PartialDecode`.
    pub fn decode<P: BufferProvider>(
        &mut self,
        reader: &mut BlockReader,
        data: &[u8],
        provider: &P,
        n_pix: usize,
        pixels: &mut [u8],
    ) -> Status {
        let mut status = Status::Ok;
        let data_size = reader.read_byte(data, provider) as usize;
        if data_size >= 12 {
            // cannot form a valid dictionary
            pixels[..n_pix].fill(0);
            return Status::PartialDecode;
        }
        let clear = 1usize << data_size;
        let end_of_information = clear + 1;
        let mut available = clear + 2;
        let mut old_code: Option<usize> = None;
        let mut code_size = data_size + 1;
        let mut code_mask = (1usize << code_size) - 1;
        for code in 0..clear {
            self.prefix[code] = 0;
            self.suffix[code] = code as u8;
        }
        let mut datum = 0usize;
        let mut bits = 0usize;
        let mut count = 0usize;
        let mut first = 0u8;
        let mut top = 0usize;
        let mut pi = 0usize;
        let mut bi = 0usize;
        let mut i = 0usize;
        'decode: while i < n_pix {
            if count == 0 {
                // load the next sub-block
                count = reader.read_block(data, provider);
                if count == 0 {
                    status = Status::PartialDecode;
                    break;
                }
                bi = 0;
            }
            datum += (reader.block()[bi] as usize) << bits;
            bits += 8;
            bi += 1;
            count -= 1;
            while bits >= code_size {
                let mut code = datum & code_mask;
                datum >>= code_size;
                bits -= code_size;
                if code == clear {
                    // reset the dictionary
                    code_size = data_size + 1;
                    code_mask = (1 << code_size) - 1;
                    available = clear + 2;
                    old_code = None;
                    continue;
                }
                if code > available {
                    status = Status::PartialDecode;
                    break 'decode;
                }
                if code == end_of_information {
                    break 'decode;
                }
                let prev = match old_code {
                    None => {
                        self.pixel_stack[top] = self.suffix[code];
                        top += 1;
                        old_code = Some(code);
                        first = code as u8;
                        continue;
                    }
                    Some(prev) => prev,
                };
                let in_code = code;
                if code >= available {
                    self.pixel_stack[top] = first;
                    top += 1;
                    code = prev;
                }
                while code >= clear {
                    self.pixel_stack[top] = self.suffix[code];
                    top += 1;
                    code = self.prefix[code] as usize;
                }
                first = self.suffix[code];
                self.pixel_stack[top] = first;
                top += 1;
                if available < MAX_STACK_SIZE {
                    self.prefix[available] = prev as u16;
                    self.suffix[available] = first;
                    available += 1;
                    if available & code_mask == 0 && available < MAX_STACK_SIZE {
                        code_size += 1;
                        code_mask += available;
                    }
                }
                old_code = Some(in_code);
                while top > 0 {
                    // pop decoded bytes off the pixel stack
                    top -= 1;
                    if pi < pixels.len() {
                        pixels[pi] = self.pixel_stack[top];
                    }
                    pi += 1;
                    i += 1;
                }
            }
        }
        // clear whatever could not be decoded
        pixels[pi.min(n_pix)..n_pix].fill(0);
        status
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::SimpleProvider;

    // 10x10 two-color diagonal test image
    const IMAGE_DATA: &[u8] = &[
        0x02, 0x16, 0x8C, 0x2D, 0x99, 0x87, 0x2A, 0x1C, 0xDC, 0x33, 0xA0,
        0x02, 0x75, 0xEC, 0x95, 0xFA, 0xA8, 0xDE, 0x60, 0x8C, 0x04, 0x91,
        0x4C, 0x01, 0x00,
    ];

    #[rustfmt::skip]
    const IMAGE: &[u8] = &[
        1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
        1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
        1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
        1, 1, 1, 0, 0, 0, 0, 2, 2, 2,
        1, 1, 1, 0, 0, 0, 0, 2, 2, 2,
        2, 2, 2, 0, 0, 0, 0, 1, 1, 1,
        2, 2, 2, 0, 0, 0, 0, 1, 1, 1,
        2, 2, 2, 2, 2, 1, 1, 1, 1, 1,
        2, 2, 2, 2, 2, 1, 1, 1, 1, 1,
        2, 2, 2, 2, 2, 1, 1, 1, 1, 1,
    ];

    #[test]
    fn decode_simple() {
        let provider = SimpleProvider;
        let mut reader = BlockReader::new();
        let mut dec = Decompressor::new();
        let mut pixels = vec![0xFF; 100];
        reader.seek(0);
        let status =
            dec.decode(&mut reader, IMAGE_DATA, &provider, 100, &mut pixels);
        assert_eq!(status, Status::Ok);
        assert_eq!(&pixels[..], IMAGE);
    }

    #[test]
    fn decode_is_repeatable() {
        let provider = SimpleProvider;
        let mut reader = BlockReader::new();
        let mut dec = Decompressor::new();
        let mut a = vec![0; 100];
        let mut b = vec![0; 100];
        reader.seek(0);
        dec.decode(&mut reader, IMAGE_DATA, &provider, 100, &mut a);
        reader.seek(0);
        dec.decode(&mut reader, IMAGE_DATA, &provider, 100, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_stream() {
        // same stream cut to four data bytes, chain properly terminated
        let data = [0x02, 0x04, 0x8C, 0x2D, 0x99, 0x87, 0x00];
        let provider = SimpleProvider;
        let mut reader = BlockReader::new();
        let mut dec = Decompressor::new();
        let mut pixels = vec![0xFF; 100];
        reader.seek(0);
        let status = dec.decode(&mut reader, &data, &provider, 100, &mut pixels);
        assert_eq!(status, Status::PartialDecode);
        assert_eq!(&pixels[..16], &IMAGE[..16]);
        assert!(pixels[16..].iter().all(|&p| p == 0));
    }

    #[test]
    fn empty_stream() {
        let data = [0x02];
        let provider = SimpleProvider;
        let mut reader = BlockReader::new();
        let mut dec = Decompressor::new();
        let mut pixels = vec![0xFF; 4];
        reader.seek(0);
        let status = dec.decode(&mut reader, &data, &provider, 4, &mut pixels);
        assert_eq!(status, Status::PartialDecode);
        assert_eq!(&pixels[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn invalid_code_size() {
        let data = [0x0C, 0x01, 0xAA, 0x00];
        let provider = SimpleProvider;
        let mut reader = BlockReader::new();
        let mut dec = Decompressor::new();
        let mut pixels = vec![0xFF; 4];
        reader.seek(0);
        let status = dec.decode(&mut reader, &data, &provider, 4, &mut pixels);
        assert_eq!(status, Status::PartialDecode);
        assert_eq!(&pixels[..], &[0, 0, 0, 0]);
    }
}
