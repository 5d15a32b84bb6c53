// parse.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! GIF header parsing
use crate::error::Status;
use crate::header::{
    DisposalMethod, Frame, Header, COLOR_TABLE_LEN, LOOP_FOREVER,
};
use crate::reader::ByteReader;

/// Image separator block code (0x2C)
const IMAGE_SEPARATOR: u8 = b',';

/// Extension introducer block code (0x21)
const EXTENSION_INTRODUCER: u8 = b'!';

/// Trailer block code (0x3B)
const TRAILER: u8 = b';';

/// Graphic control extension code
const GRAPHIC_CONTROL: u8 = 0xF9;

/// Application extension code
const APPLICATION: u8 = 0xFF;

/// Minimum frame delay in hundredths of a second
const MIN_FRAME_DELAY_CS: u32 = 2;

/// Frame delay used for frames delayed less than the minimum
const DEFAULT_FRAME_DELAY_CS: u32 = 10;

/// Scratch size for extension sub-blocks
const MAX_BLOCK_SIZE: usize = 256;

/// Parser which builds a [Header](struct.Header.html) from raw GIF data.
///
/// ## Example
/// ```
/// # let gif = &[
/// #   0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00,
/// #   0x02, 0x00, 0x80, 0x01, 0x00, 0x00, 0x00, 0x00,
/// #   0xff, 0xff, 0xff, 0x2c, 0x00, 0x00, 0x00, 0x00,
/// #   0x02, 0x00, 0x02, 0x00, 0x00, 0x02, 0x03, 0x0c,
/// #   0x10, 0x05, 0x00, 0x3b,
/// # ][..];
/// use gifplay::HeaderParser;
///
/// let header = HeaderParser::new(gif).parse_header();
/// assert!(header.status().is_ok());
/// assert_eq!(header.frame_count(), 1);
/// ```
pub struct HeaderParser<'a> {
    /// Cursor over the raw data
    reader: ByteReader<'a>,
    /// Header being built
    header: Header,
    /// Frame started by a graphic control extension
    current_frame: Option<Frame>,
    /// Scratch for extension sub-blocks
    block: [u8; MAX_BLOCK_SIZE],
    /// Length of the last sub-block read into the scratch
    block_size: usize,
}

impl<'a> HeaderParser<'a> {
    /// Create a new header parser
    pub fn new(data: &'a [u8]) -> Self {
        HeaderParser {
            reader: ByteReader::new(data),
            header: Header::default(),
            current_frame: None,
            block: [0; MAX_BLOCK_SIZE],
            block_size: 0,
        }
    }

    /// Parse the header and all frame descriptors.
    ///
    /// Failures are recorded in the returned header's
    /// [status](struct.Header.html#method.status).
    pub fn parse_header(&mut self) -> Header {
        self.parse(usize::MAX)
    }

    /// Check whether the data holds an animated GIF, by parsing until a
    /// second frame is found
    pub fn is_animated(&mut self) -> bool {
        self.parse(2).frames.len() > 1
    }

    /// Parse the stream, stopping once more than `max_frames` frames have
    /// been read
    fn parse(&mut self, max_frames: usize) -> Header {
        self.reader.rewind();
        self.header = Header::default();
        self.current_frame = None;
        self.block = [0; MAX_BLOCK_SIZE];
        self.block_size = 0;
        self.read_header();
        if !self.err() {
            self.read_contents(max_frames);
        }
        if self.header.status.is_ok() {
            self.header.status = self.reader.status();
        }
        std::mem::take(&mut self.header)
    }

    /// Check whether a failure has been recorded
    fn err(&self) -> bool {
        !self.header.status.is_ok() || !self.reader.status().is_ok()
    }

    /// Read the signature, logical screen descriptor and global color table
    fn read_header(&mut self) {
        let mut signature = [0u8; 6];
        for b in signature.iter_mut() {
            *b = self.reader.read_u8();
        }
        if &signature[..3] != b"GIF" {
            self.header.status = Status::FormatError;
            return;
        }
        self.read_logical_screen_desc();
        if self.header.gct_flag && !self.err() {
            self.header.global_color_table =
                self.read_color_table(self.header.gct_size);
            if let Some(gct) = &self.header.global_color_table {
                self.header.bg_color = gct[self.header.bg_index as usize];
            }
        }
    }

    /// Read the logical screen descriptor
    fn read_logical_screen_desc(&mut self) {
        self.header.width = self.reader.read_u16_le();
        self.header.height = self.reader.read_u16_le();
        let packed = self.reader.read_u8();
        self.header.gct_flag = packed & 0x80 != 0;
        self.header.gct_size = 2 << (packed & 0x07);
        self.header.bg_index = self.reader.read_u8();
        self.header.pixel_aspect = self.reader.read_u8();
    }

    /// Read content blocks until the trailer, a failure, or the frame limit
    fn read_contents(&mut self, max_frames: usize) {
        let mut done = false;
        while !(done || self.err() || self.header.frames.len() > max_frames) {
            let code = self.reader.read_u8();
            match code {
                IMAGE_SEPARATOR => {
                    // the graphic control extension is optional; without
                    // one the frame takes defaults
                    if self.current_frame.is_none() {
                        self.current_frame = Some(Frame::default());
                    }
                    self.read_image_descriptor();
                }
                EXTENSION_INTRODUCER => match self.reader.read_u8() {
                    GRAPHIC_CONTROL => {
                        self.current_frame = Some(Frame::default());
                        self.read_graphic_control_ext();
                    }
                    APPLICATION => {
                        self.read_block();
                        if &self.block[..11] == b"NETSCAPE2.0" {
                            self.read_netscape_ext();
                        } else {
                            self.skip_sub_blocks();
                        }
                    }
                    // comment, plain text and unknown extensions
                    _ => self.skip_sub_blocks(),
                },
                TRAILER => done = true,
                _ => self.header.status = Status::FormatError,
            }
        }
    }

    /// Read a graphic control extension into the current frame
    fn read_graphic_control_ext(&mut self) {
        self.reader.read_u8(); // block size
        let packed = self.reader.read_u8();
        let mut delay_cs = self.reader.read_u16_le() as u32;
        if delay_cs < MIN_FRAME_DELAY_CS {
            delay_cs = DEFAULT_FRAME_DELAY_CS;
        }
        let transparent_index = self.reader.read_u8();
        self.reader.read_u8(); // block terminator
        if let Some(frame) = &mut self.current_frame {
            frame.dispose = DisposalMethod::from((packed & 0x1C) >> 2);
            frame.transparency = packed & 1 != 0;
            frame.delay_ms = delay_cs * 10;
            frame.transparent_index = transparent_index;
        }
    }

    /// Read an image descriptor and record where its image data starts
    fn read_image_descriptor(&mut self) {
        let mut frame = self.current_frame.take().unwrap_or_default();
        frame.left = self.reader.read_u16_le();
        frame.top = self.reader.read_u16_le();
        frame.width = self.reader.read_u16_le();
        frame.height = self.reader.read_u16_le();
        let packed = self.reader.read_u8();
        let lct_flag = packed & 0x80 != 0;
        let lct_size = 2usize << (packed & 0x07);
        frame.interlaced = packed & 0x40 != 0;
        frame.local_color_table = if lct_flag {
            self.read_color_table(lct_size)
        } else {
            None
        };
        frame.image_data_start = self.reader.position();
        self.skip_image_data();
        if self.err() {
            return;
        }
        self.header.frames.push(frame);
    }

    /// Read a netscape application extension for its loop count
    fn read_netscape_ext(&mut self) {
        loop {
            self.read_block();
            if self.block[0] == 1 {
                // loop count sub-block, zero meaning forever
                let b1 = self.block[1] as i32;
                let b2 = self.block[2] as i32;
                self.header.loop_count = b2 << 8 | b1;
                if self.header.loop_count == 0 {
                    self.header.loop_count = LOOP_FOREVER;
                }
            }
            if self.block_size == 0 || self.err() {
                break;
            }
        }
    }

    /// Read a color table as zero-padded packed ARGB
    fn read_color_table(
        &mut self,
        colors: usize,
    ) -> Option<Box<[u32; COLOR_TABLE_LEN]>> {
        let mut channels = [0u8; 3 * COLOR_TABLE_LEN];
        let n = colors.min(COLOR_TABLE_LEN);
        if !self.reader.read_exact_into(&mut channels[..3 * n]) {
            debug!("color table truncated, colors: {colors}");
            self.header.status = Status::FormatError;
            return None;
        }
        let mut table = Box::new([0u32; COLOR_TABLE_LEN]);
        for (i, rgb) in channels[..3 * n].chunks_exact(3).enumerate() {
            let r = rgb[0] as u32;
            let g = rgb[1] as u32;
            let b = rgb[2] as u32;
            table[i] = 0xFF00_0000 | r << 16 | g << 8 | b;
        }
        Some(table)
    }

    /// Skip a frame's LZW image data
    fn skip_image_data(&mut self) {
        self.reader.read_u8(); // LZW minimum code size
        self.skip_sub_blocks();
    }

    /// Skip sub-blocks up to and including the terminator
    fn skip_sub_blocks(&mut self) {
        loop {
            let n = self.reader.read_u8() as usize;
            self.reader.skip(n);
            if n == 0 || !self.reader.status().is_ok() {
                break;
            }
        }
    }

    /// Read one sub-block into the scratch
    fn read_block(&mut self) -> usize {
        self.block_size = self.reader.read_u8() as usize;
        let mut n = 0;
        if self.block_size > 0 {
            let sz = self.block_size;
            if self.reader.read_exact_into(&mut self.block[..sz]) {
                n = sz;
            } else {
                debug!("error reading block, size: {sz}");
                self.header.status = Status::FormatError;
            }
        }
        n
    }
}
