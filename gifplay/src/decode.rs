// decode.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Animated GIF frame decoding
use crate::error::Status;
use crate::header::{
    DisposalMethod, Frame, Header, COLOR_TABLE_LEN, LOOP_FOREVER,
};
use crate::lzw::Decompressor;
use crate::parse::HeaderParser;
use crate::provider::{BufferProvider, Raster, RasterFormat, SimpleProvider};
use crate::reader::BlockReader;
use crate::render::{self, Canvas};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Frame pointer value before the first advance
const INITIAL_FRAME_POINTER: i32 = -1;

/// Bytes per scratch canvas pixel
const BYTES_PER_INTEGER: usize = 4;

/// Animated GIF decoder.
///
/// Holds a fully buffered GIF and renders one frame at a time, applying the
/// previous frame's disposal before compositing.  The animation is moved
/// forward with [advance](struct.Decoder.html#method.advance), which must be
/// called before requesting the first frame; display timing is up to the
/// caller, using the frame [delay](struct.Decoder.html#method.delay)s.
///
/// All entry points are serialized by a per-instance mutex, so a decoder may
/// be driven from an animation worker while other threads query it.
///
/// ## Example: render the first frame
/// ```
/// # let gif = &[
/// #   0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00,
/// #   0x02, 0x00, 0x80, 0x01, 0x00, 0x00, 0x00, 0x00,
/// #   0xff, 0xff, 0xff, 0x2c, 0x00, 0x00, 0x00, 0x00,
/// #   0x02, 0x00, 0x02, 0x00, 0x00, 0x02, 0x03, 0x0c,
/// #   0x10, 0x05, 0x00, 0x3b,
/// # ][..];
/// use gifplay::Decoder;
///
/// let decoder = Decoder::default();
/// decoder.read(gif);
/// if decoder.advance() {
///     if let Some(raster) = decoder.get_current_frame() {
///         // ... draw the raster
///     }
/// }
/// ```
pub struct Decoder<P: BufferProvider = SimpleProvider> {
    inner: Mutex<Inner<P>>,
}

/// Decoder state behind the per-instance mutex
struct Inner<P: BufferProvider> {
    /// Buffer provider
    provider: P,
    /// Parsed header, shareable between decoders
    header: Arc<Header>,
    /// Raw GIF data
    raw: Arc<[u8]>,
    /// Sub-block reader over the raw data
    reader: BlockReader,
    /// LZW decompressor
    lzw: Decompressor,
    /// Indexed pixels of the current frame
    main_pixels: Vec<u8>,
    /// ARGB scratch canvas, downsampled screen size
    main_scratch: Vec<u32>,
    /// Current frame index, or -1 before the first advance
    frame_pointer: i32,
    /// Completed animation loops
    loop_index: u32,
    /// Decoder status
    status: Status,
    /// Downsampling factor (power of two)
    sample_size: usize,
    /// Downsampled screen width
    downsampled_width: usize,
    /// Downsampled screen height
    downsampled_height: usize,
    /// Canvas snapshot for restoring after `DisposalMethod::Previous`
    previous_image: Option<Raster>,
    /// Whether any frame requires the canvas snapshot
    save_previous: bool,
    /// Whether the first frame produced transparent pixels
    first_frame_transparent: bool,
}

/// Round down to the highest power of two
fn highest_one_bit(n: usize) -> usize {
    debug_assert!(n > 0);
    1 << (usize::BITS - 1 - n.leading_zeros())
}

impl Default for Decoder<SimpleProvider> {
    fn default() -> Self {
        Decoder::new(SimpleProvider)
    }
}

impl<P: BufferProvider> Decoder<P> {
    /// Create a new decoder with a buffer provider
    pub fn new(provider: P) -> Self {
        Decoder {
            inner: Mutex::new(Inner {
                provider,
                header: Arc::new(Header::default()),
                raw: Arc::new([]),
                reader: BlockReader::new(),
                lzw: Decompressor::new(),
                main_pixels: Vec::new(),
                main_scratch: Vec::new(),
                frame_pointer: INITIAL_FRAME_POINTER,
                loop_index: 0,
                status: Status::Ok,
                sample_size: 1,
                downsampled_width: 0,
                downsampled_height: 0,
                previous_image: None,
                save_previous: false,
                first_frame_transparent: false,
            }),
        }
    }

    /// Lock the decoder state, recovering from a poisoned mutex
    fn lock(&self) -> MutexGuard<'_, Inner<P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a GIF from a byte buffer.
    ///
    /// Parses the header and prepares for decoding with no downsampling.
    pub fn read(&self, data: &[u8]) -> Status {
        let mut inner = self.lock();
        if data.is_empty() {
            inner.status = Status::OpenError;
            return inner.status;
        }
        let header = Arc::new(HeaderParser::new(data).parse_header());
        inner.set_data(header, Arc::from(data), 1);
        inner.status
    }

    /// Read a GIF from a stream, buffering it fully.
    ///
    /// A positive `content_length` pre-sizes the buffer.
    pub fn read_from<R: Read>(
        &self,
        mut reader: R,
        content_length: usize,
    ) -> Status {
        let capacity = if content_length > 0 {
            content_length + 4096
        } else {
            16384
        };
        let mut data = Vec::with_capacity(capacity);
        match reader.read_to_end(&mut data) {
            Ok(_) => self.read(&data),
            Err(e) => {
                warn!("error reading data from stream: {e}");
                let mut inner = self.lock();
                inner.status = Status::OpenError;
                inner.status
            }
        }
    }

    /// Prepare to decode with an already-parsed header.
    ///
    /// The header and raw data may be shared with other decoders rendering
    /// the same GIF.  The sample size is clamped to its highest power of
    /// two bit; output rasters have dimensions `width / sample_size` by
    /// `height / sample_size`.
    pub fn set_data(
        &self,
        header: Arc<Header>,
        data: Arc<[u8]>,
        sample_size: usize,
    ) {
        self.lock().set_data(header, data, sample_size);
    }

    /// Move the animation frame pointer forward.
    ///
    /// Returns `false` once the loop count has been fulfilled.
    pub fn advance(&self) -> bool {
        self.lock().advance()
    }

    /// Decode and composite the current frame.
    ///
    /// [advance](struct.Decoder.html#method.advance) must have been called
    /// at least once first; otherwise a format error is recorded and `None`
    /// is returned.  The raster is transferred to the caller, which should
    /// hand it back to the buffer provider when done with it.
    pub fn get_current_frame(&self) -> Option<Raster> {
        self.lock().get_current_frame()
    }

    /// Get the display duration of frame `n` in milliseconds, or -1 if
    /// there is no such frame
    pub fn delay(&self, n: i32) -> i32 {
        self.lock().delay(n)
    }

    /// Get the display duration of the current frame in milliseconds
    pub fn next_delay(&self) -> i32 {
        self.lock().next_delay()
    }

    /// Get the number of frames
    pub fn frame_count(&self) -> usize {
        self.lock().header.frames.len()
    }

    /// Get the index of the current frame, or -1 before the first advance
    pub fn current_frame_index(&self) -> i32 {
        self.lock().frame_pointer
    }

    /// Get the loop count ([LOOP_FOREVER](constant.LOOP_FOREVER.html) means
    /// repeat indefinitely)
    pub fn loop_count(&self) -> i32 {
        self.lock().header.loop_count
    }

    /// Get the number of animation loops already shown
    pub fn loop_index(&self) -> u32 {
        self.lock().loop_index
    }

    /// Move the frame pointer to a specific frame.
    ///
    /// Returns `false` when the index is out of range; -1 rewinds to before
    /// the first frame.
    pub fn set_frame_index(&self, frame: i32) -> bool {
        self.lock().set_frame_index(frame)
    }

    /// Rewind the frame pointer to before the first frame
    pub fn reset_frame_index(&self) {
        self.lock().frame_pointer = INITIAL_FRAME_POINTER;
    }

    /// Reset the loop index to the first loop
    pub fn reset_loop_index(&self) {
        self.lock().loop_index = 0;
    }

    /// Get the logical screen width
    pub fn width(&self) -> u16 {
        self.lock().header.width
    }

    /// Get the logical screen height
    pub fn height(&self) -> u16 {
        self.lock().header.height
    }

    /// Get an estimate of the memory held by this decoder, in bytes
    pub fn byte_size(&self) -> usize {
        let inner = self.lock();
        inner.raw.len()
            + inner.main_pixels.len()
            + inner.main_scratch.len() * BYTES_PER_INTEGER
    }

    /// Get the decoder status.
    ///
    /// The status updates per frame, so the caller can tell whether the
    /// current frame decoded completely.  Format and open failures persist
    /// across frames.
    pub fn status(&self) -> Status {
        self.lock().status
    }

    /// Get the raw GIF data
    pub fn data(&self) -> Arc<[u8]> {
        self.lock().raw.clone()
    }

    /// Release all pooled buffers back to the provider and drop the header
    /// and raw data
    pub fn clear(&self) {
        self.lock().clear()
    }
}

impl<P: BufferProvider> Inner<P> {
    /// Prepare decoder state for a parsed header and raw buffer
    fn set_data(
        &mut self,
        header: Arc<Header>,
        data: Arc<[u8]>,
        sample_size: usize,
    ) {
        let sample = highest_one_bit(sample_size.max(1));
        self.status = Status::Ok;
        self.first_frame_transparent = false;
        self.frame_pointer = INITIAL_FRAME_POINTER;
        self.loop_index = 0;
        // no point saving an old canvas if no frame will restore it
        self.save_previous = header
            .frames
            .iter()
            .any(|f| f.dispose == DisposalMethod::Previous);
        self.sample_size = sample;
        self.downsampled_width = header.width as usize / sample;
        self.downsampled_height = header.height as usize / sample;
        let n_pix = header.width as usize * header.height as usize;
        let n_scratch = self.downsampled_width * self.downsampled_height;
        self.header = header;
        self.raw = data;
        self.reader.seek(0);
        if let Some(prev) = self.previous_image.take() {
            self.provider.release_raster(prev);
        }
        let old = std::mem::take(&mut self.main_pixels);
        if !old.is_empty() {
            self.provider.release_bytes(old);
        }
        let old = std::mem::take(&mut self.main_scratch);
        if !old.is_empty() {
            self.provider.release_ints(old);
        }
        self.main_pixels = self.provider.obtain_bytes(n_pix);
        self.main_pixels.resize(n_pix, 0);
        self.main_scratch = self.provider.obtain_ints(n_scratch);
        self.main_scratch.resize(n_scratch, 0);
    }

    /// Move the frame pointer forward
    fn advance(&mut self) -> bool {
        let frame_count = self.header.frames.len() as i32;
        if frame_count <= 0 {
            return false;
        }
        if self.frame_pointer == frame_count - 1 {
            self.loop_index += 1;
        }
        if self.header.loop_count != LOOP_FOREVER
            && self.loop_index as i32 > self.header.loop_count
        {
            return false;
        }
        self.frame_pointer = (self.frame_pointer + 1) % frame_count;
        true
    }

    /// Get the display duration of frame `n`
    fn delay(&self, n: i32) -> i32 {
        if n >= 0 && (n as usize) < self.header.frames.len() {
            self.header.frames[n as usize].delay_ms as i32
        } else {
            -1
        }
    }

    /// Get the display duration of the current frame
    fn next_delay(&self) -> i32 {
        if self.header.frames.is_empty() || self.frame_pointer < 0 {
            return 0;
        }
        self.delay(self.frame_pointer)
    }

    /// Move the frame pointer to a specific frame
    fn set_frame_index(&mut self, frame: i32) -> bool {
        if frame < INITIAL_FRAME_POINTER
            || frame >= self.header.frames.len() as i32
        {
            return false;
        }
        self.frame_pointer = frame;
        true
    }

    /// Decode and composite the current frame
    fn get_current_frame(&mut self) -> Option<Raster> {
        if self.header.frames.is_empty() || self.frame_pointer < 0 {
            debug!(
                "unable to decode frame, frame_count={} frame_pointer={}",
                self.header.frames.len(),
                self.frame_pointer
            );
            self.status = Status::FormatError;
        }
        if self.status == Status::FormatError
            || self.status == Status::OpenError
        {
            debug!("unable to decode frame, status={}", self.status);
            return None;
        }
        self.status = Status::Ok;
        let header = self.header.clone();
        let fp = self.frame_pointer as usize;
        let current = header.frames.get(fp)?;
        let previous = if fp >= 1 {
            header.frames.get(fp - 1)
        } else {
            None
        };
        let table = current
            .local_color_table
            .as_deref()
            .or(header.global_color_table.as_deref());
        let table = match table {
            Some(table) => table,
            None => {
                debug!("no valid color table for frame #{fp}");
                self.status = Status::FormatError;
                return None;
            }
        };
        // apply transparency to a copy, never to the shared header table
        let mut pct = [0u32; COLOR_TABLE_LEN];
        let act: &[u32; COLOR_TABLE_LEN] = if current.transparency {
            pct.copy_from_slice(table);
            pct[current.transparent_index as usize] = 0;
            &pct
        } else {
            table
        };
        self.set_pixels(&header, current, previous, act)
    }

    /// Render the current frame onto the canvas, applying the previous
    /// frame's disposal first
    fn set_pixels(
        &mut self,
        header: &Header,
        current: &Frame,
        previous: Option<&Frame>,
        act: &[u32; COLOR_TABLE_LEN],
    ) -> Option<Raster> {
        let width = self.downsampled_width;
        let height = self.downsampled_height;
        let sample = self.sample_size;
        // clear the canvas for the first frame
        if previous.is_none() {
            self.main_scratch.fill(0);
        }
        if let Some(prev) = previous {
            match prev.dispose {
                DisposalMethod::Keep => (),
                DisposalMethod::Background => {
                    // restore the disposed area to the background color
                    let mut color = 0;
                    if !current.transparency {
                        color = header.bg_color;
                        if current.local_color_table.is_some()
                            && header.bg_index == current.transparent_index
                        {
                            color = 0;
                        }
                    } else if self.frame_pointer == 0 {
                        self.first_frame_transparent = true;
                    }
                    render::fill_rect(
                        &mut Canvas {
                            pixels: &mut self.main_scratch[..],
                            width,
                            height,
                            sample,
                        },
                        prev,
                        color,
                    );
                }
                DisposalMethod::Previous => match &self.previous_image {
                    Some(snapshot) => render::restore_rect(
                        &mut Canvas {
                            pixels: &mut self.main_scratch[..],
                            width,
                            height,
                            sample,
                        },
                        snapshot.pixels(),
                        prev,
                    ),
                    None => render::fill_rect(
                        &mut Canvas {
                            pixels: &mut self.main_scratch[..],
                            width,
                            height,
                            sample,
                        },
                        prev,
                        0,
                    ),
                },
            }
        }
        self.decode_frame(current);
        let wrote_transparent = render::composite(
            &mut Canvas {
                pixels: &mut self.main_scratch[..],
                width,
                height,
                sample,
            },
            current,
            act,
            &self.main_pixels,
        );
        if wrote_transparent && self.frame_pointer == 0 {
            self.first_frame_transparent = true;
        }
        // snapshot the canvas for later restores
        if self.save_previous && current.dispose == DisposalMethod::Keep {
            if self.previous_image.is_none() {
                self.previous_image = Some(self.obtain_raster());
            }
            if let Some(snapshot) = &mut self.previous_image {
                snapshot.pixels_mut().copy_from_slice(&self.main_scratch);
            }
        }
        let mut raster = self.obtain_raster();
        raster.pixels_mut().copy_from_slice(&self.main_scratch);
        Some(raster)
    }

    /// Decode the frame's LZW image data into the indexed pixel scratch
    fn decode_frame(&mut self, frame: &Frame) {
        let n_pix = frame.width as usize * frame.height as usize;
        if self.main_pixels.len() < n_pix {
            let old = std::mem::replace(
                &mut self.main_pixels,
                self.provider.obtain_bytes(n_pix),
            );
            if !old.is_empty() {
                self.provider.release_bytes(old);
            }
            self.main_pixels.resize(n_pix, 0);
        }
        self.reader.seek(frame.image_data_start);
        let raw = self.raw.clone();
        let status = self.lzw.decode(
            &mut self.reader,
            &raw,
            &self.provider,
            n_pix,
            &mut self.main_pixels,
        );
        if status != Status::Ok {
            self.status = status;
        }
    }

    /// Obtain an output raster sized for the downsampled screen
    fn obtain_raster(&self) -> Raster {
        let format = if self.first_frame_transparent {
            RasterFormat::Argb8888
        } else {
            RasterFormat::Rgb565
        };
        self.provider.obtain_raster(
            self.downsampled_width,
            self.downsampled_height,
            format,
        )
    }

    /// Release pooled buffers and drop shared data
    fn clear(&mut self) {
        self.header = Arc::new(Header::default());
        let pixels = std::mem::take(&mut self.main_pixels);
        if !pixels.is_empty() {
            self.provider.release_bytes(pixels);
        }
        let scratch = std::mem::take(&mut self.main_scratch);
        if !scratch.is_empty() {
            self.provider.release_ints(scratch);
        }
        if let Some(prev) = self.previous_image.take() {
            self.provider.release_raster(prev);
        }
        self.raw = Arc::new([]);
        self.first_frame_transparent = false;
        self.reader.release(&self.provider);
    }
}
