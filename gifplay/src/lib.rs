// lib.rs      gifplay crate.
//
// Copyright (c) 2026  Douglas Lau
//
//! # GifPlay
//!
//! A library for decoding animated GIF images for playback.
//!
//! The whole GIF is buffered up front; a [Decoder] then renders one frame at
//! a time, handling LZW decompression, frame disposal, transparency,
//! interlacing and optional integer downsampling.  Timing and display are up
//! to the caller, which drives the animation with
//! [advance](struct.Decoder.html#method.advance) and
//! [get_current_frame](struct.Decoder.html#method.get_current_frame).
//!
//! [Decoder]: struct.Decoder.html
#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

mod decode;
mod error;
mod header;
mod lzw;
mod parse;
mod provider;
mod reader;
mod render;

pub use crate::decode::Decoder;
pub use crate::error::Status;
pub use crate::header::{DisposalMethod, Frame, Header, LOOP_FOREVER};
pub use crate::parse::HeaderParser;
pub use crate::provider::{
    BufferProvider, Raster, RasterFormat, SimpleProvider,
};
