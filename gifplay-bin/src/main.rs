// main.rs      gifplay command
//
// Copyright (c) 2026  Douglas Lau
//
#![forbid(unsafe_code)]

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use gifplay::{
    Decoder, DisposalMethod, Frame, Header, HeaderParser, Raster,
    LOOP_FOREVER,
};
use std::error::Error;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Crate version
const VERSION: &str = std::env!("CARGO_PKG_VERSION");

/// Main entry point
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder().format_timestamp(None).init();
    let mut out = StandardStream::stdout(ColorChoice::Always);
    match create_app().get_matches().subcommand() {
        ("show", Some(matches)) => show(&mut out, matches)?,
        ("probe", Some(matches)) => probe(&mut out, matches)?,
        ("unwrap", Some(matches)) => unwrap_frames(&mut out, matches)?,
        _ => unreachable!(),
    }
    out.reset()?;
    Ok(())
}

/// Create clap App
fn create_app() -> App<'static, 'static> {
    App::new("gifplay")
        .version(VERSION)
        .setting(AppSettings::GlobalVersion)
        .about("Animated GIF utility")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("show")
                .about("Show GIF frame table")
                .arg(
                    Arg::with_name("files")
                        .required(true)
                        .min_values(1)
                        .help("input file(s)"),
                ),
        )
        .subcommand(
            SubCommand::with_name("probe")
                .about("Check whether a GIF is animated")
                .arg(Arg::with_name("file").required(true).help("input file")),
        )
        .subcommand(
            SubCommand::with_name("unwrap")
                .about("Unwrap frames from a GIF into PPM images")
                .arg(Arg::with_name("file").required(true).help("input file")),
        )
}

/// Handle show subcommand
fn show(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let values = matches.values_of_os("files").unwrap();
    for path in values {
        show_file(out, path)?;
    }
    Ok(())
}

/// Show one GIF file
fn show_file(
    out: &mut StandardStream,
    path: &OsStr,
) -> Result<(), Box<dyn Error>> {
    let mut magenta = ColorSpec::new();
    magenta.set_fg(Some(Color::Magenta));
    let mut red = ColorSpec::new();
    red.set_fg(Some(Color::Red)).set_intense(true);
    let mut yellow = ColorSpec::new();
    yellow.set_fg(Some(Color::Yellow)).set_intense(true);
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let data = fs::read(path)?;
    let header = HeaderParser::new(&data).parse_header();
    out.set_color(&magenta)?;
    writeln!(out, "{}", path.to_string_lossy())?;
    out.set_color(&bold)?;
    write!(
        out,
        "screen: {}x{}, frames: {}",
        header.width(),
        header.height(),
        header.frame_count()
    )?;
    match header.loop_count() {
        LOOP_FOREVER => write!(out, ", repeat: ∞")?,
        0 => (),
        count => write!(out, ", repeat: {count}")?,
    }
    writeln!(out)?;
    if !header.status().is_ok() {
        out.set_color(&red)?;
        writeln!(out, "status: {}", header.status())?;
    }
    out.set_color(&yellow)?;
    writeln!(out, "  Fr#  Delay Disp    Size     X,Y Clrs Trn")?;
    for (number, frame) in header.frames().iter().enumerate() {
        write_frame(out, &header, frame, number)?;
    }
    Ok(())
}

/// Show one frame table row
fn write_frame(
    out: &mut StandardStream,
    header: &Header,
    frame: &Frame,
    number: usize,
) -> Result<(), Box<dyn Error>> {
    let mut dflt = ColorSpec::new();
    dflt.set_fg(Some(Color::White));
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    out.set_color(&dflt)?;
    write!(out, "{}", if frame.interlaced() { 'i' } else { ' ' })?;
    out.set_color(&bold)?;
    write!(out, "{number:>4}")?;
    let delay = frame.delay_ms();
    if delay == 0 {
        out.set_color(&dflt)?;
    }
    write!(out, " {:6.2}", delay as f32 / 1000.0)?;
    let disp = match frame.disposal_method() {
        DisposalMethod::Keep => "keep",
        DisposalMethod::Background => "bg",
        DisposalMethod::Previous => "prev",
    };
    out.set_color(match frame.disposal_method() {
        DisposalMethod::Keep => &dflt,
        _ => &bold,
    })?;
    write!(out, " {disp:>4}")?;
    if frame.width() == header.width() && frame.height() == header.height() {
        out.set_color(&dflt)?;
    } else {
        out.set_color(&bold)?;
    }
    write!(out, " {:>7}", format!("{}x{}", frame.width(), frame.height()))?;
    if frame.left() == 0 && frame.top() == 0 {
        out.set_color(&dflt)?;
    } else {
        out.set_color(&bold)?;
    }
    write!(out, " {:>7}", format!("{},{}", frame.left(), frame.top()))?;
    if frame.local_color_table().is_some() {
        out.set_color(&bold)?;
        write!(out, "  lcl")?;
    } else {
        out.set_color(&dflt)?;
        write!(out, " {:3}g", header.global_color_table_len())?;
    }
    if frame.transparency() {
        out.set_color(&bold)?;
        writeln!(out, " {:>3}", frame.transparent_index())?;
    } else {
        out.set_color(&dflt)?;
        writeln!(out, "   -")?;
    }
    Ok(())
}

/// Handle probe subcommand
fn probe(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let path = matches.value_of_os("file").unwrap();
    let data = fs::read(path)?;
    let animated = HeaderParser::new(&data).is_animated();
    out.set_color(&bold)?;
    writeln!(out, "{}: animated: {}", path.to_string_lossy(), animated)?;
    Ok(())
}

/// Handle unwrap subcommand
fn unwrap_frames(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let mut red = ColorSpec::new();
    red.set_fg(Some(Color::Red)).set_intense(true);
    let mut dflt = ColorSpec::new();
    dflt.set_fg(Some(Color::White));
    let path = matches.value_of_os("file").unwrap();
    let data = fs::read(path)?;
    let decoder = Decoder::default();
    decoder.read(&data);
    let stem = Path::new(path)
        .file_stem()
        .unwrap_or_else(|| OsStr::new("frame"))
        .to_string_lossy()
        .to_string();
    let frames = decoder.frame_count();
    let mut number = 0;
    while number < frames && decoder.advance() {
        match decoder.get_current_frame() {
            Some(raster) => {
                let name = format!("{stem}.{number:03}.ppm");
                write_ppm(&name, &raster)?;
                out.set_color(&dflt)?;
                writeln!(out, "wrote {name}")?;
            }
            None => {
                out.set_color(&red)?;
                writeln!(out, "frame {}: {}", number, decoder.status())?;
                break;
            }
        }
        number += 1;
    }
    if frames == 0 {
        out.set_color(&red)?;
        writeln!(out, "no frames: {}", decoder.status())?;
    }
    Ok(())
}

/// Write a raster as a binary PPM file
fn write_ppm(path: &str, raster: &Raster) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "P6")?;
    writeln!(w, "{} {} 255", raster.width(), raster.height())?;
    for &p in raster.pixels() {
        w.write_all(&[(p >> 16) as u8, (p >> 8) as u8, p as u8])?;
    }
    Ok(())
}
