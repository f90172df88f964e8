//! Fixture builders shared by unit tests

use std::io::Cursor;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::decoder::{Frame, FrameDecoder, FrameSink};
use crate::errors::MediaError;
use crate::probe::FrameInfo;

/// Animated GIF with `frames` solid-colour frames, 100ms each, looping forever.
pub fn gif_fixture(frames: usize, width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        let frames = (0..frames).map(|i| {
            let shade = (i * 40 % 256) as u8;
            let buffer = RgbaImage::from_pixel(width, height, Rgba([shade, 255 - shade, 0, 255]));
            image::Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    bytes
}

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[derive(Debug, Clone, Copy)]
pub struct ApngFrame {
    pub delay: (u16, u16),
    pub dispose: u8,
    pub blend: u8,
}

/// PNG chunk stream with `acTL` and one `fcTL` per frame. No pixel data
/// and zeroed CRCs, enough for the chunk scanner only.
pub fn apng_fixture(width: u32, height: u32, plays: u32, frames: &[ApngFrame]) -> Vec<u8> {
    let mut data = crate::apng::PNG_SIGNATURE.to_vec();

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
    push_png_chunk(&mut data, b"IHDR", &ihdr);

    let mut actl = Vec::new();
    actl.extend_from_slice(&(frames.len() as u32).to_be_bytes());
    actl.extend_from_slice(&plays.to_be_bytes());
    push_png_chunk(&mut data, b"acTL", &actl);

    for (seq, frame) in frames.iter().enumerate() {
        let mut fctl = Vec::new();
        fctl.extend_from_slice(&(seq as u32).to_be_bytes());
        fctl.extend_from_slice(&width.to_be_bytes());
        fctl.extend_from_slice(&height.to_be_bytes());
        fctl.extend_from_slice(&0u32.to_be_bytes());
        fctl.extend_from_slice(&0u32.to_be_bytes());
        fctl.extend_from_slice(&frame.delay.0.to_be_bytes());
        fctl.extend_from_slice(&frame.delay.1.to_be_bytes());
        fctl.push(frame.dispose);
        fctl.push(frame.blend);
        push_png_chunk(&mut data, b"fcTL", &fctl);
    }

    push_png_chunk(&mut data, b"IEND", &[]);
    data
}

fn push_png_chunk(data: &mut Vec<u8>, chunk_type: &[u8; 4], body: &[u8]) {
    data.extend_from_slice(&(body.len() as u32).to_be_bytes());
    data.extend_from_slice(chunk_type);
    data.extend_from_slice(body);
    data.extend_from_slice(&[0; 4]);
}

#[derive(Debug, Clone, Copy)]
pub struct WebpFrame {
    pub offset: (u32, u32),
    pub size: (u32, u32),
    pub duration_ms: u32,
    pub flags: u8,
}

/// Extended WebP with `VP8X`, `ANIM` and `ANMF` chunks. Frame payloads are
/// empty, enough for the chunk scanner only.
pub fn webp_animated_fixture(width: u32, height: u32, loops: u16, frames: &[WebpFrame]) -> Vec<u8> {
    let mut chunks = Vec::new();

    let mut vp8x = vec![0x02, 0, 0, 0];
    vp8x.extend_from_slice(&u24(width - 1));
    vp8x.extend_from_slice(&u24(height - 1));
    push_riff_chunk(&mut chunks, b"VP8X", &vp8x);

    let mut anim = vec![0, 0, 0, 0];
    anim.extend_from_slice(&loops.to_le_bytes());
    push_riff_chunk(&mut chunks, b"ANIM", &anim);

    for frame in frames {
        let mut anmf = Vec::new();
        anmf.extend_from_slice(&u24(frame.offset.0 / 2));
        anmf.extend_from_slice(&u24(frame.offset.1 / 2));
        anmf.extend_from_slice(&u24(frame.size.0 - 1));
        anmf.extend_from_slice(&u24(frame.size.1 - 1));
        anmf.extend_from_slice(&u24(frame.duration_ms));
        anmf.push(frame.flags);
        push_riff_chunk(&mut chunks, b"ANMF", &anmf);
    }

    riff(chunks)
}

/// Simple-format lossless WebP header.
pub fn webp_lossless_fixture(width: u32, height: u32) -> Vec<u8> {
    let bits = (width - 1) | ((height - 1) << 14);
    let mut vp8l = vec![0x2F];
    vp8l.extend_from_slice(&bits.to_le_bytes());
    let mut chunks = Vec::new();
    push_riff_chunk(&mut chunks, b"VP8L", &vp8l);
    riff(chunks)
}

/// Real APNG: one solid RGBA frame per `(colour, delay)` entry, encoded
/// with the `png` crate.
pub fn apng_image_fixture(
    width: u32,
    height: u32,
    plays: u32,
    frames: &[(Rgba<u8>, (u16, u16))],
) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(frames.len() as u32, plays).unwrap();

        let mut writer = encoder.write_header().unwrap();
        for &(colour, (num, den)) in frames {
            writer.set_frame_delay(num, den).unwrap();
            let canvas = RgbaImage::from_pixel(width, height, colour);
            writer.write_image_data(canvas.as_raw()).unwrap();
        }
        writer.finish().unwrap();
    }
    bytes
}

/// Real animated WebP: one full-canvas lossless frame per
/// `(colour, duration_ms)` entry, drawn without blending.
pub fn webp_image_fixture(
    width: u32,
    height: u32,
    loops: u16,
    frames: &[(Rgba<u8>, u32)],
) -> Vec<u8> {
    let mut chunks = Vec::new();

    // Animation + alpha
    let mut vp8x = vec![0x12, 0, 0, 0];
    vp8x.extend_from_slice(&u24(width - 1));
    vp8x.extend_from_slice(&u24(height - 1));
    push_riff_chunk(&mut chunks, b"VP8X", &vp8x);

    let mut anim = vec![0, 0, 0, 0];
    anim.extend_from_slice(&loops.to_le_bytes());
    push_riff_chunk(&mut chunks, b"ANIM", &anim);

    for &(colour, duration_ms) in frames {
        let mut anmf = Vec::new();
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(width - 1));
        anmf.extend_from_slice(&u24(height - 1));
        anmf.extend_from_slice(&u24(duration_ms));
        anmf.push(0x02);
        push_riff_chunk(&mut anmf, b"VP8L", &lossless_bitstream(width, height, colour));
        push_riff_chunk(&mut chunks, b"ANMF", &anmf);
    }

    riff(chunks)
}

/// `VP8L` chunk body of a solid image, taken from the `image` encoder output
fn lossless_bitstream(width: u32, height: u32, colour: Rgba<u8>) -> Vec<u8> {
    let canvas = RgbaImage::from_pixel(width, height, colour);
    let mut encoded = Vec::new();
    image::codecs::webp::WebPEncoder::new_lossless(&mut encoded)
        .encode(canvas.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();

    let mut at = 12;
    while at + 8 <= encoded.len() {
        let size = u32::from_le_bytes([
            encoded[at + 4],
            encoded[at + 5],
            encoded[at + 6],
            encoded[at + 7],
        ]) as usize;
        let body = at + 8;
        if &encoded[at..at + 4] == b"VP8L" {
            return encoded[body..body + size].to_vec();
        }
        at = body + size + (size & 1);
    }
    panic!("encoder produced no VP8L chunk");
}

fn riff(chunks: Vec<u8>) -> Vec<u8> {
    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&((chunks.len() + 4) as u32).to_le_bytes());
    data.extend_from_slice(b"WEBP");
    data.extend_from_slice(&chunks);
    data
}

fn push_riff_chunk(data: &mut Vec<u8>, fourcc: &[u8; 4], body: &[u8]) {
    data.extend_from_slice(fourcc);
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend_from_slice(body);
    if body.len() % 2 == 1 {
        data.push(0);
    }
}

fn u24(value: u32) -> [u8; 3] {
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

/// Decoder that paints each frame a solid colour derived from its index,
/// counts calls and fails on the listed indices.
pub struct CountingDecoder {
    pub width: u32,
    pub height: u32,
    pub failing: Vec<usize>,
    pub calls: AtomicUsize,
    pub batches: AtomicUsize,
}

impl CountingDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, indices: &[usize]) -> Self {
        self.failing = indices.to_vec();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `decode_frames` passes
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl FrameDecoder for CountingDecoder {
    fn decode_frame(&self, _data: &[u8], index: usize) -> Result<Frame, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&index) {
            return Err(MediaError::FrameDecode {
                index,
                reason: "corrupt frame".to_string(),
            });
        }
        let image = RgbaImage::from_pixel(self.width, self.height, Rgba([index as u8, 0, 0, 255]));
        let info = FrameInfo {
            index,
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
            duration: Duration::from_millis(100),
            disposal: Default::default(),
            blend: Default::default(),
        };
        Ok(Frame::new(image, info))
    }

    fn decode_frames(&self, data: &[u8], indices: &[usize], sink: &mut FrameSink<'_>) {
        self.batches.fetch_add(1, Ordering::SeqCst);
        for &index in indices {
            if let ControlFlow::Break(()) = sink(index, self.decode_frame(data, index)) {
                return;
            }
        }
    }
}
