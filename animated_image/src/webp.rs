//! WebP RIFF chunk scanning

use crate::errors::MediaError;
use crate::probe::{frame_delay, AnimationInfo, Blend, Disposal, FrameInfo};

const ANIMATION_FLAG: u8 = 0x02;
const VP8_START_CODE: [u8; 3] = [0x9D, 0x01, 0x2A];
const VP8L_SIGNATURE: u8 = 0x2F;

pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Scan RIFF chunks for the canvas, loop count and `ANMF` frames.
///
/// A file without the VP8X animation flag is reported as one frame sized
/// from its `VP8X`, `VP8 ` or `VP8L` header.
pub fn scan(data: &[u8]) -> Result<AnimationInfo, MediaError> {
    if !is_webp(data) {
        return Err(MediaError::UnsupportedFormat("not a WebP stream".to_string()));
    }

    let mut canvas = None;
    let mut bitstream_size = None;
    let mut animated = false;
    let mut loop_count = 0u32;
    let mut frames = Vec::new();
    let mut pos = 12;

    while pos + 8 <= data.len() {
        let fourcc = &data[pos..pos + 4];
        let size = read_u32(data, pos + 4) as usize;
        let body_start = pos + 8;
        let Some(body_end) = body_start.checked_add(size).filter(|&end| end <= data.len()) else {
            break;
        };
        let body = &data[body_start..body_end];

        match fourcc {
            b"VP8X" if body.len() >= 10 => {
                animated = body[0] & ANIMATION_FLAG != 0;
                canvas = Some((read_u24(body, 4) + 1, read_u24(body, 7) + 1));
            }
            b"ANIM" if body.len() >= 6 => {
                loop_count = u16::from_le_bytes([body[4], body[5]]) as u32;
            }
            b"ANMF" if body.len() >= 16 => {
                frames.push(animation_frame(body, frames.len()));
            }
            b"VP8 " if body.len() >= 10 && body[3..6] == VP8_START_CODE => {
                let width = u16::from_le_bytes([body[6], body[7]]) & 0x3FFF;
                let height = u16::from_le_bytes([body[8], body[9]]) & 0x3FFF;
                bitstream_size.get_or_insert((width as u32, height as u32));
            }
            b"VP8L" if body.len() >= 5 && body[0] == VP8L_SIGNATURE => {
                let bits = read_u32(body, 1);
                let width = (bits & 0x3FFF) + 1;
                let height = ((bits >> 14) & 0x3FFF) + 1;
                bitstream_size.get_or_insert((width, height));
            }
            _ => {}
        }

        // Chunks are padded to even length
        pos = body_end + (size & 1);
    }

    if animated && !frames.is_empty() {
        let (width, height) = canvas.unwrap_or((0, 0));
        return Ok(AnimationInfo {
            width,
            height,
            loop_count,
            frames,
        });
    }

    canvas
        .or(bitstream_size)
        .map(|(width, height)| AnimationInfo::still(width, height))
        .ok_or_else(|| MediaError::UnsupportedFormat("WebP has no image data".to_string()))
}

fn animation_frame(body: &[u8], index: usize) -> FrameInfo {
    let flags = body[15];
    FrameInfo {
        index,
        x: read_u24(body, 0) * 2,
        y: read_u24(body, 3) * 2,
        width: read_u24(body, 6) + 1,
        height: read_u24(body, 9) + 1,
        duration: frame_delay(read_u24(body, 12)),
        disposal: if flags & 0x01 != 0 {
            Disposal::Background
        } else {
            Disposal::None
        },
        blend: if flags & 0x02 != 0 {
            Blend::Source
        } else {
            Blend::Over
        },
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u24(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], 0])
}
