//! APNG chunk scanning

use crate::errors::MediaError;
use crate::probe::{frame_delay, AnimationInfo, Blend, Disposal, FrameInfo};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn is_png(data: &[u8]) -> bool {
    data.len() >= PNG_SIGNATURE.len() && data[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

/// Scan PNG chunks for animation control.
///
/// Returns `Ok(None)` for a plain PNG, i.e. one without an `acTL` chunk or
/// without any `fcTL` frames. CRCs are not verified.
pub fn scan(data: &[u8]) -> Result<Option<AnimationInfo>, MediaError> {
    if !is_png(data) {
        return Err(MediaError::UnsupportedFormat("not a PNG stream".to_string()));
    }

    let mut size = None;
    let mut plays = None;
    let mut frames = Vec::new();
    let mut pos = PNG_SIGNATURE.len();

    while pos + 8 <= data.len() {
        let length = read_u32(data, pos) as usize;
        let chunk_type = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let Some(body_end) = body_start.checked_add(length).filter(|&end| end <= data.len()) else {
            break;
        };
        let body = &data[body_start..body_end];

        match chunk_type {
            b"IHDR" if body.len() >= 8 => {
                size = Some((read_u32(body, 0), read_u32(body, 4)));
            }
            b"acTL" if body.len() >= 8 => {
                plays = Some(read_u32(body, 4));
            }
            b"fcTL" if body.len() >= 26 => {
                frames.push(frame_control(body, frames.len()));
            }
            b"IEND" => break,
            _ => {}
        }

        // Skip CRC
        pos = body_end + 4;
    }

    let (width, height) = size.ok_or_else(|| {
        MediaError::UnsupportedFormat("PNG is missing its IHDR chunk".to_string())
    })?;

    match plays {
        Some(loop_count) if !frames.is_empty() => Ok(Some(AnimationInfo {
            width,
            height,
            loop_count,
            frames,
        })),
        _ => Ok(None),
    }
}

fn frame_control(body: &[u8], index: usize) -> FrameInfo {
    let delay_num = read_u16(body, 20) as u32;
    let delay_den = match read_u16(body, 22) {
        0 => 100,
        den => den as u32,
    };

    let disposal = match body[24] {
        1 => Disposal::Background,
        // The first frame has nothing to restore to
        2 if index == 0 => Disposal::Background,
        2 => Disposal::Previous,
        _ => Disposal::None,
    };
    let blend = match body[25] {
        1 => Blend::Over,
        _ => Blend::Source,
    };

    FrameInfo {
        index,
        x: read_u32(body, 12),
        y: read_u32(body, 16),
        width: read_u32(body, 4),
        height: read_u32(body, 8),
        duration: frame_delay(delay_num * 1000 / delay_den),
        disposal,
        blend,
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}
