//! GIF block scanning

use crate::errors::MediaError;
use crate::probe::{frame_delay, AnimationInfo, Blend, Disposal, FrameInfo};

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;

/// Check the GIF87a / GIF89a signature
pub fn is_gif(data: &[u8]) -> bool {
    data.len() >= 6 && (&data[0..6] == b"GIF89a" || &data[0..6] == b"GIF87a")
}

struct GraphicControl {
    delay_cs: u16,
    disposal: Disposal,
}

/// Walk the block stream and collect one frame per image descriptor.
///
/// Delay and disposal come from the Graphic Control Extension that
/// precedes each descriptor. A missing NETSCAPE2.0 block means the loop
/// count stays 0 (repeat forever).
pub fn scan(data: &[u8]) -> Result<AnimationInfo, MediaError> {
    if data.len() < 13 || !is_gif(data) {
        return Err(MediaError::UnsupportedFormat("not a GIF stream".to_string()));
    }

    let width = read_u16(data, 6) as u32;
    let height = read_u16(data, 8) as u32;
    let mut i = 13;

    // Skip Global Color Table if present
    let flags = data[10];
    if flags & 0x80 != 0 {
        i += color_table_len(flags);
    }

    let mut loop_count = 0u32;
    let mut pending: Option<GraphicControl> = None;
    let mut frames = Vec::new();

    while i < data.len() {
        match data[i] {
            EXTENSION_INTRODUCER => {
                let Some(&label) = data.get(i + 1) else { break };
                i += 2;
                match label {
                    GRAPHIC_CONTROL_LABEL if i + 5 <= data.len() && data[i] == 4 => {
                        let packed = data[i + 1];
                        pending = Some(GraphicControl {
                            delay_cs: read_u16(data, i + 2),
                            disposal: disposal_from_gif((packed >> 2) & 0x07),
                        });
                    }
                    APPLICATION_LABEL
                        if i + 12 <= data.len()
                            && data[i] == 11
                            && &data[i + 1..i + 12] == b"NETSCAPE2.0" =>
                    {
                        let sub = i + 12;
                        if sub + 4 <= data.len() && data[sub] == 3 && data[sub + 1] == 1 {
                            loop_count = read_u16(data, sub + 2) as u32;
                        }
                    }
                    _ => {}
                }
                i = skip_sub_blocks(data, i);
            }
            IMAGE_DESCRIPTOR => {
                if i + 10 > data.len() {
                    break;
                }

                let x = read_u16(data, i + 1) as u32;
                let y = read_u16(data, i + 3) as u32;
                let frame_width = read_u16(data, i + 5) as u32;
                let frame_height = read_u16(data, i + 7) as u32;
                let local_flags = data[i + 9];
                i += 10;

                // Skip Local Color Table if present
                if local_flags & 0x80 != 0 {
                    i += color_table_len(local_flags);
                }

                // Skip LZW minimum code size
                i += 1;
                i = skip_sub_blocks(data, i);

                let control = pending.take();
                let delay_ms = control.as_ref().map_or(0, |c| c.delay_cs as u32 * 10);
                frames.push(FrameInfo {
                    index: frames.len(),
                    x,
                    y,
                    width: frame_width,
                    height: frame_height,
                    duration: frame_delay(delay_ms),
                    disposal: control.map_or(Disposal::None, |c| c.disposal),
                    blend: Blend::Over,
                });
            }
            TRAILER => break,
            other => {
                // Block boundaries are lost, anything further would be guesswork
                log::debug!("unknown GIF block 0x{:02X} at offset {}, stopping scan", other, i);
                break;
            }
        }
    }

    if frames.is_empty() {
        return Err(MediaError::UnsupportedFormat(
            "GIF contains no image descriptors".to_string(),
        ));
    }

    Ok(AnimationInfo {
        width,
        height,
        loop_count,
        frames,
    })
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn color_table_len(flags: u8) -> usize {
    3 * (1 << ((flags & 0x07) + 1))
}

/// Skip a chain of data sub-blocks, returning the index past the terminator
fn skip_sub_blocks(data: &[u8], mut i: usize) -> usize {
    while i < data.len() && data[i] != 0 {
        let block_size = data[i] as usize;
        i += 1 + block_size;
    }
    i + 1
}

fn disposal_from_gif(method: u8) -> Disposal {
    match method {
        2 => Disposal::Background,
        3 => Disposal::Previous,
        _ => Disposal::None,
    }
}
