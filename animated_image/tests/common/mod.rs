#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::time::Duration;

use animated_image::{Frame, FrameDecoder, FrameInfo, MediaError};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, ImageFormat, Rgba, RgbaImage};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn gif_fixture(frames: usize, width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        let frames = (0..frames).map(|i| {
            let shade = (i * 25 % 256) as u8;
            let buffer = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255]));
            image::Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    bytes
}

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// Decoder that sleeps per frame and reports each decode on a channel.
pub struct SlowDecoder {
    pub width: u32,
    pub height: u32,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub started: Mutex<Option<Sender<usize>>>,
}

impl SlowDecoder {
    pub fn new(width: u32, height: u32, delay: Duration) -> Self {
        Self {
            width,
            height,
            delay,
            calls: AtomicUsize::new(0),
            started: Mutex::new(None),
        }
    }

    pub fn notify(self, tx: Sender<usize>) -> Self {
        *self.started.lock().unwrap() = Some(tx);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameDecoder for SlowDecoder {
    fn decode_frame(&self, _data: &[u8], index: usize) -> Result<Frame, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.started.lock().unwrap().as_ref() {
            let _ = tx.send(index);
        }
        std::thread::sleep(self.delay);

        let image = RgbaImage::from_pixel(self.width, self.height, Rgba([index as u8, 1, 2, 255]));
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
}
