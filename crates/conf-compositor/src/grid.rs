//! Grid compositing math and JPEG codec glue (§4.7 steps 1-4).

use conf_wire::ClientId;
use image::{imageops::FilterType, ColorType, ImageEncoder, Rgb, RgbImage};
use tracing::warn;

/// Default cell resolution (§4.7 step 2, §6.3 process surface).
pub const DEFAULT_CELL_WIDTH: u32 = 960;
pub const DEFAULT_CELL_HEIGHT: u32 = 540;

/// Default re-encode quality (§4.7 step 4: "quality parameter ~50%").
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// `cols = ceil(sqrt(N)), rows = ceil(N / cols)` (§4.7 step 1).
pub fn grid_dims(participant_count: usize) -> (u32, u32) {
    if participant_count == 0 {
        return (0, 0);
    }
    let cols = (participant_count as f64).sqrt().ceil() as u32;
    let rows = (participant_count as u32).div_ceil(cols);
    (cols, rows)
}

/// Compose `slots` into one grid frame, resizing each slot to fit its
/// `cell_width x cell_height` cell (§4.7 step 2-3). Every cell is 8-bit
/// RGB, so pixel values are clipped to `[0,255]` by construction.
pub fn compose(slots: &[(ClientId, RgbImage)], cell_width: u32, cell_height: u32) -> RgbImage {
    let (cols, rows) = grid_dims(slots.len());
    let mut canvas = RgbImage::from_pixel(cols * cell_width, rows * cell_height, Rgb([0, 0, 0]));
    for (index, (_, frame)) in slots.iter().enumerate() {
        let col = (index as u32) % cols;
        let row = (index as u32) / cols;
        let resized = image::imageops::resize(frame, cell_width, cell_height, FilterType::Triangle);
        image::imageops::replace(&mut canvas, &resized, (col * cell_width) as i64, (row * cell_height) as i64);
    }
    canvas
}

/// Re-encode the composed frame as a JPEG still (§4.7 step 4, §6.2:
/// "in composite mode, payload is a JPEG-encoded still"). `None` on
/// encode failure, which the caller treats as a local drop.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    match encoder.write_image(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8) {
        Ok(()) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "failed to encode composed video frame");
            None
        }
    }
}

/// Decode an incoming JPEG still into an RGB frame for compositing.
pub fn decode_jpeg(bytes: &[u8]) -> Option<RgbImage> {
    image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .map(|img| img.to_rgb8())
        .ok()
}
