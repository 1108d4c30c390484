use image::RgbImage;
use tract_onnx::prelude::tract_ndarray::Array4;

use super::error::PreprocessError;
use super::source::ImageHandle;

/// Side length the classifier was trained on.
pub const INPUT_SIZE: u32 = 256;

/// Classifier input: `[1, 256, 256, 3]`, NHWC, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor(Array4<f32>);

impl InputTensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    #[cfg(test)]
    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array4<f32> {
        self.0
    }
}

/// Turn an image into the classifier's input tensor.
///
/// Steps, in order: nearest-neighbour resize to 256x256 (aspect ratio is not
/// preserved), `u8 -> f32`, divide by 255, prepend a batch axis of 1.
pub fn preprocess(image: &ImageHandle) -> Result<InputTensor, PreprocessError> {
    let resized = resize_nearest(image.pixels(), INPUT_SIZE, INPUT_SIZE)?;
    let side = INPUT_SIZE as usize;
    let tensor = Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        let pixel = resized.get_pixel(x as u32, y as u32);
        pixel[c] as f32 / 255.0
    });
    Ok(InputTensor(tensor))
}

/// Nearest-neighbour resize without half-pixel centres or corner alignment.
///
/// Destination `d` samples source `min(n - 1, floor(d * n / out))`. The
/// classifier was trained on exactly this sampling, so `image`'s own
/// `FilterType::Nearest` (which samples pixel centres) is not a substitute.
pub fn resize_nearest(src: &RgbImage, width: u32, height: u32) -> Result<RgbImage, PreprocessError> {
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return Err(PreprocessError::Empty {
            width: src_w,
            height: src_h,
        });
    }

    let x_map: Vec<u32> = (0..width).map(|d| nearest_source(d, src_w, width)).collect();
    let y_map: Vec<u32> = (0..height).map(|d| nearest_source(d, src_h, height)).collect();

    Ok(RgbImage::from_fn(width, height, |x, y| {
        *src.get_pixel(x_map[x as usize], y_map[y as usize])
    }))
}

fn nearest_source(dst: u32, src_len: u32, dst_len: u32) -> u32 {
    let scaled = (dst as u64 * src_len as u64) / dst_len as u64;
    (scaled as u32).min(src_len - 1)
}
