use image::{
    imageops::{self, FilterType},
    ImageBuffer, Rgb, RgbImage,
};
use ndarray::{Array4, ArrayView4};

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;
pub const INPUT_CHANNELS: usize = 3;
/// Bilinear resampling, applied after normalization as the training
/// pipeline did.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;
/// Intensities are divided by this to land in `[0, 1]`.
pub const PIXEL_SCALE: f32 = 255.0;

const TENSOR_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

/// A single-image NHWC batch of shape `(1, 224, 224, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor(Array4<f32>);

impl InputTensor {
    pub fn try_from_array(array: Array4<f32>) -> Result<Self, String> {
        if array.shape() != TENSOR_SHAPE {
            return Err(format!(
                "expected tensor shape {:?}, got {:?}",
                TENSOR_SHAPE,
                array.shape()
            ));
        }
        Ok(Self(array))
    }

    /// An all-black image.
    pub fn zeros() -> Self {
        Self(Array4::zeros(TENSOR_SHAPE))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }
}

pub fn preprocess(bitmap: &RgbImage) -> InputTensor {
    let normalized: ImageBuffer<Rgb<f32>, Vec<f32>> =
        ImageBuffer::from_fn(bitmap.width(), bitmap.height(), |x, y| {
            let [r, g, b] = bitmap.get_pixel(x, y).0;
            Rgb([
                r as f32 / PIXEL_SCALE,
                g as f32 / PIXEL_SCALE,
                b as f32 / PIXEL_SCALE,
            ])
        });

    let resized = imageops::resize(&normalized, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);

    let tensor = Array4::from_shape_fn(TENSOR_SHAPE, |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c]
    });

    InputTensor(tensor)
}
