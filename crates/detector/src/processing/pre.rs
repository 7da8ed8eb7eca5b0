use crate::config::DEFAULT_INPUT_SIZE;
use crate::errors::DetectError;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::{DynamicImage, RgbImage};
use ndarray::{Array, IxDyn};

/// Decodes raw encoded bytes (PNG or JPEG) into an image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DetectError> {
    if bytes.is_empty() {
        return Err(DetectError::InvalidImage("empty image data".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| DetectError::InvalidImage(e.to_string()))
}

/// Stretches the whole image to the model input size. Aspect ratio is not
/// preserved and nothing is cropped or padded, so normalized model boxes map
/// linearly back onto the original image.
#[derive(Debug, Clone)]
pub struct ScaleFillPreProcessor {
    pub input_size: (u32, u32),
}

impl ScaleFillPreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self { input_size }
    }

    pub fn preprocess(&self, image: &RgbImage) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("preprocess_image");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        tracing::trace!(
            width,
            height,
            input_width = self.input_size.0,
            input_height = self.input_size.1,
            "Preprocessing image dimensions"
        );

        let resized = self.resize_to_fill(image.as_raw(), width, height)?;

        Self::normalize(&resized)
    }

    fn resize_to_fill(&self, pixels: &[u8], width: u32, height: u32) -> anyhow::Result<Image<'static>> {
        let _s = span!("resize_to_fill");

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(self.input_size.0, self.input_size.1, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        Ok(resized)
    }

    /// HWC `u8` to NCHW `f32` scaled into `[0, 1]`.
    fn normalize(image: &Image) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = image.width() as usize;
        let height = image.height() as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];
        let buf = image.buffer();

        for (i, px) in buf.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}

impl Default for ScaleFillPreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}
