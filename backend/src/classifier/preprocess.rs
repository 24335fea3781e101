use image::DynamicImage;
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::error::ApiError;

/// Input resolution the model was trained on.
pub const IMAGE_SIZE: u32 = 224;

pub fn decode(image_data: &[u8]) -> Result<DynamicImage, ApiError> {
    Ok(image::load_from_memory(image_data)?)
}

/// Resize to 224x224, scale channels to [0, 1] and add the batch axis,
/// producing the 1x224x224x3 layout the model expects.
pub fn to_tensor(image: &DynamicImage) -> Result<Tensor, ApiError> {
    let rgb = image
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let mut data = Vec::with_capacity((IMAGE_SIZE * IMAGE_SIZE * 3) as usize);
    for pixel in rgb.pixels() {
        data.push(pixel[0] as f32 / 255.0);
        data.push(pixel[1] as f32 / 255.0);
        data.push(pixel[2] as f32 / 255.0);
    }

    let array = tract_ndarray::Array4::from_shape_vec(
        (1, IMAGE_SIZE as usize, IMAGE_SIZE as usize, 3),
        data,
    )
    .map_err(|e| ApiError::Inference(e.to_string()))?;

    Ok(array.into_tensor())
}
