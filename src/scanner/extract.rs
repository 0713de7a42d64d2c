//! # 像素提取模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先读取 header 尺寸做像素检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限快速拒绝
//! 3. 完整解码
//! 4. 超过 `decode_max_dimension` 时降采样（解码器对超大图收益很小）
//! 5. 转换 RGBA，并通过 `PixelBuffer::new` 校验字节长度一致性

use std::io::Cursor;

use fast_image_resize as fr;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};

use super::{PixelBuffer, ScanConfig, ScanError};

/// 把已加载的图片字节光栅化为像素缓冲。
pub fn extract(bytes: &[u8], config: &ScanConfig) -> Result<PixelBuffer, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::ImageLoad("图片内容为空".to_string()));
    }

    let (header_width, header_height) = inspect_dimensions(bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ScanError::ImageLoad(format!("图片解码失败：{}", e)))?;

    let (raw_width, raw_height) = decoded.dimensions();
    validate_pixel_limits(config, raw_width, raw_height)?;

    let prepared = downscale_for_decode(decoded, config.decode_max_dimension);
    let (width, height) = prepared.dimensions();
    let buffer = PixelBuffer::new(width, height, prepared.to_rgba8().into_raw())?;

    log::debug!(
        "🧩 像素提取完成 - 原始尺寸: {}x{} 输出尺寸: {}x{}",
        raw_width,
        raw_height,
        width,
        height
    );

    Ok(buffer)
}

/// 仅通过图片头信息读取宽高。
fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32), ScanError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::ImageLoad(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| ScanError::ImageLoad(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &ScanConfig, width: u32, height: u32) -> Result<(), ScanError> {
    if width == 0 || height == 0 {
        return Err(ScanError::ImageLoad(format!("图片尺寸无效：{}x{}", width, height)));
    }

    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ScanError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ScanError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

/// 单边超过上限时按比例缩小，失败回退 `image::resize_exact`。
fn downscale_for_decode(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }

    let scale = (max_dimension as f64 / width as f64).min(max_dimension as f64 / height as f64);
    let target_width = ((width as f64 * scale).floor() as u32).max(1);
    let target_height = ((height as f64 * scale).floor() as u32).max(1);

    log::info!(
        "🧩 解码前降采样：{}x{} -> {}x{}",
        width,
        height,
        target_width,
        target_height
    );

    match resize_with_fast_image_resize(&image, target_width, target_height) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
            image.resize_exact(
                target_width,
                target_height,
                image::imageops::FilterType::Triangle,
            )
        }
    }
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
) -> Result<DynamicImage, ScanError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
            .map_err(|e| ScanError::RasterContext(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ScanError::RasterContext(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
        target_width,
        target_height,
        dst_image.into_vec(),
    )
    .ok_or_else(|| ScanError::RasterContext("降采样输出缓冲长度异常".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[test]
    fn extracts_natural_dimensions() {
        let png = create_png_bytes(120, 80);
        let buffer = extract(&png, &ScanConfig::default()).expect("extract should succeed");

        assert_eq!(buffer.width(), 120);
        assert_eq!(buffer.height(), 80);
        assert_eq!(buffer.data().len(), 120 * 80 * 4);
        assert_eq!(&buffer.data()[..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn rejects_garbage_bytes_as_image_load_error() {
        let result = extract(b"definitely not an image", &ScanConfig::default());
        assert!(matches!(result, Err(ScanError::ImageLoad(_))));
    }

    #[test]
    fn rejects_too_many_pixels() {
        let mut config = ScanConfig::default();
        config.max_decoded_pixels = 1_000;

        let result = extract(&create_png_bytes(100, 100), &config);
        assert!(matches!(result, Err(ScanError::ResourceLimit(_))));
    }

    #[test]
    fn downscales_beyond_decode_dimension() {
        let mut config = ScanConfig::default();
        config.decode_max_dimension = 100;

        let buffer = extract(&create_png_bytes(400, 200), &config).expect("extract");
        assert_eq!(buffer.width(), 100);
        assert_eq!(buffer.height(), 50);
        assert_eq!(buffer.data().len(), 100 * 50 * 4);
    }
}
