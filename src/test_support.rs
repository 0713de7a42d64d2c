//! 单元测试共用的夹具。

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};

use crate::bus;
use crate::scanner::{HttpDirectLoader, ImageAcquirer, ScanConfig, ScanPipeline};

/// 生成包含指定文本的二维码 PNG（每模块 8 像素，4 模块静区）。
pub fn qr_png(text: &str) -> Vec<u8> {
    let code = QrCode::new(text.as_bytes()).expect("encode qr");
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let scale = 8;
    let quiet = 4;
    let size = (modules + quiet * 2) * scale;

    let image = GrayImage::from_fn(size, size, |x, y| {
        let mx = (x / scale) as i64 - quiet as i64;
        let my = (y / scale) as i64 - quiet as i64;
        let inside = mx >= 0 && my >= 0 && (mx as u32) < modules && (my as u32) < modules;
        if inside && colors[(my as u32 * modules + mx as u32) as usize] == Color::Dark {
            Luma([0])
        } else {
            Luma([255])
        }
    });

    encode(DynamicImage::ImageLuma8(image))
}

/// 纯白 PNG。
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255]))))
}

fn encode(image: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("encode png");
    cursor.into_inner()
}

/// 仅处理字节引用的流水线（总线无后台消费者）。
pub fn bytes_only_pipeline(config: ScanConfig) -> ScanPipeline {
    let (bus, _rx) = bus::channel(1);
    let direct = HttpDirectLoader::new(config.clone()).expect("direct loader");
    ScanPipeline::new(config, ImageAcquirer::new(bus, Arc::new(direct)))
}
