//! # 解码引擎
//!
//! 包装 `rqrr`：先按正常极性（深色码、浅色底）尝试，失败再对灰度取反，
//! 尝试浅色码、深色底。对同一像素缓冲结果确定，无副作用。

use rqrr::PreparedImage;

use super::{DecodeResult, PixelBuffer};

/// 解码极性。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inverted,
}

/// 在像素缓冲中查找二维码，两种极性都会尝试。
pub fn decode(buffer: &PixelBuffer) -> DecodeResult {
    decode_with_polarity(buffer)
        .map(|(text, _)| DecodeResult::from_text(text))
        .unwrap_or(DecodeResult::None)
}

/// 同 `decode`，额外返回命中的极性。
pub fn decode_with_polarity(buffer: &PixelBuffer) -> Option<(String, Polarity)> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let mut grey = to_greyscale(buffer);

    if let Some(text) = try_decode_greyscale(&grey, width, height) {
        return Some((text, Polarity::Normal));
    }

    for value in grey.iter_mut() {
        *value = 255 - *value;
    }

    try_decode_greyscale(&grey, width, height).map(|text| (text, Polarity::Inverted))
}

fn try_decode_greyscale(grey: &[u8], width: usize, height: usize) -> Option<String> {
    let mut prepared = PreparedImage::prepare_from_greyscale(width, height, |x, y| grey[y * width + x]);

    prepared
        .detect_grids()
        .iter()
        .filter_map(|grid| grid.decode().ok())
        .map(|(_, content)| content)
        .find(|content| !content.is_empty())
}

/// RGBA → 亮度。透明像素先与白底合成，避免透明背景被当成黑色。
fn to_greyscale(buffer: &PixelBuffer) -> Vec<u8> {
    buffer
        .data()
        .chunks_exact(4)
        .map(|px| {
            let alpha = px[3] as u32;
            let composite = |channel: u8| (channel as u32 * alpha + 255 * (255 - alpha)) / 255;
            let luma = composite(px[0]) * 299 + composite(px[1]) * 587 + composite(px[2]) * 114;
            (luma / 1000) as u8
        })
        .collect()
}
