//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入语义”和“流水线中间结果”解耦：
//! - `ImageReference` 表示触发点交来的图片引用（URL 或字节），只被消费一次
//! - `PixelBuffer` 表示已光栅化的 RGBA 像素，创建后不可变
//! - `DecodeResult` 表示解码结果，存在时文本非空

use super::ScanError;

/// 图片引用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// 网络地址、`data:` 或 `file:` 链接。
    Url(String),
    /// 粘贴、拖放、选文件或截图得到的原始字节。
    Bytes { data: Vec<u8>, mime: String },
}

impl ImageReference {
    pub fn url(value: impl Into<String>) -> Self {
        Self::Url(value.into())
    }

    pub fn bytes(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self::Bytes {
            data,
            mime: mime.into(),
        }
    }

    /// 来源标识（用于日志）。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Bytes { .. } => "bytes",
        }
    }
}

/// RGBA 像素缓冲（行优先，原点左上）。
///
/// 不变式：`data.len() == width * height * 4`，宽高均大于 0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// 构造像素缓冲，校验尺寸与长度一致。
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ScanError> {
        if width == 0 || height == 0 {
            return Err(ScanError::RasterContext(format!(
                "像素缓冲尺寸无效：{}x{}",
                width, height
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ScanError::ResourceLimit("像素缓冲长度溢出".to_string()))?;

        if data.len() != expected {
            return Err(ScanError::RasterContext(format!(
                "像素数据长度异常：{}（期望 {}）",
                data.len(),
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// 解码结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    None,
    Text(String),
}

impl DecodeResult {
    /// 空文本视为未识别，保证 `Text` 分支非空。
    pub fn from_text(text: String) -> Self {
        if text.is_empty() {
            Self::None
        } else {
            Self::Text(text)
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Text(text) => Some(text),
        }
    }
}
