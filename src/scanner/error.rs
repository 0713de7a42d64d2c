//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载“获取 → 提取 → 解码”链路中的所有失败来源。
//! 每个分支都能给出稳定的 `code()` 与所属阶段 `stage()`，
//! 让调用方区分“抓取失败 / 图片加载失败 / 格式不支持”，从而决定重试、换图还是放弃。
//!
//! “未识别到二维码”不是错误，而是 `DecodeResult::None`，因此不在此枚举中。

/// 扫码链路统一错误类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// 输入引用不合法（URL 无法解析、字节为空等）。
    #[error("无效的图片引用：{0}")]
    InvalidReference(String),

    /// 图片无法解码或渲染。
    #[error("图片加载失败：{0}")]
    ImageLoad(String),

    /// 代理抓取失败，携带后台返回的原始信息。
    #[error("代理抓取失败：{0}")]
    ProxyFetch(String),

    /// 无法获得光栅化表面（像素缓冲不一致等致命错误）。
    #[error("光栅化失败：{0}")]
    RasterContext(String),

    /// 对话框拒绝的 MIME 类型。
    #[error("不支持的图片格式：{0}")]
    UnsupportedFormat(String),

    /// 剪贴板无权限或不含图片。
    #[error("剪贴板不可用：{0}")]
    ClipboardUnavailable(String),

    /// 图片尺寸或体积超过限制。
    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 截图能力失败。
    #[error("截图失败：{0}")]
    Capture(String),
}

impl ScanError {
    /// 稳定的机器可读错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReference(_) => "invalid_reference",
            Self::ImageLoad(_) => "image_load",
            Self::ProxyFetch(_) => "proxy_fetch",
            Self::RasterContext(_) => "raster_context",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ClipboardUnavailable(_) => "clipboard_unavailable",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Capture(_) => "capture",
        }
    }

    /// 错误所属阶段，用于提示用户“哪一步”失败。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidReference(_) | Self::ProxyFetch(_) => "acquire",
            Self::ImageLoad(_) | Self::ResourceLimit(_) => "extract",
            Self::RasterContext(_) => "decode",
            Self::UnsupportedFormat(_) => "dialog",
            Self::ClipboardUnavailable(_) => "clipboard",
            Self::Capture(_) => "capture",
        }
    }
}
