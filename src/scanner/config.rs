//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ScanConfig`，保证运行时行为可观测、可调整、可测试。
//! 字段覆盖抓取、代理、光栅化、解码与对话框输入五个阶段。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用配置；`#[serde(default)]` 允许配置文件只写需要覆盖的字段。
//! - `validate` 在加载时做范围校验，尽早拒绝明显错误的值。

use serde::{Deserialize, Serialize};

/// 对话框默认接受的图片 MIME 类型。
pub const DEFAULT_ACCEPTED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/bmp",
    "image/gif",
    "image/webp",
];

/// 扫码配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 下载/读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 网络下载总超时（秒）。
    pub download_timeout: u64,
    /// 建立连接超时（秒）。
    pub connect_timeout: u64,
    /// 下载首包超时（毫秒）。
    pub stream_first_byte_timeout_ms: u64,
    /// 下载分块读取超时（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// 页面侧等待代理应答的上限（毫秒）。
    pub relay_timeout_ms: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 送入解码器前的单边最大尺寸，超出时先降采样。
    pub decode_max_dimension: u32,
    /// 拖放与选文件允许的 MIME 类型。
    pub accepted_mime_types: Vec<String>,
    /// Ctrl+V 后等待系统 paste 事件的时间（毫秒），超时才主动读剪贴板。
    pub paste_event_grace_ms: u64,
    /// 当前页面来源（`scheme://host:port`），为空时所有 URL 视为跨域。
    pub page_origin: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            stream_first_byte_timeout_ms: 10_000,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
            relay_timeout_ms: 45_000,
            max_decoded_pixels: 40_000_000,
            decode_max_dimension: 2048,
            accepted_mime_types: DEFAULT_ACCEPTED_MIME_TYPES
                .iter()
                .map(|mime| mime.to_string())
                .collect(),
            paste_event_grace_ms: 60,
            page_origin: None,
        }
    }
}

impl ScanConfig {
    /// 范围校验。
    pub fn validate(&self) -> Result<(), String> {
        if self.max_file_size < 1024 {
            return Err("max_file_size 不能小于 1KB".to_string());
        }
        if !(1..=300).contains(&self.download_timeout) {
            return Err("download_timeout 必须在 1~300 秒之间".to_string());
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err("connect_timeout 必须在 1~120 秒之间".to_string());
        }
        if !(500..=120_000).contains(&self.stream_first_byte_timeout_ms) {
            return Err("stream_first_byte_timeout_ms 必须在 500~120000 毫秒之间".to_string());
        }
        if !(500..=120_000).contains(&self.stream_chunk_timeout_ms) {
            return Err("stream_chunk_timeout_ms 必须在 500~120000 毫秒之间".to_string());
        }
        if self.relay_timeout_ms < 1_000 {
            return Err("relay_timeout_ms 不能小于 1000 毫秒".to_string());
        }
        if self.decode_max_dimension < 64 {
            return Err("decode_max_dimension 不能小于 64".to_string());
        }
        if self.accepted_mime_types.is_empty() {
            return Err("accepted_mime_types 不能为空".to_string());
        }
        if self.paste_event_grace_ms > 2_000 {
            return Err("paste_event_grace_ms 不能大于 2000 毫秒".to_string());
        }
        Ok(())
    }

    /// MIME 是否在接受列表中（忽略大小写与参数）。
    pub fn accepts_mime(&self, mime: &str) -> bool {
        let base = mime
            .split(';')
            .next()
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();

        !base.is_empty()
            && self
                .accepted_mime_types
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(&base))
    }
}
