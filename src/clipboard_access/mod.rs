//! # 剪贴板接口
//!
//! ## 设计思路
//!
//! 读取：返回带类型的条目列表（图片统一为 `image/png`，文本为 `text/plain`），
//! 由调用方挑选首个图片条目；写入：只支持纯文本（“复制”动作）。
//!
//! ## 实现思路
//!
//! - `ClipboardAccess` trait 隔离系统剪贴板，对话框与分发器只依赖 trait。
//! - `SystemClipboard` 基于 `arboard`，所有系统调用放进 `spawn_blocking`，避免阻塞 async 运行时。
//! - arboard 给出的是 RGBA 原始像素，这里重新编码为 PNG，使其与粘贴事件携带的数据形态一致。
//! - `MemoryClipboard` 是进程内实现，用于无桌面环境与测试。

use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};

use crate::scanner::{ImageReference, ScanError};

/// 剪贴板中的一个条目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    pub mime: String,
    pub data: Vec<u8>,
}

impl ClipboardItem {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.to_ascii_lowercase().starts_with("image/")
    }
}

/// 剪贴板读写能力。
#[async_trait]
pub trait ClipboardAccess: Send + Sync {
    async fn read_items(&self) -> Result<Vec<ClipboardItem>, ScanError>;
    async fn write_text(&self, text: &str) -> Result<(), ScanError>;
}

/// 读取剪贴板并取第一个图片条目。没有图片 → `ClipboardUnavailable`。
pub async fn read_first_image(clipboard: &dyn ClipboardAccess) -> Result<ImageReference, ScanError> {
    clipboard
        .read_items()
        .await?
        .into_iter()
        .find(|item| item.is_image() && !item.data.is_empty())
        .map(|item| ImageReference::bytes(item.data, item.mime))
        .ok_or_else(|| ScanError::ClipboardUnavailable("剪贴板中没有图片".to_string()))
}

/// 系统剪贴板（arboard）。
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[async_trait]
impl ClipboardAccess for SystemClipboard {
    async fn read_items(&self) -> Result<Vec<ClipboardItem>, ScanError> {
        tokio::task::spawn_blocking(read_system_items)
            .await
            .map_err(|e| ScanError::ClipboardUnavailable(format!("剪贴板读取任务失败：{}", e)))?
    }

    async fn write_text(&self, text: &str) -> Result<(), ScanError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| ScanError::ClipboardUnavailable(e.to_string()))?;
            clipboard
                .set_text(text)
                .map_err(|e| ScanError::ClipboardUnavailable(format!("写入剪贴板失败：{}", e)))
        })
        .await
        .map_err(|e| ScanError::ClipboardUnavailable(format!("剪贴板写入任务失败：{}", e)))?
    }
}

fn read_system_items() -> Result<Vec<ClipboardItem>, ScanError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ScanError::ClipboardUnavailable(e.to_string()))?;

    let mut items = Vec::new();

    if let Ok(image_data) = clipboard.get_image() {
        let width = image_data.width as u32;
        let height = image_data.height as u32;
        match encode_png(width, height, image_data.bytes.into_owned()) {
            Ok(png) => items.push(ClipboardItem::new("image/png", png)),
            Err(err) => log::warn!("⚠️ 剪贴板图片重新编码失败：{}", err),
        }
    }

    if let Ok(text) = clipboard.get_text() {
        if !text.is_empty() {
            items.push(ClipboardItem::new("text/plain", text.into_bytes()));
        }
    }

    log::debug!("📋 读取剪贴板 - {} 个条目", items.len());
    Ok(items)
}

fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> Result<Vec<u8>, ScanError> {
    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| ScanError::ClipboardUnavailable("剪贴板图片缓冲区长度异常".to_string()))?;

    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ScanError::ClipboardUnavailable(format!("编码 PNG 失败：{}", e)))?;
    Ok(cursor.into_inner())
}

/// 进程内剪贴板。
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    items: Mutex<Vec<ClipboardItem>>,
    written: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<ClipboardItem>) -> Self {
        Self {
            items: Mutex::new(items),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn set_items(&self, items: Vec<ClipboardItem>) {
        *self.items.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }

    /// 历次 `write_text` 写入的文本。
    pub fn written_texts(&self) -> Vec<String> {
        self.written.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ClipboardAccess for MemoryClipboard {
    async fn read_items(&self) -> Result<Vec<ClipboardItem>, ScanError> {
        Ok(self.items.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn write_text(&self, text: &str) -> Result<(), ScanError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        *items = vec![ClipboardItem::new("text/plain", text.as_bytes().to_vec())];
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn picks_first_image_item() {
        let clipboard = MemoryClipboard::with_items(vec![
            ClipboardItem::new("text/plain", b"hello".to_vec()),
            ClipboardItem::new("image/png", vec![1, 2, 3]),
        ]);

        let reference = read_first_image(&clipboard).await.expect("image item");
        assert_eq!(reference, ImageReference::bytes(vec![1, 2, 3], "image/png"));
    }

    #[tokio::test]
    async fn text_only_clipboard_is_unavailable() {
        let clipboard = MemoryClipboard::with_items(vec![ClipboardItem::new(
            "text/plain",
            b"hello".to_vec(),
        )]);

        let err = read_first_image(&clipboard).await.expect_err("no image");
        assert_eq!(err.code(), "clipboard_unavailable");
    }

    #[tokio::test]
    async fn write_text_replaces_items() {
        let clipboard = MemoryClipboard::with_items(vec![ClipboardItem::new("image/png", vec![9])]);
        clipboard.write_text("copied").await.expect("write");

        assert_eq!(clipboard.written_texts(), vec!["copied".to_string()]);
        assert!(read_first_image(&clipboard).await.is_err());
    }

    #[test]
    fn encodes_rgba_as_png() {
        let png = encode_png(2, 2, vec![255; 16]).expect("encode");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(encode_png(2, 2, vec![255; 15]).is_err());
    }
}
