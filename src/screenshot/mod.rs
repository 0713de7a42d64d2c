//! # 截图桥接
//!
//! ## 设计思路
//!
//! 截图能力本身是外部依赖，这里只负责：
//! 1. 按配置的模式调用 `ScreenCapturer`
//! 2. 把得到的字节作为 `ImageReference::Bytes` 交给扫码流水线
//! 3. 把“用户取消”“截图失败”与“未识别到二维码”区分开
//!
//! 系统实现 `XcapCapturer` 在 `screen-capture` feature 下提供。

#[cfg(feature = "screen-capture")]
mod system;

use std::sync::Arc;

use async_trait::async_trait;

use crate::scanner::{ImageReference, ScanError, ScanObserver, ScanOutcome, ScanPipeline};

#[cfg(feature = "screen-capture")]
pub use system::XcapCapturer;

/// 截图模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// 整个主显示器。
    PrimaryMonitor,
    /// 主显示器上的矩形选区（物理像素）。
    Region {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// 截图能力的失败类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("截图已取消：{0}")]
    Cancelled(String),

    #[error("{0}")]
    Failed(String),
}

/// 截图能力：`capture() -> 图片字节`。
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    async fn capture(&self, mode: CaptureMode) -> Result<Vec<u8>, CaptureError>;
}

/// 截图桥接的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotOutcome {
    /// 截图成功并已扫码（扫码本身可能未识别到二维码）。
    Scanned(ScanOutcome),
    Cancelled(String),
    Failed(String),
}

impl ScreenshotOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Scanned(outcome) => outcome.message(),
            Self::Cancelled(reason) => format!("截图已取消：{}", reason),
            Self::Failed(message) => message.clone(),
        }
    }
}

/// 截图 → 扫码。
pub struct ScreenshotBridge {
    capturer: Arc<dyn ScreenCapturer>,
    pipeline: ScanPipeline,
    mode: CaptureMode,
}

impl ScreenshotBridge {
    pub fn new(capturer: Arc<dyn ScreenCapturer>, pipeline: ScanPipeline, mode: CaptureMode) -> Self {
        Self {
            capturer,
            pipeline,
            mode,
        }
    }

    pub async fn run(&self, observer: &dyn ScanObserver) -> ScreenshotOutcome {
        let bytes = match self.capturer.capture(self.mode).await {
            Ok(bytes) if bytes.is_empty() => {
                log::info!("📸 截图未返回内容，视为取消");
                return ScreenshotOutcome::Cancelled("未选择区域".to_string());
            }
            Ok(bytes) => bytes,
            Err(CaptureError::Cancelled(reason)) => {
                log::info!("📸 用户取消截图：{}", reason);
                return ScreenshotOutcome::Cancelled(reason);
            }
            Err(CaptureError::Failed(message)) => {
                let err = ScanError::Capture(message);
                log::warn!("❌ 截图失败 - {}", err);
                return ScreenshotOutcome::Failed(err.to_string());
            }
        };

        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("image/png");
        log::info!("📸 截图完成 - {} bytes mime={}", bytes.len(), mime);

        let outcome = self
            .pipeline
            .scan(ImageReference::bytes(bytes, mime), observer)
            .await;
        ScreenshotOutcome::Scanned(outcome)
    }
}
