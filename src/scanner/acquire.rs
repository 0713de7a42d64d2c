//! # 图片获取编排
//!
//! ## 设计思路
//!
//! 运行在页面上下文，决定获取策略：
//!
//! ```text
//! ImageReference
//!    ├─ Bytes ───────────────────────────────→ 直接光栅化
//!    └─ Url ── 同源？ ── 是 → DirectLoader（无代理跳转，快路径）
//!                    └─ 否 → MessageBus → FetchRelay → data URI（慢路径，通知 Fetching）
//! ```
//!
//! `file:` 一律走代理。没有缓存：同一地址重复请求会重新抓取（服务端图片可能变化）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Url;

use super::events::{ScanEvent, ScanObserver};
use super::origin::{self, PageOrigin};
use super::{ImageReference, PixelBuffer, ScanConfig, ScanError, extract};
use crate::background::{ImageFetcher, parse_data_uri};
use crate::bus::{MessageBus, RelayRequest};

/// 已加载、尚未光栅化的图片。
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub source_hint: &'static str,
}

/// 页面上下文内的同源加载能力。
#[async_trait]
pub trait DirectLoader: Send + Sync {
    async fn load(&self, url: &Url) -> Result<Vec<u8>, ScanError>;
}

/// 基于 HTTP 客户端的同源加载器。
pub struct HttpDirectLoader {
    fetcher: ImageFetcher,
}

impl HttpDirectLoader {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let fetcher =
            ImageFetcher::new(config).map_err(|e| ScanError::ImageLoad(e.to_string()))?;
        Ok(Self { fetcher })
    }
}

#[async_trait]
impl DirectLoader for HttpDirectLoader {
    async fn load(&self, url: &Url) -> Result<Vec<u8>, ScanError> {
        self.fetcher
            .fetch(url.as_str())
            .await
            .map(|image| image.bytes)
            .map_err(|e| ScanError::ImageLoad(e.to_string()))
    }
}

/// 获取编排器。
#[derive(Clone)]
pub struct ImageAcquirer {
    bus: MessageBus,
    direct: Arc<dyn DirectLoader>,
}

impl ImageAcquirer {
    pub fn new(bus: MessageBus, direct: Arc<dyn DirectLoader>) -> Self {
        Self { bus, direct }
    }

    /// 获取并光栅化：`acquire(ref) -> PixelBuffer`。
    pub async fn acquire(
        &self,
        reference: ImageReference,
        config: &ScanConfig,
        observer: &dyn ScanObserver,
    ) -> Result<PixelBuffer, ScanError> {
        let load_start = Instant::now();
        let loaded = self.load(reference, config, observer).await?;
        let load_elapsed = load_start.elapsed();
        let source_hint = loaded.source_hint;

        let extract_start = Instant::now();
        let extract_config = config.clone();
        let buffer =
            tokio::task::spawn_blocking(move || extract::extract(&loaded.bytes, &extract_config))
                .await
                .map_err(|e| ScanError::RasterContext(format!("光栅化任务执行失败：{}", e)))??;

        log::info!(
            "🧩 图片已就绪 - source={} {}x{} load={}ms extract={}ms",
            source_hint,
            buffer.width(),
            buffer.height(),
            load_elapsed.as_millis(),
            extract_start.elapsed().as_millis()
        );
        Ok(buffer)
    }

    /// 只做获取，不光栅化。
    pub async fn load(
        &self,
        reference: ImageReference,
        config: &ScanConfig,
        observer: &dyn ScanObserver,
    ) -> Result<LoadedImage, ScanError> {
        match reference {
            ImageReference::Bytes { data, mime } => {
                if data.is_empty() {
                    return Err(ScanError::InvalidReference("图片字节为空".to_string()));
                }
                log::debug!("📝 直接使用图片字节 - {} bytes mime={}", data.len(), mime);
                Ok(LoadedImage {
                    bytes: data,
                    source_hint: "bytes",
                })
            }
            ImageReference::Url(raw) => self.load_url(&raw, config, observer).await,
        }
    }

    async fn load_url(
        &self,
        raw: &str,
        config: &ScanConfig,
        observer: &dyn ScanObserver,
    ) -> Result<LoadedImage, ScanError> {
        let page_origin = config
            .page_origin
            .as_deref()
            .map(PageOrigin::parse)
            .transpose()?;
        let url = origin::resolve_image_url(raw, page_origin.as_ref())?;

        if origin::is_same_origin(&url, page_origin.as_ref()) {
            log::info!("🏠 同源图片，直接加载 - {}", origin::redact_url_for_log(url.as_str()));
            let bytes = self.direct.load(&url).await?;
            return Ok(LoadedImage {
                bytes,
                source_hint: "direct",
            });
        }

        let redacted = origin::redact_url_for_log(url.as_str());
        log::info!("🛰️ 跨域图片，经后台代理抓取 - {}", redacted);
        observer.on_event(&ScanEvent::Fetching { url: redacted });

        let data_uri = self
            .bus
            .send(
                RelayRequest::FetchImage {
                    url: url.to_string(),
                },
                Duration::from_millis(config.relay_timeout_ms),
            )
            .await?
            .into_result()?;

        let image = parse_data_uri(&data_uri, config.max_file_size)
            .map_err(|e| ScanError::ImageLoad(format!("代理返回的数据无法加载：{}", e)))?;

        Ok(LoadedImage {
            bytes: image.bytes,
            source_hint: "relay",
        })
    }
}
