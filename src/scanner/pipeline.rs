//! # 解码与结果流水线
//!
//! ## 设计思路
//!
//! 严格按 获取 → 光栅化 → 解码 → 呈现 的顺序执行；
//! 所有错误在本边界被捕获并转换为 `ScanOutcome`，调用方不会收到“静默失败”。
//!
//! ## 实现思路
//!
//! - 每次调用取一次配置快照，调用之间互不影响，可任意并发（不排队、不合并）。
//! - 光栅化与解码是 CPU 密集操作，放到 `spawn_blocking`。
//! - 进度通过 `ScanObserver` 旁路通知；每次运行输出分阶段耗时日志。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::acquire::{HttpDirectLoader, ImageAcquirer};
use super::events::{ScanEvent, ScanObserver};
use super::{DecodeResult, ImageReference, ScanConfig, ScanError, decode};
use crate::bus::MessageBus;
use crate::dispatch::ResultActions;
use crate::error::AppError;

/// 未识别到二维码时的提示。
pub const NO_CODE_HINT: &str = "未识别到二维码，请确认图片中包含清晰的二维码后重试";

/// 一次扫码的最终结果（面向用户）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Success {
        text: String,
        actions: ResultActions,
    },
    NoCode {
        hint: String,
    },
    Failed {
        code: &'static str,
        stage: &'static str,
        message: String,
    },
}

impl ScanOutcome {
    pub fn success(text: String) -> Self {
        let actions = ResultActions::from_text(&text);
        Self::Success { text, actions }
    }

    pub fn no_code() -> Self {
        Self::NoCode {
            hint: NO_CODE_HINT.to_string(),
        }
    }

    pub fn from_error(error: &ScanError) -> Self {
        Self::Failed {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }

    pub fn from_decode(result: DecodeResult) -> Self {
        match result {
            DecodeResult::Text(text) => Self::success(text),
            DecodeResult::None => Self::no_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { text, .. } => Some(text),
            _ => None,
        }
    }

    /// 面向用户的一行提示。
    pub fn message(&self) -> String {
        match self {
            Self::Success { .. } => "识别成功".to_string(),
            Self::NoCode { hint } => hint.clone(),
            Self::Failed { stage, message, .. } => format!("{} 失败：{}", stage, message),
        }
    }
}

/// 扫码流水线。可克隆，克隆共享配置与总线。
#[derive(Clone)]
pub struct ScanPipeline {
    config: Arc<RwLock<ScanConfig>>,
    acquirer: ImageAcquirer,
}

impl ScanPipeline {
    pub fn new(config: ScanConfig, acquirer: ImageAcquirer) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            acquirer,
        }
    }

    /// 使用 HTTP 同源加载器连接到一条已启动的总线。
    pub fn connect(config: ScanConfig, bus: MessageBus) -> Result<Self, AppError> {
        let direct = HttpDirectLoader::new(config.clone())?;
        Ok(Self::new(config, ImageAcquirer::new(bus, Arc::new(direct))))
    }

    pub fn config_snapshot(&self) -> ScanConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 替换配置，校验失败时保持原配置不变。
    ///
    /// 新配置从下一次扫码起作用于页面侧：来源判定、代理等待时长、data URI 体积、
    /// 像素上限与解码尺寸。同源加载器与后台代理的网络超时、重定向和下载体积上限
    /// 在 `connect` / `background::start` 时确定，需重新连接才会变化。
    pub fn set_config(&self, config: ScanConfig) -> Result<(), AppError> {
        config.validate().map_err(AppError::Config)?;
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
        Ok(())
    }

    /// 执行一次完整扫码，永不返回错误。
    pub async fn scan(&self, reference: ImageReference, observer: &dyn ScanObserver) -> ScanOutcome {
        let kind = reference.kind();
        match self.run(reference, observer).await {
            Ok(result) => {
                let outcome = ScanOutcome::from_decode(result);
                if !outcome.is_success() {
                    log::info!("🔍 未识别到二维码 - source={}", kind);
                }
                outcome
            }
            Err(err) => {
                log::warn!(
                    "❌ 扫码失败 - source={} code={} stage={} error={}",
                    kind,
                    err.code(),
                    err.stage(),
                    err
                );
                ScanOutcome::from_error(&err)
            }
        }
    }

    /// 执行 获取 → 光栅化 → 解码，保留错误类型。
    pub async fn run(
        &self,
        reference: ImageReference,
        observer: &dyn ScanObserver,
    ) -> Result<DecodeResult, ScanError> {
        let config = self.config_snapshot();
        let source = reference.kind();
        let total_start = Instant::now();

        let buffer = self.acquirer.acquire(reference, &config, observer).await?;
        let acquire_elapsed = total_start.elapsed();

        observer.on_event(&ScanEvent::Extracted {
            width: buffer.width(),
            height: buffer.height(),
        });
        observer.on_event(&ScanEvent::Decoding);

        let decode_start = Instant::now();
        let result = tokio::task::spawn_blocking(move || decode::decode(&buffer))
            .await
            .map_err(|e| ScanError::RasterContext(format!("解码任务执行失败：{}", e)))?;
        let decode_elapsed = decode_start.elapsed();

        log::info!(
            "✅ 扫码完成 - source={} found={} acquire={}ms decode={}ms total={}ms",
            source,
            result.text().is_some(),
            acquire_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(result)
    }
}
