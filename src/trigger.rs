//! 触发入口
//!
//! # 设计思路
//!
//! 外部触发（右键菜单、工具栏、粘贴快捷键、截图完成）统一建模为 `Trigger`，
//! 由 `TriggerRouter` 分发给扫码流水线、截图桥接或对话框宿主。
//!
//! “最近一次右键的目标”不再是隐式全局变量，而是路由器持有的显式 `ContextTarget` 槽：
//! 触发事件发生时 `record_target()`，紧随其后的动作 `take()` 一次，取走后即清空，
//! 之后的动作不能再依赖它。
//!
//! # 实现思路
//!
//! - `Trigger` 的 JSON 形态与后台下发给页面的消息一致（`action` 标签）。
//! - `ContextTarget` 内部是 `Mutex<Option<_>>`，`take` 使用 `Option::take` 保证只读一次。

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::dialog::{DialogHost, DialogOpen};
use crate::scanner::{ImageReference, ScanError, ScanObserver, ScanOutcome, ScanPipeline};
use crate::screenshot::{ScreenshotBridge, ScreenshotOutcome};

/// 外部触发。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Trigger {
    /// 右键图片“识别二维码”。
    #[serde(rename = "decodeQR")]
    DecodeImage {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    /// 工具栏“截图识别”。
    #[serde(rename = "screenshot")]
    Screenshot,
    /// 页面内粘贴快捷键 / “粘贴识别”。
    #[serde(rename = "pasteImage")]
    PasteImage,
    /// 右键链接“识别链接中的二维码”，缺省时取最近一次右键的目标（链接优先，其次图片）。
    #[serde(rename = "decodeLink")]
    DecodeLink {
        #[serde(rename = "linkUrl", default, skip_serializing_if = "Option::is_none")]
        link_url: Option<String>,
    },
}

/// 右键目标信息。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetInfo {
    pub link_url: Option<String>,
    pub image_url: Option<String>,
}

/// 只读一次的右键目标槽。
#[derive(Debug, Default)]
pub struct ContextTarget {
    slot: Mutex<Option<TargetInfo>>,
}

impl ContextTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录最近一次右键目标（覆盖旧值）。
    pub fn record(&self, target: TargetInfo) {
        *self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(target);
    }

    /// 取走目标，之后再取返回 `None`。
    pub fn take(&self) -> Option<TargetInfo> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// 分发结果。
#[derive(Clone)]
pub enum TriggerOutcome {
    Scanned(ScanOutcome),
    Screenshot(ScreenshotOutcome),
    Dialog(DialogOpen),
    /// 对应能力未配置。
    Unavailable(String),
}

impl TriggerOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Scanned(outcome) => outcome.message(),
            Self::Screenshot(outcome) => outcome.message(),
            Self::Dialog(DialogOpen::Created(_)) => "已打开粘贴识别窗口".to_string(),
            Self::Dialog(DialogOpen::Focused(_)) => "粘贴识别窗口已打开".to_string(),
            Self::Unavailable(reason) => reason.clone(),
        }
    }
}

/// 触发分发器。
pub struct TriggerRouter {
    pipeline: ScanPipeline,
    screenshot: Option<Arc<ScreenshotBridge>>,
    dialogs: Option<Arc<DialogHost>>,
    target: Arc<ContextTarget>,
}

impl TriggerRouter {
    pub fn new(pipeline: ScanPipeline, target: Arc<ContextTarget>) -> Self {
        Self {
            pipeline,
            screenshot: None,
            dialogs: None,
            target,
        }
    }

    pub fn with_screenshot(mut self, bridge: Arc<ScreenshotBridge>) -> Self {
        self.screenshot = Some(bridge);
        self
    }

    pub fn with_dialogs(mut self, host: Arc<DialogHost>) -> Self {
        self.dialogs = Some(host);
        self
    }

    /// 记录右键目标，供紧随其后的一次触发使用。
    pub fn record_target(&self, target: TargetInfo) {
        self.target.record(target);
    }

    pub async fn route(&self, trigger: Trigger, observer: &dyn ScanObserver) -> TriggerOutcome {
        log::debug!("🎯 收到触发 - {:?}", trigger);
        match trigger {
            Trigger::DecodeImage { image_url } => TriggerOutcome::Scanned(
                self.pipeline
                    .scan(ImageReference::url(image_url), observer)
                    .await,
            ),
            Trigger::DecodeLink { link_url } => {
                let link_url = link_url.or_else(|| {
                    self.target
                        .take()
                        .and_then(|target| target.link_url.or(target.image_url))
                });
                match link_url {
                    Some(url) => TriggerOutcome::Scanned(
                        self.pipeline.scan(ImageReference::url(url), observer).await,
                    ),
                    None => TriggerOutcome::Scanned(ScanOutcome::from_error(
                        &ScanError::InvalidReference("没有可识别的链接".to_string()),
                    )),
                }
            }
            Trigger::Screenshot => match &self.screenshot {
                Some(bridge) => TriggerOutcome::Screenshot(bridge.run(observer).await),
                None => TriggerOutcome::Unavailable("截图功能不可用".to_string()),
            },
            Trigger::PasteImage => match &self.dialogs {
                Some(host) => TriggerOutcome::Dialog(host.open()),
                None => TriggerOutcome::Unavailable("粘贴识别窗口不可用".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard_access::MemoryClipboard;
    use crate::dialog::Document;
    use crate::scanner::{NoopObserver, ScanConfig};
    use crate::test_support::bytes_only_pipeline;

    #[test]
    fn context_target_is_read_once() {
        let target = ContextTarget::new();
        assert_eq!(target.take(), None);

        target.record(TargetInfo {
            link_url: Some("https://example.com/a.png".into()),
            image_url: None,
        });
        assert!(target.take().is_some());
        assert_eq!(target.take(), None);
    }

    #[test]
    fn triggers_use_message_wire_format() {
        let trigger: Trigger =
            serde_json::from_str(r#"{"action":"decodeQR","imageUrl":"https://a.test/q.png"}"#)
                .expect("parse");
        assert_eq!(
            trigger,
            Trigger::DecodeImage {
                image_url: "https://a.test/q.png".into()
            }
        );

        let json = serde_json::to_string(&Trigger::PasteImage).expect("serialize");
        assert_eq!(json, r#"{"action":"pasteImage"}"#);

        let trigger: Trigger = serde_json::from_str(r#"{"action":"decodeLink"}"#).expect("parse");
        assert_eq!(trigger, Trigger::DecodeLink { link_url: None });
    }

    #[tokio::test]
    async fn decode_link_without_target_reports_invalid_reference() {
        let target = Arc::new(ContextTarget::new());
        let router = TriggerRouter::new(bytes_only_pipeline(ScanConfig::default()), target);

        let outcome = router
            .route(Trigger::DecodeLink { link_url: None }, &NoopObserver)
            .await;
        match outcome {
            TriggerOutcome::Scanned(ScanOutcome::Failed { code, .. }) => {
                assert_eq!(code, "invalid_reference")
            }
            other => panic!("unexpected outcome: {}", other.message()),
        }
    }

    #[tokio::test]
    async fn recorded_target_serves_exactly_one_decode_link() {
        let target = Arc::new(ContextTarget::new());
        let router = TriggerRouter::new(bytes_only_pipeline(ScanConfig::default()), target.clone());

        router.record_target(TargetInfo {
            link_url: None,
            image_url: Some("https://a.test/linked.png".into()),
        });
        let first = router
            .route(Trigger::DecodeLink { link_url: None }, &NoopObserver)
            .await;
        let second = router
            .route(Trigger::DecodeLink { link_url: None }, &NoopObserver)
            .await;

        // 总线没有后台消费者：第一次已取到目标并尝试代理抓取
        match first {
            TriggerOutcome::Scanned(ScanOutcome::Failed { code, .. }) => {
                assert_eq!(code, "proxy_fetch")
            }
            other => panic!("unexpected outcome: {}", other.message()),
        }
        match second {
            TriggerOutcome::Scanned(ScanOutcome::Failed { code, .. }) => {
                assert_eq!(code, "invalid_reference")
            }
            other => panic!("unexpected outcome: {}", other.message()),
        }
        assert_eq!(target.take(), None);
    }

    #[tokio::test]
    async fn missing_capabilities_are_unavailable() {
        let router = TriggerRouter::new(
            bytes_only_pipeline(ScanConfig::default()),
            Arc::new(ContextTarget::new()),
        );
        assert!(matches!(
            router.route(Trigger::Screenshot, &NoopObserver).await,
            TriggerOutcome::Unavailable(_)
        ));
        assert!(matches!(
            router.route(Trigger::PasteImage, &NoopObserver).await,
            TriggerOutcome::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn paste_trigger_opens_singleton_dialog() {
        let pipeline = bytes_only_pipeline(ScanConfig::default());
        let host = Arc::new(DialogHost::new(
            Document::new(),
            pipeline.clone(),
            Arc::new(MemoryClipboard::new()),
            tokio::runtime::Handle::current(),
        ));
        let router = TriggerRouter::new(pipeline, Arc::new(ContextTarget::new())).with_dialogs(host);

        let first = router.route(Trigger::PasteImage, &NoopObserver).await;
        let second = router.route(Trigger::PasteImage, &NoopObserver).await;
        assert!(matches!(first, TriggerOutcome::Dialog(DialogOpen::Created(_))));
        assert!(matches!(second, TriggerOutcome::Dialog(DialogOpen::Focused(_))));
    }
}
