use std::sync::Arc;

use tokio::runtime::Handle;

use super::document::Document;
use super::session::{CONTAINER_ID, CaptureDialog, DIALOG_ELEMENT_IDS, SURFACE_ID};
use crate::clipboard_access::ClipboardAccess;
use crate::scanner::ScanPipeline;

/// 打开请求的结果。
#[derive(Clone)]
pub enum DialogOpen {
    /// 新建了对话框。
    Created(CaptureDialog),
    /// 已有对话框，只移动了焦点。
    Focused(CaptureDialog),
}

impl DialogOpen {
    pub fn dialog(&self) -> &CaptureDialog {
        match self {
            Self::Created(dialog) | Self::Focused(dialog) => dialog,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// 每个文档至多一个对话框。
///
/// 打开前按保留 id 在文档上查找现有会话（先查后建），存在则只聚焦。
/// 会话登记在文档里，同一文档上的多个宿主看到的是同一个对话框。
pub struct DialogHost {
    document: Document,
    pipeline: ScanPipeline,
    clipboard: Arc<dyn ClipboardAccess>,
    runtime: Handle,
}

impl DialogHost {
    pub fn new(
        document: Document,
        pipeline: ScanPipeline,
        clipboard: Arc<dyn ClipboardAccess>,
        runtime: Handle,
    ) -> Self {
        Self {
            document,
            pipeline,
            clipboard,
            runtime,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn open(&self) -> DialogOpen {
        if let Some(existing) = self.current() {
            self.document.focus(SURFACE_ID);
            log::debug!("🪟 对话框已存在，移动焦点");
            return DialogOpen::Focused(existing);
        }

        if self.document.contains(CONTAINER_ID) {
            log::warn!("⚠️ 发现无主的对话框容器，重新创建");
            for id in DIALOG_ELEMENT_IDS {
                self.document.unmount(id);
            }
        }

        DialogOpen::Created(CaptureDialog::open(
            self.document.clone(),
            self.pipeline.clone(),
            Arc::clone(&self.clipboard),
            self.runtime.clone(),
        ))
    }

    /// 文档上当前打开的对话框。
    pub fn current(&self) -> Option<CaptureDialog> {
        CaptureDialog::find(&self.document)
    }
}
