//! 对话框状态模型
//!
//! ```text
//! idle ──(选文件 / 拖放 / 粘贴)──→ loaded ──(自动)──→ scanning ──→ success | error
//!   ↑                                ↑                              │
//!   └────────────(清除)──────────────┴──────(重新扫描 / 重新载入)─────┘
//! 任意状态 ──(关闭 / Esc / 点击遮罩)──→ closed
//! ```

use crate::dispatch::ResultActions;
use crate::scanner::ScanOutcome;

/// 对话框阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPhase {
    Idle,
    Loaded,
    Scanning,
    Success,
    Error,
    Closed,
}

impl DialogPhase {
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }

    /// 拖放区只在没有图片时可用。
    pub fn accepts_file(self) -> bool {
        self == Self::Idle
    }

    /// 扫描中或刚载入时，相同图片不重复扫描。
    pub fn ignores_duplicates(self) -> bool {
        matches!(self, Self::Loaded | Self::Scanning)
    }

    pub fn can_rescan(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    pub fn can_clear(self) -> bool {
        matches!(self, Self::Loaded | Self::Scanning | Self::Success | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loaded => "loaded",
            Self::Scanning => "scanning",
            Self::Success => "success",
            Self::Error => "error",
            Self::Closed => "closed",
        }
    }
}

/// 当前图片的预览信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreview {
    pub mime: String,
    pub byte_len: usize,
}

/// 一次输入的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDisposition {
    /// 图片已载入并开始扫描。
    Accepted,
    /// 与当前图片完全相同，忽略。
    Duplicate,
    /// 当前阶段不接受该输入（拖放区已隐藏、对话框已关闭等）。
    Inactive,
}

/// 对外发布的状态快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogSnapshot {
    pub phase: DialogPhase,
    pub generation: u64,
    pub preview: Option<ImagePreview>,
    pub text: Option<String>,
    pub actions: Option<ResultActions>,
    /// 提示或错误信息。
    pub message: Option<String>,
}

impl DialogSnapshot {
    pub fn idle() -> Self {
        Self {
            phase: DialogPhase::Idle,
            generation: 0,
            preview: None,
            text: None,
            actions: None,
            message: None,
        }
    }

    pub(crate) fn apply_outcome(&mut self, outcome: ScanOutcome) {
        self.message = Some(outcome.message());
        match outcome {
            ScanOutcome::Success { text, actions } => {
                self.phase = DialogPhase::Success;
                self.text = Some(text);
                self.actions = Some(actions);
            }
            ScanOutcome::NoCode { .. } | ScanOutcome::Failed { .. } => {
                self.phase = DialogPhase::Error;
                self.text = None;
                self.actions = None;
            }
        }
    }
}
