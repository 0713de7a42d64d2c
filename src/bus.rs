//! # 跨上下文消息总线
//!
//! ## 设计思路
//!
//! 特权上下文（后台，可联网、无文档）与页面上下文（有文档、受同源限制）之间没有共享内存，
//! 只能通过请求/应答消息通信。这里把这条通道显式建模：
//!
//! - `RelayRequest` / `RelayResponse`：线上契约，JSON 形态与扩展消息一致
//! - `RelayEnvelope`：一次请求 + 一个一次性应答槽（`oneshot`）
//! - `MessageBus`：页面侧句柄，可克隆，每次 `send` 独立等待自己的应答
//!
//! 应答槽由后台持有直到应答发出，这就是“保持通道开启”的含义；
//! 槽被丢弃、总线关闭或超时都会在页面侧变成 `ProxyFetch` 错误，调用方永远不会挂起。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::scanner::ScanError;

/// 页面 → 后台 的请求。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RelayRequest {
    #[serde(rename = "fetchImage")]
    FetchImage { url: String },
}

/// 后台 → 页面 的应答，每个请求恰好一个。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RelayResponseWire", try_from = "RelayResponseWire")]
pub enum RelayResponse {
    Success { data_uri: String },
    Failure { error: String },
}

impl RelayResponse {
    pub fn success(data_uri: impl Into<String>) -> Self {
        Self::Success {
            data_uri: data_uri.into(),
        }
    }

    /// 失败信息保证非空。
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            "未知错误".to_string()
        } else {
            error
        };
        Self::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// 转换为页面侧的结果类型。
    pub fn into_result(self) -> Result<String, ScanError> {
        match self {
            Self::Success { data_uri } => Ok(data_uri),
            Self::Failure { error } => Err(ScanError::ProxyFetch(error)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RelayResponseWire {
    success: bool,
    #[serde(rename = "dataUri", default, skip_serializing_if = "Option::is_none")]
    data_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<RelayResponse> for RelayResponseWire {
    fn from(response: RelayResponse) -> Self {
        match response {
            RelayResponse::Success { data_uri } => Self {
                success: true,
                data_uri: Some(data_uri),
                error: None,
            },
            RelayResponse::Failure { error } => Self {
                success: false,
                data_uri: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<RelayResponseWire> for RelayResponse {
    type Error = String;

    fn try_from(wire: RelayResponseWire) -> Result<Self, Self::Error> {
        match (wire.success, wire.data_uri, wire.error) {
            (true, Some(data_uri), _) => Ok(Self::Success { data_uri }),
            (true, None, _) => Err("成功应答缺少 dataUri".to_string()),
            (false, _, error) => Ok(Self::failure(error.unwrap_or_default())),
        }
    }
}

/// 总线上传递的一次请求。
#[derive(Debug)]
pub struct RelayEnvelope {
    pub request: RelayRequest,
    pub reply: oneshot::Sender<RelayResponse>,
}

/// 页面侧总线句柄。
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: mpsc::Sender<RelayEnvelope>,
}

/// 创建一条总线，返回页面侧句柄与后台侧接收端。
pub fn channel(capacity: usize) -> (MessageBus, mpsc::Receiver<RelayEnvelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MessageBus { tx }, rx)
}

impl MessageBus {
    /// 发送请求并等待应答（带超时）。
    ///
    /// 总线关闭、后台丢弃应答槽或超时均返回 `ProxyFetch`。
    pub async fn send(
        &self,
        request: RelayRequest,
        timeout: Duration,
    ) -> Result<RelayResponse, ScanError> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(RelayEnvelope { request, reply })
            .await
            .map_err(|_| ScanError::ProxyFetch("后台服务不可用".to_string()))?;

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ScanError::ProxyFetch(
                "后台在应答前关闭了消息通道".to_string(),
            )),
            Err(_) => Err(ScanError::ProxyFetch(format!(
                "等待后台应答超时（{}ms）",
                timeout.as_millis()
            ))),
        }
    }
}
