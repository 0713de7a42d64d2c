//! # 代理抓取服务
//!
//! ## 设计思路
//!
//! `FetchRelay::handle` 是纯粹的“请求 → 应答”函数：任何失败都写进应答，永不向总线抛错。
//! `spawn_relay` 把它挂到总线接收端：每个请求独立 spawn 一个任务，
//! 请求之间没有共享可变状态，慢请求不会阻塞后续请求。

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::fetch::{FetchError, ImageFetcher};
use crate::bus::{RelayEnvelope, RelayRequest, RelayResponse};
use crate::scanner::ScanConfig;
use crate::scanner::origin::redact_url_for_log;

/// 后台代理抓取。
pub struct FetchRelay {
    fetcher: ImageFetcher,
}

impl FetchRelay {
    pub fn new(config: ScanConfig) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: ImageFetcher::new(config)?,
        })
    }

    /// 处理一次请求，失败同样以应答返回。
    pub async fn handle(&self, request: RelayRequest) -> RelayResponse {
        match request {
            RelayRequest::FetchImage { url } => {
                let start = Instant::now();
                match self.fetcher.fetch(&url).await {
                    Ok(image) => {
                        log::info!(
                            "✅ 代理抓取成功 - {} {} bytes mime={} {}ms",
                            redact_url_for_log(&url),
                            image.bytes.len(),
                            image.mime,
                            start.elapsed().as_millis()
                        );
                        RelayResponse::success(image.to_data_uri())
                    }
                    Err(err) => {
                        log::warn!("⚠️ 代理抓取失败 - {}：{}", redact_url_for_log(&url), err);
                        RelayResponse::failure(err.to_string())
                    }
                }
            }
        }
    }
}

/// 在后台消费总线请求，直到所有页面侧句柄被丢弃。
pub fn spawn_relay(
    relay: Arc<FetchRelay>,
    mut rx: mpsc::Receiver<RelayEnvelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("🛰️ 代理抓取服务已启动");

        while let Some(envelope) = rx.recv().await {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                let RelayEnvelope { request, reply } = envelope;
                let response = relay.handle(request).await;
                if reply.send(response).is_err() {
                    log::debug!("页面侧已放弃等待，丢弃代理应答");
                }
            });
        }

        log::info!("🛰️ 代理抓取服务已停止");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_scheme_is_a_failure_response() {
        let relay = FetchRelay::new(ScanConfig::default()).expect("relay init");
        let response = relay
            .handle(RelayRequest::FetchImage {
                url: "ftp://example.com/qr.png".into(),
            })
            .await;

        assert!(matches!(response, RelayResponse::Failure { ref error } if !error.is_empty()));
    }

    #[tokio::test]
    async fn malformed_url_is_a_failure_response() {
        let relay = FetchRelay::new(ScanConfig::default()).expect("relay init");
        let response = relay
            .handle(RelayRequest::FetchImage {
                url: "not a url".into(),
            })
            .await;

        assert!(!response.is_success());
    }
}
