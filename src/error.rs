//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 扫码流水线内部使用 `ScanError`（带 `code()` / `stage()`，用于区分“哪一步失败”），
//! 而配置加载、结果分发、命令行入口等外围逻辑统一返回 `AppError`，
//! 替代分散的 `.map_err(|e| e.to_string())`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ScanError`、`std::io::Error` 提供 `From` 转换，`?` 即可传播。
//! - 实现 `Serialize` 将错误序列化为字符串，便于结构化输出。

use serde::Serialize;

use crate::background::FetchError;
use crate::scanner::ScanError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 配置文件缺失字段、格式错误或取值越界
    #[error("配置错误: {0}")]
    Config(String),

    /// 扫码流水线错误（获取 / 光栅化 / 解码 / 剪贴板 / 截图）
    #[error("{0}")]
    Scan(#[from] ScanError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 打开链接失败（非链接文本、协议被拒绝或系统打开器启动失败）
    #[error("打开链接失败: {0}")]
    Open(String),
}

/// 后台服务启动失败（HTTP 客户端无法构建）按代理失败处理。
impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        Self::Scan(ScanError::ProxyFetch(err.to_string()))
    }
}

impl AppError {
    /// 进程退出码：配置问题与运行期失败区分开。
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_errors_convert_transparently() {
        let err: AppError = ScanError::ProxyFetch("HTTP 404: Not Found".into()).into();
        assert_eq!(err.to_string(), ScanError::ProxyFetch("HTTP 404: Not Found".into()).to_string());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn serializes_as_plain_string() {
        let err = AppError::Config("max_redirects 超出范围".into());
        let json = serde_json::to_string(&err).expect("serialize");
        assert_eq!(json, "\"配置错误: max_redirects 超出范围\"");
        assert_eq!(err.exit_code(), 2);
    }
}
