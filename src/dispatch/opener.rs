use crate::error::AppError;

/// 用系统默认程序打开链接。
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), AppError>;
}

/// 平台打开器：macOS `open`，Linux `xdg-open`，Windows `cmd /C start`。
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    #[cfg(target_os = "macos")]
    fn open(&self, url: &str) -> Result<(), AppError> {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| AppError::Open(format!("启动 open 失败: {}", e)))?;
        Ok(())
    }

    #[cfg(target_os = "windows")]
    fn open(&self, url: &str) -> Result<(), AppError> {
        // start 的第一个引号参数是窗口标题
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
            .map_err(|e| AppError::Open(format!("启动 start 失败: {}", e)))?;
        Ok(())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn open(&self, url: &str) -> Result<(), AppError> {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| AppError::Open(format!("启动 xdg-open 失败: {}", e)))?;
        Ok(())
    }
}
