use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::scanner::ScanConfig;

const SETTINGS_DIR: &str = "qr-scanner";
const SETTINGS_FILE: &str = "settings.json";

/// 默认设置文件位置：`<config_dir>/qr-scanner/settings.json`。
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// 加载扫码配置。
///
/// 显式路径必须存在；默认路径不存在时使用默认配置。
pub fn load_settings(explicit: Option<&Path>) -> Result<ScanConfig, AppError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_settings_path() {
            Some(path) if path.exists() => path,
            _ => {
                log::debug!("⚙️ 未找到设置文件，使用默认配置");
                return Ok(ScanConfig::default());
            }
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| AppError::Config(format!("读取设置文件失败 {}: {}", path.display(), e)))?;
    let config = parse_settings(&content)?;
    log::info!("⚙️ 已加载设置文件 - {}", path.display());
    Ok(config)
}

/// 解析并校验设置内容。
pub fn parse_settings(content: &str) -> Result<ScanConfig, AppError> {
    let config = serde_json::from_str::<ScanConfig>(content)
        .map_err(|e| AppError::Config(format!("解析设置文件失败: {}", e)))?;
    config.validate().map_err(AppError::Config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn explicit_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"page_origin": "https://example.com", "max_redirects": 2}}"#).expect("write");

        let config = load_settings(Some(file.path())).expect("load");
        assert_eq!(config.page_origin.as_deref(), Some("https://example.com"));
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.relay_timeout_ms, ScanConfig::default().relay_timeout_ms);
    }

    #[test]
    fn malformed_or_invalid_settings_are_config_errors() {
        assert!(matches!(parse_settings("{not json"), Err(AppError::Config(_))));
        assert!(matches!(
            parse_settings(r#"{"connect_timeout": 0}"#),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = load_settings(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
