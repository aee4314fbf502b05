//! 上传文件校验
//!
//! 在任何外部调用之前完成：文件名、扩展名、大小。

use std::path::Path;

use crate::error::{AppError, Result};

/// 允许的图片扩展名（小写，带点）
pub static ALLOWED_EXTENSIONS: phf::Set<&'static str> = phf::phf_set! {
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp",
};

/// 单个文件上限 10MB
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// 小写扩展名，带点；没有扩展名时为空串
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// 校验文件名并返回扩展名
pub fn validate_file_name(file_name: &str) -> Result<String> {
    if file_name.is_empty() {
        return Err(AppError::validation("没有选择文件"));
    }

    let extension = file_extension(file_name);
    if !ALLOWED_EXTENSIONS.contains(extension.as_str()) {
        return Err(AppError::validation(format!(
            "不支持的文件类型 {}，请上传图片文件",
            extension
        )));
    }

    Ok(extension)
}

pub fn validate_size(size: usize) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(AppError::validation(format!(
            "文件太大，最大支持{}MB",
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions_case_insensitive() {
        assert_eq!(validate_file_name("作业.JPG").unwrap(), ".jpg");
        assert_eq!(validate_file_name("scan.final.webp").unwrap(), ".webp");
    }

    #[test]
    fn test_rejected_extension_is_named() {
        let err = validate_file_name("virus.exe").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains(".exe"));
    }

    #[test]
    fn test_missing_extension_and_empty_name() {
        assert!(validate_file_name("README").is_err());
        assert_eq!(validate_file_name("").unwrap_err().to_string(), "没有选择文件");
    }

    #[test]
    fn test_size_ceiling_is_inclusive() {
        assert!(validate_size(MAX_FILE_SIZE).is_ok());
        let err = validate_size(MAX_FILE_SIZE + 1).unwrap_err();
        assert_eq!(err.to_string(), "文件太大，最大支持10MB");
    }
}
