use std::fmt;

use axum::body::Bytes;

/// 未提供年级时的默认值
pub const DEFAULT_GRADE: &str = "高中";
/// 未提供科目时的默认值
pub const DEFAULT_SUBJECT: &str = "数学";

/// 已通过校验的上传图片
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// 原始文件名
    pub file_name: String,
    /// 小写扩展名，带点（如 `.png`）
    pub extension: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 一次作业处理请求
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: ImageUpload,
    pub grade: String,
    pub subject: String,
}

impl AnalysisRequest {
    /// 年级、科目缺省或为空白时使用默认值
    pub fn new(image: ImageUpload, grade: Option<String>, subject: Option<String>) -> Self {
        Self {
            image,
            grade: or_default(grade, DEFAULT_GRADE),
            subject: or_default(subject, DEFAULT_SUBJECT),
        }
    }
}

pub(crate) fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// OCR 识别出的文字
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedText {
    pub content: String,
}

impl RecognizedText {
    /// 按服务返回的顺序用换行拼接各行文字
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let content = lines
            .into_iter()
            .map(|line| line.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self { content }
    }

    /// 去掉首尾空白后的字符数
    pub fn meaningful_chars(&self) -> usize {
        self.content.trim().chars().count()
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

impl fmt::Display for RecognizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// AI 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> ImageUpload {
        ImageUpload {
            file_name: "hw.png".to_string(),
            extension: ".png".to_string(),
            bytes: Bytes::from_static(b"png"),
        }
    }

    #[test]
    fn test_defaults_apply_to_missing_and_blank_metadata() {
        let request = AnalysisRequest::new(upload(), None, Some("  ".to_string()));
        assert_eq!(request.grade, DEFAULT_GRADE);
        assert_eq!(request.subject, DEFAULT_SUBJECT);

        let request = AnalysisRequest::new(upload(), Some("初二".to_string()), Some("物理".to_string()));
        assert_eq!(request.grade, "初二");
        assert_eq!(request.subject, "物理");
    }

    #[test]
    fn test_lines_joined_in_order() {
        let text = RecognizedText::from_lines(["1. 计算", "2+3=?"]);
        assert_eq!(text.content, "1. 计算\n2+3=?");
        assert_eq!(text.meaningful_chars(), 11);
    }
}
