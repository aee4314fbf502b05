//! 上传表单读取
//!
//! 文件按块读取，超过上限立即拒绝，不会把超大文件整个读进内存。

use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{AnalysisRequest, ImageUpload};
use crate::workflow::{validate_file_name, validate_size};

/// 表单字段名
const IMAGE_FIELD: &str = "image";
const GRADE_FIELD: &str = "grade";
const SUBJECT_FIELD: &str = "subject";

/// 年级、科目等文本字段的上限
const MAX_TEXT_FIELD_SIZE: usize = 1024;

/// 解析后的上传表单
#[derive(Debug, Default)]
pub struct UploadForm {
    pub image: Option<ImageUpload>,
    pub grade: Option<String>,
    pub subject: Option<String>,
}

impl UploadForm {
    /// 读取整个表单，图片字段在读取过程中完成校验
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                IMAGE_FIELD => {
                    // 没有文件名的 image 字段不是文件，按未上传处理
                    let Some(file_name) = field.file_name().map(str::to_string) else {
                        continue;
                    };
                    let extension = validate_file_name(&file_name)?;
                    let bytes = read_limited(field).await?;
                    debug!("收到上传文件: {} ({} 字节)", file_name, bytes.len());
                    form.image = Some(ImageUpload {
                        file_name,
                        extension,
                        bytes,
                    });
                }
                GRADE_FIELD => form.grade = Some(read_text_limited(field).await?),
                SUBJECT_FIELD => form.subject = Some(read_text_limited(field).await?),
                other => debug!("忽略未知表单字段: {}", other),
            }
        }

        Ok(form)
    }

    pub fn take_image(&mut self) -> Result<ImageUpload> {
        self.image
            .take()
            .ok_or_else(|| AppError::validation("没有上传图片文件"))
    }

    pub fn into_request(mut self) -> Result<AnalysisRequest> {
        let image = self.take_image()?;
        Ok(AnalysisRequest::new(image, self.grade, self.subject))
    }
}

async fn read_limited(mut field: axum::extract::multipart::Field<'_>) -> Result<Bytes> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        validate_size(buffer.len() + chunk.len())?;
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

async fn read_text_limited(mut field: axum::extract::multipart::Field<'_>) -> Result<String> {
    let name = field.name().unwrap_or_default().to_string();
    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        if buffer.len() + chunk.len() > MAX_TEXT_FIELD_SIZE {
            return Err(AppError::validation(format!("表单字段 {} 过长", name)));
        }
        buffer.extend_from_slice(&chunk);
    }
    String::from_utf8(buffer).map_err(|_| AppError::validation(format!("表单字段 {} 不是有效的文本", name)))
}

fn malformed(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation(format!("上传数据格式错误: {}", err.body_text()))
}
