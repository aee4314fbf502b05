pub mod homework;

pub use homework::{
    AnalysisRequest, AnalysisResult, ImageUpload, RecognizedText, DEFAULT_GRADE, DEFAULT_SUBJECT,
};
