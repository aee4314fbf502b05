pub mod health;
pub mod homework_flow;
pub mod upload;

pub use health::{ProbeStatus, ServiceHealth};
pub use homework_flow::{HomeworkFlow, HomeworkOutcome, Stage, ANALYSIS_DISPLAY_NAME, MIN_TEXT_CHARS};
pub use upload::{file_extension, validate_file_name, validate_size, ALLOWED_EXTENSIONS, MAX_FILE_SIZE};
