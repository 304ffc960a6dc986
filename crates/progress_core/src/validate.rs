use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConstraints {
    pub allowed_content_types: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            allowed_content_types: vec![
                "video/mp4".to_string(),
                "video/avi".to_string(),
                "video/mov".to_string(),
                "video/webm".to_string(),
                "video/quicktime".to_string(),
            ],
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadConstraints {
    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }
}

/// What validation needs to know about the file, without touching its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// Descriptive fields sent alongside the video.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadMetadata {
    pub title: String,
    pub location_id: Option<String>,
    pub recorded_on: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl UploadMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn recorded(mut self, on: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        self.recorded_on = Some(on);
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported file type {content_type}; expected one of {allowed}")]
    UnsupportedType { content_type: String, allowed: String },
    #[error("file is {actual} bytes; the limit is {max_bytes} bytes")]
    TooLarge { max_bytes: u64, actual: u64 },
    #[error("file is empty")]
    EmptyFile,
    #[error("a title is required")]
    MissingTitle,
    #[error("recording ends at {end} before it starts at {start}")]
    InvalidTimeWindow { start: NaiveTime, end: NaiveTime },
}

/// Check a candidate upload before any network call.
///
/// Returns the metadata to submit: an empty title falls back to the file name
/// without its extension, and optional text fields are trimmed to `None` when
/// blank.
pub fn validate_upload(
    file: &FileInfo,
    metadata: UploadMetadata,
    constraints: &UploadConstraints,
) -> Result<UploadMetadata, ValidationError> {
    if !constraints.is_content_type_allowed(&file.content_type) {
        return Err(ValidationError::UnsupportedType {
            content_type: file.content_type.clone(),
            allowed: constraints.allowed_content_types.join(", "),
        });
    }
    if file.size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if file.size > constraints.max_bytes {
        return Err(ValidationError::TooLarge {
            max_bytes: constraints.max_bytes,
            actual: file.size,
        });
    }

    let mut metadata = metadata;
    metadata.title = metadata.title.trim().to_string();
    if metadata.title.is_empty() {
        metadata.title = file_stem(&file.file_name).to_string();
    }
    if metadata.title.is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    metadata.location_id = metadata
        .location_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
        if end < start {
            return Err(ValidationError::InvalidTimeWindow { start, end });
        }
    }

    Ok(metadata)
}

fn file_stem(file_name: &str) -> &str {
    let name = file_name.trim();
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::file_stem;

    #[test]
    fn file_stem_strips_last_extension_only() {
        assert_eq!(file_stem("clip.final.mp4"), "clip.final");
        assert_eq!(file_stem("clip"), "clip");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }
}
