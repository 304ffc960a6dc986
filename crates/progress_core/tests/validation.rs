use chrono::{NaiveDate, NaiveTime};
use pretty_assertions::assert_eq;
use progress_core::{
    validate_upload, FileInfo, UploadConstraints, UploadMetadata, ValidationError,
    DEFAULT_MAX_UPLOAD_BYTES,
};

fn video(name: &str, content_type: &str, size: u64) -> FileInfo {
    FileInfo {
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        size,
    }
}

#[test]
fn accepts_supported_video_and_defaults_title_to_file_stem() {
    let file = video("baliwasan_morning.mp4", "video/mp4", 10 * 1024 * 1024);
    let metadata = UploadMetadata::titled("   ").at_location(" 3 ");

    let checked = validate_upload(&file, metadata, &UploadConstraints::default()).unwrap();
    assert_eq!(checked.title, "baliwasan_morning");
    assert_eq!(checked.location_id.as_deref(), Some("3"));
}

#[test]
fn content_type_parameters_and_case_are_ignored() {
    let file = video("clip.mov", "Video/QuickTime; codecs=avc1", 1);
    assert!(validate_upload(&file, UploadMetadata::default(), &UploadConstraints::default()).is_ok());
}

#[test]
fn rejects_unsupported_type_before_anything_else() {
    let file = video("notes.txt", "text/plain", 0);
    let err = validate_upload(&file, UploadMetadata::default(), &UploadConstraints::default())
        .unwrap_err();
    assert!(matches!(err, ValidationError::UnsupportedType { ref content_type, .. } if content_type == "text/plain"));
}

#[test]
fn rejects_empty_and_oversized_files() {
    let constraints = UploadConstraints::default();
    let empty = video("a.mp4", "video/mp4", 0);
    assert_eq!(
        validate_upload(&empty, UploadMetadata::default(), &constraints),
        Err(ValidationError::EmptyFile)
    );

    let huge = video("a.mp4", "video/mp4", DEFAULT_MAX_UPLOAD_BYTES + 1);
    assert_eq!(
        validate_upload(&huge, UploadMetadata::default(), &constraints),
        Err(ValidationError::TooLarge {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            actual: DEFAULT_MAX_UPLOAD_BYTES + 1,
        })
    );

    let at_limit = video("a.mp4", "video/mp4", DEFAULT_MAX_UPLOAD_BYTES);
    assert!(validate_upload(&at_limit, UploadMetadata::default(), &constraints).is_ok());
}

#[test]
fn rejects_missing_title_when_file_name_has_no_stem() {
    let file = video("   ", "video/webm", 10);
    assert_eq!(
        validate_upload(&file, UploadMetadata::default(), &UploadConstraints::default()),
        Err(ValidationError::MissingTitle)
    );
}

#[test]
fn rejects_recording_window_that_ends_before_it_starts() {
    let start = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    let end = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    let metadata = UploadMetadata::titled("rush hour").recorded(day, start, end);

    let file = video("rush.mp4", "video/mp4", 10);
    assert_eq!(
        validate_upload(&file, metadata, &UploadConstraints::default()),
        Err(ValidationError::InvalidTimeWindow { start, end })
    );
}

#[test]
fn custom_constraints_replace_the_defaults() {
    let constraints = UploadConstraints {
        allowed_content_types: vec!["video/x-matroska".to_string()],
        max_bytes: 100,
    };
    let mp4 = video("a.mp4", "video/mp4", 10);
    assert!(validate_upload(&mp4, UploadMetadata::default(), &constraints).is_err());

    let mkv = video("a.mkv", "video/x-matroska", 100);
    assert!(validate_upload(&mkv, UploadMetadata::default(), &constraints).is_ok());
}
