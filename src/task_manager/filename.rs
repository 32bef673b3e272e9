//! Remote file name resolution from `Content-Disposition`

/// Name used when the task manager does not suggest one
pub const DEFAULT_FILE_NAME: &str = "outputs.zip";

const FILENAME_MARKER: &str = "filename=";

/// Extract the suggested file name from a `Content-Disposition` header value
///
/// Takes the text after the last `filename=`, skipping the opening quote and
/// dropping the final character of the header (the closing quote). A missing
/// header, a header without `filename=`, or one that leaves nothing between
/// the quotes falls back to [`DEFAULT_FILE_NAME`].
///
/// ```
/// use export_worker::task_manager::file_name_from_content_disposition;
///
/// assert_eq!(
///     file_name_from_content_disposition(Some("attachment; filename=\"out.zip\"")),
///     "out.zip"
/// );
/// assert_eq!(file_name_from_content_disposition(None), "outputs.zip");
/// ```
#[must_use]
pub fn file_name_from_content_disposition(header: Option<&str>) -> String {
    let Some(raw) = header else {
        return DEFAULT_FILE_NAME.to_string();
    };

    let Some(marker) = raw.rfind(FILENAME_MARKER) else {
        return DEFAULT_FILE_NAME.to_string();
    };

    let start = marker + FILENAME_MARKER.len() + 1;
    let end = raw.len().saturating_sub(1);

    match raw.get(start..end) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_FILE_NAME.to_string(),
    }
}
