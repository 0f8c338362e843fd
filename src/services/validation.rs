//! Synchronous input checks run before any external call.

use super::error::{UploadError, UploadResult};
use super::object_key;
use crate::config::UploadSettings;

const MAX_FILENAME_LEN: usize = 255;
const MAX_MIME_LEN: usize = 127;

pub fn principal(principal: &str) -> UploadResult<()> {
    if object_key::is_valid_principal(principal) {
        Ok(())
    } else {
        Err(UploadError::validation("invalid user id"))
    }
}

pub fn batch_len(len: usize, settings: &UploadSettings) -> UploadResult<()> {
    if len == 0 {
        return Err(UploadError::validation("at least one file is required"));
    }
    if len > settings.max_files_per_batch {
        return Err(UploadError::Validation(format!(
            "at most {} files may be uploaded at once, got {}",
            settings.max_files_per_batch, len
        )));
    }
    Ok(())
}

pub fn filename(name: &str) -> UploadResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(UploadError::validation("filename is required"));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(UploadError::Validation(format!(
            "filename exceeds {} bytes",
            MAX_FILENAME_LEN
        )));
    }
    if trimmed == "." || trimmed == ".." || name.contains(['/', '\\']) {
        return Err(UploadError::Validation(format!("invalid filename `{}`", name)));
    }
    if name.chars().any(char::is_control) {
        return Err(UploadError::validation("filename contains control characters"));
    }
    Ok(())
}

/// Accepts `type/subtype` with optional parameters (`text/plain; charset=utf-8`).
pub fn mime_type(mime: &str) -> UploadResult<()> {
    let essence = mime.split(';').next().unwrap_or("").trim();
    if essence.is_empty() {
        return Err(UploadError::validation("mimetype is required"));
    }
    let valid = mime.len() <= MAX_MIME_LEN
        && matches!(essence.split_once('/'), Some((t, s))
            if !t.is_empty() && !s.is_empty() && !s.contains('/')
                && essence.bytes().all(|b| b.is_ascii_graphic()));
    if valid {
        Ok(())
    } else {
        Err(UploadError::Validation(format!("invalid mimetype `{}`", mime)))
    }
}

pub fn file_size(size: i64, settings: &UploadSettings) -> UploadResult<()> {
    if size <= 0 {
        return Err(UploadError::validation("file size must be greater than zero"));
    }
    if size > settings.max_file_size_bytes {
        return Err(UploadError::Validation(format!(
            "file size {} exceeds the {} byte limit",
            size, settings.max_file_size_bytes
        )));
    }
    Ok(())
}

pub fn file(name: &str, mime: &str, size: i64, settings: &UploadSettings) -> UploadResult<()> {
    filename(name)?;
    mime_type(mime)?;
    file_size(size, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames() {
        assert!(filename("a.pdf").is_ok());
        assert!(filename("Lecture notes 1.docx").is_ok());
        assert!(filename("").is_err());
        assert!(filename("   ").is_err());
        assert!(filename("..").is_err());
        assert!(filename("dir/a.pdf").is_err());
        assert!(filename("a\nb.pdf").is_err());
        assert!(filename(&"a".repeat(256)).is_err());
    }

    #[test]
    fn mime_types() {
        assert!(mime_type("application/pdf").is_ok());
        assert!(mime_type("text/plain; charset=utf-8").is_ok());
        assert!(mime_type("").is_err());
        assert!(mime_type("pdf").is_err());
        assert!(mime_type("application/").is_err());
        assert!(mime_type("a/b/c").is_err());
    }

    #[test]
    fn sizes_and_batches() {
        let settings = UploadSettings::default();
        assert!(file_size(1, &settings).is_ok());
        assert!(file_size(50 * 1024 * 1024, &settings).is_ok());
        assert!(file_size(50 * 1024 * 1024 + 1, &settings).is_err());
        assert!(file_size(0, &settings).is_err());
        assert!(file_size(-5, &settings).is_err());

        assert!(batch_len(1, &settings).is_ok());
        assert!(batch_len(10, &settings).is_ok());
        assert!(batch_len(0, &settings).is_err());
        assert!(batch_len(11, &settings).is_err());
    }
}
