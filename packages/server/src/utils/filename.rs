/// Why a generator script filename was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Longer than [`MAX_FILENAME_LEN`] bytes.
    TooLong,
    /// Filename contains path separators (`/` or `\`).
    ContainsPathSeparator,
    /// Filename starts with a dot (hidden file or `..`).
    Hidden,
    /// Control characters would break the `-- <filename>` line of the raw script.
    ControlCharacter,
    /// Does not end in the configured generator extension.
    WrongExtension,
}

pub const MAX_FILENAME_LEN: usize = 255;

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Levelgen filename cannot be empty",
            Self::TooLong => "Levelgen filename must be at most 255 bytes",
            Self::ContainsPathSeparator => "Invalid levelgen filename: path separators are not allowed",
            Self::Hidden => "Invalid levelgen filename: names starting with '.' are not allowed",
            Self::ControlCharacter => "Invalid levelgen filename: control characters are not allowed",
            Self::WrongExtension => "Invalid levelgen filename: wrong extension",
        }
    }
}

/// Validate the filename a generator script is stored under.
///
/// Returns the trimmed name. `extension` is given without the leading dot.
pub fn validate_levelgen_filename<'a>(
    filename: &'a str,
    extension: &str,
) -> Result<&'a str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    if trimmed.len() > MAX_FILENAME_LEN {
        return Err(FilenameError::TooLong);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext == extension => Ok(trimmed),
        _ => Err(FilenameError::WrongExtension),
    }
}
