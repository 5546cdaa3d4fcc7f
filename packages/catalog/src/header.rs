//! Line-oriented scanner for the keyword header embedded in level files.
//!
//! The text itself is never modified: the scanner only reads it, and the
//! caller stores the original bytes verbatim.

use crate::error::HeaderError;

pub const LEVEL_NAME: &str = "LevelName";
pub const LEVEL_DATABASE_ID: &str = "LevelDatabaseId";
pub const SCRIPT: &str = "Script";

/// Raw values of the recognized keywords, first occurrence of each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub name: Option<String>,
    pub database_id: Option<String>,
    pub script: Option<String>,
}

impl HeaderFields {
    fn is_complete(&self) -> bool {
        self.name.is_some() && self.database_id.is_some() && self.script.is_some()
    }
}

/// Validated header of a level file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelHeader {
    /// Display name of the level.
    pub name: String,
    /// Identifier of an existing level this file replaces.
    pub database_id: Option<i32>,
    /// Value of the `Script` line: generator base name, optionally followed
    /// by generator arguments.
    pub script: Option<String>,
}

impl LevelHeader {
    /// Base name of the referenced generator script, without arguments and
    /// without a trailing `.{extension}` if the author included one.
    pub fn script_name(&self, extension: &str) -> Option<&str> {
        let token = self.script.as_deref()?.split_whitespace().next()?;
        let suffixed = token
            .strip_suffix(extension)
            .and_then(|s| s.strip_suffix('.'))
            .filter(|s| !s.is_empty());
        Some(suffixed.unwrap_or(token))
    }
}

/// Value of `line` if it starts with `keyword` followed by whitespace.
///
/// Lines whose value is empty do not count as an occurrence.
fn keyword_value<'l>(line: &'l str, keyword: &str) -> Option<&'l str> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let value = rest.trim();
    (!value.is_empty()).then_some(value)
}

fn record(slot: &mut Option<String>, line: &str, keyword: &str) {
    if slot.is_none()
        && let Some(value) = keyword_value(line, keyword)
    {
        *slot = Some(value.to_string());
    }
}

/// Scan every line of `text` for recognized keywords.
pub fn scan(text: &str) -> HeaderFields {
    let mut fields = HeaderFields::default();
    for line in text.lines() {
        record(&mut fields.name, line, LEVEL_NAME);
        record(&mut fields.database_id, line, LEVEL_DATABASE_ID);
        record(&mut fields.script, line, SCRIPT);
        if fields.is_complete() {
            break;
        }
    }
    fields
}

/// Scan `text` and validate the result.
pub fn parse(text: &str) -> Result<LevelHeader, HeaderError> {
    let fields = scan(text);
    let name = fields.name.ok_or(HeaderError::MissingName)?;
    let database_id = fields
        .database_id
        .map(|raw| {
            raw.parse::<i32>()
                .map_err(|_| HeaderError::InvalidDatabaseId(raw))
        })
        .transpose()?;

    Ok(LevelHeader {
        name,
        database_id,
        script: fields.script,
    })
}
