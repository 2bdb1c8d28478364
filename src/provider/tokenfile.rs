//! Static token table loaded from a CSV file.
//!
//! Each record is `token,user name,uid[,"group1,group2"]`. Fields may be
//! double-quoted; a quoted field can hold commas, newlines and `""` escapes.

use std::collections::HashMap;
use std::path::Path;

use super::{AuthenticationProvider, FileProvider, Identity, LoadError, ProviderError};

/// Exact-match token table.
#[derive(Debug, Clone, Default)]
pub struct TokenFile {
    tokens: HashMap<String, Identity>,
}

impl TokenFile {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FileProvider for TokenFile {
    fn from_bytes(path: &Path, content: &[u8]) -> Result<Self, LoadError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| LoadError::parse(path, 0, format!("invalid utf-8: {}", e)))?;

        let records = parse_records(text).map_err(|(line, msg)| LoadError::parse(path, line, msg))?;

        let mut tokens = HashMap::with_capacity(records.len());
        for Record { line, fields } in records {
            if fields.len() < 3 {
                return Err(LoadError::parse(
                    path,
                    line,
                    format!(
                        "must have at least 3 columns (token, user name, uid), found {}",
                        fields.len()
                    ),
                ));
            }

            let mut fields = fields.into_iter();
            let token = fields.next().unwrap_or_default();
            let name = fields.next().unwrap_or_default();
            let uid = fields.next().unwrap_or_default();
            let groups = fields
                .next()
                .map(|g| {
                    g.split(',')
                        .map(str::trim)
                        .filter(|g| !g.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            if token.is_empty() {
                tracing::warn!(path = %path.display(), line, "Skipping record with an empty token");
                continue;
            }

            if tokens.contains_key(&token) {
                tracing::warn!(path = %path.display(), line, "Duplicate token, later record wins");
            }
            tokens.insert(token, Identity { uid, name, groups });
        }

        tracing::debug!(path = %path.display(), tokens = tokens.len(), "Token file parsed");
        Ok(Self { tokens })
    }
}

impl AuthenticationProvider for TokenFile {
    fn authenticate_token(&self, token: &str) -> Result<Option<Identity>, ProviderError> {
        Ok(self.tokens.get(token).cloned())
    }
}

struct Record {
    line: usize,
    fields: Vec<String>,
}

/// Split CSV text into records. Empty lines are skipped.
///
/// Errors carry the 1-based line where the problem was found.
fn parse_records(input: &str) -> Result<Vec<Record>, (usize, String)> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                c => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                quoted = true;
                in_quotes = true;
            }
            '"' => return Err((line, "bare \" in non-quoted field".into())),
            ',' => {
                fields.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if !fields.is_empty() || !field.is_empty() || quoted {
                    fields.push(std::mem::take(&mut field));
                    records.push(Record {
                        line: record_line,
                        fields: std::mem::take(&mut fields),
                    });
                }
                quoted = false;
                line += 1;
                record_line = line;
            }
            _ if quoted => {
                return Err((line, "extraneous character after quoted field".into()));
            }
            c => field.push(c),
        }
    }

    if in_quotes {
        return Err((record_line, "unterminated quoted field".into()));
    }
    if !fields.is_empty() || !field.is_empty() || quoted {
        fields.push(field);
        records.push(Record {
            line: record_line,
            fields,
        });
    }

    Ok(records)
}
