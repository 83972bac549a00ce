//! Deriving local file names from submitted URLs.

use reqwest::Url;
use std::collections::HashSet;
use std::path::Path;

use super::error::FetchError;

/// Parse `raw` and return the URL with its percent-decoded file name.
///
/// Only the final path component is kept, so an encoded separator such as
/// `%2F` cannot place the file outside the workspace.
pub fn parse_file_url(raw: &str) -> Result<(Url, String), FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    let missing = || FetchError::MissingFileName {
        url: raw.to_string(),
    };

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;

    let decoded = urlencoding::decode(segment).map_err(|_| missing())?;
    let name = Path::new(decoded.as_ref())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(missing)?
        .to_string();

    Ok((url, name))
}

/// Make names unique within one task.
///
/// A name already taken, by an earlier original or an earlier rename, is
/// prefixed with its 1-based position. If that is taken too the prefix
/// counts up until a free name is found.
pub fn disambiguate(names: Vec<Option<String>>) -> Vec<Option<String>> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            name.map(|name| {
                let mut candidate = name.clone();
                let mut prefix = index + 1;
                while !seen.insert(candidate.clone()) {
                    candidate = format!("{prefix}-{name}");
                    prefix += 1;
                }
                candidate
            })
        })
        .collect()
}
