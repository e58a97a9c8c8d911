//! Minimal `multipart/form-data` parsing for single-file uploads.

use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;

/// One form field from a multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    /// Present for file inputs; may be empty when no file was chosen.
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(?:^|;)\s*name="([^"]*)""#).expect("valid regex"))
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i);\s*filename="([^"]*)""#).expect("valid regex"))
}

/// Extract the boundary parameter from a `Content-Type` header value.
pub fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Split a multipart body into its parts.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut closing = b"\r\n".to_vec();
    closing.extend_from_slice(&delimiter);

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| anyhow!("multipart body has no opening boundary"))?
        + delimiter.len();
    let mut parts = Vec::new();

    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(anyhow!("malformed multipart boundary line"));
        }
        pos += 2;

        let header_end = find(body, b"\r\n\r\n", pos)
            .ok_or_else(|| anyhow!("multipart part is missing its header terminator"))?;
        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let data_start = header_end + 4;
        let data_end = find(body, &closing, data_start)
            .ok_or_else(|| anyhow!("multipart part is not terminated"))?;

        let disposition = headers
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-disposition"))
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default();
        let name = name_re()
            .captures(&disposition)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let filename = filename_re()
            .captures(&disposition)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        parts.push(Part {
            name,
            filename,
            data: body[data_start..data_end].to_vec(),
        });
        pos = data_end + closing.len();
    }

    Ok(parts)
}

/// The named file field, if it carries a non-empty file name.
pub fn file_field(parts: Vec<Part>, field: &str) -> Option<(String, Vec<u8>)> {
    parts
        .into_iter()
        .find(|part| part.name == field)
        .and_then(|part| match part.filename {
            Some(filename) if !filename.trim().is_empty() => Some((filename, part.data)),
            _ => None,
        })
}
