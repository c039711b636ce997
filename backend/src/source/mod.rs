//! Report document sources with encoding auto-detection.
//!
//! Produces the parsed JSON document the flattener consumes. Nothing here
//! knows about report structure.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::FETCH_TIMEOUT_SECS;
use crate::error::{SourceError, SourceResult};

/// A parsed report document with how it was decoded.
#[derive(Debug, Clone)]
pub struct LoadedReport {
    /// The raw nested document.
    pub document: Value,
    /// Detected or used encoding.
    pub encoding: String,
    /// Size of the raw input in bytes.
    pub byte_len: usize,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| SourceError::Encoding(e.to_string())),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => Ok(enc.decode(bytes).0.into_owned()),
            None => Ok(String::from_utf8_lossy(bytes).into_owned()),
        },
    }
}

/// Parse report bytes with encoding auto-detection.
pub fn parse_report_bytes(bytes: &[u8]) -> SourceResult<LoadedReport> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let document: Value = serde_json::from_str(&content)?;

    Ok(LoadedReport {
        document,
        encoding,
        byte_len: bytes.len(),
    })
}

/// Load a report file from disk.
pub fn load_report_file<P: AsRef<Path>>(path: P) -> SourceResult<LoadedReport> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_report_bytes(&bytes)
}

/// Fetch a report document over HTTP.
///
/// `token` is sent as a bearer token when present.
pub async fn fetch_report(url: &str, token: Option<&str>) -> SourceResult<LoadedReport> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| SourceError::Http(e.to_string()))?;

    let mut request = client.get(url).header("Accept", "application/json");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| SourceError::Http(e.to_string()))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| SourceError::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).chars().take(200).collect(),
        });
    }

    parse_report_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_utf8_report() {
        let bytes = br#"{"Columns": {"Column": []}, "Rows": {}}"#;
        let loaded = parse_report_bytes(bytes).unwrap();
        assert_eq!(loaded.encoding, "utf-8");
        assert!(loaded.document.get("Columns").is_some());
        assert_eq!(loaded.byte_len, bytes.len());
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"{"ok": true}"#);
        let loaded = parse_report_bytes(&bytes).unwrap();
        assert_eq!(loaded.document["ok"], true);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_invalid_json_error() {
        let err = parse_report_bytes(b"not json").unwrap_err();
        assert!(matches!(err, SourceError::Json(_)));
    }

    #[test]
    fn test_load_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"Rows": {"Row": []}}"#).unwrap();

        let loaded = load_report_file(&path).unwrap();
        assert!(loaded.document["Rows"]["Row"].is_array());
    }

    #[test]
    fn test_missing_file() {
        let err = load_report_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }
}
