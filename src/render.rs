use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// A value that can be shown on one labeled result line
pub trait FieldValue {
    fn is_null(&self) -> bool;
    fn display(&self) -> String;
}

impl FieldValue for Value {
    fn is_null(&self) -> bool {
        Value::is_null(self)
    }

    fn display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl<T: Display> FieldValue for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn display(&self) -> String {
        self.as_ref().map(|v| v.to_string()).unwrap_or_default()
    }
}

/// One rendered field of an analysis result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine {
    pub label: String,
    pub value: String,
}

/// Turn a result key like `task_extraction` into `Task Extraction`.
///
/// Every run of letters starts uppercase and continues lowercase, so digits
/// and punctuation also start a new word.
pub fn humanize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_is_letter = false;

    for ch in key.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }

    out
}

/// Render each non-null entry as a labeled line, keeping input order
pub fn render_fields<'a, K, V, I>(entries: I) -> Vec<ResultLine>
where
    K: AsRef<str> + 'a,
    V: FieldValue + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    entries
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| ResultLine {
            label: humanize_key(key.as_ref()),
            value: value.display(),
        })
        .collect()
}

/// Free-form rendering for payloads without a known shape
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Json,
    Pdf,
}

impl DownloadKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            DownloadKind::Json => "analysis.json",
            DownloadKind::Pdf => "analysis.pdf",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            DownloadKind::Json => "application/json",
            DownloadKind::Pdf => "application/pdf",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DownloadKind::Json => "JSON",
            DownloadKind::Pdf => "PDF",
        }
    }
}

/// Raw bytes returned by a download endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub kind: DownloadKind,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn new(kind: DownloadKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }

    pub fn mime(&self) -> &'static str {
        self.kind.mime()
    }

    /// Short description for status lines
    pub fn describe(&self) -> String {
        format!("{} ({}, {} bytes)", self.file_name(), self.mime(), self.bytes.len())
    }

    /// Write the artifact into `dir` under its fixed file name
    pub fn save_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("tone"), "Tone");
        assert_eq!(humanize_key("task_extraction"), "Task Extraction");
        assert_eq!(humanize_key("phishing_detection"), "Phishing Detection");
        assert_eq!(humanize_key("ALL_CAPS_KEY"), "All Caps Key");
        assert_eq!(humanize_key("top3_tasks"), "Top3 Tasks");
        assert_eq!(humanize_key("x2y"), "X2Y");
        assert_eq!(humanize_key(""), "");
    }

    #[test]
    fn test_null_fields_are_suppressed() {
        let result: Map<String, Value> =
            serde_json::from_value(json!({"tone": "neutral", "sentiment": null})).unwrap();

        let lines = render_fields(&result);

        assert_eq!(
            lines,
            vec![ResultLine {
                label: "Tone".to_string(),
                value: "neutral".to_string(),
            }]
        );
    }

    #[test]
    fn test_fields_follow_response_order() {
        let result: Map<String, Value> =
            serde_json::from_str(r#"{"tone": "calm", "highlights": "h", "response": "r"}"#).unwrap();

        let labels: Vec<String> = render_fields(&result).into_iter().map(|l| l.label).collect();

        assert_eq!(labels, vec!["Tone", "Highlights", "Response"]);
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let result: Map<String, Value> = serde_json::from_value(json!({
            "clarity": 8,
            "tasks": ["call back", "send invoice"],
            "phishing_detection": {"suspicious": false}
        }))
        .unwrap();

        let lines = render_fields(&result);
        let find = |label: &str| lines.iter().find(|l| l.label == label).map(|l| l.value.clone());

        assert_eq!(find("Clarity").as_deref(), Some("8"));
        assert_eq!(find("Tasks").as_deref(), Some(r#"["call back","send invoice"]"#));
        assert_eq!(find("Phishing Detection").as_deref(), Some(r#"{"suspicious":false}"#));
    }

    #[test]
    fn test_render_fields_over_options() {
        let entries = vec![
            ("subject_recommendation".to_string(), Some("Quarterly update")),
            ("response".to_string(), None),
        ];

        let lines = render_fields(entries.iter().map(|(k, v)| (k, v)));

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].label, "Subject Recommendation");
        assert_eq!(lines[0].value, "Quarterly update");
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&Value::Null), "None");
        assert_eq!(render_value(&json!("plain text")), "plain text");
        assert_eq!(render_value(&json!({"from": "a@b.c"})), "{\n  \"from\": \"a@b.c\"\n}");
    }

    #[test]
    fn test_download_artifacts() {
        let json = Download::new(DownloadKind::Json, b"{}".to_vec());
        assert_eq!(json.file_name(), "analysis.json");
        assert_eq!(json.mime(), "application/json");

        let pdf = Download::new(DownloadKind::Pdf, b"%PDF-1.4".to_vec());
        assert_eq!(pdf.file_name(), "analysis.pdf");
        assert_eq!(pdf.mime(), "application/pdf");
        assert_eq!(pdf.describe(), "analysis.pdf (application/pdf, 8 bytes)");
    }

    #[test]
    fn test_download_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("downloads");
        let download = Download::new(DownloadKind::Json, br#"{"tone":"neutral"}"#.to_vec());

        let path = download.save_to(&target).unwrap();

        assert_eq!(path, target.join("analysis.json"));
        assert_eq!(std::fs::read(&path).unwrap(), br#"{"tone":"neutral"}"#.to_vec());
    }
}
