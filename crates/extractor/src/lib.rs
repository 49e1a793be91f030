//! Type-dispatched incremental meta extractor (component C).
//!
//! Buffers up to [`FTS_MAX`] bytes of raw content for text MIME types and,
//! on [`MetaExtractor::end`], emits `fulltext`/`link`/`title` fields ready to
//! be assembled into a meta-file JSON body. Unknown types yield no body.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use efs_core::meta_type;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Per-submission byte cap for full-text extraction buffering.
pub const FTS_MAX: usize = 1024 * 50;

/// URL-matching regular expression, ported from the "improved regex for
/// matching URLs" (scheme-prefixed, `www`-prefixed, and bare domains with a
/// path component), case-insensitive. Compiled once and shared.
static LINKIFY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:[a-z][a-z0-9_-]+:(?:/{1,3}|[a-z0-9%])|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\((?:[^\s()<>]+|\([^\s()<>]+\))*\))+(?:\((?:[^\s()<>]+|\([^\s()<>]+\))*\)|[^\s`!()\[\]{};:'".,<>?\u{00ab}\u{00bb}\u{201c}\u{201d}\u{2018}\u{2019}])"#,
    )
    .expect("linkify regex is a valid pattern")
});

fn is_text_type(normalized: &str) -> bool {
    matches!(normalized, "text/plain; charset=utf-8" | "text/markdown; charset=utf-8")
}

/// An incremental meta extractor for one submission.
pub enum MetaExtractor {
    /// A text-type submission buffers up to [`FTS_MAX`] bytes for later
    /// full-text and link extraction.
    Text { buf: Vec<u8> },
    /// A submission of an unrecognized type: `end` always yields `None`.
    Unsupported,
}

impl MetaExtractor {
    /// Dispatch on the declared, normalized MIME type.
    #[must_use]
    pub fn for_type(declared_type: &str) -> Self {
        let normalized = meta_type::normalize(declared_type);
        if is_text_type(&normalized) {
            MetaExtractor::Text { buf: Vec::with_capacity(FTS_MAX.min(4096)) }
        } else {
            MetaExtractor::Unsupported
        }
    }

    /// Feed bytes as they stream through the submission. Bytes beyond
    /// [`FTS_MAX`] are silently dropped, never an error.
    pub fn write(&mut self, bytes: &[u8]) {
        if let MetaExtractor::Text { buf } = self {
            let remaining = FTS_MAX.saturating_sub(buf.len());
            if remaining == 0 {
                return;
            }
            let take = remaining.min(bytes.len());
            buf.extend_from_slice(&bytes[..take]);
        }
    }

    /// Finalize extraction. `supplied_title`, if present, is carried
    /// through as a single-element `title` array; this build never infers a
    /// title from content.
    #[must_use]
    pub fn end(self, supplied_title: Option<&str>) -> Option<Map<String, Value>> {
        match self {
            MetaExtractor::Unsupported => None,
            MetaExtractor::Text { buf } => {
                let fulltext = String::from_utf8_lossy(&buf).into_owned();
                let links: Vec<Value> =
                    LINKIFY.find_iter(&fulltext).map(|m| Value::String(m.as_str().to_string())).collect();

                let mut fields = Map::new();
                if let Some(title) = supplied_title {
                    fields.insert("title".into(), Value::Array(vec![Value::String(title.to_string())]));
                }
                fields.insert("fulltext".into(), Value::String(fulltext));
                fields.insert("link".into(), Value::Array(links));
                Some(fields)
            }
        }
    }
}
