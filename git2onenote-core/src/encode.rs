//! Multipart page encoding for notebook uploads.
//!
//! The notebook host's create-page call takes a `multipart/form-data` body
//! with exactly two parts: an HTML `Presentation` part carrying the page
//! title and a placeholder image that references the attachment part by
//! name, and the binary attachment part itself. [`PageEncoder`] builds that
//! body as plain bytes with no I/O, so the output is byte-for-byte testable:
//! [`PageEncoder::encode`] draws a fresh boundary per call, while
//! [`PageEncoder::encode_with_boundary`] is fully deterministic.

use uuid::Uuid;

/// Part name the presentation HTML uses to reference the binary attachment.
pub const ATTACHMENT_PART_NAME: &str = "pdfattachment";

/// An encoded multipart body plus the header value that describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// Full content-type header value (`multipart/form-data; boundary=...`).
    pub content_type: String,
    /// The raw body bytes, both parts and the closing boundary included.
    pub bytes: Vec<u8>,
}

/// Builds create-page bodies for one attachment content type.
#[derive(Debug, Clone)]
pub struct PageEncoder {
    attachment_content_type: String,
}

impl PageEncoder {
    pub fn new(attachment_content_type: impl Into<String>) -> Self {
        Self {
            attachment_content_type: attachment_content_type.into(),
        }
    }

    /// Encode with a freshly generated boundary.
    pub fn encode(&self, title: &str, payload: &[u8]) -> EncodedBody {
        let boundary = format!("pageBoundary{}", Uuid::new_v4().simple());
        self.encode_with_boundary(title, payload, &boundary)
    }

    /// Encode with a caller-supplied boundary. Given the same inputs the
    /// output is byte-identical across calls.
    pub fn encode_with_boundary(&self, title: &str, payload: &[u8], boundary: &str) -> EncodedBody {
        let presentation = presentation_html(title);

        let mut bytes = Vec::with_capacity(presentation.len() + payload.len() + 256);
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(b"Content-Disposition: form-data; name=\"Presentation\"\r\n");
        bytes.extend_from_slice(b"Content-Type: text/html\r\n\r\n");
        bytes.extend_from_slice(presentation.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{ATTACHMENT_PART_NAME}\"\r\n")
                .as_bytes(),
        );
        bytes.extend_from_slice(
            format!("Content-Type: {}\r\n\r\n", self.attachment_content_type).as_bytes(),
        );
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        EncodedBody {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            bytes,
        }
    }
}

impl Default for PageEncoder {
    fn default() -> Self {
        Self::new("application/pdf")
    }
}

fn presentation_html(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>{}</title>
  </head>
  <body>
    <img src="name:{ATTACHMENT_PART_NAME}" />
  </body>
</html>"#,
        escape_html(title)
    )
}

/// Minimal text-node escaping so titles survive the HTML round trip: the
/// notebook host decodes entities when it stores the page title, which keeps
/// stem-vs-title matching exact on later passes.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
