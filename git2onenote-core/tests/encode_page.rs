use git2onenote_core::encode::{PageEncoder, ATTACHMENT_PART_NAME};

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn fixed_boundary_encoding_is_byte_identical_across_calls() {
    let encoder = PageEncoder::default();
    let payload = b"%PDF-1.4 fake";

    let first = encoder.encode_with_boundary("report", payload, "B");
    let second = encoder.encode_with_boundary("report", payload, "B");

    assert_eq!(first, second, "same inputs must produce the same bytes");
}

#[test]
fn body_carries_two_parts_and_a_closing_boundary() {
    let encoder = PageEncoder::default();
    let body = encoder.encode_with_boundary("report", b"%PDF-1.4", "B");

    assert!(body.bytes.starts_with(b"--B\r\n"));
    assert_eq!(
        count(&body.bytes, b"--B\r\n"),
        2,
        "exactly one presentation part and one attachment part"
    );
    assert!(body.bytes.ends_with(b"\r\n--B--\r\n"));
    assert!(find(
        &body.bytes,
        b"Content-Disposition: form-data; name=\"Presentation\"\r\nContent-Type: text/html\r\n\r\n"
    )
    .is_some());
    let attachment_headers = format!(
        "Content-Disposition: form-data; name=\"{ATTACHMENT_PART_NAME}\"\r\nContent-Type: application/pdf\r\n\r\n"
    );
    assert!(find(&body.bytes, attachment_headers.as_bytes()).is_some());
}

#[test]
fn presentation_references_the_attachment_part_by_name() {
    let encoder = PageEncoder::default();
    let body = encoder.encode_with_boundary("report", b"%PDF-1.4", "B");

    let img = format!("<img src=\"name:{ATTACHMENT_PART_NAME}\" />");
    assert!(
        find(&body.bytes, img.as_bytes()).is_some(),
        "the HTML part must point at the attachment part"
    );
    assert!(find(&body.bytes, b"<title>report</title>").is_some());
}

#[test]
fn payload_bytes_are_embedded_verbatim() {
    let encoder = PageEncoder::default();
    let payload: &[u8] = &[0x25, 0x50, 0x44, 0x46, 0x00, 0xff, 0x0d, 0x0a, 0x01];
    let body = encoder.encode_with_boundary("binary", payload, "B");

    let start = find(&body.bytes, payload).expect("payload present in the body");
    let end = start + payload.len();
    assert!(
        body.bytes[end..].starts_with(b"\r\n--B--\r\n"),
        "payload runs straight into the closing boundary"
    );
}

#[test]
fn content_type_header_names_the_boundary() {
    let encoder = PageEncoder::default();
    let body = encoder.encode_with_boundary("report", b"%PDF-1.4", "B");
    assert_eq!(body.content_type, "multipart/form-data; boundary=B");
}

#[test]
fn title_markup_characters_are_escaped_in_the_html_part() {
    let encoder = PageEncoder::default();
    let body = encoder.encode_with_boundary("A&B <C>", b"%PDF-1.4", "B");

    assert!(find(&body.bytes, b"<title>A&amp;B &lt;C&gt;</title>").is_some());
    assert!(
        find(&body.bytes, b"<title>A&B <C></title>").is_none(),
        "raw markup characters must not reach the HTML part"
    );
}

#[test]
fn fresh_boundaries_differ_between_encode_calls() {
    let encoder = PageEncoder::default();
    let first = encoder.encode("report", b"%PDF-1.4");
    let second = encoder.encode("report", b"%PDF-1.4");

    assert_ne!(
        first.content_type, second.content_type,
        "each upload gets its own boundary"
    );
    assert!(first
        .content_type
        .starts_with("multipart/form-data; boundary=pageBoundary"));
}

#[test]
fn attachment_content_type_is_configurable() {
    let encoder = PageEncoder::new("application/octet-stream");
    let body = encoder.encode_with_boundary("blob", b"\x00\x01", "B");
    assert!(find(&body.bytes, b"Content-Type: application/octet-stream\r\n\r\n").is_some());
}
