//! Minimal `multipart/form-data` reader for the restore upload.
//!
//! Only what the restore needs: find the file part and return its raw bytes.
//! Part bodies are binary, so everything works on `&[u8]`.

/// Field name the backup page uploads the snapshot under.
pub const FILE_FIELD: &str = "database";

/// Extracts the `boundary` parameter from a Content-Type header.
pub fn boundary(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    params
        .filter_map(|p| p.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|b| !b.is_empty())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Whether a part's headers mark it as the snapshot upload: the
/// [`FILE_FIELD`] field, or any file whose name ends in `.db`.
fn is_file_part(headers: &str) -> bool {
    headers.lines().any(|line| {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        if !name.trim().eq_ignore_ascii_case("content-disposition") {
            return false;
        }

        value.split(';').map(str::trim).any(|param| {
            match param.split_once('=') {
                Some(("name", v)) => v.trim_matches('"') == FILE_FIELD,
                Some(("filename", v)) => v.trim_matches('"').to_ascii_lowercase().ends_with(".db"),
                _ => false,
            }
        })
    })
}

/// Returns the body of the snapshot file part, without its trailing CRLF.
pub fn extract_file_part<'a>(body: &'a [u8], boundary: &str) -> Option<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut cursor = find(body, delimiter, 0)? + delimiter.len();
    loop {
        // "--" right after a delimiter closes the body.
        if body[cursor..].starts_with(b"--") {
            return None;
        }

        let next = find(body, delimiter, cursor)?;
        let part = &body[cursor..next];
        let part = part.strip_prefix(b"\r\n").unwrap_or(part);

        if let Some(header_end) = find(part, b"\r\n\r\n", 0) {
            let headers = String::from_utf8_lossy(&part[..header_end]);
            if is_file_part(&headers) {
                let content = &part[header_end + 4..];
                return Some(content.strip_suffix(b"\r\n").unwrap_or(content));
            }
        }

        cursor = next + delimiter.len();
    }
}
