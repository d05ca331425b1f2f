//! Logical path cleaning for blob paths.
//!
//! These are always `/`-separated logical paths, not OS filesystem
//! paths (the reference used Go's `path/filepath`, which is
//! OS-sensitive; this crate deliberately reimplements the subset of
//! `path.Clean`/`Base`/`Dir` semantics needed, so Windows builds of the
//! server don't change blob naming).

/// Collapses `.`, `..`, and repeated `/` the way `path.Clean` would,
/// always returning an absolute, `/`-rooted path.
pub fn clean(input: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();

    for segment in input.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    format!("/{}", stack.join("/"))
}

/// The final path component, e.g. `basename("/x/a.txt") == "a.txt"`.
pub fn basename(cleaned: &str) -> String {
    cleaned
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("/")
        .to_string()
}

/// The immediate parent directory, e.g. `dirname("/x/a.txt") == "/x"`.
pub fn dirname(cleaned: &str) -> String {
    match cleaned.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => cleaned[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Best-effort MIME type from a file extension; falls back to content
/// sniffing over the first bytes of `content` when the extension is
/// unknown, per spec §4.3.
pub fn guess_mime(name: &str, content: &[u8]) -> String {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();

    let by_extension = match ext.as_str() {
        "txt" => Some("text/plain"),
        "json" => Some("application/json"),
        "html" | "htm" => Some("text/html"),
        "css" => Some("text/css"),
        "js" => Some("text/javascript"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "pdf" => Some("application/pdf"),
        "zip" => Some("application/zip"),
        "tar" => Some("application/x-tar"),
        "gz" => Some("application/gzip"),
        "mp4" => Some("video/mp4"),
        "mp3" => Some("audio/mpeg"),
        _ => None,
    };

    if let Some(mime) = by_extension {
        return mime.to_string();
    }

    sniff_content(content).to_string()
}

fn sniff_content(content: &[u8]) -> &'static str {
    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    const GIF_MAGIC: &[u8] = b"GIF8";
    const PDF_MAGIC: &[u8] = b"%PDF-";

    if content.starts_with(&PNG_MAGIC) {
        "image/png"
    } else if content.starts_with(GIF_MAGIC) {
        "image/gif"
    } else if content.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else if content.starts_with(PDF_MAGIC) {
        "application/pdf"
    } else if content.iter().take(512).all(|&b| b != 0) {
        "text/plain; charset=unknown"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_dots_and_slashes() {
        assert_eq!(clean("/x/./a//b/../c"), "/x/a/c");
        assert_eq!(clean("x/a"), "/x/a");
        assert_eq!(clean(""), "/");
    }

    #[test]
    fn basename_and_dirname_match_the_last_segment_split() {
        let cleaned = clean("/x/a/b.txt");
        assert_eq!(basename(&cleaned), "b.txt");
        assert_eq!(dirname(&cleaned), "/x/a");

        let root = clean("/a.txt");
        assert_eq!(dirname(&root), "/");
    }

    #[test]
    fn mime_falls_back_to_sniffing() {
        assert_eq!(guess_mime("pic.png", b""), "image/png");
        assert_eq!(
            guess_mime("noext", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]),
            "image/png"
        );
    }
}
