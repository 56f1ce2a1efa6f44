use std::path::{Path, PathBuf};

/// Attributes a path template can reference: `{artist|title|album|year|track|playlist}`.
#[derive(Debug, Clone, Default)]
pub struct PathAttributes<'a> {
    pub artist: &'a str,
    pub title: &'a str,
    pub album: &'a str,
    pub year: Option<i32>,
    pub track: Option<u32>,
    pub playlist: &'a str,
}

/// Replace `{...}` tokens in `template` with the matching attribute.
/// Unknown tokens resolve to the empty string (spec §4.5).
pub fn expand_template(template: &str, attrs: &PathAttributes) -> String {
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        if template.as_bytes()[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let token = &template[i + 1..i + end];
                out.push_str(&resolve_token(token, attrs));
                i += end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn resolve_token(token: &str, attrs: &PathAttributes) -> String {
    match token {
        "artist" => attrs.artist.to_string(),
        "title" => attrs.title.to_string(),
        "album" => attrs.album.to_string(),
        "year" => attrs.year.map(|y| y.to_string()).unwrap_or_default(),
        "track" => attrs.track.map(|t| format!("{t:02}")).unwrap_or_default(),
        "playlist" => attrs.playlist.to_string(),
        _ => String::new(),
    }
}

/// Sanitize a single path segment: strip `<>:"/\|?*`, replace with `_`,
/// collapse to at most 200 chars, strip leading/trailing whitespace (spec §4.5).
pub fn sanitize_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => out.push('_'),
            _ => out.push(ch),
        }
    }
    let trimmed = out.trim();
    if trimmed.chars().count() > 200 {
        trimmed.chars().take(200).collect()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize every `/`-separated segment of an expanded template independently,
/// so tokens that legitimately introduce subdirectories (e.g. `{playlist}/{album}`)
/// are not collapsed into one path component.
fn sanitize_path_string(expanded: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in expanded.split('/') {
        if segment.is_empty() {
            continue;
        }
        path.push(sanitize_segment(segment));
    }
    path
}

/// Expand `folder_structure` and `file_template` over `attrs`, sanitize every
/// segment, and append the extension derived from the actually-downloaded
/// codec (never from the template). Returns (final absolute path, parent
/// directory); the caller creates the parent directory recursively.
pub fn build_path(
    download_root: &Path,
    folder_structure: &str,
    file_template: &str,
    attrs: &PathAttributes,
    ext: &str,
) -> (PathBuf, PathBuf) {
    let folder = sanitize_path_string(&expand_template(folder_structure, attrs));
    let filename_stem = sanitize_path_string(&expand_template(file_template, attrs));

    let parent = download_root.join(&folder);
    let final_path = parent.join(format!(
        "{}.{}",
        filename_stem.to_string_lossy(),
        ext
    ));
    (final_path, parent)
}
