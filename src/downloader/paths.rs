use std::path::PathBuf;

/// Characters rejected by NTFS inside a single path segment.
const FORBIDDEN: &[char] = &['<', '>', '/', '\\', ':', '"', '|', '?', '*'];

/// Replaces characters that are illegal on the most restrictive target
/// filesystem with a space and collapses runs of spaces.
///
/// Expects a single segment: separators are replaced too, so a cleaned
/// segment can never introduce a directory boundary.
pub fn clean_path_part(segment: &str) -> String {
    let mut cleaned = String::with_capacity(segment.len());
    for ch in segment.chars() {
        let ch = if FORBIDDEN.contains(&ch) { ' ' } else { ch };
        if ch == ' ' && cleaned.ends_with(' ') {
            continue;
        }
        cleaned.push(ch);
    }
    // a segment must never step out of its parent
    if matches!(cleaned.as_str(), "" | "." | "..") {
        return "_".repeat(cleaned.len().max(1));
    }
    cleaned
}

/// Splits on both separator styles and resolves `.`/`..` lexically so that
/// server paths from either platform compare equal.
fn segments(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            _ => out.push(seg),
        }
    }
    out
}

fn strip_location<'a>(location: &[&str], source: &[&'a str]) -> Option<Vec<&'a str>> {
    if location.is_empty() || source.len() <= location.len() {
        return None;
    }
    let matches = location
        .iter()
        .zip(source)
        .all(|(loc, src)| loc.to_lowercase() == src.to_lowercase());
    matches.then(|| source[location.len()..].to_vec())
}

/// Maps a part's server path to a relative local path by stripping the first
/// section location it lives under.
///
/// Matching is case-insensitive and respects directory boundaries:
/// `/data/movies` matches `/data/movies/x.mkv` but not `/data/movies2/x.mkv`.
/// Returns `None` when no location applies.
pub fn map_part_path<S: AsRef<str>>(section_locations: &[S], source_path: &str) -> Option<PathBuf> {
    let source = segments(source_path);
    section_locations.iter().find_map(|location| {
        let location = segments(location.as_ref());
        strip_location(&location, &source)
            .map(|rest| rest.iter().map(|seg| clean_path_part(seg)).collect())
    })
}
