use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Splits `text` into chunks of at most `max_chars` characters on line boundaries.
///
/// A line is never split across chunks; a single line longer than the budget
/// becomes a chunk of its own. Chunks are trimmed and blank ones dropped.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let line_len = line.chars().count();
        // +1 for the newline joining it to `current`
        if current_len > 0 && current_len + 1 + line_len > max_chars {
            push_chunk(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    push_chunk(&mut chunks, &current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// ASCII file-name slug with diacritics removed; `ndgroup` when nothing is left.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;

    for c in s.nfd().filter(|c| !is_combining_mark(*c)) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "ndgroup".to_string()
    } else {
        slug
    }
}

/// `4H00M` style label used in thumbnail text.
pub fn format_duration(minutes: u32) -> String {
    format!("{}H{:02}M", minutes / 60, minutes % 60)
}
