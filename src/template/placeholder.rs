//! `{{ key }}` placeholder scanning.

/// A piece of a template string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Key(&'a str),
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Split text into literal runs and placeholder keys
pub fn segments(text: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            out.push(Segment::Text(&rest[..open]));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| format!("unclosed placeholder in '{}'", text))?;
        let key = after_open[..close].trim();
        if !valid_key(key) {
            return Err(format!("invalid placeholder key '{}'", key));
        }
        out.push(Segment::Key(key));
        rest = &after_open[close + 2..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    Ok(out)
}

pub fn contains_placeholder(text: &str) -> bool {
    text.contains("{{")
}

/// The key when the whole string is a single placeholder
pub fn sole_key(text: &str) -> Option<&str> {
    match segments(text.trim()) {
        Ok(segs) if segs.len() == 1 => match segs[0] {
            Segment::Key(key) => Some(key),
            Segment::Text(_) => None,
        },
        _ => None,
    }
}

/// Plain-scalar stand-in for the placeholder at `index`
pub fn mask_token(index: usize) -> String {
    format!("__placeholder_{}__", index)
}

/// Replace every placeholder outside comment lines with [`mask_token`] so the text can go
/// through a YAML parser without `{{` opening a flow mapping. Returns the masked text and
/// the keys in token order.
pub fn mask(text: &str) -> Result<(String, Vec<String>), String> {
    let mut out = String::with_capacity(text.len());
    let mut keys = Vec::new();
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with('#') || !contains_placeholder(line) {
            out.push_str(line);
            continue;
        }
        for segment in segments(line)? {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Key(key) => {
                    out.push_str(&mask_token(keys.len()));
                    keys.push(key.to_string());
                }
            }
        }
    }
    Ok((out, keys))
}

/// Put the `{{key}}` form back in place of every token
pub fn unmask(text: &str, keys: &[String]) -> String {
    if !text.contains("__placeholder_") {
        return text.to_string();
    }
    keys.iter()
        .enumerate()
        .fold(text.to_string(), |acc, (i, key)| {
            acc.replace(&mask_token(i), &format!("{{{{{}}}}}", key))
        })
}

/// Every key referenced by the text, in order of appearance
pub fn referenced_keys(text: &str) -> Vec<&str> {
    segments(text)
        .map(|segs| {
            segs.into_iter()
                .filter_map(|s| match s {
                    Segment::Key(k) => Some(k),
                    Segment::Text(_) => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
