pub const BRUSH_DIR: &str = "procreate_brushes";

/// Safe file stem for one letter. Identical stems are not deduplicated: a
/// later letter overwrites an earlier one in the archive.
pub fn letter_stem(raw_name: &str, index: usize) -> String {
    let kept = raw_name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>();
    let trimmed = kept.trim_end();
    if trimmed.is_empty() {
        fallback_name(index)
    } else {
        trimmed.to_string()
    }
}

pub fn letter_filename(raw_name: &str, index: usize) -> String {
    format!("{}.png", letter_stem(raw_name, index))
}

pub fn brush_filename(stem: &str) -> String {
    format!("{}/{}_procreate.png", BRUSH_DIR, stem)
}

/// `letter_{n}` with a one-based position.
pub fn fallback_name(index: usize) -> String {
    format!("letter_{}", index + 1)
}

/// Lowercased upload name without directories or extension.
pub fn image_base_name(filename: Option<&str>, default_name: &str) -> String {
    let file_name = filename
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };
    let normalized = stem.to_lowercase().replace(' ', "_");
    if normalized.is_empty() {
        default_name.to_string()
    } else {
        normalized
    }
}

/// File names shared by the manifest entry and the downloaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchNames {
    pub base: String,
}

impl BatchNames {
    pub fn new(name_prefix: &str, image_base: &str, alphabet_type: &str) -> Self {
        let joined = [name_prefix, image_base, alphabet_type].join("_");
        let mut base = String::with_capacity(joined.len());
        for c in joined.chars() {
            if c == '_' && base.ends_with('_') {
                continue;
            }
            base.push(c);
        }
        let base = base.trim_matches('_').to_string();
        Self { base }
    }

    pub fn manifest(&self) -> String {
        format!("{}.json", self.base)
    }

    pub fn archive(&self) -> String {
        format!("{}.zip", self.base)
    }
}
