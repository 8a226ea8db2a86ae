//! File-name sanitation for generated files.

/// Longest stem kept, in characters.
const MAX_STEM_CHARS: usize = 100;

/// Characters that are unsafe in file names on common platforms.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Turn a model-supplied name into a safe file name with `extension`.
///
/// Directory components are dropped, forbidden and control characters are
/// removed, the stem is capped, and the extension is enforced. An unusable
/// name falls back to `fallback_stem`.
pub fn sanitize_file_name(requested: &str, extension: &str, fallback_stem: &str) -> String {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    let base = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !FORBIDDEN.contains(c))
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');

    let stem = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case(&extension) => stem,
        _ => cleaned,
    };
    let stem: String = stem.trim().chars().take(MAX_STEM_CHARS).collect();
    let stem = stem.trim_end_matches(['.', ' ']);
    let stem = if stem.is_empty() { fallback_stem } else { stem };

    format!("{stem}.{extension}")
}

/// Extension of a file name, lowercased.
pub fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?;
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adds_extension() {
        assert_eq!(sanitize_file_name("report", "xlsx", "file"), "report.xlsx");
        assert_eq!(sanitize_file_name("report.XLSX", "xlsx", "file"), "report.xlsx");
    }

    #[test]
    fn test_strips_directories_and_forbidden_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd", "txt", "file"), "passwd.txt");
        assert_eq!(sanitize_file_name("C:\\tmp\\a<b>?.docx", "docx", "file"), "ab.docx");
        assert_eq!(sanitize_file_name("bad\u{0007}name", "txt", "file"), "badname.txt");
    }

    #[test]
    fn test_fallback_for_empty() {
        assert_eq!(sanitize_file_name("", "png", "chart"), "chart.png");
        assert_eq!(sanitize_file_name("...", "png", "chart"), "chart.png");
        assert_eq!(sanitize_file_name("dir/", "png", "chart"), "chart.png");
    }

    #[test]
    fn test_stem_is_capped() {
        let name = sanitize_file_name(&"a".repeat(300), "txt", "file");
        assert_eq!(name.len(), MAX_STEM_CHARS + 4);
    }

    #[test]
    fn test_keeps_unicode() {
        assert_eq!(sanitize_file_name("売上レポート", "xlsx", "file"), "売上レポート.xlsx");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("notes.MD").as_deref(), Some("md"));
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("plain"), None);
    }
}
