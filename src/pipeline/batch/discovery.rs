//! Input discovery: glob matching over a directory tree.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use super::BatchError;

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPaths {
    pub mask: PathBuf,
    pub surface: PathBuf,
}

/// Find every file under `input_dir` whose `/`-separated relative path
/// matches `pattern`, and map it to a surface path under `output_dir` that
/// mirrors the relative directory with the extension replaced by `suffix`.
///
/// Results are sorted by mask path.
pub fn discover_subjects(
    input_dir: &Path,
    output_dir: &Path,
    pattern: &str,
    suffix: &str,
) -> Result<Vec<SubjectPaths>, BatchError> {
    if !input_dir.is_dir() {
        return Err(BatchError::Discovery(format!(
            "input directory does not exist: {}",
            input_dir.display()
        )));
    }
    let matcher = glob_to_regex(pattern)?;

    let mut subjects = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(input_dir) else {
            continue;
        };
        if !matcher.is_match(&slash_path(relative)) {
            continue;
        }
        subjects.push(SubjectPaths {
            mask: entry.path().to_path_buf(),
            surface: output_path(output_dir, relative, suffix),
        });
    }

    subjects.sort_by(|a, b| a.mask.cmp(&b.mask));
    tracing::debug!(
        input = %input_dir.display(),
        pattern,
        count = subjects.len(),
        "Discovered subjects"
    );
    Ok(subjects)
}

fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `a/b/lh.mnc` → `<output_dir>/a/b/lh<suffix>`
fn output_path(output_dir: &Path, relative: &Path, suffix: &str) -> PathBuf {
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = match relative.parent() {
        Some(parent) => output_dir.join(parent),
        None => output_dir.to_path_buf(),
    };
    dir.join(format!("{stem}{suffix}"))
}

// ═══════════════════════════════════════════════════════════
// Glob translation
// ═══════════════════════════════════════════════════════════

/// Translate a shell glob into an anchored regex.
///
/// `**/` matches any number of leading directories (including none), `**`
/// anything, `*` anything within one path segment, `?` one non-separator
/// character, `[...]` / `[!...]` a character class.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex, BatchError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .skip(1)
                    .position(|&c| c == ']')
                    .map(|p| i + 2 + p);
                let Some(close) = close else {
                    return Err(BatchError::Discovery(format!(
                        "unterminated character class in pattern \"{pattern}\""
                    )));
                };
                re.push('[');
                let mut body = &chars[i + 1..close];
                if let Some(('!' | '^', rest)) = body.split_first() {
                    re.push('^');
                    body = rest;
                }
                for &c in body {
                    if c == '\\' || c == '[' {
                        re.push('\\');
                    }
                    re.push(c);
                }
                re.push(']');
                i = close;
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');

    Regex::new(&re)
        .map_err(|e| BatchError::Discovery(format!("invalid pattern \"{pattern}\": {e}")))
}
