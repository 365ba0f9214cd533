use std::num::NonZeroUsize;

/// Application-level constants
pub const APP_NAME: &str = "extract-cp";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix replacing the mask's extension on every output surface.
/// The standardized mesh produced by sphere interpolation has 81,920 triangles.
pub const OUTPUT_SUFFIX: &str = "._81920.obj";

/// Default glob for input masks.
pub const DEFAULT_PATTERN: &str = "**/*.mnc";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "extract_cp_lib=info,extract_cp=info,warn"
}

/// Worker count used when `--threads 0` is given.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_extract_cp() {
        assert_eq!(APP_NAME, "extract-cp");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn output_suffix_is_obj() {
        assert!(OUTPUT_SUFFIX.ends_with(".obj"));
        assert!(OUTPUT_SUFFIX.starts_with('.'));
    }

    #[test]
    fn default_threads_at_least_one() {
        assert!(default_threads() >= 1);
    }
}
