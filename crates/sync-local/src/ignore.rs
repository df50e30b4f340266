use std::path::Path;

use glob::Pattern;

/// Evaluates a list of shell-style glob patterns against a path's individual
/// components and its basename. Advisory: a pattern that fails to compile is
/// dropped rather than treated as an error, since a bad ignore rule should
/// never stop the daemon from running.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    pub fn new(raw_patterns: &[String]) -> Self {
        let patterns = raw_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(_) => {
                    tracing::warn!(pattern = %p, "skipping invalid ignore pattern");
                    None
                }
            })
            .collect();
        IgnoreMatcher { patterns }
    }

    /// True if any pattern matches any component of `path`, or its basename.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        for component in path.components() {
            let part = component.as_os_str().to_string_lossy();
            if self.patterns.iter().any(|p| p.matches(&part)) {
                return true;
            }
        }
        if let Some(name) = path.file_name() {
            let name = name.to_string_lossy();
            if self.patterns.iter().any(|p| p.matches(&name)) {
                return true;
            }
        }
        false
    }
}
