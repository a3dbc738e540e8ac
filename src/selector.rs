//! # File Selection Module
//!
//! Applies the include/exclude policy to a candidate list.
//!
//! ## Policy (reproduced exactly):
//! - When an *include* specification is configured, the selection is
//!   exactly the files whose name it matches. The test pattern and the
//!   exclude specification are ignored entirely - include silently
//!   supersedes them, it is not additive.
//! - Otherwise a file is selected when the test pattern matches its full
//!   path AND the exclude specification (if any) does not match its name.
//!
//! The test pattern runs against the full path; include/exclude run
//! against the projected file name. Callers supply both projections.

use crate::config::OptimizerOptions;
use crate::error::OptimizeError;
use crate::matcher::Matcher;

/// Selects the working set for a pass
#[derive(Debug, Clone)]
pub struct FileSelector {
    test: regex::Regex,
    include: Option<Matcher>,
    exclude: Option<Matcher>,
}

impl FileSelector {
    /// Compile the selection configuration. Fails fast on malformed
    /// patterns or matcher specs.
    pub fn from_options(options: &OptimizerOptions) -> Result<Self, OptimizeError> {
        Ok(Self {
            test: regex::Regex::new(&options.test_pattern)?,
            include: options.include.as_ref().map(|s| s.compile()).transpose()?,
            exclude: options.exclude.as_ref().map(|s| s.compile()).transpose()?,
        })
    }

    /// Select the files to optimize from a candidate list.
    ///
    /// `path_of` projects a candidate to the path string tested by the
    /// default pattern; `name_of` projects it to the comparable name the
    /// include/exclude matchers see.
    pub fn select<T: Clone>(
        &self,
        all_files: &[T],
        path_of: impl Fn(&T) -> String,
        name_of: impl Fn(&T) -> String,
    ) -> Vec<T> {
        if let Some(ref include) = self.include {
            return all_files
                .iter()
                .filter(|f| include.matches(&name_of(f)))
                .cloned()
                .collect();
        }

        all_files
            .iter()
            .filter(|f| {
                self.test.is_match(&path_of(f))
                    && !self
                        .exclude
                        .as_ref()
                        .map_or(false, |m| m.matches(&name_of(f)))
            })
            .cloned()
            .collect()
    }
}
