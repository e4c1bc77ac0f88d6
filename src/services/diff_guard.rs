//! Blast-radius bound for a single automated edit.

use crate::domain::models::PipelineConfig;

/// Line-count limits applied to original and replacement spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffGuard {
    max_line_delta: usize,
    max_growth_factor: f64,
}

/// The edit exceeded one of the limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffTooLarge {
    pub original_lines: usize,
    pub replacement_lines: usize,
}

impl DiffGuard {
    pub const fn new(max_line_delta: usize, max_growth_factor: f64) -> Self {
        Self {
            max_line_delta,
            max_growth_factor,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_line_delta, config.max_growth_factor)
    }

    /// Check the line counts of the original and replacement spans.
    ///
    /// The growth ratio only applies when the original is non-empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn check(&self, original_lines: usize, replacement_lines: usize) -> Result<(), DiffTooLarge> {
        let too_large = DiffTooLarge {
            original_lines,
            replacement_lines,
        };

        if original_lines.abs_diff(replacement_lines) > self.max_line_delta {
            return Err(too_large);
        }

        if original_lines > 0
            && replacement_lines as f64 / original_lines as f64 > self.max_growth_factor
        {
            return Err(too_large);
        }

        Ok(())
    }

    /// Convenience wrapper counting lines of both spans.
    pub fn check_spans(&self, original: &str, replacement: &str) -> Result<(), DiffTooLarge> {
        self.check(count_lines(original), count_lines(replacement))
    }
}

impl Default for DiffGuard {
    fn default() -> Self {
        Self::new(200, 3.0)
    }
}

/// Number of lines in a span; a trailing newline does not open a new line.
pub fn count_lines(text: &str) -> usize {
    text.lines().count()
}
