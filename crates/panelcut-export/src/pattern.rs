//! Output file naming.
//!
//! A pattern holds exactly one printf-style index placeholder: `%i` or
//! `%d`, optionally zero-padded to a width as in `%03d`. `%%` is a
//! literal percent sign. Chunks are numbered from zero, so `out/%i.png`
//! yields `out/0.png`, `out/1.png`, and so on. The stitched canvas is
//! written to the same pattern with the placeholder replaced by `all`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{ExportError, OutputFormat};

/// Text substituted for the placeholder when naming the merged canvas.
pub const MERGED_NAME: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Index { width: usize },
}

/// Parsed output file name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    source: String,
    segments: Vec<Segment>,
}

impl OutputPattern {
    /// Pattern used when none is given.
    pub const DEFAULT: &str = "%i.png";

    /// Parse a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Pattern`] if the pattern has no index
    /// placeholder, more than one, or an unknown `%` sequence.
    pub fn parse(pattern: &str) -> Result<Self, ExportError> {
        let invalid = |reason: String| ExportError::Pattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut placeholders = 0;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.next_if_eq(&'%').is_some() {
                literal.push('%');
                continue;
            }
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            match chars.next() {
                Some('i' | 'd') => {}
                Some(other) => return Err(invalid(format!("unknown placeholder %{digits}{other}"))),
                None => return Err(invalid("pattern ends with a bare %".to_string())),
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits
                    .parse()
                    .map_err(|_| invalid(format!("padding width {digits} is too large")))?
            };
            placeholders += 1;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Index { width });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        match placeholders {
            1 => Ok(Self {
                source: pattern.to_string(),
                segments,
            }),
            0 => Err(invalid("no %i or %d placeholder".to_string())),
            n => Err(invalid(format!("{n} placeholders, expected exactly one"))),
        }
    }

    /// The pattern as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Path of the chunk with the given zero-based index.
    #[must_use]
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.render(|width| format!("{index:0width$}"))
    }

    /// Path of the merged canvas image.
    #[must_use]
    pub fn merged_path(&self) -> PathBuf {
        self.render(|_| MERGED_NAME.to_string())
    }

    /// Output format implied by the pattern's extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnknownFormat`] if the extension is
    /// missing or unsupported.
    pub fn format(&self) -> Result<OutputFormat, ExportError> {
        OutputFormat::from_path(&self.merged_path())
    }

    fn render(&self, index: impl Fn(usize) -> String) -> PathBuf {
        let mut out = String::with_capacity(self.source.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Index { width } => out.push_str(&index(*width)),
            }
        }
        PathBuf::from(out)
    }
}

impl Default for OutputPattern {
    fn default() -> Self {
        Self {
            source: Self::DEFAULT.to_string(),
            segments: vec![
                Segment::Index { width: 0 },
                Segment::Literal(".png".to_string()),
            ],
        }
    }
}

impl FromStr for OutputPattern {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn default_pattern_numbers_from_zero() {
        let pattern = OutputPattern::default();
        assert_eq!(pattern, OutputPattern::parse(OutputPattern::DEFAULT).unwrap());
        assert_eq!(pattern.path_for(0), Path::new("0.png"));
        assert_eq!(pattern.path_for(12), Path::new("12.png"));
        assert_eq!(pattern.merged_path(), Path::new("all.png"));
    }

    #[test]
    fn directory_prefix_is_kept() {
        let pattern: OutputPattern = "out/001_%d.jpg".parse().unwrap();
        assert_eq!(pattern.path_for(3), Path::new("out/001_3.jpg"));
        assert_eq!(pattern.merged_path(), Path::new("out/001_all.jpg"));
        assert_eq!(pattern.format().unwrap(), OutputFormat::Jpeg);
    }

    #[test]
    fn zero_padding() {
        let pattern = OutputPattern::parse("page-%03i.webp").unwrap();
        assert_eq!(pattern.path_for(7), Path::new("page-007.webp"));
        assert_eq!(pattern.path_for(1234), Path::new("page-1234.webp"));
        assert_eq!(pattern.merged_path(), Path::new("page-all.webp"));
    }

    #[test]
    fn escaped_percent_is_literal() {
        let pattern = OutputPattern::parse("100%%_%i.png").unwrap();
        assert_eq!(pattern.path_for(2), Path::new("100%_2.png"));
    }

    #[test]
    fn missing_placeholder_is_rejected() {
        assert!(matches!(
            OutputPattern::parse("chunk.png"),
            Err(ExportError::Pattern { .. })
        ));
    }

    #[test]
    fn two_placeholders_are_rejected() {
        let err = OutputPattern::parse("%i_%d.png").unwrap_err();
        assert!(err.to_string().contains("2 placeholders"), "{err}");
    }

    #[test]
    fn unknown_sequences_are_rejected() {
        assert!(OutputPattern::parse("%s.png").is_err());
        assert!(OutputPattern::parse("%i.png%").is_err());
    }

    #[test]
    fn unknown_extension_has_no_format() {
        let pattern = OutputPattern::parse("%i.tga").unwrap();
        assert!(matches!(
            pattern.format(),
            Err(ExportError::UnknownFormat { .. })
        ));
    }
}
