//! Level-name mapping templates (`"{var_name}{level:d}m"`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    VarName,
    Level,
    /// `{level:d}`: integral levels only.
    LevelInt,
}

/// A parsed output-name template.
///
/// Supported placeholders are `{var_name}`, `{level}` and `{level:d}`.
/// Braces are escaped by doubling (`{{`, `}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(TransformError::Template(format!(
                                    "unclosed placeholder in `{template}`"
                                )))
                            }
                        }
                    }
                    let segment = match name.as_str() {
                        "var_name" => Segment::VarName,
                        "level" => Segment::Level,
                        "level:d" => Segment::LevelInt,
                        other => {
                            return Err(TransformError::Template(format!(
                                "unknown placeholder `{{{other}}}` in `{template}`"
                            )))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => {
                    return Err(TransformError::Template(format!(
                        "unmatched `}}` in `{template}`"
                    )))
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// True when the template references the level value.
    pub fn has_level(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Level | Segment::LevelInt))
    }

    /// True when the template requires integral levels.
    pub fn requires_integral_level(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::LevelInt))
    }

    /// Render an output name.
    ///
    /// `level` must be given when the template references it.
    pub fn render(&self, var_name: &str, level: Option<f64>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::VarName => out.push_str(var_name),
                Segment::Level => {
                    let level = self.require_level(level)?;
                    out.push_str(&format_level(level));
                }
                Segment::LevelInt => {
                    let level = self.require_level(level)?;
                    if level.fract() != 0.0 || !level.is_finite() {
                        return Err(TransformError::Template(format!(
                            "`{}` needs an integral level, got {level}",
                            self.source
                        )));
                    }
                    out.push_str(&format!("{}", level as i64));
                }
            }
        }
        Ok(out)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn require_level(&self, level: Option<f64>) -> Result<f64> {
        level.ok_or_else(|| {
            TransformError::Template(format!(
                "`{}` references the level but the variable has no explicit levels",
                self.source
            ))
        })
    }
}

/// Integral levels render without a decimal part.
fn format_level(level: f64) -> String {
    if level.fract() == 0.0 && level.is_finite() {
        format!("{}", level as i64)
    } else {
        format!("{level}")
    }
}

impl TryFrom<String> for NameTemplate {
    type Error = TransformError;

    fn try_from(value: String) -> Result<Self> {
        NameTemplate::parse(&value)
    }
}

impl From<NameTemplate> for String {
    fn from(value: NameTemplate) -> Self {
        value.source
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
