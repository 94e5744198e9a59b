//! Route path templates such as `/records/:kind/:id`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::types::TriggerError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  Static(String),
  Param(String),
}

/// A parsed path template. Trailing and repeated slashes are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathTemplate {
  raw: String,
  segments: Vec<Segment>,
}

impl PathTemplate {
  pub fn parse(raw: &str) -> Result<Self, TriggerError> {
    if !raw.starts_with('/') {
      return Err(TriggerError::InvalidPath {
        path: raw.to_string(),
        message: "must start with '/'".to_string(),
      });
    }

    let mut segments = Vec::new();
    for part in raw.split('/').filter(|p| !p.is_empty()) {
      match part.strip_prefix(':') {
        Some("") => {
          return Err(TriggerError::InvalidPath {
            path: raw.to_string(),
            message: "parameter name is empty".to_string(),
          });
        }
        Some(name) => {
          if segments.contains(&Segment::Param(name.to_string())) {
            return Err(TriggerError::InvalidPath {
              path: raw.to_string(),
              message: format!("duplicate parameter ':{}'", name),
            });
          }
          segments.push(Segment::Param(name.to_string()));
        }
        None => segments.push(Segment::Static(part.to_string())),
      }
    }

    Ok(Self {
      raw: raw.to_string(),
      segments,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  pub fn param_names(&self) -> Vec<&str> {
    self
      .segments
      .iter()
      .filter_map(|s| match s {
        Segment::Param(name) => Some(name.as_str()),
        Segment::Static(_) => None,
      })
      .collect()
  }

  /// The template with parameter names erased, e.g. `/records/:/:`.
  ///
  /// Two templates with the same shape match exactly the same paths.
  pub fn shape(&self) -> String {
    let mut shape = String::new();
    for segment in &self.segments {
      shape.push('/');
      if let Segment::Static(s) = segment {
        shape.push_str(s);
      } else {
        shape.push(':');
      }
    }
    if shape.is_empty() {
      shape.push('/');
    }
    shape
  }

  /// Match a request path, returning the decoded parameters on success.
  pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() != self.segments.len() {
      return None;
    }

    let mut params = HashMap::new();
    for (segment, part) in self.segments.iter().zip(parts) {
      let decoded = percent_decode_str(part).decode_utf8_lossy();
      match segment {
        Segment::Static(expected) if *expected == decoded => {}
        Segment::Static(_) => return None,
        Segment::Param(name) => {
          params.insert(name.clone(), decoded.into_owned());
        }
      }
    }
    Some(params)
  }

  /// Order two templates that matched the same path.
  ///
  /// Segments are compared left to right; the first position where one
  /// template is static and the other templated decides, static first.
  pub fn specificity_cmp(&self, other: &Self) -> Ordering {
    let mine = self.segments.iter().map(|s| matches!(s, Segment::Static(_)));
    let theirs = other.segments.iter().map(|s| matches!(s, Segment::Static(_)));
    mine.cmp(theirs)
  }
}

impl fmt::Display for PathTemplate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl TryFrom<String> for PathTemplate {
  type Error = TriggerError;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    Self::parse(&raw)
  }
}

impl From<PathTemplate> for String {
  fn from(template: PathTemplate) -> Self {
    template.raw
  }
}
