use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::TriggerError;

/// Methods an HTTP trigger can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl HttpMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Patch => "PATCH",
      HttpMethod::Delete => "DELETE",
    }
  }
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for HttpMethod {
  type Err = TriggerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "GET" => Ok(HttpMethod::Get),
      "POST" => Ok(HttpMethod::Post),
      "PUT" => Ok(HttpMethod::Put),
      "PATCH" => Ok(HttpMethod::Patch),
      "DELETE" => Ok(HttpMethod::Delete),
      _ => Err(TriggerError::UnsupportedMethod(s.to_string())),
    }
  }
}
