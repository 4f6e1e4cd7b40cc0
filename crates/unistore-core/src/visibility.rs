//! Object visibility and URL resize directives
//!
//! `Visibility` is an attribute of a stored object, mutable independently of
//! its content. `StorageResize` belongs to a URL request and never touches
//! stored bytes.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access-control classification of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Private,
    PublicRead,
    PublicReadWrite,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::PublicRead => "public-read",
            Visibility::PublicReadWrite => "public-read-write",
        }
    }

    /// Whether anonymous readers can fetch the object.
    pub fn is_public(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object visibility: {0}")]
pub struct ParseVisibilityError(pub String);

impl FromStr for Visibility {
    type Err = ParseVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "public-read" => Ok(Visibility::PublicRead),
            "public-read-write" => Ok(Visibility::PublicReadWrite),
            other => Err(ParseVisibilityError(other.to_string())),
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Image resize hint attached to URL generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageResize {
    /// Maximum height in pixels
    pub max_height: Option<u32>,
}

impl StorageResize {
    pub fn with_max_height(max_height: u32) -> Self {
        Self {
            max_height: Some(max_height),
        }
    }

    /// Image process directive understood by Alibaba OSS, e.g. `image/resize,m_lfit,h_200`.
    pub fn to_oss_process(&self) -> String {
        let mut directive = String::from("image/resize,m_lfit");
        if let Some(height) = self.max_height {
            directive.push_str(&format!(",h_{}", height));
        }
        directive
    }
}
