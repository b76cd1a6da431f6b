pub mod display;

use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use crate::config::{OverlayConfig, XmlTarget};
use crate::error::ExtractError;
use crate::xml;

/// What the overlay currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum Reading {
    #[serde(rename = "ok")]
    Value { text: String },
    #[serde(rename = "error")]
    Error { text: String },
}

impl Reading {
    pub fn text(&self) -> &str {
        match self {
            Reading::Value { text } | Reading::Error { text } => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reading::Error { .. })
    }

    fn from_extraction(result: Result<String, ExtractError>) -> Self {
        match result {
            Ok(text) => Reading::Value { text },
            Err(ExtractError::NotFound { target_node }) => Reading::Error {
                text: format!("Error: {target_node} not found in XML"),
            },
            Err(err) => Reading::Error {
                text: format!("Error reading XML: {err}"),
            },
        }
    }
}

/// The watched file plus everything needed to decide whether it must be re-read.
#[derive(Debug)]
pub struct Overlay {
    xml_path: PathBuf,
    target: XmlTarget,
    /// mtime seen at the last extraction; `None` once the file goes missing.
    last_modified: Option<SystemTime>,
    displayed: Option<Reading>,
    extractions: u64,
}

impl Overlay {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            xml_path: config.xml_path.clone(),
            target: config.xml_config.clone(),
            last_modified: None,
            displayed: None,
            extractions: 0,
        }
    }

    /// Stat the file and re-extract only if its mtime moved.
    ///
    /// Returns the new reading when the displayed text changed, `None` otherwise.
    pub fn check(&mut self) -> Option<&Reading> {
        let reading = match std::fs::metadata(&self.xml_path) {
            Ok(meta) => {
                let modified = meta.modified().ok();
                if modified.is_some() && modified == self.last_modified {
                    tracing::trace!(path = %self.xml_path.display(), "mtime unchanged");
                    return None;
                }
                self.last_modified = modified;
                self.extractions += 1;
                tracing::debug!(
                    path = %self.xml_path.display(),
                    count = self.extractions,
                    "re-reading XML"
                );
                Reading::from_extraction(xml::extract_text(
                    &self.xml_path,
                    &self.target.xpath,
                    &self.target.target_node,
                    &self.target.root_node,
                ))
            }
            Err(source) => {
                self.last_modified = None;
                Reading::from_extraction(Err(ExtractError::Io {
                    path: self.xml_path.clone(),
                    source,
                }))
            }
        };

        if self.displayed.as_ref() == Some(&reading) {
            return None;
        }
        if let Reading::Error { text } = &reading {
            tracing::warn!(path = %self.xml_path.display(), "{text}");
        }
        self.displayed = Some(reading);
        self.displayed.as_ref()
    }

    pub fn displayed(&self) -> Option<&Reading> {
        self.displayed.as_ref()
    }

    /// Number of times the file was actually parsed.
    #[cfg(test)]
    pub fn extractions(&self) -> u64 {
        self.extractions
    }
}
