//! Loads the on-disk XML template bundle once at startup and serves
//! filled/serialized copies per request (C1 applied to C3/C5's static and
//! semi-static documents).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::xml::{self, XmlElement};

pub const DEVICE_DESCRIPTION: &str = "device-description";
pub const BROWSE_RESPONSE: &str = "browse-response";
pub const SEARCH_RESPONSE: &str = "search-response";
pub const FAULT: &str = "fault";
pub const CONNECTION_MANAGER_SCPD: &str = "connection-manager2";
pub const CONTENT_DIRECTORY_SCPD: &str = "content-directory2";
pub const MEDIA_RECEIVER_REGISTRAR_SCPD: &str = "media-receiver-registrar";
pub const SEARCH_CAPABILITIES: &str = "search-capabilities";

const TEMPLATE_NAMES: &[&str] = &[
    DEVICE_DESCRIPTION,
    BROWSE_RESPONSE,
    SEARCH_RESPONSE,
    FAULT,
    CONNECTION_MANAGER_SCPD,
    CONTENT_DIRECTORY_SCPD,
    MEDIA_RECEIVER_REGISTRAR_SCPD,
    SEARCH_CAPABILITIES,
];

pub struct TemplateBundle {
    documents: HashMap<&'static str, XmlElement>,
}

impl TemplateBundle {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut documents = HashMap::new();
        for name in TEMPLATE_NAMES {
            let path = dir.join(format!("{name}.xml"));
            let root = xml::parse(&path)
                .with_context(|| format!("failed to load template {name} from {}", path.display()))?;
            documents.insert(*name, root);
        }
        Ok(TemplateBundle { documents })
    }

    /// Serve a template unmodified (the SCPD documents, search capabilities).
    pub fn raw(&self, name: &str) -> Result<String, crate::xml::XmlError> {
        let root = self
            .documents
            .get(name)
            .ok_or_else(|| crate::xml::XmlError::MissingElement(name.to_string()))?;
        xml::serialize(root)
    }

    /// Fill named placeholders in a clone of the named template and serialize it.
    pub fn render(&self, name: &str, kv: &[(&str, &str)]) -> Result<String, crate::xml::XmlError> {
        let mut root = self
            .documents
            .get(name)
            .ok_or_else(|| crate::xml::XmlError::MissingElement(name.to_string()))?
            .clone();
        xml::fill(&mut root, kv)?;
        xml::serialize(&root)
    }
}
