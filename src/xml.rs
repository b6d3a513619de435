//! Generic, namespace-aware XML build/parse/fill/serialize helper (component C1).
//!
//! Every other XML-producing component (device description, SCPD documents,
//! DIDL-Lite, SOAP envelopes and faults) goes through this module instead of
//! hand-rolling `format!` strings, so the namespace-prefix table and the
//! escaping rules live in exactly one place.

use std::path::Path;
use thiserror::Error;
use xml::reader::{EventReader, XmlEvent as ReadEvent};
use xml::writer::{EmitterConfig, XmlEvent as WriteEvent};

/// The fixed namespace-prefix table used across the whole server.
pub const PREFIXES: &[(&str, &str)] = &[
    ("soap", "http://schemas.xmlsoap.org/soap/envelope/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("upnp", "urn:schemas-upnp-org:metadata-1-0/upnp/"),
    ("dlna", "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"),
    ("dev", "urn:schemas-upnp-org:device-1-0"),
    ("ctrl", "urn:schemas-upnp-org:control-1-0"),
    ("srv", "urn:schemas-upnp-org:service-1-0"),
    ("cd", "urn:schemas-upnp-org:service:ContentDirectory:1"),
];

fn uri_for_prefix(prefix: &str) -> Option<&'static str> {
    PREFIXES.iter().find(|(p, _)| *p == prefix).map(|(_, u)| *u)
}

fn prefix_for_uri(uri: &str) -> Option<&'static str> {
    PREFIXES.iter().find(|(_, u)| *u == uri).map(|(p, _)| *p)
}

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("missing placeholder element: {0}")]
    MissingPlaceholder(String),
    #[error("missing element: {0}")]
    MissingElement(String),
    #[error("unknown namespace prefix: {0}")]
    UnknownPrefix(String),
    #[error("malformed qname, expected \"prefix:local\": {0}")]
    MalformedQName(String),
    #[error("xml read error: {0}")]
    Read(#[from] xml::reader::Error),
    #[error("xml write error: {0}")]
    Write(#[from] xml::writer::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An element in the in-memory XML tree C1 operates on. Namespaces are
/// carried as resolved URIs rather than prefixes, so a tree built with
/// [`build`] and a tree returned by [`parse`] are structurally identical.
#[derive(Debug, Clone)]
pub struct XmlElement {
    pub namespace_uri: Option<String>,
    pub local: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Either a child element or a scalar that becomes this element's text
/// content. Mirrors the "children may be sub-elements or scalars" rule.
pub enum Content {
    Child(XmlElement),
    Text(String),
}

impl From<XmlElement> for Content {
    fn from(e: XmlElement) -> Self {
        Content::Child(e)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<u32> for Content {
    fn from(n: u32) -> Self {
        Content::Text(n.to_string())
    }
}

impl From<u64> for Content {
    fn from(n: u64) -> Self {
        Content::Text(n.to_string())
    }
}

impl From<i64> for Content {
    fn from(n: i64) -> Self {
        Content::Text(n.to_string())
    }
}

fn split_qname(qname: &str) -> Result<(&str, &str), XmlError> {
    qname
        .split_once(':')
        .ok_or_else(|| XmlError::MalformedQName(qname.to_string()))
}

/// Build an element. `qname` is `"prefix:local"`; `attrs` are bare local
/// names; later scalar entries in `contents` overwrite earlier ones as the
/// element's text (child elements are always kept).
pub fn build(
    qname: &str,
    contents: impl IntoIterator<Item = Content>,
    attrs: &[(&str, &str)],
) -> Result<XmlElement, XmlError> {
    let (prefix, local) = split_qname(qname)?;
    let namespace_uri = uri_for_prefix(prefix)
        .ok_or_else(|| XmlError::UnknownPrefix(prefix.to_string()))?
        .to_string();

    let mut el = XmlElement {
        namespace_uri: Some(namespace_uri),
        local: local.to_string(),
        attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        children: Vec::new(),
    };

    let mut pending_text: Option<String> = None;
    for content in contents {
        match content {
            Content::Child(child) => el.children.push(XmlNode::Element(child)),
            Content::Text(t) => pending_text = Some(t),
        }
    }
    if let Some(t) = pending_text {
        el.children.push(XmlNode::Text(t));
    }
    Ok(el)
}

/// Read an XML document from disk into an [`XmlElement`] tree.
pub fn parse(path: &Path) -> Result<XmlElement, XmlError> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    parse_reader(reader)
}

/// Parse an XML document from an in-memory byte slice (used for SOAP bodies).
pub fn parse_bytes(bytes: &[u8]) -> Result<XmlElement, XmlError> {
    parse_reader(bytes)
}

fn parse_reader<R: std::io::Read>(reader: R) -> Result<XmlElement, XmlError> {
    let mut parser = EventReader::new(reader);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match parser.next()? {
            ReadEvent::StartElement { name, attributes, .. } => {
                stack.push(XmlElement {
                    namespace_uri: name.namespace,
                    local: name.local_name,
                    attrs: attributes
                        .into_iter()
                        .map(|a| (a.name.local_name, a.value))
                        .collect(),
                    children: Vec::new(),
                });
            }
            ReadEvent::EndElement { .. } => {
                let finished = stack
                    .pop()
                    .ok_or_else(|| XmlError::MissingElement("unbalanced document".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(finished)),
                    None => root = Some(finished),
                }
            }
            ReadEvent::Characters(text) | ReadEvent::CData(text) => {
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Text(text));
                }
            }
            ReadEvent::EndDocument => break,
            _ => {}
        }
    }

    root.ok_or_else(|| XmlError::MissingElement("document root".into()))
}

fn first_descendant_mut<'a>(el: &'a mut XmlElement, local: &str) -> Option<&'a mut XmlElement> {
    for child in &mut el.children {
        if let XmlNode::Element(child_el) = child {
            if child_el.local == local {
                return Some(child_el);
            }
            if let Some(found) = first_descendant_mut(child_el, local) {
                return Some(found);
            }
        }
    }
    None
}

fn first_descendant<'a>(el: &'a XmlElement, local: &str) -> Option<&'a XmlElement> {
    for child in &el.children {
        if let XmlNode::Element(child_el) = child {
            if child_el.local == local {
                return Some(child_el);
            }
            if let Some(found) = first_descendant(child_el, local) {
                return Some(found);
            }
        }
    }
    None
}

fn text_of(el: &XmlElement) -> String {
    el.children
        .iter()
        .filter_map(|c| match c {
            XmlNode::Text(t) => Some(t.as_str()),
            XmlNode::Element(_) => None,
        })
        .collect()
}

/// Replace the first descendant matching each local name with fresh text
/// content. Fails closed: an unknown key means the template is missing a
/// placeholder the caller expected to be there.
pub fn fill(root: &mut XmlElement, kv: &[(&str, &str)]) -> Result<(), XmlError> {
    for (key, value) in kv {
        let target = first_descendant_mut(root, key)
            .ok_or_else(|| XmlError::MissingPlaceholder((*key).to_string()))?;
        target.children = vec![XmlNode::Text((*value).to_string())];
    }
    Ok(())
}

/// Find the first descendant with the given local name (any namespace) and
/// return its text content (empty string if it has none).
pub fn find_text(root: &XmlElement, local: &str) -> Result<String, XmlError> {
    first_descendant(root, local)
        .map(text_of)
        .ok_or_else(|| XmlError::MissingElement(local.to_string()))
}

fn collect_namespaces(el: &XmlElement, out: &mut Vec<String>) {
    if let Some(uri) = &el.namespace_uri {
        if !out.contains(uri) {
            out.push(uri.clone());
        }
    }
    for child in &el.children {
        if let XmlNode::Element(child_el) = child {
            collect_namespaces(child_el, out);
        }
    }
}

fn has_empty_namespace_descendant(el: &XmlElement) -> bool {
    el.children.iter().any(|c| match c {
        XmlNode::Element(child) => child.namespace_uri.is_none() || has_empty_namespace_descendant(child),
        XmlNode::Text(_) => false,
    })
}

/// Serialize a tree with an XML declaration. Promotes the root's own
/// namespace to the default (unprefixed) namespace when doing so can't
/// collide with an unprefixed descendant; otherwise every element keeps its
/// explicit prefix.
pub fn serialize(root: &XmlElement) -> Result<String, XmlError> {
    let use_default_ns = root.namespace_uri.is_some() && !has_empty_namespace_descendant(root);
    let root_ns = root.namespace_uri.as_deref();

    let mut namespaces = Vec::new();
    collect_namespaces(root, &mut namespaces);
    // Stable order: whatever order PREFIXES declares them in.
    namespaces.sort_by_key(|uri| PREFIXES.iter().position(|(_, u)| u == uri).unwrap_or(usize::MAX));

    let mut xmlns_attrs: Vec<(String, String)> = Vec::new();
    for uri in &namespaces {
        if use_default_ns && Some(uri.as_str()) == root_ns {
            xmlns_attrs.push(("xmlns".to_string(), uri.clone()));
        } else {
            let prefix = prefix_for_uri(uri).ok_or_else(|| XmlError::UnknownPrefix(uri.clone()))?;
            xmlns_attrs.push((format!("xmlns:{prefix}"), uri.clone()));
        }
    }

    let mut buf = Vec::new();
    {
        let mut writer = EmitterConfig::new()
            .write_document_declaration(true)
            .perform_indent(false)
            .create_writer(&mut buf);
        write_element(&mut writer, root, use_default_ns, root_ns, Some(&xmlns_attrs))?;
    }
    Ok(String::from_utf8(buf).expect("xml writer only emits valid utf-8"))
}

fn tag_name(el: &XmlElement, use_default_ns: bool, root_ns: Option<&str>) -> Result<String, XmlError> {
    match &el.namespace_uri {
        None => Ok(el.local.clone()),
        Some(uri) => {
            if use_default_ns && Some(uri.as_str()) == root_ns {
                Ok(el.local.clone())
            } else {
                let prefix = prefix_for_uri(uri).ok_or_else(|| XmlError::UnknownPrefix(uri.clone()))?;
                Ok(format!("{prefix}:{}", el.local))
            }
        }
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut xml::writer::EventWriter<W>,
    el: &XmlElement,
    use_default_ns: bool,
    root_ns: Option<&str>,
    extra_root_attrs: Option<&[(String, String)]>,
) -> Result<(), XmlError> {
    let tag = tag_name(el, use_default_ns, root_ns)?;
    let mut start = WriteEvent::start_element(tag.as_str());
    if let Some(extra) = extra_root_attrs {
        for (k, v) in extra {
            start = start.attr(k.as_str(), v.as_str());
        }
    }
    for (k, v) in &el.attrs {
        start = start.attr(k.as_str(), v.as_str());
    }
    writer.write(start)?;
    for child in &el.children {
        match child {
            XmlNode::Element(c) => write_element(writer, c, use_default_ns, root_ns, None)?,
            XmlNode::Text(t) => writer.write(WriteEvent::characters(t))?,
        }
    }
    writer.write(WriteEvent::end_element())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_sets_text_and_keeps_children() {
        let title = build("dc:title", [Content::Text("a.mp4".into())], &[]).unwrap();
        let el = build(
            "dlna:item",
            [Content::Child(title)],
            &[("id", "/a.mp4"), ("parentID", "/")],
        )
        .unwrap();
        assert_eq!(el.local, "item");
        assert_eq!(el.attrs[0], ("id".to_string(), "/a.mp4".to_string()));
        assert_eq!(el.children.len(), 1);
    }

    #[test]
    fn fill_replaces_named_descendant() {
        let friendly_name = build("dev:friendlyName", [Content::Text("old".into())], &[]).unwrap();
        let mut root = build("dev:root", [Content::Child(friendly_name)], &[]).unwrap();
        fill(&mut root, &[("friendlyName", "new name")]).unwrap();
        assert_eq!(find_text(&root, "friendlyName").unwrap(), "new name");
    }

    #[test]
    fn fill_unknown_placeholder_errors() {
        let mut root = build("dev:root", std::iter::empty(), &[]).unwrap();
        let err = fill(&mut root, &[("doesNotExist", "x")]).unwrap_err();
        assert!(matches!(err, XmlError::MissingPlaceholder(_)));
    }

    #[test]
    fn serialize_promotes_root_namespace_to_default() {
        let item = build("dlna:container", [Content::Text("x".into())], &[]).unwrap();
        let root = build("dlna:DIDL-Lite", [Content::Child(item)], &[]).unwrap();
        let xml = serialize(&root).unwrap();
        assert!(xml.contains("xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\""));
        assert!(xml.contains("<container>"));
    }

    #[test]
    fn parse_round_trips_build_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        let root = build("dev:friendlyName", [Content::Text("hello".into())], &[]).unwrap();
        std::fs::write(&path, serialize(&root).unwrap()).unwrap();

        let parsed = parse(&path).unwrap();
        assert_eq!(parsed.local, "friendlyName");
        assert_eq!(text_of(&parsed), "hello");
    }
}
