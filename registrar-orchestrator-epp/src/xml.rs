//! Minimal owned XML element tree.
//!
//! EPP documents are small and every registry layers its own namespaces on top
//! of the base schema, so the codec works on a plain element tree instead of
//! typed serde structs: builders append elements, registry hooks splice
//! fragments in place, and decoders walk children by local name.

use std::fmt;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Structural XML problem: malformed input, or a required element/attribute is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    detail: String,
}

impl XmlError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    /// A required element is missing.
    pub fn missing(element: &str) -> Self {
        Self::new(format!("missing required element <{element}>"))
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for XmlError {}

fn xml_err(e: impl fmt::Display) -> XmlError {
    XmlError::new(e.to_string())
}

/// A child node of an [`XmlElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
}

/// An XML element with its qualified name, attributes (in document order) and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    // ============ Builders ============

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = XmlElement>) -> Self {
        self.children
            .extend(children.into_iter().map(XmlNode::Element));
        self
    }

    /// Append `child` only when it is `Some`.
    #[must_use]
    pub fn with_optional_child(self, child: Option<XmlElement>) -> Self {
        match child {
            Some(child) => self.with_child(child),
            None => self,
        }
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Set (or replace) an attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.attributes.push((key, value));
        }
    }

    /// Insert `child` directly before the first child element whose local name is
    /// `anchor`, or append it when no such child exists.
    pub fn insert_before(&mut self, anchor: &str, child: XmlElement) {
        let at = self.position_of(anchor).unwrap_or(self.children.len());
        self.children.insert(at, XmlNode::Element(child));
    }

    /// Return the child element named `name`, creating it in front of `anchor` if absent.
    pub fn ensure_child_before(
        &mut self,
        name: &str,
        anchor: &str,
    ) -> Result<&mut XmlElement, XmlError> {
        let wanted = local(name);
        if self.position_of(wanted).is_none() {
            self.insert_before(anchor, XmlElement::new(name));
        }
        self.elements_mut()
            .find(|e| e.local_name() == wanted)
            .ok_or_else(|| XmlError::missing(wanted))
    }

    fn position_of(&self, local_name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(e) if e.local_name() == local_name))
    }

    // ============ Accessors ============

    /// Element name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Namespace prefix of the element name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Namespace URI declared on this element for its own prefix.
    pub fn declared_namespace(&self) -> Option<&str> {
        match self.prefix() {
            Some(prefix) => self.attr(&format!("xmlns:{prefix}")),
            None => self.attr("xmlns"),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text and CDATA content, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(_) => {}
            }
        }
        out.trim().to_string()
    }

    /// Iterate over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) | XmlNode::CData(_) => None,
        })
    }

    /// Child elements, mutably.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) | XmlNode::CData(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local_name)
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(e) if e.local_name() == local_name => Some(e),
            _ => None,
        })
    }

    /// All child elements with the given local name.
    pub fn children_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.local_name() == local_name)
    }

    /// Text of the first child with the given local name.
    pub fn child_text(&self, local_name: &str) -> Option<String> {
        self.child(local_name).map(XmlElement::text)
    }

    /// Like [`child_text`](Self::child_text) but a missing child is an error.
    pub fn required_text(&self, local_name: &str) -> Result<String, XmlError> {
        self.child_text(local_name)
            .ok_or_else(|| XmlError::missing(local_name))
    }

    /// Follow a path of local names from this element.
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter()
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Breadth-first list of this element and all descendant elements.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = vec![self];
        let mut index = 0;
        while index < out.len() {
            let current = out[index];
            out.extend(current.elements());
            index += 1;
        }
        out
    }

    // ============ Parsing / Serialization ============

    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(element_from_start(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::new("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(xml_err)?;
                    if text.trim().is_empty() {
                        continue;
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(text.into_owned())),
                        None => return Err(XmlError::new("text outside of the root element")),
                    }
                }
                Ok(Event::CData(cdata)) => {
                    let content = String::from_utf8(cdata.into_inner().into_owned())
                        .map_err(|_| XmlError::new("CDATA section is not valid UTF-8"))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::CData(content));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(XmlError::new(format!(
                        "malformed XML at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::new(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| XmlError::new("document has no root element"))
    }

    /// Serialize as a standalone document with an XML declaration.
    pub fn to_document(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))
            .map_err(xml_err)?;
        self.write_into(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(xml_err)
    }

    /// Serialize this element as a fragment (no declaration).
    pub fn to_fragment(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        self.write_into(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(xml_err)
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(xml_err);
        }

        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        for node in &self.children {
            match node {
                XmlNode::Element(child) => child.write_into(writer)?,
                XmlNode::Text(text) => writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(xml_err)?,
                XmlNode::CData(text) => writer
                    .write_event(Event::CData(BytesCData::new(text.as_str())))
                    .map_err(xml_err)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_err)
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_err)?
        .to_string();
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_err)?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(xml_err)?
            .to_string();
        let value = attribute.unescape_value().map_err(xml_err)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(XmlError::new("document has more than one root element"))
    }
}
