//! Document tree abstraction walked by the link extractor.
//!
//! The extractor only needs depth-first traversal, element names, attribute
//! lookup and text. [`TreeNode`] captures that; [`XmlNode`] is an owned tree
//! implementing it, buildable by hand or from XML text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{LinkCheckError, LinkResult};

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a name, attributes and children.
    Element,
    /// Character data.
    Text,
}

/// Read-only view of a parsed document tree.
pub trait TreeNode {
    /// Kind of this node.
    fn kind(&self) -> NodeKind;

    /// Element name; empty for text nodes.
    fn name(&self) -> &str;

    /// Attribute value by qualified name, e.g. `cdr:ref`.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Child nodes in document order.
    fn children(&self) -> Box<dyn Iterator<Item = &Self> + '_>;

    /// Concatenated text of this node and its descendants.
    fn text_content(&self) -> String;
}

/// Owned document tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Element node.
    Element {
        /// Qualified element name.
        name: String,
        /// Attributes in document order.
        attributes: Vec<(String, String)>,
        /// Child nodes in document order.
        children: Vec<XmlNode>,
    },
    /// Text node.
    Text(String),
}

impl XmlNode {
    /// Creates an element with no attributes or children.
    pub fn element(name: impl Into<String>) -> Self {
        XmlNode::Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a text node.
    pub fn text(text: impl Into<String>) -> Self {
        XmlNode::Text(text.into())
    }

    /// Adds an attribute. Has no effect on text nodes.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let XmlNode::Element { attributes, .. } = &mut self {
            attributes.push((name.into(), value.into()));
        }
        self
    }

    /// Appends a child. Has no effect on text nodes.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.push_child(child);
        self
    }

    fn push_child(&mut self, child: XmlNode) {
        if let XmlNode::Element { children, .. } = self {
            children.push(child);
        }
    }

    /// Parses XML text into a tree rooted at the document element.
    ///
    /// Comments, processing instructions and the prolog are skipped.
    /// Whitespace-only text is dropped.
    pub fn parse(xml: &str) -> LinkResult<XmlNode> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(LinkCheckError::Document("multiple root elements".into()));
                    }
                    stack.push(element_from(&e)?);
                }
                Event::Empty(e) => {
                    let element = element_from(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    if let Some(completed) = stack.pop() {
                        attach(&mut stack, &mut root, completed)?;
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape()?.into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.push_child(XmlNode::Text(text));
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.push_child(XmlNode::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(LinkCheckError::Document("unclosed element at end of input".into()));
        }
        root.ok_or_else(|| LinkCheckError::Document("no root element found".into()))
    }
}

fn element_from(start: &BytesStart<'_>) -> LinkResult<XmlNode> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| LinkCheckError::Document(format!("attribute error: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlNode::Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> LinkResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(LinkCheckError::Document("multiple root elements".into())),
    }
    Ok(())
}

impl TreeNode for XmlNode {
    fn kind(&self) -> NodeKind {
        match self {
            XmlNode::Element { .. } => NodeKind::Element,
            XmlNode::Text(_) => NodeKind::Text,
        }
    }

    fn name(&self) -> &str {
        match self {
            XmlNode::Element { name, .. } => name,
            XmlNode::Text(_) => "",
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            XmlNode::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            XmlNode::Text(_) => None,
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match self {
            XmlNode::Element { children, .. } => Box::new(children.iter()),
            XmlNode::Text(_) => Box::new(std::iter::empty()),
        }
    }

    fn text_content(&self) -> String {
        match self {
            XmlNode::Text(text) => text.clone(),
            XmlNode::Element { children, .. } => {
                children.iter().map(TreeNode::text_content).collect()
            }
        }
    }
}
