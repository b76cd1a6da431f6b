mod encoding;
pub mod path;

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{ExtractError, XmlError};

pub use path::ElementPath;

/// Index of an element inside a [`Document`].
pub type ElementId = usize;

/// One element of a parsed document.
#[derive(Debug, Clone)]
pub struct Element {
    /// Qualified name as written in the source (`prefix:local` is kept verbatim).
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Character data before the first child element (entities unescaped, CDATA included).
    pub text: String,
    /// Character data after this element's end tag, up to the next sibling or the parent's end.
    pub tail: String,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

impl Element {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Minimal element tree: enough structure to evaluate an [`ElementPath`].
///
/// Elements are stored in document order; index 0 is always the root.
#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    pub const ROOT: ElementId = 0;

    pub fn parse_str(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut elements: Vec<Element> = Vec::new();
        // Open elements, innermost last.
        let mut stack: Vec<ElementId> = Vec::new();
        let mut root_closed = false;

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|e| XmlError {
                message: e.to_string(),
                position,
            })?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    if root_closed {
                        return Err(XmlError {
                            message: "junk after document element".into(),
                            position,
                        });
                    }
                    let id = elements.len();
                    let parent = stack.last().copied();
                    elements.push(open_element(e, parent, position)?);
                    if let Some(p) = parent {
                        elements[p].children.push(id);
                    }
                    if matches!(event, Event::Start(_)) {
                        stack.push(id);
                    } else if parent.is_none() {
                        root_closed = true;
                    }
                }
                Event::End(_) => {
                    // quick-xml already rejects mismatched end names.
                    stack.pop();
                    if stack.is_empty() {
                        root_closed = true;
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| XmlError {
                        message: e.to_string(),
                        position,
                    })?;
                    append_text(&mut elements, &stack, &text, position)?;
                }
                Event::CData(c) => {
                    let raw = c.into_inner();
                    append_text(&mut elements, &stack, &String::from_utf8_lossy(&raw), position)?;
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if elements.is_empty() {
            return Err(XmlError {
                message: "no element found".into(),
                position: reader.buffer_position(),
            });
        }
        if let Some(&open) = stack.last() {
            return Err(XmlError {
                message: format!("unclosed element <{}>", elements[open].name),
                position: reader.buffer_position(),
            });
        }

        Ok(Self { elements })
    }

    pub fn root(&self) -> &Element {
        &self.elements[Self::ROOT]
    }

    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// All character data inside `id`: its text, then each child's full text and tail.
    pub fn itertext(&self, id: ElementId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: ElementId, out: &mut String) {
        let element = self.get(id);
        out.push_str(&element.text);
        for &child in &element.children {
            self.collect_text(child, out);
            out.push_str(&self.get(child).tail);
        }
    }
}

fn open_element(
    start: &BytesStart<'_>,
    parent: Option<ElementId>,
    position: usize,
) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError {
            message: e.to_string(),
            position,
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError {
                message: e.to_string(),
                position,
            })?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        text: String::new(),
        tail: String::new(),
        parent,
        children: Vec::new(),
    })
}

/// Append character data to the innermost open element, or to the tail of its
/// last child once it has one. Non-whitespace outside the root element is an error.
fn append_text(
    elements: &mut [Element],
    stack: &[ElementId],
    text: &str,
    position: usize,
) -> Result<(), XmlError> {
    match stack.last() {
        Some(&id) => {
            match elements[id].children.last().copied() {
                Some(last) => elements[last].tail.push_str(text),
                None => elements[id].text.push_str(text),
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError {
            message: "text outside of document element".into(),
            position,
        }),
    }
}

/// Parse `xml_path` and return the trimmed text of the first element matched by `xpath`.
///
/// `target_node` only names the node in the `NotFound` error. A mismatching root
/// element name is logged and otherwise ignored.
pub fn extract_text(
    xml_path: &Path,
    xpath: &str,
    target_node: &str,
    root_node: &str,
) -> Result<String, ExtractError> {
    let path = ElementPath::compile(xpath)?;
    let bytes = std::fs::read(xml_path).map_err(|source| ExtractError::Io {
        path: xml_path.to_path_buf(),
        source,
    })?;
    let doc = Document::parse_str(&encoding::decode_document(&bytes)?)?;
    tracing::trace!(elements = doc.element_count(), "parsed");

    if !root_node.is_empty() && doc.root().name != root_node {
        tracing::warn!(
            expected = root_node,
            found = %doc.root().name,
            "root element name differs from configuration"
        );
    }

    match path.find(&doc, Document::ROOT) {
        Some(id) => Ok(doc.get(id).text.trim().to_string()),
        None => Err(ExtractError::NotFound {
            target_node: target_node.to_string(),
        }),
    }
}
