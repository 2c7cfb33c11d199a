//! Container reader and the generic tree model.
//!
//! Every element becomes a [`Node`]. Tags ending in `_list` are list nodes
//! holding an ordered run of same-tagged children; everything else is a
//! record node whose children are keyed by tag.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;
use crate::snapshot::container::{document_name, ROOT_TAG};

pub const LIST_SUFFIX: &str = "_list";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    List(Vec<Node>),
    Record(BTreeMap<String, Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    pub body: NodeBody,
}

impl Node {
    pub fn is_list(&self) -> bool {
        matches!(self.body, NodeBody::List(_))
    }

    /// Child of a record node by tag.
    pub fn child(&self, tag: &str) -> Option<&Node> {
        match &self.body {
            NodeBody::Record(children) => children.get(tag),
            NodeBody::List(_) => None,
        }
    }

    /// Items of a list node; empty for record nodes.
    pub fn items(&self) -> &[Node] {
        match &self.body {
            NodeBody::List(items) => items,
            NodeBody::Record(_) => &[],
        }
    }

    /// Text content, empty when the element had none.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Text of a record child, if that child exists.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).map(Node::text)
    }
}

/// Tag every child of the list node `list_tag` must carry.
///
/// `functions_list` holds `function`, `arguments_list` holds `argument`.
pub fn list_item_tag(list_tag: &str) -> &str {
    let stem = list_tag.strip_suffix(LIST_SUFFIX).unwrap_or(list_tag);
    stem.strip_suffix('s').unwrap_or(stem)
}

/// Open a snapshot archive and parse the document named after its file stem.
pub fn read_container(path: &Path) -> Result<Node, ParseError> {
    let io_err = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let file = File::open(path).map_err(io_err)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let xml = {
        let mut entry = archive.by_name(&document_name(&stem))?;
        let mut buf = String::new();
        entry.read_to_string(&mut buf).map_err(io_err)?;
        buf
    };

    let root = parse_document(&xml)?;
    if root.tag != ROOT_TAG {
        return Err(ParseError::Root {
            expected: ROOT_TAG.to_string(),
            found: root.tag,
        });
    }
    tracing::debug!(path = %path.display(), "container document parsed");
    Ok(root)
}

struct PendingNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<Node>,
}

impl PendingNode {
    fn open(start: &BytesStart<'_>, position: u64) -> Result<Self, ParseError> {
        let tag = utf8(start.name().as_ref(), position)?.to_string();
        let mut attributes = BTreeMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Syntax {
                position,
                message: e.to_string(),
            })?;
            let key = utf8(attr.key.as_ref(), position)?.to_string();
            let raw = utf8(&attr.value, position)?;
            attributes.insert(key, unescape(raw, position)?);
        }
        Ok(Self {
            tag,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn finish(self) -> Result<Node, ParseError> {
        let has_children = !self.children.is_empty();
        let text = if self.text.is_empty() || (has_children && self.text.trim().is_empty()) {
            None
        } else {
            Some(self.text)
        };

        let body = if self.tag.ends_with(LIST_SUFFIX) {
            let expected = list_item_tag(&self.tag);
            if let Some(stray) = self.children.iter().find(|c| c.tag != expected) {
                return Err(ParseError::ListChild {
                    list: self.tag.clone(),
                    expected: expected.to_string(),
                    found: stray.tag.clone(),
                });
            }
            NodeBody::List(self.children)
        } else {
            let mut children = BTreeMap::new();
            for child in self.children {
                if children.contains_key(&child.tag) {
                    return Err(ParseError::DuplicateChild {
                        parent: self.tag,
                        child: child.tag,
                    });
                }
                children.insert(child.tag.clone(), child);
            }
            NodeBody::Record(children)
        };

        Ok(Node {
            tag: self.tag,
            attributes: self.attributes,
            text,
            body,
        })
    }
}

/// Parse an XML document into its root [`Node`].
pub fn parse_document(xml: &str) -> Result<Node, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<PendingNode> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| ParseError::Syntax {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(trailing_element(position));
                }
                stack.push(PendingNode::open(&start, position)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(trailing_element(position));
                }
                let node = PendingNode::open(&start, position)?.finish()?;
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                // The reader already matched the end tag against its start.
                let Some(pending) = stack.pop() else {
                    return Err(ParseError::Syntax {
                        position,
                        message: "unexpected closing tag".to_string(),
                    });
                };
                let node = pending.finish()?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let raw = utf8(&text, position)?;
                    top.text.push_str(&unescape(raw, position)?);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(top) = stack.last_mut() {
                    let name = utf8(&reference, position)?;
                    top.text
                        .push_str(&unescape(&format!("&{name};"), position)?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(utf8(&data, position)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Truncated(open.tag.clone()));
    }
    root.ok_or(ParseError::Empty)
}

fn attach(stack: &mut [PendingNode], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn trailing_element(position: u64) -> ParseError {
    ParseError::Syntax {
        position,
        message: "content after the root element".to_string(),
    }
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::Syntax {
        position,
        message: e.to_string(),
    })
}

fn unescape(raw: &str, position: u64) -> Result<String, ParseError> {
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .map_err(|e| ParseError::Syntax {
            position,
            message: e.to_string(),
        })
}
