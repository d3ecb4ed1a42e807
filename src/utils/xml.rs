//! Convert XML documents into a `serde_json::Value` tree.
//!
//! The mapping follows the usual dictionary conventions for bibliographic XML:
//!
//! - a text-only element without attributes becomes a string
//! - an empty element without attributes becomes `null`
//! - attributes become `"@name"` keys, with element text under `"$text"`
//! - repeated child elements become an array, in document order
//! - mixed content (text interleaved with inline markup such as `<i>`, or an
//!   element holding only inline markup) collapses to the concatenated text
//!   of the element and its descendants
//!
//! The returned value is an object holding the root element under its name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::sources::SourceError;

#[derive(Debug, Default)]
struct Frame {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<(String, Value)>,
    own_text: String,
    full_text: String,
}

impl Frame {
    fn open(e: &BytesStart<'_>) -> Result<Self, SourceError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| SourceError::Parse(format!("Bad XML attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| SourceError::Parse(format!("Bad XML attribute value: {}", e)))?
                .to_string();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            ..Self::default()
        })
    }

    fn push_text(&mut self, text: &str) {
        self.own_text.push_str(text);
        self.full_text.push_str(text);
    }

    fn close(self) -> (String, String, Value) {
        let Frame {
            name,
            attrs,
            children,
            own_text,
            full_text,
        } = self;

        let mixed = !children.is_empty()
            && (!own_text.trim().is_empty() || children.iter().all(|(tag, _)| is_inline(tag)));
        let text = if mixed {
            collapse(&full_text)
        } else {
            own_text.trim().to_string()
        };

        let value = if attrs.is_empty() && (children.is_empty() || mixed) {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        } else {
            let mut map = Map::new();
            for (key, value) in attrs {
                map.insert(format!("@{}", key), Value::String(value));
            }
            if mixed || children.is_empty() {
                if !text.is_empty() {
                    map.insert("$text".to_string(), Value::String(text));
                }
            } else {
                for (key, child) in children {
                    insert_child(&mut map, key, child);
                }
            }
            Value::Object(map)
        };

        (name, full_text, value)
    }
}

fn insert_child(map: &mut Map<String, Value>, key: String, child: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(child),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, child]);
        }
        None => {
            map.insert(key, child);
        }
    }
}

/// Presentational markup found inside titles, abstracts and affiliations
const INLINE_TAGS: &[&str] = &[
    "i", "b", "u", "sup", "sub", "em", "strong", "italic", "bold", "underline", "sc",
];

fn is_inline(tag: &str) -> bool {
    INLINE_TAGS.contains(&tag)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an XML document into a JSON tree rooted at the document element
pub fn xml_to_value(xml: &str) -> Result<Value, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(Frame::open(e)?),
            Ok(Event::Empty(ref e)) => {
                let frame = Frame::open(e)?;
                attach(&mut stack, &mut root, frame);
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| SourceError::Parse(format!("Bad XML text: {}", e)))?;
                    top.push_text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| SourceError::Parse("Unbalanced XML end tag".to_string()))?;
                attach(&mut stack, &mut root, frame);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SourceError::Parse(format!("XML parsing error: {}", e))),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(SourceError::Parse("Unexpected end of XML document".to_string()));
    }

    let (name, value) =
        root.ok_or_else(|| SourceError::Parse("XML document has no root element".to_string()))?;
    let mut map = Map::new();
    map.insert(name, value);
    Ok(Value::Object(map))
}

fn attach(stack: &mut [Frame], root: &mut Option<(String, Value)>, frame: Frame) {
    let (name, full_text, value) = frame.close();
    match stack.last_mut() {
        Some(parent) => {
            parent.full_text.push_str(&full_text);
            parent.children.push((name, value));
        }
        None => *root = Some((name, value)),
    }
}
