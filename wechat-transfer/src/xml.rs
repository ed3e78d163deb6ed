//! XML marshaling for provider payloads.
//!
//! The provider speaks flat XML documents wrapped in an `<xml>` root:
//!
//! ```xml
//! <xml>
//!   <mch_id>1900000109</mch_id>
//!   <desc><![CDATA[R&D bonus]]></desc>
//! </xml>
//! ```
//!
//! [`to_xml`] goes through [`serde_json::Value`] so any `Serialize` type works, and
//! [`from_xml`] builds a [`serde_json::Map`] first so any `Deserialize` type can be read
//! back. Leaf values are always text; only elements that actually repeat become arrays.
//!
//! # Examples
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use wechat_transfer::xml::{from_xml, to_xml};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Query {
//!     partner_trade_no: String,
//!     mch_id: String,
//! }
//!
//! # fn example() -> wechat_transfer::error::Result<()> {
//! let query = Query { partner_trade_no: "1217752501201407033233368018".into(), mch_id: "10000098".into() };
//! let xml = to_xml(&query)?;
//! let back: Query = from_xml(&xml)?;
//! assert_eq!(back, query);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use quick_xml::{
    Reader, Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{Result, TransferError};

/// Name of the wrapper element around every document.
pub const ROOT_ELEMENT: &str = "xml";

/// Untyped document: child elements of the root, by name.
pub type XmlMap = Map<String, Value>;

fn xml_error(e: impl std::fmt::Display) -> TransferError {
    TransferError::XmlError(e.to_string())
}

/// Serializes a value into an XML document with an `<xml>` root.
///
/// # Errors
///
/// Returns [`TransferError::SerializationError`] if the value does not serialize to a
/// map, or [`TransferError::XmlError`] if writing fails.
pub fn to_xml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    match serde_json::to_value(value)
        .map_err(|e| TransferError::SerializationError(e.to_string()))?
    {
        Value::Object(map) => map_to_xml(&map),
        other => Err(TransferError::SerializationError(format!(
            "XML payload must be a map, got {}",
            value_kind(&other)
        ))),
    }
}

/// Serializes an untyped map into an XML document with an `<xml>` root.
///
/// # Errors
///
/// Returns [`TransferError::XmlError`] if writing fails.
pub fn map_to_xml(map: &XmlMap) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_error)?;
    writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT))).map_err(xml_error)?;
    write_children(&mut writer, map)?;
    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT))).map_err(xml_error)?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn write_children(writer: &mut Writer<Vec<u8>>, map: &XmlMap) -> Result<()> {
    for (name, value) in map {
        match value {
            Value::Array(items) => {
                for item in items {
                    write_element(writer, name, item)?;
                }
            }
            _ => write_element(writer, name, value)?,
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    let text = match value {
        Value::Null => return Ok(()),
        Value::Object(children) => {
            writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_error)?;
            write_children(writer, children)?;
            return writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error);
        }
        // Nested sequences have no XML shape; flatten them into repeated elements.
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
            return Ok(());
        }
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
    };

    writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_error)?;
    write_text(writer, &text)?;
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error)
}

/// Writes text as CDATA when it carries markup characters, escaped text otherwise.
fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
    if !requires_cdata(text) {
        return writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error);
    }

    // `]]>` cannot appear inside a CDATA section; end the section between `]]` and `>`.
    let mut rest = text;
    while let Some(idx) = rest.find("]]>") {
        let (head, tail) = rest.split_at(idx + 2);
        writer.write_event(Event::CData(BytesCData::new(head))).map_err(xml_error)?;
        rest = tail;
    }
    writer.write_event(Event::CData(BytesCData::new(rest))).map_err(xml_error)
}

fn requires_cdata(text: &str) -> bool {
    text.contains(['<', '>', '&'])
}

/// Parses an XML document into a typed value, eliding the root element.
///
/// # Errors
///
/// Returns [`TransferError::XmlError`] on malformed XML, or
/// [`TransferError::SerializationError`] if the document does not fit `T`.
pub fn from_xml<T: DeserializeOwned>(text: &str) -> Result<T> {
    let map = from_xml_map(text)?;
    serde_json::from_value(Value::Object(map))
        .map_err(|e| TransferError::SerializationError(e.to_string()))
}

/// One open element during parsing.
#[derive(Debug, Default)]
struct Frame {
    name: String,
    text: String,
    children: XmlMap,
}

impl Frame {
    fn named(name: String) -> Self {
        Self { name, ..Self::default() }
    }

    /// Leaf elements collapse to their text; elements with children become maps.
    fn into_value(self) -> Value {
        if self.children.is_empty() { Value::String(self.text) } else { Value::Object(self.children) }
    }

    fn insert(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            None => {
                self.children.insert(name, value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
}

/// Parses an XML document into an untyped map, eliding the root element.
///
/// # Errors
///
/// Returns [`TransferError::XmlError`] if the document is empty, unbalanced, has more
/// than one root, or contains invalid escapes.
pub fn from_xml_map(text: &str) -> Result<XmlMap> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<XmlMap> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(xml_error("document has more than one root element"));
                }
                let name = element_name(&start)?;
                stack.push(Frame::named(name));
            }
            Event::Empty(start) => {
                let name = element_name(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.insert(name, Value::String(String::new())),
                    None if root.is_none() => root = Some(XmlMap::new()),
                    None => return Err(xml_error("document has more than one root element")),
                }
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(xml_error)?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&unescaped),
                    None if unescaped.trim().is_empty() => {}
                    None => return Err(xml_error("text outside of the root element")),
                }
            }
            Event::CData(data) => {
                let content = String::from_utf8(data.into_inner().into_owned()).map_err(xml_error)?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&content),
                    None => return Err(xml_error("CDATA outside of the root element")),
                }
            }
            Event::End(_) => {
                let Some(frame) = stack.pop() else {
                    return Err(xml_error("unexpected closing tag"));
                };
                match stack.last_mut() {
                    Some(parent) => {
                        let name = frame.name.clone();
                        parent.insert(name, frame.into_value());
                    }
                    None => root = Some(frame.children),
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no fields.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| xml_error("document has no root element"))
}

fn element_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.name().as_ref()).map(str::to_owned).map_err(xml_error)
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}
