//! A small owned element tree for output documents.
//!
//! Serializers assemble the whole document first and render it in one pass,
//! so child order is exactly the order of construction. Two renderers exist:
//! [`XmlElement::to_pretty_xml`] for the canonical document and
//! [`XmlElement::to_tree_xml`] for the Runkeeper export, whose whitespace
//! rules differ.

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{GpxError, Result};

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Empty,
    Text(String),
    CData(String),
    Children(Vec<XmlElement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub content: Content,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            content: Content::Empty,
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content = Content::Text(text.into());
        self
    }

    pub fn cdata(mut self, text: impl Into<String>) -> Self {
        self.content = Content::CData(text.into());
        self
    }

    /// Append a child. Any text content is replaced.
    pub fn child(mut self, child: XmlElement) -> Self {
        self.push(child);
        self
    }

    /// Shorthand for a text-only child.
    pub fn text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.child(XmlElement::new(name).text(text))
    }

    pub fn push(&mut self, child: XmlElement) {
        match &mut self.content {
            Content::Children(children) => children.push(child),
            other => *other = Content::Children(vec![child]),
        }
    }

    pub fn children(&self) -> &[XmlElement] {
        match &self.content {
            Content::Children(children) => children,
            _ => &[],
        }
    }

    /// Renders as a self-closing tag.
    fn is_empty(&self) -> bool {
        match &self.content {
            Content::Empty => true,
            Content::Text(text) => text.is_empty(),
            Content::CData(_) => false,
            Content::Children(children) => children.is_empty(),
        }
    }

    fn start_tag(&self, style: Style) -> BytesStart<'_> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            let value = escape(value, style.attr_entities());
            start.push_attribute((key.as_bytes(), value.as_bytes()));
        }
        start
    }

    /// Two-space indented document: text-only elements stay on one line,
    /// empty elements collapse to `<tag/>`, and the output ends in a newline.
    pub fn to_pretty_xml(&self) -> Result<String> {
        let mut output = Vec::new();
        let mut writer = Writer::new_with_indent(&mut output, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_pretty(&mut writer)?;

        let mut xml = into_string(output)?;
        xml.push('\n');
        Ok(xml)
    }

    fn write_pretty<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let start = self.start_tag(Style::Pretty);
        if self.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        match &self.content {
            Content::Text(text) => {
                let escaped = escape(text, Style::Pretty.text_entities());
                writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
            }
            Content::CData(text) => write_cdata(writer, text)?,
            Content::Children(children) => {
                for child in children {
                    child.write_pretty(writer)?;
                }
            }
            Content::Empty => {}
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    fn has_child_nodes(&self) -> bool {
        matches!(self.content, Content::CData(_)) || !self.children().is_empty()
    }

    /// Declaration line followed by the tree.
    ///
    /// Compact unless `indent`; indentation then follows the level rule of
    /// the Runkeeper export: an element with children opens its content with
    /// a newline and `level + 2` spaces, and every element other than a
    /// childless root is followed by a newline and `level` spaces. Closing
    /// tags therefore sit one step deeper than their opening tags. Empty
    /// elements render as `<tag />`.
    pub fn to_tree_xml(&self, indent: bool) -> Result<String> {
        let mut output = Vec::new();
        let mut writer = Writer::new(&mut output);
        self.write_tree(&mut writer, indent.then_some(0))?;
        Ok(format!("{DECLARATION}\n{}", into_string(output)?))
    }

    fn write_tree<W: Write>(&self, writer: &mut Writer<W>, level: Option<usize>) -> Result<()> {
        let start = self.start_tag(Style::Tree);
        if self.is_empty() {
            let content = format!("{} ", String::from_utf8_lossy(&start));
            writer.write_event(Event::Empty(BytesStart::from_content(content, self.name.len())))?;
        } else {
            writer.write_event(Event::Start(start))?;
            match &self.content {
                Content::Text(text) => {
                    let escaped = escape(text, Style::Tree.text_entities());
                    writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
                }
                Content::CData(text) => {
                    // Indented, the section sits on its own line like a child node.
                    if let Some(level) = level {
                        write_break(writer, level + 2)?;
                    }
                    write_cdata(writer, text)?;
                    if let Some(level) = level {
                        write_break(writer, level + 2)?;
                    }
                }
                Content::Children(children) => {
                    if let Some(level) = level {
                        write_break(writer, level + 2)?;
                    }
                    for child in children {
                        child.write_tree(writer, level.map(|l| l + 2))?;
                    }
                }
                Content::Empty => {}
            }
            writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        }

        match level {
            Some(level) if level > 0 || self.has_child_nodes() => write_break(writer, level),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Pretty,
    Tree,
}

impl Style {
    fn text_entities(self) -> &'static [(char, &'static str)] {
        match self {
            Self::Pretty => &[('&', "&amp;"), ('<', "&lt;"), ('"', "&quot;"), ('>', "&gt;")],
            Self::Tree => &[('&', "&amp;"), ('<', "&lt;"), ('>', "&gt;")],
        }
    }

    fn attr_entities(self) -> &'static [(char, &'static str)] {
        match self {
            Self::Pretty => self.text_entities(),
            Self::Tree => &[
                ('&', "&amp;"),
                ('<', "&lt;"),
                ('>', "&gt;"),
                ('"', "&quot;"),
                ('\r', "&#13;"),
                ('\n', "&#10;"),
                ('\t', "&#09;"),
            ],
        }
    }
}

fn escape(text: &str, entities: &[(char, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match entities.iter().find(|(ch, _)| *ch == c) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

/// A CDATA section cannot contain `]]>`, so the text is split across
/// adjacent sections at each occurrence.
fn write_cdata<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<()> {
    for section in cdata_sections(text) {
        writer.write_event(Event::CData(BytesCData::new(section)))?;
    }
    Ok(())
}

fn cdata_sections(text: &str) -> Vec<String> {
    let pieces: Vec<&str> = text.split("]]>").collect();
    let last = pieces.len() - 1;
    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let head = if i == 0 { "" } else { ">" };
            let tail = if i == last { "" } else { "]]" };
            format!("{head}{piece}{tail}")
        })
        .collect()
}

fn write_break<W: Write>(writer: &mut Writer<W>, level: usize) -> Result<()> {
    let whitespace = format!("\n{}", " ".repeat(level));
    writer.write_event(Event::Text(BytesText::from_escaped(whitespace)))?;
    Ok(())
}

fn into_string(output: Vec<u8>) -> Result<String> {
    String::from_utf8(output).map_err(|e| GpxError::Malformed(format!("serialized XML is not UTF-8: {e}")))
}
