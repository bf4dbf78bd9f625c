//! Minimal XML element-tree reader for aircraft and script files.
//!
//! Supports elements, attributes, text content, comments, and declarations;
//! no namespaces, CDATA, or DTDs, which the configuration format does not
//! use. Parse errors carry the line number of the offending construct.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("line {line}: {detail}")]
    Malformed { line: usize, detail: String },
    #[error("line {line}: mismatched close tag </{found}>, expected </{expected}>")]
    Mismatch {
        line: usize,
        found: String,
        expected: String,
    },
    #[error("unexpected end of document")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, XmlError>;

/// One parsed element.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
    pub line: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First child with the given element name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn text_trimmed(&self) -> &str {
        self.text.trim()
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn error(&self, detail: &str) -> XmlError {
        XmlError::Malformed {
            line: self.line,
            detail: detail.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.input[self.pos..].starts_with(prefix.as_bytes())
    }

    fn skip_until(&mut self, needle: &str) -> Result<()> {
        while !self.starts_with(needle) {
            if self.bump().is_none() {
                return Err(XmlError::UnexpectedEof);
            }
        }
        for _ in 0..needle.len() {
            self.bump();
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    /// Skip declarations, processing instructions, and comments between
    /// elements.
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.skip_until("?>")?;
            } else if self.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if self.starts_with("<!") {
                self.skip_until(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn read_name(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b':' | b'.')
        ) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn read_attributes(&mut self) -> Result<HashMap<String, String>> {
        let mut attributes = HashMap::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') | Some(b'/') | None => return Ok(attributes),
                _ => {}
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            if self.peek() != Some(b'=') {
                return Err(self.error("expected '=' after attribute name"));
            }
            self.bump();
            self.skip_whitespace();
            let quote = match self.peek() {
                Some(q @ (b'"' | b'\'')) => {
                    self.bump();
                    q
                }
                _ => return Err(self.error("expected quoted attribute value")),
            };
            let start = self.pos;
            while self.peek() != Some(quote) {
                if self.bump().is_none() {
                    return Err(XmlError::UnexpectedEof);
                }
            }
            let value = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
            self.bump();
            attributes.insert(name, unescape(&value));
        }
    }

    fn read_element(&mut self) -> Result<Element> {
        if self.peek() != Some(b'<') {
            return Err(self.error("expected '<'"));
        }
        let line = self.line;
        self.bump();
        let name = self.read_name()?;
        let attributes = self.read_attributes()?;

        let mut element = Element {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
            line,
        };

        self.skip_whitespace();
        match self.peek() {
            Some(b'/') => {
                self.bump();
                if self.bump() != Some(b'>') {
                    return Err(self.error("expected '>' after '/'"));
                }
                return Ok(element);
            }
            Some(b'>') => {
                self.bump();
            }
            _ => return Err(self.error("unterminated open tag")),
        }

        loop {
            // Accumulate text until the next markup.
            let start = self.pos;
            while !matches!(self.peek(), Some(b'<') | None) {
                self.bump();
            }
            if self.pos > start {
                element
                    .text
                    .push_str(&unescape(&String::from_utf8_lossy(&self.input[start..self.pos])));
            }
            if self.peek().is_none() {
                return Err(XmlError::UnexpectedEof);
            }
            if self.starts_with("<!--") {
                self.skip_until("-->")?;
                continue;
            }
            if self.starts_with("</") {
                self.bump();
                self.bump();
                let close = self.read_name()?;
                if close != element.name {
                    return Err(XmlError::Mismatch {
                        line: self.line,
                        found: close,
                        expected: element.name,
                    });
                }
                self.skip_whitespace();
                if self.bump() != Some(b'>') {
                    return Err(self.error("expected '>' in close tag"));
                }
                return Ok(element);
            }
            element.children.push(self.read_element()?);
        }
    }
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse a document and return its root element.
pub fn parse(input: &str) -> Result<Element> {
    let mut parser = Parser::new(input);
    parser.skip_misc()?;
    let root = parser.read_element()?;
    parser.skip_misc().ok();
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_with_attributes() {
        let doc = r#"<?xml version="1.0"?>
            <!-- aircraft -->
            <metrics>
                <wingarea unit="FT2"> 174.0 </wingarea>
                <location name="AERORP" unit="IN">
                    <x> 43.2 </x>
                </location>
            </metrics>"#;
        let root = parse(doc).unwrap();
        assert_eq!(root.name, "metrics");
        let area = root.child("wingarea").unwrap();
        assert_eq!(area.attr("unit"), Some("FT2"));
        assert_eq!(area.text_trimmed(), "174.0");
        let loc = root.child("location").unwrap();
        assert_eq!(loc.attr("name"), Some("AERORP"));
        assert_eq!(loc.child("x").unwrap().text_trimmed(), "43.2");
    }

    #[test]
    fn self_closing_and_comments() {
        let root = parse("<a><b attr='1'/><!-- skip --><c/></a>").unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attr("attr"), Some("1"));
    }

    #[test]
    fn mismatched_tags_error_with_line() {
        let err = parse("<a>\n<b>\n</a>").unwrap_err();
        match err {
            XmlError::Mismatch { line, found, expected } => {
                assert_eq!(line, 3);
                assert_eq!(found, "a");
                assert_eq!(expected, "b");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn entity_unescaping() {
        let root = parse("<a name=\"x &amp; y\">1 &lt; 2</a>").unwrap();
        assert_eq!(root.attr("name"), Some("x & y"));
        assert_eq!(root.text_trimmed(), "1 < 2");
    }
}
