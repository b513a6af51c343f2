//! A minimal HTML parse tree, standing in for the opaque HTML lexer/parser
//! the production system treats as an external collaborator (§1). Lowering
//! (`lower.rs`) only depends on the shape defined here, so a real embedder
//! can swap in any parser that produces this tree.

use crate::span::TextSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlAttr {
    pub name: String,
    pub value: String,
    pub name_span: TextSpan,
    pub value_span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Element {
        tag: String,
        attrs: Vec<HtmlAttr>,
        children: Vec<HtmlNode>,
        self_closed: bool,
        loc: TextSpan,
        tag_loc: TextSpan,
        close_tag_loc: Option<TextSpan>,
    },
    Text {
        text: String,
        loc: TextSpan,
    },
    Comment {
        text: String,
        loc: TextSpan,
    },
}

const VOID_ELEMENTS: &[&str] =
    &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr"];

/// Parse `src` into a flat list of top-level [`HtmlNode`]s. Recovers from
/// malformed markup (unclosed tags at end-of-input) by closing everything
/// still open, rather than failing.
pub fn parse_html(src: &str) -> Vec<HtmlNode> {
    let mut parser = HtmlParser { src, bytes: src.as_bytes(), pos: 0 };
    parser.parse_nodes(None)
}

struct HtmlParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HtmlParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn parse_nodes(&mut self, closing_tag: Option<&str>) -> Vec<HtmlNode> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.bytes.len() {
                break;
            }
            if let Some(tag) = closing_tag {
                if self.starts_with("</") {
                    let save = self.pos;
                    self.pos += 2;
                    let name = self.read_tag_name();
                    self.skip_until_gt();
                    if name.eq_ignore_ascii_case(tag) {
                        return nodes;
                    }
                    self.pos = save;
                    break;
                }
            }
            if self.starts_with("<!--") {
                nodes.push(self.parse_comment());
            } else if self.peek() == Some(b'<') && self.next_is_tag_start() {
                nodes.push(self.parse_element());
            } else {
                nodes.push(self.parse_text());
            }
        }
        nodes
    }

    fn next_is_tag_start(&self) -> bool {
        self.bytes.get(self.pos + 1).map(|b| b.is_ascii_alphabetic()).unwrap_or(false)
    }

    fn parse_comment(&mut self) -> HtmlNode {
        let start = self.pos as u32;
        self.pos += 4;
        let text_start = self.pos;
        while self.pos < self.bytes.len() && !self.starts_with("-->") {
            self.pos += 1;
        }
        let text = self.src[text_start..self.pos].to_string();
        if self.starts_with("-->") {
            self.pos += 3;
        }
        HtmlNode::Comment { text, loc: TextSpan::new(start, self.pos as u32) }
    }

    fn parse_text(&mut self) -> HtmlNode {
        let start = self.pos as u32;
        while self.pos < self.bytes.len() {
            if self.peek() == Some(b'<') && (self.next_is_tag_start() || self.starts_with("</") || self.starts_with("<!--")) {
                break;
            }
            self.pos += 1;
        }
        let text = self.src[start as usize..self.pos].to_string();
        HtmlNode::Text { text, loc: TextSpan::new(start, self.pos as u32) }
    }

    fn read_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_until_gt(&mut self) {
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                break;
            }
        }
    }

    fn parse_attrs(&mut self) -> Vec<HtmlAttr> {
        let mut attrs = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b'>') | Some(b'/') => break,
                _ => {}
            }
            let name_start = self.pos as u32;
            while let Some(b) = self.peek() {
                if b.is_ascii_whitespace() || b == b'=' || b == b'>' || b == b'/' {
                    break;
                }
                self.pos += 1;
            }
            let name = self.src[name_start as usize..self.pos].to_string();
            if name.is_empty() {
                break;
            }
            let name_end = self.pos as u32;
            self.skip_ws();
            let (value, value_span) = if self.peek() == Some(b'=') {
                self.pos += 1;
                self.skip_ws();
                self.parse_attr_value()
            } else {
                (String::new(), TextSpan::new(name_end, name_end))
            };
            attrs.push(HtmlAttr { name, value, name_span: TextSpan::new(name_start, name_end), value_span });
        }
        attrs
    }

    fn parse_attr_value(&mut self) -> (String, TextSpan) {
        match self.peek() {
            Some(q @ b'"') | Some(q @ b'\'') => {
                self.pos += 1;
                let start = self.pos as u32;
                while let Some(b) = self.peek() {
                    if b == q {
                        break;
                    }
                    self.pos += 1;
                }
                let text = self.src[start as usize..self.pos].to_string();
                let end = self.pos as u32;
                if self.peek() == Some(q) {
                    self.pos += 1;
                }
                (text, TextSpan::new(start, end))
            }
            _ => {
                let start = self.pos as u32;
                while let Some(b) = self.peek() {
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    self.pos += 1;
                }
                let text = self.src[start as usize..self.pos].to_string();
                (text, TextSpan::new(start, self.pos as u32))
            }
        }
    }

    fn parse_element(&mut self) -> HtmlNode {
        let loc_start = self.pos as u32;
        self.pos += 1; // '<'
        let tag_start = self.pos as u32;
        let tag = self.read_tag_name();
        let tag_loc = TextSpan::new(tag_start, self.pos as u32);
        let attrs = self.parse_attrs();
        self.skip_ws();
        let mut self_closed = false;
        if self.starts_with("/>") {
            self_closed = true;
            self.pos += 2;
        } else if self.peek() == Some(b'>') {
            self.pos += 1;
        }
        let is_void = VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(&tag));
        if self_closed || is_void {
            return HtmlNode::Element {
                tag,
                attrs,
                children: Vec::new(),
                self_closed: true,
                loc: TextSpan::new(loc_start, self.pos as u32),
                tag_loc,
                close_tag_loc: None,
            };
        }
        let children = self.parse_nodes(Some(&tag));
        let close_start = self.pos.saturating_sub(tag.len() + 3) as u32;
        let close_tag_loc = if self.pos as u32 >= close_start { Some(TextSpan::new(close_start, self.pos as u32)) } else { None };
        HtmlNode::Element { tag, attrs, children, self_closed: false, loc: TextSpan::new(loc_start, self.pos as u32), tag_loc, close_tag_loc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_element() {
        let nodes = parse_html("<div>${name}</div>");
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            HtmlNode::Element { tag, children, .. } => {
                assert_eq!(tag, "div");
                assert_eq!(children.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_nested_with_attrs() {
        let nodes = parse_html(r#"<div repeat.for="item of items"><span title.bind="item.name">${item.name}</span></div>"#);
        match &nodes[0] {
            HtmlNode::Element { attrs, children, .. } => {
                assert_eq!(attrs.len(), 1);
                assert_eq!(attrs[0].name, "repeat.for");
                assert_eq!(children.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
