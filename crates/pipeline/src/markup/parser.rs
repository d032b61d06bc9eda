//! Minimal XML reader for dialogue markup
//!
//! Supports elements, attributes (single or double quoted), character data,
//! comments, CDATA sections, processing instructions and the XML
//! declaration, the five predefined entities and numeric character
//! references. DOCTYPE and custom entities are rejected. Element and
//! attribute names are case-insensitive and stored lowercased.

use voicegate_config::constants::markup::MAX_DEPTH;

use super::MarkupError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a whole document into its root element
///
/// Input without a `<speak>` root is wrapped in one first.
pub(crate) fn parse_document(input: &str) -> Result<Element, MarkupError> {
    let trimmed = input.trim();
    let body = strip_declaration(trimmed);
    let wrapped;
    let source = if starts_with_ignore_case(body.trim_start(), "<speak") {
        body
    } else {
        wrapped = format!("<speak>{}</speak>", body);
        wrapped.as_str()
    };

    let mut reader = Reader::new(source);
    reader.skip_misc()?;
    if !reader.peek_is("<") {
        return Err(reader.error("expected a root element"));
    }
    let root = reader.element(0)?;
    reader.skip_misc()?;
    if !reader.at_end() {
        return Err(reader.error("unexpected content after the root element"));
    }
    Ok(root)
}

fn strip_declaration(input: &str) -> &str {
    if starts_with_ignore_case(input, "<?xml") {
        if let Some(end) = input.find("?>") {
            return input[end + 2..].trim_start();
        }
    }
    input
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek_is(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, n: usize) {
        self.pos += n;
    }

    fn error(&self, message: impl Into<String>) -> MarkupError {
        let consumed = &self.src[..self.pos.min(self.src.len())];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rfind('\n')
            .map_or(consumed.chars().count(), |nl| consumed[nl + 1..].chars().count())
            + 1;
        MarkupError::Malformed {
            line,
            column,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn expect(&mut self, s: &str) -> Result<(), MarkupError> {
        if self.peek_is(s) {
            self.bump(s.len());
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", s)))
        }
    }

    /// Skip whitespace, comments and processing instructions
    fn skip_misc(&mut self) -> Result<(), MarkupError> {
        loop {
            self.skip_whitespace();
            if self.peek_is("<!--") {
                self.comment()?;
            } else if self.peek_is("<?") {
                self.processing_instruction()?;
            } else {
                return Ok(());
            }
        }
    }

    fn comment(&mut self) -> Result<(), MarkupError> {
        self.bump(4);
        match self.rest().find("-->") {
            Some(end) => {
                self.bump(end + 3);
                Ok(())
            }
            None => Err(self.error("unterminated comment")),
        }
    }

    fn processing_instruction(&mut self) -> Result<(), MarkupError> {
        self.bump(2);
        match self.rest().find("?>") {
            Some(end) => {
                self.bump(end + 2);
                Ok(())
            }
            None => Err(self.error("unterminated processing instruction")),
        }
    }

    fn name(&mut self) -> Result<String, MarkupError> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if c.is_alphabetic() || c == '_' || c == ':' => {}
            _ => return Err(self.error("expected a name")),
        }
        let end = chars
            .find(|(_, c)| !(c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')))
            .map_or(rest.len(), |(i, _)| i);
        self.bump(end);
        Ok(rest[..end].to_ascii_lowercase())
    }

    fn element(&mut self, depth: usize) -> Result<Element, MarkupError> {
        if depth >= MAX_DEPTH {
            return Err(self.error(format!("elements nested deeper than {}", MAX_DEPTH)));
        }
        self.expect("<")?;
        let name = self.name()?;
        let mut attributes: Vec<(String, String)> = Vec::new();

        loop {
            let before = self.pos;
            self.skip_whitespace();
            if self.peek_is("/>") {
                self.bump(2);
                return Ok(Element {
                    name,
                    attributes,
                    children: Vec::new(),
                });
            }
            if self.peek_is(">") {
                self.bump(1);
                break;
            }
            if self.at_end() {
                return Err(self.error(format!("unterminated start tag <{}>", name)));
            }
            if self.pos == before {
                return Err(self.error("expected whitespace before attribute"));
            }
            let key = self.name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let value = self.attribute_value()?;
            if attributes.iter().any(|(k, _)| *k == key) {
                return Err(self.error(format!("duplicate attribute '{}'", key)));
            }
            attributes.push((key, value));
        }

        let children = self.content(&name, depth)?;
        Ok(Element {
            name,
            attributes,
            children,
        })
    }

    fn attribute_value(&mut self) -> Result<String, MarkupError> {
        let quote = match self.peek_char() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("attribute value must be quoted")),
        };
        self.bump(1);
        let end = self
            .rest()
            .find(quote)
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        let raw = &self.rest()[..end];
        if raw.contains('<') {
            return Err(self.error("'<' is not allowed in attribute values"));
        }
        let value = decode_entities(raw).map_err(|m| self.error(m))?;
        self.bump(end + 1);
        Ok(value)
    }

    fn content(&mut self, name: &str, depth: usize) -> Result<Vec<Node>, MarkupError> {
        let mut children: Vec<Node> = Vec::new();
        loop {
            if self.at_end() {
                return Err(self.error(format!("element <{}> is not closed", name)));
            }
            if self.peek_is("</") {
                self.bump(2);
                let close = self.name()?;
                self.skip_whitespace();
                self.expect(">")?;
                if close != name {
                    return Err(self.error(format!(
                        "mismatched closing tag </{}>, expected </{}>",
                        close, name
                    )));
                }
                return Ok(children);
            } else if self.peek_is("<!--") {
                self.comment()?;
            } else if self.peek_is("<![CDATA[") {
                self.bump(9);
                let end = self
                    .rest()
                    .find("]]>")
                    .ok_or_else(|| self.error("unterminated CDATA section"))?;
                let text = self.rest()[..end].to_string();
                self.bump(end + 3);
                push_text(&mut children, &text);
            } else if self.peek_is("<?") {
                self.processing_instruction()?;
            } else if self.peek_is("<!") {
                return Err(self.error("document type declarations are not supported"));
            } else if self.peek_is("<") {
                children.push(Node::Element(self.element(depth + 1)?));
            } else {
                let end = self.rest().find('<').unwrap_or(self.rest().len());
                let raw = &self.rest()[..end];
                let text = decode_entities(raw).map_err(|m| self.error(m))?;
                self.bump(end);
                push_text(&mut children, &text);
            }
        }
    }
}

/// Append text, merging with a preceding text node (comments split runs)
fn push_text(children: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(last)) = children.last_mut() {
        last.push_str(text);
    } else {
        children.push(Node::Text(text.to_string()));
    }
}

fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    return Err(format!("unknown entity '&{};'", entity));
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid character reference '&{};'", entity))?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(node: &Node) -> &str {
        match node {
            Node::Text(t) => t,
            Node::Element(e) => panic!("expected text, got <{}>", e.name),
        }
    }

    #[test]
    fn test_wraps_bare_text() {
        let root = parse_document("Hello there").unwrap();
        assert_eq!(root.name, "speak");
        assert_eq!(text_of(&root.children[0]), "Hello there");
    }

    #[test]
    fn test_case_insensitive_names() {
        let root = parse_document(r#"<SPEAK><Voice NAME="A">x</VOICE></speak>"#).unwrap();
        let Node::Element(voice) = &root.children[0] else {
            panic!("expected element");
        };
        assert_eq!(voice.name, "voice");
        assert_eq!(voice.attr("name"), Some("A"));
    }

    #[test]
    fn test_self_closing_and_quotes() {
        let root = parse_document("<speak><break time='1s'/></speak>").unwrap();
        let Node::Element(br) = &root.children[0] else {
            panic!("expected element");
        };
        assert_eq!(br.attr("time"), Some("1s"));
        assert!(br.children.is_empty());
    }

    #[test]
    fn test_entities_and_comments() {
        let root =
            parse_document("<?xml version=\"1.0\"?><speak>Tom &amp; Jerry<!-- x --> &#233;&#x21;</speak>")
                .unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(text_of(&root.children[0]), "Tom & Jerry é!");
    }

    #[test]
    fn test_cdata() {
        let root = parse_document("<speak><![CDATA[a < b]]></speak>").unwrap();
        assert_eq!(text_of(&root.children[0]), "a < b");
    }

    #[test]
    fn test_mismatched_close_tag() {
        let err = parse_document("<speak><voice>x</prosody></speak>").unwrap_err();
        assert!(err.to_string().contains("mismatched"));
    }

    #[test]
    fn test_unclosed_element() {
        assert!(parse_document("<speak><voice name=\"A\">x").is_err());
    }

    #[test]
    fn test_unknown_entity() {
        assert!(parse_document("<speak>&nbsp;</speak>").is_err());
    }

    #[test]
    fn test_unquoted_attribute() {
        assert!(parse_document("<speak><break time=500ms/></speak>").is_err());
    }

    #[test]
    fn test_trailing_content() {
        assert!(parse_document("<speak>a</speak><speak>b</speak>").is_err());
    }

    #[test]
    fn test_error_position() {
        let err = parse_document("<speak>\n  <voice>\n</speak>").unwrap_err();
        match err {
            MarkupError::Malformed { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit() {
        let open = "<p>".repeat(MAX_DEPTH + 1);
        let close = "</p>".repeat(MAX_DEPTH + 1);
        assert!(parse_document(&format!("<speak>{}x{}</speak>", open, close)).is_err());
    }
}
