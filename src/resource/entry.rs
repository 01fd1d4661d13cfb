use std::ops::Range;

use tracing::trace;

use crate::error::ParseError;
use crate::scanner::Scanner;

pub const COMMENT_OPEN: &str = "<!--";
pub const COMMENT_CLOSE: &str = "-->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    /// `<tag attributes/>`
    SelfClosing,
    /// `<tag attributes>content</tag>`, the content has to stay on one line.
    Paired,
}

/// Describes how entries of a resource table look, e.g. `<item …>…</item>` in
/// declaration files or `<public … />` in the public symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryGrammar {
    pub tag: &'static str,
    pub shape: EntryShape,
}

impl EntryGrammar {
    pub const DECLARATION: EntryGrammar = EntryGrammar {
        tag: "item",
        shape: EntryShape::Paired,
    };

    pub const PUBLIC_SYMBOL: EntryGrammar = EntryGrammar {
        tag: "public",
        shape: EntryShape::SelfClosing,
    };

    pub fn read(&self, input: &Scanner) -> Result<(Scanner, Entry), ParseError> {
        let start = input.pos();
        let input = input.expect_str("<")?;
        let input = input.expect_str(self.tag)?;
        if !matches!(input.next_char(), Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Err(input.unexpected("the end of the tag name".into()));
        }

        let attributes_start = input.clone();
        let (input, attributes) = input.read_past(">", true)?;
        let (input, attributes) = match (self.shape, attributes.strip_suffix('/')) {
            (EntryShape::SelfClosing, Some(attributes)) => (input, attributes.to_string()),
            (EntryShape::SelfClosing, None) => {
                return Err(attributes_start.unexpected("/>".into()));
            }
            (EntryShape::Paired, Some(_)) => {
                return Err(attributes_start.unexpected(format!("</{}>", self.tag).into()));
            }
            (EntryShape::Paired, None) => {
                let (input, _) = input.read_past(&format!("</{}>", self.tag), false)?;
                (input, attributes)
            }
        };

        let span = start..input.pos();
        Ok((input, Entry { span, attributes }))
    }

    /// Collects all well-formed entries of the file, including commented out ones.
    pub fn entries(&self, input: &Scanner) -> Vec<Entry> {
        let pattern = format!("<{}", self.tag);
        let mut entries = Vec::new();
        let mut input = input.clone();
        while let Some(start) = input.find(&pattern) {
            match self.read(&start) {
                Ok((next, entry)) => {
                    entries.push(entry);
                    input = next;
                }
                Err(error) => {
                    trace!(%error, "not an entry");
                    input = start.skip_char();
                }
            }
        }
        entries
    }
}

#[derive(Debug, PartialEq)]
pub struct Entry {
    pub span: Range<usize>,
    pub attributes: String,
}

impl Entry {
    /// Value of a double-quoted attribute. The key has to be preceded by
    /// whitespace so that `name` won't match inside `android:name` or a value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        let mut rest = self.attributes.as_str();
        while let Some(index) = rest.find(key) {
            let preceded = rest[..index].ends_with(char::is_whitespace);
            let after = &rest[index + key.len()..];
            if preceded {
                if let Some(value) = after.strip_prefix("=\"") {
                    return value.find('"').map(|end| &value[..end]);
                }
            }
            rest = after;
        }
        None
    }
}

/// Byte ranges of all XML comments in a file. An unterminated comment runs to
/// the end of the file.
#[derive(Debug, Default, PartialEq)]
pub struct Comments(Vec<Range<usize>>);

impl Comments {
    pub fn scan(input: &Scanner) -> Self {
        let mut spans = Vec::new();
        let mut input = input.clone();
        while let Some(start) = input.find(COMMENT_OPEN) {
            match start
                .expect_str(COMMENT_OPEN)
                .and_then(|body| body.read_past(COMMENT_CLOSE, true))
            {
                Ok((next, _)) => {
                    spans.push(start.pos()..next.pos());
                    input = next;
                }
                Err(_) => {
                    spans.push(start.pos()..start.source().len());
                    break;
                }
            }
        }
        Self(spans)
    }

    /// True if the span lies in or crosses a comment. Such an entry is either
    /// neutralized already or can't be wrapped without nesting comments.
    pub fn touch(&self, span: &Range<usize>) -> bool {
        self.0
            .iter()
            .any(|comment| comment.start < span.end && span.start < comment.end)
    }
}

/// Wraps every span in comment delimiters. Spans must be sorted and disjoint.
pub fn neutralize(source: &str, spans: &[Range<usize>]) -> String {
    let mut output = String::with_capacity(
        source.len() + spans.len() * (COMMENT_OPEN.len() + COMMENT_CLOSE.len() + 2),
    );
    let mut last = 0;
    for span in spans {
        output.push_str(&source[last..span.start]);
        output.push_str(COMMENT_OPEN);
        output.push(' ');
        output.push_str(&source[span.clone()]);
        output.push(' ');
        output.push_str(COMMENT_CLOSE);
        last = span.end;
    }
    output.push_str(&source[last..]);
    output
}
