use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, ParseError};

/// A cursor over the text of one file. Every read returns a new cursor, the
/// original stays where it was so that callers can backtrack cheaply.
#[derive(Debug, Clone)]
pub struct Scanner {
    pos: usize,
    data: Rc<String>,
    path: Rc<PathBuf>,
}

impl Scanner {
    pub fn new(data: String, path: &Path) -> Self {
        Self {
            pos: 0,
            data: Rc::new(data),
            path: Rc::new(path.to_path_buf()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let data =
            std::fs::read(path).map_err(|e| Error::ReadFailure(path.to_path_buf(), e.kind()))?;
        let data = String::from_utf8(data).map_err(|_| Error::Utf8Error(path.to_path_buf()))?;
        Ok(Self::new(data, path))
    }

    /// Replaces the scanned file with `content`. The content goes to a
    /// temporary file next to it first, which is then renamed over the
    /// original. A failed write leaves the original file as it was.
    pub fn replace_source(&self, content: &str) -> Result<(), Error> {
        let path = self.path();
        let write_failure = |e: std::io::Error| Error::WriteFailure(path.to_path_buf(), e.kind());

        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let permissions = std::fs::metadata(path).map_err(write_failure)?.permissions();

        let mut file = tempfile::NamedTempFile::new_in(directory).map_err(write_failure)?;
        file.write_all(content.as_bytes()).map_err(write_failure)?;
        file.as_file().set_permissions(permissions).map_err(write_failure)?;
        file.persist(path).map_err(|e| write_failure(e.error))?;
        Ok(())
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn source(&self) -> &str {
        &self.data
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data(&self) -> &str {
        &self.data[self.pos..]
    }

    fn advance(&self, count: usize) -> Self {
        let mut input = self.clone();
        input.pos += count;
        input
    }

    /// Moves past the current char, used to resume a search after a non-match.
    pub fn skip_char(&self) -> Self {
        self.advance(self.next_char().map_or(0, char::len_utf8))
    }

    pub fn next_char(&self) -> Option<char> {
        self.data().chars().next()
    }

    /// Positions the cursor at the next occurrence of `pattern`, searching across lines.
    pub fn find(&self, pattern: &str) -> Option<Self> {
        self.data().find(pattern).map(|index| self.advance(index))
    }

    pub fn expect_str(&self, expected: &str) -> Result<Self, ParseError> {
        if self.data().starts_with(expected) {
            Ok(self.advance(expected.len()))
        } else {
            Err(self.unexpected(expected.to_string().into()))
        }
    }

    /// Reads everything up to `terminator` and moves past it. Unless `multiline`
    /// is set the terminator has to be found on the current line.
    pub fn read_past(&self, terminator: &str, multiline: bool) -> Result<(Self, String), ParseError> {
        let line_end = if multiline {
            None
        } else {
            self.data().find('\n')
        };

        match self.data().find(terminator) {
            Some(index) if line_end.map_or(true, |end| index < end) => Ok((
                self.advance(index + terminator.len()),
                self.data()[..index].to_string(),
            )),
            _ => Err(self.unexpected(terminator.to_string().into())),
        }
    }

    pub fn unexpected(&self, expected: Cow<'static, str>) -> ParseError {
        ParseError::new(self.path.clone(), self.data.clone(), self.pos, expected)
    }
}
