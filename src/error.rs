use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, PartialEq)]
pub enum Error {
    ReadFailure(PathBuf, ErrorKind),
    WriteFailure(PathBuf, ErrorKind),
    Utf8Error(PathBuf),
    MissingDirectory(PathBuf),
    MissingTargetFile(PathBuf),
    AmbiguousSignature(PathBuf, usize),
    Malformed(ParseError),
    UnsupportedFamily(String),
    ToolNotFound(String),
    ToolFailed(String, Option<i32>),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::ReadFailure(path, kind) => {
                write!(f, "Failed to read file {}: {kind}", path_to_string(path))
            }
            Self::WriteFailure(path, kind) => {
                write!(f, "Failed to write file {}: {kind}", path_to_string(path))
            }
            Self::Utf8Error(path) => write!(
                f,
                "Failed to decode file {}, not valid UTF-8",
                path_to_string(path)
            ),
            Self::MissingDirectory(path) => {
                write!(f, "Directory {} does not exist", path_to_string(path))
            }
            Self::MissingTargetFile(path) => {
                write!(f, "Expected file {} was not found", path_to_string(path))
            }
            Self::AmbiguousSignature(path, count) => write!(
                f,
                "Method signature occurs {count} times in {}, refusing to guess which one to patch",
                path_to_string(path)
            ),
            Self::Malformed(error) => write!(f, "{error}"),
            Self::UnsupportedFamily(family) => write!(
                f,
                "Resource family {family} is not supported, only families backed by plain XML files can be checked"
            ),
            Self::ToolNotFound(tool) => write!(f, "Could not find {tool}"),
            Self::ToolFailed(tool, Some(code)) => write!(f, "{tool} exited with code {code}"),
            Self::ToolFailed(tool, None) => write!(f, "{tool} was terminated by a signal"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Self::Malformed(error)
    }
}

pub(crate) fn path_to_string(path: &Path) -> String {
    path.as_os_str().to_str().unwrap_or("<unknown>").to_string()
}

#[derive(Debug, PartialEq)]
pub struct ParseError {
    path: Rc<PathBuf>,
    data: Rc<String>,
    pos: usize,
    expected: Cow<'static, str>,
}

impl ParseError {
    pub fn new(
        path: Rc<PathBuf>,
        data: Rc<String>,
        pos: usize,
        expected: Cow<'static, str>,
    ) -> Self {
        ParseError {
            path,
            data,
            pos,
            expected,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        let prefix = &self.data[..self.pos];
        let line = prefix.matches('\n').count() + 1;
        let col = if let Some(index) = prefix.rfind('\n') {
            prefix.len() - index
        } else {
            prefix.len() + 1
        };

        let mut token = self.data[self.pos..].trim_start_matches([' ', '\t']);
        if token.is_empty() {
            token = "<EOF>";
        } else {
            if let Some(index) = token.find([' ', '\t', '\r', '\n', '>']) {
                token = &token[..index];
            }
            if token.is_empty() {
                token = "<EOL>";
            }
        }

        write!(
            f,
            "Unexpected token {token} in {} at {line}:{col}, expected {}",
            path_to_string(&self.path),
            self.expected
        )
    }
}

#[cfg(test)]
#[derive(Debug, PartialEq)]
pub struct ParseErrorDisplayed {
    pos: usize,
    message: String,
}

#[cfg(test)]
impl From<ParseError> for ParseErrorDisplayed {
    fn from(error: ParseError) -> Self {
        Self {
            pos: error.pos,
            message: format!("{error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_position() {
        let error = ParseError::new(
            Rc::new(PathBuf::from("public.xml")),
            Rc::new("<resources>\n    <public type=\"anim\"\n".to_string()),
            16,
            "/>".into(),
        );
        assert_eq!(
            error.to_string(),
            "Unexpected token <public in public.xml at 2:5, expected />"
        );

        let error = ParseError::new(
            Rc::new(PathBuf::from("a.smali")),
            Rc::new("abc".to_string()),
            3,
            ".end method".into(),
        );
        assert_eq!(
            error.to_string(),
            "Unexpected token <EOF> in a.smali at 1:4, expected .end method"
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            Error::AmbiguousSignature(PathBuf::from("smali/A.smali"), 2).to_string(),
            "Method signature occurs 2 times in smali/A.smali, refusing to guess which one to patch"
        );
        assert_eq!(
            Error::ToolFailed("apktool".to_string(), Some(1)).to_string(),
            "apktool exited with code 1"
        );
    }
}
