//! Replaces the startup environment check in the decompiled smali code with a
//! method that always succeeds.
//!
//! The method is found by plain substring search on its signature line and
//! ends at the next `.end method`. No smali parsing happens here: the
//! signature is assumed to occur exactly once in the target file, and a file
//! where it occurs more than once is refused rather than guessed at.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::scanner::Scanner;

pub const SMALI_DIRECTORY: &str = "smali";
pub const TARGET_FILE: &str = "EnvironmentChecker.smali";
pub const TARGET_SIGNATURE: &str = ".method public static isSupportedEnvironment()Z";
pub const METHOD_TERMINATOR: &str = ".end method";

/// Method body returning `true`, it needs a single local register.
pub fn replacement_for(signature: &str) -> String {
    format!("{signature}\n    .locals 1\n\n    const/4 v0, 0x1\n\n    return v0\n{METHOD_TERMINATOR}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeOutcome {
    Patched,
    AlreadyPatched,
    MethodNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodePatch {
    /// Relative to the package directory.
    pub directory: String,
    pub file_name: String,
    pub signature: String,
}

impl Default for BytecodePatch {
    fn default() -> Self {
        Self {
            directory: SMALI_DIRECTORY.to_string(),
            file_name: TARGET_FILE.to_string(),
            signature: TARGET_SIGNATURE.to_string(),
        }
    }
}

impl BytecodePatch {
    pub fn apply(&self, package_dir: &Path) -> Result<BytecodeOutcome, Error> {
        let path = self.locate(package_dir)?;
        let input = Scanner::from_file(&path)?;
        let (outcome, content) = self.patch_source(&input)?;

        match outcome {
            BytecodeOutcome::Patched => {
                input.replace_source(&content)?;
                info!(file = %path.display(), "replaced environment check");
            }
            BytecodeOutcome::AlreadyPatched => {
                debug!(file = %path.display(), "environment check already replaced");
            }
            BytecodeOutcome::MethodNotFound => {
                warn!(
                    file = %path.display(),
                    signature = %self.signature,
                    "method not found, leaving file unchanged"
                );
            }
        }
        Ok(outcome)
    }

    fn locate(&self, package_dir: &Path) -> Result<PathBuf, Error> {
        let directory = package_dir.join(&self.directory);
        if !directory.is_dir() {
            return Err(Error::MissingDirectory(directory));
        }

        walkdir::WalkDir::new(&directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().filter(|s| *s == "smali").is_some()
            })
            .find(|entry| entry.file_name() == self.file_name.as_str())
            .map(walkdir::DirEntry::into_path)
            .ok_or_else(|| Error::MissingTargetFile(directory.join(&self.file_name)))
    }

    /// Returns the new file content along with the outcome. The content is
    /// the unchanged source unless the outcome is `Patched`.
    pub fn patch_source(&self, input: &Scanner) -> Result<(BytecodeOutcome, String), Error> {
        let source = input.source();
        let Some(start) = input.find(&self.signature) else {
            return Ok((BytecodeOutcome::MethodNotFound, source.to_string()));
        };

        let count = source.matches(self.signature.as_str()).count();
        if count > 1 {
            return Err(Error::AmbiguousSignature(input.path().to_path_buf(), count));
        }

        let body = start.expect_str(&self.signature)?;
        let (end, _) = body.read_past(METHOD_TERMINATOR, true)?;
        let span = start.pos()..end.pos();

        let replacement = replacement_for(&self.signature);
        if source[span.clone()] == replacement {
            return Ok((BytecodeOutcome::AlreadyPatched, source.to_string()));
        }

        let mut output =
            String::with_capacity(source.len() - span.len() + replacement.len());
        output.push_str(&source[..span.start]);
        output.push_str(&replacement);
        output.push_str(&source[span.end..]);
        Ok((BytecodeOutcome::Patched, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CLASS: &str = r#".class public LEnvironmentChecker;
.super Ljava/lang/Object;


# direct methods
.method public static isSupportedEnvironment()Z
    .locals 2

    invoke-static {}, LEnvironmentChecker;->probe()I

    move-result v0

    if-nez v0, :cond_0

    const/4 v1, 0x0

    return v1

    :cond_0
    const/4 v1, 0x1

    return v1
.end method

.method public static probe()I
    .locals 1

    const/4 v0, 0x0

    return v0
.end method
"#;

    fn scanner(data: &str) -> Scanner {
        Scanner::new(data.to_string(), Path::new("EnvironmentChecker.smali"))
    }

    fn package(files: &[(&str, &str)]) -> std::io::Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        let smali = dir.path().join("smali");
        fs::create_dir_all(&smali)?;
        for (name, content) in files {
            fs::write(smali.join(name), content)?;
        }
        Ok(dir)
    }

    #[test]
    fn replacement_body() {
        assert_eq!(
            replacement_for(TARGET_SIGNATURE),
            ".method public static isSupportedEnvironment()Z\n    .locals 1\n\n    const/4 v0, 0x1\n\n    return v0\n.end method"
        );
    }

    #[test]
    fn replaces_exactly_the_method() -> Result<(), Error> {
        let (outcome, output) = BytecodePatch::default().patch_source(&scanner(CLASS))?;
        assert_eq!(outcome, BytecodeOutcome::Patched);

        let start = CLASS.find(TARGET_SIGNATURE).unwrap_or_default();
        let end = CLASS[start..]
            .find(METHOD_TERMINATOR)
            .map(|i| start + i + METHOD_TERMINATOR.len())
            .unwrap_or_default();
        let replacement = replacement_for(TARGET_SIGNATURE);
        assert_eq!(&output[..start], &CLASS[..start]);
        assert_eq!(&output[start..start + replacement.len()], replacement);
        assert_eq!(&output[start + replacement.len()..], &CLASS[end..]);
        assert!(output.contains(".method public static probe()I\n    .locals 1"));

        let (outcome, again) = BytecodePatch::default().patch_source(&scanner(&output))?;
        assert_eq!(outcome, BytecodeOutcome::AlreadyPatched);
        assert_eq!(again, output);

        Ok(())
    }

    #[test]
    fn method_not_found() -> Result<(), Error> {
        let source = CLASS.replace("isSupportedEnvironment", "isSupported");
        let (outcome, output) = BytecodePatch::default().patch_source(&scanner(&source))?;
        assert_eq!(outcome, BytecodeOutcome::MethodNotFound);
        assert_eq!(output, source);

        Ok(())
    }

    #[test]
    fn ambiguous_signature() {
        let source = format!("{CLASS}\n{CLASS}");
        assert_eq!(
            BytecodePatch::default()
                .patch_source(&scanner(&source))
                .map(|(outcome, _)| outcome),
            Err(Error::AmbiguousSignature(
                PathBuf::from("EnvironmentChecker.smali"),
                2
            ))
        );
    }

    #[test]
    fn unterminated_method() {
        let source = format!("{TARGET_SIGNATURE}\n    .locals 0\n");
        let result = BytecodePatch::default()
            .patch_source(&scanner(&source))
            .map(|(outcome, _)| outcome)
            .map_err(|e| e.to_string());
        assert_eq!(
            result,
            Err("Unexpected token <EOL> in EnvironmentChecker.smali at 1:48, expected .end method"
                .to_string())
        );
    }

    #[test]
    fn apply_writes_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = package(&[("Other.smali", CLASS), (TARGET_FILE, CLASS)])?;
        let target = dir.path().join("smali").join(TARGET_FILE);

        let patch = BytecodePatch::default();
        assert_eq!(patch.apply(dir.path())?, BytecodeOutcome::Patched);
        let patched = fs::read_to_string(&target)?;
        assert!(patched.contains(&replacement_for(TARGET_SIGNATURE)));
        assert_eq!(fs::read_to_string(dir.path().join("smali").join("Other.smali"))?, CLASS);

        assert_eq!(patch.apply(dir.path())?, BytecodeOutcome::AlreadyPatched);
        assert_eq!(fs::read_to_string(&target)?, patched);

        Ok(())
    }

    #[test]
    fn missing_directory() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(
            BytecodePatch::default().apply(dir.path()),
            Err(Error::MissingDirectory(dir.path().join("smali")))
        );
        Ok(())
    }

    #[test]
    fn missing_target_file() -> std::io::Result<()> {
        let dir = package(&[("Other.smali", CLASS)])?;
        fs::create_dir_all(dir.path().join("smali").join("nested"))?;
        fs::write(dir.path().join("smali").join("nested").join(TARGET_FILE), CLASS)?;

        assert_eq!(
            BytecodePatch::default().apply(dir.path()),
            Err(Error::MissingTargetFile(
                dir.path().join("smali").join(TARGET_FILE)
            ))
        );
        Ok(())
    }
}
