use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::Error;

pub fn locate_apktool(apktool_path: Option<&str>) -> Result<Command, Error> {
    if let Some(apktool_path) = apktool_path {
        if apktool_path.ends_with(".jar") {
            let java_path = which::which("java").map_err(|_| {
                Error::ToolNotFound(
                    "java, needed to run apktool as JAR file. Is it installed?".to_string(),
                )
            })?;
            let mut command = Command::new(java_path);
            command
                .arg("-Dfile.encoding=UTF-8")
                .arg("-jar")
                .arg(apktool_path);
            Ok(command)
        } else {
            Ok(Command::new(apktool_path))
        }
    } else if let Ok(apktool_path) = which::which("apktool") {
        Ok(Command::new(apktool_path))
    } else {
        Err(Error::ToolNotFound(
            "apktool. If you installed it, please pass --apktool-path command line parameter explicitly."
                .to_string(),
        ))
    }
}

/// Unpacks `apk_path` into `output_dir`, replacing whatever is there.
pub fn decode(mut apktool: Command, apk_path: &Path, output_dir: &Path) -> Result<(), Error> {
    apktool
        .arg("decode")
        .arg("--keep-broken-res")
        .arg("--force")
        .arg("--output")
        .arg(output_dir)
        .arg(apk_path);
    debug!(command = ?apktool, "running apktool");

    let status = apktool
        .status()
        .map_err(|_| Error::ToolNotFound(apktool.get_program().to_string_lossy().into_owned()))?;
    if !status.success() {
        return Err(Error::ToolFailed("apktool".to_string(), status.code()));
    }

    info!(output = %output_dir.display(), "unpacked package");
    Ok(())
}
