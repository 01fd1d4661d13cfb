use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use phf::phf_set;
use tracing::debug;

use crate::error::Error;

mod entry;
mod reconcile;

pub use reconcile::{ReconcileOutcome, Reconciler};

pub const RES_DIRECTORY: &str = "res";
pub const VALUES_DIRECTORY: &str = "values";
pub const PUBLIC_TABLE: &str = "public.xml";

/// Resource types whose every resource is a `<name>.xml` file in `res/<type>/`
/// or one of its configuration-qualified variants. Only for these does a
/// missing file mean a dangling entry.
static XML_FAMILIES: phf::Set<&'static str> = phf_set! {
    "anim",
    "animator",
    "interpolator",
    "layout",
    "menu",
    "transition",
    "xml",
};

/// A resource type tag as used in the `type` attribute of resource tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Family(&'static str);

impl Family {
    pub const ANIM: Family = Family("anim");

    pub fn name(&self) -> &'static str {
        self.0
    }

    pub fn extension(&self) -> &'static str {
        "xml"
    }

    pub fn directory(&self, package_dir: &Path) -> PathBuf {
        package_dir.join(RES_DIRECTORY).join(self.0)
    }

    /// Directories whose files count as resources of this family. `anim` only
    /// looks at `res/anim/`. The other families also count qualified
    /// directories such as `res/layout-land/` or `res/animator-v21/`, where
    /// their resources often are the only copy.
    pub fn resource_directories(&self, package_dir: &Path) -> Vec<PathBuf> {
        if *self == Self::ANIM {
            return vec![self.directory(package_dir)];
        }

        let qualified = format!("{}-", self.0);
        let mut directories = walkdir::WalkDir::new(package_dir.join(RES_DIRECTORY))
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .filter(|name| *name == self.0 || name.starts_with(&qualified))
                        .is_some()
            })
            .map(walkdir::DirEntry::into_path)
            .collect::<Vec<_>>();
        directories.sort();
        directories
    }

    /// apktool writes typed `<item>` declarations to `res/values/<type>s.xml`.
    pub fn declaration_file(&self, package_dir: &Path) -> PathBuf {
        package_dir
            .join(RES_DIRECTORY)
            .join(VALUES_DIRECTORY)
            .join(format!("{}s.xml", self.0))
    }
}

impl TryFrom<&str> for Family {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Error> {
        XML_FAMILIES
            .get_key(value)
            .map(|&name| Family(name))
            .ok_or_else(|| Error::UnsupportedFamily(value.to_string()))
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

pub fn public_table(package_dir: &Path) -> PathBuf {
    package_dir
        .join(RES_DIRECTORY)
        .join(VALUES_DIRECTORY)
        .join(PUBLIC_TABLE)
}

/// Names of the resources of one family that exist on disk, collected once per run.
#[derive(Debug, Default)]
pub struct ExistenceIndex {
    names: HashSet<String>,
}

impl ExistenceIndex {
    pub fn build(package_dir: &Path, family: Family) -> Self {
        let directories = family
            .resource_directories(package_dir)
            .into_iter()
            .filter(|directory| directory.is_dir())
            .collect::<Vec<_>>();
        if directories.is_empty() {
            debug!(
                res = %package_dir.join(RES_DIRECTORY).display(),
                "no resource directory, every {family} resource counts as absent"
            );
            return Self::default();
        }

        let names = directories
            .iter()
            .flat_map(|directory| {
                walkdir::WalkDir::new(directory)
                    .min_depth(1)
                    .max_depth(1)
                    .follow_links(true)
            })
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .filter(|s| *s == family.extension())
                        .is_some()
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .collect::<HashSet<_>>();

        debug!(
            %family,
            directories = directories.len(),
            count = names.len(),
            "indexed existing resources"
        );
        Self { names }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_from_str() {
        assert_eq!(Family::try_from("anim"), Ok(Family::ANIM));
        assert_eq!(Family::try_from("layout").map(|f| f.name()), Ok("layout"));
        assert_eq!(
            Family::try_from("drawable"),
            Err(Error::UnsupportedFamily("drawable".to_string()))
        );
        assert!(Family::try_from("").is_err());
    }

    #[test]
    fn family_paths() {
        let root = Path::new("/tmp/app");
        assert_eq!(Family::ANIM.directory(root), Path::new("/tmp/app/res/anim"));
        assert_eq!(
            Family::ANIM.declaration_file(root),
            Path::new("/tmp/app/res/values/anims.xml")
        );
        assert_eq!(public_table(root), Path::new("/tmp/app/res/values/public.xml"));
    }

    #[test]
    fn index_existing_resources() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let anim = dir.path().join("res").join("anim");
        std::fs::create_dir_all(anim.join("nested.xml"))?;
        std::fs::write(anim.join("fade_in.xml"), "<set/>")?;
        std::fs::write(anim.join("slide.xml"), "<set/>")?;
        std::fs::write(anim.join("notes.txt"), "")?;

        let index = ExistenceIndex::build(dir.path(), Family::ANIM);
        assert_eq!(index.names.len(), 2);
        assert!(index.exists("fade_in"));
        assert!(index.exists("slide"));
        assert!(!index.exists("notes"));
        assert!(!index.exists("nested"));
        assert!(!index.exists("fade_in.xml"));

        Ok(())
    }

    #[test]
    fn qualified_directories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let res = dir.path().join("res");
        for directory in ["animator-v21", "anim-v21", "animator", "animators", "layout-land"] {
            std::fs::create_dir_all(res.join(directory))?;
        }
        std::fs::write(res.join("animator-v21").join("appbar_state.xml"), "<selector/>")?;
        std::fs::write(res.join("anim-v21").join("fade_in.xml"), "<set/>")?;
        std::fs::write(res.join("animators").join("other.xml"), "<set/>")?;
        std::fs::write(res.join("layout-land").join("main.xml"), "<merge/>")?;

        let animator = Family::try_from("animator")?;
        assert_eq!(
            animator.resource_directories(dir.path()),
            vec![res.join("animator"), res.join("animator-v21")]
        );
        let index = ExistenceIndex::build(dir.path(), animator);
        assert!(index.exists("appbar_state"));
        assert!(!index.exists("other"));
        assert!(!index.exists("main"));

        let index = ExistenceIndex::build(dir.path(), Family::try_from("layout")?);
        assert!(index.exists("main"));

        assert_eq!(Family::ANIM.resource_directories(dir.path()), vec![res.join("anim")]);
        let index = ExistenceIndex::build(dir.path(), Family::ANIM);
        assert!(!index.exists("fade_in"));

        Ok(())
    }

    #[test]
    fn index_missing_directory() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;

        let index = ExistenceIndex::build(dir.path(), Family::ANIM);
        assert!(index.names.is_empty());
        assert!(!index.exists("fade_in"));

        Ok(())
    }
}
