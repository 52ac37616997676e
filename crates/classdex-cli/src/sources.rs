//! Class-file sources: a compiled-output directory or a dependency jar

use classdex_core::index::is_fragment_path;
use classdex_core::names::class_name_from_path;
use classdex_core::{ClassHeader, FormatError, HeaderIndex};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

const ARCHIVE_METADATA_DIR: &str = "META-INF/";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error while scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while scanning {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("Class parse error in {path}: {source}")]
    ClassFile {
        path: String,
        #[source]
        source: FormatError,
    },
}

/// Anything that can enumerate compiled classes as `(internal name, bytes)`
pub trait ClassSource {
    /// Location used in logs and errors
    fn location(&self) -> &Path;

    /// Call `visit` for every class entry, stopping at the first error
    fn for_each_class(
        &mut self,
        visit: &mut dyn FnMut(&str, &[u8]) -> Result<(), SourceError>,
    ) -> Result<(), SourceError>;
}

/// What to do with a class whose header cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptClassPolicy {
    /// Abort the scan; used for the module's own output
    Fail,
    /// Log and leave the class out; used for dependencies
    Skip,
}

/// Read every class of `source` into `index`, returning how many were new
pub fn index_classes(
    source: &mut dyn ClassSource,
    index: &mut HeaderIndex,
    policy: CorruptClassPolicy,
) -> Result<usize, SourceError> {
    let location = source.location().display().to_string();
    let mut added = 0;

    source.for_each_class(&mut |name, bytes| match ClassHeader::parse(bytes) {
        Ok(header) => {
            if index.insert(name, header) {
                added += 1;
            }
            Ok(())
        }
        Err(err) => match policy {
            CorruptClassPolicy::Fail => Err(SourceError::ClassFile {
                path: format!("{}!/{}.class", location, name),
                source: err,
            }),
            CorruptClassPolicy::Skip => {
                warn!(source = %location, class = name, "skipping unreadable class: {}", err);
                Ok(())
            }
        },
    })?;

    debug!(source = %location, added, "indexed class headers");
    Ok(added)
}

/// A directory of compiled classes, walked in file-name order
pub struct ClassDirectory {
    root: PathBuf,
}

impl ClassDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassSource for ClassDirectory {
    fn location(&self) -> &Path {
        &self.root
    }

    fn for_each_class(
        &mut self,
        visit: &mut dyn FnMut(&str, &[u8]) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| SourceError::Io {
                path: self.root.clone(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            let Some(name) = class_name_from_path(&relative) else {
                continue;
            };

            let bytes = fs::read(entry.path()).map_err(|source| SourceError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
            visit(name, &bytes)?;
        }
        Ok(())
    }
}

/// An opened dependency jar
pub struct JarArchive {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl JarArchive {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| SourceError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    /// Text of every `.properties` fragment under `prefix`, as `(entry path, text)`
    pub fn fragments(&mut self, prefix: &str) -> Result<Vec<(String, String)>, SourceError> {
        let mut fragments = Vec::new();
        for idx in 0..self.archive.len() {
            let mut entry = self.archive.by_index(idx).map_err(|source| SourceError::Zip {
                path: self.path.clone(),
                source,
            })?;
            if !entry.is_file() || !is_fragment_path(entry.name(), prefix) {
                continue;
            }

            let name = entry.name().to_string();
            let mut buffer = Vec::new();
            entry
                .read_to_end(&mut buffer)
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            fragments.push((name, String::from_utf8_lossy(&buffer).into_owned()));
        }
        Ok(fragments)
    }
}

impl ClassSource for JarArchive {
    fn location(&self) -> &Path {
        &self.path
    }

    fn for_each_class(
        &mut self,
        visit: &mut dyn FnMut(&str, &[u8]) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        let mut buffer = Vec::new();
        for idx in 0..self.archive.len() {
            let mut entry = self.archive.by_index(idx).map_err(|source| SourceError::Zip {
                path: self.path.clone(),
                source,
            })?;
            if !entry.is_file() || entry.name().starts_with(ARCHIVE_METADATA_DIR) {
                continue;
            }

            let name = entry.name().to_string();
            let Some(class_name) = class_name_from_path(&name) else {
                continue;
            };

            buffer.clear();
            entry
                .read_to_end(&mut buffer)
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            visit(class_name, &buffer)?;
        }
        Ok(())
    }
}

/// Is `path` a file with a `.jar` extension?
pub fn is_jar(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("jar"))
}
