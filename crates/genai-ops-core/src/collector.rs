//! Declaration collection from a directory of configuration source files.
//!
//! [`collect_declarations`] reads every `*.tf` file of a directory in file-name
//! order and merges `locals` and `output` blocks into one flat namespace.
//! Later definitions replace earlier ones with the same name.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use hcl::{Block, Body, Expression};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::error::{ConfigError, ConfigResult};
use crate::eval::{free_references, DataSourceRef, Reference};
use crate::metrics::METRICS;
use crate::obs;

const SOURCE_EXTENSION: &str = "tf";

/// Where a declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Local,
    Output,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Local => write!(f, "local"),
            DeclarationKind::Output => write!(f, "output"),
        }
    }
}

/// A named, not-yet-evaluated expression.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub expr: Expression,
    /// File (or in-memory origin label) the declaration was read from.
    pub origin: PathBuf,
    pub kind: DeclarationKind,
    /// Free references of `expr`, in source order.
    pub references: Vec<Reference>,
}

impl Declaration {
    pub fn new(
        name: impl Into<String>,
        expr: Expression,
        origin: impl Into<PathBuf>,
        kind: DeclarationKind,
    ) -> Self {
        let references = free_references(&expr);
        Self {
            name: name.into(),
            expr,
            origin: origin.into(),
            kind,
            references,
        }
    }

    /// Distinct `local` names this declaration reads.
    pub fn local_dependencies(&self) -> BTreeSet<&str> {
        self.references
            .iter()
            .filter_map(Reference::local_name)
            .collect()
    }
}

/// SHA-256 over the names and contents of the files a set was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    pub directory: PathBuf,
    pub digest: String,
    pub files: usize,
}

impl SourceFingerprint {
    /// Abbreviated digest for log lines and tables.
    pub fn short(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}

/// The merged declarations of one directory.
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    declarations: BTreeMap<String, Declaration>,
    data_sources: BTreeSet<DataSourceRef>,
    fingerprint: Option<SourceFingerprint>,
}

impl DeclarationSet {
    /// Parse in-memory sources in the given order.
    ///
    /// Each item is `(origin, text)`; `origin` is only used for diagnostics.
    pub fn from_sources<I, P, S>(sources: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for (origin, text) in sources {
            let origin = origin.into();
            let body = hcl::parse(text.as_ref()).map_err(|source| ConfigError::Parse {
                path: origin.clone(),
                source,
            })?;
            set.merge_body(&origin, &body);
        }
        Ok(set)
    }

    fn merge_body(&mut self, origin: &Path, body: &Body) {
        for block in body.blocks() {
            match block.identifier.as_str() {
                "locals" => {
                    for attr in block.body.attributes() {
                        self.insert(Declaration::new(
                            attr.key.as_str(),
                            attr.expr.clone(),
                            origin,
                            DeclarationKind::Local,
                        ));
                    }
                }
                "output" => self.merge_output(origin, block),
                "data" => {
                    if let [kind, name, ..] = block.labels.as_slice() {
                        self.data_sources
                            .insert(DataSourceRef::new(kind.as_str(), name.as_str()));
                    }
                }
                other => debug!(block = other, origin = %origin.display(), "ignoring block"),
            }
        }
    }

    fn merge_output(&mut self, origin: &Path, block: &Block) {
        let Some(label) = block.labels.first() else {
            warn!(origin = %origin.display(), "output block without a label skipped");
            return;
        };
        match block.body.attributes().find(|attr| attr.key.as_str() == "value") {
            Some(attr) => self.insert(Declaration::new(
                label.as_str(),
                attr.expr.clone(),
                origin,
                DeclarationKind::Output,
            )),
            None => warn!(
                output = label.as_str(),
                origin = %origin.display(),
                "output block without `value` skipped"
            ),
        }
    }

    fn insert(&mut self, declaration: Declaration) {
        if let Some(previous) = self.declarations.get(&declaration.name) {
            debug!(
                name = %declaration.name,
                previous = %previous.origin.display(),
                origin = %declaration.origin.display(),
                "declaration overridden"
            );
        }
        self.declarations
            .insert(declaration.name.clone(), declaration);
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    /// Declarations in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declared `data` blocks, deduplicated and ordered.
    pub fn data_sources(&self) -> Vec<DataSourceRef> {
        self.data_sources.iter().cloned().collect()
    }

    pub fn fingerprint(&self) -> Option<&SourceFingerprint> {
        self.fingerprint.as_ref()
    }
}

/// Regular files directly inside `dir` accepted by `keep`, in no particular
/// order. Errors reading the directory or any of its entries are fatal.
pub(crate) fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> ConfigResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))? {
        let path = entry.map_err(|e| ConfigError::io(dir, e))?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Read and merge every `*.tf` file of `dir` (non-recursive, file-name order).
///
/// A parse failure aborts the whole collection and names the offending file.
pub fn collect_declarations(dir: &Path, cancel: &CancellationToken) -> ConfigResult<DeclarationSet> {
    cancel.check()?;

    let mut files = list_files(dir, |path| {
        path.extension().and_then(|ext| ext.to_str()) == Some(SOURCE_EXTENSION)
    })?;
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut hasher = Sha256::new();
    let mut set = DeclarationSet::default();
    for path in &files {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        hasher.update(b"\0");

        let body = hcl::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        set.merge_body(path, &body);
    }

    let fingerprint = SourceFingerprint {
        directory: dir.to_path_buf(),
        digest: hex::encode(hasher.finalize()),
        files: files.len(),
    };
    obs::emit_directory_collected(dir, files.len(), set.len(), fingerprint.short());
    METRICS.inc_directories_collected();
    set.fingerprint = Some(fingerprint);
    Ok(set)
}
