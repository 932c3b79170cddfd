//! Dotfile resource: copies sources from the config directory into home
//!
//! `<config>/dotfiles/zshrc` deploys to `~/.zshrc` and
//! `<config>/dotfiles/config/nvim/init.lua` to `~/.config/nvim/init.lua`:
//! the first path component gets a leading dot unless it already has one.
//! Drift is a blake3 digest mismatch between source and target.

use anyhow::{Context, Result, bail};
use declarative::{Item, OperationStatus, Resource, ResourceKind};
use glob::Pattern;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Resource id and item manager for dotfiles
pub const DOTFILES_ID: &str = "dotfiles";

/// Suffix of the copy kept when a differing target is overwritten
pub const BACKUP_SUFFIX: &str = ".homestead-backup";

// ============================================================================
// Ignore patterns
// ============================================================================

/// File-name globs matched against each walked entry
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                if p.is_empty() || p.contains('/') {
                    bail!("pattern must be a non-empty file name");
                }
                Pattern::new(p).with_context(|| format!("Failed to compile {p:?}"))
            })
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(file_name))
    }
}

// ============================================================================
// Targets
// ============================================================================

/// One source file and where it deploys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotfileTarget {
    /// Target path relative to home, e.g. `.config/nvim/init.lua`
    pub name: String,
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Map a path relative to the source root onto its path relative to home.
fn target_relative(relative: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for (i, component) in relative.components().enumerate() {
        if let Component::Normal(part) = component {
            let part = part.to_string_lossy();
            if i == 0 && !part.starts_with('.') {
                out.push(format!(".{part}"));
            } else {
                out.push(part.as_ref());
            }
        }
    }
    out
}

fn digest(path: &Path) -> Result<blake3::Hash> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(blake3::hash(&content))
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(BACKUP_SUFFIX);
    target.with_file_name(name)
}

// ============================================================================
// Resource
// ============================================================================

pub struct DotfileResource {
    source_root: PathBuf,
    home: PathBuf,
    ignore: IgnoreSet,
    /// Source tree walked once per resource
    targets: OnceLock<Vec<DotfileTarget>>,
}

impl DotfileResource {
    pub fn new(source_root: PathBuf, home: PathBuf, ignore: IgnoreSet) -> Self {
        Self {
            source_root,
            home,
            ignore,
            targets: OnceLock::new(),
        }
    }

    /// Every deployable source file, sorted by target name
    ///
    /// A missing source directory means no dotfiles are managed.
    pub fn targets(&self) -> Result<&[DotfileTarget]> {
        if let Some(targets) = self.targets.get() {
            return Ok(targets.as_slice());
        }
        let walked = self.walk()?;
        Ok(self.targets.get_or_init(|| walked).as_slice())
    }

    fn walk(&self) -> Result<Vec<DotfileTarget>> {
        if !self.source_root.is_dir() {
            log::debug!(
                "Dotfile source {} does not exist, nothing to deploy",
                self.source_root.display()
            );
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        let walker = WalkDir::new(&self.source_root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.ignore.is_ignored(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry.with_context(|| {
                format!("Failed to walk {}", self.source_root.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.source_root)
                .with_context(|| format!("Failed to strip prefix from {}", entry.path().display()))?;
            let home_relative = target_relative(relative);
            targets.push(DotfileTarget {
                name: home_relative.to_string_lossy().replace('\\', "/"),
                source: entry.path().to_path_buf(),
                target: self.home.join(&home_relative),
            });
        }

        targets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(targets)
    }

    fn find(&self, name: &str) -> Result<&DotfileTarget> {
        let targets = self.targets()?;
        targets
            .binary_search_by(|t| t.name.as_str().cmp(name))
            .map(|i| &targets[i])
            .map_err(|_| anyhow::anyhow!("No dotfile source deploys to ~/{name}"))
    }
}

fn to_item(target: &DotfileTarget) -> Item {
    Item::new(DOTFILES_ID, &target.name)
        .with_metadata("source", target.source.display().to_string())
        .with_metadata("target", target.target.display().to_string())
}

impl Resource for DotfileResource {
    fn id(&self) -> String {
        DOTFILES_ID.to_string()
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Dotfile
    }

    fn description(&self) -> String {
        format!("dotfiles from {}", self.source_root.display())
    }

    fn desired(&self) -> Result<Vec<Item>> {
        Ok(self.targets()?.iter().map(to_item).collect())
    }

    /// Configured targets already present in home
    fn actual(&self) -> Result<Vec<Item>> {
        Ok(self
            .targets()?
            .iter()
            .filter(|t| t.target.symlink_metadata().is_ok())
            .map(to_item)
            .collect())
    }

    fn needs_reapply(&self, item: &Item) -> Result<bool> {
        let target = self.find(&item.name)?;
        if !target.target.is_file() {
            return Ok(true);
        }
        Ok(digest(&target.source)? != digest(&target.target)?)
    }

    fn apply(&self, item: &Item) -> Result<OperationStatus> {
        let target = self.find(&item.name)?;
        let existed = target.target.symlink_metadata().is_ok();

        if existed {
            if target.target.is_file() && digest(&target.source)? == digest(&target.target)? {
                return Ok(OperationStatus::Skipped);
            }
            if target.target.is_dir() {
                bail!("{} is a directory", target.target.display());
            }
            let backup = backup_path(&target.target);
            fs::copy(&target.target, &backup).with_context(|| {
                format!("Failed to back up {} to {}", target.target.display(), backup.display())
            })?;
            log::info!("Backed up {} to {}", target.target.display(), backup.display());
            // Replace symlinks instead of writing through them
            fs::remove_file(&target.target)
                .with_context(|| format!("Failed to remove {}", target.target.display()))?;
        } else if let Some(parent) = target.target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        fs::copy(&target.source, &target.target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                target.source.display(),
                target.target.display()
            )
        })?;
        log::debug!("Deployed {} to {}", target.source.display(), target.target.display());

        Ok(if existed {
            OperationStatus::Updated
        } else {
            OperationStatus::Installed
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
