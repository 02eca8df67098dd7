//! Applies a [`LinkPlan`] to disk.
//!
//! Each link is created directly. When the destination already exists the
//! existing entry is inspected:
//!
//! - a link of the planned kind resolving to the planned source is accepted
//!   as is (another process may have removed and recreated the same link
//!   meanwhile);
//! - a link resolving elsewhere is a [`LinkError::LinkConflict`] and is left
//!   untouched;
//! - a plain file or directory, or a link of the wrong kind to the planned
//!   source, is removed and the create retried once.
//!
//! Symlinks compare by canonical path, hard links by device and inode.

use anyhow::{Context, Result, anyhow};
use futures_util::{StreamExt, stream};
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::model::{LinkKind, LinkOutcome, LinkPlan, PlannedFile, PlannedLink};
use crate::error::LinkError;
use crate::runtime::{Runtime, normalize_path, relative_symlink_path};

/// Shared flag that stops new link operations from starting. Operations
/// already running complete.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts of what one materialization did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    pub removed: usize,
    pub created: usize,
    pub already_linked: usize,
    pub replaced: usize,
    pub files_written: usize,
}

impl MaterializeReport {
    fn record(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Created => self.created += 1,
            LinkOutcome::AlreadyLinked => self.already_linked += 1,
            LinkOutcome::Replaced => self.replaced += 1,
        }
    }
}

/// What occupies a destination that refused a create.
#[derive(Debug)]
enum Existing {
    SameTarget,
    OtherTarget(PathBuf),
    Stale(StaleEntry),
    Vanished,
}

#[derive(Debug, Clone, Copy)]
enum StaleEntry {
    Dir,
    File,
    Symlink,
}

pub struct Materializer<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> Materializer<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Apply `plan` sequentially: removals, links, then files.
    #[tracing::instrument(skip(self, plan))]
    pub fn materialize(&self, plan: &LinkPlan) -> Result<MaterializeReport> {
        let mut report = MaterializeReport::default();
        for path in plan.removals() {
            if self.remove_stale_link(path)? {
                report.removed += 1;
            }
        }
        for link in plan.links() {
            report.record(self.create_link(link)?);
        }
        for file in plan.files() {
            self.write_file(file)?;
            report.files_written += 1;
        }
        info!(
            "Materialized plan: {} created, {} already linked, {} replaced, {} files",
            report.created, report.already_linked, report.replaced, report.files_written
        );
        Ok(report)
    }

    /// Remove a symlink planned for removal. Returns `false` when there is
    /// nothing to remove any more.
    pub fn remove_stale_link(&self, path: &Path) -> Result<bool> {
        if !self.runtime.is_symlink(path) {
            debug!("{:?} is no longer a symlink, nothing to remove", path);
            return Ok(false);
        }
        match self.runtime.remove_symlink(path) {
            Ok(()) => Ok(true),
            Err(e) if has_io_kind(&e, ErrorKind::NotFound) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }

    /// Create one link, resolving an occupied destination as described in
    /// the module docs.
    #[tracing::instrument(skip(self), fields(src = ?link.src, dest = ?link.dest))]
    pub fn create_link(&self, link: &PlannedLink) -> Result<LinkOutcome> {
        if let Some(parent) = link.dest.parent() {
            self.runtime.create_dir_all(parent)?;
        }

        match self.try_create(link) {
            Ok(()) => return Ok(LinkOutcome::Created),
            Err(e) if has_io_kind(&e, ErrorKind::AlreadyExists) => {}
            Err(e) => return Err(e),
        }

        match self.inspect(link)? {
            Existing::SameTarget => {
                debug!("{:?} already points to {:?}", link.dest, link.src);
                Ok(LinkOutcome::AlreadyLinked)
            }
            Existing::OtherTarget(actual) => Err(self.conflict(link, actual)),
            Existing::Vanished => self.retry_create(link),
            Existing::Stale(entry) => {
                debug!("Removing stale {:?} at {:?}", entry, link.dest);
                let removed = match entry {
                    StaleEntry::Dir => self.runtime.remove_dir_all(&link.dest),
                    StaleEntry::File => self.runtime.remove_file(&link.dest),
                    StaleEntry::Symlink => self.runtime.remove_symlink(&link.dest),
                };
                match removed {
                    Ok(()) => {}
                    Err(e) if has_io_kind(&e, ErrorKind::NotFound) => {}
                    Err(e) => return Err(e),
                }
                self.retry_create(link)
            }
        }
    }

    /// The single retry after clearing the destination. Anything but the
    /// same link in the way now is a conflict.
    fn retry_create(&self, link: &PlannedLink) -> Result<LinkOutcome> {
        match self.try_create(link) {
            Ok(()) => Ok(LinkOutcome::Replaced),
            Err(e) if has_io_kind(&e, ErrorKind::AlreadyExists) => match self.inspect(link)? {
                Existing::SameTarget => {
                    debug!(
                        "{:?} was recreated with the planned target by someone else",
                        link.dest
                    );
                    Ok(LinkOutcome::AlreadyLinked)
                }
                Existing::OtherTarget(actual) => Err(self.conflict(link, actual)),
                Existing::Stale(_) | Existing::Vanished => {
                    Err(self.conflict(link, link.dest.clone()))
                }
            },
            Err(e) => Err(e),
        }
    }

    fn try_create(&self, link: &PlannedLink) -> Result<()> {
        match link.kind {
            LinkKind::Hardlink => self.runtime.hard_link(&link.src, &link.dest),
            LinkKind::FileSymlink => self.runtime.symlink(&self.symlink_target(link), &link.dest),
            LinkKind::DirSymlink => self
                .runtime
                .symlink_dir(&self.symlink_target(link), &link.dest),
        }
    }

    fn symlink_target(&self, link: &PlannedLink) -> PathBuf {
        relative_symlink_path(&link.dest, &link.src).unwrap_or_else(|| link.src.clone())
    }

    fn inspect(&self, link: &PlannedLink) -> Result<Existing> {
        let dest = &link.dest;

        if self.runtime.is_symlink(dest) {
            let actual = self
                .runtime
                .resolve_link(dest)
                .with_context(|| format!("Failed to read existing link {:?}", dest))?;
            let actual_canonical = self
                .runtime
                .canonicalize(dest)
                .unwrap_or_else(|_| normalize_path(&actual));
            if actual_canonical != self.canonical_source(&link.src) {
                return Ok(Existing::OtherTarget(actual));
            }
            return Ok(match link.kind {
                LinkKind::Hardlink => Existing::Stale(StaleEntry::Symlink),
                LinkKind::FileSymlink | LinkKind::DirSymlink => Existing::SameTarget,
            });
        }

        let existing = match self.runtime.file_identity(dest) {
            Ok(identity) => identity,
            Err(e) if has_io_kind(&e, ErrorKind::NotFound) => return Ok(Existing::Vanished),
            Err(e) => return Err(e),
        };
        if existing.is_dir {
            return Ok(Existing::Stale(StaleEntry::Dir));
        }
        if let Ok(source) = self.runtime.file_identity(&link.src) {
            if existing.same_file(&source) {
                return Ok(match link.kind {
                    LinkKind::Hardlink => Existing::SameTarget,
                    LinkKind::FileSymlink | LinkKind::DirSymlink => {
                        Existing::Stale(StaleEntry::File)
                    }
                });
            }
        }
        if existing.links > 1 {
            // Hard link to some other file; the other name is unknown.
            return Ok(Existing::OtherTarget(dest.clone()));
        }
        Ok(Existing::Stale(StaleEntry::File))
    }

    fn canonical_source(&self, src: &Path) -> PathBuf {
        self.runtime
            .canonicalize(src)
            .unwrap_or_else(|_| normalize_path(src))
    }

    fn conflict(&self, link: &PlannedLink, actual: PathBuf) -> anyhow::Error {
        warn!(
            "{:?} points to {:?}, expected {:?}; leaving it in place",
            link.dest, actual, link.src
        );
        LinkError::LinkConflict {
            dest: link.dest.clone(),
            expected: link.src.clone(),
            actual,
        }
        .into()
    }

    pub fn write_file(&self, file: &PlannedFile) -> Result<()> {
        if let Some(parent) = file.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .write(&file.path, &file.contents)
            .with_context(|| format!("Failed to write {:?}", file.path))
    }
}

/// Apply `plan` with up to `limit` links in flight. Removals run first and
/// files last. Once `cancel` is set (or any link fails) no new link starts;
/// links already started complete.
#[tracing::instrument(skip(runtime, plan, cancel))]
pub async fn materialize_concurrent<R: Runtime + 'static>(
    runtime: Arc<R>,
    plan: LinkPlan,
    limit: usize,
    cancel: CancelFlag,
) -> Result<MaterializeReport> {
    let plan = Arc::new(plan);
    let mut report = {
        let runtime = runtime.clone();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || -> Result<MaterializeReport> {
            let materializer = Materializer::new(runtime.as_ref());
            let mut report = MaterializeReport::default();
            for path in plan.removals() {
                if materializer.remove_stale_link(path)? {
                    report.removed += 1;
                }
            }
            Ok(report)
        })
        .await
        .context("Removal task panicked")??
    };

    let halt = CancelFlag::new();
    let outcomes: Vec<Result<Option<LinkOutcome>>> = stream::iter(plan.links().to_vec())
        .map(|link| {
            let runtime = runtime.clone();
            let cancel = cancel.clone();
            let halt = halt.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    if cancel.is_cancelled() || halt.is_cancelled() {
                        return Ok(None);
                    }
                    let result = Materializer::new(runtime.as_ref()).create_link(&link);
                    if result.is_err() {
                        halt.cancel();
                    }
                    result.map(Some)
                })
                .await
                .context("Link task panicked")?
            }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    let mut first_error = None;
    let mut skipped = 0;
    for outcome in outcomes {
        match outcome {
            Ok(Some(outcome)) => report.record(outcome),
            Ok(None) => skipped += 1,
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(anyhow!(
            "Linking cancelled: {} of {} links were not attempted",
            skipped,
            plan.links().len()
        ));
    }

    let files_written = tokio::task::spawn_blocking(move || -> Result<usize> {
        let materializer = Materializer::new(runtime.as_ref());
        for file in plan.files() {
            materializer.write_file(file)?;
        }
        Ok(plan.files().len())
    })
    .await
    .context("File task panicked")??;
    report.files_written = files_written;

    Ok(report)
}

fn has_io_kind(error: &anyhow::Error, kind: ErrorKind) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| io.kind() == kind)
}
