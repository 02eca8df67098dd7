//! Path helpers shared by the planner and the materializer.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` lexically. Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// True when `path` equals `dir` or lies below it, compared component-wise
/// after normalization (so `node_modules/a/../../etc` is not under `node_modules`).
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let path = normalize_path(path);
    let dir = normalize_path(dir);
    path.starts_with(&dir)
}

/// Path to write into a symlink at `link` so that it points at `target`,
/// relative to the link's parent. `None` when no relative form exists
/// (different drive letters on Windows).
pub fn relative_symlink_path(link: &Path, target: &Path) -> Option<PathBuf> {
    let from_dir = link.parent()?;
    let result = pathdiff::diff_paths(target, from_dir)?;
    if result.is_absolute() {
        return None;
    }
    Some(result)
}

/// Join a workspace-relative, `/`-separated member path onto `base`.
pub fn join_member_path(base: &Path, member: &str) -> PathBuf {
    member
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .fold(base.to_path_buf(), |acc, segment| acc.join(segment))
}
