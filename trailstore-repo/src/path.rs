//! Normalisation of caller-supplied paths.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDate, Utc};

use crate::RepositoryError;

/// Normalise a repository-relative path.
///
/// Backslashes become `/`, `.` components are dropped, and absolute paths or
/// `..` components are rejected. An empty result is rejected as well.
pub(crate) fn managed_path(raw: &str) -> Result<Utf8PathBuf, RepositoryError> {
    let path = relative(raw)?;
    if path.as_str().is_empty() {
        return Err(RepositoryError::validation("path must name a file"));
    }
    Ok(path)
}

/// Normalise a folder below a category; empty means the category itself.
///
/// Hidden segments are rejected: listings skip them, so anything stored
/// below one would drop out of the repository's view.
pub(crate) fn folder(raw: &str) -> Result<Utf8PathBuf, RepositoryError> {
    let folder = relative(raw)?;
    if let Some(hidden) = folder.iter().find(|segment| segment.starts_with('.')) {
        return Err(RepositoryError::validation(format!(
            "folder `{raw}` must not contain the hidden segment `{hidden}`"
        )));
    }
    Ok(folder)
}

fn relative(raw: &str) -> Result<Utf8PathBuf, RepositoryError> {
    let unified = raw.trim().replace('\\', "/");
    let mut normalised = Utf8PathBuf::new();
    for component in Utf8Path::new(&unified).components() {
        match component {
            Utf8Component::Normal(name) => normalised.push(name),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                return Err(RepositoryError::validation(format!(
                    "path `{raw}` must not contain `..`"
                )));
            }
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(RepositoryError::validation(format!(
                    "path `{raw}` must be relative to the repository"
                )));
            }
        }
    }
    Ok(normalised)
}

/// Validate a bare file name supplied for ingest or rename.
pub(crate) fn file_name(raw: &str) -> Result<&str, RepositoryError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RepositoryError::validation("file name must not be empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(RepositoryError::validation(format!(
            "file name `{name}` must not contain path separators"
        )));
    }
    if name.starts_with('.') {
        return Err(RepositoryError::validation(format!(
            "file name `{name}` must not be hidden"
        )));
    }
    Ok(name)
}

/// First day of the `<year>/<month>` pair directly below the category, if any.
pub(crate) fn date_from_layout(path: &Utf8Path) -> Option<DateTime<Utc>> {
    let mut components = path.components().skip(1);
    let year = components.next()?.as_str();
    let month = components.next()?.as_str();
    // The file itself must follow the two date directories.
    components.next()?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
