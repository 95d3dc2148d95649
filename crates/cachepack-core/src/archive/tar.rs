//! Tar archive operations

use super::Archive;
use crate::close::Closer;
use crate::security::{ensure_no_symlink_ancestors, sanitize_path};
use crate::{Error, Phase, Result};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Builder, Entry, EntryType, Header, HeaderMode};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Uncompressed tar archive rooted at a directory.
///
/// Entry names are relative to `root`. Creating never follows symlinks; they
/// are stored as links, or left out entirely when `skip_symlinks` is set.
#[derive(Debug, Clone)]
pub struct TarArchive {
    root: PathBuf,
    skip_symlinks: bool,
}

impl TarArchive {
    /// Create an archive whose entry names are relative to `root`
    pub fn new(root: impl Into<PathBuf>, skip_symlinks: bool) -> Self {
        Self {
            root: root.into(),
            skip_symlinks,
        }
    }

    /// Walk one source and append everything below it
    fn append_source<W: Write>(
        &self,
        builder: &mut Builder<W>,
        src: &Path,
        written: &mut u64,
    ) -> Result<()> {
        src.symlink_metadata().map_err(|e| {
            Error::InvalidPath(format!(
                "make sure file or directory exists {:?}: {}",
                src, e
            ))
        })?;

        for entry in WalkDir::new(src)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_symlink() && self.skip_symlinks {
                debug!("Skipping symlink: {:?}", path);
                continue;
            }

            let name = match relative_name(&self.root, path)? {
                Some(name) => name,
                // The root itself maps to the destination directory
                None => continue,
            };
            let metadata = entry.metadata()?;

            if file_type.is_dir() {
                debug!("Adding directory: {:?}", name);
                let mut header = header_for(&metadata, EntryType::Directory);
                builder.append_data(&mut header, &name, io::empty())?;
            } else if file_type.is_file() {
                debug!("Adding file: {:?} as {:?}", path, name);
                let file = File::open(path)?;
                let size = file.metadata()?.len();
                let mut header = header_for(&metadata, EntryType::Regular);
                header.set_size(size);
                append_file(builder, &mut header, &name, file, size, written)?;
            } else if file_type.is_symlink() {
                let target = fs::read_link(path)?;
                debug!("Adding symlink: {:?} -> {:?}", name, target);
                let mut header = header_for(&metadata, EntryType::Symlink);
                builder.append_link(&mut header, &name, &target)?;
            } else {
                warn!("Skipping special file: {:?}", path);
            }
        }

        Ok(())
    }

    fn unpack_entries(&self, dst: &Path, r: &mut dyn Read, written: &mut u64) -> Result<()> {
        fs::create_dir_all(dst)?;

        let mut archive = tar::Archive::new(r);
        let entries = archive
            .entries()
            .map_err(|e| Error::NotReadable(e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| Error::NotReadable(e.to_string()))?;
            let name = entry
                .path()
                .map_err(|e| Error::NotReadable(e.to_string()))?
                .into_owned();
            let kind = entry.header().entry_type();

            if kind == EntryType::XGlobalHeader {
                continue;
            }

            let target = sanitize_path(dst, &name)?;
            ensure_no_symlink_ancestors(dst, &target)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            debug!("Extracting: {:?}", name);

            match kind {
                EntryType::Directory => extract_dir(&entry, &target)?,
                EntryType::Regular | EntryType::Continuous => {
                    extract_regular(&mut entry, &target, written)?
                }
                EntryType::Symlink => extract_symlink(&entry, &target)?,
                EntryType::Link => extract_hard_link(&entry, dst, &target)?,
                other => {
                    return Err(Error::UnsupportedEntry {
                        path: name,
                        kind: other.as_byte() as char,
                    })
                }
            }
        }

        Ok(())
    }
}

impl Archive for TarArchive {
    fn create(&self, srcs: &[PathBuf], w: &mut dyn Write) -> Result<u64> {
        info!(
            sources = srcs.len(),
            root = ?self.root,
            skip_symlinks = self.skip_symlinks,
            "Creating tar archive"
        );

        let mut builder = Closer::new(Builder::new(w), "tar writer");
        let mut written = 0;

        for src in srcs {
            self.append_source(&mut *builder, src, &mut written)
                .map_err(|e| e.during(Phase::Create, written))?;
        }

        builder
            .close()
            .map_err(|e| Error::from(e).during(Phase::Create, written))?;

        info!(bytes = written, "Tar archive created");
        Ok(written)
    }

    fn extract(&self, dst: &Path, r: &mut dyn Read) -> Result<u64> {
        info!(destination = ?dst, root = ?self.root, "Extracting tar archive");

        let mut written = 0;
        self.unpack_entries(dst, r, &mut written)
            .map_err(|e| e.during(Phase::Extract, written))?;

        info!(bytes = written, "Tar archive extracted");
        Ok(written)
    }
}

/// Reader that remembers how many bytes it handed out
struct Counted<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for Counted<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Append a regular file body of `size` bytes.
///
/// The header size is fixed before the body is copied, so a body that ends
/// early leaves a broken entry behind and must fail the archive.
fn append_file<W: Write, R: Read>(
    builder: &mut Builder<W>,
    header: &mut Header,
    name: &Path,
    body: R,
    size: u64,
    written: &mut u64,
) -> Result<()> {
    let mut body = Counted {
        inner: body.take(size),
        count: 0,
    };
    let appended = builder.append_data(header, name, &mut body);
    *written += body.count;
    appended?;

    if body.count < size {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{:?} shrank while archiving: {} of {} bytes",
                name, body.count, size
            ),
        )));
    }
    Ok(())
}

/// Name of `path` inside an archive rooted at `root`.
///
/// Leading components shared with `root` are dropped, as is anything that
/// would climb above it, so sources outside the root still get a relative
/// name. Returns `None` for the root itself.
pub fn relative_name(root: &Path, path: &Path) -> Result<Option<PathBuf>> {
    let (root, path) = if root.is_absolute() == path.is_absolute() {
        (normalize(root), normalize(path))
    } else {
        let cwd = std::env::current_dir()?;
        (normalize(&cwd.join(root)), normalize(&cwd.join(path)))
    };

    if path == root {
        return Ok(None);
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidPath(format!("{:?} has no file name", path)))?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let shared = dir
        .components()
        .zip(root.components())
        .take_while(|(a, b)| a == b)
        .count();

    let mut name: PathBuf = dir
        .components()
        .skip(shared)
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    name.push(file_name);

    Ok(Some(name))
}

/// Lexically resolve `.` and `..`
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn header_for(metadata: &fs::Metadata, kind: EntryType) -> Header {
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(metadata, HeaderMode::Complete);
    header.set_entry_type(kind);
    header.set_size(0);
    header
}

fn extract_dir<R: Read>(entry: &Entry<'_, R>, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;

    #[cfg(unix)]
    if let Ok(mode) = entry.header().mode() {
        use std::os::unix::fs::PermissionsExt;

        // Keep the directory writable so its children can still be restored
        let mode = mode | 0o700;
        if let Err(e) = fs::set_permissions(target, fs::Permissions::from_mode(mode)) {
            debug!("Failed to set permissions on {:?}: {}", target, e);
        }
    }
    #[cfg(not(unix))]
    let _ = entry;

    Ok(())
}

fn extract_regular<R: Read>(entry: &mut Entry<'_, R>, target: &Path, written: &mut u64) -> Result<()> {
    remove_existing(target)?;

    let expected = entry.size();
    let mut file = File::create(target)?;
    let copied = io::copy(entry, &mut file)?;
    *written += copied;

    if copied < expected {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "truncated entry {:?}: {} of {} bytes",
                target, copied, expected
            ),
        )));
    }

    apply_tar_metadata(target, entry.header());
    Ok(())
}

fn extract_symlink<R: Read>(entry: &Entry<'_, R>, target: &Path) -> Result<()> {
    let link = link_name(entry)?;
    remove_existing(target)?;
    debug!("Creating symlink: {:?} -> {:?}", target, link);

    make_symlink(&link, target)?;
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let resolved = target.parent().map(|p| p.join(link)).unwrap_or_default();
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(link, target)
    } else {
        std::os::windows::fs::symlink_file(link, target)
    }
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_link: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn extract_hard_link<R: Read>(entry: &Entry<'_, R>, dst: &Path, target: &Path) -> Result<()> {
    let link = link_name(entry)?;
    let source = sanitize_path(dst, &link)?;
    ensure_no_symlink_ancestors(dst, &source)?;
    remove_existing(target)?;
    debug!("Creating hard link: {:?} -> {:?}", target, source);

    fs::hard_link(&source, target)?;
    Ok(())
}

fn link_name<R: Read>(entry: &Entry<'_, R>) -> Result<PathBuf> {
    entry
        .link_name()
        .map_err(|e| Error::NotReadable(e.to_string()))?
        .map(Cow::into_owned)
        .ok_or_else(|| Error::NotReadable(format!("link entry without target: {:?}", entry.path())))
}

/// Unlink a file or symlink at `target` so it is replaced rather than followed
fn remove_existing(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(metadata) if !metadata.is_dir() => Ok(fs::remove_file(target)?),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Apply metadata from tar header to extracted file
fn apply_tar_metadata(path: &Path, header: &Header) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(mode) = header.mode() {
            if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
                debug!("Failed to set permissions on {:?}: {}", path, e);
            }
        }
    }

    if let Ok(mtime) = header.mtime() {
        let mtime = filetime::FileTime::from_unix_time(mtime as i64, 0);
        if let Err(e) = filetime::set_file_mtime(path, mtime) {
            debug!("Failed to set mtime on {:?}: {}", path, e);
        }
    }
}
