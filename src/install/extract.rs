//! Artifact extraction into the install directory
//!
//! The archive is first unpacked into a scratch directory created inside the
//! install directory. Entries are only moved into place once the whole archive
//! unpacked and the executable was found, so a corrupt artifact never leaves a
//! half-written executable behind.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use super::error::{InstallError, Result};
use super::platform::{ArchiveFormat, PlatformDescriptor};

/// Final location of the installed tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub dir: PathBuf,
    pub executable: PathBuf,
}

impl InstallTarget {
    pub fn new(dir: PathBuf, platform: &PlatformDescriptor, tool_name: &str) -> Self {
        let executable = dir.join(platform.executable_name(tool_name));
        Self { dir, executable }
    }

    fn executable_name(&self) -> &std::ffi::OsStr {
        self.executable
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new(""))
    }
}

/// Extract `archive` into `target.dir` and mark the executable runnable
pub async fn install_artifact(
    archive: &Path,
    format: ArchiveFormat,
    target: &InstallTarget,
) -> Result<PathBuf> {
    let archive = archive.to_path_buf();
    let target = target.clone();

    // Wrap CPU-bound extraction in spawn_blocking
    tokio::task::spawn_blocking(move || install_artifact_blocking(&archive, format, &target))
        .await
        .map_err(|e| InstallError::Io(io::Error::other(e)))?
}

/// Synchronous body of [`install_artifact`]
pub fn install_artifact_blocking(
    archive: &Path,
    format: ArchiveFormat,
    target: &InstallTarget,
) -> Result<PathBuf> {
    fs::create_dir_all(&target.dir)?;

    let staging = tempfile::Builder::new()
        .prefix(".install-")
        .tempdir_in(&target.dir)?;

    match format {
        ArchiveFormat::TarGz => unpack_tar_gz(archive, staging.path())?,
        ArchiveFormat::Zip => unpack_zip(archive, staging.path())?,
    }

    let root = content_root(staging.path(), target.executable_name())?;
    let name = target.executable_name().to_string_lossy();
    match fs::symlink_metadata(root.join(target.executable_name())) {
        Ok(meta) if meta.file_type().is_file() => {}
        Ok(_) => {
            return Err(InstallError::extraction(
                archive,
                format!("{name} in archive is not a regular file"),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(InstallError::extraction(
                archive,
                format!("archive does not contain {name}"),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        move_into(&entry.path(), &target.dir.join(entry.file_name()))
            .map_err(|e| InstallError::extraction(archive, e))?;
    }

    mark_executable(&target.executable)?;
    log::info!("Installed {}", target.executable.display());

    // staging dropped here, removing whatever was left behind
    Ok(target.executable.clone())
}

/// Reject entry paths that would land outside the destination
fn safe_relative_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Link targets must be relative and never climb with `..`
///
/// Entries are moved out of a flattened top-level folder, so even a `..`
/// that stays inside the archive may escape the install directory.
fn link_stays_inside(link: &Path) -> bool {
    !link.as_os_str().is_empty()
        && link
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let corrupt = |e: io::Error| InstallError::extraction(archive_path, e);

    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    let mut count = 0usize;
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();
        if safe_relative_path(&path).is_none() {
            // "./" is a common root entry in tarballs
            if path.components().all(|c| c == Component::CurDir) {
                continue;
            }
            return Err(InstallError::extraction(
                archive_path,
                format!("entry escapes install directory: {}", path.display()),
            ));
        }
        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            let link = entry.link_name().map_err(corrupt)?.unwrap_or_default();
            if !link_stays_inside(&link) {
                return Err(InstallError::extraction(
                    archive_path,
                    format!(
                        "link {} points outside install directory: {}",
                        path.display(),
                        link.display()
                    ),
                ));
            }
        }
        if !entry.unpack_in(dest).map_err(corrupt)? {
            return Err(InstallError::extraction(
                archive_path,
                format!("entry escapes install directory: {}", path.display()),
            ));
        }
        count += 1;
    }

    if count == 0 {
        return Err(InstallError::extraction(archive_path, "archive is empty"));
    }
    log::debug!("Unpacked {count} tar entries");
    Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| InstallError::extraction(archive_path, e))?;

    if archive.len() == 0 {
        return Err(InstallError::extraction(archive_path, "archive is empty"));
    }

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| InstallError::extraction(archive_path, e))?;

        let relative = entry
            .enclosed_name()
            .and_then(|p| safe_relative_path(&p))
            .ok_or_else(|| {
                InstallError::extraction(
                    archive_path,
                    format!("entry escapes install directory: {}", entry.name()),
                )
            })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out).map_err(|e| InstallError::extraction(archive_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
            }
        }
    }

    log::debug!("Unpacked {} zip entries", archive.len());
    Ok(())
}

/// Directory whose contents get installed
///
/// Archives that wrap everything in a single top-level folder are flattened.
fn content_root(staging: &Path, executable: &std::ffi::OsStr) -> Result<PathBuf> {
    if staging.join(executable).is_file() {
        return Ok(staging.to_path_buf());
    }
    let entries: Vec<_> = fs::read_dir(staging)?.collect::<io::Result<_>>()?;
    if let [only] = entries.as_slice()
        && only.file_type()?.is_dir()
    {
        return Ok(only.path());
    }
    Ok(staging.to_path_buf())
}

/// Move `src` to `dest`, replacing files and merging directories
fn move_into(src: &Path, dest: &Path) -> io::Result<()> {
    let src_is_dir = fs::symlink_metadata(src)?.is_dir();
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() && src_is_dir => {
            for entry in fs::read_dir(src)? {
                let entry = entry?;
                move_into(&entry.path(), &dest.join(entry.file_name()))?;
            }
            return Ok(());
        }
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest)?,
        Ok(_) => fs::remove_file(dest)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(src, dest)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::symlink_metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn zip_file(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn linux_target(dir: &Path) -> InstallTarget {
        let platform = PlatformDescriptor::resolve("linux", "x86_64").unwrap();
        InstallTarget::new(dir.to_path_buf(), &platform, "tool")
    }

    fn leftover_staging(dir: &Path) -> bool {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .any(|e| e.file_name().to_string_lossy().starts_with(".install-"))
    }

    #[test]
    fn tar_gz_is_extracted_and_made_executable() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("tool-linux-x86_64.tar.gz");
        tar_gz(&archive, &[("tool", b"#!/bin/sh\n"), ("LICENSE", b"MIT")]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(&install.path().join("bin"));
        let exe = install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap();

        assert_eq!(exe, target.executable);
        assert_eq!(fs::read(&exe).unwrap(), b"#!/bin/sh\n");
        assert!(target.dir.join("LICENSE").is_file());
        assert!(!leftover_staging(&target.dir));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&exe).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn reinstall_overwrites_existing_files() {
        let scratch = tempfile::tempdir().unwrap();
        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());

        let first = scratch.path().join("first.tar.gz");
        tar_gz(&first, &[("tool", b"v1"), ("share/readme", b"one")]);
        install_artifact_blocking(&first, ArchiveFormat::TarGz, &target).unwrap();

        let second = scratch.path().join("second.tar.gz");
        tar_gz(&second, &[("tool", b"v2"), ("share/readme", b"two")]);
        install_artifact_blocking(&second, ArchiveFormat::TarGz, &target).unwrap();

        assert_eq!(fs::read(&target.executable).unwrap(), b"v2");
        assert_eq!(fs::read(install.path().join("share/readme")).unwrap(), b"two");
    }

    #[test]
    fn single_top_level_folder_is_flattened() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("a.tar.gz");
        tar_gz(&archive, &[("tool-linux-x86_64/tool", b"bin")]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap();

        assert_eq!(fs::read(&target.executable).unwrap(), b"bin");
        assert!(!install.path().join("tool-linux-x86_64").exists());
    }

    #[test]
    fn zip_is_extracted() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("tool-windows-x86_64.zip");
        zip_file(&archive, &[("tool.exe", b"MZ"), ("docs/README.txt", b"hi")]);

        let platform = PlatformDescriptor::resolve("windows", "x86_64").unwrap();
        let install = tempfile::tempdir().unwrap();
        let target = InstallTarget::new(install.path().to_path_buf(), &platform, "tool");

        install_artifact_blocking(&archive, ArchiveFormat::Zip, &target).unwrap();
        assert_eq!(fs::read(install.path().join("tool.exe")).unwrap(), b"MZ");
        assert!(install.path().join("docs/README.txt").is_file());
    }

    #[test]
    fn corrupt_archive_leaves_install_dir_clean() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("broken.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        let err = install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }), "{err:?}");
        assert!(!target.executable.exists());
        assert!(!leftover_staging(install.path()));
    }

    #[test]
    fn wrong_format_is_an_extraction_error() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("a.tar.gz");
        tar_gz(&archive, &[("tool", b"bin")]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        let err = install_artifact_blocking(&archive, ArchiveFormat::Zip, &target).unwrap_err();
        assert!(matches!(err, InstallError::Extraction { .. }));
    }

    #[test]
    fn missing_executable_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("a.tar.gz");
        tar_gz(&archive, &[("other-tool", b"bin")]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        let err = install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap_err();

        assert!(err.to_string().contains("does not contain tool"));
        assert!(!install.path().join("other-tool").exists());
    }

    fn tar_gz_with_link(path: &Path, name: &str, target: &Path, extra: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (file_name, data) in extra {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, file_name, *data).unwrap();
        }
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder.append_link(&mut header, name, target).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_outside_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret");
        fs::write(&secret, b"keep out").unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o600)).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("a.tar.gz");
        tar_gz_with_link(&archive, "tool", &secret, &[]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        let err = install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }), "{err:?}");
        assert!(fs::symlink_metadata(&target.executable).is_err());
        assert!(!leftover_staging(install.path()));
        let mode = fs::metadata(&secret).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn climbing_symlink_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("a.tar.gz");
        tar_gz_with_link(&archive, "pkg/tool", Path::new("../../secret"), &[]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        let err = install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap_err();

        assert!(err.to_string().contains("points outside install directory"), "{err}");
        assert!(fs::symlink_metadata(&target.executable).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn executable_must_be_a_regular_file() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("a.tar.gz");
        tar_gz_with_link(&archive, "tool", Path::new("real-tool"), &[("real-tool", b"bin")]);

        let install = tempfile::tempdir().unwrap();
        let target = linux_target(install.path());
        let err = install_artifact_blocking(&archive, ArchiveFormat::TarGz, &target).unwrap_err();

        assert!(err.to_string().contains("not a regular file"), "{err}");
        assert!(!install.path().join("real-tool").exists());
    }

    #[test]
    fn link_targets_must_stay_relative() {
        assert!(link_stays_inside(Path::new("real-tool")));
        assert!(link_stays_inside(Path::new("./lib/libx.so")));
        assert!(!link_stays_inside(Path::new("../x")));
        assert!(!link_stays_inside(Path::new("lib/../../x")));
        assert!(!link_stays_inside(Path::new("/etc/passwd")));
        assert!(!link_stays_inside(Path::new("")));
    }

    #[test]
    fn parent_dir_entries_are_rejected() {
        assert!(safe_relative_path(Path::new("../evil")).is_none());
        assert!(safe_relative_path(Path::new("a/../../evil")).is_none());
        assert!(safe_relative_path(Path::new("/etc/passwd")).is_none());
        assert_eq!(
            safe_relative_path(Path::new("./bin/tool")),
            Some(PathBuf::from("bin/tool"))
        );
    }
}
