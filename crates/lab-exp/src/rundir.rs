//! On-disk layout of a sweep: root directory, `latest` links, verbatim
//! configuration copy, the incremental `exp_info.yaml`, and run directories.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lab_core::errors::{ErrorInfo, LabError};
use lab_core::VcsProvenance;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{ParamValue, EXP_INFO_FILE};

/// Verbatim copy of the input configuration inside the sweep root.
pub const CONFIG_COPY_FILE: &str = "config.yaml";
/// Name of the convenience links pointing at the newest sweep.
pub const LATEST_LINK: &str = "latest";
/// Marker appended once every run reached a terminal outcome.
pub const COMPLETED_MARKER: &str = "completed: true\n";

/// `<log_root>/<name>/<stamp>` and the paths derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLayout {
    log_root: PathBuf,
    name: String,
    stamp: String,
}

impl SweepLayout {
    /// Layout of sweep `name` started at `stamp` under `log_root`.
    pub fn new(log_root: impl Into<PathBuf>, name: impl Into<String>, stamp: impl Into<String>) -> Self {
        Self {
            log_root: log_root.into(),
            name: name.into(),
            stamp: stamp.into(),
        }
    }

    /// Directory grouping every sweep of the same name.
    pub fn sweep_parent(&self) -> PathBuf {
        self.log_root.join(&self.name)
    }

    /// Root directory of this sweep.
    pub fn root(&self) -> PathBuf {
        self.sweep_parent().join(&self.stamp)
    }

    /// Directory of run `run_name` inside the sweep root.
    pub fn run_dir(&self, run_name: &str) -> PathBuf {
        self.root().join(run_name)
    }

    /// Fails with [`LabError::OutputCollision`] when the sweep root already exists.
    pub fn ensure_vacant(&self) -> Result<(), LabError> {
        let root = self.root();
        if fs::symlink_metadata(&root).is_ok() {
            return Err(collision(&root));
        }
        Ok(())
    }

    /// Creates the sweep root, refreshes both `latest` links and stores the
    /// configuration text. The root itself is created non-recursively so a
    /// sweep started concurrently for the same second still collides.
    pub fn create(&self, config_text: &str) -> Result<PathBuf, LabError> {
        let parent = self.sweep_parent();
        fs::create_dir_all(&parent).map_err(|err| LabError::io("rundir.mkdir", &parent, err))?;
        let root = self.root();
        fs::create_dir(&root).map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => collision(&root),
            _ => LabError::io("rundir.mkdir", &root, err),
        })?;

        create_or_update_link(&parent, LATEST_LINK, Path::new(&self.stamp))?;
        create_or_update_link(
            &self.log_root,
            LATEST_LINK,
            &Path::new(&self.name).join(&self.stamp),
        )?;

        let config_copy = root.join(CONFIG_COPY_FILE);
        fs::write(&config_copy, config_text)
            .map_err(|err| LabError::io("rundir.config_copy", &config_copy, err))?;
        Ok(root)
    }

    /// Creates the directory of one run plus the parents of its file-parameter paths.
    pub fn create_run_dir(
        &self,
        run_name: &str,
        file_params: &[(String, PathBuf)],
    ) -> Result<PathBuf, LabError> {
        let dir = self.run_dir(run_name);
        fs::create_dir(&dir).map_err(|err| LabError::io("rundir.run_mkdir", &dir, err))?;
        for (_, relative) in file_params {
            if let Some(parent) = dir.join(relative).parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| LabError::io("rundir.file_param_mkdir", parent, err))?;
            }
        }
        Ok(dir)
    }
}

fn collision(root: &Path) -> LabError {
    LabError::OutputCollision(
        ErrorInfo::new(
            "rundir.exists",
            format!("directory {} already exists", root.display()),
        )
        .with_path(root)
        .with_hint("wait a second and retry, or pick another log directory"),
    )
}

/// Points `dir/name` at `target`, removing whatever entry is there first.
pub fn create_or_update_link(dir: &Path, name: &str, target: &Path) -> Result<(), LabError> {
    let link = dir.join(name);
    match fs::symlink_metadata(&link) {
        Ok(meta) if meta.is_dir() => {
            return Err(LabError::Io(
                ErrorInfo::new("rundir.latest_is_dir", "refusing to replace a real directory")
                    .with_path(&link),
            ))
        }
        Ok(_) => remove_link(&link).map_err(|err| LabError::io("rundir.latest_remove", &link, err))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(LabError::io("rundir.latest_stat", &link, err)),
    }
    symlink_dir(target, &link).map_err(|err| LabError::io("rundir.latest_link", &link, err))
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

fn remove_link(link: &Path) -> io::Result<()> {
    #[cfg(windows)]
    if fs::remove_dir(link).is_ok() {
        return Ok(());
    }
    fs::remove_file(link)
}

/// Header block written to `exp_info.yaml` before the first run starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpInfoHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Commit the sweep ran against.
    pub vcs: Option<VcsProvenance>,
    /// Absolute path of the launched program.
    pub executable: String,
    /// Hex SHA-256 of the configuration text.
    pub config_sha256: String,
    /// Values shared by every run.
    pub fixed_params: IndexMap<String, ParamValue>,
}

/// Hex SHA-256 digest of the configuration text.
pub fn config_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Single owner of `exp_info.yaml`.
///
/// The file holds the header until [`ExpInfoWriter::finish`] appends the
/// completion marker. Dropping the writer early leaves the marker absent,
/// which is how an interrupted sweep is recognised.
#[derive(Debug)]
pub struct ExpInfoWriter {
    path: PathBuf,
    file: File,
}

impl ExpInfoWriter {
    /// Creates `exp_info.yaml` under `root` and writes `header` to it.
    pub fn create(root: &Path, header: &ExpInfoHeader) -> Result<Self, LabError> {
        let path = root.join(EXP_INFO_FILE);
        let file = File::create(&path).map_err(|err| LabError::io("exp_info.create", &path, err))?;
        let mut writer = Self { path, file };
        let yaml = serde_yaml::to_string(header).map_err(|err| {
            LabError::Io(ErrorInfo::new("exp_info.serialize", err.to_string()).with_path(&writer.path))
        })?;
        writer.append(&yaml)?;
        Ok(writer)
    }

    /// Location of `exp_info.yaml`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, text: &str) -> Result<(), LabError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|err| LabError::io("exp_info.write", &self.path, err))
    }

    /// Appends the completion marker and syncs the file.
    pub fn finish(mut self) -> Result<PathBuf, LabError> {
        self.append(COMPLETED_MARKER)?;
        self.file
            .sync_all()
            .map_err(|err| LabError::io("exp_info.sync", &self.path, err))?;
        Ok(self.path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn latest_link_replaces_dangling_entry() {
        let temp = tempfile::tempdir().expect("tmp dir");
        std::os::unix::fs::symlink("missing-target", temp.path().join(LATEST_LINK))
            .expect("seed dangling link");
        fs::create_dir(temp.path().join("b")).expect("mkdir");

        create_or_update_link(temp.path(), LATEST_LINK, Path::new("b")).expect("relink");
        let target = fs::read_link(temp.path().join(LATEST_LINK)).expect("read link");
        assert_eq!(target, PathBuf::from("b"));
    }

    #[test]
    fn latest_link_refuses_real_directory() {
        let temp = tempfile::tempdir().expect("tmp dir");
        fs::create_dir(temp.path().join(LATEST_LINK)).expect("mkdir");
        let err = create_or_update_link(temp.path(), LATEST_LINK, Path::new("b")).unwrap_err();
        assert_eq!(err.info().code, "rundir.latest_is_dir");
    }

    #[test]
    fn dropped_writer_leaves_marker_absent() {
        let temp = tempfile::tempdir().expect("tmp dir");
        let header = ExpInfoHeader {
            vcs: None,
            executable: "/bin/true".into(),
            config_sha256: config_digest("params: {}\n"),
            fixed_params: IndexMap::new(),
        };
        let writer = ExpInfoWriter::create(temp.path(), &header).expect("create");
        let path = writer.path().to_path_buf();
        drop(writer);
        let text = fs::read_to_string(path).expect("read");
        assert!(text.starts_with("executable: /bin/true\n"));
        assert!(!text.contains("completed"));
    }
}
