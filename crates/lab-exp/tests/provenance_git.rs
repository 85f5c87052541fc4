use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use lab_core::errors::{ErrorInfo, LabError};
use lab_core::VcsProvenance;
use lab_exp::provenance::record;
use lab_exp::{plan_sweep, Configuration, GitCli, SweepOptions, Vcs};

struct FakeVcs {
    diff: String,
    commit: Result<String, LabError>,
    queried: RefCell<Vec<PathBuf>>,
}

impl FakeVcs {
    fn clean(commit: &str) -> Self {
        Self {
            diff: String::new(),
            commit: Ok(commit.to_string()),
            queried: RefCell::new(Vec::new()),
        }
    }
}

impl Vcs for FakeVcs {
    fn diff_summary(&self, repo: &Path) -> Result<String, LabError> {
        self.queried.borrow_mut().push(repo.to_path_buf());
        Ok(self.diff.clone())
    }

    fn head_commit(&self, _repo: &Path) -> Result<String, LabError> {
        self.commit.clone()
    }
}

fn config(text: &str) -> Configuration {
    Configuration::parse(text, Path::new("/work/sweep.yaml")).expect("config")
}

#[test]
fn no_vcs_block_skips_provenance() {
    let vcs = FakeVcs::clean("abc");
    let result = record(&config("executable: run\n"), &vcs).expect("record");
    assert_eq!(result, None);
    assert!(vcs.queried.borrow().is_empty());
}

#[test]
fn clean_tree_records_commit() {
    let vcs = FakeVcs::clean("0123abcd");
    let result = record(&config("executable: run\nvcs: {type: git}\n"), &vcs).expect("record");
    assert_eq!(result, Some(VcsProvenance::git("0123abcd")));
    assert_eq!(*vcs.queried.borrow(), vec![PathBuf::from("/work")]);
}

#[test]
fn dirty_tree_is_a_provenance_error() {
    let vcs = FakeVcs {
        diff: " src/main.rs | 2 +-\n 1 file changed".to_string(),
        ..FakeVcs::clean("abc")
    };
    let err = record(&config("executable: run\nvcs: {type: git}\n"), &vcs).unwrap_err();
    assert!(matches!(err, LabError::Provenance(_)));
    assert_eq!(err.info().code, "provenance.dirty");
    assert!(err.info().message.contains("src/main.rs"));
}

#[test]
fn failed_commit_query_propagates() {
    let vcs = FakeVcs {
        commit: Err(LabError::Provenance(ErrorInfo::new(
            "provenance.git_failed",
            "not a git repository",
        ))),
        ..FakeVcs::clean("")
    };
    let err = record(&config("executable: run\nvcs: {type: git}\n"), &vcs).unwrap_err();
    assert_eq!(err.info().code, "provenance.git_failed");
}

#[test]
fn dirty_tree_aborts_before_any_directory_exists() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let vcs = FakeVcs {
        diff: " a | 1 +".to_string(),
        ..FakeVcs::clean("abc")
    };
    let options = SweepOptions::new(temp.path().join("logs"));
    let err = plan_sweep(
        &config("executable: run\nparams: {alpha: [1, 2]}\nvcs: {type: git}\n"),
        &options,
        &vcs,
    )
    .unwrap_err();
    assert!(matches!(err, LabError::Provenance(_)));
    assert!(!temp.path().join("logs").exists());
}

fn git(repo: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(["-c", "user.name=lab", "-c", "user.email=lab@example.com"])
        .args(args)
        .current_dir(repo)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[test]
fn git_cli_detects_uncommitted_changes() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let repo = temp.path();
    if !git(repo, &["init", "-q"]) {
        eprintln!("git unavailable; skipping");
        return;
    }
    fs::write(repo.join("train.sh"), "echo one\n").expect("write");
    fs::write(repo.join("sweep.yaml"), "executable: train.sh\nvcs: {type: git}\n").expect("write");
    assert!(git(repo, &["add", "."]));
    assert!(git(repo, &["commit", "-q", "-m", "init"]));

    let config = Configuration::load(&repo.join("sweep.yaml")).expect("config");
    let recorded = record(&config, &GitCli).expect("clean record").expect("provenance");
    assert_eq!(recorded.commit.len(), 40);

    fs::write(repo.join("train.sh"), "echo two\n").expect("modify");
    let options = SweepOptions::new(repo.join("logs"));
    let err = plan_sweep(&config, &options, &GitCli).unwrap_err();
    assert_eq!(err.info().code, "provenance.dirty");
    assert!(!repo.join("logs").exists());
}
