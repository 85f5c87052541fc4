use std::fs;
use std::path::{Path, PathBuf};

use lab_core::VcsKind;
use lab_exp::{Configuration, ParamValue, ParameterSpec, RangeSpec};

#[test]
fn parses_every_parameter_kind() {
    let text = "\
name: lr_scan
executable: bin/train
params:
  lr: [0.1, 0.01]
  epochs: {min: 1, max: 3}
  optimizer: adam
  checkpoint: {relative_path: ckpt/model.bin}
vcs: {type: git}
";
    let config = Configuration::parse(text, Path::new("/work/exp.yaml")).expect("config");
    assert_eq!(config.name, "lr_scan");
    assert_eq!(config.executable, PathBuf::from("bin/train"));
    assert_eq!(
        config.params["lr"],
        ParameterSpec::List(vec![ParamValue::Float(0.1), ParamValue::Float(0.01)])
    );
    assert_eq!(
        config.params["epochs"],
        ParameterSpec::Range(RangeSpec {
            min: ParamValue::Int(1),
            max: Some(ParamValue::Int(3)),
            step: ParamValue::Int(1),
        })
    );
    assert_eq!(
        config.params["optimizer"],
        ParameterSpec::Scalar(ParamValue::Str("adam".into()))
    );
    assert_eq!(
        config.file_params(),
        vec![("checkpoint".to_string(), PathBuf::from("ckpt/model.bin"))]
    );
    assert_eq!(config.vcs.as_ref().map(|vcs| vcs.kind), Some(VcsKind::Git));
    assert_eq!(config.repo_dir().unwrap(), Some(PathBuf::from("/work")));
    assert_eq!(config.text, text);
}

#[test]
fn name_defaults_to_file_stem() {
    let config =
        Configuration::parse("executable: run\n", Path::new("/cfg/dropout.yaml")).expect("config");
    assert_eq!(config.name, "dropout");
    assert!(config.params.is_empty());
}

#[test]
fn declaration_order_is_preserved() {
    let config = Configuration::parse(
        "executable: run\nparams:\n  z: 1\n  a: 2\n  m: 3\n",
        Path::new("/cfg/order.yaml"),
    )
    .expect("config");
    let names: Vec<&str> = config.params.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["z", "a", "m"]);
}

#[test]
fn reserved_file_name_is_rejected() {
    let err = Configuration::parse("executable: run\n", Path::new("/out/exp_info.yaml")).unwrap_err();
    assert_eq!(err.info().code, "config.reserved_name");
}

#[test]
fn missing_executable_is_reported_with_path() {
    let err = Configuration::parse("params: {a: 1}\n", Path::new("/cfg/x.yaml")).unwrap_err();
    assert_eq!(err.info().code, "config.executable");
    assert_eq!(err.info().context["path"], "/cfg/x.yaml");
}

#[test]
fn unknown_range_keys_are_rejected() {
    let err = Configuration::parse(
        "executable: run\nparams:\n  a: {max: 3, stride: 2}\n",
        Path::new("/cfg/x.yaml"),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "config.range_key");
    assert_eq!(err.info().context["param"], "a");
}

#[test]
fn non_numeric_range_bounds_are_rejected() {
    let err = Configuration::parse(
        "executable: run\nparams:\n  a: {max: ten}\n",
        Path::new("/cfg/x.yaml"),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "config.range_numeric");
}

#[test]
fn unsupported_vcs_type_fails_to_parse() {
    let err = Configuration::parse(
        "executable: run\nvcs: {type: hg}\n",
        Path::new("/cfg/x.yaml"),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "config.parse");
}

#[test]
fn malformed_yaml_is_a_config_error() {
    let err = Configuration::parse("executable: [unclosed\n", Path::new("/cfg/x.yaml")).unwrap_err();
    assert_eq!(err.info().code, "config.parse");
}

#[test]
fn load_reports_missing_file() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let err = Configuration::load(&temp.path().join("absent.yaml")).unwrap_err();
    assert_eq!(err.info().code, "config.read");
}

#[test]
fn executable_resolves_next_to_config() {
    let temp = tempfile::tempdir().expect("tmp dir");
    fs::create_dir(temp.path().join("bin")).expect("mkdir");
    fs::write(temp.path().join("bin").join("train"), "").expect("write");
    let path = temp.path().join("exp.yaml");
    fs::write(&path, "executable: bin/train\n").expect("write config");

    let config = Configuration::load(&path).expect("config");
    assert_eq!(
        config.resolve_executable().unwrap(),
        temp.path().join("bin").join("train")
    );
}

#[cfg(unix)]
#[test]
fn bare_command_resolves_to_absolute_path_on_path() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("exp.yaml");
    fs::write(&path, "executable: sh\n").expect("write config");
    let config = Configuration::load(&path).expect("config");
    let resolved = config.resolve_executable().unwrap();
    assert!(resolved.is_absolute(), "{}", resolved.display());
    assert_eq!(resolved.file_name().and_then(|n| n.to_str()), Some("sh"));
    assert!(resolved.is_file());
}

#[test]
fn unknown_bare_command_is_kept_as_written() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("exp.yaml");
    fs::write(&path, "executable: no-such-command-4f2a\n").expect("write config");
    let config = Configuration::load(&path).expect("config");
    assert_eq!(
        config.resolve_executable().unwrap(),
        PathBuf::from("no-such-command-4f2a")
    );
}

#[test]
fn vcs_path_is_relative_to_config() {
    let config = Configuration::parse(
        "executable: run\nvcs: {type: git, path: ../src}\n",
        Path::new("/work/cfg/x.yaml"),
    )
    .expect("config");
    assert_eq!(
        config.repo_dir().unwrap(),
        Some(PathBuf::from("/work/cfg/../src"))
    );
}
