//! Option validation, command assembly, and config merge against real files.

use std::fs;
use std::path::Path;

use serde_json::json;

use pybundle::config::{ConfigOrigin, EffectiveConfig};
use pybundle::{
    assemble_args, launch_plan, validate, BundleMode, BundleOptions, ConsoleMode, DataEntry,
    Platform,
};

fn write_script(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("app.py");
    fs::write(&path, "print('hello')\n").unwrap();
    path
}

#[test]
fn test_accepted_options_assemble_into_a_launch_plan() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path());

    let assets = dir.path().join("assets");
    fs::create_dir(&assets).unwrap();
    fs::write(assets.join("logo.png"), [0u8; 4]).unwrap();

    let mut options = BundleOptions::new(&script);
    options.add_data = vec![DataEntry::new(&assets, "assets")];
    options.hidden_imports = vec!["requests".to_string()];
    options.bundle_mode = BundleMode::OneFile;
    options.console_mode = ConsoleMode::Windowed;
    options.clean = true;

    let result = validate(&options, Platform::Linux);
    assert!(result.accepted, "issues: {:?}", result.issues);

    let args = assemble_args(&options);
    assert_eq!(args[0], script.display().to_string());
    assert!(args.contains(&"--onefile".to_string()));
    assert!(args.contains(&"--windowed".to_string()));
    assert!(args.contains(&"--clean".to_string()));
    assert!(args.contains(&format!("{}:assets", assets.display())));

    let plan = launch_plan(&options, Path::new("/usr/bin/python3"));
    assert_eq!(plan.program, "/usr/bin/python3");
    assert_eq!(plan.args[..2], ["-m".to_string(), "PyInstaller".to_string()]);
    assert_eq!(plan.working_dir, dir.path());
}

#[test]
fn test_rejected_options_carry_machine_readable_codes() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = BundleOptions::new(dir.path().join("missing.py"));
    options.add_data = vec![DataEntry::new(dir.path().join("gone.dat"), "data")];

    let result = validate(&options, Platform::Linux);
    assert!(!result.accepted);

    let codes = result.issue_codes();
    assert_eq!(codes.len(), 2);
    assert!(codes[0].starts_with("SCRIPT_NOT_FOUND:"));
    assert!(codes[1].starts_with("DATA_SOURCE_NOT_FOUND:"));
}

#[test]
fn test_config_layers_merge_with_cli_precedence() {
    let dir = tempfile::tempdir().unwrap();

    let user = dir.path().join("user.toml");
    fs::write(
        &user,
        "python = \"/usr/bin/python3.11\"\ngrace_seconds = 10\n",
    )
    .unwrap();

    let project = dir.path().join("pybundle.toml");
    fs::write(&project, "[bundle]\nmode = \"onefile\"\nclean = true\n").unwrap();

    let overrides = json!({"python": "/opt/venv/bin/python"});
    let config = EffectiveConfig::build(Some(&user), Some(&project), Some(overrides)).unwrap();

    // CLI wins over the user layer
    assert_eq!(config.python(), "/opt/venv/bin/python");
    // user layer wins over builtin
    assert_eq!(config.grace_period().as_secs(), 10);
    // project layer applies where nothing overrides it
    assert_eq!(config.bundle_mode(), BundleMode::OneFile);
    assert!(config.clean());
    // untouched keys keep builtin defaults
    assert_eq!(config.console_mode(), ConsoleMode::Console);

    // provenance: builtin, user, project, cli in precedence order
    let origins: Vec<ConfigOrigin> = config.sources.iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![
            ConfigOrigin::Builtin,
            ConfigOrigin::User,
            ConfigOrigin::Project,
            ConfigOrigin::Cli,
        ]
    );

    // file-backed sources carry a SHA-256 digest
    for source in &config.sources {
        match source.origin {
            ConfigOrigin::User | ConfigOrigin::Project => {
                assert_eq!(source.digest.as_ref().unwrap().len(), 64);
            }
            _ => assert!(source.digest.is_none()),
        }
    }
}

#[test]
fn test_config_digest_tracks_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("pybundle.toml");

    fs::write(&project, "grace_seconds = 1\n").unwrap();
    let first = EffectiveConfig::build(None, Some(&project), None).unwrap();

    fs::write(&project, "grace_seconds = 2\n").unwrap();
    let second = EffectiveConfig::build(None, Some(&project), None).unwrap();

    assert_ne!(first.sources[1].digest, second.sources[1].digest);
    assert_eq!(second.grace_period().as_secs(), 2);
}

#[test]
fn test_effective_config_serializes_with_schema() {
    let config = EffectiveConfig::build(None, None, None).unwrap();
    let json = serde_json::to_string(&config).unwrap();

    assert!(json.contains("\"schema_id\":\"pybundle/effective_config@1\""));
    assert!(json.contains("\"schema_version\":1"));

    let parsed: EffectiveConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.python(), "python3");
}
