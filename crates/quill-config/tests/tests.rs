use pretty_assertions::assert_eq;

use quill_config::{
    discover_config_path, json_schema, load_for_workspace, ConfigError, InlineOptions,
    LoggingConfig, QuillConfig, QUILL_CONFIG_ENV_VAR,
};
use quill_test_utils::{env_lock, EnvVarGuard};

#[test]
fn empty_config_uses_defaults() {
    let config = QuillConfig::load_from_str("").expect("parse");
    assert_eq!(config, QuillConfig::default());
    assert!(config.inline.delete_declaration);
    assert!(!config.inline.inline_this_only);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn inline_section_overrides_options() {
    let config = QuillConfig::load_from_str(
        r#"
[inline]
inline_this_only = true
search_in_comments = true
delete_declaration = false

[logging]
level = "debug"
json = true
"#,
    )
    .expect("parse");
    assert_eq!(
        config.inline,
        InlineOptions {
            inline_this_only: true,
            search_in_comments: true,
            search_text_occurrences: false,
            delete_declaration: false,
        }
    );
    assert!(config.logging.json);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = QuillConfig::load_from_str("[inline]\ninline_everything = true\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(ref msg) if msg.contains("unknown field")), "{err}");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = QuillConfig::load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn workspace_discovery_prefers_env_override() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("quill.toml"), "[inline]\ninline_this_only = true\n")
        .expect("write");
    std::fs::write(dir.path().join("custom.toml"), "[logging]\nlevel = \"trace\"\n")
        .expect("write");

    {
        let _guard = EnvVarGuard::remove(QUILL_CONFIG_ENV_VAR);
        let (config, path) = load_for_workspace(dir.path()).expect("load");
        assert_eq!(path, Some(dir.path().join("quill.toml")));
        assert!(config.inline.inline_this_only);
    }

    let _guard = EnvVarGuard::set(QUILL_CONFIG_ENV_VAR, "custom.toml");
    assert_eq!(
        discover_config_path(dir.path()),
        Some(dir.path().join("custom.toml"))
    );
    let (config, _) = load_for_workspace(dir.path()).expect("load");
    assert_eq!(config.logging.level, "trace");
}

#[test]
fn no_config_file_yields_defaults() {
    let _lock = env_lock();
    let _guard = EnvVarGuard::remove(QUILL_CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, path) = load_for_workspace(dir.path()).expect("load");
    assert_eq!(config, QuillConfig::default());
    assert_eq!(path, None);
}

#[test]
fn rust_log_is_merged_into_filter() {
    let _lock = env_lock();
    let _guard = EnvVarGuard::set("RUST_LOG", "quill_refactor=trace");
    let filter = LoggingConfig::default().env_filter().to_string();
    assert!(filter.contains("quill_refactor=trace"), "{filter}");
    assert!(filter.contains("info"), "{filter}");
}

#[test]
fn schema_lists_inline_options() {
    let schema = json_schema();
    let text = schema.to_string();
    for key in [
        "inline_this_only",
        "search_in_comments",
        "search_text_occurrences",
        "delete_declaration",
    ] {
        assert!(text.contains(key), "schema missing {key}");
    }
}
