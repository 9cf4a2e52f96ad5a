//! Tests for configuration file loading.

use super::*;
use serial_test::serial;
use std::env;
use std::fs;

#[test]
fn default_config_path_returns_some_path() {
    let path = default_config_path();
    assert!(
        path.is_some(),
        "default_config_path should return Some on supported platforms"
    );
}

#[test]
fn default_config_path_contains_chatwin_config_toml() {
    let path = default_config_path().expect("Should have default path");
    let path_str = path.to_string_lossy();
    assert!(
        path_str.contains("chatwin") && path_str.ends_with("config.toml"),
        "Path should contain 'chatwin' and end with 'config.toml', got: {}",
        path_str
    );
}

#[test]
fn load_config_file_returns_ok_none_for_missing_file() {
    let result = load_config_file("/nonexistent/path/to/config.toml");
    assert_eq!(
        result,
        Ok(None),
        "Missing config file should return Ok(None), not an error"
    );
}

#[test]
fn load_config_file_parses_valid_toml() {
    let config_path = env::temp_dir().join("chatwin_test_config.toml");

    let toml_content = r#"
log_file_path = "/tmp/chatwin-test.log"
settings_path = "/tmp/chatwin-settings.toml"
"#;

    fs::write(&config_path, toml_content).expect("Failed to write test config");

    let config = load_config_file(&config_path)
        .expect("Should successfully parse valid TOML")
        .expect("Should return Some(ConfigFile) for existing file");

    assert_eq!(
        config.log_file_path,
        Some(PathBuf::from("/tmp/chatwin-test.log"))
    );
    assert_eq!(
        config.settings_path,
        Some(PathBuf::from("/tmp/chatwin-settings.toml"))
    );
    assert_eq!(config.patterns, None);

    fs::remove_file(config_path).ok();
}

#[test]
fn load_config_file_returns_error_for_invalid_toml() {
    let config_path = env::temp_dir().join("chatwin_test_invalid.toml");

    fs::write(&config_path, "this is not valid TOML ][}{")
        .expect("Failed to write invalid test config");

    let result = load_config_file(&config_path);
    match result {
        Err(ConfigError::ParseError { path, reason: _ }) => {
            assert_eq!(path, config_path);
        }
        _ => panic!("Expected ParseError, got {:?}", result),
    }

    fs::remove_file(config_path).ok();
}

#[test]
fn config_file_rejects_unknown_fields() {
    let result: Result<ConfigFile, _> = toml::from_str("theme = \"dark\"");
    assert!(result.is_err(), "Unknown top-level keys should be rejected");
}

#[test]
fn patterns_section_keeps_defaults_for_omitted_lists() {
    let config: ConfigFile = toml::from_str(
        r#"
[patterns]
container = ["main section.chat"]
conversation_routes = ["/chat/"]
"#,
    )
    .expect("patterns section should parse");

    let patterns = config.patterns.expect("patterns present");
    let defaults = LocatorPatterns::default();
    assert_eq!(patterns.container, vec!["main section.chat".to_string()]);
    assert_eq!(patterns.conversation_routes, vec!["/chat/".to_string()]);
    assert_eq!(patterns.entry, defaults.entry);
    assert_eq!(patterns.article, defaults.article);
}

#[test]
fn patterns_section_rejects_unknown_fields() {
    let result: Result<ConfigFile, _> = toml::from_str(
        r#"
[patterns]
entries = ["article"]
"#,
    );
    assert!(result.is_err(), "Misspelled pattern list should be rejected");
}

#[test]
fn merge_config_uses_defaults_when_none() {
    assert_eq!(merge_config(None), ResolvedConfig::default());
}

#[test]
fn merge_config_overrides_with_config_file_values() {
    let patterns = LocatorPatterns {
        article: "section".to_string(),
        ..LocatorPatterns::default()
    };
    let config_file = ConfigFile {
        log_file_path: Some(PathBuf::from("/var/log/chatwin.log")),
        settings_path: Some(PathBuf::from("/etc/chatwin/settings.toml")),
        patterns: Some(patterns.clone()),
    };

    let resolved = merge_config(Some(config_file));
    assert_eq!(resolved.log_file_path, PathBuf::from("/var/log/chatwin.log"));
    assert_eq!(
        resolved.settings_path,
        Some(PathBuf::from("/etc/chatwin/settings.toml"))
    );
    assert_eq!(resolved.patterns, patterns);
}

/// RAII guard to ensure environment variable cleanup even under test parallelism.
/// Removes the var on drop, preventing test pollution in parallel execution.
struct EnvGuard(&'static str);

impl EnvGuard {
    fn new(name: &'static str) -> Self {
        env::remove_var(name);
        EnvGuard(name)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        env::remove_var(self.0);
    }
}

#[test]
#[serial(chatwin_settings)]
fn apply_env_overrides_respects_chatwin_settings() {
    let _guard = EnvGuard::new(SETTINGS_ENV);

    env::set_var(SETTINGS_ENV, "/tmp/env-settings.toml");
    let result = apply_env_overrides(ResolvedConfig::default());

    assert_eq!(
        result.settings_path,
        Some(PathBuf::from("/tmp/env-settings.toml")),
        "CHATWIN_SETTINGS should override settings path"
    );
}

#[test]
#[serial(chatwin_settings)]
fn apply_env_overrides_ignores_empty_value() {
    let _guard = EnvGuard::new(SETTINGS_ENV);

    env::set_var(SETTINGS_ENV, "");
    let base = ResolvedConfig::default();
    assert_eq!(apply_env_overrides(base.clone()), base);
}

#[test]
#[serial(chatwin_settings)]
fn apply_env_overrides_no_change_when_env_var_not_set() {
    let _guard = EnvGuard::new(SETTINGS_ENV);

    let base = ResolvedConfig::default();
    assert_eq!(
        apply_env_overrides(base.clone()),
        base,
        "Config should be unchanged when CHATWIN_SETTINGS not set"
    );
}

#[test]
#[serial(chatwin_config)]
fn load_config_with_precedence_prefers_explicit_path() {
    let _guard = EnvGuard::new(CONFIG_ENV);

    let temp_dir = env::temp_dir();
    let explicit_path = temp_dir.join("chatwin_explicit.toml");
    fs::write(&explicit_path, r#"log_file_path = "/explicit.log""#)
        .expect("Failed to write explicit config");

    let env_path = temp_dir.join("chatwin_env.toml");
    fs::write(&env_path, r#"log_file_path = "/env.log""#).expect("Failed to write env config");
    env::set_var(CONFIG_ENV, &env_path);

    let config = load_config_with_precedence(Some(explicit_path.clone()))
        .expect("explicit config loads")
        .expect("explicit config exists");
    assert_eq!(
        config.log_file_path,
        Some(PathBuf::from("/explicit.log")),
        "Should use explicit path, not CHATWIN_CONFIG env var"
    );

    fs::remove_file(explicit_path).ok();
    fs::remove_file(env_path).ok();
}

#[test]
#[serial(chatwin_config)]
fn load_config_with_precedence_uses_env_var_when_no_explicit_path() {
    let _guard = EnvGuard::new(CONFIG_ENV);

    let env_path = env::temp_dir().join("chatwin_env_only.toml");
    fs::write(&env_path, r#"settings_path = "/from-env.toml""#)
        .expect("Failed to write env config");
    env::set_var(CONFIG_ENV, &env_path);

    let config = load_config_with_precedence(None)
        .expect("env config loads")
        .expect("env config exists");
    assert_eq!(config.settings_path, Some(PathBuf::from("/from-env.toml")));

    fs::remove_file(env_path).ok();
}

#[test]
#[serial(chatwin_config)]
fn load_config_with_precedence_missing_env_file_is_not_an_error() {
    let _guard = EnvGuard::new(CONFIG_ENV);

    env::set_var(CONFIG_ENV, "/nonexistent/chatwin/config.toml");
    assert_eq!(load_config_with_precedence(None), Ok(None));
}

#[test]
fn apply_cli_overrides_takes_precedence() {
    let base = ResolvedConfig {
        settings_path: Some(PathBuf::from("/from-file.toml")),
        ..ResolvedConfig::default()
    };

    let result = apply_cli_overrides(
        base,
        Some(PathBuf::from("/cli.log")),
        Some(PathBuf::from("/cli-settings.toml")),
    );
    assert_eq!(result.log_file_path, PathBuf::from("/cli.log"));
    assert_eq!(result.settings_path, Some(PathBuf::from("/cli-settings.toml")));
}

#[test]
fn apply_cli_overrides_no_overrides() {
    let base = ResolvedConfig::default();
    assert_eq!(apply_cli_overrides(base.clone(), None, None), base);
}

#[test]
#[serial(chatwin_settings)]
fn precedence_chain_file_then_env_then_cli() {
    let _guard = EnvGuard::new(SETTINGS_ENV);

    let file = ConfigFile {
        settings_path: Some(PathBuf::from("/file.toml")),
        ..ConfigFile::default()
    };
    let merged = merge_config(Some(file));
    assert_eq!(merged.settings_path, Some(PathBuf::from("/file.toml")));

    env::set_var(SETTINGS_ENV, "/env.toml");
    let with_env = apply_env_overrides(merged);
    assert_eq!(with_env.settings_path, Some(PathBuf::from("/env.toml")));

    let with_cli = apply_cli_overrides(with_env, None, Some(PathBuf::from("/cli.toml")));
    assert_eq!(with_cli.settings_path, Some(PathBuf::from("/cli.toml")));
}
