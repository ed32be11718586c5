//! Integration tests for the configuration system

use syncwatch_config::{Config, ConfigManager, ConfigSection, HiddenSetFile, CONFIG_VERSION};
use syncwatch_core::{HiddenSet, Provider};
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    // Surfaces the load/save warnings in failing test output
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.server.base_url = "http://media-box:8787".to_string();
    modified.stream.log_buffer_lines = 50;
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.server.base_url, "http://media-box:8787");
    assert_eq!(reloaded.stream.log_buffer_lines, 50);

    manager.reset()?;
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_token_survives_reload() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    manager.update(|config| config.credentials.set_token(Provider::Simkl, "sk-123"))?;
    manager.update(|config| config.credentials.set_token(Provider::Plex, "px-456"))?;

    let config = manager.load()?;
    assert_eq!(config.credentials.token(Provider::Simkl), Some("sk-123"));
    assert_eq!(config.credentials.token(Provider::Plex), Some("px-456"));
    Ok(())
}

#[test]
fn test_invalid_save_leaves_file_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.save(&Config::default())?;
    let before = std::fs::read_to_string(manager.config_path())?;

    let mut invalid = Config::default();
    invalid.auth.provider_a_max_ticks = 0;
    assert!(manager.save(&invalid).is_err());

    let after = std::fs::read_to_string(manager.config_path())?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn test_hidden_set_lives_next_to_config() -> Result<(), Box<dyn std::error::Error>> {
    let (temp_dir, manager) = setup_test_manager()?;
    let config = manager.load()?;

    let store = manager.hidden_set_file(&config);
    let mut set = HiddenSet::new();
    set.insert("tmdb:603");
    store.save(&set)?;

    let reopened = HiddenSetFile::new(temp_dir.path().join("hidden.json"));
    assert!(reopened.load().contains("tmdb:603"));
    Ok(())
}

#[test]
fn test_sections_validate_independently() {
    let mut config = Config::default();
    config.stream.log_tag = String::new();

    assert!(config.server.validate().is_ok());
    assert!(config.stream.validate().is_err());
    assert_eq!(config.stream.section_name(), "stream");
    assert_eq!(config.validate().map_err(|e| e.len()), Err(1));
}
