//! Integration tests for ConfigManager and bundle directory handling
//!
//! These tests verify:
//! - Engine settings loading and saving
//! - Default documents for missing bundle files
//! - Override file parsing
//! - Locale resources discovered from the bundle
//! - A full startup from a bundle directory on disk

use bundlecfg::services::{FixedLocaleProbe, LocaleResources};
use bundlecfg::{ConfigEngine, ConfigManager, EngineSettings, XmlDocument};
use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn write_bundle(dir: &Utf8PathBuf) {
    fs::write(
        dir.join("main.xml"),
        r#"<?xml version="1.0" encoding="utf-8"?>
<Main>
  <Config>
    <PRODUCT_TITLE>Bundle Test</PRODUCT_TITLE>
    <LOCALE>oslang</LOCALE>
    <DOWNLOAD_METHOD>http</DOWNLOAD_METHOD>
  </Config>
  <Products>
    <Product>
      <StaticData><Title>Core</Title><Logic><RunWithBits>false</RunWithBits></Logic></StaticData>
      <Locales>
        <Locale name="en"><Texts><Text name="t">Install</Text></Texts></Locale>
        <Locale name="de"><Texts><Text name="t">Installieren</Text></Texts></Locale>
      </Locales>
    </Product>
  </Products>
</Main>"#,
    )
    .unwrap();
    fs::write(
        dir.join("config.xml"),
        "<Main><Config><SECONDARY_DOWNLOAD_METHOD>bits</SECONDARY_DOWNLOAD_METHOD></Config></Main>",
    )
    .unwrap();
    fs::write(dir.join("overrides.yaml"), "DOWNLOAD_METHOD: cdn\nWORK_DIR: /tmp/blocked\n").unwrap();

    let locales = dir.join("locales");
    fs::create_dir_all(&locales).unwrap();
    fs::write(locales.join("en.locale"), "<Main><Locale><Title>Setup</Title></Locale></Main>").unwrap();
    fs::write(locales.join("de.locale"), "<Main><Locale><Title>Einrichtung</Title></Locale></Main>").unwrap();
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
}

#[test]
fn test_load_default_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.engine.default_locale, "en");
    assert_eq!(settings.engine.locale_dir, "locales");
    assert!(settings.is_protected("product_title"));
    assert!(settings.is_protected("WORK_DIR"));
    assert!(!settings.engine.debug_mode);
}

#[test]
fn test_settings_yaml_keys() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join("engine.yaml"),
        "Engine:\n  Protected Keys: [LOCALE]\n  Default Locale: de\n  Locale Directory: lang\n  Debug Mode: true\n",
    )
    .unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.engine.protected_keys, vec!["LOCALE"]);
    assert_eq!(settings.engine.default_locale, "de");
    assert_eq!(settings.engine.locale_dir, "lang");
    assert_eq!(settings.engine.log_dir, "logs");
    assert!(settings.engine.debug_mode);
    assert_eq!(
        manager.locale_resources(&settings).path_for("de"),
        config_path.join("lang").join("de.locale")
    );
}

#[test]
fn test_save_and_load_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let bundle = config_path.join("new_bundle");
    let manager = ConfigManager::new(&bundle).unwrap();

    let mut settings = EngineSettings::default();
    settings.engine.protected_keys.push("LOCALE".to_string());
    manager.save_settings(&settings).unwrap();

    let loaded = manager.load_settings().unwrap();
    assert!(loaded.is_protected("locale"));
    assert!(bundle.join("engine.yaml").exists());
}

#[test]
fn test_invalid_yaml_handling() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("engine.yaml"), "Engine: [this is: not valid").unwrap();
    fs::write(config_path.join("overrides.yaml"), "- a\n- b\n").unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert!(manager.load_settings().is_err());
    assert!(manager.load_overrides().is_err());
}

#[test]
fn test_locale_directory_lists_codes() {
    let (_temp_dir, config_path) = create_test_config_dir();
    write_bundle(&config_path);
    fs::write(config_path.join("locales").join("readme.txt"), "ignored").unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let locales = manager.locale_resources(&EngineSettings::default());

    assert_eq!(locales.available(), vec!["de", "en"]);
    assert!(locales.exists("de"));
    assert!(!locales.exists("fr"));
    assert!(locales.load("fr").unwrap().is_none());
    assert!(locales.load("en").unwrap().unwrap().contains("Setup"));
}

#[test]
fn test_full_startup_from_bundle() {
    let (_temp_dir, config_path) = create_test_config_dir();
    write_bundle(&config_path);
    let manager = ConfigManager::new(&config_path).unwrap();
    let settings = manager.load_settings().unwrap();

    let mut engine = ConfigEngine::new(settings.clone())
        .with_locales(manager.locale_resources(&settings))
        .with_os_probe(FixedLocaleProbe("de".into()));
    engine
        .startup(manager.startup_sources(None, None).unwrap())
        .unwrap();

    assert_eq!(engine.locale_code(), Some("de"));
    assert_eq!(engine.get_string("//Locale/Title", ""), "Einrichtung");
    // config.xml overlay, then overrides with the protected key dropped
    assert_eq!(engine.get_config_value("SECONDARY_DOWNLOAD_METHOD", ""), "bits");
    assert_eq!(engine.get_config_value("DOWNLOAD_METHOD", ""), "cdn");
    assert_eq!(engine.get_config_value("WORK_DIR", ""), "");

    let products = engine.products_settings();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Core");
    assert_eq!(products[0].download_method, "cdn");
    assert_eq!(products[0].secondary_download_method, "bits");
    assert!(!products[0].run_with_bits);
    let layout = products[0].controls_layout.as_ref().unwrap();
    assert_eq!(layout.control("t").unwrap().text, "Installieren");
}

#[test]
fn test_saveconfig_round_trip() {
    let (_temp_dir, config_path) = create_test_config_dir();
    write_bundle(&config_path);
    let manager = ConfigManager::new(&config_path).unwrap();
    let settings = manager.load_settings().unwrap();
    let saved_path = config_path.join("merged.xml");

    let mut engine = ConfigEngine::new(settings.clone())
        .with_locales(manager.locale_resources(&settings))
        .with_os_probe(FixedLocaleProbe("en".into()))
        .with_save_path(saved_path.clone());
    engine
        .startup(manager.startup_sources(None, None).unwrap())
        .unwrap();
    engine.resolve_settings().unwrap();

    let saved = XmlDocument::parse(&fs::read_to_string(&saved_path).unwrap()).unwrap();
    assert_eq!(saved.select_single("//Config/DOWNLOAD_METHOD").unwrap().text, "cdn");
    assert_eq!(saved.select_single("//Locale/Title").unwrap().text, "Setup");
}

#[test]
fn test_missing_locale_directory_fails_startup() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    let settings = manager.load_settings().unwrap();

    let mut engine = ConfigEngine::new(settings.clone()).with_locales(manager.locale_resources(&settings));
    let err = engine
        .startup(manager.startup_sources(None, None).unwrap())
        .unwrap_err();

    assert!(err.to_string().contains("en"));
}
