//! Locale availability checks driven through the public API.

use newsandmedia_images::config::load_config;
use newsandmedia_images::locale::{
    LocaleAvailabilityChecker, LocaleError, LocaleProbe, StaticLocaleProbe, SystemLocaleProbe,
};
use std::error::Error;
use tempfile::TempDir;

fn host_with(installed: &[&str]) -> LocaleAvailabilityChecker<StaticLocaleProbe> {
    LocaleAvailabilityChecker::new(StaticLocaleProbe::new(installed))
}

#[test]
fn both_missing_locales_in_one_error() {
    let err = host_with(&["C.utf8", "en_US.utf8"])
        .check_all(["xx_XX", "yy_YY"])
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("\"xx_XX\""), "{message}");
    assert!(message.contains("\"yy_YY\""), "{message}");
    assert_eq!(
        err.source().map(|s| s.to_string()),
        Some("locale \"xx_XX\" is not installed".to_string())
    );
}

#[test]
fn all_present_locales_pass() {
    let checker = host_with(&["en_US.utf8", "cs_CZ.utf8", "sk_SK.utf8", "de_DE@euro"]);
    assert!(
        checker
            .check_all(["en_US.UTF-8", "cs_CZ.UTF-8", "sk_SK", "de_DE@euro"])
            .is_ok()
    );
}

#[test]
fn required_locales_come_from_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("config.toml"),
        r#"
[locales]
required = ["en_US.UTF-8", "cs_CZ.UTF-8", "sk_SK.UTF-8"]
documentation_url = "https://intranet.example.test/locales"
"#,
    )
    .unwrap();
    let config = load_config(tmp.path()).unwrap();

    let err = host_with(&["en_US.utf8"])
        .with_documentation_url(config.locales.documentation_url.clone())
        .check_all(&config.locales.required)
        .unwrap_err();

    assert_eq!(err.locales, vec!["cs_CZ.UTF-8", "sk_SK.UTF-8"]);
    assert!(
        err.to_string()
            .ends_with("see https://intranet.example.test/locales")
    );
}

#[test]
fn system_probe_never_finds_a_made_up_locale() {
    let probe = SystemLocaleProbe::new();
    match probe.probe("xx_XX") {
        Err(LocaleError::NotInstalled(name)) => assert_eq!(name, "xx_XX"),
        // Hosts without the `locale` binary
        Err(LocaleError::ListUnavailable(_)) => {}
        other => panic!("unexpected probe result: {other:?}"),
    }
}
