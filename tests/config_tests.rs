//! Integration tests for configuration loading.

mod common;

use assert_fs::prelude::*;

use attachscope::config::load_config;

use common::with_level_counter;

#[test]
fn test_broken_config_file_warns_and_falls_back() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("attachscope.toml");
    file.write_str("[elasticsearch\nhost = ").unwrap();
    std::env::set_var("ATTACHSCOPE_CONFIG", file.path());

    let (config, counter) = with_level_counter(|| load_config(None));
    std::env::remove_var("ATTACHSCOPE_CONFIG");

    let config = config.unwrap();
    assert_eq!(config.elasticsearch.host, "elasticsearch");
    assert_eq!(counter.count(tracing::Level::WARN), 1);
}

#[test]
fn test_explicit_config_file_must_parse() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("broken.toml");
    file.write_str("not = [valid").unwrap();

    let (config, counter) = with_level_counter(|| load_config(Some(file.path())));

    assert!(config.is_err());
    assert_eq!(counter.count(tracing::Level::WARN), 0);
}
