use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    api::BOOKS_PATH,
    controller::DEFAULT_PAGE_SIZE,
    detail::LIBRARY_BOOKS_PAGE_SIZE,
    geocode::{DEFAULT_GEOCODER_URL, DEFAULT_LANG},
};

pub const DEFAULT_CONFIG_FILE: &str = "catalog.toml";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
const FALLBACK_DATABASE_URL: &str = "sqlite://./data/session.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub database_url: String,
    pub books_page_size: usize,
    pub library_books_page_size: usize,
    pub create_path: String,
    pub geocoder_url: String,
    pub geocoder_api_key: Option<String>,
    pub lang: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            database_url: default_database_url(),
            books_page_size: DEFAULT_PAGE_SIZE,
            library_books_page_size: LIBRARY_BOOKS_PAGE_SIZE,
            create_path: BOOKS_PATH.into(),
            geocoder_url: DEFAULT_GEOCODER_URL.into(),
            geocoder_api_key: None,
            lang: DEFAULT_LANG.into(),
        }
    }
}

/// Session database under the platform data directory, or `./data` without one.
pub fn default_database_url() -> String {
    dirs::data_local_dir()
        .map(|dir| {
            let path = dir.join("kutubxona").join("session.db");
            normalize_database_url(&path.to_string_lossy())
        })
        .unwrap_or_else(|| FALLBACK_DATABASE_URL.into())
}

/// Defaults, then the config file, then environment overrides.
///
/// A missing default `catalog.toml` is fine; a missing explicit `--config` file is not.
pub fn load_settings(config_path: Option<&Path>) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    let (path, explicit) = match config_path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => {
            apply_file(&mut settings, &raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            debug!(path = %path.display(), "config file applied");
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn file_value(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Integer(number) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_page_size(key: &str, raw: &str) -> Result<usize> {
    let size: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got '{raw}'"))?;
    anyhow::ensure!(size > 0, "{key} must be a positive integer, got '{raw}'");
    Ok(size)
}

/// Applies flat `key = value` pairs from a TOML document.
pub fn apply_file(settings: &mut ClientSettings, raw: &str) -> Result<()> {
    let table: toml::Table = toml::from_str(raw)?;
    let get = |key: &str| table.get(key).and_then(file_value);

    if let Some(v) = get("api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = get("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = get("books_page_size") {
        settings.books_page_size = parse_page_size("books_page_size", &v)?;
    }
    if let Some(v) = get("library_books_page_size") {
        settings.library_books_page_size = parse_page_size("library_books_page_size", &v)?;
    }
    if let Some(v) = get("create_path") {
        settings.create_path = v;
    }
    if let Some(v) = get("geocoder_url") {
        settings.geocoder_url = v;
    }
    if let Some(v) = get("geocoder_api_key") {
        settings.geocoder_api_key = Some(v);
    }
    if let Some(v) = get("lang") {
        settings.lang = v;
    }
    Ok(())
}

/// `APP__*` names win over their short aliases.
pub fn apply_env(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("CATALOG_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("YANDEX_API_KEY") {
        settings.geocoder_api_key = Some(v);
    }
    if let Some(v) = lookup("APP__GEOCODER_API_KEY") {
        settings.geocoder_api_key = Some(v);
    }

    if let Some(v) = lookup("APP__GEOCODER_URL") {
        settings.geocoder_url = v;
    }
    if let Some(v) = lookup("APP__BOOKS_PAGE_SIZE") {
        settings.books_page_size = parse_page_size("APP__BOOKS_PAGE_SIZE", &v)?;
    }
    if let Some(v) = lookup("APP__LIBRARY_BOOKS_PAGE_SIZE") {
        settings.library_books_page_size = parse_page_size("APP__LIBRARY_BOOKS_PAGE_SIZE", &v)?;
    }
    if let Some(v) = lookup("APP__CREATE_PATH") {
        settings.create_path = v;
    }
    if let Some(v) = lookup("APP__LANG") {
        settings.lang = v;
    }
    Ok(())
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return FALLBACK_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.replace('\\', "/");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
