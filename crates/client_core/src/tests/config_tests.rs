use super::*;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_match_the_catalog_layout() {
    let settings = ClientSettings::default();
    assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(settings.books_page_size, 12);
    assert_eq!(settings.library_books_page_size, 10);
    assert_eq!(settings.create_path, "/books/books/");
    assert_eq!(settings.lang, "uz_UZ");
    assert_eq!(settings.geocoder_api_key, None);
    assert!(settings.database_url.starts_with("sqlite:"));
}

#[test]
fn file_values_override_defaults() {
    let mut settings = ClientSettings::default();
    apply_file(
        &mut settings,
        r#"
api_base_url = "https://kutubxona.example/api/v1"
create_path = "/books/add-books/"
books_page_size = 20
library_books_page_size = "5"
geocoder_api_key = "from-file"
"#,
    )
    .expect("apply file");

    assert_eq!(settings.api_base_url, "https://kutubxona.example/api/v1");
    assert_eq!(settings.create_path, "/books/add-books/");
    assert_eq!(settings.books_page_size, 20);
    assert_eq!(settings.library_books_page_size, 5);
    assert_eq!(settings.geocoder_api_key.as_deref(), Some("from-file"));
}

#[test]
fn prefixed_env_wins_over_alias() {
    let mut settings = ClientSettings::default();
    apply_env(
        &mut settings,
        env(&[
            ("CATALOG_API_URL", "http://alias/api/v1"),
            ("APP__API_BASE_URL", "http://prefixed/api/v1"),
            ("YANDEX_API_KEY", "yandex"),
            ("APP__BOOKS_PAGE_SIZE", "8"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]),
    )
    .expect("apply env");

    assert_eq!(settings.api_base_url, "http://prefixed/api/v1");
    assert_eq!(settings.geocoder_api_key.as_deref(), Some("yandex"));
    assert_eq!(settings.books_page_size, 8);
    assert_eq!(settings.database_url, "sqlite::memory:");
}

#[test]
fn invalid_page_size_is_rejected() {
    let mut settings = ClientSettings::default();
    let err = apply_env(&mut settings, env(&[("APP__BOOKS_PAGE_SIZE", "0")]))
        .expect_err("zero");
    assert!(err.to_string().contains("APP__BOOKS_PAGE_SIZE"));

    let err = apply_file(&mut settings, "books_page_size = \"many\"").expect_err("text");
    assert!(err.to_string().contains("books_page_size"));
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\session.db"),
        "sqlite://C:/Users/alice/session.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), FALLBACK_DATABASE_URL);
}

#[test]
fn explicit_config_file_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let err = load_settings(Some(&missing)).expect_err("missing file");
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn explicit_config_file_is_applied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("catalog.toml");
    std::fs::write(&path, "lang = \"ru_RU\"\n").expect("write config");

    let settings = load_settings(Some(&path)).expect("load");
    assert_eq!(settings.lang, "ru_RU");
}
