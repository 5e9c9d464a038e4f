use super::*;
use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use std::collections::HashMap;
use tokio::net::TcpListener;

const KEY: &str = "test-key";

fn feature(name: &str, description: Option<&str>, pos: &str) -> Value {
    json!({
        "response": {
            "GeoObjectCollection": {
                "featureMember": [{
                    "GeoObject": {
                        "name": name,
                        "description": description,
                        "Point": { "pos": pos }
                    }
                }]
            }
        }
    })
}

fn empty() -> Value {
    json!({ "response": { "GeoObjectCollection": { "featureMember": [] } } })
}

async fn geocode(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if params.get("apikey").map(String::as_str) != Some(KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Invalid api key" })),
        );
    }
    assert_eq!(params.get("format").map(String::as_str), Some("json"));
    assert_eq!(params.get("lang").map(String::as_str), Some(DEFAULT_LANG));

    let query = params.get("geocode").cloned().unwrap_or_default();
    let body = match query.as_str() {
        "Chilonzor 5" => feature("Chilonzor", Some("Toshkent, O'zbekiston"), "69.2034 41.2856"),
        "69.2401,41.2995" => feature("Amir Temur ko'chasi", Some("Toshkent"), "69.2401 41.2995"),
        _ => empty(),
    };
    (StatusCode::OK, Json(body))
}

async fn spawn_geocoder() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/1.x/", get(geocode));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/1.x/")
}

fn map_for(endpoint: &str, key: &str) -> MapView {
    let geocoder = YandexGeocoder::new(endpoint, Some(key), DEFAULT_LANG).expect("geocoder");
    MapView::new(Arc::new(geocoder))
}

#[test]
fn missing_api_key_is_a_configuration_error() {
    for key in [None, Some(""), Some("   ")] {
        let err = YandexGeocoder::new(DEFAULT_GEOCODER_URL, key, DEFAULT_LANG)
            .err()
            .expect("rejected");
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}

#[test]
fn position_is_longitude_first() {
    assert_eq!(
        parse_pos("69.2401 41.2995"),
        Some(Coordinates::new(41.2995, 69.2401))
    );
    assert_eq!(parse_pos("69.2401"), None);
    assert_eq!(parse_pos("east north"), None);
}

#[tokio::test]
async fn locate_reads_the_first_feature() {
    let endpoint = spawn_geocoder().await;
    let geocoder = YandexGeocoder::new(&endpoint, Some(KEY), DEFAULT_LANG).expect("geocoder");

    let place = geocoder
        .locate("  Chilonzor 5 ")
        .await
        .expect("lookup")
        .expect("found");

    assert_eq!(place.coordinates, Coordinates::new(41.2856, 69.2034));
    assert_eq!(place.label(), "Chilonzor, Toshkent, O'zbekiston");
    assert_eq!(geocoder.locate("Atlantis").await.expect("lookup"), None);
}

#[tokio::test]
async fn map_defaults_to_tashkent() {
    let map = map_for(DEFAULT_GEOCODER_URL, KEY);
    assert_eq!(map.center(), TASHKENT);
    assert_eq!(map.marker(), None);
    assert_eq!(map.label(), None);
}

#[tokio::test]
async fn address_centres_the_map_on_the_match() {
    let endpoint = spawn_geocoder().await;
    let mut map = map_for(&endpoint, KEY);

    let label = map.show_address("Chilonzor 5", "Markaziy").await.clone();

    assert_eq!(label, MapLabel::Place("Chilonzor".into()));
    assert_eq!(map.center(), Coordinates::new(41.2856, 69.2034));
    assert_eq!(map.marker(), Some(map.center()));
}

#[tokio::test]
async fn unknown_address_falls_back_to_the_library_name() {
    let endpoint = spawn_geocoder().await;
    let mut map = map_for(&endpoint, KEY);

    let label = map.show_address("Atlantis", "Markaziy").await.clone();

    assert_eq!(label, MapLabel::Place("Markaziy".into()));
    assert_eq!(map.center(), TASHKENT);
    assert_eq!(map.marker(), Some(TASHKENT));
}

#[tokio::test]
async fn click_names_the_point_or_shows_placeholders() {
    let endpoint = spawn_geocoder().await;
    let mut map = map_for(&endpoint, KEY);

    let found = map.click(TASHKENT).await.to_string();
    assert_eq!(found, "Amir Temur ko'chasi, Toshkent");
    assert_eq!(map.marker(), Some(TASHKENT));

    let nowhere = Coordinates::new(0.0, 0.0);
    assert_eq!(map.click(nowhere).await, &MapLabel::NotFound);
    assert_eq!(map.center(), nowhere);

    let mut rejected = map_for(&endpoint, "wrong-key");
    assert_eq!(rejected.click(TASHKENT).await, &MapLabel::Failed);
}

#[tokio::test]
async fn rejected_key_surfaces_the_server_message() {
    let endpoint = spawn_geocoder().await;
    let geocoder = YandexGeocoder::new(&endpoint, Some("wrong-key"), DEFAULT_LANG).expect("geocoder");

    let err = geocoder.locate("Chilonzor 5").await.expect_err("forbidden");

    assert!(matches!(err, ClientError::ServerRejected { status: 403, .. }));
    assert_eq!(err.to_string(), "Invalid api key");
}
