use reqwest::header::AUTHORIZATION;
use serde_json::Map;

#[test]
fn builds_bearer_auth_header() {
	let headers = glance_providers::auth_headers(Some("secret"), &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");
	assert_eq!(value, "Bearer secret");
}

#[test]
fn keyless_providers_get_no_auth_header() {
	let headers =
		glance_providers::auth_headers(None, &Map::new()).expect("Failed to build headers.");
	assert!(headers.get(AUTHORIZATION).is_none());
}

#[test]
fn default_headers_must_be_strings() {
	let mut extra = Map::new();
	extra.insert("x-region".to_string(), serde_json::json!(42));
	assert!(glance_providers::auth_headers(Some("secret"), &extra).is_err());
}
