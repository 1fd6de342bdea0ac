use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{DoctorError, DoctorFilters};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::DoctorService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn public_listing_orders_newest_first_with_only_the_anon_key() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&id.to_string(), "Cardiology", "Lisbon")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::for_server(&server.uri()).to_app_config();
    let doctors = DoctorService::new(&config).list_doctors(None).await.unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].id, id);
    assert_eq!(doctors[0].full_name(), "Gregory House");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("apikey").unwrap(), "test-anon-key");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn filters_become_equality_conditions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("specialty", "eq.General Practice"))
        .and(query_param("city", "eq.Porto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "General Practice", "Porto")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::for_server(&server.uri()).to_app_config();
    let filters = DoctorFilters {
        specialty: Some("General Practice".to_string()),
        city: Some("Porto".to_string()),
    };
    let doctors = DoctorService::new(&config).filter_doctors(&filters, None).await.unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].city, "Porto");
}

#[tokio::test]
async fn missing_doctor_is_reported_as_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::for_server(&server.uri()).to_app_config();
    let err = DoctorService::new(&config)
        .get_doctor(Uuid::new_v4(), None)
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<DoctorError>(), Some(DoctorError::NotFound)));
}

#[tokio::test]
async fn filter_options_are_distinct_and_sorted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "Pediatrics", "Porto"),
            MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "Cardiology", "Lisbon"),
            MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "Cardiology", "Porto"),
        ])))
        .mount(&server)
        .await;

    let app = doctor_routes(TestConfig::for_server(&server.uri()).to_arc());
    let response = app
        .oneshot(Request::builder().uri("/filters").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["specialties"], json!(["Cardiology", "Pediatrics"]));
    assert_eq!(body["data"]["cities"], json!(["Lisbon", "Porto"]));
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn malformed_doctor_id_is_a_bad_request() {
    let server = MockServer::start().await;
    let app = doctor_routes(TestConfig::for_server(&server.uri()).to_arc());

    let response = app
        .oneshot(Request::builder().uri("/not-a-uuid").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_failure_surfaces_as_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let app = doctor_routes(TestConfig::for_server(&server.uri()).to_arc());
    let response = app
        .oneshot(Request::builder().uri("/?city=Lisbon").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}
