use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::BookingError;
use auth_cell::context::{AppContext, AuthEvent};
use auth_cell::models::{AuthUser, Session};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn session(user_id: Uuid) -> Session {
    Session::from_bearer("session-token", AuthUser {
        id: user_id,
        email: Some("ada@example.com".to_string()),
        role: Some("authenticated".to_string()),
        created_at: None,
    })
}

fn june_tenth() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
}

async fn mount_doctors(server: &MockServer, count: usize) {
    let doctors: Vec<_> = (0..count)
        .map(|_| MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "Cardiology", "Lisbon"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(doctors)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn booking_before_sign_in_is_not_authenticated_and_sends_nothing() {
    let server = MockServer::start().await;
    let context = AppContext::new(TestConfig::for_server(&server.uri()).to_arc());

    let result = context
        .book_appointment(Uuid::new_v4(), june_tenth(), NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        .await;

    assert_eq!(result, Err(BookingError::NotAuthenticated));
    assert_matches!(context.cancel_appointment(Uuid::new_v4()).await, Err(BookingError::NotAuthenticated));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn sign_in_loads_profile_and_doctors_and_sign_out_clears_them() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id.to_string(), &user_id.to_string(), None)
        ])))
        .mount(&server)
        .await;
    mount_doctors(&server, 3).await;

    let mut context = AppContext::new(TestConfig::for_server(&server.uri()).to_arc());
    context.handle_auth_event(AuthEvent::SignedIn(session(user_id))).await;

    assert_eq!(context.patient().map(|p| p.id), Some(patient_id));
    assert_eq!(context.doctors().len(), 3);
    assert!(context.snapshot().is_some());

    context.handle_auth_event(AuthEvent::SignedOut).await;

    assert!(context.session().is_none());
    assert!(context.patient().is_none());
    assert!(context.doctors().is_empty());
}

#[tokio::test]
async fn account_without_profile_cannot_book() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    mount_doctors(&server, 1).await;

    let mut context = AppContext::new(TestConfig::for_server(&server.uri()).to_arc());
    context.handle_auth_event(AuthEvent::SignedIn(session(Uuid::new_v4()))).await;
    let requests_after_sign_in = server.received_requests().await.unwrap().len();

    let result = context
        .book_appointment(Uuid::new_v4(), june_tenth(), NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        .await;

    assert!(context.session().is_some());
    assert_eq!(result, Err(BookingError::NotAuthenticated));
    assert_eq!(server.received_requests().await.unwrap().len(), requests_after_sign_in);
}

#[tokio::test]
async fn doctor_load_failure_leaves_an_empty_directory() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let mut context = AppContext::new(TestConfig::for_server(&server.uri()).to_arc());
    context.handle_auth_event(AuthEvent::SignedIn(session(Uuid::new_v4()))).await;

    assert!(context.session().is_some());
    assert!(context.doctors().is_empty());
}

#[tokio::test]
async fn slot_reads_go_through_the_signed_in_session() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    mount_doctors(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availabilities"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::slot_response(&Uuid::new_v4().to_string(), &doctor.to_string(), "2025-06-10", "09:00:00", false)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut context = AppContext::new(TestConfig::for_server(&server.uri()).to_arc());
    context.handle_auth_event(AuthEvent::SignedIn(session(Uuid::new_v4()))).await;

    let slots = context.fetch_available_slots(doctor, june_tenth()).await.unwrap();

    assert_eq!(slots.len(), 1);
    assert!(!slots[0].is_booked);
}
