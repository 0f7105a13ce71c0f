mod support;

use std::sync::Arc;

use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{App, test};
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use hrm_ledger::api::AppState;
use hrm_ledger::auth::jwt::Claims;
use hrm_ledger::config::Config;
use hrm_ledger::model::role::Role;
use hrm_ledger::routes;
use hrm_ledger::store::{HrStore, MemoryStore};

use support::{MutableClock, at, user};

const SECRET: &str = "integration-secret";
const ADMIN: u64 = 100;

fn config() -> Config {
    Config {
        database_url: "mysql://unused".to_string(),
        jwt_secret: SECRET.to_string(),
        server_addr: "127.0.0.1:0".to_string(),
        api_prefix: "/api".to_string(),
        rate_protected_per_min: 1000,
        payroll_concurrency: 2,
        db_max_connections: 1,
        log_dir: "logs".to_string(),
        log_level: tracing::Level::INFO,
    }
}

fn bearer(user_id: u64, role: Role) -> (&'static str, String) {
    let claims = Claims {
        user_id,
        sub: format!("user{user_id}@hrms.test"),
        role: role.id(),
        exp: 4_102_444_800,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.upsert_user(user(ADMIN, Role::Admin, "Management", dec!(90000), 20)).unwrap();
    store.upsert_user(user(1, Role::Employee, "Engineering", dec!(60000), 5)).unwrap();
    store.upsert_user(user(2, Role::Employee, "Finance", dec!(50000), 5)).unwrap();
    store
}

fn state(store: Arc<MemoryStore>) -> AppState {
    let clock = Arc::new(MutableClock::new(at(2024, 1, 15, 9, 0)));
    AppState::new(store, clock, 2)
}

macro_rules! app {
    ($store:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::new(state($store)))
                .app_data(Data::new(config()))
                .service(routes::api_scope("/api")),
        )
        .await
    };
}

async fn body_of(resp: ServiceResponse) -> Value {
    test::read_body_json(resp).await
}

#[actix_web::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = app!(seeded_store());

    let req = test::TestRequest::post().uri("/api/attendance/check-in").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_of(resp).await["code"], "unauthorized");

    let req = test::TestRequest::get()
        .uri("/api/leaves")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn check_in_twice_conflicts() {
    let app = app!(seeded_store());

    let req = test::TestRequest::post()
        .uri("/api/attendance/check-in")
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let record = body_of(resp).await;
    assert_eq!(record["userId"], 1);
    assert_eq!(record["date"], "2024-01-15");

    let req = test::TestRequest::post()
        .uri("/api/attendance/check-in")
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let error = body_of(resp).await;
    assert_eq!(error["code"], "conflict");
    assert_eq!(error["message"], "Already checked in for today");

    let req = test::TestRequest::post()
        .uri("/api/attendance/check-out")
        .insert_header(bearer(1, Role::Employee))
        .set_json(json!({ "checkOut": "2024-01-15T17:30:00Z" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_of(resp).await["status"], "PRESENT");
}

#[actix_web::test]
async fn admin_only_routes_reject_employees() {
    let app = app!(seeded_store());

    for (method, uri) in [
        ("GET", "/api/attendance/all"),
        ("GET", "/api/attendance/employee/2/summary/1/2024"),
        ("GET", "/api/salary/summary"),
    ] {
        let req = test::TestRequest::default()
            .method(method.parse().unwrap())
            .uri(uri)
            .insert_header(bearer(1, Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body_of(resp).await["code"], "forbidden");
    }

    let req = test::TestRequest::get()
        .uri("/api/attendance/all")
        .insert_header(bearer(ADMIN, Role::Admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn leave_flow_over_http() {
    let store = seeded_store();
    let app = app!(store.clone());

    let req = test::TestRequest::post()
        .uri("/api/leaves")
        .insert_header(bearer(1, Role::Employee))
        .set_json(json!({
            "fromDate": "2024-01-22",
            "toDate": "2024-01-24",
            "reason": "Family wedding out of town"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let leave = body_of(resp).await;
    assert_eq!(leave["totalDays"], 3);
    assert_eq!(leave["status"], "PENDING");
    let leave_id = leave["id"].as_u64().unwrap();

    // Another employee cannot read it.
    let req = test::TestRequest::get()
        .uri(&format!("/api/leaves/{leave_id}"))
        .insert_header(bearer(2, Role::Employee))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    // Employees cannot decide.
    let req = test::TestRequest::patch()
        .uri(&format!("/api/leaves/{leave_id}/approve"))
        .insert_header(bearer(1, Role::Employee))
        .set_json(json!({ "status": "APPROVED" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/leaves/{leave_id}/approve"))
        .insert_header(bearer(ADMIN, Role::Admin))
        .set_json(json!({ "status": "APPROVED" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let approved = body_of(resp).await;
    assert_eq!(approved["status"], "APPROVED");
    assert_eq!(approved["approvedBy"], ADMIN);

    let req = test::TestRequest::get()
        .uri("/api/leaves/balance")
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let balance = body_of(resp).await;
    assert_eq!(balance["currentBalance"], 2);
    assert_eq!(balance["statistics"]["approvedLeaves"], 1);
    assert_eq!(store.find_user(1).await.unwrap().unwrap().leave_balance, 2);

    // Approved requests can no longer be cancelled.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/leaves/{leave_id}"))
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn employee_listing_is_scoped_to_self() {
    let app = app!(seeded_store());
    for employee in [1, 2] {
        let req = test::TestRequest::post()
            .uri("/api/leaves")
            .insert_header(bearer(employee, Role::Employee))
            .set_json(json!({
                "fromDate": "2024-02-01",
                "toDate": "2024-02-02",
                "reason": "Visiting relatives abroad"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    // userId is ignored for employees.
    let req = test::TestRequest::get()
        .uri("/api/leaves?userId=2")
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    let page = body_of(test::call_service(&app, req).await).await;
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["userId"], 1);

    let req = test::TestRequest::get()
        .uri("/api/leaves?department=fin")
        .insert_header(bearer(ADMIN, Role::Admin))
        .to_request();
    let page = body_of(test::call_service(&app, req).await).await;
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["userId"], 2);
}

#[actix_web::test]
async fn malformed_input_is_a_validation_error() {
    let app = app!(seeded_store());

    let req = test::TestRequest::get()
        .uri("/api/attendance/history?limit=0")
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(resp).await["code"], "validation");

    let req = test::TestRequest::post()
        .uri("/api/salary/calculate/1")
        .insert_header(bearer(ADMIN, Role::Admin))
        .set_json(json!({ "month": "2024-13", "year": 2024 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/leaves")
        .insert_header(bearer(1, Role::Employee))
        .set_json(json!({ "fromDate": "not a date", "toDate": "2024-01-24", "reason": "Family wedding" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(resp).await["code"], "validation");

    let req = test::TestRequest::get()
        .uri("/api/salary/not-a-number")
        .insert_header(bearer(ADMIN, Role::Admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn payroll_endpoints() {
    let app = app!(seeded_store());

    let req = test::TestRequest::post()
        .uri("/api/salary/calculate-bulk")
        .insert_header(bearer(ADMIN, Role::Admin))
        .set_json(json!({ "month": "2024-01", "year": 2024 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_of(resp).await;
    assert_eq!(report["totalUsers"], 3);
    assert_eq!(report["successful"], 3);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["results"][0]["userId"], 1);
    assert_eq!(report["results"][2]["userId"], ADMIN);

    let req = test::TestRequest::get()
        .uri("/api/salary/my-history")
        .insert_header(bearer(1, Role::Employee))
        .to_request();
    let history = body_of(test::call_service(&app, req).await).await;
    assert_eq!(history["pagination"]["total"], 1);
    let salary_id = history["data"][0]["id"].as_u64().unwrap();
    assert_eq!(history["data"][0]["month"], "2024-01");

    let req = test::TestRequest::get()
        .uri(&format!("/api/salary/{salary_id}"))
        .insert_header(bearer(2, Role::Employee))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/salary/summary?month=2024-01&year=2024")
        .insert_header(bearer(ADMIN, Role::Admin))
        .to_request();
    let summary = body_of(test::call_service(&app, req).await).await;
    assert_eq!(summary["totalRecords"], 3);
    assert_eq!(summary["departmentBreakdown"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/salary/999")
        .insert_header(bearer(ADMIN, Role::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_of(resp).await["code"], "not_found");
}
