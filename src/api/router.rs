//! Clinic API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the clinic API router.
///
/// Every route except `GET /api/health` requires a staff bearer token.
/// When `cors_origin` is set, browser requests from that origin are allowed.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn clinic_api_router(core: Arc<CoreState>, cors_origin: Option<&str>) -> Router {
    let router = build_router(ApiContext::new(core));
    match cors_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Some(Err(e)) => {
            tracing::warn!("Ignoring invalid CORS origin: {e}");
            router
        }
        None => router,
    }
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Rate limit → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        // Staff tokens
        .route("/auth/tokens", post(endpoints::auth::issue))
        .route("/auth/tokens/:id/revoke", post(endpoints::auth::revoke))
        // Patients
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route("/patients/:id", get(endpoints::patients::detail))
        .route(
            "/patients/:id/risk-score",
            put(endpoints::patients::update_risk_score),
        )
        .route(
            "/patients/:id/addresses",
            get(endpoints::patients::addresses).post(endpoints::patients::add_address),
        )
        // Insurance
        .route(
            "/insurance/policies",
            get(endpoints::insurance::policies).post(endpoints::insurance::create_policy),
        )
        .route(
            "/insurance/eligibility",
            get(endpoints::insurance::history).post(endpoints::insurance::check),
        )
        // Dual-eligible claims
        .route(
            "/dual-eligible/claims",
            get(endpoints::dual_eligible::list).post(endpoints::dual_eligible::create),
        )
        .route(
            "/dual-eligible/claims/:id/medicare",
            post(endpoints::dual_eligible::record_medicare),
        )
        .route(
            "/dual-eligible/claims/:id/medicaid-submit",
            post(endpoints::dual_eligible::submit_medicaid),
        )
        .route(
            "/dual-eligible/claims/:id/medicaid",
            post(endpoints::dual_eligible::record_medicaid),
        )
        .route(
            "/dual-eligible/claims/:id/deny",
            post(endpoints::dual_eligible::deny),
        )
        // OTP billing
        .route(
            "/otp-billing/services",
            get(endpoints::otp_billing::services).post(endpoints::otp_billing::record_service),
        )
        .route(
            "/otp-billing/claims",
            get(endpoints::otp_billing::claims).post(endpoints::otp_billing::create_claim),
        )
        .route(
            "/otp-billing/claims/:id",
            get(endpoints::otp_billing::claim_detail),
        )
        .route(
            "/otp-billing/claims/:id/status",
            put(endpoints::otp_billing::update_claim_status),
        )
        // Take-home dosing
        .route(
            "/dosing/kits",
            get(endpoints::dosing::kits).post(endpoints::dosing::prepare),
        )
        .route("/dosing/kits/:id/dispense", post(endpoints::dosing::dispense))
        .route("/dosing/kits/:id/return", post(endpoints::dosing::return_kit))
        .route("/dosing/kits/:id/lost", post(endpoints::dosing::report_lost))
        .route("/dosing/kits/:id/log", get(endpoints::dosing::kit_log))
        .route(
            "/dosing/alerts",
            get(endpoints::dosing::alerts).post(endpoints::dosing::create_alert),
        )
        .route(
            "/dosing/alerts/:id/acknowledge",
            post(endpoints::dosing::acknowledge_alert),
        )
        .route(
            "/dosing/alerts/:id/resolve",
            post(endpoints::dosing::resolve_alert),
        )
        .route(
            "/dosing/location-exceptions",
            get(endpoints::dosing::location_exceptions)
                .post(endpoints::dosing::create_location_exception),
        )
        // Diversion control
        .route(
            "/diversion/enrollments",
            get(endpoints::diversion::enrollments).post(endpoints::diversion::enroll),
        )
        .route("/diversion/verify", post(endpoints::diversion::verify))
        .route(
            "/diversion/verifications",
            get(endpoints::diversion::verifications),
        )
        // Facility safety
        .route(
            "/facility/facilities",
            get(endpoints::facility::facilities).post(endpoints::facility::create_facility),
        )
        .route(
            "/facility/checks",
            get(endpoints::facility::checks).post(endpoints::facility::create_check),
        )
        .route(
            "/facility/checks/:id/inspections",
            get(endpoints::facility::inspections).post(endpoints::facility::record_inspection),
        )
        .route("/facility/summary", get(endpoints::facility::summary))
        // IT support
        .route(
            "/support/tickets",
            get(endpoints::support::tickets).post(endpoints::support::create_ticket),
        )
        .route("/support/tickets/:id", get(endpoints::support::ticket_detail))
        .route(
            "/support/tickets/:id/status",
            put(endpoints::support::update_status),
        )
        .route("/support/tickets/:id/assign", put(endpoints::support::assign))
        .route(
            "/support/tickets/:id/sessions",
            get(endpoints::support::sessions).post(endpoints::support::start_session),
        )
        .route(
            "/support/sessions/:id/end",
            post(endpoints::support::end_session),
        )
        // Vaccinations
        .route(
            "/vaccinations/inventory",
            get(endpoints::vaccinations::inventory).post(endpoints::vaccinations::add_lot),
        )
        .route(
            "/vaccinations/records",
            get(endpoints::vaccinations::records).post(endpoints::vaccinations::administer),
        )
        // Labs
        .route(
            "/lab/orders",
            get(endpoints::labs::orders).post(endpoints::labs::create_order),
        )
        .route("/lab/orders/:id", get(endpoints::labs::order_detail))
        .route("/lab/orders/:id/status", put(endpoints::labs::update_status))
        .route(
            "/lab/orders/:id/results",
            post(endpoints::labs::record_results),
        )
        .route("/lab/results", get(endpoints::labs::results))
        // Prior authorization
        .route(
            "/prior-auth",
            get(endpoints::prior_auth::list).post(endpoints::prior_auth::create),
        )
        .route("/prior-auth/expiring", get(endpoints::prior_auth::expiring))
        .route(
            "/prior-auth/:id/status",
            put(endpoints::prior_auth::update_status),
        )
        // PMP
        .route(
            "/pmp/checks",
            get(endpoints::pmp::checks).post(endpoints::pmp::record_check),
        )
        .route("/pmp/overdue", get(endpoints::pmp::overdue))
        // Health-equity research
        .route(
            "/research/health-equity",
            get(endpoints::equity::report).post(endpoints::equity::snapshot),
        )
        .route(
            "/research/health-equity/metrics",
            get(endpoints::equity::metrics).post(endpoints::equity::upsert_metric),
        )
        .route(
            "/research/health-equity/observations",
            post(endpoints::equity::add_observation),
        )
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (rate-limited only, no auth required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::endpoints::auth::seed_bootstrap_token;
    use crate::api::types::generate_token;
    use crate::diversion::DiversionSettings;

    /// Router over a migrated temp database with a seeded admin token.
    /// The tempdir guard must be kept alive for the duration of the test.
    fn test_app() -> (Router, Arc<CoreState>, String, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("clinicops.db");
        let conn = crate::db::open_database(&db_path).unwrap();
        let admin = generate_token();
        seed_bootstrap_token(&conn, &admin).unwrap();
        drop(conn);

        let core = Arc::new(CoreState::new(db_path, DiversionSettings::default()));
        let app = clinic_api_router(core.clone(), None);
        (app, core, admin, tmp)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Send one request and return status plus decoded JSON (Null when empty).
    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_patient(app: &Router, token: &str, mrn: &str) -> String {
        let (status, json) = call(
            app,
            request(
                "POST",
                "/api/patients",
                Some(token),
                Some(json!({
                    "mrn": mrn,
                    "first_name": "Dana",
                    "last_name": "Reyes",
                    "date_of_birth": "1985-03-14",
                    "sex": "F",
                    "program": "otp",
                    "diversion_risk_score": 40
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (app, _core, _admin, _tmp) = test_app();

        let response = app
            .oneshot(request("GET", "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
        assert!(!json["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let (app, _core, _admin, _tmp) = test_app();

        let response = app
            .clone()
            .oneshot(request("GET", "/api/patients", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = call(&app, request("GET", "/api/patients", Some("not-a-token"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_response_is_not_cached() {
        let (app, _core, admin, _tmp) = test_app();

        let response = app
            .oneshot(request("GET", "/api/patients", Some(&admin), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (app, _core, admin, _tmp) = test_app();
        let (status, _) = call(&app, request("GET", "/api/nonexistent", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_path_id_is_400() {
        let (app, _core, admin, _tmp) = test_app();
        let (status, json) = call(&app, request("GET", "/api/patients/not-a-uuid", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn patient_create_list_and_duplicate_mrn() {
        let (app, _core, admin, _tmp) = test_app();
        let id = create_patient(&app, &admin, "OTP-1001").await;

        let (status, list) = call(&app, request("GET", "/api/patients?search=reyes", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], id.as_str());

        let (status, _) = call(
            &app,
            request(
                "POST",
                "/api/patients",
                Some(&admin),
                Some(json!({
                    "mrn": "OTP-1001",
                    "first_name": "Other",
                    "last_name": "Person",
                    "date_of_birth": "1990-01-01",
                    "sex": "M",
                    "program": "otp"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn blank_required_field_is_400() {
        let (app, _core, admin, _tmp) = test_app();
        let (status, json) = call(
            &app,
            request(
                "POST",
                "/api/support/tickets",
                Some(&admin),
                Some(json!({
                    "title": "  ",
                    "description": "Printer offline",
                    "category": "hardware",
                    "priority": "low"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    }

    #[tokio::test]
    async fn only_admin_issues_tokens() {
        let (app, _core, admin, _tmp) = test_app();

        let (status, issued) = call(
            &app,
            request(
                "POST",
                "/api/auth/tokens",
                Some(&admin),
                Some(json!({ "staff_name": "rn.lee", "role": "clinician" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let clinician = issued["token"].as_str().unwrap().to_string();
        assert_eq!(clinician.len(), 43);

        // Clinician can read but not issue
        let (status, _) = call(&app, request("GET", "/api/patients", Some(&clinician), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            request(
                "POST",
                "/api/auth/tokens",
                Some(&clinician),
                Some(json!({ "staff_name": "x", "role": "admin" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Revoked token stops working
        let uri = format!("/api/auth/tokens/{}/revoke", issued["id"].as_str().unwrap());
        let (status, _) = call(&app, request("POST", &uri, Some(&admin), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, request("GET", "/api/patients", Some(&clinician), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dual_claim_requires_eligibility_and_order() {
        let (app, _core, admin, _tmp) = test_app();
        let patient = create_patient(&app, &admin, "OTP-2001").await;

        let claim_body = json!({
            "patient_id": patient,
            "service_date": "2024-03-04",
            "service_code": "H0020",
            "billed_cents": 15000
        });
        let (status, _) = call(
            &app,
            request("POST", "/api/dual-eligible/claims", Some(&admin), Some(claim_body.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        for (payer_type, priority, member_id) in [
            ("medicare", "primary", "1EG4-TE5-MK72"),
            ("medicaid", "secondary", "MCD-5567"),
        ] {
            let (status, json) = call(
                &app,
                request(
                    "POST",
                    "/api/insurance/policies",
                    Some(&admin),
                    Some(json!({
                        "patient_id": patient,
                        "payer_name": format!("{payer_type} plan"),
                        "payer_type": payer_type,
                        "member_id": member_id,
                        "coverage_priority": priority,
                        "effective_date": "2024-01-01"
                    })),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED, "{json}");
        }

        let (status, claim) = call(
            &app,
            request("POST", "/api/dual-eligible/claims", Some(&admin), Some(claim_body)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(claim["status"], "pending_medicare");
        let claim_id = claim["id"].as_str().unwrap();

        // Medicaid cannot pay before Medicare adjudicates
        let (status, _) = call(
            &app,
            request(
                "POST",
                &format!("/api/dual-eligible/claims/{claim_id}/medicaid"),
                Some(&admin),
                Some(json!({ "paid_cents": 1000 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, claim) = call(
            &app,
            request(
                "POST",
                &format!("/api/dual-eligible/claims/{claim_id}/medicare"),
                Some(&admin),
                Some(json!({ "allowed_cents": 12000, "paid_cents": 9600 })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(claim["status"], "medicare_adjudicated");
    }

    #[tokio::test]
    async fn lost_kit_opens_alert() {
        let (app, _core, admin, _tmp) = test_app();
        let patient = create_patient(&app, &admin, "OTP-3001").await;

        let (status, kit) = call(
            &app,
            request(
                "POST",
                "/api/dosing/kits",
                Some(&admin),
                Some(json!({
                    "kit_number": "TH-0001",
                    "patient_id": patient,
                    "medication": "methadone",
                    "dose_mg": 80.0,
                    "doses_count": 6
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{kit}");
        let kit_id = kit["id"].as_str().unwrap();

        let (status, _) = call(
            &app,
            request("POST", &format!("/api/dosing/kits/{kit_id}/dispense"), Some(&admin), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, kit) = call(
            &app,
            request(
                "POST",
                &format!("/api/dosing/kits/{kit_id}/lost"),
                Some(&admin),
                Some(json!({ "notes": "Patient reports bag stolen" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(kit["status"], "lost");

        // Lost kits cannot come back
        let (status, _) = call(
            &app,
            request("POST", &format!("/api/dosing/kits/{kit_id}/return"), Some(&admin), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, alerts) = call(
            &app,
            request("GET", &format!("/api/dosing/alerts?patient_id={patient}"), Some(&admin), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let alerts = alerts.as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["alert_type"], "lost_kit");

        let (_, log) = call(
            &app,
            request("GET", &format!("/api/dosing/kits/{kit_id}/log"), Some(&admin), None),
        )
        .await;
        assert_eq!(log.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn verification_outside_geofence_raises_alert() {
        let (app, _core, admin, _tmp) = test_app();
        let patient = create_patient(&app, &admin, "OTP-4001").await;

        let (status, json) = call(
            &app,
            request(
                "POST",
                &format!("/api/patients/{patient}/addresses"),
                Some(&admin),
                Some(json!({
                    "address_type": "home",
                    "line1": "12 Elm St",
                    "city": "Springfield",
                    "state": "IL",
                    "postal_code": "62701",
                    "latitude": 39.7817,
                    "longitude": -89.6501,
                    "is_primary": true
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");

        let (status, _) = call(
            &app,
            request(
                "POST",
                "/api/diversion/enrollments",
                Some(&admin),
                Some(json!({
                    "patient_id": patient,
                    "biometric_type": "face",
                    "template": "dGVtcGxhdGUtYnl0ZXM="
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // Roughly 11 km north of home
        let (status, result) = call(
            &app,
            request(
                "POST",
                "/api/diversion/verify",
                Some(&admin),
                Some(json!({
                    "patient_id": patient,
                    "biometric_type": "face",
                    "match_score": 0.97,
                    "latitude": 39.8817,
                    "longitude": -89.6501
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(result["verification"]["outcome"], "outside_geofence");
        assert_eq!(result["alert"]["alert_type"], "geofence_violation");

        // At home passes
        let (_, result) = call(
            &app,
            request(
                "POST",
                "/api/diversion/verify",
                Some(&admin),
                Some(json!({
                    "patient_id": patient,
                    "biometric_type": "face",
                    "match_score": 0.97,
                    "latitude": 39.7817,
                    "longitude": -89.6501
                })),
            ),
        )
        .await;
        assert_eq!(result["verification"]["outcome"], "verified");
        assert!(result["alert"].is_null());
    }

    #[tokio::test]
    async fn equity_report_falls_back_to_snapshot() {
        let (app, core, admin, _tmp) = test_app();

        let (status, report) = call(&app, request("GET", "/api/research/health-equity", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["source"], "empty");

        let (status, _) = call(
            &app,
            request(
                "POST",
                "/api/research/health-equity/metrics",
                Some(&admin),
                Some(json!({
                    "metric_id": "retention_90d",
                    "metric_name": "90-day retention",
                    "benchmark_value": 0.7,
                    "equity_target": 0.05
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        for (group, value) in [("urban", 1.0), ("urban", 1.0), ("urban", 0.0), ("rural", 0.0)] {
            let (status, _) = call(
                &app,
                request(
                    "POST",
                    "/api/research/health-equity/observations",
                    Some(&admin),
                    Some(json!({
                        "metric_id": "retention_90d",
                        "stratification_type": "geography",
                        "group_name": group,
                        "value": value
                    })),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, report) = call(&app, request("POST", "/api/research/health-equity", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        let outcome = &report["outcomes"][0];
        assert_eq!(outcome["reference_group"], "urban");
        assert_eq!(outcome["groups"].as_array().unwrap().len(), 2);

        let (_, report) = call(&app, request("GET", "/api/research/health-equity", Some(&admin), None)).await;
        assert_eq!(report["source"], "calculated");

        // Without observations the stored snapshot is served
        let conn = core.open_db().unwrap();
        conn.execute("DELETE FROM outcome_observations", []).unwrap();
        drop(conn);
        let (_, report) = call(&app, request("GET", "/api/research/health-equity", Some(&admin), None)).await;
        assert_eq!(report["source"], "snapshot");
        assert_eq!(report["outcomes"][0]["metric_id"], "retention_90d");
    }

    #[tokio::test]
    async fn authenticated_requests_are_audited() {
        let (app, core, admin, _tmp) = test_app();
        call(&app, request("GET", "/api/patients", Some(&admin), None)).await;
        call(&app, request("GET", "/api/health", None, None)).await;

        let entries = core.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "GET /api/patients");
    }

    #[tokio::test]
    async fn pmp_overdue_days_are_bounded() {
        let (app, _core, admin, _tmp) = test_app();

        let (status, json) = call(&app, request("GET", "/api/pmp/overdue?days=9000000000000", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");

        let (status, _) = call(&app, request("GET", "/api/pmp/overdue?days=-1", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = call(&app, request("GET", "/api/pmp/overdue?days=30", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.is_array());
    }

    #[tokio::test]
    async fn inspection_interval_is_bounded() {
        let (app, _core, admin, _tmp) = test_app();

        let (status, facility) = call(
            &app,
            request(
                "POST",
                "/api/facility/facilities",
                Some(&admin),
                Some(json!({
                    "name": "Eastside Clinic",
                    "license_number": "OTP-NY-0042",
                    "address": "12 Harbor St"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{facility}");
        let facility_id = facility["id"].as_str().unwrap();

        let check_body = |frequency_days: i64| {
            json!({
                "facility_id": facility_id,
                "category": "fire_safety",
                "item_name": "Extinguisher, hall B",
                "frequency_days": frequency_days
            })
        };

        let (status, json) = call(
            &app,
            request("POST", "/api/facility/checks", Some(&admin), Some(check_body(5_000_000_000))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");

        let (status, check) = call(
            &app,
            request("POST", "/api/facility/checks", Some(&admin), Some(check_body(3650))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{check}");
        let check_id = check["id"].as_str().unwrap();

        let (status, json) = call(
            &app,
            request(
                "POST",
                &format!("/api/facility/checks/{check_id}/inspections"),
                Some(&admin),
                Some(json!({ "passed": true })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["status"], "compliant");
    }
}
