mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{booking, day_at, slot, test_config, FakeIdentity, FakePlatform, ADMIN_TOKEN, PHONE};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use salon_booking::domain::model::BookingStatus;
use salon_booking::web::{self, session::SESSION_COOKIE, AppState};
use serde_json::Value;
use tokio::net::TcpListener;

async fn spawn_app(platform: FakePlatform) -> Result<(String, Arc<FakePlatform>)> {
    let platform = Arc::new(platform);
    let config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    let state = AppState::with_providers(config, platform.clone(), Arc::new(FakeIdentity));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(web::serve_on(listener, state));

    Ok((format!("http://{}", address), platform))
}

fn client() -> Client {
    Client::builder().redirect(Policy::none()).build().unwrap()
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(SESSION_COOKIE))
        .map(str::to_string)
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;

    let response = client().get(format!("{}/health", base)).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "ok");
    Ok(())
}

#[tokio::test]
async fn test_catalog_endpoints() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;
    let client = client();

    let services: Value = client
        .get(format!("{}/api/services", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(services["success"], true);
    assert_eq!(services["services"].as_array().map(Vec::len), Some(2));

    let staff: Value = client
        .get(format!("{}/api/staff", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(staff["staff"][0]["display_name"], "Alex");
    Ok(())
}

#[tokio::test]
async fn test_full_booking_flow() -> Result<()> {
    let (base, platform) = spawn_app(FakePlatform::offering(vec![slot(
        day_at(10, 0),
        &[("T1", "CUT", 30)],
    )]))
    .await?;
    let client = client();

    // 1. 登入
    let response = client
        .post(format!("{}/auth/session", base))
        .json(&serde_json::json!({ "id_token": "good-token" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = session_cookie(&response).expect("session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap_or_default().to_string();
    let body: Value = response.json().await?;
    assert_eq!(body["phone_number"], PHONE);

    // 2. 選擇服務與員工
    let response = client
        .post(format!("{}/booking/services", base))
        .header(COOKIE, &cookie)
        .form(&[("service", "CUT"), ("qty_CUT", "1")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/booking/staff");

    let response = client
        .post(format!("{}/booking/staff", base))
        .header(COOKIE, &cookie)
        .form(&[("staff", "T1")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/booking/time");

    let selection: Value = client
        .get(format!("{}/booking/selection", base))
        .header(COOKIE, &cookie)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(selection["authenticated"], true);
    assert_eq!(selection["services"][0]["variation_id"], "CUT");
    assert_eq!(selection["staff"]["team_member_id"], "T1");

    // 3. 查詢時段
    let availability: Value = client
        .get(format!("{}/api/availability?start=2040-05-01&days=1", base))
        .header(COOKIE, &cookie)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(availability["success"], true);
    assert_eq!(availability["required_minutes"], 30);
    assert_eq!(availability["slots"][0]["start_at"], "2040-05-01T10:00:00Z");

    // 4. 確認預約
    let response = client
        .post(format!("{}/booking/confirm", base))
        .header(COOKIE, &cookie)
        .json(&serde_json::json!({
            "start_at": "2040-05-01T10:00:00Z",
            "card_nonce": "cnon:card-nonce-ok",
            "given_name": "Jamie"
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let confirmed: Value = response.json().await?;
    assert_eq!(confirmed["booking"]["id"], "BOOK1");
    assert_eq!(confirmed["card"]["last_4"], "1111");
    assert_eq!(platform.customers.lock().unwrap().len(), 1);

    // 5. 查詢並取消預約
    let appointments: Value = client
        .get(format!("{}/api/appointments", base))
        .header(COOKIE, &cookie)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(appointments["appointments"].as_array().map(Vec::len), Some(1));

    let cancelled: Value = client
        .post(format!("{}/api/appointments/BOOK1/cancel", base))
        .header(COOKIE, &cookie)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(cancelled["booking"]["status"], "CANCELLED_BY_CUSTOMER");

    // 6. 登出後 session 失效
    let response = client
        .post(format!("{}/auth/logout", base))
        .header(COOKIE, &cookie)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(session_cookie(&response).is_some_and(|c| c.contains("Max-Age=0")));

    let response = client
        .get(format!("{}/booking/selection", base))
        .header(COOKIE, &cookie)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_login_issues_new_session_id() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;
    let client = client();

    // 未登入時先選服務，取得匿名 session
    let response = client
        .post(format!("{}/booking/services", base))
        .form(&[("service", "CUT"), ("qty_CUT", "1")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let anonymous = session_cookie(&response)
        .and_then(|c| c.split(';').next().map(str::to_string))
        .expect("anonymous session cookie");

    let response = client
        .post(format!("{}/auth/session", base))
        .header(COOKIE, &anonymous)
        .json(&serde_json::json!({ "id_token": "good-token" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let signed_in = session_cookie(&response)
        .and_then(|c| c.split(';').next().map(str::to_string))
        .expect("signed-in session cookie");
    assert_ne!(signed_in, anonymous);

    // 舊的 id 已失效
    let response = client
        .get(format!("{}/booking/selection", base))
        .header(COOKIE, &anonymous)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 選擇的服務帶到新的 session
    let selection: Value = client
        .get(format!("{}/booking/selection", base))
        .header(COOKIE, &signed_in)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(selection["authenticated"], true);
    assert_eq!(selection["services"][0]["variation_id"], "CUT");
    Ok(())
}

#[tokio::test]
async fn test_form_errors_redirect_with_code() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;
    let client = client();

    let response = client
        .post(format!("{}/booking/services", base))
        .form(&[("service", "PERM"), ("qty_PERM", "1")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/booking?error=validation");

    let response = client
        .post(format!("{}/booking/services", base))
        .form(&[("service", "CUT"), ("qty_CUT", "99")])
        .send()
        .await?;
    assert_eq!(location(&response), "/booking?error=validation");

    let response = client
        .post(format!("{}/booking/staff", base))
        .form(&[("staff", "T1")])
        .send()
        .await?;
    assert_eq!(location(&response), "/booking?error=session_expired");
    Ok(())
}

#[tokio::test]
async fn test_json_errors_carry_code() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;
    let client = client();

    let response = client
        .get(format!("{}/api/availability", base))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "session_expired");

    let response = client
        .post(format!("{}/auth/session", base))
        .json(&serde_json::json!({ "id_token": "forged" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "unauthorized");

    let response = client
        .post(format!("{}/auth/session", base))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_availability_requires_selected_services() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;
    let client = client();

    let response = client
        .post(format!("{}/auth/session", base))
        .json(&serde_json::json!({ "id_token": "good-token" }))
        .send()
        .await?;
    let cookie = session_cookie(&response)
        .and_then(|c| c.split(';').next().map(str::to_string))
        .unwrap_or_default();

    let response = client
        .get(format!("{}/api/availability", base))
        .header(COOKIE, &cookie)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "validation");
    Ok(())
}

#[tokio::test]
async fn test_admin_routes_require_token() -> Result<()> {
    let (base, _) = spawn_app(
        FakePlatform::new().with_booking(booking("BOOK7", "CUST1", BookingStatus::Accepted)),
    )
    .await?;
    let client = client();

    let response = client
        .get(format!("{}/admin/appointments?start=2040-05-01", base))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/admin/appointments?start=2040-05-01", base))
        .bearer_auth("wrong-token-0123456789")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = client
        .get(format!("{}/admin/appointments?start=2040-05-01&days=2", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["appointments"][0]["id"], "BOOK7");
    Ok(())
}

#[tokio::test]
async fn test_admin_range_out_of_bounds_is_rejected() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;

    let response = client()
        .get(format!("{}/admin/appointments?start=%2B262142-12-31&days=5", base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation");
    Ok(())
}

#[tokio::test]
async fn test_page_preview_is_sanitized() -> Result<()> {
    let (base, _) = spawn_app(FakePlatform::new()).await?;

    let response = client()
        .post(format!("{}/admin/pages/preview", base))
        .bearer_auth(ADMIN_TOKEN)
        .body(
            r#"<h2 onclick="steal()">Prices</h2><p style="color: red; background: url(javascript:alert(1))">Cuts from $30</p><script>alert(1)</script>"#,
        )
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await?;
    assert!(html.contains("<h2>Prices</h2>"));
    assert!(html.contains("Cuts from $30"));
    assert!(html.contains("color"));
    assert!(!html.contains("onclick"));
    assert!(!html.contains("javascript"));
    assert!(!html.contains("<script"));
    Ok(())
}
