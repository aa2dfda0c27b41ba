use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use library_lending::api::handlers::AppState;
use library_lending::api::router::create_router;
use library_lending::api::types::*;
use library_lending::domain::BookId;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

mod common;

use common::TestContext;

// ============================================================================
// E2Eテスト用のヘルパー関数
// ============================================================================

/// インメモリのアダプターで実際のAPIルーターを組み立てる
fn setup_app() -> (axum::Router, TestContext) {
    let ctx = common::setup();
    let app_state = Arc::new(AppState {
        service_deps: ctx.deps.clone(),
    });
    (create_router(app_state), ctx)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

async fn enroll_member(app: &axum::Router, email: &str, tier: &str) -> MemberResponse {
    let (status, body) = send(
        app,
        "POST",
        "/members",
        Some(json!({ "name": "Ada Lovelace", "email": email, "tier": tier })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse(&body)
}

// ============================================================================
// E2Eテスト: 正常系フロー
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _ctx) = setup_app();

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_e2e_full_borrowing_flow() {
    let (app, ctx) = setup_app();
    let book_id = BookId::new();
    ctx.books.add_copies(book_id, 1);

    // Step 1: 会員登録（POST /members）
    let member = enroll_member(&app, "ada@example.org", "regular").await;
    assert_eq!(member.tier, "REGULAR");
    assert_eq!(member.member_number, "MEM-000001");

    // Step 2: 貸出（POST /borrowings）
    let (status, body) = send(
        &app,
        "POST",
        "/borrowings",
        Some(json!({ "member_id": member.member_id, "book_id": book_id.value() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let borrowing: BorrowingResponse = parse(&body);
    assert_eq!(borrowing.status, "ACTIVE");
    assert_eq!(borrowing.borrowing_number, "BRW-000001");

    // Step 3: 期限の2日後、延滞検出バッチ
    ctx.clock.set(borrowing.due_date + Duration::days(2));
    let (status, body) = send(&app, "POST", "/borrowings/overdue-sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    let sweep: OverdueSweepResponse = parse(&body);
    assert_eq!(sweep.flagged, 1);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/borrowings/{}", borrowing.borrowing_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fetched: BorrowingResponse = parse(&body);
    assert_eq!(fetched.status, "OVERDUE");

    // Step 4: 返却（POST /borrowings/:id/return）
    let (status, body) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/return", borrowing.borrowing_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let returned: BorrowingResponse = parse(&body);
    assert_eq!(returned.status, "RETURNED");
    assert_eq!(returned.fine_accrued, Decimal::new(200, 2));

    // Step 5: 罰金の確認と精算
    let (_, body) = send(&app, "GET", &format!("/members/{}", member.member_id), None).await;
    let reloaded: MemberResponse = parse(&body);
    assert_eq!(reloaded.fine_balance, Decimal::new(200, 2));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/members/{}/fines/settle", member.member_id),
        Some(json!({ "amount": "2.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let settled: MemberResponse = parse(&body);
    assert_eq!(settled.fine_balance, Decimal::ZERO);

    // Step 6: 貸出履歴
    let (status, body) = send(
        &app,
        "GET",
        &format!("/members/{}/borrowings", member.member_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history: Vec<BorrowingResponse> = parse(&body);
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_e2e_reservation_flow() {
    let (app, ctx) = setup_app();
    let book_id = BookId::new();
    ctx.books.add_copies(book_id, 1);
    let member = enroll_member(&app, "ada@example.org", "STUDENT").await;

    let (status, body) = send(
        &app,
        "POST",
        "/reservations",
        Some(json!({ "member_id": member.member_id, "book_id": book_id.value() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let reservation: ReservationResponse = parse(&body);
    assert_eq!(reservation.status, "PENDING");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/reservations/{}/receive", reservation.reservation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let received: ReservationResponse = parse(&body);
    assert_eq!(received.status, "RECEIVED");
    assert!(received.borrowing_id.is_some());

    // 受け取り済みの予約は取り消せない
    let (status, body) = send(
        &app,
        "POST",
        &format!("/reservations/{}/cancel", reservation.reservation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "INVALID_STATE");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/members/{}/reservations", member.member_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reservations: Vec<ReservationResponse> = parse(&body);
    assert_eq!(reservations.len(), 1);
}

#[tokio::test]
async fn test_list_members_with_filters() {
    let (app, _ctx) = setup_app();
    enroll_member(&app, "ada@example.org", "STUDENT").await;
    enroll_member(&app, "ada.faculty@example.org", "FACULTY").await;
    enroll_member(&app, "someone@other.org", "STUDENT").await;

    let (status, body) = send(&app, "GET", "/members?tier=student", None).await;
    assert_eq!(status, StatusCode::OK);
    let students: Vec<MemberResponse> = parse(&body);
    assert_eq!(students.len(), 2);

    let (_, body) = send(&app, "GET", "/members?q=example&tier=FACULTY", None).await;
    let filtered: Vec<MemberResponse> = parse(&body);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].email, "ada.faculty@example.org");

    let (_, body) = send(&app, "GET", "/members", None).await;
    let everyone: Vec<MemberResponse> = parse(&body);
    assert_eq!(everyone.len(), 3);
}

#[tokio::test]
async fn test_membership_types_catalogue() {
    let (app, _ctx) = setup_app();

    let (status, body) = send(&app, "GET", "/members/membership-types", None).await;

    assert_eq!(status, StatusCode::OK);
    let types: Vec<MembershipTypeResponse> = parse(&body);
    let tiers: Vec<_> = types.iter().map(|t| t.tier.as_str()).collect();
    assert_eq!(tiers, vec!["STUDENT", "FACULTY", "REGULAR", "PREMIUM"]);
    assert_eq!(types[0].display_name, "Student");
    assert_eq!(types[2].borrowing_limit, 3);
    assert_eq!(types[2].daily_fine_rate, Decimal::new(100, 2));
}

#[tokio::test]
async fn test_list_active_members_and_update_profile() {
    let (app, _ctx) = setup_app();
    let ada = enroll_member(&app, "ada@example.org", "STUDENT").await;
    let grace = enroll_member(&app, "grace@navy.mil", "FACULTY").await;

    send(
        &app,
        "POST",
        &format!("/members/{}/deactivate", grace.member_id),
        None,
    )
    .await;

    let (status, body) = send(&app, "GET", "/members?active=true", None).await;
    assert_eq!(status, StatusCode::OK);
    let active: Vec<MemberResponse> = parse(&body);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].member_id, ada.member_id);

    let (_, body) = send(&app, "GET", "/members?active=false&tier=faculty", None).await;
    let inactive: Vec<MemberResponse> = parse(&body);
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].member_id, grace.member_id);

    let uri = format!("/members/{}", ada.member_id);
    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "name": "Ada King", "email": "ada.king@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: MemberResponse = parse(&body);
    assert_eq!(updated.name, "Ada King");
    assert_eq!(updated.email, "ada.king@example.org");

    // 409: 他の会員のメールアドレス
    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "name": "Ada King", "email": "GRACE@navy.mil" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "DUPLICATE_EMAIL");
}

// ============================================================================
// E2Eテスト: エラーケース
// ============================================================================

#[tokio::test]
async fn test_e2e_error_mapping() {
    let (app, _ctx) = setup_app();

    // 404: 存在しない会員
    let (status, body) = send(
        &app,
        "GET",
        &format!("/members/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "NOT_FOUND");

    // 400: 未知の会員種別
    let (status, body) = send(
        &app,
        "POST",
        "/members",
        Some(json!({ "name": "Ada", "email": "ada@example.org", "tier": "GOLD" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "UNKNOWN_TIER");

    // 409: メールアドレスの重複
    let member = enroll_member(&app, "ada@example.org", "REGULAR").await;
    let (status, body) = send(
        &app,
        "POST",
        "/members",
        Some(json!({ "name": "Ada", "email": "ADA@example.org", "tier": "REGULAR" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "DUPLICATE_EMAIL");

    // 409: 在庫なし
    let (status, body) = send(
        &app,
        "POST",
        "/borrowings",
        Some(json!({ "member_id": member.member_id, "book_id": BookId::new().value() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "BOOK_UNAVAILABLE");

    // 400: 残高を超える精算
    let (status, body) = send(
        &app,
        "POST",
        &format!("/members/{}/fines/settle", member.member_id),
        Some(json!({ "amount": "1.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "INVALID_AMOUNT");

    // 400: 残高の桁あふれ
    let assess = format!("/members/{}/fines/assess", member.member_id);
    let huge = json!({ "amount": Decimal::MAX });
    let (status, _) = send(&app, "POST", &assess, Some(huge.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "POST", &assess, Some(huge)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_e2e_member_lifecycle() {
    let (app, ctx) = setup_app();
    let book_id = BookId::new();
    ctx.books.add_copies(book_id, 1);
    let member = enroll_member(&app, "ada@example.org", "STUDENT").await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/members/{}/tier", member.member_id),
        Some(json!({ "tier": "premium" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let upgraded: MemberResponse = parse(&body);
    assert_eq!(upgraded.tier, "PREMIUM");
    assert!(upgraded.membership_end > member.membership_end);

    // 無効化された会員は借りられない
    let (status, _) = send(
        &app,
        "POST",
        &format!("/members/{}/deactivate", member.member_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let checkout = json!({ "member_id": member.member_id, "book_id": book_id.value() });
    let (status, body) = send(&app, "POST", "/borrowings", Some(checkout.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, "MEMBER_INACTIVE");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/members/{}/reactivate", member.member_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", "/borrowings", Some(checkout)).await;
    assert_eq!(status, StatusCode::CREATED);
    let borrowing: BorrowingResponse = parse(&body);

    // 未返却の貸出があると削除できない
    let uri = format!("/members/{}", member.member_id);
    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(
        &app,
        "POST",
        &format!("/borrowings/{}/return", borrowing.borrowing_id),
        None,
    )
    .await;
    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
