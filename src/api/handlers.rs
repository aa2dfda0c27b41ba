use crate::application::lending::{self, ServiceDependencies};
use crate::domain::{
    BookId, BorrowingId, MemberId, MembershipTier, ReservationId, membership_catalogue,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        BorrowingResponse, ChangeTierRequest, CheckoutRequest, EnrollMemberRequest, FineRequest,
        ListMembersQuery, MemberResponse, MembershipTypeResponse, OverdueSweepResponse,
        ReservationResponse, ReserveRequest, UpdateMemberRequest,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Members
// ============================================================================

/// POST /members - 会員を登録
pub async fn enroll_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnrollMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let tier: MembershipTier = req.tier.parse()?;
    let member = lending::enroll(&state.service_deps, &req.name, &req.email, tier).await?;

    Ok((StatusCode::CREATED, Json(member.into())))
}

/// GET /members - 会員一覧
///
/// クエリパラメータ:
/// - q: 氏名・メールアドレスの部分一致（オプション）
/// - tier: 会員種別（オプション）
/// - active: 有効・無効（オプション）
///
/// 複数指定された場合はすべての条件を満たす会員を返す。
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListMembersQuery>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let tier = query
        .tier
        .as_deref()
        .map(str::parse::<MembershipTier>)
        .transpose()?;

    let members = match (query.q.as_deref(), tier, query.active) {
        (None, Some(tier), None) => lending::members_by_tier(&state.service_deps, tier).await?,
        (None, None, Some(true)) => lending::active_members(&state.service_deps).await?,
        (term, tier, active) => lending::search_members(&state.service_deps, term.unwrap_or(""))
            .await?
            .into_iter()
            .filter(|member| tier.is_none_or(|tier| member.tier == tier))
            .filter(|member| active.is_none_or(|active| member.active == active))
            .collect(),
    };

    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// GET /members/membership-types - 会員種別と規定値の一覧
pub async fn list_membership_types() -> Json<Vec<MembershipTypeResponse>> {
    Json(
        membership_catalogue()
            .into_iter()
            .map(MembershipTypeResponse::from)
            .collect(),
    )
}

/// GET /members/:id - 会員詳細
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<MemberResponse>> {
    let member = lending::get_member(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(Json(member.into()))
}

/// PUT /members/:id - 氏名・メールアドレスを変更
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let member = lending::update_member_profile(
        &state.service_deps,
        MemberId::from_uuid(member_id),
        &req.name,
        &req.email,
    )
    .await?;
    Ok(Json(member.into()))
}

/// DELETE /members/:id - 会員を削除（未返却の貸出がある場合は409）
pub async fn delete_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    lending::delete_member(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /members/:id/tier - 会員種別を変更
pub async fn change_tier(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
    Json(req): Json<ChangeTierRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let tier: MembershipTier = req.tier.parse()?;
    let member =
        lending::change_tier(&state.service_deps, MemberId::from_uuid(member_id), tier).await?;
    Ok(Json(member.into()))
}

/// POST /members/:id/deactivate
pub async fn deactivate_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<MemberResponse>> {
    let member = lending::deactivate(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(Json(member.into()))
}

/// POST /members/:id/reactivate
pub async fn reactivate_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<MemberResponse>> {
    let member = lending::reactivate(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(Json(member.into()))
}

/// POST /members/:id/fines/assess - 罰金を加算
pub async fn assess_fine(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
    Json(req): Json<FineRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let member =
        lending::assess_fine(&state.service_deps, MemberId::from_uuid(member_id), req.amount)
            .await?;
    Ok(Json(member.into()))
}

/// POST /members/:id/fines/settle - 罰金を精算
pub async fn settle_fine(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
    Json(req): Json<FineRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let member =
        lending::settle_fine(&state.service_deps, MemberId::from_uuid(member_id), req.amount)
            .await?;
    Ok(Json(member.into()))
}

/// GET /members/:id/borrowings - 会員の貸出履歴
pub async fn list_member_borrowings(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<Vec<BorrowingResponse>>> {
    let borrowings =
        lending::list_borrowings_for_member(&state.service_deps, MemberId::from_uuid(member_id))
            .await?;
    Ok(Json(
        borrowings.into_iter().map(BorrowingResponse::from).collect(),
    ))
}

/// GET /members/:id/reservations - 会員の予約一覧
pub async fn list_member_reservations(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ReservationResponse>>> {
    let reservations =
        lending::list_reservations_for_member(&state.service_deps, MemberId::from_uuid(member_id))
            .await?;
    Ok(Json(
        reservations
            .into_iter()
            .map(ReservationResponse::from)
            .collect(),
    ))
}

// ============================================================================
// Borrowings
// ============================================================================

/// POST /borrowings - 書籍を貸し出す
///
/// 強制されるビジネスルール:
/// - 会員が存在し、有効であること
/// - 貸出中の冊数が会員種別の上限未満であること
/// - 貸出可能な複本があること
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<BorrowingResponse>)> {
    let borrowing = lending::checkout(
        &state.service_deps,
        MemberId::from_uuid(req.member_id),
        BookId::from_uuid(req.book_id),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(borrowing.into())))
}

/// GET /borrowings/:id - 貸出詳細（ステータスは導出値）
pub async fn get_borrowing(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> ApiResult<Json<BorrowingResponse>> {
    let borrowing =
        lending::get_borrowing(&state.service_deps, BorrowingId::from_uuid(borrowing_id)).await?;
    Ok(Json(borrowing.into()))
}

/// POST /borrowings/:id/return - 書籍を返却
///
/// 延滞していれば会員種別の日額で罰金が加算される。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> ApiResult<Json<BorrowingResponse>> {
    let borrowing =
        lending::return_book(&state.service_deps, BorrowingId::from_uuid(borrowing_id)).await?;
    Ok(Json(borrowing.into()))
}

/// POST /borrowings/overdue-sweep - 延滞検出バッチを実行
pub async fn overdue_sweep(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<OverdueSweepResponse>> {
    let flagged = lending::detect_overdue_borrowings(&state.service_deps).await?;
    Ok(Json(OverdueSweepResponse { flagged }))
}

// ============================================================================
// Reservations
// ============================================================================

/// POST /reservations - 書籍を予約
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReserveRequest>,
) -> ApiResult<(StatusCode, Json<ReservationResponse>)> {
    let reservation = lending::reserve(
        &state.service_deps,
        MemberId::from_uuid(req.member_id),
        BookId::from_uuid(req.book_id),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// GET /reservations/:id - 予約詳細
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> ApiResult<Json<ReservationResponse>> {
    let reservation =
        lending::get_reservation(&state.service_deps, ReservationId::from_uuid(reservation_id))
            .await?;
    Ok(Json(reservation.into()))
}

/// POST /reservations/:id/receive - 取り置き本を受け取る（貸出を作成）
pub async fn receive_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> ApiResult<Json<ReservationResponse>> {
    let reservation =
        lending::mark_received(&state.service_deps, ReservationId::from_uuid(reservation_id))
            .await?;
    Ok(Json(reservation.into()))
}

/// POST /reservations/:id/cancel - 予約を取り消す
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> ApiResult<Json<ReservationResponse>> {
    let reservation =
        lending::cancel(&state.service_deps, ReservationId::from_uuid(reservation_id)).await?;
    Ok(Json(reservation.into()))
}
