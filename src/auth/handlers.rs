use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument, warn};

use crate::auth::dto::{GoogleSigninRequest, SigninRequest, SignupRequest, UserDetails};
use crate::auth::repo::User;
use crate::auth::services;
use crate::error::{ApiError, ApiResult};
use crate::mailer::{Recipients, SendTemplatedEmail};
use crate::response::ApiResponse;
use crate::session::{removal_cookie, session_cookie, CurrentUser};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signin", post(signin))
        .route("/auth/signup", post(signup))
        .route("/auth/signout", get(signout))
        .route("/auth/google-signin", post(google_signin))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user", get(user_details))
}

async fn establish_session(state: &AppState, user_id: i64, jar: CookieJar) -> ApiResult<CookieJar> {
    let token = state.sessions.create(user_id).await.map_err(|e| {
        error!(error = %e, "session create failed");
        ApiError::Internal(e)
    })?;
    Ok(jar.add(session_cookie(
        &state.config.session,
        state.config.production,
        token,
    )))
}

#[instrument(skip(state, jar, payload))]
async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SigninRequest>,
) -> ApiResult<(CookieJar, Json<ApiResponse<()>>)> {
    payload.validate().map_err(ApiError::Validation)?;

    let user = services::signin(&state.db, &payload.email, &payload.password).await?;
    let jar = establish_session(&state, user.id, jar).await?;

    Ok((jar, Json(ApiResponse::ok(None, "Signed in successfully"))))
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<()>>)> {
    payload.validate().map_err(ApiError::Validation)?;

    let user = services::signup(&state.db, &payload).await?;

    // Welcome email is best-effort: a broken template or broker hiccup must
    // not fail the signup that already committed.
    let welcome = SendTemplatedEmail {
        template: "welcome".into(),
        variables: Some(serde_json::json!({
            "firstname": user.firstname.clone(),
            "email": user.email.clone(),
        })),
        recipients: Recipients::One(user.email.clone()),
        subject: Some(format!("Welcome to {}", state.config.app_name)),
        from: None,
    };
    if let Err(e) = state.mailer.send_templated_email(welcome).await {
        warn!(error = %e, user_id = user.id, "failed to enqueue welcome email");
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(None, "User created successfully")),
    ))
}

#[instrument(skip(state, current, jar))]
async fn signout(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<ApiResponse<()>>)> {
    if let Err(e) = state.sessions.destroy(&current.token).await {
        error!(error = %e, "session destroy error");
    }
    let jar = jar.add(removal_cookie(&state.config.session));

    info!(user_id = current.user_id, "user signed out");
    Ok((jar, Json(ApiResponse::ok(None, "Signed out successfully"))))
}

#[instrument(skip(state, jar, payload))]
async fn google_signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<GoogleSigninRequest>,
) -> ApiResult<(CookieJar, Json<ApiResponse<()>>)> {
    let user = services::google_signin(
        &state.db,
        state.google.as_ref(),
        &state.config.google,
        &payload.code,
    )
    .await?;
    let jar = establish_session(&state, user.id, jar).await?;

    Ok((jar, Json(ApiResponse::ok(None, "Signed in successfully"))))
}

#[instrument(skip(state, current))]
async fn user_details(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<ApiResponse<UserDetails>>> {
    let user = User::find_by_id(&state.db, current.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    Ok(Json(ApiResponse::ok(
        Some(UserDetails::from(user)),
        "User retrieved successfully",
    )))
}
