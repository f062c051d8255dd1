use axum::{body::Body, http::Request, middleware::Next, response::Response};
use axum::Router;

use crate::{dto::sse::SessionRole, error::AppError, state::SharedState};

pub mod docs;
pub mod events;
pub mod health;
pub mod teams;
pub mod tournaments;
pub mod wallet;

const ROLE_HEADER: &str = "x-arena-role";

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(tournaments::router())
        .merge(wallet::router())
        .merge(teams::router())
        .merge(events::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Refuse requests whose declared role cannot review.
///
/// Roles are a trusted request datum; the gateway runs no authentication
/// flow of its own.
pub(crate) async fn require_privileged_role(
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let declared = req
        .headers()
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing role header `{ROLE_HEADER}`")))?;

    let role = match declared {
        "player" => SessionRole::Player,
        "admin" => SessionRole::Admin,
        "boss" => SessionRole::Boss,
        other => return Err(AppError::Unauthorized(format!("unknown role `{other}`"))),
    };

    if !role.privileged() {
        return Err(AppError::Unauthorized(
            "this endpoint needs a reviewing role".into(),
        ));
    }
    Ok(next.run(req).await)
}
