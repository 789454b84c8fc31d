//! Account provisioning.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::accounts::{create_account, IssuedAccount};
use crate::api::endpoints::Body;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::models::NewAccount;

/// `POST /api/accounts`: the token is only ever returned here.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(new): Body<NewAccount>,
) -> Result<(StatusCode, Json<IssuedAccount>), ApiError> {
    let issued = ctx.run(|conn| create_account(conn, &actor, new))?;
    Ok((StatusCode::CREATED, Json(issued)))
}
