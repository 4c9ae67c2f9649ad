use actix_web::web;
use actix_web::HttpResponse;
use serde_json::json;

use crate::domain::ChangeSet;
use crate::domain::PendingChanges;
use crate::domain::VoterId;
use crate::service::VoterError;
use crate::service::VoterService;

/// `PUT /voters/{id}/changes`: replace the voter's pending changes. An empty
/// list clears them.
pub async fn request_changes(
    path: web::Path<i64>,
    changes: web::Json<ChangeSet>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let mut voter = service.load(VoterId(path.into_inner())).await?;
    voter.set_changes(&changes);
    service.save(&mut voter).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// `GET /voters/{id}/changes`: 204 if nothing is pending, 500 if the stored
/// payload is unreadable.
pub async fn get_changes(
    path: web::Path<i64>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let voter = service.load(VoterId(path.into_inner())).await?;
    match voter.changes()? {
        PendingChanges::Empty => Ok(HttpResponse::NoContent().finish()),
        PendingChanges::Requested(changes) => Ok(HttpResponse::Ok().json(changes)),
    }
}

/// `POST /voters/{id}/changes/confirm`: apply and clear pending changes, then
/// save the voter.
#[tracing::instrument(name = "Confirming voter changes", skip(service))]
pub async fn confirm_changes(
    path: web::Path<i64>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let mut voter = service.load(VoterId(path.into_inner())).await?;
    let applied = service.confirm_changes(&mut voter).await?;
    Ok(HttpResponse::Ok().json(json!({ "applied": applied })))
}
