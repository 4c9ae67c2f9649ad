use actix_web::web;
use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::domain::NewVoter;
use crate::domain::UserId;
use crate::domain::VoterEmail;
use crate::domain::VoterId;
use crate::service::VoterError;
use crate::service::VoterService;

#[derive(Deserialize)]
pub struct VoterForm {
    email: String,
    user_id: Option<i64>,
    status: Option<bool>,
    langcode: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl TryFrom<VoterForm> for NewVoter {
    type Error = String;
    fn try_from(value: VoterForm) -> Result<Self, Self::Error> {
        let mut new = NewVoter::new(VoterEmail::parse(value.email)?);
        // 0 is how the host spells "no user"
        new.user_id = value.user_id.and_then(UserId::new);
        new.status = value.status.unwrap_or(true);
        new.langcode = value.langcode;
        new.fields = value.fields;
        Ok(new)
    }
}

/// `POST /voters`. Links the new voter to an existing user account with the
/// same email (unless `user_id` is given) and copies shared fields from it.
///
/// ```sh
///     curl -v --json '{"email": "john@foo.com"}' http://127.0.0.1:8000/voters
/// ```
#[tracing::instrument(
    name = "Adding new voter",
    skip(form, service),
    fields(voter_email = %form.email)
)]
pub async fn create_voter(
    form: web::Json<VoterForm>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let new: NewVoter = form.0.try_into().map_err(VoterError::Validation)?;
    let voter = service.create(new).await?;
    Ok(HttpResponse::Created().json(voter))
}

/// `GET /voters/{id}`
pub async fn get_voter(
    path: web::Path<i64>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let voter = service.load(VoterId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(voter))
}

/// Every key is optional; absent keys are left alone. `user_id: 0` unlinks.
#[derive(Deserialize)]
pub struct VoterUpdate {
    email: Option<String>,
    user_id: Option<i64>,
    status: Option<bool>,
    langcode: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// `PUT /voters/{id}`. Saving pushes shared fields to the linked user.
#[tracing::instrument(name = "Updating voter", skip(update, service))]
pub async fn update_voter(
    path: web::Path<i64>,
    update: web::Json<VoterUpdate>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let mut voter = service.load(VoterId(path.into_inner())).await?;
    let update = update.into_inner();

    if let Some(email) = update.email {
        let email = VoterEmail::parse(email).map_err(VoterError::Validation)?;
        service.change_email(&mut voter, email).await?;
    }
    if let Some(raw) = update.user_id {
        voter.set_user_id(UserId::new(raw));
    }
    if let Some(status) = update.status {
        voter.set_status(status);
    }
    if update.langcode.is_some() {
        voter.set_langcode(update.langcode);
    }
    for (name, value) in update.fields {
        service.set_field(&mut voter, &name, value)?;
    }

    service.save(&mut voter).await?;
    Ok(HttpResponse::Ok().json(voter))
}
