use actix_web::web;
use actix_web::HttpResponse;
use chrono::Utc;
use serde::Deserialize;

use crate::domain::NewsletterId;
use crate::domain::SubscriptionSource;
use crate::domain::SubscriptionStatus;
use crate::domain::VoterId;
use crate::service::VoterError;
use crate::service::VoterService;

fn parse_source(source: Option<String>) -> Result<SubscriptionSource, VoterError> {
    match source {
        None => Ok(SubscriptionSource::default()),
        Some(s) => SubscriptionSource::parse(s).map_err(VoterError::Validation),
    }
}

#[derive(Deserialize)]
pub struct SubscribeForm {
    newsletter_id: i64,
    #[serde(default)]
    status: SubscriptionStatus,
    source: Option<String>,
}

/// `GET /voters/{id}/subscriptions`: ids of the newsletters the voter is
/// currently subscribed to, in the order they were first subscribed.
pub async fn list_subscriptions(
    path: web::Path<i64>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let voter = service.load(VoterId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(voter.subscribed_newsletter_ids()))
}

/// `POST /voters/{id}/subscriptions`. `status` defaults to subscribed and
/// `source` to "unknown". Responds with the resulting entry.
///
/// ```sh
///     curl --json '{"newsletter_id": 3, "source": "form"}' http://127.0.0.1:8000/voters/1/subscriptions
/// ```
#[tracing::instrument(
    name = "Subscribing voter",
    skip(form, service),
    fields(newsletter_id = form.newsletter_id)
)]
pub async fn subscribe(
    path: web::Path<i64>,
    form: web::Json<SubscribeForm>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let form = form.into_inner();
    let source = parse_source(form.source)?;
    let mut voter = service.load(VoterId(path.into_inner())).await?;

    let entry = service
        .subscribe_and_save(
            &mut voter,
            NewsletterId(form.newsletter_id),
            form.status,
            source,
            Utc::now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[derive(Deserialize)]
pub struct UnsubscribeQuery {
    source: Option<String>,
}

/// `DELETE /voters/{id}/subscriptions/{newsletter_id}`. The entry is kept
/// (with status unsubscribed); nothing is ever removed.
#[tracing::instrument(name = "Unsubscribing voter", skip(query, service))]
pub async fn unsubscribe(
    path: web::Path<(i64, i64)>,
    query: web::Query<UnsubscribeQuery>,
    service: web::Data<VoterService>,
) -> Result<HttpResponse, VoterError> {
    let (voter_id, newsletter_id) = path.into_inner();
    let source = parse_source(query.into_inner().source)?;
    let mut voter = service.load(VoterId(voter_id)).await?;

    let entry = service
        .unsubscribe_and_save(&mut voter, NewsletterId(newsletter_id), source, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(entry))
}
