use actix_web::HttpResponse;

/// `GET /health_check`
///
/// Does not touch storage, so it answers even when the db is down.
///
/// Note: viewing http response requires `curl -v`
pub async fn health_check() -> HttpResponse { HttpResponse::Ok().finish() }
