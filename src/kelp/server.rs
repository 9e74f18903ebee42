// Copyright Catenary Transit Initiatives
// HTTP routes over a shared analysis session

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use log::{error, info};
use migratewatch::config::AnalysisConfig;
use migratewatch::{AnalysisSession, ConflictError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize, Debug)]
pub struct ClusterParams {
    pub eps_km: Option<f64>,
    pub min_samples: Option<usize>,
}

#[derive(Deserialize, Debug)]
pub struct DetectParams {
    pub distance_threshold_km: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct SuggestionParams {
    pub buffer_km: Option<f64>,
}

fn error_response(err: &ConflictError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });
    match err {
        ConflictError::MissingData(_) => HttpResponse::Conflict().json(body),
        ConflictError::InvalidParameter(_) => HttpResponse::BadRequest().json(body),
    }
}

fn blocking_error(err: actix_web::error::BlockingError) -> HttpResponse {
    error!("Analysis task failed to complete: {}", err);
    HttpResponse::InternalServerError().finish()
}

#[actix_web::get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "kelp conflict engine is running"
    }))
}

#[actix_web::post("/api/clusters")]
async fn identify_clusters(
    session: web::Data<Arc<AnalysisSession>>,
    config: web::Data<Arc<AnalysisConfig>>,
    query: web::Query<ClusterParams>,
) -> HttpResponse {
    let session = Arc::clone(session.get_ref());
    let eps_km = query.eps_km.unwrap_or(config.eps_km);
    let min_samples = query.min_samples.unwrap_or(config.min_samples);

    // the distance matrix is O(n^2), keep it off the async workers
    match web::block(move || session.identify_clusters(eps_km, min_samples)).await {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(err)) => error_response(&err),
        Err(err) => blocking_error(err),
    }
}

#[actix_web::post("/api/conflicts/detect")]
async fn detect_conflicts(
    session: web::Data<Arc<AnalysisSession>>,
    config: web::Data<Arc<AnalysisConfig>>,
    query: web::Query<DetectParams>,
) -> HttpResponse {
    let session = Arc::clone(session.get_ref());
    let threshold = query
        .distance_threshold_km
        .unwrap_or(config.distance_threshold_km);

    match web::block(move || session.detect_conflicts(threshold)).await {
        Ok(Ok(conflicts)) => HttpResponse::Ok().json(conflicts.as_slice()),
        Ok(Err(err)) => error_response(&err),
        Err(err) => blocking_error(err),
    }
}

#[actix_web::get("/api/conflicts")]
async fn list_conflicts(session: web::Data<Arc<AnalysisSession>>) -> HttpResponse {
    match session.conflicts() {
        Ok(conflicts) => HttpResponse::Ok().json(conflicts.as_slice()),
        Err(err) => error_response(&err),
    }
}

#[actix_web::get("/api/conflicts/summary")]
async fn conflict_summary(session: web::Data<Arc<AnalysisSession>>) -> HttpResponse {
    match session.conflict_summary() {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(err) => error_response(&err),
    }
}

#[actix_web::get("/api/conflicts/monthly")]
async fn monthly_stats(session: web::Data<Arc<AnalysisSession>>) -> HttpResponse {
    match session.monthly_stats() {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(err) => error_response(&err),
    }
}

#[actix_web::get("/api/lanes/{lane_id}/suggestion")]
async fn route_suggestion(
    session: web::Data<Arc<AnalysisSession>>,
    config: web::Data<Arc<AnalysisConfig>>,
    path: web::Path<usize>,
    query: web::Query<SuggestionParams>,
) -> HttpResponse {
    let lane_id = path.into_inner();
    let buffer_km = query.buffer_km.unwrap_or(config.buffer_km);

    match session.suggest_route(lane_id, buffer_km) {
        Ok(suggestion) => HttpResponse::Ok().json(suggestion),
        Err(err) => error_response(&err),
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(identify_clusters)
        .service(detect_conflicts)
        .service(list_conflicts)
        .service(conflict_summary)
        .service(monthly_stats)
        .service(route_suggestion);
}

pub async fn run(
    session: Arc<AnalysisSession>,
    config: Arc<AnalysisConfig>,
    address: String,
    port: u16,
) -> std::io::Result<()> {
    info!("Starting conflict server on {}:{}", address, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(Arc::clone(&session)))
            .app_data(web::Data::new(Arc::clone(&config)))
            .configure(routes)
    })
    .bind((address, port))?
    .run()
    .await
}
