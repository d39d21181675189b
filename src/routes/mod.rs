use crate::models::AppState;
use axum::Router;

pub mod agenda_routes;
pub mod appointment_routes;
pub mod catalog_routes;
pub mod dashboard_routes;
pub mod doctor_routes;
pub mod patient_routes;
pub mod profile_routes;
pub mod schedule_routes;
pub mod unit_routes;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(agenda_routes::router())
        .merge(appointment_routes::router())
        .merge(unit_routes::router())
        .merge(doctor_routes::router())
        .merge(patient_routes::router())
        .merge(catalog_routes::router())
        .merge(profile_routes::router())
        .merge(schedule_routes::router())
        .merge(dashboard_routes::router());

    Router::new().nest("/api/v1", api).with_state(state)
}
