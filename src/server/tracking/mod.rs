mod devices;
mod locations;
mod stats;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn tracking_router() -> Router<Arc<AppState>> {
    Router::new()
        // Location routes
        .route(
            "/locations",
            get(locations::list_locations)
                .post(locations::create_location)
                .delete(locations::delete_locations),
        )
        .route("/locations/latest", get(locations::latest_location))
        .route(
            "/locations/{company_token}",
            post(locations::create_location_for_org),
        )
        .route("/locations_template", post(locations::locations_template))
        // Device routes
        .route("/devices", get(devices::list_devices))
        .route("/devices/{id}", delete(devices::delete_device))
        .route("/company_tokens", get(devices::list_company_tokens))
        .route("/stats", get(stats::get_stats))
}
