pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::services::{
    analytics_service::AnalyticsService, attempt_service::AttemptService,
    catalog_service::CatalogService, relink_service::RelinkService,
    status_service::StatusService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog_service: CatalogService,
    pub status_service: StatusService,
    pub attempt_service: AttemptService,
    pub relink_service: RelinkService,
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let catalog_service = CatalogService::new(pool.clone());
        let status_service = StatusService::new(pool.clone());
        let attempt_service = AttemptService::new(pool.clone());
        let relink_service = RelinkService::new(pool.clone());
        let analytics_service =
            AnalyticsService::new(pool.clone(), config.analytics_webhook_url.clone());

        Self {
            pool,
            catalog_service,
            status_service,
            attempt_service,
            relink_service,
            analytics_service,
        }
    }
}
