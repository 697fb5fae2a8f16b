use axum::{
    routing::{get, post},
    Router,
};
use exams_backend::middleware::rate_limit::{rps_middleware, RateLimiter};
use exams_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.analytics_service.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Analytics worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    {
        let state = app_state.clone();
        let interval = config.sweep_interval_secs;
        let batch_size = config.sweep_batch_size;
        tokio::spawn(async move {
            loop {
                if let Err(e) = state.attempt_service.sweep_expired(batch_size).await {
                    tracing::error!("Expiry sweeper error: {:?}", e);
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let staff_api = Router::new()
        .route("/api/tests", post(routes::tests::create_test))
        .route("/api/tests/:id/quotas", post(routes::tests::add_quota))
        .route("/api/tests/:id/ready", post(routes::tests::ready_test))
        .route("/api/tests/:id/activate", post(routes::tests::activate_test))
        .route("/api/tests/:id/archive", post(routes::tests::archive_test))
        .route("/api/tests/:id/relink", post(routes::tests::relink_test))
        .route("/api/exams/:id/ready", post(routes::exams::ready_exam))
        .route("/api/exams/:id/activate", post(routes::exams::activate_exam))
        .route("/api/exams/:id/archive", post(routes::exams::archive_exam))
        .route("/api/exams/:id/reopen", post(routes::exams::reopen_exam))
        .route("/api/attempts/sweep", post(routes::attempts::sweep_expired))
        .layer(axum::middleware::from_fn(
            exams_backend::middleware::auth::require_author_or_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new(config.admin_rps),
            rps_middleware,
        ));

    let bearer_api = Router::new()
        .route(
            "/api/exams",
            get(routes::exams::list_exams).post(routes::exams::create_exam),
        )
        .route("/api/exams/:id", get(routes::exams::get_exam))
        .route("/api/exams/:id/tests", get(routes::exams::list_exam_tests))
        .route("/api/tests/:id", get(routes::tests::get_test))
        .route("/api/tests/:id/attempts", post(routes::tests::start_attempt))
        .route("/api/attempts/:id", get(routes::attempts::get_attempt))
        .route(
            "/api/attempts/:id/answers",
            axum::routing::patch(routes::attempts::save_answer),
        )
        .route(
            "/api/attempts/:id/submit",
            post(routes::attempts::submit_attempt),
        )
        .route(
            "/api/banks",
            get(routes::banks::list_banks).post(routes::banks::create_bank),
        )
        .route(
            "/api/banks/:id",
            get(routes::banks::get_bank).delete(routes::banks::delete_bank),
        )
        .route(
            "/api/banks/:id/questions",
            get(routes::banks::list_questions).post(routes::banks::add_question),
        )
        .route(
            "/api/subscriptions/me",
            get(routes::subscriptions::my_subscription),
        )
        .route("/api/users/me", get(routes::users::me))
        .layer(axum::middleware::from_fn(
            exams_backend::middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new(config.api_rps),
            rps_middleware,
        ));

    let app = base_routes
        .merge(staff_api)
        .merge(bearer_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
