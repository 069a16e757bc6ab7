use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use plate_packer::config::PackConfig;
use plate_packer::export::PackingReport;
use plate_packer::solver::Solver;
use plate_packer::types::{Demand, Problem, Rect};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct PackRequest {
    bin: Rect,
    demands: Vec<Demand>,
    #[serde(default = "default_true")]
    allow_rotate: bool,
    #[serde(default)]
    config: PackConfig,
}

fn default_true() -> bool {
    true
}

async fn pack(Json(req): Json<PackRequest>) -> Result<Json<PackingReport>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /pack"
    );

    let problem = Problem::new(req.bin, req.demands, req.allow_rotate);
    let solver =
        Solver::new(problem, req.config).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let report = tokio::task::spawn_blocking(move || PackingReport::from(&solver.solve()))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "packing task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "packing failed".to_string())
        })?;

    Ok(Json(report))
}

fn main() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    // keep the guard alive for the whole process so events get flushed
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(serve());
}

async fn serve() {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/pack", post(pack))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
