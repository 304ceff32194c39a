use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ck::models::Recipe;
use ck_gen::narration::NarrationState;
use ck_gen::session::{illustrate_recipe, narrate_step, SessionSnapshot};
use ck_gen::{GeminiClient, RecipeGenerator, RecipeSession};
use ck_server::{
    errors::{WebError, WebResult},
    sessions::{new_session_store, next_session_id, CKSessions},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// The address and optionally port to bind to
    #[clap(long, default_value = "0.0.0.0:3000")]
    address: String,
}

#[derive(Clone)]
struct AllStates {
    generator: Arc<GeminiClient>,
    sessions: CKSessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let args = Args::parse();

    let generator = Arc::new(GeminiClient::from_env().context("Building the model client")?);

    // build our application with a route
    let app = Router::new()
        // `GET /health` goes to `health`
        .route("/health", get(health))
        // `POST /api/recipe` goes to `create_recipe`
        .route("/api/recipe", post(create_recipe))
        // `GET /api/session/:session_id` goes to `get_session`
        .route("/api/session/:session_id", get(get_session))
        // `GET /api/session/:session_id/step/:index/audio` goes to `step_audio`
        .route(
            "/api/session/:session_id/step/:index/audio",
            get(step_audio),
        )
        // `POST /api/session/:session_id/step/:index/image` goes to `upload_step_image`
        .route(
            "/api/session/:session_id/step/:index/image",
            post(upload_step_image),
        )
        // Narration playback controls
        .route(
            "/api/session/:session_id/narration/play",
            post(narration_play),
        )
        .route(
            "/api/session/:session_id/narration/pause",
            post(narration_pause),
        )
        .route(
            "/api/session/:session_id/narration/seek/:step",
            post(narration_seek),
        )
        .route(
            "/api/session/:session_id/narration/finished",
            post(narration_finished),
        )
        .layer(
            tower_http::compression::CompressionLayer::new()
                .quality(tower_http::CompressionLevel::Fastest),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(AllStates {
            generator,
            sessions: new_session_store(),
        });

    let listener = tokio::net::TcpListener::bind(&args.address).await?;
    tracing::info!("Listening on {}", args.address);
    axum::serve(listener, app).await?;
    Ok(())
}

// Just reply that everything is okay
async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct RecipeQuery {
    query: String,
    /// Reuse an existing session (superseding its current recipe) instead
    /// of opening a new one.
    #[serde(default)]
    session_id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RecipeCreated {
    session_id: u64,
    recipe: Recipe,
}

/// Generate a recipe for a craving. The recipe itself is synchronous and
/// all-or-nothing; illustrations and leftover suggestions fill in from a
/// background task the client polls for via `get_session`.
async fn create_recipe(
    State(allstates): State<AllStates>,
    Json(request): Json<RecipeQuery>,
) -> WebResult<Json<RecipeCreated>> {
    let existing = request
        .session_id
        .and_then(|id| allstates.sessions.get(&id).map(|session| (id, session)));
    let (session_id, session) = match existing {
        Some(pair) => pair,
        None => {
            let id = next_session_id();
            let session = Arc::new(RecipeSession::new());
            allstates.sessions.insert(id, session.clone());
            (id, session)
        }
    };

    let recipe = allstates.generator.generate_recipe(&request.query).await?;
    // Beginning a new epoch kills any illustration loop still running for
    // the session's previous recipe.
    let epoch = session.begin(recipe.clone());
    tokio::spawn({
        let generator = allstates.generator.clone();
        let session = session.clone();
        async move { illustrate_recipe(generator.as_ref(), &session, epoch).await }
    });

    Ok(Json(RecipeCreated { session_id, recipe }))
}

async fn get_session(
    State(allstates): State<AllStates>,
    Path(session_id): Path<u64>,
) -> WebResult<Json<SessionSnapshot>> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    Ok(Json(session.snapshot()))
}

/// On-demand narration audio for one step. Best-effort: a failed
/// generation is an absent resource, never a server error.
async fn step_audio(
    State(allstates): State<AllStates>,
    Path((session_id, index)): Path<(u64, usize)>,
) -> WebResult<impl IntoResponse> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    let wav = narrate_step(allstates.generator.as_ref(), &session, index)
        .await
        .ok_or(WebError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav))
}

/// Supply an image for a step from outside the pipeline (e.g. one
/// preloaded alongside the recipe). Supplied images take precedence over
/// locally generated ones; the background loop skips filled slots.
async fn upload_step_image(
    State(allstates): State<AllStates>,
    Path((session_id, index)): Path<(u64, usize)>,
    handle: String,
) -> WebResult<StatusCode> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    session.seed_step_image(index, handle);
    Ok(StatusCode::OK)
}

async fn narration_play(
    State(allstates): State<AllStates>,
    Path(session_id): Path<u64>,
) -> WebResult<Json<NarrationState>> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    Ok(Json(session.narration_play()))
}

async fn narration_pause(
    State(allstates): State<AllStates>,
    Path(session_id): Path<u64>,
) -> WebResult<Json<NarrationState>> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    Ok(Json(session.narration_pause()))
}

async fn narration_seek(
    State(allstates): State<AllStates>,
    Path((session_id, step)): Path<(u64, usize)>,
) -> WebResult<Json<NarrationState>> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    Ok(Json(session.narration_seek(step)))
}

/// The playback client reports that the current step's audio finished;
/// the reply carries the step to move to after the advance beat.
async fn narration_finished(
    State(allstates): State<AllStates>,
    Path(session_id): Path<u64>,
) -> WebResult<Json<NarrationState>> {
    let session = allstates
        .sessions
        .get(&session_id)
        .ok_or(WebError::NotFound)?;
    Ok(Json(session.narration_audio_finished().await))
}
