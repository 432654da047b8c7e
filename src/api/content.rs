/// Question and answer endpoints
use crate::{
    auth::AuthUser,
    context::AppContext,
    db::{Answer, Question},
    error::AppResult,
    reports::ContentRef,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build content routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/questions", post(create_question))
        .route(
            "/api/questions/:id",
            get(get_question).put(edit_question).delete(delete_question),
        )
        .route("/api/questions/:id/answers", post(create_answer))
        .route(
            "/api/answers/:id",
            get(get_answer).put(edit_answer).delete(delete_answer),
        )
}

#[derive(Debug, Deserialize)]
struct CreateQuestionRequest {
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct CreateAnswerRequest {
    body: String,
}

#[derive(Debug, Deserialize)]
struct EditQuestionRequest {
    title: Option<String>,
    body: Option<String>,
}

async fn create_question(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<CreateQuestionRequest>,
) -> AppResult<Json<Question>> {
    let question = ctx
        .content
        .create_question(&auth.viewer, &req.title, &req.body)
        .await?;
    Ok(Json(question))
}

async fn get_question(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Question>> {
    Ok(Json(ctx.content.get_question(&id).await?))
}

async fn edit_question(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<EditQuestionRequest>,
) -> AppResult<Json<Question>> {
    let question = ctx
        .content
        .edit_question(&auth.viewer, &id, req.title.as_deref(), req.body.as_deref())
        .await?;
    Ok(Json(question))
}

async fn delete_question(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.content
        .delete(&auth.viewer, &ContentRef::question(id))
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn create_answer(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(question_id): Path<String>,
    Json(req): Json<CreateAnswerRequest>,
) -> AppResult<Json<Answer>> {
    let answer = ctx
        .content
        .create_answer(&auth.viewer, &question_id, &req.body)
        .await?;
    Ok(Json(answer))
}

async fn get_answer(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Answer>> {
    Ok(Json(ctx.content.get_answer(&id).await?))
}

async fn edit_answer(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreateAnswerRequest>,
) -> AppResult<Json<Answer>> {
    let answer = ctx.content.edit_answer(&auth.viewer, &id, &req.body).await?;
    Ok(Json(answer))
}

async fn delete_answer(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.content
        .delete(&auth.viewer, &ContentRef::answer(id))
        .await?;
    Ok(Json(json!({ "success": true })))
}
