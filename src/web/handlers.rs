use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};
use serde_json::json;
use tera::Context;

use crate::config::UpstreamConfig;
use crate::conversation::{ChatTurn, ExchangeOutcome, Role};
use crate::error::ApiError;
use crate::upstream::poll::{ThreadCountPoller, THREAD_POLL_INTERVAL};
use crate::upstream::session::normalize_device_id;
use crate::web::models::{
    AttachRequest, ChatRequest, ChatResponse, ConversationQuery, DetachRequest, SendRequest,
    SendResponse, SessionRequest, ThreadItemsResponse, ThreadQuery, TranscriptView,
};
use crate::{AppState, ConversationSession};

// Index page handler
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let context = Context::new();
    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Stateless completion proxy: the caller owns the transcript.
pub async fn chat(
    data: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let config = UpstreamConfig::from_env()?;

    let mut turns = Vec::with_capacity(req.messages.len());
    for message in &req.messages {
        let role = parse_role(&message.role)
            .ok_or_else(|| ApiError::BadRequest(format!("unsupported role: {}", message.role)))?;
        turns.push(ChatTurn {
            role,
            text: message.content.clone(),
        });
    }

    info!("chat exchange with {} turns", turns.len());
    let message = data.upstream.client.complete(&config, &turns).await?;
    Ok(HttpResponse::Ok().json(ChatResponse { message }))
}

// Provisions a widget session credential; the upstream JSON passes through
// verbatim.
pub async fn chatkit_session(
    data: web::Data<AppState>,
    body: Option<web::Json<SessionRequest>>,
) -> Result<HttpResponse, ApiError> {
    let config = UpstreamConfig::from_env()?;
    let device_id =
        normalize_device_id(body.as_ref().and_then(|body| body.device_id.as_deref()));

    let session = data
        .upstream
        .client
        .create_session(&config, &device_id)
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn thread_items(
    data: web::Data<AppState>,
    query: web::Query<ThreadQuery>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = required_thread_id(&query)?;
    let config = UpstreamConfig::from_env()?;

    let user_count = data
        .upstream
        .client
        .fetch_user_count(&config, thread_id)
        .await?;
    Ok(HttpResponse::Ok().json(ThreadItemsResponse { user_count }))
}

// Diagnostic dump; unlike the other proxies this forwards the upstream
// status code so a failing thread lookup can be inspected from the client.
pub async fn thread_debug(
    data: web::Data<AppState>,
    query: web::Query<ThreadQuery>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = required_thread_id(&query)?;
    let config = UpstreamConfig::from_env()?;

    match data
        .upstream
        .client
        .fetch_thread_debug(&config, thread_id)
        .await
    {
        Ok(dump) => Ok(HttpResponse::Ok().json(dump)),
        Err(ApiError::Upstream { status, details }) => {
            warn!("thread debug lookup failed with status {}", status);
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(HttpResponse::build(code).json(json!({
                "error": "upstream thread lookup failed",
                "status": status,
                "details": details,
            })))
        }
        Err(err) => Err(err),
    }
}

pub async fn conversation_view(
    data: web::Data<AppState>,
    query: web::Query<ConversationQuery>,
) -> Result<HttpResponse, ApiError> {
    let device_id = normalize_device_id(query.device_id.as_deref());
    let conversations = lock(&data.conversations)?;
    let view = match conversations.get(&device_id) {
        Some(session) => TranscriptView::from_state(
            &session.conversation,
            &session.ads,
            session.reconciled_count,
        ),
        None => TranscriptView::empty(),
    };
    Ok(HttpResponse::Ok().json(view))
}

// One accountant exchange: admit the human turn under the lock, talk to the
// upstream with the lock released, settle the outcome under the lock again.
pub async fn conversation_send(
    data: web::Data<AppState>,
    body: web::Json<SendRequest>,
) -> Result<HttpResponse, ApiError> {
    let device_id = normalize_device_id(body.device_id.as_deref());
    let config = UpstreamConfig::from_env()?;

    let turns = {
        let mut conversations = lock(&data.conversations)?;
        let session = conversations
            .entry(device_id.clone())
            .or_insert_with(|| ConversationSession::new(data.ad_network.clone()));

        match session.conversation.begin_exchange(&body.text) {
            Ok(turns) => {
                session.sync_ads();
                turns
            }
            Err(rejection) => {
                info!(
                    "send rejected ({}) for device {}",
                    rejection.as_str(),
                    device_id
                );
                let transcript = TranscriptView::from_state(
                    &session.conversation,
                    &session.ads,
                    session.reconciled_count,
                );
                return Ok(HttpResponse::Ok().json(SendResponse {
                    accepted: false,
                    reason: Some(rejection.as_str()),
                    transcript,
                }));
            }
        }
    };

    info!(
        "exchange for device {} with {} turns",
        device_id,
        turns.len()
    );
    let outcome = match data.upstream.client.complete(&config, &turns).await {
        Ok(reply) => ExchangeOutcome::Reply(reply),
        Err(ApiError::Timeout) => {
            warn!("exchange timed out for device {}", device_id);
            ExchangeOutcome::TimedOut
        }
        Err(err) => {
            error!("exchange failed for device {}: {}", device_id, err);
            ExchangeOutcome::Failed
        }
    };

    let mut conversations = lock(&data.conversations)?;
    let session = conversations
        .get_mut(&device_id)
        .ok_or_else(|| ApiError::Internal("conversation vanished mid-exchange".to_string()))?;
    session.conversation.complete_exchange(outcome);

    let transcript = TranscriptView::from_state(
        &session.conversation,
        &session.ads,
        session.reconciled_count,
    );
    Ok(HttpResponse::Ok().json(SendResponse {
        accepted: true,
        reason: None,
        transcript,
    }))
}

// Binds a conversation to an upstream thread and (re)starts the count
// poller that reconciles human turns and ad placements with it.
pub async fn conversation_attach(
    data: web::Data<AppState>,
    body: web::Json<AttachRequest>,
) -> Result<HttpResponse, ApiError> {
    let device_id = normalize_device_id(body.device_id.as_deref());
    let thread_id = body.thread_id.trim().to_string();
    if thread_id.is_empty() {
        return Err(ApiError::BadRequest("threadId is required".to_string()));
    }
    UpstreamConfig::from_env()?;

    let upstream = data.upstream.clone();
    let fetch_thread = thread_id.clone();
    let state = data.clone();
    let watched_device = device_id.clone();
    let poller = ThreadCountPoller::spawn(
        THREAD_POLL_INTERVAL,
        move || {
            let upstream = upstream.clone();
            let thread_id = fetch_thread.clone();
            async move {
                let config = UpstreamConfig::from_env()?;
                let count = upstream
                    .client
                    .fetch_user_count(&config, &thread_id)
                    .await?;
                Ok(count)
            }
        },
        move |count| {
            if let Ok(mut conversations) = state.conversations.lock() {
                if let Some(session) = conversations.get_mut(&watched_device) {
                    session.apply_thread_count(count);
                }
            }
        },
    );

    info!("watching thread {} for device {}", thread_id, device_id);
    let mut conversations = lock(&data.conversations)?;
    let session = conversations
        .entry(device_id)
        .or_insert_with(|| ConversationSession::new(data.ad_network.clone()));
    session.thread_id = Some(thread_id);
    // Replacing the old poller aborts it.
    session.watch = Some(poller);

    Ok(HttpResponse::Ok().json(json!({ "watching": true })))
}

pub async fn conversation_detach(
    data: web::Data<AppState>,
    body: web::Json<DetachRequest>,
) -> Result<HttpResponse, ApiError> {
    let device_id = normalize_device_id(body.device_id.as_deref());

    let mut conversations = lock(&data.conversations)?;
    if let Some(session) = conversations.get_mut(&device_id) {
        session.watch = None;
        session.thread_id = None;
        info!("stopped watching thread for device {}", device_id);
    }
    Ok(HttpResponse::Ok().json(json!({ "watching": false })))
}

fn parse_role(role: &str) -> Option<Role> {
    match role {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

fn required_thread_id(query: &ThreadQuery) -> Result<&str, ApiError> {
    query
        .thread_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("threadId is required".to_string()))
}

fn lock(
    conversations: &Mutex<HashMap<String, ConversationSession>>,
) -> Result<MutexGuard<'_, HashMap<String, ConversationSession>>, ApiError> {
    conversations
        .lock()
        .map_err(|_| ApiError::Internal("conversation state lock poisoned".to_string()))
}
