mod ads;
mod config;
mod conversation;
mod error;
mod upstream;
mod web;

use actix_web::error::InternalError;
use actix_web::web::{Data, JsonConfig};
use actix_web::{App, HttpResponse, HttpServer};
use actix_files as fs;
use dotenv::dotenv;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tera::Tera;

use ads::{AdNetwork, AdSlotRenderer, LogAdNetwork};
use config::UpstreamConfig;
use conversation::{placements_for_count, Conversation};
use upstream::poll::ThreadCountPoller;
use upstream::UpstreamManager;
use web::routes;

// App state structure
pub struct AppState {
    pub tera: Tera,
    pub upstream: Data<UpstreamManager>,
    pub conversations: Mutex<HashMap<String, ConversationSession>>,
    pub ad_network: Arc<dyn AdNetwork>,
}

// One device's conversation: the accountant, its ad slots, and an optional
// watch on an upstream thread.
pub struct ConversationSession {
    pub conversation: Conversation,
    pub ads: AdSlotRenderer,
    pub thread_id: Option<String>,
    pub reconciled_count: Option<usize>,
    pub watch: Option<ThreadCountPoller>,
}

impl ConversationSession {
    pub fn new(network: Arc<dyn AdNetwork>) -> Self {
        Self {
            conversation: Conversation::new(),
            ads: AdSlotRenderer::new(network),
            thread_id: None,
            reconciled_count: None,
            watch: None,
        }
    }

    pub fn sync_ads(&mut self) {
        self.ads.sync(self.conversation.placements());
    }

    // The upstream thread is the source of truth when the embedded widget
    // drives the conversation; its count decides the ad slots directly.
    pub fn apply_thread_count(&mut self, count: usize) {
        self.reconciled_count = Some(count);
        for index in 1..=placements_for_count(count) {
            self.ads.ensure_slot(index as u32);
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Carla web application");

    if UpstreamConfig::from_env().is_err() {
        warn!("OPENAI_API_KEY is not set; chat endpoints will report a configuration error");
    }

    // Shared client for the hosted chat API
    let upstream = Data::new(UpstreamManager::new());

    // Initialize template engine
    let mut tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    tera.autoescape_on(vec![".html"]);

    let ad_network: Arc<dyn AdNetwork> = Arc::new(LogAdNetwork);

    // Create app state
    let app_state = Data::new(AppState {
        tera,
        upstream: upstream.clone(),
        conversations: Mutex::new(HashMap::new()),
        ad_network,
    });

    // Start web server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(upstream.clone())
            .app_data(JsonConfig::default().error_handler(|err, _req| {
                let response = HttpResponse::BadRequest()
                    .json(serde_json::json!({ "error": "invalid JSON body" }));
                InternalError::from_response(err, response).into()
            }))
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
