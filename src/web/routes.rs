use actix_web::web;
use crate::web::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/chat", web::post().to(handlers::chat))
            .route("/chatkit/session", web::post().to(handlers::chatkit_session))
            .route(
                "/chatkit/thread-items",
                web::get().to(handlers::thread_items),
            )
            .route(
                "/chatkit/thread-debug",
                web::get().to(handlers::thread_debug),
            )
            .route("/conversation", web::get().to(handlers::conversation_view))
            .route(
                "/conversation/send",
                web::post().to(handlers::conversation_send),
            )
            .route(
                "/conversation/attach",
                web::post().to(handlers::conversation_attach),
            )
            .route(
                "/conversation/detach",
                web::post().to(handlers::conversation_detach),
            ),
    )
    .route("/", web::get().to(handlers::index))
    .route("/health", web::get().to(handlers::health_check));
}
