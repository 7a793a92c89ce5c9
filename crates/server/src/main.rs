//! Pulse server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use chrono::Duration;
use pulse_api::{StreamingState, health, middleware::AppState, router as api_router, streaming_handler};
use pulse_common::Config;
use pulse_core::{
    CommentService, FollowingService, MessagingService, NotificationOutbox, NotificationService,
    NotificationWorker, OtpService, PostService, StoryService, TokenService, UserService,
    mailer_from_config,
};
use pulse_db::repositories::{
    CommentRepository, ConversationRepository, FollowingRepository, MessageRepository,
    NotificationRepository, PostRepository, SavedPostRepository, StoryRepository,
    UserPrivacyRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting Pulse server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(pulse_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    pulse_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let privacy_repo = UserPrivacyRepository::new(Arc::clone(&db));
    let following_repo = FollowingRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let saved_repo = SavedPostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let story_repo = StoryRepository::new(Arc::clone(&db));
    let conversation_repo = ConversationRepository::new(Arc::clone(&db));
    let message_repo = MessageRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    // Notification fan-out runs off the request path
    let notification_service = NotificationService::new(notification_repo, user_repo.clone());
    let (outbox, outbox_rx) = NotificationOutbox::channel();
    NotificationWorker::new(outbox_rx, notification_service.clone()).start();
    info!("Notification worker started");

    let streaming = StreamingState::new();
    let tokens = TokenService::from_config(&config.auth);
    let mailer = mailer_from_config(config.mail.as_ref())?;
    if config.mail.is_none() {
        info!("No mail relay configured, one-time codes will be logged");
    }

    // Initialize services
    let user_service = UserService::new(
        user_repo.clone(),
        privacy_repo.clone(),
        following_repo.clone(),
        tokens.clone(),
    );
    let otp_service = OtpService::new(
        user_repo.clone(),
        user_service.clone(),
        mailer,
        Duration::minutes(config.auth.otp_ttl_minutes),
    );
    let following_service =
        FollowingService::new(following_repo.clone(), user_repo.clone(), outbox.clone());
    let post_service = PostService::new(
        post_repo,
        saved_repo,
        comment_repo.clone(),
        user_repo.clone(),
        privacy_repo.clone(),
        following_repo.clone(),
        outbox.clone(),
    );
    let comment_service =
        CommentService::new(comment_repo, user_repo.clone(), post_service.clone(), outbox);
    let messaging_service = MessagingService::new(
        conversation_repo,
        message_repo,
        user_repo.clone(),
        privacy_repo,
        following_repo.clone(),
        Arc::new(streaming.clone()),
    );
    let story_service = StoryService::new(
        story_repo,
        user_repo,
        following_repo,
        messaging_service.clone(),
        Duration::hours(config.stories.ttl_hours),
    );

    let state = AppState {
        user_service,
        otp_service,
        following_service,
        post_service,
        comment_service,
        story_service,
        messaging_service,
        notification_service,
        tokens,
        streaming,
    };

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route("/ws", get(streaming_handler))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            pulse_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
