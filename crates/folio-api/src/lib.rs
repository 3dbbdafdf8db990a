pub mod auth;
pub mod blocks;
pub mod campaigns;
pub mod config;
pub mod error;
pub mod explore;
pub mod extract;
pub mod geo;
pub mod gmail;
pub mod google;
pub mod mailer;
pub mod middleware;
pub mod page;
pub mod profiles;
pub mod render;
pub mod seo;
pub mod smtp;
pub mod state;
pub mod subscriptions;
pub mod uploads;
pub mod validate;
pub mod visits;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;

/// Every route of the service. Handlers under `protected` see the caller's
/// `Claims` as a request extension.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/themes", get(explore::list_themes))
        .route("/api/explore", get(explore::explore))
        .route("/api/profiles", get(profiles::list_profiles))
        .route("/api/profiles/{username}", get(profiles::get_public_profile))
        .route("/api/profiles/{username}/subscribe", post(subscriptions::subscribe))
        .route("/api/profiles/{username}/views", post(visits::record_view))
        .route("/robots.txt", get(seo::robots))
        .route("/sitemap.xml", get(seo::sitemap))
        .route("/", get(page::home))
        .route("/explore", get(page::explore_page))
        .route("/{username}", get(page::profile_page));

    let protected = Router::new()
        .route(
            "/api/profile",
            get(profiles::get_my_profile)
                .put(profiles::update_my_profile)
                .delete(profiles::delete_my_profile),
        )
        .route("/api/blocks", get(blocks::list_blocks).post(blocks::create_block))
        .route("/api/blocks/order", put(blocks::reorder_blocks))
        .route("/api/blocks/{id}", put(blocks::update_block).delete(blocks::delete_block))
        .route("/api/blocks/{id}/render", get(blocks::render_block))
        .route("/api/subscriptions", get(subscriptions::list_subscriptions))
        .route("/api/subscriptions/export", get(subscriptions::export_subscriptions))
        .route(
            "/api/subscriptions/{id}",
            put(subscriptions::update_subscription).delete(subscriptions::delete_subscription),
        )
        .route("/api/smtp-settings", get(smtp::list_settings).post(smtp::create_setting))
        .route("/api/smtp-settings/{id}", put(smtp::update_setting).delete(smtp::delete_setting))
        .route("/api/smtp-settings/{id}/test", post(smtp::test_setting))
        .route("/api/gmail", axum::routing::delete(gmail::disconnect))
        .route("/api/gmail/auth-url", get(gmail::auth_url))
        .route("/api/gmail/callback", get(gmail::callback))
        .route("/api/gmail/status", get(gmail::status))
        .route("/api/gmail/refresh", post(gmail::refresh))
        .route("/api/gmail/send", post(gmail::send))
        .route("/api/gmail/validate", post(gmail::validate_connection))
        .route("/api/campaigns", get(campaigns::list_campaigns).post(campaigns::create_campaign))
        .route("/api/campaigns/{id}", get(campaigns::get_campaign).delete(campaigns::delete_campaign))
        .route("/api/analytics/views", get(visits::view_stats))
        .route(
            "/api/uploads",
            get(uploads::list_uploads)
                .post(uploads::upload)
                .layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_SIZE)),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let files = ServeDir::new(state.storage.dir());

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service(uploads::UPLOADS_PREFIX, files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
