use std::fmt::Write;

use axum::{extract::State, http::header, response::IntoResponse};

use folio_db::models::parse_timestamp;

use crate::error::ApiResult;
use crate::render::escape_html;
use crate::state::AppState;

/// GET /robots.txt
pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        robots_txt(&state.config.public_url),
    )
}

fn robots_txt(public_url: &str) -> String {
    format!("User-agent: *\nAllow: /\nDisallow: /api/\nDisallow: /dashboard\n\nSitemap: {public_url}/sitemap.xml\n")
}

/// GET /sitemap.xml: home, explore and every public profile.
pub async fn sitemap(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let entries = state.db.public_profile_entries()?;
    let base = &state.config.public_url;

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    let _ = writeln!(xml, "  <url><loc>{}/</loc><priority>1.0</priority></url>", escape_html(base));
    let _ = writeln!(xml, "  <url><loc>{}/explore</loc><priority>0.8</priority></url>", escape_html(base));
    for (username, updated_at) in entries {
        let lastmod = parse_timestamp(&updated_at).format("%Y-%m-%d");
        let _ = writeln!(
            xml,
            "  <url><loc>{}/{}</loc><lastmod>{lastmod}</lastmod></url>",
            escape_html(base),
            escape_html(&username)
        );
    }
    xml.push_str("</urlset>\n");

    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml))
}
