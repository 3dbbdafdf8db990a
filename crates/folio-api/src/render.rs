//! Server-side HTML for blocks and public profile pages.
//!
//! Every piece of user text goes through [`escape_html`] before it reaches
//! the output, attribute values included.

use std::fmt::Write;

use chrono::NaiveDate;
use reqwest::Url;
use tracing::warn;

use folio_types::blocks::{BlockPayload, CalendarData, ImageData, ImageSize, LinkData, LocationData, TextData};
use folio_types::api::ExploreEntry;
use folio_types::models::{Block, Profile};
use folio_types::themes::{ButtonStyle, Layout, Theme};

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Read-mode fragment for one block.
pub fn render_view(payload: &BlockPayload) -> String {
    let kind = payload.block_type();
    if let Some(text) = payload.placeholder() {
        return format!("<div class=\"block block-{kind} block-empty\">{text}</div>");
    }

    match payload {
        BlockPayload::Calendar(c) => calendar_view(c),
        BlockPayload::Image(i) => image_view(i),
        BlockPayload::Location(l) => location_view(l),
        BlockPayload::Link(l) => link_view(l),
        BlockPayload::Text(t) => text_view(t),
    }
}

fn calendar_view(c: &CalendarData) -> String {
    let title = if c.title.trim().is_empty() {
        "Untitled event".to_string()
    } else {
        escape_html(&c.title)
    };
    let date = c.date.as_deref().unwrap_or_default();
    let shown = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| escape_html(date));

    let mut html = format!(
        "<div class=\"block block-calendar\"><h3>{title}</h3><time datetime=\"{}\">{shown}</time>",
        escape_html(date)
    );
    if !c.description.trim().is_empty() {
        let _ = write!(html, "<p>{}</p>", escape_html(&c.description));
    }
    html.push_str("</div>");
    html
}

fn image_view(i: &ImageData) -> String {
    format!(
        "<figure class=\"block block-image size-{}\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\"></figure>",
        i.size.as_str(),
        escape_html(&i.image_url),
        escape_html(i.alt.as_deref().unwrap_or_default())
    )
}

fn location_view(l: &LocationData) -> String {
    let query = [&l.address, &l.city, &l.country]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let href = Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", query.as_str())])
        .map(String::from)
        .unwrap_or_else(|_| MAPS_SEARCH_URL.to_string());

    format!(
        "<div class=\"block block-location\"><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></div>",
        escape_html(&href),
        escape_html(&query)
    )
}

fn link_view(l: &LinkData) -> String {
    let label = if l.title.trim().is_empty() { &l.url } else { &l.title };
    format!(
        "<a class=\"block block-link\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
        escape_html(&l.url),
        escape_html(label)
    )
}

fn text_view(t: &TextData) -> String {
    let paragraphs: String = t
        .content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p.trim()).replace('\n', "<br>")))
        .collect();
    format!("<div class=\"block block-text\">{paragraphs}</div>")
}

/// Edit-mode form for one block, pre-filled from `payload`. Field names match
/// the JSON payload keys so the form serializes straight into an update.
pub fn render_form(payload: &BlockPayload) -> String {
    let kind = payload.block_type();
    let mut html = format!("<form class=\"block-form\" data-block-type=\"{kind}\">");

    match payload {
        BlockPayload::Calendar(c) => {
            text_input(&mut html, "title", "Title", &c.title);
            let _ = write!(
                html,
                "<label>Date<input type=\"date\" name=\"date\" value=\"{}\"></label>",
                escape_html(c.date.as_deref().unwrap_or_default())
            );
            textarea(&mut html, "description", "Description", &c.description);
        }
        BlockPayload::Image(i) => {
            let _ = write!(
                html,
                "<input type=\"hidden\" name=\"imageUrl\" value=\"{}\">\
                 <label>Image<input type=\"file\" accept=\"image/*\" data-upload-endpoint=\"/api/uploads\"></label>",
                escape_html(&i.image_url)
            );
            html.push_str("<label>Size<select name=\"size\">");
            for size in [ImageSize::Small, ImageSize::Medium, ImageSize::Large] {
                let selected = if size == i.size { " selected" } else { "" };
                let _ = write!(html, "<option value=\"{0}\"{selected}>{0}</option>", size.as_str());
            }
            html.push_str("</select></label>");
            text_input(&mut html, "alt", "Alt text", i.alt.as_deref().unwrap_or_default());
        }
        BlockPayload::Location(l) => {
            text_input(&mut html, "address", "Address", &l.address);
            text_input(&mut html, "city", "City", &l.city);
            text_input(&mut html, "country", "Country", &l.country);
        }
        BlockPayload::Link(l) => {
            text_input(&mut html, "url", "URL", &l.url);
            text_input(&mut html, "title", "Title", &l.title);
        }
        BlockPayload::Text(t) => textarea(&mut html, "content", "Text", &t.content),
    }

    html.push_str(
        "<button type=\"submit\" data-action=\"save\">Save</button>\
         <button type=\"button\" data-action=\"cancel\">Cancel</button></form>",
    );
    html
}

fn text_input(html: &mut String, name: &str, label: &str, value: &str) {
    let _ = write!(
        html,
        "<label>{label}<input type=\"text\" name=\"{name}\" value=\"{}\"></label>",
        escape_html(value)
    );
}

fn textarea(html: &mut String, name: &str, label: &str, value: &str) {
    let _ = write!(html, "<label>{label}<textarea name=\"{name}\">{}</textarea></label>", escape_html(value));
}

/// Full public page for a profile: themed shell, header, blocks in order and
/// the subscribe form. Blocks whose stored payload no longer parses are
/// skipped.
pub fn render_page(profile: &Profile, blocks: &[Block], theme: &Theme, public_url: &str) -> String {
    let name = profile.display_name.as_deref().unwrap_or(&profile.username);
    let title = escape_html(name);
    let radius = match theme.button_style {
        ButtonStyle::Rounded => "12px",
        ButtonStyle::Pill => "999px",
        ButtonStyle::Square => "0",
    };
    let width = match theme.layout {
        Layout::Centered => "560px",
        Layout::Wide => "880px",
    };

    let mut body = String::new();
    if let Some(avatar) = &profile.avatar_url {
        let _ = write!(body, "<img class=\"avatar\" src=\"{}\" alt=\"{title}\">", escape_html(avatar));
    }
    let _ = write!(body, "<h1>{title}</h1>");
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.trim().is_empty()) {
        let _ = write!(body, "<p class=\"bio\">{}</p>", escape_html(bio));
    }

    body.push_str("<section class=\"blocks\">");
    for block in blocks {
        match BlockPayload::parse(&block.block_type, block.data.clone()) {
            Ok(payload) => body.push_str(&render_view(&payload)),
            Err(e) => warn!("Skipping block {} on @{}: {}", block.id, profile.username, e),
        }
    }
    body.push_str("</section>");

    let _ = write!(
        body,
        "<form class=\"subscribe\" data-endpoint=\"/api/profiles/{username}/subscribe\">\
         <input type=\"email\" name=\"email\" placeholder=\"you@example.com\" required>\
         <button type=\"submit\">Subscribe</button></form>",
        username = escape_html(&profile.username)
    );

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="canonical" href="{canonical}">
<style>
:root {{ --bg: {bg}; --surface: {surface}; --text: {text}; --accent: {accent}; --font: {font}; --radius: {radius}; --width: {width}; }}
body {{ margin: 0; background: var(--bg); color: var(--text); font-family: var(--font); }}
main {{ max-width: var(--width); margin: 0 auto; padding: 48px 16px; text-align: center; }}
.avatar {{ width: 96px; height: 96px; border-radius: 50%; object-fit: cover; }}
.block {{ display: block; margin: 12px 0; padding: 16px; background: var(--surface); border-radius: var(--radius); color: inherit; text-decoration: none; }}
.block-link {{ border: 2px solid var(--accent); }}
.block-empty {{ opacity: 0.6; font-style: italic; }}
.block-image img {{ max-width: 100%; border-radius: var(--radius); }}
.size-small img {{ max-width: 40%; }}
.size-medium img {{ max-width: 70%; }}
.subscribe button {{ background: var(--accent); color: var(--bg); border: 0; border-radius: var(--radius); padding: 8px 16px; }}
</style>
</head>
<body data-theme="{theme_id}">
<main>{body}</main>
<script>
document.querySelectorAll("form.subscribe").forEach(function (form) {{
  form.addEventListener("submit", function (e) {{
    e.preventDefault();
    fetch(form.dataset.endpoint, {{
      method: "POST",
      headers: {{ "Content-Type": "application/json" }},
      body: JSON.stringify({{ email: form.email.value }})
    }}).then(function (r) {{ form.replaceWith(r.ok ? "Thanks for subscribing!" : "Could not subscribe."); }});
  }});
}});
</script>
</body>
</html>
"#,
        canonical = escape_html(&format!("{public_url}/{}", profile.username)),
        bg = theme.background,
        surface = theme.surface,
        text = theme.text,
        accent = theme.accent,
        font = theme.font_family,
        theme_id = theme.id,
    )
}

/// Directory of public profiles with a search box, used for the landing
/// page and `/explore`.
pub fn render_directory(
    heading: &str,
    entries: &[ExploreEntry],
    query: Option<&str>,
    theme: &Theme,
    public_url: &str,
) -> String {
    let heading = escape_html(heading);
    let mut body = String::new();
    let _ = write!(body, "<h1>{heading}</h1>");
    let _ = write!(
        body,
        "<form class=\"search\" action=\"/explore\" method=\"get\">\
         <input type=\"search\" name=\"q\" value=\"{}\" placeholder=\"Find a profile\" maxlength=\"64\">\
         <button type=\"submit\">Search</button></form>",
        escape_html(query.unwrap_or_default())
    );

    if entries.is_empty() {
        body.push_str("<p class=\"block block-empty\">No profiles found</p>");
    }
    body.push_str("<ul class=\"directory\">");
    for entry in entries {
        let profile = &entry.profile;
        let username = escape_html(&profile.username);
        let name = escape_html(profile.display_name.as_deref().unwrap_or(&profile.username));
        let _ = write!(body, "<li><a class=\"block block-link\" href=\"/{username}\"><strong>{name}</strong> @{username}");
        if let Some(bio) = profile.bio.as_deref().filter(|b| !b.trim().is_empty()) {
            let _ = write!(body, "<br><span class=\"bio\">{}</span>", escape_html(bio));
        }
        body.push_str("</a></li>");
    }
    body.push_str("</ul>");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{heading}</title>
<link rel="canonical" href="{canonical}">
<style>
:root {{ --bg: {bg}; --surface: {surface}; --text: {text}; --accent: {accent}; --font: {font}; }}
body {{ margin: 0; background: var(--bg); color: var(--text); font-family: var(--font); }}
main {{ max-width: 560px; margin: 0 auto; padding: 48px 16px; }}
.directory {{ list-style: none; padding: 0; }}
.block {{ display: block; margin: 12px 0; padding: 16px; background: var(--surface); border-radius: 12px; color: inherit; text-decoration: none; }}
.block-link {{ border: 2px solid var(--accent); }}
.block-empty {{ opacity: 0.6; font-style: italic; }}
</style>
</head>
<body data-theme="{theme_id}">
<main>{body}</main>
</body>
</html>
"#,
        canonical = escape_html(&format!("{public_url}/explore")),
        bg = theme.background,
        surface = theme.surface,
        text = theme.text,
        accent = theme.accent,
        font = theme.font_family,
        theme_id = theme.id,
    )
}
