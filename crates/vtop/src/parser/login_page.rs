//! Field extraction from the landing, prelogin and post-login pages.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static CSRF_INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[name="_csrf"]"#).unwrap());
static CSRF_META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="_csrf"]"#).unwrap());
static CAPTCHA_IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"img[src^="data:image"]"#).unwrap());
static FORM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static CAPTCHA_INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[name="captchaStr"]"#).unwrap());
static AUTHORIZED_ID_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input#authorizedID, input[name="authorizedID"], input#authorizedIDX"#)
        .unwrap()
});
static CAPTCHA_DATA_URI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/[A-Za-z+.\-]+;base64,[A-Za-z0-9+/=\s]{16,}").unwrap()
});

/// The `_csrf` value from a hidden input, falling back to the meta tag.
pub fn csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&CSRF_INPUT_SELECTOR)
        .filter_map(|el| el.value().attr("value"))
        .chain(
            document
                .select(&CSRF_META_SELECTOR)
                .filter_map(|el| el.value().attr("content")),
        )
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// The inline captcha bitmap as a complete `data:image/...;base64,` URI.
pub fn captcha_data_uri(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let from_img = document
        .select(&CAPTCHA_IMG_SELECTOR)
        .filter_map(|el| el.value().attr("src"))
        .find(|src| src.contains(";base64,"));

    let raw = match from_img {
        Some(src) => src.to_string(),
        // Sometimes the image is injected by script instead of markup
        None => CAPTCHA_DATA_URI_REGEX.find(html)?.as_str().to_string(),
    };

    let uri: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (_, payload) = uri.split_once(";base64,")?;
    (!payload.is_empty()).then_some(uri)
}

/// The `action` of the form that carries the captcha field, if any.
pub fn login_form_action(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&FORM_SELECTOR)
        .find(|form| form.select(&CAPTCHA_INPUT_SELECTOR).next().is_some())
        .and_then(|form| form.value().attr("action"))
        .map(str::trim)
        .filter(|action| !action.is_empty() && !action.starts_with("javascript:"))
        .map(str::to_string)
}

/// The authenticated subject id rendered into the post-login page.
pub fn authorized_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&AUTHORIZED_ID_SELECTOR)
        .filter_map(|el| el.value().attr("value"))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
