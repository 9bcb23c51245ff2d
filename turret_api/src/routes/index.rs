//! `GET /`: serves the bundled HTML dashboard with `BASE_URL`
//! substituted from the request's `Host` header.

use axum::extract::State;
use axum::http::header::HOST;
use axum::http::HeaderMap;
use axum::response::Html;

use crate::state::AppState;

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let base_url = format!("http://{host}");
    let content = state.index_html.replace(
        "const BASE_URL = 'REPLACEMEPLEASE';",
        &format!("const BASE_URL = '{base_url}';"),
    );
    Html(content)
}
