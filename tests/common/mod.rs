//! Common test utilities
//!
//! A small replica of the website served with axum, a stand-in edit server
//! and Chrome detection shared by the integration tests.

#![allow(dead_code)]

use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use naamani_e2e::config::Config;
use naamani_e2e::session::ChromeLauncher;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const NAME_COUNT: u32 = 1000;

/// An axum app bound to an ephemeral local port
pub struct Fixture {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl Fixture {
    async fn serve(app: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, handle }
    }

    /// Replica of the public site
    pub async fn site() -> Self {
        let app = Router::new()
            .route("/", get(home))
            .route("/home/styles.css", get(home_styles))
            .route("/naamani/", get(names_list))
            .route("/static/names.css", get(name_styles))
            .route("/data/:file", get(name_data))
            .route("/naamani/:n/", get(name_page));
        Self::serve(app).await
    }

    /// Edit server answering the health check and file reads
    pub async fn edit_server() -> Self {
        let app = Router::new()
            .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
            .route("/api/read", get(read_file));
        Self::serve(app).await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Skip the calling test when no Chrome binary is installed
pub fn chrome_available() -> bool {
    match ChromeLauncher::find_chrome(None) {
        Ok(_) => true,
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            false
        }
    }
}

/// Headless config pointed at the fixture site
pub fn chrome_config(base_url: &str) -> Config {
    Config {
        base_url: base_url.to_string(),
        // Nothing listens here
        edit_server_url: "http://127.0.0.1:9".to_string(),
        headless: true,
        no_sandbox: true,
        case_timeout_ms: 20_000,
        probe_timeout_ms: 500,
        concurrency: 2,
        ..Default::default()
    }
}

/// Devanagari digits for a name number
pub fn sanskrit_numeral(n: u32) -> String {
    n.to_string()
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(0x0966 + d).unwrap_or(c),
            None => c,
        })
        .collect()
}

async fn home() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>KaamakshiDarpanam</title>
  <link rel="stylesheet" href="home/styles.css">
</head>
<body>
  <img class="kamakshi" src="home/kamakshi.jpg" alt="Sri Kamakshi">
  <p class="sloka">सिन्दूरारुणविग्रहां त्रिनयनां</p>
  <a class="main-link" href="naamani/">ललितासहस्रनामानि</a>
</body>
</html>"#,
    )
}

async fn home_styles() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css")],
        r#"
body { font-family: serif; }
.main-link { font-size: 2rem; color: rgb(0, 0, 255); transition: color 0.2s; }
.main-link:hover { color: rgb(255, 0, 0); }
"#,
    )
}

async fn names_list() -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Lalita Sahasranama - All Names Index</title>
  <link rel="stylesheet" href="/static/names.css">
</head>
<body>
  <a class="home-button" href="../">Home</a>
  <input id="searchBox" type="text" placeholder="Search">
  <div id="names"></div>
  <script>
    var list = document.getElementById('names');
    for (var i = 1; i <= {count}; i++) {{
      var card = document.createElement('a');
      card.className = 'name-card';
      card.href = i + '/';
      card.textContent = 'नाम ' + i;
      list.appendChild(card);
    }}
  </script>
</body>
</html>"#,
        count = NAME_COUNT
    ))
}

async fn name_styles() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css")],
        r#"
.name-card { display: block; padding: 4px; }
.name-title { font-weight: bold; }
button:disabled { opacity: 0.4; }
.collapsible-content { max-height: 0; overflow: hidden; }
.collapsible-content.expanded { max-height: none; }
"#,
    )
}

async fn name_data(Path(file): Path<String>) -> impl IntoResponse {
    let n = file.trim_end_matches(".json");
    Json(json!({ "number": n, "meaning": format!("meaning of {}", n) }))
}

async fn name_page(Path(n): Path<u32>) -> impl IntoResponse {
    if n == 0 || n > NAME_COUNT {
        return (StatusCode::NOT_FOUND, Html("not found".to_string()));
    }
    let prev_disabled = if n == 1 { " disabled" } else { "" };
    let next_disabled = if n == NAME_COUNT { " disabled" } else { "" };

    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Lalita Sahasranama - {n}</title>
  <link rel="stylesheet" href="/static/names.css">
</head>
<body>
  <div class="number-row"><span id="nameNumber">{numeral}</span></div>
  <h1 class="name-title">नाम {n}</h1>
  <p class="name-meaning">Loading...</p>
  <button id="prevBtn"{prev_disabled}>‹ Prev</button>
  <button id="nextBtn"{next_disabled}>Next ›</button>
  <div id="content">
    <section id="mantra-section">नाममन्त्रः</section>
    <section id="balatapa-section">बालातपा</section>
    <div class="collapsible-commentary-header jayamangala collapsed">जयमङ्गला</div>
    <div id="jayamangala-collapsible" class="collapsible-content">commentary</div>
  </div>
  <script>
    var n = {n};
    function go(to) {{ location.href = '../' + to + '/'; }}
    document.getElementById('prevBtn').addEventListener('click', function () {{ go(n - 1); }});
    document.getElementById('nextBtn').addEventListener('click', function () {{ go(n + 1); }});
    document.querySelector('.number-row').addEventListener('click', function () {{ location.href = '../'; }});
    document.addEventListener('keydown', function (e) {{
      if (e.key === 'ArrowRight' && n < {count}) go(n + 1);
      if (e.key === 'ArrowLeft' && n > 1) go(n - 1);
    }});
    var header = document.querySelector('.collapsible-commentary-header.jayamangala');
    header.addEventListener('click', function () {{
      header.classList.toggle('collapsed');
      document.getElementById('jayamangala-collapsible').classList.toggle('expanded');
    }});
    fetch('/data/' + n + '.json?t=' + Date.now())
      .then(function (r) {{ return r.json(); }})
      .then(function (data) {{ document.querySelector('.name-meaning').textContent = data.meaning; }});
  </script>
</body>
</html>"#,
        n = n,
        numeral = sanskrit_numeral(n),
        prev_disabled = prev_disabled,
        next_disabled = next_disabled,
        count = NAME_COUNT,
    );
    (StatusCode::OK, Html(body))
}

async fn read_file(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    match params.get("file") {
        Some(file) => Json(json!({ "success": true, "content": format!("contents of {}", file) })),
        None => Json(json!({ "success": false, "error": "missing file parameter" })),
    }
}
