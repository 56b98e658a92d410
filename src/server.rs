use std::fs;

use actix_web::{App, HttpResponse, HttpServer, Responder, get, post, web};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};

use crate::acquisition::run_acquisition;
use crate::config::{Settings, clamp_pages};
use crate::driver::Progress;
use crate::export::{export_matches, export_records};
use crate::matcher::{KeywordQuery, MatchError, MatchMode, match_records};
use crate::model::{ListedTender, MatchedRecord};
use crate::store::read_store;

pub struct AppState {
    pub settings: Settings,
    /// Held for the whole of an acquisition; one browser run at a time.
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self { settings, run_lock: Mutex::new(()) }
    }
}

// -------------------------
// Request / Response Types
// -------------------------

#[derive(Deserialize, Default)]
struct FetchReq {
    pages: Option<i64>,
    keyword: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchResp<'a> {
    pages: u32,
    keyword: String,
    fetched_at: String,
    total_tenders_in_cache: usize,
    tenders: Vec<ListedTender<'a>>,
}

#[derive(Deserialize)]
struct SearchReq {
    include: Option<String>,
    exclude: Option<String>,
    mode: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResp {
    total_tenders_in_cache: usize,
    match_count: usize,
    csv_path: &'static str,
    matches: Vec<MatchedRecord>,
}

fn error_json(e: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "error": e.to_string() })
}

fn csv_response(filename: &str, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/csv; charset=utf-8"))
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{filename}\"")))
        .body(body)
}

// -------------------------
// HTTP Handlers
// -------------------------

#[get("/api/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

#[post("/api/fetch")]
async fn fetch(state: web::Data<AppState>, body: Option<web::Json<FetchReq>>) -> impl Responder {
    let req = body.map(web::Json::into_inner).unwrap_or_default();
    let pages = clamp_pages(req.pages);
    let keyword = req.keyword.unwrap_or_default().trim().to_string();

    info!("fetching tenders (keyword={keyword:?}, pages={pages})");
    let result = {
        let _guard = state.run_lock.lock().await;
        run_acquisition(&state.settings, pages, &keyword, None).await
    };
    if let Err(e) = result {
        error!("fetch failed: {e:#}");
        return HttpResponse::InternalServerError().json(error_json(format!("{e:#}")));
    }

    let records = read_store(&state.settings.store_path());
    let resp = FetchResp {
        pages,
        keyword,
        fetched_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        total_tenders_in_cache: records.len(),
        tenders: records.iter().map(ListedTender::from).collect(),
    };
    HttpResponse::Ok().json(resp)
}

// --------------
// SSE streaming
// --------------

#[derive(Deserialize)]
struct StreamParams {
    pages: Option<i64>,
    keyword: Option<String>,
}

fn sse_event(event: &str, data_json: &str) -> Bytes {
    let payload = format!("event: {}\ndata: {}\n\n", event, data_json);
    Bytes::from(payload)
}

#[get("/api/fetch/stream")]
async fn fetch_stream(state: web::Data<AppState>, q: web::Query<StreamParams>) -> impl Responder {
    let (tx, mut rx) = mpsc::channel::<Bytes>(32);
    let pages = clamp_pages(q.pages);
    let keyword = q.keyword.clone().unwrap_or_default().trim().to_string();

    actix_web::rt::spawn(async move {
        let _guard = state.run_lock.lock().await;
        let (ptx, mut prx) = mpsc::channel::<Progress>(32);

        let run = run_acquisition(&state.settings, pages, &keyword, Some(ptx));
        let forward = async {
            while let Some(p) = prx.recv().await {
                let data = serde_json::to_string(&p).unwrap_or_default();
                let _ = tx.send(sse_event(p.event(), &data)).await;
            }
        };
        let (result, ()) = tokio::join!(run, forward);

        let final_event = match result {
            Ok(count) => sse_event("saved", &serde_json::json!({ "count": count }).to_string()),
            Err(e) => sse_event("error", &error_json(format!("{e:#}")).to_string()),
        };
        let _ = tx.send(final_event).await;
    });

    let stream = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, actix_web::Error>(chunk);
        }
    };

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

#[post("/api/search")]
async fn search(state: web::Data<AppState>, body: web::Json<SearchReq>) -> impl Responder {
    let include = body.include.clone().unwrap_or_default();
    let exclude = body.exclude.clone().unwrap_or_default();
    let mode: MatchMode = body.mode.as_deref().unwrap_or("ANY").parse().unwrap_or_default();

    let query = match KeywordQuery::new(&include, &exclude, mode) {
        Ok(q) => q,
        Err(e @ MatchError::EmptyInclude) => return HttpResponse::BadRequest().json(error_json(e)),
    };

    let records = read_store(&state.settings.store_path());
    let matches = match_records(&records, &query);
    if let Err(e) = export_matches(&state.settings.matches_csv_path(), &matches) {
        error!("writing matches csv failed: {e:#}");
        return HttpResponse::InternalServerError().json(error_json(format!("{e:#}")));
    }

    HttpResponse::Ok().json(SearchResp {
        total_tenders_in_cache: records.len(),
        match_count: matches.len(),
        csv_path: "/api/download/matches.csv",
        matches,
    })
}

#[get("/api/download/all.csv")]
async fn download_all(state: web::Data<AppState>) -> impl Responder {
    let path = state.settings.all_csv_path();
    let records = read_store(&state.settings.store_path());
    let written = export_records(&path, &records).and_then(|_| Ok(fs::read(&path)?));
    match written {
        Ok(body) => csv_response("all.csv", body),
        Err(e) => HttpResponse::InternalServerError().json(error_json(format!("{e:#}"))),
    }
}

#[get("/api/download/matches.csv")]
async fn download_matches(state: web::Data<AppState>) -> impl Responder {
    match fs::read(state.settings.matches_csv_path()) {
        Ok(body) => csv_response("matches.csv", body),
        Err(_) => HttpResponse::NotFound().body("No CSV generated yet. Run a search first."),
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(fetch)
        .service(fetch_stream)
        .service(search)
        .service(download_all)
        .service(download_matches);
}

pub async fn serve(settings: Settings, bind: &str) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(settings));
    info!("listening on {bind}");
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(bind)?
        .run()
        .await
}
