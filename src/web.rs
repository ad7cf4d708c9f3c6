use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::display::{format_cell, row_matches, CellView};
use crate::schedule::{ColumnSchema, GridCell};
use crate::session::ScheduleSession;
use crate::widget::{GridConfig, GridData, ScheduleWidget, SearchConfig, WidgetHost};

/// What the mounted web widget last rendered.
#[derive(Default)]
pub struct BoardState {
    columns: Option<ColumnSchema>,
    data: Option<GridData>,
    search: Option<SearchConfig>,
    notice: Option<String>,
    version: u64,
}

pub type SharedBoard = Arc<RwLock<BoardState>>;

/// Widget host whose widgets publish into a [`SharedBoard`] read by the HTTP handlers.
pub struct WebHost {
    board: SharedBoard,
}

impl WebHost {
    pub fn new(board: SharedBoard) -> Self {
        Self { board }
    }
}

impl WidgetHost for WebHost {
    fn mount(&self, config: GridConfig) -> Box<dyn ScheduleWidget> {
        {
            let mut board = self.board.write().unwrap_or_else(|e| e.into_inner());
            board.columns = Some(config.columns);
            board.data = Some(config.data);
            board.search = Some(config.search);
            board.notice = None;
            board.version += 1;
        }
        Box::new(WebWidget {
            board: Arc::clone(&self.board),
            pending: None,
        })
    }
}

pub struct WebWidget {
    board: SharedBoard,
    pending: Option<GridData>,
}

impl ScheduleWidget for WebWidget {
    fn update_config(&mut self, data: GridData) {
        self.pending = Some(data);
    }

    fn force_render(&mut self) {
        let Some(data) = self.pending.take() else {
            return;
        };
        let mut board = self.board.write().unwrap_or_else(|e| e.into_inner());
        board.data = Some(data);
        board.notice = None;
        board.version += 1;
    }

    fn destroy(&mut self) {
        let mut board = self.board.write().unwrap_or_else(|e| e.into_inner());
        *board = BoardState::default();
    }

    fn notice(&mut self, message: &str) {
        tracing::info!("{message}");
        let mut board = self.board.write().unwrap_or_else(|e| e.into_inner());
        board.notice = Some(message.to_string());
    }
}

pub struct AppState {
    pub session: Arc<ScheduleSession>,
    pub board: SharedBoard,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
pub struct DateRequest {
    delta_days: Option<i64>,
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct DateResponse {
    date: NaiveDate,
    weekday: String,
}

#[derive(Serialize)]
pub struct BoardRow {
    teacher: String,
    cells: Vec<CellView>,
}

#[derive(Serialize)]
pub struct BoardResponse {
    date: NaiveDate,
    weekday: String,
    columns: Vec<String>,
    rows: Vec<BoardRow>,
    unassigned: usize,
    notice: Option<String>,
    version: u64,
}

fn date_response(date: NaiveDate) -> DateResponse {
    DateResponse {
        date,
        weekday: date.format("%A").to_string(),
    }
}

fn board_row(row: &[GridCell]) -> BoardRow {
    let mut teacher = String::new();
    let mut cells = Vec::with_capacity(row.len().saturating_sub(1));
    for cell in row {
        match cell {
            GridCell::Teacher { value, .. } => teacher = value.clone(),
            GridCell::Assignments(assignments) => cells.push(format_cell(assignments)),
        }
    }
    BoardRow { teacher, cells }
}

/// Builds the board payload, keeping only rows that match `query` when search is enabled.
pub fn board_response(board: &BoardState, query: Option<&str>) -> Option<BoardResponse> {
    let columns = board.columns.as_ref()?;
    let data = board.data.as_ref()?;
    let search = board.search.unwrap_or_default();

    let rows = data
        .rows
        .iter()
        .filter(|row| match query {
            Some(q) if search.enabled => row_matches(row, q, search.selector),
            _ => true,
        })
        .map(|row| board_row(row))
        .collect();

    Some(BoardResponse {
        date: data.date,
        weekday: data.date.format("%A").to_string(),
        columns: columns.columns.iter().map(|c| c.label.clone()).collect(),
        rows,
        unassigned: data.unassigned.len(),
        notice: board.notice.clone(),
        version: board.version,
    })
}

// Board endpoint
async fn get_schedule(
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let board = state.board.read().unwrap_or_else(|e| e.into_inner());
    match board_response(&board, query.q.as_deref()) {
        Some(response) => Ok(HttpResponse::Ok().json(response)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({"error": "Schedule not loaded yet"}))),
    }
}

async fn get_date(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(date_response(state.session.selected_date())))
}

// Date navigation endpoint
async fn change_date(
    req: web::Json<DateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let date = match (req.date, req.delta_days) {
        (Some(date), _) => {
            state.session.set_date(date);
            date
        }
        (None, Some(delta)) => state.session.change_date(delta),
        (None, None) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Expected 'date' or 'delta_days'"
            })))
        }
    };
    Ok(HttpResponse::Accepted().json(date_response(date)))
}

async fn reload(state: web::Data<AppState>) -> Result<HttpResponse> {
    state.session.request_reload();
    Ok(HttpResponse::Accepted().json(serde_json::json!({"success": true})))
}

async fn index() -> Result<HttpResponse> {
    let html = include_str!("../templates/index.html");
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/api/schedule", web::get().to(get_schedule))
        .route("/api/schedule/date", web::get().to(get_date))
        .route("/api/schedule/date", web::post().to(change_date))
        .route("/api/schedule/reload", web::post().to(reload));
}

pub async fn start_server(port: u16, session: Arc<ScheduleSession>, board: SharedBoard) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState { session, board });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
