//! JSON API over the roster, the payroll projection and the analyst.
//!
//! - `GET    /employees`           projected views (`department`, `search`, `sort`, `desc`)
//! - `POST   /employees`           add an employee
//! - `PUT    /employees/{id}`      replace an employee's attributes
//! - `DELETE /employees/{id}`      remove an employee
//! - `GET    /payroll`             views, summary, department totals and issues
//! - `POST   /analyst/messages`    one analyst turn on the shared session
//! - `GET    /analyst/history`     the shared session's history

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use paydesk_agent::{AnalystError, AnalystRuntime, AnalystSession, HistoryEntry};
use paydesk_core::payroll::{PayrollReport, SortKey};
use paydesk_core::{
    ApplicationError, Department, DomainError, Employee, EmployeeId, EmployeeView,
    InterfaceError, NewEmployee, PayrollComputationService, PayrollProjection, PayrollProjector,
    RosterStore, ViewQuery,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub type Projector = PayrollProjector<Arc<dyn PayrollComputationService>>;

#[derive(Clone)]
pub struct AppState {
    projector: Arc<Projector>,
    analyst: Arc<AnalystRuntime>,
    session: Arc<Mutex<Option<AnalystSession>>>,
}

impl AppState {
    pub fn new(projector: Projector, analyst: AnalystRuntime) -> Self {
        Self {
            projector: Arc::new(projector),
            analyst: Arc::new(analyst),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn roster(&self) -> &Arc<RosterStore> {
        self.projector.roster()
    }

    pub fn projector(&self) -> &Arc<Projector> {
        &self.projector
    }

    /// Recomputes in the background after a direct roster mutation.
    fn schedule_refresh(&self) {
        let projector = Arc::clone(&self.projector);
        tokio::spawn(async move {
            if let Err(error) = projector.refresh().await {
                warn!(
                    event_name = "payroll.background_refresh_failed",
                    error = %error,
                    "background payroll refresh failed"
                );
            }
        });
    }

    /// Shared session for the current projection, reopened when the roster has moved on.
    /// Returns the entries of any initial analysis run while reopening.
    async fn current_session<'a>(
        &self,
        slot: &'a mut Option<AnalystSession>,
    ) -> Result<(&'a mut AnalystSession, Vec<HistoryEntry>), ApiError> {
        let projection = self.projector.ensure_current().await.map_err(ApiError::from)?;
        let mut analysis = Vec::new();
        let current = matches!(slot, Some(session) if session.is_current(projection.generation()));
        if !current {
            let (session, report) = self.reopen(&projection).await?;
            analysis = report;
            *slot = Some(session);
        }
        match slot.as_mut() {
            Some(session) => Ok((session, analysis)),
            None => Err(ApiError::internal("analyst session unavailable")),
        }
    }

    async fn reopen(
        &self,
        projection: &PayrollProjection,
    ) -> Result<(AnalystSession, Vec<HistoryEntry>), ApiError> {
        let (session, report) = self.analyst.reopen(projection).await.map_err(ApiError::from)?;
        Ok((session, report.entries))
    }

    async fn converse(&self, text: String) -> Result<AnalystTurnResponse, ApiError> {
        let mut slot = self.session.lock().await;
        let (session, analysis) = self.current_session(&mut slot).await?;
        let report = self.analyst.submit_user_text(session, &text).await.map_err(ApiError::from)?;

        let mut response = AnalystTurnResponse {
            session_id: session.id().to_string(),
            entries: report.entries,
            roster_changed: report.roster_changed,
            agent_failed: report.agent_failed,
            analysis,
            projection_error: None,
        };

        if report.roster_changed {
            // the turn already happened; report a failed recompute alongside it
            let reopened = match self.projector.refresh().await {
                Ok(projection) => self.reopen(&projection).await,
                Err(error) => Err(ApiError::from(error)),
            };
            match reopened {
                Ok((session, analysis)) => {
                    response.session_id = session.id().to_string();
                    response.analysis = analysis;
                    *slot = Some(session);
                }
                Err(error) => {
                    let detail = error.detail().to_string();
                    warn!(
                        event_name = "analyst.session_reopen_deferred",
                        session_id = %response.session_id,
                        error = %detail,
                        "payroll recompute failed after roster change; keeping current session"
                    );
                    response.projection_error = Some(detail);
                }
            }
        }

        Ok(response)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route("/employees/{id}", put(update_employee).delete(delete_employee))
        .route("/payroll", get(payroll_report))
        .route("/analyst/messages", post(post_message))
        .route("/analyst/history", get(analyst_history))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    pub department: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub desc: Option<bool>,
}

impl ViewParams {
    fn query(self) -> Result<ViewQuery, ApiError> {
        let department = self
            .department
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse::<Department>())
            .transpose()
            .map_err(ApiError::from)?;
        let sort = self
            .sort
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse::<SortKey>())
            .transpose()
            .map_err(ApiError::from)?;
        Ok(ViewQuery {
            department,
            search: self.search,
            sort,
            descending: self.desc.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeBody {
    pub name: String,
    pub department: Department,
    pub role: String,
    pub salary: Decimal,
    #[serde(default = "default_hours_worked")]
    pub hours_worked: Decimal,
    #[serde(default)]
    pub overtime_hours: Decimal,
}

fn default_hours_worked() -> Decimal {
    Decimal::from(160)
}

impl EmployeeBody {
    fn into_new_employee(self) -> NewEmployee {
        NewEmployee {
            name: self.name,
            department: self.department,
            role: self.role,
            salary: self.salary,
            hours_worked: self.hours_worked,
            overtime_hours: self.overtime_hours,
        }
    }

    fn into_employee(self, id: EmployeeId) -> Employee {
        Employee {
            id,
            name: self.name,
            department: self.department,
            role: self.role,
            salary: self.salary,
            hours_worked: self.hours_worked,
            overtime_hours: self.overtime_hours,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystTurnResponse {
    pub session_id: String,
    pub entries: Vec<HistoryEntry>,
    pub roster_changed: bool,
    pub agent_failed: bool,
    /// Initial analysis of a session opened during this request.
    pub analysis: Vec<HistoryEntry>,
    /// Why the payroll could not be recomputed after this turn changed the roster.
    /// The previous session stays active until a later request succeeds.
    pub projection_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystHistoryResponse {
    pub session_id: String,
    pub generation: u64,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    detail: String,
    correlation_id: String,
}

/// Interface-tier error rendered as JSON with a matching status code.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self(InterfaceError::Internal { message: message.into(), correlation_id: correlation_id() })
    }

    fn not_found(id: EmployeeId) -> Self {
        ApplicationError::from(DomainError::EmployeeNotFound(id)).into()
    }

    fn detail(&self) -> &str {
        match &self.0 {
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::NotFound { message, .. }
            | InterfaceError::ServiceUnavailable { message, .. }
            | InterfaceError::Internal { message, .. } => message,
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self(error.into_interface(correlation_id()))
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<AnalystError> for ApiError {
    fn from(error: AnalystError) -> Self {
        match error {
            AnalystError::EmptyMessage => Self(InterfaceError::BadRequest {
                message: error.to_string(),
                correlation_id: correlation_id(),
            }),
            AnalystError::Turn(turn) => Self::internal(turn.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = self.detail().to_string();
        if status.is_server_error() {
            warn!(
                event_name = "server.request_failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        }
        let body = ErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn list_employees(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Result<Json<Vec<EmployeeView>>, ApiError> {
    let query = params.query()?;
    let projection = state.projector.ensure_current().await?;
    Ok(Json(query.apply(projection.views())))
}

pub async fn create_employee(
    State(state): State<AppState>,
    Json(body): Json<EmployeeBody>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let employee = state.roster().create(body.into_new_employee())?;
    info!(
        event_name = "server.employee_created",
        employee_id = %employee.id,
        "employee created over http"
    );
    state.schedule_refresh();
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<EmployeeBody>,
) -> Result<Json<Employee>, ApiError> {
    let id = EmployeeId(id);
    state.roster().update(body.into_employee(id))?;
    state.schedule_refresh();
    state.roster().get(id).map(Json).ok_or_else(|| ApiError::not_found(id))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let id = EmployeeId(id);
    if !state.roster().delete(id) {
        return Err(ApiError::not_found(id));
    }
    state.schedule_refresh();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn payroll_report(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Result<Json<PayrollReport>, ApiError> {
    let query = params.query()?;
    let projection = state.projector.ensure_current().await?;
    Ok(Json(PayrollReport::build(&projection, &query)))
}

pub async fn post_message(
    State(state): State<AppState>,
    Json(body): Json<MessageBody>,
) -> Result<Json<AnalystTurnResponse>, ApiError> {
    // a dropped connection must not abandon a turn between tool execution and follow-up
    let turn = tokio::spawn(async move { state.converse(body.text).await });
    match turn.await {
        Ok(result) => result.map(Json),
        Err(error) => Err(ApiError::internal(format!("analyst turn aborted: {error}"))),
    }
}

pub async fn analyst_history(
    State(state): State<AppState>,
) -> Result<Json<AnalystHistoryResponse>, ApiError> {
    let mut slot = state.session.lock().await;
    let (session, _) = state.current_session(&mut slot).await?;
    Ok(Json(AnalystHistoryResponse {
        session_id: session.id().to_string(),
        generation: session.generation(),
        entries: session.history().entries().to_vec(),
    }))
}
