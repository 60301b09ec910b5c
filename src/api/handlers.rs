//! HTTP request handlers for the Timesheet Engine API.
//!
//! This module contains the handler functions for all API endpoints.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{CompensatoryDayConfig, HolidayConfig, PayTermsConfig};
use crate::error::EngineError;
use crate::models::{ApprovedRequest, MonthKey};
use crate::recalc::RecalcTrigger;

use super::request::{ExemptionRequest, FinalizeRequest, PunchRequest};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/punches", post(punch_handler))
        .route(
            "/entries/:employee_id/:date",
            get(entry_handler).delete(delete_entry_handler),
        )
        .route("/payroll/:employee_id/:date", get(payroll_handler))
        .route("/finalize", post(finalize_handler))
        .route("/recalculations", post(recalculation_handler))
        .route("/monthly/:employee_id/:year/:month", get(monthly_handler))
        .route("/requests", post(approve_request_handler))
        .route("/requests/:id", delete(revoke_request_handler))
        .route("/exemptions", post(exemption_handler))
        .route("/exemptions/:employee_id", delete(clear_exemption_handler))
        .route("/calendar/holidays", post(holiday_handler))
        .route("/calendar/compensatory-days", post(compensatory_day_handler))
        .route("/pay-terms", post(pay_terms_handler))
        .with_state(state)
}

/// Body returned when work has been queued.
#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
    trigger: &'static str,
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}

fn engine_error(correlation_id: Uuid, err: EngineError) -> Response {
    warn!(correlation_id = %correlation_id, error = %err, "Request failed");
    ApiErrorResponse::from(err).into_response()
}

fn json_rejection(correlation_id: Uuid, rejection: JsonRejection) -> Response {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    json_response(StatusCode::BAD_REQUEST, &error)
}

fn path_rejection(correlation_id: Uuid, rejection: PathRejection) -> Response {
    let body_text = rejection.body_text();
    warn!(correlation_id = %correlation_id, error = %body_text, "Invalid path");
    json_response(
        StatusCode::BAD_REQUEST,
        &ApiError::validation_error(body_text),
    )
}

async fn enqueue(state: &AppState, correlation_id: Uuid, trigger: RecalcTrigger) -> Response {
    let kind = trigger.kind();
    match state.queue().enqueue(trigger).await {
        Ok(()) => {
            info!(correlation_id = %correlation_id, trigger = kind, "Recalculation queued");
            json_response(
                StatusCode::ACCEPTED,
                &Accepted {
                    status: "accepted",
                    trigger: kind,
                },
            )
        }
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for POST /punches.
async fn punch_handler(
    State(state): State<AppState>,
    payload: Result<Json<PunchRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    info!(
        correlation_id = %correlation_id,
        employee_id = %request.employee_id,
        timestamp = %request.timestamp,
        "Recording punch"
    );

    let start_time = Instant::now();
    match state
        .recalculator()
        .record_punch(&request.employee_id, request.timestamp)
    {
        Ok(entry) => {
            info!(
                correlation_id = %correlation_id,
                employee_id = %entry.employee_id,
                date = %entry.date,
                duration_us = start_time.elapsed().as_micros() as u64,
                "Punch processed"
            );
            json_response(StatusCode::OK, &entry)
        }
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for GET /entries/:employee_id/:date.
async fn entry_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, NaiveDate)>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let (employee_id, date) = match path {
        Ok(Path(params)) => params,
        Err(rejection) => return path_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, employee_id = %employee_id, date = %date, "Fetching entry");

    match state.recalculator().entry(&employee_id, date) {
        Ok(entry) => json_response(StatusCode::OK, &entry),
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for DELETE /entries/:employee_id/:date.
async fn delete_entry_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, NaiveDate)>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let (employee_id, date) = match path {
        Ok(Path(params)) => params,
        Err(rejection) => return path_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, employee_id = %employee_id, date = %date, "Deleting entry");

    match state.recalculator().delete_entry(&employee_id, date) {
        Ok(entry) => json_response(StatusCode::OK, &entry),
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for GET /payroll/:employee_id/:date.
async fn payroll_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, NaiveDate)>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let (employee_id, date) = match path {
        Ok(Path(params)) => params,
        Err(rejection) => return path_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, employee_id = %employee_id, date = %date, "Fetching payroll snapshot");

    match state.recalculator().entry(&employee_id, date) {
        Ok(entry) => json_response(StatusCode::OK, &entry.payroll_snapshot()),
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for POST /finalize.
///
/// Runs the end-of-day pass for the given date, or yesterday. Dates that
/// have not ended are rejected.
async fn finalize_handler(
    State(state): State<AppState>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    let today = state.recalculator().today();
    let date = request
        .date
        .unwrap_or_else(|| today.pred_opt().unwrap_or(today));
    info!(correlation_id = %correlation_id, date = %date, "Finalizing day");

    match state.recalculator().finalize_day(date).await {
        Ok(report) => json_response(StatusCode::OK, &report),
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for POST /recalculations.
async fn recalculation_handler(
    State(state): State<AppState>,
    payload: Result<Json<RecalcTrigger>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let trigger = match payload {
        Ok(Json(trigger)) => trigger,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, trigger = trigger.kind(), "Received trigger");

    // Reject malformed ranges here; the worker would only drop them.
    let recalculator = state.recalculator();
    if let Err(err) =
        trigger.affected_scope(recalculator.sources().directory.as_ref(), recalculator.today())
    {
        return engine_error(correlation_id, err);
    }
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for GET /monthly/:employee_id/:year/:month.
async fn monthly_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, i32, u32)>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let (employee_id, year, month) = match path {
        Ok(Path(params)) => params,
        Err(rejection) => return path_rejection(correlation_id, rejection),
    };
    if !(1..=12).contains(&month) {
        warn!(correlation_id = %correlation_id, month, "Month out of range");
        return json_response(
            StatusCode::BAD_REQUEST,
            &ApiError::validation_error(format!("month must be between 1 and 12, got {}", month)),
        );
    }
    let month = MonthKey { year, month };
    info!(correlation_id = %correlation_id, employee_id = %employee_id, month = %month, "Fetching monthly summary");

    match state.recalculator().store().get_monthly(&employee_id, month) {
        Ok(Some(monthly)) => json_response(StatusCode::OK, &monthly.summary()),
        Ok(None) => json_response(
            StatusCode::NOT_FOUND,
            &ApiError::not_found(format!(
                "No monthly timesheet for '{}' in {}",
                employee_id, month
            )),
        ),
        Err(err) => engine_error(correlation_id, err),
    }
}

/// Handler for POST /requests.
///
/// Records an approval and queues recalculation of the dates it covers.
async fn approve_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<ApprovedRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    if request.end_date < request.start_date {
        return engine_error(
            correlation_id,
            EngineError::InvalidDateRange {
                from: request.start_date,
                to: request.end_date,
            },
        );
    }
    info!(
        correlation_id = %correlation_id,
        request_id = request.id,
        employee_id = %request.employee_id,
        request_type = ?request.request_type,
        "Request approved"
    );

    let trigger = RecalcTrigger::RequestApproved {
        employee_id: request.employee_id.clone(),
        request_id: request.id,
        start_date: request.start_date,
        end_date: request.end_date,
    };
    let replaced = state.requests().approve(request);

    // Dates only the replaced version covered must drop the old request.
    if let Some(previous) = replaced.filter(|previous| {
        RecalcTrigger::RequestApproved {
            employee_id: previous.employee_id.clone(),
            request_id: previous.id,
            start_date: previous.start_date,
            end_date: previous.end_date,
        } != trigger
    }) {
        info!(
            correlation_id = %correlation_id,
            request_id = previous.id,
            start_date = %previous.start_date,
            end_date = %previous.end_date,
            "Replaced request dates queued for recalculation"
        );
        let revoked = RecalcTrigger::RequestRevoked {
            employee_id: previous.employee_id,
            request_id: previous.id,
            start_date: previous.start_date,
            end_date: previous.end_date,
        };
        if let Err(err) = state.queue().enqueue(revoked).await {
            return engine_error(correlation_id, err);
        }
    }
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for DELETE /requests/:id.
async fn revoke_request_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let id = match path {
        Ok(Path(id)) => id,
        Err(rejection) => return path_rejection(correlation_id, rejection),
    };

    let Some(request) = state.requests().revoke(id) else {
        warn!(correlation_id = %correlation_id, request_id = id, "Request not found");
        return json_response(
            StatusCode::NOT_FOUND,
            &ApiError::not_found(format!("No approved request with id {}", id)),
        );
    };
    info!(correlation_id = %correlation_id, request_id = id, employee_id = %request.employee_id, "Request revoked");

    let trigger = RecalcTrigger::RequestRevoked {
        employee_id: request.employee_id,
        request_id: request.id,
        start_date: request.start_date,
        end_date: request.end_date,
    };
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for POST /exemptions.
async fn exemption_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExemptionRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    if let Some(to) = request.to.filter(|to| *to < request.from) {
        return engine_error(
            correlation_id,
            EngineError::InvalidDateRange {
                from: request.from,
                to,
            },
        );
    }
    info!(correlation_id = %correlation_id, employee_id = %request.employee_id, from = %request.from, "Exemption recorded");

    state
        .exemptions()
        .exempt(request.employee_id.clone(), request.period());
    let trigger = RecalcTrigger::ExemptionChanged {
        employee_id: request.employee_id,
        from: request.from,
        to: request.to,
    };
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for DELETE /exemptions/:employee_id.
///
/// Removes every exemption of the employee and queues recalculation of the
/// dates they covered.
async fn clear_exemption_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let employee_id = match path {
        Ok(Path(employee_id)) => employee_id,
        Err(rejection) => return path_rejection(correlation_id, rejection),
    };

    let removed = state.exemptions().clear(&employee_id);
    let Some(from) = removed.iter().map(|p| p.from).min() else {
        warn!(correlation_id = %correlation_id, employee_id = %employee_id, "No exemption to remove");
        return json_response(
            StatusCode::NOT_FOUND,
            &ApiError::not_found(format!("No exemption recorded for '{}'", employee_id)),
        );
    };
    let to = if removed.iter().any(|p| p.to.is_none()) {
        None
    } else {
        removed.iter().filter_map(|p| p.to).max()
    };
    info!(correlation_id = %correlation_id, employee_id = %employee_id, periods = removed.len(), "Exemption removed");

    let trigger = RecalcTrigger::ExemptionChanged {
        employee_id,
        from,
        to,
    };
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for POST /calendar/holidays.
async fn holiday_handler(
    State(state): State<AppState>,
    payload: Result<Json<HolidayConfig>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let holiday = match payload {
        Ok(Json(holiday)) => holiday,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, date = %holiday.date, name = %holiday.name, "Holiday declared");

    let date = holiday.date;
    state.calendar().add_holiday(holiday);
    let trigger = RecalcTrigger::ScheduleChanged {
        employee_id: None,
        from: date,
        to: Some(date),
    };
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for POST /calendar/compensatory-days.
async fn compensatory_day_handler(
    State(state): State<AppState>,
    payload: Result<Json<CompensatoryDayConfig>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let day = match payload {
        Ok(Json(day)) => day,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, date = %day.date, "Makeup day declared");

    let date = day.date;
    state.calendar().add_compensatory_day(day);
    let trigger = RecalcTrigger::ScheduleChanged {
        employee_id: None,
        from: date,
        to: Some(date),
    };
    enqueue(&state, correlation_id, trigger).await
}

/// Handler for POST /pay-terms.
///
/// Terms may take effect in the past; affected entries are recomputed from
/// the effective date up to today.
async fn pay_terms_handler(
    State(state): State<AppState>,
    payload: Result<Json<PayTermsConfig>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let terms = match payload {
        Ok(Json(terms)) => terms,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    info!(correlation_id = %correlation_id, effective_date = %terms.effective_date, "Pay terms recorded");

    let effective_from = terms.effective_date;
    state.calendar().upsert_pay_terms(terms);
    let trigger = RecalcTrigger::PayTermsChanged {
        employee_id: None,
        effective_from,
    };
    enqueue(&state, correlation_id, trigger).await
}
