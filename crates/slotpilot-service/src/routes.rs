//! HTTP routes
//!
//! | route | body |
//! |---|---|
//! | `POST /availability` | [`AvailabilityRequestDto`] |
//! | `POST /bookings` | [`BookingRequestDto`] |
//! | `POST /automate` | [`AutomateRequestDto`] |
//! | `GET /health` | none |

use crate::dto::{
    resolve_professional, AutomateAction, AutomateRequestDto, AvailabilityRequestDto,
    AvailabilityResponse, BookingOutcome, BookingRequestDto, ErrorResponse, HealthResponse,
};
use chrono::NaiveDate;
use slotpilot_engine::{AvailabilityQuery, BookingEngine, BookingError, ErrorCode};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{json, with_status, Json, WithStatus};
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    engine: Arc<BookingEngine>,
    default_professional: Option<String>,
}

impl AppState {
    /// Create handler state
    #[must_use]
    pub fn new(engine: Arc<BookingEngine>, default_professional: Option<String>) -> Self {
        Self {
            engine,
            default_professional,
        }
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    async fn availability(&self, body: AvailabilityRequestDto) -> WithStatus<Json> {
        let professional =
            match resolve_professional(body.professional_id, self.default_professional.as_deref()) {
                Ok(professional) => professional,
                Err(e) => return error_reply(&e),
            };
        let query = AvailabilityQuery::new(professional, body.date.unwrap_or_else(Self::today));

        match self.engine.check_availability(&query).await {
            Ok(result) => with_status(json(&AvailabilityResponse::from(result)), StatusCode::OK),
            Err(e) => {
                tracing::warn!("Availability check failed: {}", e);
                error_reply(&e)
            }
        }
    }

    async fn book(&self, body: BookingRequestDto) -> WithStatus<Json> {
        let request = match body.into_request(self.default_professional.as_deref()) {
            Ok(request) => request,
            Err(e) => return error_reply(&e),
        };

        match BookingOutcome::from(self.engine.book(request).await) {
            BookingOutcome::Booked(body) => with_status(json(&body), StatusCode::OK),
            BookingOutcome::Failed(body) => {
                let status = status_for(body.code);
                with_status(json(&body), status)
            }
        }
    }

    async fn automate(&self, body: AutomateRequestDto) -> WithStatus<Json> {
        match body.action() {
            Ok(AutomateAction::Check) => self.availability(body.availability()).await,
            Ok(AutomateAction::Book) => match body.booking(Self::today()) {
                Ok(booking) => self.book(booking).await,
                Err(e) => error_reply(&e),
            },
            Err(e) => error_reply(&e),
        }
    }
}

/// HTTP status for an error code
#[must_use]
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::InvalidState => StatusCode::BAD_REQUEST,
        ErrorCode::ProfessionalNotFound | ErrorCode::ClientNotFound | ErrorCode::ServiceNotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorCode::SlotUnavailable | ErrorCode::ProfessionalAmbiguous => StatusCode::CONFLICT,
        ErrorCode::InvalidConfiguration => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::AuthenticationError
        | ErrorCode::ExternalSystemRejected
        | ErrorCode::ExternalSystemError => StatusCode::BAD_GATEWAY,
        ErrorCode::TransientUiError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn error_reply(error: &BookingError) -> WithStatus<Json> {
    with_status(json(&ErrorResponse::from(error)), status_for(error.code()))
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// All routes, with CORS and rejection handling
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let availability = warp::path("availability")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body::<AvailabilityRequestDto>())
        .then(|state: AppState, body: AvailabilityRequestDto| async move {
            state.availability(body).await
        });

    let bookings = warp::path("bookings")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body::<BookingRequestDto>())
        .then(|state: AppState, body: BookingRequestDto| async move { state.book(body).await });

    let automate = warp::path("automate")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state))
        .and(json_body::<AutomateRequestDto>())
        .then(|state: AppState, body: AutomateRequestDto| async move { state.automate(body).await });

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            json(&HealthResponse {
                status: "ok".to_string(),
                version: slotpilot_engine::VERSION.to_string(),
            })
        });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    availability
        .or(bookings)
        .unify()
        .or(automate)
        .unify()
        .map(|reply: WithStatus<Json>| reply.into_response())
        .or(health.map(|reply: Json| reply.into_response()))
        .unify()
        .with(cors)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

async fn handle_rejection(rejection: Rejection) -> Result<WithStatus<Json>, Infallible> {
    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, ErrorCode::InvalidRequest, "route not found".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            format!("invalid request body: {e}"),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::InvalidRequest,
            "method not allowed".to_string(),
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            ErrorCode::InvalidRequest,
            "content-length header is required".to_string(),
        )
    } else if let Some(e) = rejection.find::<warp::filters::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, ErrorCode::InvalidRequest, e.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::InvalidRequest,
            "request body too large".to_string(),
        )
    } else {
        tracing::error!("Unhandled rejection: {:?}", rejection);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ExternalSystemError,
            "internal error".to_string(),
        )
    };
    Ok(with_status(json(&ErrorResponse::new(code, message)), status))
}
