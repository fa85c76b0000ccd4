use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bourse_execution::LoginError;
use bourse_types::api::ErrorBody;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Please login first")]
    Unauthorized,
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error("{message}")]
    Rejected { code: u8, message: String },
    #[error("User does not exist")]
    UnknownUser,
    #[error("Page not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::Unauthorized | Error::Login(_) => (StatusCode::UNAUTHORIZED, None),
            Error::Rejected { code, .. } => (StatusCode::BAD_REQUEST, Some(*code)),
            Error::UnknownUser | Error::NotFound => (StatusCode::NOT_FOUND, None),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
        };
        let body = ErrorBody {
            message: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
