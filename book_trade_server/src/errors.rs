use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use book_trade_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("The btx-user-id header is missing or unreadable")]
    MissingCallerIdentity,
    #[error("You are not a party to this order")]
    NotAParty,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    OrderFlow(#[from] OrderFlowError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingCallerIdentity => StatusCode::UNAUTHORIZED,
            Self::NotAParty => StatusCode::FORBIDDEN,
            Self::OrderFlow(e) => match e {
                OrderFlowError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
                OrderFlowError::FeeNotVerified(_) => StatusCode::PAYMENT_REQUIRED,
                OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderFlowError::Conflict(_) => StatusCode::CONFLICT,
                OrderFlowError::CompensationFailed { .. } | OrderFlowError::StoreError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
            },
            Self::InitializeError(_) | Self::BackendError(_) | Self::IOError(_) | Self::Unspecified(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(crate::data_objects::JsonResponse::failure(self))
    }
}
