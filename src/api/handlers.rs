//! Request handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use tracing::warn;

use super::ApiState;
use crate::application::{CheckRequest, CompareRequest, ProbeResponse, ResponseBody};

pub type ApiReply = (StatusCode, Json<ResponseBody>);

pub async fn check(State(state): State<ApiState>, request: Result<Json<CheckRequest>, JsonRejection>) -> ApiReply {
    let response = match request {
        Ok(Json(request)) => {
            let cancel = state.shutdown.child_token();
            state.service.check(&request, &cancel).await
        }
        Err(rejection) => invalid_body("/check", &rejection),
    };
    reply(response)
}

pub async fn compare(State(state): State<ApiState>, request: Result<Json<CompareRequest>, JsonRejection>) -> ApiReply {
    let response = match request {
        Ok(Json(request)) => {
            let cancel = state.shutdown.child_token();
            state.service.compare(&request, &cancel).await
        }
        Err(rejection) => invalid_body("/compare", &rejection),
    };
    reply(response)
}

fn invalid_body(route: &str, rejection: &JsonRejection) -> ProbeResponse {
    warn!("[api] Rejected {} body: {}", route, rejection.body_text());
    ProbeResponse::error(400, "Invalid request body")
}

fn reply(response: ProbeResponse) -> ApiReply {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_keeps_status_and_body() {
        let (status, Json(body)) = reply(ProbeResponse::element_not_found());
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            ResponseBody::Error {
                status: 404,
                error: "Element not found".to_string()
            }
        );
    }

    #[test]
    fn test_out_of_range_status_is_internal_error() {
        let (status, _) = reply(ProbeResponse::error(1000, "bogus"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
