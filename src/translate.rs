use crate::{wire, Response, ServiceError, WebApiError};

/// Builds the error for a failed response.
///
/// Returns [`WebApiError::Service`] when the body follows the service error
/// schema, and [`WebApiError::MalformedErrorPayload`] when it does not.
pub(crate) fn translate_error(response: &Response) -> WebApiError {
    match parse_service_error(response.status().as_u16(), response.reason(), response.body()) {
        Ok(error) => WebApiError::Service(error),
        Err(detail) => WebApiError::MalformedErrorPayload {
            status: response.status().as_u16(),
            reason: response.reason().to_owned(),
            detail,
            body: String::from_utf8_lossy(response.body()).into_owned(),
        },
    }
}

pub(crate) fn parse_service_error(
    status_code: u16,
    reason_phrase: &str,
    body: &[u8],
) -> Result<ServiceError, String> {
    let envelope: wire::ErrorEnvelope = serde_json::from_slice(body)
        .map_err(|err| format!("invalid error payload JSON: {err}"))?;
    let code = parse_hex_code(&envelope.error.code)?;

    Ok(ServiceError {
        code,
        status_code,
        reason_phrase: reason_phrase.to_owned(),
        message: envelope.error.message,
    })
}

fn parse_hex_code(code: &str) -> Result<u32, String> {
    let trimmed = code.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).map_err(|err| format!("invalid error code '{code}': {err}"))
}
