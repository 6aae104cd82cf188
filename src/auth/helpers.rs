use axum::http::{HeaderMap, header::AUTHORIZATION};

#[derive(Debug, PartialEq, Eq)]
pub enum TokenExtractionError {
    InvalidScheme,
    InvalidToken,
}

/// Extracts the raw credential from an `Authorization: Bearer` header.
/// Returns None if no auth header is present.
/// Returns Err if the header is not valid text, uses another scheme, or is empty.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>, TokenExtractionError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let header = value
        .to_str()
        .map_err(|_| TokenExtractionError::InvalidToken)?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(TokenExtractionError::InvalidScheme)?
        .trim();

    if token.is_empty() {
        return Err(TokenExtractionError::InvalidToken);
    }

    Ok(Some(token.to_string()))
}
