use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use crate::errors::BlobServiceErr;

/// Checks for `Authorization: Bearer <token>` matching the configured token.
pub fn verify_token(req: &HttpRequest, expected: &str) -> Result<(), BlobServiceErr> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(BlobServiceErr::Unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| BlobServiceErr::Unauthorized("Invalid auth header format"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(BlobServiceErr::Unauthorized("Invalid auth header format"))?;
    if token != expected {
        return Err(BlobServiceErr::Unauthorized("Invalid token"));
    }
    Ok(())
}
