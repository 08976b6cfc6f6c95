//! Backend endpoint paths, relative to the configured base URL.

pub const LOGIN: &str = "/users/api/token/";
pub const ME: &str = "/users/api/me/";
pub const TOKEN_REFRESH: &str = "/token/refresh/";

pub const CITIES: &str = "/core/cities/";

#[must_use]
pub fn city(id: u64) -> String {
    format!("/core/cities/{id}/")
}
