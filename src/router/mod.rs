// Router module - maps request paths onto the proxy's endpoints

use crate::constants::{HEALTH_PATH, IMAGES_PATH_PREFIX, MAX_OBJECT_KEY_BYTES};
use crate::error::ProxyError;

/// Endpoint selected for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET|HEAD /images/{key}`; the key is already URL-decoded
    Image { object_key: String },
    Health,
    NotFound,
    MethodNotAllowed,
}

pub struct Router;

impl Router {
    /// Resolve `method` and raw (still percent-encoded) `path`
    ///
    /// Only an unusable object key is an error; unknown paths and methods
    /// are ordinary routes so the caller can answer them uniformly.
    pub fn route(method: &str, path: &str) -> Result<Route, ProxyError> {
        let is_read = method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD");

        if path == HEALTH_PATH {
            return Ok(if is_read {
                Route::Health
            } else {
                Route::MethodNotAllowed
            });
        }

        let Some(raw_key) = path.strip_prefix(IMAGES_PATH_PREFIX) else {
            return Ok(Route::NotFound);
        };
        if !is_read {
            return Ok(Route::MethodNotAllowed);
        }

        Ok(Route::Image {
            object_key: decode_object_key(raw_key)?,
        })
    }
}

/// URL-decode and validate an object key
pub fn decode_object_key(raw: &str) -> Result<String, ProxyError> {
    let key = urlencoding::decode(raw)
        .map_err(|_| ProxyError::InvalidKey("key is not valid UTF-8".to_string()))?
        .into_owned();

    if key.is_empty() {
        return Err(ProxyError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_OBJECT_KEY_BYTES {
        return Err(ProxyError::InvalidKey(format!(
            "key exceeds {} bytes",
            MAX_OBJECT_KEY_BYTES
        )));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(ProxyError::InvalidKey(
            "key cannot contain '..' segments".to_string(),
        ));
    }
    if key.chars().any(char::is_control) {
        return Err(ProxyError::InvalidKey(
            "key cannot contain control characters".to_string(),
        ));
    }

    Ok(key)
}
