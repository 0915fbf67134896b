// Persisted session cookies.
//
// The appliance's session cookie can outlive this process, so the jar
// is written to disk after every successful login and preloaded into
// the fresh jar before the next one. If the server still honors the
// cookie, polling resumes without a new login handshake.

use std::path::Path;

use reqwest::cookie::{CookieStore, Jar};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// File name of the persisted jar inside the caller-supplied directory.
pub const COOKIE_FILE_NAME: &str = ".omv_cookies.json";

/// One persisted cookie. The session cookie is host-scoped, so name and
/// value are all that needs to survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
}

/// Load persisted cookies.
///
/// An absent file is a cache miss. So is a corrupted one: cookies are a
/// soft-recovery optimization and a bad cache must never block login.
pub fn load(path: &Path) -> Option<Vec<StoredCookie>> {
    let raw = std::fs::read(path).ok()?;
    match serde_json::from_slice::<Vec<StoredCookie>>(&raw) {
        Ok(cookies) if cookies.is_empty() => None,
        Ok(cookies) => Some(cookies),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding unreadable cookie file");
            None
        }
    }
}

/// Serialize cookies and overwrite the file. Plain overwrite, no atomic
/// rename: a torn write costs one login, nothing more.
pub fn save(path: &Path, cookies: &[StoredCookie]) -> std::io::Result<()> {
    let raw = serde_json::to_vec(cookies).map_err(std::io::Error::other)?;
    std::fs::write(path, raw)?;
    debug!(path = %path.display(), count = cookies.len(), "cookies persisted");
    Ok(())
}

/// Extract the cookies a jar would send to `url`.
pub fn from_jar(jar: &Jar, url: &Url) -> Vec<StoredCookie> {
    let Some(header) = jar.cookies(url) else {
        return Vec::new();
    };
    let Ok(header) = header.to_str() else {
        return Vec::new();
    };

    header
        .split("; ")
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some(StoredCookie {
                name: name.to_owned(),
                value: value.to_owned(),
            })
        })
        .collect()
}

/// Seed a fresh jar with persisted cookies for `url`.
pub fn apply_to_jar(cookies: &[StoredCookie], jar: &Jar, url: &Url) {
    for cookie in cookies {
        jar.add_cookie_str(&format!("{}={}", cookie.name, cookie.value), url);
    }
}
