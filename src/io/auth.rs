//! Outgoing authentication for upstream tile and archive requests.
//!
//! Tile servers that sit behind an API gateway usually want either a bearer
//! token or HTTP Basic credentials. The same credentials are attached to
//! every request a layer makes: template tile fetches and archive range
//! reads alike.

use reqwest::RequestBuilder;

/// Credentials attached to upstream HTTP requests.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum SourceAuth {
    /// Anonymous access
    #[default]
    None,

    /// `Authorization: Bearer <token>`
    Bearer(String),

    /// `Authorization: Basic base64(username:password)`
    Basic { username: String, password: String },
}

impl SourceAuth {
    /// Build credentials from optional configuration values.
    ///
    /// A bearer token takes precedence over basic credentials. Basic
    /// credentials need a username; a missing password is sent as empty.
    pub fn from_parts(
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        match (token, username) {
            (Some(token), _) => SourceAuth::Bearer(token),
            (None, Some(username)) => SourceAuth::Basic {
                username,
                password: password.unwrap_or_default(),
            },
            (None, None) => SourceAuth::None,
        }
    }

    /// Attach these credentials to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            SourceAuth::None => request,
            SourceAuth::Bearer(token) => request.bearer_auth(token),
            SourceAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    /// Short label for logs; never includes the secret.
    pub fn scheme(&self) -> &'static str {
        match self {
            SourceAuth::None => "none",
            SourceAuth::Bearer(_) => "bearer",
            SourceAuth::Basic { .. } => "basic",
        }
    }
}

impl std::fmt::Debug for SourceAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceAuth::None => write!(f, "SourceAuth::None"),
            SourceAuth::Bearer(_) => write!(f, "SourceAuth::Bearer(***)"),
            SourceAuth::Basic { username, .. } => {
                write!(f, "SourceAuth::Basic {{ username: {username:?}, password: *** }}")
            }
        }
    }
}
