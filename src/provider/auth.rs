//! Credential checks for the config server.

use crate::config::Credential;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

/// Realm advertised in `WWW-Authenticate`
pub const REALM: &str = "Bot Config";

/// Accepts requests carrying one of the configured credentials
#[derive(Debug, Clone)]
pub struct AccessGuard {
    accepted: Vec<Credential>,
}

impl AccessGuard {
    pub fn new(accepted: Vec<Credential>) -> Self {
        Self { accepted }
    }

    /// Check the `Authorization` header of a request
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(presented) = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_authorization)
        else {
            return false;
        };

        self.accepted.iter().any(|c| credentials_match(c, &presented))
    }

    /// Value for the `WWW-Authenticate` header on a 401
    pub fn challenge() -> String {
        format!("Basic realm=\"{}\"", REALM)
    }
}

/// Parse an `Authorization` header value into a credential
pub fn parse_authorization(value: &str) -> Option<Credential> {
    let (scheme, rest) = value.trim().split_once(' ')?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("bearer") {
        return (!rest.is_empty()).then(|| Credential::Bearer(rest.to_string()));
    }

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        return Some(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    None
}

fn credentials_match(expected: &Credential, presented: &Credential) -> bool {
    match (expected, presented) {
        (
            Credential::Basic { username, password },
            Credential::Basic {
                username: u,
                password: p,
            },
        ) => {
            // evaluate both halves so timing does not reveal which one failed
            let user_ok = username.as_bytes().ct_eq(u.as_bytes());
            let pass_ok = password.as_bytes().ct_eq(p.as_bytes());
            (user_ok & pass_ok).into()
        }
        (Credential::Bearer(expected), Credential::Bearer(token)) => {
            expected.as_bytes().ct_eq(token.as_bytes()).into()
        }
        _ => false,
    }
}

/// `Authorization` header value for a credential
pub fn authorization_value(credential: &Credential) -> String {
    match credential {
        Credential::Basic { username, password } => {
            format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
        }
        Credential::Bearer(token) => format!("Bearer {}", token),
    }
}
