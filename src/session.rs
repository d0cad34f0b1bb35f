use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue},
};
use uuid::Uuid;

pub const USER_ID: &str = "user_id";
pub const GUEST_SESSION: &str = "guest_session";
pub const SURVEY_ID: &str = "survey_id";
pub const MEAL_PLAN_ID: &str = "meal_plan_id";

const MAX_AGE_SECS: u32 = 60 * 60 * 24 * 30;

/// Identifiers carried in request cookies. Nothing here is authenticated;
/// unknown or malformed cookies are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user_id: Option<String>,
    pub guest_session: Option<String>,
    pub survey_id: Option<Uuid>,
    pub meal_plan_id: Option<Uuid>,
}

impl Session {
    fn absorb(&mut self, header: &str) {
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match name.trim() {
                USER_ID => self.user_id = Some(value.to_string()),
                GUEST_SESSION => self.guest_session = Some(value.to_string()),
                SURVEY_ID => self.survey_id = value.parse().ok(),
                MEAL_PLAN_ID => self.meal_plan_id = value.parse().ok(),
                _ => {}
            }
        }
    }

    pub fn from_cookie_header(header: &str) -> Self {
        let mut session = Session::default();
        session.absorb(header);
        session
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut session = Session::default();
        for value in parts.headers.get_all(header::COOKIE) {
            if let Ok(raw) = value.to_str() {
                session.absorb(raw);
            }
        }
        Ok(session)
    }
}

/// `Set-Cookie` value for one of the session identifiers.
pub fn set_cookie(name: &str, value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={MAX_AGE_SECS}"
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_known_cookies() {
        let id = Uuid::new_v4();
        let session = Session::from_cookie_header(&format!(
            "theme=dark; guest_session=g-123; survey_id={id}; meal_plan_id=not-a-uuid"
        ));
        assert_eq!(session.guest_session.as_deref(), Some("g-123"));
        assert_eq!(session.survey_id, Some(id));
        assert_eq!(session.meal_plan_id, None);
        assert_eq!(session.user_id, None);
    }

    #[test]
    fn ignores_empty_and_malformed_pairs() {
        let session = Session::from_cookie_header("user_id=; junk; =x; user_id=\"u-9\"");
        assert_eq!(session.user_id.as_deref(), Some("u-9"));
    }

    #[test]
    fn cookie_header_is_scoped_to_root() {
        let v = set_cookie(SURVEY_ID, "abc").unwrap();
        assert!(v.to_str().unwrap().starts_with("survey_id=abc; Path=/;"));
    }
}
