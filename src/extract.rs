use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JSON body where an empty body means `T::default()`. Anything else must
/// decode as `T` or the request is rejected with 400.
#[derive(Debug)]
pub struct JsonOrEmpty<T>(pub T);

pub fn decode_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::Validation(vec![format!("body: {e}")]))
}

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrEmpty<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(vec![format!("body: {}", e.body_text())]))?;
        decode_body(&bytes).map(JsonOrEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Flags {
        #[serde(default)]
        force_regenerate: bool,
    }

    #[test]
    fn empty_body_is_default() {
        assert_eq!(decode_body::<Flags>(b"").unwrap(), Flags::default());
        assert_eq!(decode_body::<Flags>(b"  \n").unwrap(), Flags::default());
        assert_eq!(decode_body::<Flags>(b"{}").unwrap(), Flags::default());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let bodies: [&[u8]; 3] = [br#"{"forceRegenerate": "yes"}"#, b"{not json", b"\"yes\""];
        for body in bodies {
            let err = decode_body::<Flags>(body).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{body:?}");
        }
        assert!(decode_body::<Flags>(br#"{"forceRegenerate": true}"#).unwrap().force_regenerate);
    }
}
