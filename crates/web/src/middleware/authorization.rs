use std::fmt;

use http::header::AUTHORIZATION;
use http::StatusCode;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::{Middleware, Next};
use crate::config::JwtConfig;
use crate::error::DispatchError;
use crate::request::RequestContext;
use crate::response::Response;

const TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;

const INVALID_TOKEN: &str = "Acesso negado. Token inválido.";
const EXPIRED_TOKEN: &str = "Acesso negado. Token expirado.";
const INTERNAL_ERROR: &str = "Erro interno.";

/// Claims carried by api tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default)]
    pub id: String,
}

/// Guards the external api with HS384 bearer tokens.
///
/// A token passes when its signature verifies against the configured key, it
/// is neither expired nor used before `nbf`, and its `iss` and `app` claims
/// equal the configured issuer and application. Rejections answer `401` with
/// the api's JSON envelope; a missing key answers `500`.
pub struct RequireAuthorization {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    has_key: bool,
    issuer: String,
    app: String,
    validation: Validation,
}

impl RequireAuthorization {
    pub fn new(key: impl AsRef<[u8]>, issuer: impl Into<String>, app: impl Into<String>) -> Self {
        let key = key.as_ref();

        let mut validation = Validation::new(Algorithm::HS384);
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            has_key: !key.is_empty(),
            issuer: issuer.into(),
            app: app.into(),
            validation,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(&config.key, &config.issuer, &config.app)
    }

    /// Signs a token for the configured issuer and application, valid for a
    /// day from now.
    pub fn issue(&self) -> Result<String, JwtError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            app: self.app.clone(),
            iat: Some(now),
            nbf: Some(now),
            exp: Some(now + TOKEN_LIFETIME_SECS),
            id: uuid::Uuid::new_v4().simple().to_string(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        if !self.has_key {
            return Err(ErrorKind::InvalidKeyFormat.into());
        }
        jsonwebtoken::encode(&Header::new(Algorithm::HS384), claims, &self.encoding_key)
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, Denial> {
        if !self.has_key {
            return Err(Denial::Internal("jwt key is not configured"));
        }

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| Denial::from_jwt_error(&e))?
            .claims;

        if claims.iss != self.issuer || claims.app != self.app {
            return Err(Denial::Invalid);
        }
        Ok(claims)
    }
}

impl fmt::Debug for RequireAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireAuthorization")
            .field("has_key", &self.has_key)
            .field("issuer", &self.issuer)
            .field("app", &self.app)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Denial {
    Invalid,
    Expired,
    Internal(&'static str),
}

impl Denial {
    fn from_jwt_error(e: &JwtError) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Denial::Expired,
            ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
                Denial::Internal("jwt key is unusable")
            }
            _ => Denial::Invalid,
        }
    }

    fn into_response(self) -> Response {
        let (status, message) = match self {
            Denial::Invalid => (StatusCode::UNAUTHORIZED, INVALID_TOKEN),
            Denial::Expired => (StatusCode::UNAUTHORIZED, EXPIRED_TOKEN),
            Denial::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR),
        };
        let body = serde_json::json!({ "success": false, "data": "", "message": message });
        Response::json(status, &body)
    }
}

impl Middleware for RequireAuthorization {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        let header = req.request().header(&AUTHORIZATION).unwrap_or_default();
        let token = header.strip_prefix("Bearer ").unwrap_or(header);

        match self.verify(token) {
            Ok(_claims) => next.run(req),
            Err(denial) => {
                match &denial {
                    Denial::Internal(reason) => error!(reason, path = req.request().path(), "can't verify api token"),
                    denial => warn!(?denial, path = req.request().path(), "api token rejected"),
                }
                Ok(denial.into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::handler_fn;
    use crate::middleware::{MiddlewareQueue, Middlewares};
    use crate::request::{PathVars, Request};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "newsdesk-test-key";
    const ISSUER: &str = "https://newsdesk.example";
    const APP: &str = "newsdesk";

    fn guard() -> RequireAuthorization {
        RequireAuthorization::new(KEY, ISSUER, APP)
    }

    fn claims(exp: u64) -> TokenClaims {
        TokenClaims {
            iss: ISSUER.to_owned(),
            app: APP.to_owned(),
            iat: None,
            nbf: None,
            exp: Some(exp),
            id: "5f1c".to_owned(),
        }
    }

    fn in_an_hour() -> u64 {
        jsonwebtoken::get_current_timestamp() + 3600
    }

    fn dispatch(guard: RequireAuthorization, authorization: Option<&str>) -> (Response, usize) {
        let calls = AtomicUsize::new(0);
        let middlewares = Middlewares::builder().add("required-authorization", guard).build();
        let handler = handler_fn(|_req: &RequestContext<'_>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, HandlerError>(serde_json::json!({"success": true}))
        });
        let route = vec!["required-authorization".to_owned()];
        let mut queue = MiddlewareQueue::new(&middlewares, &route, &handler);

        let mut request = http::Request::get("/api/external/news");
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        let request: Request = request.body(Bytes::new()).unwrap().into();
        let vars = PathVars::empty();
        let response = queue.next(&RequestContext::new(&request, &vars, "/")).unwrap();
        (response, calls.load(Ordering::SeqCst))
    }

    fn message(response: &Response) -> String {
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["data"], "");
        body["message"].as_str().unwrap().to_owned()
    }

    #[test]
    fn issued_token_passes() {
        let token = guard().issue().unwrap();
        let (response, calls) = dispatch(guard(), Some(&format!("Bearer {token}")));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls, 1);
    }

    #[test]
    fn signed_claims_pass() {
        let token = guard().sign(&claims(in_an_hour())).unwrap();
        let (response, calls) = dispatch(guard(), Some(&format!("Bearer {token}")));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls, 1);
    }

    #[test]
    fn bad_signature_is_invalid() {
        let forged = RequireAuthorization::new("another-key", ISSUER, APP).sign(&claims(in_an_hour())).unwrap();
        let (response, calls) = dispatch(guard(), Some(&format!("Bearer {forged}")));

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(&response), INVALID_TOKEN);
        assert_eq!(calls, 0);
    }

    #[test]
    fn expired_token_is_reported() {
        let expired = jsonwebtoken::get_current_timestamp() - 3600;
        let token = guard().sign(&claims(expired)).unwrap();
        let (response, calls) = dispatch(guard(), Some(&format!("Bearer {token}")));

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(&response), EXPIRED_TOKEN);
        assert_eq!(calls, 0);
    }

    #[test]
    fn foreign_issuer_or_app_is_invalid() {
        let mut wrong_issuer = claims(in_an_hour());
        wrong_issuer.iss = "https://evil.example".to_owned();
        let mut wrong_app = claims(in_an_hour());
        wrong_app.app = "other-app".to_owned();

        for claims in [wrong_issuer, wrong_app] {
            let token = guard().sign(&claims).unwrap();
            let (response, calls) = dispatch(guard(), Some(&format!("Bearer {token}")));

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(message(&response), INVALID_TOKEN);
            assert_eq!(calls, 0);
        }
    }

    #[test]
    fn other_algorithm_is_invalid() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims(in_an_hour()),
            &EncodingKey::from_secret(KEY.as_bytes()),
        )
        .unwrap();
        let (response, _calls) = dispatch(guard(), Some(&format!("Bearer {token}")));

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(&response), INVALID_TOKEN);
    }

    #[test]
    fn missing_or_garbled_header_is_invalid() {
        for authorization in [None, Some("Bearer "), Some("Bearer not.a.token")] {
            let (response, calls) = dispatch(guard(), authorization);

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(message(&response), INVALID_TOKEN);
            assert_eq!(calls, 0);
        }
    }

    #[test]
    fn missing_key_is_internal_error() {
        let token = guard().sign(&claims(in_an_hour())).unwrap();
        let (response, calls) = dispatch(RequireAuthorization::new("", ISSUER, APP), Some(&format!("Bearer {token}")));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message(&response), INTERNAL_ERROR);
        assert_eq!(calls, 0);

        assert!(RequireAuthorization::new("", ISSUER, APP).issue().is_err());
    }

    #[test]
    fn built_from_config() {
        let config = JwtConfig { key: KEY.to_owned(), issuer: ISSUER.to_owned(), app: APP.to_owned() };
        let token = guard().issue().unwrap();
        let (response, _calls) = dispatch(RequireAuthorization::from_config(&config), Some(&format!("Bearer {token}")));

        assert_eq!(response.status(), StatusCode::OK);
    }
}
