//! Keystone v3 token requests

use crate::auth::{AuthToken, Authenticator};
use crate::catalog::ServiceCatalog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gauge_core::{AuthSettings, Error, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    project: Option<TokenProject>,
    #[serde(default)]
    catalog: ServiceCatalog,
}

#[derive(Debug, Deserialize)]
struct TokenProject {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Password or application credential grant against Keystone v3
#[derive(Debug, Clone)]
pub struct KeystoneAuthenticator {
    http: Client,
    token_url: String,
    settings: AuthSettings,
}

impl KeystoneAuthenticator {
    pub fn new(http: Client, settings: AuthSettings) -> Result<Self> {
        settings.validate()?;
        let auth_url = settings
            .auth_url
            .as_deref()
            .ok_or_else(|| Error::config("auth_url is required"))?;

        Ok(Self {
            http,
            token_url: token_url(auth_url),
            settings,
        })
    }

    /// JSON body for `POST /v3/auth/tokens`
    pub fn request_body(&self) -> Value {
        let s = &self.settings;

        if s.uses_application_credential() {
            return json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {
                            "id": s.application_credential_id,
                            "secret": s.application_credential_secret,
                        }
                    }
                }
            });
        }

        let mut user = Map::new();
        match (&s.user_id, &s.username) {
            (Some(id), _) => {
                user.insert("id".into(), json!(id));
            }
            (None, Some(name)) => {
                user.insert("name".into(), json!(name));
                if let Some(domain) = domain(&s.user_domain_id, &s.user_domain_name) {
                    user.insert("domain".into(), domain);
                }
            }
            (None, None) => {}
        }
        user.insert("password".into(), json!(s.password));

        let mut auth = Map::new();
        auth.insert(
            "identity".into(),
            json!({
                "methods": ["password"],
                "password": { "user": user }
            }),
        );
        if let Some(scope) = self.scope() {
            auth.insert("scope".into(), scope);
        }

        json!({ "auth": auth })
    }

    fn scope(&self) -> Option<Value> {
        let s = &self.settings;

        if let Some(ref id) = s.project_id {
            return Some(json!({ "project": { "id": id } }));
        }

        if let Some(ref name) = s.project_name {
            let mut project = Map::new();
            project.insert("name".into(), json!(name));
            let domain = domain(&s.project_domain_id, &s.project_domain_name)
                .or_else(|| domain(&s.user_domain_id, &s.user_domain_name));
            if let Some(domain) = domain {
                project.insert("domain".into(), domain);
            }
            return Some(json!({ "project": project }));
        }

        domain(&s.domain_id, &s.domain_name).map(|d| json!({ "domain": d }))
    }
}

#[async_trait]
impl Authenticator for KeystoneAuthenticator {
    async fn authenticate(&self) -> Result<AuthToken> {
        debug!("POST {}", self.token_url);

        let response = self
            .http
            .post(&self.token_url)
            .json(&self.request_body())
            .send()
            .await
            .map_err(|e| Error::transport(format!("Identity request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::auth_failed(format!(
                "Identity service rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            return Err(Error::transport(format!(
                "Identity service returned {}",
                status
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::decode(format!("Missing {} header", SUBJECT_TOKEN_HEADER)))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read identity response: {}", e)))?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("Invalid token response: {}", e)))?;

        let (project_id, project_name) = match parsed.token.project {
            Some(project) => (Some(project.id), project.name),
            None => (None, None),
        };

        Ok(AuthToken {
            token,
            expires_at: parsed.token.expires_at,
            project_id,
            project_name,
            catalog: parsed.token.catalog,
        })
    }
}

fn domain(id: &Option<String>, name: &Option<String>) -> Option<Value> {
    match (id, name) {
        (Some(id), _) => Some(json!({ "id": id })),
        (None, Some(name)) => Some(json!({ "name": name })),
        (None, None) => None,
    }
}

/// Normalize an `auth_url` to its token endpoint
fn token_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{}/auth/tokens", base)
    } else {
        format!("{}/v3/auth/tokens", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn password_settings(auth_url: &str) -> AuthSettings {
        AuthSettings {
            auth_url: Some(auth_url.to_string()),
            username: Some("exporter".to_string()),
            password: Some("s3cret".to_string()),
            user_domain_name: Some("Default".to_string()),
            project_name: Some("web".to_string()),
            project_domain_name: Some("Default".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_token_url() {
        assert_eq!(token_url("https://keystone:5000"), "https://keystone:5000/v3/auth/tokens");
        assert_eq!(token_url("https://keystone:5000/v3/"), "https://keystone:5000/v3/auth/tokens");
        assert_eq!(
            token_url("https://cloud.example/identity/v3"),
            "https://cloud.example/identity/v3/auth/tokens"
        );
    }

    #[test]
    fn test_password_body() {
        let auth = KeystoneAuthenticator::new(Client::new(), password_settings("https://ks")).unwrap();
        let body = auth.request_body();

        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
        let user = &body["auth"]["identity"]["password"]["user"];
        assert_eq!(user["name"], "exporter");
        assert_eq!(user["password"], "s3cret");
        assert_eq!(user["domain"]["name"], "Default");
        assert_eq!(body["auth"]["scope"]["project"]["name"], "web");
        assert_eq!(body["auth"]["scope"]["project"]["domain"]["name"], "Default");
    }

    #[test]
    fn test_project_id_scope_wins() {
        let mut settings = password_settings("https://ks");
        settings.project_id = Some("p1".to_string());
        let auth = KeystoneAuthenticator::new(Client::new(), settings).unwrap();

        let body = auth.request_body();
        assert_eq!(body["auth"]["scope"], json!({ "project": { "id": "p1" } }));
    }

    #[test]
    fn test_application_credential_body() {
        let settings = AuthSettings {
            auth_url: Some("https://ks".to_string()),
            application_credential_id: Some("ac1".to_string()),
            application_credential_secret: Some("acs".to_string()),
            ..Default::default()
        };
        let auth = KeystoneAuthenticator::new(Client::new(), settings).unwrap();
        let body = auth.request_body();

        assert_eq!(body["auth"]["identity"]["methods"][0], "application_credential");
        assert_eq!(body["auth"]["identity"]["application_credential"]["id"], "ac1");
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = AuthSettings {
            auth_url: Some("https://ks".to_string()),
            ..Default::default()
        };
        assert!(KeystoneAuthenticator::new(Client::new(), settings).is_err());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .and(body_partial_json(json!({
                "auth": { "identity": { "methods": ["password"] } }
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Subject-Token", "gAAAA-token")
                    .set_body_json(json!({
                        "token": {
                            "expires_at": "2030-01-01T00:00:00.000000Z",
                            "project": { "id": "p1", "name": "web" },
                            "catalog": [{
                                "type": "compute",
                                "endpoints": [{
                                    "interface": "public",
                                    "region_id": "RegionOne",
                                    "url": "https://nova/v2.1"
                                }]
                            }]
                        }
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = KeystoneAuthenticator::new(Client::new(), password_settings(&server.uri())).unwrap();
        let token = auth.authenticate().await.unwrap();

        assert_eq!(token.token, "gAAAA-token");
        assert_eq!(token.project_id.as_deref(), Some("p1"));
        assert_eq!(token.project_name.as_deref(), Some("web"));
        assert!(token.expires_at.is_some());
        assert_eq!(token.catalog.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = KeystoneAuthenticator::new(Client::new(), password_settings(&server.uri())).unwrap();
        let err = auth.authenticate().await.unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": {} })))
            .mount(&server)
            .await;

        let auth = KeystoneAuthenticator::new(Client::new(), password_settings(&server.uri())).unwrap();
        let err = auth.authenticate().await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
