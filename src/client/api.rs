use std::{sync::Arc, time::Duration};

use anyhow::Context;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{session::SessionGuard, ClientError};
use crate::{
    auth::dto::{Credentials, LoginResponse, MessageResponse, VerifyResponse},
    error::ErrorBody,
    notes::{
        dto::{CreateNoteRequest, GenerateTitleRequest, UpdateNoteRequest},
        Note,
    },
};

/// HTTP client for the notes API. Authenticated calls go through the
/// session guard: no token means no request, and a rejected token ends
/// the session.
pub struct NotesClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionGuard>,
}

impl NotesClient {
    pub fn new(base_url: &str, session: Arc<SessionGuard>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build api http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let res = self
            .http
            .post(self.url("/register"))
            .json(&Credentials {
                username: username.into(),
                password: password.into(),
            })
            .send()
            .await?;
        expect_json::<MessageResponse>(res).await?;
        Ok(())
    }

    /// Signs in and stores the issued token.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let res = self
            .http
            .post(self.url("/login"))
            .json(&Credentials {
                username: username.into(),
                password: password.into(),
            })
            .send()
            .await?;
        let LoginResponse { token } = expect_json(res).await?;
        self.session.sign_in(&token)?;
        Ok(())
    }

    /// Client-side only.
    pub fn logout(&self) {
        self.session.logout();
    }

    pub async fn verify_session(&self) -> Result<Uuid, ClientError> {
        let res = self.authed(Method::GET, "/verify-token", |r| r).await?;
        let body: VerifyResponse = expect_json(res).await?;
        Ok(body.user_id)
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>, ClientError> {
        let res = self.authed(Method::GET, "/notes", |r| r).await?;
        expect_json(res).await
    }

    pub async fn create_note(&self, title: Option<&str>, content: &str) -> Result<Note, ClientError> {
        let body = CreateNoteRequest {
            title: title.map(str::to_string),
            content: content.to_string(),
        };
        let res = self.authed(Method::POST, "/notes", |r| r.json(&body)).await?;
        expect_json(res).await
    }

    pub async fn update_note(
        &self,
        id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Note, ClientError> {
        let body = UpdateNoteRequest {
            title: title.map(str::to_string),
            content: content.map(str::to_string),
        };
        let path = format!("/notes/{}", id);
        let res = self.authed(Method::PUT, &path, |r| r.json(&body)).await?;
        expect_json(res).await
    }

    pub async fn delete_note(&self, id: Uuid) -> Result<(), ClientError> {
        let path = format!("/notes/{}", id);
        let res = self.authed(Method::DELETE, &path, |r| r).await?;
        expect_json::<MessageResponse>(res).await?;
        Ok(())
    }

    pub async fn generate_title(&self, content: &str) -> Result<String, ClientError> {
        let body = GenerateTitleRequest {
            content: content.to_string(),
        };
        let res = self
            .authed(Method::POST, "/notes/generate-title", |r| r.json(&body))
            .await?;
        expect_json(res).await
    }

    async fn authed(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ClientError> {
        let Some(token) = self.session.token() else {
            debug!(path, "no session token; request not sent");
            self.session.logout();
            return Err(ClientError::Unauthenticated);
        };

        let req = self.http.request(method, self.url(path)).bearer_auth(token);
        let res = build(req).send().await.map_err(|e| {
            warn!(error = %e, path, "request failed");
            ClientError::Transport(e)
        })?;

        if matches!(res.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = %res.status(), path, "session rejected by server");
            self.session.logout();
            return Err(ClientError::SessionRejected);
        }
        Ok(res)
    }
}

async fn expect_json<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<T>().await?);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
