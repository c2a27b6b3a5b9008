//! REST client for the module-content service.
//!
//! Maps each [`ModuleContentService`] operation onto one HTTP call under
//! `{base}/courses/{course}/modules` using [`reqwest`], with bearer-token
//! authentication.

use async_trait::async_trait;
use modstudio_core::module::{
    AssignmentContent, IntroductionContent, LessonContent, LessonRecord, ModuleMetadata,
    ModuleRecord, ModuleSnapshot, ModuleStatus, ModuleSummary, NewModule, SltRecord,
};
use modstudio_core::types::SltIndex;
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::error::ServiceError;
use crate::service::{ModuleContentService, ServiceResult};

/// Error code the service uses when an SLT index is already taken.
pub const DUPLICATE_INDEX_CODE: &str = "DUPLICATE_INDEX";

/// HTTP client for one module-content service deployment.
pub struct HttpModuleClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

impl HttpModuleClient {
    /// * `base_url` - e.g. `http://host:4000/api/v1`, without trailing slash.
    /// * `token` - bearer token; `None` leaves the client unauthorized.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    /// Reuse an existing [`reqwest::Client`] (timeouts, connection pool).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn modules_url(&self, course_id: &str) -> String {
        format!("{}/courses/{}/modules", self.base_url, course_id)
    }

    fn module_url(&self, course_id: &str, code: &str) -> String {
        format!("{}/{}", self.modules_url(course_id), code)
    }

    fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        tracing::debug!(method = %method, url = %url, "Module service request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or the classified error.
    async fn ensure_success(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify(status, body));
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ServiceResult<T> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> ServiceResult<()> {
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// `GET` a single-value slot; 404 means the slot is empty.
    async fn get_optional<T: serde::de::DeserializeOwned>(&self, url: String) -> ServiceResult<Option<T>> {
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }
}

/// Map a non-2xx status and its body onto a [`ServiceError`].
pub fn classify(status: StatusCode, body: String) -> ServiceError {
    let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.as_deref());
    let message = parsed
        .as_ref()
        .map(|b| b.error.clone())
        .unwrap_or_else(|| body.clone());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized,
        StatusCode::NOT_FOUND => ServiceError::NotFound(message),
        StatusCode::CONFLICT => ServiceError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
            if code == Some(DUPLICATE_INDEX_CODE) =>
        {
            ServiceError::DuplicateIndex(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::Validation(message)
        }
        _ => ServiceError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl ModuleContentService for HttpModuleClient {
    fn is_authorized(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    async fn list_modules(&self, course_id: &str) -> ServiceResult<Vec<ModuleSummary>> {
        let response = self
            .request(Method::GET, self.modules_url(course_id))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_module(&self, course_id: &str, code: &str) -> ServiceResult<ModuleSnapshot> {
        let response = self
            .request(Method::GET, self.module_url(course_id, code))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn create_module(
        &self,
        course_id: &str,
        module: &NewModule,
    ) -> ServiceResult<ModuleRecord> {
        let response = self
            .request(Method::POST, self.modules_url(course_id))
            .json(module)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_module(
        &self,
        course_id: &str,
        code: &str,
        metadata: &ModuleMetadata,
    ) -> ServiceResult<ModuleRecord> {
        let response = self
            .request(Method::PUT, self.module_url(course_id, code))
            .json(metadata)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn set_module_status(
        &self,
        course_id: &str,
        code: &str,
        status: ModuleStatus,
    ) -> ServiceResult<ModuleRecord> {
        let body = serde_json::json!({ "status": status.as_str() });
        let response = self
            .request(
                Method::PUT,
                format!("{}/status", self.module_url(course_id, code)),
            )
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn create_slt(
        &self,
        course_id: &str,
        code: &str,
        text: &str,
    ) -> ServiceResult<SltRecord> {
        let body = serde_json::json!({ "text": text });
        let response = self
            .request(
                Method::POST,
                format!("{}/slts", self.module_url(course_id, code)),
            )
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_slt(
        &self,
        course_id: &str,
        code: &str,
        index: SltIndex,
        text: &str,
    ) -> ServiceResult<SltRecord> {
        let body = serde_json::json!({ "text": text });
        let response = self
            .request(
                Method::PUT,
                format!("{}/slts/{}", self.module_url(course_id, code), index),
            )
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn delete_slt(&self, course_id: &str, code: &str, index: SltIndex) -> ServiceResult<()> {
        let response = self
            .request(
                Method::DELETE,
                format!("{}/slts/{}", self.module_url(course_id, code), index),
            )
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn reorder_slts(
        &self,
        course_id: &str,
        code: &str,
        order: &[SltIndex],
    ) -> ServiceResult<Vec<SltRecord>> {
        let body = serde_json::json!({ "order": order });
        let response = self
            .request(
                Method::POST,
                format!("{}/slts/reorder", self.module_url(course_id, code)),
            )
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_assignment(
        &self,
        course_id: &str,
        code: &str,
    ) -> ServiceResult<Option<AssignmentContent>> {
        self.get_optional(format!("{}/assignment", self.module_url(course_id, code)))
            .await
    }

    async fn create_assignment(
        &self,
        course_id: &str,
        code: &str,
        assignment: &AssignmentContent,
    ) -> ServiceResult<AssignmentContent> {
        let response = self
            .request(
                Method::POST,
                format!("{}/assignment", self.module_url(course_id, code)),
            )
            .json(assignment)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_assignment(
        &self,
        course_id: &str,
        code: &str,
        assignment: &AssignmentContent,
    ) -> ServiceResult<AssignmentContent> {
        let response = self
            .request(
                Method::PUT,
                format!("{}/assignment", self.module_url(course_id, code)),
            )
            .json(assignment)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_introduction(
        &self,
        course_id: &str,
        code: &str,
    ) -> ServiceResult<Option<IntroductionContent>> {
        self.get_optional(format!("{}/introduction", self.module_url(course_id, code)))
            .await
    }

    async fn create_introduction(
        &self,
        course_id: &str,
        code: &str,
        introduction: &IntroductionContent,
    ) -> ServiceResult<IntroductionContent> {
        let response = self
            .request(
                Method::POST,
                format!("{}/introduction", self.module_url(course_id, code)),
            )
            .json(introduction)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_introduction(
        &self,
        course_id: &str,
        code: &str,
        introduction: &IntroductionContent,
    ) -> ServiceResult<IntroductionContent> {
        let response = self
            .request(
                Method::PUT,
                format!("{}/introduction", self.module_url(course_id, code)),
            )
            .json(introduction)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn create_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
        lesson: &LessonContent,
    ) -> ServiceResult<LessonRecord> {
        let response = self
            .request(
                Method::POST,
                format!("{}/lessons/{}", self.module_url(course_id, code), slt_index),
            )
            .json(lesson)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
        lesson: &LessonContent,
    ) -> ServiceResult<LessonRecord> {
        let response = self
            .request(
                Method::PUT,
                format!("{}/lessons/{}", self.module_url(course_id, code), slt_index),
            )
            .json(lesson)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn delete_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
    ) -> ServiceResult<()> {
        let response = self
            .request(
                Method::DELETE,
                format!("{}/lessons/{}", self.module_url(course_id, code), slt_index),
            )
            .send()
            .await?;
        Self::check_status(response).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn classify_maps_auth_statuses() {
        assert_eq!(
            classify(StatusCode::FORBIDDEN, String::new()),
            ServiceError::Unauthorized
        );
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, "nope".to_string()),
            ServiceError::Unauthorized
        );
    }

    #[test]
    fn classify_reads_error_body() {
        let err = classify(
            StatusCode::CONFLICT,
            r#"{"error":"Assignment already exists"}"#.to_string(),
        );
        assert_eq!(err, ServiceError::Conflict("Assignment already exists".to_string()));
    }

    #[test]
    fn classify_detects_duplicate_index_code() {
        let err = classify(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"SLT 2 exists","code":"DUPLICATE_INDEX"}"#.to_string(),
        );
        assert_matches!(err, ServiceError::DuplicateIndex(msg) if msg == "SLT 2 exists");
    }

    #[test]
    fn classify_falls_back_to_raw_body() {
        assert_eq!(
            classify(StatusCode::BAD_REQUEST, "bad title".to_string()),
            ServiceError::Validation("bad title".to_string())
        );
        assert_matches!(
            classify(StatusCode::BAD_GATEWAY, "upstream".to_string()),
            ServiceError::Api { status: 502, .. }
        );
    }

    #[test]
    fn authorization_requires_non_empty_token() {
        assert!(!HttpModuleClient::new("http://localhost", None).is_authorized());
        assert!(!HttpModuleClient::new("http://localhost", Some(String::new())).is_authorized());
        assert!(HttpModuleClient::new("http://localhost/", Some("t".into())).is_authorized());
    }
}
