use crate::config::EnvConfig;
use crate::models::{Item, ItemType, PatchPayload};
use crate::storage::{load_string_from_storage, remove_from_storage, save_string_to_storage, TOKEN_KEY};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    /// 409/422: the server refused the write as out of date or inconsistent.
    Conflict,
    Parse,
}

#[derive(Clone, Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn network(e: reqwest::Error) -> Self {
        Self::new(ApiErrorKind::Network, e.to_string())
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self::new(ApiErrorKind::Parse, e.to_string())
    }

    fn unauthorized() -> Self {
        Self::new(ApiErrorKind::Unauthorized, "Unauthorized")
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        let kind = match status.as_u16() {
            409 | 422 => ApiErrorKind::Conflict,
            _ => ApiErrorKind::Http,
        };
        Self::new(kind, format!("{ctx} ({status}): {body}"))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Clone, Debug)]
pub(crate) struct CreateItemRequest<'a> {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub data: &'a serde_json::Value,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReorderItemsRequest<'a> {
    pub item_ids: &'a [String],
}

/// Server acknowledgement of a field patch.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchOutcome {
    /// Canonical record; authoritative for `size_code` and `order_key`.
    pub item: Item,
    /// Set when the record was updated but a secondary step failed.
    pub warning: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteOutcome {
    pub warning: Option<String>,
}

/// The persistence API the sync engine writes through.
///
/// Futures are not `Send`: everything runs on the page's single-threaded
/// executor.
#[async_trait(?Send)]
pub trait ItemApi {
    async fn create_item(&self, item_type: ItemType, data: serde_json::Value) -> ApiResult<Item>;

    async fn patch_item(&self, item_id: &str, payload: &PatchPayload) -> ApiResult<PatchOutcome>;

    async fn delete_item(&self, item_id: &str) -> ApiResult<DeleteOutcome>;

    /// Rejected with `Conflict` when the id set does not match the server's.
    async fn reorder_items(&self, item_ids: &[String]) -> ApiResult<()>;
}

#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn load_from_storage() -> Self {
        let mut client = Self::new(EnvConfig::new().api_url);
        client.token = load_string_from_storage(TOKEN_KEY);
        client
    }

    pub fn save_to_storage(&self) {
        if let Some(token) = &self.token {
            save_string_to_storage(TOKEN_KEY, token);
        }
    }

    pub fn clear_storage() {
        remove_from_storage(TOKEN_KEY);
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn logout(&mut self) {
        self.token = None;
        Self::clear_storage();
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn get_auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }

    fn items_url(&self) -> String {
        format!("{}/api/items", self.base_url)
    }

    fn item_url(&self, item_id: &str) -> String {
        format!("{}/api/items/{}", self.base_url, urlencoding::encode(item_id))
    }

    async fn request_api(
        &self,
        method: reqwest::Method,
        url: String,
        body: Option<&impl Serialize>,
    ) -> ApiResult<serde_json::Value> {
        let mut req = self.http.request(method, url);
        if let Some(auth) = self.get_auth_header() {
            req = req.header("Authorization", auth);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            // DELETE and PUT may answer with an empty body.
            let text = res.text().await.map_err(ApiError::network)?;
            if text.trim().is_empty() {
                Ok(serde_json::Value::Null)
            } else {
                serde_json::from_str(&text).map_err(ApiError::parse)
            }
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Request failed"))
        }
    }

    /// Accepts both a bare item and `{ "item": {...} }`.
    pub(crate) fn parse_item_response(data: serde_json::Value) -> ApiResult<Item> {
        let raw = match data.get("item") {
            Some(item) => item.clone(),
            None => data,
        };

        let item: Item = serde_json::from_value(raw).map_err(ApiError::parse)?;
        if item.id.trim().is_empty() {
            return Err(ApiError::new(
                ApiErrorKind::Parse,
                "Response is missing item id",
            ));
        }
        Ok(item.normalized())
    }

    pub(crate) fn parse_warning(data: &serde_json::Value) -> Option<String> {
        ["warning", "partialFailure"]
            .iter()
            .find_map(|k| data.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// `{ success, warning? }`. An empty body counts as success.
    pub(crate) fn parse_ack(data: &serde_json::Value, ctx: &str) -> ApiResult<Option<String>> {
        if data.is_null() {
            return Ok(None);
        }

        if data.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let reason = data
                .get("error")
                .or_else(|| data.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("not applied");
            return Err(ApiError::new(ApiErrorKind::Http, format!("{ctx}: {reason}")));
        }

        Ok(Self::parse_warning(data))
    }
}

#[async_trait(?Send)]
impl ItemApi for ApiClient {
    async fn create_item(&self, item_type: ItemType, data: serde_json::Value) -> ApiResult<Item> {
        let resp = self
            .request_api(
                reqwest::Method::POST,
                self.items_url(),
                Some(&CreateItemRequest {
                    item_type,
                    data: &data,
                }),
            )
            .await?;
        Self::parse_item_response(resp)
    }

    async fn patch_item(&self, item_id: &str, payload: &PatchPayload) -> ApiResult<PatchOutcome> {
        let resp = self
            .request_api(reqwest::Method::PATCH, self.item_url(item_id), Some(payload))
            .await?;
        let warning = Self::parse_warning(&resp);
        let item = Self::parse_item_response(resp)?;
        Ok(PatchOutcome { item, warning })
    }

    async fn delete_item(&self, item_id: &str) -> ApiResult<DeleteOutcome> {
        let resp = self
            .request_api(reqwest::Method::DELETE, self.item_url(item_id), None::<&()>)
            .await?;
        let warning = Self::parse_ack(&resp, "Delete failed")?;
        Ok(DeleteOutcome { warning })
    }

    async fn reorder_items(&self, item_ids: &[String]) -> ApiResult<()> {
        let resp = self
            .request_api(
                reqwest::Method::PUT,
                format!("{}/order", self.items_url()),
                Some(&ReorderItemsRequest { item_ids }),
            )
            .await?;
        Self::parse_ack(&resp, "Reorder failed").map(|_| ())
    }
}
