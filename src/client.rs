//! 123pan open platform API client.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::{CredentialManager, PLATFORM_HEADER};
use crate::config::ClientConfig;
use crate::error::{PanError, Result};
use crate::models::{
    ApiResponse, FileList, FileListData, ShareCreateData, ShareCreateRequest, ShareExpiry,
    ShareLink, UserInfoData, UserProfile,
};

const FILE_LIST_PATH: &str = "/api/v1/file/list";
const USER_INFO_PATH: &str = "/api/v1/user/info";
const SHARE_CREATE_PATH: &str = "/api/v1/share/create";

/// Largest page the listing endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Messages the listing endpoint uses for a directory without entries.
///
/// No dedicated error code is documented for this case.
pub const EMPTY_LISTING_MESSAGES: &[&str] = &["no files", "没有文件"];

/// Column to sort a listing by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    FileId,
    Size,
    FileName,
}

impl OrderBy {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBy::FileId => "file_id",
            OrderBy::Size => "size",
            OrderBy::FileName => "file_name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

/// Parameters of a single listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Folder to list; 0 is the drive root.
    pub parent_id: i64,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub order_by: OrderBy,
    pub order_direction: OrderDirection,
    /// `Some(true)` lists the recycle bin.
    pub trashed: Option<bool>,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            parent_id: 0,
            page: 1,
            limit: MAX_PAGE_SIZE,
            order_by: OrderBy::FileName,
            order_direction: OrderDirection::Asc,
            trashed: None,
            search: None,
        }
    }
}

impl ListQuery {
    /// First page of `parent_id` with default ordering.
    pub fn children_of(parent_id: i64) -> Self {
        Self {
            parent_id,
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order_by: OrderBy, direction: OrderDirection) -> Self {
        self.order_by = order_by;
        self.order_direction = direction;
        self
    }

    pub fn trashed(mut self, trashed: bool) -> Self {
        self.trashed = Some(trashed);
        self
    }

    pub fn search(mut self, keyword: impl Into<String>) -> Self {
        self.search = Some(keyword.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(PanError::InvalidArgument(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.limit
            )));
        }
        if self.page == 0 {
            return Err(PanError::InvalidArgument("page numbers start at 1".to_string()));
        }
        Ok(())
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("parentFileId", self.parent_id.to_string()),
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("orderBy", self.order_by.as_str().to_string()),
            ("orderDirection", self.order_direction.as_str().to_string()),
        ];
        if let Some(trashed) = self.trashed {
            pairs.push(("trashed", trashed.to_string()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("searchData", search.clone()));
        }
        pairs
    }
}

/// Client for the 123pan open platform.
#[derive(Clone)]
pub struct PanClient {
    config: Arc<ClientConfig>,
    auth: CredentialManager,
    http: Client,
}

impl PanClient {
    /// Create a new PanClient.
    ///
    /// No request is made here; the access token is obtained on first use.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let config = Arc::new(config);
        let auth = CredentialManager::new(Arc::clone(&config), http.clone());

        Ok(Self { config, auth, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.auth
    }

    /// List one page of a folder.
    ///
    /// A folder the provider reports as empty yields
    /// [`PanError::EmptyDirectory`] rather than an empty page.
    pub async fn list_files(&self, query: &ListQuery) -> Result<FileList> {
        query.validate()?;

        let request = self
            .authorized(self.http.get(self.config.endpoint(FILE_LIST_PATH)))
            .await?
            .query(&query.query_pairs());

        let envelope: ApiResponse<FileListData> = send_envelope(request).await?;

        if !envelope.is_success() {
            if EMPTY_LISTING_MESSAGES.contains(&envelope.message.as_str()) {
                debug!(parent_id = query.parent_id, "Folder is empty");
                return Err(PanError::EmptyDirectory);
            }
            return Err(PanError::Remote {
                code: envelope.code,
                message: envelope.message,
            });
        }

        let list = envelope.data.map(FileList::from).unwrap_or(FileList {
            entries: Vec::new(),
            total: 0,
        });

        debug!(
            parent_id = query.parent_id,
            page = query.page,
            count = list.entries.len(),
            total = list.total,
            "Listed folder"
        );

        Ok(list)
    }

    /// List every entry of a folder, requesting pages until `total` is reached.
    pub async fn list_all_files(&self, parent_id: i64) -> Result<FileList> {
        collect_pages(ListQuery::children_of(parent_id), true, |query| async move {
            self.list_files(&query).await
        })
        .await
    }

    /// Fetch the account profile.
    pub async fn user_info(&self) -> Result<UserProfile> {
        let request = self
            .authorized(self.http.get(self.config.endpoint(USER_INFO_PATH)))
            .await?;

        let data: UserInfoData = into_data(send_envelope(request).await?)?;
        Ok(UserProfile::from(data))
    }

    /// Create a share link for the given files.
    ///
    /// # Arguments
    /// * `name` - Title shown on the share page
    /// * `expiry` - How long the link stays valid
    /// * `file_ids` - Files and folders to share
    /// * `password` - Optional extraction code
    pub async fn create_share_link(
        &self,
        name: &str,
        expiry: ShareExpiry,
        file_ids: &[i64],
        password: Option<&str>,
    ) -> Result<ShareLink> {
        if file_ids.is_empty() {
            return Err(PanError::InvalidArgument(
                "at least one file ID is required".to_string(),
            ));
        }

        let body = ShareCreateRequest {
            share_name: name.to_string(),
            share_expire: expiry.days(),
            file_id_list: file_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
            share_pwd: password.map(str::to_string),
        };

        let request = self
            .authorized(self.http.post(self.config.endpoint(SHARE_CREATE_PATH)))
            .await?
            .json(&body);

        let data: ShareCreateData = into_data(send_envelope(request).await?)?;
        Ok(ShareLink::from(data))
    }

    /// Attach a live token and the platform header.
    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.auth.access_token().await?;
        Ok(request
            .bearer_auth(token)
            .header(PLATFORM_HEADER.0, PLATFORM_HEADER.1))
    }
}

impl UserProfile {
    /// Re-fetch the profile and replace this snapshot.
    pub async fn refresh(&mut self, client: &PanClient) -> Result<()> {
        *self = client.user_info().await?;
        Ok(())
    }
}

/// Request pages starting at `query.page` and concatenate their entries.
///
/// Stops once `total` entries are collected, when a page has no entries, or
/// after the first page when `follow_pages` is off. An empty listing on the
/// first page is an error; on a later page it ends the folder.
pub(crate) async fn collect_pages<F, Fut>(
    mut query: ListQuery,
    follow_pages: bool,
    mut fetch: F,
) -> Result<FileList>
where
    F: FnMut(ListQuery) -> Fut,
    Fut: Future<Output = Result<FileList>>,
{
    let mut entries = Vec::new();
    let mut total = 0;

    loop {
        let page = match fetch(query.clone()).await {
            Ok(page) => page,
            Err(PanError::EmptyDirectory) if !entries.is_empty() => {
                debug!(page = query.page, "Later page reported empty, folder exhausted");
                return Ok(FileList { entries, total });
            }
            Err(e) => return Err(e),
        };

        let received = page.entries.len();
        total = page.total;
        entries.extend(page.entries);

        if !follow_pages || received == 0 || entries.len() as u64 >= total {
            return Ok(FileList { entries, total });
        }
        query.page += 1;
    }
}

/// Send a request and decode the `{code, message, data}` envelope.
///
/// A body that is not an envelope becomes a remote error carrying the HTTP
/// status and the raw body.
async fn send_envelope<T: DeserializeOwned>(request: RequestBuilder) -> Result<ApiResponse<T>> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<ApiResponse<T>>(&body) {
        Ok(envelope) => Ok(envelope),
        Err(e) if status.is_success() => Err(PanError::JsonError(e)),
        Err(_) => Err(PanError::Remote {
            code: i64::from(status.as_u16()),
            message: body,
        }),
    }
}

fn into_data<T>(envelope: ApiResponse<T>) -> Result<T> {
    if !envelope.is_success() {
        return Err(PanError::Remote {
            code: envelope.code,
            message: envelope.message,
        });
    }
    envelope.data.ok_or_else(|| PanError::Remote {
        code: envelope.code,
        message: "response has no data".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_pairs() {
        let pairs = ListQuery::default().query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("parentFileId", "0".to_string()),
                ("page", "1".to_string()),
                ("limit", "100".to_string()),
                ("orderBy", "file_name".to_string()),
                ("orderDirection", "asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_optional_query_pairs() {
        let pairs = ListQuery::children_of(9)
            .order(OrderBy::Size, OrderDirection::Desc)
            .trashed(true)
            .search("report")
            .query_pairs();
        assert!(pairs.contains(&("orderBy", "size".to_string())));
        assert!(pairs.contains(&("orderDirection", "desc".to_string())));
        assert!(pairs.contains(&("trashed", "true".to_string())));
        assert!(pairs.contains(&("searchData", "report".to_string())));
    }

    #[test]
    fn test_limit_validation() {
        assert!(ListQuery::default().limit(100).validate().is_ok());
        assert!(ListQuery::default().limit(101).validate().is_err());
        assert!(ListQuery::default().limit(0).validate().is_err());
        assert!(ListQuery::default().page(0).validate().is_err());
    }

    #[test]
    fn test_into_data_failure_keeps_message() {
        let envelope: ApiResponse<UserInfoData> = ApiResponse {
            code: 401,
            message: "tokens number has exceeded the limit".to_string(),
            data: None,
        };
        let err = into_data(envelope).unwrap_err();
        assert_eq!(
            err.remote_message(),
            Some("tokens number has exceeded the limit")
        );
    }
}
