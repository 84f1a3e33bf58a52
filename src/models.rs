//! Data models for 123pan API requests and responses.

use serde::{Deserialize, Serialize};

/// Prefix of public share links.
pub const SHARE_URL_BASE: &str = "https://www.123pan.com/s/";

/// Response envelope shared by every endpoint.
///
/// `code == 0` means success and the payload is in `data`; any other code is a
/// failure described by `message`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Body of the access token request.
#[derive(Debug, Serialize)]
pub struct AccessTokenRequest {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

/// Payload of the access token response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenData {
    pub access_token: String,
    pub expired_at: String,
}

/// Directory entry exactly as the listing endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFileEntry {
    #[serde(rename = "fileID")]
    pub file_id: i64,
    pub filename: String,
    #[serde(rename = "type")]
    pub file_type: i32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub parent_file_id: i64,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub category: i64,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub content_type: String,
}

/// The provider sends some "string" fields as numbers.
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Payload of the file list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListData {
    #[serde(default)]
    pub file_list: Vec<RawFileEntry>,
    #[serde(default)]
    pub total: u64,
}

/// Whether an entry is a plain file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    /// 1 is a folder; every other code is treated as a file.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FileKind::Directory,
            _ => FileKind::File,
        }
    }
}

/// Coarse content classification assigned by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Unknown,
    Audio,
    Video,
    Image,
}

impl Category {
    /// Codes outside 0..=3 resolve to `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Category::Audio,
            2 => Category::Video,
            3 => Category::Image,
            _ => Category::Unknown,
        }
    }
}

/// A file or folder in the remote drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub name: String,
    pub kind: FileKind,
    pub size_bytes: u64,
    pub content_hash: String,
    pub review_status: i32,
    pub parent_id: i64,
    pub parent_name: String,
    pub category: Category,
    pub content_type: String,
}

impl File {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Review statuses above 100 mean the file was rejected by moderation.
    pub fn is_rejected(&self) -> bool {
        self.review_status > 100
    }

    /// Size in megabytes, rounded to two decimals.
    pub fn size_mb(&self) -> f64 {
        round2(self.size_bytes as f64 / MB)
    }

    /// Size as `"<n>MB"`, switching to `"<n>GB"` from 1024 MB upwards.
    pub fn display_size(&self) -> String {
        let mb = self.size_mb();
        if mb < 1024.0 {
            format!("{}MB", format_decimal(mb))
        } else {
            format!("{}GB", format_decimal(round2(mb / 1024.0)))
        }
    }
}

impl From<RawFileEntry> for File {
    fn from(raw: RawFileEntry) -> Self {
        Self {
            id: raw.file_id,
            name: raw.filename,
            kind: FileKind::from_code(raw.file_type),
            size_bytes: raw.size,
            content_hash: raw.etag,
            review_status: raw.status,
            parent_id: raw.parent_file_id,
            parent_name: raw.parent_name,
            category: Category::from_code(raw.category),
            content_type: raw.content_type,
        }
    }
}

impl File {
    /// Column titles matching the [`Display`](std::fmt::Display) layout.
    pub const TABLE_HEADER: &'static str = "ID           KIND        SIZE CATEGORY NAME";
}

impl std::fmt::Display for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            FileKind::File => "file",
            FileKind::Directory => "dir",
        };
        let category = format!("{:?}", self.category);
        write!(
            f,
            "{:<12} {:<5} {:>10} {:<8} {}",
            self.id,
            kind,
            self.display_size(),
            category,
            self.name
        )
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileList {
    pub entries: Vec<File>,
    /// Number of entries in the directory across all pages.
    pub total: u64,
}

impl From<FileListData> for FileList {
    fn from(data: FileListData) -> Self {
        Self {
            entries: data.file_list.into_iter().map(File::from).collect(),
            total: data.total,
        }
    }
}

/// Payload of the user info response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoData {
    pub uid: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub head_image: String,
    #[serde(default)]
    pub passport: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub space_used: u64,
    #[serde(default)]
    pub space_permanent: u64,
    #[serde(default)]
    pub space_temp: u64,
    #[serde(default)]
    pub space_temp_expr: String,
}

/// Snapshot of the account, with quotas in gigabytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub nickname: String,
    pub uid: i64,
    pub avatar_url: String,
    pub email: String,
    pub phone: String,
    pub permanent_quota_gb: f64,
    pub used_quota_gb: f64,
    pub temporary_quota_gb: f64,
    pub temporary_quota_expiry: String,
    pub used_rate_percent: f64,
}

impl From<UserInfoData> for UserProfile {
    fn from(data: UserInfoData) -> Self {
        let permanent = round2(data.space_permanent as f64 / GB);
        let used = round2(data.space_used as f64 / GB);
        let temporary = round2(data.space_temp as f64 / GB);
        let used_rate_percent = if permanent > 0.0 {
            round2((used + temporary) / permanent * 100.0)
        } else {
            0.0
        };

        Self {
            nickname: data.nickname,
            uid: data.uid,
            avatar_url: data.head_image,
            email: data.mail,
            phone: data.passport,
            permanent_quota_gb: permanent,
            used_quota_gb: used,
            temporary_quota_gb: temporary,
            temporary_quota_expiry: data.space_temp_expr,
            used_rate_percent,
        }
    }
}

impl std::fmt::Display for UserProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn or_none(s: &str) -> &str {
            if s.is_empty() {
                "-"
            } else {
                s
            }
        }

        writeln!(f, "Nickname:        {}", or_none(&self.nickname))?;
        writeln!(f, "UID:             {}", self.uid)?;
        writeln!(f, "Avatar:          {}", or_none(&self.avatar_url))?;
        writeln!(f, "Email:           {}", or_none(&self.email))?;
        writeln!(f, "Phone:           {}", or_none(&self.phone))?;
        writeln!(
            f,
            "Permanent space: {}GB",
            format_decimal(self.permanent_quota_gb)
        )?;
        writeln!(
            f,
            "Used space:      {}GB, {}%",
            format_decimal(self.used_quota_gb),
            format_decimal(self.used_rate_percent)
        )?;
        writeln!(
            f,
            "Temporary space: {}GB",
            format_decimal(self.temporary_quota_gb)
        )?;
        write!(
            f,
            "Temporary until: {}",
            or_none(&self.temporary_quota_expiry)
        )
    }
}

/// Allowed lifetimes of a share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareExpiry {
    Permanent,
    OneDay,
    SevenDays,
    ThirtyDays,
}

impl ShareExpiry {
    /// Lifetime in days as the API expects it; 0 means permanent.
    pub fn days(self) -> u32 {
        match self {
            ShareExpiry::Permanent => 0,
            ShareExpiry::OneDay => 1,
            ShareExpiry::SevenDays => 7,
            ShareExpiry::ThirtyDays => 30,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            0 => Some(ShareExpiry::Permanent),
            1 => Some(ShareExpiry::OneDay),
            7 => Some(ShareExpiry::SevenDays),
            30 => Some(ShareExpiry::ThirtyDays),
            _ => None,
        }
    }
}

/// Body of the share creation request.
#[derive(Debug, Serialize)]
pub struct ShareCreateRequest {
    #[serde(rename = "shareName")]
    pub share_name: String,
    #[serde(rename = "shareExpire")]
    pub share_expire: u32,
    /// Comma separated file IDs.
    #[serde(rename = "fileIDList")]
    pub file_id_list: String,
    #[serde(rename = "sharePwd", skip_serializing_if = "Option::is_none")]
    pub share_pwd: Option<String>,
}

/// Payload of the share creation response.
#[derive(Debug, Deserialize)]
pub struct ShareCreateData {
    #[serde(rename = "shareID")]
    pub share_id: i64,
    #[serde(rename = "shareKey")]
    pub share_key: String,
}

/// A created share link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareLink {
    pub share_id: i64,
    pub share_key: String,
    pub share_url: String,
}

impl From<ShareCreateData> for ShareLink {
    fn from(data: ShareCreateData) -> Self {
        let share_url = format!("{}{}", SHARE_URL_BASE, data.share_key);
        Self {
            share_id: data.share_id,
            share_key: data.share_key,
            share_url,
        }
    }
}

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = MB * 1024.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a number with at least one decimal place (`1.0`, `1.5`, `0.01`).
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_entry(json: serde_json::Value) -> RawFileEntry {
        serde_json::from_value(json).unwrap()
    }

    fn file_of_size(size_bytes: u64) -> File {
        File::from(raw_entry(serde_json::json!({
            "fileID": 1,
            "filename": "big.iso",
            "type": 0,
            "size": size_bytes
        })))
    }

    #[test]
    fn test_category_from_code() {
        assert_eq!(Category::from_code(0), Category::Unknown);
        assert_eq!(Category::from_code(1), Category::Audio);
        assert_eq!(Category::from_code(2), Category::Video);
        assert_eq!(Category::from_code(3), Category::Image);
        assert_eq!(Category::from_code(99), Category::Unknown);
        assert_eq!(Category::from_code(-1), Category::Unknown);
    }

    #[test]
    fn test_file_kind_from_code() {
        assert_eq!(FileKind::from_code(0), FileKind::File);
        assert_eq!(FileKind::from_code(1), FileKind::Directory);
        assert_eq!(FileKind::from_code(7), FileKind::File);
    }

    #[test]
    fn test_file_from_raw_entry() {
        let file = File::from(raw_entry(serde_json::json!({
            "fileID": 42,
            "filename": "song.mp3",
            "type": 0,
            "size": 5242880,
            "etag": "d41d8cd98f00b204e9800998ecf8427e",
            "status": 2,
            "parentFileId": 7,
            "parentName": "music",
            "category": 1,
            "contentType": 0
        })));

        assert_eq!(file.id, 42);
        assert_eq!(file.name, "song.mp3");
        assert_eq!(file.kind, FileKind::File);
        assert_eq!(file.size_bytes, 5242880);
        assert_eq!(file.parent_id, 7);
        assert_eq!(file.parent_name, "music");
        assert_eq!(file.category, Category::Audio);
        assert_eq!(file.content_type, "0");
        assert!(!file.is_rejected());
    }

    #[test]
    fn test_rejected_review_status() {
        let mut file = file_of_size(0);
        file.review_status = 101;
        assert!(file.is_rejected());
        file.review_status = 100;
        assert!(!file.is_rejected());
    }

    #[test]
    fn test_size_conversion() {
        let file = file_of_size(1_073_741_824);
        assert_eq!(file.size_mb(), 1024.0);
        assert_eq!(file.display_size(), "1.0GB");

        assert_eq!(file_of_size(1_572_864).display_size(), "1.5MB");
        assert_eq!(file_of_size(0).display_size(), "0.0MB");
    }

    #[test]
    fn test_user_profile_quota() {
        let data: UserInfoData = serde_json::from_value(serde_json::json!({
            "uid": 1814435971,
            "nickname": "tester",
            "headImage": "",
            "passport": "13800000000",
            "mail": "",
            "spaceUsed": 5368709120u64,
            "spacePermanent": 10737418240u64,
            "spaceTemp": 0,
            "spaceTempExpr": ""
        }))
        .unwrap();

        let profile = UserProfile::from(data);
        assert_eq!(profile.permanent_quota_gb, 10.0);
        assert_eq!(profile.used_quota_gb, 5.0);
        assert_eq!(profile.temporary_quota_gb, 0.0);
        assert_eq!(profile.used_rate_percent, 50.0);
    }

    #[test]
    fn test_user_profile_zero_quota() {
        let data: UserInfoData =
            serde_json::from_value(serde_json::json!({ "uid": 1 })).unwrap();
        assert_eq!(UserProfile::from(data).used_rate_percent, 0.0);
    }

    #[test]
    fn test_share_expiry_days() {
        for days in [0, 1, 7, 30] {
            assert_eq!(ShareExpiry::from_days(days).unwrap().days(), days);
        }
        assert!(ShareExpiry::from_days(3).is_none());
    }

    #[test]
    fn test_share_link_url() {
        let link = ShareLink::from(ShareCreateData {
            share_id: 87187530,
            share_key: "PvitVv-6HGM".to_string(),
        });
        assert_eq!(link.share_url, "https://www.123pan.com/s/PvitVv-6HGM");
    }

    #[test]
    fn test_display_lines_up_with_header() {
        let line = file_of_size(1_048_576).to_string();
        assert_eq!(line, "1            file       1.0MB Unknown  big.iso");

        let name_col = File::TABLE_HEADER.find("NAME").unwrap();
        assert_eq!(line.find("big.iso"), Some(name_col));
        let size_end = File::TABLE_HEADER.find("SIZE").unwrap() + "SIZE".len();
        assert_eq!(line.find("1.0MB").map(|i| i + "1.0MB".len()), Some(size_end));
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(1.0), "1.0");
        assert_eq!(format_decimal(1.5), "1.5");
        assert_eq!(format_decimal(0.01), "0.01");
    }
}
