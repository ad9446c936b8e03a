use common_http_errors::ApiError;
use serde::Serialize;

pub const MAX_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Page numbers start at 1; limit is clamped to `1..=MAX_LIMIT`.
    pub fn parse(page: Option<&str>, limit: Option<&str>, default_limit: u32) -> Result<Self, ApiError> {
        let page = match page.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|value| *value >= 1)
                .ok_or_else(|| ApiError::bad_request("invalid_page", "page must be a positive integer"))?,
            None => 1,
        };
        let limit = match limit.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| ApiError::bad_request("invalid_limit", "limit must be a positive integer"))?,
            None => default_limit,
        };
        Ok(Self {
            page,
            limit: limit.clamp(1, MAX_LIMIT),
        })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}
