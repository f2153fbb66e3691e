use serde::Serialize;

use crate::db::query::Pagination;

/// `{success: true, data}` envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl DataResponse<serde_json::Value> {
    /// `data: {}`, returned by deletes.
    pub fn empty() -> Self {
        Self::new(serde_json::json!({}))
    }
}

/// `{success: true, count, pagination?, data: [...]}` envelope.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    /// Number of items in `data`.
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn all(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            pagination: None,
            data,
        }
    }

    pub fn page(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::all(data)
        }
    }
}

/// `{success: true, token}`, returned by every endpoint that signs the user in.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

impl TokenResponse {
    pub fn new(token: String) -> Self {
        Self {
            success: true,
            token,
        }
    }
}
