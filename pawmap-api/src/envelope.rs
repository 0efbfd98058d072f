//! Response envelopes
//!
//! Every endpoint wraps its payload as `{resultCode, message, data}`. The
//! result code arrives either as a number or as a numeric string.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

fn deserialize_result_code<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => i32::try_from(n).map_err(de::Error::custom),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn is_success_code(code: i32) -> bool {
    (200..300).contains(&code)
}

/// Standard `{resultCode, message, data}` wrapper
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(deserialize_with = "deserialize_result_code")]
    pub result_code: i32,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        is_success_code(self.result_code)
    }

    /// Unwrap the payload, turning a non-success code into an error
    pub fn into_data(self) -> Result<T> {
        if !self.is_success() {
            return Err(ApiError::ResultCode {
                code: self.result_code,
                message: self.message.unwrap_or_default(),
            });
        }
        self.data.ok_or(ApiError::MissingData)
    }
}

/// Spring-style page of results
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
}

impl<T> Page<T> {
    /// Convert every item, failing on the first error
    pub fn try_map<U>(self, f: impl FnMut(T) -> Result<U>) -> Result<Page<U>> {
        let content = self.content.into_iter().map(f).collect::<Result<Vec<_>>>()?;
        Ok(Page {
            content,
            total_pages: self.total_pages,
            total_elements: self.total_elements,
            size: self.size,
            number: self.number,
            first: self.first,
            last: self.last,
        })
    }
}

/// Acknowledgement returned by mutation endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationAck {
    #[serde(deserialize_with = "deserialize_result_code")]
    pub result_code: i32,
    #[serde(default)]
    pub message: Option<String>,
}

impl MutationAck {
    pub fn is_success(&self) -> bool {
        is_success_code(self.result_code)
    }
}
