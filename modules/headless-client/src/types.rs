use serde::{Deserialize, Serialize};

/// A browser cookie as exposed by the automation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionCreated {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CookieList {
    pub cookies: Vec<Cookie>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvalResult {
    #[serde(default)]
    pub value: serde_json::Value,
}
