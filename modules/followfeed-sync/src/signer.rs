// Request signing seam.
//
// Platform request signing is an opaque capability: the adapter hands the
// current credential plus the target api path to a `RequestSigner` and gets
// back the headers, cookies, and processed body to send. The real signing
// cryptography lives outside this repo.

use followfeed_common::{FollowFeedError, Result};

/// Authenticated request parameters produced by a signer.
#[derive(Debug, Clone, Default)]
pub struct SignedRequest {
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

pub trait RequestSigner: Send + Sync {
    fn sign(
        &self,
        credential: &str,
        api_path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<SignedRequest>;
}

/// Default signer: splits the cookie-header credential into cookie pairs and
/// passes the body through unmodified. No platform signature is computed.
pub struct PassthroughSigner;

impl RequestSigner for PassthroughSigner {
    fn sign(
        &self,
        credential: &str,
        _api_path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<SignedRequest> {
        let cookies = credential
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.to_string()))
            })
            .collect::<Vec<_>>();

        if cookies.is_empty() && !credential.trim().is_empty() {
            return Err(FollowFeedError::CredentialAcquisition(
                "credential is not in cookie-header form".to_string(),
            ));
        }

        Ok(SignedRequest {
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            cookies,
            body: body.cloned(),
        })
    }
}
