//! Wire encoding of a single hit.
//!
//! Keys are kept in insertion order so the encoded form is deterministic;
//! the same parameter set is posted as a form body in immediate mode and
//! embedded as a `?query` string in bulk batches.

use super::TransmissionError;
use crate::domain::HitRecord;
use url::form_urlencoded;

/// Site identity attached to every hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    pub site_id: String,
    pub token_auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitParams {
    pairs: Vec<(&'static str, String)>,
}

impl HitParams {
    /// Encode `hit` as tracking parameters.
    ///
    /// `url` is the resolved absolute URL. `download` repeats it when the
    /// hit was classified as a download and download tracking is on. Fails
    /// when the hit carries no normalized timestamp.
    pub fn from_hit(
        hit: &HitRecord,
        site: &SiteContext,
        url: &str,
        title: Option<&str>,
        download: bool,
    ) -> Result<Self, TransmissionError> {
        let cdt = hit
            .normalized
            .as_ref()
            .map(|ts| ts.wire_format())
            .ok_or_else(|| TransmissionError::MissingTimestamp {
                raw: hit.timestamp.clone(),
            })?;

        let mut params = Self { pairs: Vec::with_capacity(12) };
        params.push("idsite", &site.site_id);
        params.push("rec", "1");
        params.push("send_image", "0");
        params.push("cip", &hit.ip);
        params.push("ua", &hit.user_agent);
        params.push("url", url);
        params.push("urlref", &hit.referrer);
        params.push("token_auth", &site.token_auth);
        params.push("status_code", &hit.status);
        params.push("cdt", &cdt);
        if let Some(title) = title {
            params.push("action_name", title);
        }
        if download {
            params.push("download", url);
        }

        Ok(params)
    }

    fn push(&mut self, key: &'static str, value: &str) {
        self.pairs.push((key, value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_str())))
            .finish()
    }

    /// One entry of a bulk request's `requests` array.
    pub fn as_bulk_request(&self) -> String {
        format!("?{}", self.encode())
    }
}
