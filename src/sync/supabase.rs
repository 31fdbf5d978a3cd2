//! Supabase storage upload and products table patch over plain REST.
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::json;
use tracing::debug;

use crate::util::env as env_util;

pub const DEFAULT_BUCKET: &str = "product-images";

const URL_KEYS: [&str; 2] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const KEY_KEYS: [&str; 2] = ["SUPABASE_SERVICE_ROLE_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

#[derive(Clone)]
pub struct SupabaseCredentials {
    pub url: String,
    pub key: String,
}

impl std::fmt::Debug for SupabaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SupabaseCredentials {
    pub fn new(url: Option<String>, key: Option<String>) -> Result<Self> {
        match (url, key) {
            (Some(url), Some(key)) => {
                let url = url.trim().trim_end_matches('/').to_string();
                url::Url::parse(&url).with_context(|| format!("invalid Supabase URL {url:?}"))?;
                Ok(Self {
                    url,
                    key: key.trim().to_string(),
                })
            }
            _ => Err(anyhow!(
                "missing Supabase credentials: set NEXT_PUBLIC_SUPABASE_URL and \
                 SUPABASE_SERVICE_ROLE_KEY (or NEXT_PUBLIC_SUPABASE_ANON_KEY) in .env.local"
            )),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::new(env_util::env_first(&URL_KEYS), env_util::env_first(&KEY_KEYS))
    }
}

/// Remote side of the upload stage.
#[async_trait]
pub trait ImageSync: Send + Sync {
    /// Upload (upsert) `bytes` as `<sku>.jpg` and return its public URL.
    async fn upload_image(&self, sku: &str, bytes: Vec<u8>) -> Result<String>;

    /// Set `image_url` on the product with this SKU. Returns rows affected.
    async fn patch_image_url(&self, sku: &str, url: &str) -> Result<usize>;
}

pub struct SupabaseClient {
    http: Client,
    creds: SupabaseCredentials,
    bucket: String,
}

impl SupabaseClient {
    pub fn new(creds: SupabaseCredentials, bucket: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("catalog-pipeline/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            creds,
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_key(sku: &str) -> String {
        format!("{sku}.jpg")
    }

    pub fn upload_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.creds.url, self.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.creds.url, self.bucket, key
        )
    }

    pub fn patch_url(&self, sku: &str) -> String {
        format!(
            "{}/rest/v1/products?sku=eq.{}",
            self.creds.url,
            urlencoding::encode(sku)
        )
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(header::AUTHORIZATION, format!("Bearer {}", self.creds.key))
            .header("apikey", &self.creds.key)
    }
}

#[async_trait]
impl ImageSync for SupabaseClient {
    async fn upload_image(&self, sku: &str, bytes: Vec<u8>) -> Result<String> {
        let key = Self::object_key(sku);
        let resp = self
            .authed(self.http.post(self.upload_url(&key)))
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("upload request for {key}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("storage upload of {key} returned {status}: {body}"));
        }
        debug!(%key, bucket = %self.bucket, "image uploaded");
        Ok(self.public_url(&key))
    }

    async fn patch_image_url(&self, sku: &str, url: &str) -> Result<usize> {
        let resp = self
            .authed(self.http.patch(self.patch_url(sku)))
            .header("Prefer", "return=representation,count=exact")
            .json(&json!({ "image_url": url }))
            .send()
            .await
            .with_context(|| format!("products patch for {sku}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("products patch for {sku} returned {status}: {body}"));
        }
        let body = resp.text().await?;
        affected_rows(&body).with_context(|| format!("products patch for {sku}: bad response body"))
    }
}

/// Length of the returned representation. An empty body (204, proxies that
/// drop the representation) means no rows were reported.
fn affected_rows(body: &str) -> Result<usize> {
    if body.trim().is_empty() {
        return Ok(0);
    }
    let rows: serde_json::Value = serde_json::from_str(body)?;
    Ok(rows.as_array().map(Vec::len).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        let creds = SupabaseCredentials::new(
            Some("https://abc.supabase.co/".into()),
            Some("service-key".into()),
        )
        .unwrap();
        SupabaseClient::new(creds, DEFAULT_BUCKET).unwrap()
    }

    #[test]
    fn endpoints_follow_storage_and_rest_layout() {
        let c = client();
        let key = SupabaseClient::object_key("H001");
        assert_eq!(
            c.upload_url(&key),
            "https://abc.supabase.co/storage/v1/object/product-images/H001.jpg"
        );
        assert_eq!(
            c.public_url(&key),
            "https://abc.supabase.co/storage/v1/object/public/product-images/H001.jpg"
        );
        assert_eq!(
            c.patch_url("A B"),
            "https://abc.supabase.co/rest/v1/products?sku=eq.A%20B"
        );
    }

    #[test]
    fn missing_credentials_name_both_variables() {
        let err = SupabaseCredentials::new(Some("https://x".into()), None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("NEXT_PUBLIC_SUPABASE_URL"));
        assert!(msg.contains("SUPABASE_SERVICE_ROLE_KEY"));
        assert!(SupabaseCredentials::new(None, Some("k".into())).is_err());
        assert!(SupabaseCredentials::new(Some("not a url".into()), Some("k".into())).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let creds = SupabaseCredentials::new(Some("https://x.supabase.co".into()), Some("secret".into())).unwrap();
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn counts_returned_rows() {
        assert_eq!(affected_rows(r#"[{"sku": "A"}, {"sku": "B"}]"#).unwrap(), 2);
        assert_eq!(affected_rows("[]").unwrap(), 0);
        assert_eq!(affected_rows(r#"{"message": "x"}"#).unwrap(), 0);
        assert_eq!(affected_rows("").unwrap(), 0);
        assert_eq!(affected_rows(" \n").unwrap(), 0);
        assert!(affected_rows("<html>").is_err());
    }

    /// One-shot HTTP server: reads the request, answers with `response`.
    async fn serve_once(response: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            // the PATCH body is a JSON object, so the request ends with '}'
            while !buf.ends_with(b"}") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    fn local_client(base: String) -> SupabaseClient {
        let creds = SupabaseCredentials::new(Some(base), Some("service-key".into())).unwrap();
        SupabaseClient::new(creds, DEFAULT_BUCKET).unwrap()
    }

    #[tokio::test]
    async fn patch_with_no_content_reports_zero_rows() {
        let base = serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let rows = local_client(base)
            .patch_image_url("A1", "https://cdn.test/A1.jpg")
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn patch_counts_representation_rows() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 14\r\nConnection: close\r\n\r\n[{\"sku\":\"A1\"}]",
        )
        .await;
        let rows = local_client(base)
            .patch_image_url("A1", "https://cdn.test/A1.jpg")
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
