use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use super::{LangPair, Translation, Translator};
use crate::config::settings::TranslateSettings;
use crate::metrics::names;

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(rename = "responseStatus")]
    status: serde_json::Value,
    #[serde(rename = "responseData", default)]
    data: Option<RespData>,
    #[serde(rename = "responseDetails", default)]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RespData {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
}

/// Status arrives as `200` or `"200"` depending on the endpoint version.
fn status_code(v: &serde_json::Value) -> Option<u16> {
    match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|x| u16::try_from(x).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// MyMemory `/get` translation API.
pub struct MyMemoryTranslator {
    http: reqwest::Client,
    endpoint: String,
    contact: Option<String>,
}

impl MyMemoryTranslator {
    pub fn new(endpoint: impl Into<String>, contact: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("btc-news-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .context("building translator http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            contact: contact.filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn from_settings(cfg: &TranslateSettings) -> Result<Self> {
        Self::new(
            cfg.endpoint.clone(),
            cfg.contact.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Extract the translated text from a response body.
    pub fn parse_response(body: &str) -> Result<String> {
        let resp: Resp = serde_json::from_str(body).context("parsing translator json")?;
        match status_code(&resp.status) {
            Some(200) => {}
            other => {
                return Err(anyhow!(
                    "translator status {:?}: {}",
                    other,
                    resp.details.map(|d| d.to_string()).unwrap_or_default()
                ))
            }
        }
        let text = resp
            .data
            .and_then(|d| d.translated_text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("translator returned no text"))?;
        Ok(text)
    }

    async fn call(&self, text: &str, pair: &LangPair) -> Result<String> {
        let langpair = pair.to_string();
        let mut params = vec![("q", text), ("langpair", langpair.as_str())];
        if let Some(c) = self.contact.as_deref() {
            params.push(("de", c));
        }

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .context("translator request")?
            .error_for_status()
            .context("translator non-2xx")?;
        let body = resp.text().await.context("translator body")?;
        Self::parse_response(&body)
    }
}

#[async_trait]
impl Translator for MyMemoryTranslator {
    async fn translate(&self, text: &str, pair: &LangPair) -> Translation {
        if text.trim().is_empty() {
            return Translation::Unchanged(text.to_string());
        }
        match self.call(text, pair).await {
            Ok(t) => Translation::Translated(t),
            Err(e) => {
                tracing::warn!(error = ?e, provider = self.name(), "translation failed, keeping original");
                counter!(names::TRANSLATE_FALLBACK).increment(1);
                Translation::Degraded {
                    original: text.to_string(),
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "mymemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    #[test]
    fn ok_response_yields_text() {
        let body = r#"{"responseData":{"translatedText":" Биткоин растёт ","match":1},"responseStatus":200}"#;
        assert_eq!(MyMemoryTranslator::parse_response(body).unwrap(), "Биткоин растёт");
    }

    #[test]
    fn string_status_is_accepted() {
        let body = r#"{"responseData":{"translatedText":"ok"},"responseStatus":"200"}"#;
        assert!(MyMemoryTranslator::parse_response(body).is_ok());
    }

    #[test]
    fn quota_status_is_an_error() {
        let body = r#"{"responseData":{"translatedText":"MYMEMORY WARNING"},"responseStatus":429,"responseDetails":"quota"}"#;
        assert!(MyMemoryTranslator::parse_response(body).is_err());
    }

    #[test]
    fn unexpected_shape_is_an_error() {
        assert!(MyMemoryTranslator::parse_response(r#"{"foo":1}"#).is_err());
        assert!(MyMemoryTranslator::parse_response("not json").is_err());
    }

    #[tokio::test]
    async fn empty_input_skips_network() {
        // Unroutable endpoint: a network call would degrade, not return Unchanged.
        let t = MyMemoryTranslator::new("http://127.0.0.1:9/get", None, Duration::from_millis(200)).unwrap();
        let out = t.translate("  ", &LangPair::new("en", "ru")).await;
        assert_eq!(out, Translation::Unchanged("  ".into()));
    }

    /// Echoes the `de` parameter back as the translation.
    async fn echo_contact(Query(q): Query<HashMap<String, String>>) -> String {
        let de = q.get("de").cloned().unwrap_or_else(|| "none".into());
        format!(r#"{{"responseStatus":200,"responseData":{{"translatedText":"de={de}"}}}}"#)
    }

    async fn serve_echo() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/get", get(echo_contact));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/get")
    }

    #[tokio::test]
    async fn contact_is_sent_as_de_when_configured() {
        let url = serve_echo().await;
        let pair = LangPair::new("en", "ru");

        let with = MyMemoryTranslator::new(&url, Some("ops@example.com".into()), Duration::from_secs(5)).unwrap();
        assert_eq!(
            with.translate("Bitcoin", &pair).await,
            Translation::Translated("de=ops@example.com".into())
        );

        let blank = MyMemoryTranslator::new(&url, Some("  ".into()), Duration::from_secs(5)).unwrap();
        assert_eq!(blank.translate("Bitcoin", &pair).await, Translation::Translated("de=none".into()));
    }

    #[tokio::test]
    async fn unreachable_endpoint_degrades() {
        let t = MyMemoryTranslator::new("http://127.0.0.1:9/get", None, Duration::from_millis(500)).unwrap();
        let out = t.translate("Bitcoin", &LangPair::new("en", "ru")).await;
        assert!(out.is_degraded());
        assert_eq!(out.text(), "Bitcoin");
    }
}
