use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{StoreFuture, Template, TemplateFields, TemplateStore};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Firestore REST client scoped to one collection.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    collection: String,
    api_key: Option<String>,
}

impl FirestoreStore {
    pub fn new(
        client: reqwest::Client,
        project_id: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            collection: collection.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.project_id
        )
    }

    /// Document URL with `id` pushed as one encoded path segment, so ids
    /// holding `?`, `#`, `/` or `%` cannot escape into the query or path.
    fn document_url(&self, id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.documents_url())
            .with_context(|| format!("invalid firestore base url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("firestore base url cannot hold a path: {}", self.base_url))?
            .push(&self.collection)
            .push(id);
        Ok(url)
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }
}

impl TemplateStore for FirestoreStore {
    fn list(&self) -> StoreFuture<Vec<Template>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}:runQuery", store.documents_url());
            let body = json!({
                "structuredQuery": {
                    "from": [{ "collectionId": store.collection }],
                    "orderBy": [{
                        "field": { "fieldPath": "name" },
                        "direction": "ASCENDING"
                    }]
                }
            });
            let response = store
                .with_key(store.client.post(&url).json(&body))
                .send()
                .await
                .with_context(|| "firestore query request failed")?;
            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| "failed to read firestore response")?;
            if !status.is_success() {
                return Err(anyhow!("firestore query failed ({}): {}", status, text));
            }
            let templates = parse_run_query(&text)?;
            debug!("firestore returned {} templates", templates.len());
            Ok(templates)
        })
    }

    fn get(&self, id: &str) -> StoreFuture<Option<Template>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move {
            let url = store.document_url(&id)?;
            let response = store
                .with_key(store.client.get(url))
                .send()
                .await
                .with_context(|| "firestore document request failed")?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let text = response
                .text()
                .await
                .with_context(|| "failed to read firestore response")?;
            if !status.is_success() {
                return Err(anyhow!("firestore get failed ({}): {}", status, text));
            }
            let document: Document =
                serde_json::from_str(&text).with_context(|| "invalid firestore document")?;
            Ok(Some(document.into_template()?))
        })
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    fn id(&self) -> Result<&str> {
        self.name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("document name has no id: {}", self.name))
    }

    fn into_template(self) -> Result<Template> {
        let id = self.id()?.to_string();
        let fields = TemplateFields {
            name: self.fields.get("name").and_then(string_value),
            image: self.fields.get("image").and_then(string_value),
            width: self.fields.get("width").and_then(number_value),
            height: self.fields.get("height").and_then(number_value),
        };
        Ok(fields.into_template(id))
    }
}

fn parse_run_query(text: &str) -> Result<Vec<Template>> {
    let items: Vec<RunQueryItem> =
        serde_json::from_str(text).with_context(|| "invalid firestore query response")?;
    items
        .into_iter()
        .filter_map(|item| item.document)
        .map(Document::into_template)
        .collect()
}

fn string_value(value: &Value) -> Option<String> {
    value
        .get("stringValue")
        .and_then(Value::as_str)
        .map(|value| value.to_string())
}

// integerValue is transported as a decimal string.
fn number_value(value: &Value) -> Option<f64> {
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(text) => text.parse::<f64>().ok(),
            other => other.as_f64(),
        };
    }
    value.get("doubleValue").and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_query_response_is_decoded() {
        let body = r#"[
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/templates/B",
                    "fields": {
                        "name": {"stringValue": "Buttons"},
                        "image": {"stringValue": "https://firebasestorage.googleapis.com/b.jpg"},
                        "width": {"integerValue": "600"},
                        "height": {"doubleValue": 908.0}
                    }
                },
                "readTime": "2024-01-01T00:00:00Z"
            },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/templates/A",
                    "fields": {"name": {"stringValue": "Drake"}}
                }
            }
        ]"#;
        let templates = parse_run_query(body).expect("parse");
        assert_eq!(templates.len(), 2);
        assert_eq!(
            templates[0],
            Template {
                id: "B".to_string(),
                name: "Buttons".to_string(),
                image: "https://firebasestorage.googleapis.com/b.jpg".to_string(),
                width: 600,
                height: 908,
            }
        );
        assert_eq!(templates[1].id, "A");
        assert_eq!((templates[1].width, templates[1].height), (800, 600));
    }

    #[test]
    fn empty_collection_yields_no_templates() {
        let templates =
            parse_run_query(r#"[{"readTime": "2024-01-01T00:00:00Z"}]"#).expect("parse");
        assert!(templates.is_empty());
    }

    #[test]
    fn documents_url_includes_project() {
        let store = FirestoreStore::new(reqwest::Client::new(), "memes", "templates")
            .with_base_url("http://127.0.0.1:8080/v1/");
        assert_eq!(
            store.documents_url(),
            "http://127.0.0.1:8080/v1/projects/memes/databases/(default)/documents"
        );
    }

    #[test]
    fn document_url_encodes_the_id_as_one_segment() {
        let store = FirestoreStore::new(reqwest::Client::new(), "memes", "templates")
            .with_base_url("http://127.0.0.1:8080/v1");
        let base = "http://127.0.0.1:8080/v1/projects/memes/databases/(default)/documents/templates";
        let cases = [
            ("drake", "drake"),
            ("drake?x=1", "drake%3Fx=1"),
            ("drake#frag", "drake%23frag"),
            ("a/b", "a%2Fb"),
            ("a%2Fb", "a%252Fb"),
        ];
        for (id, segment) in cases {
            let url = store.document_url(id).expect("url");
            assert_eq!(url.as_str(), format!("{}/{}", base, segment), "{}", id);
            assert_eq!(url.query(), None);
            assert_eq!(url.fragment(), None);
        }
    }

    #[tokio::test]
    async fn odd_ids_do_not_resolve_to_another_document() {
        use axum::Router;
        use axum::http::{StatusCode as HttpStatus, Uri};
        use axum::response::IntoResponse;
        use std::sync::{Arc, Mutex};

        let requested: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = Arc::clone(&requested);
        let app = Router::new().fallback(move |uri: Uri| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().expect("lock").push(uri.to_string());
                if uri.path().ends_with("/templates/drake") {
                    let document = json!({
                        "name": "projects/memes/databases/(default)/documents/templates/drake",
                        "fields": {"name": {"stringValue": "Drake"}}
                    });
                    axum::Json(document).into_response()
                } else {
                    HttpStatus::NOT_FOUND.into_response()
                }
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let store = FirestoreStore::new(reqwest::Client::new(), "memes", "templates")
            .with_base_url(format!("http://{}/v1", addr));
        let found = store.get("drake").await.expect("get");
        assert_eq!(found.map(|template| template.id), Some("drake".to_string()));
        assert_eq!(store.get("drake?x=1").await.expect("get"), None);
        assert_eq!(store.get("drake#frag").await.expect("get"), None);

        let requested = requested.lock().expect("lock").clone();
        assert_eq!(
            requested,
            vec![
                "/v1/projects/memes/databases/(default)/documents/templates/drake".to_string(),
                "/v1/projects/memes/databases/(default)/documents/templates/drake%3Fx=1"
                    .to_string(),
                "/v1/projects/memes/databases/(default)/documents/templates/drake%23frag"
                    .to_string(),
            ]
        );
    }
}
