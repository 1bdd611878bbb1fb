//! The document database's REST interface.
//!
//! Documents come back in a typed encoding (`{"integerValue": "5"}`,
//! `{"mapValue": {"fields": ...}}`, ...). They are decoded into plain JSON
//! before anything else sees them, so the rest of the client can deserialize
//! records directly.

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use snafu::{OptionExt, ResultExt};

use super::{DocumentSource, Error, ExistsSnafu, MalformedSnafu, Query, StatusSnafu, TransportSnafu};

/// Page size when listing a collection without a limit.
const PAGE_SIZE: usize = 300;

pub struct FirestoreSource {
    http: reqwest::Client,
    documents_url: String,
    api_key: Option<String>,
}

impl FirestoreSource {
    pub fn new(
        http: reqwest::Client,
        database_url: &str,
        project_id: &str,
        api_key: Option<String>,
    ) -> Self {
        FirestoreSource {
            http,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                database_url.trim_end_matches('/'),
                project_id
            ),
            api_key,
        }
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.query(&[("key", key)]),
            None => req,
        }
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, Error> {
        let what = format!("{}/{}", collection, id);
        let req = self.http.get(format!("{}/{}", self.documents_url, what));
        let resp = self
            .with_key(req)
            .send()
            .await
            .context(TransportSnafu { what: &what })?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = read_json(resp, &what).await?;
        decode_document(&doc).map(Some)
    }

    async fn list(&self, collection: &str, limit: Option<usize>) -> Result<Value, Error> {
        let mut docs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page_size = limit.map_or(PAGE_SIZE, |l| l.saturating_sub(docs.len()));
            let mut req = self
                .http
                .get(format!("{}/{}", self.documents_url, collection))
                .query(&[("pageSize", page_size.to_string())]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let resp = self
                .with_key(req)
                .send()
                .await
                .context(TransportSnafu { what: collection })?;
            let page = read_json(resp, collection).await?;
            if let Some(found) = page.get("documents").and_then(Value::as_array) {
                for doc in found {
                    docs.push(decode_document(doc)?);
                }
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_owned);
            let full = limit.map_or(false, |l| docs.len() >= l);
            if page_token.is_none() || full {
                break;
            }
        }
        Ok(Value::Array(docs))
    }

    async fn run_query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: Option<usize>,
    ) -> Result<Value, Error> {
        let mut structured = json!({
            "from": [{"collectionId": collection}],
            "where": {
                "fieldFilter": {
                    "field": {"fieldPath": field},
                    "op": "EQUAL",
                    "value": {"stringValue": value},
                }
            },
        });
        if let Some(limit) = limit {
            structured["limit"] = json!(limit);
        }
        let req = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .json(&json!({ "structuredQuery": structured }));
        let resp = self
            .with_key(req)
            .send()
            .await
            .context(TransportSnafu { what: collection })?;
        let results = read_json(resp, collection).await?;
        let rows = results.as_array().context(MalformedSnafu {
            what: collection,
            detail: "query result is not an array",
        })?;
        let docs = rows
            .iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(docs))
    }
}

#[async_trait]
impl DocumentSource for FirestoreSource {
    async fn fetch(&self, query: &Query) -> Result<Option<Value>, Error> {
        match query {
            Query::Document { collection, id } => self.get_document(collection, id).await,
            Query::Collection {
                collection,
                filter: None,
                limit,
            } => self.list(collection, *limit).await.map(Some),
            Query::Collection {
                collection,
                filter: Some((field, value)),
                limit,
            } => self
                .run_query(collection, field, value, *limit)
                .await
                .map(Some),
        }
    }

    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<(), Error> {
        let what = format!("{}/{}", collection, id);
        let req = self
            .http
            .post(format!("{}/{}", self.documents_url, collection))
            .query(&[("documentId", id)])
            .json(&json!({ "fields": encode_fields(&fields) }));
        let resp = self
            .with_key(req)
            .send()
            .await
            .context(TransportSnafu { what: &what })?;
        if resp.status() == StatusCode::CONFLICT {
            return ExistsSnafu { what }.fail();
        }
        read_json(resp, &what).await.map(drop)
    }
}

async fn read_json(resp: reqwest::Response, what: &str) -> Result<Value, Error> {
    let status = resp.status();
    if !status.is_success() {
        return StatusSnafu { what, status }.fail();
    }
    let value = resp.json().await.context(TransportSnafu { what })?;
    debug!("{} answered {}", what, status);
    Ok(value)
}

/// Decode a REST document into a plain object with its id under `id`.
pub fn decode_document(doc: &Value) -> Result<Value, Error> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .context(MalformedSnafu {
            what: "document",
            detail: "missing name",
        })?;
    let id = name.rsplit('/').next().unwrap_or(name);
    let mut fields = match doc.get("fields") {
        Some(Value::Object(fields)) => decode_fields(fields),
        _ => Map::new(),
    };
    fields.insert("id".into(), Value::String(id.into()));
    Ok(Value::Object(fields))
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

/// Decode one typed value. Unknown encodings decode to null.
pub fn decode_value(typed: &Value) -> Value {
    let (kind, inner) = match typed.as_object().and_then(|o| o.iter().next()) {
        Some(entry) => entry,
        None => return Value::Null,
    };
    match kind.as_str() {
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "nullValue" => Value::Null,
        "stringValue" | "booleanValue" | "doubleValue" | "timestampValue" | "referenceValue"
        | "bytesValue" | "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => Value::Object(decode_fields(fields)),
            _ => Value::Object(Map::new()),
        },
        _ => Value::Null,
    }
}

/// Encode a plain JSON object as REST document fields.
pub fn encode_fields(plain: &Value) -> Value {
    match plain {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect(),
        ),
        _ => Value::Object(Map::new()),
    }
}

pub fn encode_value(plain: &Value) -> Value {
    match plain {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_f64() => json!({ "doubleValue": n }),
        Value::Number(n) => json!({ "integerValue": n.to_string() }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(plain) } }),
    }
}
