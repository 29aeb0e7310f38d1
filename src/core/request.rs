//! Purpose: Normalize the three supported request shapes into one canonical form.
//! Exports: `ExtractionRequest`, `PayloadSource`, `normalize_get`, `normalize_post`.
//! Role: Pure parsing; no knowledge of decoding, querying, or transport.
//! Invariants: Query values are split on `,` before percent-decoding, so an
//! encoded comma inside a field expression survives as part of that element.
//! Invariants: Field order is preserved; duplicates are kept and evaluated
//! independently downstream.

use std::borrow::Cow;

use bytes::Bytes;
use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadSource {
    Embedded { bytes: Bytes, base64: bool },
    Remote { url: String },
}

/// Canonical request: one payload source plus an ordered field list,
/// identical regardless of which HTTP shape produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub source: PayloadSource,
    pub fields: Vec<String>,
}

/// JSON body for the remote-locator POST shape. `fields` arrives either as
/// an array of expressions or as one comma-separated string; the variant is
/// resolved right here and never carried further.
#[derive(Debug, Deserialize)]
struct RemoteBody {
    url: String,
    fields: FieldsSpec,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldsSpec {
    ArrayForm(Vec<String>),
    CsvForm(String),
}

impl FieldsSpec {
    fn into_fields(self) -> Vec<String> {
        match self {
            // Array elements are taken literally, no decoding or trimming.
            FieldsSpec::ArrayForm(list) => list,
            FieldsSpec::CsvForm(csv) => split_fields(&csv, false).unwrap_or_default(),
        }
    }
}

pub fn normalize_get(raw_query: Option<&str>) -> Result<ExtractionRequest, Error> {
    let pairs = raw_query_pairs(raw_query.unwrap_or_default());
    let fields_raw = query_param(&pairs, "fields")
        .ok_or_else(|| missing_param("fields"))?;
    let url_raw = query_param(&pairs, "url").ok_or_else(|| missing_param("url"))?;

    let fields = nonempty_fields(split_fields(fields_raw, true)?)?;
    let url = percent_decode(url_raw)?.into_owned();

    Ok(ExtractionRequest {
        source: PayloadSource::Remote { url },
        fields,
    })
}

/// POST dispatch: a `fields` query parameter means the body is the raw
/// payload; otherwise the body must be the JSON `{ url, fields }` shape.
pub fn normalize_post(
    raw_query: Option<&str>,
    body: Bytes,
    body_is_base64: bool,
) -> Result<ExtractionRequest, Error> {
    let pairs = raw_query_pairs(raw_query.unwrap_or_default());
    if let Some(fields_raw) = query_param(&pairs, "fields") {
        let fields = nonempty_fields(split_fields(fields_raw, true)?)?;
        return Ok(ExtractionRequest {
            source: PayloadSource::Embedded {
                bytes: body,
                base64: body_is_base64,
            },
            fields,
        });
    }

    let parsed: RemoteBody = serde_json::from_slice(&body).map_err(|err| {
        Error::new(ErrorKind::InvalidRequest)
            .with_message(
                "expected a `fields` query parameter with a raw body, \
                 or a JSON body with `url` and `fields`",
            )
            .with_detail(err.to_string())
    })?;
    let fields = nonempty_fields(parsed.fields.into_fields())?;

    Ok(ExtractionRequest {
        source: PayloadSource::Remote { url: parsed.url },
        fields,
    })
}

/// Split a raw query string into pairs, percent-decoding keys only. Values
/// stay encoded so the comma split in `split_fields` sees element boundaries,
/// not encoded commas.
fn raw_query_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| key.to_string());
            (key, value.to_string())
        })
        .collect()
}

fn query_param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Comma-split, optionally percent-decode each element, trim, drop empties.
fn split_fields(raw: &str, decode_elements: bool) -> Result<Vec<String>, Error> {
    let mut fields = Vec::new();
    for element in raw.split(',') {
        let element = if decode_elements {
            percent_decode(element)?
        } else {
            Cow::Borrowed(element)
        };
        let trimmed = element.trim();
        if !trimmed.is_empty() {
            fields.push(trimmed.to_string());
        }
    }
    Ok(fields)
}

fn nonempty_fields(fields: Vec<String>) -> Result<Vec<String>, Error> {
    if fields.is_empty() {
        return Err(Error::new(ErrorKind::InvalidRequest)
            .with_message("`fields` contains no field expressions"));
    }
    Ok(fields)
}

fn percent_decode(raw: &str) -> Result<Cow<'_, str>, Error> {
    urlencoding::decode(raw).map_err(|err| {
        Error::new(ErrorKind::InvalidRequest)
            .with_message("query parameter is not valid percent-encoded UTF-8")
            .with_detail(err.to_string())
    })
}

fn missing_param(name: &str) -> Error {
    Error::new(ErrorKind::InvalidRequest)
        .with_message(format!("missing required query parameter `{name}`"))
}
