//! Translation of list-endpoint query strings into MongoDB filters,
//! projections, sort orders and pagination.
//!
//! `?averageCost[lte]=10000&careers[in]=Business&select=name&sort=-name&page=2&limit=10`
//! becomes a filter `{averageCost: {$lte: 10000}, careers: {$in: ["Business"]}}`,
//! a projection on `name`, a sort `{name: -1}` and skip/limit of 10/10.

use std::collections::{BTreeMap, HashMap};

use mongodb::bson::{doc, Bson, Document};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 25;
pub const MAX_LIMIT: u64 = 100;
/// Highest page whose offset still fits the signed skip MongoDB accepts.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_LIMIT;

/// Query parameters that control the listing rather than filter it.
const RESERVED: [&str; 4] = ["select", "sort", "page", "limit"];

/// Bracket operators accepted in filter keys.
const OPERATORS: [(&str, &str); 5] = [
    ("gt", "$gt"),
    ("gte", "$gte"),
    ("lt", "$lt"),
    ("lte", "$lte"),
    ("in", "$in"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Document,
    /// Top-level fields to keep in each returned item. `_id` is always kept.
    pub select: Option<Vec<String>>,
    pub sort: Document,
    pub page: u64,
    pub limit: u64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: Document::new(),
            select: None,
            sort: default_sort(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn default_sort() -> Document {
    doc! { "createdAt": -1 }
}

/// Field paths are restricted to plain names so that clients cannot inject
/// query operators.
fn is_safe_field(field: &str) -> bool {
    !field.is_empty()
        && !field.starts_with('.')
        && !field.ends_with('.')
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Split `field[op]` into its parts. Plain keys yield no operator.
fn split_key(key: &str) -> Option<(&str, Option<&str>)> {
    match key.find('[') {
        None => Some((key, None)),
        Some(open) => {
            let rest = key[open + 1..].strip_suffix(']')?;
            Some((&key[..open], Some(rest)))
        }
    }
}

fn coerce(raw: &str) -> Bson {
    if let Ok(int) = raw.parse::<i64>() {
        if int.to_string() == raw {
            return Bson::Int64(int);
        }
    }
    if raw.contains('.') {
        if let Ok(float) = raw.parse::<f64>() {
            if float.is_finite() {
                return Bson::Double(float);
            }
        }
    }
    match raw {
        "true" => Bson::Boolean(true),
        "false" => Bson::Boolean(false),
        _ => Bson::String(raw.to_string()),
    }
}

fn parse_positive(raw: Option<&String>, fallback: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

fn parse_page(raw: Option<&String>) -> u64 {
    Some(parse_positive(raw, DEFAULT_PAGE))
        .filter(|page| *page <= MAX_PAGE)
        .unwrap_or(DEFAULT_PAGE)
}

fn parse_sort(raw: &str) -> Document {
    let mut sort = Document::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, direction) = match part.strip_prefix('-') {
            Some(field) => (field, -1),
            None => (part, 1),
        };
        if is_safe_field(field) {
            sort.insert(field, direction);
        }
    }
    if sort.is_empty() {
        default_sort()
    } else {
        sort
    }
}

fn parse_select(raw: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| is_safe_field(f))
        .map(str::to_string)
        .collect();
    (!fields.is_empty()).then_some(fields)
}

impl ListQuery {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let ordered: BTreeMap<&str, &str> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut filter = Document::new();
        for (key, raw) in ordered {
            if RESERVED.contains(&key) || key.starts_with('$') {
                continue;
            }
            let Some((field, op)) = split_key(key) else {
                tracing::debug!(key, "Ignoring malformed query key");
                continue;
            };
            if !is_safe_field(field) {
                tracing::debug!(key, "Ignoring unsafe query field");
                continue;
            }

            match op {
                None => {
                    filter.insert(field, coerce(raw));
                }
                Some(op) => {
                    let Some((_, mongo_op)) = OPERATORS.iter().find(|(name, _)| *name == op)
                    else {
                        tracing::debug!(key, "Ignoring unknown query operator");
                        continue;
                    };
                    let value = if *mongo_op == "$in" {
                        Bson::Array(
                            raw.split(',')
                                .map(str::trim)
                                .filter(|v| !v.is_empty())
                                .map(coerce)
                                .collect(),
                        )
                    } else {
                        coerce(raw)
                    };
                    // Operators on the same field merge; an equality on that field is replaced.
                    match filter.get_mut(field) {
                        Some(Bson::Document(existing)) => {
                            existing.insert(*mongo_op, value);
                        }
                        _ => {
                            let mut ops = Document::new();
                            ops.insert(*mongo_op, value);
                            filter.insert(field, ops);
                        }
                    }
                }
            }
        }

        Self {
            filter,
            select: params.get("select").and_then(|s| parse_select(s)),
            sort: params
                .get("sort")
                .map(|s| parse_sort(s))
                .unwrap_or_else(default_sort),
            page: parse_page(params.get("page")),
            limit: parse_positive(params.get("limit"), DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        let next = (self.page * self.limit < total).then(|| PageRef {
            page: self.page + 1,
            limit: self.limit,
        });
        let prev = (self.skip() > 0).then(|| PageRef {
            page: self.page - 1,
            limit: self.limit,
        });
        Pagination { next, prev }
    }

    /// Reduce a serialized item to the selected fields.
    pub fn project(&self, value: serde_json::Value) -> serde_json::Value {
        let Some(fields) = &self.select else {
            return value;
        };
        match value {
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .filter(|(key, _)| {
                        key == "_id" || fields.iter().any(|f| f.split('.').next() == Some(key))
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// One page of results together with the total number of matching documents.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Run `query` against `collection`, with `scope` added to the filter.
///
/// Keys in `scope` override client-supplied filters on the same field.
pub async fn fetch_page<T>(
    collection: &mongodb::Collection<T>,
    query: &ListQuery,
    scope: Document,
) -> Result<Page<T>, AppError>
where
    T: DeserializeOwned + Send + Sync,
{
    use futures::TryStreamExt;
    use mongodb::options::FindOptions;

    let mut filter = query.filter.clone();
    filter.extend(scope);

    let total = collection.count_documents(filter.clone()).await?;

    let options = FindOptions::builder()
        .sort(query.sort.clone())
        .skip(query.skip())
        .limit(query.limit as i64)
        .build();

    let items: Vec<T> = collection
        .find(filter)
        .with_options(options)
        .await?
        .try_collect()
        .await?;

    Ok(Page { items, total })
}
