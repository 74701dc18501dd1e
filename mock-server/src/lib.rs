use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// Mount point of every collection.
pub const NAMESPACE: &str = "/api/v1";

/// Records of one collection, keyed by server-assigned id.
pub type Table = BTreeMap<u64, Map<String, Value>>;

#[derive(Default)]
pub struct Store {
    next_id: u64,
    tables: HashMap<String, Table>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route(
            &format!("{NAMESPACE}/{{collection}}"),
            get(list_records).post(create_record),
        )
        .route(
            &format!("{NAMESPACE}/{{collection}}/{{id}}"),
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// `posts.json` and `posts` address the same collection.
fn strip_extension(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

fn parse_id(segment: &str) -> Result<u64, Response> {
    strip_extension(segment)
        .parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, json!({"id": ["is not a number"]})))
}

fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, json!({"error": "not found"}))
}

/// Field-keyed validation messages, Rails style. `require_name` is set for
/// creates; updates only check a name that is present.
fn validate(fields: &Map<String, Value>, require_name: bool) -> Result<(), Response> {
    let blank = match fields.get("name") {
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Null) => true,
        Some(_) => false,
        None => require_name,
    };
    if blank {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"name": ["can't be blank"]}),
        ));
    }
    Ok(())
}

fn as_object(body: Value) -> Result<Map<String, Value>, Response> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"base": ["must be an object"]}),
        )),
    }
}

fn matches_filter(record: &Map<String, Value>, filter: &HashMap<String, String>) -> bool {
    filter.iter().all(|(key, expected)| match record.get(key) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

async fn list_records(
    State(db): State<Db>,
    Path(collection): Path<String>,
    Query(filter): Query<HashMap<String, String>>,
) -> Json<Vec<Map<String, Value>>> {
    let store = db.read().await;
    let records = store
        .tables
        .get(strip_extension(&collection))
        .map(|table| {
            table
                .values()
                .filter(|record| matches_filter(record, &filter))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    Json(records)
}

async fn create_record(
    State(db): State<Db>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Map<String, Value>>), Response> {
    let mut fields = as_object(body)?;
    validate(&fields, true)?;

    let mut store = db.write().await;
    store.next_id += 1;
    let id = store.next_id;
    fields.insert("id".to_string(), Value::from(id));
    store
        .tables
        .entry(strip_extension(&collection).to_string())
        .or_default()
        .insert(id, fields.clone());
    tracing::debug!(%collection, id, "created record");
    Ok((StatusCode::CREATED, Json(fields)))
}

async fn get_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Map<String, Value>>, Response> {
    let id = parse_id(&id)?;
    let store = db.read().await;
    store
        .tables
        .get(strip_extension(&collection))
        .and_then(|table| table.get(&id))
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn update_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Map<String, Value>>, Response> {
    let id = parse_id(&id)?;
    let mut changes = as_object(body)?;
    validate(&changes, false)?;
    changes.remove("id");

    let mut store = db.write().await;
    let record = store
        .tables
        .get_mut(strip_extension(&collection))
        .and_then(|table| table.get_mut(&id))
        .ok_or_else(not_found)?;
    record.extend(changes);
    tracing::debug!(%collection, id, "updated record");
    Ok(Json(record.clone()))
}

async fn delete_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, Response> {
    let id = parse_id(&id)?;
    let mut store = db.write().await;
    store
        .tables
        .get_mut(strip_extension(&collection))
        .and_then(|table| table.remove(&id))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn validate_requires_name_on_create() {
        assert!(validate(&object(json!({"title": "x"})), true).is_err());
        assert!(validate(&object(json!({"name": "  "})), true).is_err());
        assert!(validate(&object(json!({"name": "A"})), true).is_ok());
    }

    #[test]
    fn validate_allows_partial_updates() {
        assert!(validate(&object(json!({"title": "x"})), false).is_ok());
        assert!(validate(&object(json!({"name": ""})), false).is_err());
    }

    #[test]
    fn strip_extension_handles_both_forms() {
        assert_eq!(strip_extension("post_groups.json"), "post_groups");
        assert_eq!(strip_extension("post_groups"), "post_groups");
        assert_eq!(parse_id("42.json").ok(), Some(42));
        assert!(parse_id("abc").is_err());
    }

    #[test]
    fn filter_compares_stringified_values() {
        let record = object(json!({"name": "A", "rank": 3}));
        let mut filter = HashMap::new();
        filter.insert("rank".to_string(), "3".to_string());
        assert!(matches_filter(&record, &filter));
        filter.insert("name".to_string(), "B".to_string());
        assert!(!matches_filter(&record, &filter));
    }
}
