//! Cloud Firestore backend over the REST v1 API.
//!
//! Documents are stored one collection per entity (`users`, `lessons`,
//! `exercises`, `user_progress`, `ai_lessons`) with the same camelCase field
//! names the HTTP API uses. Entities go through `serde_json::Value` and are then
//! mapped onto Firestore's typed value encoding (`integerValue`, `mapValue`, ...).
//!
//! Auth is a bearer token taken from `FIREBASE_ACCESS_TOKEN`; the emulator
//! (`FIRESTORE_EMULATOR_HOST`) needs none.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{sort_ai_lessons, sort_exercises, sort_lessons, Storage};
use crate::config::FirestoreConfig;
use crate::domain::{
  AiLesson, Exercise, Learner, Lesson, NewAiLesson, NewLearner, NewProgress, UserProgress,
};
use crate::error::StorageError;

const USERS: &str = "users";
const LESSONS: &str = "lessons";
const EXERCISES: &str = "exercises";
const PROGRESS: &str = "user_progress";
const AI_LESSONS: &str = "ai_lessons";

const PAGE_SIZE: u32 = 300;

#[derive(Clone)]
pub struct FirestoreStorage {
  client: reqwest::Client,
  /// `.../projects/{project}/databases/{database}/documents`
  documents_url: Url,
  access_token: Option<String>,
}

#[derive(Deserialize)]
struct Document {
  /// Full resource name; the last segment is the document id.
  #[serde(default)]
  name: String,
  #[serde(default)]
  fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
  #[serde(default)]
  documents: Vec<Document>,
  #[serde(default)]
  next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct QueryRow {
  #[serde(default)]
  document: Option<Document>,
}

impl FirestoreStorage {
  pub fn new(cfg: &FirestoreConfig) -> Result<Self, StorageError> {
    if cfg.project_id.is_empty() {
      return Err(StorageError::Config("Firestore backend needs a project id (FIREBASE_PROJECT_ID)".into()));
    }
    let base = match &cfg.emulator_host {
      Some(host) => format!("http://{host}/v1"),
      None => "https://firestore.googleapis.com/v1".to_string(),
    };
    let documents_url = Url::parse(&format!("{base}/projects/{}/databases/{}/documents", cfg.project_id, cfg.database))
      .map_err(|e| StorageError::Config(format!("bad Firestore URL: {e}")))?;
    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
    Ok(Self { client, documents_url, access_token: cfg.access_token.clone() })
  }

  fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
    let req = self
      .client
      .request(method, url)
      .header(USER_AGENT, "lingo-backend/0.1")
      .header(CONTENT_TYPE, "application/json");
    match &self.access_token {
      Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
      None => req,
    }
  }

  /// `{documents}/{collection}/{id}` with `id` as a single encoded path segment,
  /// so `/`, `?` and `#` can never address another document.
  fn doc_url(&self, collection: &str, id: &str) -> Result<Url, StorageError> {
    self.child_url(&[collection, id])
  }

  fn child_url(&self, segments: &[&str]) -> Result<Url, StorageError> {
    let mut url = self.documents_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| StorageError::Config("Firestore URL cannot take path segments".into()))?
      .extend(segments);
    Ok(url)
  }

  fn list_url(&self, collection: &str, page_token: Option<&str>) -> Result<Url, StorageError> {
    let mut url = self.child_url(&[collection])?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("pageSize", &PAGE_SIZE.to_string());
      if let Some(tok) = page_token {
        query.append_pair("pageToken", tok);
      }
    }
    Ok(url)
  }

  #[instrument(level = "debug", skip(self))]
  async fn get_doc<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, StorageError> {
    let url = self.doc_url(collection, id)?;
    let res = self.request(reqwest::Method::GET, url).send().await?;
    if res.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let doc: Document = check(res).await?.json().await?;
    decode_named(&doc).map(Some)
  }

  /// Create or fully replace a document.
  #[instrument(level = "debug", skip(self, value))]
  async fn set_doc<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> Result<(), StorageError> {
    let url = self.doc_url(collection, id)?;
    let body = json!({ "fields": encode_document(value)? });
    let res = self.request(reqwest::Method::PATCH, url).json(&body).send().await?;
    check(res).await?;
    debug!(target: "storage", %collection, %id, "Document written (firestore)");
    Ok(())
  }

  async fn list_docs<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
      let url = self.list_url(collection, page_token.as_deref())?;
      let res = self.request(reqwest::Method::GET, url).send().await?;
      let page: ListResponse = check(res).await?.json().await?;
      for doc in &page.documents {
        out.push(decode_named(doc)?);
      }
      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(tok) => page_token = Some(tok),
        None => break,
      }
    }
    Ok(out)
  }

  /// Equality-filtered collection query (`runQuery`), all filters ANDed.
  async fn query_eq<T: DeserializeOwned>(&self, collection: &str, filters: &[(&str, Value)]) -> Result<Vec<T>, StorageError> {
    let url = Url::parse(&format!("{}:runQuery", self.documents_url))
      .map_err(|e| StorageError::Config(format!("bad Firestore URL: {e}")))?;
    let body = json!({ "structuredQuery": structured_query(collection, filters) });
    let res = self.request(reqwest::Method::POST, url).json(&body).send().await?;
    let rows: Vec<QueryRow> = check(res).await?.json().await?;
    rows
      .iter()
      .filter_map(|r| r.document.as_ref())
      .map(decode_named)
      .collect()
  }
}

#[async_trait]
impl Storage for FirestoreStorage {
  fn backend_name(&self) -> &'static str { "firestore" }

  async fn get_user(&self, id: &str) -> Result<Option<Learner>, StorageError> {
    self.get_doc(USERS, id).await
  }

  async fn get_user_by_username(&self, username: &str) -> Result<Option<Learner>, StorageError> {
    let found: Vec<Learner> = self.query_eq(USERS, &[("username", json!(username))]).await?;
    Ok(found.into_iter().next())
  }

  async fn create_user(&self, new: NewLearner) -> Result<Learner, StorageError> {
    let learner = Learner::new(Uuid::new_v4().to_string(), new.username, new.email);
    self.set_doc(USERS, &learner.id, &learner).await?;
    Ok(learner)
  }

  async fn put_user(&self, learner: &Learner) -> Result<(), StorageError> {
    self.set_doc(USERS, &learner.id, learner).await
  }

  async fn get_all_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
    let mut lessons: Vec<Lesson> = self.list_docs(LESSONS).await?;
    sort_lessons(&mut lessons);
    Ok(lessons)
  }

  async fn get_lesson(&self, id: u32) -> Result<Option<Lesson>, StorageError> {
    self.get_doc(LESSONS, &id.to_string()).await
  }

  async fn get_lessons_by_unit(&self, unit: u32) -> Result<Vec<Lesson>, StorageError> {
    let mut lessons: Vec<Lesson> = self.query_eq(LESSONS, &[("unit", json!(unit))]).await?;
    sort_lessons(&mut lessons);
    Ok(lessons)
  }

  async fn create_lesson(&self, lesson: Lesson) -> Result<Lesson, StorageError> {
    self.set_doc(LESSONS, &lesson.id.to_string(), &lesson).await?;
    Ok(lesson)
  }

  async fn get_exercises_by_lesson_id(&self, lesson_id: u32) -> Result<Vec<Exercise>, StorageError> {
    let mut exercises: Vec<Exercise> = self.query_eq(EXERCISES, &[("lessonId", json!(lesson_id))]).await?;
    sort_exercises(&mut exercises);
    Ok(exercises)
  }

  async fn get_exercise(&self, id: &str) -> Result<Option<Exercise>, StorageError> {
    self.get_doc(EXERCISES, id).await
  }

  async fn create_exercise(&self, exercise: Exercise) -> Result<Exercise, StorageError> {
    self.set_doc(EXERCISES, &exercise.id, &exercise).await?;
    Ok(exercise)
  }

  async fn get_user_progress(&self, user_id: &str, lesson_id: u32) -> Result<Vec<UserProgress>, StorageError> {
    self
      .query_eq(PROGRESS, &[("userId", json!(user_id)), ("lessonId", json!(lesson_id))])
      .await
  }

  async fn update_progress(&self, progress: NewProgress) -> Result<UserProgress, StorageError> {
    let record = progress.into_record(Uuid::new_v4().to_string());
    self.set_doc(PROGRESS, &record.id, &record).await?;
    Ok(record)
  }

  async fn get_user_ai_lessons(&self, user_id: &str) -> Result<Vec<AiLesson>, StorageError> {
    let mut lessons: Vec<AiLesson> = self.query_eq(AI_LESSONS, &[("userId", json!(user_id))]).await?;
    sort_ai_lessons(&mut lessons);
    Ok(lessons)
  }

  async fn create_ai_lesson(&self, lesson: NewAiLesson) -> Result<AiLesson, StorageError> {
    let record = AiLesson {
      id: Uuid::new_v4().to_string(),
      user_id: lesson.user_id,
      title: lesson.title,
      content: lesson.content,
      difficulty: lesson.difficulty,
      created_at: Some(Utc::now()),
    };
    self.set_doc(AI_LESSONS, &record.id, &record).await?;
    Ok(record)
  }
}

/// Turn a non-2xx response into `StorageError::Backend`, pulling `error.message` if present.
async fn check(res: reqwest::Response) -> Result<reqwest::Response, StorageError> {
  if res.status().is_success() {
    return Ok(res);
  }
  let status = res.status().as_u16();
  let body = res.text().await.unwrap_or_default();
  let message = extract_firestore_error(&body).unwrap_or(body);
  Err(StorageError::Backend { status, message })
}

fn extract_firestore_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

fn structured_query(collection: &str, filters: &[(&str, Value)]) -> Value {
  let field_filters: Vec<Value> = filters
    .iter()
    .map(|(field, value)| {
      json!({ "fieldFilter": {
        "field": { "fieldPath": field },
        "op": "EQUAL",
        "value": encode_value(value),
      }})
    })
    .collect();

  let mut query = json!({ "from": [{ "collectionId": collection }] });
  let where_clause = match field_filters.len() {
    0 => None,
    1 => field_filters.into_iter().next(),
    _ => Some(json!({ "compositeFilter": { "op": "AND", "filters": field_filters } })),
  };
  if let Some(w) = where_clause {
    query["where"] = w;
  }
  query
}

// ---------- Value codec ----------

pub fn encode_document<T: Serialize>(value: &T) -> Result<Map<String, Value>, StorageError> {
  match serde_json::to_value(value).map_err(|e| StorageError::Decode(e.to_string()))? {
    Value::Object(obj) => Ok(obj.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect()),
    other => Err(StorageError::Decode(format!("expected an object, got {other}"))),
  }
}

pub fn decode_document<T: DeserializeOwned>(fields: &Map<String, Value>) -> Result<T, StorageError> {
  from_plain(decode_fields(fields)?)
}

/// Decode a fetched document. Documents written without an `id` field take it
/// from their resource name; numeric names are retried as numbers for integer ids.
fn decode_named<T: DeserializeOwned>(doc: &Document) -> Result<T, StorageError> {
  let plain = decode_fields(&doc.fields)?;
  let name_id = doc.name.rsplit('/').next().filter(|s| !s.is_empty());
  let Some(name_id) = name_id.filter(|_| !plain.contains_key("id")) else {
    return from_plain(plain);
  };

  let mut as_text = plain.clone();
  as_text.insert("id".into(), Value::from(name_id));
  match from_plain(as_text) {
    Ok(v) => Ok(v),
    Err(e) => match name_id.parse::<u64>() {
      Ok(n) => {
        let mut as_number = plain;
        as_number.insert("id".into(), Value::from(n));
        from_plain(as_number)
      }
      Err(_) => Err(e),
    },
  }
}

fn from_plain<T: DeserializeOwned>(plain: Map<String, Value>) -> Result<T, StorageError> {
  serde_json::from_value(Value::Object(plain)).map_err(|e| StorageError::Decode(e.to_string()))
}

pub fn encode_value(v: &Value) -> Value {
  match v {
    Value::Null => json!({ "nullValue": null }),
    Value::Bool(b) => json!({ "booleanValue": b }),
    Value::Number(n) => match n.as_i64() {
      // Firestore carries int64 as a decimal string.
      Some(i) => json!({ "integerValue": i.to_string() }),
      None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
    },
    Value::String(s) => json!({ "stringValue": s }),
    Value::Array(items) => json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } }),
    Value::Object(obj) => {
      let fields: Map<String, Value> = obj.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect();
      json!({ "mapValue": { "fields": fields } })
    }
  }
}

pub fn decode_value(v: &Value) -> Result<Value, StorageError> {
  let obj = v
    .as_object()
    .ok_or_else(|| StorageError::Decode(format!("not a Firestore value: {v}")))?;
  let Some((kind, inner)) = obj.iter().next() else {
    return Err(StorageError::Decode("empty Firestore value".into()));
  };
  match kind.as_str() {
    "nullValue" => Ok(Value::Null),
    "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
    "integerValue" => {
      let parsed = match inner {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
      };
      parsed
        .map(Value::from)
        .ok_or_else(|| StorageError::Decode(format!("bad integerValue: {inner}")))
    }
    "doubleValue" => Ok(inner.as_f64().map(Value::from).unwrap_or(Value::Null)),
    "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
    "arrayValue" => {
      let values = inner.get("values").and_then(Value::as_array).cloned().unwrap_or_default();
      values.iter().map(decode_value).collect::<Result<Vec<_>, _>>().map(Value::Array)
    }
    "mapValue" => {
      let fields = inner.get("fields").and_then(Value::as_object).cloned().unwrap_or_default();
      decode_fields(&fields).map(Value::Object)
    }
    "geoPointValue" => Ok(inner.clone()),
    other => Err(StorageError::Decode(format!("unsupported Firestore value type '{other}'"))),
  }
}

fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StorageError> {
  let mut out = Map::with_capacity(fields.len());
  for (k, v) in fields {
    out.insert(k.clone(), decode_value(v)?);
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::{base_exercises, default_learner};

  #[test]
  fn learner_survives_the_firestore_encoding() {
    let learner = default_learner();
    let fields = encode_document(&learner).unwrap();
    assert_eq!(fields["hearts"], json!({ "integerValue": "4" }));
    assert_eq!(
      fields["completedLessons"],
      json!({ "arrayValue": { "values": [{ "integerValue": "1" }] } })
    );
    let back: Learner = decode_document(&fields).unwrap();
    assert_eq!(back, learner);
  }

  #[test]
  fn nullable_exercise_fields_stay_null() {
    let exercise = base_exercises().remove(1);
    let fields = encode_document(&exercise).unwrap();
    assert_eq!(fields["croatianText"], json!({ "nullValue": null }));
    assert_eq!(fields["type"], json!({ "stringValue": "multiple-choice" }));
    let back: Exercise = decode_document(&fields).unwrap();
    assert_eq!(back, exercise);
  }

  #[test]
  fn decodes_values_written_by_other_clients() {
    let v = json!({ "mapValue": { "fields": {
      "n": { "integerValue": 7 },
      "d": { "doubleValue": 1.5 },
      "t": { "timestampValue": "2024-05-01T10:00:00Z" },
      "empty": { "arrayValue": {} }
    }}});
    assert_eq!(
      decode_value(&v).unwrap(),
      json!({ "n": 7, "d": 1.5, "t": "2024-05-01T10:00:00Z", "empty": [] })
    );
  }

  #[test]
  fn unknown_value_types_are_errors() {
    assert!(decode_value(&json!({ "weirdValue": 1 })).is_err());
    assert!(decode_value(&json!("plain")).is_err());
  }

  #[test]
  fn single_and_composite_filters() {
    let one = structured_query("lessons", &[("unit", json!(2))]);
    assert_eq!(one["where"]["fieldFilter"]["value"], json!({ "integerValue": "2" }));
    let two = structured_query("user_progress", &[("userId", json!("a")), ("lessonId", json!(1))]);
    assert_eq!(two["where"]["compositeFilter"]["op"], json!("AND"));
    assert_eq!(two["where"]["compositeFilter"]["filters"].as_array().map(Vec::len), Some(2));
  }

  #[test]
  fn emulator_host_switches_base_url() {
    let cfg = FirestoreConfig {
      project_id: "demo".into(),
      database: "(default)".into(),
      emulator_host: Some("localhost:8080".into()),
      access_token: None,
    };
    let store = FirestoreStorage::new(&cfg).unwrap();
    assert_eq!(store.documents_url.as_str(), "http://localhost:8080/v1/projects/demo/databases/(default)/documents");
  }

  fn emulator_store() -> FirestoreStorage {
    FirestoreStorage::new(&FirestoreConfig {
      project_id: "demo".into(),
      emulator_host: Some("localhost:8080".into()),
      ..FirestoreConfig::default()
    })
    .unwrap()
  }

  #[test]
  fn document_ids_stay_inside_their_path_segment() {
    let store = emulator_store();
    let url = store.doc_url(USERS, "ghost?x=1").unwrap();
    assert_eq!(url.path(), "/v1/projects/demo/databases/(default)/documents/users/ghost%3Fx=1");
    assert_eq!(url.query(), None);

    let nested = store.doc_url(USERS, "default-user/../x#frag").unwrap();
    assert!(nested.path().ends_with("/users/default-user%2F..%2Fx%23frag"));
    assert_eq!(nested.fragment(), None);

    let plain = store.doc_url(EXERCISES, "lesson-1-ex-2").unwrap();
    assert!(plain.path().ends_with("/exercises/lesson-1-ex-2"));
  }

  #[test]
  fn page_tokens_are_query_encoded() {
    let store = emulator_store();
    let first = store.list_url(LESSONS, None).unwrap();
    assert_eq!(first.query(), Some("pageSize=300"));
    let next = store.list_url(LESSONS, Some("a+b/c=")).unwrap();
    assert_eq!(next.query(), Some("pageSize=300&pageToken=a%2Bb%2Fc%3D"));
    let pairs: Vec<(String, String)> = next.query_pairs().into_owned().collect();
    assert_eq!(pairs[1], ("pageToken".to_string(), "a+b/c=".to_string()));
  }

  #[test]
  fn missing_id_field_comes_from_document_name() {
    let mut fields = encode_document(&default_learner()).unwrap();
    fields.remove("id");
    let doc = Document { name: "projects/demo/databases/(default)/documents/users/imported-42".into(), fields };
    let learner: Learner = decode_named(&doc).unwrap();
    assert_eq!(learner.id, "imported-42");

    let lesson = crate::seeds::base_lessons().remove(6);
    let mut fields = encode_document(&lesson).unwrap();
    fields.remove("id");
    let doc = Document { name: "projects/demo/databases/(default)/documents/lessons/7".into(), fields };
    let back: Lesson = decode_named(&doc).unwrap();
    assert_eq!(back, lesson);
  }

  #[test]
  fn stored_id_field_wins_over_document_name() {
    let learner = default_learner();
    let doc = Document { name: "projects/demo/databases/(default)/documents/users/other".into(), fields: encode_document(&learner).unwrap() };
    let back: Learner = decode_named(&doc).unwrap();
    assert_eq!(back.id, "default-user");
  }
}
