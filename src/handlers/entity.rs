//! Entity handlers: list, create, read, update, delete. One generic set serves every
//! resource; the resource is looked up by path segment.

use crate::args::{ArgParams, ArgParser, Argument};
use crate::coerce::FieldType;
use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::record::Record;
use crate::response::{success_empty, success_many, success_one, success_one_ok};
use crate::service::{PopulateContext, QueryEngine};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const LIMIT_ARG: &str = "_limit";
pub const OFFSET_ARG: &str = "_offset";
pub const SORTED_ARG: &str = "_sorted";
pub const PARTIAL_ARG: &str = "_partial";

fn entity_for<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(path_segment.to_string()))
}

fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))
}

/// An empty body is no body; anything else must be a JSON object.
fn body_to_map(body: &Bytes) -> Result<Option<Map<String, Value>>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => Ok(Some(m)),
        Ok(Value::Null) => Ok(None),
        Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

fn int_arg(name: &str) -> Argument {
    Argument::new(name, FieldType::Int).with_params(ArgParams {
        help: Some("must be an integer".into()),
        ..Default::default()
    })
}

/// Reserved collection arguments.
fn list_parser() -> ArgParser {
    let mut parser = ArgParser::new();
    parser
        .add_argument(int_arg(LIMIT_ARG))
        .add_argument(int_arg(OFFSET_ARG))
        .add_argument(Argument::new(SORTED_ARG, FieldType::Str).append());
    parser
}

/// Resource attributes plus `_partial` with the given default.
fn write_parser(entity: &ResolvedEntity, partial_default: bool) -> ArgParser {
    let mut parser = ArgParser::new();
    entity.serializer.expose_to(&mut parser);
    parser.add_argument(Argument::new(PARTIAL_ARG, FieldType::Bool).default_value(Value::Bool(partial_default)));
    parser
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let reserved = list_parser().parse(&params, None)?;
    let mut raw_args: HashMap<String, String> = HashMap::new();
    for (k, v) in &params {
        raw_args.entry(k.clone()).or_insert_with(|| v.clone());
    }
    let sorted = reserved.get_strings(SORTED_ARG);
    let result = QueryEngine::list(
        state.store.as_ref(),
        entity,
        &raw_args,
        Some(sorted.as_slice()),
        reserved.get_i64(OFFSET_ARG),
        reserved.get_i64(LIMIT_ARG),
    )
    .await?;
    tracing::debug!(resource = %entity.name, count = result.count, "list");
    let data: Vec<Value> = result.records.iter().map(Record::to_json).collect();
    Ok(success_many(data))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let body = body_to_map(&body)?;
    let args = write_parser(entity, false).parse(&params, body.as_ref())?;
    let partial = args.get_bool(PARTIAL_ARG).unwrap_or(false);

    let mut record = Record::new();
    let ctx = PopulateContext {
        store: state.store.as_ref(),
        model: &state.model,
    };
    entity.serializer.populate(&ctx, &mut record, &args, partial).await?;
    state.store.save(entity, &mut record).await?;
    Ok(success_one(record.to_json(), "New item added"))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let record = QueryEngine::get_by_identity(state.store.as_ref(), entity, id)
        .await?
        .ok_or(AppError::NotFound(id_str))?;
    Ok(success_one_ok(record.to_json(), "Item found"))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let mut record = QueryEngine::get_by_identity(state.store.as_ref(), entity, id)
        .await?
        .ok_or(AppError::NotFound(id_str))?;
    let body = body_to_map(&body)?;
    let args = write_parser(entity, true).parse(&params, body.as_ref())?;
    let partial = args.get_bool(PARTIAL_ARG).unwrap_or(true);

    let ctx = PopulateContext {
        store: state.store.as_ref(),
        model: &state.model,
    };
    entity.serializer.populate(&ctx, &mut record, &args, partial).await?;
    state.store.save(entity, &mut record).await?;
    Ok(success_one(record.to_json(), "Item updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let outcome = QueryEngine::delete_by_identity(state.store.as_ref(), entity, id).await?;
    if !outcome.found {
        return Err(AppError::NotFound(id_str));
    }
    Ok(success_empty("Item removed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies() {
        assert!(body_to_map(&Bytes::from_static(b"")).unwrap().is_none());
        assert!(body_to_map(&Bytes::from_static(b"  \n")).unwrap().is_none());
        assert!(body_to_map(&Bytes::from_static(b"{\"a\":1}")).unwrap().is_some());
        assert!(body_to_map(&Bytes::from_static(b"[1]")).is_err());
        assert!(body_to_map(&Bytes::from_static(b"{oops")).is_err());
    }

    #[test]
    fn ids() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(matches!(parse_id("x"), Err(AppError::BadRequest(_))));
    }
}
