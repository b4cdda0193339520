//! Body (de)serialization.
//!
//! The server never interprets request bodies or handler results itself; it
//! hands them to a [`Codec`] chosen at construction time.

use serde_json::{Number, Value as Json};
use thiserror::Error;

use crate::handler::binder::{is_decimal_literal, parse_literal};
use crate::handler::value::{ParamType, Value};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: ParamType, found: &'static str },

    #[error("{value:?} is not a valid {target} literal")]
    Literal { value: String, target: ParamType },

    #[error("cannot serialize {0}")]
    Unsupported(String),
}

pub trait Codec: Send + Sync {
    /// Turns a raw request body into a value of the declared type.
    fn deserialize(&self, raw: &str, target: ParamType) -> Result<Value, CodecError>;

    /// Turns a handler result into a response body.
    fn serialize(&self, value: &Value) -> Result<String, CodecError>;
}

/// Passes strings through untouched and reads scalars as plain literals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn deserialize(&self, raw: &str, target: ParamType) -> Result<Value, CodecError> {
        match target {
            ParamType::Str => Ok(Value::Str(raw.to_string())),
            ParamType::Json => Ok(Value::Json(serde_json::from_str(raw)?)),
            _ => parse_literal(raw.trim(), target).ok_or_else(|| CodecError::Literal {
                value: raw.to_string(),
                target,
            }),
        }
    }

    fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        match value {
            Value::Null => Err(CodecError::Unsupported("null".into())),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Long(l) => Ok(l.to_string()),
            Value::Double(d) if d.is_finite() => Ok(d.to_string()),
            Value::Double(d) => Err(CodecError::Unsupported(format!("non-finite double {d}"))),
            Value::Decimal(s) | Value::Str(s) => Ok(s.clone()),
            Value::Json(j) => Ok(j.to_string()),
        }
    }
}

/// JSON bodies in, JSON bodies out.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn deserialize(&self, raw: &str, target: ParamType) -> Result<Value, CodecError> {
        let json: Json = serde_json::from_str(raw)?;

        let mismatch = |found: &Json| CodecError::TypeMismatch {
            expected: target,
            found: json_kind(found),
        };

        match (target, json) {
            (ParamType::Json, j) => Ok(Value::Json(j)),
            (_, Json::Null) => Ok(Value::Null),
            (ParamType::Str, Json::String(s)) => Ok(Value::Str(s)),
            (ParamType::Bool, Json::Bool(b)) => Ok(Value::Bool(b)),
            (ParamType::Int, Json::Number(n)) => n
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int)
                .ok_or_else(|| mismatch(&Json::Number(n))),
            (ParamType::Long, Json::Number(n)) => n
                .as_i64()
                .map(Value::Long)
                .ok_or_else(|| mismatch(&Json::Number(n))),
            (ParamType::Double, Json::Number(n)) => n
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| mismatch(&Json::Number(n))),
            (ParamType::Decimal, Json::Number(n)) => Ok(Value::Decimal(n.to_string())),
            (ParamType::Decimal, Json::String(s)) if is_decimal_literal(&s) => {
                Ok(Value::Decimal(s))
            }
            (_, other) => Err(mismatch(&other)),
        }
    }

    fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&to_json(value)?)?)
    }
}

fn to_json(value: &Value) -> Result<Json, CodecError> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Double(d) => Number::from_f64(*d)
            .map(Json::Number)
            .ok_or_else(|| CodecError::Unsupported(format!("non-finite double {d}")))?,
        Value::Decimal(s) => s
            .parse::<Number>()
            .map(Json::Number)
            .map_err(|_| CodecError::Literal {
                value: s.clone(),
                target: ParamType::Decimal,
            })?,
        Value::Str(s) => Json::String(s.clone()),
        Value::Json(j) => j.clone(),
    };
    Ok(json)
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
