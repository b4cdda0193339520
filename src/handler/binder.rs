//! Turns a parsed request into handler arguments.
//!
//! Query values are bound by position: the n-th `QueryParam` binding gets
//! the n-th value of the query string, whatever its name. Reordering
//! bindings therefore changes which value each parameter receives.

use thiserror::Error;

use crate::handler::codec::{Codec, CodecError};
use crate::handler::router::{BindingKind, ParameterBinding};
use crate::handler::value::{ParamType, Value};
use crate::http::request::HttpRequest;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("error deserializing body to type {target}")]
    Body {
        target: ParamType,
        #[source]
        source: CodecError,
    },

    #[error("no query value left for parameter {index}")]
    MissingQueryValue { index: usize },

    #[error("cannot convert {value:?} to {target} for parameter {index}")]
    Conversion {
        index: usize,
        value: String,
        target: ParamType,
    },

    #[error("parameter {index} of type {target} cannot be bound from a {origin}")]
    Unsupported {
        index: usize,
        target: ParamType,
        origin: &'static str,
    },
}

pub fn bind(
    parameters: &[ParameterBinding],
    req: &HttpRequest,
    codec: &dyn Codec,
) -> Result<Vec<Value>, BindingError> {
    let mut query = req.query_values.iter();
    let mut args = Vec::with_capacity(parameters.len());

    for (index, param) in parameters.iter().enumerate() {
        let value = match &param.kind {
            BindingKind::Body => codec
                .deserialize(&req.body, param.target)
                .map_err(|source| BindingError::Body {
                    target: param.target,
                    source,
                })?,
            BindingKind::QueryParam => {
                let raw = query
                    .next()
                    .ok_or(BindingError::MissingQueryValue { index })?;
                convert(index, raw, param.target, "query value")?
            }
            BindingKind::Header(name) => match req.headers.get(name) {
                Some(raw) => convert(index, raw, param.target, "header")?,
                None => Value::Null,
            },
        };
        args.push(value);
    }

    Ok(args)
}

fn convert(
    index: usize,
    raw: &str,
    target: ParamType,
    origin: &'static str,
) -> Result<Value, BindingError> {
    if target == ParamType::Json {
        return Err(BindingError::Unsupported {
            index,
            target,
            origin,
        });
    }

    parse_literal(raw, target).ok_or_else(|| BindingError::Conversion {
        index,
        value: raw.to_string(),
        target,
    })
}

/// Parses a plain-text literal. `Str` is returned as is; `Json` is never a
/// literal.
pub fn parse_literal(raw: &str, target: ParamType) -> Option<Value> {
    match target {
        ParamType::Bool => {
            if raw.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        ParamType::Int => raw.parse().ok().map(Value::Int),
        ParamType::Long => raw.parse().ok().map(Value::Long),
        ParamType::Double => raw.parse().ok().map(Value::Double),
        ParamType::Decimal => is_decimal_literal(raw).then(|| Value::Decimal(raw.to_string())),
        ParamType::Str => Some(Value::Str(raw.to_string())),
        ParamType::Json => None,
    }
}

/// `[+-]digits[.digits][(e|E)[+-]digits]`, with at least one mantissa digit.
pub fn is_decimal_literal(s: &str) -> bool {
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

    let s = strip_sign(s);
    let (mantissa, exponent) = match s.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (s, None),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    (!int.is_empty() || !frac.is_empty())
        && digits(int)
        && digits(frac)
        && exponent.is_none_or(|e| {
            let e = strip_sign(e);
            !e.is_empty() && digits(e)
        })
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(['+', '-']).unwrap_or(s)
}
