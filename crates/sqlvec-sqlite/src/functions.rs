//! Scalar vector functions
//!
//! Vector arguments are blobs in the raw little-endian format or JSON array
//! text. Blobs carry no type tag, so each function assumes `float32` (bit for
//! `vec_distance_hamming`) unless a trailing element-type argument says
//! otherwise. NULL vector arguments produce NULL.

use crate::VERSION;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::Connection;
use sqlvec_core::{kernels, observe, ElementType, Result, VecError, Vector};
use std::panic::UnwindSafe;

type Kernel = fn(&Vector, &Vector) -> Result<f64>;
type Combine = fn(&Vector, &Vector) -> Result<Vector>;

fn register<T, F>(conn: &Connection, name: &'static str, n_arg: i32, f: F) -> Result<()>
where
    T: ToSql,
    F: Fn(&Context<'_>) -> Result<T> + Send + UnwindSafe + 'static,
{
    conn.create_scalar_function(
        name,
        n_arg,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            f(ctx).map_err(|e| {
                observe::record_function_error(name);
                rusqlite::Error::UserFunctionError(Box::new(e))
            })
        },
    )
    .map_err(|e| VecError::Storage(format!("Failed to register {}: {}", name, e)))
}

fn utf8(text: &[u8]) -> Result<&str> {
    std::str::from_utf8(text).map_err(|e| VecError::InvalidVector(e.to_string()))
}

/// Optional trailing element-type argument
fn type_arg(ctx: &Context<'_>, index: usize, default: ElementType) -> Result<ElementType> {
    if index >= ctx.len() {
        return Ok(default);
    }
    match ctx.get_raw(index) {
        ValueRef::Text(text) => utf8(text)?.parse(),
        _ => Err(VecError::Unsupported(
            "element type must be given as text".into(),
        )),
    }
}

fn vector_arg(ctx: &Context<'_>, index: usize, element_type: ElementType) -> Result<Option<Vector>> {
    match ctx.get_raw(index) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(blob) => Vector::from_blob(blob, element_type, None).map(Some),
        ValueRef::Text(text) => Vector::from_json(utf8(text)?, element_type).map(Some),
        ValueRef::Integer(_) | ValueRef::Real(_) => Err(VecError::InvalidVector(format!(
            "argument {} is not a vector (expected a BLOB or JSON text)",
            index + 1
        ))),
    }
}

fn index_arg(ctx: &Context<'_>, index: usize, name: &str) -> Result<usize> {
    match ctx.get_raw(index) {
        ValueRef::Integer(n) if n >= 0 => Ok(n as usize),
        _ => Err(VecError::Unsupported(format!(
            "{} must be a non-negative integer",
            name
        ))),
    }
}

fn unary_as<T>(
    ctx: &Context<'_>,
    element_type: ElementType,
    op: impl Fn(&Vector) -> Result<T>,
) -> Result<Option<T>> {
    match vector_arg(ctx, 0, element_type)? {
        Some(v) => op(&v).map(Some),
        None => Ok(None),
    }
}

fn unary<T>(
    ctx: &Context<'_>,
    default: ElementType,
    op: impl Fn(&Vector) -> Result<T>,
) -> Result<Option<T>> {
    unary_as(ctx, type_arg(ctx, 1, default)?, op)
}

fn binary<T>(
    ctx: &Context<'_>,
    default: ElementType,
    op: impl Fn(&Vector, &Vector) -> Result<T>,
) -> Result<Option<T>> {
    let element_type = type_arg(ctx, 2, default)?;
    let a = vector_arg(ctx, 0, element_type)?;
    let b = vector_arg(ctx, 1, element_type)?;
    match (a, b) {
        (Some(a), Some(b)) => op(&a, &b).map(Some),
        _ => Ok(None),
    }
}

fn canonical(v: &Vector) -> Result<Vec<u8>> {
    v.check_finite()?;
    Ok(v.to_blob())
}

fn from_json(ctx: &Context<'_>) -> Result<Option<Vec<u8>>> {
    let element_type = type_arg(ctx, 1, ElementType::Float32)?;
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Text(text) => Ok(Some(Vector::from_json(utf8(text)?, element_type)?.to_blob())),
        _ => Err(VecError::InvalidVector(
            "vec_from_json expects JSON array text".into(),
        )),
    }
}

fn slice(ctx: &Context<'_>) -> Result<Option<Vec<u8>>> {
    let element_type = type_arg(ctx, 3, ElementType::Float32)?;
    let Some(v) = vector_arg(ctx, 0, element_type)? else {
        return Ok(None);
    };
    let start = index_arg(ctx, 1, "start")?;
    let end = index_arg(ctx, 2, "end")?;
    Ok(Some(kernels::slice(&v, start, end)?.to_blob()))
}

/// Register every scalar function on `conn`
pub fn register_functions(conn: &Connection) -> Result<()> {
    register(conn, "vec_version", 0, |_| Ok(VERSION))?;

    let distances: [(&'static str, Kernel, ElementType); 4] = [
        ("vec_distance_l2", kernels::l2, ElementType::Float32),
        ("vec_distance_cosine", kernels::cosine, ElementType::Float32),
        ("vec_distance_l1", kernels::l1, ElementType::Float32),
        ("vec_distance_hamming", kernels::hamming, ElementType::Bit),
    ];
    for (name, kernel, default) in distances {
        for n_arg in [2, 3] {
            register(conn, name, n_arg, move |ctx| binary(ctx, default, kernel))?;
        }
    }

    let combines: [(&'static str, Combine); 2] =
        [("vec_add", kernels::add), ("vec_sub", kernels::sub)];
    for (name, combine) in combines {
        for n_arg in [2, 3] {
            register(conn, name, n_arg, move |ctx| {
                binary(ctx, ElementType::Float32, |a, b| Ok(combine(a, b)?.to_blob()))
            })?;
        }
    }

    for n_arg in [1, 2] {
        register(conn, "vec_length", n_arg, |ctx| {
            unary(ctx, ElementType::Float32, |v| Ok(v.dimensions() as i64))
        })?;
        register(conn, "vec_normalize", n_arg, |ctx| {
            unary(ctx, ElementType::Float32, |v| Ok(kernels::normalize(v)?.to_blob()))
        })?;
        register(conn, "vec_to_json", n_arg, |ctx| {
            unary(ctx, ElementType::Float32, |v| v.to_json())
        })?;
        register(conn, "vec_from_json", n_arg, from_json)?;
        register(conn, "vec_type", n_arg, |ctx| {
            unary(ctx, ElementType::Float32, |v| Ok(v.element_type().as_str()))
        })?;
        register(conn, "vec_quantize_binary", n_arg, |ctx| {
            unary(ctx, ElementType::Float32, |v| {
                Ok(kernels::quantize_binary(v)?.to_blob())
            })
        })?;
    }

    let constructors = [
        ("vec_f32", ElementType::Float32),
        ("vec_f64", ElementType::Float64),
        ("vec_int8", ElementType::Int8),
        ("vec_bit", ElementType::Bit),
    ];
    for (name, element_type) in constructors {
        register(conn, name, 1, move |ctx| unary_as(ctx, element_type, canonical))?;
    }

    for n_arg in [3, 4] {
        register(conn, "vec_slice", n_arg, slice)?;
    }

    Ok(())
}
