//! Query planning shared by xBestIndex and xFilter
//!
//! [`choose`] looks at the constraints SQLite offers and picks one of three
//! plans. The plan travels to xFilter as JSON in `idxStr`; its `args` list
//! says what each xFilter argument is, in argv order.

use super::schema::{ColumnKind, TableSchema};
use super::table::FilterOp;
use serde::{Deserialize, Serialize};
use sqlvec_core::{Result, VecError};

/// Constraint operators as far as planning cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    Limit,
    Offset,
    Other,
}

impl ConstraintOp {
    fn as_filter(&self) -> Option<FilterOp> {
        match self {
            ConstraintOp::Eq => Some(FilterOp::Eq),
            ConstraintOp::Ne => Some(FilterOp::Ne),
            ConstraintOp::Lt => Some(FilterOp::Lt),
            ConstraintOp::Le => Some(FilterOp::Le),
            ConstraintOp::Gt => Some(FilterOp::Gt),
            ConstraintOp::Ge => Some(FilterOp::Ge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    /// Declared column index, `-1` for rowid
    pub column: i32,
    pub op: ConstraintOp,
    pub usable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: i32,
    pub desc: bool,
}

/// Meaning of one xFilter argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arg", rename_all = "snake_case")]
pub enum PlanArg {
    Query,
    K,
    Limit,
    Filter { column: usize, op: FilterOp },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum QueryPlan {
    /// Every row in rowid order
    Scan,
    /// `rowid = ?`
    Point,
    /// `<vector column> MATCH ?` with optional k, LIMIT and metadata filters
    Knn { column: usize, args: Vec<PlanArg> },
}

impl QueryPlan {
    pub fn to_idx_str(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_idx_str(idx_str: Option<&str>) -> Result<Self> {
        match idx_str {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(QueryPlan::Scan),
        }
    }
}

/// Outcome of planning: the plan plus what to tell SQLite about it
#[derive(Debug, Clone, PartialEq)]
pub struct IndexChoice {
    pub plan: QueryPlan,
    /// `(constraint index, argv index)`; every listed constraint is omitted
    pub usage: Vec<(usize, i32)>,
    pub order_by_consumed: bool,
    pub estimated_cost: f64,
    pub estimated_rows: i64,
}

pub fn choose(
    schema: &TableSchema,
    constraints: &[Constraint],
    order_by: &[OrderTerm],
) -> Result<IndexChoice> {
    let k_column = schema.k_column();
    let mut knn: Option<(usize, usize)> = None;
    let mut k = None;
    let mut limit = None;
    let mut has_offset = false;
    let mut rowid_eq = None;
    let mut filters = Vec::new();
    let mut unhandled = false;

    for (i, constraint) in constraints.iter().enumerate() {
        if !constraint.usable {
            continue;
        }
        let column = usize::try_from(constraint.column).ok();
        let kind = column.and_then(|c| schema.columns.get(c)).map(|c| &c.kind);

        match constraint.op {
            ConstraintOp::Match => match (kind, column) {
                (Some(ColumnKind::Vector(_)), Some(column)) if knn.is_none() => {
                    knn = Some((i, column));
                }
                (Some(ColumnKind::Vector(_)), _) => unhandled = true,
                _ => {
                    return Err(VecError::Unsupported(
                        "MATCH requires a vector column".into(),
                    ))
                }
            },
            ConstraintOp::Limit => limit = Some(i),
            ConstraintOp::Offset => has_offset = true,
            ConstraintOp::Eq if constraint.column == -1 && rowid_eq.is_none() => {
                rowid_eq = Some(i);
            }
            ConstraintOp::Eq if column == Some(k_column) && k.is_none() => k = Some(i),
            op => match (op.as_filter(), kind, column) {
                (Some(filter), Some(ColumnKind::Metadata(_)), Some(column)) => {
                    filters.push((i, column, filter));
                }
                _ => unhandled = true,
            },
        }
    }

    let Some((match_index, column)) = knn else {
        return Ok(match rowid_eq {
            Some(i) => IndexChoice {
                plan: QueryPlan::Point,
                usage: vec![(i, 1)],
                order_by_consumed: false,
                estimated_cost: 1.0,
                estimated_rows: 1,
            },
            None => IndexChoice {
                plan: QueryPlan::Scan,
                usage: Vec::new(),
                order_by_consumed: matches!(order_by, [OrderTerm { column: -1, desc: false }]),
                estimated_cost: 1_000_000.0,
                estimated_rows: 1_000_000,
            },
        });
    };

    let mut args = vec![PlanArg::Query];
    let mut usage = vec![(match_index, 1)];
    let mut bind = |constraint: usize, arg: PlanArg, args: &mut Vec<PlanArg>| {
        args.push(arg);
        usage.push((constraint, args.len() as i32));
    };

    if let Some(i) = k {
        bind(i, PlanArg::K, &mut args);
    }
    for (i, column, op) in filters {
        bind(i, PlanArg::Filter { column, op }, &mut args);
    }
    if rowid_eq.is_some() {
        unhandled = true;
    }

    let distance = schema.distance_column() as i32;
    let ordered_by_distance = matches!(order_by, [OrderTerm { column, desc: false }] if *column == distance);
    if let Some(i) = limit {
        if !unhandled && !has_offset && (order_by.is_empty() || ordered_by_distance) {
            bind(i, PlanArg::Limit, &mut args);
        }
    }

    Ok(IndexChoice {
        plan: QueryPlan::Knn { column, args },
        usage,
        order_by_consumed: ordered_by_distance,
        estimated_cost: 10.0,
        estimated_rows: 10,
    })
}
