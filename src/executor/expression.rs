// Copyright 2026 StrataKV Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pushdown expressions
//!
//! Expressions are plain data: a tagged tree of column references,
//! constants, comparisons and boolean connectives, evaluated by a pure
//! walker over a decoded datum row. Comparisons on NULL yield NULL;
//! AND/OR follow three-valued logic.

use std::cmp::Ordering;

use rustc_hash::FxHashSet;

use crate::core::{Error, Result};
use crate::executor::datum::{cmp_datum, Datum, FieldType};
use crate::executor::ColumnInfo;

/// Comparison operator of a [`Expr::Cmp`] node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn matches(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// One expression node
#[derive(Debug, Clone)]
pub enum Expr {
    /// Column at the given output offset
    Column(usize),
    Constant(Datum),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
}

impl Expr {
    pub fn column(offset: usize) -> Expr {
        Expr::Column(offset)
    }

    pub fn constant(datum: Datum) -> Expr {
        Expr::Constant(datum)
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Cmp(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn not(child: Expr) -> Expr {
        Expr::Not(Box::new(child))
    }

    pub fn is_null(child: Expr) -> Expr {
        Expr::IsNull(Box::new(child))
    }

    /// Evaluates the expression over one decoded row
    pub fn eval(&self, row: &[Datum]) -> Result<Datum> {
        match self {
            Expr::Column(offset) => row
                .get(*offset)
                .cloned()
                .ok_or_else(|| Error::decode(format!("column offset {offset} out of range"))),
            Expr::Constant(datum) => Ok(datum.clone()),
            Expr::Cmp(op, lhs, rhs) => {
                let lhs = lhs.eval(row)?;
                let rhs = rhs.eval(row)?;
                if lhs.is_null() || rhs.is_null() {
                    return Ok(Datum::Null);
                }
                Ok(Datum::Int(op.matches(cmp_datum(&lhs, &rhs)) as i64))
            }
            Expr::And(lhs, rhs) => {
                let lhs = lhs.eval(row)?.as_bool();
                let rhs = rhs.eval(row)?.as_bool();
                Ok(match (lhs, rhs) {
                    (Some(false), _) | (_, Some(false)) => Datum::Int(0),
                    (Some(true), Some(true)) => Datum::Int(1),
                    _ => Datum::Null,
                })
            }
            Expr::Or(lhs, rhs) => {
                let lhs = lhs.eval(row)?.as_bool();
                let rhs = rhs.eval(row)?.as_bool();
                Ok(match (lhs, rhs) {
                    (Some(true), _) | (_, Some(true)) => Datum::Int(1),
                    (Some(false), Some(false)) => Datum::Int(0),
                    _ => Datum::Null,
                })
            }
            Expr::Not(child) => Ok(match child.eval(row)?.as_bool() {
                None => Datum::Null,
                Some(v) => Datum::Int(!v as i64),
            }),
            Expr::IsNull(child) => Ok(Datum::Int(child.eval(row)?.is_null() as i64)),
        }
    }

    /// Result type of the expression given the column schema
    pub fn field_type(&self, columns: &[ColumnInfo]) -> FieldType {
        match self {
            Expr::Column(offset) => columns
                .get(*offset)
                .map(|c| c.field_type)
                .unwrap_or(FieldType::Bytes),
            Expr::Constant(datum) => datum.field_type(),
            _ => FieldType::Int,
        }
    }

    /// Collects the column offsets the expression reads
    pub fn collect_columns(&self, out: &mut FxHashSet<usize>) {
        match self {
            Expr::Column(offset) => {
                out.insert(*offset);
            }
            Expr::Constant(_) => {}
            Expr::Cmp(_, lhs, rhs) | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::Not(child) | Expr::IsNull(child) => child.collect_columns(out),
        }
    }
}

/// Evaluates a conjunction: true only when every expression is truthy.
/// NULL counts as false.
pub fn eval_bool(exprs: &[Expr], row: &[Datum]) -> Result<bool> {
    for expr in exprs {
        match expr.eval(row)?.as_bool() {
            Some(true) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Sorted offsets of every column read by the given expressions
pub fn related_columns(exprs: &[Expr]) -> Vec<usize> {
    let mut set = FxHashSet::default();
    for expr in exprs {
        expr.collect_columns(&mut set);
    }
    let mut offsets: Vec<usize> = set.into_iter().collect();
    offsets.sort_unstable();
    offsets
}
