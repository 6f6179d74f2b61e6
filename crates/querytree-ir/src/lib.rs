//! Querytree IR: the canonical tree form of a compiled query.
//!
//! A [`Command`] owns one query's IR graph:
//!
//! - **Nodes** pair an [`Op`] with ordered children. Scalar ops compute a
//!   typed value, relational ops produce rows, ancillary ops (`VarDef`,
//!   `VarDefList`) define computed columns.
//! - **Vars** name columns flowing through the tree. Parameters, table
//!   columns, computed values and set-op outputs share one id space.
//! - **VarVecs** are sets of vars, checked out of a per-command pool.
//! - **Tables** are instances of a shape ([`TableMd`]) whose column vars are
//!   created lazily as they get referenced.
//!
//! Everything is created through the Command, which keeps ids dense and
//! result types consistent. Metadata comes from `querytree-md`.

pub mod builders;
pub mod command;
pub mod config;
pub mod dump;
pub mod error;
pub mod factory;
pub mod node;
pub mod node_info;
pub mod ops;
pub mod rel_property;
pub mod table;
pub mod var;
pub mod var_vec;

pub use command::{Command, CommandPoolStats};
pub use config::CommandConfig;
pub use dump::dump;
pub use error::{IrError, Result};
pub use node::{Node, NodeId};
pub use node_info::{KeyVec, NodeInfo};
pub use ops::{
    ArithmeticKind, Arity, ComparisonKind, ConditionalKind, ConstantValue, Op, OpCategory, OpType,
    SetOpBody, SortKey,
};
pub use rel_property::RelProperty;
pub use table::{ColumnMd, Table, TableId, TableMd};
pub use var::{Var, VarData, VarKind, VarList, VarMap, VarType};
pub use var_vec::{PoolStats, VarVec, VarVecEnumerator};
