//! Operation descriptors.
//!
//! [`Op`] is a closed sum type over every operation kind. Payload-free kinds
//! (`Filter`, the join family, `VarDefList`, ...) are stateless unit variants
//! and may be created freely; payload-carrying kinds are immutable once
//! attached to a node, except through `Command` rewrites such as key pull-up.
//!
//! Arity and category are keyed by the flat [`OpType`] tag, one row per kind.

use querytree_md::{ExtentId, TypeUsage};

use crate::rel_property::RelProperty;
use crate::table::TableId;
use crate::var::{Var, VarMap};
use crate::var_vec::VarVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpType {
    // Scalar
    Constant,
    InternalConstant,
    Null,
    VarRef,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    UnaryMinus,
    And,
    Or,
    Not,
    IsNull,
    Case,
    Cast,
    SoftCast,
    Treat,
    IsOf,
    Function,
    Property,
    RelProperty,
    Navigate,
    NewEntity,
    NewRecord,
    NewMultiset,
    Aggregate,
    Exists,
    Element,
    Collect,
    GetEntityRef,
    GetRefKey,
    Deref,
    // Relational
    ScanTable,
    ScanView,
    Unnest,
    Filter,
    Project,
    InnerJoin,
    LeftOuterJoin,
    FullOuterJoin,
    CrossJoin,
    CrossApply,
    OuterApply,
    UnionAll,
    Intersect,
    Except,
    Distinct,
    Sort,
    ConstrainedSort,
    GroupBy,
    SingleRow,
    SingleRowTable,
    // Ancillary
    VarDef,
    VarDefList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    Scalar,
    Relational,
    Ancillary,
}

impl OpType {
    pub fn arity(self) -> Arity {
        use OpType::*;
        match self {
            Constant | InternalConstant | Null | VarRef | ScanTable | SingleRowTable => {
                Arity::Fixed(0)
            }
            UnaryMinus | Not | IsNull | Cast | SoftCast | Treat | IsOf | Property
            | OpType::RelProperty | Navigate | Exists | Element | Collect | GetEntityRef | GetRefKey
            | Deref | ScanView | Unnest | Distinct | Sort | SingleRow | VarDef => Arity::Fixed(1),
            Eq | Ne | Lt | Le | Gt | Ge | Plus | Minus | Multiply | Divide | Modulo | And | Or
            | Filter | Project | CrossApply | OuterApply | UnionAll | Intersect | Except => {
                Arity::Fixed(2)
            }
            Like | InnerJoin | LeftOuterJoin | FullOuterJoin | ConstrainedSort | GroupBy => {
                Arity::Fixed(3)
            }
            Case | Function | NewEntity | NewRecord | NewMultiset | Aggregate | CrossJoin
            | VarDefList => Arity::Variable,
        }
    }

    pub fn category(self) -> OpCategory {
        use OpType::*;
        match self {
            ScanTable | ScanView | Unnest | Filter | Project | InnerJoin | LeftOuterJoin
            | FullOuterJoin | CrossJoin | CrossApply | OuterApply | UnionAll | Intersect
            | Except | Distinct | Sort | ConstrainedSort | GroupBy | SingleRow
            | SingleRowTable => OpCategory::Relational,
            VarDef | VarDefList => OpCategory::Ancillary,
            _ => OpCategory::Scalar,
        }
    }

    pub fn is_scalar(self) -> bool {
        self.category() == OpCategory::Scalar
    }

    pub fn is_relational(self) -> bool {
        self.category() == OpCategory::Relational
    }

    pub fn is_join(self) -> bool {
        matches!(
            self,
            OpType::InnerJoin | OpType::LeftOuterJoin | OpType::FullOuterJoin | OpType::CrossJoin
        )
    }

    pub fn is_apply(self) -> bool {
        matches!(self, OpType::CrossApply | OpType::OuterApply)
    }

    pub fn is_set_op(self) -> bool {
        matches!(self, OpType::UnionAll | OpType::Intersect | OpType::Except)
    }
}

// ============================================================================
// Payload types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Boolean(b) => write!(f, "{b}"),
            ConstantValue::Integer(i) => write!(f, "{i}"),
            ConstantValue::Float(x) => write!(f, "{x}"),
            ConstantValue::String(s) => write!(f, "{s:?}"),
            ConstantValue::Binary(bytes) => write!(f, "0x{}", hex(bytes)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticKind {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    UnaryMinus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalKind {
    And,
    Or,
    Not,
    IsNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub var: Var,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(var: Var) -> Self {
        Self { var, ascending: true }
    }

    pub fn desc(var: Var) -> Self {
        Self {
            var,
            ascending: false,
        }
    }
}

/// Shared body of UnionAll/Intersect/Except: the output vars and, for each
/// input side, where every output var draws its value from.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOpBody {
    pub outputs: VarVec,
    pub var_maps: [VarMap; 2],
}

// ============================================================================
// Op
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ------------------------------------------------------------------ scalar
    Constant { value: ConstantValue, ty: TypeUsage },
    /// Literal introduced by the compiler itself (type discriminators etc).
    InternalConstant { value: ConstantValue, ty: TypeUsage },
    Null { ty: TypeUsage },
    VarRef { var: Var, ty: TypeUsage },
    Comparison { kind: ComparisonKind, ty: TypeUsage },
    Like { ty: TypeUsage },
    Arithmetic { kind: ArithmeticKind, ty: TypeUsage },
    Conditional { kind: ConditionalKind, ty: TypeUsage },
    Case { ty: TypeUsage },
    Cast { ty: TypeUsage },
    /// Implicit widening inserted by the compiler.
    SoftCast { ty: TypeUsage },
    /// `is_fake` marks a compile-time-only type assertion with no runtime
    /// effect; consumers skip it instead of executing it.
    Treat { ty: TypeUsage, is_fake: bool },
    IsOf { target: TypeUsage, only: bool, ty: TypeUsage },
    Function { name: String, ty: TypeUsage },
    Property { name: String, ty: TypeUsage },
    RelProperty { property: RelProperty, ty: TypeUsage },
    Navigate { property: RelProperty, ty: TypeUsage },
    NewEntity { extent: Option<ExtentId>, ty: TypeUsage },
    NewRecord { ty: TypeUsage },
    NewMultiset { ty: TypeUsage },
    Aggregate { name: String, distinct: bool, ty: TypeUsage },
    Exists { ty: TypeUsage },
    Element { ty: TypeUsage },
    Collect { ty: TypeUsage },
    GetEntityRef { ty: TypeUsage },
    GetRefKey { ty: TypeUsage },
    Deref { ty: TypeUsage },

    // -------------------------------------------------------------- relational
    ScanTable { table: TableId },
    ScanView { table: TableId },
    Unnest { var: Var, table: TableId },
    Filter,
    Project { outputs: VarVec },
    InnerJoin,
    LeftOuterJoin,
    FullOuterJoin,
    CrossJoin,
    CrossApply,
    OuterApply,
    UnionAll(SetOpBody),
    Intersect(SetOpBody),
    Except(SetOpBody),
    Distinct { keys: VarVec },
    Sort { keys: Vec<SortKey> },
    /// Children: input, skip count, limit count.
    ConstrainedSort { keys: Vec<SortKey>, with_ties: bool },
    /// Children: input, key var-def list, aggregate var-def list.
    GroupBy { keys: VarVec, outputs: VarVec },
    SingleRow,
    SingleRowTable,

    // --------------------------------------------------------------- ancillary
    VarDef { var: Var },
    VarDefList,
}

impl Op {
    pub fn op_type(&self) -> OpType {
        match self {
            Op::Constant { .. } => OpType::Constant,
            Op::InternalConstant { .. } => OpType::InternalConstant,
            Op::Null { .. } => OpType::Null,
            Op::VarRef { .. } => OpType::VarRef,
            Op::Comparison { kind, .. } => match kind {
                ComparisonKind::Eq => OpType::Eq,
                ComparisonKind::Ne => OpType::Ne,
                ComparisonKind::Lt => OpType::Lt,
                ComparisonKind::Le => OpType::Le,
                ComparisonKind::Gt => OpType::Gt,
                ComparisonKind::Ge => OpType::Ge,
            },
            Op::Like { .. } => OpType::Like,
            Op::Arithmetic { kind, .. } => match kind {
                ArithmeticKind::Plus => OpType::Plus,
                ArithmeticKind::Minus => OpType::Minus,
                ArithmeticKind::Multiply => OpType::Multiply,
                ArithmeticKind::Divide => OpType::Divide,
                ArithmeticKind::Modulo => OpType::Modulo,
                ArithmeticKind::UnaryMinus => OpType::UnaryMinus,
            },
            Op::Conditional { kind, .. } => match kind {
                ConditionalKind::And => OpType::And,
                ConditionalKind::Or => OpType::Or,
                ConditionalKind::Not => OpType::Not,
                ConditionalKind::IsNull => OpType::IsNull,
            },
            Op::Case { .. } => OpType::Case,
            Op::Cast { .. } => OpType::Cast,
            Op::SoftCast { .. } => OpType::SoftCast,
            Op::Treat { .. } => OpType::Treat,
            Op::IsOf { .. } => OpType::IsOf,
            Op::Function { .. } => OpType::Function,
            Op::Property { .. } => OpType::Property,
            Op::RelProperty { .. } => OpType::RelProperty,
            Op::Navigate { .. } => OpType::Navigate,
            Op::NewEntity { .. } => OpType::NewEntity,
            Op::NewRecord { .. } => OpType::NewRecord,
            Op::NewMultiset { .. } => OpType::NewMultiset,
            Op::Aggregate { .. } => OpType::Aggregate,
            Op::Exists { .. } => OpType::Exists,
            Op::Element { .. } => OpType::Element,
            Op::Collect { .. } => OpType::Collect,
            Op::GetEntityRef { .. } => OpType::GetEntityRef,
            Op::GetRefKey { .. } => OpType::GetRefKey,
            Op::Deref { .. } => OpType::Deref,
            Op::ScanTable { .. } => OpType::ScanTable,
            Op::ScanView { .. } => OpType::ScanView,
            Op::Unnest { .. } => OpType::Unnest,
            Op::Filter => OpType::Filter,
            Op::Project { .. } => OpType::Project,
            Op::InnerJoin => OpType::InnerJoin,
            Op::LeftOuterJoin => OpType::LeftOuterJoin,
            Op::FullOuterJoin => OpType::FullOuterJoin,
            Op::CrossJoin => OpType::CrossJoin,
            Op::CrossApply => OpType::CrossApply,
            Op::OuterApply => OpType::OuterApply,
            Op::UnionAll(_) => OpType::UnionAll,
            Op::Intersect(_) => OpType::Intersect,
            Op::Except(_) => OpType::Except,
            Op::Distinct { .. } => OpType::Distinct,
            Op::Sort { .. } => OpType::Sort,
            Op::ConstrainedSort { .. } => OpType::ConstrainedSort,
            Op::GroupBy { .. } => OpType::GroupBy,
            Op::SingleRow => OpType::SingleRow,
            Op::SingleRowTable => OpType::SingleRowTable,
            Op::VarDef { .. } => OpType::VarDef,
            Op::VarDefList => OpType::VarDefList,
        }
    }

    pub fn arity(&self) -> Arity {
        self.op_type().arity()
    }

    /// Static result type; `None` for relational and ancillary ops.
    pub fn result_type(&self) -> Option<TypeUsage> {
        match self {
            Op::Constant { ty, .. }
            | Op::InternalConstant { ty, .. }
            | Op::Null { ty }
            | Op::VarRef { ty, .. }
            | Op::Comparison { ty, .. }
            | Op::Like { ty }
            | Op::Arithmetic { ty, .. }
            | Op::Conditional { ty, .. }
            | Op::Case { ty }
            | Op::Cast { ty }
            | Op::SoftCast { ty }
            | Op::Treat { ty, .. }
            | Op::IsOf { ty, .. }
            | Op::Function { ty, .. }
            | Op::Property { ty, .. }
            | Op::RelProperty { ty, .. }
            | Op::Navigate { ty, .. }
            | Op::NewEntity { ty, .. }
            | Op::NewRecord { ty }
            | Op::NewMultiset { ty }
            | Op::Aggregate { ty, .. }
            | Op::Exists { ty }
            | Op::Element { ty }
            | Op::Collect { ty }
            | Op::GetEntityRef { ty }
            | Op::GetRefKey { ty }
            | Op::Deref { ty } => Some(*ty),
            _ => None,
        }
    }

    pub fn is_fake_treat(&self) -> bool {
        matches!(self, Op::Treat { is_fake: true, .. })
    }

    pub fn set_op_body(&self) -> Option<&SetOpBody> {
        match self {
            Op::UnionAll(body) | Op::Intersect(body) | Op::Except(body) => Some(body),
            _ => None,
        }
    }
}
