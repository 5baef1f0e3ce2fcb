//! Functions and their attributes.

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_dtype::DType;

use crate::expr::Expr;

/// Attribute key for the thread-block shape of a launch.
pub const BLOCK_DIM: &str = "block_dim";
/// Attribute key for the grid shape of a launch.
pub const GRID_DIM: &str = "grid_dim";

/// Where a function runs and how it is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FuncKind {
    /// Accelerator entry point, launched from the host.
    Kernel,
    /// Accelerator function callable only from kernels and other device functions.
    Device,
    Host,
}

/// Function attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AttrValue {
    Int(i64),
    #[display("({}, {}, {})", _0[0], _0[1], _0[2])]
    Dim3([u32; 3]),
    #[display("{_0:?}")]
    Str(String),
    Bool(bool),
    #[display("{_0:?}")]
    IntList(Vec<i64>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_dim3(&self) -> Option<[u32; 3]> {
        match self {
            Self::Dim3(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<[u32; 3]> for AttrValue {
    fn from(v: [u32; 3]) -> Self {
        Self::Dim3(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntList(v)
    }
}

/// Ordered attribute map; iteration order is deterministic.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Immutable function value.
///
/// Updating any field produces a new `Function`; the original is never
/// touched, so unchanged functions can be shared between module versions.
///
/// ```
/// use kiln_ir::{Expr, FuncKind, Function};
///
/// let f = Function::builder().name("scale").kind(FuncKind::Device).body(Expr::int(1)).build();
/// assert_eq!(f.name(), "scale");
/// assert!(f.attrs().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct Function {
    #[builder(into)]
    name: String,
    kind: FuncKind,
    #[builder(default)]
    params: Vec<Arc<Expr>>,
    body: Arc<Expr>,
    /// Declared return type; defaults to the body's dtype.
    ret_type: Option<DType>,
    #[builder(default)]
    attrs: Attrs,
    /// Free variables supplied by the launcher rather than passed as parameters.
    #[builder(default)]
    extern_vars: Vec<Arc<Expr>>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FuncKind {
        self.kind
    }

    pub fn is_kernel(&self) -> bool {
        self.kind == FuncKind::Kernel
    }

    pub fn params(&self) -> &[Arc<Expr>] {
        &self.params
    }

    pub fn body(&self) -> &Arc<Expr> {
        &self.body
    }

    pub fn ret_type(&self) -> DType {
        self.ret_type.unwrap_or_else(|| self.body.dtype())
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn extern_vars(&self) -> &[Arc<Expr>] {
        &self.extern_vars
    }

    /// Copy of this function with `attrs` replacing the attribute map.
    pub fn with_attrs(&self, attrs: Attrs) -> Self {
        Self { attrs, ..self.clone() }
    }

    /// Copy of this function with `updates` merged over the existing attributes.
    pub fn with_merged_attrs<I>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (String, AttrValue)>,
    {
        let mut attrs = self.attrs.clone();
        attrs.extend(updates);
        self.with_attrs(attrs)
    }

    /// Copy of this function with a new body. The declared return type is kept.
    pub fn with_body(&self, body: Arc<Expr>) -> Self {
        Self { body, ..self.clone() }
    }

    /// Names of the functions called from the body, in first-occurrence order.
    pub fn callees(&self) -> Vec<String> {
        self.body.callees()
    }
}
