//! Statement/expression vocabulary for generated bodies
//!
//! The member and constructor implementers describe every generated body in
//! this small IR; a backend decides how to execute it. The vocabulary is
//! exactly what the forwarding and construction bodies need: assignment,
//! invocation, array element access, address-of (indirect argument cells),
//! new-array, new-instance (invocation allocation), and a return-site cast.

use veil_model::{MemberId, TypeId, Value};

/// Storage location written by an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    /// Body-local slot (holds the allocated invocation)
    Local(usize),
    /// Field of the instance under construction or dispatch
    Field(usize),
    /// Caller argument cell (by-reference write-back)
    Arg(usize),
}

/// Expression nodes available to generated bodies.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal value
    Const(Value),
    /// The proxy instance itself
    This,
    /// Caller argument by position
    Arg(usize),
    /// Indirect cell for caller argument `i`; by-reference parameters are
    /// passed through these so callee writes surface in the snapshot
    AddrOf(usize),
    /// Field of the proxy instance
    Field(usize),
    /// Argument snapshot (array) of the invocation held in a local
    ArgsOf(usize),
    /// Return value of the completed invocation held in a local
    ResultOf(usize),
    /// Element of an array-valued expression
    Element {
        /// The array expression
        of: Box<Expr>,
        /// Element position
        index: usize,
    },
    /// Fresh array from element expressions
    NewArray(Vec<Expr>),
    /// Conversion of an invocation result to the member's declared return
    /// shape
    Cast(Box<Expr>),
    /// Single-element chain holding the passthrough interceptor; used by the
    /// synthesized parameterless constructor
    DefaultInterceptors,
    /// Allocation of the member's invocation construct
    NewInvocation(Box<NewInvocationExpr>),
}

/// Arguments of an invocation allocation: the matching descriptor plus the
/// references the invocation constructor threads (backing target, self,
/// interceptor field, member identity, argument array).
#[derive(Debug, Clone)]
pub struct NewInvocationExpr {
    /// Index into the synthesized type's descriptor table
    pub descriptor: usize,
    /// The declared member this call site dispatches
    pub declared: MemberId,
    /// Self-reference (always `Expr::This` in generated bodies)
    pub proxy: Expr,
    /// Backing-target reference: the target field, a mixin field, or a null
    /// constant when the member has no backing
    pub target: Expr,
    /// The interceptor field
    pub interceptors: Expr,
    /// One expression per declared parameter; `Expr::AddrOf` for
    /// by-reference parameters
    pub arguments: Vec<Expr>,
}

/// Statement nodes available to generated bodies.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Evaluate `expr` and store it into `place`
    Assign {
        /// Destination
        place: Place,
        /// Source expression
        expr: Expr,
    },
    /// Run the interceptor chain of the invocation held in `local`
    Proceed {
        /// Local slot holding the invocation
        local: usize,
    },
    /// Invoke a base-type constructor with evaluated arguments
    CallBase {
        /// The base type
        base: TypeId,
        /// Constructor index on the base type
        ctor: usize,
        /// Forwarded constructor arguments
        args: Vec<Expr>,
    },
    /// Leave the body, with a value for non-void members
    Return {
        /// The returned expression, absent for void members
        expr: Option<Expr>,
    },
}

/// A complete generated body.
#[derive(Debug, Clone)]
pub struct Body {
    /// Number of local slots
    pub locals: usize,
    /// Statements in execution order
    pub stmts: Vec<Stmt>,
}

impl Body {
    /// A body with `locals` slots and the given statements.
    pub fn new(locals: usize, stmts: Vec<Stmt>) -> Self {
        Self { locals, stmts }
    }
}
