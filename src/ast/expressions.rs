use crate::ast::{BinOp, Pattern, UnaryOp};
use crate::lexer::Position;
use crate::value::Value;

/// Abstract Syntax Tree node.
///
/// The AST is built once per query and evaluated read-only for every input
/// document. Each node remembers where it started in the query source so
/// runtime errors can point back at it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Expr { kind, position }
    }

    pub fn identity(position: Position) -> Self {
        Expr::new(ExprKind::Identity, position)
    }
}

/// The closed set of expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// The input, unchanged (`.`)
    Identity,

    /// Field access
    ///
    /// # Examples
    /// ```text
    /// .name
    /// .user.email
    /// .name?
    /// ."key with spaces"
    /// ```
    Field {
        target: Box<Expr>,
        name: String,
        optional: bool,
    },

    /// Index access; the index is evaluated against the same input as the target
    ///
    /// # Examples
    /// ```text
    /// .[0]
    /// .items[-1]
    /// .["name"]
    /// ```
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },

    /// Slice of an array, string or byte string
    ///
    /// # Examples
    /// ```text
    /// .[1:3]
    /// .[:2]
    /// .[-2:]
    /// ```
    Slice {
        target: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
        optional: bool,
    },

    /// Every element of an array or every value of an object (`.[]`)
    Iterate { target: Box<Expr>, optional: bool },

    /// Pipeline stage: `left | right`
    Pipe { left: Box<Expr>, right: Box<Expr> },

    /// Fan-out: `left, right`
    Comma { left: Box<Expr>, right: Box<Expr> },

    /// Literal value (number, string, bytes, boolean, null)
    Literal(Value),

    /// Array construction, collecting every output of the inner expression
    ///
    /// # Examples
    /// ```text
    /// []
    /// [.items[] | .id]
    /// ```
    ArrayConstruct(Option<Box<Expr>>),

    /// Object construction; entries are (key, value) expression pairs
    ///
    /// # Examples
    /// ```text
    /// {name: .user, "total": .a + .b, (.k): 1}
    /// ```
    ObjectConstruct(Vec<(Expr, Expr)>),

    /// Variant construction
    ///
    /// # Examples
    /// ```text
    /// Option::None
    /// Option::Some(.id)
    /// ```
    VariantConstruct {
        tag: String,
        payload: Option<Box<Expr>>,
    },

    /// Binary operation (arithmetic, comparison, logical, alternative)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation (`-x`, `not x`)
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    /// Conditional; a missing else branch yields the input
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },

    /// Call of a local or built-in function
    ///
    /// # Examples
    /// ```text
    /// length
    /// map(. * 2)
    /// range(0; 10)
    /// ```
    FunctionCall { name: String, args: Vec<Expr> },

    /// Variable reference (`$name`)
    VariableRef(String),

    /// Binding: `source as pattern | body`
    As {
        source: Box<Expr>,
        pattern: Pattern,
        body: Box<Expr>,
    },

    /// Local function definition visible in `rest` and in its own body
    ///
    /// # Example
    /// ```text
    /// def double: . * 2; map(double)
    /// ```
    FunctionDef {
        name: String,
        params: Vec<Param>,
        body: Box<Expr>,
        rest: Box<Expr>,
    },

    /// Fold: `reduce source as pattern (init; update)`
    Reduce {
        source: Box<Expr>,
        pattern: Pattern,
        init: Box<Expr>,
        update: Box<Expr>,
    },

    /// Error handling: `try body catch handler`, or the `?` suffix
    Try {
        body: Box<Expr>,
        catch: Option<Box<Expr>>,
    },
}

/// Parameter of a local function definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Filter parameter (`f`), called like a zero-arity function
    Filter(String),
    /// Value parameter (`$x`), bound as a variable and as a function
    Value(String),
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::Filter(name) | Param::Value(name) => name,
        }
    }
}
