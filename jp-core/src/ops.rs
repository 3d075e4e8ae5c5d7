//! The operator set shared by path steps and expression nodes.
//!
//! The `.` operator of the path grammar is transformed into different ops
//! depending on what follows it (`Member`, `Wild`), and `..` likewise into
//! the `Nest*` family, one per kind of subscript. `For` and `Nest` mark the
//! start of an iteration over the current output set or the recursive walk
//! of it; `Rep` closes such a loop.

/// A path step or expression operator.
///
/// A single flat enumeration is deliberately shared by both grammars, so
/// that a compiled program needs only one op field per instruction and the
/// expression compiler can emit path-selection ops directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    // leaf values
    /// identifier
    Id,
    /// single- or double-quoted string
    Str,
    /// integer
    Int,
    /// floating-point number
    Real,
    /// `/re/`
    Regex,
    /// `[start:end:stride]` bounds of a slice
    Bounds,
    /// `true` or `false`
    Bool,
    /// `null`
    Null,
    /// `$` (the document root as an operand)
    Root,
    /// `@` (the current iteration value as an operand)
    Current,

    // path operators
    /// `.` selection (single key or index)
    Member,
    /// `[]` selection (single index, key, expression or slice)
    Select,
    /// `[e, e, ...]` union of selections
    Union,
    /// `*`
    Wild,
    /// `?(...)`
    Filter,
    /// `(...)` subscript expression, rewritten to `Select` before compiling
    Exp,

    // path iteration operators
    /// start of a `Filter` loop, selecting over output candidates
    For,
    /// start of a `Nest*` loop, selecting over the recursive walk
    Nest,
    /// repeat the loop body if values remain
    Rep,

    // path nest operators
    /// `.. member`
    NestMember,
    /// `.. [subscript]`
    NestSelect,
    /// `.. [key1, key2, ...]`
    NestUnion,
    /// `.. *`
    NestWild,
    /// `.. [?(expr)]`
    NestFilter,

    // expression operators
    /// `.` field selection in an expression
    Dot,
    /// `[]` indexing in an expression
    Index,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// unary `-`
    Neg,
    /// `+`
    Add,
    /// binary `-`
    Sub,
    /// function call `id(args)`
    Call,
    /// array literal `[e-list]`
    Array,
    /// `in`
    In,
    /// `nin` (not in)
    Nin,
    /// `=~`
    Match,
    /// unary `!`
    Not,
}

impl Op {
    /// Every op, in discriminant order. Keep in sync with the declaration.
    pub(crate) const ALL: [Op; 46] = [
        Op::Id,
        Op::Str,
        Op::Int,
        Op::Real,
        Op::Regex,
        Op::Bounds,
        Op::Bool,
        Op::Null,
        Op::Root,
        Op::Current,
        Op::Member,
        Op::Select,
        Op::Union,
        Op::Wild,
        Op::Filter,
        Op::Exp,
        Op::For,
        Op::Nest,
        Op::Rep,
        Op::NestMember,
        Op::NestSelect,
        Op::NestUnion,
        Op::NestWild,
        Op::NestFilter,
        Op::Dot,
        Op::Index,
        Op::Lt,
        Op::Le,
        Op::Eq,
        Op::Ne,
        Op::Ge,
        Op::Gt,
        Op::And,
        Op::Or,
        Op::Mul,
        Op::Div,
        Op::Mod,
        Op::Neg,
        Op::Add,
        Op::Sub,
        Op::Call,
        Op::Array,
        Op::In,
        Op::Nin,
        Op::Match,
        Op::Not,
    ];

    pub(crate) fn from_u8(b: u8) -> Self {
        Self::ALL[usize::from(b)]
    }

    /// Canonical name, used by the program disassembly.
    pub fn name(self) -> &'static str {
        match self {
            Op::Id => "Id",
            Op::Str => "String",
            Op::Int => "Int",
            Op::Real => "Real",
            Op::Regex => "Regex",
            Op::Bounds => "Bounds",
            Op::Bool => "Bool",
            Op::Null => "Null",
            Op::Root => "Root",
            Op::Current => "Current",
            Op::Member => "Member",
            Op::Select => "Select",
            Op::Union => "Union",
            Op::Wild => "Wild",
            Op::Filter => "Filter",
            Op::Exp => "Exp",
            Op::For => "For",
            Op::Nest => "Nest",
            Op::Rep => "Rep",
            Op::NestMember => "NestMember",
            Op::NestSelect => "NestSelect",
            Op::NestUnion => "NestUnion",
            Op::NestWild => "NestWild",
            Op::NestFilter => "NestFilter",
            Op::Dot => "Dot",
            Op::Index => "Index",
            Op::Lt => "Lt",
            Op::Le => "Le",
            Op::Eq => "Eq",
            Op::Ne => "Ne",
            Op::Ge => "Ge",
            Op::Gt => "Gt",
            Op::And => "And",
            Op::Or => "Or",
            Op::Mul => "Mul",
            Op::Div => "Div",
            Op::Mod => "Mod",
            Op::Neg => "Neg",
            Op::Add => "Add",
            Op::Sub => "Sub",
            Op::Call => "Call",
            Op::Array => "Array",
            Op::In => "In",
            Op::Nin => "Nin",
            Op::Match => "Match",
            Op::Not => "Not",
        }
    }

    /// Source-level representation for diagnostics.
    pub fn text(self) -> &'static str {
        match self {
            Op::Id => "identifier",
            Op::Str => "string",
            Op::Int => "integer",
            Op::Real => "real number",
            Op::Regex => "regular expression",
            Op::Bounds => "[start:end:stride]",
            Op::Bool => "boolean",
            Op::Null => "null",
            Op::Root => "$",
            Op::Current => "@",
            Op::Member => ". selection",
            Op::Select => "[]selection",
            Op::Union => "[]union",
            Op::Wild => "*",
            Op::Filter => "?(filter)",
            Op::Exp => "(exp)",
            Op::For => "loop start",
            Op::Nest => "..",
            Op::Rep => "loop end",
            Op::NestMember => "..member",
            Op::NestSelect => "..[]selection",
            Op::NestUnion => "..[]union",
            Op::NestWild => "..*",
            Op::NestFilter => "..[?(filter)]",
            Op::Dot => ".",
            Op::Index => "[]index",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::And => "&&",
            Op::Or => "||",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Neg => "unary -",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Call => "function call",
            Op::Array => "array value",
            Op::In => "in",
            Op::Nin => "nin",
            Op::Match => "=~",
            Op::Not => "!",
        }
    }

    /// True if this op is a leaf: it pushes a value and has no operands.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Op::Id
                | Op::Str
                | Op::Int
                | Op::Real
                | Op::Regex
                | Op::Bounds
                | Op::Bool
                | Op::Null
                | Op::Root
                | Op::Current
                | Op::Wild
        )
    }

    /// True if this op is a leaf that carries a value.
    pub fn has_val(self) -> bool {
        matches!(
            self,
            Op::Id | Op::Str | Op::Int | Op::Real | Op::Regex | Op::Bounds | Op::Bool
        )
    }

    /// A binary operator's precedence, or None if it is not one.
    /// `=~` sits at the relational level, although some implementations
    /// put it below `*`.
    pub(crate) fn precedence(self) -> Option<u8> {
        match self {
            Op::Or => Some(0),
            Op::And => Some(1),
            Op::Eq | Op::Ne => Some(2),
            Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Match | Op::In | Op::Nin => Some(3),
            Op::Add | Op::Sub => Some(4),
            Op::Mul | Op::Div | Op::Mod => Some(5),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Op;

    #[test]
    fn discriminants_match_table() {
        for (i, op) in Op::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i, "{}", op.name());
            assert_eq!(Op::from_u8(i as u8), *op);
        }
    }

    #[test]
    fn leaf_values() {
        assert!(Op::Id.is_leaf() && Op::Id.has_val());
        assert!(Op::Wild.is_leaf() && !Op::Wild.has_val());
        assert!(!Op::Member.is_leaf());
        assert!(!Op::Rep.is_leaf());
    }
}
