//! Parsing of paths and of the script expressions embedded in them.
//!
//! The path grammar is recognised by recursive descent; script expressions
//! use precedence climbing over one shared level table (see `Op`). The
//! parser keeps one token of pushback and calls `lex_path` or `lex_expr`
//! explicitly; each production knows which lexical mode it is in.
//!
//! ```text
//! path       := "$" step*
//! step       := "." member | ".." member | "[" subscript "]"
//!             | ".." "[" subscript "]"
//! member     := "*" | identifier | string | signed-int | "(" expr ")"
//! subscript  := "*" | "?(" expr ")" | "(" expr ")"
//!             | union-element ("," union-element)*
//! union-elt  := signed-int | string | identifier | slice
//! slice      := val? ":" val? (":" val?)?      -- val is int or "(" expr ")"
//! ```

use crate::error::{ParseError, ParseErrorKind};
use crate::expr::Expr;
use crate::lex::{Lexer, Token};
use crate::ops::Op;
use crate::path::{Arg, Bound, Path, Regexp, Slice, Step};

/// Parse a path expression.
pub(crate) fn path(s: &str) -> Result<Path, ParseError> {
    Parser::new(s).path()
}

/// Parse a bare script expression, requiring it to consume all input.
pub(crate) fn script_expression(s: &str) -> Result<Expr, ParseError> {
    let mut p = Parser::new(s);
    let e = p.script_expr()?;
    match p.lx.lex_expr()? {
        Token::Eof => Ok(e),
        t => Err(p.err(ParseErrorKind::UnexpectedToken(format!(
            "{t} after expression"
        )))),
    }
}

/// A subscript element, tagged with the op that classifies it.
struct Elem {
    op: Op,
    arg: Option<Arg>,
}

struct Parser<'a> {
    lx: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self { lx: Lexer::new(s) }
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.lx.offset())
    }

    fn unexpected(&self, t: Token) -> ParseError {
        self.err(ParseErrorKind::UnexpectedToken(t.to_string()))
    }

    /// One path-mode token of lookahead; None if the next lex will fail.
    fn look_path(&mut self) -> Option<Token> {
        match self.lx.lex_path() {
            Ok(t) => {
                self.lx.unget(Ok(t.clone()));
                Some(t)
            }
            Err(e) => {
                self.lx.unget(Err(e));
                None
            }
        }
    }

    /// One expression-mode token of lookahead.
    fn look_expr(&mut self) -> Option<Token> {
        match self.lx.lex_expr() {
            Ok(t) => {
                self.lx.unget(Ok(t.clone()));
                Some(t)
            }
            Err(e) => {
                self.lx.unget(Err(e));
                None
            }
        }
    }

    fn expect_path(&mut self, want: Token, text: &'static str) -> Result<(), ParseError> {
        let lx = self.lx.lex_path()?;
        if lx == want {
            Ok(())
        } else {
            Err(self.err(ParseErrorKind::Expected(text, lx.to_string())))
        }
    }

    fn expect_expr(&mut self, want: Token, text: &'static str) -> Result<(), ParseError> {
        let lx = self.lx.lex_expr()?;
        if lx == want {
            Ok(())
        } else {
            Err(self.err(ParseErrorKind::Expected(text, lx.to_string())))
        }
    }

    // path := "$" step*
    fn path(&mut self) -> Result<Path, ParseError> {
        self.expect_path(Token::Dollar, "$")?;
        let mut steps = Vec::new();
        loop {
            match self.lx.lex_path()? {
                Token::Eof => return Ok(Path { steps }),
                Token::Dot => steps.push(self.member(false)?),
                Token::Nest => {
                    if self.look_path() == Some(Token::LBrack) {
                        self.lx.lex_path()?;
                        steps.push(nested(self.brackets()?));
                    } else {
                        steps.push(self.member(true)?);
                    }
                }
                Token::LBrack => steps.push(self.brackets()?),
                t => return Err(self.unexpected(t)),
            }
        }
    }

    // member := "*" | identifier | string | signed-int | "(" expr ")"
    fn member(&mut self, nest: bool) -> Result<Step, ParseError> {
        let sel = |op, arg| {
            let op = if nest { Op::NestMember } else { op };
            Ok(Step::new(op, vec![arg]))
        };
        match self.lx.lex_path()? {
            Token::Star if nest => Ok(Step::new(Op::NestWild, vec![])),
            Token::Star => Ok(Step::new(Op::Wild, vec![])),
            Token::Id(s) => sel(Op::Member, Arg::Name(s)),
            Token::Str(s) => sel(Op::Member, Arg::Str(s)),
            Token::Int(n) => sel(Op::Member, Arg::Int(n)),
            Token::LParen => {
                let e = self.expr_paren()?;
                sel(Op::Member, Arg::Expr(e))
            }
            Token::Eof => Err(self.err(ParseErrorKind::UnexpectedEof)),
            t => Err(self.unexpected(t)),
        }
    }

    // "[" subscript "]", with "[" already consumed
    fn brackets(&mut self) -> Result<Step, ParseError> {
        let step = self.subscript()?;
        self.expect_path(Token::RBrack, "]")?;
        Ok(step)
    }

    // subscript := subscript-expression | union-element ("," union-element)*
    //
    // It is easier to accept a comma-separated list admitting both kinds of
    // element and post-analyse it to see what it is, or whether it mixes
    // the two illegally.
    fn subscript(&mut self) -> Result<Step, ParseError> {
        let mut elems = vec![self.val()?];
        while self.look_path() == Some(Token::Comma) {
            self.lx.lex_path()?;
            elems.push(self.val()?);
        }
        if elems.len() > 1 {
            for e in &elems {
                if matches!(e.op, Op::Wild | Op::Exp | Op::Filter) {
                    return Err(ParseError::plain(ParseErrorKind::UnionElement(e.op)));
                }
            }
        }
        let first = elems[0].op;
        match first {
            Op::Wild => Ok(Step::new(Op::Wild, vec![])),
            Op::Filter | Op::Exp => {
                let op = if first == Op::Filter {
                    Op::Filter
                } else {
                    Op::Select
                };
                let arg = elems.remove(0).arg.expect("subscript expression argument");
                Ok(Step::new(op, vec![arg]))
            }
            _ => {
                let args: Vec<Arg> = elems
                    .into_iter()
                    .map(|e| e.arg.expect("union element argument"))
                    .collect();
                if args.len() == 1 {
                    Ok(Step::new(Op::Select, args))
                } else {
                    Ok(Step::new(Op::Union, args))
                }
            }
        }
    }

    // union-element | subscript-expression
    fn val(&mut self) -> Result<Elem, ParseError> {
        let elem = |op, arg| Ok(Elem { op, arg: Some(arg) });
        match self.lx.lex_path()? {
            Token::Star => Ok(Elem {
                op: Op::Wild,
                arg: None,
            }),
            Token::LParen => {
                let e = self.expr_paren()?;
                if self.look_path() == Some(Token::Colon) {
                    self.lx.lex_path()?;
                    return self.slice(Some(Bound::Expr(e)));
                }
                elem(Op::Exp, Arg::Expr(e))
            }
            Token::Colon => self.slice(None),
            Token::Filter => {
                let e = self.expr_paren()?;
                elem(Op::Filter, Arg::Expr(e))
            }
            Token::Int(n) => {
                if self.look_path() == Some(Token::Colon) {
                    self.lx.lex_path()?;
                    return self.slice(Some(Bound::Int(n)));
                }
                elem(Op::Int, Arg::Int(n))
            }
            Token::Str(s) => elem(Op::Str, Arg::Str(s)),
            Token::Id(s) => elem(Op::Id, Arg::Name(s)),
            Token::Eof => Err(self.err(ParseErrorKind::UnexpectedEof)),
            t => Err(self.unexpected(t)),
        }
    }

    // slice := start? ":" end? (":" stride?)?
    //
    // The leading `start? ":"` has been consumed; valid successors are an
    // end value, ":" introducing a stride, or "]" or "," closing the slice.
    fn slice(&mut self, start: Option<Bound>) -> Result<Elem, ParseError> {
        let mut sl = Slice {
            start,
            end: None,
            stride: None,
        };
        let elem = |sl| {
            Ok(Elem {
                op: Op::Bounds,
                arg: Some(Arg::Slice(sl)),
            })
        };
        match self.look_path() {
            Some(Token::Comma | Token::RBrack) => return elem(sl),
            Some(Token::Colon) => (),
            _ => sl.end = Some(self.slice_val()?),
        }
        match self.look_path() {
            Some(Token::RBrack | Token::Comma) => elem(sl),
            Some(Token::Colon) => {
                self.lx.lex_path()?;
                match self.look_path() {
                    Some(Token::RBrack | Token::Comma) => elem(sl),
                    _ => {
                        sl.stride = Some(self.slice_val()?);
                        elem(sl)
                    }
                }
            }
            _ => {
                let t = self.lx.lex_path()?;
                Err(self.unexpected(t))
            }
        }
    }

    // (end | stride) := signed-int | "(" expr ")"
    fn slice_val(&mut self) -> Result<Bound, ParseError> {
        match self.lx.lex_path()? {
            Token::LParen => Ok(Bound::Expr(self.expr_paren()?)),
            Token::Int(n) => Ok(Bound::Int(n)),
            Token::Eof => Err(self.err(ParseErrorKind::UnexpectedEof)),
            t => Err(self.unexpected(t)),
        }
    }

    // the tail of "(" expr ")" or "?(" expr ")": expression then ")"
    fn expr_paren(&mut self) -> Result<Expr, ParseError> {
        let e = self.script_expr()?;
        self.expect_path(Token::RParen, ")")?;
        Ok(e)
    }

    // expression parsing below, all in expression lexical mode

    fn script_expr(&mut self) -> Result<Expr, ParseError> {
        self.expr_prec(0)
    }

    /// Collect binary operators of priority `pri` or higher onto an
    /// initial primary tree: `primary (op expr)*`.
    fn expr_prec(&mut self, pri: u8) -> Result<Expr, ParseError> {
        let mut e = self.primary()?;
        while let Some(op) = self.op_ahead() {
            let prec = op.precedence().expect("binary operator");
            if prec < pri {
                break;
            }
            self.lx.lex_expr()?;
            // all binary operators associate to the left
            let right = self.expr_prec(prec + 1)?;
            e = Expr::Inner(op, vec![e, right]);
        }
        Ok(e)
    }

    /// The binary operator ahead, if any; `in` and `nin` are recognised as
    /// operators here rather than identifiers.
    fn op_ahead(&mut self) -> Option<Op> {
        match self.lx.lex_expr() {
            Ok(t) => {
                let op = tok2op(&t);
                self.lx.unget(Ok(t));
                op
            }
            Err(e) => {
                self.lx.unget(Err(e));
                None
            }
        }
    }

    // primary := primary1 ("(" e-list? ")" | "[" expr "]" | "." identifier)*
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.primary1()?;
        loop {
            match self.look_expr() {
                Some(Token::LParen) => {
                    if !matches!(e, Expr::Name(_)) {
                        return Err(self.err(ParseErrorKind::Expected(
                            "identifier before '('",
                            e.opcode().text().into(),
                        )));
                    }
                    self.lx.lex_expr()?;
                    let args = self.application(Some(e), Token::RParen, ")")?;
                    e = Expr::Inner(Op::Call, args);
                }
                Some(Token::LBrack) => {
                    self.lx.lex_expr()?;
                    let index = self.expr_prec(0)?;
                    self.expect_expr(Token::RBrack, "]")?;
                    e = Expr::Inner(Op::Index, vec![e, index]);
                }
                Some(Token::Dot) => {
                    self.lx.lex_expr()?;
                    match self.lx.lex_expr()? {
                        Token::Id(s) => e = Expr::Inner(Op::Dot, vec![e, Expr::Name(s)]),
                        t => {
                            return Err(self
                                .err(ParseErrorKind::Expected("identifier", t.to_string())))
                        }
                    }
                }
                _ => return Ok(e),
            }
        }
    }

    /// An argument list terminated by `end`, prefixed with an optional
    /// already-parsed expression.
    fn application(
        &mut self,
        first: Option<Expr>,
        end: Token,
        text: &'static str,
    ) -> Result<Vec<Expr>, ParseError> {
        let mut args: Vec<Expr> = first.into_iter().collect();
        if self.look_expr() != Some(end.clone()) {
            loop {
                args.push(self.expr_prec(0)?);
                if self.look_expr() != Some(Token::Comma) {
                    break;
                }
                self.lx.lex_expr()?;
            }
        }
        self.expect_expr(end, text)?;
        Ok(args)
    }

    // primary1 := identifier | integer | real | string | "/" re "/"
    //           | "@" | "$" | "(" expr ")" | "[" e-list? "]"
    //           | "-" primary | "!" primary
    fn primary1(&mut self) -> Result<Expr, ParseError> {
        match self.lx.lex_expr()? {
            Token::Minus => Ok(Expr::Inner(Op::Neg, vec![self.primary()?])),
            Token::Bang => Ok(Expr::Inner(Op::Not, vec![self.primary()?])),
            Token::Id(s) => Ok(match s.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                _ => Expr::Name(s),
            }),
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Real(f) => Ok(Expr::Real(f)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Slash => {
                let off = self.lx.offset();
                let pat = match self.lx.lex_regex(b'/')? {
                    Token::Re(pat) => pat,
                    _ => unreachable!("lex_regex yields a regex token"),
                };
                match regex::Regex::new(&pat) {
                    Ok(prog) => Ok(Expr::Regex(Regexp::new(pat, prog))),
                    Err(e) => Err(ParseError::new(
                        ParseErrorKind::BadRegex(e.to_string()),
                        off,
                    )),
                }
            }
            Token::At => Ok(Expr::Current),
            Token::Dollar => Ok(Expr::Root),
            Token::LParen => {
                let e = self.script_expr()?;
                self.expect_expr(Token::RParen, ")")?;
                Ok(e)
            }
            Token::LBrack => Ok(Expr::Inner(
                Op::Array,
                self.application(None, Token::RBrack, "]")?,
            )),
            Token::Eof => Err(self.err(ParseErrorKind::UnexpectedEof)),
            t => Err(self.err(ParseErrorKind::UnexpectedToken(format!(
                "{t} in expression term"
            )))),
        }
    }
}

/// Rewrite a bracketed step introduced by `..` to its nesting variant.
fn nested(step: Step) -> Step {
    let op = match step.op {
        Op::Select => Op::NestSelect,
        Op::Union => Op::NestUnion,
        Op::Wild => Op::NestWild,
        Op::Filter => Op::NestFilter,
        op => op,
    };
    Step::new(op, step.args)
}

/// Map a token to the binary operator it denotes, if any.
fn tok2op(t: &Token) -> Option<Op> {
    Some(match t {
        Token::Star => Op::Mul,
        Token::Plus => Op::Add,
        Token::Minus => Op::Sub,
        Token::Slash => Op::Div,
        Token::Percent => Op::Mod,
        Token::Eq => Op::Eq,
        Token::Ne => Op::Ne,
        Token::Lt => Op::Lt,
        Token::Le => Op::Le,
        Token::Ge => Op::Ge,
        Token::Gt => Op::Gt,
        Token::And => Op::And,
        Token::Or => Op::Or,
        Token::Tilde | Token::Match => Op::Match,
        Token::Id(s) if s == "in" => Op::In,
        Token::Id(s) if s == "nin" => Op::Nin,
        _ => return None,
    })
}
