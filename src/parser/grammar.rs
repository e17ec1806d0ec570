//! Recursive-descent parser over the QubecTalk grammar (spec §6).
//!
//! Consumes the token stream produced by [`crate::parser::lexer`] and
//! builds a [`Program`]. Semantic validation (enablement, scope
//! existence, displacement targets) happens downstream in the engine;
//! this stage only enforces the grammar shape.

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::ast::{
    ApplicationDef, BinOp, Command, CompareOp, DisplaceTarget, During, Expr, LogicalOp, PolicyDef,
    ProtectedVar, Program, ScenarioDef, SubstanceDef, TradeStream, YearRef,
};
use crate::error::{ParseError, SourceLocation};
use crate::keeper::RecyclingStage;
use crate::parser::lexer::{tokenize, SpannedToken};
use crate::parser::token::{Keyword, Symbol, Token};
use crate::quantity::{Quantity, Unit};

pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn location(&self) -> SourceLocation {
        self.current().location
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            location: self.location(),
            token: format!("{:?}", self.peek()),
            message: message.into(),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), ParseError> {
        if let Token::Keyword(found) = self.peek() {
            if *found == kw {
                self.advance();
                return Ok(());
            }
        }
        Err(self.syntax_error(format!("expected keyword '{}'", kw.as_str())))
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(found) if *found == kw)
    }

    fn eat_keyword_if(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: Symbol) -> Result<(), ParseError> {
        if let Token::Symbol(found) = self.peek() {
            if *found == sym {
                self.advance();
                return Ok(());
            }
        }
        Err(self.syntax_error(format!("expected symbol '{sym:?}'")))
    }

    fn eat_symbol_if(&mut self, sym: Symbol) -> bool {
        if matches!(self.peek(), Token::Symbol(found) if *found == sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError::Syntax {
                location: self.location(),
                token: format!("{other:?}"),
                message: "expected an identifier".to_string(),
            }),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::String(s) => Ok(s),
            other => Err(ParseError::Syntax {
                location: self.location(),
                token: format!("{other:?}"),
                message: "expected a quoted string".to_string(),
            }),
        }
    }

    // ---- program / stanzas ----------------------------------------

    fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        while !matches!(self.peek(), Token::Eof) {
            self.expect_keyword(Keyword::Start)?;
            match self.peek() {
                Token::Keyword(Keyword::About) => {
                    self.advance();
                    program.about = Some(self.skip_until_end(Keyword::About)?);
                }
                Token::Keyword(Keyword::Variables) => {
                    self.advance();
                    while !self.at_end_of(Keyword::Variables) {
                        program.variables.push(self.parse_define_variable()?);
                    }
                    self.expect_keyword(Keyword::End)?;
                    self.expect_keyword(Keyword::Variables)?;
                }
                Token::Keyword(Keyword::Default) => {
                    self.advance();
                    while !self.at_end_of(Keyword::Default) {
                        program.default_stanza.push(self.parse_application_def()?);
                    }
                    self.expect_keyword(Keyword::End)?;
                    self.expect_keyword(Keyword::Default)?;
                }
                Token::Keyword(Keyword::Policy) => {
                    self.advance();
                    let name = self.expect_string()?;
                    let mut applications = Vec::new();
                    while !self.at_end_of(Keyword::Policy) {
                        applications.push(self.parse_application_def()?);
                    }
                    self.expect_keyword(Keyword::End)?;
                    self.expect_keyword(Keyword::Policy)?;
                    program.policies.push(PolicyDef { name, applications });
                }
                Token::Keyword(Keyword::Simulations) => {
                    self.advance();
                    while !self.at_end_of(Keyword::Simulations) {
                        program.simulations.push(self.parse_scenario_def()?);
                    }
                    self.expect_keyword(Keyword::End)?;
                    self.expect_keyword(Keyword::Simulations)?;
                }
                _ => return Err(self.syntax_error("expected a stanza keyword")),
            }
        }
        Ok(program)
    }

    /// True when the upcoming tokens are exactly `"end" kw`, without
    /// consuming them.
    fn at_end_of(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(Keyword::End))
            && matches!(
                self.tokens.get(self.pos + 1).map(|t| &t.token),
                Some(Token::Keyword(found)) if *found == kw
            )
    }

    /// Consumes tokens verbatim (reconstructed as whitespace-joined
    /// text) until `"end" kw`, for the free-form `about` stanza.
    fn skip_until_end(&mut self, kw: Keyword) -> Result<String, ParseError> {
        let mut parts = Vec::new();
        while !self.at_end_of(kw) {
            if matches!(self.peek(), Token::Eof) {
                return Err(ParseError::UnexpectedEof {
                    context: "about stanza".to_string(),
                });
            }
            match self.advance() {
                Token::Ident(s) | Token::String(s) | Token::Number(s) => parts.push(s),
                Token::Keyword(k) => parts.push(k.as_str().to_string()),
                _ => {}
            }
        }
        self.expect_keyword(Keyword::End)?;
        self.expect_keyword(kw)?;
        Ok(parts.join(" "))
    }

    fn parse_application_def(&mut self) -> Result<ApplicationDef, ParseError> {
        if !(self.eat_keyword_if(Keyword::Define) || self.eat_keyword_if(Keyword::Modify)) {
            return Err(self.syntax_error("expected 'define' or 'modify'"));
        }
        self.expect_keyword(Keyword::Application)?;
        let name = self.expect_string()?;
        let mut substances = Vec::new();
        while !self.at_end_of(Keyword::Application) {
            substances.push(self.parse_substance_def()?);
        }
        self.expect_keyword(Keyword::End)?;
        self.expect_keyword(Keyword::Application)?;
        Ok(ApplicationDef { name, substances })
    }

    fn parse_substance_def(&mut self) -> Result<SubstanceDef, ParseError> {
        if !(self.eat_keyword_if(Keyword::Uses) || self.eat_keyword_if(Keyword::Modify)) {
            return Err(self.syntax_error("expected 'uses' or 'modify'"));
        }
        self.expect_keyword(Keyword::Substance)?;
        let name = self.expect_string()?;
        let mut commands = Vec::new();
        while !self.at_end_of(Keyword::Substance) {
            commands.push(self.parse_command()?);
        }
        self.expect_keyword(Keyword::End)?;
        self.expect_keyword(Keyword::Substance)?;
        Ok(SubstanceDef { name, commands })
    }

    fn parse_scenario_def(&mut self) -> Result<ScenarioDef, ParseError> {
        self.expect_keyword(Keyword::Simulate)?;
        let name = self.expect_string()?;
        let mut policies = Vec::new();
        if self.eat_keyword_if(Keyword::Using) {
            policies.push(self.expect_string()?);
            while self.eat_keyword_if(Keyword::Then) {
                policies.push(self.expect_string()?);
            }
        }
        self.expect_keyword(Keyword::From)?;
        if !(self.eat_keyword_if(Keyword::Years) || self.eat_keyword_if(Keyword::Year)) {
            return Err(self.syntax_error("expected 'years'"));
        }
        let start_year = self.expect_year_number()?;
        self.expect_keyword(Keyword::To)?;
        let end_year = if self.eat_keyword_if(Keyword::Onwards) {
            YearRef::Onwards
        } else {
            YearRef::Year(self.expect_year_number()?)
        };
        let trials = if self.eat_keyword_if(Keyword::Across) {
            let count = self.expect_year_number()?;
            self.expect_keyword(Keyword::Trials)?;
            Some(count as u32)
        } else {
            None
        };
        Ok(ScenarioDef {
            name,
            policies,
            start_year,
            end_year,
            trials,
        })
    }

    fn expect_year_number(&mut self) -> Result<i32, ParseError> {
        match self.advance() {
            Token::Number(s) => s.parse::<i32>().map_err(|_| ParseError::Syntax {
                location: self.location(),
                token: s,
                message: "expected a whole-number year".to_string(),
            }),
            other => Err(ParseError::Syntax {
                location: self.location(),
                token: format!("{other:?}"),
                message: "expected a year number".to_string(),
            }),
        }
    }

    fn parse_define_variable(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword(Keyword::Define)?;
        self.expect_keyword(Keyword::Variable)?;
        let name = self.expect_string()?;
        self.expect_keyword(Keyword::As)?;
        let value = self.parse_expr()?;
        Ok(Command::DefineVariable { name, value })
    }

    // ---- commands ---------------------------------------------------

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        match self.peek().clone() {
            Token::Keyword(Keyword::Define) => self.parse_define_variable(),
            Token::Keyword(Keyword::Enable) => {
                self.advance();
                let stream = self.expect_trade_stream()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Enable { stream, during })
            }
            Token::Keyword(Keyword::Initial) => {
                self.advance();
                self.expect_keyword(Keyword::Charge)?;
                self.expect_keyword(Keyword::With)?;
                let value = self.parse_expr()?;
                self.expect_keyword(Keyword::For)?;
                let stream = self.expect_trade_stream()?;
                let during = self.parse_optional_during()?;
                Ok(Command::InitialCharge { stream, value, during })
            }
            Token::Keyword(Keyword::Equals) => {
                self.advance();
                let value = self.parse_expr()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Equals { value, during })
            }
            Token::Keyword(Keyword::Set) => {
                self.advance();
                let stream = self.expect_ident()?;
                self.expect_keyword(Keyword::To)?;
                let value = self.parse_expr()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Set { stream, value, during })
            }
            Token::Keyword(Keyword::Change) => {
                self.advance();
                let stream = self.expect_ident()?;
                self.expect_keyword(Keyword::By)?;
                let delta = self.parse_expr()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Change { stream, delta, during })
            }
            Token::Keyword(Keyword::Retire) => {
                self.advance();
                let rate = self.parse_expr()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Retire { rate, during })
            }
            Token::Keyword(Keyword::Recharge) => {
                self.advance();
                let population_rate = self.parse_expr()?;
                self.expect_keyword(Keyword::With)?;
                let intensity = self.parse_expr()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Recharge {
                    population_rate,
                    intensity,
                    during,
                })
            }
            Token::Keyword(Keyword::Cap) => {
                self.advance();
                let stream = self.expect_ident()?;
                self.expect_keyword(Keyword::To)?;
                let value = self.parse_expr()?;
                let displacing = self.parse_optional_displacing()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Cap {
                    stream,
                    value,
                    displacing,
                    during,
                })
            }
            Token::Keyword(Keyword::Floor) => {
                self.advance();
                let stream = self.expect_ident()?;
                self.expect_keyword(Keyword::To)?;
                let value = self.parse_expr()?;
                let displacing = self.parse_optional_displacing()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Floor {
                    stream,
                    value,
                    displacing,
                    during,
                })
            }
            Token::Keyword(Keyword::Replace) => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect_keyword(Keyword::Of)?;
                let stream = self.expect_ident()?;
                self.expect_keyword(Keyword::With)?;
                let dest_substance = self.expect_string()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Replace {
                    value,
                    stream,
                    dest_substance,
                    during,
                })
            }
            Token::Keyword(Keyword::Recover) => {
                self.advance();
                let recovery_rate = self.parse_expr()?;
                self.expect_keyword(Keyword::With)?;
                let yield_rate = self.parse_expr()?;
                self.expect_keyword(Keyword::Reuse)?;
                let stage = if self.eat_keyword_if(Keyword::At) {
                    if self.eat_keyword_if(Keyword::Recharge) {
                        RecyclingStage::Recharge
                    } else if self.eat_keyword_if(Keyword::Eol) {
                        RecyclingStage::Eol
                    } else {
                        return Err(self.syntax_error("expected 'recharge' or 'eol'"));
                    }
                } else {
                    RecyclingStage::Recharge
                };
                let displacing = self.parse_optional_displacing()?;
                let during = self.parse_optional_during()?;
                Ok(Command::Recover {
                    recovery_rate,
                    yield_rate,
                    stage,
                    displacing,
                    during,
                })
            }
            other => Err(self.syntax_error(format!("unexpected token starting a command: {other:?}"))),
        }
    }

    fn expect_trade_stream(&mut self) -> Result<TradeStream, ParseError> {
        let name = self.expect_ident()?;
        TradeStream::from_name(&name)
            .ok_or_else(|| self.syntax_error(format!("'{name}' is not domestic|import|export")))
    }

    fn parse_optional_displacing(&mut self) -> Result<Option<DisplaceTarget>, ParseError> {
        if !self.eat_keyword_if(Keyword::Displacing) {
            return Ok(None);
        }
        match self.peek().clone() {
            Token::String(s) => {
                self.advance();
                Ok(Some(DisplaceTarget::Substance(s)))
            }
            Token::Ident(s) => {
                self.advance();
                Ok(Some(DisplaceTarget::Stream(s)))
            }
            other => Err(self.syntax_error(format!("expected a displacement target, found {other:?}"))),
        }
    }

    fn parse_optional_during(&mut self) -> Result<During, ParseError> {
        if !self.at_keyword(Keyword::During) {
            return Ok(During::always());
        }
        self.advance();
        if !(self.eat_keyword_if(Keyword::Year) || self.eat_keyword_if(Keyword::Years)) {
            return Err(self.syntax_error("expected 'year' or 'years'"));
        }
        let start = self.parse_year_ref()?;
        let end = if self.eat_keyword_if(Keyword::To) {
            Some(self.parse_year_ref()?)
        } else {
            None
        };
        Ok(During {
            start: Some(start),
            end,
        })
    }

    fn parse_year_ref(&mut self) -> Result<YearRef, ParseError> {
        match self.peek().clone() {
            Token::Number(s) => {
                self.advance();
                s.parse::<i32>().map(YearRef::Year).map_err(|_| ParseError::Syntax {
                    location: self.location(),
                    token: s,
                    message: "expected a whole-number year".to_string(),
                })
            }
            Token::Keyword(Keyword::Beginning) => {
                self.advance();
                Ok(YearRef::Beginning)
            }
            Token::Keyword(Keyword::Onwards) => {
                self.advance();
                Ok(YearRef::Onwards)
            }
            other => Err(self.syntax_error(format!("expected a year, 'beginning', or 'onwards', found {other:?}"))),
        }
    }

    // ---- expressions --------------------------------------------------
    //
    // Precedence, loosest to tightest: ternary `if/else/endif` > logical
    // (and/or/xor) > comparison > additive > multiplicative > power >
    // unary > primary (spec §4.3).

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let value = self.parse_logical()?;
        if self.eat_keyword_if(Keyword::If) {
            let condition = Box::new(self.parse_logical()?);
            self.expect_keyword(Keyword::Else)?;
            let if_false = Box::new(self.parse_logical()?);
            self.expect_keyword(Keyword::Endif)?;
            Ok(Expr::Conditional {
                condition,
                if_true: Box::new(value),
                if_false,
            })
        } else {
            Ok(value)
        }
    }

    fn parse_logical(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::Keyword(Keyword::And) => LogicalOp::And,
                Token::Keyword(Keyword::Or) => LogicalOp::Or,
                Token::Keyword(Keyword::Xor) => LogicalOp::Xor,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Logical {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::Symbol(Symbol::Lt) => CompareOp::Lt,
            Token::Symbol(Symbol::Lte) => CompareOp::Lte,
            Token::Symbol(Symbol::Gt) => CompareOp::Gt,
            Token::Symbol(Symbol::Gte) => CompareOp::Gte,
            Token::Symbol(Symbol::Eq) => CompareOp::Eq,
            Token::Symbol(Symbol::Neq) => CompareOp::Neq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Symbol(Symbol::Plus) => BinOp::Add,
                Token::Symbol(Symbol::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Token::Symbol(Symbol::Star) => BinOp::Mul,
                Token::Symbol(Symbol::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_unary()?;
        if self.eat_symbol_if(Symbol::Caret) {
            let exponent = self.parse_power()?;
            Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            })
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_symbol_if(Symbol::Minus) {
            let operand = self.parse_unary()?;
            Ok(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Literal(Quantity::zero(Unit::Units))),
                rhs: Box::new(operand),
            })
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(raw) => {
                self.advance();
                let value = BigDecimal::from_str(&raw).map_err(|_| ParseError::Syntax {
                    location: self.location(),
                    token: raw.clone(),
                    message: "invalid numeric literal".to_string(),
                })?;
                let unit = self.parse_unit_suffix()?.unwrap_or(Unit::Units);
                Ok(Expr::Literal(Quantity::with_literal(value, unit, raw)))
            }
            Token::Symbol(Symbol::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(inner)
            }
            Token::Keyword(Keyword::Get) => {
                self.advance();
                let stream = self.expect_ident()?;
                let of_substance = if self.eat_keyword_if(Keyword::Of) {
                    Some(self.expect_string()?)
                } else {
                    None
                };
                let as_unit = if self.eat_keyword_if(Keyword::As) {
                    Some(self.parse_unit_suffix()?.ok_or_else(|| self.syntax_error("expected a unit after 'as'"))?)
                } else {
                    None
                };
                Ok(Expr::StreamRead {
                    stream,
                    of_substance,
                    as_unit,
                })
            }
            Token::Keyword(Keyword::Limit) => {
                self.advance();
                let value = Box::new(self.parse_expr()?);
                self.expect_keyword(Keyword::To)?;
                self.expect_symbol(Symbol::LBracket)?;
                let min = if self.eat_symbol_if(Symbol::Comma) {
                    None
                } else {
                    let m = Some(Box::new(self.parse_expr()?));
                    self.expect_symbol(Symbol::Comma)?;
                    m
                };
                let max = if matches!(self.peek(), Token::Symbol(Symbol::RBracket)) {
                    None
                } else {
                    Some(Box::new(self.parse_expr()?))
                };
                self.expect_symbol(Symbol::RBracket)?;
                Ok(Expr::Limit { value, min, max })
            }
            Token::Keyword(Keyword::Sample) => {
                self.advance();
                if self.eat_keyword_if(Keyword::Normally) {
                    self.expect_keyword(Keyword::From)?;
                    self.expect_keyword(Keyword::Mean)?;
                    let mean = Box::new(self.parse_additive()?);
                    self.expect_keyword(Keyword::Std)?;
                    let std = Box::new(self.parse_additive()?);
                    let unit = self.parse_unit_suffix()?;
                    Ok(Expr::SampleNormal {
                        mean: attach_unit(mean, unit),
                        std,
                    })
                } else if self.eat_keyword_if(Keyword::Uniformly) {
                    self.expect_keyword(Keyword::From)?;
                    let low = Box::new(self.parse_additive()?);
                    self.expect_keyword(Keyword::To)?;
                    let high = Box::new(self.parse_additive()?);
                    let unit = self.parse_unit_suffix()?;
                    Ok(Expr::SampleUniform {
                        low,
                        high: attach_unit(high, unit),
                    })
                } else {
                    Err(self.syntax_error("expected 'normally' or 'uniformly'"))
                }
            }
            Token::Ident(name) => {
                self.advance();
                match ProtectedVar::from_name(&name) {
                    Some(p) => Ok(Expr::Protected(p)),
                    None => Ok(Expr::Var(name)),
                }
            }
            other => Err(self.syntax_error(format!("unexpected token in expression: {other:?}"))),
        }
    }

    /// Parses a unit suffix (`kg`, `%`, `kg/unit`, `units/year`, ...)
    /// immediately following a number, if present.
    fn parse_unit_suffix(&mut self) -> Result<Option<Unit>, ParseError> {
        let mut text = match self.peek().clone() {
            Token::Symbol(Symbol::Percent) => {
                self.advance();
                "%".to_string()
            }
            Token::Ident(word) => {
                self.advance();
                word
            }
            Token::Keyword(Keyword::Year) => {
                self.advance();
                "year".to_string()
            }
            Token::Keyword(Keyword::Years) => {
                self.advance();
                "years".to_string()
            }
            _ => return Ok(None),
        };
        if self.eat_symbol_if(Symbol::Slash) {
            let suffix = match self.peek().clone() {
                Token::Ident(word) => {
                    self.advance();
                    word
                }
                Token::Keyword(Keyword::Year) => {
                    self.advance();
                    "year".to_string()
                }
                Token::Keyword(Keyword::Years) => {
                    self.advance();
                    "years".to_string()
                }
                other => {
                    return Err(self.syntax_error(format!("expected a unit after '/', found {other:?}")));
                }
            };
            text.push('/');
            text.push_str(&suffix);
        }
        Unit::from_str(&text)
            .map(Some)
            .map_err(|_| self.syntax_error(format!("unrecognised unit '{text}'")))
    }
}

/// Rewrites a parsed bound's literal quantity to carry a trailing unit
/// that applied to the whole sample clause (e.g. `sample uniformly from
/// 1 to 2 kg / unit`), when that bound is itself a bare literal.
fn attach_unit(expr: Box<Expr>, unit: Option<Unit>) -> Box<Expr> {
    match (unit, *expr) {
        (Some(u), Expr::Literal(q)) => Box::new(Expr::Literal(Quantity::new(q.value, u))),
        (_, other) => Box::new(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_default_stanza() {
        let src = r#"
            start default
              define application "Dom Refrig"
                uses substance "HFC-134a"
                  enable domestic
                  initial charge with 1 kg / unit for domestic
                  set domestic to 1000 units during year 1 to 1
                end substance
              end application
            end default
        "#;
        let program = parse(src).unwrap();
        assert_eq!(program.default_stanza.len(), 1);
        assert_eq!(program.default_stanza[0].substances.len(), 1);
        assert_eq!(program.default_stanza[0].substances[0].commands.len(), 3);
    }

    #[test]
    fn parses_simulations_stanza_with_trials() {
        let src = r#"
            start simulations
              simulate "BAU" from years 2020 to 2030 across 100 trials
              simulate "Permit" using "Cap" then "Recycle" from years 2020 to onwards
            end simulations
        "#;
        let program = parse(src).unwrap();
        assert_eq!(program.simulations.len(), 2);
        assert_eq!(program.simulations[0].trials, Some(100));
        assert_eq!(program.simulations[1].policies, vec!["Cap", "Recycle"]);
        assert_eq!(program.simulations[1].end_year, YearRef::Onwards);
    }

    #[test]
    fn parses_cap_with_displacement_and_during() {
        let src = r#"
            start policy "Cap"
              modify application "Dom Refrig"
                modify substance "HFC-134a"
                  cap sales to 80 % displacing "R-600a" during year 3 to 10
                end substance
              end application
            end policy
        "#;
        let program = parse(src).unwrap();
        let cmd = &program.policies[0].applications[0].substances[0].commands[0];
        match cmd {
            Command::Cap { displacing, during, .. } => {
                assert_eq!(*displacing, Some(DisplaceTarget::Substance("R-600a".to_string())));
                assert_eq!(during.start, Some(YearRef::Year(3)));
                assert_eq!(during.end, Some(YearRef::Year(10)));
            }
            other => panic!("expected Cap, got {other:?}"),
        }
    }

    #[test]
    fn parses_conditional_expression() {
        let src = r#"
            start default
              define application "A"
                uses substance "S"
                  retire 5 % if yearAbsolute > 2025 else 0 % endif
                end substance
              end application
            end default
        "#;
        let program = parse(src).unwrap();
        let cmd = &program.default_stanza[0].substances[0].commands[0];
        assert!(matches!(cmd, Command::Retire { rate: Expr::Conditional { .. }, .. }));
    }
}
