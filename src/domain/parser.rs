//! Expression parser for cell formulas.
//!
//! A hand-written lexer feeds a recursive descent parser that builds an
//! [`Expr`] tree. Parsing stops at the first error, which carries the
//! character offset of the offending token.
//!
//! # Grammar
//!
//! ```bnf
//! Expression     ::= Additive
//! Additive       ::= ModDiv ( ( "+" | "-" ) ModDiv )*
//! ModDiv         ::= Multiplicative ( ( "mod" | "%" | "div" ) Multiplicative )*
//! Multiplicative ::= Power ( ( "*" | "/" ) Power )*
//! Power          ::= IncDec ( "^" Power )?
//! IncDec         ::= ( "++" | "--" | "inc" | "dec" ) IncDec
//!                  | Unary ( "++" | "--" | "inc" | "dec" )*
//! Unary          ::= ( "+" | "-" ) Unary | Primary
//! Primary        ::= Number | CellName | Function "(" ArgumentList? ")" | "(" Expression ")"
//! Function       ::= "mmin" | "mmax"
//! ArgumentList   ::= Expression ( "," Expression )*
//! CellName       ::= [A-Z]+ [0-9]+
//! Number         ::= [0-9]+ ( "." [0-9]* )?
//! ```
//!
//! Keywords and cell names are case-insensitive; cell names are normalized
//! to upper case. `^` is right-associative, every other binary operator is
//! left-associative.

use std::fmt;

use super::errors::{EvalError, EvalResult};

/// Represents a token in the expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    CellName(String),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
    Percent,
    Increment,
    Decrement,

    // Keywords
    Mod,
    Div,
    MMin,
    MMax,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::CellName(name) => f.write_str(name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Multiply => f.write_str("*"),
            Token::Divide => f.write_str("/"),
            Token::Power => f.write_str("^"),
            Token::Percent => f.write_str("%"),
            Token::Increment => f.write_str("++"),
            Token::Decrement => f.write_str("--"),
            Token::Mod => f.write_str("mod"),
            Token::Div => f.write_str("div"),
            Token::MMin => f.write_str("mmin"),
            Token::MMax => f.write_str("mmax"),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Eof => f.write_str("end of expression"),
        }
    }
}

/// Abstract syntax tree of a formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    CellRef(String),

    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    /// `++x`, `x--` and friends: the operand's value plus or minus one.
    IncDec {
        operator: IncDecOp,
        operand: Box<Expr>,
    },

    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Height of the tree; a lone number or reference is 1.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Number(_) | Expr::CellRef(_) => 1,
            Expr::Unary { operand, .. } | Expr::IncDec { operand, .. } => 1 + operand.depth(),
            Expr::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),
            Expr::Call { args, .. } => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Floating-point remainder (`mod` or `%`).
    Mod,
    /// Integer division of both operands truncated to `i32`.
    Div,
    Power,
}

/// Variadic built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    MMin,
    MMax,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::MMin => f.write_str("mmin"),
            Function::MMax => f.write_str("mmax"),
        }
    }
}

/// Lexical analyzer for tokenizing expressions.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    token_start: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
            token_start: 0,
        }
    }

    /// Character offset where the most recently returned token begins.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> EvalResult<f64> {
        let mut number_str = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current_char == Some('.') {
            number_str.push('.');
            self.advance();

            while let Some(ch) = self.current_char {
                if ch.is_ascii_digit() {
                    number_str.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        number_str
            .parse::<f64>()
            .map_err(|_| EvalError::syntax(format!("Invalid number '{}'", number_str), self.token_start))
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() {
                word.push(ch.to_ascii_uppercase());
                self.advance();
            } else {
                break;
            }
        }

        word
    }

    /// Keywords win over cell names; anything else must look like `A1`.
    fn classify_word(&self, word: String) -> EvalResult<Token> {
        let token = match word.as_str() {
            "MOD" => Token::Mod,
            "DIV" => Token::Div,
            "INC" => Token::Increment,
            "DEC" => Token::Decrement,
            "MMIN" => Token::MMin,
            "MMAX" => Token::MMax,
            _ if is_cell_name(&word) => Token::CellName(word.clone()),
            _ => {
                return Err(EvalError::syntax(
                    format!("Unknown identifier '{}'", word),
                    self.token_start,
                ));
            }
        };
        Ok(token)
    }

    pub fn next_token(&mut self) -> EvalResult<Token> {
        self.skip_whitespace();
        self.token_start = self.position;

        let Some(ch) = self.current_char else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '0'..='9' => Token::Number(self.read_number()?),
            'A'..='Z' | 'a'..='z' => {
                let word = self.read_word();
                self.classify_word(word)?
            }
            '+' if self.peek() == Some('+') => {
                self.advance();
                self.advance();
                Token::Increment
            }
            '-' if self.peek() == Some('-') => {
                self.advance();
                self.advance();
                Token::Decrement
            }
            _ => {
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Multiply,
                    '/' => Token::Divide,
                    '^' => Token::Power,
                    '%' => Token::Percent,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    ',' => Token::Comma,
                    _ => {
                        return Err(EvalError::syntax(
                            format!("Unexpected character '{}'", ch),
                            self.token_start,
                        ));
                    }
                };
                self.advance();
                token
            }
        };

        Ok(token)
    }
}

/// Letters followed by digits, nothing else.
fn is_cell_name(word: &str) -> bool {
    let letters = word.chars().take_while(|ch| ch.is_ascii_alphabetic()).count();
    letters > 0 && letters < word.len() && word[letters..].chars().all(|ch| ch.is_ascii_digit())
}

/// Recursive descent parser producing an [`Expr`].
///
/// # Examples
///
/// ```
/// use gridcalc::domain::parser::{BinaryOp, Expr, Parser};
///
/// let expr = Parser::new("a1 + 2").unwrap().parse().unwrap();
/// assert_eq!(
///     expr,
///     Expr::Binary {
///         left: Box::new(Expr::CellRef("A1".to_string())),
///         operator: BinaryOp::Add,
///         right: Box::new(Expr::Number(2.0)),
///     }
/// );
/// ```
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_position: usize,
    depth: usize,
    operators: usize,
}

/// Deepest allowed nesting of parentheses, calls, prefix operators and `^`
/// right operands.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Most operator and call nodes one expression may contain. This also bounds
/// the height of the tree.
pub const MAX_OPERATORS: usize = 1024;

impl Parser {
    pub fn new(input: &str) -> EvalResult<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        let current_position = lexer.token_start();

        Ok(Self {
            lexer,
            current_token,
            current_position,
            depth: 0,
            operators: 0,
        })
    }

    fn advance(&mut self) -> EvalResult<()> {
        self.current_token = self.lexer.next_token()?;
        self.current_position = self.lexer.token_start();
        Ok(())
    }

    fn unexpected(&self) -> EvalError {
        let message = match self.current_token {
            Token::Eof => "Unexpected end of expression".to_string(),
            ref token => format!("Unexpected token '{}'", token),
        };
        EvalError::syntax(message, self.current_position)
    }

    fn expect(&mut self, expected: Token) -> EvalResult<()> {
        if self.current_token == expected {
            self.advance()
        } else {
            Err(EvalError::syntax(
                format!("Expected '{}', found '{}'", expected, self.current_token),
                self.current_position,
            ))
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(EvalError::syntax(
                "Expression nested too deeply",
                self.current_position,
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn count_operator(&mut self) -> EvalResult<()> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(EvalError::syntax(
                "Expression has too many operators",
                self.current_position,
            ));
        }
        Ok(())
    }

    /// Parses the whole input as one expression.
    pub fn parse(&mut self) -> EvalResult<Expr> {
        let expr = self.parse_additive()?;

        if self.current_token != Token::Eof {
            return Err(self.unexpected());
        }

        Ok(expr)
    }

    fn parse_additive(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_mod_div()?;

        loop {
            let operator = match self.current_token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.count_operator()?;
            self.advance()?;
            let right = self.parse_mod_div()?;
            left = binary(left, operator, right);
        }

        Ok(left)
    }

    fn parse_mod_div(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match self.current_token {
                Token::Mod | Token::Percent => BinaryOp::Mod,
                Token::Div => BinaryOp::Div,
                _ => break,
            };
            self.count_operator()?;
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = binary(left, operator, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_power()?;

        loop {
            let operator = match self.current_token {
                Token::Multiply => BinaryOp::Multiply,
                Token::Divide => BinaryOp::Divide,
                _ => break,
            };
            self.count_operator()?;
            self.advance()?;
            let right = self.parse_power()?;
            left = binary(left, operator, right);
        }

        Ok(left)
    }

    /// Right-associative: `2 ^ 3 ^ 2` is `2 ^ (3 ^ 2)`.
    fn parse_power(&mut self) -> EvalResult<Expr> {
        let left = self.parse_inc_dec()?;

        if self.current_token == Token::Power {
            self.count_operator()?;
            self.advance()?;
            let right = self.nested(Self::parse_power)?;
            Ok(binary(left, BinaryOp::Power, right))
        } else {
            Ok(left)
        }
    }

    fn parse_inc_dec(&mut self) -> EvalResult<Expr> {
        if let Some(operator) = self.inc_dec_operator() {
            self.count_operator()?;
            self.advance()?;
            let operand = self.nested(Self::parse_inc_dec)?;
            return Ok(Expr::IncDec {
                operator,
                operand: Box::new(operand),
            });
        }

        let mut expr = self.parse_unary()?;
        while let Some(operator) = self.inc_dec_operator() {
            self.count_operator()?;
            self.advance()?;
            expr = Expr::IncDec {
                operator,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn inc_dec_operator(&self) -> Option<IncDecOp> {
        match self.current_token {
            Token::Increment => Some(IncDecOp::Increment),
            Token::Decrement => Some(IncDecOp::Decrement),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        let operator = match self.current_token {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            _ => return self.parse_primary(),
        };
        self.count_operator()?;
        self.advance()?;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        match self.current_token {
            Token::Number(value) => {
                self.advance()?;
                Ok(Expr::Number(value))
            }

            Token::CellName(ref name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Expr::CellRef(name))
            }

            Token::MMin | Token::MMax => {
                let function = if self.current_token == Token::MMin {
                    Function::MMin
                } else {
                    Function::MMax
                };
                self.count_operator()?;
                self.advance()?;
                self.expect(Token::LeftParen)?;
                let args = self.nested(Self::parse_argument_list)?;
                self.expect(Token::RightParen)?;
                Ok(Expr::Call { function, args })
            }

            Token::LeftParen => {
                self.advance()?;
                let expr = self.nested(Self::parse_additive)?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            _ => Err(self.unexpected()),
        }
    }

    /// An empty list is accepted here and rejected by the evaluator.
    fn parse_argument_list(&mut self) -> EvalResult<Vec<Expr>> {
        let mut args = Vec::new();

        if self.current_token == Token::RightParen {
            return Ok(args);
        }

        args.push(self.parse_additive()?);

        while self.current_token == Token::Comma {
            self.advance()?;
            args.push(self.parse_additive()?);
        }

        Ok(args)
    }
}

fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    }
}

/// Parses a formula body (without the leading `=`).
pub fn parse_expression(input: &str) -> EvalResult<Expr> {
    Parser::new(input)?.parse()
}
