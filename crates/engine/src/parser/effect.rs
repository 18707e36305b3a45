//! Effects (`<path> <op> <formula>`) and their arithmetic formulas.
//!
//! Formulas are integer arithmetic over literals, attribute paths, `source`
//! (the owning entity's source level) and `level`, with `+ - * /`,
//! parentheses and `min(a, b)` / `max(a, b)`. Division floors.

use super::split::{find_top_level, unquote};
use super::ParseError;

/// How an effect combines into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `^=` raise to at least
    AtLeast,
    /// `v=` lower to at most
    AtMost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Int(i64),
    Path(String),
    Source,
    Neg(Box<Formula>),
    Binary {
        op: FormulaOp,
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
}

impl Formula {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty("formula"));
        }
        let mut parser = FormulaParser {
            tokens: &tokens,
            pos: 0,
            text: input,
        };
        let formula = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(ParseError::malformed("formula", input));
        }
        Ok(formula)
    }

    /// Attribute paths referenced by the formula.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Path(path) => out.push(path),
            Self::Neg(inner) => inner.collect_paths(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_paths(out);
                rhs.collect_paths(out);
            }
            Self::Int(_) | Self::Source => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub target: String,
    pub op: EffectOp,
    pub formula: Formula,
}

impl Effect {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ParseError::Empty("effect"));
        }
        let eq = find_top_level(text, "=")?.ok_or_else(|| ParseError::MissingEquals(text.into()))?;

        let before = &text[..eq];
        let (target, op) = match before.chars().last() {
            Some('+') => (&before[..before.len() - 1], EffectOp::Add),
            Some('-') => (&before[..before.len() - 1], EffectOp::Sub),
            Some('*') => (&before[..before.len() - 1], EffectOp::Mul),
            Some('^') => (&before[..before.len() - 1], EffectOp::AtLeast),
            Some('v') if before.len() >= 2 && before[..before.len() - 1].ends_with(' ') => {
                (&before[..before.len() - 1], EffectOp::AtMost)
            }
            _ => (before, EffectOp::Set),
        };

        let target = unquote(target).trim();
        if target.is_empty() || (target.contains(char::is_whitespace) && !target.contains('.')) {
            return Err(ParseError::malformed("effect target", text));
        }

        Ok(Self {
            target: target.to_string(),
            op,
            formula: Formula::parse(&text[eq + 1..])?,
        })
    }
}

// =============================================================================
// Tokenizer + recursive descent
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => push(&mut tokens, &mut i, Token::Plus),
            '-' => push(&mut tokens, &mut i, Token::Minus),
            '*' => push(&mut tokens, &mut i, Token::Star),
            '/' => push(&mut tokens, &mut i, Token::Slash),
            '(' => push(&mut tokens, &mut i, Token::LParen),
            ')' => push(&mut tokens, &mut i, Token::RParen),
            ',' => push(&mut tokens, &mut i, Token::Comma),
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| ParseError::UnbalancedDelimiter(input.to_string()))?;
                tokens.push(Token::Ident(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits
                    .parse()
                    .map_err(|_| ParseError::malformed("number", digits.clone()))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                let word = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.');
                while i < chars.len() && word(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(ParseError::malformed("formula", input)),
        }
    }
    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, i: &mut usize, token: Token) {
    tokens.push(token);
    *i += 1;
}

struct FormulaParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    text: &'a str,
}

impl FormulaParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.next() == Some(&expected) {
            Ok(())
        } else {
            Err(self.malformed())
        }
    }

    fn malformed(&self) -> ParseError {
        if self.tokens.iter().filter(|t| **t == Token::LParen).count()
            != self.tokens.iter().filter(|t| **t == Token::RParen).count()
        {
            return ParseError::UnbalancedDelimiter(self.text.to_string());
        }
        ParseError::malformed("formula", self.text)
    }

    fn expr(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => FormulaOp::Add,
                Some(Token::Minus) => FormulaOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => FormulaOp::Mul,
                Some(Token::Slash) => FormulaOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Formula, ParseError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(match self.unary()? {
                Formula::Int(n) => Formula::Int(-n),
                other => Formula::Neg(Box::new(other)),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Formula, ParseError> {
        match self.next().cloned() {
            Some(Token::Num(n)) => Ok(Formula::Int(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                let call = match name.as_str() {
                    "min" => Some(FormulaOp::Min),
                    "max" => Some(FormulaOp::Max),
                    _ => None,
                };
                match call {
                    Some(op) if self.peek() == Some(&Token::LParen) => {
                        self.pos += 1;
                        let a = self.expr()?;
                        self.expect(Token::Comma)?;
                        let b = self.expr()?;
                        self.expect(Token::RParen)?;
                        Ok(binary(op, a, b))
                    }
                    _ if name == "source" => Ok(Formula::Source),
                    _ => Ok(Formula::Path(name)),
                }
            }
            _ => Err(self.malformed()),
        }
    }
}

fn binary(op: FormulaOp, lhs: Formula, rhs: Formula) -> Formula {
    Formula::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(name: &str) -> Formula {
        Formula::Path(name.to_string())
    }

    #[test]
    fn precedence_and_grouping() {
        let formula = Formula::parse("2 + level * 3").expect("parses");
        assert_eq!(
            formula,
            binary(
                FormulaOp::Add,
                Formula::Int(2),
                binary(FormulaOp::Mul, path("level"), Formula::Int(3))
            )
        );

        let formula = Formula::parse("(2 + level) / 2").expect("parses");
        assert_eq!(
            formula,
            binary(
                FormulaOp::Div,
                binary(FormulaOp::Add, Formula::Int(2), path("level")),
                Formula::Int(2)
            )
        );
    }

    #[test]
    fn calls_source_and_quoted_paths() {
        let formula =
            Formula::parse("max(source, 'skillModifiers.Lore Warfare') - -1").expect("parses");
        assert_eq!(
            formula,
            binary(
                FormulaOp::Sub,
                binary(FormulaOp::Max, Formula::Source, path("skillModifiers.Lore Warfare")),
                Formula::Int(-1)
            )
        );
        assert_eq!(formula.paths(), vec!["skillModifiers.Lore Warfare"]);
    }

    #[test]
    fn effect_operators() {
        let cases = [
            ("hitPoints += level", EffectOp::Add),
            ("speed -= 5", EffectOp::Sub),
            ("hitPoints *= 2", EffectOp::Mul),
            ("armorClass ^= 10", EffectOp::AtLeast),
            ("armorDexCap v= 3", EffectOp::AtMost),
            ("speed = 25", EffectOp::Set),
        ];
        for (text, op) in cases {
            let effect = Effect::parse(text).expect("parses");
            assert_eq!(effect.op, op, "{}", text);
        }
        assert_eq!(Effect::parse("speed += 5").expect("parses").target, "speed");
    }

    #[test]
    fn errors() {
        assert_eq!(Formula::parse(" "), Err(ParseError::Empty("formula")));
        assert!(matches!(
            Formula::parse("(1 + 2"),
            Err(ParseError::UnbalancedDelimiter(_))
        ));
        assert!(matches!(
            Formula::parse("1 + + "),
            Err(ParseError::Malformed { .. })
        ));
        assert!(matches!(
            Formula::parse("min(1)"),
            Err(ParseError::Malformed { .. })
        ));
        assert!(matches!(
            Effect::parse("speed 25"),
            Err(ParseError::MissingEquals(_))
        ));
    }
}
