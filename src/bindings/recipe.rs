//! Recipe parser.
//!
//! Grammar:
//!
//! ```text
//! recipe := ['compose'] [type '->'] call (('.' | ';') call)* ['->' type] [';']
//! call   := IDENT '(' [arg (',' arg)*] ')'
//! arg    := INTEGER | FLOAT | STRING | 'true' | 'false' | call
//! ```

use super::lexer::{tokenize, Token};
use super::types::ValueType;
use crate::error::{BindingError, BindingResult};
use std::fmt;
use std::ops::Range;

/// Parsed form of a binding recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingRecipe {
    pub source: String,
    pub input_type: Option<ValueType>,
    pub calls: Vec<FunctionCall>,
    pub output_type: Option<ValueType>,
}

/// One mapper invocation, e.g. `HashRange(0, 100)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<RecipeArg>,
    /// Byte offset of the name in the recipe source.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecipeArg {
    Long(i64),
    Double(f64),
    Text(String),
    Bool(bool),
    Call(FunctionCall),
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match arg {
                RecipeArg::Long(v) => write!(f, "{v}")?,
                RecipeArg::Double(v) => write!(f, "{v:?}")?,
                RecipeArg::Text(v) => write!(f, "'{v}'")?,
                RecipeArg::Bool(v) => write!(f, "{v}")?,
                RecipeArg::Call(call) => write!(f, "{call}")?,
            }
        }
        write!(f, ")")
    }
}

impl BindingRecipe {
    pub fn parse(source: &str) -> BindingResult<Self> {
        let tokens = tokenize(source).map_err(|position| {
            BindingError::syntax(source, position, "unrecognized input")
        })?;
        if tokens.is_empty() {
            return Err(BindingError::syntax(source, 0, "empty recipe"));
        }
        let mut stream = TokenStream {
            source,
            tokens,
            pos: 0,
        };
        stream.parse_recipe()
    }

    /// Chain rendered back to canonical text, without type annotations.
    pub fn chain(&self) -> String {
        self.calls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

struct TokenStream<'a> {
    source: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl TokenStream<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> BindingError {
        BindingError::syntax(self.source, self.offset(), message)
    }

    fn expect(&mut self, expected: Token) -> BindingResult<()> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(self.error(format!("expected '{expected}', found '{token}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of recipe"))),
        }
    }

    fn parse_recipe(&mut self) -> BindingResult<BindingRecipe> {
        if self.peek() == Some(&Token::Compose) {
            self.pos += 1;
        }

        let input_type = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(_)), Some(Token::Arrow)) => {
                let ty = self.parse_type()?;
                self.expect(Token::Arrow)?;
                Some(ty)
            }
            _ => None,
        };

        let mut calls = vec![self.parse_call()?];
        let mut output_type = None;

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    calls.push(self.parse_call()?);
                }
                Some(Token::Semicolon) => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        break;
                    }
                    calls.push(self.parse_call()?);
                }
                Some(Token::Arrow) => {
                    self.pos += 1;
                    output_type = Some(self.parse_type()?);
                    if self.peek() == Some(&Token::Semicolon) {
                        self.pos += 1;
                    }
                    break;
                }
                None => break,
                Some(token) => {
                    return Err(self.error(format!("unexpected '{token}' after function call")))
                }
            }
        }

        if let Some(token) = self.peek() {
            return Err(self.error(format!("unexpected trailing '{token}'")));
        }

        Ok(BindingRecipe {
            source: self.source.to_string(),
            input_type,
            calls,
            output_type,
        })
    }

    fn parse_type(&mut self) -> BindingResult<ValueType> {
        let at = self.offset();
        match self.advance() {
            Some(Token::Ident(name)) => name
                .parse::<ValueType>()
                .map_err(|reason| BindingError::syntax(self.source, at, reason)),
            Some(token) => Err(BindingError::syntax(
                self.source,
                at,
                format!("expected a type name, found '{token}'"),
            )),
            None => Err(BindingError::syntax(
                self.source,
                at,
                "expected a type name, found end of recipe",
            )),
        }
    }

    fn parse_call(&mut self) -> BindingResult<FunctionCall> {
        let position = self.offset();
        let name = match self.advance() {
            Some(Token::Ident(name)) => name,
            Some(token) => {
                return Err(BindingError::syntax(
                    self.source,
                    position,
                    format!("expected a function name, found '{token}'"),
                ))
            }
            None => {
                return Err(BindingError::syntax(
                    self.source,
                    position,
                    "expected a function name, found end of recipe",
                ))
            }
        };

        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_arg()?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        Ok(FunctionCall {
            name,
            args,
            position,
        })
    }

    fn parse_arg(&mut self) -> BindingResult<RecipeArg> {
        match self.peek() {
            Some(Token::Ident(_)) => Ok(RecipeArg::Call(self.parse_call()?)),
            Some(Token::Integer(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(RecipeArg::Long(v))
            }
            Some(Token::Float(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(RecipeArg::Double(v))
            }
            Some(Token::Bool(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(RecipeArg::Bool(v))
            }
            Some(Token::Str(_)) => match self.advance() {
                Some(Token::Str(s)) => Ok(RecipeArg::Text(s)),
                _ => Err(self.error("expected a string literal")),
            },
            Some(token) => Err(self.error(format!("expected an argument, found '{token}'"))),
            None => Err(self.error("expected an argument, found end of recipe")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_simple_chain() {
        let recipe = BindingRecipe::parse("Add(5).Mod(3)").unwrap();
        assert_eq!(recipe.calls.len(), 2);
        assert_eq!(recipe.calls[0].name, "Add");
        assert_eq!(recipe.calls[0].args, vec![RecipeArg::Long(5)]);
        assert_eq!(recipe.chain(), "Add(5).Mod(3)");
        assert_eq!(recipe.input_type, None);
    }

    #[test]
    fn test_typed_compose_form() {
        let recipe =
            BindingRecipe::parse("compose long -> HashRange(0,9); ToString() -> String;").unwrap();
        assert_eq!(recipe.input_type, Some(ValueType::Long));
        assert_eq!(recipe.output_type, Some(ValueType::Text));
        assert_eq!(recipe.calls.len(), 2);
    }

    #[test]
    fn test_nested_call_arguments() {
        let recipe = BindingRecipe::parse("Template('{}-{}', Identity(), Mod(3))").unwrap();
        let call = &recipe.calls[0];
        assert_eq!(call.args.len(), 3);
        assert!(matches!(&call.args[1], RecipeArg::Call(inner) if inner.name == "Identity"));
    }

    #[test]
    fn test_syntax_errors_report_position() {
        let err = BindingRecipe::parse("Add(5").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingSyntax);
        match err {
            BindingError::Syntax { position, .. } => assert_eq!(position, 5),
            other => panic!("unexpected error {other:?}"),
        }

        assert!(BindingRecipe::parse("").is_err());
        assert!(BindingRecipe::parse("Add(1) Mod(2)").is_err());
        assert!(BindingRecipe::parse("long -> Add(1) -> nonsense").is_err());
    }

    #[test]
    fn test_dot_must_be_followed_by_call() {
        let err = BindingRecipe::parse("Add(1).").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingSyntax);
        match err {
            BindingError::Syntax { position, .. } => assert_eq!(position, 7),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(BindingRecipe::parse("Add(1).-> long").is_err());

        let composed = BindingRecipe::parse("compose Add(1); Mod(3);").unwrap();
        assert_eq!(composed.calls.len(), 2);
    }
}
