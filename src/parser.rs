use std::cell::RefCell;

use crate::{
    ast::{ConditionalBranch, Expression, InfixOperator, Literal, Program, Statement, UnaryOperator},
    tokenizer::{Token, TokenKind, TokenType, TokenizeError, Tokenizer},
};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Lexical error: {0}")]
    Tokenize(#[from] TokenizeError),
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParseErrorWithContext),
}

#[derive(Debug)]
pub struct ParseErrorWithContext {
    pub error: SyntaxError,
    pub context: Vec<&'static str>,
    pub token: Token,
}

impl std::error::Error for ParseErrorWithContext {}

impl std::fmt::Display for ParseErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "While parsing {}", self.context.join(" > "))?;
        write!(
            f,
            "{} at {} but found \"{}\"",
            self.error, self.token.span, self.token.token_type
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error("Expected one of {0:?}")]
    ExpectedOneOf(Vec<TokenType>),
    #[error("Unexpected \"{0}\"")]
    Unexpected(TokenType),
    #[error("Expected a variable name")]
    ExpectedIdentifier,
    #[error("Only a plain variable name can be assigned to")]
    InvalidAssignmentTarget,
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, error: SyntaxError, token: &Token) -> ParseError {
        ParseError::Syntax(ParseErrorWithContext {
            error,
            context: self.stack.borrow().clone(),
            token: token.clone(),
        })
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

/// The current token plus the tokenizer it was pulled from.
struct TokenCursor<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
}

impl<'a> TokenCursor<'a> {
    fn new(mut tokenizer: Tokenizer<'a>) -> Result<Self, TokenizeError> {
        let current = tokenizer.next_token()?;
        Ok(Self { tokenizer, current })
    }

    fn current(&self) -> &TokenType {
        &self.current.token_type
    }

    fn kind(&self) -> TokenKind {
        self.current.kind()
    }

    fn advance(&mut self) -> Result<Token, TokenizeError> {
        let next = self.tokenizer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn peek_kind(&mut self) -> Result<TokenKind, TokenizeError> {
        Ok(self.tokenizer.peek_token()?.kind())
    }
}

/// Parses a whole program. The first error aborts the parse.
pub fn program(tokenizer: Tokenizer<'_>) -> Result<Program, ParseError> {
    let context = ParseContext::new();
    let _guard = context.push("program");
    let mut tokens = TokenCursor::new(tokenizer)?;
    let mut statements = Vec::new();

    while tokens.kind() != TokenKind::Eof {
        statements.push(statement(&context, &mut tokens)?);
    }

    Ok(Program(statements))
}

pub fn parse(source: &str) -> Result<Program, ParseError> {
    program(Tokenizer::new(source))
}

fn statement(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Statement, ParseError> {
    let _guard = context.push("statement");
    match tokens.kind() {
        TokenKind::Make => make_statement(context, tokens),
        TokenKind::Del => del_statement(context, tokens),
        TokenKind::Print => print_statement(context, tokens),
        TokenKind::If => if_statement(context, tokens),
        TokenKind::While => while_statement(context, tokens),
        TokenKind::Break => {
            tokens.advance()?;
            Ok(Statement::Break)
        }
        TokenKind::Continue => {
            tokens.advance()?;
            Ok(Statement::Continue)
        }
        TokenKind::Variable if tokens.peek_kind()? == TokenKind::Equal => {
            assignment(context, tokens)
        }
        _ => expression_statement(context, tokens),
    }
}

fn make_statement(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Statement, ParseError> {
    let _guard = context.push("make_statement");
    tokens.advance()?;
    let name = match_identifier(context, tokens)?;
    consume(context, tokens, TokenType::Equal)?;
    let expr = expression(context, tokens)?;
    Ok(Statement::Make(name, expr))
}

fn assignment(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Statement, ParseError> {
    let _guard = context.push("assignment");
    let name = match_identifier(context, tokens)?;
    consume(context, tokens, TokenType::Equal)?;
    let expr = expression(context, tokens)?;
    Ok(Statement::Assign(name, expr))
}

fn del_statement(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Statement, ParseError> {
    let _guard = context.push("del_statement");
    tokens.advance()?;
    let name = match_identifier(context, tokens)?;
    Ok(Statement::Delete(name))
}

fn print_statement(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Statement, ParseError> {
    let _guard = context.push("print_statement");
    tokens.advance()?;
    let expr = expression(context, tokens)?;
    Ok(Statement::Print(expr))
}

fn if_statement(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Statement, ParseError> {
    let _guard = context.push("if_statement");
    tokens.advance()?;
    let mut branches = vec![conditional_branch(context, tokens)?];

    while tokens.kind() == TokenKind::Elif {
        tokens.advance()?;
        branches.push(conditional_branch(context, tokens)?);
    }

    let else_branch = if tokens.kind() == TokenKind::Else {
        tokens.advance()?;
        Some(Box::new(body(context, tokens)?))
    } else {
        None
    };

    Ok(Statement::If {
        branches,
        else_branch,
    })
}

fn conditional_branch(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<ConditionalBranch, ParseError> {
    let condition = expression(context, tokens)?;
    let action = body(context, tokens)?;
    Ok(ConditionalBranch { condition, action })
}

fn while_statement(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Statement, ParseError> {
    let _guard = context.push("while_statement");
    tokens.advance()?;
    let condition = expression(context, tokens)?;
    let body = body(context, tokens)?;
    Ok(Statement::While(condition, Box::new(body)))
}

/// A braced block, or a single bare statement.
fn body(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Statement, ParseError> {
    if tokens.kind() == TokenKind::LeftBrace {
        block(context, tokens)
    } else {
        statement(context, tokens)
    }
}

fn block(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Statement, ParseError> {
    let _guard = context.push("block");
    consume(context, tokens, TokenType::LeftBrace)?;
    let mut statements = Vec::new();

    loop {
        match tokens.kind() {
            TokenKind::RightBrace => {
                tokens.advance()?;
                return Ok(Statement::Block(statements));
            }
            TokenKind::Eof => {
                return Err(context.error(
                    SyntaxError::Expected(TokenType::RightBrace),
                    &tokens.current,
                ))
            }
            _ => statements.push(statement(context, tokens)?),
        }
    }
}

fn expression_statement(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Statement, ParseError> {
    let _guard = context.push("expression_statement");
    let expr = expression(context, tokens)?;
    if tokens.kind() == TokenKind::Equal {
        return Err(context.error(SyntaxError::InvalidAssignmentTarget, &tokens.current));
    }
    Ok(Statement::Expression(expr))
}

fn expression(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("expression");
    logical(context, tokens)
}

fn binary(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
    precedence: impl Fn(&ParseContext, &mut TokenCursor<'_>) -> Result<Expression, ParseError>,
    operator: impl Fn(&TokenType) -> Option<InfixOperator>,
) -> Result<Expression, ParseError> {
    let mut expr = precedence(context, tokens)?;

    while let Some(op) = operator(tokens.current()) {
        tokens.advance()?;
        let right = precedence(context, tokens)?;
        expr = Expression::Binary(Box::new(expr), op, Box::new(right));
    }

    Ok(expr)
}

fn logical(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("logical");
    binary(context, tokens, comparison, |token| match token {
        TokenType::And => Some(InfixOperator::And),
        TokenType::Or => Some(InfixOperator::Or),
        _ => None,
    })
}

fn comparison(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Expression, ParseError> {
    let _guard = context.push("comparison");
    binary(context, tokens, term, |token| match token {
        TokenType::EqualEqual => Some(InfixOperator::Equal),
        TokenType::BangEqual => Some(InfixOperator::NotEqual),
        TokenType::Less => Some(InfixOperator::LessThan),
        TokenType::LessEqual => Some(InfixOperator::LessThanOrEqual),
        TokenType::Greater => Some(InfixOperator::GreaterThan),
        TokenType::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
        _ => None,
    })
}

fn term(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("term");
    binary(context, tokens, factor, |token| match token {
        TokenType::Plus => Some(InfixOperator::Plus),
        TokenType::Minus => Some(InfixOperator::Minus),
        _ => None,
    })
}

fn factor(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("factor");
    binary(context, tokens, unary, |token| match token {
        TokenType::Star => Some(InfixOperator::Multiply),
        TokenType::Slash => Some(InfixOperator::Divide),
        TokenType::Percent => Some(InfixOperator::Modulo),
        _ => None,
    })
}

fn unary(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("unary");

    let operator = match tokens.kind() {
        TokenKind::Minus => UnaryOperator::Negate,
        TokenKind::Not => UnaryOperator::Not,
        _ => return call(context, tokens),
    };

    tokens.advance()?;
    let right = unary(context, tokens)?;
    Ok(Expression::Unary(operator, Box::new(right)))
}

/// A primary followed by any chain of `[index]` and `.method(args)`.
fn call(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("call");
    let mut expr = primary(context, tokens)?;

    loop {
        match tokens.kind() {
            TokenKind::LeftSquare => {
                tokens.advance()?;
                let index = expression(context, tokens)?;
                consume(context, tokens, TokenType::RightSquare)?;
                expr = Expression::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            }
            TokenKind::Dot => {
                tokens.advance()?;
                let method = match_identifier(context, tokens)?;
                consume(context, tokens, TokenType::LeftParen)?;
                let args = separated(context, tokens, TokenType::RightParen)?;
                expr = Expression::MethodCall {
                    receiver: Box::new(expr),
                    method,
                    args,
                };
            }
            _ => return Ok(expr),
        }
    }
}

/// Comma separated expressions up to and including `closing`.
fn separated(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
    closing: TokenType,
) -> Result<Vec<Expression>, ParseError> {
    let mut items = Vec::new();

    if tokens.current() == &closing {
        tokens.advance()?;
        return Ok(items);
    }

    // A comma must be followed by another item, so `[1, 2,]` is rejected.
    loop {
        items.push(expression(context, tokens)?);

        if tokens.kind() == TokenKind::Comma {
            tokens.advance()?;
        } else if tokens.current() == &closing {
            tokens.advance()?;
            break;
        } else {
            return Err(context.error(
                SyntaxError::ExpectedOneOf(vec![TokenType::Comma, closing]),
                &tokens.current,
            ));
        }
    }

    Ok(items)
}

fn primary(context: &ParseContext, tokens: &mut TokenCursor<'_>) -> Result<Expression, ParseError> {
    let _guard = context.push("primary");
    let Token { token_type, span } = tokens.advance()?;

    match token_type {
        TokenType::Number(n) => Ok(Expression::Literal(Literal::Integer(n))),
        TokenType::Float(n) => Ok(Expression::Literal(Literal::Float(n))),
        TokenType::String(s) => Ok(Expression::Literal(Literal::String(s))),
        TokenType::Bool(b) => Ok(Expression::Literal(Literal::Boolean(b))),
        TokenType::Variable(name) => Ok(Expression::Variable(name)),
        TokenType::LeftParen => {
            let expr = expression(context, tokens)?;
            consume(context, tokens, TokenType::RightParen)?;
            Ok(Expression::Grouping(Box::new(expr)))
        }
        TokenType::LeftSquare => Ok(Expression::List(separated(
            context,
            tokens,
            TokenType::RightSquare,
        )?)),
        TokenType::Int => Ok(Expression::IntCast(Box::new(parenthesized(
            context, tokens,
        )?))),
        TokenType::Input => Ok(Expression::Input(Box::new(parenthesized(
            context, tokens,
        )?))),
        token_type => Err(context.error(
            SyntaxError::Unexpected(token_type.clone()),
            &Token { token_type, span },
        )),
    }
}

fn parenthesized(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<Expression, ParseError> {
    consume(context, tokens, TokenType::LeftParen)?;
    let expr = expression(context, tokens)?;
    consume(context, tokens, TokenType::RightParen)?;
    Ok(expr)
}

fn consume(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
    token_type: TokenType,
) -> Result<(), ParseError> {
    if tokens.current() == &token_type {
        tokens.advance()?;
        Ok(())
    } else {
        Err(context.error(SyntaxError::Expected(token_type), &tokens.current))
    }
}

fn match_identifier(
    context: &ParseContext,
    tokens: &mut TokenCursor<'_>,
) -> Result<String, ParseError> {
    if let TokenType::Variable(name) = tokens.current() {
        let name = name.clone();
        tokens.advance()?;
        return Ok(name);
    }
    Err(context.error(SyntaxError::ExpectedIdentifier, &tokens.current))
}

#[cfg(test)]
mod test {
    use super::*;

    fn int(n: i64) -> Box<Expression> {
        Box::new(Expression::Literal(Literal::Integer(n)))
    }

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::Variable(name.to_string()))
    }

    fn single_expression(source: &str) -> Expression {
        let program = parse(source).unwrap();
        match program.0.as_slice() {
            [Statement::Expression(expr)] => expr.clone(),
            other => panic!("expected one expression statement, got {:?}", other),
        }
    }

    fn syntax_error(source: &str) -> ParseErrorWithContext {
        match parse(source) {
            Err(ParseError::Syntax(err)) => err,
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expected = Expression::Binary(
            int(1),
            InfixOperator::Plus,
            Box::new(Expression::Binary(int(2), InfixOperator::Multiply, int(3))),
        );
        assert_eq!(single_expression("1 + 2 * 3"), expected);
    }

    #[test]
    fn test_left_associative() {
        let expected = Expression::Binary(
            Box::new(Expression::Binary(int(1), InfixOperator::Minus, int(2))),
            InfixOperator::Minus,
            int(3),
        );
        assert_eq!(single_expression("1 - 2 - 3"), expected);
    }

    #[test]
    fn test_and_or_share_a_level() {
        let expected = Expression::Binary(
            Box::new(Expression::Binary(var("a"), InfixOperator::Or, var("b"))),
            InfixOperator::And,
            Box::new(Expression::Binary(var("c"), InfixOperator::LessThan, int(1))),
        );
        assert_eq!(single_expression("a or b and c < 1"), expected);
    }

    #[test]
    fn test_nested_unary() {
        let expected = Expression::Unary(
            UnaryOperator::Negate,
            Box::new(Expression::Unary(
                UnaryOperator::Negate,
                Box::new(Expression::Grouping(int(5))),
            )),
        );
        assert_eq!(single_expression("--(5)"), expected);

        let expected = Expression::Unary(UnaryOperator::Not, var("ok"));
        assert_eq!(single_expression("not ok"), expected);
        assert_eq!(single_expression("!ok"), expected);
    }

    #[test]
    fn test_postfix_chain() {
        let expected = Expression::Index {
            target: Box::new(Expression::MethodCall {
                receiver: Box::new(Expression::Index {
                    target: var("xs"),
                    index: int(0),
                }),
                method: "get".to_string(),
                args: vec![*int(1)],
            }),
            index: int(2),
        };
        assert_eq!(single_expression("xs[0].get(1)[2]"), expected);
    }

    #[test]
    fn test_list_literal_and_builtins() {
        let expected = Expression::List(vec![
            *int(1),
            Expression::IntCast(Box::new(Expression::Input(Box::new(
                Expression::Literal(Literal::String("n? ".to_string())),
            )))),
            Expression::List(vec![]),
        ]);
        assert_eq!(single_expression("[1, int(input(\"n? \")), []]"), expected);
    }

    #[test]
    fn test_make_and_assignment() {
        let program = parse("make x = 10\nx = x + 1\nx == 11").unwrap();
        assert_eq!(
            program.0,
            vec![
                Statement::Make("x".to_string(), *int(10)),
                Statement::Assign(
                    "x".to_string(),
                    Expression::Binary(var("x"), InfixOperator::Plus, int(1))
                ),
                Statement::Expression(Expression::Binary(
                    var("x"),
                    InfixOperator::Equal,
                    int(11)
                )),
            ]
        );
    }

    #[test]
    fn test_if_chain() {
        let program = parse("if a { print 1 } elif b print 2 else { print 3 }").unwrap();
        let expected = Statement::If {
            branches: vec![
                ConditionalBranch {
                    condition: *var("a"),
                    action: Statement::Block(vec![Statement::Print(*int(1))]),
                },
                ConditionalBranch {
                    condition: *var("b"),
                    action: Statement::Print(*int(2)),
                },
            ],
            else_branch: Some(Box::new(Statement::Block(vec![Statement::Print(*int(
                3,
            ))]))),
        };
        assert_eq!(program.0, vec![expected]);
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let program = parse("while true { continue break }").unwrap();
        assert_eq!(
            program.0,
            vec![Statement::While(
                Expression::Literal(Literal::Boolean(true)),
                Box::new(Statement::Block(vec![Statement::Continue, Statement::Break])),
            )]
        );
    }

    #[test]
    fn test_missing_paren() {
        let err = syntax_error("(3 + 5");
        assert_eq!(err.error, SyntaxError::Expected(TokenType::RightParen));
        assert_eq!(err.token.token_type, TokenType::Eof);
        assert!(err.context.contains(&"primary"));
    }

    #[test]
    fn test_unclosed_block() {
        let err = syntax_error("while true { print 1");
        assert_eq!(err.error, SyntaxError::Expected(TokenType::RightBrace));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = syntax_error("xs[0] = 1");
        assert_eq!(err.error, SyntaxError::InvalidAssignmentTarget);
    }

    #[test]
    fn test_make_requires_a_name() {
        let err = syntax_error("make 5 = 3");
        assert_eq!(err.error, SyntaxError::ExpectedIdentifier);
        assert_eq!(err.context, vec!["program", "statement", "make_statement"]);
    }

    #[test]
    fn test_malformed_call() {
        let err = syntax_error("xs.append 1");
        assert_eq!(err.error, SyntaxError::Expected(TokenType::LeftParen));

        let err = syntax_error("xs.append(1 2)");
        assert_eq!(
            err.error,
            SyntaxError::ExpectedOneOf(vec![TokenType::Comma, TokenType::RightParen])
        );
    }

    #[test]
    fn test_trailing_comma_is_rejected() {
        let err = syntax_error("[1, 2,]");
        assert_eq!(err.error, SyntaxError::Unexpected(TokenType::RightSquare));

        let err = syntax_error("xs.append(1,)");
        assert_eq!(err.error, SyntaxError::Unexpected(TokenType::RightParen));

        assert!(parse("[]\nxs.len()").is_ok());
    }

    #[test]
    fn test_trailing_input() {
        let err = syntax_error("print 1 }");
        assert_eq!(err.error, SyntaxError::Unexpected(TokenType::RightBrace));
    }

    #[test]
    fn test_lexical_error_aborts_parse() {
        assert!(matches!(parse("make x = 1."), Err(ParseError::Tokenize(_))));
    }

    #[test]
    fn test_error_message() {
        let err = syntax_error("print (1");
        assert_eq!(
            err.to_string(),
            "While parsing program > statement > print_statement > expression > logical > comparison > term > factor > unary > call > primary\nExpected \")\" at 1,9 but found \"<eof>\""
        );
    }
}
