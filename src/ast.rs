use std::fmt::Display;

/// The whole program: the top-level block of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Make(String, Expression),
    Assign(String, Expression),
    Delete(String),
    Print(Expression),
    Block(Vec<Statement>),
    If {
        branches: Vec<ConditionalBranch>,
        else_branch: Option<Box<Statement>>,
    },
    While(Expression, Box<Statement>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expression,
    pub action: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    Grouping(Box<Expression>),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    Input(Box<Expression>),
    IntCast(Box<Expression>),
    List(Vec<Expression>),
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
}

/// Floats always keep a fractional part so they read back as floats.
pub(crate) fn fmt_float(f: &mut std::fmt::Formatter<'_>, n: f64) -> std::fmt::Result {
    if n.is_finite() && n.fract() == 0.0 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

fn write_separated<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Expression(expr) => write!(f, "{}", expr),
            Statement::Make(name, expr) => write!(f, "make {} = {}", name, expr),
            Statement::Assign(name, expr) => write!(f, "{} = {}", name, expr),
            Statement::Delete(name) => write!(f, "del {}", name),
            Statement::Print(expr) => write!(f, "print {}", expr),
            Statement::Block(statements) => {
                writeln!(f, "{{")?;
                for statement in statements {
                    writeln!(f, "{}", statement)?;
                }
                write!(f, "}}")
            }
            Statement::If {
                branches,
                else_branch,
            } => {
                for (i, branch) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { " elif" };
                    write!(f, "{} {} {}", keyword, branch.condition, branch.action)?;
                }
                if let Some(else_branch) = else_branch {
                    write!(f, " else {}", else_branch)?;
                }
                Ok(())
            }
            Statement::While(condition, body) => write!(f, "while {} {}", condition, body),
            Statement::Break => write!(f, "break"),
            Statement::Continue => write!(f, "continue"),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Grouping(expr) => write!(f, "({})", expr),
            Expression::Binary(left, op, right) => write!(f, "{} {} {}", left, op, right),
            Expression::Unary(UnaryOperator::Not, right) => write!(f, "not {}", right),
            Expression::Unary(op, right) => write!(f, "{}{}", op, right),
            Expression::Input(prompt) => write!(f, "input({})", prompt),
            Expression::IntCast(expr) => write!(f, "int({})", expr),
            Expression::List(elements) => {
                write!(f, "[")?;
                write_separated(f, elements)?;
                write!(f, "]")
            }
            Expression::Index { target, index } => write!(f, "{}[{}]", target, index),
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                write!(f, "{}.{}(", receiver, method)?;
                write_separated(f, args)?;
                write!(f, ")")
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => fmt_float(f, *n),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Modulo => write!(f, "%"),
            InfixOperator::And => write!(f, "and"),
            InfixOperator::Or => write!(f, "or"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "not"),
        }
    }
}
