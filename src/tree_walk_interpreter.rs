mod list;
mod value;
mod variables;

use std::{
    cell::RefCell,
    fmt::Debug,
    io::{BufRead, Write},
    rc::Rc,
};

use crate::{
    ast::{Expression, InfixOperator, Program, Statement, UnaryOperator},
    parser::ParseError,
};

pub use self::{list::List, value::Value, variables::Variables};

/// Outcome of executing one statement. `Break` and `Continue` travel up to
/// the nearest enclosing loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Option<Value>),
    Break,
    Continue,
}

#[derive(Clone)]
pub struct Interpreter {
    variables: Variables,
    stdout: Rc<RefCell<dyn Write>>,
    stdin: Rc<RefCell<dyn BufRead>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("variables", &self.variables)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(
            Rc::new(RefCell::new(std::io::stdout())),
            Rc::new(RefCell::new(std::io::BufReader::new(std::io::stdin()))),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Error executing statement: {current_statement}\n{kind}")]
    Execution {
        kind: ExecutionErrorKind,
        current_statement: Statement,
    },
}

impl ExecutionError {
    pub fn kind(&self) -> &ExecutionErrorKind {
        match self {
            ExecutionError::Execution { kind, .. } => kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    UndefinedVariable,
    Type,
    Arithmetic,
    Index,
    Io,
    Control,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Input closed before a line could be read")]
    InputClosed,
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Invalid less than operation: {} < {}", .0.quoted(), .1.quoted())]
    InvalidLess(Value, Value),
    #[error("Invalid less than or equal operation: {} <= {}", .0.quoted(), .1.quoted())]
    InvalidLessEqual(Value, Value),
    #[error("Invalid greater than operation: {} > {}", .0.quoted(), .1.quoted())]
    InvalidGreater(Value, Value),
    #[error("Invalid greater than or equal operation: {} >= {}", .0.quoted(), .1.quoted())]
    InvalidGreaterEqual(Value, Value),
    #[error("Invalid addition operation: {} + {}", .0.quoted(), .1.quoted())]
    InvalidAdd(Value, Value),
    #[error("Invalid subtraction operation: {} - {}", .0.quoted(), .1.quoted())]
    InvalidSub(Value, Value),
    #[error("Invalid multiplication operation: {} * {}", .0.quoted(), .1.quoted())]
    InvalidMult(Value, Value),
    #[error("Invalid division operation: {} / {}", .0.quoted(), .1.quoted())]
    InvalidDiv(Value, Value),
    #[error("Invalid modulo operation: {} % {}", .0.quoted(), .1.quoted())]
    InvalidMod(Value, Value),
    #[error("Invalid and operation: {} and {}", .0.quoted(), .1.quoted())]
    InvalidAnd(Value, Value),
    #[error("Invalid or operation: {} or {}", .0.quoted(), .1.quoted())]
    InvalidOr(Value, Value),
    #[error("Invalid negate operation: -{}", .0.quoted())]
    InvalidNegate(Value),
    #[error("Invalid not operation: not {}", .0.quoted())]
    InvalidNot(Value),
    #[error("Condition must be a boolean, got {}", .0.quoted())]
    NonBooleanCondition(Value),
    #[error("Cannot convert {} to an integer", .0.quoted())]
    InvalidIntCast(Value),
    #[error("List index must be an integer, got {}", .0.quoted())]
    NonIntegerIndex(Value),
    #[error("Not a list: {}", .0.quoted())]
    NotAList(Value),
    #[error("Unknown list method: {0}")]
    UnknownMethod(String),
    #[error("Invalid method call: {method} called with {found} arguments, expected {expected}")]
    InvalidMethodArity {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Modulo by zero")]
    ModuloByZero,
    #[error("Integer overflow")]
    IntegerOverflow,
    #[error("List index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("break outside of a loop")]
    BreakOutsideLoop,
    #[error("continue outside of a loop")]
    ContinueOutsideLoop,
}

impl ExecutionErrorKind {
    pub fn category(&self) -> ErrorCategory {
        use ExecutionErrorKind::*;
        match self {
            IO(_) | InputClosed => ErrorCategory::Io,
            UndefinedVariable(_) => ErrorCategory::UndefinedVariable,
            InvalidLess(..) | InvalidLessEqual(..) | InvalidGreater(..)
            | InvalidGreaterEqual(..) | InvalidAdd(..) | InvalidSub(..) | InvalidMult(..)
            | InvalidDiv(..) | InvalidMod(..) | InvalidAnd(..) | InvalidOr(..)
            | InvalidNegate(_) | InvalidNot(_) | NonBooleanCondition(_) | InvalidIntCast(_)
            | NonIntegerIndex(_) | NotAList(_) | UnknownMethod(_) | InvalidMethodArity { .. } => {
                ErrorCategory::Type
            }
            DivisionByZero | ModuloByZero | IntegerOverflow => ErrorCategory::Arithmetic,
            IndexOutOfBounds { .. } => ErrorCategory::Index,
            BreakOutsideLoop | ContinueOutsideLoop => ErrorCategory::Control,
        }
    }
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn Write>>, stdin: Rc<RefCell<dyn BufRead>>) -> Self {
        Self {
            variables: Variables::new(),
            stdout,
            stdin,
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Parses and evaluates `source` against this interpreter's variables.
    pub fn run(&mut self, source: &str) -> Result<Option<Value>, InterpretError> {
        let program = crate::parser::parse(source)?;
        Ok(self.interpret(&program)?)
    }

    /// Executes every top-level statement in order and returns the value of
    /// the last one.
    pub fn interpret(&mut self, program: &Program) -> Result<Option<Value>, ExecutionError> {
        let mut last = None;
        for stmt in program.0.iter() {
            let result = match self.execute(stmt) {
                Ok(Flow::Normal(value)) => Ok(value),
                Ok(Flow::Break) => Err(ExecutionErrorKind::BreakOutsideLoop),
                Ok(Flow::Continue) => Err(ExecutionErrorKind::ContinueOutsideLoop),
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => last = value,
                Err(e) => {
                    return Err(ExecutionError::Execution {
                        kind: e,
                        current_statement: stmt.clone(),
                    })
                }
            }
        }

        Ok(last)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Flow, ExecutionErrorKind> {
        #[cfg(feature = "trace")]
        {
            eprintln!("[trace] {}", stmt);
        }

        let flow = match stmt {
            Statement::Expression(expression) => Flow::Normal(Some(self.evaluate(expression)?)),
            Statement::Make(name, expression) | Statement::Assign(name, expression) => {
                let value = self.evaluate(expression)?;
                self.variables.write(name, value);
                Flow::Normal(None)
            }
            Statement::Delete(name) => {
                self.variables.delete(name)?;
                Flow::Normal(None)
            }
            Statement::Print(expression) => {
                let value = self.evaluate(expression)?;
                writeln!(self.stdout.borrow_mut(), "{}", value)?;
                Flow::Normal(None)
            }
            Statement::Block(statements) => {
                let mut last = None;
                for statement in statements.iter() {
                    match self.execute(statement)? {
                        Flow::Normal(value) => last = value,
                        signal => return Ok(signal),
                    }
                }
                Flow::Normal(last)
            }
            Statement::If {
                branches,
                else_branch,
            } => {
                for branch in branches.iter() {
                    if self.condition(&branch.condition)? {
                        return self.execute(&branch.action);
                    }
                }
                match else_branch {
                    Some(else_branch) => self.execute(else_branch)?,
                    None => Flow::Normal(None),
                }
            }
            Statement::While(condition, body) => {
                let mut last = None;
                while self.condition(condition)? {
                    match self.execute(body)? {
                        Flow::Normal(value) => last = value,
                        Flow::Break => break,
                        Flow::Continue => continue,
                    }
                }
                Flow::Normal(last)
            }
            Statement::Break => Flow::Break,
            Statement::Continue => Flow::Continue,
        };

        Ok(flow)
    }

    fn condition(&mut self, expression: &Expression) -> Result<bool, ExecutionErrorKind> {
        match self.evaluate(expression)? {
            Value::Boolean(b) => Ok(b),
            other => Err(ExecutionErrorKind::NonBooleanCondition(other)),
        }
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, ExecutionErrorKind> {
        let res = match expression {
            Expression::Literal(literal) => Ok(Value::from(literal)),
            Expression::Variable(name) => self.variables.read(name).cloned(),
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Binary(a, op, b) => {
                let a = self.evaluate(a)?;
                let b = self.evaluate(b)?;
                match op {
                    InfixOperator::Equal => Ok(Value::Boolean(a == b)),
                    InfixOperator::NotEqual => Ok(Value::Boolean(a != b)),
                    InfixOperator::LessThan => a.less(b),
                    InfixOperator::LessThanOrEqual => a.less_equal(b),
                    InfixOperator::GreaterThan => a.greater(b),
                    InfixOperator::GreaterThanOrEqual => a.greater_equal(b),
                    InfixOperator::Plus => a.add(b),
                    InfixOperator::Minus => a.sub(b),
                    InfixOperator::Multiply => a.mul(b),
                    InfixOperator::Divide => a.div(b),
                    InfixOperator::Modulo => a.rem(b),
                    InfixOperator::And => a.and(b),
                    InfixOperator::Or => a.or(b),
                }
            }
            Expression::Unary(op, x) => {
                let x = self.evaluate(x)?;
                match op {
                    UnaryOperator::Negate => x.negate(),
                    UnaryOperator::Not => x.not(),
                }
            }
            Expression::Input(prompt) => {
                let prompt = self.evaluate(prompt)?;
                self.read_input(&prompt).map(Value::String)
            }
            Expression::IntCast(x) => self.evaluate(x)?.to_integer().map(Value::Integer),
            Expression::List(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.evaluate(element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(List::new(values)))
            }
            Expression::Index { target, index } => {
                let list = self.evaluate(target)?.into_list()?;
                let index = self.evaluate(index)?.as_index()?;
                list.get(index)
            }
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                let list = self.evaluate(receiver)?.into_list()?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                list.call(method, args)
            }
        }?;

        Ok(res)
    }

    fn read_input(&mut self, prompt: &Value) -> Result<String, ExecutionErrorKind> {
        {
            let mut stdout = self.stdout.borrow_mut();
            write!(stdout, "{}", prompt)?;
            stdout.flush()?;
        }

        let mut line = String::new();
        if self.stdin.borrow_mut().read_line(&mut line)? == 0 {
            return Err(ExecutionErrorKind::InputClosed);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(line)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    fn interpreter(input: &str) -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
        let output = Rc::new(RefCell::new(Vec::new()));
        let input = Rc::new(RefCell::new(Cursor::new(input.as_bytes().to_vec())));
        (Interpreter::new(output.clone(), input), output)
    }

    fn eval(source: &str) -> Result<Option<Value>, InterpretError> {
        interpreter("").0.run(source)
    }

    fn error_kind(source: &str) -> ExecutionErrorKind {
        match eval(source) {
            Err(InterpretError::Execution(ExecutionError::Execution { kind, .. })) => kind,
            other => panic!("expected an execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            eval("(5 + 3) * -(-2 + 1)").unwrap(),
            Some(Value::Integer(8))
        );
        assert_eq!(
            eval("8.5 / (2 * 9) - -3").unwrap(),
            Some(Value::Float(8.5 / 18.0 + 3.0))
        );
        assert_eq!(eval("2 + 3 * 4 % 5").unwrap(), Some(Value::Integer(4)));
    }

    #[test]
    fn test_program_value_is_last_statement() {
        assert_eq!(eval("1\n2").unwrap(), Some(Value::Integer(2)));
        assert_eq!(eval("make x = 1").unwrap(), None);
        assert_eq!(eval("").unwrap(), None);
        assert_eq!(
            eval("if false 1 elif true 2 else 3").unwrap(),
            Some(Value::Integer(2))
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(error_kind("1 / 0").category(), ErrorCategory::Arithmetic);
        assert_eq!(error_kind("1 % 0").category(), ErrorCategory::Arithmetic);
        assert_eq!(error_kind("y").category(), ErrorCategory::UndefinedVariable);
        assert_eq!(error_kind("del y").category(), ErrorCategory::UndefinedVariable);
        assert_eq!(error_kind("\"a\" + 1").category(), ErrorCategory::Type);
        assert_eq!(error_kind("if 1 print 2").category(), ErrorCategory::Type);
        assert_eq!(error_kind("[1][true]").category(), ErrorCategory::Type);
        assert_eq!(error_kind("(5).len()").category(), ErrorCategory::Type);
        assert_eq!(error_kind("[1].pop()").category(), ErrorCategory::Type);
        assert_eq!(error_kind("[1][1]").category(), ErrorCategory::Index);
        assert_eq!(error_kind("break").category(), ErrorCategory::Control);
        assert_eq!(error_kind("input(\"> \")").category(), ErrorCategory::Io);
    }

    #[test]
    fn test_break_outside_loop_is_reported() {
        assert!(matches!(
            error_kind("if true { continue }"),
            ExecutionErrorKind::ContinueOutsideLoop
        ));
        assert!(matches!(
            error_kind("break"),
            ExecutionErrorKind::BreakOutsideLoop
        ));
    }

    #[test]
    fn test_failed_statement_is_recorded() {
        match eval("make a = 1\nmake b = a / 0") {
            Err(InterpretError::Execution(e)) => {
                assert!(matches!(e.kind(), ExecutionErrorKind::DivisionByZero));
                let ExecutionError::Execution {
                    current_statement, ..
                } = e;
                assert_eq!(current_statement.to_string(), "make b = a / 0");
            }
            other => panic!("expected an execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_while_value_is_last_body_value() {
        let source = "make i = 0\nwhile i < 3 { i = i + 1\ni * 10 }";
        assert_eq!(eval(source).unwrap(), Some(Value::Integer(30)));
    }

    #[test]
    fn test_input_strips_line_ending() {
        let (mut interpreter, output) = interpreter("Ada\r\nrest\n");
        let value = interpreter.run("input(\"name? \")").unwrap();
        assert_eq!(value, Some(Value::String("Ada".to_string())));
        assert_eq!(String::from_utf8(output.take()).unwrap(), "name? ");
    }

    #[test]
    fn test_variables_persist_between_runs() {
        let (mut interpreter, _) = interpreter("");
        interpreter.run("make x = 10").unwrap();
        assert_eq!(interpreter.run("x + 1").unwrap(), Some(Value::Integer(11)));
        assert!(interpreter.variables().exists("x"));
        interpreter.run("del x").unwrap();
        assert!(matches!(
            interpreter.run("x"),
            Err(InterpretError::Execution(_))
        ));
    }

    #[test]
    fn test_side_effects_before_failure_are_kept() {
        let (mut interpreter, output) = interpreter("");
        assert!(interpreter.run("print 1\nprint 1 / 0\nprint 2").is_err());
        assert_eq!(String::from_utf8(output.take()).unwrap(), "1\n");
    }
}
