use std::{cell::RefCell, io::Cursor, rc::Rc};

use make_lang::tree_walk_interpreter::{
    ErrorCategory, ExecutionError, InterpretError, Interpreter, Value,
};

fn interpreter_with_input(input: &str) -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
    let output = Rc::new(RefCell::new(Vec::new()));
    let input = Rc::new(RefCell::new(Cursor::new(input.as_bytes().to_vec())));
    (Interpreter::new(output.clone(), input), output)
}

fn test_program_with_input(source: &str, input: &str, expected_output: &str) {
    let program = make_lang::parser::parse(source).expect("Parse should work on valid program");
    let (mut interpreter, output) = interpreter_with_input(input);
    interpreter
        .interpret(&program)
        .expect("Interpret should work on valid program");
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    assert_eq!(output, expected_output);
}

fn test_valid_program(source: &str, expected_output: &str) {
    test_program_with_input(source, "", expected_output);
}

fn runtime_error(source: &str) -> ErrorCategory {
    let (mut interpreter, _) = interpreter_with_input("");
    match interpreter.run(source) {
        Err(InterpretError::Execution(ExecutionError::Execution { kind, .. })) => kind.category(),
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn test_arithmetic_precedence() {
    test_valid_program("print (5 + 3) * -(-2 + 1)", "8\n");
    test_valid_program(
        "print 8.5 / (2 * 9) - -3",
        &format!("{}\n", 8.5 / 18.0 + 3.0),
    );
    test_valid_program("print 7 / 2\nprint 6 / 3", "3.5\n2.0\n");
    test_valid_program("print 2 + 3 * 4 - 10 % 4", "12\n");
    test_valid_program("print -7 % 3", "2\n");
    test_valid_program(
        "make m = -9223372036854775807 - 1\nprint m % -1",
        "0\n",
    );
}

#[test]
fn test_booleans() {
    let source = r#"
    print true and true
    print false or false
    print not false
    print 5 == true
    print 5 != true
    print 1 == 1.0
    print "apple" < "banana"
    "#;
    test_valid_program(source, "true\nfalse\ntrue\nfalse\ntrue\nfalse\ntrue\n");
}

#[test]
fn test_string_concatenation() {
    test_valid_program(r#"print "a" + "b" + "c""#, "abc\n");
    test_valid_program(r#"print "tab\there" + "\n""#, "tab\there\n\n");
}

#[test]
fn test_variables_and_delete() {
    let source = r#"
    make x = 10
    x = x * 2
    print x
    del x
    "#;
    test_valid_program(source, "20\n");
    assert_eq!(
        runtime_error("make x = 10\ndel x\nprint x"),
        ErrorCategory::UndefinedVariable
    );
}

#[test]
fn test_keywords_are_case_insensitive() {
    test_valid_program("MAKE Total = 3\nPrint Total + 1 # four", "4\n");
}

#[test]
fn test_if_chain() {
    let source = r#"
    make n = 15
    if n % 15 == 0 {
        print "fizzbuzz"
    } elif n % 5 == 0 {
        print "buzz"
    } elif n % 3 == 0 {
        print "fizz"
    } else print n

    if false print "never"
    "#;
    test_valid_program(source, "fizzbuzz\n");
}

#[test]
fn test_while_break_continue() {
    let source = r#"
    make i = 0
    make total = 0
    while true {
        i = i + 1
        if i > 10 { break }
        if i % 2 == 0 { continue }
        total = total + i
    }
    print total
    print i
    "#;
    test_valid_program(source, "25\n11\n");
}

#[test]
fn test_continue_rechecks_condition() {
    let source = r#"
    make i = 0
    while i < 3 {
        i = i + 1
        continue
        print "unreachable"
    }
    print i
    "#;
    test_valid_program(source, "3\n");
}

#[test]
fn test_nested_loops_break_innermost() {
    let source = r#"
    make row = 0
    while row < 3 {
        make col = 0
        while true {
            if col == row { break }
            col = col + 1
        }
        print col
        row = row + 1
    }
    "#;
    test_valid_program(source, "0\n1\n2\n");
}

#[test]
fn test_list_operations() {
    let source = r#"
    make xs = []
    make i = 0
    while i < 4 {
        xs.append(i * i)
        i = i + 1
    }
    print xs
    print xs.len()
    print xs[2]
    print xs.get(3)
    print xs.remove(0)
    xs.set(0, "one")
    print xs
    print [[1, 2], [3]][0][1]
    "#;
    test_valid_program(
        source,
        "[0, 1, 4, 9]\n4\n4\n9\n0\n[\"one\", 4, 9]\n2\n",
    );
}

#[test]
fn test_list_aliasing() {
    let source = r#"
    make a = [1]
    make b = a
    b.append(2)
    print a
    make c = a + [3]
    c.append(4)
    print a
    print c
    print a == [1, 2]
    "#;
    test_valid_program(source, "[1, 2]\n[1, 2]\n[1, 2, 3, 4]\ntrue\n");
}

#[test]
fn test_self_containing_lists() {
    let source = r#"
    make xs = [1]
    xs.append(xs)
    print xs
    make ys = [1]
    ys.append(ys)
    print xs == ys
    print [xs, "a"]
    "#;
    test_valid_program(source, "[1, [...]]\ntrue\n[[1, [...]], \"a\"]\n");
}

#[test]
fn test_list_errors() {
    assert_eq!(runtime_error("make xs = [1, 2]\nxs[2]"), ErrorCategory::Index);
    assert_eq!(runtime_error("make xs = [1, 2]\nxs[-1]"), ErrorCategory::Index);
    assert_eq!(runtime_error("[].remove(0)"), ErrorCategory::Index);
    assert_eq!(runtime_error("make xs = [1]\nxs[\"0\"]"), ErrorCategory::Type);
    assert_eq!(runtime_error("make n = 3\nn.append(1)"), ErrorCategory::Type);
    assert_eq!(runtime_error("[1].sort()"), ErrorCategory::Type);
}

#[test]
fn test_input_and_int() {
    let source = r#"
    make name = input("name? ")
    make age = int(input("age? "))
    print "hello " + name
    print age + 1
    print int(3.9)
    "#;
    test_program_with_input(source, "Ada\n36\n", "name? age? hello Ada\n37\n3\n");
}

#[test]
fn test_runtime_error_categories() {
    assert_eq!(runtime_error("print 1 / 0"), ErrorCategory::Arithmetic);
    assert_eq!(runtime_error("print 1.5 % 0"), ErrorCategory::Arithmetic);
    assert_eq!(runtime_error(r#"print "a" + 1"#), ErrorCategory::Type);
    assert_eq!(runtime_error("print true and 1"), ErrorCategory::Type);
    assert_eq!(runtime_error("print -\"a\""), ErrorCategory::Type);
    assert_eq!(runtime_error("while 1 { }"), ErrorCategory::Type);
    assert_eq!(runtime_error("print int(\"abc\")"), ErrorCategory::Type);
    assert_eq!(runtime_error("continue"), ErrorCategory::Control);
    assert_eq!(runtime_error("print input(\"? \")"), ErrorCategory::Io);
}

#[test]
fn test_syntax_errors_abort_before_running() {
    let (mut interpreter, output) = interpreter_with_input("");
    for source in ["print 1\nmake = 2", "print 1\n1 + 2 = 3", "print 1\nprint (2", "print 1\n@"] {
        assert!(matches!(
            interpreter.run(source),
            Err(InterpretError::Parse(_))
        ));
    }
    assert!(output.borrow().is_empty());
}

#[test]
fn test_session_keeps_variables() {
    let (mut interpreter, output) = interpreter_with_input("");
    assert_eq!(interpreter.run("make count = 1").unwrap(), None);
    assert!(interpreter.run("count / 0").is_err());
    assert_eq!(
        interpreter.run("count = count + 1\ncount").unwrap(),
        Some(Value::Integer(2))
    );
    interpreter.run("print count").unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), "2\n");
}
