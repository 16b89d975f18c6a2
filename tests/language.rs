//! End-to-end programs run through the public interpreter API.

use loxwalk::{Interpreter, LoxError, RuntimeErrorKind, SyntaxErrorKind};
use pretty_assertions::assert_eq;

fn interpret(input: &str) -> Result<String, LoxError> {
    let mut raw_output: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut raw_output);
    interp.eval(input.as_bytes())?;
    drop(interp);
    Ok(String::from_utf8(raw_output).expect("cannot convert output to string"))
}

fn runtime_error(input: &str) -> String {
    match interpret(input) {
        Err(e @ LoxError::Runtime(_)) => e.to_string(),
        r => panic!("unexpected output: {:?}", r),
    }
}

#[test]
fn same_expression_twice_gives_same_value() -> Result<(), LoxError> {
    assert_eq!(
        interpret("var a = 3; var b = 4; print a * b + 1; print a * b + 1;")?,
        "13\n13\n"
    );
    Ok(())
}

#[test]
fn shadowing() -> Result<(), LoxError> {
    let prg = r#"
        {
            var x = 1;
            {
                var x = 2;
                print x == 2;
            }
            print x == 1;
        }
    "#;
    assert_eq!(interpret(prg)?, "true\ntrue\n");
    Ok(())
}

#[test]
fn closures_capture_variables_not_values() -> Result<(), LoxError> {
    let prg = r#"
        var x = "before";
        fun show() { print x; }
        x = "after";
        show();
    "#;
    assert_eq!(interpret(prg)?, "after\n");
    Ok(())
}

#[test]
fn counters_have_independent_state() -> Result<(), LoxError> {
    let prg = r#"
        fun makeCounter() {
            var count = 0;
            fun counter() {
                count = count + 1;
                return count;
            }
            return counter;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
        print a();
        print b();
    "#;
    assert_eq!(interpret(prg)?, "1\n2\n1\n3\n2\n");
    Ok(())
}

#[test]
fn closures_share_their_environment() -> Result<(), LoxError> {
    let prg = r#"
        var get;
        var set;
        fun make() {
            var v = 1;
            fun g() { return v; }
            fun s(n) { v = n; }
            get = g;
            set = s;
        }
        make();
        set(5);
        print get();
    "#;
    assert_eq!(interpret(prg)?, "5\n");
    Ok(())
}

#[test]
fn return_unwinds_nested_blocks_and_loops() -> Result<(), LoxError> {
    let prg = r#"
        fun find(limit) {
            var i = 0;
            while (true) {
                {
                    if (i == limit) {
                        return i;
                    }
                }
                i = i + 1;
            }
            print "unreachable";
        }
        print find(4);

        fun early() {
            for (var i = 0; i < 10; i = i + 1) {
                if (i == 2) return;
            }
        }
        print early();
    "#;
    assert_eq!(interpret(prg)?, "4\nnil\n");
    Ok(())
}

#[test]
fn arity_mismatch_names_both_counts() {
    assert_eq!(
        runtime_error("fun f() {}\nf(1);"),
        "[line 2] Expected 0 arguments but got 1."
    );
    assert_eq!(
        runtime_error("fun g(a) {}\ng();"),
        "[line 2] Expected 1 arguments but got 0."
    );
}

#[test]
fn arity_is_checked_before_binding() {
    let mut raw_output: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut raw_output);
    match interp.eval("fun f(a) { print a; } f(1, 2);".as_bytes()) {
        Err(LoxError::Runtime(errors)) => {
            assert!(matches!(
                errors[0].kind,
                RuntimeErrorKind::Arity {
                    expected: 1,
                    found: 2
                }
            ))
        }
        r => panic!("unexpected output: {:?}", r),
    }
    drop(interp);
    assert!(raw_output.is_empty());
}

#[test]
fn constructor_returns_the_initialized_instance() -> Result<(), LoxError> {
    let prg = r#"
        class Box {
            init(v) {
                this.v = v;
            }
        }
        var a = Box(42);
        print a == a;
        print a.v;
        print Box(1) == Box(1);
    "#;
    assert_eq!(interpret(prg)?, "true\n42\nfalse\n");
    Ok(())
}

#[test]
fn bound_methods_see_their_own_receiver() -> Result<(), LoxError> {
    let prg = r#"
        class Named {
            init(name) { this.name = name; }
            say() { print this.name; }
        }
        var a = Named("a");
        var b = Named("b");
        var sayA = a.say;
        var sayB = b.say;
        sayB();
        sayA();
        a.name = "a2";
        sayA();
        print a.say == a.say;
    "#;
    assert_eq!(interpret(prg)?, "b\na\na2\nfalse\n");
    Ok(())
}

#[test]
fn methods_can_be_stored_in_fields() -> Result<(), LoxError> {
    let prg = r#"
        class A { m() { return "method"; } }
        fun f() { return "field"; }
        var a = A();
        print a.m();
        a.m = f;
        print a.m();
    "#;
    assert_eq!(interpret(prg)?, "method\nfield\n");
    Ok(())
}

#[test]
fn super_calls_walk_the_chain() -> Result<(), LoxError> {
    let prg = r#"
        class A { m() { return "A"; } }
        class B < A {}
        class C < B { m() { return "C" + super.m(); } }
        print C().m();
    "#;
    assert_eq!(interpret(prg)?, "CA\n");
    Ok(())
}

#[test]
fn parser_recovers_after_one_bad_statement() {
    let prg = "print 1;\nvar = 2;\nprint 3;\nfun f() { return 4; }\nprint f();\n";
    match interpret(prg) {
        Err(LoxError::Syntax(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].line, 2);
            assert_eq!(errors[0].kind, SyntaxErrorKind::Expected("variable name"));
        }
        r => panic!("unexpected output: {:?}", r),
    }
}

#[test]
fn truthiness_and_equality_table() -> Result<(), LoxError> {
    let prg = r#"
        class A {}
        print !false;
        print !nil;
        print !0;
        print !"";
        print !A();
        print nil == nil;
        print nil == false;
        print 1 == "1";
        print "a" + "b" == "ab";
    "#;
    assert_eq!(
        interpret(prg)?,
        "true\ntrue\nfalse\nfalse\nfalse\ntrue\nfalse\nfalse\ntrue\n"
    );
    Ok(())
}

#[test]
fn undefined_variable() {
    assert_eq!(
        runtime_error("print 1;\nprint nope;"),
        "[line 2] Undefined variable 'nope'."
    );
}

#[test]
fn deeply_nested_code_runs() -> Result<(), LoxError> {
    let depth = 5000;
    let parens = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
    let nots = format!("print {}true;", "!".repeat(depth));
    let blocks = format!("{}print 2;{}", "{".repeat(depth), "}".repeat(depth));
    assert_eq!(interpret(&parens)?, "1\n");
    assert_eq!(interpret(&nots)?, "true\n");
    assert_eq!(interpret(&blocks)?, "2\n");
    Ok(())
}
