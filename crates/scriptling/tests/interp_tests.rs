//! End-to-end interpreter tests: parse + evaluate small programs and check
//! the trailing expression value or the raised exception.

use scriptling::{CancelToken, ExcType, Interp, RunLimits, Value};

fn run(source: &str) -> Value {
    let mut interp = Interp::new();
    match interp.run(source, "<test>") {
        Ok(value) => value,
        Err(err) => panic!("script failed: {err}\nsource:\n{source}"),
    }
}

fn run_err(source: &str) -> scriptling::Exception {
    let mut interp = Interp::new();
    match interp.run(source, "<test>") {
        Ok(value) => panic!("expected failure, got {}", value.repr()),
        Err(err) => err,
    }
}

fn repr(source: &str) -> String {
    run(source).repr()
}

// ----------------------------------------------------------------------
// Arithmetic and operators
// ----------------------------------------------------------------------

#[test]
fn arithmetic_and_closures() {
    // Spec end-to-end scenario 1.
    let value = run("def mk(x):\n    def f(y):\n        return x+y\n    return f\nmk(10)(5)");
    assert_eq!(value.repr(), "15");
}

#[test]
fn integer_ops_stay_integer_and_mixing_promotes() {
    assert_eq!(repr("2 + 3"), "5");
    assert_eq!(repr("2 + 3.0"), "5.0");
    assert_eq!(repr("7 * 6"), "42");
    assert_eq!(repr("1 / 2"), "0.5");
}

#[test]
fn floor_division_and_modulo_follow_divisor_sign() {
    assert_eq!(repr("-7 // 2"), "-4");
    assert_eq!(repr("7 // -2"), "-4");
    assert_eq!(repr("-7 % 2"), "1");
    assert_eq!(repr("7 % -2"), "-1");
    assert_eq!(repr("7.5 // 2"), "3.0");
}

#[test]
fn power_semantics() {
    assert_eq!(repr("2 ** 10"), "1024");
    assert_eq!(repr("2 ** -1"), "0.5");
    assert_eq!(repr("2 ** 3 ** 2"), "512");
}

#[test]
fn zero_division_raises() {
    let err = run_err("1 / 0");
    assert_eq!(err.kind.root(), ExcType::ZeroDivisionError);
    let err = run_err("1 % 0");
    assert_eq!(err.kind.root(), ExcType::ZeroDivisionError);
}

#[test]
fn string_and_sequence_operators() {
    assert_eq!(repr("'ab' + 'cd'"), "'abcd'");
    assert_eq!(repr("'ab' * 3"), "'ababab'");
    assert_eq!(repr("[1] * 3"), "[1, 1, 1]");
    assert_eq!(repr("[1] * 0"), "[]");
    assert_eq!(repr("[1] * -2"), "[]");
    assert_eq!(repr("[1, 2] + [3]"), "[1, 2, 3]");
}

#[test]
fn comparison_chaining_evaluates_middle_once() {
    let value = run(
        "calls = []\n\
         def mid():\n    calls.append(1)\n    return 5\n\
         result = 1 < mid() < 10\n\
         [result, len(calls)]",
    );
    assert_eq!(value.repr(), "[True, 1]");
}

#[test]
fn mixed_type_ordering_raises_but_equality_does_not() {
    let err = run_err("1 < 'a'");
    assert_eq!(err.kind.root(), ExcType::TypeError);
    assert_eq!(repr("1 == 'a'"), "False");
    assert_eq!(repr("1 != 'a'"), "True");
}

#[test]
fn short_circuit_returns_deciding_operand() {
    assert_eq!(repr("0 or 'x'"), "'x'");
    assert_eq!(repr("'' and 1"), "''");
    assert_eq!(repr("2 and 3"), "3");
    assert_eq!(repr("0 and crash_if_evaluated"), "0");
    assert_eq!(repr("1 or crash_if_evaluated"), "1");
}

#[test]
fn truthiness() {
    assert_eq!(repr("bool([])"), "False");
    assert_eq!(repr("bool({})"), "False");
    assert_eq!(repr("bool(0.0)"), "False");
    assert_eq!(repr("bool('a')"), "True");
    assert_eq!(repr("bool((0,))"), "True");
}

// ----------------------------------------------------------------------
// Scoping
// ----------------------------------------------------------------------

#[test]
fn function_locals_do_not_leak() {
    let value = run("def f():\n    x = 1\n    return x\nf()");
    assert_eq!(value.repr(), "1");
    // The enclosing frame is unchanged: module-level x stays unbound.
    let err = run_err("def f():\n    x = 1\n    return x\nf()\nx");
    assert_eq!(err.kind.root(), ExcType::NameError);
}

#[test]
fn global_and_nonlocal_rebind_the_right_frames() {
    let value = run(
        "x = 1\n\
         def bump():\n    global x\n    x = x + 1\n\
         bump()\nbump()\nx",
    );
    assert_eq!(value.repr(), "3");

    let value = run(
        "def counter():\n\
         \x20   n = 0\n\
         \x20   def inc():\n\
         \x20       nonlocal n\n\
         \x20       n = n + 1\n\
         \x20       return n\n\
         \x20   return inc\n\
         c = counter()\nc()\nc()\nc()",
    );
    assert_eq!(value.repr(), "3");
}

#[test]
fn assignment_without_declaration_shadows() {
    let value = run(
        "x = 'outer'\n\
         def f():\n    x = 'inner'\n    return x\n\
         [f(), x]",
    );
    assert_eq!(value.repr(), "['inner', 'outer']");
}

#[test]
fn chained_and_tuple_assignment() {
    assert_eq!(repr("a = b = 2\na + b"), "4");
    assert_eq!(repr("a, b = 1, 2\n(b, a)"), "(2, 1)");
    assert_eq!(repr("a, (b, c) = 1, (2, 3)\nc"), "3");
    let err = run_err("a, b = 1, 2, 3");
    assert_eq!(err.kind.root(), ExcType::ValueError);
}

// ----------------------------------------------------------------------
// Control flow
// ----------------------------------------------------------------------

#[test]
fn while_and_for_else() {
    assert_eq!(
        repr("out = []\nfor i in range(3):\n    out.append(i)\nelse:\n    out.append('done')\nout"),
        "[0, 1, 2, 'done']"
    );
    assert_eq!(
        repr("out = []\nfor i in range(3):\n    if i == 1:\n        break\n    out.append(i)\nelse:\n    out.append('done')\nout"),
        "[0]"
    );
    assert_eq!(
        repr("n = 0\nwhile n < 3:\n    n += 1\nelse:\n    n = 100\nn"),
        "100"
    );
}

#[test]
fn range_forms() {
    assert_eq!(repr("list(range(4))"), "[0, 1, 2, 3]");
    assert_eq!(repr("list(range(2, 5))"), "[2, 3, 4]");
    assert_eq!(repr("list(range(10, 0, -3))"), "[10, 7, 4, 1]");
    let err = run_err("range(1, 2, 0)");
    assert_eq!(err.kind.root(), ExcType::ValueError);
}

#[test]
fn conditional_expression_and_lambda() {
    assert_eq!(repr("(lambda x, y=10: x + y)(5)"), "15");
    assert_eq!(repr("'yes' if 1 else 'no'"), "'yes'");
}

#[test]
fn comprehensions() {
    assert_eq!(repr("[x * 2 for x in range(4) if x % 2 == 0]"), "[0, 4]");
    assert_eq!(repr("{k: v for k, v in [('a', 1), ('b', 2)]}"), "{'a': 1, 'b': 2}");
    assert_eq!(repr("sorted([x for x in {1, 2, 3}])"), "[1, 2, 3]");
    assert_eq!(repr("[x + y for x in [10, 20] for y in [1, 2]]"), "[11, 12, 21, 22]");
    // Comprehension variables do not leak into the enclosing scope.
    let err = run_err("[q for q in range(3)]\nq");
    assert_eq!(err.kind.root(), ExcType::NameError);
}

// ----------------------------------------------------------------------
// Exceptions
// ----------------------------------------------------------------------

#[test]
fn try_finally_ordering() {
    // Spec end-to-end scenario 2.
    let value = run(
        "xs=[]\n\
         try:\n    xs.append(1)\n    raise ValueError(\"e\")\n\
         except ValueError as e:\n    xs.append(2)\n\
         finally:\n    xs.append(3)\n\
         xs",
    );
    assert_eq!(value.repr(), "[1, 2, 3]");
}

#[test]
fn finally_runs_when_handler_raises() {
    let value = run(
        "xs = []\n\
         def f():\n\
         \x20   try:\n\
         \x20       raise ValueError('a')\n\
         \x20   except ValueError:\n\
         \x20       raise TypeError('b')\n\
         \x20   finally:\n\
         \x20       xs.append('fin')\n\
         try:\n    f()\nexcept TypeError:\n    xs.append('caught')\n\
         xs",
    );
    assert_eq!(value.repr(), "['fin', 'caught']");
}

#[test]
fn finally_supersedes_pending_return() {
    let value = run(
        "def f():\n\
         \x20   try:\n\
         \x20       return 1\n\
         \x20   finally:\n\
         \x20       return 2\n\
         f()",
    );
    assert_eq!(value.repr(), "2");
}

#[test]
fn handlers_try_in_order_and_bind_name() {
    let value = run(
        "try:\n    raise KeyError('missing')\n\
         except ValueError:\n    r = 'value'\n\
         except KeyError as e:\n    r = str(e)\n\
         except:\n    r = 'any'\n\
         r",
    );
    assert_eq!(value.repr(), "'missing'");
}

#[test]
fn bare_raise_reraises_current_exception() {
    let value = run(
        "out = []\n\
         try:\n\
         \x20   try:\n\
         \x20       raise ValueError('x')\n\
         \x20   except ValueError:\n\
         \x20       out.append('inner')\n\
         \x20       raise\n\
         except ValueError:\n    out.append('outer')\n\
         out",
    );
    assert_eq!(value.repr(), "['inner', 'outer']");

    let err = run_err("raise");
    assert_eq!(err.kind.root(), ExcType::RuntimeError);
}

#[test]
fn raise_class_and_raise_from() {
    let err = run_err("raise ValueError");
    assert_eq!(err.kind.root(), ExcType::ValueError);
    assert!(err.message.is_none());

    let err = run_err("raise ValueError('boom') from TypeError('cause')");
    assert_eq!(err.kind.root(), ExcType::ValueError);
    let cause = err.cause.expect("cause chain");
    assert_eq!(cause.kind.root(), ExcType::TypeError);
}

#[test]
fn user_defined_exceptions() {
    let value = run(
        "class AppError(Exception):\n    pass\n\
         class NotFound(AppError):\n    pass\n\
         try:\n    raise NotFound('missing thing')\n\
         except AppError as e:\n    r = e.message\n\
         r",
    );
    assert_eq!(value.repr(), "'missing thing'");

    // Generic handlers catch user exceptions via the Exception root.
    let value = run(
        "class AppError(Exception):\n    pass\n\
         try:\n    raise AppError('x')\nexcept Exception:\n    r = 'caught'\nr",
    );
    assert_eq!(value.repr(), "'caught'");
}

#[test]
fn system_exit_is_never_caught_generically() {
    // Bare except and except Exception must not swallow SystemExit.
    let err = run_err("try:\n    exit(3)\nexcept:\n    pass");
    assert!(err.is_system_exit());
    assert_eq!(err.exit_code, Some(3));

    let err = run_err("try:\n    exit(2)\nexcept Exception:\n    pass");
    assert!(err.is_system_exit());

    // Only an explicit handler sees it.
    let value = run("try:\n    exit(5)\nexcept SystemExit as e:\n    r = e.code\nr");
    assert_eq!(value.repr(), "5");
}

#[test]
fn recursion_guard_default_depth() {
    // Spec end-to-end scenario 3. The walker needs real host stack at depth
    // 1000, so give the test thread the same headroom a host would.
    let (root, message) = on_big_stack(|| {
        let err = run_err("def r(n):\n    return r(n+1)\nr(0)");
        (err.kind.root(), err.message.unwrap_or_default())
    });
    assert_eq!(root, ExcType::RecursionError);
    assert!(message.contains("call depth exceeded"), "{message}");
    assert!(message.contains("1000"), "{message}");
}

/// Runs `f` on a thread with a 64 MiB stack, matching the serving host's
/// interpreter-thread configuration. Interpreter values are not `Send`, so
/// callers return plain summaries.
fn on_big_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(f)
        .expect("spawn test thread")
        .join()
        .expect("join test thread")
}

#[test]
fn recursion_depth_is_overridable() {
    let mut interp = Interp::builder().limits(RunLimits::new().max_depth(10)).build();
    let err = interp
        .run("def r(n):\n    return r(n+1)\nr(0)", "<test>")
        .unwrap_err();
    assert!(err.message.unwrap_or_default().contains("10"));
}

#[test]
fn bounded_recursion_succeeds() {
    assert_eq!(repr("def f(n):\n    if n == 0:\n        return 0\n    return f(n - 1) + 1\nf(100)"), "100");
}

#[test]
fn recursion_just_under_the_limit_succeeds() {
    let rendered = on_big_stack(|| {
        run("def f(n):\n    if n == 0:\n        return 0\n    return f(n - 1) + 1\nf(990)").repr()
    });
    assert_eq!(rendered, "990");
}

// ----------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------

#[test]
fn cancellation_stops_a_tight_loop() {
    let token = CancelToken::new();
    token.cancel();
    let mut interp = Interp::builder()
        .limits(RunLimits::new().cancel_token(token))
        .build();
    let err = interp.run("while True:\n    pass", "<test>").unwrap_err();
    assert_eq!(err.message.as_deref(), Some("cancelled"));
}

#[test]
fn deadline_reports_timeout() {
    let mut interp = Interp::builder()
        .limits(RunLimits::new().timeout(std::time::Duration::from_millis(20)))
        .build();
    let err = interp
        .run("n = 0\nwhile True:\n    n = n + 1", "<test>")
        .unwrap_err();
    assert_eq!(err.message.as_deref(), Some("timeout"));
}

// ----------------------------------------------------------------------
// Classes
// ----------------------------------------------------------------------

#[test]
fn classes_methods_and_inheritance() {
    let value = run(
        "class Animal:\n\
         \x20   def __init__(self, name):\n\
         \x20       self.name = name\n\
         \x20   def speak(self):\n\
         \x20       return self.name + ' makes a sound'\n\
         class Dog(Animal):\n\
         \x20   def speak(self):\n\
         \x20       return self.name + ' barks'\n\
         d = Dog('Rex')\n\
         a = Animal('Generic')\n\
         [d.speak(), a.speak(), d.name]",
    );
    assert_eq!(value.repr(), "['Rex barks', 'Generic makes a sound', 'Rex']");
}

#[test]
fn parent_chain_method_resolution() {
    let value = run(
        "class A:\n    def ping(self):\n        return 'A'\n\
         class B(A):\n    pass\n\
         class C(B):\n    pass\n\
         C().ping()",
    );
    assert_eq!(value.repr(), "'A'");
}

#[test]
fn class_constants_and_writable_class_attributes() {
    let value = run(
        "class Config:\n    LIMIT = 10\n\
         old = Config.LIMIT\n\
         Config.LIMIT = 99\n\
         [old, Config.LIMIT]",
    );
    assert_eq!(value.repr(), "[10, 99]");
}

#[test]
fn isinstance_checks() {
    assert_eq!(repr("isinstance(1, int)"), "True");
    assert_eq!(repr("isinstance('x', int)"), "False");
    assert_eq!(
        repr("class A:\n    pass\nclass B(A):\n    pass\nisinstance(B(), A)"),
        "True"
    );
}

#[test]
fn decorators_apply_bottom_up() {
    let value = run(
        "def add_suffix(f):\n\
         \x20   def wrapped():\n\
         \x20       return f() + '-outer'\n\
         \x20   return wrapped\n\
         def add_prefix(f):\n\
         \x20   def wrapped():\n\
         \x20       return 'inner-' + f()\n\
         \x20   return wrapped\n\
         @add_suffix\n\
         @add_prefix\n\
         def base():\n    return 'x'\n\
         base()",
    );
    // Bottom-up: base -> add_prefix(base) -> add_suffix(...)
    assert_eq!(value.repr(), "'inner-x-outer'");
}

#[test]
fn with_statement_calls_exit_on_every_path() {
    let value = run(
        "log = []\n\
         class Ctx:\n\
         \x20   def __enter__(self):\n\
         \x20       log.append('enter')\n\
         \x20       return self\n\
         \x20   def __exit__(self, t, v, tb):\n\
         \x20       log.append('exit')\n\
         \x20       return False\n\
         with Ctx() as c:\n    log.append('body')\n\
         log",
    );
    assert_eq!(value.repr(), "['enter', 'body', 'exit']");

    // Truthy __exit__ suppresses the pending exception.
    let value = run(
        "class Quiet:\n\
         \x20   def __enter__(self):\n\
         \x20       return self\n\
         \x20   def __exit__(self, t, v, tb):\n\
         \x20       return True\n\
         with Quiet():\n    raise ValueError('swallowed')\n\
         'survived'",
    );
    assert_eq!(value.repr(), "'survived'");
}

// ----------------------------------------------------------------------
// Containers and methods
// ----------------------------------------------------------------------

#[test]
fn dict_insertion_order_is_preserved() {
    assert_eq!(
        repr("d = {'z': 1}\nd['a'] = 2\nd['m'] = 3\nlist(d.keys())"),
        "['z', 'a', 'm']"
    );
    assert_eq!(
        repr("d = {'b': 1, 'a': 2}\n[k for k in d]"),
        "['b', 'a']"
    );
}

#[test]
fn container_methods() {
    assert_eq!(repr("xs = [3, 1, 2]\nxs.sort()\nxs"), "[1, 2, 3]");
    assert_eq!(repr("sorted([3, 1, 2], reverse=True)"), "[3, 2, 1]");
    assert_eq!(repr("sorted(['bb', 'a'], key=len)"), "['a', 'bb']");
    assert_eq!(repr("d = {'a': 1}\nd.get('missing', 42)"), "42");
    assert_eq!(repr("'a,b,c'.split(',')"), "['a', 'b', 'c']");
    assert_eq!(repr("'-'.join(['a', 'b'])"), "'a-b'");
    assert_eq!(repr("'  pad  '.strip()"), "'pad'");
    assert_eq!(repr("s = {1, 2}\ns.add(3)\nlen(s)"), "3");
    assert_eq!(repr("(1, 2, 1).count(1)"), "2");
}

#[test]
fn slicing() {
    assert_eq!(repr("[0, 1, 2, 3, 4][1:3]"), "[1, 2]");
    assert_eq!(repr("[0, 1, 2, 3, 4][::2]"), "[0, 2, 4]");
    assert_eq!(repr("[0, 1, 2, 3, 4][::-1]"), "[4, 3, 2, 1, 0]");
    assert_eq!(repr("'hello'[1:4]"), "'ell'");
    assert_eq!(repr("'hello'[-1]"), "'o'");
    let err = run_err("[1, 2][0:2:0]");
    assert_eq!(err.kind.root(), ExcType::ValueError);
}

#[test]
fn membership_and_identity() {
    assert_eq!(repr("'ell' in 'hello'"), "True");
    assert_eq!(repr("3 not in [1, 2]"), "True");
    assert_eq!(repr("'k' in {'k': 1}"), "True");
    assert_eq!(repr("None is None"), "True");
    assert_eq!(repr("xs = [1]\nys = xs\nxs is ys"), "True");
    assert_eq!(repr("[1] is [1]"), "False");
}

// ----------------------------------------------------------------------
// F-strings
// ----------------------------------------------------------------------

#[test]
fn fstring_interpolation_and_specs() {
    assert_eq!(repr("x = 7\nf'value={x}'"), "'value=7'");
    assert_eq!(repr("f'{3.14159:.2f}'"), "'3.14'");
    assert_eq!(repr("f'{42:>5}'"), "'   42'");
    assert_eq!(repr("f'{\"hi\"!r}'"), "\"'hi'\"");
    assert_eq!(repr("f'{{literal}}'"), "'{literal}'");
    assert_eq!(repr("a = 2\nb = 3\nf'{a + b}'"), "'5'");
}

// ----------------------------------------------------------------------
// Imports
// ----------------------------------------------------------------------

#[test]
fn import_library_forms() {
    assert_eq!(repr("import math\nmath.floor(3.7)"), "3");
    assert_eq!(repr("import math as m\nm.ceil(3.2)"), "4");
    assert_eq!(repr("from math import sqrt\nsqrt(16.0)"), "4.0");
    assert_eq!(repr("from math import floor as fl\nfl(2.9)"), "2");
}

#[test]
fn dotted_import_binds_top_name() {
    let value = run("import scriptling.mcp.tool\ntype(scriptling.mcp.tool.get_int)");
    assert_eq!(value.repr(), "'builtin_function_or_method'");
    let value = run("import scriptling.mcp.tool as t\ntype(t.return_string)");
    assert_eq!(value.repr(), "'builtin_function_or_method'");
}

#[test]
fn missing_import_raises_import_error() {
    let err = run_err("import no_such_library");
    assert_eq!(err.kind.root(), ExcType::ImportError);
}

#[test]
fn repeated_import_is_cached() {
    let value = run(
        "import math\nimport math as m2\n\
         math.pi == m2.pi",
    );
    assert_eq!(value.repr(), "True");
}

#[test]
fn json_library_round_trip() {
    assert_eq!(
        repr("import json\njson.loads(json.dumps({'b': [1, 2], 'a': None}))"),
        "{'b': [1, 2], 'a': None}"
    );
}

#[test]
fn base64_library() {
    assert_eq!(repr("import base64\nbase64.b64encode('foobar')"), "'Zm9vYmFy'");
    assert_eq!(repr("import base64\nbase64.b64decode('Zm9vYmFy')"), "'foobar'");
}

#[test]
fn library_attributes_are_writable() {
    let value = run("import math\nmath.pi = 3\nmath.pi");
    assert_eq!(value.repr(), "3");
}

// ----------------------------------------------------------------------
// Print capture
// ----------------------------------------------------------------------

/// Writer that shares its buffer with the test through an `Rc`.
#[derive(Default, Clone)]
struct SharedPrint(std::rc::Rc<std::cell::RefCell<String>>);

impl scriptling::PrintWriter for SharedPrint {
    fn stdout_write(&mut self, output: std::borrow::Cow<'_, str>) -> Result<(), scriptling::Exception> {
        self.0.borrow_mut().push_str(&output);
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> Result<(), scriptling::Exception> {
        self.0.borrow_mut().push(end);
        Ok(())
    }
}

#[test]
fn print_goes_through_the_writer() {
    let shared = SharedPrint::default();
    let mut interp = Interp::builder()
        .print_writer(Box::new(shared.clone()))
        .build();
    interp
        .run("print('a', 1, sep='-')\nprint('end', end='')", "<test>")
        .unwrap();
    assert_eq!(shared.0.borrow().as_str(), "a-1\nend");
}

// ----------------------------------------------------------------------
// Misc
// ----------------------------------------------------------------------

#[test]
fn trailing_expression_is_the_result() {
    assert_eq!(repr("x = 10\nx + 5"), "15");
    assert!(matches!(run("x = 3"), Value::None));
}

#[test]
fn syntax_errors_surface_with_position() {
    let err = run_err("x = = 1");
    assert_eq!(err.kind.root(), ExcType::SyntaxError);
    assert!(err.to_string().contains("<test>"));
}

#[test]
fn augmented_assignment_forms() {
    assert_eq!(repr("x = 1\nx += 2\nx *= 3\nx"), "9");
    assert_eq!(repr("xs = [1]\nxs += [2]\nxs"), "[1, 2]");
    assert_eq!(repr("d = {'n': 1}\nd['n'] += 5\nd['n']"), "6");
    assert_eq!(repr("x = 12\nx //= 5\nx"), "2");
    assert_eq!(repr("x = 6\nx <<= 2\nx"), "24");
}

#[test]
fn star_args_and_kwargs() {
    let value = run(
        "def f(a, b=2, *rest, **extra):\n\
         \x20   return [a, b, list(rest), extra]\n\
         f(1, 2, 3, 4, x=5)",
    );
    assert_eq!(value.repr(), "[1, 2, [3, 4], {'x': 5}]");

    let value = run(
        "def f(a, b, c):\n    return a * 100 + b * 10 + c\n\
         args = [2, 3]\n\
         f(1, *args)",
    );
    assert_eq!(value.repr(), "123");

    let value = run(
        "def f(a, b):\n    return (a, b)\n\
         kw = {'b': 2}\n\
         f(1, **kw)",
    );
    assert_eq!(value.repr(), "(1, 2)");
}

#[test]
fn call_errors() {
    let err = run_err("def f(a):\n    return a\nf(1, 2)");
    assert_eq!(err.kind.root(), ExcType::TypeError);
    let err = run_err("def f(a):\n    return a\nf(b=1)");
    assert_eq!(err.kind.root(), ExcType::TypeError);
    let err = run_err("def f(a):\n    return a\nf()");
    assert_eq!(err.kind.root(), ExcType::TypeError);
}

#[test]
fn builtin_helpers() {
    assert_eq!(repr("len('héllo')"), "5");
    assert_eq!(repr("abs(-3)"), "3");
    assert_eq!(repr("min([4, 2, 9])"), "2");
    assert_eq!(repr("max(1, 5, 3)"), "5");
    assert_eq!(repr("sum([1, 2, 3])"), "6");
    assert_eq!(repr("sum([1, 2], 10)"), "13");
    assert_eq!(repr("list(enumerate(['a', 'b']))"), "[(0, 'a'), (1, 'b')]");
    assert_eq!(repr("list(zip([1, 2], ['a', 'b']))"), "[(1, 'a'), (2, 'b')]");
    assert_eq!(repr("round(2.675, 2)"), "2.68");
    assert_eq!(repr("int('  42  ')"), "42");
    assert_eq!(repr("float('1.5')"), "1.5");
    assert_eq!(repr("str(None)"), "'None'");
}

#[test]
fn request_isolation_between_interpreters() {
    // Module-level state in one interpreter is invisible to the next.
    let mut first = Interp::new();
    first.run("leak = 'visible'", "<test>").unwrap();
    let mut second = Interp::new();
    let err = second.run("leak", "<test>").unwrap_err();
    assert_eq!(err.kind.root(), ExcType::NameError);
}
