//! End-to-end tests driving the public interface with in-memory modules,
//! captured print output and queued input.

use exin::{CollectStringPrint, Config, ErrorKind, Exception, Interpreter, MemLoader, QueueInput};
use pretty_assertions::assert_eq;

fn run_full(source: &str, input: &[&str]) -> (Result<i64, Exception>, String, usize) {
    let mut loader = MemLoader::new();
    loader.insert("main", source);
    run_loader(loader, input)
}

fn run_loader(loader: MemLoader, input: &[&str]) -> (Result<i64, Exception>, String, usize) {
    let mut interpreter = Interpreter::with_loader(Config::default(), loader);
    let mut out = CollectStringPrint::new();
    let mut queue = QueueInput::new(input.iter().map(|line| (*line).to_owned()).collect());
    let result = interpreter.run_report("main", &mut out, &mut queue);
    match result {
        Ok(report) => (Ok(report.status), out.into_output(), report.live_values),
        Err(err) => (Err(err), out.into_output(), 0),
    }
}

/// Runs a program that must succeed; checks that no values leaked.
fn run_ok(source: &str) -> String {
    let (result, output, live) = run_full(source, &[]);
    let status = result.expect("program should succeed");
    assert_eq!(status, 0, "unexpected status for:\n{source}");
    assert_eq!(live, 0, "leaked values for:\n{source}");
    output
}

fn run_err(source: &str) -> Exception {
    let (result, _, _) = run_full(source, &[]);
    result.expect_err("program should fail")
}

#[test]
fn arithmetic_coercion_int_plus_float() {
    assert_eq!(run_ok("int x = 1\nfloat y = 2\nprint x + y\n"), "3\n");
}

#[test]
fn indentation_defined_block() {
    let source = "int n = 3\nif n > 0\n    print \"pos\"\nelse\n    print \"neg\"\n";
    assert_eq!(run_ok(source), "pos\n");
}

#[test]
fn recursive_function() {
    let source = "\
def fact(n)
    if n <= 1
        return 1
    return n * fact(n - 1)
print fact(5)
";
    assert_eq!(run_ok(source), "120\n");
}

#[test]
fn forward_reference_to_a_function() {
    let source = "print double(21)\ndef double(n)\n    return n * 2\n";
    assert_eq!(run_ok(source), "42\n");
}

#[test]
fn list_mutation_through_subscript() {
    let source = "list xs = [1, 2, 3]\nxs[1] = 20\nprint xs\n";
    assert_eq!(run_ok(source), "[1,20,3]\n");
}

#[test]
fn slice_is_a_deep_copy() {
    let source = "list a = [1, 2, 3]\nlist b = a[0:2]\nb[0] = 99\nprint a, b\n";
    assert_eq!(run_ok(source), "[1,2,3] [99,2]\n");
}

#[test]
fn assignment_of_a_list_is_a_deep_copy() {
    let source = "list a = [1, 2]\nlist b = a\nb[0] = 9\nprint a, b\n";
    assert_eq!(run_ok(source), "[1,2] [9,2]\n");
}

#[test]
fn for_loop_over_a_string() {
    assert_eq!(run_ok("for c in \"abc\"\n    print c\n"), "a\nb\nc\n");
}

#[test]
fn for_loop_writes_through_list_items() {
    let source = "list xs = [1, 2, 3]\nfor x in xs\n    x = x * 2\nprint xs\n";
    assert_eq!(run_ok(source), "[2,4,6]\n");
}

#[test]
fn for_loop_variable_survives_the_loop() {
    let source = "for i in [1, 2, 3]\n    pass\nprint i\n";
    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn empty_sequence_skips_the_for_body() {
    let source = "for x in []\n    print \"never\"\nprint \"done\"\n";
    assert_eq!(run_ok(source), "done\n");
}

#[test]
fn division_by_zero_exits_with_code_9() {
    let err = run_err("int x = 1 / 0\n");
    assert_eq!(err.kind(), ErrorKind::DivisionByZeroError);
    assert_eq!(err.code(), 9);
    assert!(err.to_string().contains("DivisionByZeroError"));
}

#[test]
fn error_report_names_file_and_line() {
    let err = run_err("int ok = 1\nint x = 1 / 0\n");
    assert_eq!(
        err.to_string(),
        "File main, line 2\nint x = 1 / 0\nDivisionByZeroError: division by zero\n"
    );
}

#[test]
fn division_checks_the_integer_coercion_of_the_divisor() {
    // 0.5 truncates to 0, so even a float division raises
    let err = run_err("print 1.0 / 0.5\n");
    assert_eq!(err.kind(), ErrorKind::DivisionByZeroError);
}

#[test]
fn modulo_on_float_exits_with_code_8() {
    let err = run_err("print 1.5 % 2\n");
    assert_eq!(err.kind(), ErrorKind::ModNotAllowedError);
    assert_eq!(err.code(), 8);
}

#[test]
fn index_out_of_range_exits_with_code_6() {
    let err = run_err("list xs = [1]\nprint xs[5]\n");
    assert_eq!(err.kind(), ErrorKind::IndexError);
    assert_eq!(err.code(), 6);
}

#[test]
fn unknown_identifier_is_a_name_error() {
    let err = run_err("print nothing_here\n");
    assert_eq!(err.kind(), ErrorKind::NameError);
    assert_eq!(err.code(), 1);
}

#[test]
fn type_mismatch_is_a_type_error() {
    let err = run_err("print [1] - [2]\n");
    assert_eq!(err.kind(), ErrorKind::TypeError);
    assert_eq!(err.code(), 2);
}

#[test]
fn bad_indentation_is_a_syntax_error() {
    let err = run_err("if 1\nprint 2\n");
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.code(), 3);
}

#[test]
fn string_variable_takes_the_text_form() {
    assert_eq!(run_ok("str s = 5\nprint s + \"!\"\n"), "5!\n");
}

#[test]
fn numeric_variable_rejects_a_string() {
    let err = run_err("int i\ni = \"x\"\n");
    assert_eq!(err.kind(), ErrorKind::ValueError);
    assert_eq!(err.code(), 4);
}

#[test]
fn missing_module_is_a_system_error() {
    let err = run_err("import \"no_such_module\"\n");
    assert_eq!(err.kind(), ErrorKind::SystemError);
    assert_eq!(err.code(), 5);
}

#[test]
fn declared_type_converts_the_initializer() {
    assert_eq!(run_ok("int x = 3.9\nprint x\n"), "3\n");
    assert_eq!(run_ok("float y = 1\nprint y\n"), "1\n");
    assert_eq!(run_ok("char c = 65\nprint c\n"), "A\n");
}

#[test]
fn declaration_lists() {
    assert_eq!(run_ok("int a = 1, b = 2, c\nprint a, b, c\n"), "1 2 0\n");
}

#[test]
fn char_arithmetic_promotes_to_int() {
    assert_eq!(run_ok("char c = 'a'\nprint c + 1\n"), "98\n");
}

#[test]
fn string_concatenation_converts_operands() {
    assert_eq!(run_ok("print \"a\" + 1\n"), "a1\n");
    assert_eq!(run_ok("print \"v=\" + 1.5\n"), "v=1.5\n");
    assert_eq!(run_ok("print 1 + \"a\"\n"), "1a\n");
}

#[test]
fn sequence_repetition() {
    assert_eq!(run_ok("print \"ab\" * 3\n"), "ababab\n");
    assert_eq!(run_ok("print 2 * \"x\"\n"), "xx\n");
    assert_eq!(run_ok("print \"x\" * -1\n"), "\n");
    assert_eq!(run_ok("print [1, 2] * 2\n"), "[1,2,1,2]\n");
}

#[test]
fn list_concatenation() {
    assert_eq!(run_ok("print [1] + [2, 3]\n"), "[1,2,3]\n");
}

#[test]
fn comparisons_yield_zero_or_one() {
    let source = "print 1 < 2, 2 <= 2, 3 > 1, 1 >= 2, 1 == 1.0, 1 != 2, 1 <> 1\n";
    assert_eq!(run_ok(source), "1 1 1 0 1 1 0\n");
}

#[test]
fn string_and_list_equality() {
    assert_eq!(run_ok("print \"ab\" == \"ab\", \"ab\" != \"cd\"\n"), "1 1\n");
    assert_eq!(run_ok("print [1, 2] == [1, 2], [1] == [1, 2]\n"), "1 0\n");
    assert_eq!(run_ok("print [[1], [2]] == [[1], [2]]\n"), "1\n");
}

#[test]
fn membership_operator() {
    assert_eq!(run_ok("print 2 in [1, 2, 3], 5 in [1]\n"), "1 0\n");
    assert_eq!(run_ok("print 'b' in \"abc\", 'z' in \"abc\"\n"), "1 0\n");
    assert_eq!(run_ok("print 1 in []\n"), "0\n");
}

#[test]
fn logical_operators_yield_zero_or_one() {
    assert_eq!(run_ok("print 2 and 1, 1 and 0, 0 or 3, 0 or 0\n"), "1 0 1 0\n");
    assert_eq!(run_ok("print !1, !0, !2.5\n"), "0 1 0\n");
}

#[test]
fn unary_operators() {
    assert_eq!(run_ok("print -5, +5, -2.5\n"), "-5 5 -2.5\n");
}

#[test]
fn compound_assignment_chain() {
    let source = "int x = 10\nx += 5\nx -= 1\nx *= 2\nx /= 4\nx %= 5\nprint x\n";
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(run_ok("int a, b\na = b = 7\nprint a, b\n"), "7 7\n");
}

#[test]
fn comma_expression_yields_the_last_value() {
    assert_eq!(run_ok("int x = (1, 2)\nprint x\n"), "2\n");
}

#[test]
fn while_loop_with_break_and_continue() {
    let source = "\
int i = 0, s = 0
while 1
    i += 1
    if i > 4
        break
    if i % 2
        continue
    s += i
print s
";
    assert_eq!(run_ok(source), "6\n");
}

#[test]
fn do_loop_runs_body_before_condition() {
    let source = "int i = 5\ndo\n    i += 1\nwhile i < 3\nprint i\n";
    assert_eq!(run_ok(source), "6\n");
}

#[test]
fn nested_loops() {
    let source = "\
int total = 0
for i in [1, 2, 3]
    for j in [10, 20]
        total += i * j
print total
";
    assert_eq!(run_ok(source), "180\n");
}

#[test]
fn while_loop_accumulates() {
    let source = "int i = 0, s = 0\nwhile i < 5\n    i += 1\n    s += i\nprint s\n";
    assert_eq!(run_ok(source), "15\n");
}

#[test]
fn subscripts_chain_and_methods_follow() {
    assert_eq!(run_ok("list m = [[1, 2], [3, 4]]\nprint m[1][0]\n"), "3\n");
    assert_eq!(run_ok("print \"abc\"[:].len\n"), "3\n");
    assert_eq!(run_ok("print \"hello\"[1:3], \"hello\"[-1], \"hello\"[-3:-1]\n"), "el o ll\n");
}

#[test]
fn slice_bounds_are_clamped() {
    assert_eq!(run_ok("print \"abc\"[1:99], \"abc\"[:], [1, 2, 3][2:]\n"), "bc abc [3]\n");
}

#[test]
fn list_methods() {
    let source = "\
list xs = []
xs.append(1)
xs.insert(0, 2)
print xs, xs.len
int r = xs.remove(0)
print r, xs
";
    assert_eq!(run_ok(source), "[2,1] 2\n2 [1]\n");
}

#[test]
fn method_on_wrong_type_is_rejected() {
    let err = run_err("int x = 1\nprint x.len\n");
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
}

#[test]
fn builtin_type_names() {
    let source = "print type(1), type(1.0), type('a'), type(\"s\"), type([])\n";
    assert_eq!(run_ok(source), "int float char str list\n");
}

#[test]
fn builtin_chr() {
    assert_eq!(run_ok("print chr(65) + chr(66)\n"), "AB\n");
}

#[test]
fn type_method_unwraps_list_items() {
    assert_eq!(run_ok("list xs = [1]\nprint xs[0].type\n"), "int\n");
}

#[test]
fn function_arguments_are_deep_copies() {
    let source = "\
def clobber(l)
    l[0] = 99
    return 0
list a = [1]
int r = clobber(a)
print a
";
    assert_eq!(run_ok(source), "[1]\n");
}

#[test]
fn function_without_return_yields_zero() {
    assert_eq!(run_ok("def nothing()\n    pass\nprint nothing()\n"), "0\n");
}

#[test]
fn early_return_inside_a_loop() {
    let source = "\
def first_even(xs)
    for x in xs
        if x % 2 == 0
            return x
    return -1
print first_even([3, 5, 6, 7])
print first_even([1, 3])
";
    assert_eq!(run_ok(source), "6\n-1\n");
}

#[test]
fn globals_are_visible_inside_functions() {
    let source = "int g = 5\ndef read_g()\n    return g\nprint read_g()\n";
    assert_eq!(run_ok(source), "5\n");
}

#[test]
fn parameters_shadow_globals() {
    let source = "\
int n = 1
def bump(n)
    n += 1
    return n
print bump(10), n
";
    assert_eq!(run_ok(source), "11 1\n");
}

#[test]
fn locals_disappear_after_the_call() {
    let source = "\
def f()
    int local = 1
    return 0
int r = f()
print local
";
    let err = run_err(source);
    assert_eq!(err.kind(), ErrorKind::NameError);
}

#[test]
fn surplus_arguments_are_dropped_and_missing_ones_are_errors() {
    let ok = "def one(a)\n    return a\nprint one(1, 2)\n";
    assert_eq!(run_ok(ok), "1\n");
    let err = run_err("def two(a, b)\n    return a\nprint two(1)\n");
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
}

#[test]
fn top_level_return_sets_the_status() {
    let mut loader = MemLoader::new();
    loader.insert("main", "return 2 + 3\n");
    let (result, _, _) = run_loader(loader, &[]);
    assert_eq!(result.unwrap(), 5);
}

#[test]
fn import_runs_a_module_once() {
    let mut loader = MemLoader::new();
    loader.insert("main", "import \"lib\"\nimport \"lib\"\nprint shared\n");
    loader.insert("lib", "print \"loaded\"\nint shared = 42\n");
    let (result, output, live) = run_loader(loader, &[]);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(output, "loaded\n42\n");
    assert_eq!(live, 0);
}

#[test]
fn imported_functions_are_callable() {
    let mut loader = MemLoader::new();
    loader.insert("main", "import \"mathlib\"\nprint square(6)\n");
    loader.insert("mathlib", "def square(n)\n    return n * n\n");
    let (result, output, _) = run_loader(loader, &[]);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(output, "36\n");
}

#[test]
fn print_raw_suppresses_separators_and_newline() {
    assert_eq!(run_ok("print -raw \"a\", \"b\"\nprint -raw \"\"\n"), "ab");
    assert_eq!(run_ok("print\n"), "\n");
}

#[test]
fn print_of_none_and_nested_lists() {
    assert_eq!(run_ok("list xs = [1, [2, 3], \"s\"]\nprint xs\n"), "[1,[2,3],s]\n");
    assert_eq!(run_ok("list xs = []\nprint xs.append(1)\n"), "none\n");
}

#[test]
fn float_output_uses_up_to_15_significant_digits() {
    assert_eq!(run_ok("print 0.1 + 0.2\n"), "0.3\n");
    assert_eq!(run_ok("print 10 / 4.0\n"), "2.5\n");
    assert_eq!(run_ok("print 1e20, 1.5e-7\n"), "1E+20 1.5E-07\n");
}

#[test]
fn input_converts_to_the_declared_kind() {
    let (result, output, live) = run_full(
        "int x\ninput \"? \" x\nfloat y\ninput y\nprint x + 1, y\n",
        &["41", "2.5"],
    );
    assert_eq!(result.unwrap(), 0);
    assert_eq!(output, "? 42 2.5\n");
    assert_eq!(live, 0);
}

#[test]
fn input_of_a_string_takes_the_whole_line() {
    let (result, output, _) = run_full("str s\ninput s\nprint s + \"!\"\n", &["hello world"]);
    assert_eq!(result.unwrap(), 0);
    assert_eq!(output, "hello world!\n");
}

#[test]
fn input_to_an_undeclared_name_is_an_error() {
    let (result, _, _) = run_full("input x\n", &["1"]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NameError);
}

#[test]
fn characters_compare_against_numbers() {
    assert_eq!(run_ok("char c = 'a'\nprint c == 97, c < 'b'\n"), "1 1\n");
}

#[test]
fn position_replay_is_stable_across_calls_in_loops() {
    // each iteration calls a function, jumping away and back
    let source = "\
def twice(n)
    return n * 2
int i = 0, s = 0
while i < 3
    s += twice(i)
    i += 1
print s
";
    assert_eq!(run_ok(source), "6\n");
}

#[test]
fn deeply_nested_blocks_unwind_cleanly() {
    let source = "\
int n = 0
if 1
    if 1
        if 1
            n = 3
print n
";
    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn no_values_leak_from_a_busy_program() {
    let source = "\
def build(n)
    list out = []
    int i = 0
    while i < n
        out.append(i * i)
        i += 1
    return out
list squares = build(5)
list copy = squares[1:4]
for q in copy
    q = q + 1
print squares, copy
";
    assert_eq!(run_ok(source), "[0,1,4,9,16] [2,5,10]\n");
}

#[test]
fn duplicate_declaration_is_a_name_error() {
    let err = run_err("int x\nint x\n");
    assert_eq!(err.kind(), ErrorKind::NameError);
    let err = run_err("def f()\n    pass\ndef f()\n    pass\n");
    assert_eq!(err.kind(), ErrorKind::NameError);
}

#[test]
fn heap_limit_aborts_with_out_of_memory() {
    let mut loader = MemLoader::new();
    loader.insert("main", "list xs = []\nint i = 0\nwhile i < 10000\n    xs.append(i)\n    i += 1\n");
    let config = Config {
        heap_limit: Some(64),
        ..Config::default()
    };
    let mut interpreter = Interpreter::with_loader(config, loader);
    let mut out = CollectStringPrint::new();
    let mut input = QueueInput::new(vec![]);
    let err = interpreter.run_with("main", &mut out, &mut input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemoryError);
    assert_eq!(err.code(), 7);
}
