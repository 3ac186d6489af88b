use pretty_assertions::assert_eq;

use scribe::expr::{
    add, builtin, div, float, gt, int, lit, mul, not, paren, rem, string, sub, var, Expr,
};
use scribe::{value, AssignScope, Builder, CallArgs, Engine, Map, Param, Settings, Value};

fn render(b: Builder, data: Value) -> scribe::Result<String> {
    Engine::new()
        .compile("test", b.finish())?
        .render(data)
        .to_string()
}

fn compile_err(b: Builder) -> scribe::Error {
    Engine::new().compile("test", b.finish()).unwrap_err()
}

#[test]
fn escape_region() {
    let mut b = Builder::new();
    b.escape("x", builtin(var("x"), "upper_case", vec![]).unwrap(), |b| {
        b.interpolate(var("x"));
        b.text(" ");
        b.noescape(|b| {
            b.interpolate(var("x"));
        });
    });
    b.text(" ");
    b.interpolate(var("x"));
    let result = render(b, value! { x: "ab" }).unwrap();
    assert_eq!(result, "AB ab ab");
}

#[test]
fn escape_regions_nest() {
    let mut b = Builder::new();
    b.escape("x", builtin(var("x"), "html", vec![]).unwrap(), |b| {
        b.escape("y", builtin(var("y"), "upper_case", vec![]).unwrap(), |b| {
            b.interpolate(var("s"));
            b.noescape(|b| {
                b.text("|");
                b.interpolate(var("s"));
            });
        });
    });
    let result = render(b, value! { s: "<b>" }).unwrap();
    assert_eq!(result, "&lt;B&gt;|&lt;b&gt;");
}

#[test]
fn escape_applies_to_macro_bodies_defined_inside() {
    let mut b = Builder::new();
    b.escape("x", builtin(var("x"), "html", vec![]).unwrap(), |b| {
        b.macro_def("show", vec![Param::new("v")], |b| {
            b.interpolate(var("v"));
        });
    });
    b.call(var("show"), CallArgs::Positional(vec![string("a&b")]));
    assert_eq!(render(b, value! {}).unwrap(), "a&amp;b");
}

#[test]
fn escape_err_noescape_outside_region() {
    let mut b = Builder::new();
    b.at(0..12).noescape(|b| {
        b.text("x");
    });
    let err = compile_err(b);
    assert!(err.is_compile());
    assert_eq!(err.message(), "#noescape is not inside an #escape region");
}

#[test]
fn compile_err_misplaced_control_flow() {
    let mut b = Builder::new();
    b.fallback();
    assert_eq!(
        compile_err(b).message(),
        "#fallback must be inside a macro or function body"
    );

    let mut b = Builder::new();
    b.sep(|b| {
        b.text(",");
    });
    assert_eq!(compile_err(b).message(), "#sep must be inside a #list");
}

#[test]
fn compile_err_local_outside_macro() {
    let mut b = Builder::new();
    b.local("x", int(1));
    assert_eq!(
        compile_err(b).message(),
        "#local must be inside a macro, a function or a nested block"
    );
}

#[test]
fn compile_err_invalid_capture_name() {
    let mut b = Builder::new();
    b.capture(AssignScope::Global, "1st", |b| {
        b.text("x");
    });
    assert_eq!(compile_err(b).message(), "`1st` is not a valid identifier");
}

#[test]
fn folded_failure_in_untaken_branch_renders() {
    let mut b = Builder::new();
    b.if_else(
        var("divide"),
        |b| {
            b.interpolate(div(int(1), int(0)));
        },
        |b| {
            b.text("skipped");
        },
    );
    let engine = Engine::new();
    let template = engine.compile("test", b.finish()).unwrap();

    let result = template
        .render(value! { divide: false })
        .to_string()
        .unwrap();
    assert_eq!(result, "skipped");

    let err = template
        .render(value! { divide: true })
        .to_string()
        .unwrap_err();
    assert!(err.is_invalid_operation());
}

#[test]
fn folded_constant_respects_render_locale_settings() {
    let mut b = Builder::new();
    b.setting("number_format", string("0.0"));
    b.interpolate(int(3));
    assert_eq!(render(b, value! {}).unwrap(), "3.0");
}

#[test]
fn folded_number_formatting_follows_setting_changes() {
    let settings = Settings {
        number_format: String::from("c"),
        ..Settings::default()
    };
    let mut b = Builder::new();
    b.setting("number_format", string("0.00"));
    b.interpolate(builtin(paren(add(float(1.0), float(0.5))), "string", vec![]).unwrap());
    b.text("|");
    b.interpolate(builtin(paren(add(var("x"), float(0.5))), "string", vec![]).unwrap());
    let result = Engine::with_settings(settings)
        .compile("test", b.finish())
        .unwrap()
        .render(value! { x: 1.0 })
        .to_string()
        .unwrap();
    assert_eq!(result, "1.50|1.50");
}

type Case = (Value, fn(Expr) -> Expr);

fn case(value: impl Into<Value>, f: fn(Expr) -> Expr) -> Case {
    (value.into(), f)
}

fn bi(target: Expr, name: &str, args: Vec<Expr>) -> Expr {
    builtin(target, name, args).unwrap()
}

#[test]
fn folding_matches_render_time_evaluation() {
    let cases = [
        case(7, |x| add(x, int(2))),
        case(7, |x| sub(x, int(9))),
        case(7, |x| mul(x, float(1.5))),
        case(7, |x| div(x, int(2))),
        case(7, |x| rem(x, int(4))),
        case(7, |x| gt(x, int(3))),
        case("ab", |x| add(x, string("c"))),
        case(1.5, |x| add(x, string("!"))),
        case("Hello World", |x| bi(x, "upper_case", vec![])),
        case("  pad ", |x| bi(x, "trim", vec![])),
        case("héllo", |x| bi(x, "length", vec![])),
        case("a,b,c", |x| {
            bi(bi(x, "split", vec![string(",")]), "join", vec![string("-")])
        }),
        case(2.5, |x| bi(x, "round", vec![])),
        case(-3, |x| bi(x, "abs", vec![])),
        case(1.5, |x| bi(x, "string", vec![])),
        case(1.5, |x| bi(x, "c", vec![])),
        case(vec![3, 1, 2], |x| {
            bi(bi(x, "sort", vec![]), "join", vec![string(",")])
        }),
        case(vec![3, 1, 2], |x| bi(x, "size", vec![])),
        case(true, |x| bi(x, "then", vec![string("yes"), string("no")])),
        case(true, not),
    ];

    for setting in [None, Some("0.000")] {
        let settings = Settings {
            number_format: String::from("c"),
            ..Settings::default()
        };
        let mut b = Builder::new();
        if let Some(format) = setting {
            b.setting("number_format", string(format));
        }
        let mut data = Map::new();
        for (i, (value, f)) in cases.iter().enumerate() {
            let name = format!("x{i}");
            data.insert(name.clone(), value.clone());
            b.interpolate(f(lit(value.clone())));
            b.text("=");
            b.interpolate(f(var(name)));
            b.text("\n");
        }
        let result = Engine::with_settings(settings)
            .compile("test", b.finish())
            .unwrap()
            .render_from(&Value::Map(data))
            .to_string()
            .unwrap();
        for (i, line) in result.lines().enumerate() {
            let (folded, evaluated) = line.split_once('=').unwrap();
            assert_eq!(folded, evaluated, "case {i} with number_format {setting:?}");
        }
        assert_eq!(result.lines().count(), cases.len());
    }
}

#[test]
fn setting_err_invalid_value() {
    let mut b = Builder::new();
    b.setting("boolean_format", string("maybe"));
    let err = render(b, value! {}).unwrap_err();
    assert!(err.is_invalid_operation());
}

#[test]
fn builtin_err_arity_at_construction() {
    let err = builtin(var("x"), "upper_case", vec![int(1)]).unwrap_err();
    assert_eq!(
        err.message(),
        "`?upper_case` takes 0 argument(s) but 1 were given"
    );
    let err = builtin(var("x"), "no_such_thing", vec![]).unwrap_err();
    assert!(err.is_invalid_operation());
}
