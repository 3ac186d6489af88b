use pretty_assertions::assert_eq;

use scribe::expr::{
    add, boolean, builtin, default, dot, float, gt, hash, index, int, list, mul, range, special,
    string, var,
};
use scribe::{case, value, AssignOp, AssignScope, Builder, CaseTest, Engine, LoopVars, Value};

fn render(b: Builder, data: Value) -> scribe::Result<String> {
    Engine::new()
        .compile("test", b.finish())?
        .render(data)
        .to_string()
}

#[test]
fn render_arithmetic() {
    let mut b = Builder::new();
    b.interpolate(add(int(1), int(2)));
    assert_eq!(render(b, value! {}).unwrap(), "3");
}

#[test]
fn render_text_and_members() {
    let mut b = Builder::new();
    b.text("Hello ")
        .interpolate(dot(var("user"), "name"))
        .text(" #")
        .interpolate(index(var("ids"), int(1)));
    let result = render(b, value! { user: { name: "Ann" }, ids: [7, 8] }).unwrap();
    assert_eq!(result, "Hello Ann #8");
}

#[test]
fn render_numbers_and_booleans() {
    let mut b = Builder::new();
    b.interpolate(mul(float(1.5), int(2)))
        .text(" ")
        .interpolate(float(0.25))
        .text(" ")
        .interpolate(gt(int(2), int(1)));
    assert_eq!(render(b, value! {}).unwrap(), "3 0.25 true");
}

#[test]
fn render_boolean_format_setting() {
    let mut b = Builder::new();
    b.setting("boolean_format", string("yes,no"));
    b.interpolate(var("on")).text("/").interpolate(var("off"));
    let result = render(b, value! { on: true, off: false }).unwrap();
    assert_eq!(result, "yes/no");
}

#[test]
fn render_err_undefined_variable() {
    let mut b = Builder::new();
    b.interpolate(var("missing"));
    let err = render(b, value! {}).unwrap_err();
    assert!(err.is_undefined());
    assert_eq!(err.message(), "`missing` is undefined");
}

#[test]
fn render_default_operator() {
    let mut b = Builder::new();
    b.interpolate(default(var("missing"), Some(string("none"))));
    b.text("|");
    b.interpolate(default(var("missing"), None));
    b.text("|");
    b.interpolate(default(var("present"), Some(string("none"))));
    let result = render(b, value! { present: "here" }).unwrap();
    assert_eq!(result, "none||here");
}

#[test]
fn render_err_null_interpolation() {
    let mut b = Builder::new();
    b.interpolate(var("nothing"));
    let err = render(b, value! { nothing: None }).unwrap_err();
    assert!(err.is_undefined());
}

#[test]
fn render_err_interpolating_a_sequence() {
    let mut b = Builder::new();
    b.interpolate(var("xs"));
    let err = render(b, value! { xs: [1, 2] }).unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(
        err.message(),
        "expected string, number, date or boolean, but expression evaluated to sequence"
    );
}

#[test]
fn render_if_else() {
    let mut b = Builder::new();
    b.if_else(
        var("admin"),
        |b| {
            b.text("admin");
        },
        |b| {
            b.text("guest");
        },
    );
    assert_eq!(render(b, value! { admin: false }).unwrap(), "guest");
}

#[test]
fn render_elseif_chain() {
    let mut b = Builder::new();
    b.choose(
        vec![
            (
                gt(var("n"), int(10)),
                Box::new(|b: &mut Builder| {
                    b.text("big");
                }),
            ),
            (
                gt(var("n"), int(5)),
                Box::new(|b: &mut Builder| {
                    b.text("medium");
                }),
            ),
        ],
        Some(Box::new(|b: &mut Builder| {
            b.text("small");
        })),
    );
    assert_eq!(render(b, value! { n: 7 }).unwrap(), "medium");
}

#[test]
fn render_err_if_not_boolean() {
    let mut b = Builder::new();
    b.if_(var("name"), |b| {
        b.text("yes");
    });
    let err = render(b, value! { name: "Ann" }).unwrap_err();
    assert!(err.is_type_mismatch());
}

#[test]
fn render_list_with_sep() {
    let mut b = Builder::new();
    b.list(var("xs"), "x", |b| {
        b.interpolate(var("x"));
        b.sep(|b| {
            b.text(", ");
        });
    });
    let result = render(b, value! { xs: ["a", "b", "c"] }).unwrap();
    assert_eq!(result, "a, b, c");
}

#[test]
fn render_list_else_on_empty() {
    let mut b = Builder::new();
    b.list_else(
        var("xs"),
        LoopVars::Item("x".into()),
        |b| {
            b.interpolate(var("x"));
        },
        Some(Box::new(|b: &mut Builder| {
            b.text("empty");
        })),
    );
    assert_eq!(render(b, value! { xs: [] }).unwrap(), "empty");
}

#[test]
fn render_list_range() {
    let mut b = Builder::new();
    b.list(range(int(1), int(4)), "i", |b| {
        b.interpolate(var("i"));
    });
    assert_eq!(render(b, value! {}).unwrap(), "1234");
}

#[test]
fn render_list_hash_pairs() {
    let mut b = Builder::new();
    b.list_pairs(var("ages"), "name", "age", |b| {
        b.interpolate(var("name"))
            .text("=")
            .interpolate(var("age"))
            .text(";");
    });
    let result = render(b, value! { ages: { bob: 30, ann: 25 } }).unwrap();
    assert_eq!(result, "ann=25;bob=30;");
}

#[test]
fn render_list_loop_builtins() {
    let mut b = Builder::new();
    b.list(var("xs"), "x", |b| {
        let cycle = vec![string("a"), string("b"), string("c")];
        b.interpolate(builtin(var("x"), "counter", vec![]).unwrap())
            .text(":")
            .interpolate(builtin(var("x"), "item_parity", vec![]).unwrap())
            .text(":")
            .interpolate(builtin(var("x"), "item_cycle", cycle).unwrap());
        b.if_(builtin(var("x"), "is_last", vec![]).unwrap(), |b| {
            b.text("!");
        });
        b.text(" ");
    });
    let result = render(b, value! { xs: [10, 20, 30, 40] }).unwrap();
    assert_eq!(result, "1:odd:a 2:even:b 3:odd:c 4:even:a! ");
}

#[test]
fn render_err_loop_builtin_outside_loop() {
    let mut b = Builder::new();
    b.interpolate(builtin(var("x"), "index", vec![]).unwrap());
    let err = render(b, value! { x: 1 }).unwrap_err();
    assert!(err.is_invalid_operation());
}

#[test]
fn render_break_in_list() {
    let mut b = Builder::new();
    b.list(var("xs"), "x", |b| {
        b.interpolate(var("x"));
        b.if_(scribe::expr::eq(var("x"), int(2)), |b| {
            b.break_();
        });
    });
    b.text(" after");
    let result = render(b, value! { xs: [1, 2, 3, 4] }).unwrap();
    assert_eq!(result, "12 after");
}

#[test]
fn render_switch_falls_through_until_break() {
    let mut b = Builder::new();
    b.switch(
        var("n"),
        vec![
            case(CaseTest::Case(vec![int(1)]), |b| {
                b.text("one ");
            }),
            case(CaseTest::Case(vec![int(2)]), |b| {
                b.text("two ");
            }),
            case(CaseTest::Case(vec![int(3)]), |b| {
                b.text("three ");
                b.break_();
            }),
            case(CaseTest::Default, |b| {
                b.text("many");
            }),
        ],
    );
    assert_eq!(render(b, value! { n: 2 }).unwrap(), "two three ");
}

#[test]
fn render_switch_on_does_not_fall_through() {
    let mut b = Builder::new();
    b.switch(
        var("s"),
        vec![
            case(CaseTest::On(vec![string("a"), string("b")]), |b| {
                b.text("ab");
            }),
            case(CaseTest::On(vec![string("c")]), |b| {
                b.text("c");
            }),
            case(CaseTest::Default, |b| {
                b.text("other");
            }),
        ],
    );
    assert_eq!(render(b, value! { s: "b" }).unwrap(), "ab");
}

#[test]
fn render_switch_default() {
    let mut b = Builder::new();
    b.switch(
        var("n"),
        vec![
            case(CaseTest::Case(vec![int(1)]), |b| {
                b.text("one");
            }),
            case(CaseTest::Default, |b| {
                b.text("other");
            }),
        ],
    );
    assert_eq!(render(b, value! { n: 9 }).unwrap(), "other");
}

#[test]
fn render_assignments() {
    let mut b = Builder::new();
    b.assign("x", int(1));
    b.assign_with(AssignScope::Namespace, "x", AssignOp::Add, Some(int(4)));
    b.assign_with(AssignScope::Namespace, "x", AssignOp::Increment, None);
    b.interpolate(var("x"));
    assert_eq!(render(b, value! {}).unwrap(), "6");
}

#[test]
fn render_assign_shadows_data_model() {
    let mut b = Builder::new();
    b.interpolate(var("x")).text(" ");
    b.assign("x", string("template"));
    b.interpolate(var("x"));
    let result = render(b, value! { x: "data" }).unwrap();
    assert_eq!(result, "data template");
}

#[test]
fn render_capture() {
    let mut b = Builder::new();
    b.capture(AssignScope::Namespace, "greeting", |b| {
        b.text("Hi ").interpolate(var("name"));
    });
    b.text("[").interpolate(var("greeting")).text("]");
    let result = render(b, value! { name: "Ann" }).unwrap();
    assert_eq!(result, "[Hi Ann]");
}

#[test]
fn render_local_in_block_scope() {
    let mut b = Builder::new();
    b.list(var("xs"), "x", |b| {
        b.local("doubled", mul(var("x"), int(2)));
        b.interpolate(var("doubled"));
    });
    b.interpolate(default(var("doubled"), Some(string("-"))));
    let result = render(b, value! { xs: [1, 2] }).unwrap();
    assert_eq!(result, "24-");
}

#[test]
fn render_hash_and_list_literals() {
    let mut b = Builder::new();
    b.interpolate(dot(
        hash(vec![(string("a"), int(1)), (string("b"), int(2))]),
        "b",
    ));
    b.interpolate(builtin(list(vec![int(3), int(1), int(2)]), "size", vec![]).unwrap());
    assert_eq!(render(b, value! {}).unwrap(), "23");
}

#[test]
fn render_attempt_recover() {
    let mut b = Builder::new();
    b.attempt(
        |b| {
            b.text("partial ");
            b.interpolate(var("missing"));
        },
        |b| {
            b.text("recovered: ").interpolate(special("error").unwrap());
        },
    );
    let result = render(b, value! {}).unwrap();
    assert_eq!(result, "recovered: `missing` is undefined");
}

#[test]
fn render_attempt_success_writes_output() {
    let mut b = Builder::new();
    b.attempt(
        |b| {
            b.text("fine");
        },
        |b| {
            b.text("recovered");
        },
    );
    assert_eq!(render(b, value! {}).unwrap(), "fine");
}

#[test]
fn render_stop() {
    let mut b = Builder::new();
    b.text("before");
    b.stop(Some(string("halt")));
    b.text("after");
    let err = render(b, value! {}).unwrap_err();
    assert!(err.is_stopped());
    assert_eq!(err.message(), "halt");
}

#[test]
fn render_stop_is_not_recovered() {
    let mut b = Builder::new();
    b.attempt(
        |b| {
            b.stop(None);
        },
        |b| {
            b.text("recovered");
        },
    );
    let err = render(b, value! {}).unwrap_err();
    assert!(err.is_stopped());
    assert_eq!(err.message(), "render stopped");
}

#[test]
fn render_template_name_special() {
    let mut b = Builder::new();
    b.interpolate(special("template_name").unwrap());
    assert_eq!(render(b, value! {}).unwrap(), "test");
}

#[test]
fn render_err_is_located() {
    let mut b = Builder::with_source("Hi ${user}");
    b.text("Hi ");
    b.at(3..10).interpolate(var("user").at(5..9));
    let err = render(b, value! {}).unwrap_err();
    let location = err.location().unwrap();
    assert_eq!(&*location.template, "test");
    assert_eq!(
        err.to_string(),
        "`user` is undefined in template `test` between bytes 5 and 9"
    );
}

#[test]
fn render_with_locale_override() {
    let mut b = Builder::new();
    b.interpolate(special("lang").unwrap());
    let result = Engine::new()
        .compile("test", b.finish())
        .unwrap()
        .render(value! {})
        .with_locale("de_DE")
        .to_string()
        .unwrap();
    assert_eq!(result, "de");
}

#[test]
fn render_boolean_literal() {
    let mut b = Builder::new();
    b.if_(boolean(true), |b| {
        b.text("yes");
    });
    assert_eq!(render(b, value! {}).unwrap(), "yes");
}
