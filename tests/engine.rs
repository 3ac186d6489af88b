mod helpers;

use std::io;
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;

use scribe::expr::{builtin, call, dot, index, int, string, var};
use scribe::{
    value, Body, Builder, CallArgs, Cancellation, Capabilities, Directive, Engine, Environment,
    ErrorKind, Formats, Map, Number, Object, Settings, Unwind, Value,
};

use crate::helpers::Writer;

fn greeting() -> Builder {
    let mut b = Builder::new();
    b.text("Hello ").interpolate(var("name"));
    b
}

#[test]
fn engine_debug() {
    let mut engine = Engine::new();
    engine
        .add_template("greeting", greeting().finish())
        .unwrap();
    let _ = format!("{engine:?}");
    let _ = format!("{:?}", engine.get_template("greeting").unwrap());
}

#[test]
fn engine_send_and_sync() {
    let mut engine = Engine::new();
    engine
        .add_template("greeting", greeting().finish())
        .unwrap();
    let engine = Arc::new(engine);
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                engine
                    .get_template("greeting")
                    .unwrap()
                    .render(value! { name: "thread" })
                    .to_string()
                    .map(|s| format!("{s} {i}"))
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().unwrap(), format!("Hello thread {i}"));
    }
}

#[test]
fn engine_add_get_remove_template() {
    let mut engine = Engine::new();
    engine
        .add_template("greeting", greeting().finish())
        .unwrap();
    let template = engine.get_template("greeting").unwrap();
    assert_eq!(template.name(), "greeting");
    let result = template.render(value! { name: "Ann" }).to_string().unwrap();
    assert_eq!(result, "Hello Ann");

    assert!(engine.remove_template("greeting"));
    assert!(engine.get_template("greeting").is_none());
    assert!(!engine.remove_template("greeting"));
}

#[test]
fn engine_compile_err_is_located() {
    let mut b = Builder::with_source("<#break>");
    b.at(0..8).break_();
    let err = Engine::new().compile("broken", b.finish()).unwrap_err();
    assert!(err.is_compile());
    assert_eq!(
        err.to_string(),
        "#break must be inside a #list or #switch in template `broken` between bytes 0 and 8"
    );
    assert_eq!(
        format!("{err:#}"),
        "\n   |\n 1 | <#break>\n   | ^^^^^^^^ #break must be inside a #list or #switch\n"
    );
}

#[test]
fn engine_shared_variables() {
    let mut engine = Engine::new();
    engine.add_shared("site", "example.com");
    engine.add_shared("name", "shared");
    let template = engine.compile("greeting", greeting().finish()).unwrap();

    let result = template.render(value! {}).to_string().unwrap();
    assert_eq!(result, "Hello shared");
    // the data model comes first
    let result = template
        .render(value! { name: "data" })
        .to_string()
        .unwrap();
    assert_eq!(result, "Hello data");
}

#[test]
fn engine_add_function() {
    let mut engine = Engine::new();
    engine.add_function("repeat", |s: String, n: usize| s.repeat(n));
    engine.add_function("maybe", |v: Option<i64>| v.map(|i| i * 2).unwrap_or(-1));

    let mut b = Builder::new();
    b.interpolate(call(var("repeat"), vec![string("ab"), int(3)]));
    b.text(" ");
    b.interpolate(call(var("maybe"), vec![var("missing_is_null")]));
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! { missing_is_null: None })
        .to_string()
        .unwrap();
    assert_eq!(result, "ababab -1");
}

#[test]
fn engine_add_function_err_arguments() {
    let mut engine = Engine::new();
    engine.add_function("repeat", |s: String, n: usize| s.repeat(n));

    let mut b = Builder::new();
    b.interpolate(call(var("repeat"), vec![string("ab")]));
    let err = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! {})
        .to_string()
        .unwrap_err();
    assert_eq!(
        err.message(),
        "function `repeat` expected 2 argument(s), but 1 were given"
    );

    let mut b = Builder::new();
    b.interpolate(call(var("repeat"), vec![int(1), int(2)]));
    let err = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! {})
        .to_string()
        .unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(
        err.message(),
        "function `repeat` expected string for argument 1, found number"
    );
}

#[test]
fn engine_add_method() {
    let mut engine = Engine::new();
    engine.add_method("count", |args: Vec<Value>| {
        Ok::<_, scribe::Error>(Value::from(args.len()))
    });

    let mut b = Builder::new();
    b.interpolate(call(var("count"), vec![int(1), string("two"), var("xs")]));
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! { xs: [] })
        .to_string()
        .unwrap();
    assert_eq!(result, "3");
}

struct Shout;

impl Directive for Shout {
    fn execute(
        &self,
        env: &mut Environment<'_>,
        params: Map<String, Value>,
        body: Option<Body>,
    ) -> Result<(), Unwind> {
        let times = match params.get("times") {
            Some(v) => env.to_number(v)?.as_i64().unwrap_or(1),
            None => 1,
        };
        let Some(body) = body else {
            return Ok(());
        };
        for i in 0..times {
            let text = body.capture(env)?;
            env.write(&text.to_uppercase())?;
            if !body.loop_vars().is_empty() {
                body.render_with(env, vec![Value::from(i)])?;
            }
        }
        Ok(())
    }
}

#[test]
fn engine_add_directive() {
    let mut engine = Engine::new();
    engine.add_directive("shout", Shout);

    let mut b = Builder::new();
    b.call_with_body(
        var("shout"),
        CallArgs::Named(vec![(String::from("times"), int(2))]),
        &[],
        |b| {
            b.text("hi ").interpolate(var("name"));
        },
    );
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! { name: "ann" })
        .to_string()
        .unwrap();
    assert_eq!(result, "HI ANNHI ANN");
}

#[test]
fn engine_directive_err_positional_arguments() {
    let mut engine = Engine::new();
    engine.add_directive("shout", Shout);

    let mut b = Builder::new();
    b.call(var("shout"), CallArgs::Positional(vec![int(2)]));
    let err = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! {})
        .to_string()
        .unwrap_err();
    assert_eq!(err.message(), "directives only take named parameters");
}

struct Words;

impl Formats for Words {
    fn format_number(&self, n: Number, _format: &str, locale: &str) -> scribe::Result<String> {
        Ok(format!("{n}@{locale}"))
    }
}

#[test]
fn engine_set_formats() {
    let mut engine = Engine::new();
    engine.set_formats(Words);

    let mut b = Builder::new();
    b.interpolate(var("n"));
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! { n: 12 })
        .with_locale("fr_FR")
        .to_string()
        .unwrap();
    assert_eq!(result, "12@fr_FR");
}

#[test]
fn engine_template_settings() {
    let settings = Settings {
        number_format: String::from("0.00"),
        ..Settings::default()
    };
    let mut engine = Engine::new();
    let mut b = Builder::new();
    b.interpolate(var("n"));
    engine
        .add_template_with("money", b.finish(), settings)
        .unwrap();
    let result = engine
        .get_template("money")
        .unwrap()
        .render(value! { n: 3.5 })
        .to_string()
        .unwrap();
    assert_eq!(result, "3.50");
}

#[derive(Debug)]
struct Grid {
    cells: Vec<&'static str>,
}

impl Object for Grid {
    fn capabilities(&self) -> Capabilities {
        Capabilities::SEQUENCE | Capabilities::HASH
    }

    fn get(&self, key: &str) -> scribe::Result<Option<Value>> {
        Ok(match key {
            "width" => Some(Value::from(self.cells.len())),
            _ => None,
        })
    }

    fn get_index(&self, index: usize) -> scribe::Result<Option<Value>> {
        Ok(self.cells.get(index).map(|c| Value::from(*c)))
    }

    fn len(&self) -> Option<usize> {
        Some(self.cells.len())
    }
}

#[test]
fn render_from_host_object() {
    let grid: Arc<dyn Object> = Arc::new(Grid {
        cells: vec!["a", "b", "c"],
    });
    let mut data = Map::new();
    data.insert(String::from("grid"), Value::Object(grid));
    let data = Value::Map(data);

    let mut b = Builder::new();
    b.interpolate(dot(var("grid"), "width"));
    b.text(":");
    b.interpolate(index(var("grid"), int(1)));
    b.text(":");
    b.interpolate(builtin(var("grid"), "join", vec![string("-")]).unwrap());
    b.text(":");
    b.interpolate(builtin(var("grid"), "is_hash", vec![]).unwrap());

    let engine = Engine::new();
    let template = engine.compile("test", b.finish()).unwrap();
    let result = template.render_from(&data).to_string().unwrap();
    assert_eq!(result, "3:b:a-b-c:true");
}

#[test]
fn render_cancelled() {
    let cancel = Cancellation::new();
    let child = cancel.child();
    cancel.cancel();

    let mut b = Builder::new();
    b.list(var("xs"), "x", |b| {
        b.interpolate(var("x"));
    });
    let err = Engine::new()
        .compile("test", b.finish())
        .unwrap()
        .render(value! { xs: [1, 2, 3] })
        .with_cancellation(child)
        .to_string()
        .unwrap_err();
    assert!(err.is_stopped());
    assert_eq!(err.message(), "render cancelled");
}

#[test]
fn render_cancelled_during_loop() {
    let cancel = Cancellation::new();
    let token = cancel.clone();
    let mut engine = Engine::new();
    engine.add_method("cancel_render", move |_: Vec<Value>| {
        token.cancel();
        Ok::<_, scribe::Error>(Value::from(""))
    });

    let mut b = Builder::new();
    b.list(var("xs"), "x", |b| {
        b.interpolate(var("x"));
        b.if_(scribe::expr::eq(var("x"), int(2)), |b| {
            b.interpolate(call(var("cancel_render"), vec![]));
        });
    });
    b.text("unreachable");

    let mut w = Writer::new();
    let err = engine
        .compile("test", b.finish())
        .unwrap()
        .render(value! { xs: [1, 2, 3, 4] })
        .with_cancellation(cancel)
        .to_writer(&mut w)
        .unwrap_err();
    assert!(err.is_stopped());
    assert_eq!(err.message(), "render cancelled");
    assert_eq!(w.into_string(), "12");
}

#[test]
fn render_to_writer() {
    let mut w = Writer::new();
    Engine::new()
        .compile("greeting", greeting().finish())
        .unwrap()
        .render(value! { name: "Ann" })
        .to_writer(&mut w)
        .unwrap();
    assert_eq!(w.into_string(), "Hello Ann");
}

#[test]
fn render_to_writer_err() {
    let mut b = Builder::new();
    b.text("a").text("b").text("c");
    let mut w = Writer::failing_after(2);
    let err = Engine::new()
        .compile("test", b.finish())
        .unwrap()
        .render(value! {})
        .to_writer(&mut w)
        .unwrap_err();
    let ErrorKind::Io(io_err) = err.kind() else {
        panic!("expected io error, got {err:?}");
    };
    assert_eq!(io_err.kind(), io::ErrorKind::AddrInUse);
    assert_eq!(w.into_string(), "ab");
}

#[test]
fn render_with_serde_struct() {
    #[derive(serde::Serialize)]
    struct User {
        name: &'static str,
    }

    let result = Engine::new()
        .compile("greeting", greeting().finish())
        .unwrap()
        .render(User { name: "Bob" })
        .to_string()
        .unwrap();
    assert_eq!(result, "Hello Bob");
}
