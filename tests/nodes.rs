use std::sync::{Arc, Weak};

use pretty_assertions::assert_eq;

use scribe::expr::{builtin, dot, special, string, var};
use scribe::{Builder, Engine, Map, Node, Value};

#[derive(Debug)]
struct Element {
    name: &'static str,
    kind: &'static str,
    text: Option<&'static str>,
    attrs: Vec<(&'static str, &'static str)>,
    parent: Weak<Element>,
    children: Vec<Arc<Element>>,
}

impl Node for Element {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn kind(&self) -> String {
        self.kind.to_owned()
    }

    fn parent(&self) -> Option<Arc<dyn Node>> {
        self.parent.upgrade().map(|p| p as Arc<dyn Node>)
    }

    fn children(&self) -> Vec<Arc<dyn Node>> {
        self.children
            .iter()
            .map(|c| c.clone() as Arc<dyn Node>)
            .collect()
    }

    fn text(&self) -> Option<String> {
        self.text.map(String::from)
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| Value::from(*v))
    }
}

/// `<doc><p class="lead">Hello</p><p>World</p></doc>`
fn document() -> Arc<Element> {
    Arc::new_cyclic(|doc: &Weak<Element>| {
        let paragraph = |class: Option<&'static str>, text: &'static str| {
            Arc::new_cyclic(|p: &Weak<Element>| Element {
                name: "p",
                kind: "element",
                text: None,
                attrs: class.map(|c| vec![("class", c)]).unwrap_or_default(),
                parent: doc.clone(),
                children: vec![Arc::new(Element {
                    name: "#text",
                    kind: "text",
                    text: Some(text),
                    attrs: Vec::new(),
                    parent: p.clone(),
                    children: Vec::new(),
                })],
            })
        };
        Element {
            name: "doc",
            kind: "document",
            text: None,
            attrs: Vec::new(),
            parent: Weak::new(),
            children: vec![paragraph(Some("lead"), "Hello"), paragraph(None, "World")],
        }
    })
}

fn data(doc: Arc<Element>) -> Value {
    let mut map = Map::new();
    map.insert(String::from("doc"), Value::Node(doc));
    Value::Map(map)
}

#[test]
fn visit_dispatches_on_node_name() {
    let mut b = Builder::new();
    b.macro_def("p", vec![], |b| {
        b.text("<p>").recurse(None, vec![]).text("</p>");
    });
    b.recurse(Some(var("doc")), vec![]);

    let doc = document();
    let data = data(doc);
    let engine = Engine::new();
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render_from(&data)
        .to_string()
        .unwrap();
    assert_eq!(result, "<p>Hello</p><p>World</p>");
}

#[test]
fn visit_dispatches_on_node_kind() {
    let mut b = Builder::new();
    b.macro_def("@element", vec![], |b| {
        b.text("[")
            .interpolate(builtin(special("node").unwrap(), "node_name", vec![]).unwrap())
            .text("]");
    });
    b.recurse(Some(var("doc")), vec![]);

    let data = data(document());
    let engine = Engine::new();
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render_from(&data)
        .to_string()
        .unwrap();
    assert_eq!(result, "[p][p]");
}

#[test]
fn visit_err_no_handler() {
    let mut b = Builder::new();
    b.visit(var("doc"), vec![]);

    let data = data(document());
    let engine = Engine::new();
    let err = engine
        .compile("test", b.finish())
        .unwrap()
        .render_from(&data)
        .to_string()
        .unwrap_err();
    assert_eq!(
        err.message(),
        "no handler for node `doc` of kind `document`"
    );
}

#[test]
fn visit_fallback_tries_next_namespace() {
    let mut engine = Engine::new();

    let mut fancy = Builder::new();
    fancy.macro_def("p", vec![], |b| {
        b.if_else(
            builtin(dot(special("node").unwrap(), "class"), "exists", vec![]).unwrap(),
            |b| {
                b.text("<p class=\"")
                    .interpolate(dot(special("node").unwrap(), "class"))
                    .text("\">")
                    .recurse(None, vec![])
                    .text("</p>");
            },
            |b| {
                b.fallback();
            },
        );
    });
    engine.add_template("fancy", fancy.finish()).unwrap();

    let mut b = Builder::new();
    b.import(string("fancy"), "fancy");
    b.macro_def("p", vec![], |b| {
        b.text("<p>").recurse(None, vec![]).text("</p>");
    });
    b.recurse(
        Some(var("doc")),
        vec![var("fancy"), special("main").unwrap()],
    );

    let data = data(document());
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render_from(&data)
        .to_string()
        .unwrap();
    assert_eq!(result, "<p class=\"lead\">Hello</p><p>World</p>");
}

#[test]
fn node_builtins() {
    let first = || {
        builtin(
            builtin(var("doc"), "children", vec![]).unwrap(),
            "first",
            vec![],
        )
        .unwrap()
    };
    let mut b = Builder::new();
    b.interpolate(builtin(first(), "node_name", vec![]).unwrap());
    b.text(" ");
    b.interpolate(builtin(first(), "node_type", vec![]).unwrap());
    b.text(" ");
    let parent = builtin(first(), "parent", vec![]).unwrap();
    b.interpolate(builtin(parent, "node_name", vec![]).unwrap());
    b.text(" ");
    b.interpolate(builtin(first(), "is_node", vec![]).unwrap());

    let data = data(document());
    let engine = Engine::new();
    let result = engine
        .compile("test", b.finish())
        .unwrap()
        .render_from(&data)
        .to_string()
        .unwrap();
    assert_eq!(result, "p element doc true");
}
