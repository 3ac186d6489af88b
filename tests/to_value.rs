#![cfg(feature = "serde")]

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde::Serialize;

use scribe::{to_value, value, List, Map, Number, Value};

#[test]
fn to_value_scalars() {
    assert_eq!(to_value(true).unwrap(), Value::Bool(true));
    assert_eq!(to_value(-7_i8).unwrap(), Value::Number(Number::Int(-7)));
    assert_eq!(
        to_value(0.5_f32).unwrap(),
        Value::Number(Number::Float(0.5))
    );
    assert_eq!(to_value('a').unwrap(), Value::from("a"));
    assert_eq!(to_value("text").unwrap(), Value::from("text"));
}

#[test]
fn to_value_absent_values_are_null() {
    #[derive(Serialize)]
    struct Marker;

    assert_eq!(to_value(None::<i32>).unwrap(), Value::Null);
    assert_eq!(to_value(()).unwrap(), Value::Null);
    assert_eq!(to_value(Marker).unwrap(), Value::Null);
    assert_eq!(to_value(Some("x")).unwrap(), Value::from("x"));
}

#[test]
fn to_value_sequences() {
    #[derive(Serialize)]
    struct Triple(u8, u8, u8);

    let expected = Value::List(List::from([Value::from(1), Value::from(2), Value::from(3)]));
    assert_eq!(to_value(vec![1, 2, 3]).unwrap(), expected);
    assert_eq!(to_value((1, 2, 3)).unwrap(), expected);
    assert_eq!(to_value(Triple(1, 2, 3)).unwrap(), expected);
}

#[test]
fn to_value_enums() {
    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Line(i32, i32),
        Rect { w: u32, h: u32 },
    }

    assert_eq!(to_value(Shape::Point).unwrap(), Value::from("Point"));
    assert_eq!(
        to_value(Shape::Circle(1.5)).unwrap(),
        value! { Circle: 1.5 }
    );
    assert_eq!(
        to_value(Shape::Line(1, 2)).unwrap(),
        value! { Line: [1, 2] }
    );
    assert_eq!(
        to_value(Shape::Rect { w: 3, h: 4 }).unwrap(),
        value! { Rect: { w: 3, h: 4 } }
    );
}

#[test]
fn to_value_maps_and_structs() {
    #[derive(Serialize)]
    struct User {
        name: String,
        age: u32,
        tags: Vec<&'static str>,
    }

    let user = User {
        name: String::from("Ann"),
        age: 41,
        tags: vec!["admin"],
    };
    assert_eq!(
        to_value(user).unwrap(),
        value! { name: "Ann", age: 41, tags: ["admin"] }
    );

    let by_id = BTreeMap::from([(1, "one"), (2, "two")]);
    assert_eq!(
        to_value(by_id).unwrap(),
        Value::Map(Map::from([
            (String::from("1"), Value::from("one")),
            (String::from("2"), Value::from("two")),
        ]))
    );
}

#[test]
fn to_value_err_map_key() {
    let err = to_value(BTreeMap::from([((1, 2), "b")])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "hash key must be a string, number or boolean"
    );
}

#[test]
fn value_serializes_back() {
    let v = value! { list: [1, "two", None], flag: false };
    assert_eq!(to_value(&v).unwrap(), v);
}
