use crate::types::ast::LoopVars;
use crate::value::{Capabilities, ListIntoIter, Value};
use crate::{Error, Result};

/// One step of a `#list`.
#[derive(Debug, Clone)]
pub enum Item {
    Single(Value),
    Pair(Value, Value),
}

type Items = Box<dyn Iterator<Item = Result<Item>>>;

/// The current state of a loop iteration.
///
/// The next item is fetched one step ahead so that `?has_next` and `#sep`
/// work on single-pass collections.
pub struct LoopState {
    vars: LoopVars,
    items: Items,
    current: Option<Item>,
    next: Option<Item>,
    /// Zero based index of `current`.
    index: usize,
}

impl std::fmt::Debug for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopState")
            .field("vars", &self.vars)
            .field("current", &self.current)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl LoopState {
    pub fn new(vars: LoopVars, mut items: Items) -> Result<Self> {
        let next = items.next().transpose()?;
        Ok(Self {
            vars,
            items,
            current: None,
            next,
            index: 0,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.next.is_none()
    }

    /// Moves to the next item, returning `false` when the loop is done.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(next) = self.next.take() else {
            self.current = None;
            return Ok(false);
        };
        if self.current.is_some() {
            self.index += 1;
        }
        self.current = Some(next);
        self.next = self.items.next().transpose()?;
        Ok(true)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// The variable the loop built-ins apply to.
    pub fn item_name(&self) -> &str {
        self.vars.item()
    }

    /// Looks up one of the loop variables.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        match (&self.vars, self.current.as_ref()?) {
            (LoopVars::Item(item), Item::Single(value)) if item == name => Some(value.clone()),
            (LoopVars::KeyValue(k, _), Item::Pair(key, _)) if k == name => Some(key.clone()),
            (LoopVars::KeyValue(_, v), Item::Pair(_, value)) if v == name => Some(value.clone()),
            _ => None,
        }
    }
}

fn pair((key, value): (String, Value)) -> Result<Item> {
    Ok(Item::Pair(Value::String(key), value))
}

/// Produces the items of a list or hash for the given loop variables.
///
/// `entries` yields the key/value pairs of values the renderer resolves
/// itself, such as namespaces.
pub fn items(
    value: Value,
    vars: &LoopVars,
    entries: Option<Vec<(String, Value)>>,
) -> Result<Items> {
    let pairs = matches!(vars, LoopVars::KeyValue(..));
    let kind = value.kind_name();
    let expected = || Error::expected("sequence, collection or hash", kind);
    let unpack_list = || {
        Error::type_mismatch(format!(
            "cannot unpack {kind} item into two variables"
        ))
    };
    let unpack_map = || {
        Error::type_mismatch("cannot unpack hash item into one variable; list it `as key, value`")
    };

    if let Some(entries) = entries {
        if !pairs {
            return Err(unpack_map());
        }
        return Ok(Box::new(entries.into_iter().map(pair)));
    }

    match value {
        Value::List(list) => {
            if pairs {
                return Err(unpack_list());
            }
            let iter: ListIntoIter = list.into_iter();
            Ok(Box::new(iter.map(|v| Ok(Item::Single(v)))))
        }
        Value::Map(map) => {
            if !pairs {
                return Err(unpack_map());
            }
            Ok(Box::new(map.into_iter().map(pair)))
        }
        Value::Object(obj) => {
            let caps = obj.capabilities();
            let listable = caps.intersects(Capabilities::SEQUENCE | Capabilities::COLLECTION);
            if caps.contains(Capabilities::ENUMERABLE_HASH) && (pairs || !listable) {
                if !pairs {
                    return Err(unpack_map());
                }
                let keys = obj.keys().unwrap_or_default();
                let values = obj.values().unwrap_or_default();
                return Ok(Box::new(
                    keys.into_iter()
                        .zip(values)
                        .map(|(k, v)| Ok(Item::Pair(k, v))),
                ));
            }
            if pairs {
                return Err(unpack_list());
            }
            if caps.contains(Capabilities::SEQUENCE) {
                let len = obj.len().unwrap_or(0);
                return Ok(Box::new((0..len).map(move |i| -> Result<Item> {
                    let item = obj.get_index(i)?;
                    Ok(Item::Single(item.unwrap_or(Value::Null)))
                })));
            }
            if caps.contains(Capabilities::COLLECTION) {
                return match obj.iter() {
                    Some(iter) => Ok(Box::new(iter.map(|v| Ok(Item::Single(v))))),
                    None => Err(Error::invalid("the collection has already been listed")),
                };
            }
            Err(expected())
        }
        _ => Err(expected()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(value: Value, vars: LoopVars) -> LoopState {
        LoopState::new(vars.clone(), items(value, &vars, None).unwrap()).unwrap()
    }

    #[test]
    fn looks_one_item_ahead() {
        let mut s = state(Value::from(vec![1, 2]), LoopVars::Item("x".into()));
        assert!(!s.is_empty());
        assert!(s.advance().unwrap());
        assert_eq!(s.index(), 0);
        assert!(s.has_next());
        assert_eq!(s.resolve("x"), Some(Value::from(1)));
        assert!(s.advance().unwrap());
        assert_eq!(s.index(), 1);
        assert!(!s.has_next());
        assert!(!s.advance().unwrap());
    }

    #[test]
    fn hashes_need_two_variables() {
        let map = Value::from([("a", 1)]);
        let vars = LoopVars::Item("x".into());
        let err = items(map.clone(), &vars, None).err().unwrap();
        assert!(err.is_type_mismatch());

        let mut s = state(map, LoopVars::KeyValue("k".into(), "v".into()));
        assert!(s.advance().unwrap());
        assert_eq!(s.resolve("k"), Some(Value::from("a")));
        assert_eq!(s.resolve("v"), Some(Value::from(1)));
        assert_eq!(s.item_name(), "v");
    }

    #[test]
    fn non_iterables_fail() {
        let vars = LoopVars::Item("x".into());
        let err = items(Value::from(1), &vars, None).err().unwrap();
        assert_eq!(
            err.to_string(),
            "expected sequence, collection or hash, but expression evaluated to number"
        );
    }
}
