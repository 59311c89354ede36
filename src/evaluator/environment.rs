//! Chained environment frames.
//!
//! A frame maps names to values and links to its parent; the frame without a
//! parent is the root. Frames are shared handles: procedures capture the frame
//! they were created in and keep it alive after the creating call returns.

use crate::Error;
use crate::ast::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<EnvRef>,
}

/// Shared handle to an environment frame
#[derive(Clone)]
pub struct EnvRef(Rc<RefCell<Frame>>);

impl EnvRef {
    /// Create a frame with no parent
    pub fn new_root() -> Self {
        EnvRef(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: None,
        })))
    }

    /// Create an empty frame whose parent is `self`
    pub fn new_child(&self) -> Self {
        EnvRef(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.0.borrow().parent.clone()
    }

    pub fn is_root(&self) -> bool {
        self.0.borrow().parent.is_none()
    }

    /// The root frame at the end of this chain
    pub fn root(&self) -> EnvRef {
        let mut frame = self.clone();
        while let Some(parent) = frame.parent() {
            frame = parent;
        }
        frame
    }

    pub fn ptr_eq(&self, other: &EnvRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The nearest frame, starting here, that binds `name`
    fn find_frame(&self, name: &str) -> Option<EnvRef> {
        let mut frame = self.clone();
        loop {
            if frame.0.borrow().bindings.contains_key(name) {
                return Some(frame);
            }
            frame = frame.parent()?;
        }
    }

    /// Value of the nearest binding of `name`
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let frame = self
            .find_frame(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))?;
        let value = frame.0.borrow().bindings.get(name).cloned();
        value.ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// Replace the value of the nearest existing binding of `name`
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let frame = self
            .find_frame(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))?;
        // Release the frame borrow before the old value is dropped
        let previous = frame.0.borrow_mut().bindings.insert(name.to_owned(), value);
        drop(previous);
        Ok(())
    }

    /// Bind `name`, overwriting the nearest existing binding anywhere in the chain.
    ///
    /// A name bound nowhere in the chain is installed in the root frame, not in
    /// this one, so a `define` inside a procedure body creates a global.
    pub fn define(&self, name: &str, value: Value) {
        let frame = match self.find_frame(name) {
            Some(frame) => frame,
            None => {
                if !self.is_root() {
                    debug!("define of unbound `{name}` from a nested frame binds it in the root frame");
                }
                self.root()
            }
        };
        // Release the frame borrow before the old value is dropped
        let previous = frame.0.borrow_mut().bindings.insert(name.to_owned(), value);
        drop(previous);
    }

    /// Create a child frame binding each parameter to the argument in the same position
    pub fn extend(&self, params: &[Rc<str>], args: Vec<Value>) -> Result<EnvRef, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_error(params.len(), args.len()));
        }

        let child = self.new_child();
        {
            let mut frame = child.0.borrow_mut();
            for (param, arg) in params.iter().zip(args) {
                frame.bindings.insert(param.to_string(), arg);
            }
        }
        Ok(child)
    }

    /// All bindings visible from this frame, inner bindings shadowing outer ones,
    /// sorted by name
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut visible: HashMap<String, Value> = HashMap::new();
        let mut frame = Some(self.clone());
        while let Some(current) = frame {
            for (name, value) in &current.0.borrow().bindings {
                visible
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            frame = current.parent();
        }

        let mut result: Vec<_> = visible.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Remove every binding in this frame, breaking reference cycles through it
    pub(crate) fn clear(&self) {
        let bindings = std::mem::take(&mut self.0.borrow_mut().bindings);
        drop(bindings);
    }
}

impl PartialEq for EnvRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for EnvRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnvRef({} bindings)", self.0.borrow().bindings.len())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    fn names(list: &[&str]) -> Vec<Rc<str>> {
        list.iter().map(|name| Rc::from(*name)).collect()
    }

    #[test]
    fn test_lookup_walks_the_chain() {
        let root = EnvRef::new_root();
        root.define("x", val(1));
        root.define("y", val(2));
        let child = root.extend(&names(&["x"]), vec![val(10)]).unwrap();

        assert_eq!(child.lookup("x").unwrap(), val(10));
        assert_eq!(child.lookup("y").unwrap(), val(2));
        assert_eq!(root.lookup("x").unwrap(), val(1));
        assert_eq!(
            child.lookup("zzz").unwrap_err(),
            Error::UnboundVariable("zzz".into())
        );
    }

    #[test]
    fn test_set_mutates_existing_binding_in_place() {
        let root = EnvRef::new_root();
        root.define("x", val(1));
        let child = root.new_child();

        child.set("x", val(5)).unwrap();
        assert_eq!(root.lookup("x").unwrap(), val(5));
        assert!(child.0.borrow().bindings.is_empty());

        assert_eq!(
            child.set("missing", val(0)).unwrap_err(),
            Error::UnboundVariable("missing".into())
        );
    }

    #[test]
    fn test_define_overwrites_nearest_binding_or_falls_through_to_root() {
        let root = EnvRef::new_root();
        root.define("outer", val(1));
        let middle = root.extend(&names(&["local"]), vec![val(2)]).unwrap();
        let inner = middle.new_child();

        // Existing binding in an ancestor frame is overwritten there
        inner.define("local", val(20));
        assert_eq!(middle.lookup("local").unwrap(), val(20));
        assert!(inner.0.borrow().bindings.is_empty());

        inner.define("outer", val(100));
        assert_eq!(root.lookup("outer").unwrap(), val(100));

        // Unbound names are installed in the root frame
        inner.define("fresh", sym("yes"));
        assert_eq!(root.lookup("fresh").unwrap(), sym("yes"));
        assert!(!middle.0.borrow().bindings.contains_key("fresh"));
    }

    #[test]
    fn test_extend_arity() {
        let root = EnvRef::new_root();
        let params = names(&["a", "b"]);

        let frame = root.extend(&params, vec![val(1), val(2)]).unwrap();
        assert_eq!(frame.lookup("b").unwrap(), val(2));
        assert!(frame.parent().unwrap().ptr_eq(&root));

        let too_many = root.extend(&params, vec![val(1), val(2), val(3)]).unwrap_err();
        assert!(too_many.is_too_many());
        assert!(format!("{too_many}").contains("too many arguments"));

        let too_few = root.extend(&params, vec![val(1)]).unwrap_err();
        assert!(too_few.is_too_few());
        assert!(format!("{too_few}").contains("too few arguments"));

        let empty = root.extend(&[], vec![]).unwrap();
        assert!(!empty.is_root());
    }

    #[test]
    fn test_root_and_bindings_snapshot() {
        let root = EnvRef::new_root();
        root.define("b", val(1));
        root.define("a", val(2));
        let child = root.extend(&names(&["b"]), vec![val(3)]).unwrap();

        assert!(root.is_root());
        assert!(child.root().ptr_eq(&root));
        assert_eq!(
            child.bindings(),
            vec![("a".to_owned(), val(2)), ("b".to_owned(), val(3))]
        );

        root.clear();
        assert!(root.bindings().is_empty());
    }
}
