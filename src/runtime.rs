use std::{
    cell::RefCell,
    collections::HashMap,
    fmt, io,
    rc::Rc,
};

use crate::{
    ast::FunctionDecl,
    types::Type,
    util::intern::{Name, NameTable},
};

/// The native functions seeded into every global scope, with their arities.
///
/// The resolver and the type checker consult this table too, so a native
/// call passes static analysis without special cases.
pub const NATIVES: &[(&str, usize)] = &[("println", 1)];

pub type NativeFn = fn(&mut dyn io::Write, &[Value]) -> io::Result<Value>;

/// A runtime value. Numbers are uniformly `f64`; integer literals are
/// widened on evaluation.
#[derive(Clone, Debug)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Str(Rc<str>),
    Callable(Rc<Callable>),
}

impl Value {
    /// `Bool` values are themselves; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            _ => true,
        }
    }
}

impl PartialEq for Value {
    /// Equality across the value's variant shape: different shapes are
    /// never equal, callables are compared by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Integral numbers print without a trailing fraction, so a
            // widened integer literal round-trips through `println`.
            Value::Num(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{n:.0}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::Callable(_) => f.write_str("<fn>"),
        }
    }
}

/// A callable runtime value: a native function or a closure over a source
/// declaration.
pub struct Callable {
    pub name: Name,
    pub kind: CallableKind,
}

pub enum CallableKind {
    Native {
        arity: usize,
        func: NativeFn,
    },
    Declared {
        decl: Rc<FunctionDecl<Type>>,
        /// The environment the function was declared in; calls execute in
        /// a fresh child of this environment (lexical scoping).
        closure: EnvRef,
    },
}

impl Callable {
    pub fn arity(&self) -> usize {
        match &self.kind {
            CallableKind::Native { arity, .. } => *arity,
            CallableKind::Declared { decl, .. } => decl.params.len(),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CallableKind::Native { arity, .. } => {
                write!(f, "Callable::Native({:?}, arity {arity})", self.name)
            }
            CallableKind::Declared { .. } => write!(f, "Callable::Declared({:?})", self.name),
        }
    }
}

pub type EnvRef = Rc<RefCell<Environment>>;

/// A scope record mapping identifiers to runtime values.
///
/// Environments form a tree through the parent handle; the strong
/// reference runs child to parent only, so closures keep their captured
/// scopes alive without creating cycles.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<Name, Value>,
    parent: Option<EnvRef>,
}

impl Environment {
    /// Creates the root environment with every native function installed.
    pub fn global(names: &mut NameTable) -> EnvRef {
        let mut env = Environment::default();
        for &(native, arity) in NATIVES {
            let name = names.intern(native);
            let func = match native {
                "println" => native_println as NativeFn,
                _ => unreachable!("unknown native"),
            };
            let callable = Callable {
                name,
                kind: CallableKind::Native { arity, func },
            };
            env.values.insert(name, Value::Callable(Rc::new(callable)));
        }
        Rc::new(RefCell::new(env))
    }

    pub fn with_parent(parent: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            parent: Some(parent),
        }))
    }

    /// Binds (or rebinds) a name in this scope.
    pub fn define(&mut self, name: Name, value: Value) {
        self.values.insert(name, value);
    }

    /// Looks a name up, walking the parent chain outwards.
    pub fn get(env: &EnvRef, name: Name) -> Option<Value> {
        let mut current = Rc::clone(env);
        loop {
            let next = {
                let env = current.borrow();
                if let Some(value) = env.values.get(&name) {
                    return Some(value.clone());
                }
                env.parent.clone()
            };
            current = next?;
        }
    }

    /// Assigns to the nearest enclosing scope that holds the name. Returns
    /// `false` when no scope does.
    pub fn assign(env: &EnvRef, name: Name, value: Value) -> bool {
        let mut current = Rc::clone(env);
        loop {
            let next = {
                let mut env = current.borrow_mut();
                if env.values.contains_key(&name) {
                    env.values.insert(name, value);
                    return true;
                }
                env.parent.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

fn native_println(out: &mut dyn io::Write, args: &[Value]) -> io::Result<Value> {
    writeln!(out, "{}", args[0])?;
    Ok(Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names() -> NameTable {
        NameTable::with_capacity(8)
    }

    #[test]
    fn lookup_walks_the_parent_chain() {
        let mut names = names();
        let x = names.intern("x");

        let root = Environment::global(&mut names);
        root.borrow_mut().define(x, Value::Num(1.0));

        let child = Environment::with_parent(Rc::clone(&root));
        let grandchild = Environment::with_parent(Rc::clone(&child));

        assert_eq!(Environment::get(&grandchild, x), Some(Value::Num(1.0)));
    }

    #[test]
    fn inner_definitions_shadow_without_clobbering() {
        let mut names = names();
        let x = names.intern("x");

        let root = Environment::global(&mut names);
        root.borrow_mut().define(x, Value::Num(1.0));

        let child = Environment::with_parent(Rc::clone(&root));
        child.borrow_mut().define(x, Value::Num(2.0));

        assert_eq!(Environment::get(&child, x), Some(Value::Num(2.0)));
        assert_eq!(Environment::get(&root, x), Some(Value::Num(1.0)));
    }

    #[test]
    fn assignment_targets_the_nearest_holding_scope() {
        let mut names = names();
        let x = names.intern("x");
        let y = names.intern("y");

        let root = Environment::global(&mut names);
        root.borrow_mut().define(x, Value::Num(1.0));
        let child = Environment::with_parent(Rc::clone(&root));

        assert!(Environment::assign(&child, x, Value::Num(5.0)));
        assert_eq!(Environment::get(&root, x), Some(Value::Num(5.0)));

        assert!(!Environment::assign(&child, y, Value::Num(0.0)));
    }

    #[test]
    fn truthiness_maps_bool_to_itself_and_everything_else_to_true() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Num(0.0).is_truthy());
        assert!(Value::Str(Rc::from("")).is_truthy());
    }

    #[test]
    fn equality_is_shape_aware() {
        assert_eq!(Value::Num(5.0), Value::Num(5.0));
        assert_ne!(Value::Num(1.0), Value::Bool(true));
        assert_eq!(Value::Str(Rc::from("a")), Value::Str(Rc::from("a")));
        assert_ne!(Value::Str(Rc::from("a")), Value::Str(Rc::from("b")));
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::Num(123.0).to_string(), "123");
        assert_eq!(Value::Num(1.5).to_string(), "1.5");
        assert_eq!(Value::Num(-3.0).to_string(), "-3");
    }

    #[test]
    fn println_writes_the_value_and_a_newline() {
        let mut out = Vec::new();
        let result = native_println(&mut out, &[Value::Num(123.0)]).unwrap();
        assert_eq!(out, b"123\n");
        assert_eq!(result, Value::Bool(false));
    }
}
