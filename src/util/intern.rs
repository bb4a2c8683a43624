use std::{collections::HashMap, fmt, rc::Rc};

/// A handle to an interned identifier. To retrieve the `&str`, use
/// [`NameTable::get`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Name(u32);

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Deduplicating store for identifier text.
///
/// All scope maps and runtime environments key by [`Name`], so identifier
/// comparison and hashing never touch string data after interning.
#[derive(Debug)]
pub struct NameTable {
    map: HashMap<Rc<str>, Name>,
    names: Vec<Rc<str>>,
}

impl NameTable {
    pub fn with_capacity(capacity: usize) -> NameTable {
        NameTable {
            map: HashMap::with_capacity(capacity),
            names: Vec::with_capacity(capacity),
        }
    }

    /// Interns the provided identifier, returning a stable handle.
    pub fn intern(&mut self, ident: &str) -> Name {
        if let Some(&name) = self.map.get(ident) {
            return name;
        }
        let key: Rc<str> = Rc::from(ident);
        let name = Name(u32::try_from(self.names.len()).expect("name table out of capacity"));
        self.names.push(Rc::clone(&key));
        self.map.insert(key, name);
        name
    }

    /// Returns the text for the provided handle. Panics if the handle was
    /// not produced by this table.
    pub fn get(&self, name: Name) -> &str {
        &self.names[name.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_deduplicating() {
        let mut table = NameTable::with_capacity(4);

        let foo1 = table.intern("foo");
        let bar1 = table.intern("bar");
        let foo2 = table.intern("foo");
        let bar2 = table.intern("bar");

        assert_eq!(foo1, foo2);
        assert_eq!(bar1, bar2);
        assert_ne!(foo1, bar1);

        assert_eq!(table.get(foo1), "foo");
        assert_eq!(table.get(bar2), "bar");
    }
}
