use lasso::{Key, Rodeo, Spur};

/// The symbol table: each distinct name once, indexed by first appearance.
#[derive(Debug, Default)]
pub struct SymbolInterner {
    rodeo: Rodeo,
}

impl SymbolInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of `name`, adding it if this is its first appearance.
    pub fn intern(&mut self, name: &str) -> usize {
        let before = self.rodeo.len();
        let index = self.rodeo.get_or_intern(name).into_usize();
        if self.rodeo.len() > before {
            tracing::trace!(index, name, "new symbol");
        }
        index
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.rodeo.get(name).map(Key::into_usize)
    }

    pub fn resolve(&self, index: usize) -> Option<&str> {
        Spur::try_from_usize(index).and_then(|key| self.rodeo.try_resolve(&key))
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }

    /// Names in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len()).filter_map(|index| self.resolve(index))
    }
}

#[cfg(test)]
mod tests {
    use super::SymbolInterner;
    use assert2::check;

    #[test]
    fn dedup_keeps_first_index() {
        let mut symbols = SymbolInterner::new();
        check!(symbols.intern("a") == 0);
        check!(symbols.intern("b") == 1);
        check!(symbols.intern("a") == 0);
        check!(symbols.intern("c") == 2);
        check!(symbols.len() == 3);
        check!(symbols.iter().collect::<Vec<_>>() == vec!["a", "b", "c"]);
    }

    #[test]
    fn lookups() {
        let mut symbols = SymbolInterner::new();
        check!(symbols.is_empty());
        symbols.intern("print");
        check!(symbols.get("print") == Some(0));
        check!(symbols.get("Print").is_none());
        check!(symbols.resolve(0) == Some("print"));
        check!(symbols.resolve(1).is_none());
    }
}
