//! Registry of loaded modules.
//!
//! A module is one source file, loaded at most once per process and kept
//! alive for the process lifetime so that positions referring into it stay
//! valid.

use std::rc::Rc;

use ahash::AHashMap;

/// Index of a module in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ModuleId(usize);

#[derive(Debug)]
struct Module {
    name: String,
    source: Rc<str>,
}

/// All modules loaded so far, looked up by name on import.
#[derive(Debug, Default)]
pub(crate) struct Modules {
    list: Vec<Module>,
    by_name: AHashMap<String, ModuleId>,
}

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    /// Registers a freshly loaded module and returns its id.
    ///
    /// Two closing newlines are appended to the source so the scanner can
    /// unwind open indentation levels before reporting end of input.
    pub fn register(&mut self, name: &str, bytes: &[u8]) -> ModuleId {
        let mut text = String::from_utf8_lossy(bytes).into_owned();
        text.push_str("\n\n");
        let id = ModuleId(self.list.len());
        self.list.push(Module {
            name: name.to_owned(),
            source: Rc::from(text),
        });
        self.by_name.insert(name.to_owned(), id);
        id
    }

    pub fn name(&self, id: ModuleId) -> &str {
        &self.list[id.0].name
    }

    pub fn source(&self, id: ModuleId) -> &Rc<str> {
        &self.list[id.0].source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_appends_closing_newlines() {
        let mut modules = Modules::new();
        let id = modules.register("main", b"print 1");
        assert_eq!(&**modules.source(id), "print 1\n\n");
        assert_eq!(modules.name(id), "main");
        assert_eq!(modules.lookup("main"), Some(id));
        assert_eq!(modules.lookup("other"), None);
    }
}
