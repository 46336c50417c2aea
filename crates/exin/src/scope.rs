//! Identifier bindings organized as a stack of scope frames.
//!
//! The global frame always exists; entering a function pushes a fresh local
//! frame and returning pops it, releasing every binding. Only two frames
//! are ever searched: the innermost local frame, then the global frame.
//! Each frame also owns the indentation stack the scanner uses while code
//! of that activation is being read.

use indexmap::IndexMap;

use crate::{heap::Heap, scanner::IndentStack, value::Value};

#[derive(Debug)]
pub(crate) struct Frame {
    names: IndexMap<String, Value>,
    pub indents: IndentStack,
}

impl Frame {
    fn new() -> Self {
        Self {
            names: IndexMap::new(),
            indents: IndentStack::new(),
        }
    }

    fn release_all(&mut self, heap: &mut Heap) {
        for (_, value) in std::mem::take(&mut self.names) {
            value.release(heap);
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScopeStack {
    global: Frame,
    locals: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            global: Frame::new(),
            locals: Vec::new(),
        }
    }

    fn innermost(&self) -> &Frame {
        self.locals.last().unwrap_or(&self.global)
    }

    fn innermost_mut(&mut self) -> &mut Frame {
        self.locals.last_mut().unwrap_or(&mut self.global)
    }

    /// The indentation stack of the current activation.
    pub fn indents_mut(&mut self) -> &mut IndentStack {
        &mut self.innermost_mut().indents
    }

    /// Creates `name` in the innermost frame, initially bound to `none`.
    /// Returns false if the name already exists there.
    pub fn declare(&mut self, heap: &mut Heap, name: &str) -> bool {
        if self.innermost().names.contains_key(name) {
            return false;
        }
        let placeholder = heap.none_ref();
        self.innermost_mut().names.insert(name.to_owned(), placeholder);
        true
    }

    /// Binds `name` in the innermost frame, taking over the reference and
    /// releasing the previous binding.
    pub fn bind(&mut self, heap: &mut Heap, name: &str, value: Value) {
        let frame = self.locals.last_mut().unwrap_or(&mut self.global);
        if let Some(slot) = frame.names.get_mut(name) {
            let old = std::mem::replace(slot, value);
            old.release(heap);
        } else {
            frame.names.insert(name.to_owned(), value);
        }
    }

    /// Searches the innermost frame, then the global frame. Intermediate
    /// frames are never consulted.
    pub fn search(&self, name: &str) -> Option<&Value> {
        if let Some(frame) = self.locals.last()
            && let Some(value) = frame.names.get(name)
        {
            return Some(value);
        }
        self.global.names.get(name)
    }

    /// Rebinds an existing name where it is visible (innermost frame first,
    /// then global). On failure the value is handed back to the caller.
    pub fn rebind(&mut self, heap: &mut Heap, name: &str, value: Value) -> Result<(), Value> {
        if let Some(frame) = self.locals.last_mut()
            && let Some(slot) = frame.names.get_mut(name)
        {
            let old = std::mem::replace(slot, value);
            old.release(heap);
            return Ok(());
        }
        if let Some(slot) = self.global.names.get_mut(name) {
            let old = std::mem::replace(slot, value);
            old.release(heap);
            return Ok(());
        }
        Err(value)
    }

    pub fn push_level(&mut self) {
        self.locals.push(Frame::new());
    }

    /// Pops the innermost local frame, releasing every binding. Popping
    /// with no local frames is a no-op.
    pub fn pop_level(&mut self, heap: &mut Heap) {
        if let Some(mut frame) = self.locals.pop() {
            frame.release_all(heap);
        }
    }

    pub fn has_locals(&self) -> bool {
        !self.locals.is_empty()
    }

    /// Releases all global bindings; the end-of-run teardown.
    pub fn clear_global(&mut self, heap: &mut Heap) {
        self.global.release_all(heap);
    }

    /// Writes all identifiers to stderr; the end-of-run debug dump.
    pub fn dump(&self, heap: &Heap) {
        eprint!("\nidents:");
        for (level, frame) in std::iter::once(&self.global).chain(self.locals.iter()).enumerate() {
            for (name, value) in &frame.names {
                eprint!("\n{level:6}: {name} = {}", heap.kind(value.id()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HeapData;

    #[test]
    fn declare_rejects_duplicates_in_same_frame() {
        let mut heap = Heap::new(None, 0);
        let mut scopes = ScopeStack::new();
        assert!(scopes.declare(&mut heap, "x"));
        assert!(!scopes.declare(&mut heap, "x"));
        scopes.push_level();
        // shadowing a global is allowed
        assert!(scopes.declare(&mut heap, "x"));
        scopes.pop_level(&mut heap);
        scopes.clear_global(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }

    #[test]
    fn search_skips_intermediate_frames() {
        let mut heap = Heap::new(None, 0);
        let mut scopes = ScopeStack::new();
        scopes.declare(&mut heap, "g");
        let global_value = heap.allocate(HeapData::Int(1)).unwrap();
        scopes.bind(&mut heap, "g", global_value);

        scopes.push_level();
        scopes.declare(&mut heap, "outer_local");
        scopes.push_level();

        // the intermediate frame's binding is invisible from here
        assert!(scopes.search("outer_local").is_none());
        assert!(scopes.search("g").is_some());

        scopes.pop_level(&mut heap);
        scopes.pop_level(&mut heap);
        scopes.clear_global(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }

    #[test]
    fn pop_level_releases_bindings() {
        let mut heap = Heap::new(None, 0);
        let mut scopes = ScopeStack::new();
        scopes.push_level();
        scopes.declare(&mut heap, "v");
        let value = heap.allocate(HeapData::Str("abc".to_owned())).unwrap();
        scopes.bind(&mut heap, "v", value);
        assert_eq!(heap.live_values(), 1);
        scopes.pop_level(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }
}
