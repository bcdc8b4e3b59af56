use std::collections::HashMap;

use tracing::{debug, warn};

use crate::diagnostics::{Diagnostics, SymbolIssue};
use crate::scanner::token::TokenType;
use crate::symbol::*;

type ScopeFrame = HashMap<String, SymbolId>;

/// Where a name currently resolves.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Resolved {
    Local(SymbolId),
    Global(SymbolId),
}

impl Resolved {
    pub fn id(self) -> SymbolId {
        match self {
            Resolved::Local(id) | Resolved::Global(id) => id,
        }
    }
}

/// Global table plus a stack of local scope frames.
///
/// Every symbol lives in one arena; tables only map names to [`SymbolId`]s,
/// so ids handed out earlier stay valid after later insertions and after a
/// frame is popped.
#[derive(Debug)]
pub struct SymTable {
    arena: Vec<Symbol>,
    global: ScopeFrame,
    scopes: Vec<ScopeFrame>,
    scopes_opened: usize,
}

const BUILTIN_IO_TYPES: [ValueType; 5] = [
    ValueType::Integer,
    ValueType::Float,
    ValueType::Bool,
    ValueType::String,
    ValueType::Char,
];

impl Default for SymTable {
    fn default() -> Self {
        SymTable::new()
    }
}

impl SymTable {
    pub fn new() -> Self {
        let mut table = SymTable {
            arena: vec![],
            global: Default::default(),
            scopes: vec![],
            scopes_opened: 0,
        };

        for (word, token_type) in TokenType::RESERVED_WORDS {
            let mut symbol = Symbol::reserved(word, token_type);
            if let TokenType::True | TokenType::False = token_type {
                symbol.state = SymbolState::Declared(Declaration::Variable {
                    value_type: ValueType::Bool,
                    bounds: None,
                });
            }
            table.insert_global(symbol);
        }

        for value_type in BUILTIN_IO_TYPES {
            table.seed_builtin("put", value_type, Direction::In);
            table.seed_builtin("get", value_type, Direction::Out);
        }
        table
    }

    fn seed_builtin(&mut self, prefix: &str, value_type: ValueType, direction: Direction) {
        let name = format!("{}{}", prefix, value_type);
        let param = self.alloc(Symbol::declared(
            "value",
            Declaration::Variable { value_type, bounds: None },
            false,
        ));
        self.insert_global(Symbol::declared(
            name,
            Declaration::Procedure {
                params: vec![Parameter { symbol: param, value_type, direction }],
            },
            true,
        ));
    }

    fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        self.arena.push(symbol);
        SymbolId(self.arena.len() - 1)
    }

    fn insert_global(&mut self, symbol: Symbol) -> SymbolId {
        let name = symbol.name.clone();
        let id = self.alloc(symbol);
        self.global.insert(name, id);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.arena[id.0]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.arena[id.0]
    }

    /// Looks `name` up in the innermost frame (unless `only_global`), then
    /// in the global table.
    pub fn get_symbol(&self, name: &str, only_global: bool) -> Option<SymbolId> {
        self.resolve(name, only_global).map(Resolved::id)
    }

    pub fn resolve(&self, name: &str, only_global: bool) -> Option<Resolved> {
        if !only_global {
            if let Some(id) = self.scopes.last().and_then(|frame| frame.get(name)) {
                return Some(Resolved::Local(*id));
            }
        }
        self.global.get(name).map(|id| Resolved::Global(*id))
    }

    /// Looks `name` up in the table a declaration would land in: the global
    /// table when `is_global` or no frame is open, else the innermost frame.
    pub fn get_in_target(&self, name: &str, is_global: bool) -> Option<SymbolId> {
        match self.scopes.last() {
            Some(frame) if !is_global => frame.get(name).copied(),
            _ => self.global.get(name).copied(),
        }
    }

    /// Inserts into the global table or the innermost frame. A local insert
    /// with no open frame falls back to the global table with a warning.
    /// A name already bound in the target table is left untouched and the
    /// insert fails.
    pub fn add_symbol(
        &mut self,
        name: &str,
        mut symbol: Symbol,
        is_global: bool,
        diagnostics: &mut Diagnostics,
    ) -> Option<SymbolId> {
        let to_global = is_global || self.scopes.is_empty();
        if to_global && !is_global {
            warn!(symbol = name, "no open scope, symbol added to the global table");
            diagnostics.symbol(SymbolIssue::ForcedGlobal, name);
        }

        let (table, label) = match self.scopes.last() {
            Some(frame) if !to_global => (frame, "local"),
            _ => (&self.global, "global"),
        };
        if table.contains_key(name) {
            warn!(symbol = name, table = label, "name already bound, insert refused");
            diagnostics.symbol(SymbolIssue::InsertionFailed { table: label }, name);
            return None;
        }

        symbol.is_global = to_global;
        let id = self.alloc(symbol);
        match self.scopes.last_mut() {
            Some(frame) if !to_global => frame.insert(name.to_string(), id),
            _ => self.global.insert(name.to_string(), id),
        };
        Some(id)
    }

    /// Drops `name` from the innermost frame, returning its id.
    pub(crate) fn remove_local(&mut self, name: &str) -> Option<SymbolId> {
        self.scopes.last_mut()?.remove(name)
    }

    /// Makes an existing symbol visible under `name` in the innermost frame.
    pub(crate) fn bind_local(&mut self, name: &str, id: SymbolId) -> bool {
        match self.scopes.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), id);
                true
            }
            None => false,
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(ScopeFrame::new());
        self.scopes_opened += 1;
        debug!(depth = self.scopes.len(), "scope opened");
    }

    pub fn close_scope(&mut self) {
        if let Some(frame) = self.scopes.pop() {
            debug!(depth = self.scopes.len(), symbols = frame.len(), "scope closed");
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Frames pushed over the table's lifetime.
    pub fn scopes_opened(&self) -> usize {
        self.scopes_opened
    }

    pub fn has_open_scope(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// User-visible global symbols (reserved words excluded), sorted by name.
    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        let mut ids: Vec<&SymbolId> = self.global.values().collect();
        ids.sort_by(|a, b| self.get(**a).name.cmp(&self.get(**b).name));
        ids.into_iter()
            .map(move |id| self.get(*id))
            .filter(|sym| sym.token_type == TokenType::Identifier)
    }
}
