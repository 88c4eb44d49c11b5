//! Chained lexical scopes mapping names to types.
//!
//! Scopes live in an arena and refer to their parent by index, so the checker
//! can leave a component body in pass 1 and re-enter the same scope in pass 2.

use crate::types::Type;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvError {
    #[error("'{0}' is not defined")]
    NotFound(String),
    #[error("'{0}' is already declared in this scope")]
    DeclarationExists(String),
}

#[derive(Debug, Clone)]
struct Scope {
    /// Qualifier contributed to names declared inside (component name).
    name: Option<String>,
    parent: Option<ScopeId>,
    bindings: IndexMap<String, Type>,
}

#[derive(Debug, Clone)]
pub struct TypeEnv {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    /// A fresh environment containing only the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                name: None,
                parent: None,
                bindings: IndexMap::new(),
            }],
            current: ScopeId::GLOBAL,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Create a child of the current scope without entering it.
    pub fn new_child(&mut self, name: Option<&str>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name: name.map(str::to_string),
            parent: Some(self.current),
            bindings: IndexMap::new(),
        });
        id
    }

    /// Make `scope` current, returning the previous one so the caller can restore it.
    pub fn enter(&mut self, scope: ScopeId) -> ScopeId {
        std::mem::replace(&mut self.current, scope)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// Declare `name` in the current scope. Shadowing an outer binding is fine.
    pub fn init(&mut self, name: &str, ty: Type) -> Result<(), EnvError> {
        let bindings = &mut self.scopes[self.current.0].bindings;
        if bindings.contains_key(name) {
            return Err(EnvError::DeclarationExists(name.to_string()));
        }
        bindings.insert(name.to_string(), ty);
        Ok(())
    }

    /// Resolve `name` walking outward from the current scope.
    pub fn lookup(&self, name: &str) -> Result<&Type, EnvError> {
        self.resolve(name).map(|(_, ty)| ty)
    }

    /// Like [`TypeEnv::lookup`], also reporting the scope that holds the binding.
    pub fn resolve(&self, name: &str) -> Result<(ScopeId, &Type), EnvError> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let s = &self.scopes[id.0];
            if let Some(ty) = s.bindings.get(name) {
                return Ok((id, ty));
            }
            scope = s.parent;
        }
        Err(EnvError::NotFound(name.to_string()))
    }

    /// Direct access to the current scope only (no chaining).
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.scopes[self.current.0].bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Type> {
        self.scopes[self.current.0].bindings.get_mut(name)
    }

    /// Insert or overwrite in the current scope only.
    pub fn set(&mut self, name: &str, ty: Type) {
        self.scopes[self.current.0]
            .bindings
            .insert(name.to_string(), ty);
    }

    /// Bindings of one scope in declaration order.
    pub fn bindings(&self, scope: ScopeId) -> impl Iterator<Item = (&str, &Type)> {
        self.scopes[scope.0]
            .bindings
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    /// `name` prefixed with the qualifiers of every named scope around `scope`.
    pub fn qualify(&self, scope: ScopeId, name: &str) -> String {
        let mut parts = vec![name.to_string()];
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = &self.scopes[id.0];
            if let Some(q) = &s.name {
                parts.push(q.clone());
            }
            cur = s.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}
