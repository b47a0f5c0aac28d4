//! Lexical scope graph and the surgery applied to it after restore.
//!
//! Scopes, variables and references live in arenas owned by the
//! [`ScopeManager`] and point at each other by index. Graph edits never
//! shift indices: removed entries are flagged and unlinked from their
//! neighbours, so ids handed out earlier stay valid.

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::estree::{EsNode, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VariableId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    FunctionExpressionName,
    Class,
    Block,
    For,
    Switch,
    Catch,
}

/// A node the graph points at, by identity and (refreshed) range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub range: [usize; 2],
}

impl From<&EsNode> for NodeRef {
    fn from(node: &EsNode) -> Self {
        Self {
            id: node.id,
            range: node.range,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub kind: ScopeKind,
    pub block: NodeRef,
    pub upper: Option<ScopeId>,
    pub child_scopes: Vec<ScopeId>,
    pub variables: Vec<VariableId>,
    /// Name → variable declared directly in this scope.
    pub set: IndexMap<String, VariableId>,
    /// References made from this scope.
    pub references: Vec<ReferenceId>,
    /// References not resolved in this scope.
    pub through: Vec<ReferenceId>,
    #[serde(skip)]
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefinitionKind {
    Variable,
    Parameter,
    FunctionName,
    ClassName,
    CatchClause,
    ImportBinding,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub kind: DefinitionKind,
    /// The binding identifier.
    pub name: NodeRef,
    /// The declaring node.
    pub node: NodeRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub scope: ScopeId,
    pub identifiers: Vec<NodeRef>,
    pub defs: Vec<Definition>,
    pub references: Vec<ReferenceId>,
    #[serde(skip)]
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceFlag {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub identifier: NodeRef,
    pub name: String,
    pub from: ScopeId,
    pub resolved: Option<VariableId>,
    pub flag: ReferenceFlag,
    /// Write made by a declaration initializer.
    pub init: bool,
    #[serde(skip)]
    pub removed: bool,
}

impl Reference {
    pub fn is_read(&self) -> bool {
        matches!(self.flag, ReferenceFlag::Read | ReferenceFlag::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.flag, ReferenceFlag::Write | ReferenceFlag::ReadWrite)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeManager {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
    references: Vec<Reference>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn module_scope(&self) -> Option<ScopeId> {
        self.scopes
            .first()?
            .child_scopes
            .iter()
            .copied()
            .find(|id| self.scope(*id).kind == ScopeKind::Module)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn reference(&self, id: ReferenceId) -> &Reference {
        &self.references[id.0]
    }

    /// Live scopes, outermost first.
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.removed)
            .map(|(i, s)| (ScopeId(i), s))
    }

    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.removed)
            .map(|(i, v)| (VariableId(i), v))
    }

    pub fn references(&self) -> impl Iterator<Item = (ReferenceId, &Reference)> {
        self.references
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.removed)
            .map(|(i, r)| (ReferenceId(i), r))
    }

    /// Innermost live scope created by `node`.
    pub fn acquire(&self, node: &EsNode) -> Option<ScopeId> {
        self.scopes()
            .filter(|(_, s)| s.block.id == node.id)
            .map(|(id, _)| id)
            .last()
    }

    /// `scope`, then each enclosing scope up to the global one.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |id| self.scope(*id).upper)
    }

    /// Looks `name` up from `scope` outwards.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<VariableId> {
        self.ancestors(scope)
            .find_map(|id| self.scope(id).set.get(name).copied())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONSTRUCTION
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn add_scope(&mut self, kind: ScopeKind, block: NodeRef, upper: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            kind,
            block,
            upper,
            child_scopes: Vec::new(),
            variables: Vec::new(),
            set: IndexMap::new(),
            references: Vec::new(),
            through: Vec::new(),
            removed: false,
        });
        if let Some(upper) = upper {
            self.scopes[upper.0].child_scopes.push(id);
        }
        id
    }

    /// Declares `name` in `scope`, merging with an existing variable of the
    /// same name there.
    pub fn declare(&mut self, scope: ScopeId, name: &str, def: Option<Definition>) -> VariableId {
        let id = match self.scopes[scope.0].set.get(name) {
            Some(id) => *id,
            None => {
                let id = VariableId(self.variables.len());
                self.variables.push(Variable {
                    name: name.to_string(),
                    scope,
                    identifiers: Vec::new(),
                    defs: Vec::new(),
                    references: Vec::new(),
                    removed: false,
                });
                let s = &mut self.scopes[scope.0];
                s.set.insert(name.to_string(), id);
                s.variables.push(id);
                id
            }
        };
        if let Some(def) = def {
            let variable = &mut self.variables[id.0];
            variable.identifiers.push(def.name);
            variable.defs.push(def);
        }
        id
    }

    pub fn add_reference(&mut self, reference: Reference) -> ReferenceId {
        let id = ReferenceId(self.references.len());
        self.scopes[reference.from.0].references.push(id);
        self.references.push(reference);
        id
    }

    /// Resolves every unresolved reference by walking its scope chain. A
    /// reference lands in the `through` list of each scope it passes.
    pub fn resolve_all(&mut self) {
        for i in 0..self.references.len() {
            let r = &self.references[i];
            if r.removed || r.resolved.is_some() {
                continue;
            }
            let (from, name) = (r.from, r.name.clone());
            let chain: Vec<ScopeId> = self.ancestors(from).collect();
            for scope in chain {
                if let Some(var) = self.scopes[scope.0].set.get(&name).copied() {
                    self.references[i].resolved = Some(var);
                    self.variables[var.0].references.push(ReferenceId(i));
                    break;
                }
                self.scopes[scope.0].through.push(ReferenceId(i));
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SURGERY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deletes every scope, variable and reference defined inside `node`.
    /// References that pointed at a deleted variable from outside become
    /// unresolved again.
    pub fn remove_subtree_bindings(&mut self, node: &EsNode) {
        let mut ids = HashSet::new();
        node.collect_ids(&mut ids);

        // scopes
        for i in 0..self.scopes.len() {
            if self.scopes[i].removed || !ids.contains(&self.scopes[i].block.id) {
                continue;
            }
            self.scopes[i].removed = true;
            if let Some(upper) = self.scopes[i].upper {
                self.scopes[upper.0].child_scopes.retain(|c| c.0 != i);
            }
        }

        // variables
        let mut removed_vars = HashSet::new();
        for i in 0..self.variables.len() {
            let v = &self.variables[i];
            if v.removed {
                continue;
            }
            let defined_inside = v.defs.iter().any(|d| ids.contains(&d.name.id));
            if defined_inside || self.scopes[v.scope.0].removed {
                let (scope, name) = (v.scope, v.name.clone());
                self.variables[i].removed = true;
                removed_vars.insert(VariableId(i));
                let s = &mut self.scopes[scope.0];
                s.variables.retain(|id| id.0 != i);
                if s.set.get(&name) == Some(&VariableId(i)) {
                    s.set.shift_remove(&name);
                }
            }
        }

        // references
        let mut detached = 0;
        let mut promoted = 0;
        for i in 0..self.references.len() {
            let r = &self.references[i];
            if r.removed {
                continue;
            }
            let id = ReferenceId(i);
            if ids.contains(&r.identifier.id) || self.scopes[r.from.0].removed {
                self.detach_reference(id);
                detached += 1;
            } else if r.resolved.is_some_and(|v| removed_vars.contains(&v)) {
                self.references[i].resolved = None;
                let chain: Vec<ScopeId> = self.ancestors(self.references[i].from).collect();
                for scope in chain {
                    let through = &mut self.scopes[scope.0].through;
                    if !through.contains(&id) {
                        through.push(id);
                    }
                }
                promoted += 1;
            }
        }

        debug!(
            "[SCOPE] Removed bindings under `{}`: {} variables, {} references detached, {} promoted.",
            node.kind,
            removed_vars.len(),
            detached,
            promoted
        );
    }

    fn detach_reference(&mut self, id: ReferenceId) {
        let r = &mut self.references[id.0];
        r.removed = true;
        let resolved = r.resolved.take();
        if let Some(var) = resolved {
            self.variables[var.0].references.retain(|x| *x != id);
        }
        for scope in &mut self.scopes {
            scope.references.retain(|x| *x != id);
            scope.through.retain(|x| *x != id);
        }
    }

    /// Variable `name` in the global scope, created without definitions if
    /// missing. `reference`, if given, is resolved to it.
    pub fn add_synthetic_global_binding(&mut self, name: &str, reference: Option<ReferenceId>) -> VariableId {
        let global = self.global_scope();
        let var = self.declare(global, name, None);
        if let Some(reference) = reference {
            self.resolve_reference(reference, var, global);
        }
        var
    }

    /// Resolves the unresolved references seen from `scope` that match
    /// `predicate` to `target`. Returns how many were rebound.
    pub fn rebind_through_references(
        &mut self,
        scope: ScopeId,
        predicate: impl Fn(&Reference) -> bool,
        target: VariableId,
    ) -> usize {
        let matching: Vec<ReferenceId> = self.scopes[scope.0]
            .through
            .iter()
            .copied()
            .filter(|id| predicate(&self.references[id.0]))
            .collect();
        for id in &matching {
            self.resolve_reference(*id, target, scope);
        }
        matching.len()
    }

    /// Points `id` at `var`, taking it off the `through` lists of `at` and
    /// every scope above it. Scopes below keep it, since it still passes
    /// through them.
    fn resolve_reference(&mut self, id: ReferenceId, var: VariableId, at: ScopeId) {
        if let Some(previous) = self.references[id.0].resolved.replace(var) {
            self.variables[previous.0].references.retain(|x| *x != id);
        }
        let refs = &mut self.variables[var.0].references;
        if !refs.contains(&id) {
            refs.push(id);
        }
        let chain: Vec<ScopeId> = self.ancestors(at).collect();
        for scope in chain {
            self.scopes[scope.0].through.retain(|x| *x != id);
        }
    }

    /// Re-reads every node range from `root`, after the tree was restored.
    pub fn refresh_ranges(&mut self, root: &EsNode) {
        let mut ranges = HashMap::new();
        collect_ranges(root, &mut ranges);
        let refresh = |node: &mut NodeRef| {
            if let Some(range) = ranges.get(&node.id) {
                node.range = *range;
            }
        };
        for scope in &mut self.scopes {
            refresh(&mut scope.block);
        }
        for variable in &mut self.variables {
            variable.identifiers.iter_mut().for_each(refresh);
            for def in &mut variable.defs {
                refresh(&mut def.name);
                refresh(&mut def.node);
            }
        }
        for reference in &mut self.references {
            refresh(&mut reference.identifier);
        }
    }
}

fn collect_ranges(node: &EsNode, into: &mut HashMap<NodeId, [usize; 2]>) {
    into.insert(node.id, node.range);
    for child in node.children() {
        collect_ranges(child, into);
    }
}
