//! Scope analysis for delegates that do not provide a scope graph.
//!
//! Follows eslint-scope for module code: a global scope holding a module
//! scope, function/class/block/for/switch/catch scopes below, `var`
//! hoisted to the nearest function or module scope. References are
//! collected during the walk and resolved once the walk is done, so
//! declaration order inside a scope does not matter.

use log::debug;

use crate::estree::{EsNode, Field};
use crate::scope::{
    Definition, DefinitionKind, NodeRef, Reference, ReferenceFlag, ScopeId, ScopeKind, ScopeManager,
};
use crate::visitor_keys::keys_for;

/// Fields holding type positions, never walked.
const TYPE_FIELDS: [&str; 7] = [
    "typeAnnotation",
    "returnType",
    "typeParameters",
    "typeArguments",
    "superTypeArguments",
    "superTypeParameters",
    "implements",
];

/// TypeScript nodes that wrap a value expression.
const TS_EXPRESSIONS: [&str; 5] = [
    "TSAsExpression",
    "TSSatisfiesExpression",
    "TSNonNullExpression",
    "TSTypeAssertion",
    "TSInstantiationExpression",
];

pub fn analyze(program: &EsNode) -> ScopeManager {
    let mut sm = ScopeManager::new();
    let block = NodeRef::from(program);
    let global = sm.add_scope(ScopeKind::Global, block, None);
    let module = sm.add_scope(ScopeKind::Module, block, Some(global));

    let mut analyzer = Analyzer { sm, current: module };
    analyzer.visit_list(program, "body");
    let mut sm = analyzer.sm;
    sm.resolve_all();

    debug!(
        "[SCOPE] Analyzed program: {} scopes, {} variables, {} references.",
        sm.scopes().count(),
        sm.variables().count(),
        sm.references().count()
    );
    sm
}

struct Analyzer {
    sm: ScopeManager,
    current: ScopeId,
}

impl Analyzer {
    fn with_scope(&mut self, kind: ScopeKind, block: &EsNode, f: impl FnOnce(&mut Self)) {
        let scope = self.sm.add_scope(kind, block.into(), Some(self.current));
        let outer = std::mem::replace(&mut self.current, scope);
        f(self);
        self.current = outer;
    }

    /// Where `var` declarations land.
    fn variable_scope(&self) -> ScopeId {
        self.sm
            .ancestors(self.current)
            .find(|id| {
                matches!(
                    self.sm.scope(*id).kind,
                    ScopeKind::Function | ScopeKind::Module | ScopeKind::Global
                )
            })
            .unwrap_or(self.current)
    }

    fn declare_name(&mut self, scope: ScopeId, ident: &EsNode, kind: DefinitionKind, node: &EsNode) {
        let Some(name) = ident.str_field("name") else {
            return;
        };
        let def = Definition {
            kind,
            name: ident.into(),
            node: node.into(),
        };
        self.sm.declare(scope, name, Some(def));
    }

    fn reference(&mut self, ident: &EsNode, flag: ReferenceFlag, init: bool) {
        let Some(name) = ident.str_field("name") else {
            return;
        };
        self.sm.add_reference(Reference {
            identifier: ident.into(),
            name: name.to_string(),
            from: self.current,
            resolved: None,
            flag,
            init,
            removed: false,
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WALK
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_opt(&mut self, node: &EsNode, key: &str) {
        if let Some(child) = node.node(key) {
            self.visit(child);
        }
    }

    fn visit_list(&mut self, node: &EsNode, key: &str) {
        for child in node.nodes(key).into_iter().flatten().flatten() {
            self.visit(child);
        }
    }

    /// Children in visitor-key order, so references are recorded in source
    /// order.
    fn visit_children(&mut self, node: &EsNode) {
        for key in keys_for(node) {
            if TYPE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            match node.fields.get(&key) {
                Some(Field::Node(child)) => self.visit(child),
                Some(Field::Nodes(children)) => {
                    for child in children.iter().flatten() {
                        self.visit(child);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit(&mut self, node: &EsNode) {
        match node.kind.as_str() {
            "Identifier" => self.reference(node, ReferenceFlag::Read, false),

            "FunctionDeclaration" => {
                if let Some(id) = node.node("id") {
                    self.declare_name(self.current, id, DefinitionKind::FunctionName, node);
                }
                self.visit_function(node);
            }
            "FunctionExpression" => match node.node("id") {
                Some(id) => self.with_scope(ScopeKind::FunctionExpressionName, node, |a| {
                    a.declare_name(a.current, id, DefinitionKind::FunctionName, node);
                    a.visit_function(node);
                }),
                None => self.visit_function(node),
            },
            "ArrowFunctionExpression" => self.visit_function(node),

            "ClassDeclaration" | "ClassExpression" => {
                if node.is("ClassDeclaration") {
                    if let Some(id) = node.node("id") {
                        self.declare_name(self.current, id, DefinitionKind::ClassName, node);
                    }
                }
                self.visit_list(node, "decorators");
                self.visit_opt(node, "superClass");
                self.with_scope(ScopeKind::Class, node, |a| {
                    if let Some(id) = node.node("id") {
                        a.declare_name(a.current, id, DefinitionKind::ClassName, node);
                    }
                    a.visit_opt(node, "body");
                });
            }
            "MethodDefinition" | "PropertyDefinition" | "AccessorProperty" | "Property" => {
                self.visit_list(node, "decorators");
                if node.bool_field("computed") {
                    self.visit_opt(node, "key");
                }
                self.visit_opt(node, "value");
            }
            "MemberExpression" => {
                self.visit_opt(node, "object");
                if node.bool_field("computed") {
                    self.visit_opt(node, "property");
                }
            }

            "LabeledStatement" => self.visit_opt(node, "body"),
            "BreakStatement" | "ContinueStatement" | "MetaProperty" | "ExportAllDeclaration" => {}

            "BlockStatement" | "StaticBlock" => {
                self.with_scope(ScopeKind::Block, node, |a| a.visit_list(node, "body"))
            }
            "ForStatement" | "ForInStatement" | "ForOfStatement" => {
                let head = node.node("init").or_else(|| node.node("left"));
                let lexical = head
                    .is_some_and(|h| h.is("VariableDeclaration") && h.str_field("kind") != Some("var"));
                if lexical {
                    self.with_scope(ScopeKind::For, node, |a| a.visit_for(node));
                } else {
                    self.visit_for(node);
                }
            }
            "SwitchStatement" => {
                self.visit_opt(node, "discriminant");
                self.with_scope(ScopeKind::Switch, node, |a| a.visit_list(node, "cases"));
            }
            "CatchClause" => self.with_scope(ScopeKind::Catch, node, |a| {
                if let Some(param) = node.node("param") {
                    let scope = a.current;
                    a.declare_pattern(param, scope, DefinitionKind::CatchClause, node, false);
                }
                a.visit_opt(node, "body");
            }),

            "VariableDeclaration" => self.visit_variable_declaration(node, false),
            "ImportDeclaration" => {
                for spec in node.nodes("specifiers").into_iter().flatten().flatten() {
                    if let Some(local) = spec.node("local") {
                        self.declare_name(self.current, local, DefinitionKind::ImportBinding, spec);
                    }
                }
            }
            "ExportNamedDeclaration" => {
                self.visit_opt(node, "declaration");
                if node.node("source").is_none() {
                    for spec in node.nodes("specifiers").into_iter().flatten().flatten() {
                        self.visit_opt(spec, "local");
                    }
                }
            }

            "AssignmentExpression" => {
                if let Some(left) = node.node("left") {
                    let flag = if node.str_field("operator") == Some("=") {
                        ReferenceFlag::Write
                    } else {
                        ReferenceFlag::ReadWrite
                    };
                    self.assign_target(left, flag);
                }
                self.visit_opt(node, "right");
            }
            "UpdateExpression" => match node.node("argument") {
                Some(arg) if arg.is("Identifier") => self.reference(arg, ReferenceFlag::ReadWrite, false),
                Some(arg) => self.visit(arg),
                None => {}
            },

            kind if TS_EXPRESSIONS.contains(&kind) => self.visit_opt(node, "expression"),
            "TSEnumDeclaration" => {
                if let Some(id) = node.node("id") {
                    self.declare_name(self.current, id, DefinitionKind::Variable, node);
                }
            }
            kind if kind.starts_with("TS") => {}

            _ => self.visit_children(node),
        }
    }

    fn visit_function(&mut self, node: &EsNode) {
        self.with_scope(ScopeKind::Function, node, |a| {
            let scope = a.current;
            if !node.is("ArrowFunctionExpression") {
                a.sm.declare(scope, "arguments", None);
            }
            for param in node.nodes("params").into_iter().flatten().flatten() {
                a.declare_pattern(param, scope, DefinitionKind::Parameter, node, false);
            }
            match node.node("body") {
                // the body block shares the function scope
                Some(body) if body.is("BlockStatement") => a.visit_list(body, "body"),
                Some(body) => a.visit(body),
                None => {}
            }
        });
    }

    fn visit_for(&mut self, node: &EsNode) {
        if node.is("ForStatement") {
            match node.node("init") {
                Some(init) if init.is("VariableDeclaration") => self.visit_variable_declaration(init, false),
                Some(init) => self.visit(init),
                None => {}
            }
            self.visit_opt(node, "test");
            self.visit_opt(node, "update");
        } else {
            match node.node("left") {
                Some(left) if left.is("VariableDeclaration") => self.visit_variable_declaration(left, true),
                Some(left) => self.assign_target(left, ReferenceFlag::Write),
                None => {}
            }
            self.visit_opt(node, "right");
        }
        self.visit_opt(node, "body");
    }

    /// `assigned` marks declarators written by a for-in/of head.
    fn visit_variable_declaration(&mut self, node: &EsNode, assigned: bool) {
        let scope = if node.str_field("kind") == Some("var") {
            self.variable_scope()
        } else {
            self.current
        };
        for declarator in node.nodes("declarations").into_iter().flatten().flatten() {
            if let Some(id) = declarator.node("id") {
                let written = assigned || declarator.node("init").is_some();
                self.declare_pattern(id, scope, DefinitionKind::Variable, declarator, written);
            }
            self.visit_opt(declarator, "init");
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PATTERNS
    // ═══════════════════════════════════════════════════════════════════════════

    fn declare_pattern(
        &mut self,
        pattern: &EsNode,
        scope: ScopeId,
        kind: DefinitionKind,
        decl: &EsNode,
        written: bool,
    ) {
        match pattern.kind.as_str() {
            "Identifier" => {
                self.declare_name(scope, pattern, kind, decl);
                if written {
                    self.reference(pattern, ReferenceFlag::Write, true);
                }
            }
            "ObjectPattern" => {
                for prop in pattern.nodes("properties").into_iter().flatten().flatten() {
                    if prop.is("Property") {
                        if prop.bool_field("computed") {
                            self.visit_opt(prop, "key");
                        }
                        if let Some(value) = prop.node("value") {
                            self.declare_pattern(value, scope, kind, decl, written);
                        }
                    } else {
                        self.declare_pattern(prop, scope, kind, decl, written);
                    }
                }
            }
            "ArrayPattern" => {
                for element in pattern.nodes("elements").into_iter().flatten().flatten() {
                    self.declare_pattern(element, scope, kind, decl, written);
                }
            }
            "RestElement" => {
                if let Some(argument) = pattern.node("argument") {
                    self.declare_pattern(argument, scope, kind, decl, written);
                }
            }
            "AssignmentPattern" => {
                if let Some(left) = pattern.node("left") {
                    self.declare_pattern(left, scope, kind, decl, written);
                }
                self.visit_opt(pattern, "right");
            }
            "TSParameterProperty" => {
                if let Some(parameter) = pattern.node("parameter") {
                    self.declare_pattern(parameter, scope, kind, decl, written);
                }
            }
            _ => self.visit(pattern),
        }
    }

    fn assign_target(&mut self, target: &EsNode, flag: ReferenceFlag) {
        match target.kind.as_str() {
            "Identifier" => self.reference(target, flag, false),
            "ObjectPattern" => {
                for prop in target.nodes("properties").into_iter().flatten().flatten() {
                    if prop.is("Property") {
                        if prop.bool_field("computed") {
                            self.visit_opt(prop, "key");
                        }
                        if let Some(value) = prop.node("value") {
                            self.assign_target(value, flag);
                        }
                    } else {
                        self.assign_target(prop, flag);
                    }
                }
            }
            "ArrayPattern" => {
                for element in target.nodes("elements").into_iter().flatten().flatten() {
                    self.assign_target(element, flag);
                }
            }
            "RestElement" => {
                if let Some(argument) = target.node("argument") {
                    self.assign_target(argument, flag);
                }
            }
            "AssignmentPattern" => {
                if let Some(left) = target.node("left") {
                    self.assign_target(left, flag);
                }
                self.visit_opt(target, "right");
            }
            kind if TS_EXPRESSIONS.contains(&kind) => {
                if let Some(expression) = target.node("expression") {
                    self.assign_target(expression, flag);
                }
            }
            _ => self.visit(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oxc_bridge::OxcScriptParser;
    use crate::script::{BasicParse, ParserOptions};

    fn analyze_code(code: &str) -> ScopeManager {
        let options = ParserOptions::default().script_options();
        let program = OxcScriptParser::typescript().parse(code, &options).unwrap();
        analyze(&program.ast)
    }

    fn unresolved(sm: &ScopeManager) -> Vec<String> {
        let global = sm.scope(sm.global_scope());
        global
            .through
            .iter()
            .map(|id| sm.reference(*id).name.clone())
            .collect()
    }

    #[test]
    fn test_module_declarations_resolve() {
        let sm = analyze_code("import x from 'x';\nlet a = x;\nconsole.log(a, b);");
        let module = sm.module_scope().unwrap();
        let names: Vec<_> = sm.scope(module).set.keys().cloned().collect();
        assert_eq!(names, vec!["x", "a"]);
        assert_eq!(unresolved(&sm), vec!["console", "b"]);

        let a = sm.lookup(module, "a").unwrap();
        let refs: Vec<_> = sm.variable(a).references.iter().map(|r| sm.reference(*r)).collect();
        assert_eq!(refs.len(), 2);
        assert!(refs[0].is_write() && refs[0].init);
        assert!(refs[1].is_read());
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        let sm = analyze_code("function f(p) { if (p) { var v = 1; let l = 2; } return v; }");
        let kinds: Vec<_> = sm.scopes().map(|(_, s)| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ScopeKind::Global, ScopeKind::Module, ScopeKind::Function, ScopeKind::Block]
        );
        let (function, _) = sm.scopes().nth(2).unwrap();
        assert!(sm.scope(function).set.contains_key("v"));
        assert!(sm.scope(function).set.contains_key("arguments"));
        assert!(!sm.scope(function).set.contains_key("l"));
        assert!(unresolved(&sm).is_empty());
    }

    #[test]
    fn test_properties_labels_and_types_are_not_references() {
        let sm = analyze_code("const o: Foo = { k: 1 }; o.k; lbl: for (;;) { break lbl; }");
        let names: Vec<_> = sm.references().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["o", "o"]);
    }

    #[test]
    fn test_jsx_names_are_not_references() {
        let sm = analyze_code("<Foo bar={baz}>{qux}</Foo>;");
        assert_eq!(unresolved(&sm), vec!["baz", "qux"]);
    }

    #[test]
    fn test_compound_assignment_reads_and_writes() {
        let sm = analyze_code("let n = 0; n += 1; n++;");
        let flags: Vec<_> = sm.references().map(|(_, r)| r.flag).collect();
        assert_eq!(
            flags,
            vec![ReferenceFlag::Write, ReferenceFlag::ReadWrite, ReferenceFlag::ReadWrite]
        );
    }

    #[test]
    fn test_references_follow_source_order() {
        let sm = analyze_code("const v = cond ? first : second;\nfoo(bar);\n<p a={x}>{y}</p>;");
        let names: Vec<_> = sm.references().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["v", "cond", "first", "second", "foo", "bar", "x", "y"]);
    }

    #[test]
    fn test_child_scopes_follow_source_order() {
        let sm = analyze_code("if (a) { let x = 1; } else { let y = 2; }\ncall(() => z);");
        let module = sm.module_scope().unwrap();
        let starts: Vec<_> = sm
            .scope(module)
            .child_scopes
            .iter()
            .map(|id| sm.scope(*id).block.range[0])
            .collect();
        assert_eq!(starts.len(), 3);
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }
}
