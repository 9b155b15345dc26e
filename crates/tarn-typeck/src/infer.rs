//! The inference driver.
//!
//! One `Inferencer` checks a sequence of modules in four passes each:
//! declarations are collected, definitions are bound into the scope tree
//! with names qualified in place, constraints are propagated and unified,
//! and class-method references are rewritten into dictionary passing. The
//! type scope persists across the whole run, so types inferred in one
//! module resolve in the next.

use std::mem;

use rowan::TextRange;
use rustc_hash::FxHashMap;
use tarn_ast::{
    ClassDef, Clause, DataDef, Expr, FieldPattern, InstanceDef, Item, Literal, Module, Pattern,
    ScopeId, SignatureDecl, Symbol, TypeExpr, ValueDef,
};

use crate::builtins::CORE;
use crate::env::ScopeTree;
use crate::error::{ConstraintOrigin, TypeError, TypeWarning};
use crate::instances::{find_argument, instance_map, DictArg};
use crate::resolver::{Declared, InstanceDescriptor, OperatorInfo, SymbolResolver};
use crate::scope::TypeScope;
use crate::ty::{Ty, TyVar};
use crate::unify::unify;
use crate::TypeckResult;

pub struct Inferencer<'r> {
    scopes: ScopeTree<'r>,
    types: TypeScope,
    errors: Vec<TypeError>,
    warnings: Vec<TypeWarning>,
    /// Type recorded for every checked expression span.
    ty_of: FxHashMap<TextRange, Ty>,
    /// Dictionary parameters of the definitions enclosing the current
    /// elaboration point, innermost last.
    dict_frames: Vec<Vec<DictArg>>,
    /// Variables pinned non-generic for the scope currently being checked.
    pinned: Vec<Ty>,
    /// Imports of the current module, implicit `Core` included.
    imports: Vec<String>,
    module: String,
    result_type: Option<Ty>,
}

impl<'r> Inferencer<'r> {
    pub fn new(resolver: &'r dyn SymbolResolver) -> Inferencer<'r> {
        Inferencer {
            scopes: ScopeTree::new(resolver),
            types: TypeScope::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            ty_of: FxHashMap::default(),
            dict_frames: Vec::new(),
            pinned: Vec::new(),
            imports: Vec::new(),
            module: String::new(),
            result_type: None,
        }
    }

    pub fn check_module(&mut self, module: &mut Module) {
        self.module = module.name.clone();
        let mut imports: Vec<String> = module.imports.iter().map(|i| i.module.clone()).collect();
        if module.name != CORE && !imports.iter().any(|m| m == CORE) {
            // implicit, and first so every declared import shadows it
            imports.insert(0, CORE.to_string());
        }
        self.imports = imports.clone();
        let home = self.scopes.enter_module(&module.name, imports);
        module.scope = Some(home);

        self.collect_declarations(module);
        self.extend_imported_contexts();
        self.bind_definitions(module);
        self.check_definitions(module);
        self.bind_methods(module, home);

        self.scopes.leave_scope();
    }

    pub fn finish(mut self) -> TypeckResult {
        let types = self
            .ty_of
            .iter()
            .map(|(span, ty)| (*span, self.types.resolve(ty)))
            .collect();
        for (name, span) in self.scopes.unused_locals() {
            self.warnings.push(TypeWarning::UnusedLocal { name, span });
        }
        let result_type = self.result_type.as_ref().map(|ty| self.types.resolve(ty));
        TypeckResult {
            types,
            errors: self.errors,
            warnings: self.warnings,
            layouts: self.scopes.layouts(),
            result_type,
        }
    }

    // ---- pass 1: declaration collection ----

    fn collect_declarations(&mut self, module: &Module) {
        // data types first: everything else may reference them
        for item in &module.items {
            if let Item::Data(data) = item {
                self.declare_data(data);
            }
        }
        for item in &module.items {
            if let Item::Class(class) = item {
                self.declare_class(class);
            }
        }
        for item in &module.items {
            match item {
                Item::Operator(decl) => {
                    self.scopes.define_operator(
                        Symbol::new(&self.module, &decl.name),
                        OperatorInfo {
                            fixity: decl.fixity,
                            precedence: decl.precedence,
                        },
                    );
                }
                Item::Signature(decl) => self.declare_signature(decl),
                _ => {}
            }
        }
        for item in &module.items {
            if let Item::Instance(instance) = item {
                self.declare_instance(instance);
            }
        }
    }

    fn declare_data(&mut self, data: &DataDef) {
        let name = Symbol::new(&self.module, &data.name);
        let mut vars = FxHashMap::default();
        let params: Vec<Ty> = data
            .params
            .iter()
            .map(|p| self.type_var(p, &mut vars))
            .collect();
        let parent = Ty::sum(name.clone(), params);

        let mut constructors = Vec::new();
        for variant in &data.variants {
            let constructor = Symbol::new(&self.module, &variant.name);
            let fields: Vec<Ty> = variant
                .fields
                .iter()
                .map(|f| self.lower_type(&f.ty, &mut vars))
                .collect();
            self.scopes
                .define_value(constructor.clone(), Ty::curry(fields, parent.clone()));
            self.scopes.define_declared(
                constructor.clone(),
                Declared::Constructor {
                    parent: name.clone(),
                    fields: variant.fields.iter().map(|f| f.name.clone()).collect(),
                },
            );
            constructors.push(constructor);
        }
        self.scopes.define_declared(
            name,
            Declared::DataType {
                arity: data.params.len(),
                constructors,
            },
        );
    }

    fn declare_class(&mut self, class: &ClassDef) {
        let name = Symbol::new(&self.module, &class.name);
        let Ty::Var(fresh) = self.types.reserve_type() else {
            unreachable!()
        };
        let class_var = Ty::Var(TyVar::with_context(fresh.name.clone(), [name.clone()]));
        self.types.extend_context(&class_var, [name.clone()]);

        let mut vars = FxHashMap::default();
        vars.insert(class.var.clone(), class_var);

        let mut members = Vec::new();
        for member in &class.members {
            let member_sym = Symbol::new(&self.module, &member.name);
            let sig = self.lower_type(&member.ty, &mut vars);
            self.scopes.define_signature(member_sym.clone(), sig);
            self.scopes
                .mark_class_member(member_sym.clone(), name.clone());
            members.push(member_sym);
        }
        self.scopes.define_declared(
            name,
            Declared::Class {
                var: fresh.name,
                members,
            },
        );
    }

    fn declare_signature(&mut self, decl: &SignatureDecl) {
        let name = Symbol::new(&self.module, &decl.name);
        let existing = self.scopes.entry(&name).and_then(|e| e.signature);
        if existing.is_some() {
            // the first declaration stands
            self.errors.push(TypeError::DuplicateSignature {
                name,
                span: decl.span,
            });
            return;
        }
        let mut vars = FxHashMap::default();
        let ty = self.lower_type(&decl.ty, &mut vars);
        self.scopes.define_signature(name, ty);
    }

    fn declare_instance(&mut self, instance: &InstanceDef) {
        assert!(
            !instance.params.is_empty(),
            "instance declarations carry at least one head type"
        );
        let Some(class) = self.resolve_class(&instance.class, instance.span) else {
            return;
        };
        let Some(Declared::Class { members, .. }) =
            self.scopes.entry(&class).and_then(|e| e.declared)
        else {
            self.errors.push(TypeError::UndefinedSymbol {
                symbol: instance.class.clone(),
                span: instance.span,
            });
            return;
        };

        let mut provided = Vec::new();
        for member in &instance.members {
            match members.iter().find(|m| m.name == member.name) {
                Some(declared) => provided.push(declared.clone()),
                None => self.errors.push(TypeError::ExtraInstanceMember {
                    class: class.clone(),
                    member: Symbol::bare(&member.name),
                    span: member.span,
                }),
            }
        }
        for required in &members {
            if !provided.contains(required) {
                self.errors.push(TypeError::MissingInstanceMember {
                    class: class.clone(),
                    member: required.clone(),
                    span: instance.span,
                });
            }
        }

        let mut vars = FxHashMap::default();
        let params: Vec<Ty> = instance
            .params
            .iter()
            .map(|p| self.lower_type(p, &mut vars))
            .collect();
        let tags: Vec<String> = params.iter().map(head_tag).collect();
        let value = Symbol::new(
            &self.module,
            format!("#{}#{}", class.name, tags.join("#")),
        );
        self.scopes.define_value(
            value.clone(),
            Ty::instance(class.clone(), instance_binding(&params)),
        );
        self.scopes.add_instance(InstanceDescriptor {
            module: self.module.clone(),
            class,
            params,
            value,
        });
    }

    /// Accrue each visible instance's class onto its head type, so
    /// constrained unification can see which concrete types satisfy what.
    fn extend_imported_contexts(&mut self) {
        let mut sources = vec![self.module.clone()];
        sources.extend(self.imports.iter().cloned());
        for source in sources {
            for descriptor in self.scopes.instances_of_module(&source) {
                let head = instance_binding(&descriptor.params);
                self.types.extend_context(&head, [descriptor.class]);
            }
        }
    }

    // ---- surface type lowering ----

    fn lower_type(&mut self, expr: &TypeExpr, vars: &mut FxHashMap<String, Ty>) -> Ty {
        match expr {
            TypeExpr::Name { symbol, span } => self.lower_name(symbol, &[], *span, vars),
            TypeExpr::Var { name, .. } => self.type_var(name, vars),
            TypeExpr::Apply { head, args, span } => match head.as_ref() {
                TypeExpr::Name { symbol, .. } => self.lower_name(symbol, args, *span, vars),
                // a variable head stays an open application chain
                _ => {
                    let mut ty = self.lower_type(head, vars);
                    for arg in args {
                        ty = Ty::app(ty, self.lower_type(arg, vars));
                    }
                    ty
                }
            },
            TypeExpr::Fun { arg, ret, .. } => {
                Ty::fun(self.lower_type(arg, vars), self.lower_type(ret, vars))
            }
            TypeExpr::Tuple { items, .. } => {
                Ty::tuple(items.iter().map(|i| self.lower_type(i, vars)).collect())
            }
            TypeExpr::List { item, .. } => Ty::list(self.lower_type(item, vars)),
            TypeExpr::Constrained {
                constraints, ty, ..
            } => {
                for constraint in constraints {
                    let Some(class) = self.resolve_class(&constraint.class, constraint.span)
                    else {
                        continue;
                    };
                    // attach the class both on the variable and in the scope
                    let var = self.type_var(&constraint.var, vars);
                    let Ty::Var(mut inner) = var else { unreachable!() };
                    inner.context.insert(class.clone());
                    let var = Ty::Var(inner);
                    self.types.extend_context(&var, [class]);
                    vars.insert(constraint.var.clone(), var);
                }
                self.lower_type(ty, vars)
            }
        }
    }

    fn type_var(&mut self, name: &str, vars: &mut FxHashMap<String, Ty>) -> Ty {
        vars.entry(name.to_string())
            .or_insert_with(|| self.types.reserve_type())
            .clone()
    }

    fn lower_name(
        &mut self,
        symbol: &Symbol,
        args: &[TypeExpr],
        span: TextRange,
        vars: &mut FxHashMap<String, Ty>,
    ) -> Ty {
        let Some(qualified) = self.scopes.qualify(symbol) else {
            self.errors.push(TypeError::UndefinedSymbol {
                symbol: symbol.clone(),
                span,
            });
            return self.types.reserve_type();
        };
        let lowered: Vec<Ty> = args.iter().map(|a| self.lower_type(a, vars)).collect();
        if let Some(Declared::DataType { arity, .. }) =
            self.scopes.entry(&qualified).and_then(|e| e.declared)
        {
            if arity != lowered.len() {
                self.errors.push(TypeError::ArityMismatch {
                    name: qualified.clone(),
                    expected: arity,
                    actual: lowered.len(),
                    span,
                });
            }
        }
        Ty::sum(qualified, lowered)
    }

    fn resolve_class(&mut self, symbol: &Symbol, span: TextRange) -> Option<Symbol> {
        match self.scopes.qualify(symbol) {
            Some(qualified) => Some(qualified),
            None => {
                self.errors.push(TypeError::UndefinedSymbol {
                    symbol: symbol.clone(),
                    span,
                });
                None
            }
        }
    }

    // ---- pass 2: binding ----

    fn bind_definitions(&mut self, module: &mut Module) {
        // every top-level name is visible to every body
        for item in &module.items {
            if let Item::Value(def) = item {
                let symbol = Symbol::new(&self.module, &def.name);
                let taken = self
                    .scopes
                    .entry(&symbol)
                    .is_some_and(|e| e.value_type.is_some());
                if !taken {
                    let own = self.types.reserve_type();
                    self.types.specialize(&own);
                    self.scopes.define_value(symbol, own);
                }
            }
        }
        for item in &mut module.items {
            match item {
                Item::Value(def) => self.bind_def(def),
                Item::Instance(instance) => {
                    for member in &mut instance.members {
                        self.bind_def(member);
                    }
                }
                _ => {}
            }
        }
        // the precedence layer cannot parse uses of a symbolic name
        // without a fixity, so a definition alone is not enough
        for item in &module.items {
            let Item::Value(def) = item else { continue };
            if !is_operator_name(&def.name) {
                continue;
            }
            let entry = self.scopes.entry(&Symbol::new(&self.module, &def.name));
            if !entry.is_some_and(|e| e.operator.is_some()) {
                self.errors.push(TypeError::UndefinedOperator {
                    name: def.name.clone(),
                    span: def.span,
                });
            }
        }
    }

    fn bind_def(&mut self, def: &mut ValueDef) {
        let scope = self.scopes.enter_scope();
        def.scope = Some(scope);
        self.bind_expr(&mut def.body);
        self.scopes.leave_scope();
    }

    fn bind_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Var { symbol, span } => match self.scopes.qualify(symbol) {
                Some(qualified) => {
                    if qualified.is_qualified() {
                        self.scopes.add_dependency(qualified.clone());
                    }
                    *symbol = qualified;
                }
                None => self.errors.push(TypeError::UndefinedSymbol {
                    symbol: symbol.clone(),
                    span: *span,
                }),
            },
            Expr::Apply {
                function, argument, ..
            } => {
                self.bind_expr(function);
                self.bind_expr(argument);
            }
            Expr::Lambda {
                param, body, scope, ..
            } => {
                let id = self.scopes.enter_scope();
                *scope = Some(id);
                self.bind_pattern(param);
                self.bind_expr(body);
                self.scopes.leave_scope();
            }
            Expr::Let {
                bindings,
                body,
                scope,
                ..
            } => {
                let id = self.scopes.enter_scope();
                *scope = Some(id);
                // all names first, so bindings can refer to each other
                for binding in bindings.iter() {
                    self.scopes.add_local(&binding.name, binding.span);
                }
                for binding in bindings.iter_mut() {
                    self.bind_expr(&mut binding.value);
                }
                self.bind_expr(body);
                self.scopes.leave_scope();
            }
            Expr::Clauses {
                clauses,
                scope,
                span,
            } => {
                for clause in clauses.iter_mut() {
                    let id = self.scopes.enter_scope();
                    clause.scope = Some(id);
                    for pattern in &mut clause.patterns {
                        self.bind_pattern(pattern);
                    }
                    self.bind_expr(&mut clause.body);
                    self.scopes.leave_scope();
                }
                let arity = clauses.first().map_or(0, |c| c.patterns.len());
                assert!(
                    clauses.iter().all(|c| c.patterns.len() == arity),
                    "sibling clauses must agree on pattern count"
                );
                // consolidate the clause scopes under one synthetic function
                let fun = self.scopes.insert_child();
                *scope = Some(fun);
                self.scopes.enter_existing(fun);
                for index in 0..arity {
                    self.scopes.add_local(&format!("#arg#{index}"), *span);
                }
                self.scopes.leave_scope();
            }
        }
    }

    fn bind_pattern(&mut self, pattern: &mut Pattern) {
        match pattern {
            Pattern::Wildcard { .. } | Pattern::Literal { .. } => {}
            Pattern::Var { name, span } => self.scopes.add_local(name, *span),
            Pattern::Tuple { items, .. } => {
                for item in items {
                    self.bind_pattern(item);
                }
            }
            Pattern::Record {
                constructor,
                fields,
                span,
            } => {
                match self.scopes.qualify(constructor) {
                    Some(qualified) => {
                        if qualified.is_qualified() {
                            self.scopes.add_dependency(qualified.clone());
                        }
                        *constructor = qualified;
                    }
                    None => self.errors.push(TypeError::UndefinedSymbol {
                        symbol: constructor.clone(),
                        span: *span,
                    }),
                }
                for field in fields {
                    self.bind_pattern(&mut field.pattern);
                }
            }
            Pattern::Constructor { args, span, .. } => {
                self.errors.push(TypeError::UnsupportedConstruct {
                    construct: "positional constructor pattern",
                    span: *span,
                });
                // still bind the names so the body does not cascade
                for arg in args {
                    self.bind_pattern(arg);
                }
            }
        }
    }

    // ---- pass 3: checking ----

    fn check_definitions(&mut self, module: &mut Module) {
        for item in &mut module.items {
            match item {
                Item::Value(def) => {
                    let symbol = Symbol::new(&self.module, &def.name);
                    let ty = self.check_def(def);
                    let entry = self.scopes.entry(&symbol);
                    let own = entry.as_ref().and_then(|e| e.value_type.clone());
                    if let Some(own) = &own {
                        let outcome = unify(&ty, own, &mut self.types);
                        if let Some(error) = TypeError::from_unify(
                            &outcome,
                            ConstraintOrigin::LetBinding { span: def.span },
                        ) {
                            self.errors.push(error);
                        }
                    }
                    if let Some(sig) = entry.and_then(|e| e.signature) {
                        let mut mappings = FxHashMap::default();
                        let expected = self.types.generic_copy(&sig, &mut mappings);
                        let outcome = unify(&ty, &expected, &mut self.types);
                        if let Some(error) = TypeError::from_unify(
                            &outcome,
                            ConstraintOrigin::Annotation {
                                name: symbol,
                                span: def.body.span(),
                            },
                        ) {
                            self.errors.push(error);
                        }
                    }
                    if let Some(own) = &own {
                        // the definition is complete; its uses go polymorphic
                        self.types.generalize(own);
                    }
                    self.result_type = Some(ty);
                }
                Item::Instance(instance) => self.check_instance(instance),
                _ => {}
            }
        }
    }

    fn check_def(&mut self, def: &mut ValueDef) -> Ty {
        let Some(scope) = def.scope else {
            panic!("definition `{}` was not bound", def.name);
        };
        // scopes re-parented by clause consolidation make `leave_scope`
        // unreliable here; navigation restores the saved id instead
        let saved = self.scopes.current();
        self.scopes.enter_existing(scope);
        let ty = self.check_expr(&mut def.body);
        self.scopes.enter_existing(saved);
        ty
    }

    fn check_instance(&mut self, instance: &mut InstanceDef) {
        let Some(class) = self.scopes.qualify(&instance.class) else {
            return;
        };
        let Some(Declared::Class {
            var: class_var,
            members,
        }) = self.scopes.entry(&class).and_then(|e| e.declared)
        else {
            return;
        };
        let mut vars = FxHashMap::default();
        let params: Vec<Ty> = instance
            .params
            .iter()
            .map(|p| self.lower_type(p, &mut vars))
            .collect();
        let head = instance_binding(&params);

        for member in &mut instance.members {
            let actual = self.check_def(member);
            let Some(declared) = members.iter().find(|m| m.name == member.name).cloned() else {
                continue; // extra member, reported at declaration
            };
            let Some(sig) = self.scopes.entry(&declared).and_then(|e| e.signature) else {
                continue;
            };
            // instantiate the class signature at this instance's head
            let mut mappings = FxHashMap::default();
            mappings.insert(class_var.clone(), head.clone());
            let expected = self.types.generic_copy(&sig, &mut mappings);
            let outcome = unify(&actual, &expected, &mut self.types);
            if !outcome.is_unified() {
                self.errors.push(TypeError::InstanceMemberSignatureMismatch {
                    class: class.clone(),
                    member: declared,
                    expected: self.types.resolve(&expected),
                    actual: self.types.resolve(&actual),
                    span: member.span,
                });
            }
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Ty {
        let span = expr.span();
        let ty = match expr {
            Expr::Literal { value, .. } => literal_ty(value),
            Expr::Var { symbol, .. } => self.check_var(symbol),
            Expr::Apply {
                function,
                argument,
                span,
            } => {
                let fun_ty = self.check_expr(function);
                let arg_ty = self.check_expr(argument);
                let result = self.types.reserve_type();
                let wanted = Ty::fun(arg_ty, result.clone());
                let outcome = unify(&wanted, &fun_ty, &mut self.types);
                if let Some(error) = TypeError::from_unify(
                    &outcome,
                    ConstraintOrigin::Application { span: *span },
                ) {
                    self.errors.push(error);
                }
                result
            }
            Expr::Lambda {
                param, body, scope, ..
            } => {
                let Some(id) = *scope else {
                    panic!("lambda was not bound");
                };
                let mark = self.pinned.len();
                let saved = self.scopes.current();
                self.scopes.enter_existing(id);
                let param_ty = self.check_pattern(param);
                let body_ty = self.check_expr(body);
                self.scopes.enter_existing(saved);
                self.release_pinned(mark);
                Ty::fun(param_ty, body_ty)
            }
            Expr::Let {
                bindings,
                body,
                scope,
                ..
            } => {
                let Some(id) = *scope else {
                    panic!("let was not bound");
                };
                let saved = self.scopes.current();
                self.scopes.enter_existing(id);
                let mut pinned = Vec::new();
                for binding in bindings.iter() {
                    let fresh = self.types.reserve_type();
                    self.types.specialize(&fresh);
                    self.scopes
                        .define_value(Symbol::bare(&binding.name), fresh.clone());
                    pinned.push(fresh);
                }
                for (binding, own) in bindings.iter_mut().zip(&pinned) {
                    let mark = self.pinned.len();
                    let value_ty = self.check_expr(&mut binding.value);
                    self.release_pinned(mark);
                    let outcome = unify(&value_ty, own, &mut self.types);
                    if let Some(error) = TypeError::from_unify(
                        &outcome,
                        ConstraintOrigin::LetBinding { span: binding.span },
                    ) {
                        self.errors.push(error);
                    }
                }
                // release before the body: let-bound values are polymorphic
                for own in &pinned {
                    self.types.generalize(own);
                }
                let body_ty = self.check_expr(body);
                self.scopes.enter_existing(saved);
                body_ty
            }
            Expr::Clauses { clauses, scope, .. } => self.check_clauses(clauses, *scope),
        };
        self.ty_of.insert(span, ty.clone());
        ty
    }

    fn check_var(&mut self, symbol: &Symbol) -> Ty {
        let Some(entry) = self.scopes.entry(symbol) else {
            // unresolved, already reported during binding
            return self.types.reserve_type();
        };
        match entry.value_type.or(entry.signature) {
            Some(scheme) => {
                let mut mappings = FxHashMap::default();
                self.types.generic_copy(&scheme, &mut mappings)
            }
            None => self.types.reserve_type(),
        }
    }

    fn check_clauses(&mut self, clauses: &mut [Clause], scope: Option<ScopeId>) -> Ty {
        let Some(fun) = scope else {
            panic!("clauses were not bound");
        };
        let arity = clauses.first().map_or(0, |c| c.patterns.len());
        let mark = self.pinned.len();
        let saved = self.scopes.current();

        self.scopes.enter_existing(fun);
        let mut arg_tys = Vec::with_capacity(arity);
        for index in 0..arity {
            let fresh = self.types.reserve_type();
            self.types.specialize(&fresh);
            self.pinned.push(fresh.clone());
            self.scopes
                .define_value(Symbol::bare(format!("#arg#{index}")), fresh.clone());
            arg_tys.push(fresh);
        }
        let result_ty = self.types.reserve_type();
        self.types.specialize(&result_ty);
        self.pinned.push(result_ty.clone());

        for clause in clauses.iter_mut() {
            let Some(id) = clause.scope else {
                panic!("clause was not bound");
            };
            self.scopes.enter_existing(id);
            for (pattern, arg_ty) in clause.patterns.iter_mut().zip(&arg_tys) {
                let pattern_ty = self.check_pattern(pattern);
                let outcome = unify(&pattern_ty, arg_ty, &mut self.types);
                if let Some(error) = TypeError::from_unify(
                    &outcome,
                    ConstraintOrigin::Pattern {
                        span: pattern.span(),
                    },
                ) {
                    self.errors.push(error);
                }
            }
            let body_ty = self.check_expr(&mut clause.body);
            let outcome = unify(&body_ty, &result_ty, &mut self.types);
            if let Some(error) = TypeError::from_unify(
                &outcome,
                ConstraintOrigin::ClauseResult {
                    span: clause.body.span(),
                },
            ) {
                self.errors.push(error);
            }
        }

        self.scopes.enter_existing(saved);
        self.release_pinned(mark);
        Ty::curry(arg_tys, result_ty)
    }

    fn check_pattern(&mut self, pattern: &mut Pattern) -> Ty {
        match pattern {
            Pattern::Wildcard { .. } => self.types.reserve_type(),
            Pattern::Var { name, .. } => {
                // pattern variables are monomorphic while their scope lasts
                let fresh = self.types.reserve_type();
                self.types.specialize(&fresh);
                self.pinned.push(fresh.clone());
                self.scopes
                    .define_value(Symbol::bare(name.as_str()), fresh.clone());
                fresh
            }
            Pattern::Literal { value, .. } => literal_ty(value),
            Pattern::Tuple { items, .. } => {
                let items = items.iter_mut().map(|i| self.check_pattern(i)).collect();
                Ty::tuple(items)
            }
            Pattern::Record {
                constructor,
                fields,
                span,
            } => {
                let constructor = constructor.clone();
                self.check_record_pattern(&constructor, fields, *span)
            }
            Pattern::Constructor { args, .. } => {
                // rejected during binding; recover with fresh types
                for arg in args {
                    self.check_pattern(arg);
                }
                self.types.reserve_type()
            }
        }
    }

    fn check_record_pattern(
        &mut self,
        constructor: &Symbol,
        fields: &mut [FieldPattern],
        span: TextRange,
    ) -> Ty {
        let entry = self.scopes.entry(constructor);
        let descriptor = entry.and_then(|e| match (e.value_type, e.declared) {
            (Some(value), Some(Declared::Constructor { fields, .. })) => Some((value, fields)),
            _ => None,
        });
        let Some((value, declared_fields)) = descriptor else {
            self.errors.push(TypeError::UnsupportedConstruct {
                construct: "record pattern on a value that is not a record constructor",
                span,
            });
            for field in fields {
                self.check_pattern(&mut field.pattern);
            }
            return self.types.reserve_type();
        };

        let mut mappings = FxHashMap::default();
        let instantiated = self.types.generic_copy(&value, &mut mappings);
        let (field_tys, result) = split_fun(&instantiated);
        for field in fields {
            let position = declared_fields.iter().position(|f| f == &field.name);
            let Some(field_ty) = position.and_then(|i| field_tys.get(i)) else {
                self.errors.push(TypeError::UndefinedSymbol {
                    symbol: Symbol::bare(&field.name),
                    span: field.span,
                });
                self.check_pattern(&mut field.pattern);
                continue;
            };
            let pattern_ty = self.check_pattern(&mut field.pattern);
            let outcome = unify(&pattern_ty, field_ty, &mut self.types);
            if let Some(error) = TypeError::from_unify(
                &outcome,
                ConstraintOrigin::Pattern { span: field.span },
            ) {
                self.errors.push(error);
            }
        }
        result
    }

    fn release_pinned(&mut self, mark: usize) {
        for ty in self.pinned.split_off(mark) {
            self.types.generalize(&ty);
        }
    }

    // ---- pass 4: dictionary elaboration ----

    fn bind_methods(&mut self, module: &mut Module, home: ScopeId) {
        for item in &mut module.items {
            match item {
                Item::Value(def) => {
                    let symbol = Symbol::new(&self.module, &def.name);
                    self.elaborate_def(def, Some(&symbol), home);
                }
                Item::Instance(instance) => {
                    for member in &mut instance.members {
                        self.elaborate_def(member, None, home);
                    }
                }
                _ => {}
            }
        }
    }

    fn elaborate_def(&mut self, def: &mut ValueDef, symbol: Option<&Symbol>, home: ScopeId) {
        let scheme = match symbol {
            Some(symbol) => self
                .scopes
                .entry(symbol)
                .and_then(|e| e.value_type),
            None => self.ty_of.get(&def.body.span()).cloned(),
        };
        let Some(scheme) = scheme else {
            return;
        };
        let ty = self.types.resolve(&scheme);
        let required = instance_map(&ty);
        let frame: Vec<DictArg> = required
            .into_iter()
            .map(|(var, class)| DictArg {
                var,
                class,
                name: self.types.reserve_value_name("dict"),
            })
            .collect();

        let Some(def_scope) = def.scope else {
            panic!("definition `{}` was not bound", def.name);
        };

        // scopes for the dictionary lambdas, innermost first; each insertion
        // slides the previous wrap (and the original body scopes) below it
        let span = def.body.span();
        let mut wraps = Vec::with_capacity(frame.len());
        for arg in frame.iter().rev() {
            self.scopes.enter_existing(def_scope);
            let id = self.scopes.insert_child();
            self.scopes.enter_existing(id);
            self.scopes.add_local(&arg.name, span);
            wraps.push(id);
        }

        let base = wraps.first().copied().unwrap_or(def_scope);
        self.scopes.enter_existing(base);
        self.dict_frames.push(frame);
        self.rewrite_expr(&mut def.body);
        let Some(frame) = self.dict_frames.pop() else {
            unreachable!()
        };

        if !frame.is_empty() {
            let mut wrapped = mem::replace(&mut def.body, Expr::int(0, span));
            for (arg, id) in frame.iter().rev().zip(&wraps) {
                wrapped = Expr::Lambda {
                    param: Pattern::var(&arg.name, span),
                    body: Box::new(wrapped),
                    scope: Some(*id),
                    span,
                };
            }
            def.body = wrapped;
        }
        self.scopes.enter_existing(home);
    }

    fn rewrite_expr(&mut self, expr: &mut Expr) {
        if let Expr::Var { symbol, span } = expr {
            let symbol = symbol.clone();
            let span = *span;
            if let Some(replacement) = self.dictionary_application(&symbol, span) {
                *expr = replacement;
            }
            return;
        }
        match expr {
            Expr::Literal { .. } | Expr::Var { .. } => {}
            Expr::Apply {
                function, argument, ..
            } => {
                self.rewrite_expr(function);
                self.rewrite_expr(argument);
            }
            Expr::Lambda { body, scope, .. } => {
                let Some(id) = *scope else {
                    panic!("lambda was not bound");
                };
                let saved = self.scopes.current();
                self.scopes.enter_existing(id);
                self.rewrite_expr(body);
                self.scopes.enter_existing(saved);
            }
            Expr::Let {
                bindings, body, scope, ..
            } => {
                let Some(id) = *scope else {
                    panic!("let was not bound");
                };
                let saved = self.scopes.current();
                self.scopes.enter_existing(id);
                for binding in bindings.iter_mut() {
                    self.rewrite_expr(&mut binding.value);
                }
                self.rewrite_expr(body);
                self.scopes.enter_existing(saved);
            }
            Expr::Clauses { clauses, .. } => {
                let saved = self.scopes.current();
                for clause in clauses.iter_mut() {
                    let Some(id) = clause.scope else {
                        panic!("clause was not bound");
                    };
                    self.scopes.enter_existing(id);
                    self.rewrite_expr(&mut clause.body);
                }
                self.scopes.enter_existing(saved);
            }
        }
    }

    /// The dictionary applications a reference needs, if any.
    ///
    /// Class methods resolve one dictionary for their class variable's
    /// instantiation at this occurrence. References to constrained top-level
    /// definitions resolve one dictionary per `(variable, class)` requirement
    /// of the definition's scheme, in the order its own parameters were
    /// synthesized. Locals never take dictionaries; their constraints belong
    /// to the definition enclosing them.
    fn dictionary_application(&mut self, symbol: &Symbol, span: TextRange) -> Option<Expr> {
        let entry = self.scopes.entry(symbol)?;
        let occurrence = self.ty_of.get(&span)?.clone();
        let occurrence = self.types.resolve(&occurrence);

        let requirements: Vec<(Ty, Symbol)> = match &entry.class_member {
            Some(class) => {
                let sig = entry.signature.clone()?;
                let Some(Declared::Class { var, .. }) =
                    self.scopes.entry(class).and_then(|e| e.declared)
                else {
                    return None;
                };
                let target = instantiation_of(&sig, &var, &occurrence)?;
                vec![(target, class.clone())]
            }
            None => {
                if !symbol.is_qualified() {
                    return None;
                }
                let scheme = self.types.resolve(&entry.value_type?);
                instance_map(&scheme)
                    .into_iter()
                    .map(|(var, class)| {
                        instantiation_of(&scheme, &var.name, &occurrence)
                            .map(|target| (target, class))
                    })
                    .collect::<Option<Vec<_>>>()?
            }
        };
        if requirements.is_empty() {
            return None;
        }

        let mut rewritten = Expr::var(symbol.clone(), span);
        for (ty, class) in requirements {
            let dictionary = self.dictionary_for(&ty, &class, span)?;
            rewritten = Expr::apply(rewritten, dictionary, span);
        }
        Some(rewritten)
    }

    fn dictionary_for(&mut self, ty: &Ty, class: &Symbol, span: TextRange) -> Option<Expr> {
        let resolved = self.types.resolve(ty);
        match &resolved {
            Ty::Var(var) => {
                match find_argument(&self.dict_frames, class, var, &self.types) {
                    Some(name) => {
                        // resolve through the scope chain so intervening
                        // closures record the capture
                        let symbol = Symbol::bare(name);
                        self.scopes.qualify(&symbol);
                        Some(Expr::var(symbol, span))
                    }
                    None => {
                        self.errors.push(TypeError::InstanceNotFound {
                            class: class.clone(),
                            ty: resolved.clone(),
                            span,
                        });
                        None
                    }
                }
            }
            _ => self.concrete_dictionary(&resolved, class, span),
        }
    }

    fn concrete_dictionary(&mut self, ty: &Ty, class: &Symbol, span: TextRange) -> Option<Expr> {
        let found = self
            .scopes
            .visible_instances(class, std::slice::from_ref(ty));
        let mut descriptors = found.into_iter();
        match (descriptors.next(), descriptors.next()) {
            (Some(only), None) => {
                self.scopes.add_dependency(only.value.clone());
                Some(Expr::var(only.value, span))
            }
            (None, _) => {
                self.errors.push(TypeError::InstanceNotFound {
                    class: class.clone(),
                    ty: ty.clone(),
                    span,
                });
                None
            }
            (Some(first), Some(second)) => {
                let mut modules: Vec<String> = [first, second]
                    .into_iter()
                    .chain(descriptors)
                    .map(|d| d.module)
                    .collect();
                modules.sort();
                modules.dedup();
                self.errors.push(TypeError::AmbiguousInstance {
                    class: class.clone(),
                    ty: ty.clone(),
                    modules,
                    span,
                });
                None
            }
        }
    }
}

fn literal_ty(value: &Literal) -> Ty {
    match value {
        Literal::Int(_) => Ty::int(),
        Literal::Float(_) => Ty::float(),
        Literal::String(_) => Ty::string(),
        Literal::Bool(_) => Ty::bool(),
    }
}

/// One type standing for an instance's whole head: the single parameter, or
/// the parameters packed as a tuple for multi-parameter classes.
fn instance_binding(params: &[Ty]) -> Ty {
    match params {
        [single] => single.clone(),
        _ => Ty::tuple(params.to_vec()),
    }
}

/// Names the precedence layer treats as infix: anything not starting with
/// a letter, `_`, or a synthetic `#` prefix.
fn is_operator_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| !c.is_alphanumeric() && c != '_' && c != '#')
}

fn head_tag(ty: &Ty) -> String {
    match ty {
        Ty::Sum { name, .. } => name.name.clone(),
        other => other.to_string(),
    }
}

/// What `var` became in an occurrence of a scheme: the first type paired
/// against it when the two shapes are laid side by side.
fn instantiation_of(scheme: &Ty, var: &str, occurrence: &Ty) -> Option<Ty> {
    let pairs = scheme.zip(occurrence)?;
    pairs.into_iter().find_map(|(s, o)| match s {
        Ty::Var(v) if v.name == var => Some(o),
        _ => None,
    })
}

fn split_fun(ty: &Ty) -> (Vec<Ty>, Ty) {
    let mut args = Vec::new();
    let mut current = ty.clone();
    while let Ty::Fun { arg, ret } = current {
        args.push(*arg);
        current = *ret;
    }
    (args, current)
}
