//! The implicit `Core` module.
//!
//! Every module imports `Core` without declaring it: primitive types, the
//! arithmetic and comparison classes, their operators, and instances over
//! the primitives. Type variables here use the `%` prefix, which the
//! fresh-name generator never produces, so registry signatures cannot
//! collide with inference-time variables.

use tarn_ast::{Fixity, Symbol};

use crate::resolver::{Declared, InstanceDescriptor, ModuleRegistry, OperatorInfo};
use crate::ty::{Ty, TyVar};

pub const CORE: &str = "Core";

fn core(name: &str) -> Symbol {
    Symbol::new(CORE, name)
}

/// The registry every compilation starts from.
pub fn core_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register_types(&mut registry);
    register_num(&mut registry);
    register_eq(&mut registry);
    register_ord(&mut registry);
    register_show(&mut registry);
    registry
}

fn register_types(registry: &mut ModuleRegistry) {
    for name in ["Int", "Float", "String"] {
        registry.entry_mut(core(name)).declared = Some(Declared::DataType {
            arity: 0,
            constructors: Vec::new(),
        });
    }
    registry.entry_mut(core("Bool")).declared = Some(Declared::DataType {
        arity: 0,
        constructors: vec![core("True"), core("False")],
    });
    for name in ["True", "False"] {
        let entry = registry.entry_mut(core(name));
        entry.value_type = Some(Ty::bool());
        entry.declared = Some(Declared::Constructor {
            parent: core("Bool"),
            fields: Vec::new(),
        });
    }
    registry.entry_mut(core("[]")).declared = Some(Declared::DataType {
        arity: 1,
        constructors: Vec::new(),
    });
    registry.entry_mut(core("(,)")).declared = Some(Declared::DataType {
        arity: 2,
        constructors: Vec::new(),
    });
    registry.entry_mut(core("(,,)")).declared = Some(Declared::DataType {
        arity: 3,
        constructors: Vec::new(),
    });
}

fn register_class(
    registry: &mut ModuleRegistry,
    class: &str,
    var: &str,
    members: &[(&str, Option<OperatorInfo>, Ty)],
) {
    let class_sym = core(class);
    registry.entry_mut(class_sym.clone()).declared = Some(Declared::Class {
        var: var.to_string(),
        members: members.iter().map(|(name, ..)| core(name)).collect(),
    });
    for (name, operator, ty) in members {
        let entry = registry.entry_mut(core(name));
        entry.signature = Some(ty.clone());
        entry.class_member = Some(class_sym.clone());
        entry.operator = *operator;
    }
}

fn add_instance(registry: &mut ModuleRegistry, class: &str, head: Ty) {
    let value = core(&format!("#{class}#{}", head_tag(&head)));
    registry.entry_mut(value.clone()).value_type =
        Some(Ty::instance(core(class), head.clone()));
    registry.add_instance(InstanceDescriptor {
        module: CORE.to_string(),
        class: core(class),
        params: vec![head],
        value,
    });
}

fn head_tag(ty: &Ty) -> String {
    match ty {
        Ty::Sum { name, .. } => name.name.clone(),
        other => other.to_string(),
    }
}

fn register_num(registry: &mut ModuleRegistry) {
    let n = || Ty::Var(TyVar::with_context("%num", [core("Num")]));
    let binary = || Ty::fun(n(), Ty::fun(n(), n()));
    let left = |precedence| {
        Some(OperatorInfo {
            fixity: Fixity::Left,
            precedence,
        })
    };
    register_class(
        registry,
        "Num",
        "%num",
        &[
            ("+", left(6), binary()),
            ("-", left(6), binary()),
            ("*", left(7), binary()),
            ("/", left(7), binary()),
        ],
    );
    add_instance(registry, "Num", Ty::int());
    add_instance(registry, "Num", Ty::float());
}

fn register_eq(registry: &mut ModuleRegistry) {
    let e = || Ty::Var(TyVar::with_context("%eq", [core("Eq")]));
    let compare = || Ty::fun(e(), Ty::fun(e(), Ty::bool()));
    let bare = Some(OperatorInfo {
        fixity: Fixity::None,
        precedence: 4,
    });
    register_class(
        registry,
        "Eq",
        "%eq",
        &[("==", bare, compare()), ("/=", bare, compare())],
    );
    for head in [Ty::int(), Ty::float(), Ty::string(), Ty::bool()] {
        add_instance(registry, "Eq", head);
    }
}

fn register_ord(registry: &mut ModuleRegistry) {
    let o = || Ty::Var(TyVar::with_context("%ord", [core("Ord")]));
    let compare = || Ty::fun(o(), Ty::fun(o(), Ty::bool()));
    let bare = Some(OperatorInfo {
        fixity: Fixity::None,
        precedence: 4,
    });
    register_class(
        registry,
        "Ord",
        "%ord",
        &[
            ("<", bare, compare()),
            (">", bare, compare()),
            ("<=", bare, compare()),
            (">=", bare, compare()),
        ],
    );
    add_instance(registry, "Ord", Ty::int());
    add_instance(registry, "Ord", Ty::float());
}

fn register_show(registry: &mut ModuleRegistry) {
    let s = || Ty::Var(TyVar::with_context("%show", [core("Show")]));
    register_class(
        registry,
        "Show",
        "%show",
        &[("show", None, Ty::fun(s(), Ty::string()))],
    );
    for head in [Ty::int(), Ty::string(), Ty::bool()] {
        add_instance(registry, "Show", head);
    }
}
