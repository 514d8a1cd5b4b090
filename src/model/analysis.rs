//! Fixed-point exclusion filtering
//!
//! An executable that mentions an un-modellable type — bottom from the
//! loader, a multi-dimensional pointer, a class no creator can produce
//! — is marked *excluded* so the loop never selects it. Filtering
//! re-runs until stable, because excluding a creator can in turn make
//! every executable that needed its class unsatisfiable.

use crate::model::{ApiModel, ClassId, CreatorKind, ExecId};
use crate::types::{TypeKind, TypeTable, TypeWithMods};

/// What the filtering pass did.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Executables excluded, in exclusion order
    pub excluded: Vec<ExecId>,
    /// Fixed-point rounds performed
    pub rounds: usize,
}

fn class_has_creator(model: &ApiModel, class: ClassId) -> bool {
    model.creators().any(|(_, e)| {
        let info = e.creator.expect("creator info");
        info.kind != CreatorKind::MethodWithOutputRef
            && model.inheritance().is_subclass_of(class, info.target_class)
    })
}

/// Whether an operand of type `ty` can in principle be resolved against
/// the current (partially excluded) model.
fn type_satisfiable(model: &ApiModel, types: &TypeTable, ty: TypeWithMods) -> bool {
    if ty.is_bottom() {
        return false;
    }
    // multi-dimensional pointers/arrays are deliberately out of scope
    if ty.mods.indirection_depth() > 1 {
        return false;
    }
    match types.kind(ty.ty) {
        TypeKind::Bottom => false,
        TypeKind::Primitive(p) => {
            // plain void cannot be an operand; void* can
            *p != crate::types::Primitive::Void || ty.mods.is_pointer()
        }
        TypeKind::Enum(e) => !model.enum_model(*e).variants.is_empty(),
        TypeKind::Class(c) => class_has_creator(model, *c),
        TypeKind::TemplateParam(_) => true,
        TypeKind::Container(_) => false,
        TypeKind::Spec { target, args } => {
            let target_ok = match types.kind(*target) {
                TypeKind::Class(c) => class_has_creator(model, *c),
                TypeKind::Container(_) => true,
                _ => false,
            };
            target_ok
                && args.iter().all(|arg| match arg {
                    crate::types::TemplateArg::Type(t) => type_satisfiable(model, types, *t),
                    _ => true,
                })
        }
    }
}

fn executable_satisfiable(model: &ApiModel, types: &TypeTable, id: ExecId) -> bool {
    let exec = model.executable(id);
    if exec.ret.is_some_and(|r| r.is_bottom()) {
        return false;
    }
    if exec.args.iter().any(|a| !type_satisfiable(model, types, *a)) {
        return false;
    }
    if exec.requires_invoking_obj {
        let owner = exec.owner.expect("member without owner");
        if !class_has_creator(model, owner) {
            return false;
        }
    }
    true
}

/// Run exclusion filtering to a fixed point.
pub fn filter_model(model: &mut ApiModel, types: &TypeTable) -> AnalysisReport {
    let mut report = AnalysisReport::default();
    loop {
        report.rounds += 1;
        let newly_excluded: Vec<ExecId> = model
            .executables()
            .filter(|(id, e)| !e.excluded && !executable_satisfiable(model, types, *id))
            .map(|(id, _)| id)
            .collect();
        if newly_excluded.is_empty() {
            break;
        }
        for id in &newly_excluded {
            tracing::warn!(
                executable = %model.executable(*id).qualified_name,
                "excluded: unsatisfiable signature"
            );
            model.set_excluded(*id, true);
        }
        report.excluded.extend(newly_excluded);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassModel, ClassVariant, Executable, ModelBuilder};
    use crate::types::Modifiers;

    fn class(name: &str) -> ClassModel {
        ClassModel {
            name: name.to_string(),
            qualified_name: name.to_string(),
            variant: ClassVariant::Class,
            template_params: Vec::new(),
            fields: Vec::new(),
            has_public_copy_ctor: true,
        }
    }

    #[test]
    fn test_bottom_argument_excluded() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function(
            "f",
            "f",
            int,
            vec![TypeWithMods::bottom()],
        ));
        let ok = b.add_executable(Executable::free_function("g", "g", int, vec![int]));
        let (mut model, types) = b.build();

        let report = filter_model(&mut model, &types);
        assert!(model.executable(f).excluded);
        assert!(!model.executable(ok).excluded);
        assert_eq!(report.excluded, vec![f]);
    }

    #[test]
    fn test_multi_pointer_argument_excluded() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let char_ptr_ptr = TypeWithMods::with_mods(
            b.types().primitive(crate::types::Primitive::Char),
            Modifiers {
                pointers: 2,
                ..Modifiers::none()
            },
        );
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![char_ptr_ptr]));
        let (mut model, types) = b.build();

        filter_model(&mut model, &types);
        assert!(model.executable(f).excluded);
    }

    #[test]
    fn test_single_pointer_argument_kept() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let int_ptr = int.with_additional(Modifiers::pointer());
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int_ptr]));
        let (mut model, types) = b.build();

        filter_model(&mut model, &types);
        assert!(!model.executable(f).excluded);
    }

    #[test]
    fn test_class_without_creator_excludes_consumers() {
        let mut b = ModelBuilder::new();
        let orphan = b.add_class(class("Orphan"));
        let orphan_val = b.types().class_value(orphan);
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![orphan_val]));
        let (mut model, types) = b.build();

        filter_model(&mut model, &types);
        assert!(model.executable(f).excluded);
    }

    #[test]
    fn test_exclusion_cascades_to_fixed_point() {
        // B's only constructor takes an unresolvable char**; excluding
        // it leaves B creatorless, which must exclude f(B) in a later
        // round.
        let mut b = ModelBuilder::new();
        let cls = b.add_class(class("B"));
        let char_ptr_ptr = TypeWithMods::with_mods(
            b.types().primitive(crate::types::Primitive::Char),
            Modifiers {
                pointers: 2,
                ..Modifiers::none()
            },
        );
        let ctor =
            b.add_executable(Executable::constructor(cls, "B", "B::B", vec![char_ptr_ptr]));
        let b_val = b.types().class_value(cls);
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![b_val]));
        let (mut model, types) = b.build();

        let report = filter_model(&mut model, &types);
        assert!(model.executable(ctor).excluded);
        assert!(model.executable(f).excluded);
        assert!(report.rounds >= 2, "expected a cascading round");
    }

    #[test]
    fn test_member_without_owner_creator_excluded() {
        let mut b = ModelBuilder::new();
        let cls = b.add_class(class("NoCtor"));
        let int = b.types().int_value();
        let m = b.add_executable(Executable::method(cls, "m", "NoCtor::m", int, vec![], false));
        let s = b.add_executable(Executable::method(
            cls,
            "s",
            "NoCtor::s",
            int,
            vec![],
            true,
        ));
        let (mut model, types) = b.build();

        filter_model(&mut model, &types);
        // instance method needs an invoking object, static does not
        assert!(model.executable(m).excluded);
        assert!(!model.executable(s).excluded);
    }

    #[test]
    fn test_satisfiable_model_untouched() {
        let mut b = ModelBuilder::new();
        let cls = b.add_class(class("A"));
        let int = b.types().int_value();
        b.add_executable(Executable::constructor(cls, "A", "A::A", vec![int]));
        let a_val = b.types().class_value(cls);
        b.add_executable(Executable::method(cls, "m", "A::m", int, vec![a_val], false));
        let (mut model, types) = b.build();

        let report = filter_model(&mut model, &types);
        assert!(report.excluded.is_empty());
        assert_eq!(report.rounds, 1);
    }
}
