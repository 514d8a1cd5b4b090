//! Driver assembly
//!
//! Builds a complete driver around one chosen target executable: every
//! argument is resolved to a well-typed operand (creating prerequisite
//! statements as needed), an invoking object is constructed for member
//! calls, and the call itself is repeated a small random number of
//! times. An insertion plan lets the assembly splice into an existing
//! driver at a placement index, preserving prefix and suffix.

pub mod resolver;

use crate::error::{Error, Result};
use crate::ir::{Driver, Statement};
use crate::model::{ApiModel, ExecId, ExecKind};
use crate::random::Rng;
use crate::types::context::TemplateContext;
use crate::types::TypeTable;
use resolver::{CreatorGuard, OperandResolver, WorkingSet};

/// Plan for one driver assembly.
#[derive(Debug)]
pub struct AssemblySpec {
    /// Target executable
    pub target: ExecId,
    /// Template context the driver will own
    pub ctx: TemplateContext,
    /// Existing statements to splice into (empty for fresh drivers)
    pub existing: Vec<Statement>,
    /// Split point: statements before it may be referenced, statements
    /// at or after it are re-appended behind the new call
    pub placement: usize,
    /// Prefer referencing existing statements over fresh construction
    pub force_reuse: bool,
    /// First statement id not used by `existing`
    pub base_id: u32,
}

impl AssemblySpec {
    /// Assemble a fresh driver for `target`.
    #[must_use]
    pub fn fresh(target: ExecId) -> Self {
        Self {
            target,
            ctx: TemplateContext::new(),
            existing: Vec::new(),
            placement: 0,
            force_reuse: false,
            base_id: 0,
        }
    }

    /// Fresh driver with operand reuse preference.
    #[must_use]
    pub fn fresh_with_reuse(target: ExecId, force_reuse: bool) -> Self {
        Self {
            force_reuse,
            ..Self::fresh(target)
        }
    }

    /// Splice a call to `target` into `driver` at `placement`.
    #[must_use]
    pub fn inserted_into(
        target: ExecId,
        driver: &Driver,
        placement: usize,
        force_reuse: bool,
    ) -> Self {
        Self {
            target,
            ctx: TemplateContext::new(),
            existing: driver.statements.clone(),
            placement,
            force_reuse,
            base_id: driver.id_gen().high_water(),
        }
    }
}

/// How many times the target call is repeated: uniform in `[1, 3]`.
fn call_repeat(rng: &mut Rng) -> usize {
    rng.next_range(1, 4) as usize
}

/// Assemble a driver per `spec`.
///
/// # Errors
///
/// Returns [`Error::Generation`] when the target is excluded or any
/// operand resolves to bottom; the caller discards the attempt.
pub fn assemble(
    model: &ApiModel,
    types: &mut TypeTable,
    rng: &mut Rng,
    spec: AssemblySpec,
) -> Result<Driver> {
    let exec = model.executable(spec.target);
    if exec.excluded {
        return Err(Error::Generation(format!(
            "target {} is excluded",
            exec.qualified_name
        )));
    }

    let AssemblySpec {
        target,
        mut ctx,
        mut existing,
        placement,
        force_reuse,
        base_id,
    } = spec;
    let placement = placement.min(existing.len());
    let suffix = existing.split_off(placement);
    let mut ws = WorkingSet::with_prefix(existing, base_id);
    let mut guard = CreatorGuard::new();

    let arg_types = exec.args.clone();
    let requires_invoking =
        exec.kind == ExecKind::Method && exec.owner.is_some() && exec.requires_invoking_obj;
    let owner = exec.owner;
    let qualified_name = exec.qualified_name.clone();

    let mut resolver = OperandResolver::new(model, types, rng);
    let mut operands = Vec::with_capacity(arg_types.len());
    for arg_ty in arg_types {
        let op = resolver.resolve(arg_ty, &mut ws, &mut ctx, force_reuse, &mut guard);
        if op.is_bottom() {
            return Err(Error::Generation(format!(
                "unresolvable argument for {qualified_name}"
            )));
        }
        operands.push(op);
    }

    let invoking = if requires_invoking {
        let owner_ty = types.class_value(owner.expect("member without owner"));
        let mut resolver = OperandResolver::new(model, types, rng);
        let op = resolver.resolve(owner_ty, &mut ws, &mut ctx, force_reuse, &mut guard);
        if op.is_bottom() {
            return Err(Error::Generation(format!(
                "unresolvable invoking object for {qualified_name}"
            )));
        }
        Some(op)
    } else {
        None
    };

    let repeat = call_repeat(rng);
    for _ in 0..repeat {
        let mut resolver = OperandResolver::new(model, types, rng);
        let result_ty = resolver.call_result_type(target, &mut ctx);
        let stmt = Statement::call(
            ws.ids.fresh(),
            result_ty,
            target,
            operands.clone(),
            invoking.clone(),
            ctx.clone(),
        );
        ws.statements.push(stmt);
    }

    ws.statements.extend(suffix);
    let driver = Driver::new(ws.statements, ctx, ws.ids.high_water());
    driver.assert_valid(model, types, rng);
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Operand, StatementKind};
    use crate::model::{ClassModel, ClassVariant, Executable, ModelBuilder, TemplateParam};
    use crate::types::TypeWithMods;

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
    fn test_single_int_arg_driver_shape() {
        // int f(int): the driver is a (possibly empty) prefix of
        // prerequisite statements followed by 1..=3 identical calls.
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int]));
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(1);

        for _ in 0..16 {
            let driver =
                assemble(&model, &mut types, &mut rng, AssemblySpec::fresh(f)).expect("assemble");
            let calls: Vec<_> = driver
                .statements
                .iter()
                .filter(|s| matches!(s.kind, StatementKind::Call { .. }))
                .collect();
            assert!((1..=3).contains(&calls.len()));
            for call in &calls {
                if let StatementKind::Call { args, invoking, .. } = &call.kind {
                    assert_eq!(args.len(), 1);
                    assert!(invoking.is_none());
                }
            }
            driver.assert_valid(&model, &types, &mut rng);
        }
    }

    #[test]
    fn test_constructor_then_method_shape() {
        // A { A(); int g(); }: every driver starts with the constructor
        // call and invokes g on its result.
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let int = b.types().int_value();
        let ctor = b.add_executable(Executable::constructor(a, "A", "A::A", vec![]));
        let g = b.add_executable(Executable::method(a, "g", "A::g", int, vec![], false));
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(2);

        for _ in 0..16 {
            let driver =
                assemble(&model, &mut types, &mut rng, AssemblySpec::fresh(g)).expect("assemble");
            let first = &driver.statements[0];
            match &first.kind {
                StatementKind::Call { target, .. } => assert_eq!(*target, ctor),
                other => panic!("expected constructor first, got {other:?}"),
            }
            let g_calls: Vec<_> = driver
                .statements
                .iter()
                .filter(|s| matches!(&s.kind, StatementKind::Call { target, .. } if *target == g))
                .collect();
            assert!(!g_calls.is_empty());
            for call in g_calls {
                if let StatementKind::Call {
                    invoking: Some(inv), ..
                } = &call.kind
                {
                    assert_eq!(inv.ref_id(), Some(first.id));
                } else {
                    panic!("method call without invoking object");
                }
            }
        }
    }

    #[test]
    fn test_template_function_records_context_binding() {
        // T identity<T>(T) with T pre-bound to int: the call context
        // maps T → int and the argument is int-typed.
        let mut b = ModelBuilder::new();
        let t_param = TypeWithMods::new(b.types().template_param("T"));
        let identity = b.add_executable(
            Executable::free_function("identity", "identity", t_param, vec![t_param])
                .with_template_params(vec![TemplateParam::type_param("T", 0)]),
        );
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(3);

        let mut spec = AssemblySpec::fresh(identity);
        spec.ctx.bind("T", types.int_value());
        let driver = assemble(&model, &mut types, &mut rng, spec).expect("assemble");

        // anchored constant + the call(s)
        assert!(matches!(
            driver.statements[0].kind,
            StatementKind::Primitive { .. }
        ));
        let call = driver
            .statements
            .iter()
            .find(|s| matches!(s.kind, StatementKind::Call { .. }))
            .expect("call statement");
        if let StatementKind::Call { ctx, args, .. } = &call.kind {
            assert_eq!(ctx.lookup("T"), Some(types.int_value()));
            assert_eq!(args[0].ty(), types.int_value());
        }
    }

    #[test]
    fn test_insertion_preserves_prefix_and_suffix() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int]));
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(4);

        let base =
            assemble(&model, &mut types, &mut rng, AssemblySpec::fresh(f)).expect("assemble");
        let base_ids: Vec<_> = base.statements.iter().map(|s| s.id).collect();
        let placement = 1.min(base.len());

        let spec = AssemblySpec::inserted_into(f, &base, placement, false);
        let grown = assemble(&model, &mut types, &mut rng, spec).expect("assemble");

        assert!(grown.len() > base.len());
        // prefix statements keep identity and order
        for (i, id) in base_ids[..placement].iter().enumerate() {
            assert_eq!(grown.statements[i].id, *id);
        }
        // suffix statements survive, in order, at the tail
        let tail: Vec<_> = grown.statements[grown.len() - (base.len() - placement)..]
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(tail, base_ids[placement..].to_vec());
        grown.assert_valid(&model, &types, &mut rng);
    }

    #[test]
    fn test_excluded_target_rejected() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![]));
        let (mut model, mut types) = b.build();
        model.set_excluded(f, true);
        let mut rng = Rng::from_seed(5);

        let err = assemble(&model, &mut types, &mut rng, AssemblySpec::fresh(f)).unwrap_err();
        assert!(err.to_string().contains("excluded"));
    }

    #[test]
    fn test_unsatisfiable_argument_discards_driver() {
        let mut b = ModelBuilder::new();
        let orphan = b.add_class(class("Orphan"));
        let orphan_val = b.types().class_value(orphan);
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![orphan_val]));
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(6);

        let err = assemble(&model, &mut types, &mut rng, AssemblySpec::fresh(f)).unwrap_err();
        assert!(err.to_string().contains("unresolvable"));
    }

    #[test]
    fn test_repeated_calls_share_operands() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int]));
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(7);

        // find a driver with more than one call and check the operand
        // lists coincide
        for _ in 0..64 {
            let driver =
                assemble(&model, &mut types, &mut rng, AssemblySpec::fresh(f)).expect("assemble");
            let call_args: Vec<Vec<Operand>> = driver
                .statements
                .iter()
                .filter_map(|s| match &s.kind {
                    StatementKind::Call { args, .. } => Some(args.clone()),
                    _ => None,
                })
                .collect();
            if call_args.len() > 1 {
                assert!(call_args.windows(2).all(|w| w[0] == w[1]));
                return;
            }
        }
        panic!("no repeated call observed in 64 assemblies");
    }
}
