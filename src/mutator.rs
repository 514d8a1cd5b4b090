//! Havoc mutation over drivers
//!
//! Three layers, each preserving the single-assignment and
//! assignability invariants:
//!
//! - [`sample_constant`] / [`OperandMutator`]: resample a constant in
//!   place, repoint a reference at another assignable statement, or
//!   cross between the two variants.
//! - [`StatementMutator`]: per-variant edits — operator swaps, argument
//!   and invoking-object mutation, retargeting a call to a
//!   signature-equivalent executable, container-element edits.
//! - [`DriverMutator`]: draws a havoc count and stacks insert / update /
//!   cleanup edits; updates cascade reference rewiring through the
//!   tail of the driver.

use std::collections::HashSet;

use crate::generator::resolver::assignable_statements;
use crate::generator::{assemble, AssemblySpec};
use crate::ir::{
    Driver, Elements, IdGen, Operand, PrimitiveOp, Statement, StatementKind, StmtId,
};
use crate::model::{ApiModel, ExecId, ExecKind, Executable};
use crate::random::Rng;
use crate::selector::{ComplexitySummary, FunctionSelector, SelectionMode};
use crate::types::{ContainerKind, Modifiers, Primitive, TypeTable, TypeWithMods};

/// Probability that a cross-variant ref→constant mutation of a pointer
/// operand produces the null constant.
const NULL_POINTER_PROB: f64 = 0.1;

/// Sample a fresh constant operand of `ty` (primitive or enum). Returns
/// bottom for types that have no literal form.
pub fn sample_constant(
    model: &ApiModel,
    types: &TypeTable,
    rng: &mut Rng,
    ty: TypeWithMods,
) -> Operand {
    if let Some(enum_id) = types.enum_of(ty) {
        let em = model.enum_model(enum_id);
        if em.variants.is_empty() {
            return Operand::bottom();
        }
        let pick = rng.next_int(em.variants.len());
        let literal = format!("{}::{}", em.qualified_name, em.variants[pick]);
        return Operand::constant(ty, literal);
    }

    let Some(prim) = types.primitive_of(ty) else {
        return Operand::bottom();
    };
    match prim {
        Primitive::Void | Primitive::Nullptr => {
            Operand::null(ty.with_additional(Modifiers::pointer()))
        }
        Primitive::Bool => {
            let literal = rng.bool_literal();
            Operand::constant(ty, literal)
        }
        Primitive::Char if ty.mods.is_pointer_or_array() => {
            let literal = rng.next_string();
            Operand::constant(ty, literal)
        }
        Primitive::Float => {
            let literal = rng.real_literal(true);
            Operand::constant(ty, literal)
        }
        Primitive::Double => {
            let literal = rng.real_literal(false);
            Operand::constant(ty, literal)
        }
        _ => {
            let width = prim.int_width().expect("integer primitive");
            let literal = rng.int_literal(width, ty.mods.is_unsigned);
            Operand::constant(ty, literal)
        }
    }
}

/// Mutates single operands within a driver.
pub struct OperandMutator<'a> {
    model: &'a ApiModel,
    types: &'a TypeTable,
    rng: &'a mut Rng,
}

impl<'a> OperandMutator<'a> {
    /// New operand mutator over the session state.
    pub fn new(model: &'a ApiModel, types: &'a TypeTable, rng: &'a mut Rng) -> Self {
        Self { model, types, rng }
    }

    /// Mutate `op`, which sits in statement `stmt_id` of `driver`.
    /// `required` is the declared type constraint at the operand's
    /// position; `is_invoking` marks the invoking object of a call,
    /// which must never degrade to null.
    pub fn mutate(
        &mut self,
        op: &Operand,
        stmt_id: StmtId,
        driver: &Driver,
        required: Option<TypeWithMods>,
        is_invoking: bool,
    ) -> Operand {
        if self.rng.next_bool() {
            if op.is_ref() {
                self.mutate_ref(op, stmt_id, driver, required)
            } else {
                self.mutate_constant(op)
            }
        } else {
            self.cross_variant(op, stmt_id, driver, required, is_invoking)
        }
    }

    /// Resample a constant respecting its type; null stays null.
    pub fn mutate_constant(&mut self, op: &Operand) -> Operand {
        if op.is_null() {
            return op.clone();
        }
        let fresh = sample_constant(self.model, self.types, self.rng, op.ty());
        if fresh.is_bottom() {
            op.clone()
        } else {
            fresh
        }
    }

    fn mutate_ref(
        &mut self,
        op: &Operand,
        stmt_id: StmtId,
        driver: &Driver,
        required: Option<TypeWithMods>,
    ) -> Operand {
        let target_ty = required.unwrap_or_else(|| op.ty());
        let mut scratch = driver.ctx.clone();
        let candidates = assignable_statements(
            self.model,
            self.types,
            self.rng,
            target_ty,
            &driver.statements,
            Some(stmt_id),
            &mut scratch,
        );
        if candidates.len() <= 1 {
            return op.clone();
        }
        let pick = self.rng.next_int(candidates.len());
        Operand::reference(candidates[pick])
    }

    fn cross_variant(
        &mut self,
        op: &Operand,
        stmt_id: StmtId,
        driver: &Driver,
        required: Option<TypeWithMods>,
        is_invoking: bool,
    ) -> Operand {
        if !op.is_ref() {
            // constant → reference
            let target_ty = op.ty();
            let mut scratch = driver.ctx.clone();
            let candidates = assignable_statements(
                self.model,
                self.types,
                self.rng,
                target_ty,
                &driver.statements,
                Some(stmt_id),
                &mut scratch,
            );
            if candidates.is_empty() {
                return self.mutate_constant(op);
            }
            let pick = self.rng.next_int(candidates.len());
            return Operand::reference(candidates[pick]);
        }

        // reference → constant, only where a literal can stand in
        let target_ty = op.ty();
        if self.types.is_primitive(target_ty) {
            match required {
                None => return self.sample_or_keep(op, target_ty),
                Some(rq) if !rq.mods.is_pointer_or_array() => {
                    return self.sample_or_keep(op, target_ty);
                }
                Some(_) => {}
            }
        } else if target_ty.mods.is_pointer()
            && !is_invoking
            && self.rng.next_f64() < NULL_POINTER_PROB
        {
            // a null invoking object would be a trivial crash
            return Operand::null(target_ty);
        }
        op.clone()
    }

    fn sample_or_keep(&mut self, op: &Operand, ty: TypeWithMods) -> Operand {
        let fresh = sample_constant(self.model, self.types, self.rng, ty);
        if fresh.is_bottom() {
            op.clone()
        } else {
            fresh
        }
    }
}

/// Whether two executables are interchangeable call targets: equal
/// argument lists, compatible member/free polarity, and neither or
/// both... constructors never morph.
#[must_use]
pub fn is_signature_equivalent(a: &Executable, b: &Executable) -> bool {
    if a.kind == ExecKind::Constructor && b.kind == ExecKind::Constructor {
        return false;
    }
    if a.args != b.args {
        return false;
    }
    match (a.owner, b.owner) {
        (None, None) => true,
        (Some(oa), Some(ob)) if oa == ob => a.requires_invoking_obj == b.requires_invoking_obj,
        _ => !a.requires_invoking_obj && !b.requires_invoking_obj,
    }
}

/// Mutates whole statements, one edit per call.
pub struct StatementMutator<'a> {
    model: &'a ApiModel,
    types: &'a TypeTable,
    rng: &'a mut Rng,
    summary: Option<&'a ComplexitySummary>,
}

impl<'a> StatementMutator<'a> {
    /// New statement mutator over the session state.
    pub fn new(
        model: &'a ApiModel,
        types: &'a TypeTable,
        rng: &'a mut Rng,
        summary: Option<&'a ComplexitySummary>,
    ) -> Self {
        Self {
            model,
            types,
            rng,
            summary,
        }
    }

    /// Produce a mutated clone of `stmt` under a fresh id, or `None`
    /// when the chosen edit is not applicable.
    pub fn mutate(
        &mut self,
        stmt: &Statement,
        driver: &Driver,
        ids: &mut IdGen,
    ) -> Option<Statement> {
        match &stmt.kind {
            StatementKind::Primitive { .. } => self.mutate_primitive(stmt, driver, ids),
            StatementKind::Call { .. } => self.mutate_call(stmt, driver, ids),
            StatementKind::Container { .. } => self.mutate_container(stmt, driver, ids),
            StatementKind::ArrayLit { .. } => self.mutate_array(stmt, driver, ids),
        }
    }

    fn mutate_primitive(
        &mut self,
        stmt: &Statement,
        driver: &Driver,
        ids: &mut IdGen,
    ) -> Option<Statement> {
        let mut cloned = stmt.clone_with_id(ids.fresh());
        let StatementKind::Primitive { op, operands } = &mut cloned.kind else {
            return None;
        };
        // enum-typed assignments only accept the operand branch
        let mutate_operand = self.types.is_enum(stmt.ty) || self.rng.next_int(2) == 1;
        if mutate_operand {
            let idx = self.rng.next_int(operands.len());
            let mut mutator = OperandMutator::new(self.model, self.types, self.rng);
            operands[idx] = mutator.mutate(&operands[idx], stmt.id, driver, None, false);
        } else {
            *op = match op.arity() {
                crate::ir::OpArity::Unary => {
                    PrimitiveOp::UNARY[self.rng.next_int(PrimitiveOp::UNARY.len())]
                }
                crate::ir::OpArity::Binary => {
                    PrimitiveOp::BINARY[self.rng.next_int(PrimitiveOp::BINARY.len())]
                }
            };
        }
        Some(cloned)
    }

    fn mutate_call(
        &mut self,
        stmt: &Statement,
        driver: &Driver,
        ids: &mut IdGen,
    ) -> Option<Statement> {
        let mut cloned = stmt.clone_with_id(ids.fresh());
        let StatementKind::Call {
            target,
            args,
            invoking,
            ..
        } = &mut cloned.kind
        else {
            return None;
        };
        let exec = self.model.executable(*target);

        match self.rng.next_int(3) {
            0 => {
                if args.is_empty() {
                    return None;
                }
                let idx = self.rng.next_int(args.len());
                let required = exec.args[idx];
                let mut mutator = OperandMutator::new(self.model, self.types, self.rng);
                args[idx] = mutator.mutate(&args[idx], stmt.id, driver, Some(required), false);
            }
            1 => {
                let Some(inv) = invoking else {
                    return None;
                };
                let required = inv.ty();
                let mut mutator = OperandMutator::new(self.model, self.types, self.rng);
                *inv = mutator.mutate(inv, stmt.id, driver, Some(required), true);
            }
            _ => {
                let morphs: Vec<ExecId> = self
                    .model
                    .executables()
                    .filter(|(_, e)| !e.excluded && is_signature_equivalent(exec, e))
                    .map(|(id, _)| id)
                    .collect();
                if morphs.is_empty() {
                    return None;
                }
                let selector = FunctionSelector::new(
                    morphs,
                    SelectionMode::ComplexityWeighted,
                    self.summary,
                );
                let picked = selector.next(self.model, self.rng)?;
                *target = picked;
            }
        }
        Some(cloned)
    }

    fn mutate_container(
        &mut self,
        stmt: &Statement,
        driver: &Driver,
        ids: &mut IdGen,
    ) -> Option<Statement> {
        let (spec_target, spec_args) = self.types.spec_of(stmt.ty)?;
        let kind = match self.types.kind(spec_target) {
            crate::types::TypeKind::Container(c) => c.desc().kind,
            _ => return None,
        };
        let spec_args = spec_args.to_vec();
        let type_arg = |idx: usize| -> Option<TypeWithMods> {
            match spec_args.get(idx) {
                Some(crate::types::TemplateArg::Type(t)) => Some(*t),
                _ => None,
            }
        };

        let mut cloned = stmt.clone_with_id(ids.fresh());
        let StatementKind::Container { elements, .. } = &mut cloned.kind else {
            return None;
        };
        match elements {
            Elements::Linear(ops) => {
                if ops.is_empty() {
                    return None;
                }
                let idx = self.rng.next_int(ops.len());
                let required = match kind {
                    ContainerKind::Tuple => type_arg(idx)?,
                    ContainerKind::SmartPointer => {
                        type_arg(0)?.with_additional(Modifiers::pointer())
                    }
                    _ => type_arg(0)?,
                };
                let mut mutator = OperandMutator::new(self.model, self.types, self.rng);
                ops[idx] = mutator.mutate(&ops[idx], stmt.id, driver, Some(required), false);
            }
            Elements::KeyValue(pairs) => {
                if pairs.is_empty() {
                    return None;
                }
                let pair_idx = self.rng.next_int(pairs.len());
                let side = self.rng.next_int(2);
                let required = type_arg(side)?;
                let mut mutator = OperandMutator::new(self.model, self.types, self.rng);
                let slot = if side == 0 {
                    &mut pairs[pair_idx].0
                } else {
                    &mut pairs[pair_idx].1
                };
                *slot = mutator.mutate(slot, stmt.id, driver, Some(required), false);
            }
        }
        Some(cloned)
    }

    fn mutate_array(
        &mut self,
        stmt: &Statement,
        driver: &Driver,
        ids: &mut IdGen,
    ) -> Option<Statement> {
        let mut cloned = stmt.clone_with_id(ids.fresh());
        let StatementKind::ArrayLit {
            string_literal,
            elements,
            ..
        } = &mut cloned.kind
        else {
            return None;
        };
        if let Some(lit) = string_literal {
            let text = self.rng.next_string();
            let lit_ty = stmt.ty.with_additional(Modifiers {
                is_const: true,
                pointers: 1,
                ..Modifiers::none()
            });
            *lit = Operand::constant(lit_ty, text);
            return Some(cloned);
        }
        let ops = elements.as_mut()?;
        if ops.is_empty() {
            return None;
        }
        let idx = self.rng.next_int(ops.len());
        let mut mutator = OperandMutator::new(self.model, self.types, self.rng);
        ops[idx] = mutator.mutate(&ops[idx], stmt.id, driver, Some(stmt.ty), false);
        Some(cloned)
    }
}

/// Applies havoc rounds to whole drivers.
pub struct DriverMutator<'a> {
    model: &'a ApiModel,
    types: &'a mut TypeTable,
    rng: &'a mut Rng,
    summary: Option<&'a ComplexitySummary>,
    insert_pool: Vec<ExecId>,
}

impl<'a> DriverMutator<'a> {
    /// New driver mutator. The insertion pool is every non-excluded,
    /// non-creator executable.
    pub fn new(
        model: &'a ApiModel,
        types: &'a mut TypeTable,
        rng: &'a mut Rng,
        summary: Option<&'a ComplexitySummary>,
    ) -> Self {
        let insert_pool = model
            .executables()
            .filter(|(_, e)| !e.excluded && !e.is_creator())
            .map(|(id, _)| id)
            .collect();
        Self {
            model,
            types,
            rng,
            summary,
            insert_pool,
        }
    }

    /// Apply `Uniform[0, max_havoc)` random edits to a copy of `driver`.
    pub fn mutate(&mut self, driver: &Driver, max_havoc: usize) -> Driver {
        let mut current = driver.clone();
        let havoc = self.rng.next_int(max_havoc.max(1));
        for _ in 0..havoc {
            match self.rng.next_int(3) {
                0 => self.insert(&mut current),
                1 => self.update(&mut current),
                _ => Self::cleanup(&mut current),
            }
        }
        current.assert_valid(self.model, self.types, self.rng);
        current
    }

    fn insert(&mut self, driver: &mut Driver) {
        let selector = FunctionSelector::new(
            self.insert_pool.clone(),
            SelectionMode::ComplexityWeighted,
            self.summary,
        );
        let Some(target) = selector.next(self.model, self.rng) else {
            return;
        };
        let placement = self.rng.next_int(driver.len() + 1);
        let force_reuse = self.rng.next_bool();
        let spec = AssemblySpec::inserted_into(target, driver, placement, force_reuse);
        match assemble(self.model, self.types, self.rng, spec) {
            Ok(next) => *driver = next,
            Err(err) => tracing::debug!(%err, "insertion attempt discarded"),
        }
    }

    fn update(&mut self, driver: &mut Driver) {
        if driver.is_empty() {
            return;
        }
        let idx = self.rng.next_int(driver.len());
        let mut ids = driver.id_gen();
        let mutated = {
            let mut mutator =
                StatementMutator::new(self.model, self.types, self.rng, self.summary);
            mutator.mutate(&driver.statements[idx], driver, &mut ids)
        };
        if let Some(next) = mutated {
            driver.absorb_ids(ids);
            driver.replace_statement(idx, next);
        }
    }

    /// Remove every primitive assignment whose result is never
    /// referenced by a later statement.
    fn cleanup(driver: &mut Driver) {
        let used: HashSet<StmtId> = driver
            .statements
            .iter()
            .flat_map(|s| s.operands())
            .filter_map(|op| op.ref_id())
            .collect();
        driver.statements.retain(|s| {
            let is_primitive = matches!(s.kind, StatementKind::Primitive { .. });
            !is_primitive || used.contains(&s.id)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IdGen;
    use crate::model::{ClassModel, ClassVariant, ModelBuilder};
    use crate::types::context::TemplateContext;

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

    fn int_driver(types: &TypeTable, values: &[&str]) -> Driver {
        let mut ids = IdGen::new();
        let statements = values
            .iter()
            .map(|v| {
                Statement::primitive_unary(
                    ids.fresh(),
                    PrimitiveOp::Nop,
                    Operand::constant(types.int_value(), *v),
                )
            })
            .collect();
        Driver::new(statements, TemplateContext::new(), ids.high_water())
    }

    #[test]
    fn test_sample_constant_bool() {
        let (model, types) = ModelBuilder::new().build();
        let mut rng = Rng::from_seed(1);
        let op = sample_constant(&model, &types, &mut rng, types.bool_value());
        let lit = op.literal().unwrap();
        assert!(lit == "true" || lit == "false");
    }

    #[test]
    fn test_sample_constant_enum() {
        let mut b = ModelBuilder::new();
        let e = b.add_enum(crate::model::EnumModel {
            name: "Color".to_string(),
            qualified_name: "pal::Color".to_string(),
            variants: vec!["Red".to_string(), "Green".to_string()],
        });
        let (model, types) = b.build();
        let mut rng = Rng::from_seed(2);
        let op = sample_constant(&model, &types, &mut rng, types.enum_value(e));
        let lit = op.literal().unwrap();
        assert!(lit == "pal::Color::Red" || lit == "pal::Color::Green");
    }

    #[test]
    fn test_sample_constant_class_is_bottom() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let (model, types) = b.build();
        let mut rng = Rng::from_seed(3);
        let op = sample_constant(&model, &types, &mut rng, types.class_value(a));
        assert!(op.is_bottom());
    }

    #[test]
    fn test_mutate_constant_null_stays_null() {
        let (model, types) = ModelBuilder::new().build();
        let mut rng = Rng::from_seed(4);
        let int_ptr = types.int_value().with_additional(Modifiers::pointer());
        let null = Operand::null(int_ptr);
        let mut mutator = OperandMutator::new(&model, &types, &mut rng);
        for _ in 0..8 {
            assert!(mutator.mutate_constant(&null).is_null());
        }
    }

    #[test]
    fn test_mutate_ref_stays_before_statement() {
        let (model, types) = ModelBuilder::new().build();
        let mut rng = Rng::from_seed(5);
        let driver = int_driver(&types, &["1", "2", "3", "4"]);
        let s3_id = driver.statements[3].id;
        let original = Operand::reference(&driver.statements[0]);

        let mut mutator = OperandMutator::new(&model, &types, &mut rng);
        for _ in 0..32 {
            let mutated = mutator.mutate(&original, s3_id, &driver, None, false);
            if let Some(target) = mutated.ref_id() {
                let pos = driver.position_of(target).unwrap();
                assert!(pos < 3, "mutated ref points at or after its statement");
            }
        }
    }

    #[test]
    fn test_cross_variant_constant_to_ref_finds_candidate() {
        let (model, types) = ModelBuilder::new().build();
        let driver = int_driver(&types, &["1", "2"]);
        let last_id = driver.statements[1].id;
        let constant = Operand::constant(types.int_value(), "9");

        // with candidates available, repeated mutation eventually flips
        // the constant into a reference to an earlier statement
        let mut rng = Rng::from_seed(6);
        let mut mutator = OperandMutator::new(&model, &types, &mut rng);
        let mut saw_ref = false;
        for _ in 0..64 {
            let mutated = mutator.mutate(&constant, last_id, &driver, None, false);
            if let Some(id) = mutated.ref_id() {
                assert_eq!(id, driver.statements[0].id);
                saw_ref = true;
            }
        }
        assert!(saw_ref, "cross-variant never produced a reference");
    }

    #[test]
    fn test_invoking_object_never_becomes_null() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let a_ptr = b.types().class_value(a).with_additional(Modifiers::pointer());
        b.add_executable(Executable::constructor(a, "A", "A::A", vec![]));
        let (model, types) = b.build();

        let mut ids = IdGen::new();
        let ctor_call = Statement::call(
            ids.fresh(),
            types.class_value(a),
            ExecId(0),
            vec![],
            None,
            TemplateContext::new(),
        );
        let inv = Operand::Ref {
            id: ctor_call.id,
            ty: a_ptr,
        };
        let driver = Driver::new(vec![ctor_call], TemplateContext::new(), ids.high_water());

        let mut rng = Rng::from_seed(7);
        let mut mutator = OperandMutator::new(&model, &types, &mut rng);
        for _ in 0..128 {
            let mutated = mutator.mutate(&inv, StmtId(99), &driver, Some(a_ptr), true);
            assert!(!mutated.is_null(), "invoking object degraded to null");
        }
    }

    #[test]
    fn test_signature_equivalence_rules() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let other = b.add_class(class("B"));
        let int = b.types().int_value();
        let dbl = b.types().double_value();

        let f = Executable::free_function("f", "f", int, vec![int]);
        let g = Executable::free_function("g", "g", dbl, vec![int]);
        let h = Executable::free_function("h", "h", int, vec![dbl]);
        assert!(is_signature_equivalent(&f, &g));
        assert!(!is_signature_equivalent(&f, &h));

        let m1 = Executable::method(a, "m1", "A::m1", int, vec![int], false);
        let m2 = Executable::method(a, "m2", "A::m2", int, vec![int], false);
        let st = Executable::method(a, "st", "A::st", int, vec![int], true);
        assert!(is_signature_equivalent(&m1, &m2));
        assert!(!is_signature_equivalent(&m1, &st));

        let other_m = Executable::method(other, "m", "B::m", int, vec![int], false);
        let other_st = Executable::method(other, "s", "B::s", int, vec![int], true);
        assert!(!is_signature_equivalent(&m1, &other_m));
        assert!(is_signature_equivalent(&st, &other_st));

        let c1 = Executable::constructor(a, "A", "A::A", vec![int]);
        let c2 = Executable::constructor(other, "B", "B::B", vec![int]);
        assert!(!is_signature_equivalent(&c1, &c2));
    }

    #[test]
    fn test_statement_mutator_enum_only_mutates_operand() {
        let mut b = ModelBuilder::new();
        let e = b.add_enum(crate::model::EnumModel {
            name: "Mode".to_string(),
            qualified_name: "Mode".to_string(),
            variants: vec!["On".to_string(), "Off".to_string()],
        });
        let (model, types) = b.build();
        let mut rng = Rng::from_seed(8);

        let mut ids = IdGen::new();
        let stmt = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            Operand::constant(types.enum_value(e), "Mode::On"),
        );
        let driver = Driver::new(vec![stmt.clone()], TemplateContext::new(), ids.high_water());

        let mut mutator = StatementMutator::new(&model, &types, &mut rng, None);
        let mut gen = driver.id_gen();
        for _ in 0..32 {
            if let Some(mutated) = mutator.mutate(&stmt, &driver, &mut gen) {
                if let StatementKind::Primitive { op, .. } = mutated.kind {
                    assert_eq!(op, PrimitiveOp::Nop, "enum statement operator mutated");
                }
            }
        }
    }

    #[test]
    fn test_statement_mutator_retarget_respects_signature() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int]));
        let _g = b.add_executable(Executable::free_function("g", "g", int, vec![int]));
        let _h = b.add_executable(Executable::free_function("h", "h", int, vec![]));
        let (model, types) = b.build();
        let mut rng = Rng::from_seed(9);

        let mut ids = IdGen::new();
        let arg = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            Operand::constant(types.int_value(), "1"),
        );
        let call = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&arg)],
            None,
            TemplateContext::new(),
        );
        let driver = Driver::new(
            vec![arg, call.clone()],
            TemplateContext::new(),
            ids.high_water(),
        );

        let mut mutator = StatementMutator::new(&model, &types, &mut rng, None);
        let mut gen = driver.id_gen();
        for _ in 0..64 {
            if let Some(mutated) = mutator.mutate(&call, &driver, &mut gen) {
                if let StatementKind::Call { target, .. } = &mutated.kind {
                    let exec = model.executable(*target);
                    // h takes no int argument: it must never be chosen
                    assert_eq!(exec.args.len(), 1, "retargeted across signatures");
                }
            }
        }
    }

    #[test]
    fn test_cleanup_removes_unreferenced_primitives() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int]));
        let (model, types) = b.build();
        let mut rng = Rng::from_seed(10);

        let mut ids = IdGen::new();
        let used = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            Operand::constant(types.int_value(), "1"),
        );
        let unused = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            Operand::constant(types.int_value(), "2"),
        );
        let call = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&used)],
            None,
            TemplateContext::new(),
        );
        let used_id = used.id;
        let mut driver = Driver::new(
            vec![used, unused, call],
            TemplateContext::new(),
            ids.high_water(),
        );

        DriverMutator::cleanup(&mut driver);
        assert_eq!(driver.len(), 2);
        assert!(driver.statement(used_id).is_some());
        driver.assert_valid(&model, &types, &mut rng);
    }

    #[test]
    fn test_driver_mutator_preserves_invariants() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let int = b.types().int_value();
        b.add_executable(Executable::constructor(a, "A", "A::A", vec![]));
        let g = b.add_executable(Executable::method(a, "g", "A::g", int, vec![int], false));
        let (model, mut types) = b.build();
        let mut rng = Rng::from_seed(11);

        let base = assemble(
            &model,
            &mut types,
            &mut rng,
            AssemblySpec::fresh(g),
        )
        .expect("assemble");

        let mut mutator = DriverMutator::new(&model, &mut types, &mut rng, None);
        let mut current = base;
        for _ in 0..24 {
            current = mutator.mutate(&current, 20);
        }
        // assert_valid inside mutate() is the oracle; reaching here
        // without a panic is the assertion.
        assert!(current.len() <= 2048);
    }

    #[test]
    fn test_havoc_zero_possible() {
        let (model, mut types) = ModelBuilder::new().build();
        let mut rng = Rng::from_seed(12);
        let driver = int_driver(&types, &["1"]);
        let mut mutator = DriverMutator::new(&model, &mut types, &mut rng, None);
        // max_havoc == 1 always draws zero edits
        let out = mutator.mutate(&driver, 1);
        assert_eq!(out.len(), driver.len());
    }
}
