//! Operand resolution
//!
//! Given a required type and the statement list built so far, produce a
//! well-typed operand — a literal, a reference to an earlier statement,
//! a container construction, an array literal, or a chain of creator
//! calls — appending any prerequisite statements along the way.
//!
//! Resolution never raises: an unresolvable request yields a bottom
//! operand, which short-circuits the enclosing attempt and causes the
//! driver under construction to be discarded.

use std::collections::HashMap;

use crate::ir::{Elements, IdGen, Operand, PrimitiveOp, Statement, StmtId};
use crate::model::{ApiModel, CreatorKind, ExecId, ExecKind};
use crate::mutator::sample_constant;
use crate::random::Rng;
use crate::types::context::TemplateContext;
use crate::types::{
    ContainerKind, Modifiers, Primitive, TemplateArg, TypeId, TypeTable, TypeWithMods,
};

/// Probability of drawing the null constant for a pointer request.
const NULL_POINTER_PROB: f64 = 0.1;

/// Exclusive bound on container element counts.
pub const MAX_ELEMENTS_EXCLUSIVE: usize = 4;

/// Exclusive bound on string element counts.
pub const MAX_STRING_ELEMENTS_EXCLUSIVE: usize = 11;

/// How many times one creator may be taken while descending a single
/// operand resolution before the descent is declared cyclic.
const CREATOR_CYCLE_THRESHOLD: u32 = 3;

/// Statement list under construction plus its id allocator.
#[derive(Debug, Default)]
pub struct WorkingSet {
    /// Statements accumulated so far
    pub statements: Vec<Statement>,
    /// Fresh-id source
    pub ids: IdGen,
}

impl WorkingSet {
    /// Empty working set starting ids at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Working set seeded with existing statements; ids continue from
    /// `base_id`.
    #[must_use]
    pub fn with_prefix(statements: Vec<Statement>, base_id: u32) -> Self {
        Self {
            statements,
            ids: IdGen::starting_at(base_id),
        }
    }

    /// Append a statement and hand back a reference operand to it.
    pub fn push(&mut self, stmt: Statement) -> Operand {
        let op = Operand::reference(&stmt);
        self.statements.push(stmt);
        op
    }
}

/// Bounds creator recursion within one operand resolution descent.
#[derive(Debug, Default)]
pub struct CreatorGuard {
    used: HashMap<ExecId, u32>,
}

impl CreatorGuard {
    /// Fresh guard for one resolution descent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one use of `creator`; returns false once the threshold is
    /// exhausted.
    pub fn admit(&mut self, creator: ExecId) -> bool {
        let count = self.used.entry(creator).or_insert(0);
        if *count >= CREATOR_CYCLE_THRESHOLD {
            return false;
        }
        *count += 1;
        true
    }
}

/// Statements of `stmts` (stopping at `before`, when given) whose
/// result type is assignable to `required`.
pub fn assignable_statements<'s>(
    model: &ApiModel,
    types: &TypeTable,
    rng: &mut Rng,
    required: TypeWithMods,
    stmts: &'s [Statement],
    before: Option<StmtId>,
    ctx: &mut TemplateContext,
) -> Vec<&'s Statement> {
    let mut out = Vec::new();
    for stmt in stmts {
        if Some(stmt.id) == before {
            break;
        }
        if types.assignable(required, stmt.ty, ctx, rng, model) {
            out.push(stmt);
        }
    }
    out
}

/// Resolves operands against the model, interning types as needed.
pub struct OperandResolver<'a> {
    model: &'a ApiModel,
    types: &'a mut TypeTable,
    rng: &'a mut Rng,
}

impl<'a> OperandResolver<'a> {
    /// New resolver over the session state.
    pub fn new(model: &'a ApiModel, types: &'a mut TypeTable, rng: &'a mut Rng) -> Self {
        Self { model, types, rng }
    }

    /// Result type of a call to `target` under `ctx`: interned spec for
    /// templated-class constructors, otherwise the declared return type
    /// with by-value const stripped and a `const&` upgrade for classes
    /// without a public copy constructor.
    pub fn call_result_type(&mut self, target: ExecId, ctx: &mut TemplateContext) -> TypeWithMods {
        let exec = self.model.executable(target);
        match exec.kind {
            ExecKind::Constructor => {
                let owner = exec.owner.expect("constructor without owner");
                let class = self.model.class(owner);
                if class.is_templated() {
                    let args = ctx.inst_list_for_class(class, self.types, self.rng);
                    let spec = self.types.intern_spec(self.types.class_type(owner), args);
                    TypeWithMods::new(spec)
                } else {
                    self.types.class_value(owner)
                }
            }
            ExecKind::Method => {
                let ret = exec.ret.expect("non-constructor without return type");
                let mut resolved = self.types.resolve_template(ret, ctx, self.rng);
                let is_copy_value =
                    !resolved.mods.is_pointer_or_array() && !resolved.mods.lvalue_ref;
                if is_copy_value {
                    resolved.mods = resolved.mods.without_const();
                }
                if let Some(cid) = self.types.class_of(resolved) {
                    let class = self.model.class(cid);
                    if !class.has_public_copy_ctor
                        && !resolved.mods.lvalue_ref
                        && !resolved.mods.is_pointer()
                    {
                        resolved = resolved.with_additional(Modifiers {
                            is_const: true,
                            lvalue_ref: true,
                            ..Modifiers::none()
                        });
                    }
                }
                resolved
            }
        }
    }

    /// Resolve an operand of type `required` against the working set.
    /// First match wins: `void*` → null, reuse under `force_reuse`, the
    /// null draw for pointers, then a per-kind strategy.
    pub fn resolve(
        &mut self,
        required: TypeWithMods,
        ws: &mut WorkingSet,
        ctx: &mut TemplateContext,
        force_reuse: bool,
        guard: &mut CreatorGuard,
    ) -> Operand {
        if required.is_bottom() {
            return Operand::bottom();
        }
        if self.types.is_void_ptr(required) {
            return Operand::null(required);
        }
        if self.types.is_void(required) {
            tracing::warn!("operand of plain void requested");
            return Operand::bottom();
        }

        if force_reuse {
            let candidates = assignable_statements(
                self.model,
                self.types,
                self.rng,
                required,
                &ws.statements,
                None,
                ctx,
            );
            if !candidates.is_empty() {
                let pick = self.rng.next_int(candidates.len());
                return Operand::reference(candidates[pick]);
            }
        }

        if required.mods.is_pointer() && self.rng.next_f64() < NULL_POINTER_PROB {
            return Operand::null(required);
        }

        if self.types.is_primitive(required) {
            self.resolve_primitive(required, ws)
        } else if self.types.is_enum(required) {
            self.resolve_enum(required, ws)
        } else if self.types.is_class(required) {
            self.resolve_class(required, ws, ctx, force_reuse, guard)
        } else if self.types.is_template_param(required) {
            self.resolve_template_param(required, ws, ctx, force_reuse, guard)
        } else if self.types.is_spec(required) {
            self.resolve_spec(required, ws, ctx, force_reuse, guard)
        } else {
            tracing::warn!("unresolvable required type kind");
            Operand::bottom()
        }
    }

    fn resolve_primitive(&mut self, required: TypeWithMods, ws: &mut WorkingSet) -> Operand {
        let prim = self
            .types
            .primitive_of(required)
            .expect("primitive dispatch");

        // char* / char[]: materialise a string buffer and refer to it
        if prim == Primitive::Char && required.mods.is_pointer_or_array() {
            let text = self.rng.next_string();
            let literal_ty = required.with_additional(Modifiers::constant());
            let literal = Operand::constant(literal_ty, text);
            let stmt = Statement::c_string(ws.ids.fresh(), self.types, literal);
            return ws.push(stmt);
        }

        let value_ty = TypeWithMods::with_mods(required.ty, required.mods.stripped_for_value());
        let constant = sample_constant(self.model, self.types, self.rng, value_ty);
        if constant.is_bottom() {
            return constant;
        }

        // indirection requires an addressable lvalue
        if required.mods.is_pointer_or_array() || required.mods.lvalue_ref {
            let stmt = Statement::primitive_unary(ws.ids.fresh(), PrimitiveOp::Nop, constant);
            return ws.push(stmt);
        }
        constant
    }

    fn resolve_enum(&mut self, required: TypeWithMods, ws: &mut WorkingSet) -> Operand {
        let constant = sample_constant(self.model, self.types, self.rng, required);
        if constant.is_bottom() {
            return constant;
        }
        let stmt = Statement::primitive_unary(ws.ids.fresh(), PrimitiveOp::Nop, constant);
        ws.push(stmt)
    }

    fn resolve_class(
        &mut self,
        required: TypeWithMods,
        ws: &mut WorkingSet,
        ctx: &mut TemplateContext,
        force_reuse: bool,
        guard: &mut CreatorGuard,
    ) -> Operand {
        let class_id = self.types.class_of(required).expect("class dispatch");

        let mut candidates: Vec<ExecId> = Vec::new();
        let creator_list: Vec<(ExecId, Option<TypeWithMods>, CreatorKind)> = self
            .model
            .creators()
            .map(|(id, e)| (id, e.ret, e.creator.expect("creator info").kind))
            .collect();
        for (id, ret, kind) in creator_list {
            let target_class = self
                .model
                .executable(id)
                .creator
                .expect("creator info")
                .target_class;
            let produces_required = self
                .model
                .inheritance()
                .is_subclass_of(class_id, target_class);
            if !produces_required {
                continue;
            }
            match kind {
                CreatorKind::Constructor => candidates.push(id),
                CreatorKind::StaticFactory => {
                    let ret = ret.expect("factory without return type");
                    if self
                        .types
                        .assignable(required, ret, ctx, self.rng, self.model)
                    {
                        candidates.push(id);
                    }
                }
                // output-reference creators are not supported
                CreatorKind::MethodWithOutputRef => {}
            }
        }

        if candidates.is_empty() {
            tracing::debug!(
                class = %self.model.class(class_id).qualified_name,
                "no usable creator for class operand"
            );
            return Operand::bottom();
        }

        let pick = self.rng.next_int(candidates.len());
        let creator = candidates[pick];
        if !guard.admit(creator) {
            tracing::debug!(
                creator = %self.model.executable(creator).qualified_name,
                "creator recursion bounded"
            );
            return Operand::bottom();
        }

        let arg_types = self.model.executable(creator).args.clone();
        let mut operands = Vec::with_capacity(arg_types.len());
        for arg_ty in arg_types {
            let op = self.resolve(arg_ty, ws, ctx, force_reuse, guard);
            if op.is_bottom() {
                return op;
            }
            operands.push(op);
        }

        let result_ty = self.call_result_type(creator, ctx);
        let stmt = Statement::call(
            ws.ids.fresh(),
            result_ty,
            creator,
            operands,
            None,
            ctx.clone(),
        );
        ws.push(stmt)
    }

    fn resolve_template_param(
        &mut self,
        required: TypeWithMods,
        ws: &mut WorkingSet,
        ctx: &mut TemplateContext,
        force_reuse: bool,
        guard: &mut CreatorGuard,
    ) -> Operand {
        let resolved = self.types.resolve_template(required, ctx, self.rng);
        let operand = self.resolve(resolved, ws, ctx, force_reuse, guard);
        // Anchor plain constants in a named variable so template-argument
        // deduction sees a concrete lvalue.
        if !operand.is_ref()
            && !operand.is_null()
            && !operand.is_bottom()
            && self.types.is_primitive(operand.ty())
        {
            let stmt = Statement::primitive_unary(ws.ids.fresh(), PrimitiveOp::Nop, operand);
            return ws.push(stmt);
        }
        operand
    }

    fn resolve_spec(
        &mut self,
        required: TypeWithMods,
        ws: &mut WorkingSet,
        ctx: &mut TemplateContext,
        force_reuse: bool,
        guard: &mut CreatorGuard,
    ) -> Operand {
        let (target, args) = self.types.spec_of(required).expect("spec dispatch");
        let args: Vec<TemplateArg> = args.to_vec();

        match self.types.kind(target).clone() {
            crate::types::TypeKind::Container(container) => self.resolve_container(
                required,
                container,
                &args,
                ws,
                ctx,
                force_reuse,
                guard,
            ),
            crate::types::TypeKind::Class(class_id) => {
                let params = self.model.class(class_id).template_params.clone();
                if params.len() != args.len() {
                    tracing::warn!("instantiation arity mismatch");
                    return Operand::bottom();
                }
                let mut inner_ctx = ctx.clone();
                for (param, arg) in params.iter().zip(args.iter()) {
                    match arg {
                        TemplateArg::Type(t) => inner_ctx.bind(param.name.clone(), *t),
                        // integral / nullptr instantiations of class
                        // templates are not supported
                        TemplateArg::Integral(_) | TemplateArg::Nullptr => {
                            return Operand::bottom();
                        }
                    }
                }
                let inner = self.types.class_value(class_id);
                self.resolve(inner, ws, &mut inner_ctx, force_reuse, guard)
            }
            _ => Operand::bottom(),
        }
    }

    fn resolve_elements(
        &mut self,
        element_ty: TypeWithMods,
        count: usize,
        ws: &mut WorkingSet,
        ctx: &mut TemplateContext,
        force_reuse: bool,
        guard: &mut CreatorGuard,
    ) -> Option<Vec<Operand>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let op = self.resolve(element_ty, ws, ctx, force_reuse, guard);
            if op.is_bottom() {
                return None;
            }
            out.push(op);
        }
        Some(out)
    }

    fn type_arg(args: &[TemplateArg], idx: usize) -> Option<TypeWithMods> {
        match args.get(idx) {
            Some(TemplateArg::Type(t)) => Some(*t),
            _ => None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_container(
        &mut self,
        required: TypeWithMods,
        container: crate::types::ContainerId,
        args: &[TemplateArg],
        ws: &mut WorkingSet,
        ctx: &mut TemplateContext,
        force_reuse: bool,
        guard: &mut CreatorGuard,
    ) -> Operand {
        let kind = container.desc().kind;
        let stmt_ty = required.stripped();
        let elements = match kind {
            ContainerKind::Sequence | ContainerKind::Adapter | ContainerKind::Set => {
                let Some(elem_ty) = Self::type_arg(args, 0) else {
                    return Operand::bottom();
                };
                let count = self.rng.next_int(MAX_ELEMENTS_EXCLUSIVE);
                let Some(ops) =
                    self.resolve_elements(elem_ty, count, ws, ctx, force_reuse, guard)
                else {
                    return Operand::bottom();
                };
                Elements::Linear(ops)
            }
            ContainerKind::Array => {
                let Some(elem_ty) = Self::type_arg(args, 0) else {
                    return Operand::bottom();
                };
                let Some(TemplateArg::Integral(n)) = args.get(1) else {
                    return Operand::bottom();
                };
                let count = usize::try_from(*n).unwrap_or(0);
                let Some(ops) =
                    self.resolve_elements(elem_ty, count, ws, ctx, force_reuse, guard)
                else {
                    return Operand::bottom();
                };
                Elements::Linear(ops)
            }
            ContainerKind::Map => {
                let (Some(key_ty), Some(value_ty)) =
                    (Self::type_arg(args, 0), Self::type_arg(args, 1))
                else {
                    return Operand::bottom();
                };
                let count = self.rng.next_int(MAX_ELEMENTS_EXCLUSIVE);
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.resolve(key_ty, ws, ctx, force_reuse, guard);
                    let value = self.resolve(value_ty, ws, ctx, force_reuse, guard);
                    if key.is_bottom() || value.is_bottom() {
                        return Operand::bottom();
                    }
                    pairs.push((key, value));
                }
                Elements::KeyValue(pairs)
            }
            ContainerKind::Pair => {
                let (Some(first_ty), Some(second_ty)) =
                    (Self::type_arg(args, 0), Self::type_arg(args, 1))
                else {
                    return Operand::bottom();
                };
                let first = self.resolve(first_ty, ws, ctx, force_reuse, guard);
                let second = self.resolve(second_ty, ws, ctx, force_reuse, guard);
                if first.is_bottom() || second.is_bottom() {
                    return Operand::bottom();
                }
                Elements::KeyValue(vec![(first, second)])
            }
            ContainerKind::Tuple => {
                let mut ops = Vec::with_capacity(args.len());
                for idx in 0..args.len() {
                    let Some(elem_ty) = Self::type_arg(args, idx) else {
                        return Operand::bottom();
                    };
                    let op = self.resolve(elem_ty, ws, ctx, force_reuse, guard);
                    if op.is_bottom() {
                        return Operand::bottom();
                    }
                    ops.push(op);
                }
                Elements::Linear(ops)
            }
            ContainerKind::SmartPointer => {
                let Some(elem_ty) = Self::type_arg(args, 0) else {
                    return Operand::bottom();
                };
                let pointee = elem_ty.with_additional(Modifiers::pointer());
                let op = self.resolve(pointee, ws, ctx, force_reuse, guard);
                if op.is_bottom() {
                    return Operand::bottom();
                }
                Elements::Linear(vec![op])
            }
            ContainerKind::String => {
                let Some(elem_ty) = Self::type_arg(args, 0) else {
                    return Operand::bottom();
                };
                let count = self.rng.next_int(MAX_STRING_ELEMENTS_EXCLUSIVE);
                let Some(ops) =
                    self.resolve_elements(elem_ty, count, ws, ctx, force_reuse, guard)
                else {
                    return Operand::bottom();
                };
                Elements::Linear(ops)
            }
        };
        let stmt = Statement::container(ws.ids.fresh(), stmt_ty, container, elements);
        ws.push(stmt)
    }
}

/// Intern the spec type `container<args...>` — convenience for model
/// loading and tests.
pub fn container_spec(
    types: &mut TypeTable,
    container: crate::types::ContainerId,
    args: Vec<TemplateArg>,
) -> TypeId {
    let target = types.container_type(container);
    types.intern_spec(target, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassModel, ClassVariant, Executable, ModelBuilder};
    use crate::types::container_named;

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

    struct Fixture {
        model: ApiModel,
        types: TypeTable,
        rng: Rng,
    }

    impl Fixture {
        fn resolve(&mut self, required: TypeWithMods) -> (Operand, WorkingSet) {
            let mut ws = WorkingSet::new();
            let mut ctx = TemplateContext::new();
            let mut guard = CreatorGuard::new();
            let mut resolver = OperandResolver::new(&self.model, &mut self.types, &mut self.rng);
            let op = resolver.resolve(required, &mut ws, &mut ctx, false, &mut guard);
            (op, ws)
        }
    }

    fn empty_fixture(seed: u64) -> Fixture {
        let (model, types) = ModelBuilder::new().build();
        Fixture {
            model,
            types,
            rng: Rng::from_seed(seed),
        }
    }

    #[test]
    fn test_void_ptr_resolves_to_null() {
        let mut fx = empty_fixture(1);
        let void_ptr =
            TypeWithMods::with_mods(fx.types.primitive(Primitive::Void), Modifiers::pointer());
        let (op, ws) = fx.resolve(void_ptr);
        assert!(op.is_null());
        assert!(ws.statements.is_empty());
    }

    #[test]
    fn test_plain_void_is_bottom() {
        let mut fx = empty_fixture(2);
        let (op, _) = fx.resolve(fx.types.void_value());
        assert!(op.is_bottom());
    }

    #[test]
    fn test_plain_int_yields_constant() {
        let mut fx = empty_fixture(3);
        let (op, ws) = fx.resolve(fx.types.int_value());
        assert!(!op.is_ref());
        assert!(ws.statements.is_empty());
        assert_eq!(op.ty(), fx.types.int_value());
    }

    #[test]
    fn test_int_ref_wrapped_in_assignment() {
        let mut fx = empty_fixture(4);
        let int_ref = fx.types.int_value().with_additional(Modifiers::reference());
        let (op, ws) = fx.resolve(int_ref);
        assert!(op.is_ref());
        assert_eq!(ws.statements.len(), 1);
        assert!(matches!(
            ws.statements[0].kind,
            crate::ir::StatementKind::Primitive {
                op: PrimitiveOp::Nop,
                ..
            }
        ));
    }

    #[test]
    fn test_char_pointer_materialises_string_buffer() {
        let mut fx = empty_fixture(5);
        let char_ptr =
            TypeWithMods::with_mods(fx.types.primitive(Primitive::Char), Modifiers::pointer());
        // resolve repeatedly: every non-null outcome must be a buffer ref
        for _ in 0..32 {
            let (op, ws) = fx.resolve(char_ptr);
            if op.is_null() {
                continue;
            }
            assert!(op.is_ref());
            assert_eq!(ws.statements.len(), 1);
            assert!(matches!(
                ws.statements[0].kind,
                crate::ir::StatementKind::ArrayLit {
                    string_literal: Some(_),
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_class_operand_builds_constructor_chain() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let int = b.types().int_value();
        b.add_executable(Executable::constructor(a, "A", "A::A", vec![int]));
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(6),
        };

        let required = fx.types.class_value(a);
        let (op, ws) = fx.resolve(required);
        assert!(op.is_ref());
        let last = ws.statements.last().unwrap();
        assert!(matches!(last.kind, crate::ir::StatementKind::Call { .. }));
        assert_eq!(op.ref_id(), Some(last.id));
    }

    #[test]
    fn test_class_without_creators_is_bottom() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("Orphan"));
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(7),
        };
        let required = fx.types.class_value(a);
        let (op, _) = fx.resolve(required);
        assert!(op.is_bottom());
    }

    #[test]
    fn test_subclass_constructor_satisfies_base_request() {
        let mut b = ModelBuilder::new();
        let base = b.add_class(class("Base"));
        let leaf = b.add_class(class("Leaf"));
        b.add_inheritance(leaf, base);
        b.add_executable(Executable::constructor(leaf, "Leaf", "Leaf::Leaf", vec![]));
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(8),
        };
        let (op, ws) = fx.resolve(fx.types.class_value(base));
        assert!(op.is_ref());
        assert_eq!(ws.statements.len(), 1);
    }

    #[test]
    fn test_cyclic_creators_bounded() {
        // A's only constructor needs an A: resolution must terminate
        // with bottom instead of recursing forever.
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("Selfish"));
        let a_val = b.types().class_value(a);
        b.add_executable(Executable::constructor(
            a,
            "Selfish",
            "Selfish::Selfish",
            vec![a_val],
        ));
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(9),
        };
        let (op, _) = fx.resolve(fx.types.class_value(a));
        assert!(op.is_bottom());
    }

    #[test]
    fn test_static_factory_filtered_by_return_type() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(class("A"));
        let other = b.add_class(class("Other"));
        let other_val = b.types().class_value(other);
        // factory owned by A but producing Other: must not satisfy A
        b.add_executable(Executable::static_factory(
            a,
            other,
            "make",
            "A::make",
            other_val,
            vec![],
        ));
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(10),
        };
        let (op, _) = fx.resolve(fx.types.class_value(a));
        assert!(op.is_bottom());
        let (op, _) = fx.resolve(fx.types.class_value(other));
        assert!(op.is_ref());
    }

    #[test]
    fn test_force_reuse_picks_existing_statement() {
        let mut fx = empty_fixture(11);
        let mut ws = WorkingSet::new();
        let constant = Operand::constant(fx.types.int_value(), "5");
        let existing = Statement::primitive_unary(ws.ids.fresh(), PrimitiveOp::Nop, constant);
        let existing_id = existing.id;
        ws.statements.push(existing);

        let mut ctx = TemplateContext::new();
        let mut guard = CreatorGuard::new();
        let mut resolver = OperandResolver::new(&fx.model, &mut fx.types, &mut fx.rng);
        let int = resolver.types.int_value();
        let op = resolver.resolve(int, &mut ws, &mut ctx, true, &mut guard);
        assert_eq!(op.ref_id(), Some(existing_id));
        assert_eq!(ws.statements.len(), 1);
    }

    #[test]
    fn test_template_param_resolution_anchors_constant() {
        let mut b = ModelBuilder::new();
        let t_param = b.types().template_param("T");
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(12),
        };
        let (op, ws) = fx.resolve(TypeWithMods::new(t_param));
        assert!(op.is_ref());
        assert_eq!(ws.statements.len(), 1);
        assert!(matches!(
            ws.statements[0].kind,
            crate::ir::StatementKind::Primitive {
                op: PrimitiveOp::Nop,
                ..
            }
        ));
    }

    #[test]
    fn test_sequence_container_cardinality() {
        let mut fx = empty_fixture(13);
        let vec_id = container_named("std::vector").unwrap();
        let int = fx.types.int_value();
        let spec = container_spec(&mut fx.types, vec_id, vec![TemplateArg::Type(int)]);
        for _ in 0..64 {
            let (op, ws) = fx.resolve(TypeWithMods::new(spec));
            assert!(op.is_ref());
            let last = ws.statements.last().unwrap();
            match &last.kind {
                crate::ir::StatementKind::Container { elements, .. } => {
                    assert!(elements.len() < MAX_ELEMENTS_EXCLUSIVE);
                }
                other => panic!("expected container, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_array_container_exact_count() {
        let mut fx = empty_fixture(14);
        let arr_id = container_named("std::array").unwrap();
        let int = fx.types.int_value();
        let spec = container_spec(
            &mut fx.types,
            arr_id,
            vec![TemplateArg::Type(int), TemplateArg::Integral(3)],
        );
        let (op, ws) = fx.resolve(TypeWithMods::new(spec));
        assert!(op.is_ref());
        let last = ws.statements.last().unwrap();
        match &last.kind {
            crate::ir::StatementKind::Container { elements, .. } => {
                assert_eq!(elements.len(), 3);
            }
            other => panic!("expected container, got {other:?}"),
        }
    }

    #[test]
    fn test_pair_container_single_pair() {
        let mut fx = empty_fixture(15);
        let pair_id = container_named("std::pair").unwrap();
        let int = fx.types.int_value();
        let dbl = fx.types.double_value();
        let spec = container_spec(
            &mut fx.types,
            pair_id,
            vec![TemplateArg::Type(int), TemplateArg::Type(dbl)],
        );
        let (op, ws) = fx.resolve(TypeWithMods::new(spec));
        assert!(op.is_ref());
        match &ws.statements.last().unwrap().kind {
            crate::ir::StatementKind::Container {
                elements: Elements::KeyValue(pairs),
                ..
            } => assert_eq!(pairs.len(), 1),
            other => panic!("expected key/value container, got {other:?}"),
        }
    }

    #[test]
    fn test_tuple_container_one_per_param() {
        let mut fx = empty_fixture(16);
        let tuple_id = container_named("std::tuple").unwrap();
        let int = fx.types.int_value();
        let dbl = fx.types.double_value();
        let boolean = fx.types.bool_value();
        let spec = container_spec(
            &mut fx.types,
            tuple_id,
            vec![
                TemplateArg::Type(int),
                TemplateArg::Type(dbl),
                TemplateArg::Type(boolean),
            ],
        );
        let (op, ws) = fx.resolve(TypeWithMods::new(spec));
        assert!(op.is_ref());
        match &ws.statements.last().unwrap().kind {
            crate::ir::StatementKind::Container {
                elements: Elements::Linear(ops),
                ..
            } => assert_eq!(ops.len(), 3),
            other => panic!("expected linear container, got {other:?}"),
        }
    }

    #[test]
    fn test_map_container_bounded_pairs() {
        let mut fx = empty_fixture(17);
        let map_id = container_named("std::map").unwrap();
        let int = fx.types.int_value();
        let dbl = fx.types.double_value();
        let spec = container_spec(
            &mut fx.types,
            map_id,
            vec![TemplateArg::Type(int), TemplateArg::Type(dbl)],
        );
        for _ in 0..32 {
            let (op, ws) = fx.resolve(TypeWithMods::new(spec));
            assert!(op.is_ref());
            match &ws.statements.last().unwrap().kind {
                crate::ir::StatementKind::Container {
                    elements: Elements::KeyValue(pairs),
                    ..
                } => assert!(pairs.len() < MAX_ELEMENTS_EXCLUSIVE),
                other => panic!("expected key/value container, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_string_container_bounded_chars() {
        let mut fx = empty_fixture(18);
        let str_id = container_named("std::basic_string").unwrap();
        let ch = fx.types.char_value();
        let spec = container_spec(&mut fx.types, str_id, vec![TemplateArg::Type(ch)]);
        for _ in 0..16 {
            let (op, ws) = fx.resolve(TypeWithMods::new(spec));
            assert!(op.is_ref());
            match &ws.statements.last().unwrap().kind {
                crate::ir::StatementKind::Container { elements, .. } => {
                    assert!(elements.len() < MAX_STRING_ELEMENTS_EXCLUSIVE);
                }
                other => panic!("expected container, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_templated_class_spec_binds_parameters() {
        let mut b = ModelBuilder::new();
        let boxy = b.add_class(ClassModel {
            name: "Boxy".to_string(),
            qualified_name: "Boxy".to_string(),
            variant: ClassVariant::Class,
            template_params: vec![crate::model::TemplateParam::type_param("T", 0)],
            fields: Vec::new(),
            has_public_copy_ctor: true,
        });
        let t_param = b.types().template_param("T");
        b.add_executable(Executable::constructor(
            boxy,
            "Boxy",
            "Boxy::Boxy",
            vec![TypeWithMods::new(t_param)],
        ));
        let boxy_ty = b.types().class_type(boxy);
        let int = b.types().int_value();
        let spec = b
            .types()
            .intern_spec(boxy_ty, vec![TemplateArg::Type(int)]);
        let (model, types) = b.build();
        let mut fx = Fixture {
            model,
            types,
            rng: Rng::from_seed(19),
        };

        let (op, ws) = fx.resolve(TypeWithMods::new(spec));
        assert!(op.is_ref());
        let last = ws.statements.last().unwrap();
        match &last.kind {
            crate::ir::StatementKind::Call { ctx, .. } => {
                assert_eq!(ctx.lookup("T"), Some(fx.types.int_value()));
            }
            other => panic!("expected constructor call, got {other:?}"),
        }
    }

    #[test]
    fn test_guard_admits_below_threshold() {
        let mut guard = CreatorGuard::new();
        let id = ExecId(0);
        assert!(guard.admit(id));
        assert!(guard.admit(id));
        assert!(guard.admit(id));
        assert!(!guard.admit(id));
    }
}
