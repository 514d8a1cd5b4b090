//! Statement IR for generated drivers
//!
//! A driver is an ordered list of statements plus an owning template
//! context. Statements carry per-driver-unique [`StmtId`]s; reference
//! operands name their referent by id, so identity survives cloning and
//! the single-assignment invariant is checkable without pointer games.
//!
//! An Update mutation replaces a statement with a structurally new one
//! under a fresh id and then *rewires*: every later statement whose
//! operands referenced a replaced id is itself cloned under a fresh id
//! with those operands retargeted, and becomes the replacement for any
//! still-later references. Cascading rewiring keeps the SSA invariant
//! intact through arbitrary edits.

use std::collections::HashMap;

use crate::model::{ApiModel, ExecId, ExecKind};
use crate::random::Rng;
use crate::types::context::TemplateContext;
use crate::types::{ContainerId, Primitive, TypeTable, TypeWithMods};

/// Identity of a statement within one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

/// Allocator for fresh statement ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGen {
    next: u32,
}

impl IdGen {
    /// Start from zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from a driver's high-water mark.
    #[must_use]
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    /// Allocate the next id.
    pub fn fresh(&mut self) -> StmtId {
        let id = StmtId(self.next);
        self.next += 1;
        id
    }

    /// First id that has not been handed out.
    #[must_use]
    pub fn high_water(&self) -> u32 {
        self.next
    }
}

/// Primitive operator of an assignment statement. Division is absent
/// to avoid trivially generated divide-by-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveOp {
    /// Pass-through
    Nop,
    /// Unary minus
    Neg,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `%`
    Mod,
}

/// Operator arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArity {
    /// One operand
    Unary,
    /// Two operands
    Binary,
}

impl PrimitiveOp {
    /// Unary operator choices for mutation.
    pub const UNARY: [PrimitiveOp; 2] = [PrimitiveOp::Nop, PrimitiveOp::Neg];
    /// Binary operator choices for mutation.
    pub const BINARY: [PrimitiveOp; 4] = [
        PrimitiveOp::Add,
        PrimitiveOp::Sub,
        PrimitiveOp::Mul,
        PrimitiveOp::Mod,
    ];

    /// Arity of this operator.
    #[must_use]
    pub fn arity(self) -> OpArity {
        match self {
            PrimitiveOp::Nop | PrimitiveOp::Neg => OpArity::Unary,
            _ => OpArity::Binary,
        }
    }

    /// Infix spelling for binary operators.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            PrimitiveOp::Add => " + ",
            PrimitiveOp::Sub => " - ",
            PrimitiveOp::Mul => " * ",
            PrimitiveOp::Mod => " % ",
            PrimitiveOp::Nop | PrimitiveOp::Neg => "",
        }
    }
}

/// A value supplied to a statement: a literal constant or a reference
/// to an earlier statement's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Literal constant text of a given type
    Constant {
        /// Operand type
        ty: TypeWithMods,
        /// Literal source text
        literal: String,
    },
    /// Reference to an earlier statement
    Ref {
        /// Referent statement id
        id: StmtId,
        /// Snapshot of the referent's type
        ty: TypeWithMods,
    },
}

impl Operand {
    /// Constant operand.
    #[must_use]
    pub fn constant(ty: TypeWithMods, literal: impl Into<String>) -> Self {
        Operand::Constant {
            ty,
            literal: literal.into(),
        }
    }

    /// Reference to a statement's result.
    #[must_use]
    pub fn reference(stmt: &Statement) -> Self {
        Operand::Ref {
            id: stmt.id,
            ty: stmt.ty,
        }
    }

    /// The canonical null operand for a pointer type.
    #[must_use]
    pub fn null(ty: TypeWithMods) -> Self {
        Operand::constant(ty, "nullptr")
    }

    /// Unresolvable operand; short-circuits the enclosing resolution.
    #[must_use]
    pub fn bottom() -> Self {
        Operand::constant(TypeWithMods::bottom(), "")
    }

    /// Operand type.
    #[must_use]
    pub fn ty(&self) -> TypeWithMods {
        match self {
            Operand::Constant { ty, .. } | Operand::Ref { ty, .. } => *ty,
        }
    }

    /// Referent id for reference operands.
    #[must_use]
    pub fn ref_id(&self) -> Option<StmtId> {
        match self {
            Operand::Ref { id, .. } => Some(*id),
            Operand::Constant { .. } => None,
        }
    }

    /// Whether this is a reference operand.
    #[must_use]
    pub fn is_ref(&self) -> bool {
        matches!(self, Operand::Ref { .. })
    }

    /// Constant literal text, when constant.
    #[must_use]
    pub fn literal(&self) -> Option<&str> {
        match self {
            Operand::Constant { literal, .. } => Some(literal),
            Operand::Ref { .. } => None,
        }
    }

    /// The canonical null operand: a pointer-typed constant `nullptr`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Operand::Constant { ty, literal } => ty.mods.is_pointer() && literal == "nullptr",
            Operand::Ref { .. } => false,
        }
    }

    /// Whether the operand's type is bottom.
    #[must_use]
    pub fn is_bottom(&self) -> bool {
        self.ty().is_bottom()
    }

    fn rewire(&mut self, repl: &HashMap<StmtId, (StmtId, TypeWithMods)>) -> bool {
        if let Operand::Ref { id, ty } = self {
            if let Some((new_id, new_ty)) = repl.get(id) {
                *id = *new_id;
                *ty = *new_ty;
                return true;
            }
        }
        false
    }
}

/// Element payload of a container construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elements {
    /// Linear list of element operands
    Linear(Vec<Operand>),
    /// Key/value operand pairs
    KeyValue(Vec<(Operand, Operand)>),
}

impl Elements {
    /// Number of elements (pairs count once).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Elements::Linear(v) => v.len(),
            Elements::KeyValue(v) => v.len(),
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Statement payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Unary or binary primitive-op assignment
    Primitive {
        /// Operator
        op: PrimitiveOp,
        /// One or two operands
        operands: Vec<Operand>,
    },
    /// Call of a target executable
    Call {
        /// Callee
        target: ExecId,
        /// Argument operands, in declaration order
        args: Vec<Operand>,
        /// Invoking object, when the callee needs one
        invoking: Option<Operand>,
        /// Snapshot of the template context at the call site
        ctx: TemplateContext,
    },
    /// Construction of a standard container
    Container {
        /// Catalog handle
        container: ContainerId,
        /// Element payload
        elements: Elements,
    },
    /// Array literal (string literal for char arrays, operand list
    /// otherwise)
    ArrayLit {
        /// Declared capacity; defaults from the payload when absent
        capacity: Option<usize>,
        /// String-literal payload for char arrays
        string_literal: Option<Operand>,
        /// Element payload for non-char arrays
        elements: Option<Vec<Operand>>,
    },
}

/// One driver statement: result type, identity, payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Per-driver-unique identity
    pub id: StmtId,
    /// Result type
    pub ty: TypeWithMods,
    /// Payload
    pub kind: StatementKind,
}

impl Statement {
    /// Unary primitive assignment over one operand.
    #[must_use]
    pub fn primitive_unary(id: StmtId, op: PrimitiveOp, operand: Operand) -> Self {
        debug_assert_eq!(op.arity(), OpArity::Unary);
        Self {
            id,
            ty: operand.ty(),
            kind: StatementKind::Primitive {
                op,
                operands: vec![operand],
            },
        }
    }

    /// Binary primitive assignment; the result type follows the first
    /// operand.
    #[must_use]
    pub fn primitive_binary(id: StmtId, op: PrimitiveOp, lhs: Operand, rhs: Operand) -> Self {
        debug_assert_eq!(op.arity(), OpArity::Binary);
        Self {
            id,
            ty: lhs.ty(),
            kind: StatementKind::Primitive {
                op,
                operands: vec![lhs, rhs],
            },
        }
    }

    /// Call statement with a precomputed result type.
    #[must_use]
    pub fn call(
        id: StmtId,
        ty: TypeWithMods,
        target: ExecId,
        args: Vec<Operand>,
        invoking: Option<Operand>,
        ctx: TemplateContext,
    ) -> Self {
        Self {
            id,
            ty,
            kind: StatementKind::Call {
                target,
                args,
                invoking,
                ctx,
            },
        }
    }

    /// Container construction; `ty` is the stripped spec type.
    #[must_use]
    pub fn container(
        id: StmtId,
        ty: TypeWithMods,
        container: ContainerId,
        elements: Elements,
    ) -> Self {
        Self {
            id,
            ty,
            kind: StatementKind::Container {
                container,
                elements,
            },
        }
    }

    /// C-string array initialisation from a string-literal operand.
    #[must_use]
    pub fn c_string(id: StmtId, types: &TypeTable, literal: Operand) -> Self {
        let mut mods = crate::types::Modifiers {
            arrays: 1,
            ..crate::types::Modifiers::none()
        };
        mods.is_unsigned = literal.ty().mods.is_unsigned;
        Self {
            id,
            ty: TypeWithMods::with_mods(types.primitive(Primitive::Char), mods),
            kind: StatementKind::ArrayLit {
                capacity: None,
                string_literal: Some(literal),
                elements: None,
            },
        }
    }

    /// Array literal over element operands; result adds one array
    /// dimension to `element_ty`.
    #[must_use]
    pub fn array_literal(id: StmtId, element_ty: TypeWithMods, elements: Vec<Operand>) -> Self {
        let ty = element_ty.with_additional(crate::types::Modifiers {
            arrays: 1,
            ..crate::types::Modifiers::none()
        });
        Self {
            id,
            ty,
            kind: StatementKind::ArrayLit {
                capacity: None,
                string_literal: None,
                elements: Some(elements),
            },
        }
    }

    /// All operands of this statement (invoking object last; the string
    /// literal of a char array counts as an operand).
    #[must_use]
    pub fn operands(&self) -> Vec<Operand> {
        match &self.kind {
            StatementKind::Primitive { operands, .. } => operands.clone(),
            StatementKind::Call { args, invoking, .. } => {
                let mut out = args.clone();
                if let Some(inv) = invoking {
                    out.push(inv.clone());
                }
                out
            }
            StatementKind::Container { elements, .. } => match elements {
                Elements::Linear(ops) => ops.clone(),
                Elements::KeyValue(pairs) => pairs
                    .iter()
                    .flat_map(|(k, v)| [k.clone(), v.clone()])
                    .collect(),
            },
            StatementKind::ArrayLit {
                string_literal,
                elements,
                ..
            } => {
                let mut out = Vec::new();
                if let Some(lit) = string_literal {
                    out.push(lit.clone());
                }
                if let Some(ops) = elements {
                    out.extend(ops.iter().cloned());
                }
                out
            }
        }
    }

    /// Structural clone under a fresh identity.
    #[must_use]
    pub fn clone_with_id(&self, id: StmtId) -> Self {
        Self {
            id,
            ty: self.ty,
            kind: self.kind.clone(),
        }
    }

    /// Clone with references retargeted through `repl`, under `new_id`.
    /// Returns `None` when no operand referenced a replaced statement.
    #[must_use]
    pub fn replace_refs(
        &self,
        repl: &HashMap<StmtId, (StmtId, TypeWithMods)>,
        new_id: StmtId,
    ) -> Option<Self> {
        let mut cloned = self.clone_with_id(new_id);
        let mut replaced = 0usize;
        match &mut cloned.kind {
            StatementKind::Primitive { operands, .. } => {
                for op in operands {
                    replaced += usize::from(op.rewire(repl));
                }
            }
            StatementKind::Call { args, invoking, .. } => {
                for op in args {
                    replaced += usize::from(op.rewire(repl));
                }
                if let Some(inv) = invoking {
                    replaced += usize::from(inv.rewire(repl));
                }
            }
            StatementKind::Container { elements, .. } => match elements {
                Elements::Linear(ops) => {
                    for op in ops {
                        replaced += usize::from(op.rewire(repl));
                    }
                }
                Elements::KeyValue(pairs) => {
                    for (k, v) in pairs {
                        replaced += usize::from(k.rewire(repl));
                        replaced += usize::from(v.rewire(repl));
                    }
                }
            },
            StatementKind::ArrayLit { elements, .. } => {
                if let Some(ops) = elements {
                    for op in ops {
                        replaced += usize::from(op.rewire(repl));
                    }
                }
            }
        }
        (replaced > 0).then_some(cloned)
    }
}

/// A generated driver: ordered statements plus the owning template
/// context.
#[derive(Debug, Clone)]
pub struct Driver {
    /// Statements in execution order
    pub statements: Vec<Statement>,
    /// Driver-level template context
    pub ctx: TemplateContext,
    next_id: u32,
}

impl Driver {
    /// Assemble a driver; `next_id` must exceed every statement id.
    #[must_use]
    pub fn new(statements: Vec<Statement>, ctx: TemplateContext, next_id: u32) -> Self {
        debug_assert!(statements.iter().all(|s| s.id.0 < next_id));
        Self {
            statements,
            ctx,
            next_id,
        }
    }

    /// Empty driver.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), TemplateContext::new(), 0)
    }

    /// Statement count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the driver has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Id allocator continuing after every existing statement.
    #[must_use]
    pub fn id_gen(&self) -> IdGen {
        IdGen::starting_at(self.next_id)
    }

    /// Record ids handed out by a generator continuation.
    pub fn absorb_ids(&mut self, gen: IdGen) {
        self.next_id = self.next_id.max(gen.high_water());
    }

    /// Index of a statement by id.
    #[must_use]
    pub fn position_of(&self, id: StmtId) -> Option<usize> {
        self.statements.iter().position(|s| s.id == id)
    }

    /// Statement by id.
    #[must_use]
    pub fn statement(&self, id: StmtId) -> Option<&Statement> {
        self.statements.iter().find(|s| s.id == id)
    }

    /// Replace the statement at `index` and cascade reference rewiring
    /// through every later statement.
    pub fn replace_statement(&mut self, index: usize, replacement: Statement) {
        let old_id = self.statements[index].id;
        self.next_id = self.next_id.max(replacement.id.0 + 1);
        let mut repl: HashMap<StmtId, (StmtId, TypeWithMods)> = HashMap::new();
        repl.insert(old_id, (replacement.id, replacement.ty));
        self.statements[index] = replacement;

        for i in index + 1..self.statements.len() {
            let candidate = StmtId(self.next_id);
            if let Some(rewired) = self.statements[i].replace_refs(&repl, candidate) {
                self.next_id += 1;
                repl.insert(self.statements[i].id, (rewired.id, rewired.ty));
                self.statements[i] = rewired;
            }
        }
    }

    /// Check the driver invariants: unique ids, strictly-backward
    /// references, and per-call argument assignability. Returns a
    /// diagnostic naming the offending statement index on failure.
    pub fn verify(
        &self,
        model: &ApiModel,
        types: &TypeTable,
        rng: &mut Rng,
    ) -> Result<(), String> {
        let mut seen: HashMap<StmtId, usize> = HashMap::new();
        for (idx, stmt) in self.statements.iter().enumerate() {
            if seen.contains_key(&stmt.id) {
                return Err(format!("statement {idx}: duplicate id {:?}", stmt.id));
            }
            for (op_idx, op) in stmt.operands().iter().enumerate() {
                if let Some(ref_id) = op.ref_id() {
                    if !seen.contains_key(&ref_id) {
                        return Err(format!(
                            "statement {idx}: operand {op_idx} references {ref_id:?} which does not appear earlier"
                        ));
                    }
                }
            }
            if let StatementKind::Call {
                target, args, ctx, ..
            } = &stmt.kind
            {
                let exec = model.executable(*target);
                if exec.args.len() != args.len() {
                    return Err(format!(
                        "statement {idx}: call arity {} != declared {}",
                        args.len(),
                        exec.args.len()
                    ));
                }
                let mut scratch = ctx.clone();
                for (arg_idx, (required, supplied)) in
                    exec.args.iter().zip(args.iter()).enumerate()
                {
                    if !types.assignable(*required, supplied.ty(), &mut scratch, rng, model) {
                        return Err(format!(
                            "statement {idx}: argument {arg_idx} of {} not assignable",
                            exec.qualified_name
                        ));
                    }
                    // a constant where a pointer/array is required must be
                    // a char literal buffer or the null operand
                    if required.mods.is_pointer_or_array() && !supplied.is_ref() {
                        let is_char = types.primitive_of(supplied.ty())
                            == Some(Primitive::Char);
                        if !is_char && !supplied.is_null() {
                            return Err(format!(
                                "statement {idx}: constant operand {arg_idx} bound to pointer argument"
                            ));
                        }
                    }
                }
                if exec.requires_invoking_obj && exec.kind == ExecKind::Method {
                    if let StatementKind::Call { invoking: None, .. } = &stmt.kind {
                        return Err(format!(
                            "statement {idx}: member call without invoking object"
                        ));
                    }
                }
            }
            seen.insert(stmt.id, idx);
        }
        Ok(())
    }

    /// Panic with a diagnostic if invariants fail; the internal test
    /// oracle for generator/mutator bugs.
    pub fn assert_valid(&self, model: &ApiModel, types: &TypeTable, rng: &mut Rng) {
        if let Err(msg) = self.verify(model, types, rng) {
            panic!("driver invariant violated: {msg}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassModel, ClassVariant, Executable, ModelBuilder};
    use crate::types::Modifiers;

    fn model_with_f_int() -> (ApiModel, TypeTable, ExecId) {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        let f = b.add_executable(Executable::free_function("f", "f", int, vec![int]));
        let (model, types) = b.build();
        (model, types, f)
    }

    fn int_const(types: &TypeTable, text: &str) -> Operand {
        Operand::constant(types.int_value(), text)
    }

    #[test]
    fn test_operand_null_detection() {
        let types = TypeTable::new();
        let int_ptr = TypeWithMods::with_mods(
            types.primitive(Primitive::Int),
            Modifiers::pointer(),
        );
        assert!(Operand::null(int_ptr).is_null());
        assert!(!Operand::constant(types.int_value(), "nullptr").is_null());
        assert!(!Operand::constant(int_ptr, "0").is_null());
    }

    #[test]
    fn test_primitive_statement_type_follows_operand() {
        let types = TypeTable::new();
        let mut ids = IdGen::new();
        let stmt = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            int_const(&types, "42"),
        );
        assert_eq!(stmt.ty, types.int_value());
        assert_eq!(stmt.operands().len(), 1);
    }

    #[test]
    fn test_clone_with_id_preserves_payload() {
        let types = TypeTable::new();
        let mut ids = IdGen::new();
        let stmt = Statement::primitive_binary(
            ids.fresh(),
            PrimitiveOp::Add,
            int_const(&types, "1"),
            int_const(&types, "2"),
        );
        let cloned = stmt.clone_with_id(ids.fresh());
        assert_ne!(cloned.id, stmt.id);
        assert_eq!(cloned.ty, stmt.ty);
        assert_eq!(cloned.kind, stmt.kind);
    }

    #[test]
    fn test_call_operands_include_invoking_last() {
        let (_, types, f) = model_with_f_int();
        let mut ids = IdGen::new();
        let base = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            int_const(&types, "3"),
        );
        let inv = Operand::reference(&base);
        let call = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![int_const(&types, "1")],
            Some(inv.clone()),
            TemplateContext::new(),
        );
        let ops = call.operands();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1], inv);
    }

    #[test]
    fn test_verify_accepts_wellformed_driver() {
        let (model, types, f) = model_with_f_int();
        let mut rng = Rng::from_seed(1);
        let mut ids = IdGen::new();
        let s0 = Statement::primitive_unary(ids.fresh(), PrimitiveOp::Nop, int_const(&types, "7"));
        let s1 = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&s0)],
            None,
            TemplateContext::new(),
        );
        let driver = Driver::new(vec![s0, s1], TemplateContext::new(), ids.high_water());
        assert!(driver.verify(&model, &types, &mut rng).is_ok());
    }

    #[test]
    fn test_verify_rejects_forward_reference() {
        let (model, types, f) = model_with_f_int();
        let mut rng = Rng::from_seed(2);
        let mut ids = IdGen::new();
        let s0 = Statement::primitive_unary(ids.fresh(), PrimitiveOp::Nop, int_const(&types, "7"));
        let s1 = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&s0)],
            None,
            TemplateContext::new(),
        );
        // s1 placed before its referent: SSA violation
        let driver = Driver::new(vec![s1, s0], TemplateContext::new(), ids.high_water());
        let err = driver.verify(&model, &types, &mut rng).unwrap_err();
        assert!(err.contains("does not appear earlier"), "got: {err}");
    }

    #[test]
    fn test_verify_rejects_bad_argument_type() {
        let (model, types, f) = model_with_f_int();
        let mut rng = Rng::from_seed(3);
        let mut ids = IdGen::new();
        let s0 = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::constant(types.double_value(), "0.5")],
            None,
            TemplateContext::new(),
        );
        let driver = Driver::new(vec![s0], TemplateContext::new(), ids.high_water());
        let err = driver.verify(&model, &types, &mut rng).unwrap_err();
        assert!(err.contains("not assignable"), "got: {err}");
    }

    #[test]
    fn test_verify_rejects_member_call_without_invoking_obj() {
        let mut b = ModelBuilder::new();
        let a = b.add_class(ClassModel {
            name: "A".to_string(),
            qualified_name: "A".to_string(),
            variant: ClassVariant::Class,
            template_params: Vec::new(),
            fields: Vec::new(),
            has_public_copy_ctor: true,
        });
        let int = b.types().int_value();
        let g = b.add_executable(Executable::method(a, "g", "A::g", int, Vec::new(), false));
        let (model, types) = b.build();
        let mut rng = Rng::from_seed(4);

        let mut ids = IdGen::new();
        let call = Statement::call(
            ids.fresh(),
            types.int_value(),
            g,
            Vec::new(),
            None,
            TemplateContext::new(),
        );
        let driver = Driver::new(vec![call], TemplateContext::new(), ids.high_water());
        let err = driver.verify(&model, &types, &mut rng).unwrap_err();
        assert!(err.contains("invoking object"), "got: {err}");
    }

    #[test]
    fn test_replace_statement_cascades_rewiring() {
        // s0 (prim int), s1 = f(ref s0), s2 = f(ref s1); replacing s0
        // must rewire s1 to the replacement and s2 to the rewired s1.
        let (model, types, f) = model_with_f_int();
        let mut rng = Rng::from_seed(5);
        let mut ids = IdGen::new();
        let s0 = Statement::primitive_unary(ids.fresh(), PrimitiveOp::Nop, int_const(&types, "1"));
        let s1 = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&s0)],
            None,
            TemplateContext::new(),
        );
        let s2 = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&s1)],
            None,
            TemplateContext::new(),
        );
        let s1_id = s1.id;
        let mut driver = Driver::new(vec![s0, s1, s2], TemplateContext::new(), ids.high_water());

        let replacement = Statement::primitive_unary(
            driver.id_gen().fresh(),
            PrimitiveOp::Neg,
            int_const(&types, "9"),
        );
        let replacement_id = replacement.id;
        driver.replace_statement(0, replacement);

        // s1 now references the replacement, under a fresh id
        let new_s1 = &driver.statements[1];
        assert_eq!(new_s1.operands()[0].ref_id(), Some(replacement_id));
        assert_ne!(new_s1.id, s1_id);

        // s2 references the rewired s1, not the stale one
        let new_s2 = &driver.statements[2];
        assert_eq!(new_s2.operands()[0].ref_id(), Some(new_s1.id));

        driver.assert_valid(&model, &types, &mut rng);
    }

    #[test]
    fn test_replace_statement_untouched_statements_keep_ids() {
        let (model, types, f) = model_with_f_int();
        let mut rng = Rng::from_seed(6);
        let mut ids = IdGen::new();
        let s0 = Statement::primitive_unary(ids.fresh(), PrimitiveOp::Nop, int_const(&types, "1"));
        let s1 = Statement::primitive_unary(ids.fresh(), PrimitiveOp::Nop, int_const(&types, "2"));
        let s2 = Statement::call(
            ids.fresh(),
            types.int_value(),
            f,
            vec![Operand::reference(&s1)],
            None,
            TemplateContext::new(),
        );
        let s1_id = s1.id;
        let s2_id = s2.id;
        let mut driver = Driver::new(vec![s0, s1, s2], TemplateContext::new(), ids.high_water());

        let replacement = Statement::primitive_unary(
            driver.id_gen().fresh(),
            PrimitiveOp::Neg,
            int_const(&types, "5"),
        );
        driver.replace_statement(0, replacement);

        // s1 and s2 never referenced s0, so they are untouched
        assert_eq!(driver.statements[1].id, s1_id);
        assert_eq!(driver.statements[2].id, s2_id);
        driver.assert_valid(&model, &types, &mut rng);
    }

    #[test]
    fn test_container_operands_flatten_key_values() {
        let types = TypeTable::new();
        let mut ids = IdGen::new();
        let map_id = types
            .installed_container_by_name("std::map")
            .expect("map installed");
        let stmt = Statement::container(
            ids.fresh(),
            types.int_value().stripped(),
            map_id,
            Elements::KeyValue(vec![
                (int_const(&types, "1"), int_const(&types, "2")),
                (int_const(&types, "3"), int_const(&types, "4")),
            ]),
        );
        assert_eq!(stmt.operands().len(), 4);
    }

    #[test]
    fn test_c_string_statement_type() {
        let types = TypeTable::new();
        let mut ids = IdGen::new();
        let char_ptr = TypeWithMods::with_mods(
            types.primitive(Primitive::Char),
            Modifiers {
                pointers: 1,
                is_const: true,
                ..Modifiers::none()
            },
        );
        let stmt = Statement::c_string(ids.fresh(), &types, Operand::constant(char_ptr, "ab3"));
        assert!(stmt.ty.mods.is_array());
        assert_eq!(types.primitive_of(stmt.ty), Some(Primitive::Char));
    }
}
