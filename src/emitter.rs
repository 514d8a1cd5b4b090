//! Driver emission
//!
//! Pretty-prints the statement IR as compilable C++ source. Variable
//! names are derived from each statement's result type plus its ordinal
//! position, so emission is deterministic for a given driver. Operand
//! rendering inserts the casts the type system promised: explicit casts
//! for `void*` bridging and const-pointer downgrades, `&`/`*`
//! adjustment where pointer-ness differs, and `std::move` where an
//! rvalue reference or a by-value `unique_ptr` is required.

use std::collections::HashMap;

use crate::exec::CAUGHT_EXCEPTION_RETURN;
use crate::ir::{Driver, Elements, OpArity, Operand, PrimitiveOp, Statement, StatementKind, StmtId};
use crate::model::{ApiModel, ExecKind};
use crate::random::Rng;
use crate::types::context::TemplateContext;
use crate::types::{ContainerKind, Modifiers, Primitive, TypeKind, TypeTable, TypeWithMods};

/// Exception handling wrapped around the emitted statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryCatch {
    /// Bare statements
    None,
    /// `try { ... } catch (...) { return 180; }` — the sentinel exit
    /// code marking a caught exception
    CatchReturn,
    /// `try { ... } catch (...) { }` — for drivers re-emitted into a
    /// harness that supplies its own return value
    CatchBare,
}

/// Driver file scaffold: includes, exception wrapping, crash tag.
#[derive(Debug, Clone)]
pub struct Scaffold {
    /// Header files to `#include`
    pub includes: Vec<String>,
    /// Exception wrapping mode
    pub try_catch: TryCatch,
    /// Statement index to tag with the crash marker comment
    pub crash_tag: Option<usize>,
}

impl Scaffold {
    /// Scaffold for the per-iteration temporary driver.
    #[must_use]
    pub fn for_execution(includes: Vec<String>) -> Self {
        Self {
            includes,
            try_catch: TryCatch::CatchReturn,
            crash_tag: None,
        }
    }

    /// Scaffold for flushed corpus files.
    #[must_use]
    pub fn for_corpus(includes: Vec<String>, caught_exception: bool, crash_tag: Option<usize>) -> Self {
        Self {
            includes,
            try_catch: if caught_exception {
                TryCatch::CatchBare
            } else {
                TryCatch::None
            },
            crash_tag,
        }
    }
}

const CRASH_TAG_COMMENT: &str = "/* PROGRAM CRASHED AT THE EXACT LINE BELOW */";

type NameMap = HashMap<StmtId, String>;

fn needs_const_pointer_cast(source: TypeWithMods, required: TypeWithMods) -> bool {
    source.mods.is_pointer()
        && source.mods.is_const
        && required.mods.is_pointer()
        && !required.mods.is_const
}

/// Serialises drivers and single statements to C++ text.
pub struct Emitter<'a> {
    model: &'a ApiModel,
    types: &'a TypeTable,
}

impl<'a> Emitter<'a> {
    /// New emitter over the session state.
    #[must_use]
    pub fn new(model: &'a ApiModel, types: &'a TypeTable) -> Self {
        Self { model, types }
    }

    /// Render one operand against its required type.
    fn operand_text(
        &self,
        op: &Operand,
        required: TypeWithMods,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
        names: &NameMap,
    ) -> String {
        let op_ty = self.types.resolve_template(op.ty(), ctx, rng);
        let rq = self.types.resolve_template(required, ctx, rng);

        let mut cast = rq.ty != op_ty.ty;
        if self.types.is_class(rq) && self.types.is_spec(op_ty) {
            cast = false;
        }
        if needs_const_pointer_cast(op_ty, rq) || op.is_null() {
            cast = true;
        }

        let mut out = String::new();
        if self.types.is_void_ptr(op_ty) {
            // a void* source is cast to the pointer the sink wants, or
            // dereferenced through it when a value is required
            if rq.mods.is_pointer() {
                out.push_str(&format!(
                    "({}) ",
                    self.types.cpp_string_in(rq, self.model, ctx, rng)
                ));
            } else {
                let rq_ptr = rq.with_additional(Modifiers::pointer());
                out.push_str(&format!(
                    "*({}) ",
                    self.types.cpp_string_in(rq_ptr, self.model, ctx, rng)
                ));
            }
        } else {
            if cast {
                out.push_str(&format!(
                    "({}) ",
                    self.types.cpp_string_in(rq, self.model, ctx, rng)
                ));
            }
            if op.is_ref() {
                if rq.mods.is_pointer_or_array() && !op_ty.mods.is_pointer_or_array() {
                    out.push('&');
                } else if op_ty.mods.is_pointer_or_array() && !rq.mods.is_pointer_or_array() {
                    out.push('*');
                }
            }
        }

        match op {
            Operand::Constant { ty, literal } => {
                let is_char_buffer = self.types.primitive_of(*ty) == Some(Primitive::Char)
                    && ty.mods.is_pointer_or_array();
                if is_char_buffer && literal != "nullptr" {
                    out.push('"');
                    out.push_str(literal);
                    out.push('"');
                } else {
                    out.push_str(literal);
                }
            }
            Operand::Ref { id, .. } => match names.get(id) {
                Some(name) => out.push_str(name),
                None => {
                    tracing::error!(?id, "reference to unnamed statement");
                    out.push_str("unnamed");
                }
            },
        }

        let mut apply_move = rq.mods.rvalue_ref && op.is_ref();
        if let Some((target, _)) = self.types.spec_of(rq) {
            if let TypeKind::Container(c) = self.types.kind(target) {
                if c.desc().name == "std::unique_ptr"
                    && !rq.mods.lvalue_ref
                    && !rq.mods.is_pointer_or_array()
                {
                    apply_move = true;
                }
            }
        }
        if apply_move {
            format!("std::move({out})")
        } else {
            out
        }
    }

    fn primitive_text(
        &self,
        stmt: &Statement,
        idx: usize,
        names: &mut NameMap,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
    ) -> String {
        let StatementKind::Primitive { op, operands } = &stmt.kind else {
            unreachable!("primitive dispatch");
        };
        let var = format!("{}{idx}", self.types.default_var_name(stmt.ty, self.model));
        let mut out = format!(
            "{} {var} = ",
            self.types.cpp_string_in(stmt.ty, self.model, ctx, rng)
        );
        match op.arity() {
            OpArity::Unary => {
                let operand = self.operand_text(&operands[0], stmt.ty, ctx, rng, names);
                if *op == PrimitiveOp::Neg {
                    out.push_str(&format!("-({operand})"));
                } else {
                    out.push_str(&operand);
                }
            }
            OpArity::Binary => {
                let lhs = self.operand_text(&operands[0], stmt.ty, ctx, rng, names);
                let rhs = self.operand_text(&operands[1], stmt.ty, ctx, rng, names);
                out.push_str(&lhs);
                out.push_str(op.symbol());
                out.push_str(&rhs);
            }
        }
        names.insert(stmt.id, var);
        out
    }

    fn call_text(
        &self,
        stmt: &mut Statement,
        idx: usize,
        names: &mut NameMap,
        rng: &mut Rng,
    ) -> String {
        let stmt_ty = stmt.ty;
        let stmt_id = stmt.id;
        let StatementKind::Call {
            target,
            args,
            invoking,
            ctx,
        } = &mut stmt.kind
        else {
            unreachable!("call dispatch");
        };
        let exec = self.model.executable(*target);
        let is_ctor = exec.kind == ExecKind::Constructor;
        let is_void = self.types.is_void(stmt_ty);
        let is_void_ptr = self.types.is_void_ptr(stmt_ty);

        let mut out = String::new();
        if is_void_ptr || !is_void {
            let var = format!("{}{idx}", self.types.default_var_name(stmt_ty, self.model));
            out.push_str(&format!(
                "{} {var}",
                self.types.cpp_string_in(stmt_ty, self.model, ctx, rng)
            ));
            names.insert(stmt_id, var);
            if !is_ctor {
                out.push_str(" = ");
            }
        }

        if let Some(ret) = exec.ret {
            let resolved = self.types.resolve_template(ret, ctx, rng);
            if needs_const_pointer_cast(resolved, stmt_ty) {
                out.push_str(&format!(
                    "({}) ",
                    self.types.cpp_string_in(stmt_ty, self.model, ctx, rng)
                ));
            }
        }

        if let Some(inv) = invoking {
            let inv_text = self.operand_text(inv, inv.ty(), ctx, rng, names);
            out.push_str(&inv_text);
            if inv.ty().mods.is_pointer_or_array() {
                out.push_str("->");
            } else {
                out.push('.');
            }
        } else if exec.is_member() && !exec.requires_invoking_obj && !is_ctor {
            let owner = exec.owner.expect("member without owner");
            let class = self.model.class(owner);
            let mut inst = String::new();
            if class.is_templated() {
                let args = ctx.inst_list_for_class(class, self.types, rng);
                inst = render_args(self.types, self.model, &args);
            }
            out.push_str(&format!("{}{inst}::", class.qualified_name));
        }

        if !is_ctor {
            let mut inst = String::new();
            if exec.is_templated() {
                let args = ctx.inst_list_for_exec(exec, self.types, rng);
                inst = render_args(self.types, self.model, &args);
            }
            if exec.is_conversion {
                let ret = exec.ret.expect("conversion without return type");
                let resolved = self.types.resolve_template(ret, ctx, rng);
                out.push_str(&format!(
                    "operator {}",
                    self.types.cpp_string_in(resolved, self.model, ctx, rng)
                ));
            } else if exec.owner.is_none() {
                out.push_str(&format!("{}{inst}", exec.qualified_name));
            } else {
                out.push_str(&format!("{}{inst}", exec.name));
            }
        }

        let mut rendered_args = Vec::with_capacity(args.len());
        for (op, required) in args.iter().zip(exec.args.iter()) {
            rendered_args.push(self.operand_text(op, *required, ctx, rng, names));
        }
        if is_ctor {
            out.push_str(&format!("{{{}}}", rendered_args.join(", ")));
        } else {
            out.push_str(&format!("({})", rendered_args.join(", ")));
        }
        out
    }

    fn container_text(
        &self,
        stmt: &Statement,
        idx: usize,
        names: &mut NameMap,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
    ) -> String {
        let StatementKind::Container {
            container,
            elements,
        } = &stmt.kind
        else {
            unreachable!("container dispatch");
        };
        let desc = container.desc();
        let (_, spec_args) = self
            .types
            .spec_of(stmt.ty)
            .expect("container statement carries a spec type");
        let type_arg = |i: usize| -> TypeWithMods {
            match spec_args.get(i) {
                Some(crate::types::TemplateArg::Type(t)) => *t,
                _ => TypeWithMods::bottom(),
            }
        };

        let var = format!("{}{idx}", self.types.default_var_name(stmt.ty, self.model));
        let ty_str = self.types.cpp_string_in(stmt.ty, self.model, ctx, rng);
        let mut prelim = String::new();
        let mut out = format!("{ty_str} {var}");

        match (desc.kind, elements) {
            (ContainerKind::Adapter, Elements::Linear(ops)) if !ops.is_empty() => {
                let rq = type_arg(0);
                let rendered: Vec<String> = ops
                    .iter()
                    .map(|op| self.operand_text(op, rq, ctx, rng, names))
                    .collect();
                if desc.name == "std::priority_queue" {
                    // seed through a temporary vector and its iterator
                    // range
                    let elem_str = self.types.cpp_string_in(rq, self.model, ctx, rng);
                    let tmp = format!("__tvc{idx}");
                    prelim = format!(
                        "std::vector<{elem_str}> {tmp}{{{}}}; ",
                        rendered.join(", ")
                    );
                    out.push_str(&format!("({tmp}.begin(), {tmp}.end())"));
                } else {
                    out.push_str(&format!("({{{}}})", rendered.join(", ")));
                }
            }
            (
                ContainerKind::Sequence
                | ContainerKind::Set
                | ContainerKind::String
                | ContainerKind::Tuple,
                Elements::Linear(ops),
            ) if !ops.is_empty() => {
                let rendered: Vec<String> = ops
                    .iter()
                    .enumerate()
                    .map(|(i, op)| {
                        let rq = if desc.kind == ContainerKind::Tuple {
                            type_arg(i)
                        } else {
                            type_arg(0)
                        };
                        self.operand_text(op, rq, ctx, rng, names)
                    })
                    .collect();
                out.push_str(&format!("{{{}}}", rendered.join(", ")));
            }
            (ContainerKind::Array, Elements::Linear(ops)) => {
                let rq = type_arg(0);
                let rendered: Vec<String> = ops
                    .iter()
                    .map(|op| self.operand_text(op, rq, ctx, rng, names))
                    .collect();
                out.push_str(&format!("{{{}}}", rendered.join(", ")));
            }
            (ContainerKind::SmartPointer, Elements::Linear(ops)) if !ops.is_empty() => {
                let rq = type_arg(0).with_additional(Modifiers::pointer());
                let rendered = self.operand_text(&ops[0], rq, ctx, rng, names);
                out.push_str(&format!("({rendered})"));
            }
            (ContainerKind::Map, Elements::KeyValue(pairs)) if !pairs.is_empty() => {
                let (krq, vrq) = (type_arg(0), type_arg(1));
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{{{},{}}}",
                            self.operand_text(k, krq, ctx, rng, names),
                            self.operand_text(v, vrq, ctx, rng, names)
                        )
                    })
                    .collect();
                out.push_str(&format!("{{{}}}", rendered.join(", ")));
            }
            (ContainerKind::Pair, Elements::KeyValue(pairs)) if !pairs.is_empty() => {
                let (krq, vrq) = (type_arg(0), type_arg(1));
                let (k, v) = &pairs[0];
                out.push_str(&format!(
                    "{{{}, {}}}",
                    self.operand_text(k, krq, ctx, rng, names),
                    self.operand_text(v, vrq, ctx, rng, names)
                ));
            }
            // empty payloads default-construct
            _ => {}
        }
        names.insert(stmt.id, var);
        format!("{prelim}{out}")
    }

    fn array_text(
        &self,
        stmt: &Statement,
        idx: usize,
        names: &mut NameMap,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
    ) -> String {
        let StatementKind::ArrayLit {
            capacity,
            string_literal,
            elements,
        } = &stmt.kind
        else {
            unreachable!("array dispatch");
        };
        let element_ty = TypeWithMods::with_mods(stmt.ty.ty, stmt.ty.mods.without_array());
        let ty_str = self.types.cpp_string_in(element_ty, self.model, ctx, rng);
        let var = format!("{}{idx}", self.types.default_var_name(stmt.ty, self.model));
        names.insert(stmt.id, var.clone());

        if let Some(lit) = string_literal {
            let text = lit.literal().unwrap_or_default();
            let size = capacity.unwrap_or(text.len() + 1);
            return format!("{ty_str} {var}[{size}] = \"{text}\"");
        }
        if let Some(ops) = elements {
            let size = capacity.unwrap_or(ops.len() + 1);
            let mut out = format!("{ty_str} {var}[{size}] ");
            if !ops.is_empty() {
                let rendered: Vec<String> = ops
                    .iter()
                    .map(|op| self.operand_text(op, stmt.ty, ctx, rng, names))
                    .collect();
                out.push_str(&format!("{{{}}}", rendered.join(", ")));
            }
            return out;
        }
        let size = capacity.unwrap_or(0);
        format!("{ty_str} {var}[{size}]")
    }

    /// Render one statement at position `idx`, registering its variable
    /// name. Call statements use their own context; everything else the
    /// supplied fallback.
    pub fn statement_text(
        &self,
        stmt: &mut Statement,
        idx: usize,
        names: &mut NameMap,
        fallback_ctx: &mut TemplateContext,
        rng: &mut Rng,
    ) -> String {
        match &stmt.kind {
            StatementKind::Primitive { .. } => {
                self.primitive_text(stmt, idx, names, fallback_ctx, rng)
            }
            StatementKind::Call { .. } => self.call_text(stmt, idx, names, rng),
            StatementKind::Container { .. } => {
                self.container_text(stmt, idx, names, fallback_ctx, rng)
            }
            StatementKind::ArrayLit { .. } => {
                self.array_text(stmt, idx, names, fallback_ctx, rng)
            }
        }
    }

    /// Render every statement of a driver, in order.
    pub fn statements_text(&self, driver: &mut Driver, rng: &mut Rng) -> Vec<String> {
        let mut names = NameMap::new();
        let mut out = Vec::with_capacity(driver.statements.len());
        let (statements, fallback_ctx) = (&mut driver.statements, &mut driver.ctx);
        for (idx, stmt) in statements.iter_mut().enumerate() {
            out.push(self.statement_text(stmt, idx, &mut names, fallback_ctx, rng));
        }
        out
    }

    /// Render a complete driver source file.
    pub fn driver_source(&self, driver: &mut Driver, rng: &mut Rng, scaffold: &Scaffold) -> String {
        let lines = self.statements_text(driver, rng);
        let mut out = String::new();
        for include in &scaffold.includes {
            out.push_str(&format!("#include \"{include}\"\n"));
        }
        out.push('\n');
        out.push_str("int main() {\n");
        if scaffold.try_catch != TryCatch::None {
            out.push_str(" try {\n");
        }
        for (idx, line) in lines.iter().enumerate() {
            if scaffold.crash_tag == Some(idx) {
                out.push_str(&format!("  {CRASH_TAG_COMMENT}\n"));
            }
            out.push_str("  ");
            out.push_str(line);
            if !line.ends_with(';') {
                out.push(';');
            }
            out.push('\n');
        }
        match scaffold.try_catch {
            TryCatch::None => {}
            TryCatch::CatchReturn => {
                out.push_str(&format!(
                    " }} catch (...) {{ return {CAUGHT_EXCEPTION_RETURN}; }}\n"
                ));
            }
            TryCatch::CatchBare => {
                out.push_str(" } catch (...) { }\n");
            }
        }
        out.push_str("  return 0;\n}\n");
        out
    }
}

fn render_args(
    types: &TypeTable,
    model: &ApiModel,
    args: &[crate::types::TemplateArg],
) -> String {
    if args.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = args
        .iter()
        .map(|a| match a {
            crate::types::TemplateArg::Type(t) => types.cpp_string(*t, model),
            crate::types::TemplateArg::Integral(n) => n.to_string(),
            crate::types::TemplateArg::Nullptr => "nullptr".to_string(),
        })
        .collect();
    format!("<{}>", rendered.join(", "))
}
