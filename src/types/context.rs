//! Per-driver template-type context
//!
//! Maps template-parameter identifiers to concrete types. Binding is
//! lazy: the first lookup of an unbound parameter resolves it by
//! drawing uniformly from `{int, double}` and memoises the result, so
//! every later mention of the parameter (including at emission time)
//! agrees. Non-type parameters resolve to a small random integral and
//! are memoised the same way.
//!
//! Contexts are cloned freely — once per call statement, and once per
//! class-template instantiation descent during operand resolution.

use std::collections::HashMap;

use crate::model::{ClassModel, Executable, TemplateParam, TemplateParamKind};
use crate::random::Rng;
use crate::types::{TemplateArg, TypeTable, TypeWithMods};

/// Mapping from template-parameter identifiers to concrete types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    type_bindings: HashMap<String, TypeWithMods>,
    integral_bindings: HashMap<String, i64>,
}

impl TemplateContext {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a type parameter explicitly. Existing bindings are kept
    /// (first binding wins, matching lazy-resolution semantics).
    pub fn bind(&mut self, name: impl Into<String>, ty: TypeWithMods) {
        self.type_bindings.entry(name.into()).or_insert(ty);
    }

    /// Current binding for a type parameter, if any.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeWithMods> {
        self.type_bindings.get(name).copied()
    }

    /// All current type bindings (test and diagnostics use).
    #[must_use]
    pub fn bindings(&self) -> &HashMap<String, TypeWithMods> {
        &self.type_bindings
    }

    /// Look up a type parameter, binding it now if unbound. The default
    /// resolver draws uniformly from `{int, double}`.
    pub fn lookup_or_resolve(
        &mut self,
        name: &str,
        types: &TypeTable,
        rng: &mut Rng,
    ) -> TypeWithMods {
        if let Some(bound) = self.type_bindings.get(name) {
            return *bound;
        }
        let resolved = if rng.next_bool() {
            types.int_value()
        } else {
            types.double_value()
        };
        self.type_bindings.insert(name.to_string(), resolved);
        resolved
    }

    fn integral_or_resolve(&mut self, name: &str, rng: &mut Rng) -> i64 {
        if let Some(v) = self.integral_bindings.get(name) {
            return *v;
        }
        let v = rng.next_range(1, 8);
        self.integral_bindings.insert(name.to_string(), v);
        v
    }

    /// Instantiation list for a template parameter list, resolving any
    /// still-unbound parameters.
    pub fn inst_list_for_params(
        &mut self,
        params: &[TemplateParam],
        types: &TypeTable,
        rng: &mut Rng,
    ) -> Vec<TemplateArg> {
        params
            .iter()
            .map(|p| match p.kind {
                TemplateParamKind::Type => {
                    TemplateArg::Type(self.lookup_or_resolve(&p.name, types, rng))
                }
                TemplateParamKind::NonType => {
                    TemplateArg::Integral(self.integral_or_resolve(&p.name, rng))
                }
            })
            .collect()
    }

    /// Instantiation list for a templated class.
    pub fn inst_list_for_class(
        &mut self,
        class: &ClassModel,
        types: &TypeTable,
        rng: &mut Rng,
    ) -> Vec<TemplateArg> {
        self.inst_list_for_params(&class.template_params, types, rng)
    }

    /// Instantiation list for a templated executable.
    pub fn inst_list_for_exec(
        &mut self,
        exec: &Executable,
        types: &TypeTable,
        rng: &mut Rng,
    ) -> Vec<TemplateArg> {
        self.inst_list_for_params(&exec.template_params, types, rng)
    }
}
