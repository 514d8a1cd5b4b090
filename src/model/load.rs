//! JSON model loading
//!
//! The header analyzer hands the static API surface over as a JSON
//! file; this module parses it into an [`ApiModel`] + [`TypeTable`]
//! pair. Type references are C++-ish type strings (`"const char*"`,
//! `"std::vector<int>"`, `"T"`), parsed against the classes, enums and
//! template parameters declared in the same file. A reference that
//! cannot be understood becomes bottom — the analysis pass then
//! excludes whatever mentioned it, keeping loading total.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{
    ApiModel, ClassId, ClassModel, ClassVariant, EnumId, EnumModel, Executable, FieldModel,
    ModelBuilder, TemplateParam,
};
use crate::types::{Modifiers, Primitive, TemplateArg, TypeTable, TypeWithMods};

fn default_true() -> bool {
    true
}

fn default_void() -> String {
    "void".to_string()
}

#[derive(Debug, Deserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default = "default_true")]
    public: bool,
}

#[derive(Debug, Deserialize)]
struct CtorSpec {
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MethodSpec {
    name: String,
    #[serde(rename = "return", default = "default_void")]
    ret: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    is_static: bool,
    #[serde(default)]
    is_conversion: bool,
    #[serde(default)]
    factory_of: Option<String>,
    #[serde(default)]
    mangled: Option<String>,
    #[serde(default)]
    template_params: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassSpec {
    name: String,
    #[serde(default)]
    is_struct: bool,
    #[serde(default)]
    template_params: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default = "default_true")]
    has_public_copy_ctor: bool,
    #[serde(default)]
    bases: Vec<String>,
    #[serde(default)]
    constructors: Vec<CtorSpec>,
    #[serde(default)]
    methods: Vec<MethodSpec>,
}

#[derive(Debug, Deserialize)]
struct EnumSpec {
    name: String,
    variants: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    classes: Vec<ClassSpec>,
    #[serde(default)]
    enums: Vec<EnumSpec>,
    #[serde(default)]
    functions: Vec<MethodSpec>,
}

fn simple_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

/// Scope for type-string parsing.
struct TypeScope<'a> {
    classes: &'a HashMap<String, ClassId>,
    enums: &'a HashMap<String, EnumId>,
    template_params: &'a HashSet<String>,
}

fn split_top_level_args(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn parse_primitive(base: &str) -> Option<Primitive> {
    Primitive::ALL.iter().copied().find(|p| p.name() == base)
}

/// Parse one C++-ish type string. Unknown names yield bottom.
fn parse_type(input: &str, types: &mut TypeTable, scope: &TypeScope<'_>) -> TypeWithMods {
    let mut s = input.trim();
    let mut mods = Modifiers::none();

    // suffix modifiers, innermost last
    loop {
        if let Some(rest) = s.strip_suffix("[]") {
            mods.arrays += 1;
            s = rest.trim_end();
        } else if let Some(rest) = s.strip_suffix("&&") {
            mods.rvalue_ref = true;
            s = rest.trim_end();
        } else if let Some(rest) = s.strip_suffix('&') {
            mods.lvalue_ref = true;
            s = rest.trim_end();
        } else if let Some(rest) = s.strip_suffix("const") {
            // `T* const`: const applies to the pointer itself
            if rest.trim_end().ends_with('*') {
                mods.const_on_pointer = true;
                s = rest.trim_end();
            } else {
                break;
            }
        } else if let Some(rest) = s.strip_suffix('*') {
            mods.pointers += 1;
            s = rest.trim_end();
        } else {
            break;
        }
    }

    // prefix modifiers
    loop {
        if let Some(rest) = s.strip_prefix("const ") {
            mods.is_const = true;
            s = rest.trim_start();
        } else if s == "unsigned" {
            // bare `unsigned` means `unsigned int`
            mods.is_unsigned = true;
            s = "int";
            break;
        } else if let Some(rest) = s.strip_prefix("unsigned ") {
            mods.is_unsigned = true;
            s = rest.trim_start();
        } else {
            break;
        }
    }

    // generic arguments, if any
    let (base, generic_args) = match s.find('<') {
        Some(open) if s.ends_with('>') => (s[..open].trim(), Some(&s[open + 1..s.len() - 1])),
        _ => (s, None),
    };

    let ty = if let Some(args_text) = generic_args {
        let mut args = Vec::new();
        for arg_text in split_top_level_args(args_text) {
            if let Ok(n) = arg_text.parse::<i64>() {
                args.push(TemplateArg::Integral(n));
            } else if arg_text == "nullptr" {
                args.push(TemplateArg::Nullptr);
            } else {
                let parsed = parse_type(arg_text, types, scope);
                if parsed.is_bottom() {
                    return TypeWithMods::bottom();
                }
                args.push(TemplateArg::Type(parsed));
            }
        }
        let target = if let Some(container) = types.installed_container_by_name(base) {
            types.container_type(container)
        } else if let Some(class_id) = scope.classes.get(base) {
            types.class_type(*class_id)
        } else {
            tracing::warn!(name = base, "unrecognized template target");
            return TypeWithMods::bottom();
        };
        types.intern_spec(target, args)
    } else if let Some(p) = parse_primitive(base) {
        types.primitive(p)
    } else if base == "std::string" {
        // sugar for basic_string<char>
        let container = types
            .installed_container_by_name("std::basic_string")
            .expect("basic_string installed");
        let target = types.container_type(container);
        let ch = types.char_value();
        types.intern_spec(target, vec![TemplateArg::Type(ch)])
    } else if scope.template_params.contains(base) {
        types.template_param(base)
    } else if let Some(class_id) = scope.classes.get(base) {
        types.class_type(*class_id)
    } else if let Some(enum_id) = scope.enums.get(base) {
        types.enum_type(*enum_id)
    } else {
        if TypeTable::is_std_name(base) {
            tracing::warn!(name = base, "unhandled standard type");
        } else {
            tracing::warn!(name = base, "unrecognized type");
        }
        return TypeWithMods::bottom();
    };

    TypeWithMods::with_mods(ty, mods)
}

fn template_param_list(names: &[String]) -> Vec<TemplateParam> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| TemplateParam::type_param(n.clone(), i as u32))
        .collect()
}

/// Parse model JSON text into a model + type table.
///
/// # Errors
///
/// Returns an error on malformed JSON, duplicate class/enum names,
/// unknown base classes, or factories naming unknown target classes.
/// Unparseable *type strings* do not fail the load; they become bottom
/// and are excluded by the analysis pass.
pub fn parse_model(json: &str) -> Result<(ApiModel, TypeTable)> {
    let file: ModelFile = serde_json::from_str(json)?;
    let mut builder = ModelBuilder::new();

    // pass 1: declare classes and enums so signatures can refer to them
    let mut class_ids: HashMap<String, ClassId> = HashMap::new();
    for spec in &file.classes {
        let id = builder.add_class(ClassModel {
            name: simple_name(&spec.name).to_string(),
            qualified_name: spec.name.clone(),
            variant: if spec.is_struct {
                ClassVariant::Struct
            } else {
                ClassVariant::Class
            },
            template_params: template_param_list(&spec.template_params),
            fields: Vec::new(),
            has_public_copy_ctor: spec.has_public_copy_ctor,
        });
        if class_ids.insert(spec.name.clone(), id).is_some() {
            return Err(Error::Model(format!("duplicate class {}", spec.name)));
        }
    }
    let mut enum_ids: HashMap<String, EnumId> = HashMap::new();
    for spec in &file.enums {
        let id = builder.add_enum(EnumModel {
            name: simple_name(&spec.name).to_string(),
            qualified_name: spec.name.clone(),
            variants: spec.variants.clone(),
        });
        if enum_ids.insert(spec.name.clone(), id).is_some() {
            return Err(Error::Model(format!("duplicate enum {}", spec.name)));
        }
    }

    // pass 2: inheritance edges
    for spec in &file.classes {
        let child = class_ids[&spec.name];
        for base in &spec.bases {
            let Some(parent) = class_ids.get(base) else {
                return Err(Error::Model(format!(
                    "class {} inherits unknown base {base}",
                    spec.name
                )));
            };
            builder.add_inheritance(child, *parent);
        }
    }

    // pass 3: fields and executables
    for spec in &file.classes {
        let class_id = class_ids[&spec.name];
        let class_params: HashSet<String> = spec.template_params.iter().cloned().collect();

        let fields: Vec<FieldModel> = spec
            .fields
            .iter()
            .map(|f| {
                let scope = TypeScope {
                    classes: &class_ids,
                    enums: &enum_ids,
                    template_params: &class_params,
                };
                FieldModel {
                    name: f.name.clone(),
                    ty: parse_type(&f.ty, builder.types(), &scope),
                    is_public: f.public,
                }
            })
            .collect();
        // fields were not known at declaration time
        {
            let scope_class = builder.class(class_id).clone();
            let mut updated = scope_class;
            updated.fields = fields;
            builder.replace_class(class_id, updated);
        }

        for ctor in &spec.constructors {
            let scope = TypeScope {
                classes: &class_ids,
                enums: &enum_ids,
                template_params: &class_params,
            };
            let args = ctor
                .args
                .iter()
                .map(|a| parse_type(a, builder.types(), &scope))
                .collect();
            builder.add_executable(Executable::constructor(
                class_id,
                simple_name(&spec.name).to_string(),
                format!("{}::{}", spec.name, simple_name(&spec.name)),
                args,
            ));
        }

        for method in &spec.methods {
            let mut in_scope = class_params.clone();
            in_scope.extend(method.template_params.iter().cloned());
            let scope = TypeScope {
                classes: &class_ids,
                enums: &enum_ids,
                template_params: &in_scope,
            };
            let ret = parse_type(&method.ret, builder.types(), &scope);
            let args: Vec<TypeWithMods> = method
                .args
                .iter()
                .map(|a| parse_type(a, builder.types(), &scope))
                .collect();
            let qualified = format!("{}::{}", spec.name, method.name);

            let mut exec = if let Some(factory_target) = &method.factory_of {
                let Some(target) = class_ids.get(factory_target) else {
                    return Err(Error::Model(format!(
                        "{qualified} is a factory of unknown class {factory_target}"
                    )));
                };
                Executable::static_factory(
                    class_id,
                    *target,
                    method.name.clone(),
                    qualified,
                    ret,
                    args,
                )
            } else {
                Executable::method(
                    class_id,
                    method.name.clone(),
                    qualified,
                    ret,
                    args,
                    method.is_static,
                )
            };
            if let Some(mangled) = &method.mangled {
                exec = exec.with_mangled_name(mangled.clone());
            }
            exec.is_conversion = method.is_conversion;
            exec = exec.with_template_params(template_param_list(&method.template_params));
            builder.add_executable(exec);
        }
    }

    for func in &file.functions {
        let in_scope: HashSet<String> = func.template_params.iter().cloned().collect();
        let scope = TypeScope {
            classes: &class_ids,
            enums: &enum_ids,
            template_params: &in_scope,
        };
        let ret = parse_type(&func.ret, builder.types(), &scope);
        let args: Vec<TypeWithMods> = func
            .args
            .iter()
            .map(|a| parse_type(a, builder.types(), &scope))
            .collect();
        let mut exec = Executable::free_function(
            simple_name(&func.name).to_string(),
            func.name.clone(),
            ret,
            args,
        );
        if let Some(mangled) = &func.mangled {
            exec = exec.with_mangled_name(mangled.clone());
        }
        exec = exec.with_template_params(template_param_list(&func.template_params));
        if let Some(factory_target) = &func.factory_of {
            let Some(target) = class_ids.get(factory_target) else {
                return Err(Error::Model(format!(
                    "{} is a factory of unknown class {factory_target}",
                    func.name
                )));
            };
            exec.creator = Some(crate::model::CreatorInfo {
                kind: crate::model::CreatorKind::StaticFactory,
                target_class: *target,
            });
        }
        builder.add_executable(exec);
    }

    Ok(builder.build())
}

/// Load a model JSON file from disk.
pub fn load_model(path: &Path) -> Result<(ApiModel, TypeTable)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Model(format!("cannot read model file {}: {e}", path.display())))?;
    parse_model(&content)
}
