//! Type representation and the interned type table
//!
//! All types flowing through generation are handles ([`TypeId`]) into a
//! [`TypeTable`] arena: primitives, enums, user classes, template
//! parameters, the closed standard-container catalog, and template-type
//! instantiations (specs). Specs are interned by structural equality of
//! (target, instantiation list), so handle equality is type equality.
//!
//! A [`TypeWithMods`] pairs a handle with a modifier multiset and is the
//! value every signature, operand and statement carries. It has a
//! distinguished bottom value for unresolvable types; every operation
//! short-circuits on bottom.

pub mod context;

use std::collections::HashMap;

use crate::model::{ApiModel, ClassId, EnumId};
use crate::random::{IntWidth, Rng};
use context::TemplateContext;

/// Builtin primitive types of the target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// `short`
    Short,
    /// `char`
    Char,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `long long`
    LongLong,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `wchar_t`
    WChar,
    /// `std::nullptr_t`
    Nullptr,
}

impl Primitive {
    /// All primitives, in table order.
    pub const ALL: [Primitive; 11] = [
        Primitive::Void,
        Primitive::Bool,
        Primitive::Short,
        Primitive::Char,
        Primitive::Int,
        Primitive::Long,
        Primitive::LongLong,
        Primitive::Float,
        Primitive::Double,
        Primitive::WChar,
        Primitive::Nullptr,
    ];

    /// Source-level spelling.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Short => "short",
            Primitive::Char => "char",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::LongLong => "long long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::WChar => "wchar_t",
            Primitive::Nullptr => "std::nullptr_t",
        }
    }

    /// Sampling width for integer-like primitives.
    #[must_use]
    pub fn int_width(self) -> Option<IntWidth> {
        match self {
            Primitive::Char => Some(IntWidth::W8),
            Primitive::Short => Some(IntWidth::W16),
            Primitive::Int | Primitive::WChar => Some(IntWidth::W32),
            Primitive::Long | Primitive::LongLong => Some(IntWidth::W64),
            _ => None,
        }
    }

    /// Whether this is `float` or `double`.
    #[must_use]
    pub fn is_real(self) -> bool {
        matches!(self, Primitive::Float | Primitive::Double)
    }

    fn table_index(self) -> u32 {
        match self {
            Primitive::Void => 0,
            Primitive::Bool => 1,
            Primitive::Short => 2,
            Primitive::Char => 3,
            Primitive::Int => 4,
            Primitive::Long => 5,
            Primitive::LongLong => 6,
            Primitive::Float => 7,
            Primitive::Double => 8,
            Primitive::WChar => 9,
            Primitive::Nullptr => 10,
        }
    }
}

/// Structural kind of a standard container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Ordered sequence: vector, deque, forward_list, list
    Sequence,
    /// Adapter over a sequence: stack, queue, priority_queue
    Adapter,
    /// Ordered/unordered (multi)set
    Set,
    /// Ordered/unordered (multi)map
    Map,
    /// Fixed-size array (element type + integral size)
    Array,
    /// Two-element pair
    Pair,
    /// Variadic tuple
    Tuple,
    /// Owning single-referent smart pointer
    SmartPointer,
    /// basic_string
    String,
}

impl ContainerKind {
    /// Declared template-argument count; `None` for variadic tuple.
    #[must_use]
    pub fn param_count(self) -> Option<usize> {
        match self {
            ContainerKind::Sequence
            | ContainerKind::Adapter
            | ContainerKind::Set
            | ContainerKind::SmartPointer
            | ContainerKind::String => Some(1),
            ContainerKind::Array | ContainerKind::Map | ContainerKind::Pair => Some(2),
            ContainerKind::Tuple => None,
        }
    }

    /// Whether elements are key/value pairs.
    #[must_use]
    pub fn is_key_value(self) -> bool {
        matches!(self, ContainerKind::Map | ContainerKind::Pair)
    }
}

/// Catalog descriptor of one standard container.
#[derive(Debug, Clone, Copy)]
pub struct ContainerDesc {
    /// Canonical qualified name
    pub name: &'static str,
    /// Alternative namespaced spellings mapping to the same descriptor
    pub aliases: &'static [&'static str],
    /// Structural kind
    pub kind: ContainerKind,
    /// Whether the container participates in name lookup. Smart
    /// pointers keep descriptors but stay uninstalled.
    pub installed: bool,
}

/// The fixed container catalog, constructed once.
pub const CONTAINERS: &[ContainerDesc] = &[
    ContainerDesc { name: "std::vector", aliases: &[], kind: ContainerKind::Sequence, installed: true },
    ContainerDesc { name: "std::deque", aliases: &[], kind: ContainerKind::Sequence, installed: true },
    ContainerDesc { name: "std::forward_list", aliases: &[], kind: ContainerKind::Sequence, installed: true },
    ContainerDesc { name: "std::list", aliases: &["std::__cxx11::list"], kind: ContainerKind::Sequence, installed: true },
    ContainerDesc { name: "std::stack", aliases: &[], kind: ContainerKind::Adapter, installed: true },
    ContainerDesc { name: "std::queue", aliases: &[], kind: ContainerKind::Adapter, installed: true },
    ContainerDesc { name: "std::priority_queue", aliases: &[], kind: ContainerKind::Adapter, installed: true },
    ContainerDesc { name: "std::set", aliases: &[], kind: ContainerKind::Set, installed: true },
    ContainerDesc { name: "std::multiset", aliases: &[], kind: ContainerKind::Set, installed: true },
    ContainerDesc { name: "std::unordered_set", aliases: &[], kind: ContainerKind::Set, installed: true },
    ContainerDesc { name: "std::unordered_multiset", aliases: &[], kind: ContainerKind::Set, installed: true },
    ContainerDesc { name: "std::map", aliases: &[], kind: ContainerKind::Map, installed: true },
    ContainerDesc { name: "std::multimap", aliases: &[], kind: ContainerKind::Map, installed: true },
    ContainerDesc { name: "std::unordered_map", aliases: &[], kind: ContainerKind::Map, installed: true },
    ContainerDesc { name: "std::unordered_multimap", aliases: &[], kind: ContainerKind::Map, installed: true },
    ContainerDesc { name: "std::array", aliases: &[], kind: ContainerKind::Array, installed: true },
    ContainerDesc { name: "std::pair", aliases: &[], kind: ContainerKind::Pair, installed: true },
    ContainerDesc { name: "std::tuple", aliases: &[], kind: ContainerKind::Tuple, installed: true },
    ContainerDesc { name: "std::shared_ptr", aliases: &[], kind: ContainerKind::SmartPointer, installed: false },
    ContainerDesc { name: "std::unique_ptr", aliases: &[], kind: ContainerKind::SmartPointer, installed: false },
    ContainerDesc { name: "std::basic_string", aliases: &["std::__cxx11::basic_string", "std::string"], kind: ContainerKind::String, installed: true },
];

/// Handle into the container catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u32);

impl ContainerId {
    /// Catalog descriptor for this handle.
    #[must_use]
    pub fn desc(self) -> &'static ContainerDesc {
        &CONTAINERS[self.0 as usize]
    }
}

/// Look up a container handle by canonical name.
#[must_use]
pub fn container_named(name: &str) -> Option<ContainerId> {
    CONTAINERS
        .iter()
        .position(|c| c.name == name)
        .map(|i| ContainerId(i as u32))
}

/// Handle into the [`TypeTable`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The unresolvable bottom type.
    pub const BOTTOM: TypeId = TypeId(0);
}

/// One template-argument of an instantiation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateArg {
    /// A type argument
    Type(TypeWithMods),
    /// An integral argument (e.g. array size)
    Integral(i64),
    /// A null-pointer literal argument
    Nullptr,
}

/// Kind payload of one interned type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Unresolvable
    Bottom,
    /// Builtin primitive
    Primitive(Primitive),
    /// User enum
    Enum(EnumId),
    /// User class
    Class(ClassId),
    /// As-yet-unbound template parameter
    TemplateParam(String),
    /// Catalog container (only meaningful as a spec target)
    Container(ContainerId),
    /// Instantiated template: class or container target + arguments
    Spec {
        /// Target class or container type
        target: TypeId,
        /// Instantiation list
        args: Vec<TemplateArg>,
    },
}

/// Modifier multiset attached to a type. Pointer and array may repeat;
/// the rest appear at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    /// `const` on the value (or the pointee, for pointers)
    pub is_const: bool,
    /// `const` on the pointer itself
    pub const_on_pointer: bool,
    /// `unsigned`
    pub is_unsigned: bool,
    /// lvalue reference
    pub lvalue_ref: bool,
    /// rvalue reference
    pub rvalue_ref: bool,
    /// pointer depth
    pub pointers: u8,
    /// array depth
    pub arrays: u8,
}

impl Modifiers {
    /// Empty modifier set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Single pointer.
    #[must_use]
    pub fn pointer() -> Self {
        Self {
            pointers: 1,
            ..Self::default()
        }
    }

    /// `const` only.
    #[must_use]
    pub fn constant() -> Self {
        Self {
            is_const: true,
            ..Self::default()
        }
    }

    /// lvalue reference only.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            lvalue_ref: true,
            ..Self::default()
        }
    }

    /// Whether pointer depth is non-zero.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        self.pointers > 0
    }

    /// Whether array depth is non-zero.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.arrays > 0
    }

    /// Pointer or array.
    #[must_use]
    pub fn is_pointer_or_array(&self) -> bool {
        self.is_pointer() || self.is_array()
    }

    /// Combined pointer + array depth.
    #[must_use]
    pub fn indirection_depth(&self) -> u32 {
        u32::from(self.pointers) + u32::from(self.arrays)
    }

    /// Multiset union: at-most-once modifiers do not duplicate, counted
    /// modifiers add.
    #[must_use]
    pub fn merged(self, extra: Modifiers) -> Modifiers {
        Modifiers {
            is_const: self.is_const || extra.is_const,
            const_on_pointer: self.const_on_pointer || extra.const_on_pointer,
            is_unsigned: self.is_unsigned || extra.is_unsigned,
            lvalue_ref: self.lvalue_ref || extra.lvalue_ref,
            rvalue_ref: self.rvalue_ref || extra.rvalue_ref,
            pointers: self.pointers.saturating_add(extra.pointers),
            arrays: self.arrays.saturating_add(extra.arrays),
        }
    }

    /// Keep only signedness and rvalue-ness: the residue a value
    /// constant carries after stripping binding modifiers.
    #[must_use]
    pub fn stripped_for_value(self) -> Modifiers {
        Modifiers {
            is_unsigned: self.is_unsigned,
            rvalue_ref: self.rvalue_ref,
            ..Modifiers::none()
        }
    }

    /// Drop the array dimension (used when spelling array declarations).
    #[must_use]
    pub fn without_array(self) -> Modifiers {
        Modifiers { arrays: 0, ..self }
    }

    /// Drop `const` (used for by-value call results).
    #[must_use]
    pub fn without_const(self) -> Modifiers {
        Modifiers {
            is_const: false,
            ..self
        }
    }
}

/// A type handle plus modifiers — the currency of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeWithMods {
    /// Interned type handle
    pub ty: TypeId,
    /// Modifier multiset
    pub mods: Modifiers,
}

impl TypeWithMods {
    /// Plain type without modifiers.
    #[must_use]
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            mods: Modifiers::none(),
        }
    }

    /// Type with the given modifiers.
    #[must_use]
    pub fn with_mods(ty: TypeId, mods: Modifiers) -> Self {
        Self { ty, mods }
    }

    /// The distinguished unresolvable value.
    #[must_use]
    pub fn bottom() -> Self {
        Self::new(TypeId::BOTTOM)
    }

    /// Whether this is bottom.
    #[must_use]
    pub fn is_bottom(&self) -> bool {
        self.ty == TypeId::BOTTOM
    }

    /// Same type with extra modifiers merged in.
    #[must_use]
    pub fn with_additional(self, extra: Modifiers) -> Self {
        Self {
            ty: self.ty,
            mods: self.mods.merged(extra),
        }
    }

    /// Same type with all modifiers removed.
    #[must_use]
    pub fn stripped(self) -> Self {
        Self::new(self.ty)
    }
}

/// Arena of interned types.
#[derive(Debug, Clone)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    class_types: HashMap<ClassId, TypeId>,
    enum_types: HashMap<EnumId, TypeId>,
    container_types: HashMap<ContainerId, TypeId>,
    param_types: HashMap<String, TypeId>,
    spec_index: HashMap<(TypeId, Vec<TemplateArg>), TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Table pre-seeded with bottom, the primitives and the container
    /// catalog.
    #[must_use]
    pub fn new() -> Self {
        let mut kinds = vec![TypeKind::Bottom];
        for p in Primitive::ALL {
            kinds.push(TypeKind::Primitive(p));
        }
        let mut container_types = HashMap::new();
        for idx in 0..CONTAINERS.len() {
            let cid = ContainerId(idx as u32);
            container_types.insert(cid, TypeId(kinds.len() as u32));
            kinds.push(TypeKind::Container(cid));
        }
        Self {
            kinds,
            class_types: HashMap::new(),
            enum_types: HashMap::new(),
            container_types,
            param_types: HashMap::new(),
            spec_index: HashMap::new(),
        }
    }

    /// Kind of a handle.
    #[must_use]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    /// Handle of a primitive.
    #[must_use]
    pub fn primitive(&self, p: Primitive) -> TypeId {
        TypeId(1 + p.table_index())
    }

    /// Unmodified value of a primitive.
    #[must_use]
    pub fn primitive_value(&self, p: Primitive) -> TypeWithMods {
        TypeWithMods::new(self.primitive(p))
    }

    /// `int` value.
    #[must_use]
    pub fn int_value(&self) -> TypeWithMods {
        self.primitive_value(Primitive::Int)
    }

    /// `double` value.
    #[must_use]
    pub fn double_value(&self) -> TypeWithMods {
        self.primitive_value(Primitive::Double)
    }

    /// `bool` value.
    #[must_use]
    pub fn bool_value(&self) -> TypeWithMods {
        self.primitive_value(Primitive::Bool)
    }

    /// `char` value.
    #[must_use]
    pub fn char_value(&self) -> TypeWithMods {
        self.primitive_value(Primitive::Char)
    }

    /// `void` value.
    #[must_use]
    pub fn void_value(&self) -> TypeWithMods {
        self.primitive_value(Primitive::Void)
    }

    pub(crate) fn install_class(&mut self, id: ClassId) -> TypeId {
        let ty = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::Class(id));
        self.class_types.insert(id, ty);
        ty
    }

    pub(crate) fn install_enum(&mut self, id: EnumId) -> TypeId {
        let ty = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::Enum(id));
        self.enum_types.insert(id, ty);
        ty
    }

    /// Handle of an installed class type.
    #[must_use]
    pub fn class_type(&self, id: ClassId) -> TypeId {
        self.class_types[&id]
    }

    /// Unmodified value of an installed class type.
    #[must_use]
    pub fn class_value(&self, id: ClassId) -> TypeWithMods {
        TypeWithMods::new(self.class_type(id))
    }

    /// Handle of an installed enum type.
    #[must_use]
    pub fn enum_type(&self, id: EnumId) -> TypeId {
        self.enum_types[&id]
    }

    /// Unmodified value of an installed enum type.
    #[must_use]
    pub fn enum_value(&self, id: EnumId) -> TypeWithMods {
        TypeWithMods::new(self.enum_type(id))
    }

    /// Handle of a catalog container.
    #[must_use]
    pub fn container_type(&self, id: ContainerId) -> TypeId {
        self.container_types[&id]
    }

    /// Intern a template parameter by name.
    pub fn template_param(&mut self, name: &str) -> TypeId {
        if let Some(id) = self.param_types.get(name) {
            return *id;
        }
        let ty = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::TemplateParam(name.to_string()));
        self.param_types.insert(name.to_string(), ty);
        ty
    }

    /// Intern a template-type instantiation by structural equality of
    /// (target, args).
    pub fn intern_spec(&mut self, target: TypeId, args: Vec<TemplateArg>) -> TypeId {
        debug_assert!(
            args.iter().all(|a| match a {
                TemplateArg::Type(t) => !t.is_bottom(),
                _ => true,
            }),
            "bottom inside instantiation list"
        );
        if let Some(id) = self.spec_index.get(&(target, args.clone())) {
            return *id;
        }
        let ty = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::Spec {
            target,
            args: args.clone(),
        });
        self.spec_index.insert((target, args), ty);
        ty
    }

    /// Installed container handle matching a (possibly aliased) name.
    #[must_use]
    pub fn installed_container_by_name(&self, name: &str) -> Option<ContainerId> {
        CONTAINERS
            .iter()
            .position(|c| c.installed && (c.name == name || c.aliases.contains(&name)))
            .map(|i| ContainerId(i as u32))
    }

    /// Whether a qualified name lives in the standard namespace.
    #[must_use]
    pub fn is_std_name(name: &str) -> bool {
        name.starts_with("std::")
    }

    /// A standard-namespace name outside the installed catalog.
    #[must_use]
    pub fn is_unhandled_std_name(&self, name: &str) -> bool {
        Self::is_std_name(name) && self.installed_container_by_name(name).is_none()
    }

    // ── predicates over TypeWithMods ────────────────────────────────

    /// Primitive type?
    #[must_use]
    pub fn is_primitive(&self, t: TypeWithMods) -> bool {
        matches!(self.kind(t.ty), TypeKind::Primitive(_))
    }

    /// Class type?
    #[must_use]
    pub fn is_class(&self, t: TypeWithMods) -> bool {
        matches!(self.kind(t.ty), TypeKind::Class(_))
    }

    /// Enum type?
    #[must_use]
    pub fn is_enum(&self, t: TypeWithMods) -> bool {
        matches!(self.kind(t.ty), TypeKind::Enum(_))
    }

    /// Unbound template parameter?
    #[must_use]
    pub fn is_template_param(&self, t: TypeWithMods) -> bool {
        matches!(self.kind(t.ty), TypeKind::TemplateParam(_))
    }

    /// Template-type instantiation?
    #[must_use]
    pub fn is_spec(&self, t: TypeWithMods) -> bool {
        matches!(self.kind(t.ty), TypeKind::Spec { .. })
    }

    /// Plain `void` (any modifiers ignored except pointers)?
    #[must_use]
    pub fn is_void(&self, t: TypeWithMods) -> bool {
        matches!(self.kind(t.ty), TypeKind::Primitive(Primitive::Void))
    }

    /// `void*`?
    #[must_use]
    pub fn is_void_ptr(&self, t: TypeWithMods) -> bool {
        self.is_void(t) && t.mods.is_pointer()
    }

    /// Underlying primitive, if any.
    #[must_use]
    pub fn primitive_of(&self, t: TypeWithMods) -> Option<Primitive> {
        match self.kind(t.ty) {
            TypeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Underlying class handle, if any.
    #[must_use]
    pub fn class_of(&self, t: TypeWithMods) -> Option<ClassId> {
        match self.kind(t.ty) {
            TypeKind::Class(c) => Some(*c),
            _ => None,
        }
    }

    /// Underlying enum handle, if any.
    #[must_use]
    pub fn enum_of(&self, t: TypeWithMods) -> Option<EnumId> {
        match self.kind(t.ty) {
            TypeKind::Enum(e) => Some(*e),
            _ => None,
        }
    }

    /// Spec target and args, if this is a spec.
    #[must_use]
    pub fn spec_of(&self, t: TypeWithMods) -> Option<(TypeId, &[TemplateArg])> {
        match self.kind(t.ty) {
            TypeKind::Spec { target, args } => Some((*target, args.as_slice())),
            _ => None,
        }
    }

    /// Resolve a template-parameter type through the context, keeping
    /// the outer modifiers; all other kinds pass through unchanged.
    pub fn resolve_template(
        &self,
        t: TypeWithMods,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
    ) -> TypeWithMods {
        match self.kind(t.ty) {
            TypeKind::TemplateParam(name) => {
                let name = name.clone();
                ctx.lookup_or_resolve(&name, self, rng).with_additional(t.mods)
            }
            _ => t,
        }
    }

    // ── assignability ───────────────────────────────────────────────

    /// The `sink ⊒ src` predicate: whether a value of type `src` can be
    /// supplied where `sink` is required, under the template context and
    /// the inheritance model.
    ///
    /// Note on rule 5: two instantiations of the same outer target are
    /// accepted without comparing their instantiation lists. This is a
    /// deliberate over-approximation carried over from the enacted
    /// behaviour; a driver that overshoots fails to compile and is
    /// classified by the loop, which tolerates that by design.
    pub fn assignable(
        &self,
        sink: TypeWithMods,
        src: TypeWithMods,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
        model: &ApiModel,
    ) -> bool {
        if sink.is_bottom() || src.is_bottom() {
            return false;
        }
        let rsink = self.resolve_template(sink, ctx, rng);
        let rsrc = self.resolve_template(src, ctx, rng);

        let both_primitive = self.is_primitive(rsink) && self.is_primitive(rsrc);
        let is_copy_value = !rsink.mods.lvalue_ref && !rsink.mods.is_pointer_or_array();

        if !both_primitive && rsrc.ty == rsink.ty {
            let sink_const = rsink.mods.is_const;
            let src_const = rsrc.mods.is_const;
            if sink_const && src_const {
                return true;
            }
            // the only const downgrade allowed is a by-value copy
            if !sink_const && src_const && !is_copy_value {
                return false;
            }
            return true;
        }

        if let (Some(sink_cls), Some(src_cls)) = (self.class_of(rsink), self.class_of(rsrc)) {
            if model.inheritance().is_subclass_of(sink_cls, src_cls) {
                return true;
            }
        }

        if let Some(sink_cls) = self.class_of(rsink) {
            if let Some((target, _)) = self.spec_of(rsrc) {
                if let TypeKind::Class(src_cls) = self.kind(target) {
                    if model.inheritance().is_subclass_of(sink_cls, *src_cls) {
                        return true;
                    }
                }
            }
        } else if let (Some((sink_target, _)), Some((src_target, _))) =
            (self.spec_of(rsink), self.spec_of(rsrc))
        {
            // rule 5: equal outer target accepted regardless of inner args
            if sink_target == src_target {
                return true;
            }
        }

        if both_primitive {
            if rsink.ty == rsrc.ty {
                if rsink.mods.is_unsigned == rsrc.mods.is_unsigned {
                    if rsink.mods.is_const && !rsrc.mods.is_const {
                        return true;
                    }
                    return rsink.mods.is_const == rsrc.mods.is_const;
                }
                return false;
            }
            // void* bridges arbitrary primitive pointers
            if self.is_void_ptr(rsink) || self.is_void_ptr(rsrc) {
                return true;
            }
        }
        false
    }

    // ── naming ──────────────────────────────────────────────────────

    /// Unqualified, undecorated name of a type (spec types use their
    /// target's name).
    #[must_use]
    pub fn base_name(&self, id: TypeId, model: &ApiModel) -> String {
        match self.kind(id) {
            TypeKind::Bottom => "bottom".to_string(),
            TypeKind::Primitive(p) => p.name().to_string(),
            TypeKind::Enum(e) => model.enum_model(*e).qualified_name.clone(),
            TypeKind::Class(c) => model.class(*c).qualified_name.clone(),
            TypeKind::TemplateParam(name) => name.clone(),
            TypeKind::Container(c) => c.desc().name.to_string(),
            TypeKind::Spec { target, .. } => self.base_name(*target, model),
        }
    }

    /// Default variable stem: simple name, lowercased, non-alphabetic
    /// characters stripped. The emitter appends an ordinal.
    #[must_use]
    pub fn default_var_name(&self, t: TypeWithMods, model: &ApiModel) -> String {
        let full = self.base_name(t.ty, model);
        let simple = full.rsplit("::").next().unwrap_or(&full);
        let cleaned: String = simple
            .chars()
            .filter(char::is_ascii_alphabetic)
            .collect::<String>()
            .to_lowercase();
        if cleaned.is_empty() {
            "v".to_string()
        } else {
            cleaned
        }
    }

    fn display_args(&self, args: &[TemplateArg], model: &ApiModel) -> String {
        if args.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = args
            .iter()
            .map(|a| match a {
                TemplateArg::Type(t) => self.cpp_string(*t, model),
                TemplateArg::Integral(n) => n.to_string(),
                TemplateArg::Nullptr => "nullptr".to_string(),
            })
            .collect();
        format!("<{}>", rendered.join(", "))
    }

    /// C++ spelling of a type. Templated classes need a context to
    /// recover their instantiation lists — use [`Self::cpp_string_in`]
    /// for those; here they render without arguments.
    #[must_use]
    pub fn cpp_string(&self, t: TypeWithMods, model: &ApiModel) -> String {
        self.render(t, model, None)
    }

    /// C++ spelling of a type, resolving templated-class instantiation
    /// lists through the given context.
    pub fn cpp_string_in(
        &self,
        t: TypeWithMods,
        model: &ApiModel,
        ctx: &mut TemplateContext,
        rng: &mut Rng,
    ) -> String {
        self.render(t, model, Some((ctx, rng)))
    }

    fn render(
        &self,
        t: TypeWithMods,
        model: &ApiModel,
        ctx: Option<(&mut TemplateContext, &mut Rng)>,
    ) -> String {
        let mut inst = String::new();
        let mut is_struct = false;
        match self.kind(t.ty) {
            TypeKind::Class(cid) => {
                let class = model.class(*cid);
                is_struct = class.variant == crate::model::ClassVariant::Struct;
                if class.is_templated() {
                    if let Some((ctx, rng)) = ctx {
                        let args = ctx.inst_list_for_class(class, self, rng);
                        inst = self.display_args(&args, model);
                    }
                }
            }
            TypeKind::Spec { args, .. } => {
                inst = self.display_args(args, model);
            }
            _ => {}
        }

        let mut out = String::new();
        if t.mods.is_const {
            out.push_str("const ");
        }
        if t.mods.is_unsigned {
            out.push_str("unsigned ");
        }
        if is_struct {
            out.push_str("struct ");
        }
        out.push_str(&self.base_name(t.ty, model));
        out.push_str(&inst);

        let depth = t.mods.indirection_depth();
        if depth > 0 {
            for _ in 0..depth {
                out.push('*');
            }
        } else if t.mods.lvalue_ref {
            out.push('&');
        } else if t.mods.rvalue_ref {
            out.push_str("&&");
        }
        if t.mods.is_pointer() && t.mods.const_on_pointer {
            out.push_str(" const");
        }
        out
    }
}
