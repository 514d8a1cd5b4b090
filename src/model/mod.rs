//! Static model of the target library's public API
//!
//! Everything the generator knows about the library under test lives
//! here: classes with their fields and template parameters, enums,
//! callable executables (methods, constructors, static factories, free
//! functions), and the inheritance graph. The model is produced once at
//! startup — from the JSON hand-off file written by the header analyzer
//! (see [`load`]) — and is immutable for the rest of the run.
//!
//! Model objects are arena-stored and referred to by integer handles
//! ([`ClassId`], [`EnumId`], [`ExecId`]), which keeps the inheritance
//! back-edges cycle-free and makes lookups O(1).

pub mod analysis;
pub mod load;

use std::collections::BTreeSet;

use crate::types::{TypeTable, TypeWithMods};

/// Handle of a class in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub u32);

/// Handle of an enum in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumId(pub u32);

/// Handle of an executable in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExecId(pub u32);

/// Kind of one template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateParamKind {
    /// `typename T`
    Type,
    /// non-type parameter, e.g. `int N`
    NonType,
}

/// One declared template parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParam {
    /// Parameter identifier as written (`T`, `K`, `N`, ...)
    pub name: String,
    /// Position in the declaration list
    pub pos: u32,
    /// Type or non-type parameter
    pub kind: TemplateParamKind,
}

impl TemplateParam {
    /// Convenience constructor for a `typename` parameter.
    #[must_use]
    pub fn type_param(name: impl Into<String>, pos: u32) -> Self {
        Self {
            name: name.into(),
            pos,
            kind: TemplateParamKind::Type,
        }
    }
}

/// A class field as seen from outside: name, type, visibility.
#[derive(Debug, Clone)]
pub struct FieldModel {
    /// Field identifier
    pub name: String,
    /// Declared type
    pub ty: TypeWithMods,
    /// Whether the field is publicly accessible
    pub is_public: bool,
}

/// `class` vs `struct` declaration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassVariant {
    /// Declared with `class`
    Class,
    /// Declared with `struct`
    Struct,
}

/// Model of one user-defined class.
#[derive(Debug, Clone)]
pub struct ClassModel {
    /// Simple name (no namespace qualifier)
    pub name: String,
    /// Fully qualified name
    pub qualified_name: String,
    /// `class` or `struct`
    pub variant: ClassVariant,
    /// Template parameter list; empty for non-templated classes
    pub template_params: Vec<TemplateParam>,
    /// Field descriptors
    pub fields: Vec<FieldModel>,
    /// Whether a public copy constructor exists
    pub has_public_copy_ctor: bool,
}

impl ClassModel {
    /// Whether the class declares template parameters.
    #[must_use]
    pub fn is_templated(&self) -> bool {
        !self.template_params.is_empty()
    }

    /// Whether every field is public (aggregate-initializable shape).
    #[must_use]
    pub fn all_fields_public(&self) -> bool {
        self.fields.iter().all(|f| f.is_public)
    }
}

/// Model of one enum: qualified name plus ordered variant identifiers.
#[derive(Debug, Clone)]
pub struct EnumModel {
    /// Simple name
    pub name: String,
    /// Fully qualified name
    pub qualified_name: String,
    /// Variant identifiers in declaration order
    pub variants: Vec<String>,
}

/// Constructor vs. plain callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecKind {
    /// A class constructor
    Constructor,
    /// Any other callable (member method, static member, free function)
    Method,
}

/// How a creator produces an instance of its target class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorKind {
    /// Direct constructor
    Constructor,
    /// Static member returning an instance (possibly of another class)
    StaticFactory,
    /// Method filling an output reference argument; declared but not
    /// supported by operand resolution
    MethodWithOutputRef,
}

/// Creator annotation on an executable. `target_class` may differ from
/// the owner (a factory on class `A` returning `B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatorInfo {
    /// How the instance is produced
    pub kind: CreatorKind,
    /// The class whose instances this creator yields
    pub target_class: ClassId,
}

/// A callable the generator may emit a call to.
#[derive(Debug, Clone)]
pub struct Executable {
    /// Simple name (no qualifier); empty-ish conversions use `operator T`
    pub name: String,
    /// Fully qualified name
    pub qualified_name: String,
    /// Mangled symbol, when the analyzer could produce one
    pub mangled_name: Option<String>,
    /// Constructor or plain callable
    pub kind: ExecKind,
    /// Owning class; `None` for free functions
    pub owner: Option<ClassId>,
    /// Return type; absent only for constructors
    pub ret: Option<TypeWithMods>,
    /// Declared argument types, in order
    pub args: Vec<TypeWithMods>,
    /// False for static members and free functions
    pub requires_invoking_obj: bool,
    /// Generic parameter list of the executable itself
    pub template_params: Vec<TemplateParam>,
    /// Whether this is a conversion operator
    pub is_conversion: bool,
    /// Set by analysis when the executable cannot be driven
    pub excluded: bool,
    /// Present when this executable produces instances of some class
    pub creator: Option<CreatorInfo>,
}

impl Executable {
    /// Plain member method (instance method unless `is_static`).
    #[must_use]
    pub fn method(
        owner: ClassId,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        ret: TypeWithMods,
        args: Vec<TypeWithMods>,
        is_static: bool,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            mangled_name: None,
            kind: ExecKind::Method,
            owner: Some(owner),
            ret: Some(ret),
            args,
            requires_invoking_obj: !is_static,
            template_params: Vec::new(),
            is_conversion: false,
            excluded: false,
            creator: None,
        }
    }

    /// Free function.
    #[must_use]
    pub fn free_function(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        ret: TypeWithMods,
        args: Vec<TypeWithMods>,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            mangled_name: None,
            kind: ExecKind::Method,
            owner: None,
            ret: Some(ret),
            args,
            requires_invoking_obj: false,
            template_params: Vec::new(),
            is_conversion: false,
            excluded: false,
            creator: None,
        }
    }

    /// Constructor of `owner`; implicitly a creator targeting `owner`.
    #[must_use]
    pub fn constructor(
        owner: ClassId,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        args: Vec<TypeWithMods>,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            mangled_name: None,
            kind: ExecKind::Constructor,
            owner: Some(owner),
            ret: None,
            args,
            requires_invoking_obj: false,
            template_params: Vec::new(),
            is_conversion: false,
            excluded: false,
            creator: Some(CreatorInfo {
                kind: CreatorKind::Constructor,
                target_class: owner,
            }),
        }
    }

    /// Static factory on `owner` producing `target` instances.
    #[must_use]
    pub fn static_factory(
        owner: ClassId,
        target: ClassId,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        ret: TypeWithMods,
        args: Vec<TypeWithMods>,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            mangled_name: None,
            kind: ExecKind::Method,
            owner: Some(owner),
            ret: Some(ret),
            args,
            requires_invoking_obj: false,
            template_params: Vec::new(),
            is_conversion: false,
            excluded: false,
            creator: Some(CreatorInfo {
                kind: CreatorKind::StaticFactory,
                target_class: target,
            }),
        }
    }

    /// Attach a mangled symbol (builder style).
    #[must_use]
    pub fn with_mangled_name(mut self, mangled: impl Into<String>) -> Self {
        self.mangled_name = Some(mangled.into());
        self
    }

    /// Attach template parameters (builder style).
    #[must_use]
    pub fn with_template_params(mut self, params: Vec<TemplateParam>) -> Self {
        self.template_params = params;
        self
    }

    /// Whether this executable belongs to a class.
    #[must_use]
    pub fn is_member(&self) -> bool {
        self.owner.is_some()
    }

    /// Whether this executable declares its own template parameters.
    #[must_use]
    pub fn is_templated(&self) -> bool {
        !self.template_params.is_empty()
    }

    /// Whether this executable produces class instances.
    #[must_use]
    pub fn is_creator(&self) -> bool {
        self.creator.is_some()
    }
}

/// Directed inheritance graph with precomputed transitive closures.
#[derive(Debug, Clone, Default)]
pub struct InheritanceModel {
    parents: Vec<BTreeSet<ClassId>>,
    bases_closure: Vec<BTreeSet<ClassId>>,
    subclasses_closure: Vec<BTreeSet<ClassId>>,
}

impl InheritanceModel {
    fn build(class_count: usize, edges: &[(ClassId, ClassId)]) -> Self {
        let mut parents = vec![BTreeSet::new(); class_count];
        for &(child, parent) in edges {
            parents[child.0 as usize].insert(parent);
        }

        let mut bases_closure: Vec<BTreeSet<ClassId>> = vec![BTreeSet::new(); class_count];
        for start in 0..class_count {
            let mut stack: Vec<ClassId> = parents[start].iter().copied().collect();
            while let Some(p) = stack.pop() {
                if bases_closure[start].insert(p) {
                    stack.extend(parents[p.0 as usize].iter().copied());
                }
            }
        }

        let mut subclasses_closure: Vec<BTreeSet<ClassId>> = vec![BTreeSet::new(); class_count];
        for (child, bases) in bases_closure.iter().enumerate() {
            for base in bases {
                subclasses_closure[base.0 as usize].insert(ClassId(child as u32));
            }
        }

        Self {
            parents,
            bases_closure,
            subclasses_closure,
        }
    }

    /// Direct parents of `c`.
    #[must_use]
    pub fn parents(&self, c: ClassId) -> &BTreeSet<ClassId> {
        &self.parents[c.0 as usize]
    }

    /// All transitive base classes of `c`.
    #[must_use]
    pub fn bases(&self, c: ClassId) -> &BTreeSet<ClassId> {
        &self.bases_closure[c.0 as usize]
    }

    /// All transitive subclasses of `c`.
    #[must_use]
    pub fn subclasses(&self, c: ClassId) -> &BTreeSet<ClassId> {
        &self.subclasses_closure[c.0 as usize]
    }

    /// Whether `candidate` is `parent` itself or a recorded subclass.
    #[must_use]
    pub fn is_subclass_of(&self, parent: ClassId, candidate: ClassId) -> bool {
        parent == candidate || self.subclasses(parent).contains(&candidate)
    }
}

/// The complete, immutable API model for a run.
#[derive(Debug, Clone, Default)]
pub struct ApiModel {
    classes: Vec<ClassModel>,
    enums: Vec<EnumModel>,
    executables: Vec<Executable>,
    creator_ids: Vec<ExecId>,
    inheritance: InheritanceModel,
}

impl ApiModel {
    /// Class record for a handle.
    #[must_use]
    pub fn class(&self, id: ClassId) -> &ClassModel {
        &self.classes[id.0 as usize]
    }

    /// Enum record for a handle.
    #[must_use]
    pub fn enum_model(&self, id: EnumId) -> &EnumModel {
        &self.enums[id.0 as usize]
    }

    /// Executable record for a handle.
    #[must_use]
    pub fn executable(&self, id: ExecId) -> &Executable {
        &self.executables[id.0 as usize]
    }

    /// All classes with handles.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassModel)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId(i as u32), c))
    }

    /// All executables with handles.
    pub fn executables(&self) -> impl Iterator<Item = (ExecId, &Executable)> {
        self.executables
            .iter()
            .enumerate()
            .map(|(i, e)| (ExecId(i as u32), e))
    }

    /// Non-excluded creator executables.
    pub fn creators(&self) -> impl Iterator<Item = (ExecId, &Executable)> {
        self.creator_ids
            .iter()
            .filter(|id| !self.executable(**id).excluded)
            .map(|id| (*id, self.executable(*id)))
    }

    /// The inheritance graph.
    #[must_use]
    pub fn inheritance(&self) -> &InheritanceModel {
        &self.inheritance
    }

    /// Look up a class handle by qualified name.
    #[must_use]
    pub fn class_by_qualified_name(&self, qual_name: &str) -> Option<ClassId> {
        self.classes()
            .find(|(_, c)| c.qualified_name == qual_name)
            .map(|(id, _)| id)
    }

    /// Number of classes in the arena.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Mark an executable excluded (analysis use).
    pub(crate) fn set_excluded(&mut self, id: ExecId, excluded: bool) {
        self.executables[id.0 as usize].excluded = excluded;
    }
}

/// Builder assembling an [`ApiModel`] together with its [`TypeTable`].
///
/// Classes and enums must be registered before any executable whose
/// signature mentions them, because signatures are interned type values.
#[derive(Debug)]
pub struct ModelBuilder {
    classes: Vec<ClassModel>,
    enums: Vec<EnumModel>,
    executables: Vec<Executable>,
    inheritance_edges: Vec<(ClassId, ClassId)>,
    types: TypeTable,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    /// Fresh builder with an empty model and a pre-seeded type table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            enums: Vec::new(),
            executables: Vec::new(),
            inheritance_edges: Vec::new(),
            types: TypeTable::new(),
        }
    }

    /// Register a class and intern its type.
    pub fn add_class(&mut self, class: ClassModel) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(class);
        self.types.install_class(id);
        id
    }

    /// Register an enum and intern its type.
    pub fn add_enum(&mut self, e: EnumModel) -> EnumId {
        let id = EnumId(self.enums.len() as u32);
        self.enums.push(e);
        self.types.install_enum(id);
        id
    }

    /// Register an executable.
    pub fn add_executable(&mut self, exec: Executable) -> ExecId {
        let id = ExecId(self.executables.len() as u32);
        self.executables.push(exec);
        id
    }

    /// Record `child` inheriting from `parent`.
    pub fn add_inheritance(&mut self, child: ClassId, parent: ClassId) {
        self.inheritance_edges.push((child, parent));
    }

    /// Mutable access to the type table, for composing signature types.
    pub fn types(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    /// Class record registered so far (signature helpers need names).
    #[must_use]
    pub fn class(&self, id: ClassId) -> &ClassModel {
        &self.classes[id.0 as usize]
    }

    /// Replace a previously registered class record; the loader fills
    /// in fields after every class name is known.
    pub fn replace_class(&mut self, id: ClassId, class: ClassModel) {
        self.classes[id.0 as usize] = class;
    }

    /// Finish: compute closures and hand out the model plus type table.
    #[must_use]
    pub fn build(self) -> (ApiModel, TypeTable) {
        let inheritance = InheritanceModel::build(self.classes.len(), &self.inheritance_edges);
        let creator_ids = self
            .executables
            .iter()
            .enumerate()
            .filter(|(_, e)| e.creator.is_some())
            .map(|(i, _)| ExecId(i as u32))
            .collect();
        (
            ApiModel {
                classes: self.classes,
                enums: self.enums,
                executables: self.executables,
                creator_ids,
                inheritance,
            },
            self.types,
        )
    }
}
