//! Two-pass checker.
//!
//! Pass 1 registers every name of the unit (aliases, schemas, component
//! definitions, functions, instances, typed inputs/outputs/vars) so that pass 2
//! can resolve forward references by lookup. Pass 2 runs the decorator
//! pipeline, checks initialisers and links dependency edges. Finalisation
//! cycle-checks every graph and computes evaluation orders.

use crate::decorators::{
    int_arg, positional, str_of, tags, DecoratorRegistry, DependencyRef, ImportRef, Site, Target,
};
use crate::env::{EnvError, ScopeId, TypeEnv};
use crate::error::{CheckError, Diagnostics};
use crate::graph::{CycleError, DependencyGraph, EdgeKind};
use crate::program::{CheckedProgram, DeferredCheck, ExistingRef, InstanceInfo, InstanceKind};
use crate::types::{ComponentType, Fields, ResourceType, SchemaType, Type, ValueType};
use crate::value::Value;
use cirrus_ast::ast::{
    Annotation, BinOp, ComponentDecl, Decl, Expr, FunDecl, Ident, InputDecl, InstanceDecl, Lit,
    OutputDecl, Program, PropertyInit, ResourceDecl, SchemaDecl, TypeAliasDecl, TypeExpr, UnOp,
    VarDecl,
};
use cirrus_ast::span::Span;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Checker limits and switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Deepest expression nesting accepted before giving up.
    pub max_expr_depth: u32,
    /// Run deferred decorator checks against literal defaults after checking.
    pub validate_defaults: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_expr_depth: 512,
            validate_defaults: true,
        }
    }
}

/// Type checker over one compilation unit.
///
/// Holds no per-program state: every call to [`TypeChecker::check_program`]
/// starts from a fresh environment and graph.
#[derive(Debug, Clone, Default)]
pub struct TypeChecker {
    registry: DecoratorRegistry,
    config: CheckerConfig,
}

impl TypeChecker {
    /// Checker with the built-in decorators and default limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: DecoratorRegistry) -> Self {
        Self {
            registry,
            config: CheckerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CheckerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &DecoratorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a whole program. Every error found is reported; a program is only
    /// returned when there are none.
    pub fn check_program(&self, program: &Program) -> Result<CheckedProgram, Diagnostics> {
        let mut session = Session::new(&self.registry, &self.config);

        debug!(declarations = program.items.len(), "registration pass");
        session.shape_walk(&program.items);
        session.register_scope(&program.items);

        debug!("checking pass");
        session.check_decls(&program.items);

        debug!("finalising dependency graphs");
        let (order, component_orders) = session.finalize();

        if !session.errors.is_empty() {
            debug!(errors = session.errors.len(), "check failed");
            return Err(Diagnostics(session.errors));
        }

        let component_scopes = session
            .components
            .iter()
            .map(|(name, info)| (name.clone(), info.scope))
            .collect();
        let checked = CheckedProgram {
            env: session.env,
            instances: session.instances,
            order,
            component_orders,
            component_scopes,
            deferred: session.deferred,
        };
        if self.config.validate_defaults {
            checked.validate_defaults()?;
        }
        Ok(checked)
    }
}

struct ComponentInfo<'a> {
    decl: &'a ComponentDecl,
    scope: ScopeId,
    /// Component definitions instantiated in the body.
    uses: IndexSet<String>,
    /// Global instances the body reads or depends on.
    externals: IndexSet<String>,
    /// Global instances of this component.
    instances: Vec<String>,
}

/// Where initialisers are being checked, for messages and edges.
struct InitTarget<'s> {
    instance: &'s str,
    what: String,
    owner: String,
    /// `property` or `input`
    field: &'static str,
    span: Span,
}

struct Unit {
    /// `None` for the top level.
    component: Option<String>,
    graph: DependencyGraph,
}

/// Mutable state of one `check_program` call.
struct Session<'a> {
    registry: &'a DecoratorRegistry,
    config: &'a CheckerConfig,
    env: TypeEnv,
    errors: Vec<CheckError>,
    /// Annotation lists whose pipeline already stopped at the shape stage,
    /// keyed by the span of their first annotation.
    halted: HashSet<Span>,
    /// Declarations that made it into the environment in pass 1, keyed by
    /// the span of their name.
    registered: HashSet<Span>,
    aliases: HashSet<(ScopeId, String)>,
    schemas: HashMap<(ScopeId, String), &'a SchemaDecl>,
    components: IndexMap<String, ComponentInfo<'a>>,
    units: IndexMap<ScopeId, Unit>,
    instances: IndexMap<String, InstanceInfo>,
    deferred: Vec<DeferredCheck>,
    /// Scope owning the graph currently being built.
    unit: ScopeId,
    /// Component definition whose body is being visited.
    component: Option<String>,
    /// Instance whose initialiser is being checked.
    reader: Option<String>,
    depth: u32,
}

impl<'a> Session<'a> {
    fn new(registry: &'a DecoratorRegistry, config: &'a CheckerConfig) -> Self {
        let mut units = IndexMap::new();
        units.insert(
            ScopeId::GLOBAL,
            Unit {
                component: None,
                graph: DependencyGraph::new(),
            },
        );
        Self {
            registry,
            config,
            env: TypeEnv::new(),
            errors: Vec::new(),
            halted: HashSet::new(),
            registered: HashSet::new(),
            aliases: HashSet::new(),
            schemas: HashMap::new(),
            components: IndexMap::new(),
            units,
            instances: IndexMap::new(),
            deferred: Vec::new(),
            unit: ScopeId::GLOBAL,
            component: None,
            reader: None,
            depth: 0,
        }
    }

    /// Empty lists count as halted: there is nothing to run.
    fn is_halted(&self, annotations: &[Annotation]) -> bool {
        annotations
            .first()
            .map_or(true, |first| self.halted.contains(&first.span))
    }

    fn error(&mut self, err: CheckError) {
        trace!(error = %err, "diagnostic");
        self.errors.push(err);
    }

    fn env_error(err: EnvError, span: Span) -> CheckError {
        match err {
            EnvError::NotFound(name) => CheckError::NotFound { name, span },
            EnvError::DeclarationExists(name) => CheckError::DeclarationExists { name, span },
        }
    }

    /// Bind `name` in the current scope, reporting duplicates.
    fn declare(&mut self, name: &Ident, ty: Type) -> bool {
        match self.env.init(&name.text, ty) {
            Ok(()) => true,
            Err(e) => {
                self.error(Self::env_error(e, name.span));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 1: shapes and registration
    // ------------------------------------------------------------------

    /// Shape-check every annotation before any symbol is resolved.
    fn shape_walk(&mut self, decls: &'a [Decl]) {
        for decl in decls {
            self.shape_check(decl.annotations());
            match decl {
                Decl::Schema(s) => {
                    for prop in &s.properties {
                        self.shape_check(&prop.annotations);
                    }
                }
                Decl::Component(c) => self.shape_walk(&c.body),
                _ => {}
            }
        }
    }

    fn shape_check(&mut self, annotations: &'a [Annotation]) {
        let registry = self.registry;
        for ann in annotations {
            let result = match registry.get(&ann.name.text) {
                Some(d) => d.shape_check(ann),
                None => Err(CheckError::type_error(
                    format!("unknown decorator @{}", ann.name.text),
                    ann.name.span,
                )),
            };
            if let Err(e) = result {
                self.error(e);
                if let Some(first) = annotations.first() {
                    self.halted.insert(first.span);
                }
                return;
            }
        }
    }

    /// Register the names of one scope.
    fn register_scope(&mut self, decls: &'a [Decl]) {
        self.declare_schemas(decls);
        self.register_aliases(decls);
        self.fill_schemas(decls);
        if self.component.is_none() {
            self.register_components(decls);
        }
        self.register_members(decls);
    }

    fn declare_schemas(&mut self, decls: &'a [Decl]) {
        for decl in decls {
            if let Decl::Schema(s) = decl {
                let ty = Type::Schema(SchemaType {
                    name: s.name.text.clone(),
                    ..SchemaType::default()
                });
                if self.declare(&s.name, ty) {
                    self.registered.insert(decl.name().span);
                    self.schemas
                        .insert((self.env.current(), s.name.text.clone()), s);
                }
            }
        }
    }

    /// Aliases may refer to each other in any order; resolve until no
    /// progress is made, then report what is left.
    fn register_aliases(&mut self, decls: &'a [Decl]) {
        let mut pending: Vec<&TypeAliasDecl> = decls
            .iter()
            .filter_map(|d| match d {
                Decl::TypeAlias(a) => Some(a),
                _ => None,
            })
            .collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut stuck = Vec::new();
            for alias in pending {
                match self.resolve_type(&alias.ty) {
                    Ok(ty) => {
                        if self.declare(&alias.name, ty) {
                            self.aliases
                                .insert((self.env.current(), alias.name.text.clone()));
                        }
                    }
                    Err(_) => stuck.push(alias),
                }
            }
            if stuck.len() == before {
                for alias in stuck {
                    if let Err(e) = self.resolve_type(&alias.ty) {
                        self.error(e);
                    }
                }
                break;
            }
            pending = stuck;
        }
    }

    fn fill_schemas(&mut self, decls: &'a [Decl]) {
        for decl in decls {
            let Decl::Schema(s) = decl else { continue };
            if !self.registered.contains(&decl.name().span) {
                continue;
            }
            let mut properties = Fields::new();
            for prop in &s.properties {
                if properties.contains_key(&prop.name.text) {
                    self.error(CheckError::DeclarationExists {
                        name: prop.name.text.clone(),
                        span: prop.name.span,
                    });
                    continue;
                }
                let ty = self.resolve_type(&prop.ty).unwrap_or_else(|e| {
                    self.errors.push(e);
                    Type::any()
                });
                properties.insert(prop.name.text.clone(), ty);
            }
            if let Some(Type::Schema(schema)) = self.env.get_mut(&s.name.text) {
                schema.properties = properties;
            }
        }
    }

    /// Component definitions are registered in two steps so that bodies may
    /// instantiate components declared later: signatures first, then bodies.
    fn register_components(&mut self, decls: &'a [Decl]) {
        let mut defined = Vec::new();
        for decl in decls {
            let Decl::Component(c) = decl else { continue };
            let scope = self.env.new_child(Some(&c.name.text));
            let prev = self.env.enter(scope);
            self.declare_schemas(&c.body);
            self.register_aliases(&c.body);
            self.fill_schemas(&c.body);
            let mut inputs = Fields::new();
            let mut outputs = Fields::new();
            for member in &c.body {
                match member {
                    Decl::Input(i) => {
                        let ty = self.resolve_type(&i.ty).unwrap_or_else(|_| Type::any());
                        inputs.insert(i.name.text.clone(), ty);
                    }
                    Decl::Output(o) => {
                        let ty = self.resolve_type(&o.ty).unwrap_or_else(|_| Type::any());
                        outputs.insert(o.name.text.clone(), ty);
                    }
                    Decl::Component(nested) => self.error(CheckError::type_error(
                        format!(
                            "component definitions cannot be nested ('{}' is declared inside '{}')",
                            nested.name.text, c.name.text
                        ),
                        nested.name.span,
                    )),
                    _ => {}
                }
            }
            self.env.enter(prev);

            let ty = Type::Component(ComponentType {
                name: c.name.text.clone(),
                instance: None,
                inputs,
                outputs,
                nested: Vec::new(),
            });
            if self.declare(&c.name, ty) {
                self.registered.insert(decl.name().span);
                self.components.insert(
                    c.name.text.clone(),
                    ComponentInfo {
                        decl: c,
                        scope,
                        uses: IndexSet::new(),
                        externals: IndexSet::new(),
                        instances: Vec::new(),
                    },
                );
                self.units.insert(
                    scope,
                    Unit {
                        component: Some(c.name.text.clone()),
                        graph: DependencyGraph::new(),
                    },
                );
                defined.push((c, scope));
            }
        }

        for (c, scope) in defined {
            trace!(component = %c.name.text, "registering component body");
            let prev = self.env.enter(scope);
            let prev_unit = std::mem::replace(&mut self.unit, scope);
            self.component = Some(c.name.text.clone());
            self.register_members(&c.body);
            let nested: Vec<Type> = self
                .env
                .bindings(scope)
                .filter(|(_, ty)| ty.instance_name().is_some())
                .map(|(_, ty)| ty.clone())
                .collect();
            self.component = None;
            self.unit = prev_unit;
            self.env.enter(prev);
            if let Some(Type::Component(def)) = self.env.get_mut(&c.name.text) {
                def.nested = nested;
            }
        }
    }

    /// Functions, instances and typed inputs/outputs/vars.
    fn register_members(&mut self, decls: &'a [Decl]) {
        for decl in decls {
            let ok = match decl {
                Decl::Fun(f) => self.register_fun(f),
                Decl::Input(i) => self.register_typed(&i.name, &i.ty),
                Decl::Output(o) => self.register_typed(&o.name, &o.ty),
                Decl::Var(VarDecl {
                    ty: Some(ty), name, ..
                }) => self.register_typed(name, ty),
                Decl::Resource(r) => self.register_resource(r),
                Decl::Instance(i) => self.register_instance(i),
                _ => false,
            };
            if ok {
                self.registered.insert(decl.name().span);
            }
        }
    }

    fn register_typed(&mut self, name: &Ident, ty: &TypeExpr) -> bool {
        match self.resolve_type(ty) {
            Ok(ty) => self.declare(name, ty),
            Err(e) => {
                self.error(e);
                false
            }
        }
    }

    fn register_fun(&mut self, f: &FunDecl) -> bool {
        let mut params = Vec::new();
        for p in &f.params {
            match self.resolve_type(&p.ty) {
                Ok(ty) => params.push(ty),
                Err(e) => {
                    self.error(e);
                    return false;
                }
            }
        }
        let ret = match &f.ret {
            Some(t) => match self.resolve_type(t) {
                Ok(ty) => ty,
                Err(e) => {
                    self.error(e);
                    return false;
                }
            },
            // refined from the body in pass 2
            None => Type::any(),
        };
        self.declare(&f.name, Type::function(params, ret))
    }

    fn register_resource(&mut self, r: &ResourceDecl) -> bool {
        let schema = match self.env.lookup(&r.schema.text).cloned() {
            Ok(Type::Schema(s)) => s,
            Ok(other) => {
                let msg = format!(
                    "resource '{}' names '{}' which is {}, not a schema",
                    r.name.text, r.schema.text, other
                );
                self.error(CheckError::type_error(msg, r.schema.span));
                return false;
            }
            Err(e) => {
                self.error(Self::env_error(e, r.schema.span));
                return false;
            }
        };
        let resource = ResourceType {
            name: r.name.text.clone(),
            schema: schema.name.clone(),
            properties: schema.properties.clone(),
        };
        if !self.declare(&r.name, Type::Resource(resource.clone())) {
            return false;
        }
        if let Some(Type::Schema(s)) = self.env.get_mut(&r.schema.text) {
            s.instances.insert(r.name.text.clone(), resource);
        }
        self.add_instance(
            &r.name,
            InstanceKind::Resource {
                schema: schema.name,
            },
            r.span,
        );
        true
    }

    fn register_instance(&mut self, i: &InstanceDecl) -> bool {
        let def = match self.env.lookup(&i.component.text).cloned() {
            Ok(Type::Component(c)) if c.is_definition() => c,
            Ok(other) => {
                let msg = format!(
                    "'{}' is {}, not a component definition",
                    i.component.text, other
                );
                self.error(CheckError::type_error(msg, i.component.span));
                return false;
            }
            Err(e) => {
                self.error(Self::env_error(e, i.component.span));
                return false;
            }
        };
        if !self.declare(&i.name, Type::Component(def.instantiate(&i.name.text))) {
            return false;
        }
        let qualified = self.add_instance(
            &i.name,
            InstanceKind::Component {
                component: def.name.clone(),
            },
            i.span,
        );
        match self.component.clone() {
            Some(outer) => {
                if let Some(info) = self.components.get_mut(&outer) {
                    info.uses.insert(def.name.clone());
                }
            }
            None => {
                if let Some(info) = self.components.get_mut(&def.name) {
                    info.instances.push(qualified);
                }
            }
        }
        true
    }

    /// Record an instance and its graph node; returns the qualified name.
    fn add_instance(&mut self, name: &Ident, kind: InstanceKind, span: Span) -> String {
        let qualified = self.env.qualify(self.env.current(), &name.text);
        trace!(instance = %qualified, "registered instance");
        if let Some(unit) = self.units.get_mut(&self.unit) {
            unit.graph.add_node(&qualified);
        }
        self.instances.insert(
            qualified.clone(),
            InstanceInfo {
                name: qualified.clone(),
                kind,
                component: self.component.clone(),
                dependencies: IndexSet::new(),
                tags: IndexMap::new(),
                providers: IndexSet::new(),
                count: None,
                existing: None,
                span,
            },
        );
        qualified
    }

    fn resolve_type(&self, ty: &TypeExpr) -> Result<Type, CheckError> {
        match ty {
            TypeExpr::Named(id) => {
                if let Some(v) = ValueType::from_keyword(&id.text) {
                    return Ok(Type::Value(v));
                }
                if id.text == "object" {
                    return Ok(Type::Object(Fields::new()));
                }
                let (scope, found) = self
                    .env
                    .resolve(&id.text)
                    .map_err(|e| Self::env_error(e, id.span))?;
                if self.aliases.contains(&(scope, id.text.clone())) {
                    return Ok(found.clone());
                }
                match found {
                    Type::Schema(_) => Ok(found.clone()),
                    Type::Component(c) if c.is_definition() => Ok(found.clone()),
                    _ => Err(CheckError::type_error(
                        format!("'{}' is not a type", id.text),
                        id.span,
                    )),
                }
            }
            TypeExpr::Array { elem, .. } => Ok(Type::array(self.resolve_type(elem)?)),
            TypeExpr::Union { variants, .. } => {
                let resolved = variants
                    .iter()
                    .map(|v| self.resolve_type(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::union(resolved))
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2: decorators, initialisers, linking
    // ------------------------------------------------------------------

    fn check_decls(&mut self, decls: &'a [Decl]) {
        for decl in decls {
            trace!(decl = %decl.name().text, "checking declaration");
            let registered = self.registered.contains(&decl.name().span);
            match decl {
                Decl::Schema(s) if registered => self.check_schema(s),
                Decl::Resource(r) if registered => self.check_resource(r),
                Decl::Component(c) if registered => self.check_component(c),
                Decl::Instance(i) if registered => self.check_instance(i),
                Decl::Input(i) if registered => self.check_input(i),
                Decl::Output(o) if registered => self.check_output(o),
                Decl::Var(v) => self.check_var(v, registered),
                Decl::Fun(f) if registered => self.check_fun(f),
                Decl::TypeAlias(a) => self.check_alias(a),
                _ => {}
            }
        }
    }

    /// Run target and type checks of every decorator on one declaration,
    /// stopping at the first failure. Returns the `@dependsOn` references.
    fn run_decorators(
        &mut self,
        annotations: &'a [Annotation],
        site: Site<'_>,
        resolved: &Type,
        value: Option<&Expr>,
    ) -> Vec<DependencyRef> {
        let mut refs = Vec::new();
        if self.is_halted(annotations) {
            return refs;
        }
        let registry = self.registry;
        for ann in annotations {
            let Some(decorator) = registry.get(&ann.name.text) else {
                break;
            };
            let result = decorator
                .target_check(ann, &site, &mut refs)
                .and_then(|()| decorator.type_check(ann, &site, resolved));
            if let Err(e) = result {
                self.error(e);
                refs.clear();
                break;
            }
            if decorator.spec().deferred {
                self.deferred.push(DeferredCheck {
                    decorator: decorator.clone(),
                    args: ann.args.clone(),
                    target: self.env.qualify(self.env.current(), site.name),
                    default: value.and_then(Value::from_expr),
                    span: ann.span,
                });
            }
        }
        refs
    }

    fn check_schema(&mut self, s: &'a SchemaDecl) {
        let ty = self.env.get(&s.name.text).cloned().unwrap_or_else(Type::any);
        self.run_decorators(
            &s.annotations,
            Site {
                target: Target::Schema,
                name: &s.name.text,
                definition: false,
                span: s.span,
            },
            &ty,
            None,
        );
        let properties = match &ty {
            Type::Schema(schema) => schema.properties.clone(),
            _ => Fields::new(),
        };
        for prop in &s.properties {
            let prop_ty = properties
                .get(&prop.name.text)
                .cloned()
                .unwrap_or_else(Type::any);
            self.run_decorators(
                &prop.annotations,
                Site {
                    target: Target::SchemaProperty,
                    name: &prop.name.text,
                    definition: false,
                    span: prop.span,
                },
                &prop_ty,
                prop.default.as_ref(),
            );
            if let Some(default) = &prop.default {
                let what = format!("default of property '{}' in schema '{}'", prop.name.text, s.name.text);
                self.check_value(default, &prop_ty, &what);
            }
        }
    }

    fn check_resource(&mut self, r: &'a ResourceDecl) {
        let qualified = self.env.qualify(self.env.current(), &r.name.text);
        let ty = self.env.get(&r.name.text).cloned().unwrap_or_else(Type::any);
        let refs = self.run_decorators(
            &r.annotations,
            Site {
                target: Target::Resource,
                name: &r.name.text,
                definition: false,
                span: r.span,
            },
            &ty,
            None,
        );
        self.link_explicit(&qualified, refs);
        self.record_instance_decorators(&qualified, &r.annotations);

        let Type::Resource(resource) = ty else { return };
        let schema: Option<&'a SchemaDecl> = self
            .env
            .resolve(&r.schema.text)
            .ok()
            .and_then(|(scope, _)| self.schemas.get(&(scope, r.schema.text.clone())).copied());
        let required: Vec<&'a str> = schema
            .map(|decl| {
                decl.properties
                    .iter()
                    .filter(|p| p.default.is_none())
                    .map(|p| p.name.text.as_str())
                    .collect()
            })
            .unwrap_or_default();
        let target = InitTarget {
            instance: &qualified,
            what: format!("resource '{}'", r.name.text),
            owner: format!("schema '{}'", resource.schema),
            field: "property",
            span: r.span,
        };
        self.check_inits(&target, &r.body, &resource.properties, &required);
    }

    fn check_instance(&mut self, i: &'a InstanceDecl) {
        let qualified = self.env.qualify(self.env.current(), &i.name.text);
        let ty = self.env.get(&i.name.text).cloned().unwrap_or_else(Type::any);
        let refs = self.run_decorators(
            &i.annotations,
            Site {
                target: Target::Component,
                name: &i.name.text,
                definition: false,
                span: i.span,
            },
            &ty,
            None,
        );
        self.link_explicit(&qualified, refs);
        self.record_instance_decorators(&qualified, &i.annotations);

        let Type::Component(comp) = ty else { return };
        let definition: Option<&'a ComponentDecl> =
            self.components.get(&comp.name).map(|info| info.decl);
        let required: Vec<&'a str> = definition
            .map(|decl| {
                decl.body
                    .iter()
                    .filter_map(|d| match d {
                        Decl::Input(input) if input.default.is_none() => {
                            Some(input.name.text.as_str())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let target = InitTarget {
            instance: &qualified,
            what: format!("component instance '{}'", i.name.text),
            owner: format!("component '{}'", comp.name),
            field: "input",
            span: i.span,
        };
        self.check_inits(&target, &i.body, &comp.inputs, &required);
    }

    /// Check `name = value` initialisers against the declared fields. Reads of
    /// other instances in the values become implicit edges of the instance.
    fn check_inits(
        &mut self,
        target: &InitTarget<'_>,
        inits: &[PropertyInit],
        fields: &Fields,
        required: &[&str],
    ) {
        let InitTarget {
            what,
            owner,
            field: field_kind,
            ..
        } = target;
        let prev_reader = self.reader.replace(target.instance.to_string());
        let mut seen: HashSet<&str> = HashSet::new();
        for init in inits {
            let name = init.name.text.as_str();
            if !seen.insert(name) {
                self.error(CheckError::type_error(
                    format!("{} '{}' of {} is initialised more than once", field_kind, name, what),
                    init.name.span,
                ));
                continue;
            }
            match fields.get(name) {
                Some(expected) => {
                    let ctx = format!("{} '{}' of {}", field_kind, name, what);
                    self.check_value(&init.value, expected, &ctx);
                }
                None => {
                    self.error(CheckError::type_error(
                        format!("{} has no {} '{}'", owner, field_kind, name),
                        init.name.span,
                    ));
                    // still link whatever the value reads
                    let _ = self.infer(&init.value, None);
                }
            }
        }
        for missing in required.iter().filter(|r| !seen.contains(**r)) {
            self.error(CheckError::type_error(
                format!("{} is missing required {} '{}'", what, field_kind, missing),
                target.span,
            ));
        }
        self.reader = prev_reader;
    }

    /// Tags, providers, count and import reference of an instance.
    fn record_instance_decorators(&mut self, qualified: &str, annotations: &[Annotation]) {
        let Some(info) = self.instances.get_mut(qualified) else {
            return;
        };
        info.tags = tags::collect_tags(annotations);
        info.providers = tags::collect_providers(annotations);
        for ann in annotations {
            match ann.name.text.as_str() {
                "count" => info.count = int_arg(&ann.args).and_then(|n| u32::try_from(n).ok()),
                "existing" => {
                    if let Some(reference) = positional(&ann.args).and_then(str_of) {
                        info.existing = ImportRef::classify(reference).map(|kind| ExistingRef {
                            reference: reference.to_string(),
                            kind,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn check_component(&mut self, c: &'a ComponentDecl) {
        let ty = self.env.get(&c.name.text).cloned().unwrap_or_else(Type::any);
        self.run_decorators(
            &c.annotations,
            Site {
                target: Target::Component,
                name: &c.name.text,
                definition: true,
                span: c.span,
            },
            &ty,
            None,
        );
        let Some(scope) = self.components.get(&c.name.text).map(|i| i.scope) else {
            return;
        };
        let prev = self.env.enter(scope);
        let prev_unit = std::mem::replace(&mut self.unit, scope);
        self.component = Some(c.name.text.clone());
        // nested definitions were never registered and are skipped
        self.check_decls(&c.body);
        self.component = None;
        self.unit = prev_unit;
        self.env.enter(prev);
    }

    fn check_input(&mut self, i: &'a InputDecl) {
        let ty = self.env.get(&i.name.text).cloned().unwrap_or_else(Type::any);
        self.run_decorators(
            &i.annotations,
            Site {
                target: Target::Input,
                name: &i.name.text,
                definition: false,
                span: i.span,
            },
            &ty,
            i.default.as_ref(),
        );
        if let Some(default) = &i.default {
            self.check_value(default, &ty, &format!("default of input '{}'", i.name.text));
        }
    }

    fn check_output(&mut self, o: &'a OutputDecl) {
        let ty = self.env.get(&o.name.text).cloned().unwrap_or_else(Type::any);
        self.run_decorators(
            &o.annotations,
            Site {
                target: Target::Output,
                name: &o.name.text,
                definition: false,
                span: o.span,
            },
            &ty,
            o.value.as_ref(),
        );
        if let Some(value) = &o.value {
            self.check_value(value, &ty, &format!("output '{}'", o.name.text));
        }
    }

    /// Typed vars were registered in pass 1; untyped ones are declared here
    /// from their inferred type, so they cannot be referenced before this point.
    fn check_var(&mut self, v: &'a VarDecl, registered: bool) {
        let ty = match &v.ty {
            Some(_) if !registered => return,
            Some(_) => {
                let ty = self.env.get(&v.name.text).cloned().unwrap_or_else(Type::any);
                self.check_value(&v.value, &ty, &format!("var '{}'", v.name.text));
                ty
            }
            None => {
                let inferred = match self.infer(&v.value, None) {
                    Ok(ty) => ty,
                    Err(e) => {
                        self.error(e);
                        Type::any()
                    }
                };
                if !self.declare(&v.name, inferred.clone()) {
                    return;
                }
                inferred
            }
        };
        self.run_decorators(
            &v.annotations,
            Site {
                target: Target::Var,
                name: &v.name.text,
                definition: false,
                span: v.span,
            },
            &ty,
            Some(&v.value),
        );
    }

    fn check_fun(&mut self, f: &'a FunDecl) {
        let ty = self.env.get(&f.name.text).cloned().unwrap_or_else(Type::any);
        self.run_decorators(
            &f.annotations,
            Site {
                target: Target::Fun,
                name: &f.name.text,
                definition: false,
                span: f.span,
            },
            &ty,
            None,
        );
        let Type::Function { params, ret } = ty else {
            return;
        };
        let scope = self.env.new_child(None);
        let prev = self.env.enter(scope);
        for (param, param_ty) in f.params.iter().zip(&params) {
            self.declare(&param.name, param_ty.clone());
        }
        let body = match &f.ret {
            Some(_) => {
                self.check_value(&f.body, &ret, &format!("body of fun '{}'", f.name.text));
                None
            }
            None => match self.infer(&f.body, None) {
                Ok(inferred) => Some(inferred),
                Err(e) => {
                    self.error(e);
                    None
                }
            },
        };
        self.env.enter(prev);
        if let Some(inferred) = body {
            self.env.set(&f.name.text, Type::function(params, inferred));
        }
    }

    fn check_alias(&mut self, a: &TypeAliasDecl) {
        if let Some(first) = a.annotations.first() {
            if !self.is_halted(&a.annotations) {
                self.error(CheckError::type_error(
                    format!("decorators cannot be applied to type alias '{}'", a.name.text),
                    first.span,
                ));
            }
        }
    }

    // ------------------------------------------------------------------
    // Dependency linking
    // ------------------------------------------------------------------

    fn link_explicit(&mut self, dependent: &str, refs: Vec<DependencyRef>) {
        for r in refs {
            match self.resolve_reference(&r) {
                Ok((scope, target)) => {
                    self.depend(dependent, scope, target, EdgeKind::Explicit)
                }
                Err(e) => self.error(e),
            }
        }
    }

    /// Resolve `name` or `kind.name` to an instance against the completed
    /// name table. Anything unresolved is a type error.
    fn resolve_reference(&self, r: &DependencyRef) -> Result<(ScopeId, String), CheckError> {
        let shown = r.to_string();
        let (kind, name) = match r.path.as_slice() {
            [name] => (None, name),
            [kind, name] => (Some(kind), name),
            _ => {
                return Err(CheckError::type_error(
                    format!("@dependsOn reference {} must be a name or kind.name", shown),
                    r.span,
                ))
            }
        };
        let (scope, ty) = self.env.resolve(&name.text).map_err(|_| {
            CheckError::type_error(
                format!("@dependsOn reference {} is not declared", shown),
                r.span,
            )
        })?;
        let matches = match (ty, kind) {
            (Type::Resource(res), Some(k)) => res.schema == k.text,
            (Type::Component(c), Some(k)) => !c.is_definition() && c.name == k.text,
            (t, None) => t.instance_name().is_some(),
            _ => false,
        };
        if !matches {
            let expected = match kind {
                Some(k) => format!("an instance of {}", k.text),
                None => "a resource or component instance".to_string(),
            };
            return Err(CheckError::type_error(
                format!("@dependsOn reference {} does not name {}", shown, expected),
                r.span,
            ));
        }
        Ok((scope, self.env.qualify(scope, &name.text)))
    }

    /// Record that `dependent` needs `target` (declared in `scope`). Edges stay
    /// within one graph; a component body needing a global instance makes it
    /// an external dependency of the component instead.
    fn depend(&mut self, dependent: &str, scope: ScopeId, target: String, kind: EdgeKind) {
        if scope == self.unit {
            if let Some(unit) = self.units.get_mut(&self.unit) {
                unit.graph.add_edge(dependent, &target, kind);
            }
        } else {
            self.note_external(scope, &target);
        }
        if let Some(info) = self.instances.get_mut(dependent) {
            info.dependencies.insert(target);
        }
    }

    fn note_external(&mut self, scope: ScopeId, target: &str) {
        if scope != ScopeId::GLOBAL {
            return;
        }
        let Some(component) = &self.component else {
            return;
        };
        if let Some(info) = self.components.get_mut(component) {
            if info.externals.insert(target.to_string()) {
                trace!(component = %component, target, "external dependency");
            }
        }
    }

    /// An expression read instance `name` declared in `scope`.
    fn note_read(&mut self, scope: ScopeId, name: &str) {
        let target = self.env.qualify(scope, name);
        match self.reader.clone() {
            Some(reader) => self.depend(&reader, scope, target, EdgeKind::Implicit),
            None if scope != self.unit => self.note_external(scope, &target),
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Finalisation
    // ------------------------------------------------------------------

    fn finalize(&mut self) -> (Vec<String>, IndexMap<String, Vec<String>>) {
        // components instantiating each other
        let mut usage = DependencyGraph::new();
        for (name, info) in &self.components {
            usage.add_node(name);
            for used in &info.uses {
                usage.add_edge(name, used, EdgeKind::Implicit);
            }
        }
        let usage_order = match usage.topological_order() {
            Ok(order) => order,
            Err(CycleError { path }) => {
                self.error(CheckError::Cycle { path });
                Vec::new()
            }
        };

        // externals flow from used components to their users
        for name in &usage_order {
            let inherited: IndexSet<String> = self
                .components
                .get(name)
                .map(|info| {
                    info.uses
                        .iter()
                        .filter_map(|u| self.components.get(u))
                        .flat_map(|u| u.externals.iter().cloned())
                        .collect()
                })
                .unwrap_or_default();
            if let Some(info) = self.components.get_mut(name) {
                info.externals.extend(inherited);
            }
        }

        let mut edges = Vec::new();
        for info in self.components.values() {
            for instance in &info.instances {
                for external in &info.externals {
                    edges.push((instance.clone(), external.clone()));
                }
            }
        }
        for (instance, external) in edges {
            if let Some(unit) = self.units.get_mut(&ScopeId::GLOBAL) {
                unit.graph.add_edge(&instance, &external, EdgeKind::Implicit);
            }
            if let Some(info) = self.instances.get_mut(&instance) {
                info.dependencies.insert(external);
            }
        }

        let mut order = Vec::new();
        let mut component_orders = IndexMap::new();
        let mut cycles = Vec::new();
        for unit in self.units.values() {
            match unit.graph.topological_order() {
                Ok(sorted) => match &unit.component {
                    None => order = sorted,
                    Some(name) => {
                        component_orders.insert(name.clone(), sorted);
                    }
                },
                Err(CycleError { path }) => cycles.push(CheckError::Cycle { path }),
            }
        }
        for cycle in cycles {
            self.error(cycle);
        }
        (order, component_orders)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Check `expr` against `expected`, reporting a mismatch for `what`.
    fn check_value(&mut self, expr: &Expr, expected: &Type, what: &str) {
        match self.infer(expr, Some(expected)) {
            Ok(actual) if actual.is_assignable_to(expected) => {}
            Ok(actual) => self.error(CheckError::type_error(
                format!("{}: expected {}, found {}", what, expected, actual),
                expr.span(),
            )),
            Err(e) => self.error(e),
        }
    }

    fn infer(&mut self, expr: &Expr, expected: Option<&Type>) -> Result<Type, CheckError> {
        self.depth += 1;
        let result = if self.depth > self.config.max_expr_depth {
            Err(CheckError::type_error(
                format!(
                    "expression nesting exceeds depth limit of {}",
                    self.config.max_expr_depth
                ),
                expr.span(),
            ))
        } else {
            self.infer_inner(expr, expected)
        };
        self.depth -= 1;
        result
    }

    fn infer_inner(&mut self, expr: &Expr, expected: Option<&Type>) -> Result<Type, CheckError> {
        match expr {
            Expr::Lit(lit, _) => Ok(match lit {
                Lit::Int(_) | Lit::Float(_) => Type::number(),
                Lit::Str(_) => Type::string(),
                Lit::Bool(_) => Type::boolean(),
                Lit::Null => Type::null(),
            }),
            Expr::Var(id) => self.infer_var(id),
            Expr::Paren { inner, .. } => self.infer(inner, expected),
            Expr::Member { object, field, .. } => {
                let object_ty = self.infer(object, None)?;
                self.infer_member(&object_ty, field)
            }
            Expr::Array { items, .. } => {
                let elem_hint = expected.and_then(Type::element).cloned();
                if items.is_empty() {
                    return Ok(Type::array(elem_hint.unwrap_or_else(Type::any)));
                }
                let mut elems = Vec::with_capacity(items.len());
                for item in items {
                    elems.push(self.infer(item, elem_hint.as_ref())?);
                }
                Ok(Type::array(Type::union(elems)))
            }
            Expr::Object { fields, .. } => {
                let hints = match expected {
                    Some(Type::Object(f)) => f.clone(),
                    _ => Fields::new(),
                };
                let mut out = Fields::new();
                for field in fields {
                    if out.contains_key(&field.key.text) {
                        return Err(CheckError::type_error(
                            format!("duplicate key '{}' in object literal", field.key.text),
                            field.key.span,
                        ));
                    }
                    let ty = self.infer(&field.value, hints.get(&field.key.text))?;
                    out.insert(field.key.text.clone(), ty);
                }
                Ok(Type::Object(out))
            }
            Expr::Unary { op, expr, span } => {
                let operand = self.infer(expr, None)?;
                let (want, symbol) = match op {
                    UnOp::Not => (Type::boolean(), "!"),
                    UnOp::Neg => (Type::number(), "-"),
                };
                if operand.is_any() || operand == want {
                    Ok(want)
                } else {
                    Err(CheckError::type_error(
                        format!("operator {} expects {}, found {}", symbol, want, operand),
                        *span,
                    ))
                }
            }
            Expr::Binary { lhs, op, rhs, span } => {
                let l = self.infer(lhs, None)?;
                let r = self.infer(rhs, None)?;
                binary_type(*op, &l, &r).ok_or_else(|| {
                    CheckError::type_error(
                        format!(
                            "operator {} cannot be applied to {} and {}",
                            op_symbol(*op),
                            l,
                            r
                        ),
                        *span,
                    )
                })
            }
            Expr::Call { callee, args, span } => {
                let callee_ty = self.infer(callee, None)?;
                let (params, ret) = match callee_ty {
                    Type::Function { params, ret } => (params, *ret),
                    t if t.is_any() => {
                        for arg in args {
                            self.infer(arg, None)?;
                        }
                        return Ok(Type::any());
                    }
                    other => {
                        return Err(CheckError::type_error(
                            format!("cannot call a value of type {}", other),
                            *span,
                        ))
                    }
                };
                if params.len() != args.len() {
                    return Err(CheckError::type_error(
                        format!(
                            "function expects {} argument{}, found {}",
                            params.len(),
                            if params.len() == 1 { "" } else { "s" },
                            args.len()
                        ),
                        *span,
                    ));
                }
                for (i, (arg, param)) in args.iter().zip(&params).enumerate() {
                    let actual = self.infer(arg, Some(param))?;
                    if !actual.is_assignable_to(param) {
                        return Err(CheckError::type_error(
                            format!("argument {}: expected {}, found {}", i + 1, param, actual),
                            arg.span(),
                        ));
                    }
                }
                Ok(ret)
            }
        }
    }

    fn infer_var(&mut self, id: &Ident) -> Result<Type, CheckError> {
        let (scope, ty) = self
            .env
            .resolve(&id.text)
            .map_err(|e| Self::env_error(e, id.span))?;
        if self.aliases.contains(&(scope, id.text.clone())) {
            return Err(CheckError::type_error(
                format!("'{}' is a type, not a value", id.text),
                id.span,
            ));
        }
        let ty = ty.clone();
        if ty.instance_name().is_some() {
            self.note_read(scope, &id.text);
        }
        Ok(ty)
    }

    fn infer_member(&mut self, object: &Type, field: &Ident) -> Result<Type, CheckError> {
        let name = field.text.as_str();
        let missing = |what: String| {
            CheckError::type_error(format!("{} has no {} '{}'", object, what, name), field.span)
        };
        match object {
            t if t.is_any() => Ok(Type::any()),
            Type::Object(fields) if fields.is_empty() => Ok(Type::any()),
            Type::Object(fields) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| missing("field".into())),
            Type::Resource(r) => r
                .properties
                .get(name)
                .cloned()
                .ok_or_else(|| missing("property".into())),
            Type::Component(c) if !c.is_definition() => c
                .outputs
                .get(name)
                .cloned()
                .ok_or_else(|| missing("output".into())),
            // `vm.first`: an instance of the schema by name
            Type::Schema(s) => {
                let found = self.env.resolve(name).ok().and_then(|(scope, ty)| match ty {
                    Type::Resource(r) if r.schema == s.name => Some((scope, ty.clone())),
                    _ => None,
                });
                let (scope, ty) = found.ok_or_else(|| missing("instance".into()))?;
                self.note_read(scope, name);
                Ok(ty)
            }
            other => Err(CheckError::type_error(
                format!("cannot access '{}' on a value of type {}", name, other),
                field.span,
            )),
        }
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "||",
        BinOp::And => "&&",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
    }
}

/// Result type of a binary operator, `None` if the operands do not fit.
fn binary_type(op: BinOp, l: &Type, r: &Type) -> Option<Type> {
    let is = |t: &Type, want: Type| t.is_any() || *t == want;
    match op {
        BinOp::Or | BinOp::And => {
            (is(l, Type::boolean()) && is(r, Type::boolean())).then(Type::boolean)
        }
        BinOp::Eq | BinOp::Ne => Some(Type::boolean()),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            (is(l, Type::number()) && is(r, Type::number())).then(Type::boolean)
        }
        BinOp::Add if l.is_any() || r.is_any() => Some(Type::any()),
        BinOp::Add if *l == Type::string() || *r == Type::string() => {
            let printable = |t: &Type| *t == Type::string() || *t == Type::number();
            (printable(l) && printable(r)).then(Type::string)
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            (is(l, Type::number()) && is(r, Type::number())).then(Type::number)
        }
    }
}
