pub mod span {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn new(start: u32, end: u32) -> Self {
            Span { start, end }
        }

        /// Span covering `self` through `other`.
        pub fn to(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }
    }
}

pub mod ast {
    use super::span::Span;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    pub struct Program {
        pub items: Vec<Decl>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Decl {
        Schema(SchemaDecl),
        Resource(ResourceDecl),
        /// `component app { ... }`
        Component(ComponentDecl),
        /// `component app web { ... }`
        Instance(InstanceDecl),
        Input(InputDecl),
        Output(OutputDecl),
        Var(VarDecl),
        Fun(FunDecl),
        TypeAlias(TypeAliasDecl),
    }

    impl Decl {
        pub fn name(&self) -> &Ident {
            match self {
                Decl::Schema(d) => &d.name,
                Decl::Resource(d) => &d.name,
                Decl::Component(d) => &d.name,
                Decl::Instance(d) => &d.name,
                Decl::Input(d) => &d.name,
                Decl::Output(d) => &d.name,
                Decl::Var(d) => &d.name,
                Decl::Fun(d) => &d.name,
                Decl::TypeAlias(d) => &d.name,
            }
        }

        pub fn annotations(&self) -> &[Annotation] {
            match self {
                Decl::Schema(d) => &d.annotations,
                Decl::Resource(d) => &d.annotations,
                Decl::Component(d) => &d.annotations,
                Decl::Instance(d) => &d.annotations,
                Decl::Input(d) => &d.annotations,
                Decl::Output(d) => &d.annotations,
                Decl::Var(d) => &d.annotations,
                Decl::Fun(d) => &d.annotations,
                Decl::TypeAlias(d) => &d.annotations,
            }
        }

        pub fn span(&self) -> Span {
            match self {
                Decl::Schema(d) => d.span,
                Decl::Resource(d) => d.span,
                Decl::Component(d) => d.span,
                Decl::Instance(d) => d.span,
                Decl::Input(d) => d.span,
                Decl::Output(d) => d.span,
                Decl::Var(d) => d.span,
                Decl::Fun(d) => d.span,
                Decl::TypeAlias(d) => d.span,
            }
        }
    }

    /// `@name`, `@name()`, `@name(value)` or `@name(key = value, ...)`
    #[derive(Debug, Clone, Serialize)]
    pub struct Annotation {
        pub name: Ident,
        pub args: AnnotationArgs,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum AnnotationArgs {
        /// `@sensitive`
        Bare,
        /// `@unique()`
        Empty,
        /// `@minValue(1)`, `@allowed(["a", "b"])`, `@dependsOn(vm.first)`
        Value(Expr),
        /// `@validate(regex = "^a", flags = "i")`
        Named(Vec<NamedArg>),
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct NamedArg {
        pub name: Ident,
        pub value: Expr,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct SchemaDecl {
        pub annotations: Vec<Annotation>,
        pub name: Ident,
        pub properties: Vec<SchemaProperty>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct SchemaProperty {
        pub annotations: Vec<Annotation>,
        pub ty: TypeExpr,
        pub name: Ident,
        pub default: Option<Expr>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct ResourceDecl {
        pub annotations: Vec<Annotation>,
        pub schema: Ident,
        pub name: Ident,
        pub body: Vec<PropertyInit>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct ComponentDecl {
        pub annotations: Vec<Annotation>,
        pub name: Ident,
        pub body: Vec<Decl>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct InstanceDecl {
        pub annotations: Vec<Annotation>,
        pub component: Ident,
        pub name: Ident,
        pub body: Vec<PropertyInit>,
        pub span: Span,
    }

    /// `name = value` inside a resource or component instance body
    #[derive(Debug, Clone, Serialize)]
    pub struct PropertyInit {
        pub name: Ident,
        pub value: Expr,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct InputDecl {
        pub annotations: Vec<Annotation>,
        pub ty: TypeExpr,
        pub name: Ident,
        pub default: Option<Expr>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct OutputDecl {
        pub annotations: Vec<Annotation>,
        pub ty: TypeExpr,
        pub name: Ident,
        pub value: Option<Expr>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct VarDecl {
        pub annotations: Vec<Annotation>,
        pub ty: Option<TypeExpr>,
        pub name: Ident,
        pub value: Expr,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct FunDecl {
        pub annotations: Vec<Annotation>,
        pub name: Ident,
        pub params: Vec<Param>,
        pub ret: Option<TypeExpr>,
        pub body: Expr, // single expression body
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Param {
        pub ty: TypeExpr,
        pub name: Ident,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct TypeAliasDecl {
        pub annotations: Vec<Annotation>,
        pub name: Ident,
        pub ty: TypeExpr,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Ident {
        pub text: String,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum TypeExpr {
        /// `string`, `number`, an alias or a schema name
        Named(Ident),
        /// `string[]`
        Array { elem: Box<TypeExpr>, span: Span },
        /// `string | number`
        Union { variants: Vec<TypeExpr>, span: Span },
    }

    impl TypeExpr {
        pub fn span(&self) -> Span {
            match self {
                TypeExpr::Named(id) => id.span,
                TypeExpr::Array { span, .. } | TypeExpr::Union { span, .. } => *span,
            }
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Expr {
        Lit(Lit, Span),
        Var(Ident),
        Member {
            object: Box<Expr>,
            field: Ident,
            span: Span,
        },
        Array {
            items: Vec<Expr>,
            span: Span,
        },
        Object {
            fields: Vec<ObjectField>,
            span: Span,
        },
        Unary {
            op: UnOp,
            expr: Box<Expr>,
            span: Span,
        },
        Call {
            callee: Box<Expr>,
            args: Vec<Expr>,
            span: Span,
        },
        Binary {
            lhs: Box<Expr>,
            op: BinOp,
            rhs: Box<Expr>,
            span: Span,
        },
        Paren {
            inner: Box<Expr>,
            span: Span,
        },
    }

    impl Expr {
        pub fn span(&self) -> Span {
            match self {
                Expr::Lit(_, span) => *span,
                Expr::Var(id) => id.span,
                Expr::Member { span, .. }
                | Expr::Array { span, .. }
                | Expr::Object { span, .. }
                | Expr::Unary { span, .. }
                | Expr::Call { span, .. }
                | Expr::Binary { span, .. }
                | Expr::Paren { span, .. } => *span,
            }
        }

        /// Flatten `a`, `a.b`, `a.b.c` into their segments. Anything else is not a path.
        pub fn as_path(&self) -> Option<Vec<&Ident>> {
            match self {
                Expr::Var(id) => Some(vec![id]),
                Expr::Member { object, field, .. } => {
                    let mut segs = object.as_path()?;
                    segs.push(field);
                    Some(segs)
                }
                Expr::Paren { inner, .. } => inner.as_path(),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct ObjectField {
        pub key: Ident,
        pub value: Expr,
        pub span: Span,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Not,
        Neg,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Lit {
        Int(i64),
        Float(f64),
        Str(String),
        Bool(bool),
        Null,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // logical
        Or,
        And,
        // equality
        Eq,
        Ne,
        // relational
        Lt,
        Le,
        Gt,
        Ge,
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
    }
}
