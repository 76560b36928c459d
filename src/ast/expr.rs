//! The expression AST (spec component B, expression half).

use crate::diagnostics::SourceRange;

/// A single step in a dotted/indexed property access.
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Name(String),
    Index(IndexKey),
}

/// The key used to subscript into a list (integer) or map (string).
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    Int(i64),
    String(String),
}

/// A root name followed by a chain of accessors, e.g. `resA.outList[0].value`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccess {
    pub root: String,
    pub accessors: Vec<Accessor>,
}

impl PropertyAccess {
    pub fn root_name(&self) -> &str {
        &self.root
    }
}

/// One segment of an interpolated string: a literal run of text, or a
/// property access to be substituted.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Literal(String),
    Access(PropertyAccess),
}

/// The closed set of `fn::…` built-ins.
#[derive(Debug, Clone, PartialEq)]
pub enum Builtin {
    Join(Box<Expr>, Box<Expr>),
    Split(Box<Expr>, Box<Expr>),
    Select(Box<Expr>, Box<Expr>),
    ToJson(Box<Expr>),
    ToBase64(Box<Expr>),
    FromBase64(Box<Expr>),
    Secret(Box<Expr>),
    ReadFile(Box<Expr>),
    Invoke {
        function: Box<Expr>,
        args: Option<Box<Expr>>,
        return_: Option<String>,
    },
    StringAsset(Box<Expr>),
    FileAsset(Box<Expr>),
    RemoteAsset(Box<Expr>),
    AssetArchive(Vec<(String, Expr)>),
    FileArchive(Box<Expr>),
    RemoteArchive(Box<Expr>),
}

impl Builtin {
    /// The canonical `fn::X` key for this builtin, used in diagnostics.
    pub fn key(&self) -> &'static str {
        match self {
            Builtin::Join(..) => "fn::join",
            Builtin::Split(..) => "fn::split",
            Builtin::Select(..) => "fn::select",
            Builtin::ToJson(..) => "fn::toJSON",
            Builtin::ToBase64(..) => "fn::toBase64",
            Builtin::FromBase64(..) => "fn::fromBase64",
            Builtin::Secret(..) => "fn::secret",
            Builtin::ReadFile(..) => "fn::readFile",
            Builtin::Invoke { .. } => "fn::invoke",
            Builtin::StringAsset(..) => "fn::stringAsset",
            Builtin::FileAsset(..) => "fn::fileAsset",
            Builtin::RemoteAsset(..) => "fn::remoteAsset",
            Builtin::AssetArchive(..) => "fn::assetArchive",
            Builtin::FileArchive(..) => "fn::fileArchive",
            Builtin::RemoteArchive(..) => "fn::remoteArchive",
        }
    }
}

/// An expression, retaining its source range.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null(SourceRange),
    Bool(bool, SourceRange),
    Number(f64, SourceRange),
    /// A literal string with no `${…}` interpolation inside it.
    String(String, SourceRange),
    Interpolate(Vec<InterpPart>, SourceRange),
    Symbol(PropertyAccess, SourceRange),
    List(Vec<Expr>, SourceRange),
    /// Entries preserve source order — `fn::toJSON` depends on it.
    Object(Vec<(String, Expr)>, SourceRange),
    Builtin(Builtin, SourceRange),
}

impl Expr {
    pub fn range(&self) -> &SourceRange {
        match self {
            Expr::Null(r)
            | Expr::Bool(_, r)
            | Expr::Number(_, r)
            | Expr::String(_, r)
            | Expr::Interpolate(_, r)
            | Expr::Symbol(_, r)
            | Expr::List(_, r)
            | Expr::Object(_, r)
            | Expr::Builtin(_, r) => r,
        }
    }

    /// Walks the expression, collecting the root name of every symbol
    /// reference it contains (used by the dependency graph).
    pub fn collect_root_refs(&self, out: &mut Vec<String>) {
        match self {
            Expr::Null(_) | Expr::Bool(_, _) | Expr::Number(_, _) | Expr::String(_, _) => {}
            Expr::Symbol(access, _) => out.push(access.root.clone()),
            Expr::Interpolate(parts, _) => {
                for part in parts {
                    if let InterpPart::Access(access) = part {
                        out.push(access.root.clone());
                    }
                }
            }
            Expr::List(items, _) => {
                for item in items {
                    item.collect_root_refs(out);
                }
            }
            Expr::Object(entries, _) => {
                for (_, v) in entries {
                    v.collect_root_refs(out);
                }
            }
            Expr::Builtin(b, _) => b.collect_root_refs(out),
        }
    }
}

impl Builtin {
    fn collect_root_refs(&self, out: &mut Vec<String>) {
        match self {
            Builtin::Join(a, b) | Builtin::Split(a, b) | Builtin::Select(a, b) => {
                a.collect_root_refs(out);
                b.collect_root_refs(out);
            }
            Builtin::ToJson(e)
            | Builtin::ToBase64(e)
            | Builtin::FromBase64(e)
            | Builtin::Secret(e)
            | Builtin::ReadFile(e)
            | Builtin::StringAsset(e)
            | Builtin::FileAsset(e)
            | Builtin::RemoteAsset(e)
            | Builtin::FileArchive(e)
            | Builtin::RemoteArchive(e) => e.collect_root_refs(out),
            Builtin::Invoke { function, args, .. } => {
                function.collect_root_refs(out);
                if let Some(args) = args {
                    args.collect_root_refs(out);
                }
            }
            Builtin::AssetArchive(entries) => {
                for (_, v) in entries {
                    v.collect_root_refs(out);
                }
            }
        }
    }
}
