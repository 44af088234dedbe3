// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port type grammar, allowed-type resolution and compatibility.
//!
//! Chip descriptors declare port types as free-form strings (`"Float?"`,
//! `"System.Int32"`, `"T"`, `"(float, int)"`). They are parsed once, when a
//! node is created, into a [`TypeExpr`] and then resolved against the chip's
//! type parameters into an [`AllowedTypes`] set. Connection checks only ever
//! compare resolved sets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Canonical name of control-flow ports
pub const EXEC: &str = "exec";
/// Canonical name of the wildcard type
pub const ANY: &str = "any";
/// Canonical name of the conventional generic parameter
pub const GENERIC: &str = "t";

/// Map common spellings onto one canonical name.
fn alias(name: &str) -> &str {
    match name {
        "boolean" | "bool" => "bool",
        "int32" | "int64" | "integer" | "int" => "int",
        "single" | "float32" | "float" | "number" => "float",
        "float64" | "double" => "double",
        other => other,
    }
}

/// Canonicalize a raw type string.
///
/// Lowercases, drops whitespace, cuts container or decoration syntax at the
/// first `<`, `(`, `[` or `{`, removes `?`, keeps the last segment of a
/// dotted name and applies the alias table. Returns `None` when nothing is
/// left.
pub fn canonical_type_name(raw: &str) -> Option<String> {
    let mut s: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(cut) = s.find(['<', '(', '[', '{']) {
        s.truncate(cut);
    }
    s.retain(|c| c != '?');
    if s.contains('.') {
        if let Some(last) = s.split('.').filter(|seg| !seg.is_empty()).last() {
            s = last.to_string();
        }
    }
    if s.is_empty() {
        return None;
    }
    Some(alias(&s).to_string())
}

/// Whether a raw type string is an explicit list such as `"(a, b)"` or `"a|b"`
pub fn looks_like_list(raw: &str) -> bool {
    let raw = raw.trim();
    raw.starts_with('(') || raw.contains(',') || raw.contains('|')
}

/// Parse an explicit list of types, deduplicated in declaration order
pub fn parse_type_list(raw: &str) -> Vec<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}'))
        .collect();
    let mut out: Vec<String> = Vec::new();
    for part in stripped.split([',', '|']) {
        if let Some(name) = canonical_type_name(part) {
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// Parsed form of a declared port type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// Control flow
    Exec,
    /// Accepts anything except exec
    Any,
    /// A concrete type or the name of a generic parameter
    Named(String),
    /// Explicit list of accepted types
    OneOf(Vec<String>),
}

impl TypeExpr {
    /// Parse a raw declared type. `None` means no usable type information.
    pub fn parse(raw: &str) -> Option<Self> {
        match canonical_type_name(raw) {
            Some(name) if name == EXEC => Some(Self::Exec),
            Some(name) if name == ANY => Some(Self::Any),
            Some(name) => Some(Self::Named(name)),
            None if looks_like_list(raw) => {
                let list = parse_type_list(raw);
                (!list.is_empty()).then_some(Self::OneOf(list))
            }
            None => None,
        }
    }
}

/// Generic type parameter declared by a chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    /// Parameter name, usually `T`
    pub name: String,
    /// Constraint list such as `"(float, int)"`; empty or missing means unconstrained
    #[serde(default)]
    pub constraint: Option<String>,
}

impl TypeParam {
    /// Unconstrained parameter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    /// Add a constraint list
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    fn allowed(&self) -> AllowedTypes {
        let list = self
            .constraint
            .as_deref()
            .map(parse_type_list)
            .unwrap_or_default();
        if list.is_empty() {
            AllowedTypes::Wildcard
        } else {
            AllowedTypes::from_list(list)
        }
    }
}

/// Set of concrete types a port accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedTypes {
    /// Matches every non-exec type
    Wildcard,
    /// Matches any type in the set
    OneOf(BTreeSet<String>),
}

impl AllowedTypes {
    /// Set from a parsed list; a list mentioning `any` is a wildcard
    pub fn from_list(list: Vec<String>) -> Self {
        if list.iter().any(|t| t == ANY) {
            Self::Wildcard
        } else {
            Self::OneOf(list.into_iter().collect())
        }
    }

    /// Single concrete type
    pub fn single(name: impl Into<String>) -> Self {
        Self::OneOf(BTreeSet::from([name.into()]))
    }

    /// Either side is a wildcard, or the sets intersect
    pub fn compatible(&self, other: &AllowedTypes) -> bool {
        match (self, other) {
            (Self::Wildcard, _) | (_, Self::Wildcard) => true,
            (Self::OneOf(a), Self::OneOf(b)) => a.intersection(b).next().is_some(),
        }
    }
}

/// Compatibility of two optional resolutions. Missing information never matches.
pub fn compatible(a: Option<&AllowedTypes>, b: Option<&AllowedTypes>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.compatible(b),
        _ => false,
    }
}

/// Everything the engine derives from a port's declared type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedType {
    /// Parsed declaration
    pub expr: Option<TypeExpr>,
    /// Accepted types, `None` when the declaration was missing or unusable
    pub allowed: Option<AllowedTypes>,
    /// Name of the bound generic parameter
    pub type_param: Option<String>,
    /// Control-flow port
    pub is_exec: bool,
    /// Display color follows the concrete port it connects to
    pub adaptive: bool,
}

impl ResolvedType {
    /// Resolve a raw declared type against the owning chip's parameters
    pub fn resolve(raw: Option<&str>, params: &[TypeParam]) -> Self {
        let Some(expr) = raw.and_then(TypeExpr::parse) else {
            return Self::default();
        };

        let mut resolved = Self::default();
        match &expr {
            TypeExpr::Exec => {
                resolved.allowed = Some(AllowedTypes::single(EXEC));
                resolved.is_exec = true;
            }
            TypeExpr::Any => {
                resolved.allowed = Some(AllowedTypes::Wildcard);
                resolved.adaptive = true;
            }
            TypeExpr::OneOf(list) => {
                resolved.allowed = Some(AllowedTypes::from_list(list.clone()));
                resolved.adaptive = true;
            }
            TypeExpr::Named(name) => {
                let param = params
                    .iter()
                    .find(|p| canonical_type_name(&p.name).as_deref() == Some(name.as_str()))
                    .or_else(|| (name == GENERIC && params.len() == 1).then(|| &params[0]));

                if let Some(param) = param {
                    resolved.allowed = Some(param.allowed());
                    resolved.type_param = Some(param.name.clone());
                    resolved.adaptive = true;
                } else if name == GENERIC {
                    // Unconstrained generic with nothing to bind to.
                    resolved.allowed = Some(AllowedTypes::Wildcard);
                } else {
                    resolved.allowed = Some(AllowedTypes::single(name.clone()));
                }
            }
        }
        resolved.expr = Some(expr);
        resolved
    }

    /// Canonical name of a concrete (non-adaptive) type
    pub fn concrete_name(&self) -> Option<&str> {
        match &self.expr {
            Some(TypeExpr::Exec) => Some(EXEC),
            Some(TypeExpr::Named(name)) if !self.adaptive => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Port colors keyed by canonical type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypePalette {
    /// Color per canonical type
    pub colors: IndexMap<String, [u8; 3]>,
    /// Fill used for ports with no color of their own
    pub adaptive: [u8; 3],
}

impl TypePalette {
    /// Color of a canonical type
    pub fn color(&self, canonical: &str) -> Option<[u8; 3]> {
        self.colors.get(canonical).copied()
    }

    /// Base color of a resolved port. Adaptive and untyped ports have none.
    pub fn port_color(&self, resolved: &ResolvedType) -> Option<[u8; 3]> {
        resolved.concrete_name().and_then(|name| self.color(name))
    }
}

impl Default for TypePalette {
    fn default() -> Self {
        let colors = [
            (EXEC, [200, 200, 200]),
            ("bool", [200, 80, 80]),
            ("int", [80, 200, 200]),
            ("float", [80, 200, 80]),
            ("double", [60, 160, 90]),
            ("string", [200, 180, 150]),
            ("color", [255, 200, 100]),
            ("player", [150, 100, 200]),
            ("vector3", [200, 150, 80]),
            ("quaternion", [200, 100, 200]),
        ]
        .into_iter()
        .map(|(name, color)| (name.to_string(), color))
        .collect();

        Self {
            colors,
            adaptive: [150, 150, 150],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(raw: &str, params: &[TypeParam]) -> Option<AllowedTypes> {
        ResolvedType::resolve(Some(raw), params).allowed
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_type_name("  Float? ").as_deref(), Some("float"));
        assert_eq!(canonical_type_name("System.Int32").as_deref(), Some("int"));
        assert_eq!(canonical_type_name("List<float>").as_deref(), Some("list"));
        assert_eq!(canonical_type_name("float (0-1)").as_deref(), Some("float"));
        assert_eq!(canonical_type_name("Number").as_deref(), Some("float"));
        assert_eq!(canonical_type_name("float64").as_deref(), Some("double"));
        assert_eq!(canonical_type_name("Boolean").as_deref(), Some("bool"));
        assert_eq!(canonical_type_name("(float, int)"), None);
        assert_eq!(canonical_type_name("   "), None);
    }

    #[test]
    fn test_type_list() {
        assert_eq!(parse_type_list("(float, Int32 | float)"), vec!["float", "int"]);
        assert_eq!(parse_type_list("[]"), Vec::<String>::new());
    }

    #[test]
    fn test_parse_expr() {
        assert_eq!(TypeExpr::parse("Exec"), Some(TypeExpr::Exec));
        assert_eq!(TypeExpr::parse("ANY"), Some(TypeExpr::Any));
        assert_eq!(TypeExpr::parse("string"), Some(TypeExpr::Named("string".into())));
        assert_eq!(
            TypeExpr::parse("(float, int)"),
            Some(TypeExpr::OneOf(vec!["float".into(), "int".into()]))
        );
        assert_eq!(TypeExpr::parse("()"), None);
    }

    #[test]
    fn test_float_and_int_incompatible() {
        let float = allowed("float", &[]);
        let int = allowed("Int32", &[]);
        assert!(!compatible(float.as_ref(), int.as_ref()));
        assert!(compatible(float.as_ref(), allowed("Single", &[]).as_ref()));
    }

    #[test]
    fn test_generic_param_constraint() {
        let params = [TypeParam::new("T").with_constraint("(float, int)")];
        let generic = allowed("T", &params);
        assert!(compatible(generic.as_ref(), allowed("int", &[]).as_ref()));
        assert!(!compatible(generic.as_ref(), allowed("string", &[]).as_ref()));

        let resolved = ResolvedType::resolve(Some("T"), &params);
        assert!(resolved.adaptive);
        assert_eq!(resolved.type_param.as_deref(), Some("T"));
    }

    #[test]
    fn test_unconstrained_generics_are_wildcards() {
        assert_eq!(allowed("T", &[]), Some(AllowedTypes::Wildcard));
        assert_eq!(allowed("T", &[TypeParam::new("T")]), Some(AllowedTypes::Wildcard));
        let any_constraint = [TypeParam::new("T").with_constraint("any | int")];
        assert_eq!(allowed("T", &any_constraint), Some(AllowedTypes::Wildcard));
        assert!(!ResolvedType::resolve(Some("T"), &[]).adaptive);
    }

    #[test]
    fn test_explicit_list_fallback() {
        let list = ResolvedType::resolve(Some("(string, bool)"), &[]);
        assert!(list.adaptive);
        assert!(compatible(list.allowed.as_ref(), allowed("bool", &[]).as_ref()));
        assert_eq!(allowed("(any, int)", &[]), Some(AllowedTypes::Wildcard));
    }

    #[test]
    fn test_exec_only_matches_exec() {
        let exec = ResolvedType::resolve(Some("exec"), &[]);
        assert!(exec.is_exec);
        assert!(!exec.adaptive);
        assert!(!compatible(exec.allowed.as_ref(), allowed("float", &[]).as_ref()));
        assert!(compatible(exec.allowed.as_ref(), allowed("Exec", &[]).as_ref()));
    }

    #[test]
    fn test_missing_type_never_compatible() {
        let none = ResolvedType::resolve(None, &[]);
        assert!(none.allowed.is_none());
        assert!(!compatible(none.allowed.as_ref(), Some(&AllowedTypes::Wildcard)));
    }

    #[test]
    fn test_compatibility_symmetric() {
        let params = [TypeParam::new("T").with_constraint("(float, int)")];
        let samples: Vec<Option<AllowedTypes>> = ["float", "int", "string", "any", "T", "(int|bool)", "exec"]
            .iter()
            .map(|raw| allowed(raw, &params))
            .chain(std::iter::once(None))
            .collect();
        for a in &samples {
            for b in &samples {
                assert_eq!(compatible(a.as_ref(), b.as_ref()), compatible(b.as_ref(), a.as_ref()));
            }
        }
    }

    #[test]
    fn test_palette_colors() {
        let palette = TypePalette::default();
        let string = ResolvedType::resolve(Some("String"), &[]);
        assert_eq!(palette.port_color(&string), Some([200, 180, 150]));
        let any = ResolvedType::resolve(Some("any"), &[]);
        assert_eq!(palette.port_color(&any), None);
        let exec = ResolvedType::resolve(Some("exec"), &[]);
        assert_eq!(palette.port_color(&exec), Some([200, 200, 200]));
    }
}
