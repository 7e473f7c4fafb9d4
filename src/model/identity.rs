//! Immutable, content-addressed type references.
//!
//! A [`TypeIdentity`] is the unit every other component passes around: a possibly generic,
//! possibly nested, possibly array/pointer-shaped reference to a type. Identities are
//! constructed once during model ingestion, shared via [`Arc`], and never mutated.
//!
//! # Equality design
//!
//! Two comparison strengths exist, both deliberately ignoring the namespace:
//!
//! - **Full equality** ([`PartialEq`]/[`Hash`]): name, generics (recursive), shape
//!   (plain/array/pointer/parameter), declaring type, and element type. This is what the
//!   emission sets are keyed by.
//! - **Fast equality** ([`FastKey`]): name plus generic instance/template flags plus a
//!   fast-recursive generics comparison. Declaring and element types are skipped. This is what
//!   generic-parameter membership checks and interface deduplication use, because generic
//!   parameters carried through declaring-type chains compare equal regardless of which level
//!   re-declares them.
//!
//! # Generic back-references
//!
//! A generic parameter named `!n` stands positionally for an enclosing declaring type's own
//! parameter. [`TypeIdentity::declared_generics`] resolves these while collecting the chain;
//! failure to resolve is a fatal [`Error::UnresolvedGenericBackref`], never a silent default.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::{Error, Result};

/// Shared reference to a [`TypeIdentity`]
pub type TypeIdentityRc = Arc<TypeIdentity>;

/// Token used for namespaces that are empty in the source model.
///
/// C++ has no anonymous namespace equivalent for this purpose, so empty namespaces map to a
/// reserved global-namespace name.
pub const GLOBAL_NAMESPACE: &str = "GlobalNamespace";

/// Generic payload of an identity.
///
/// A reference either declares parameters (a template), supplies arguments (an instance), or
/// carries no generics at all. The two list forms are mutually exclusive per instance.
#[derive(Debug, Clone)]
pub enum Generics {
    /// Not generic
    None,
    /// A generic template with unbound parameters
    Parameters(Vec<TypeIdentityRc>),
    /// A generic instance with concrete arguments substituted
    Arguments(Vec<TypeIdentityRc>),
}

impl Generics {
    /// The parameter or argument list, empty for [`Generics::None`]
    #[must_use]
    pub fn list(&self) -> &[TypeIdentityRc] {
        match self {
            Generics::None => &[],
            Generics::Parameters(v) | Generics::Arguments(v) => v,
        }
    }
}

/// Structural shape of an identity.
///
/// Kept as an explicit variant set so that every shape-dependent decision is an exhaustive
/// match rather than a chain of boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityForm {
    /// An ordinary named type
    Plain,
    /// An array of the element type
    Array,
    /// A pointer to the element type
    Pointer,
    /// An unbound generic parameter; never resolves to a registry entry
    GenericParameter,
}

/// Immutable reference to a type, possibly generic, nested, array or pointer.
///
/// See the module documentation for the equality rules. Construction normally goes through
/// [`crate::model::builder::IdentityBuilder`].
#[derive(Debug, Clone)]
pub struct TypeIdentity {
    /// Namespace in dotted form; may be empty
    pub namespace: String,
    /// Simple name, still carrying arity backticks (e.g. `List`1`)
    pub name: String,
    /// The enclosing type for nested types
    pub declaring: Option<TypeIdentityRc>,
    /// The element type for array/pointer forms
    pub element: Option<TypeIdentityRc>,
    /// Generic parameters or arguments
    pub generics: Generics,
    /// Structural shape
    pub form: IdentityForm,
}

impl TypeIdentity {
    /// Create a plain, non-generic, non-nested identity.
    #[must_use]
    pub fn plain(namespace: &str, name: &str) -> TypeIdentityRc {
        Arc::new(TypeIdentity {
            namespace: namespace.to_string(),
            name: name.to_string(),
            declaring: None,
            element: None,
            generics: Generics::None,
            form: IdentityForm::Plain,
        })
    }

    /// Create a generic parameter identity owned by `declaring`.
    #[must_use]
    pub fn generic_parameter(name: &str, declaring: Option<TypeIdentityRc>) -> TypeIdentityRc {
        Arc::new(TypeIdentity {
            namespace: String::new(),
            name: name.to_string(),
            declaring,
            element: None,
            generics: Generics::None,
            form: IdentityForm::GenericParameter,
        })
    }

    /// Create an array identity over `element`.
    #[must_use]
    pub fn array_of(element: TypeIdentityRc) -> TypeIdentityRc {
        Arc::new(TypeIdentity {
            namespace: element.namespace.clone(),
            name: format!("{}[]", element.name),
            declaring: None,
            element: Some(element),
            generics: Generics::None,
            form: IdentityForm::Array,
        })
    }

    /// Create a pointer identity over `element`.
    #[must_use]
    pub fn pointer_to(element: TypeIdentityRc) -> TypeIdentityRc {
        Arc::new(TypeIdentity {
            namespace: element.namespace.clone(),
            name: format!("{}*", element.name),
            declaring: None,
            element: Some(element),
            generics: Generics::None,
            form: IdentityForm::Pointer,
        })
    }

    /// `true` if this is a generic instance (concrete arguments supplied)
    #[must_use]
    pub fn is_generic_instance(&self) -> bool {
        matches!(&self.generics, Generics::Arguments(v) if !v.is_empty())
    }

    /// `true` if this is a generic template (unbound parameters declared)
    #[must_use]
    pub fn is_generic_template(&self) -> bool {
        matches!(&self.generics, Generics::Parameters(v) if !v.is_empty())
    }

    /// `true` if this reference has any generics. Generic parameters themselves do not count.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.is_generic_instance() || self.is_generic_template()
    }

    /// `true` for array identities
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.form == IdentityForm::Array
    }

    /// `true` for pointer identities
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        self.form == IdentityForm::Pointer
    }

    /// `true` for unbound generic parameters
    #[must_use]
    pub fn is_generic_parameter(&self) -> bool {
        self.form == IdentityForm::GenericParameter
    }

    /// `true` for the `void` type
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.form == IdentityForm::Plain && self.name.eq_ignore_ascii_case("void")
    }

    /// The generic parameter or argument list, empty if not generic.
    #[must_use]
    pub fn generics_list(&self) -> &[TypeIdentityRc] {
        self.generics.list()
    }

    /// Fast structural comparison: name, generic flags and generics, ignoring namespace,
    /// declaring type and element type.
    #[must_use]
    pub fn fast_eq(&self, other: &TypeIdentity) -> bool {
        if self.name != other.name
            || self.is_generic_instance() != other.is_generic_instance()
            || self.is_generic_template() != other.is_generic_template()
        {
            return false;
        }
        let a = self.generics_list();
        let b = other.generics_list();
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.fast_eq(y))
    }

    /// The C++-legal namespace string: `.` becomes `::`, empty becomes [`GLOBAL_NAMESPACE`].
    #[must_use]
    pub fn cpp_namespace(&self) -> String {
        if self.namespace.is_empty() {
            GLOBAL_NAMESPACE.to_string()
        } else {
            self.namespace.replace('.', "::")
        }
    }

    /// The C++-legal simple name: backticks become `_`, angle brackets become `$`.
    #[must_use]
    pub fn cpp_name(&self) -> String {
        self.name.replace('`', "_").replace(['<', '>'], "$")
    }

    /// The fully qualified C++ name through the declaring chain, without generics.
    #[must_use]
    pub fn qualified_cpp_name(&self) -> String {
        let mut name = self.cpp_name();
        let mut dt = self;
        while let Some(declaring) = &dt.declaring {
            name = format!("{}::{}", declaring.cpp_name(), name);
            dt = declaring;
        }
        format!("{}::{}", dt.cpp_namespace(), name)
    }

    /// The include location for this type, without extension.
    ///
    /// Namespaces become nested directories; declaring-chain names are flattened into the file
    /// name with `_`, and template-escape characters are made filesystem safe.
    #[must_use]
    pub fn include_path(&self) -> String {
        let file_name = self.cpp_name().replace('$', "-");
        if let Some(declaring) = &self.declaring {
            return format!("{}_{}", declaring.include_path(), file_name);
        }
        let directory = self.cpp_namespace().replace("::", "/");
        format!("{directory}/{file_name}")
    }

    /// Collect all generic parameters (or arguments) declared along the declaring chain,
    /// outermost first, with numeric `!n` back-references resolved against the argument lists
    /// seen so far.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedGenericBackref`] when a back-reference index cannot be mapped to a
    /// concrete parameter anywhere in the chain.
    pub fn declared_generics(self: &Arc<Self>, include_self: bool) -> Result<Vec<TypeIdentityRc>> {
        let mut defined: Vec<TypeIdentityRc> = Vec::new();
        let mut collections: Vec<Vec<TypeIdentityRc>> = Vec::new();
        if !include_self {
            collections.push(self.generics_list().to_vec());
        }
        let mut dt = if include_self {
            Some(self.clone())
        } else {
            self.declaring.clone()
        };
        while let Some(t) = dt {
            if t.is_generic() {
                for g in t.generics_list().iter().rev() {
                    if self.is_generic_instance()
                        && g.name.starts_with('!')
                        && !collections.is_empty()
                    {
                        let mut idx = parse_backref(self, &g.name)?;
                        let mut assigned = false;
                        for options in &collections {
                            let matched = options.get(idx).ok_or_else(|| {
                                Error::UnresolvedGenericBackref {
                                    reference: self.clone(),
                                    index: idx,
                                }
                            })?;
                            if matched.name.starts_with('!') {
                                idx = parse_backref(self, &matched.name)?;
                            } else {
                                defined.insert(0, matched.clone());
                                assigned = true;
                                break;
                            }
                        }
                        if !assigned {
                            return Err(Error::UnresolvedGenericBackref {
                                reference: self.clone(),
                                index: idx,
                            });
                        }
                    } else {
                        // The outermost declaring type's first generic must end up first.
                        defined.insert(0, g.clone());
                    }
                }
                collections.push(t.generics_list().to_vec());
            }
            dt = t.declaring.clone();
        }
        // First occurrence of each parameter only, compared without declaring types.
        let mut seen: Vec<TypeIdentityRc> = Vec::new();
        for g in defined {
            if !seen.iter().any(|s| s.fast_eq(&g)) {
                seen.push(g);
            }
        }
        Ok(seen)
    }

    /// Map each type in the declaring chain (innermost first) to the generics it introduces.
    ///
    /// A parameter redeclared at several levels belongs to the outermost level that declares
    /// it, matching how C++ nested templates scope their parameters.
    #[must_use]
    pub fn generic_map(
        self: &Arc<Self>,
        include_self: bool,
    ) -> Vec<(TypeIdentityRc, Vec<TypeIdentityRc>)> {
        let mut chain: Vec<TypeIdentityRc> = Vec::new();
        let mut dt = if include_self {
            Some(self.clone())
        } else {
            self.declaring.clone()
        };
        while let Some(t) = dt {
            dt = t.declaring.clone();
            chain.push(t);
        }
        // Outer levels overwrite inner ones for the same parameter.
        let mut owner: HashMap<FastKey, usize> = HashMap::new();
        for (i, t) in chain.iter().enumerate() {
            if t.is_generic() {
                for g in t.generics_list() {
                    owner.insert(FastKey(g.clone()), i);
                }
            }
        }
        chain
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let introduced = t
                    .generics_list()
                    .iter()
                    .filter(|g| owner.get(&FastKey((*g).clone())) == Some(&i))
                    .cloned()
                    .collect();
                (t.clone(), introduced)
            })
            .collect()
    }

    /// Substitute generic parameters through `map`, producing a generic instance reference.
    ///
    /// Parameters absent from the map are kept as-is; templates whose parameters are all
    /// substituted become argument-carrying instances.
    #[must_use]
    pub fn instantiate(self: &Arc<Self>, map: &HashMap<FastKey, TypeIdentityRc>) -> TypeIdentityRc {
        if self.is_generic_parameter() {
            return map
                .get(&FastKey(self.clone()))
                .cloned()
                .unwrap_or_else(|| self.clone());
        }
        let generics = match &self.generics {
            Generics::None => Generics::None,
            Generics::Parameters(v) | Generics::Arguments(v) => {
                Generics::Arguments(v.iter().map(|g| g.instantiate(map)).collect())
            }
        };
        Arc::new(TypeIdentity {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            declaring: self.declaring.as_ref().map(|d| d.instantiate(map)),
            element: self.element.as_ref().map(|e| e.instantiate(map)),
            generics,
            form: self.form,
        })
    }

    /// Hash counterpart of [`TypeIdentity::fast_eq`]: name, generic flags and recursive
    /// generics, ignoring namespace, declaring type and element type.
    pub fn fast_hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.is_generic_instance().hash(state);
        self.is_generic_template().hash(state);
        for g in self.generics_list() {
            g.fast_hash(state);
        }
    }

    /// `true` if this reference, its element type, its declaring chain, or any of its generics
    /// equals `target` (full equality).
    #[must_use]
    pub fn contains(&self, target: &TypeIdentity) -> bool {
        if self == target {
            return true;
        }
        if let Some(element) = &self.element {
            if element.contains(target) {
                return true;
            }
        }
        if !self.is_generic_parameter() {
            if let Some(declaring) = &self.declaring {
                if declaring.contains(target) {
                    return true;
                }
            }
        }
        self.generics_list().iter().any(|g| g.contains(target))
    }
}

fn parse_backref(reference: &Arc<TypeIdentity>, name: &str) -> Result<usize> {
    name[1..]
        .parse::<usize>()
        .map_err(|_| Error::UnresolvedGenericBackref {
            reference: reference.clone(),
            index: 0,
        })
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        // Namespace is intentionally excluded; declaring chains disambiguate instead.
        self.fast_eq(other)
            && self.form == other.form
            && self.declaring == other.declaring
            && self.element == other.element
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Generics must be hashed with the fast rules because equality compares them with
        // fast_eq; hashing their declaring/element parts would split equal keys.
        self.fast_hash(state);
        self.form.hash(state);
        self.declaring.hash(state);
        self.element.hash(state);
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(declaring) = &self.declaring {
            write!(f, "{declaring}/{}", self.name)?;
        } else if self.namespace.is_empty() {
            write!(f, "{}", self.name)?;
        } else {
            write!(f, "{}.{}", self.namespace, self.name)?;
        }
        if self.is_generic() {
            write!(f, "<")?;
            for (i, g) in self.generics_list().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{g}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Hash-set key wrapper applying the fast comparison rules.
///
/// Used for generic-parameter membership and substitution maps, where declaring-type and
/// element differences must not split equal parameters.
#[derive(Debug, Clone)]
pub struct FastKey(pub TypeIdentityRc);

impl PartialEq for FastKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.fast_eq(&other.0)
    }
}

impl Eq for FastKey {}

impl Hash for FastKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.fast_hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(ns: &str, name: &str, params: &[&str]) -> TypeIdentityRc {
        let mut identity = TypeIdentity {
            namespace: ns.to_string(),
            name: name.to_string(),
            declaring: None,
            element: None,
            generics: Generics::None,
            form: IdentityForm::Plain,
        };
        identity.generics = Generics::Parameters(
            params
                .iter()
                .map(|p| TypeIdentity::generic_parameter(p, None))
                .collect(),
        );
        Arc::new(identity)
    }

    #[test]
    fn test_predicates_are_derived() {
        let int = TypeIdentity::plain("System", "Int32");
        assert!(!int.is_generic());
        assert!(!int.is_array());
        assert!(!int.is_pointer());

        let arr = TypeIdentity::array_of(int.clone());
        assert!(arr.is_array());
        assert!(!arr.is_pointer());
        assert_eq!(arr.element.as_deref(), Some(int.as_ref()));

        let ptr = TypeIdentity::pointer_to(int);
        assert!(ptr.is_pointer());

        let void = TypeIdentity::plain("System", "Void");
        assert!(void.is_void());

        let param = TypeIdentity::generic_parameter("T", None);
        assert!(param.is_generic_parameter());
        assert!(!param.is_generic());
    }

    #[test]
    fn test_equality_ignores_namespace() {
        let a = TypeIdentity::plain("Foo", "Thing");
        let b = TypeIdentity::plain("Bar", "Thing");
        assert_eq!(a.as_ref(), b.as_ref());
        assert!(a.fast_eq(&b));
    }

    #[test]
    fn test_full_equality_compares_shape() {
        let int = TypeIdentity::plain("System", "Int32");
        let arr = TypeIdentity::array_of(int.clone());
        let ptr = TypeIdentity::pointer_to(int.clone());
        assert_ne!(int.as_ref(), arr.as_ref());
        assert_ne!(arr.as_ref(), ptr.as_ref());
    }

    #[test]
    fn test_fast_eq_ignores_declaring() {
        let outer = TypeIdentity::plain("Ns", "Outer");
        let t1 = TypeIdentity::generic_parameter("T", Some(outer.clone()));
        let t2 = TypeIdentity::generic_parameter("T", None);
        assert!(t1.fast_eq(&t2));
        assert_ne!(t1.as_ref(), t2.as_ref());
    }

    #[test]
    fn test_cpp_namespace_and_name() {
        let list = TypeIdentity::plain("System.Collections.Generic", "List`1");
        assert_eq!(list.cpp_namespace(), "System::Collections::Generic");
        assert_eq!(list.cpp_name(), "List_1");

        let global = TypeIdentity::plain("", "Free");
        assert_eq!(global.cpp_namespace(), GLOBAL_NAMESPACE);

        let weird = TypeIdentity::plain("Ns", "Pair<K,V>");
        assert_eq!(weird.cpp_name(), "Pair$K,V$");
    }

    #[test]
    fn test_qualified_name_walks_declaring_chain() {
        let outer = TypeIdentity::plain("Game", "Outer");
        let inner = Arc::new(TypeIdentity {
            namespace: "Game".to_string(),
            name: "Inner".to_string(),
            declaring: Some(outer),
            element: None,
            generics: Generics::None,
            form: IdentityForm::Plain,
        });
        assert_eq!(inner.qualified_cpp_name(), "Game::Outer::Inner");
        assert_eq!(inner.include_path(), "Game/Outer_Inner");
    }

    #[test]
    fn test_declared_generics_outermost_first() {
        let outer = template("Ns", "Box`1", &["T"]);
        let inner = Arc::new(TypeIdentity {
            namespace: "Ns".to_string(),
            name: "Iterator`1".to_string(),
            declaring: Some(outer),
            element: None,
            generics: Generics::Parameters(vec![TypeIdentity::generic_parameter("U", None)]),
            form: IdentityForm::Plain,
        });
        let generics = inner.declared_generics(true).unwrap();
        let names: Vec<&str> = generics.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["T", "U"]);
    }

    #[test]
    fn test_backref_resolution() {
        // Outer declares T; the nested template refers to it positionally as !0.
        let outer = template("Ns", "Box`1", &["T"]);
        let int = TypeIdentity::plain("System", "Int32");
        let outer_instance = Arc::new(TypeIdentity {
            namespace: "Ns".to_string(),
            name: "Box`1".to_string(),
            declaring: None,
            element: None,
            generics: Generics::Arguments(vec![int.clone()]),
            form: IdentityForm::Plain,
        });
        let nested_instance = Arc::new(TypeIdentity {
            namespace: "Ns".to_string(),
            name: "Iterator".to_string(),
            declaring: Some(Arc::new(TypeIdentity {
                namespace: "Ns".to_string(),
                name: "Box`1".to_string(),
                declaring: None,
                element: None,
                generics: Generics::Parameters(vec![TypeIdentity::generic_parameter(
                    "!0",
                    Some(outer.clone()),
                )]),
                form: IdentityForm::Plain,
            })),
            element: None,
            generics: Generics::Arguments(vec![outer_instance.generics_list()[0].clone()]),
            form: IdentityForm::Plain,
        });
        let generics = nested_instance.declared_generics(true).unwrap();
        assert_eq!(generics.len(), 1);
        assert_eq!(generics[0].name, "Int32");
    }

    #[test]
    fn test_unresolvable_backref_is_fatal() {
        let bad = Arc::new(TypeIdentity {
            namespace: "Ns".to_string(),
            name: "Broken".to_string(),
            declaring: Some(Arc::new(TypeIdentity {
                namespace: "Ns".to_string(),
                name: "Outer`1".to_string(),
                declaring: None,
                element: None,
                generics: Generics::Parameters(vec![TypeIdentity::generic_parameter("!7", None)]),
                form: IdentityForm::Plain,
            })),
            element: None,
            generics: Generics::Arguments(vec![TypeIdentity::plain("System", "Int32")]),
            form: IdentityForm::Plain,
        });
        let err = bad.declared_generics(true).unwrap_err();
        assert!(matches!(err, Error::UnresolvedGenericBackref { .. }));
    }

    #[test]
    fn test_instantiate_substitutes_parameters() {
        let t = TypeIdentity::generic_parameter("T", None);
        let list = Arc::new(TypeIdentity {
            namespace: "System.Collections.Generic".to_string(),
            name: "List`1".to_string(),
            declaring: None,
            element: None,
            generics: Generics::Parameters(vec![t.clone()]),
            form: IdentityForm::Plain,
        });
        let int = TypeIdentity::plain("System", "Int32");
        let mut map = HashMap::new();
        map.insert(FastKey(t), int.clone());
        let instance = list.instantiate(&map);
        assert!(instance.is_generic_instance());
        assert_eq!(instance.generics_list()[0].as_ref(), int.as_ref());
    }

    #[test]
    fn test_contains_walks_structure() {
        let int = TypeIdentity::plain("System", "Int32");
        let arr = TypeIdentity::array_of(int.clone());
        assert!(arr.contains(&int));

        let other = TypeIdentity::plain("System", "Int64");
        assert!(!arr.contains(&other));
    }
}
