//! Type registry
//!
//! Process-scoped store of [`TypeDef`]s. The proxy engine consults it for
//! member enumeration, constructor accessibility, and interface closures.
//! Interface-inheritance graphs are acyclic by construction; the closure
//! walk still carries an explicit on-stack set so a malformed registration
//! surfaces as a checked error instead of an infinite walk.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ModelError;
use crate::ty::{CtorDef, MemberId, MethodDef, TypeDef, TypeId, Visibility};

/// Registry of type definitions, indexed by [`TypeId`].
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDef>,
    by_name: FxHashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type definition, assigning the next id.
    pub fn register(&mut self, def: TypeDef) -> Result<TypeId, ModelError> {
        if self.by_name.contains_key(&def.name) {
            return Err(ModelError::DuplicateType {
                name: def.name.clone(),
            });
        }
        let id = TypeId(self.types.len());
        self.by_name.insert(def.name.clone(), id);
        self.types.push(def);
        Ok(id)
    }

    /// Look up a type by id.
    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0)
    }

    /// Look up a type by id, failing on unknown ids.
    pub fn resolve(&self, id: TypeId) -> Result<&TypeDef, ModelError> {
        self.get(id).ok_or(ModelError::UnknownType(id))
    }

    /// Look up a type id by name.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Name of a type, or a placeholder for unknown ids.
    pub fn name_of(&self, id: TypeId) -> String {
        self.get(id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a method by member identity.
    pub fn method(&self, member: MemberId) -> Option<&MethodDef> {
        self.get(member.type_id)?.method(member.index)
    }

    /// Walk the interface-inheritance closure of `roots`, in discovery
    /// order, visiting each interface exactly once.
    ///
    /// Every root and every reachable edge target must be an interface.
    pub fn interface_closure(&self, roots: &[TypeId]) -> Result<Vec<TypeId>, ModelError> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        let mut on_stack = FxHashSet::default();
        for root in roots {
            self.walk_interface(*root, &mut order, &mut visited, &mut on_stack)?;
        }
        Ok(order)
    }

    fn walk_interface(
        &self,
        id: TypeId,
        order: &mut Vec<TypeId>,
        visited: &mut FxHashSet<TypeId>,
        on_stack: &mut FxHashSet<TypeId>,
    ) -> Result<(), ModelError> {
        let def = self.resolve(id)?;
        if !def.is_interface() {
            return Err(ModelError::NotAnInterface {
                name: def.name.clone(),
            });
        }
        if on_stack.contains(&id) {
            return Err(ModelError::InterfaceCycle {
                name: def.name.clone(),
            });
        }
        if !visited.insert(id) {
            return Ok(());
        }
        order.push(id);
        on_stack.insert(id);
        for base in &def.interfaces {
            self.walk_interface(*base, order, visited, on_stack)?;
        }
        on_stack.remove(&id);
        Ok(())
    }

    /// Interfaces a class implements, including those inherited through its
    /// base-class chain, in declaration order, each exactly once.
    pub fn class_interface_roots(&self, id: TypeId) -> Result<Vec<TypeId>, ModelError> {
        let mut roots = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = Some(id);
        while let Some(class_id) = current {
            let def = self.resolve(class_id)?;
            for interface in &def.interfaces {
                if seen.insert(*interface) {
                    roots.push(*interface);
                }
            }
            current = def.base;
        }
        Ok(roots)
    }

    /// Whether `id` is `ancestor` or derives from it through the base chain.
    pub fn extends(&self, id: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(id);
        while let Some(class_id) = current {
            if class_id == ancestor {
                return true;
            }
            current = self.get(class_id).and_then(|def| def.base);
        }
        false
    }

    /// Constructors of `id` accessible to a generated subtype: public and
    /// protected always; internal only when the host's visibility policy
    /// vouches for the declaring type; private never.
    pub fn accessible_ctors(
        &self,
        id: TypeId,
        internals_visible: bool,
    ) -> Result<Vec<(usize, &CtorDef)>, ModelError> {
        let def = self.resolve(id)?;
        Ok(def
            .ctors
            .iter()
            .enumerate()
            .filter(|(_, ctor)| match ctor.visibility {
                Visibility::Public | Visibility::Protected => true,
                Visibility::Internal => internals_visible,
                Visibility::Private => false,
            })
            .collect())
    }

    /// Index of an accessible parameterless constructor, if any.
    pub fn default_ctor(
        &self,
        id: TypeId,
        internals_visible: bool,
    ) -> Result<Option<usize>, ModelError> {
        Ok(self
            .accessible_ctors(id, internals_visible)?
            .into_iter()
            .find(|(_, ctor)| ctor.params.is_empty())
            .map(|(index, _)| index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{MethodDef, ParamDef};

    fn diamond() -> (TypeRegistry, TypeId, TypeId, TypeId, TypeId) {
        let mut reg = TypeRegistry::new();
        let root = reg.register(TypeDef::interface("IRoot")).unwrap();
        let left = reg
            .register(TypeDef::interface("ILeft").implements(root))
            .unwrap();
        let right = reg
            .register(TypeDef::interface("IRight").implements(root))
            .unwrap();
        let bottom = reg
            .register(
                TypeDef::interface("IBottom")
                    .implements(left)
                    .implements(right),
            )
            .unwrap();
        (reg, root, left, right, bottom)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = TypeRegistry::new();
        let id = reg.register(TypeDef::class("Widget")).unwrap();

        assert_eq!(reg.lookup("Widget"), Some(id));
        assert_eq!(reg.resolve(id).unwrap().name, "Widget");
        assert_eq!(reg.name_of(id), "Widget");
        assert!(reg.resolve(TypeId(99)).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = TypeRegistry::new();
        reg.register(TypeDef::class("Widget")).unwrap();
        let err = reg.register(TypeDef::class("Widget")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateType { .. }));
    }

    #[test]
    fn test_interface_closure_diamond() {
        let (reg, root, left, right, bottom) = diamond();
        let closure = reg.interface_closure(&[bottom]).unwrap();

        // Discovery order, root reached once through the left branch
        assert_eq!(closure, vec![bottom, left, root, right]);
    }

    #[test]
    fn test_interface_closure_rejects_class() {
        let mut reg = TypeRegistry::new();
        let class = reg.register(TypeDef::class("Widget")).unwrap();
        let err = reg.interface_closure(&[class]).unwrap_err();
        assert!(matches!(err, ModelError::NotAnInterface { .. }));
    }

    #[test]
    fn test_interface_cycle_detected() {
        let mut reg = TypeRegistry::new();
        // Self-referential interface: the id a registrant can forge
        let id = reg
            .register(TypeDef::interface("ISelf").implements(TypeId(0)))
            .unwrap();
        let err = reg.interface_closure(&[id]).unwrap_err();
        assert!(matches!(err, ModelError::InterfaceCycle { .. }));
    }

    #[test]
    fn test_class_interface_roots_include_base_chain() {
        let mut reg = TypeRegistry::new();
        let ia = reg.register(TypeDef::interface("IA")).unwrap();
        let ib = reg.register(TypeDef::interface("IB")).unwrap();
        let base = reg.register(TypeDef::class("Base").implements(ia)).unwrap();
        let derived = reg
            .register(TypeDef::class("Derived").extends(base).implements(ib))
            .unwrap();

        assert_eq!(reg.class_interface_roots(derived).unwrap(), vec![ib, ia]);
        assert!(reg.extends(derived, base));
        assert!(!reg.extends(base, derived));
    }

    #[test]
    fn test_accessible_ctors() {
        let mut reg = TypeRegistry::new();
        let id = reg
            .register(
                TypeDef::class("Service")
                    .with_ctor(CtorDef::public())
                    .with_ctor(
                        CtorDef::public()
                            .with_param(ParamDef::new("seed"))
                            .visibility(Visibility::Internal),
                    )
                    .with_ctor(CtorDef::public().visibility(Visibility::Private)),
            )
            .unwrap();

        assert_eq!(reg.accessible_ctors(id, false).unwrap().len(), 1);
        assert_eq!(reg.accessible_ctors(id, true).unwrap().len(), 2);
        assert_eq!(reg.default_ctor(id, false).unwrap(), Some(0));
    }

    #[test]
    fn test_method_lookup_by_member_id() {
        let mut reg = TypeRegistry::new();
        let id = reg
            .register(TypeDef::class("Widget").with_method(MethodDef::new("draw")))
            .unwrap();

        assert_eq!(reg.method(MemberId::new(id, 0)).unwrap().name, "draw");
        assert!(reg.method(MemberId::new(id, 5)).is_none());
    }
}
