//! Index spaces and export names of a Wasm module under construction.
//!
//! Within each category imports occupy the low indices in declaration order,
//! followed by definitions in declaration order. Every entity is exported as
//! `<category><index>`, e.g. `global0`.

use crate::instruction::Variable;
use crate::types::{EntityCategory, EntityType, ModuleSignature, WasmExport};

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEntity {
    pub var: Variable,
    pub entity: EntityType,
    /// The JavaScript value supplying an imported entity
    pub import_source: Option<Variable>,
}

impl ModuleEntity {
    pub fn is_import(&self) -> bool {
        self.import_source.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleLayout {
    entities: Vec<ModuleEntity>,
}

impl ModuleLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, var: Variable, entity: EntityType) {
        self.entities.push(ModuleEntity {
            var,
            entity,
            import_source: None,
        });
    }

    pub fn import(&mut self, var: Variable, entity: EntityType, source: Variable) {
        self.entities.push(ModuleEntity {
            var,
            entity,
            import_source: Some(source),
        });
    }

    pub fn entities(&self) -> &[ModuleEntity] {
        &self.entities
    }

    /// Imported entities in declaration order, which is the import section order
    pub fn imports(&self) -> impl Iterator<Item = &ModuleEntity> {
        self.entities.iter().filter(|e| e.is_import())
    }

    /// Definitions of one category in declaration order
    pub fn definitions(&self, category: EntityCategory) -> impl Iterator<Item = &ModuleEntity> {
        self.entities
            .iter()
            .filter(move |e| !e.is_import() && e.entity.category() == category)
    }

    fn import_count(&self, category: EntityCategory) -> u32 {
        self.imports()
            .filter(|e| e.entity.category() == category)
            .count() as u32
    }

    /// Position of an entity within its category's index space
    pub fn index_of(&self, var: Variable) -> Option<u32> {
        let target = self.entities.iter().find(|e| e.var == var)?;
        let category = target.entity.category();
        let same_kind = |e: &&ModuleEntity| {
            e.entity.category() == category && e.is_import() == target.is_import()
        };
        let position = self
            .entities
            .iter()
            .filter(same_kind)
            .position(|e| e.var == var)? as u32;
        if target.is_import() {
            Some(position)
        } else {
            Some(self.import_count(category) + position)
        }
    }

    pub fn entity_of(&self, var: Variable) -> Option<&ModuleEntity> {
        self.entities.iter().find(|e| e.var == var)
    }

    pub fn export_name(&self, var: Variable) -> Option<String> {
        let entity = self.entity_of(var)?;
        let index = self.index_of(var)?;
        Some(format!("{}{}", entity.entity.category().export_prefix(), index))
    }

    /// First category in which an import follows a definition
    pub fn ordering_violation(&self) -> Option<EntityCategory> {
        let mut defined = [false; 4];
        for entity in &self.entities {
            let slot = entity.entity.category().index();
            if entity.is_import() && defined[slot] {
                return Some(entity.entity.category());
            }
            if !entity.is_import() {
                defined[slot] = true;
            }
        }
        None
    }

    /// Whether importing an entity of this category now keeps imports before definitions
    pub fn can_import(&self, category: EntityCategory) -> bool {
        self.definitions(category).next().is_none()
    }

    pub fn count(&self, category: EntityCategory) -> usize {
        self.entities
            .iter()
            .filter(|e| e.entity.category() == category)
            .count()
    }

    pub fn signature(&self) -> ModuleSignature {
        let imports = self.imports().map(|e| e.entity.clone()).collect();
        let mut exports = Vec::with_capacity(self.entities.len());
        for category in EntityCategory::ALL {
            let ordered = self
                .imports()
                .filter(|e| e.entity.category() == category)
                .chain(self.definitions(category));
            for (index, entity) in ordered.enumerate() {
                exports.push(WasmExport {
                    name: format!("{}{}", category.export_prefix(), index),
                    entity: entity.entity.clone(),
                });
            }
        }
        ModuleSignature { imports, exports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WasmValueType;

    fn global(ty: WasmValueType) -> EntityType {
        EntityType::Global { ty, mutable: true }
    }

    #[test]
    fn test_imports_come_first() {
        let mut layout = ModuleLayout::new();
        layout.import(Variable(10), global(WasmValueType::I32), Variable(1));
        layout.define(Variable(11), global(WasmValueType::I64));

        assert_eq!(layout.export_name(Variable(10)).as_deref(), Some("global0"));
        assert_eq!(layout.export_name(Variable(11)).as_deref(), Some("global1"));
        assert_eq!(layout.ordering_violation(), None);
    }

    #[test]
    fn test_interleaving_is_detected() {
        let mut layout = ModuleLayout::new();
        layout.define(Variable(5), global(WasmValueType::I32));
        assert!(!layout.can_import(EntityCategory::Global));
        assert!(layout.can_import(EntityCategory::Memory));
        layout.import(Variable(6), global(WasmValueType::I32), Variable(1));

        assert_eq!(layout.ordering_violation(), Some(EntityCategory::Global));
        // Index computation still places the import first
        assert_eq!(layout.index_of(Variable(6)), Some(0));
        assert_eq!(layout.index_of(Variable(5)), Some(1));
    }

    #[test]
    fn test_signature_lists_every_category() {
        let mut layout = ModuleLayout::new();
        layout.define(Variable(1), EntityType::Memory { minimum: 1, maximum: None, shared: false });
        layout.define(
            Variable(2),
            EntityType::Function(crate::types::WasmSignature::new(vec![], vec![WasmValueType::I32])),
        );
        let sig = layout.signature();
        let names: Vec<_> = sig.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["function0", "memory0"]);
        assert!(sig.imports.is_empty());
    }
}
